use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Confirmation state of an output as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatus {
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// One entry of `GET /address/{addr}/utxo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUtxo {
    pub txid: String,
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    #[serde(default)]
    pub status: UtxoStatus,
    /// Locking script hex. Esplora omits it from the address listing, so it
    /// is usually recovered from the funding transaction.
    #[serde(default)]
    pub scriptpubkey: Option<String>,
}

/// Output of `GET /tx/{txid}`; only the fields needed to recover a locking script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TxInfo {
    pub vout: Vec<TxOutInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TxOutInfo {
    pub scriptpubkey: String,
}

/// Chain data and relay, as needed to build and publish a payment.
pub trait ChainProvider {
    /// Unspent outputs locked to `address`, in backend order.
    fn fetch_utxos(&self, address: &str) -> Result<Vec<AddressUtxo>, ProviderError>;

    /// Locking script hex of output `vout` of `txid`.
    fn fetch_output_script(&self, txid: &str, vout: u32) -> Result<String, ProviderError>;

    /// Publish a hex-encoded transaction and return the txid the backend reports.
    fn broadcast(&self, raw_tx_hex: &str) -> Result<String, ProviderError>;

    /// Height of the current chain tip.
    fn tip_height(&self) -> Result<u64, ProviderError>;

    /// Hash of the block at `height` on the best chain, in display order.
    fn block_hash(&self, height: u64) -> Result<String, ProviderError>;

    /// Short name for log lines.
    fn name(&self) -> &str;
}
