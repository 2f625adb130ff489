use btc_engine::builder::{build_signed_transaction, SendRequest, SignedTransaction};
use btc_engine::{Address, BtcError, BtcNetwork, KeyPair, ScriptType, Utxo};
use btc_provider::{AddressUtxo, ChainProvider};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::SendError;

/// Outcome of a successful broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Locally computed txid.
    pub txid: String,
    pub raw_tx_hex: String,
    pub inputs: usize,
    pub fee_sat: u64,
    pub change_sat: u64,
}

/// Balance of an address as seen by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub confirmed_sat: u64,
    pub unconfirmed_sat: u64,
    pub utxo_count: usize,
}

/// Builds, signs, and broadcasts payments through a [`ChainProvider`].
pub struct TransactionSender<P> {
    provider: P,
    network: BtcNetwork,
    include_unconfirmed: bool,
}

impl<P: ChainProvider> TransactionSender<P> {
    pub fn new(provider: P, network: BtcNetwork) -> Self {
        Self {
            provider,
            network,
            include_unconfirmed: false,
        }
    }

    /// Also spend outputs that are still in the mempool.
    pub fn include_unconfirmed(mut self, include: bool) -> Self {
        self.include_unconfirmed = include;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    /// Current tip height; doubles as a connectivity check.
    pub fn check_connection(&self) -> Result<u64, SendError> {
        let height = self.provider.tip_height()?;
        debug!(provider = self.provider.name(), height, "provider reachable");
        Ok(height)
    }

    /// Hash of the block at `height`.
    pub fn block_hash(&self, height: u64) -> Result<String, SendError> {
        let hash = self.provider.block_hash(height)?;
        debug!(provider = self.provider.name(), height, %hash, "block lookup");
        Ok(hash)
    }

    pub fn balance(&self, address: &str) -> Result<Balance, SendError> {
        let address = Address::parse(address, self.network).map_err(SendError::Decode)?;
        let listing = self.provider.fetch_utxos(&address.to_string())?;

        let mut balance = Balance {
            utxo_count: listing.len(),
            ..Balance::default()
        };
        for utxo in &listing {
            let bucket = if utxo.status.confirmed {
                &mut balance.confirmed_sat
            } else {
                &mut balance.unconfirmed_sat
            };
            *bucket = bucket.saturating_add(utxo.value);
        }
        Ok(balance)
    }

    /// UTXOs of `address` that can be spent now, each with its locking script.
    ///
    /// A failed listing is an error. A UTXO whose locking script cannot be
    /// recovered is logged and skipped.
    pub fn spendable_utxos(&self, address: &Address) -> Result<Vec<Utxo>, SendError> {
        let encoded = address.encode().map_err(SendError::Decode)?;
        let listing = self.provider.fetch_utxos(&encoded)?;

        let mut utxos = Vec::with_capacity(listing.len());
        for entry in listing {
            if !entry.status.confirmed && !self.include_unconfirmed {
                debug!(txid = %entry.txid, vout = entry.vout, "skipping unconfirmed UTXO");
                continue;
            }
            match self.locking_script(&entry) {
                Ok(script_pubkey_hex) => utxos.push(Utxo {
                    txid: entry.txid,
                    vout: entry.vout,
                    amount_sat: entry.value,
                    script_pubkey_hex,
                }),
                Err(e) => {
                    warn!(txid = %entry.txid, vout = entry.vout, error = %e, "skipping UTXO without locking script");
                }
            }
        }
        Ok(utxos)
    }

    fn locking_script(&self, entry: &AddressUtxo) -> Result<String, SendError> {
        match &entry.scriptpubkey {
            Some(script) => Ok(script.clone()),
            None => Ok(self.provider.fetch_output_script(&entry.txid, entry.vout)?),
        }
    }

    /// Build and sign a payment without broadcasting it.
    pub fn build(
        &self,
        wif: &str,
        from: &str,
        to: &str,
        amount_sat: u64,
        fee_sat: u64,
    ) -> Result<SignedTransaction, SendError> {
        let (key, hint) = KeyPair::from_wif_with_hint(wif).map_err(SendError::Decode)?;
        let key = key.for_network(self.network).map_err(SendError::Decode)?;
        let request = SendRequest::parse(from, to, amount_sat, fee_sat, self.network)
            .map_err(SendError::Decode)?;
        if let Some(script_type) = hint {
            if script_type != request.from.script_type() {
                return Err(SendError::Decode(BtcError::InvalidWif(format!(
                    "key is tagged {script_type} but {from} is a {} address",
                    request.from.script_type()
                ))));
            }
        }

        let utxos = self.spendable_utxos(&request.from)?;
        if utxos.is_empty() {
            return Err(SendError::NoUtxos {
                address: from.to_string(),
            });
        }

        build_signed_transaction(&request, &key, &utxos).map_err(SendError::from_build)
    }

    /// Build, sign, and broadcast a payment.
    pub fn send(
        &self,
        wif: &str,
        from: &str,
        to: &str,
        amount_sat: u64,
        fee_sat: u64,
    ) -> Result<SendReceipt, SendError> {
        let signed = self.build(wif, from, to, amount_sat, fee_sat)?;
        let raw_tx_hex = signed.raw_hex();

        let reported = self.provider.broadcast(&raw_tx_hex)?;
        if !reported.is_empty() && reported != signed.txid {
            warn!(local = %signed.txid, %reported, "provider reported a different txid");
        }

        info!(
            txid = %signed.txid,
            from,
            to,
            amount_sat,
            fee_sat,
            change_sat = signed.selection.change_sat,
            "payment broadcast"
        );

        Ok(SendReceipt {
            txid: signed.txid,
            raw_tx_hex,
            inputs: signed.tx.inputs.len(),
            fee_sat,
            change_sat: signed.selection.change_sat,
        })
    }
}

/// Generate a fresh key and its address. The WIF is returned in a
/// zeroizing buffer.
pub fn generate_address(
    network: BtcNetwork,
    script_type: ScriptType,
) -> Result<(Address, Zeroizing<String>), BtcError> {
    btc_engine::keys::generate_random(network, script_type)
}
