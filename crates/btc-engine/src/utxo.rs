use crate::error::BtcError;
use crate::transaction::OutPoint;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
    /// The locking script (scriptPubKey) as hex, exactly as the provider reported it.
    pub script_pubkey_hex: String,
}

impl Utxo {
    /// The outpoint this UTXO occupies, with the txid in internal byte order.
    pub fn outpoint(&self) -> Result<OutPoint, BtcError> {
        OutPoint::from_hex(&self.txid, self.vout)
    }
}

/// Result of UTXO selection: the chosen UTXOs, their aggregate value, and the
/// amount left over for the change output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    /// The selected UTXOs, in the order they were offered.
    pub selected: Vec<Utxo>,
    /// Total value of the selected UTXOs in satoshis.
    pub total_sat: u64,
    /// `total_sat - target - fee`. Zero means no change output.
    pub change_sat: u64,
}

impl UtxoSelection {
    pub fn has_change(&self) -> bool {
        self.change_sat > 0
    }
}

/// Select UTXOs to cover `target_sat` plus a fixed `fee_sat`.
///
/// First-fit: UTXOs are taken in the order given and accumulation stops as
/// soon as the running total covers `target_sat + fee_sat`.
pub fn select_utxos(
    utxos: &[Utxo],
    target_sat: u64,
    fee_sat: u64,
) -> Result<UtxoSelection, BtcError> {
    let required = target_sat.checked_add(fee_sat).ok_or_else(|| {
        BtcError::TransactionBuildError(format!(
            "target {target_sat} sat plus fee {fee_sat} sat overflows"
        ))
    })?;

    let mut selected: Vec<Utxo> = Vec::new();
    let mut total_sat: u64 = 0;

    for utxo in utxos {
        selected.push(utxo.clone());
        total_sat = total_sat.checked_add(utxo.amount_sat).ok_or_else(|| {
            BtcError::TransactionBuildError("selected UTXO total overflows".into())
        })?;

        if total_sat >= required {
            return Ok(UtxoSelection {
                selected,
                total_sat,
                change_sat: total_sat - required,
            });
        }
    }

    Err(BtcError::InsufficientFunds {
        available: total_sat,
        required,
    })
}
