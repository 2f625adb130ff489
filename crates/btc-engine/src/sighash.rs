//! Signature hash computation for legacy and segwit v0 inputs.
//!
//! Both algorithms take the 20-byte key hash of the spent output and build
//! the P2PKH-shaped script code from it; which digest is used depends only
//! on the [`ScriptType`] tag of the spent output.

use crate::error::BtcError;
use crate::hashes::sha256d;
use crate::script::{classify, decode_script_hex, p2pkh_script, p2wpkh_script_code, ScriptType};
use crate::transaction::{write_output, write_var_bytes, Transaction, TxInput, TxOutput};
use crate::utxo::Utxo;

const SIGHASH_ALL: u8 = 0x01;
const SIGHASH_NONE: u8 = 0x02;
const SIGHASH_SINGLE: u8 = 0x03;
const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Digest returned for `SIGHASH_SINGLE` when the input has no matching
/// output: the integer one, little-endian.
const SIGHASH_SINGLE_BUG: [u8; 32] = {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
};

/// Which parts of the transaction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SighashType {
    #[default]
    All,
    None,
    Single,
    AllPlusAnyoneCanPay,
    NonePlusAnyoneCanPay,
    SinglePlusAnyoneCanPay,
}

impl SighashType {
    /// The byte appended to DER signatures.
    pub fn to_byte(self) -> u8 {
        match self {
            SighashType::All => SIGHASH_ALL,
            SighashType::None => SIGHASH_NONE,
            SighashType::Single => SIGHASH_SINGLE,
            SighashType::AllPlusAnyoneCanPay => SIGHASH_ALL | SIGHASH_ANYONECANPAY,
            SighashType::NonePlusAnyoneCanPay => SIGHASH_NONE | SIGHASH_ANYONECANPAY,
            SighashType::SinglePlusAnyoneCanPay => SIGHASH_SINGLE | SIGHASH_ANYONECANPAY,
        }
    }

    /// The 4-byte value appended to the digest preimage.
    pub fn to_u32(self) -> u32 {
        self.to_byte() as u32
    }

    /// Strict parse of a signature's trailing sighash byte.
    pub fn from_byte(byte: u8) -> Result<Self, BtcError> {
        match byte {
            0x01 => Ok(SighashType::All),
            0x02 => Ok(SighashType::None),
            0x03 => Ok(SighashType::Single),
            0x81 => Ok(SighashType::AllPlusAnyoneCanPay),
            0x82 => Ok(SighashType::NonePlusAnyoneCanPay),
            0x83 => Ok(SighashType::SinglePlusAnyoneCanPay),
            other => Err(BtcError::SigningError(format!(
                "unknown sighash type {other:#04x}"
            ))),
        }
    }

    pub fn anyone_can_pay(self) -> bool {
        self.to_byte() & SIGHASH_ANYONECANPAY != 0
    }

    fn is_none(self) -> bool {
        self.to_byte() & 0x1f == SIGHASH_NONE
    }

    fn is_single(self) -> bool {
        self.to_byte() & 0x1f == SIGHASH_SINGLE
    }
}

/// What a signer needs to know about the output an input spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpentOutput {
    pub script_type: ScriptType,
    /// HASH160 of the public key (P2PKH hash or P2WPKH program).
    pub pubkey_hash: [u8; 20],
    /// Value in satoshis; committed to by segwit digests.
    pub amount_sat: u64,
}

impl SpentOutput {
    /// Decode and classify a UTXO's locking script.
    pub fn from_utxo(utxo: &Utxo) -> Result<Self, BtcError> {
        let script = decode_script_hex(&utxo.script_pubkey_hex)?;
        let (script_type, pubkey_hash) = classify(&script).ok_or_else(|| {
            BtcError::UnsupportedScript(format!(
                "{}:{} is locked by {}, which is neither P2PKH nor P2WPKH",
                utxo.txid, utxo.vout, utxo.script_pubkey_hex
            ))
        })?;
        Ok(Self {
            script_type,
            pubkey_hash,
            amount_sat: utxo.amount_sat,
        })
    }

    /// Script code placed in the digest preimage.
    pub fn script_code(&self) -> Vec<u8> {
        match self.script_type {
            ScriptType::P2pkh => p2pkh_script(&self.pubkey_hash),
            ScriptType::P2wpkh => p2wpkh_script_code(&self.pubkey_hash),
        }
    }
}

/// Signature hash for `input_index`, choosing the legacy or BIP-143 digest
/// from the spent output's script type.
pub fn compute_sighash(
    tx: &Transaction,
    input_index: usize,
    spent: &SpentOutput,
    sighash_type: SighashType,
) -> Result<[u8; 32], BtcError> {
    let script_code = spent.script_code();
    match spent.script_type {
        ScriptType::P2pkh => legacy_sighash(tx, input_index, &script_code, sighash_type),
        ScriptType::P2wpkh => segwit_v0_sighash(
            tx,
            input_index,
            &script_code,
            spent.amount_sat,
            sighash_type,
        ),
    }
}

/// Original (pre-segwit) signature hash.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: SighashType,
) -> Result<[u8; 32], BtcError> {
    check_index(tx, input_index)?;

    if sighash_type.is_single() && input_index >= tx.outputs.len() {
        return Ok(SIGHASH_SINGLE_BUG);
    }

    let blank_others = sighash_type.is_none() || sighash_type.is_single();

    let inputs: Vec<TxInput> = if sighash_type.anyone_can_pay() {
        let target = &tx.inputs[input_index];
        vec![TxInput {
            previous_output: target.previous_output,
            script_sig: script_code.to_vec(),
            sequence: target.sequence,
            witness: Vec::new(),
        }]
    } else {
        tx.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let is_target = i == input_index;
                TxInput {
                    previous_output: input.previous_output,
                    script_sig: if is_target {
                        script_code.to_vec()
                    } else {
                        Vec::new()
                    },
                    sequence: if is_target || !blank_others {
                        input.sequence
                    } else {
                        0
                    },
                    witness: Vec::new(),
                }
            })
            .collect()
    };

    let outputs: Vec<TxOutput> = if sighash_type.is_none() {
        Vec::new()
    } else if sighash_type.is_single() {
        tx.outputs[..=input_index]
            .iter()
            .enumerate()
            .map(|(i, output)| {
                if i == input_index {
                    output.clone()
                } else {
                    // Serialized as value -1 with an empty script.
                    TxOutput {
                        value: u64::MAX,
                        script_pubkey: Vec::new(),
                    }
                }
            })
            .collect()
    } else {
        tx.outputs.clone()
    };

    let stripped = Transaction {
        version: tx.version,
        inputs,
        outputs,
        lock_time: tx.lock_time,
    };

    let mut preimage = stripped.serialize_legacy();
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());
    Ok(sha256d(&preimage))
}

/// BIP-143 signature hash for a segwit v0 input.
pub fn segwit_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount_sat: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32], BtcError> {
    check_index(tx, input_index)?;

    let zero = [0u8; 32];
    let anyone_can_pay = sighash_type.anyone_can_pay();

    let hash_prevouts = if anyone_can_pay {
        zero
    } else {
        let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
        for input in &tx.inputs {
            buf.extend_from_slice(&input.previous_output.txid);
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
        }
        sha256d(&buf)
    };

    let hash_sequence =
        if anyone_can_pay || sighash_type.is_single() || sighash_type.is_none() {
            zero
        } else {
            let mut buf = Vec::with_capacity(tx.inputs.len() * 4);
            for input in &tx.inputs {
                buf.extend_from_slice(&input.sequence.to_le_bytes());
            }
            sha256d(&buf)
        };

    let hash_outputs = if !sighash_type.is_single() && !sighash_type.is_none() {
        let mut buf = Vec::new();
        for output in &tx.outputs {
            write_output(&mut buf, output);
        }
        sha256d(&buf)
    } else if sighash_type.is_single() && input_index < tx.outputs.len() {
        let mut buf = Vec::new();
        write_output(&mut buf, &tx.outputs[input_index]);
        sha256d(&buf)
    } else {
        zero
    };

    let input = &tx.inputs[input_index];

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&input.previous_output.txid);
    preimage.extend_from_slice(&input.previous_output.vout.to_le_bytes());
    write_var_bytes(&mut preimage, script_code);
    preimage.extend_from_slice(&amount_sat.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&sighash_type.to_u32().to_le_bytes());

    Ok(sha256d(&preimage))
}

fn check_index(tx: &Transaction, input_index: usize) -> Result<(), BtcError> {
    if input_index >= tx.inputs.len() {
        return Err(BtcError::SigningError(format!(
            "input index {input_index} out of bounds ({} inputs)",
            tx.inputs.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::p2wpkh_script;
    use crate::transaction::OutPoint;
    use bitcoin::hashes::Hash;
    use bitcoin::sighash::{EcdsaSighashType, SighashCache};

    const ALL_TYPES: [SighashType; 6] = [
        SighashType::All,
        SighashType::None,
        SighashType::Single,
        SighashType::AllPlusAnyoneCanPay,
        SighashType::NonePlusAnyoneCanPay,
        SighashType::SinglePlusAnyoneCanPay,
    ];

    fn sample_tx(outputs: usize) -> Transaction {
        let inputs = (0..3u8)
            .map(|i| {
                let mut input = TxInput::new(OutPoint {
                    txid: [0x10 + i; 32],
                    vout: i as u32,
                });
                input.sequence = 0xFFFF_FFF0 + i as u32;
                input
            })
            .collect();
        let outputs = (0..outputs)
            .map(|i| TxOutput {
                value: 10_000 * (i as u64 + 1),
                script_pubkey: p2pkh_script(&[i as u8; 20]),
            })
            .collect();
        let mut tx = Transaction::new_unsigned(inputs, outputs);
        tx.lock_time = 500;
        tx
    }

    fn as_bitcoin(tx: &Transaction) -> bitcoin::Transaction {
        bitcoin::consensus::deserialize(&tx.serialize()).unwrap()
    }

    #[test]
    fn sighash_byte_roundtrip() {
        for ty in ALL_TYPES {
            assert_eq!(SighashType::from_byte(ty.to_byte()).unwrap(), ty);
        }
        assert!(SighashType::from_byte(0x00).is_err());
        assert!(SighashType::from_byte(0x04).is_err());
        assert_eq!(SighashType::default(), SighashType::All);
    }

    #[test]
    fn legacy_matches_bitcoin_crate_for_every_type() {
        let tx = sample_tx(2);
        let btx = as_bitcoin(&tx);
        let cache = SighashCache::new(&btx);
        let script_code = p2pkh_script(&[0x77; 20]);

        for ty in ALL_TYPES {
            for index in 0..tx.inputs.len() {
                let ours = legacy_sighash(&tx, index, &script_code, ty).unwrap();
                let theirs = cache
                    .legacy_signature_hash(
                        index,
                        bitcoin::Script::from_bytes(&script_code),
                        ty.to_u32(),
                    )
                    .unwrap();
                assert_eq!(ours, theirs.to_byte_array(), "{ty:?} input {index}");
            }
        }
    }

    #[test]
    fn legacy_single_without_matching_output_is_one() {
        let tx = sample_tx(1);
        let digest = legacy_sighash(&tx, 2, &p2pkh_script(&[0; 20]), SighashType::Single).unwrap();
        assert_eq!(digest, SIGHASH_SINGLE_BUG);
        assert_eq!(digest[0], 1);
        assert!(digest[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn segwit_matches_bitcoin_crate_for_every_type() {
        let tx = sample_tx(2);
        let btx = as_bitcoin(&tx);
        let mut cache = SighashCache::new(&btx);
        let program = [0x42; 20];
        let spk = bitcoin::ScriptBuf::from_bytes(p2wpkh_script(&program));
        let script_code = p2wpkh_script_code(&program);

        for ty in ALL_TYPES {
            for index in 0..tx.inputs.len() {
                let amount = 50_000 + index as u64;
                let ours = segwit_v0_sighash(&tx, index, &script_code, amount, ty).unwrap();
                let theirs = cache
                    .p2wpkh_signature_hash(
                        index,
                        &spk,
                        bitcoin::Amount::from_sat(amount),
                        EcdsaSighashType::from_consensus(ty.to_u32()),
                    )
                    .unwrap();
                assert_eq!(ours, theirs.to_byte_array(), "{ty:?} input {index}");
            }
        }
    }

    #[test]
    fn bip143_native_p2wpkh_vector() {
        let unsigned = "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f0000000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa815988ac11000000";
        let tx = Transaction::from_hex(unsigned).unwrap();
        let spent = SpentOutput {
            script_type: ScriptType::P2wpkh,
            pubkey_hash: hex::decode("1d0f172a0ecb48aee1be1f2687d2963ae33f71a1")
                .unwrap()
                .try_into()
                .unwrap(),
            amount_sat: 600_000_000,
        };
        let digest = compute_sighash(&tx, 1, &spent, SighashType::All).unwrap();
        assert_eq!(
            hex::encode(digest),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );
    }

    #[test]
    fn compute_sighash_dispatches_on_script_type() {
        let tx = sample_tx(2);
        let hash = [0x42; 20];
        let legacy = SpentOutput {
            script_type: ScriptType::P2pkh,
            pubkey_hash: hash,
            amount_sat: 1_000,
        };
        let segwit = SpentOutput {
            script_type: ScriptType::P2wpkh,
            ..legacy
        };
        assert_eq!(
            compute_sighash(&tx, 0, &legacy, SighashType::All).unwrap(),
            legacy_sighash(&tx, 0, &p2pkh_script(&hash), SighashType::All).unwrap()
        );
        assert_eq!(
            compute_sighash(&tx, 0, &segwit, SighashType::All).unwrap(),
            segwit_v0_sighash(&tx, 0, &p2pkh_script(&hash), 1_000, SighashType::All).unwrap()
        );
    }

    #[test]
    fn segwit_digest_commits_to_amount() {
        let tx = sample_tx(2);
        let code = p2wpkh_script_code(&[1; 20]);
        let a = segwit_v0_sighash(&tx, 0, &code, 1_000, SighashType::All).unwrap();
        let b = segwit_v0_sighash(&tx, 0, &code, 1_001, SighashType::All).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_input_is_an_error() {
        let tx = sample_tx(2);
        let code = p2pkh_script(&[1; 20]);
        assert!(legacy_sighash(&tx, 3, &code, SighashType::All).is_err());
        assert!(segwit_v0_sighash(&tx, 3, &code, 1, SighashType::All).is_err());
    }

    #[test]
    fn spent_output_from_utxo() {
        let utxo = Utxo {
            txid: "ab".repeat(32),
            vout: 0,
            amount_sat: 7_000,
            script_pubkey_hex: hex::encode(p2wpkh_script(&[0x42; 20])),
        };
        let spent = SpentOutput::from_utxo(&utxo).unwrap();
        assert_eq!(spent.script_type, ScriptType::P2wpkh);
        assert_eq!(spent.pubkey_hash, [0x42; 20]);
        assert_eq!(spent.amount_sat, 7_000);
    }

    #[test]
    fn spent_output_rejects_unknown_and_garbage_scripts() {
        let mut utxo = Utxo {
            txid: "ab".repeat(32),
            vout: 0,
            amount_sat: 7_000,
            script_pubkey_hex: "a914".to_string() + &"01".repeat(20) + "87",
        };
        assert!(matches!(
            SpentOutput::from_utxo(&utxo).unwrap_err(),
            BtcError::UnsupportedScript(_)
        ));

        utxo.script_pubkey_hex = "not hex".into();
        assert!(matches!(
            SpentOutput::from_utxo(&utxo).unwrap_err(),
            BtcError::ScriptDecode(_)
        ));
    }
}
