//! Locking and unlocking script templates for P2PKH and P2WPKH.

use crate::error::BtcError;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// The two spendable output templates this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    P2pkh,
    P2wpkh,
}

impl ScriptType {
    /// Whether inputs spending this type carry their signature in the witness.
    pub fn is_segwit(self) -> bool {
        matches!(self, ScriptType::P2wpkh)
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptType::P2pkh => write!(f, "p2pkh"),
            ScriptType::P2wpkh => write!(f, "p2wpkh"),
        }
    }
}

/// Build a P2PKH scriptPubKey: OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(0x14); // Push 20 bytes
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Build a P2WPKH scriptPubKey: OP_0 <20-byte program>
pub fn p2wpkh_script(program: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.push(OP_0);
    script.push(0x14);
    script.extend_from_slice(program);
    script
}

/// BIP-143 scriptCode for a P2WPKH input. It is the P2PKH template over the
/// witness program; the length prefix is added during digest serialization.
pub fn p2wpkh_script_code(program: &[u8; 20]) -> Vec<u8> {
    p2pkh_script(program)
}

/// Append a minimal data push of `data` to `script`.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) -> Result<(), BtcError> {
    match data.len() {
        len @ 0..=0x4b => script.push(len as u8),
        len @ 0x4c..=0xff => {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            return Err(BtcError::TransactionBuildError(format!(
                "push of {len} bytes exceeds the script element limit"
            )))
        }
    }
    script.extend_from_slice(data);
    Ok(())
}

/// Legacy P2PKH scriptSig: <sig+hashtype> <pubkey>
pub fn legacy_unlocking_script(
    signature_with_type: &[u8],
    pubkey: &[u8; 33],
) -> Result<Vec<u8>, BtcError> {
    let mut script = Vec::with_capacity(signature_with_type.len() + pubkey.len() + 2);
    push_data(&mut script, signature_with_type)?;
    push_data(&mut script, pubkey)?;
    Ok(script)
}

/// P2WPKH witness: exactly [sig+hashtype, pubkey].
pub fn witness_stack(signature_with_type: &[u8], pubkey: &[u8; 33]) -> Vec<Vec<u8>> {
    vec![signature_with_type.to_vec(), pubkey.to_vec()]
}

/// Recognise one of the supported templates and return its 20-byte hash.
pub fn classify(script: &[u8]) -> Option<(ScriptType, [u8; 20])> {
    let mut hash = [0u8; 20];
    match script {
        [OP_DUP, OP_HASH160, 0x14, body @ .., OP_EQUALVERIFY, OP_CHECKSIG] if body.len() == 20 => {
            hash.copy_from_slice(body);
            Some((ScriptType::P2pkh, hash))
        }
        [OP_0, 0x14, body @ ..] if body.len() == 20 => {
            hash.copy_from_slice(body);
            Some((ScriptType::P2wpkh, hash))
        }
        _ => None,
    }
}

/// Decode a hex scriptPubKey as delivered by the provider.
pub fn decode_script_hex(script_hex: &str) -> Result<Vec<u8>, BtcError> {
    hex::decode(script_hex)
        .map_err(|e| BtcError::ScriptDecode(format!("invalid script hex {script_hex:?}: {e}")))
}
