//! ECDSA signing over secp256k1 with low-S normalization and strict DER.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, VerifyingKey};

use crate::error::BtcError;
use crate::keys::KeyPair;
use crate::sighash::SighashType;

/// secp256k1 group order n, big-endian.
pub const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// floor(n / 2), big-endian.
pub const HALF_CURVE_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// DER tags.
const DER_SEQUENCE: u8 = 0x30;
const DER_INTEGER: u8 = 0x02;

/// An ECDSA signature as two big-endian scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl EcdsaSignature {
    /// Whether `s` is in the lower half of the order.
    pub fn is_low_s(&self) -> bool {
        self.s <= HALF_CURVE_ORDER
    }

    /// DER encoding with the sighash byte appended.
    pub fn to_der_with_sighash(&self, sighash_type: SighashType) -> Vec<u8> {
        encode_der(&self.r, &self.s, sighash_type)
    }
}

/// Sign a 32-byte digest with RFC 6979 deterministic nonces. The returned
/// signature always has a low `s`.
pub fn sign_digest(key: &KeyPair, digest: &[u8; 32]) -> Result<EcdsaSignature, BtcError> {
    let sig: Signature = key
        .signing_key()
        .sign_prehash(digest)
        .map_err(|e| BtcError::SigningError(format!("ECDSA signing failed: {e}")))?;

    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(EcdsaSignature {
        r,
        s: canonicalize(&s),
    })
}

/// Map `s` to `n - s` when it lies above n/2. Idempotent for `s < n`.
pub fn canonicalize(s: &[u8; 32]) -> [u8; 32] {
    if *s <= HALF_CURVE_ORDER {
        return *s;
    }

    let mut out = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut diff = CURVE_ORDER[i] as i16 - s[i] as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = diff as u8;
    }
    out
}

/// Strict DER encoding of `(r, s)` followed by the sighash byte.
pub fn encode_der(r: &[u8; 32], s: &[u8; 32], sighash_type: SighashType) -> Vec<u8> {
    let r = der_integer(r);
    let s = der_integer(s);

    let body_len = 2 + r.len() + 2 + s.len();
    let mut out = Vec::with_capacity(2 + body_len + 1);
    out.push(DER_SEQUENCE);
    out.push(body_len as u8);
    out.push(DER_INTEGER);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(DER_INTEGER);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);
    out.push(sighash_type.to_byte());
    out
}

/// Minimal big-endian integer, with a leading zero when the top bit is set.
fn der_integer(value: &[u8; 32]) -> Vec<u8> {
    let start = value.iter().position(|&b| b != 0).unwrap_or(31);
    let trimmed = &value[start..];
    let mut out = Vec::with_capacity(33);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Parse a DER signature with trailing sighash byte, as found in a
/// scriptSig or witness.
pub fn decode_der(bytes: &[u8]) -> Result<(EcdsaSignature, SighashType), BtcError> {
    let invalid = |reason: &str| BtcError::SigningError(format!("invalid DER signature: {reason}"));

    let (&sighash_byte, der) = bytes.split_last().ok_or_else(|| invalid("empty"))?;
    let sighash_type = SighashType::from_byte(sighash_byte)?;

    match der {
        [DER_SEQUENCE, len, body @ ..] if *len as usize == body.len() => {
            let (r, rest) = read_der_integer(body).map_err(|e| invalid(&format!("r: {e}")))?;
            let (s, rest) = read_der_integer(rest).map_err(|e| invalid(&format!("s: {e}")))?;
            if !rest.is_empty() {
                return Err(invalid("trailing bytes"));
            }
            Ok((EcdsaSignature { r, s }, sighash_type))
        }
        _ => Err(invalid("bad sequence header")),
    }
}

fn read_der_integer(bytes: &[u8]) -> Result<([u8; 32], &[u8]), &'static str> {
    let (len, rest) = match bytes {
        [DER_INTEGER, len, rest @ ..] => (*len as usize, rest),
        _ => return Err("missing integer tag"),
    };
    if len == 0 || len > 33 || len > rest.len() {
        return Err("bad integer length");
    }
    let (value, rest) = rest.split_at(len);
    if value[0] & 0x80 != 0 {
        return Err("negative integer");
    }
    if len > 1 && value[0] == 0 && value[1] & 0x80 == 0 {
        return Err("non-minimal integer");
    }
    if len == 33 && value[0] != 0 {
        return Err("integer exceeds 256 bits");
    }
    let value = if len == 33 { &value[1..] } else { value };
    let mut out = [0u8; 32];
    out[32 - value.len()..].copy_from_slice(value);
    Ok((out, rest))
}

/// Check a signature over `digest` against a compressed public key.
/// Malformed scalars verify as `false`.
pub fn verify_digest(
    pubkey: &[u8; 33],
    digest: &[u8; 32],
    signature: &EcdsaSignature,
) -> Result<bool, BtcError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(pubkey)
        .map_err(|e| BtcError::InvalidPublicKey(format!("not a secp256k1 point: {e}")))?;

    let mut raw = [0u8; 64];
    raw[..32].copy_from_slice(&signature.r);
    raw[32..].copy_from_slice(&signature.s);
    let Ok(sig) = Signature::from_slice(&raw) else {
        return Ok(false);
    };

    Ok(verifying_key.verify_prehash(digest, &sig).is_ok())
}
