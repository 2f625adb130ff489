use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Hash160: RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    ripemd.into()
}

/// Double SHA-256, the digest behind txids, sighashes, and Base58Check.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// First four bytes of the double SHA-256, as appended by Base58Check.
pub(crate) fn checksum(data: &[u8]) -> [u8; 4] {
    let digest = sha256d(data);
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&digest[..4]);
    checksum
}
