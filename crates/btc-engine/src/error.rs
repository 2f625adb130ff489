use thiserror::Error;

/// Errors raised while decoding, building, or signing Bitcoin transactions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BtcError {
    #[error("invalid base58: {0}")]
    NotBase58(String),

    #[error("invalid checksum")]
    InvalidChecksum,

    #[error("invalid version byte: expected {expected:#04x}, got {actual:#04x}")]
    InvalidVersion { expected: u8, actual: u8 },

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("unsupported address format: {0}")]
    UnsupportedAddressFormat(String),

    #[error("network mismatch: expected {expected}, got {actual}")]
    NetworkMismatch { expected: String, actual: String },

    #[error("insufficient funds: available {available} sat, required {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("script decode error: {0}")]
    ScriptDecode(String),

    #[error("unsupported script: {0}")]
    UnsupportedScript(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("transaction decode error: {0}")]
    TransactionDecode(String),

    #[error("signing error: {0}")]
    SigningError(String),
}

impl BtcError {
    /// Whether this error stems from malformed textual input (base58, bech32,
    /// hex, WIF) rather than from selection or signing.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            BtcError::NotBase58(_)
                | BtcError::InvalidChecksum
                | BtcError::InvalidVersion { .. }
                | BtcError::InvalidWif(_)
                | BtcError::InvalidHex(_)
                | BtcError::UnsupportedAddressFormat(_)
                | BtcError::NetworkMismatch { .. }
                | BtcError::ScriptDecode(_)
                | BtcError::TransactionDecode(_)
        )
    }
}
