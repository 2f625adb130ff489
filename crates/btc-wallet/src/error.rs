use btc_engine::BtcError;
use btc_provider::ProviderError;
use thiserror::Error;

/// Failure of a send, named after the stage that failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("decode failed: {0}")]
    Decode(BtcError),

    #[error("UTXO selection failed: {0}")]
    Select(BtcError),

    #[error("signing failed: {0}")]
    Sign(BtcError),

    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("no UTXOs available for {address}")]
    NoUtxos { address: String },
}

impl SendError {
    /// Classify an error raised while building and signing.
    pub(crate) fn from_build(e: BtcError) -> Self {
        match e {
            e if e.is_decode_error() => SendError::Decode(e),
            e @ (BtcError::InsufficientFunds { .. } | BtcError::TransactionBuildError(_)) => {
                SendError::Select(e)
            }
            e => SendError::Sign(e),
        }
    }
}
