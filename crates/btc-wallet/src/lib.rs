//! Send Bitcoin from a WIF key: fetch UTXOs from a provider, build and sign
//! with `btc-engine`, broadcast, and report the txid.

pub mod error;
pub mod sender;

pub use error::SendError;
pub use sender::{generate_address, Balance, SendReceipt, TransactionSender};
