//! Bitcoin transaction construction and signing.
//!
//! Decodes P2PKH and P2WPKH addresses and WIF keys, selects UTXOs first-fit,
//! builds locking/unlocking scripts, computes legacy and BIP-143 signature
//! hashes, signs with low-S ECDSA, and serializes transactions in the wire
//! format. Nothing here touches the network; UTXOs are supplied by the caller.

pub mod address;
pub mod builder;
pub mod error;
pub mod hashes;
pub mod keys;
pub mod network;
pub mod script;
pub mod sighash;
pub mod signature;
pub mod transaction;
pub mod utxo;

pub use address::Address;
pub use builder::{build_signed_transaction, SendRequest, SignedTransaction};
pub use error::BtcError;
pub use keys::KeyPair;
pub use network::BtcNetwork;
pub use script::ScriptType;
pub use sighash::SighashType;
pub use transaction::Transaction;
pub use utxo::{Utxo, UtxoSelection};
