//! Chain access for the Bitcoin engine: UTXO lookup, locking-script recovery,
//! transaction broadcast and tip height over an Esplora-compatible REST API.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;

pub use client::EsploraClient;
pub use config::{Config, Credentials};
pub use error::ProviderError;
pub use provider::{AddressUtxo, ChainProvider, UtxoStatus};
