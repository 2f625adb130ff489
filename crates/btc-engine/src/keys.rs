use k256::ecdsa::SigningKey;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::address::{base58check_encode, Address};
use crate::error::BtcError;
use crate::hashes::{checksum, hash160};
use crate::network::BtcNetwork;
use crate::script::ScriptType;

/// Minimum decoded WIF length: version + 32-byte scalar + 4-byte checksum.
const MIN_WIF_LEN: usize = 37;

/// Suffix marking a WIF key whose public key is used in compressed form.
const COMPRESSED_FLAG: u8 = 0x01;

/// Upper bound on rejection-sampling rounds when generating a key.
const MAX_GENERATE_ATTEMPTS: usize = 16;

/// A secp256k1 key pair held for the duration of one signing session.
///
/// The secret scalar lives inside the `SigningKey`, which zeroizes it on
/// drop. The public key is always the 33-byte compressed encoding.
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: [u8; 33],
    network: BtcNetwork,
    compressed: bool,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("network", &self.network)
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Build a key pair from a raw 32-byte scalar. Zero and values at or
    /// above the curve order are rejected.
    pub fn from_secret_bytes(
        secret: &[u8; 32],
        network: BtcNetwork,
        compressed: bool,
    ) -> Result<Self, BtcError> {
        let signing_key = SigningKey::from_bytes(secret.into())
            .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secp256k1 key: {e}")))?;
        let public_key = compressed_public_key(&signing_key)?;
        Ok(Self {
            signing_key,
            public_key,
            network,
            compressed,
        })
    }

    /// Import a WIF private key.
    pub fn from_wif(wif: &str) -> Result<Self, BtcError> {
        Self::from_wif_with_hint(wif).map(|(key, _)| key)
    }

    /// Import a WIF private key that may carry an Electrum-style script
    /// prefix (`p2pkh:`, `p2wpkh:`, `p2wpkh-p2sh:`, ...). Any prefix is
    /// stripped; `p2pkh` and `p2wpkh` are returned as the script type the
    /// key is meant to spend, other prefixes give no hint.
    pub fn from_wif_with_hint(wif: &str) -> Result<(Self, Option<ScriptType>), BtcError> {
        let (hint, body) = split_script_prefix(wif.trim());

        let decoded = Zeroizing::new(
            bs58::decode(body)
                .into_vec()
                .map_err(|e| BtcError::InvalidWif(format!("invalid base58: {e}")))?,
        );

        if decoded.len() < MIN_WIF_LEN {
            return Err(BtcError::InvalidWif(format!(
                "expected at least {MIN_WIF_LEN} bytes, got {}",
                decoded.len()
            )));
        }

        let split = decoded.len() - 4;
        if decoded[split..] != checksum(&decoded[..split]) {
            return Err(BtcError::InvalidChecksum);
        }
        let payload = &decoded[..split];

        let network = match payload[0] {
            v if v == BtcNetwork::Mainnet.wif_version() => BtcNetwork::Mainnet,
            v if v == BtcNetwork::Testnet.wif_version() => BtcNetwork::Testnet,
            other => {
                return Err(BtcError::InvalidWif(format!(
                    "unknown version byte {other:#04x}"
                )))
            }
        };

        let compressed = match payload.len() {
            33 => false,
            34 if payload[33] == COMPRESSED_FLAG => true,
            len => {
                return Err(BtcError::InvalidWif(format!(
                    "unexpected payload length {len}"
                )))
            }
        };

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&payload[1..33]);

        let key = Self::from_secret_bytes(&secret, network, compressed)?;
        Ok((key, hint))
    }

    /// Generate a fresh key from the OS RNG.
    pub fn random(network: BtcNetwork) -> Result<Self, BtcError> {
        let mut secret = Zeroizing::new([0u8; 32]);
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            OsRng
                .try_fill_bytes(&mut secret[..])
                .map_err(|e| BtcError::SigningError(format!("OS RNG failure: {e}")))?;
            // Rejects 0 and values >= n; retry with fresh bytes.
            if let Ok(key) = Self::from_secret_bytes(&secret, network, true) {
                return Ok(key);
            }
        }
        Err(BtcError::SigningError(
            "could not sample a valid secp256k1 scalar".into(),
        ))
    }

    /// Export as WIF, preserving the network and compression flag.
    pub fn to_wif(&self) -> Zeroizing<String> {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(self.network.wif_version());
        payload.extend_from_slice(&self.signing_key.to_bytes());
        if self.compressed {
            payload.push(COMPRESSED_FLAG);
        }
        Zeroizing::new(base58check_encode(&payload))
    }

    /// 33-byte compressed SEC1 public key.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.public_key)
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    /// Whether the WIF carried the compressed-public-key marker.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Re-tag the key for a network sharing its WIF version byte (signet and
    /// regtest keys are encoded exactly like testnet keys).
    pub fn for_network(mut self, network: BtcNetwork) -> Result<Self, BtcError> {
        if network.wif_version() != self.network.wif_version() {
            return Err(BtcError::NetworkMismatch {
                expected: network.to_string(),
                actual: self.network.to_string(),
            });
        }
        self.network = network;
        Ok(self)
    }

    /// The address of the requested type controlled by this key.
    pub fn address(&self, script_type: ScriptType) -> Result<Address, BtcError> {
        Address::from_public_key(&self.public_key, script_type, self.network)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// Derive the compressed public key for a 32-byte secret scalar.
pub fn derive_public_key(secret: &[u8; 32]) -> Result<[u8; 33], BtcError> {
    let signing_key = SigningKey::from_bytes(secret.into())
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secp256k1 key: {e}")))?;
    compressed_public_key(&signing_key)
}

/// Generate a new key and return its address together with the WIF export.
pub fn generate_random(
    network: BtcNetwork,
    script_type: ScriptType,
) -> Result<(Address, Zeroizing<String>), BtcError> {
    let key = KeyPair::random(network)?;
    let address = key.address(script_type)?;
    Ok((address, key.to_wif()))
}

fn compressed_public_key(signing_key: &SigningKey) -> Result<[u8; 33], BtcError> {
    signing_key
        .verifying_key()
        .to_sec1_bytes()
        .as_ref()
        .try_into()
        .map_err(|_| BtcError::InvalidPublicKey("unexpected public key length".into()))
}

fn split_script_prefix(wif: &str) -> (Option<ScriptType>, &str) {
    match wif.split_once(':') {
        None => (None, wif),
        Some(("p2pkh", body)) => (Some(ScriptType::P2pkh), body),
        Some(("p2wpkh", body)) => (Some(ScriptType::P2wpkh), body),
        Some((_, body)) => (None, body),
    }
}
