use bech32::{segwit, Hrp};

use crate::error::BtcError;
use crate::hashes::{checksum, hash160};
use crate::network::BtcNetwork;
use crate::script::{p2pkh_script, p2wpkh_script, ScriptType};

/// Human-readable parts of every network we know, used to route a string to
/// the bech32 decoder before trying Base58Check.
const KNOWN_HRPS: [&str; 3] = ["bc", "tb", "bcrt"];

/// A decoded destination, tagged with its script type at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    P2pkh {
        hash: [u8; 20],
        network: BtcNetwork,
    },
    P2wpkh {
        program: [u8; 20],
        network: BtcNetwork,
    },
}

impl Address {
    /// Parse a P2PKH or P2WPKH address for `network`.
    pub fn parse(address: &str, network: BtcNetwork) -> Result<Self, BtcError> {
        if looks_like_segwit(address) {
            let program = decode_p2wpkh(address, network)?;
            return Ok(Address::P2wpkh { program, network });
        }
        match decode_p2pkh(address, network) {
            Ok(hash) => Ok(Address::P2pkh { hash, network }),
            Err(BtcError::NotBase58(reason)) => Err(BtcError::UnsupportedAddressFormat(format!(
                "{address} is neither base58 P2PKH nor bech32 P2WPKH ({reason})"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Derive the address paying to a compressed public key.
    pub fn from_public_key(
        pubkey_bytes: &[u8; 33],
        script_type: ScriptType,
        network: BtcNetwork,
    ) -> Result<Self, BtcError> {
        if pubkey_bytes[0] != 0x02 && pubkey_bytes[0] != 0x03 {
            return Err(BtcError::InvalidPublicKey(
                "compressed key must start with 0x02 or 0x03".into(),
            ));
        }
        let hash = hash160(pubkey_bytes);
        Ok(match script_type {
            ScriptType::P2pkh => Address::P2pkh { hash, network },
            ScriptType::P2wpkh => Address::P2wpkh {
                program: hash,
                network,
            },
        })
    }

    pub fn script_type(&self) -> ScriptType {
        match self {
            Address::P2pkh { .. } => ScriptType::P2pkh,
            Address::P2wpkh { .. } => ScriptType::P2wpkh,
        }
    }

    pub fn network(&self) -> BtcNetwork {
        match self {
            Address::P2pkh { network, .. } | Address::P2wpkh { network, .. } => *network,
        }
    }

    /// The 20-byte public key hash (P2PKH) or witness program (P2WPKH).
    pub fn pubkey_hash(&self) -> &[u8; 20] {
        match self {
            Address::P2pkh { hash, .. } => hash,
            Address::P2wpkh { program, .. } => program,
        }
    }

    /// Locking script paying to this address. A P2WPKH address is used as
    /// `OP_0 <program>` directly; a P2PKH address builds the full template.
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self {
            Address::P2pkh { hash, .. } => p2pkh_script(hash),
            Address::P2wpkh { program, .. } => p2wpkh_script(program),
        }
    }

    /// Render the address string.
    pub fn encode(&self) -> Result<String, BtcError> {
        match self {
            Address::P2pkh { hash, network } => Ok(encode_p2pkh(hash, *network)),
            Address::P2wpkh { program, network } => encode_p2wpkh(program, *network),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = self.encode().map_err(|_| std::fmt::Error)?;
        f.write_str(&encoded)
    }
}

fn looks_like_segwit(address: &str) -> bool {
    let lower = address.to_lowercase();
    KNOWN_HRPS
        .iter()
        .any(|hrp| lower.starts_with(hrp) && lower[hrp.len()..].starts_with('1'))
}

/// Decode Base58Check and return the payload with the checksum stripped.
pub(crate) fn base58check_decode(encoded: &str) -> Result<Vec<u8>, BtcError> {
    let mut decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| BtcError::NotBase58(e.to_string()))?;

    if decoded.len() < 5 {
        return Err(BtcError::NotBase58(format!(
            "decoded length {} is too short for base58check",
            decoded.len()
        )));
    }

    let split = decoded.len() - 4;
    if decoded[split..] != checksum(&decoded[..split]) {
        return Err(BtcError::InvalidChecksum);
    }
    decoded.truncate(split);
    Ok(decoded)
}

/// Base58Check-encode `payload` (version byte already included).
pub(crate) fn base58check_encode(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Extract the 20-byte public key hash from a Base58Check P2PKH address.
pub fn decode_p2pkh(address: &str, network: BtcNetwork) -> Result<[u8; 20], BtcError> {
    let payload = base58check_decode(address)?;

    // 1 version byte + 20 hash bytes
    if payload.len() != 21 {
        return Err(BtcError::UnsupportedAddressFormat(format!(
            "expected 21-byte P2PKH payload, got {}",
            payload.len()
        )));
    }

    let expected = network.p2pkh_version();
    if payload[0] != expected {
        // P2SH and other Base58Check payloads are a format, not a network, mismatch.
        if !is_p2pkh_version(payload[0]) {
            return Err(BtcError::UnsupportedAddressFormat(format!(
                "version byte 0x{:02x} is not a P2PKH address",
                payload[0]
            )));
        }
        return Err(BtcError::InvalidVersion {
            expected,
            actual: payload[0],
        });
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..21]);
    Ok(hash)
}

fn is_p2pkh_version(version: u8) -> bool {
    version == BtcNetwork::Mainnet.p2pkh_version() || version == BtcNetwork::Testnet.p2pkh_version()
}

/// Decode a bech32 P2WPKH address into its 20-byte witness program.
///
/// Checksum and charset validation follow BIP-173 (and BIP-350 for v1+).
/// Only version 0 with a 20-byte program is accepted; P2WSH and taproot
/// programs decode correctly but are reported as unsupported.
pub fn decode_p2wpkh(address: &str, network: BtcNetwork) -> Result<[u8; 20], BtcError> {
    let (hrp, version, program) = segwit::decode(address).map_err(|e| {
        BtcError::UnsupportedAddressFormat(format!("invalid bech32 address {address}: {e}"))
    })?;

    let hrp = hrp.to_lowercase();
    if hrp != network.bech32_hrp() {
        return Err(BtcError::NetworkMismatch {
            expected: network.bech32_hrp().to_string(),
            actual: hrp,
        });
    }

    let version = version.to_u8();
    if version > 16 {
        return Err(BtcError::UnsupportedAddressFormat(format!(
            "invalid witness version {version}"
        )));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(BtcError::UnsupportedAddressFormat(format!(
            "invalid witness program length {}",
            program.len()
        )));
    }
    if version != 0 {
        return Err(BtcError::UnsupportedAddressFormat(format!(
            "witness version {version} is not supported"
        )));
    }
    if program.len() != 20 {
        return Err(BtcError::UnsupportedAddressFormat(format!(
            "v0 program of {} bytes is not P2WPKH",
            program.len()
        )));
    }

    let mut out = [0u8; 20];
    out.copy_from_slice(&program);
    Ok(out)
}

/// Encode a 20-byte public key hash as a Base58Check P2PKH address.
pub fn encode_p2pkh(hash: &[u8; 20], network: BtcNetwork) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(network.p2pkh_version());
    payload.extend_from_slice(hash);
    base58check_encode(&payload)
}

/// Encode a 20-byte witness program as a bech32 v0 address.
pub fn encode_p2wpkh(program: &[u8; 20], network: BtcNetwork) -> Result<String, BtcError> {
    let hrp = Hrp::parse(network.bech32_hrp())
        .map_err(|e| BtcError::UnsupportedAddressFormat(format!("invalid hrp: {e}")))?;
    segwit::encode_v0(hrp, program)
        .map_err(|e| BtcError::UnsupportedAddressFormat(format!("bech32 encoding failed: {e}")))
}

/// Validate an address string for the given network.
///
/// Returns `true` if the address is valid for `network`, `false` if it is a
/// well-formed address of a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, BtcError> {
    match Address::parse(address, network) {
        Ok(_) => Ok(true),
        Err(BtcError::InvalidVersion { .. }) | Err(BtcError::NetworkMismatch { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known test: privkey = 1 -> compressed pubkey
    const TEST_PUBKEY_HEX: &str =
        "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";

    fn test_pubkey() -> [u8; 33] {
        hex::decode(TEST_PUBKEY_HEX).unwrap().try_into().unwrap()
    }

    #[test]
    fn p2pkh_mainnet_test_vector() {
        let addr =
            Address::from_public_key(&test_pubkey(), ScriptType::P2pkh, BtcNetwork::Mainnet)
                .unwrap();
        assert_eq!(addr.to_string(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn p2wpkh_mainnet_test_vector() {
        let addr =
            Address::from_public_key(&test_pubkey(), ScriptType::P2wpkh, BtcNetwork::Mainnet)
                .unwrap();
        assert_eq!(addr.to_string(), "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn p2wpkh_testnet_test_vector() {
        let program = decode_p2wpkh(
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
            BtcNetwork::Testnet,
        )
        .unwrap();
        assert_eq!(program, hash160(&test_pubkey()));
    }

    #[test]
    fn decode_genesis_address() {
        let hash = decode_p2pkh("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Mainnet).unwrap();
        assert_eq!(
            hex::encode(hash),
            "62e907b15cbf27d5425399ebf6f0fb50ebb88f18"
        );
    }

    #[test]
    fn p2pkh_roundtrip() {
        for addr in [
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
        ] {
            let hash = decode_p2pkh(addr, BtcNetwork::Mainnet).unwrap();
            assert_eq!(encode_p2pkh(&hash, BtcNetwork::Mainnet), addr);
        }
    }

    #[test]
    fn testnet_p2pkh_roundtrip() {
        let encoded = encode_p2pkh(&[0x11; 20], BtcNetwork::Testnet);
        assert!(encoded.starts_with('m') || encoded.starts_with('n'));
        assert_eq!(decode_p2pkh(&encoded, BtcNetwork::Testnet).unwrap(), [0x11; 20]);
    }

    #[test]
    fn p2pkh_bad_checksum() {
        // Last character altered.
        let err = decode_p2pkh("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb", BtcNetwork::Mainnet)
            .unwrap_err();
        assert!(matches!(err, BtcError::InvalidChecksum));
    }

    #[test]
    fn p2pkh_wrong_network_version() {
        let err = decode_p2pkh("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Testnet)
            .unwrap_err();
        assert!(matches!(
            err,
            BtcError::InvalidVersion {
                expected: 0x6f,
                actual: 0x00
            }
        ));
    }

    #[test]
    fn p2pkh_not_base58() {
        let err = decode_p2pkh("0OIl-not-base58", BtcNetwork::Mainnet).unwrap_err();
        assert!(matches!(err, BtcError::NotBase58(_)));
    }

    #[test]
    fn p2wpkh_bad_checksum_rejected() {
        let err = decode_p2wpkh(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5",
            BtcNetwork::Mainnet,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn p2wpkh_wrong_network_rejected() {
        let err = decode_p2wpkh(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            BtcNetwork::Testnet,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::NetworkMismatch { .. }));
    }

    #[test]
    fn p2wsh_is_unsupported() {
        let err = decode_p2wpkh(
            "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3",
            BtcNetwork::Mainnet,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn taproot_is_unsupported() {
        let err = Address::parse(
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0",
            BtcNetwork::Mainnet,
        )
        .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn uppercase_bech32_accepted() {
        let program = decode_p2wpkh(
            "BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4",
            BtcNetwork::Mainnet,
        )
        .unwrap();
        assert_eq!(program, hash160(&test_pubkey()));
    }

    #[test]
    fn parse_dispatches_on_format() {
        let legacy = Address::parse("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Mainnet)
            .unwrap();
        assert_eq!(legacy.script_type(), ScriptType::P2pkh);
        assert_eq!(legacy.script_pubkey().len(), 25);

        let segwit = Address::parse(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            BtcNetwork::Mainnet,
        )
        .unwrap();
        assert_eq!(segwit.script_type(), ScriptType::P2wpkh);
        assert_eq!(
            hex::encode(segwit.script_pubkey()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn parse_garbage_is_unsupported() {
        let err = Address::parse("notanaddress!!!", BtcNetwork::Mainnet).unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn invalid_pubkey_prefix_rejected() {
        let mut bad = test_pubkey();
        bad[0] = 0x04; // uncompressed prefix
        assert!(Address::from_public_key(&bad, ScriptType::P2pkh, BtcNetwork::Mainnet).is_err());
    }

    #[test]
    fn validate_known_mainnet_address() {
        assert!(validate_address(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            BtcNetwork::Mainnet
        )
        .unwrap());
        assert!(validate_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Mainnet).unwrap());
    }

    #[test]
    fn validate_mainnet_address_on_testnet_returns_false() {
        assert!(!validate_address(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            BtcNetwork::Testnet
        )
        .unwrap());
        assert!(!validate_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Testnet).unwrap());
    }

    #[test]
    fn p2sh_is_unsupported_on_its_own_network() {
        let err = Address::parse("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", BtcNetwork::Mainnet)
            .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
        assert!(matches!(
            validate_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", BtcNetwork::Mainnet),
            Err(BtcError::UnsupportedAddressFormat(_))
        ));

        let mut payload = vec![0xc4];
        payload.extend_from_slice(&[0x33; 20]);
        let testnet_p2sh = base58check_encode(&payload);
        assert!(testnet_p2sh.starts_with('2'));
        let err = Address::parse(&testnet_p2sh, BtcNetwork::Testnet).unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn p2sh_on_the_other_network_is_unsupported() {
        let err = decode_p2pkh("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", BtcNetwork::Testnet)
            .unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedAddressFormat(_)));
    }

    #[test]
    fn validate_garbage_address_returns_error() {
        assert!(validate_address("notanaddress!!!", BtcNetwork::Mainnet).is_err());
    }

    #[test]
    fn signet_shares_testnet_encoding() {
        let a = encode_p2wpkh(&[0x22; 20], BtcNetwork::Signet).unwrap();
        let b = encode_p2wpkh(&[0x22; 20], BtcNetwork::Testnet).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("tb1q"));
    }
}
