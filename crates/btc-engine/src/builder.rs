//! End-to-end construction of a signed payment from a key and its UTXOs.

use tracing::{debug, info};

use crate::address::Address;
use crate::error::BtcError;
use crate::keys::KeyPair;
use crate::network::BtcNetwork;
use crate::sighash::{compute_sighash, SighashType, SpentOutput};
use crate::signature::sign_digest;
use crate::transaction::{Transaction, TxInput, TxOutput};
use crate::utxo::{select_utxos, Utxo, UtxoSelection};

/// A payment of `amount_sat` from `from` to `to`, paying `fee_sat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub from: Address,
    pub to: Address,
    pub amount_sat: u64,
    pub fee_sat: u64,
}

impl SendRequest {
    /// Parse both addresses for `network`.
    pub fn parse(
        from: &str,
        to: &str,
        amount_sat: u64,
        fee_sat: u64,
        network: BtcNetwork,
    ) -> Result<Self, BtcError> {
        Ok(Self {
            from: Address::parse(from, network)?,
            to: Address::parse(to, network)?,
            amount_sat,
            fee_sat,
        })
    }
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx: Transaction,
    /// Wire serialization of `tx`.
    pub raw: Vec<u8>,
    /// Display-order txid.
    pub txid: String,
    pub selection: UtxoSelection,
}

impl SignedTransaction {
    /// Lowercase hex of the wire bytes, as posted to a provider.
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Select inputs, build the receiver and change outputs, sign every input
/// with `SIGHASH_ALL`, and serialize.
///
/// Either every input is signed or an error is returned; no partially
/// signed transaction escapes.
pub fn build_signed_transaction(
    request: &SendRequest,
    key: &KeyPair,
    utxos: &[Utxo],
) -> Result<SignedTransaction, BtcError> {
    if request.amount_sat == 0 {
        return Err(BtcError::TransactionBuildError(
            "amount must be greater than zero".into(),
        ));
    }
    if request.from.network() != request.to.network() {
        return Err(BtcError::NetworkMismatch {
            expected: request.from.network().to_string(),
            actual: request.to.network().to_string(),
        });
    }
    if *request.from.pubkey_hash() != key.hash160() {
        return Err(BtcError::SigningError(format!(
            "sender address {} is not controlled by the signing key",
            request.from
        )));
    }

    let selection = select_utxos(utxos, request.amount_sat, request.fee_sat)?;
    debug!(
        inputs = selection.selected.len(),
        total_sat = selection.total_sat,
        change_sat = selection.change_sat,
        "selected UTXOs"
    );

    let mut outputs = vec![TxOutput {
        value: request.amount_sat,
        script_pubkey: request.to.script_pubkey(),
    }];
    if selection.has_change() {
        outputs.push(TxOutput {
            value: selection.change_sat,
            script_pubkey: request.from.script_pubkey(),
        });
    }

    let mut inputs = Vec::with_capacity(selection.selected.len());
    let mut spent = Vec::with_capacity(selection.selected.len());
    for utxo in &selection.selected {
        inputs.push(TxInput::new(utxo.outpoint()?));
        spent.push(SpentOutput::from_utxo(utxo)?);
    }

    let mut tx = Transaction::new_unsigned(inputs, outputs);
    sign_transaction(&mut tx, &spent, key, SighashType::All)?;

    let raw = tx.serialize();
    let txid = tx.txid();
    info!(
        %txid,
        inputs = tx.inputs.len(),
        outputs = tx.outputs.len(),
        vsize = tx.vsize(),
        fee_sat = request.fee_sat,
        "built signed transaction"
    );

    Ok(SignedTransaction {
        tx,
        raw,
        txid,
        selection,
    })
}

/// Sign every input of `tx`. `spent[i]` describes the output spent by input
/// `i`; each must be locked to `key`.
pub fn sign_transaction(
    tx: &mut Transaction,
    spent: &[SpentOutput],
    key: &KeyPair,
    sighash_type: SighashType,
) -> Result<(), BtcError> {
    if spent.len() != tx.inputs.len() {
        return Err(BtcError::SigningError(format!(
            "{} spent outputs supplied for {} inputs",
            spent.len(),
            tx.inputs.len()
        )));
    }

    let key_hash = key.hash160();
    for (index, prevout) in spent.iter().enumerate() {
        if prevout.pubkey_hash != key_hash {
            return Err(BtcError::SigningError(format!(
                "input {index} is locked to {}, not to the signing key",
                hex::encode(prevout.pubkey_hash)
            )));
        }

        let digest = compute_sighash(tx, index, prevout, sighash_type)?;
        let signature = sign_digest(key, &digest)?;
        let encoded = signature.to_der_with_sighash(sighash_type);
        tx.attach_signature(index, &encoded, key.public_key(), prevout.script_type)?;
        debug!(index, script_type = %prevout.script_type, "signed input");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{p2pkh_script, p2wpkh_script, ScriptType};
    use crate::signature::{decode_der, verify_digest};
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::{Message, Secp256k1};
    use bitcoin::sighash::{EcdsaSighashType, SighashCache};

    const NET: BtcNetwork = BtcNetwork::Testnet;
    const RECEIVER: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

    fn key() -> KeyPair {
        KeyPair::from_secret_bytes(&[0x11; 32], NET, true).unwrap()
    }

    fn utxo_for(script: Vec<u8>, txid_byte: u8, vout: u32, amount_sat: u64) -> Utxo {
        Utxo {
            txid: hex::encode([txid_byte; 32]),
            vout,
            amount_sat,
            script_pubkey_hex: hex::encode(script),
        }
    }

    fn request(key: &KeyPair, script_type: ScriptType, amount: u64, fee: u64) -> SendRequest {
        SendRequest {
            from: key.address(script_type).unwrap(),
            to: Address::parse(RECEIVER, NET).unwrap(),
            amount_sat: amount,
            fee_sat: fee,
        }
    }

    #[test]
    fn segwit_payment_with_change() {
        let key = key();
        let utxos = vec![utxo_for(p2wpkh_script(&key.hash160()), 0xaa, 0, 5_000)];
        let req = request(&key, ScriptType::P2wpkh, 1_000, 200);

        let signed = build_signed_transaction(&req, &key, &utxos).unwrap();

        assert_eq!(signed.selection.selected.len(), 1);
        assert_eq!(signed.selection.total_sat, 5_000);
        assert_eq!(signed.selection.change_sat, 3_800);
        assert_eq!(signed.tx.outputs.len(), 2);
        assert_eq!(signed.tx.outputs[0].value, 1_000);
        assert_eq!(signed.tx.outputs[0].script_pubkey, req.to.script_pubkey());
        assert_eq!(signed.tx.outputs[1].value, 3_800);
        assert_eq!(signed.tx.outputs[1].script_pubkey, p2wpkh_script(&key.hash160()));

        let input = &signed.tx.inputs[0];
        assert!(input.script_sig.is_empty());
        assert_eq!(input.witness.len(), 2);
        assert_eq!(input.witness[1], key.public_key().to_vec());

        assert_eq!(signed.raw, signed.tx.serialize());
        assert_eq!(signed.txid, signed.tx.txid());
        assert_eq!(signed.raw_hex(), hex::encode(&signed.raw));
    }

    #[test]
    fn segwit_signature_verifies_with_bitcoin_crate() {
        let key = key();
        let utxos = vec![
            utxo_for(p2wpkh_script(&key.hash160()), 0xaa, 0, 3_000),
            utxo_for(p2wpkh_script(&key.hash160()), 0xbb, 1, 4_000),
        ];
        let req = request(&key, ScriptType::P2wpkh, 5_000, 300);
        let signed = build_signed_transaction(&req, &key, &utxos).unwrap();

        let btx: bitcoin::Transaction = bitcoin::consensus::deserialize(&signed.raw).unwrap();
        assert_eq!(btx.compute_txid().to_string(), signed.txid);
        assert_eq!(bitcoin::consensus::serialize(&btx), signed.raw);

        let secp = Secp256k1::verification_only();
        let pubkey = bitcoin::secp256k1::PublicKey::from_slice(key.public_key()).unwrap();
        let spk = bitcoin::ScriptBuf::from_bytes(p2wpkh_script(&key.hash160()));
        let mut cache = SighashCache::new(&btx);
        for (index, utxo) in utxos.iter().enumerate() {
            let sighash = cache
                .p2wpkh_signature_hash(
                    index,
                    &spk,
                    bitcoin::Amount::from_sat(utxo.amount_sat),
                    EcdsaSighashType::All,
                )
                .unwrap();
            let sig = bitcoin::ecdsa::Signature::from_slice(&btx.input[index].witness[0]).unwrap();
            assert_eq!(sig.sighash_type, EcdsaSighashType::All);
            let msg = Message::from_digest(sighash.to_byte_array());
            secp.verify_ecdsa(&msg, &sig.signature, &pubkey).unwrap();
        }
    }

    #[test]
    fn legacy_payment_uses_script_sig() {
        let key = key();
        let utxos = vec![utxo_for(p2pkh_script(&key.hash160()), 0xcc, 2, 10_000)];
        let req = request(&key, ScriptType::P2pkh, 4_000, 500);
        let signed = build_signed_transaction(&req, &key, &utxos).unwrap();

        let input = &signed.tx.inputs[0];
        assert!(input.witness.is_empty());
        assert!(!input.script_sig.is_empty());
        assert!(!signed.tx.has_witness());
        assert_eq!(signed.tx.outputs[1].script_pubkey, p2pkh_script(&key.hash160()));
        // No marker/flag: byte 4 is the input count.
        assert_eq!(signed.raw[4], 1);

        // scriptSig = <sig> <pubkey>
        let sig_len = input.script_sig[0] as usize;
        let sig_with_type = &input.script_sig[1..1 + sig_len];
        assert_eq!(input.script_sig[1 + sig_len], 33);
        assert_eq!(&input.script_sig[2 + sig_len..], key.public_key());

        let (sig, ty) = decode_der(sig_with_type).unwrap();
        assert_eq!(ty, SighashType::All);
        let spent = SpentOutput::from_utxo(&utxos[0]).unwrap();
        let digest = compute_sighash(&signed.tx, 0, &spent, SighashType::All).unwrap();
        assert!(verify_digest(key.public_key(), &digest, &sig).unwrap());

        let btx: bitcoin::Transaction = bitcoin::consensus::deserialize(&signed.raw).unwrap();
        let theirs = SighashCache::new(&btx)
            .legacy_signature_hash(0, bitcoin::Script::from_bytes(&p2pkh_script(&key.hash160())), 1)
            .unwrap();
        assert_eq!(digest, theirs.to_byte_array());
    }

    #[test]
    fn mixed_inputs_sign_by_their_own_type() {
        let key = key();
        let utxos = vec![
            utxo_for(p2pkh_script(&key.hash160()), 0x01, 0, 2_000),
            utxo_for(p2wpkh_script(&key.hash160()), 0x02, 0, 2_000),
        ];
        let req = request(&key, ScriptType::P2wpkh, 3_000, 100);
        let signed = build_signed_transaction(&req, &key, &utxos).unwrap();

        assert!(!signed.tx.inputs[0].script_sig.is_empty());
        assert!(signed.tx.inputs[0].witness.is_empty());
        assert!(signed.tx.inputs[1].script_sig.is_empty());
        assert_eq!(signed.tx.inputs[1].witness.len(), 2);
        assert_eq!(Transaction::deserialize(&signed.raw).unwrap(), signed.tx);
    }

    #[test]
    fn exact_amount_omits_change() {
        let key = key();
        let utxos = vec![utxo_for(p2wpkh_script(&key.hash160()), 0xaa, 0, 1_200)];
        let req = request(&key, ScriptType::P2wpkh, 1_000, 200);
        let signed = build_signed_transaction(&req, &key, &utxos).unwrap();
        assert_eq!(signed.tx.outputs.len(), 1);
    }

    #[test]
    fn insufficient_funds_propagates() {
        let key = key();
        let utxos = vec![utxo_for(p2wpkh_script(&key.hash160()), 0xaa, 0, 500)];
        let req = request(&key, ScriptType::P2wpkh, 1_000, 200);
        let err = build_signed_transaction(&req, &key, &utxos).unwrap_err();
        assert_eq!(
            err,
            BtcError::InsufficientFunds {
                available: 500,
                required: 1_200
            }
        );
    }

    #[test]
    fn sender_must_belong_to_key() {
        let key = key();
        let other = KeyPair::from_secret_bytes(&[0x22; 32], NET, true).unwrap();
        let utxos = vec![utxo_for(p2wpkh_script(&other.hash160()), 0xaa, 0, 5_000)];
        let req = request(&other, ScriptType::P2wpkh, 1_000, 200);
        let err = build_signed_transaction(&req, &key, &utxos).unwrap_err();
        assert!(matches!(err, BtcError::SigningError(_)));
    }

    #[test]
    fn foreign_utxo_is_rejected() {
        let key = key();
        let other = KeyPair::from_secret_bytes(&[0x22; 32], NET, true).unwrap();
        let utxos = vec![utxo_for(p2wpkh_script(&other.hash160()), 0xaa, 0, 5_000)];
        let req = request(&key, ScriptType::P2wpkh, 1_000, 200);
        let err = build_signed_transaction(&req, &key, &utxos).unwrap_err();
        assert!(matches!(err, BtcError::SigningError(_)));
    }

    #[test]
    fn unsupported_prevout_script_is_rejected() {
        let key = key();
        let mut p2sh = vec![0xa9, 0x14];
        p2sh.extend_from_slice(&key.hash160());
        p2sh.push(0x87);
        let utxos = vec![utxo_for(p2sh, 0xaa, 0, 5_000)];
        let req = request(&key, ScriptType::P2wpkh, 1_000, 200);
        let err = build_signed_transaction(&req, &key, &utxos).unwrap_err();
        assert!(matches!(err, BtcError::UnsupportedScript(_)));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let key = key();
        let utxos = vec![utxo_for(p2wpkh_script(&key.hash160()), 0xaa, 0, 5_000)];
        let req = request(&key, ScriptType::P2wpkh, 0, 200);
        assert!(matches!(
            build_signed_transaction(&req, &key, &utxos).unwrap_err(),
            BtcError::TransactionBuildError(_)
        ));
    }

    #[test]
    fn request_parse_rejects_wrong_network() {
        let err = SendRequest::parse(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            RECEIVER,
            1,
            1,
            NET,
        )
        .unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn sign_transaction_checks_prevout_count() {
        let key = key();
        let mut tx = Transaction::new_unsigned(
            vec![TxInput::new(crate::transaction::OutPoint {
                txid: [1; 32],
                vout: 0,
            })],
            vec![],
        );
        let err = sign_transaction(&mut tx, &[], &key, SighashType::All).unwrap_err();
        assert!(matches!(err, BtcError::SigningError(_)));
    }
}
