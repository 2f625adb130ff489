use crate::error::BtcError;
use crate::hashes::sha256d;
use crate::script::{legacy_unlocking_script, witness_stack, ScriptType};

/// Transaction version used for newly built transactions.
pub const TX_VERSION: i32 = 2;

/// Non-final sequence that opts the input in to replace-by-fee and leaves
/// relative lock-times disabled.
pub const SEQUENCE_ENABLE_RBF: u32 = 0xFFFF_FFFD;

/// Segwit serialization marker and flag, placed after the version.
const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// Reference to a previous transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Previous transaction hash in internal (little-endian) byte order.
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    /// Build an outpoint from a display-order (big-endian) txid hex string.
    pub fn from_hex(txid_hex: &str, vout: u32) -> Result<Self, BtcError> {
        Ok(Self {
            txid: parse_txid(txid_hex)?,
            vout,
        })
    }

    /// The txid in display order.
    pub fn txid_hex(&self) -> String {
        display_hex(&self.txid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub previous_output: OutPoint,
    /// Unlocking script; empty until signed, and always empty for segwit.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// Witness stack; empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    /// An unsigned input spending `previous_output`.
    pub fn new(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script_sig: Vec::new(),
            sequence: SEQUENCE_ENABLE_RBF,
            witness: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// A Bitcoin transaction in its typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Assemble an unsigned transaction: version 2, lock time 0. Inputs keep
    /// whatever sequence they were created with.
    pub fn new_unsigned(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Place a signature and public key on an input.
    ///
    /// Legacy inputs get a scriptSig; segwit inputs get an empty scriptSig
    /// and a two-element witness.
    pub fn attach_signature(
        &mut self,
        input_index: usize,
        signature_with_type: &[u8],
        pubkey: &[u8; 33],
        script_type: ScriptType,
    ) -> Result<(), BtcError> {
        let input_count = self.inputs.len();
        let input = self.inputs.get_mut(input_index).ok_or_else(|| {
            BtcError::TransactionBuildError(format!(
                "input index {input_index} out of bounds ({input_count} inputs)"
            ))
        })?;

        match script_type {
            ScriptType::P2pkh => {
                input.script_sig = legacy_unlocking_script(signature_with_type, pubkey)?;
                input.witness.clear();
            }
            ScriptType::P2wpkh => {
                input.script_sig.clear();
                input.witness = witness_stack(signature_with_type, pubkey);
            }
        }
        Ok(())
    }

    /// Wire serialization. Uses the segwit layout (marker, flag, witnesses)
    /// when any input carries a witness.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        self.encode_into(&mut buf, self.has_witness());
        buf
    }

    /// Serialization without witness data, as hashed for the txid.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        self.encode_into(&mut buf, false);
        buf
    }

    /// Lowercase hex of [`Transaction::serialize`], as posted to providers.
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Transaction id in internal byte order.
    pub fn txid_bytes(&self) -> [u8; 32] {
        sha256d(&self.serialize_legacy())
    }

    /// Transaction id in display order. Witness data never contributes.
    pub fn txid(&self) -> String {
        display_hex(&self.txid_bytes())
    }

    /// Witness transaction id in display order (equals the txid when the
    /// transaction has no witness).
    pub fn wtxid(&self) -> String {
        display_hex(&sha256d(&self.serialize()))
    }

    /// BIP-141 weight: base size * 3 + total size.
    pub fn weight(&self) -> usize {
        self.serialize_legacy().len() * 3 + self.serialize().len()
    }

    /// Virtual size in vbytes, rounded up.
    pub fn vsize(&self) -> usize {
        self.weight().div_ceil(4)
    }

    fn encode_into(&self, buf: &mut Vec<u8>, include_witness: bool) {
        buf.extend_from_slice(&self.version.to_le_bytes());

        if include_witness {
            buf.push(SEGWIT_MARKER);
            buf.push(SEGWIT_FLAG);
        }

        write_compact_size(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(&input.previous_output.txid);
            buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            write_var_bytes(buf, &input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            write_output(buf, output);
        }

        if include_witness {
            for input in &self.inputs {
                write_compact_size(buf, input.witness.len() as u64);
                for item in &input.witness {
                    write_var_bytes(buf, item);
                }
            }
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    /// Parse a wire-format transaction, legacy or segwit.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BtcError> {
        let mut reader = Reader::new(bytes);

        let version = reader.read_i32_le()?;

        let segwit = matches!(reader.peek(2), Some([SEGWIT_MARKER, SEGWIT_FLAG]));
        if segwit {
            reader.take(2)?;
        }

        let input_count = reader.read_compact_size()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            let mut txid = [0u8; 32];
            txid.copy_from_slice(reader.take(32)?);
            let vout = reader.read_u32_le()?;
            let script_sig = reader.read_var_bytes()?.to_vec();
            let sequence = reader.read_u32_le()?;
            inputs.push(TxInput {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = reader.read_compact_size()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            let value = reader.read_u64_le()?;
            let script_pubkey = reader.read_var_bytes()?.to_vec();
            outputs.push(TxOutput {
                value,
                script_pubkey,
            });
        }

        if segwit {
            for input in inputs.iter_mut() {
                let items = reader.read_compact_size()?;
                for _ in 0..items {
                    input.witness.push(reader.read_var_bytes()?.to_vec());
                }
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(BtcError::TransactionDecode(
                    "segwit marker present but no witness data".into(),
                ));
            }
        }

        let lock_time = reader.read_u32_le()?;

        if !reader.is_empty() {
            return Err(BtcError::TransactionDecode(format!(
                "{} trailing bytes after lock time",
                reader.remaining()
            )));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Parse a hex-encoded wire transaction.
    pub fn from_hex(tx_hex: &str) -> Result<Self, BtcError> {
        let bytes = hex::decode(tx_hex.trim())
            .map_err(|e| BtcError::InvalidHex(format!("invalid transaction hex: {e}")))?;
        Self::deserialize(&bytes)
    }
}

/// Serialize one output: 8-byte LE value followed by the length-prefixed script.
pub(crate) fn write_output(buf: &mut Vec<u8>, output: &TxOutput) {
    buf.extend_from_slice(&output.value.to_le_bytes());
    write_var_bytes(buf, &output.script_pubkey);
}

/// Write a Bitcoin-style CompactSize (variable-length integer).
pub fn write_compact_size(buf: &mut Vec<u8>, val: u64) {
    if val < 0xFD {
        buf.push(val as u8);
    } else if val <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(val as u16).to_le_bytes());
    } else if val <= 0xFFFFFFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(val as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&val.to_le_bytes());
    }
}

/// Write a CompactSize length prefix followed by the bytes.
pub(crate) fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_compact_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

/// Parse a hex txid string (big-endian display) to internal byte order (little-endian).
pub fn parse_txid(txid_hex: &str) -> Result<[u8; 32], BtcError> {
    let bytes = hex::decode(txid_hex)
        .map_err(|e| BtcError::InvalidHex(format!("invalid txid hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(BtcError::InvalidHex(format!(
            "txid must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut result = [0u8; 32];
    // Reverse to internal byte order
    for (i, &b) in bytes.iter().rev().enumerate() {
        result[i] = b;
    }
    Ok(result)
}

/// Hex of a 32-byte hash in display (reversed) order.
fn display_hex(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Bounds-checked cursor over a byte slice.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn peek(&self, n: usize) -> Option<&'a [u8]> {
        self.bytes.get(self.pos..self.pos + n)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BtcError> {
        if n > self.remaining() {
            return Err(BtcError::TransactionDecode(format!(
                "unexpected end of data: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BtcError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, BtcError> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u32_le(&mut self) -> Result<u32, BtcError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32_le(&mut self) -> Result<i32, BtcError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_u64_le(&mut self) -> Result<u64, BtcError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_compact_size(&mut self) -> Result<u64, BtcError> {
        let (value, min) = match self.read_u8()? {
            0xFD => (u16::from_le_bytes(self.read_array()?) as u64, 0xFD),
            0xFE => (u32::from_le_bytes(self.read_array()?) as u64, 0x1_0000),
            0xFF => (u64::from_le_bytes(self.read_array()?), 0x1_0000_0000),
            small => return Ok(small as u64),
        };
        if value < min {
            return Err(BtcError::TransactionDecode(format!(
                "non-canonical compact size {value}"
            )));
        }
        Ok(value)
    }

    fn read_var_bytes(&mut self) -> Result<&'a [u8], BtcError> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len)
            .map_err(|_| BtcError::TransactionDecode(format!("length {len} too large")))?;
        self.take(len)
    }
}
