//! Reference script test vectors
//!
//! Loads the JSON fixture format shared by the reference validator's
//! `script_tests.json`: each entry is
//! `[[witness..., amount]?, scriptSig, scriptPubKey, flags, expected, comment?]`
//! with scripts in mnemonic notation. Single-string entries are comments.
//! Vectors run against the canonical crediting/spending transaction pair.
//!
//! Transaction fixtures follow `tx_valid.json`/`tx_invalid.json`: each entry
//! is `[[[prevout hash, prevout index, scriptPubKey, amount?]...], tx, flags]`
//! where the hash is in display order and the transaction is hex in the
//! consensus encoding, with or without witness data. A single-string entry
//! before a vector serves as its comment.

use std::collections::HashMap;

use anyhow::{anyhow, bail, ensure, Context};
use serde_json::Value;

use crate::constants::SEQUENCE_FINAL;
use crate::error::ScriptError;
use crate::flags::ScriptFlags;
use crate::interpreter::SpendContext;
use crate::script::Script;
use crate::sighash;
use crate::types::{
    ByteString, Hash, OutPoint, Transaction, TransactionInput, TransactionOutput, ValidationResult,
    Witness,
};
use crate::verify::verify_script;

const SATOSHIS_PER_COIN: f64 = 100_000_000.0;

/// One labelled fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptVector {
    pub witness: Witness,
    /// Value of the credited output in satoshis.
    pub amount: i64,
    pub script_sig: Script,
    pub script_pubkey: Script,
    pub flags: ScriptFlags,
    pub expected: ValidationResult,
    pub comment: String,
}

impl ScriptVector {
    /// Transaction creating the output that `script_pubkey` locks.
    pub fn crediting_transaction(&self) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint::null(),
                // OP_0 OP_0
                script_sig: vec![0x00, 0x00],
                sequence: SEQUENCE_FINAL,
            }],
            outputs: vec![TransactionOutput {
                value: self.amount,
                script_pubkey: self.script_pubkey.to_bytes(),
            }],
            lock_time: 0,
        }
    }

    /// Transaction spending the crediting output with `script_sig`.
    pub fn spending_transaction(&self) -> Transaction {
        let credit = self.crediting_transaction();
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: sighash::txid(&credit), index: 0 },
                script_sig: self.script_sig.to_bytes(),
                sequence: SEQUENCE_FINAL,
            }],
            outputs: vec![TransactionOutput { value: self.amount, script_pubkey: Vec::new() }],
            lock_time: 0,
        }
    }

    /// Verifies the vector and returns the actual outcome.
    pub fn run(&self) -> crate::error::Result<ValidationResult> {
        let tx = self.spending_transaction();
        verify_script(
            &self.script_sig,
            &self.script_pubkey,
            &self.witness,
            self.flags,
            SpendContext::new(&tx, 0, Some(self.amount)),
        )
    }
}

/// Parses a fixture file, skipping comment entries.
pub fn parse_vectors(json: &str) -> anyhow::Result<Vec<ScriptVector>> {
    let entries: Vec<Value> = serde_json::from_str(json).context("fixture file is not a JSON array")?;
    let mut vectors = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let fields = entry
            .as_array()
            .ok_or_else(|| anyhow!("entry {} is not an array", i))?;
        if fields.len() <= 1 {
            continue;
        }
        let vector = parse_entry(fields).with_context(|| format!("entry {}: {}", i, entry))?;
        vectors.push(vector);
    }
    Ok(vectors)
}

fn parse_entry(fields: &[Value]) -> anyhow::Result<ScriptVector> {
    let (witness, amount, rest) = match fields.first() {
        Some(Value::Array(witness_fields)) => {
            let (witness, amount) = parse_witness(witness_fields)?;
            (witness, amount, &fields[1..])
        }
        _ => (Vec::new(), 0, fields),
    };
    if rest.len() < 4 {
        bail!("expected scriptSig, scriptPubKey, flags and result");
    }

    let script_sig = Script::from_mnemonic(text(rest, 0)?).context("bad scriptSig")?;
    let script_pubkey = Script::from_mnemonic(text(rest, 1)?).context("bad scriptPubKey")?;
    let flags: ScriptFlags = text(rest, 2)?.parse().context("bad flags")?;
    let expected = match text(rest, 3)? {
        "OK" => ValidationResult::Valid,
        code => ValidationResult::Invalid(code.parse::<ScriptError>().context("bad result code")?),
    };
    let comment = rest.get(4).and_then(Value::as_str).unwrap_or_default().to_string();

    Ok(ScriptVector { witness, amount, script_sig, script_pubkey, flags, expected, comment })
}

fn text(fields: &[Value], index: usize) -> anyhow::Result<&str> {
    fields[index]
        .as_str()
        .ok_or_else(|| anyhow!("field {} is not a string", index))
}

/// Witness items in hex followed by the amount in coins.
fn parse_witness(fields: &[Value]) -> anyhow::Result<(Witness, i64)> {
    let Some((amount, items)) = fields.split_last() else {
        bail!("witness array is missing the amount");
    };
    let amount = amount
        .as_f64()
        .ok_or_else(|| anyhow!("witness amount is not a number"))?;
    let witness = items
        .iter()
        .map(|item| -> anyhow::Result<ByteString> {
            let hex_str = item.as_str().ok_or_else(|| anyhow!("witness item is not a string"))?;
            hex::decode(hex_str).with_context(|| format!("witness item {:?} is not hex", hex_str))
        })
        .collect::<anyhow::Result<Witness>>()?;
    Ok((witness, (amount * SATOSHIS_PER_COIN).round() as i64))
}

/// Output spent by a transaction fixture input.
#[derive(Debug, Clone, PartialEq)]
pub struct Prevout {
    pub script_pubkey: Script,
    /// Value in satoshis; 0 when the fixture omits it.
    pub amount: i64,
}

/// One transaction fixture with the outputs its inputs spend.
#[derive(Debug, Clone, PartialEq)]
pub struct TxVector {
    pub prevouts: HashMap<OutPoint, Prevout>,
    pub tx: Transaction,
    /// Witness stack of each input, empty for inputs without one.
    pub witnesses: Vec<Witness>,
    pub flags: ScriptFlags,
    pub comment: String,
}

impl TxVector {
    /// Verifies every input under the vector's flags, in input order.
    pub fn run(&self) -> anyhow::Result<Vec<ValidationResult>> {
        let mut results = Vec::with_capacity(self.tx.inputs.len());
        for (index, input) in self.tx.inputs.iter().enumerate() {
            let prevout = self
                .prevouts
                .get(&input.prevout)
                .ok_or_else(|| anyhow!("input {} spends an unknown output", index))?;
            let witness = self.witnesses.get(index).map(Vec::as_slice).unwrap_or_default();
            let result = verify_script(
                &Script::from_bytes(&input.script_sig),
                &prevout.script_pubkey,
                witness,
                self.flags,
                SpendContext::new(&self.tx, index, Some(prevout.amount)),
            )?;
            results.push(result);
        }
        Ok(results)
    }

    /// True when every input verifies.
    pub fn is_valid(&self) -> anyhow::Result<bool> {
        Ok(self.run()?.iter().all(ValidationResult::is_valid))
    }

    pub fn has_witness(&self) -> bool {
        self.witnesses.iter().any(|witness| !witness.is_empty())
    }
}

/// Parses a transaction fixture file. Every input must spend a listed
/// prevout.
pub fn parse_tx_vectors(json: &str) -> anyhow::Result<Vec<TxVector>> {
    let entries: Vec<Value> = serde_json::from_str(json).context("fixture file is not a JSON array")?;
    let mut vectors = Vec::new();
    let mut comment = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let fields = entry
            .as_array()
            .ok_or_else(|| anyhow!("entry {} is not an array", i))?;
        if let [Value::String(text)] = fields.as_slice() {
            comment = text.clone();
            continue;
        }
        let mut vector = parse_tx_entry(fields).with_context(|| format!("entry {}", i))?;
        vector.comment = std::mem::take(&mut comment);
        vectors.push(vector);
    }
    Ok(vectors)
}

fn parse_tx_entry(fields: &[Value]) -> anyhow::Result<TxVector> {
    let [Value::Array(inputs), Value::String(tx_hex), Value::String(flags)] = fields else {
        bail!("expected prevouts, transaction and flags");
    };

    let mut prevouts = HashMap::with_capacity(inputs.len());
    for input in inputs {
        let (outpoint, prevout) = parse_prevout(input).with_context(|| format!("prevout {}", input))?;
        prevouts.insert(outpoint, prevout);
    }

    let bytes = hex::decode(tx_hex).context("transaction is not hex")?;
    let (tx, witnesses) = deserialize_transaction(&bytes)?;
    for (index, input) in tx.inputs.iter().enumerate() {
        ensure!(prevouts.contains_key(&input.prevout), "input {} has no listed prevout", index);
    }

    let flags: ScriptFlags = flags.parse().context("bad flags")?;
    Ok(TxVector { prevouts, tx, witnesses, flags, comment: String::new() })
}

fn parse_prevout(input: &Value) -> anyhow::Result<(OutPoint, Prevout)> {
    let fields = input.as_array().ok_or_else(|| anyhow!("prevout is not an array"))?;
    ensure!((3..=4).contains(&fields.len()), "prevout needs 3 or 4 fields");

    let mut hash: Hash = hex::decode(text(fields, 0)?)
        .context("prevout hash is not hex")?
        .try_into()
        .map_err(|_| anyhow!("prevout hash is not 32 bytes"))?;
    hash.reverse();
    let index = fields[1]
        .as_i64()
        .ok_or_else(|| anyhow!("prevout index is not an integer"))?;
    // -1 names the null outpoint
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    let script_pubkey = Script::from_mnemonic(text(fields, 2)?).context("bad prevout scriptPubKey")?;
    let amount = match fields.get(3) {
        Some(amount) => amount
            .as_i64()
            .ok_or_else(|| anyhow!("prevout amount is not an integer"))?,
        None => 0,
    };
    Ok((OutPoint { hash, index }, Prevout { script_pubkey, amount }))
}

/// Decodes a consensus-encoded transaction and the witness of each input.
/// The BIP144 marker and flag bytes select the extended encoding.
pub fn deserialize_transaction(bytes: &[u8]) -> anyhow::Result<(Transaction, Vec<Witness>)> {
    let mut reader = Reader { bytes, pos: 0 };
    let version = i32::from_le_bytes(reader.array()?);

    let extended = reader.peek(2) == Some(&[0x00, 0x01][..]);
    if extended {
        reader.take(2)?;
    }

    let input_count = reader.count()?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let hash: Hash = reader.array()?;
        let index = u32::from_le_bytes(reader.array()?);
        let script_sig = reader.var_bytes()?;
        let sequence = u32::from_le_bytes(reader.array()?);
        inputs.push(TransactionInput { prevout: OutPoint { hash, index }, script_sig, sequence });
    }

    let output_count = reader.count()?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = i64::from_le_bytes(reader.array()?);
        let script_pubkey = reader.var_bytes()?;
        outputs.push(TransactionOutput { value, script_pubkey });
    }

    let mut witnesses = vec![Witness::new(); inputs.len()];
    if extended {
        for witness in witnesses.iter_mut() {
            let items = reader.count()?;
            for _ in 0..items {
                witness.push(reader.var_bytes()?);
            }
        }
        ensure!(witnesses.iter().any(|w| !w.is_empty()), "extended encoding without witness data");
    }

    let lock_time = u32::from_le_bytes(reader.array()?);
    ensure!(reader.pos == bytes.len(), "{} trailing bytes", bytes.len() - reader.pos);

    Ok((Transaction { version, inputs, outputs, lock_time }, witnesses))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self, len: usize) -> Option<&'a [u8]> {
        self.bytes.get(self.pos..self.pos.checked_add(len)?)
    }

    fn take(&mut self, len: usize) -> anyhow::Result<&'a [u8]> {
        let slice = self
            .peek(len)
            .ok_or_else(|| anyhow!("transaction truncated at byte {}", self.pos))?;
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> anyhow::Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn varint(&mut self) -> anyhow::Result<u64> {
        let [prefix] = self.array()?;
        Ok(match prefix {
            0xfd => u64::from(u16::from_le_bytes(self.array()?)),
            0xfe => u64::from(u32::from_le_bytes(self.array()?)),
            0xff => u64::from_le_bytes(self.array()?),
            n => u64::from(n),
        })
    }

    /// A length that must fit in the remaining bytes.
    fn count(&mut self) -> anyhow::Result<usize> {
        let n = self.varint()?;
        let remaining = self.bytes.len() - self.pos;
        usize::try_from(n)
            .ok()
            .filter(|&n| n <= remaining)
            .ok_or_else(|| anyhow!("length {} exceeds the {} remaining bytes", n, remaining))
    }

    fn var_bytes(&mut self) -> anyhow::Result<Vec<u8>> {
        let len = self.count()?;
        Ok(self.take(len)?.to_vec())
    }
}
