//! Transaction serialization and signature digests
//!
//! The legacy digest hashes a modified copy of the spending transaction; the
//! witness v0 digest follows BIP143.

use crate::error::SignatureError;
use crate::hash::double_sha256;
use crate::script::Script;
use crate::signature::SigHashType;
use crate::types::{Hash, OutPoint, SigVersion, Transaction, TransactionOutput};

/// Digest signed when the legacy algorithm has nothing to commit to.
const ONE_HASH: Hash = {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
};

/// Consensus serialization without witness data.
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    write_varint(&mut data, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(&mut data, &input.prevout);
        write_bytes(&mut data, &input.script_sig);
        data.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut data, tx.outputs.len() as u64);
    for output in &tx.outputs {
        write_output(&mut data, output);
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data
}

/// Transaction id in internal byte order.
pub fn txid(tx: &Transaction) -> Hash {
    double_sha256(&serialize_transaction(tx))
}

/// Digest for `sig_version`. The witness digest needs the spent amount.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: Option<i64>,
    hash_type: SigHashType,
    sig_version: SigVersion,
) -> Result<Hash, SignatureError> {
    match sig_version {
        SigVersion::Base => Ok(legacy_signature_hash(tx, input_index, script_code, hash_type)),
        SigVersion::WitnessV0 => {
            let amount = amount.ok_or(SignatureError::MissingAmount)?;
            witness_v0_signature_hash(tx, input_index, script_code, amount, hash_type)
        }
    }
}

/// Legacy digest. Code separators are stripped from `script_code`.
pub fn legacy_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    hash_type: SigHashType,
) -> Hash {
    if input_index >= tx.inputs.len() {
        return ONE_HASH;
    }
    if hash_type.is_single() && input_index >= tx.outputs.len() {
        return ONE_HASH;
    }

    let script_code = script_code.remove_code_separators().to_bytes();
    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    let inputs: Vec<usize> = if hash_type.anyone_can_pay() {
        vec![input_index]
    } else {
        (0..tx.inputs.len()).collect()
    };
    write_varint(&mut data, inputs.len() as u64);
    for i in inputs {
        let input = &tx.inputs[i];
        write_outpoint(&mut data, &input.prevout);
        if i == input_index {
            write_bytes(&mut data, &script_code);
        } else {
            write_bytes(&mut data, &[]);
        }
        let sequence = if i != input_index && (hash_type.is_none() || hash_type.is_single()) {
            0
        } else {
            input.sequence
        };
        data.extend_from_slice(&sequence.to_le_bytes());
    }

    if hash_type.is_none() {
        write_varint(&mut data, 0);
    } else if hash_type.is_single() {
        write_varint(&mut data, input_index as u64 + 1);
        let blank = TransactionOutput { value: -1, script_pubkey: Vec::new() };
        for _ in 0..input_index {
            write_output(&mut data, &blank);
        }
        write_output(&mut data, &tx.outputs[input_index]);
    } else {
        write_varint(&mut data, tx.outputs.len() as u64);
        for output in &tx.outputs {
            write_output(&mut data, output);
        }
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&hash_type.to_u32().to_le_bytes());
    double_sha256(&data)
}

/// BIP143 digest over the full `script_code`.
pub fn witness_v0_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: i64,
    hash_type: SigHashType,
) -> Result<Hash, SignatureError> {
    let input = tx.inputs.get(input_index).ok_or(SignatureError::InputIndexOutOfRange {
        index: input_index,
        count: tx.inputs.len(),
    })?;

    let mut hash_prevouts = [0u8; 32];
    let mut hash_sequence = [0u8; 32];
    let mut hash_outputs = [0u8; 32];

    if !hash_type.anyone_can_pay() {
        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        for input in &tx.inputs {
            write_outpoint(&mut prevouts, &input.prevout);
        }
        hash_prevouts = double_sha256(&prevouts);
    }

    if !hash_type.anyone_can_pay() && !hash_type.is_single() && !hash_type.is_none() {
        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            sequences.extend_from_slice(&input.sequence.to_le_bytes());
        }
        hash_sequence = double_sha256(&sequences);
    }

    if !hash_type.is_single() && !hash_type.is_none() {
        let mut outputs = Vec::new();
        for output in &tx.outputs {
            write_output(&mut outputs, output);
        }
        hash_outputs = double_sha256(&outputs);
    } else if hash_type.is_single() && input_index < tx.outputs.len() {
        let mut output = Vec::new();
        write_output(&mut output, &tx.outputs[input_index]);
        hash_outputs = double_sha256(&output);
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());
    data.extend_from_slice(&hash_prevouts);
    data.extend_from_slice(&hash_sequence);
    write_outpoint(&mut data, &input.prevout);
    write_bytes(&mut data, &script_code.to_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    data.extend_from_slice(&input.sequence.to_le_bytes());
    data.extend_from_slice(&hash_outputs);
    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&hash_type.to_u32().to_le_bytes());
    Ok(double_sha256(&data))
}

fn write_outpoint(data: &mut Vec<u8>, outpoint: &OutPoint) {
    data.extend_from_slice(&outpoint.hash);
    data.extend_from_slice(&outpoint.index.to_le_bytes());
}

fn write_output(data: &mut Vec<u8>, output: &TransactionOutput) {
    data.extend_from_slice(&output.value.to_le_bytes());
    write_bytes(data, &output.script_pubkey);
}

fn write_bytes(data: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(data, bytes.len() as u64);
    data.extend_from_slice(bytes);
}

fn write_varint(data: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        data.push(value as u8);
    } else if value <= 0xffff {
        data.push(0xfd);
        data.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        data.push(0xfe);
        data.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        data.push(0xff);
        data.extend_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SEQUENCE_FINAL;
    use crate::types::TransactionInput;

    fn genesis_coinbase() -> Transaction {
        let mut script_sig = hex::decode("04ffff001d010445").unwrap();
        script_sig.extend_from_slice(
            b"The Times 03/Jan/2009 Chancellor on brink of second bailout for banks",
        );
        let pubkey = hex::decode(
            "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb6\
             49f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f",
        )
        .unwrap();
        let script_pubkey = Script::new()
            .push_data(&pubkey)
            .push_opcode(crate::opcode::Opcode::OP_CHECKSIG)
            .to_bytes();
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint::null(),
                script_sig,
                sequence: SEQUENCE_FINAL,
            }],
            outputs: vec![TransactionOutput { value: 50 * 100_000_000, script_pubkey }],
            lock_time: 0,
        }
    }

    fn two_in_one_out() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![
                TransactionInput {
                    prevout: OutPoint { hash: [1; 32], index: 0 },
                    script_sig: vec![0x51],
                    sequence: 1,
                },
                TransactionInput {
                    prevout: OutPoint { hash: [2; 32], index: 3 },
                    script_sig: vec![],
                    sequence: 2,
                },
            ],
            outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![0x51] }],
            lock_time: 0,
        }
    }

    #[test]
    fn genesis_coinbase_txid() {
        let mut id = txid(&genesis_coinbase());
        id.reverse();
        assert_eq!(
            hex::encode(id),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
    }

    #[test]
    fn varint_boundaries() {
        let mut data = Vec::new();
        write_varint(&mut data, 0xfc);
        write_varint(&mut data, 0xfd);
        write_varint(&mut data, 0x10000);
        assert_eq!(hex::encode(data), "fcfdfd00fe00000100");
    }

    #[test]
    fn single_without_matching_output_signs_one() {
        let tx = two_in_one_out();
        let script = Script::from_hex("51").unwrap();
        let single = SigHashType::from_u32(0x03);
        assert_eq!(legacy_signature_hash(&tx, 1, &script, single), ONE_HASH);
        assert_ne!(legacy_signature_hash(&tx, 0, &script, single), ONE_HASH);
        assert_eq!(legacy_signature_hash(&tx, 5, &script, SigHashType::ALL), ONE_HASH);
    }

    #[test]
    fn legacy_digest_ignores_code_separators() {
        let tx = two_in_one_out();
        let with = Script::from_hex("ab51ab").unwrap();
        let without = Script::from_hex("51").unwrap();
        assert_eq!(
            legacy_signature_hash(&tx, 0, &with, SigHashType::ALL),
            legacy_signature_hash(&tx, 0, &without, SigHashType::ALL)
        );
    }

    #[test]
    fn legacy_digest_commits_to_hash_type() {
        let tx = two_in_one_out();
        let script = Script::from_hex("51").unwrap();
        let all = legacy_signature_hash(&tx, 0, &script, SigHashType::ALL);
        let none = legacy_signature_hash(&tx, 0, &script, SigHashType::from_u32(0x02));
        let acp = legacy_signature_hash(&tx, 0, &script, SigHashType::from_u32(0x81));
        assert_ne!(all, none);
        assert_ne!(all, acp);
    }

    #[test]
    fn anyone_can_pay_ignores_other_inputs() {
        let tx = two_in_one_out();
        let mut changed = tx.clone();
        changed.inputs[1].prevout.index = 9;
        let script = Script::from_hex("51").unwrap();
        let acp = SigHashType::from_u32(0x81);
        assert_eq!(
            legacy_signature_hash(&tx, 0, &script, acp),
            legacy_signature_hash(&changed, 0, &script, acp)
        );
        assert_eq!(
            witness_v0_signature_hash(&tx, 0, &script, 50, acp).unwrap(),
            witness_v0_signature_hash(&changed, 0, &script, 50, acp).unwrap()
        );
        assert_ne!(
            legacy_signature_hash(&tx, 0, &script, SigHashType::ALL),
            legacy_signature_hash(&changed, 0, &script, SigHashType::ALL)
        );
    }

    #[test]
    fn witness_digest_commits_to_amount() {
        let tx = two_in_one_out();
        let script = Script::from_hex("51").unwrap();
        let a = witness_v0_signature_hash(&tx, 0, &script, 1, SigHashType::ALL).unwrap();
        let b = witness_v0_signature_hash(&tx, 0, &script, 2, SigHashType::ALL).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn witness_digest_errors() {
        let tx = two_in_one_out();
        let script = Script::new();
        assert_eq!(
            witness_v0_signature_hash(&tx, 2, &script, 0, SigHashType::ALL),
            Err(SignatureError::InputIndexOutOfRange { index: 2, count: 2 })
        );
        assert_eq!(
            signature_hash(&tx, 0, &script, None, SigHashType::ALL, SigVersion::WitnessV0),
            Err(SignatureError::MissingAmount)
        );
    }
}
