//! Integration tests for consensus-script: complete spends with real signatures

use consensus_script::constants::SEQUENCE_FINAL;
use consensus_script::hash::{hash160, sha256};
use consensus_script::sighash;
use consensus_script::signature::SigHashType;
use consensus_script::*;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

const AMOUNT: i64 = 50_000;

struct Key {
    secret: SecretKey,
    public: Vec<u8>,
}

fn key(seed: u8) -> Key {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
    let public = PublicKey::from_secret_key(&secp, &secret).serialize().to_vec();
    Key { secret, public }
}

fn uncompressed(key: &Key) -> Vec<u8> {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, &key.secret).serialize_uncompressed().to_vec()
}

/// Spends the single output of a transaction paying `script_pubkey`.
fn spending_tx(script_pubkey: &Script) -> Transaction {
    let credit = Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prevout: OutPoint::null(),
            script_sig: vec![0x00, 0x00],
            sequence: SEQUENCE_FINAL,
        }],
        outputs: vec![TransactionOutput { value: AMOUNT, script_pubkey: script_pubkey.to_bytes() }],
        lock_time: 0,
    };
    Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prevout: OutPoint { hash: sighash::txid(&credit), index: 0 },
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }],
        outputs: vec![TransactionOutput { value: AMOUNT, script_pubkey: Vec::new() }],
        lock_time: 0,
    }
}

fn sign(tx: &Transaction, key: &Key, script_code: &Script, sig_version: SigVersion, hash_type: u8) -> Vec<u8> {
    let digest = sighash::signature_hash(
        tx,
        0,
        script_code,
        Some(AMOUNT),
        SigHashType::from_u32(u32::from(hash_type)),
        sig_version,
    )
    .unwrap();
    let message = Message::from_digest_slice(&digest).unwrap();
    let mut sig = Secp256k1::new().sign_ecdsa(&message, &key.secret).serialize_der().to_vec();
    sig.push(hash_type);
    sig
}

fn verify(
    tx: &Transaction,
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &[Vec<u8>],
    flags: ScriptFlags,
) -> ValidationResult {
    verify_script(script_sig, script_pubkey, witness, flags, SpendContext::new(tx, 0, Some(AMOUNT))).unwrap()
}

/// Keys stay in the given order so signature order is under test control.
fn multisig(required: usize, keys: &[&Key]) -> Script {
    let pubkeys: Vec<&[u8]> = keys.iter().map(|key| key.public.as_slice()).collect();
    Script::build_multisig_out(&pubkeys, required, false).unwrap()
}

fn witness_v0(program: &[u8]) -> Script {
    Script::new().push_opcode(Opcode::OP_0).push_data(program)
}

fn legacy_flags() -> ScriptFlags {
    ScriptFlags::P2SH | ScriptFlags::STRICTENC
}

fn witness_flags() -> ScriptFlags {
    ScriptFlags::P2SH | ScriptFlags::WITNESS
}

#[test]
fn test_p2pkh_spend() {
    let key = key(1);
    let script_pubkey = Script::build_public_key_hash_out_for_key(&key.public);
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x01);
    let script_sig = Script::new().push_data(&sig).push_data(&key.public);

    assert_eq!(script_pubkey.classify(), ScriptType::PubkeyHashOut);
    assert_eq!(script_sig.classify(), ScriptType::PubkeyHashIn);
    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()), ValidationResult::Valid);
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], ScriptFlags::STANDARD),
        ValidationResult::Valid
    );
}

#[test]
fn test_p2pkh_any_flipped_signature_byte_fails() {
    let key = key(1);
    let script_pubkey = Script::build_public_key_hash_out_for_key(&key.public);
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x01);

    for i in 0..sig.len() {
        let mut tampered = sig.clone();
        tampered[i] ^= 0x01;
        let script_sig = Script::new().push_data(&tampered).push_data(&key.public);
        let result = verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags());
        assert!(!result.is_valid(), "flipping byte {} still verified", i);
    }
}

#[test]
fn test_p2pkh_wrong_key() {
    let owner = key(1);
    let thief = key(2);
    let script_pubkey = Script::build_public_key_hash_out_for_key(&owner.public);
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &thief, &script_pubkey, SigVersion::Base, 0x01);
    let script_sig = Script::new().push_data(&sig).push_data(&thief.public);

    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()),
        ValidationResult::Invalid(ScriptError::EqualVerify)
    );
}

#[test]
fn test_p2pk_uncompressed_and_anyonecanpay() {
    let key = key(3);
    let public = uncompressed(&key);
    let script_pubkey = Script::build_public_key_out(&public).unwrap();
    let tx = spending_tx(&script_pubkey);
    assert_eq!(script_pubkey.classify(), ScriptType::PubkeyOut);
    assert_eq!(script_pubkey.get_public_key(), Some(&public[..]));

    let sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x81);
    let script_sig = Script::new().push_data(&sig);
    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()), ValidationResult::Valid);
}

#[test]
fn test_undefined_hashtype_rejected_by_strictenc() {
    let key = key(3);
    let script_pubkey = Script::new().push_data(&key.public).push_opcode(Opcode::OP_CHECKSIG);
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x05);
    let script_sig = Script::new().push_data(&sig);

    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], ScriptFlags::P2SH), ValidationResult::Valid);
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()),
        ValidationResult::Invalid(ScriptError::SigHashtype)
    );
}

#[test]
fn test_nullfail_rejects_bad_signature() {
    let key = key(1);
    let script_pubkey = Script::new().push_data(&key.public).push_opcode(Opcode::OP_CHECKSIG);
    let tx = spending_tx(&script_pubkey);
    let mut sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x01);
    sig[10] ^= 0x01;
    let script_sig = Script::new().push_data(&sig);

    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()),
        ValidationResult::Invalid(ScriptError::EvalFalseInStack)
    );
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags() | ScriptFlags::NULLFAIL),
        ValidationResult::Invalid(ScriptError::NullFail)
    );
}

#[test]
fn test_code_separator_limits_signed_script() {
    let key = key(4);
    let script_pubkey = Script::new()
        .push_opcode(Opcode::OP_NOP)
        .push_opcode(Opcode::OP_CODESEPARATOR)
        .push_data(&key.public)
        .push_opcode(Opcode::OP_CHECKSIG);
    let tx = spending_tx(&script_pubkey);

    let signed_part = script_pubkey.subscript(2);
    let sig = sign(&tx, &key, &signed_part, SigVersion::Base, 0x01);
    let script_sig = Script::new().push_data(&sig);
    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()), ValidationResult::Valid);

    let sig = sign(&tx, &key, &script_pubkey, SigVersion::Base, 0x01);
    let script_sig = Script::new().push_data(&sig);
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()),
        ValidationResult::Invalid(ScriptError::EvalFalseInStack)
    );
}

#[test]
fn test_multisig_signatures_must_follow_key_order() {
    let keys = [key(1), key(2), key(3)];
    let script_pubkey = multisig(2, &[&keys[0], &keys[1], &keys[2]]);
    assert_eq!(script_pubkey.classify(), ScriptType::MultisigOut);
    let tx = spending_tx(&script_pubkey);
    let sig1 = sign(&tx, &keys[0], &script_pubkey, SigVersion::Base, 0x01);
    let sig3 = sign(&tx, &keys[2], &script_pubkey, SigVersion::Base, 0x01);
    let flags = legacy_flags() | ScriptFlags::NULLDUMMY;

    let in_order = Script::new().push_opcode(Opcode::OP_0).push_data(&sig1).push_data(&sig3);
    assert_eq!(in_order.classify(), ScriptType::MultisigIn);
    assert_eq!(verify(&tx, &in_order, &script_pubkey, &[], flags), ValidationResult::Valid);

    let reversed = Script::new().push_opcode(Opcode::OP_0).push_data(&sig3).push_data(&sig1);
    assert_eq!(
        verify(&tx, &reversed, &script_pubkey, &[], flags),
        ValidationResult::Invalid(ScriptError::EvalFalseInStack)
    );
    assert_eq!(
        verify(&tx, &reversed, &script_pubkey, &[], flags | ScriptFlags::NULLFAIL),
        ValidationResult::Invalid(ScriptError::NullFail)
    );
}

#[test]
fn test_multisig_dummy_must_be_empty_under_nulldummy() {
    let keys = [key(1), key(2)];
    let script_pubkey = multisig(1, &[&keys[0], &keys[1]]);
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &keys[1], &script_pubkey, SigVersion::Base, 0x01);
    let script_sig = Script::new().push_int(1).push_data(&sig);

    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()), ValidationResult::Valid);
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags() | ScriptFlags::NULLDUMMY),
        ValidationResult::Invalid(ScriptError::SigNullDummy)
    );
}

#[test]
fn test_p2sh_multisig() {
    let keys = [key(5), key(6)];
    let redeem = multisig(2, &[&keys[0], &keys[1]]);
    let script_pubkey = redeem.to_script_hash_out();
    assert_eq!(script_pubkey.classify(), ScriptType::ScriptHashOut);
    let tx = spending_tx(&script_pubkey);
    let sig1 = sign(&tx, &keys[0], &redeem, SigVersion::Base, 0x01);
    let sig2 = sign(&tx, &keys[1], &redeem, SigVersion::Base, 0x01);

    let script_sig = Script::new()
        .push_opcode(Opcode::OP_0)
        .push_data(&sig1)
        .push_data(&sig2)
        .push_data(&redeem.to_bytes());
    let pubkeys = [&keys[0].public, &keys[1].public];
    assert_eq!(Script::build_p2sh_multisig_in(&pubkeys, 2, &[&sig1, &sig2], false).unwrap(), script_sig);
    assert_eq!(script_sig.classify(), ScriptType::ScriptHashIn);
    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], legacy_flags()), ValidationResult::Valid);

    let missing_sig = Script::new()
        .push_opcode(Opcode::OP_0)
        .push_data(&sig1)
        .push_data(&redeem.to_bytes());
    assert_eq!(
        verify(&tx, &missing_sig, &script_pubkey, &[], legacy_flags()),
        ValidationResult::Invalid(ScriptError::InvalidStackOperation)
    );
    // Before P2SH only the hash commitment is checked.
    assert_eq!(verify(&tx, &missing_sig, &script_pubkey, &[], ScriptFlags::NONE), ValidationResult::Valid);
}

#[test]
fn test_p2wpkh_spend() {
    let key = key(7);
    let program = hash160(&key.public);
    let script_pubkey = witness_v0(&program);
    let tx = spending_tx(&script_pubkey);
    let script_code = Script::build_public_key_hash_out_for_key(&key.public);
    let sig = sign(&tx, &key, &script_code, SigVersion::WitnessV0, 0x01);
    let witness = vec![sig.clone(), key.public.clone()];

    assert_eq!(verify(&tx, &Script::new(), &script_pubkey, &witness, witness_flags()), ValidationResult::Valid);
    assert_eq!(
        verify(&tx, &Script::new(), &script_pubkey, &witness, ScriptFlags::STANDARD),
        ValidationResult::Valid
    );

    // The witness digest commits to the spent amount.
    let wrong_amount = verify_script(
        &Script::new(),
        &script_pubkey,
        &witness,
        witness_flags(),
        SpendContext::new(&tx, 0, Some(AMOUNT + 1)),
    )
    .unwrap();
    assert_eq!(wrong_amount, ValidationResult::Invalid(ScriptError::EvalFalseInStack));

    let no_amount = verify_script(
        &Script::new(),
        &script_pubkey,
        &witness,
        witness_flags(),
        SpendContext::new(&tx, 0, None),
    )
    .unwrap();
    assert_eq!(no_amount, ValidationResult::Invalid(ScriptError::UnknownError));
}

#[test]
fn test_p2wpkh_requires_compressed_key_under_policy() {
    let key = key(8);
    let public = uncompressed(&key);
    let program = hash160(&public);
    let script_pubkey = witness_v0(&program);
    let tx = spending_tx(&script_pubkey);
    let script_code = Script::build_public_key_hash_out_for_key(&public);
    let sig = sign(&tx, &key, &script_code, SigVersion::WitnessV0, 0x01);
    let witness = vec![sig, public];

    assert_eq!(verify(&tx, &Script::new(), &script_pubkey, &witness, witness_flags()), ValidationResult::Valid);
    assert_eq!(
        verify(
            &tx,
            &Script::new(),
            &script_pubkey,
            &witness,
            witness_flags() | ScriptFlags::WITNESS_PUBKEYTYPE
        ),
        ValidationResult::Invalid(ScriptError::WitnessPubkeyType)
    );
}

#[test]
fn test_p2wsh_multisig() {
    let keys = [key(9), key(10)];
    let witness_script = multisig(1, &[&keys[0], &keys[1]]);
    let script_pubkey = witness_v0(&sha256(&witness_script.to_bytes()));
    let tx = spending_tx(&script_pubkey);
    let sig = sign(&tx, &keys[1], &witness_script, SigVersion::WitnessV0, 0x01);
    let witness = vec![Vec::new(), sig.clone(), witness_script.to_bytes()];

    assert_eq!(verify(&tx, &Script::new(), &script_pubkey, &witness, witness_flags()), ValidationResult::Valid);

    // A legacy-style signature does not satisfy a witness script.
    let legacy_sig = sign(&tx, &keys[1], &witness_script, SigVersion::Base, 0x01);
    let witness = vec![Vec::new(), legacy_sig, witness_script.to_bytes()];
    assert_eq!(
        verify(&tx, &Script::new(), &script_pubkey, &witness, witness_flags()),
        ValidationResult::Invalid(ScriptError::EvalFalseInStack)
    );
}

#[test]
fn test_p2sh_wrapped_p2wpkh() {
    let key = key(11);
    let program = hash160(&key.public);
    let redeem = witness_v0(&program);
    let script_pubkey = redeem.to_script_hash_out();
    let tx = spending_tx(&script_pubkey);
    let script_code = Script::build_public_key_hash_out_for_key(&key.public);
    let sig = sign(&tx, &key, &script_code, SigVersion::WitnessV0, 0x01);
    let witness = vec![sig, key.public.clone()];
    let script_sig = Script::new().push_data(&redeem.to_bytes());

    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &witness, witness_flags()), ValidationResult::Valid);
    assert_eq!(
        verify(
            &tx,
            &script_sig,
            &script_pubkey,
            &witness,
            witness_flags() | ScriptFlags::CLEANSTACK
        ),
        ValidationResult::Valid
    );

    // Without the WITNESS flag the witness is never looked at.
    assert_eq!(verify(&tx, &script_sig, &script_pubkey, &[], ScriptFlags::P2SH), ValidationResult::Valid);
    // With it, an empty witness cannot satisfy the program.
    assert_eq!(
        verify(&tx, &script_sig, &script_pubkey, &[], witness_flags()),
        ValidationResult::Invalid(ScriptError::WitnessProgramMismatch)
    );
}

fn lock_tx(version: i32, lock_time: u32, sequence: u32) -> Transaction {
    Transaction {
        version,
        inputs: vec![TransactionInput { prevout: OutPoint { hash: [9; 32], index: 0 }, script_sig: Vec::new(), sequence }],
        outputs: vec![TransactionOutput { value: AMOUNT, script_pubkey: Vec::new() }],
        lock_time,
    }
}

fn check_lock(tx: &Transaction, script_pubkey: &str, flags: ScriptFlags) -> ValidationResult {
    let script_pubkey: Script = script_pubkey.parse().unwrap();
    verify(tx, &Script::new(), &script_pubkey, &[], flags)
}

#[test]
fn test_checklocktimeverify() {
    let flags = ScriptFlags::P2SH | ScriptFlags::CHECKLOCKTIMEVERIFY;
    let tx = lock_tx(1, 500, 0);

    assert_eq!(check_lock(&tx, "400 CHECKLOCKTIMEVERIFY DROP 1", flags), ValidationResult::Valid);
    assert_eq!(check_lock(&tx, "500 CHECKLOCKTIMEVERIFY DROP 1", flags), ValidationResult::Valid);
    assert_eq!(
        check_lock(&tx, "501 CHECKLOCKTIMEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    // a timestamp cannot be compared with a height
    assert_eq!(
        check_lock(&tx, "500000001 CHECKLOCKTIMEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    // final inputs opt out of lock time enforcement
    let final_tx = lock_tx(1, 500, SEQUENCE_FINAL);
    assert_eq!(
        check_lock(&final_tx, "400 CHECKLOCKTIMEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    // without the flag the opcode is NOP2
    assert_eq!(
        check_lock(&final_tx, "400 CHECKLOCKTIMEVERIFY DROP 1", ScriptFlags::P2SH),
        ValidationResult::Valid
    );
}

#[test]
fn test_checksequenceverify() {
    let flags = ScriptFlags::P2SH | ScriptFlags::CHECKSEQUENCEVERIFY;
    let tx = lock_tx(2, 0, 10);

    assert_eq!(check_lock(&tx, "5 CHECKSEQUENCEVERIFY DROP 1", flags), ValidationResult::Valid);
    assert_eq!(check_lock(&tx, "10 CHECKSEQUENCEVERIFY DROP 1", flags), ValidationResult::Valid);
    assert_eq!(
        check_lock(&tx, "11 CHECKSEQUENCEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    // time-based operand against a height-based sequence (1 << 22 | 5)
    assert_eq!(
        check_lock(&tx, "4194309 CHECKSEQUENCEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    assert_eq!(
        check_lock(&lock_tx(1, 0, 10), "5 CHECKSEQUENCEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    // the disable bit on the transaction side makes any check fail
    assert_eq!(
        check_lock(&lock_tx(2, 0, 1 << 31), "5 CHECKSEQUENCEVERIFY DROP 1", flags),
        ValidationResult::Invalid(ScriptError::UnsatisfiedLocktime)
    );
    assert_eq!(
        check_lock(&tx, "-1 CHECKSEQUENCEVERIFY", flags),
        ValidationResult::Invalid(ScriptError::NegativeLocktime)
    );
}

#[test]
fn test_resource_ceilings() {
    let tx = lock_tx(1, 0, SEQUENCE_FINAL);
    let flags = ScriptFlags::P2SH;

    let oversized = Script::from_bytes(&[0x61; 10_001]);
    assert_eq!(
        verify(&tx, &Script::new(), &oversized, &[], flags),
        ValidationResult::Invalid(ScriptError::ScriptSize)
    );

    let big_push = Script::new().push_data(&[1; 521]);
    assert_eq!(
        verify(&tx, &big_push, &"1".parse().unwrap(), &[], flags),
        ValidationResult::Invalid(ScriptError::PushSize)
    );

    let many_ops = format!("{} 1", vec!["NOP"; 202].join(" "));
    assert_eq!(
        check_lock(&tx, &many_ops, flags),
        ValidationResult::Invalid(ScriptError::OpCount)
    );
    let enough_ops = format!("{} 1", vec!["NOP"; 201].join(" "));
    assert_eq!(check_lock(&tx, &enough_ops, flags), ValidationResult::Valid);
}
