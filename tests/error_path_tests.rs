//! Tests for error paths and edge cases

use consensus_script::error::{ParseError, SignatureError};
use consensus_script::*;

#[test]
fn test_script_error_codes() {
    assert_eq!(ScriptError::EvalFalse.code(), "EVAL_FALSE");
    assert_eq!(ScriptError::OpCount.to_string().is_empty(), false);
    assert_eq!("CLEANSTACK".parse::<ScriptError>().unwrap(), ScriptError::CleanStack);
    assert_eq!(
        "WITNESS_MALLEATED_P2SH".parse::<ScriptError>().unwrap(),
        ScriptError::WitnessMalleatedP2sh
    );
    assert!("cleanstack".parse::<ScriptError>().is_err());
}

#[test]
fn test_validation_result_display_uses_codes() {
    assert_eq!(ValidationResult::Valid.to_string(), "OK");
    assert_eq!(ValidationResult::Invalid(ScriptError::SigPushOnly).to_string(), "SIG_PUSHONLY");
    assert_eq!(ValidationResult::Invalid(ScriptError::Verify).error(), Some(ScriptError::Verify));
    assert_eq!(ValidationResult::Valid.error(), None);
}

#[test]
fn test_flag_parsing() {
    let flags: ScriptFlags = "P2SH,STRICTENC,WITNESS".parse().unwrap();
    assert!(flags.contains(ScriptFlags::P2SH));
    assert!(flags.contains(ScriptFlags::STRICTENC));
    assert!(flags.contains(ScriptFlags::WITNESS));
    assert!(!flags.contains(ScriptFlags::DERSIG));

    assert!("P2SH,NOT_A_FLAG".parse::<ScriptFlags>().is_err());
}

#[test]
fn test_flag_display_round_trips() {
    let flags = ScriptFlags::P2SH | ScriptFlags::NULLFAIL | ScriptFlags::MINIMALIF;
    let parsed: ScriptFlags = flags.to_string().parse().unwrap();
    assert_eq!(parsed, flags);
}

#[test]
fn test_flag_bits() {
    assert_eq!(ScriptFlags::from_bits(ScriptFlags::STANDARD.bits()).unwrap(), ScriptFlags::STANDARD);
    assert!(matches!(
        ScriptFlags::from_bits(1 << 20),
        Err(ConsensusError::InvalidFlags(_))
    ));

    let mut flags = ScriptFlags::NONE;
    assert!(flags.is_empty());
    flags.insert(ScriptFlags::P2SH);
    flags |= ScriptFlags::CLEANSTACK;
    assert!(flags.validate().is_ok());
    flags.remove(ScriptFlags::P2SH);
    assert!(flags.validate().is_err());
}

#[test]
fn test_mnemonic_parse_errors() {
    assert!(matches!(Script::from_mnemonic("NOT_AN_OPCODE"), Err(ParseError::UnknownToken(_))));
    assert!(matches!(Script::from_mnemonic("0xzz"), Err(ParseError::InvalidHex(_))));
    assert!(matches!(Script::from_mnemonic("0x"), Err(ParseError::InvalidHex(_))));
    assert!(matches!(Script::from_mnemonic("'abc"), Err(ParseError::UnterminatedString(_))));
    assert!(matches!(
        Script::from_mnemonic("99999999999"),
        Err(ParseError::NumberOutOfRange(_))
    ));
}

#[test]
fn test_hex_parse_errors() {
    assert!(Script::from_hex("5").is_err());
    assert!(Script::from_hex("zz").is_err());
    assert!(Script::from_hex("").unwrap().is_empty());
}

#[test]
fn test_parse_error_converts_to_consensus_error() {
    fn parse(text: &str) -> Result<Script> {
        Ok(Script::from_mnemonic(text)?)
    }
    assert!(matches!(parse("BOGUS"), Err(ConsensusError::Parse(_))));
}

#[test]
fn test_malformed_scripts_fail_cleanly() {
    let verifier = ScriptVerifier::mandatory();
    for hex_script in ["4c", "4d01", "4e0100", "05010203", "4cff00"] {
        let script_pubkey = Script::from_hex(hex_script).unwrap();
        let result = verifier.verify_standalone(&Script::new(), &script_pubkey).unwrap();
        assert_eq!(result, ValidationResult::Invalid(ScriptError::BadOpcode), "{hex_script}");
    }
}

#[test]
fn test_malformed_script_keeps_bytes() {
    let script = Script::from_hex("0201").unwrap();
    assert_eq!(script.to_hex(), "0201");
    assert!(matches!(script.chunks()[0], Chunk::Malformed(_)));
}

#[test]
fn test_oversized_script() {
    let verifier = ScriptVerifier::mandatory();
    let script_pubkey = Script::from_bytes(&vec![0x61; 10_001]);
    let result = verifier.verify_standalone(&Script::new(), &script_pubkey).unwrap();
    assert_eq!(result, ValidationResult::Invalid(ScriptError::ScriptSize));
}

#[test]
fn test_signature_error_messages() {
    let err = SignatureError::InputIndexOutOfRange { index: 3, count: 1 };
    assert_eq!(err.to_string(), "input index 3 out of range for 1 inputs");
    assert!(!SignatureError::MissingAmount.to_string().is_empty());
}

#[test]
fn test_signature_checks_on_missing_input_fail() {
    let tx = Transaction {
        version: 1,
        inputs: vec![],
        outputs: vec![],
        lock_time: 0,
    };
    let script_sig = Script::from_mnemonic("0x09 0x300602010102010101").unwrap();
    let script_pubkey = Script::from_mnemonic(
        "0x21 0x0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798 CHECKSIG",
    )
    .unwrap();
    let result = verify_script(
        &script_sig,
        &script_pubkey,
        &[],
        ScriptFlags::P2SH,
        SpendContext::new(&tx, 5, None),
    )
    .unwrap();
    // legacy digests of a missing input are the constant one hash
    assert_eq!(result, ValidationResult::Invalid(ScriptError::EvalFalseInStack));
}
