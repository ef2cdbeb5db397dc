//! Error types for script validation

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Reasons a script fails validation.
///
/// Every rejection path of the interpreter and of `verify_script` reports
/// exactly one of these.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScriptError {
    #[error("unknown error")]
    UnknownError,
    #[error("script evaluated without error but finished with a false/empty top stack element")]
    EvalFalse,
    #[error("script evaluated without error but left a false value on top of the stack")]
    EvalFalseInStack,
    #[error("OP_RETURN was encountered")]
    OpReturn,
    #[error("script is too big")]
    ScriptSize,
    #[error("push value size limit exceeded")]
    PushSize,
    #[error("operation limit exceeded")]
    OpCount,
    #[error("stack size limit exceeded")]
    StackSize,
    #[error("signature count negative or greater than pubkey count")]
    SigCount,
    #[error("pubkey count negative or limit exceeded")]
    PubkeyCount,
    #[error("script failed an OP_VERIFY operation")]
    Verify,
    #[error("script failed an OP_EQUALVERIFY operation")]
    EqualVerify,
    #[error("script failed an OP_CHECKMULTISIGVERIFY operation")]
    CheckMultisigVerify,
    #[error("script failed an OP_CHECKSIGVERIFY operation")]
    CheckSigVerify,
    #[error("script failed an OP_NUMEQUALVERIFY operation")]
    NumEqualVerify,
    #[error("opcode missing or not understood")]
    BadOpcode,
    #[error("attempted to use a disabled opcode")]
    DisabledOpcode,
    #[error("operation not valid with the current stack size")]
    InvalidStackOperation,
    #[error("operation not valid with the current altstack size")]
    InvalidAltstackOperation,
    #[error("invalid OP_IF construction")]
    UnbalancedConditional,
    #[error("negative locktime")]
    NegativeLocktime,
    #[error("locktime requirement not satisfied")]
    UnsatisfiedLocktime,
    #[error("signature hash type missing or not understood")]
    SigHashtype,
    #[error("non-canonical DER signature")]
    SigDerInvalidFormat,
    #[error("data push larger than necessary")]
    MinimalData,
    #[error("only push operators allowed in signatures")]
    SigPushOnly,
    #[error("non-canonical signature: S value is unnecessarily high")]
    SigDerHighS,
    #[error("dummy CHECKMULTISIG argument must be zero")]
    SigNullDummy,
    #[error("public key is neither compressed or uncompressed")]
    PubkeyType,
    #[error("extra items left on stack after execution")]
    CleanStack,
    #[error("OP_IF/NOTIF argument must be minimal")]
    MinimalIf,
    #[error("signature must be zero for failed CHECK(MULTI)SIG operation")]
    NullFail,
    #[error("NOPx reserved for soft-fork upgrades")]
    DiscourageUpgradableNops,
    #[error("witness version reserved for soft-fork upgrades")]
    DiscourageUpgradableWitnessProgram,
    #[error("witness program has incorrect length")]
    WitnessProgramWrongLength,
    #[error("witness program was passed an empty witness")]
    WitnessProgramWitnessEmpty,
    #[error("witness program hash mismatch")]
    WitnessProgramMismatch,
    #[error("witness requires empty scriptSig")]
    WitnessMalleated,
    #[error("witness requires only-redeemscript scriptSig")]
    WitnessMalleatedP2sh,
    #[error("witness provided for non-witness script")]
    WitnessUnexpected,
    #[error("using non-compressed keys in segwit")]
    WitnessPubkeyType,
}

impl ScriptError {
    pub const ALL: [ScriptError; 41] = [
        ScriptError::UnknownError,
        ScriptError::EvalFalse,
        ScriptError::EvalFalseInStack,
        ScriptError::OpReturn,
        ScriptError::ScriptSize,
        ScriptError::PushSize,
        ScriptError::OpCount,
        ScriptError::StackSize,
        ScriptError::SigCount,
        ScriptError::PubkeyCount,
        ScriptError::Verify,
        ScriptError::EqualVerify,
        ScriptError::CheckMultisigVerify,
        ScriptError::CheckSigVerify,
        ScriptError::NumEqualVerify,
        ScriptError::BadOpcode,
        ScriptError::DisabledOpcode,
        ScriptError::InvalidStackOperation,
        ScriptError::InvalidAltstackOperation,
        ScriptError::UnbalancedConditional,
        ScriptError::NegativeLocktime,
        ScriptError::UnsatisfiedLocktime,
        ScriptError::SigHashtype,
        ScriptError::SigDerInvalidFormat,
        ScriptError::MinimalData,
        ScriptError::SigPushOnly,
        ScriptError::SigDerHighS,
        ScriptError::SigNullDummy,
        ScriptError::PubkeyType,
        ScriptError::CleanStack,
        ScriptError::MinimalIf,
        ScriptError::NullFail,
        ScriptError::DiscourageUpgradableNops,
        ScriptError::DiscourageUpgradableWitnessProgram,
        ScriptError::WitnessProgramWrongLength,
        ScriptError::WitnessProgramWitnessEmpty,
        ScriptError::WitnessProgramMismatch,
        ScriptError::WitnessMalleated,
        ScriptError::WitnessMalleatedP2sh,
        ScriptError::WitnessUnexpected,
        ScriptError::WitnessPubkeyType,
    ];

    /// Stable upper-snake-case name of the error.
    pub fn code(self) -> &'static str {
        match self {
            ScriptError::UnknownError => "UNKNOWN_ERROR",
            ScriptError::EvalFalse => "EVAL_FALSE",
            ScriptError::EvalFalseInStack => "EVAL_FALSE_IN_STACK",
            ScriptError::OpReturn => "OP_RETURN",
            ScriptError::ScriptSize => "SCRIPT_SIZE",
            ScriptError::PushSize => "PUSH_SIZE",
            ScriptError::OpCount => "OP_COUNT",
            ScriptError::StackSize => "STACK_SIZE",
            ScriptError::SigCount => "SIG_COUNT",
            ScriptError::PubkeyCount => "PUBKEY_COUNT",
            ScriptError::Verify => "VERIFY",
            ScriptError::EqualVerify => "EQUALVERIFY",
            ScriptError::CheckMultisigVerify => "CHECKMULTISIGVERIFY",
            ScriptError::CheckSigVerify => "CHECKSIGVERIFY",
            ScriptError::NumEqualVerify => "NUMEQUALVERIFY",
            ScriptError::BadOpcode => "BAD_OPCODE",
            ScriptError::DisabledOpcode => "DISABLED_OPCODE",
            ScriptError::InvalidStackOperation => "INVALID_STACK_OPERATION",
            ScriptError::InvalidAltstackOperation => "INVALID_ALTSTACK_OPERATION",
            ScriptError::UnbalancedConditional => "UNBALANCED_CONDITIONAL",
            ScriptError::NegativeLocktime => "NEGATIVE_LOCKTIME",
            ScriptError::UnsatisfiedLocktime => "UNSATISFIED_LOCKTIME",
            ScriptError::SigHashtype => "SIG_HASHTYPE",
            ScriptError::SigDerInvalidFormat => "SIG_DER_INVALID_FORMAT",
            ScriptError::MinimalData => "MINIMALDATA",
            ScriptError::SigPushOnly => "SIG_PUSHONLY",
            ScriptError::SigDerHighS => "SIG_DER_HIGH_S",
            ScriptError::SigNullDummy => "SIG_NULLDUMMY",
            ScriptError::PubkeyType => "PUBKEYTYPE",
            ScriptError::CleanStack => "CLEANSTACK",
            ScriptError::MinimalIf => "MINIMALIF",
            ScriptError::NullFail => "NULLFAIL",
            ScriptError::DiscourageUpgradableNops => "DISCOURAGE_UPGRADABLE_NOPS",
            ScriptError::DiscourageUpgradableWitnessProgram => {
                "DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM"
            }
            ScriptError::WitnessProgramWrongLength => "WITNESS_PROGRAM_WRONG_LENGTH",
            ScriptError::WitnessProgramWitnessEmpty => "WITNESS_PROGRAM_WITNESS_EMPTY",
            ScriptError::WitnessProgramMismatch => "WITNESS_PROGRAM_MISMATCH",
            ScriptError::WitnessMalleated => "WITNESS_MALLEATED",
            ScriptError::WitnessMalleatedP2sh => "WITNESS_MALLEATED_P2SH",
            ScriptError::WitnessUnexpected => "WITNESS_UNEXPECTED",
            ScriptError::WitnessPubkeyType => "WITNESS_PUBKEYTYPE",
        }
    }
}

impl FromStr for ScriptError {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self> {
        // Short names used by the reference fixture corpus.
        match s {
            "SIG_DER" => return Ok(ScriptError::SigDerInvalidFormat),
            "SIG_HIGH_S" => return Ok(ScriptError::SigDerHighS),
            _ => {}
        }
        ScriptError::ALL
            .iter()
            .copied()
            .find(|err| err.code() == s)
            .ok_or_else(|| ConsensusError::UnknownErrorCode(s.to_string()))
    }
}

impl Serialize for ScriptError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for ScriptError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// Failures of the textual script notations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid hex literal {0:?}")]
    InvalidHex(String),
    #[error("unknown token {0:?}")]
    UnknownToken(String),
    #[error("number {0:?} out of range")]
    NumberOutOfRange(String),
    #[error("unterminated string literal {0:?}")]
    UnterminatedString(String),
    #[error("data of {0} bytes is too large to push")]
    PushTooLarge(usize),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Script parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid verification flags: {0}")]
    InvalidFlags(String),

    #[error("Unknown script error code: {0}")]
    UnknownErrorCode(String),

    #[error("Invalid script template: {0}")]
    InvalidTemplate(String),

    /// A state the verification rules guarantee cannot occur. Reported as a
    /// defect, never as an ordinary script failure.
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Error reported by a transaction collaborator while checking a signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("input index {index} out of range for {count} inputs")]
    InputIndexOutOfRange { index: usize, count: usize },
    #[error("witness signature hash requires the spent amount")]
    MissingAmount,
}
