//! Core types shared by the script model, interpreter and verifier

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

/// Hash type: 256-bit hash in internal byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Evaluation stack: last element is the top
pub type Stack = Vec<ByteString>;

/// Witness items of one input, bottom first
pub type Witness = Vec<ByteString>;

/// OutPoint: reference to a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// The outpoint carried by coinbase inputs.
    pub fn null() -> Self {
        OutPoint { hash: [0; 32], index: u32::MAX }
    }
}

/// Transaction Input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

/// Transaction Output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: i64,
    pub script_pubkey: ByteString,
}

/// Transaction, without witness data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

/// Which signature digest algorithm a signature commits to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigVersion {
    /// Legacy digest over the modified transaction serialization.
    Base,
    /// BIP143 digest used inside version 0 witness programs.
    WitnessV0,
}

/// Outcome of verifying one input's scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Valid,
    Invalid(ScriptError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// The failure reason, if any.
    pub fn error(&self) -> Option<ScriptError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(err) => Some(*err),
        }
    }
}

impl From<std::result::Result<(), ScriptError>> for ValidationResult {
    fn from(result: std::result::Result<(), ScriptError>) -> Self {
        match result {
            Ok(()) => ValidationResult::Valid,
            Err(err) => ValidationResult::Invalid(err),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResult::Valid => f.write_str("OK"),
            ValidationResult::Invalid(err) => f.write_str(err.code()),
        }
    }
}
