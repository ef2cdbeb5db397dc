//! # Consensus-Script
//!
//! Bitcoin transaction script interpreter and spend verifier.
//!
//! This crate decides whether an unlocking script (scriptSig and witness)
//! satisfies a locking script (scriptPubKey), matching the reference
//! validator's behavior under every combination of policy flags.
//!
//! ## Architecture
//!
//! The crate is layered, leaves first:
//! - Script numbers (`script_num`): the minimal integer encoding used by
//!   arithmetic and lock time opcodes
//! - Script model (`script`, `opcode`): chunks, binary and text notations,
//!   template classification
//! - Interpreter (`interpreter`): the stepping stack machine
//! - Verifier (`verify`): scriptSig, scriptPubKey, P2SH and witness phases
//!
//! Signatures, hashes and the spending transaction are reached through the
//! `signature`, `hash`, `sighash` and `transaction` modules.
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Verification is deterministic and shares no state between calls
//! 2. **Failures Are Values**: Invalid scripts yield a `ScriptError`, never a panic
//! 3. **Exact Version Pinning**: All consensus-critical dependencies pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use consensus_script::{Script, ScriptFlags, ScriptVerifier, ValidationResult};
//!
//! let verifier = ScriptVerifier::new(ScriptFlags::P2SH).unwrap();
//! let script_sig: Script = "1 2".parse().unwrap();
//! let script_pubkey: Script = "2 EQUALVERIFY 1 EQUAL".parse().unwrap();
//!
//! let result = verifier.verify_standalone(&script_sig, &script_pubkey).unwrap();
//! assert_eq!(result, ValidationResult::Valid);
//! ```

pub mod constants;
pub mod error;
pub mod flags;
pub mod hash;
pub mod interpreter;
pub mod opcode;
pub mod script;
pub mod script_num;
pub mod sighash;
pub mod signature;
pub mod transaction;
pub mod types;
pub mod vectors;
pub mod verify;

// Re-export commonly used types
pub use error::{ConsensusError, Result, ScriptError};
pub use flags::ScriptFlags;
pub use interpreter::{eval_script, Interpreter, SpendContext};
pub use opcode::Opcode;
pub use script::{Chunk, Script, ScriptType};
pub use transaction::{NoTransaction, TransactionContext};
pub use types::*;
pub use verify::verify_script;

/// Script verifier bound to one set of flags
///
/// # Examples
///
/// ```
/// use consensus_script::{Script, ScriptError, ScriptFlags, ScriptVerifier, ValidationResult};
///
/// let verifier = ScriptVerifier::standard();
///
/// // OP_1 unlocks OP_1
/// let one = Script::from_hex("51").unwrap();
/// assert!(verifier.verify_standalone(&one, &one).unwrap().is_valid());
///
/// // OP_0 leaves a false value on the stack
/// let zero = Script::from_hex("00").unwrap();
/// let result = verifier.verify_standalone(&one, &zero).unwrap();
/// assert_eq!(result, ValidationResult::Invalid(ScriptError::EvalFalseInStack));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptVerifier {
    flags: ScriptFlags,
}

impl ScriptVerifier {
    /// Create a verifier enforcing `flags`
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_script::{ScriptFlags, ScriptVerifier};
    ///
    /// assert!(ScriptVerifier::new(ScriptFlags::P2SH | ScriptFlags::CLEANSTACK).is_ok());
    ///
    /// // CLEANSTACK is only meaningful together with P2SH
    /// assert!(ScriptVerifier::new(ScriptFlags::CLEANSTACK).is_err());
    /// ```
    pub fn new(flags: ScriptFlags) -> Result<Self> {
        flags.validate()?;
        Ok(ScriptVerifier { flags })
    }

    /// Verifier enforcing every policy flag
    pub fn standard() -> Self {
        ScriptVerifier { flags: ScriptFlags::STANDARD }
    }

    /// Verifier enforcing only the consensus-mandatory flags
    pub fn mandatory() -> Self {
        ScriptVerifier { flags: ScriptFlags::MANDATORY }
    }

    pub fn flags(&self) -> ScriptFlags {
        self.flags
    }

    /// Verify one input of a spending transaction
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_script::{Script, ScriptFlags, ScriptVerifier, SpendContext};
    /// use consensus_script::types::*;
    ///
    /// let verifier = ScriptVerifier::new(ScriptFlags::P2SH | ScriptFlags::WITNESS).unwrap();
    /// let tx = Transaction {
    ///     version: 2,
    ///     inputs: vec![TransactionInput {
    ///         prevout: OutPoint { hash: [1; 32], index: 0 },
    ///         script_sig: vec![0x51], // OP_1
    ///         sequence: 0xffffffff,
    ///     }],
    ///     outputs: vec![TransactionOutput {
    ///         value: 1000,
    ///         script_pubkey: vec![],
    ///     }],
    ///     lock_time: 0,
    /// };
    ///
    /// let script_sig = Script::from_bytes(&tx.inputs[0].script_sig);
    /// let script_pubkey: Script = "1 EQUAL".parse().unwrap();
    /// let result = verifier
    ///     .verify(&script_sig, &script_pubkey, &[], SpendContext::new(&tx, 0, Some(1000)))
    ///     .unwrap();
    /// assert!(result.is_valid());
    /// ```
    pub fn verify<T: TransactionContext + ?Sized>(
        &self,
        script_sig: &Script,
        script_pubkey: &Script,
        witness: &[ByteString],
        ctx: SpendContext<'_, T>,
    ) -> Result<ValidationResult> {
        verify::verify_script(script_sig, script_pubkey, witness, self.flags, ctx)
    }

    /// Verify scripts that do not depend on a spending transaction. Every
    /// signature check fails and no lock time is satisfied.
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_script::{Script, ScriptVerifier};
    ///
    /// let verifier = ScriptVerifier::mandatory();
    /// let script_sig = Script::new();
    /// let script_pubkey: Script = "DEPTH 0 EQUAL".parse().unwrap();
    ///
    /// assert!(verifier.verify_standalone(&script_sig, &script_pubkey).unwrap().is_valid());
    /// ```
    pub fn verify_standalone(&self, script_sig: &Script, script_pubkey: &Script) -> Result<ValidationResult> {
        self.verify(script_sig, script_pubkey, &[], SpendContext::new(&NoTransaction, 0, None))
    }
}

impl Default for ScriptVerifier {
    fn default() -> Self {
        Self::standard()
    }
}
