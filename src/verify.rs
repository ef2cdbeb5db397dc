//! Spend verification
//!
//! Runs the phases of a spend in order: scriptSig, scriptPubKey, the P2SH
//! redeem script and the witness program. Each phase gets its own
//! interpreter and receives the stack the previous phase produced.

use log::debug;

use crate::constants::MAX_SCRIPT_ELEMENT_SIZE;
use crate::error::{ConsensusError, Result, ScriptError};
use crate::flags::ScriptFlags;
use crate::hash;
use crate::interpreter::{eval_script, SpendContext};
use crate::script::{Script, WitnessProgram};
use crate::script_num::cast_to_bool;
use crate::transaction::TransactionContext;
use crate::types::{ByteString, SigVersion, Stack, ValidationResult};

/// Why a spend was not accepted.
enum Failure {
    Script(ScriptError),
    Defect(ConsensusError),
}

impl From<ScriptError> for Failure {
    fn from(err: ScriptError) -> Self {
        Failure::Script(err)
    }
}

/// Verifies that `script_sig` and `witness` unlock `script_pubkey`.
///
/// Script failures come back as [`ValidationResult::Invalid`]. `Err` is
/// reserved for unusable flag sets and for states the rules make
/// unreachable.
pub fn verify_script<T: TransactionContext + ?Sized>(
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &[ByteString],
    flags: ScriptFlags,
    ctx: SpendContext<'_, T>,
) -> Result<ValidationResult> {
    flags.validate()?;
    match verify_phases(script_sig, script_pubkey, witness, flags, ctx) {
        Ok(()) => Ok(ValidationResult::Valid),
        Err(Failure::Script(err)) => {
            debug!("input {} rejected: {}", ctx.input_index, err.code());
            Ok(ValidationResult::Invalid(err))
        }
        Err(Failure::Defect(err)) => Err(err),
    }
}

fn verify_phases<T: TransactionContext + ?Sized>(
    script_sig: &Script,
    script_pubkey: &Script,
    witness: &[ByteString],
    flags: ScriptFlags,
    ctx: SpendContext<'_, T>,
) -> std::result::Result<(), Failure> {
    if flags.contains(ScriptFlags::SIGPUSHONLY) && !script_sig.is_push_only() {
        return Err(ScriptError::SigPushOnly.into());
    }

    let stack = eval_script(script_sig, Vec::new(), flags, SigVersion::Base, ctx)?;
    debug!("scriptSig left {} stack items", stack.len());
    let p2sh_stack = flags.contains(ScriptFlags::P2SH).then(|| stack.clone());

    let mut stack = eval_script(script_pubkey, stack, flags, SigVersion::Base, ctx)?;
    require_true(&stack)?;

    let mut had_witness = false;
    if flags.contains(ScriptFlags::WITNESS) {
        if let Some(program) = script_pubkey.witness_program() {
            had_witness = true;
            if !script_sig.is_empty() {
                return Err(ScriptError::WitnessMalleated.into());
            }
            verify_witness_program(witness, &program, flags, ctx)?;
            // The witness ran on its own stack; only its result counts for CLEANSTACK.
            stack.truncate(1);
        }
    }

    if let Some(mut p2sh_stack) = p2sh_stack.filter(|_| script_pubkey.is_script_hash_out()) {
        if !script_sig.is_push_only() {
            return Err(ScriptError::SigPushOnly.into());
        }
        let redeem_bytes = p2sh_stack.pop().ok_or(Failure::Defect(
            ConsensusError::InvariantViolation("P2SH stack empty after a successful hash check"),
        ))?;
        let redeem_script = Script::from_bytes(&redeem_bytes);
        debug!("evaluating P2SH redeem script of {} bytes", redeem_bytes.len());

        stack = eval_script(&redeem_script, p2sh_stack, flags, SigVersion::Base, ctx)?;
        require_true(&stack)?;

        if flags.contains(ScriptFlags::WITNESS) {
            if let Some(program) = redeem_script.witness_program() {
                had_witness = true;
                let expected = Script::new().push_data(&redeem_bytes);
                if script_sig.to_bytes() != expected.to_bytes() {
                    return Err(ScriptError::WitnessMalleatedP2sh.into());
                }
                verify_witness_program(witness, &program, flags, ctx)?;
                stack.truncate(1);
            }
        }
    }

    if flags.contains(ScriptFlags::CLEANSTACK) && stack.len() != 1 {
        return Err(ScriptError::CleanStack.into());
    }

    if flags.contains(ScriptFlags::WITNESS) && !had_witness && !witness.is_empty() {
        return Err(ScriptError::WitnessUnexpected.into());
    }
    Ok(())
}

/// Runs a witness program against its witness.
pub fn verify_witness_program<T: TransactionContext + ?Sized>(
    witness: &[ByteString],
    program: &WitnessProgram,
    flags: ScriptFlags,
    ctx: SpendContext<'_, T>,
) -> std::result::Result<(), ScriptError> {
    debug!(
        "witness program version {} with {} byte program",
        program.version,
        program.program.len()
    );

    if program.version != 0 {
        if flags.contains(ScriptFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM) {
            return Err(ScriptError::DiscourageUpgradableWitnessProgram);
        }
        // Future versions are anyone-can-spend until a soft fork gives them meaning.
        return Ok(());
    }

    let (script, stack): (Script, Stack) = match program.program.len() {
        32 => {
            let (script_bytes, items) =
                witness.split_last().ok_or(ScriptError::WitnessProgramWitnessEmpty)?;
            if hash::sha256(script_bytes) != program.program {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            (Script::from_bytes(script_bytes), items.to_vec())
        }
        20 => {
            if witness.len() != 2 {
                return Err(ScriptError::WitnessProgramMismatch);
            }
            let pubkey_hash = <&[u8; 20]>::try_from(program.program.as_slice())
                .map_err(|_| ScriptError::WitnessProgramWrongLength)?;
            (Script::build_public_key_hash_out(pubkey_hash), witness.to_vec())
        }
        _ => return Err(ScriptError::WitnessProgramWrongLength),
    };

    if stack.iter().any(|item| item.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Err(ScriptError::PushSize);
    }

    let stack = eval_script(&script, stack, flags, SigVersion::WitnessV0, ctx)?;
    if stack.len() != 1 {
        return Err(ScriptError::EvalFalse);
    }
    require_true(&stack)
}

fn require_true(stack: &Stack) -> std::result::Result<(), ScriptError> {
    match stack.last() {
        None => Err(ScriptError::EvalFalse),
        Some(top) if !cast_to_bool(top) => Err(ScriptError::EvalFalseInStack),
        Some(_) => Ok(()),
    }
}
