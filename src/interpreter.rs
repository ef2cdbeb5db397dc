//! Script interpreter
//!
//! One [`Interpreter`] evaluates one script. Phases of a spend (scriptSig,
//! scriptPubKey, redeem script, witness script) each get a fresh interpreter
//! seeded with the stack the previous phase returned.

use log::trace;

use crate::constants::*;
use crate::error::ScriptError;
use crate::flags::ScriptFlags;
use crate::hash;
use crate::opcode::Opcode;
use crate::script::{Chunk, Script};
use crate::script_num::{self, cast_to_bool, encode_bool};
use crate::signature::{check_pubkey_encoding, check_signature_encoding};
use crate::transaction::TransactionContext;
use crate::types::{SigVersion, Stack};

/// The transaction input a script is evaluated for.
#[derive(Debug)]
pub struct SpendContext<'a, T: ?Sized> {
    pub tx: &'a T,
    pub input_index: usize,
    /// Value of the spent output. Required by witness v0 signatures.
    pub amount: Option<i64>,
}

impl<'a, T: TransactionContext + ?Sized> SpendContext<'a, T> {
    pub fn new(tx: &'a T, input_index: usize, amount: Option<i64>) -> Self {
        SpendContext { tx, input_index, amount }
    }
}

impl<T: ?Sized> Clone for SpendContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for SpendContext<'_, T> {}

/// Evaluates `script` on `stack` and returns the resulting stack.
pub fn eval_script<T: TransactionContext + ?Sized>(
    script: &Script,
    stack: Stack,
    flags: ScriptFlags,
    sig_version: SigVersion,
    ctx: SpendContext<'_, T>,
) -> Result<Stack, ScriptError> {
    let mut interpreter = Interpreter::new(script, stack, flags, sig_version, ctx)?;
    while !interpreter.is_done() {
        if let Err(err) = interpreter.step() {
            trace!("script failed at chunk {}: {}", interpreter.pc.saturating_sub(1), err.code());
            return Err(err);
        }
    }
    interpreter.finish()
}

/// Stepping stack machine over one script.
pub struct Interpreter<'a, T: ?Sized> {
    script: &'a Script,
    ctx: SpendContext<'a, T>,
    flags: ScriptFlags,
    sig_version: SigVersion,
    stack: Stack,
    alt_stack: Stack,
    exec_stack: Vec<bool>,
    pc: usize,
    code_separator: usize,
    op_count: usize,
}

impl<'a, T: TransactionContext + ?Sized> Interpreter<'a, T> {
    /// Rejects scripts over the size limit before anything runs.
    pub fn new(
        script: &'a Script,
        stack: Stack,
        flags: ScriptFlags,
        sig_version: SigVersion,
        ctx: SpendContext<'a, T>,
    ) -> Result<Self, ScriptError> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptError::ScriptSize);
        }
        Ok(Interpreter {
            script,
            ctx,
            flags,
            sig_version,
            stack,
            alt_stack: Vec::new(),
            exec_stack: Vec::new(),
            pc: 0,
            code_separator: 0,
            op_count: 0,
        })
    }

    pub fn is_done(&self) -> bool {
        self.pc >= self.script.chunks().len()
    }

    /// Index of the next chunk to execute.
    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn op_count(&self) -> usize {
        self.op_count
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn alt_stack(&self) -> &Stack {
        &self.alt_stack
    }

    /// Ends evaluation, returning the main stack.
    pub fn finish(self) -> Result<Stack, ScriptError> {
        if !self.exec_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }
        Ok(self.stack)
    }

    /// Executes exactly one chunk.
    pub fn step(&mut self) -> Result<(), ScriptError> {
        let script = self.script;
        let Some(chunk) = script.chunks().get(self.pc) else {
            return Ok(());
        };
        self.pc += 1;

        let executing = !self.exec_stack.contains(&false);
        let opcode = match chunk {
            Chunk::Malformed(_) => return Err(ScriptError::BadOpcode),
            Chunk::Push { data, .. } if data.len() > MAX_SCRIPT_ELEMENT_SIZE => {
                return Err(ScriptError::PushSize)
            }
            chunk => chunk.opcode(),
        };

        if opcode > Opcode::OP_16 as u8 {
            self.op_count += 1;
            if self.op_count > MAX_OPS_PER_SCRIPT {
                return Err(ScriptError::OpCount);
            }
        }

        let named = Opcode::from_byte(opcode);
        if named.map_or(false, Opcode::is_disabled) {
            return Err(ScriptError::DisabledOpcode);
        }

        if let Chunk::Push { data, .. } = chunk {
            if executing {
                if self.require_minimal() && !chunk.is_minimal_push() {
                    return Err(ScriptError::MinimalData);
                }
                self.stack.push(data.clone());
            }
        } else if executing
            || (Opcode::OP_IF as u8..=Opcode::OP_ENDIF as u8).contains(&opcode)
        {
            match named {
                Some(op) => self.execute(op, executing)?,
                None => return Err(ScriptError::BadOpcode),
            }
        }

        if self.stack.len() + self.alt_stack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackSize);
        }
        Ok(())
    }

    fn execute(&mut self, op: Opcode, executing: bool) -> Result<(), ScriptError> {
        use Opcode::*;

        match op {
            OP_1NEGATE | OP_1 | OP_2 | OP_3 | OP_4 | OP_5 | OP_6 | OP_7 | OP_8 | OP_9
            | OP_10 | OP_11 | OP_12 | OP_13 | OP_14 | OP_15 | OP_16 => {
                let n = op.small_int_value().ok_or(ScriptError::BadOpcode)?;
                self.stack.push(script_num::encode(n));
            }

            OP_NOP => {}

            OP_CHECKLOCKTIMEVERIFY => {
                if !self.flags.contains(ScriptFlags::CHECKLOCKTIMEVERIFY) {
                    return self.upgradable_nop();
                }
                self.require(1)?;
                let lock_time = self.num(self.top(1), LOCKTIME_SCRIPTNUM_MAX_SIZE)?;
                if lock_time < 0 {
                    return Err(ScriptError::NegativeLocktime);
                }
                if !self.check_lock_time(lock_time) {
                    return Err(ScriptError::UnsatisfiedLocktime);
                }
            }

            OP_CHECKSEQUENCEVERIFY => {
                if !self.flags.contains(ScriptFlags::CHECKSEQUENCEVERIFY) {
                    return self.upgradable_nop();
                }
                self.require(1)?;
                let sequence = self.num(self.top(1), LOCKTIME_SCRIPTNUM_MAX_SIZE)?;
                if sequence < 0 {
                    return Err(ScriptError::NegativeLocktime);
                }
                if sequence & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) != 0 {
                    return Ok(());
                }
                if !self.check_sequence(sequence) {
                    return Err(ScriptError::UnsatisfiedLocktime);
                }
            }

            op if op.is_upgradable_nop() => {
                self.upgradable_nop()?;
            }

            OP_IF | OP_NOTIF => {
                let mut value = false;
                if executing {
                    if self.stack.is_empty() {
                        return Err(ScriptError::UnbalancedConditional);
                    }
                    let condition = self.top(1);
                    if self.sig_version == SigVersion::WitnessV0
                        && self.flags.contains(ScriptFlags::MINIMALIF)
                        && (condition.len() > 1 || (condition.len() == 1 && condition[0] != 1))
                    {
                        return Err(ScriptError::MinimalIf);
                    }
                    value = cast_to_bool(condition);
                    if op == OP_NOTIF {
                        value = !value;
                    }
                    self.pop()?;
                }
                self.exec_stack.push(value);
            }

            OP_ELSE => {
                let branch = self.exec_stack.last_mut().ok_or(ScriptError::UnbalancedConditional)?;
                *branch = !*branch;
            }

            OP_ENDIF => {
                self.exec_stack.pop().ok_or(ScriptError::UnbalancedConditional)?;
            }

            OP_VERIFY => {
                self.require(1)?;
                if !cast_to_bool(self.top(1)) {
                    return Err(ScriptError::Verify);
                }
                self.pop()?;
            }

            OP_RETURN => return Err(ScriptError::OpReturn),

            // stack operations
            OP_TOALTSTACK => {
                let item = self.pop()?;
                self.alt_stack.push(item);
            }
            OP_FROMALTSTACK => {
                let item = self.alt_stack.pop().ok_or(ScriptError::InvalidAltstackOperation)?;
                self.stack.push(item);
            }
            OP_2DROP => {
                self.require(2)?;
                self.pop()?;
                self.pop()?;
            }
            OP_2DUP => {
                self.require(2)?;
                let a = self.top(2).to_vec();
                let b = self.top(1).to_vec();
                self.stack.push(a);
                self.stack.push(b);
            }
            OP_3DUP => {
                self.require(3)?;
                let a = self.top(3).to_vec();
                let b = self.top(2).to_vec();
                let c = self.top(1).to_vec();
                self.stack.extend([a, b, c]);
            }
            OP_2OVER => {
                self.require(4)?;
                let a = self.top(4).to_vec();
                let b = self.top(3).to_vec();
                self.stack.push(a);
                self.stack.push(b);
            }
            OP_2ROT => {
                self.require(6)?;
                let at = self.stack.len() - 6;
                let moved: Vec<_> = self.stack.drain(at..at + 2).collect();
                self.stack.extend(moved);
            }
            OP_2SWAP => {
                self.require(4)?;
                let len = self.stack.len();
                self.stack.swap(len - 4, len - 2);
                self.stack.swap(len - 3, len - 1);
            }
            OP_IFDUP => {
                self.require(1)?;
                if cast_to_bool(self.top(1)) {
                    let item = self.top(1).to_vec();
                    self.stack.push(item);
                }
            }
            OP_DEPTH => {
                let depth = self.stack.len() as i64;
                self.stack.push(script_num::encode(depth));
            }
            OP_DROP => {
                self.pop()?;
            }
            OP_DUP => {
                self.require(1)?;
                let item = self.top(1).to_vec();
                self.stack.push(item);
            }
            OP_NIP => {
                self.require(2)?;
                let at = self.stack.len() - 2;
                self.stack.remove(at);
            }
            OP_OVER => {
                self.require(2)?;
                let item = self.top(2).to_vec();
                self.stack.push(item);
            }
            OP_PICK | OP_ROLL => {
                self.require(2)?;
                let n = self.num(self.top(1), SCRIPTNUM_MAX_SIZE)?;
                self.pop()?;
                if n < 0 || n as usize >= self.stack.len() {
                    return Err(ScriptError::InvalidStackOperation);
                }
                let at = self.stack.len() - 1 - n as usize;
                let item = if op == OP_ROLL {
                    self.stack.remove(at)
                } else {
                    self.stack[at].clone()
                };
                self.stack.push(item);
            }
            OP_ROT => {
                self.require(3)?;
                let len = self.stack.len();
                self.stack.swap(len - 3, len - 2);
                self.stack.swap(len - 2, len - 1);
            }
            OP_SWAP => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 2, len - 1);
            }
            OP_TUCK => {
                self.require(2)?;
                let item = self.top(1).to_vec();
                let at = self.stack.len() - 2;
                self.stack.insert(at, item);
            }
            OP_SIZE => {
                self.require(1)?;
                let size = self.top(1).len() as i64;
                self.stack.push(script_num::encode(size));
            }

            // bitwise logic
            OP_EQUAL | OP_EQUALVERIFY => {
                self.require(2)?;
                let equal = self.top(2) == self.top(1);
                self.pop()?;
                self.pop()?;
                self.stack.push(encode_bool(equal));
                if op == OP_EQUALVERIFY {
                    if !equal {
                        return Err(ScriptError::EqualVerify);
                    }
                    self.pop()?;
                }
            }

            // numeric
            OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
                self.require(1)?;
                let n = self.num(self.top(1), SCRIPTNUM_MAX_SIZE)?;
                let result = match op {
                    OP_1ADD => n + 1,
                    OP_1SUB => n - 1,
                    OP_NEGATE => -n,
                    OP_ABS => n.abs(),
                    OP_NOT => i64::from(n == 0),
                    _ => i64::from(n != 0),
                };
                self.pop()?;
                self.stack.push(script_num::encode(result));
            }

            OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
            | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
            | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => {
                self.require(2)?;
                let a = self.num(self.top(2), SCRIPTNUM_MAX_SIZE)?;
                let b = self.num(self.top(1), SCRIPTNUM_MAX_SIZE)?;
                let result = match op {
                    OP_ADD => a + b,
                    OP_SUB => a - b,
                    OP_BOOLAND => i64::from(a != 0 && b != 0),
                    OP_BOOLOR => i64::from(a != 0 || b != 0),
                    OP_NUMEQUAL | OP_NUMEQUALVERIFY => i64::from(a == b),
                    OP_NUMNOTEQUAL => i64::from(a != b),
                    OP_LESSTHAN => i64::from(a < b),
                    OP_GREATERTHAN => i64::from(a > b),
                    OP_LESSTHANOREQUAL => i64::from(a <= b),
                    OP_GREATERTHANOREQUAL => i64::from(a >= b),
                    OP_MIN => a.min(b),
                    _ => a.max(b),
                };
                self.pop()?;
                self.pop()?;
                self.stack.push(script_num::encode(result));
                if op == OP_NUMEQUALVERIFY {
                    if result == 0 {
                        return Err(ScriptError::NumEqualVerify);
                    }
                    self.pop()?;
                }
            }

            OP_WITHIN => {
                self.require(3)?;
                let x = self.num(self.top(3), SCRIPTNUM_MAX_SIZE)?;
                let min = self.num(self.top(2), SCRIPTNUM_MAX_SIZE)?;
                let max = self.num(self.top(1), SCRIPTNUM_MAX_SIZE)?;
                self.pop()?;
                self.pop()?;
                self.pop()?;
                self.stack.push(encode_bool(min <= x && x < max));
            }

            // crypto
            OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => {
                let item = self.pop()?;
                let digest = match op {
                    OP_RIPEMD160 => hash::ripemd160(&item),
                    OP_SHA1 => hash::sha1(&item),
                    OP_SHA256 => hash::sha256(&item),
                    OP_HASH160 => hash::hash160(&item),
                    _ => hash::hash256(&item),
                };
                self.stack.push(digest);
            }

            OP_CODESEPARATOR => {
                self.code_separator = self.pc;
            }

            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                self.require(2)?;
                let sig = self.top(2).to_vec();
                let pubkey = self.top(1).to_vec();

                let mut script_code = self.script.subscript(self.code_separator);
                if self.sig_version == SigVersion::Base {
                    script_code = script_code.find_and_delete(&sig);
                }

                check_signature_encoding(&sig, self.flags)?;
                check_pubkey_encoding(&pubkey, self.flags, self.sig_version)?;
                let success = self.check_sig(&sig, &pubkey, &script_code)?;

                if !success && self.flags.contains(ScriptFlags::NULLFAIL) && !sig.is_empty() {
                    return Err(ScriptError::NullFail);
                }

                self.pop()?;
                self.pop()?;
                self.stack.push(encode_bool(success));
                if op == OP_CHECKSIGVERIFY {
                    if !success {
                        return Err(ScriptError::CheckSigVerify);
                    }
                    self.pop()?;
                }
            }

            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                self.check_multisig(op == OP_CHECKMULTISIGVERIFY)?;
            }

            // Pushes are handled by `step`; the rest are reserved or
            // disabled and fail when executed.
            _ => return Err(ScriptError::BadOpcode),
        }
        Ok(())
    }

    fn check_multisig(&mut self, verify: bool) -> Result<(), ScriptError> {
        // Positions are counted from the top of the stack, 1 being the top.
        let mut i = 1;
        self.require(i)?;

        let mut keys_count = self.num(self.top(i), SCRIPTNUM_MAX_SIZE)?;
        if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&keys_count) {
            return Err(ScriptError::PubkeyCount);
        }
        self.op_count += keys_count as usize;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(ScriptError::OpCount);
        }
        i += 1;
        let mut ikey = i;
        // Key positions still to be popped before signatures are reached.
        let mut ikey2 = keys_count as usize + 2;
        i += keys_count as usize;
        self.require(i)?;

        let mut sigs_count = self.num(self.top(i), SCRIPTNUM_MAX_SIZE)?;
        if sigs_count < 0 || sigs_count > keys_count {
            return Err(ScriptError::SigCount);
        }
        i += 1;
        let mut isig = i;
        i += sigs_count as usize;
        self.require(i)?;

        let mut script_code = self.script.subscript(self.code_separator);
        if self.sig_version == SigVersion::Base {
            for k in 0..sigs_count as usize {
                let sig = self.top(isig + k).to_vec();
                script_code = script_code.find_and_delete(&sig);
            }
        }

        let mut success = true;
        while success && sigs_count > 0 {
            let sig = self.top(isig).to_vec();
            let pubkey = self.top(ikey).to_vec();

            check_signature_encoding(&sig, self.flags)?;
            check_pubkey_encoding(&pubkey, self.flags, self.sig_version)?;
            if self.check_sig(&sig, &pubkey, &script_code)? {
                isig += 1;
                sigs_count -= 1;
            }
            ikey += 1;
            keys_count -= 1;

            // More signatures left than keys means failure.
            if sigs_count > keys_count {
                success = false;
            }
        }

        // Pop keys, counts and signatures.
        while i > 1 {
            i -= 1;
            if !success
                && self.flags.contains(ScriptFlags::NULLFAIL)
                && ikey2 == 0
                && !self.top(1).is_empty()
            {
                return Err(ScriptError::NullFail);
            }
            ikey2 = ikey2.saturating_sub(1);
            self.pop()?;
        }

        // The extra dummy element consumed by the original off-by-one.
        self.require(1)?;
        if self.flags.contains(ScriptFlags::NULLDUMMY) && !self.top(1).is_empty() {
            return Err(ScriptError::SigNullDummy);
        }
        self.pop()?;

        self.stack.push(encode_bool(success));
        if verify {
            if !success {
                return Err(ScriptError::CheckMultisigVerify);
            }
            self.pop()?;
        }
        Ok(())
    }

    fn check_sig(&self, sig: &[u8], pubkey: &[u8], script_code: &Script) -> Result<bool, ScriptError> {
        if sig.is_empty() {
            return Ok(false);
        }
        self.ctx
            .tx
            .verify_signature(
                sig,
                pubkey,
                self.ctx.input_index,
                script_code,
                self.sig_version,
                self.ctx.amount,
            )
            .map_err(|err| {
                trace!("signature check error: {}", err);
                ScriptError::UnknownError
            })
    }

    fn check_lock_time(&self, lock_time: i64) -> bool {
        let tx = self.ctx.tx;
        if tx.input_sequence(self.ctx.input_index).is_none() {
            return false;
        }
        let tx_lock_time = i64::from(tx.lock_time());
        let threshold = i64::from(LOCKTIME_THRESHOLD);

        // Heights and timestamps are not comparable.
        if (tx_lock_time < threshold) != (lock_time < threshold) {
            return false;
        }
        if lock_time > tx_lock_time {
            return false;
        }
        // A final input would let the transaction bypass its lock time.
        !tx.is_input_final(self.ctx.input_index)
    }

    fn check_sequence(&self, sequence: i64) -> bool {
        let tx = self.ctx.tx;
        let Some(tx_sequence) = tx.input_sequence(self.ctx.input_index) else {
            return false;
        };
        if (tx.version() as u32) < 2 {
            return false;
        }
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return false;
        }

        let mask = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG | SEQUENCE_LOCKTIME_MASK);
        let tx_masked = i64::from(tx_sequence) & mask;
        let masked = sequence & mask;
        let type_flag = i64::from(SEQUENCE_LOCKTIME_TYPE_FLAG);

        if (tx_masked < type_flag) != (masked < type_flag) {
            return false;
        }
        masked <= tx_masked
    }

    fn upgradable_nop(&self) -> Result<(), ScriptError> {
        if self.flags.contains(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
            return Err(ScriptError::DiscourageUpgradableNops);
        }
        Ok(())
    }

    fn require_minimal(&self) -> bool {
        self.flags.contains(ScriptFlags::MINIMALDATA)
    }

    fn num(&self, bytes: &[u8], max_size: usize) -> Result<i64, ScriptError> {
        Ok(script_num::decode(bytes, self.require_minimal(), max_size)?)
    }

    fn require(&self, depth: usize) -> Result<(), ScriptError> {
        if self.stack.len() < depth {
            return Err(ScriptError::InvalidStackOperation);
        }
        Ok(())
    }

    /// Element `depth` positions from the top, 1 being the top. Callers
    /// check the depth first.
    fn top(&self, depth: usize) -> &[u8] {
        &self.stack[self.stack.len() - depth]
    }

    fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.stack.pop().ok_or(ScriptError::InvalidStackOperation)
    }
}
