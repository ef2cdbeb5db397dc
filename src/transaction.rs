//! The spending transaction as seen by the interpreter
//!
//! Signature checks and lock time opcodes consult the transaction through
//! [`TransactionContext`]. [`Transaction`] implements it with real
//! signature digests and secp256k1 verification; [`NoTransaction`] stands in
//! when a script is evaluated on its own.

use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, Verification};

use crate::constants::SEQUENCE_FINAL;
use crate::error::SignatureError;
use crate::script::Script;
use crate::sighash;
use crate::signature::SigHashType;
use crate::types::{SigVersion, Transaction};

pub trait TransactionContext {
    /// Checks `sig` (DER plus hash type byte) by `pubkey` over the digest of
    /// input `input_index` with `script_code`. Keys and signatures that do
    /// not parse verify as `false`; `Err` means the digest itself could not
    /// be formed.
    fn verify_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        input_index: usize,
        script_code: &Script,
        sig_version: SigVersion,
        amount: Option<i64>,
    ) -> Result<bool, SignatureError>;

    fn version(&self) -> i32;

    fn lock_time(&self) -> u32;

    /// Sequence number of an input, if it exists.
    fn input_sequence(&self, input_index: usize) -> Option<u32>;

    fn is_input_final(&self, input_index: usize) -> bool {
        self.input_sequence(input_index) == Some(SEQUENCE_FINAL)
    }
}

/// Context without a spending transaction: every signature is invalid and
/// no lock time can be satisfied.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct NoTransaction;

impl TransactionContext for NoTransaction {
    fn verify_signature(
        &self,
        _sig: &[u8],
        _pubkey: &[u8],
        _input_index: usize,
        _script_code: &Script,
        _sig_version: SigVersion,
        _amount: Option<i64>,
    ) -> Result<bool, SignatureError> {
        Ok(false)
    }

    fn version(&self) -> i32 {
        0
    }

    fn lock_time(&self) -> u32 {
        0
    }

    fn input_sequence(&self, _input_index: usize) -> Option<u32> {
        None
    }
}

impl TransactionContext for Transaction {
    fn verify_signature(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        input_index: usize,
        script_code: &Script,
        sig_version: SigVersion,
        amount: Option<i64>,
    ) -> Result<bool, SignatureError> {
        let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
            return Ok(false);
        };
        let Some((&hash_type, der)) = sig.split_last() else {
            return Ok(false);
        };

        let digest = sighash::signature_hash(
            self,
            input_index,
            script_code,
            amount,
            SigHashType::from_u32(u32::from(hash_type)),
            sig_version,
        )?;

        let secp = Secp256k1::verification_only();
        Ok(verify_ecdsa(&secp, &digest, der, &pubkey))
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn lock_time(&self) -> u32 {
        self.lock_time
    }

    fn input_sequence(&self, input_index: usize) -> Option<u32> {
        self.inputs.get(input_index).map(|input| input.sequence)
    }
}

/// Verifies a DER signature over `digest`. The signature is parsed leniently
/// and normalized to low-S, so strictness is left to the encoding rules.
pub fn verify_ecdsa<C: Verification>(
    secp: &Secp256k1<C>,
    digest: &[u8; 32],
    der: &[u8],
    pubkey: &PublicKey,
) -> bool {
    let Ok(mut signature) = Signature::from_der_lax(der) else {
        return false;
    };
    signature.normalize_s();
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    secp.verify_ecdsa(&message, &signature, pubkey).is_ok()
}
