//! Signature and public key encoding rules

use secp256k1::ecdsa::Signature;

use crate::error::ScriptError;
use crate::flags::ScriptFlags;
use crate::types::SigVersion;

pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Signature hash type byte appended to every transaction signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SigHashType(u32);

impl SigHashType {
    pub const ALL: SigHashType = SigHashType(SIGHASH_ALL as u32);

    pub fn from_u32(value: u32) -> Self {
        SigHashType(value)
    }

    /// Hash type of a signature: its last byte, or 0 for an empty signature.
    pub fn from_signature(sig: &[u8]) -> Self {
        SigHashType(sig.last().copied().map_or(0, u32::from))
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// Base type with the ANYONECANPAY bit masked off (low five bits).
    pub fn base(self) -> u32 {
        self.0 & 0x1f
    }

    pub fn is_none(self) -> bool {
        self.base() == SIGHASH_NONE as u32
    }

    pub fn is_single(self) -> bool {
        self.base() == SIGHASH_SINGLE as u32
    }

    pub fn anyone_can_pay(self) -> bool {
        self.0 & SIGHASH_ANYONECANPAY as u32 != 0
    }
}

/// Strict DER encoding followed by a hash type byte (BIP66).
pub fn is_valid_signature_encoding(sig: &[u8]) -> bool {
    // 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S] [sighash]
    if sig.len() < 9 || sig.len() > 73 {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != sig.len() - 3 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 7 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 || len_r == 0 || sig[4] & 0x80 != 0 {
        return false;
    }
    // no unnecessary leading zero in R
    if len_r > 1 && sig[4] == 0x00 && sig[5] & 0x80 == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 || len_s == 0 || sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && sig[len_r + 7] & 0x80 == 0 {
        return false;
    }
    true
}

/// S is at most half the curve order. Expects a strictly encoded signature
/// with its hash type byte.
pub fn is_low_der_signature(sig: &[u8]) -> bool {
    let Some((_, der)) = sig.split_last() else {
        return false;
    };
    let Ok(signature) = Signature::from_der_lax(der) else {
        return false;
    };
    let mut normalized = signature;
    normalized.normalize_s();
    normalized == signature
}

/// ALL, NONE or SINGLE, optionally with ANYONECANPAY.
pub fn is_defined_hashtype_signature(sig: &[u8]) -> bool {
    match sig.last() {
        Some(&hash_type) => matches!(hash_type & !SIGHASH_ANYONECANPAY, SIGHASH_ALL..=SIGHASH_SINGLE),
        None => false,
    }
}

/// 33-byte compressed or 65-byte uncompressed SEC encoding.
pub fn is_valid_pubkey_encoding(pubkey: &[u8]) -> bool {
    match pubkey.len() {
        33 => matches!(pubkey[0], 0x02 | 0x03),
        65 => pubkey[0] == 0x04,
        _ => false,
    }
}

pub fn is_compressed_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == 33 && matches!(pubkey[0], 0x02 | 0x03)
}

/// Encoding rules a signature must meet under `flags`. Empty signatures
/// always pass so that a failing CHECKSIG can be expressed compactly.
pub fn check_signature_encoding(sig: &[u8], flags: ScriptFlags) -> Result<(), ScriptError> {
    if sig.is_empty() {
        return Ok(());
    }
    let strict_der = ScriptFlags::DERSIG | ScriptFlags::LOW_S | ScriptFlags::STRICTENC;
    if flags.bits() & strict_der.bits() != 0 && !is_valid_signature_encoding(sig) {
        return Err(ScriptError::SigDerInvalidFormat);
    }
    if flags.contains(ScriptFlags::LOW_S) && !is_low_der_signature(sig) {
        return Err(ScriptError::SigDerHighS);
    }
    if flags.contains(ScriptFlags::STRICTENC) && !is_defined_hashtype_signature(sig) {
        return Err(ScriptError::SigHashtype);
    }
    Ok(())
}

pub fn check_pubkey_encoding(
    pubkey: &[u8],
    flags: ScriptFlags,
    sig_version: SigVersion,
) -> Result<(), ScriptError> {
    if flags.contains(ScriptFlags::STRICTENC) && !is_valid_pubkey_encoding(pubkey) {
        return Err(ScriptError::PubkeyType);
    }
    if flags.contains(ScriptFlags::WITNESS_PUBKEYTYPE)
        && sig_version == SigVersion::WitnessV0
        && !is_compressed_pubkey(pubkey)
    {
        return Err(ScriptError::WitnessPubkeyType);
    }
    Ok(())
}
