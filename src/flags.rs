//! Script verification flags
//!
//! Each flag tightens what counts as a valid script beyond the base rules.
//! Bit positions match the reference validator so flag words can be
//! exchanged with it unchanged.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConsensusError, Result};

/// A set of script verification flags.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ScriptFlags(u32);

impl ScriptFlags {
    pub const NONE: ScriptFlags = ScriptFlags(0);
    /// Evaluate P2SH subscripts (BIP16).
    pub const P2SH: ScriptFlags = ScriptFlags(1 << 0);
    /// Enforce strict signature and public key encodings.
    pub const STRICTENC: ScriptFlags = ScriptFlags(1 << 1);
    /// Enforce strict DER signatures (BIP66).
    pub const DERSIG: ScriptFlags = ScriptFlags(1 << 2);
    /// Require signatures in low-S form.
    pub const LOW_S: ScriptFlags = ScriptFlags(1 << 3);
    /// The dummy CHECKMULTISIG argument must be empty (BIP147).
    pub const NULLDUMMY: ScriptFlags = ScriptFlags(1 << 4);
    /// scriptSig must be push-only.
    pub const SIGPUSHONLY: ScriptFlags = ScriptFlags(1 << 5);
    /// Pushes and numeric operands must be minimally encoded.
    pub const MINIMALDATA: ScriptFlags = ScriptFlags(1 << 6);
    /// Executed NOP1, NOP4-NOP10 fail the script.
    pub const DISCOURAGE_UPGRADABLE_NOPS: ScriptFlags = ScriptFlags(1 << 7);
    /// Exactly one stack element must remain. Requires P2SH.
    pub const CLEANSTACK: ScriptFlags = ScriptFlags(1 << 8);
    /// Enable CHECKLOCKTIMEVERIFY (BIP65).
    pub const CHECKLOCKTIMEVERIFY: ScriptFlags = ScriptFlags(1 << 9);
    /// Enable CHECKSEQUENCEVERIFY (BIP112).
    pub const CHECKSEQUENCEVERIFY: ScriptFlags = ScriptFlags(1 << 10);
    /// Evaluate witness programs (BIP141).
    pub const WITNESS: ScriptFlags = ScriptFlags(1 << 11);
    /// Unknown witness program versions fail the script.
    pub const DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM: ScriptFlags = ScriptFlags(1 << 12);
    /// OP_IF/NOTIF arguments in witness scripts must be empty or 0x01.
    pub const MINIMALIF: ScriptFlags = ScriptFlags(1 << 13);
    /// Failed signature checks require empty signatures.
    pub const NULLFAIL: ScriptFlags = ScriptFlags(1 << 14);
    /// Witness v0 scripts accept compressed public keys only.
    pub const WITNESS_PUBKEYTYPE: ScriptFlags = ScriptFlags(1 << 15);

    /// Flags every block must satisfy.
    pub const MANDATORY: ScriptFlags = ScriptFlags::P2SH;

    /// Every policy flag.
    pub const STANDARD: ScriptFlags = ScriptFlags(0xffff);

    const NAMES: [(&'static str, ScriptFlags); 16] = [
        ("P2SH", ScriptFlags::P2SH),
        ("STRICTENC", ScriptFlags::STRICTENC),
        ("DERSIG", ScriptFlags::DERSIG),
        ("LOW_S", ScriptFlags::LOW_S),
        ("NULLDUMMY", ScriptFlags::NULLDUMMY),
        ("SIGPUSHONLY", ScriptFlags::SIGPUSHONLY),
        ("MINIMALDATA", ScriptFlags::MINIMALDATA),
        ("DISCOURAGE_UPGRADABLE_NOPS", ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS),
        ("CLEANSTACK", ScriptFlags::CLEANSTACK),
        ("CHECKLOCKTIMEVERIFY", ScriptFlags::CHECKLOCKTIMEVERIFY),
        ("CHECKSEQUENCEVERIFY", ScriptFlags::CHECKSEQUENCEVERIFY),
        ("WITNESS", ScriptFlags::WITNESS),
        (
            "DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM",
            ScriptFlags::DISCOURAGE_UPGRADABLE_WITNESS_PROGRAM,
        ),
        ("MINIMALIF", ScriptFlags::MINIMALIF),
        ("NULLFAIL", ScriptFlags::NULLFAIL),
        ("WITNESS_PUBKEYTYPE", ScriptFlags::WITNESS_PUBKEYTYPE),
    ];

    /// Builds a flag set from raw bits, rejecting bits with no meaning.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !ScriptFlags::STANDARD.0 != 0 {
            return Err(ConsensusError::InvalidFlags(format!(
                "unknown flag bits {:#x}",
                bits & !ScriptFlags::STANDARD.0
            )));
        }
        Ok(ScriptFlags(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: ScriptFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ScriptFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ScriptFlags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Rejects flag combinations the verifier cannot honour.
    pub fn validate(self) -> Result<()> {
        if self.contains(ScriptFlags::CLEANSTACK) && !self.contains(ScriptFlags::P2SH) {
            return Err(ConsensusError::InvalidFlags(
                "CLEANSTACK requires P2SH".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<u32> for ScriptFlags {
    type Error = ConsensusError;

    fn try_from(bits: u32) -> Result<Self> {
        ScriptFlags::from_bits(bits)
    }
}

impl From<ScriptFlags> for u32 {
    fn from(flags: ScriptFlags) -> u32 {
        flags.0
    }
}

impl BitOr for ScriptFlags {
    type Output = ScriptFlags;

    fn bitor(self, rhs: ScriptFlags) -> ScriptFlags {
        ScriptFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScriptFlags {
    fn bitor_assign(&mut self, rhs: ScriptFlags) {
        self.0 |= rhs.0;
    }
}

impl FromStr for ScriptFlags {
    type Err = ConsensusError;

    /// Parses comma separated flag names, e.g. `"P2SH,STRICTENC"`.
    /// `""` and `"NONE"` denote the empty set.
    fn from_str(s: &str) -> Result<Self> {
        let mut flags = ScriptFlags::NONE;
        for name in s.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if name == "NONE" {
                continue;
            }
            let (_, flag) = ScriptFlags::NAMES
                .iter()
                .find(|(known, _)| *known == name)
                .ok_or_else(|| ConsensusError::InvalidFlags(format!("unknown flag {name}")))?;
            flags |= *flag;
        }
        Ok(flags)
    }
}

impl fmt::Display for ScriptFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (name, flag) in ScriptFlags::NAMES.iter() {
            if self.contains(*flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
