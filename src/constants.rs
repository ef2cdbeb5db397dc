//! Script consensus constants

/// Maximum serialized script length
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of bytes pushable to the stack
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum combined size of the main and alternate stacks
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations per script
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum number of public keys per CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

/// Default byte width of numeric operands
pub const SCRIPTNUM_MAX_SIZE: usize = 4;

/// Byte width of CHECKLOCKTIMEVERIFY / CHECKSEQUENCEVERIFY operands
pub const LOCKTIME_SCRIPTNUM_MAX_SIZE: usize = 5;

/// Lock time threshold: lock times below this are block heights
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number marking an input as final
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// If set, the sequence number is not interpreted as a relative lock time
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// If set, the relative lock time is in units of 512 seconds instead of blocks
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Mask extracting the relative lock time value from a sequence number
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000ffff;

/// Smallest witness program length in bytes
pub const MIN_WITNESS_PROGRAM_SIZE: usize = 2;

/// Largest witness program length in bytes
pub const MAX_WITNESS_PROGRAM_SIZE: usize = 40;

/// Largest serialized OP_RETURN script still classified as a data output
pub const MAX_DATA_OUT_SCRIPT_SIZE: usize = 223;
