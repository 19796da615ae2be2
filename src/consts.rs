//! Encoding-imposed limits.

use static_assertions::const_assert;

/// Registers addressable by an 8-bit operand; also the frame-size ceiling.
pub const MAX_REGS: usize = 256;

/// Maximum declared or supplied argument count of a single call.
pub const MAX_ARGC: usize = 255;

/// Slots addressable by LDSYM's 16-bit symbol index.
pub const MAX_SYMBOLS: usize = 1 << 16;

/// Captures expressible by CLOSURE's 8-bit count operand.
pub const MAX_UPVALUES: usize = 255;

// Arguments land in the first `decl_argc` registers of the callee frame.
const_assert!(MAX_ARGC < MAX_REGS);
