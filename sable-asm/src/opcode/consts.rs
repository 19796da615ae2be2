//! Opcode byte values.
//!
//! Kept as plain constants so they can be used as enum discriminants and in
//! `match` guards alike.

/// Byte value of CALL.
pub const OP_CALL: u8 = 0x00;
/// Byte value of RET.
pub const OP_RET: u8 = 0x01;
/// Byte value of JMP.
pub const OP_JMP: u8 = 0x02;
/// Byte value of JZE.
pub const OP_JZE: u8 = 0x03;
/// Byte value of JNZ.
pub const OP_JNZ: u8 = 0x04;
/// Byte value of EQ.
pub const OP_EQ: u8 = 0x05;
/// Byte value of NE.
pub const OP_NE: u8 = 0x06;
/// Byte value of LT.
pub const OP_LT: u8 = 0x07;
/// Byte value of LE.
pub const OP_LE: u8 = 0x08;
/// Byte value of GT.
pub const OP_GT: u8 = 0x09;
/// Byte value of GE.
pub const OP_GE: u8 = 0x0a;
/// Byte value of ADD.
pub const OP_ADD: u8 = 0x0b;
/// Byte value of SUB.
pub const OP_SUB: u8 = 0x0c;
/// Byte value of MUL.
pub const OP_MUL: u8 = 0x0d;
/// Byte value of DIV.
pub const OP_DIV: u8 = 0x0e;
/// Byte value of MOD.
pub const OP_MOD: u8 = 0x0f;
/// Byte value of NEG.
pub const OP_NEG: u8 = 0x10;
/// Byte value of INC.
pub const OP_INC: u8 = 0x11;
/// Byte value of DEC.
pub const OP_DEC: u8 = 0x12;
/// Byte value of AND.
pub const OP_AND: u8 = 0x13;
/// Byte value of OR.
pub const OP_OR: u8 = 0x14;
/// Byte value of XOR.
pub const OP_XOR: u8 = 0x15;
/// Byte value of SHL.
pub const OP_SHL: u8 = 0x16;
/// Byte value of SHR.
pub const OP_SHR: u8 = 0x17;
/// Byte value of BITNOT.
pub const OP_BITNOT: u8 = 0x18;
/// Byte value of LOGNOT.
pub const OP_LOGNOT: u8 = 0x19;
/// Byte value of TYPEOF.
pub const OP_TYPEOF: u8 = 0x1a;
/// Byte value of CONCAT.
pub const OP_CONCAT: u8 = 0x1b;
/// Byte value of LDCONST.
pub const OP_LDCONST: u8 = 0x1c;
/// Byte value of LDSYM.
pub const OP_LDSYM: u8 = 0x1d;
/// Byte value of MOV.
pub const OP_MOV: u8 = 0x1e;
/// Byte value of ARGV.
pub const OP_ARGV: u8 = 0x1f;
/// Byte value of NEWARR.
pub const OP_NEWARR: u8 = 0x20;
/// Byte value of NEWHASH.
pub const OP_NEWHASH: u8 = 0x21;
/// Byte value of IDXGET.
pub const OP_IDXGET: u8 = 0x22;
/// Byte value of IDXSET.
pub const OP_IDXSET: u8 = 0x23;
/// Byte value of ARRPUSH.
pub const OP_ARRPUSH: u8 = 0x24;
/// Byte value of FUNCTION.
pub const OP_FUNCTION: u8 = 0x25;
/// Byte value of GLBVAL.
pub const OP_GLBVAL: u8 = 0x26;
/// Byte value of CLOSURE.
pub const OP_CLOSURE: u8 = 0x27;
/// Byte value of LDUPVAL.
pub const OP_LDUPVAL: u8 = 0x28;
/// Byte value of METHOD.
pub const OP_METHOD: u8 = 0x29;
/// Byte value of PROPGET.
pub const OP_PROPGET: u8 = 0x2a;
/// Byte value of PROPSET.
pub const OP_PROPSET: u8 = 0x2b;

/// One past the highest assigned opcode byte.
pub const OP_LIMIT: u8 = 0x2c;
