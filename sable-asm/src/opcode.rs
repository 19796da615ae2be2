use crate::instruction::Instruction;
use crate::{RegisterId, SymbolId, Word};

use consts::*;

pub mod consts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
/// Opcode byte representation, without operands.
///
/// This is what the dispatch loop matches on after decoding an
/// [`Instruction`]; the operand-carrying [`Opcode`] enum is the
/// construction-side counterpart.
pub enum OpcodeRepr {
    /// Call a function value.
    CALL = OP_CALL,
    /// Return from the current frame.
    RET = OP_RET,
    /// Unconditional relative jump.
    JMP = OP_JMP,
    /// Jump if a boolean register is false.
    JZE = OP_JZE,
    /// Jump if a boolean register is true.
    JNZ = OP_JNZ,
    /// Value equality.
    EQ = OP_EQ,
    /// Value inequality.
    NE = OP_NE,
    /// Ordered less-than.
    LT = OP_LT,
    /// Ordered less-or-equal.
    LE = OP_LE,
    /// Ordered greater-than.
    GT = OP_GT,
    /// Ordered greater-or-equal.
    GE = OP_GE,
    /// Numeric addition.
    ADD = OP_ADD,
    /// Numeric subtraction.
    SUB = OP_SUB,
    /// Numeric multiplication.
    MUL = OP_MUL,
    /// Numeric division.
    DIV = OP_DIV,
    /// Integer remainder.
    MOD = OP_MOD,
    /// Numeric negation.
    NEG = OP_NEG,
    /// In-place increment of a number register.
    INC = OP_INC,
    /// In-place decrement of a number register.
    DEC = OP_DEC,
    /// Bitwise and.
    AND = OP_AND,
    /// Bitwise or.
    OR = OP_OR,
    /// Bitwise xor.
    XOR = OP_XOR,
    /// Left shift.
    SHL = OP_SHL,
    /// Right shift.
    SHR = OP_SHR,
    /// Bitwise complement.
    BITNOT = OP_BITNOT,
    /// Boolean negation.
    LOGNOT = OP_LOGNOT,
    /// Type name of a value.
    TYPEOF = OP_TYPEOF,
    /// String concatenation.
    CONCAT = OP_CONCAT,
    /// Load an inline constant.
    LDCONST = OP_LDCONST,
    /// Load a local symbol-table slot, resolving stubs against globals.
    LDSYM = OP_LDSYM,
    /// Register-to-register copy.
    MOV = OP_MOV,
    /// Materialise the current frame's argument array.
    ARGV = OP_ARGV,
    /// Fresh empty array.
    NEWARR = OP_NEWARR,
    /// Fresh empty hashmap.
    NEWHASH = OP_NEWHASH,
    /// Indexed read (array, string or hashmap).
    IDXGET = OP_IDXGET,
    /// Indexed write (array or hashmap).
    IDXSET = OP_IDXSET,
    /// Append to an array.
    ARRPUSH = OP_ARRPUSH,
    /// Skip over an inline nested function body.
    FUNCTION = OP_FUNCTION,
    /// Define a global from a register; fails if already defined.
    GLBVAL = OP_GLBVAL,
    /// Wrap the prototype function in a register into a closure.
    CLOSURE = OP_CLOSURE,
    /// Load an upvalue of the executing closure.
    LDUPVAL = OP_LDUPVAL,
    /// Class-chain method lookup.
    METHOD = OP_METHOD,
    /// Property read through the accessor protocol.
    PROPGET = OP_PROPGET,
    /// Property write through the accessor protocol.
    PROPSET = OP_PROPSET,
}

impl OpcodeRepr {
    /// Decode an opcode byte; `None` for bytes outside the opcode range.
    pub fn from_u8(b: u8) -> Option<Self> {
        Self::from_repr(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Instruction representation with operands, used to construct bytecode.
///
/// Each variant encodes to exactly one [`Word`]. Instructions with trailing
/// operand words (constant payloads, jump offsets, packed call arguments,
/// closure descriptors, inline global names) emit those words separately;
/// the emitter in the compiler owns that layout.
pub enum Opcode {
    /// `A` = caller return slot, `B` = callee register, `C` = argc.
    ///
    /// Followed by `packed_words(argc)` words of packed 8-bit argument
    /// register indices.
    CALL(RegisterId, RegisterId, u8),
    /// Return the value in register `A`, popping the current frame.
    RET(RegisterId),
    /// Unconditional jump; followed by one signed offset word.
    JMP,
    /// Jump if the boolean in `A` is false; followed by one offset word.
    JZE(RegisterId),
    /// Jump if the boolean in `A` is true; followed by one offset word.
    JNZ(RegisterId),
    /// `A = B == C`. Never fails.
    EQ(RegisterId, RegisterId, RegisterId),
    /// `A = B != C`. Never fails.
    NE(RegisterId, RegisterId, RegisterId),
    /// `A = B < C` over two numbers or two ordered objects.
    LT(RegisterId, RegisterId, RegisterId),
    /// `A = B <= C`.
    LE(RegisterId, RegisterId, RegisterId),
    /// `A = B > C`.
    GT(RegisterId, RegisterId, RegisterId),
    /// `A = B >= C`.
    GE(RegisterId, RegisterId, RegisterId),
    /// `A = B + C` over numbers.
    ADD(RegisterId, RegisterId, RegisterId),
    /// `A = B - C` over numbers.
    SUB(RegisterId, RegisterId, RegisterId),
    /// `A = B * C` over numbers.
    MUL(RegisterId, RegisterId, RegisterId),
    /// `A = B / C`; integer division truncates, zero divisor errors.
    DIV(RegisterId, RegisterId, RegisterId),
    /// `A = B % C` over integers.
    MOD(RegisterId, RegisterId, RegisterId),
    /// `A = -B` over a number.
    NEG(RegisterId, RegisterId),
    /// `A += 1` in place.
    INC(RegisterId),
    /// `A -= 1` in place.
    DEC(RegisterId),
    /// `A = B & C` over integers.
    AND(RegisterId, RegisterId, RegisterId),
    /// `A = B | C` over integers.
    OR(RegisterId, RegisterId, RegisterId),
    /// `A = B ^ C` over integers.
    XOR(RegisterId, RegisterId, RegisterId),
    /// `A = B << C` over integers.
    SHL(RegisterId, RegisterId, RegisterId),
    /// `A = B >> C` over integers.
    SHR(RegisterId, RegisterId, RegisterId),
    /// `A = ~B` over an integer.
    BITNOT(RegisterId, RegisterId),
    /// `A = !B` over a boolean.
    LOGNOT(RegisterId, RegisterId),
    /// `A` = type-name string of `B`.
    TYPEOF(RegisterId, RegisterId),
    /// `A = B .. C` over two strings.
    CONCAT(RegisterId, RegisterId, RegisterId),
    /// Load constant kind `B` into `A`; int/float kinds read two payload
    /// words.
    LDCONST(RegisterId, ConstOperand),
    /// Load symbol-table slot `MID` into `A`, resolving stubs.
    LDSYM(RegisterId, SymbolId),
    /// `A = B`.
    MOV(RegisterId, RegisterId),
    /// `A` = the frame's (cached) argument array.
    ARGV(RegisterId),
    /// `A` = fresh empty array.
    NEWARR(RegisterId),
    /// `A` = fresh empty hashmap.
    NEWHASH(RegisterId),
    /// `A = B[C]`.
    IDXGET(RegisterId, RegisterId, RegisterId),
    /// `A[B] = C`.
    IDXSET(RegisterId, RegisterId, RegisterId),
    /// Append `B` to the array in `A`.
    ARRPUSH(RegisterId, RegisterId),
    /// Step over the function header and body that follow.
    FUNCTION,
    /// Define global named by the `MID`-byte inline name from register `A`.
    GLBVAL(RegisterId, SymbolId),
    /// Close over the prototype in `A` with `B` descriptor words following.
    CLOSURE(RegisterId, u8),
    /// `A` = upvalue `B` of the executing closure.
    LDUPVAL(RegisterId, u8),
    /// `A` = method `C` (a string register) of object `B`.
    METHOD(RegisterId, RegisterId, RegisterId),
    /// Property `MID` (a symbol-table string) of the object in `A`, written
    /// back into `A`.
    PROPGET(RegisterId, SymbolId),
    /// `A.name = C` where `B` holds the property-name string.
    PROPSET(RegisterId, RegisterId, RegisterId),
}

/// Constant-kind operand of [`Opcode::LDCONST`].
pub type ConstOperand = u8;

impl Opcode {
    /// Opcode byte of this instruction.
    pub const fn repr(&self) -> OpcodeRepr {
        match self {
            Self::CALL(..) => OpcodeRepr::CALL,
            Self::RET(..) => OpcodeRepr::RET,
            Self::JMP => OpcodeRepr::JMP,
            Self::JZE(..) => OpcodeRepr::JZE,
            Self::JNZ(..) => OpcodeRepr::JNZ,
            Self::EQ(..) => OpcodeRepr::EQ,
            Self::NE(..) => OpcodeRepr::NE,
            Self::LT(..) => OpcodeRepr::LT,
            Self::LE(..) => OpcodeRepr::LE,
            Self::GT(..) => OpcodeRepr::GT,
            Self::GE(..) => OpcodeRepr::GE,
            Self::ADD(..) => OpcodeRepr::ADD,
            Self::SUB(..) => OpcodeRepr::SUB,
            Self::MUL(..) => OpcodeRepr::MUL,
            Self::DIV(..) => OpcodeRepr::DIV,
            Self::MOD(..) => OpcodeRepr::MOD,
            Self::NEG(..) => OpcodeRepr::NEG,
            Self::INC(..) => OpcodeRepr::INC,
            Self::DEC(..) => OpcodeRepr::DEC,
            Self::AND(..) => OpcodeRepr::AND,
            Self::OR(..) => OpcodeRepr::OR,
            Self::XOR(..) => OpcodeRepr::XOR,
            Self::SHL(..) => OpcodeRepr::SHL,
            Self::SHR(..) => OpcodeRepr::SHR,
            Self::BITNOT(..) => OpcodeRepr::BITNOT,
            Self::LOGNOT(..) => OpcodeRepr::LOGNOT,
            Self::TYPEOF(..) => OpcodeRepr::TYPEOF,
            Self::CONCAT(..) => OpcodeRepr::CONCAT,
            Self::LDCONST(..) => OpcodeRepr::LDCONST,
            Self::LDSYM(..) => OpcodeRepr::LDSYM,
            Self::MOV(..) => OpcodeRepr::MOV,
            Self::ARGV(..) => OpcodeRepr::ARGV,
            Self::NEWARR(..) => OpcodeRepr::NEWARR,
            Self::NEWHASH(..) => OpcodeRepr::NEWHASH,
            Self::IDXGET(..) => OpcodeRepr::IDXGET,
            Self::IDXSET(..) => OpcodeRepr::IDXSET,
            Self::ARRPUSH(..) => OpcodeRepr::ARRPUSH,
            Self::FUNCTION => OpcodeRepr::FUNCTION,
            Self::GLBVAL(..) => OpcodeRepr::GLBVAL,
            Self::CLOSURE(..) => OpcodeRepr::CLOSURE,
            Self::LDUPVAL(..) => OpcodeRepr::LDUPVAL,
            Self::METHOD(..) => OpcodeRepr::METHOD,
            Self::PROPGET(..) => OpcodeRepr::PROPGET,
            Self::PROPSET(..) => OpcodeRepr::PROPSET,
        }
    }
}

const fn abc(op: u8, a: u8, b: u8, c: u8) -> Word {
    (op as Word) | ((a as Word) << 8) | ((b as Word) << 16) | ((c as Word) << 24)
}

const fn amid(op: u8, a: u8, mid: u16) -> Word {
    (op as Word) | ((a as Word) << 8) | ((mid as Word) << 16)
}

impl From<Opcode> for Word {
    fn from(op: Opcode) -> Word {
        let byte = op.repr() as u8;

        match op {
            Opcode::CALL(a, b, c)
            | Opcode::EQ(a, b, c)
            | Opcode::NE(a, b, c)
            | Opcode::LT(a, b, c)
            | Opcode::LE(a, b, c)
            | Opcode::GT(a, b, c)
            | Opcode::GE(a, b, c)
            | Opcode::ADD(a, b, c)
            | Opcode::SUB(a, b, c)
            | Opcode::MUL(a, b, c)
            | Opcode::DIV(a, b, c)
            | Opcode::MOD(a, b, c)
            | Opcode::AND(a, b, c)
            | Opcode::OR(a, b, c)
            | Opcode::XOR(a, b, c)
            | Opcode::SHL(a, b, c)
            | Opcode::SHR(a, b, c)
            | Opcode::CONCAT(a, b, c)
            | Opcode::IDXGET(a, b, c)
            | Opcode::IDXSET(a, b, c)
            | Opcode::METHOD(a, b, c)
            | Opcode::PROPSET(a, b, c) => abc(byte, a, b, c),

            Opcode::NEG(a, b)
            | Opcode::BITNOT(a, b)
            | Opcode::LOGNOT(a, b)
            | Opcode::TYPEOF(a, b)
            | Opcode::MOV(a, b)
            | Opcode::ARRPUSH(a, b)
            | Opcode::LDCONST(a, b)
            | Opcode::CLOSURE(a, b)
            | Opcode::LDUPVAL(a, b) => abc(byte, a, b, 0),

            Opcode::RET(a)
            | Opcode::JZE(a)
            | Opcode::JNZ(a)
            | Opcode::INC(a)
            | Opcode::DEC(a)
            | Opcode::ARGV(a)
            | Opcode::NEWARR(a)
            | Opcode::NEWHASH(a) => abc(byte, a, 0, 0),

            Opcode::LDSYM(a, mid) | Opcode::GLBVAL(a, mid) | Opcode::PROPGET(a, mid) => {
                amid(byte, a, mid)
            }

            Opcode::JMP | Opcode::FUNCTION => byte as Word,
        }
    }
}

impl From<Opcode> for Instruction {
    fn from(op: Opcode) -> Instruction {
        Instruction::new(Word::from(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn opcode_byte_round_trip() {
        for repr in OpcodeRepr::iter() {
            assert_eq!(Some(repr), OpcodeRepr::from_u8(repr as u8));
        }
    }

    #[test]
    fn bytes_outside_the_opcode_range_do_not_decode() {
        let last = OpcodeRepr::iter().last().unwrap() as u8;
        for b in (last + 1)..=u8::MAX {
            assert_eq!(None, OpcodeRepr::from_u8(b));
        }
    }

    #[test]
    fn operand_fields_land_where_the_decoder_reads_them() {
        let word = Word::from(Opcode::ADD(0x10, 0x20, 0x30));
        let parsed = Instruction::new(word);

        assert_eq!(parsed.op(), OP_ADD);
        assert_eq!(parsed.a(), 0x10);
        assert_eq!(parsed.b(), 0x20);
        assert_eq!(parsed.c(), 0x30);

        let word = Word::from(Opcode::LDSYM(0x07, 0xbeef));
        let parsed = Instruction::new(word);

        assert_eq!(parsed.op(), OP_LDSYM);
        assert_eq!(parsed.a(), 0x07);
        assert_eq!(parsed.mid(), 0xbeef);
    }
}
