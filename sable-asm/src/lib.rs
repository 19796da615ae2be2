//! Atomic bytecode types of the Sable VM.
//!
//! A compiled Sable translation unit is a flat array of [`Word`]s: a
//! four-word program header, the executable region, and a local symbol
//! table. This crate defines the word-level encoding — the opcode set, the
//! packed instruction layout, the program/function header layout, the
//! symbol-table entry layout — and the object-file serialisation. It knows
//! nothing about values or execution; that lives in the VM crate.

#![warn(missing_docs)]

mod bytes;
mod instruction;
mod layout;
mod opcode;

pub use bytes::{from_bytes, to_bytes, BytecodeError};
pub use instruction::Instruction;
pub use layout::{
    decode_f64, decode_i64, decode_str, encode_f64, encode_i64, encode_str, pack_indices,
    packed_words, str_words, unpack_indices, ConstKind, SymbolTag, UpvalKind, FUNC_BODY_LEN,
    FUNC_DECL_ARGC, FUNC_HEADER_LEN, FUNC_NREGS, HDR_FRAME_SIZE, HDR_MAGIC, HDR_SYMBOL_COUNT,
    HDR_SYMTAB_OFFSET, MAGIC, PROGRAM_HEADER_LEN, WORD_OCTETS,
};
pub use opcode::{Opcode, OpcodeRepr};

/// A bytecode word. Programs, headers and symbol tables are arrays of these.
pub type Word = u32;

/// An 8-bit register index into the current stack frame.
pub type RegisterId = u8;

/// A 16-bit index into a program's local symbol table.
pub type SymbolId = u16;
