//! Sable: a small, dynamically-typed, C-style scripting language.
//!
//! A source program runs through four stages — lexing, parsing,
//! compilation to a flat bytecode, and execution on a register-based
//! virtual machine — and interoperates with host code through the value
//! API and native extension functions. The word-level bytecode types live
//! in the `sable-asm` crate; this crate holds everything above them.
//!
//! The usual entry point is the [`context::Context`] façade:
//!
//! ```
//! use sable_vm::prelude::*;
//!
//! let mut ctx = Context::new();
//! let result = ctx.eval_source("return 1 + 2 * 3;").unwrap();
//! assert_eq!(result, Value::Int(7));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod compiler;
pub mod consts;
pub mod context;
pub mod error;
pub mod function;
pub mod lexer;
pub mod map;
pub mod params;
pub mod parser;
pub mod value;
pub mod vm;

pub mod prelude {
    //! Re-exports of the types most embedders touch.

    pub use sable_asm::{Instruction, Opcode, OpcodeRepr, RegisterId, SymbolId, Word};

    pub use crate::ast::SourceLocation;
    pub use crate::compiler::Compiler;
    pub use crate::context::Context;
    pub use crate::error::{
        Error, ErrorKind, ErrorRecord, FrameInfo, RuntimeError, RuntimeTrap, SemanticError,
        SyntaxError,
    };
    pub use crate::function::{Function, NativeFn, Program};
    pub use crate::map::ValueMap;
    pub use crate::params::VmParams;
    pub use crate::value::Value;
    pub use crate::vm::Vm;
}
