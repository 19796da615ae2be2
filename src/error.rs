//! Error taxonomy of the whole pipeline.
//!
//! Four kinds surface to embedders, mirroring the stage that raised them:
//! `syntax` (lexer/parser), `semantic` (compiler), `runtime` (VM, with word
//! address and stack trace) and `generic` (I/O and object-format problems).
//! The VM materialises runtime failures as a single [`RuntimeTrap`] record;
//! the trap slot is first-writer-wins and survives until the next public
//! entry into the VM.

use crate::ast::SourceLocation;

use sable_asm::BytecodeError;

use std::io;
use std::rc::Rc;
use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Lexer or parser rejection; no partial AST is produced.
    Syntax,
    /// Compiler rejection; no bytecode is produced.
    Semantic,
    /// VM failure; frames were unwound, the trap record remains readable.
    Runtime,
    /// File I/O or object-format failure.
    Generic,
}

/// Any failure of the compile-and-execute pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Lexer/parser rejection.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    /// Compiler rejection.
    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),
    /// VM failure.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeTrap),
    /// Object-format violation.
    #[error(transparent)]
    Format(#[from] BytecodeError),
    /// Host I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An operation expecting a compiled top-level program got something
    /// else.
    #[error("value is not a compiled top-level program")]
    NotAProgram,
}

impl Error {
    /// The broad kind of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::Semantic(_) => ErrorKind::Semantic,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Format(_) | Self::Io(_) | Self::NotAProgram => ErrorKind::Generic,
        }
    }

    /// Source location, for the kinds that carry one.
    pub const fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Syntax(e) => Some(e.location),
            Self::Semantic(e) => Some(e.location),
            _ => None,
        }
    }
}

/// Lexer/parser rejection with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {location}")]
pub struct SyntaxError {
    /// Human-readable description.
    pub message: String,
    /// Position of the offending token.
    pub location: SourceLocation,
}

impl SyntaxError {
    /// A located syntax error.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Compiler rejection with its source position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {location}")]
pub struct SemanticError {
    /// What the compiler objected to.
    pub kind: SemanticErrorKind,
    /// Position of the offending construct.
    pub location: SourceLocation,
}

impl SemanticError {
    /// A located semantic error.
    pub const fn new(kind: SemanticErrorKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

/// The compile-time rejections.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticErrorKind {
    /// A name that resolves neither locally, nor as an upvalue, nor as a
    /// plausible global was assigned to.
    #[error("assignment to undeclared variable `{0}`")]
    AssignUndeclared(Rc<str>),
    /// Captured variables are bound by value at closure construction and
    /// cannot be written.
    #[error("cannot assign to captured variable `{0}`")]
    AssignCaptured(Rc<str>),
    /// `++`/`--` applies to simple variables only.
    #[error("`++`/`--` target must be a variable")]
    InvalidIncDecTarget,
    /// Assignment to something that is not a variable, subscript or member.
    #[error("invalid assignment target")]
    InvalidAssignTarget,
    /// A statement node reached expression position (hand-built AST only;
    /// the parser cannot produce this).
    #[error("statement in expression position")]
    NotAnExpression,
    /// `break` outside any loop.
    #[error("`break` outside of a loop")]
    BreakOutsideLoop,
    /// `continue` outside any loop.
    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,
    /// A function body needs more registers than an 8-bit operand reaches.
    #[error("function needs more than 256 registers")]
    TooManyRegisters,
    /// More arguments than an 8-bit count can express.
    #[error("call with {0} arguments exceeds the limit of 255")]
    TooManyArgs(usize),
    /// More declared parameters than an 8-bit count can express.
    #[error("function with {0} parameters exceeds the limit of 255")]
    TooManyParams(usize),
    /// The translation unit interned more symbols than LDSYM can index.
    #[error("translation unit exceeds 65536 symbols")]
    TooManySymbols,
    /// More captures than an 8-bit descriptor operand can express.
    #[error("closure exceeds 256 captured variables")]
    TooManyUpvalues,
    /// A global name longer than GLBVAL's 16-bit length field.
    #[error("global name `{0}…` is too long")]
    NameTooLong(Rc<str>),
}

/// Recoverable VM failures.
///
/// Every variant unwinds the frames pushed since the last public entry and
/// is recorded in the VM's trap slot together with the faulting word
/// address and a stack trace.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Integer division or remainder with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// An operand had the wrong runtime type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// What the instruction required.
        expected: &'static str,
        /// What it got.
        found: &'static str,
    },
    /// Ordered comparison of values with no common order.
    #[error("values of type {left} and {right} cannot be ordered")]
    NotComparable {
        /// Type of the left operand.
        left: &'static str,
        /// Type of the right operand.
        right: &'static str,
    },
    /// Array or string index outside `[0, len)`.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The rejected index.
        index: i64,
        /// Container length at the time of access.
        len: usize,
    },
    /// Array or string index of a non-integer type.
    #[error("index must be an integer, found {0}")]
    NonIntegerIndex(&'static str),
    /// Indexing something that is not an array, string or hashmap.
    #[error("value of type {0} cannot be indexed")]
    NotIndexable(&'static str),
    /// Nil or NaN used as a hashmap key.
    #[error("hashmap key cannot be {0}")]
    InvalidKey(&'static str),
    /// CALL on a value that is not a function.
    #[error("value of type {0} cannot be called")]
    NotCallable(&'static str),
    /// LDSYM found no non-nil global under a stub's name.
    #[error("undefined global `{0}`")]
    UndefinedGlobal(Rc<str>),
    /// GLBVAL over a name that already holds a non-nil global.
    #[error("global `{0}` is already defined")]
    GlobalRedefinition(Rc<str>),
    /// Property read found no value and no getter.
    #[error("no getter for property `{0}`")]
    NoGetter(Rc<str>),
    /// Property write found no setter and the receiver is not a hashmap.
    #[error("no setter for property `{0}`")]
    NoSetter(Rc<str>),
    /// Method lookup on a value whose type has no class descriptor.
    #[error("no class for value of type {0}")]
    NoClass(&'static str),
    /// A script function outlived its environment program.
    #[error("script function outlived its program")]
    DeadEnvironment,
    /// The opcode byte decodes to nothing.
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    /// A register operand points outside the current frame.
    #[error("register {0} outside the current frame")]
    RegisterOutOfFrame(u8),
    /// LDSYM's operand points outside the local symbol table.
    #[error("symbol {0} outside the local symbol table")]
    BadSymbolIndex(u16),
    /// LDUPVAL's operand points outside the closure's captures.
    #[error("upvalue {0} outside the closure's captures")]
    BadUpvalueIndex(u8),
    /// Control flow left the executable region.
    #[error("jump outside the executable region")]
    JumpOutOfBounds,
    /// Structurally invalid instruction stream.
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(&'static str),
    /// Symbol-table or inline-name decoding failure.
    #[error("malformed bytecode: {0}")]
    Bytecode(#[from] BytecodeError),
    /// A `super` chain that never terminates.
    #[error("class chain exceeds 256 links")]
    ClassChainTooDeep,
    /// The configured call-depth limit was hit.
    #[error("call depth limit of {0} frames exceeded")]
    CallDepthExceeded(usize),
    /// The configured register-stack limit was hit.
    #[error("register stack limit of {0} slots exceeded")]
    StackOverflow(usize),
    /// A native extension function reported failure.
    #[error("native function `{name}` failed: {message}")]
    Native {
        /// The native's registered name.
        name: Rc<str>,
        /// Its failure description.
        message: String,
    },
    /// Broken internal invariant; never raised by well-formed input.
    #[error("VM invariant violated: {0}")]
    Bug(&'static str),
}

/// The VM's materialised error record: what failed, where, and the call
/// stack at the point of failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeTrap {
    /// The failure itself.
    pub error: RuntimeError,
    /// Word address of the faulting instruction, when raised mid-dispatch.
    pub address: Option<usize>,
    /// Callee names, innermost frame first.
    pub backtrace: Vec<FrameInfo>,
}

impl RuntimeTrap {
    /// One-line rendering of the call stack, innermost callee first.
    pub fn render_backtrace(&self) -> String {
        use itertools::Itertools;

        self.backtrace.iter().map(FrameInfo::name).join(" < ")
    }
}

impl std::fmt::Display for RuntimeTrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)?;
        if let Some(address) = self.address {
            write!(f, " at word {address}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeTrap {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// One stack-trace entry: the callee of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    name: Rc<str>,
}

impl FrameInfo {
    /// Trace entry for a callee name.
    pub fn new(name: Rc<str>) -> Self {
        Self { name }
    }

    /// The callee function's name; `<lambda>` for anonymous functions.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Cheap, clonable summary of the last error, kept by the context façade.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// Broad kind.
    pub kind: ErrorKind,
    /// Rendered message.
    pub message: String,
    /// Source location for front-end kinds.
    pub location: Option<SourceLocation>,
}

impl From<&Error> for ErrorRecord {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            location: error.location(),
        }
    }
}
