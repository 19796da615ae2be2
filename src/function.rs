//! Function objects and the top-level program.
//!
//! A [`Program`] owns the bytecode of one translation unit plus its lazily
//! populated local symbol table. Script functions and closures alias that
//! buffer through a weak environment reference; the program stays alive as
//! long as any caller holds its value, and the weak link keeps the symbol
//! table (which stores the nested script-function values) from forming a
//! strong cycle with it.

use crate::ast::SourceLocation;
use crate::error::RuntimeError;
use crate::value::Value;
use crate::vm::Vm;

use sable_asm::{
    from_bytes, to_bytes, BytecodeError, Word, HDR_FRAME_SIZE, HDR_SYMBOL_COUNT,
    HDR_SYMTAB_OFFSET,
};

use std::cell::{Cell, OnceCell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

/// Signature of a native extension function.
///
/// The VM retains no reference to `args` after the call returns; natives
/// clone what they keep. `Err` unwinds as a runtime error.
pub type NativeFn = fn(&mut Vm, &[Value]) -> Result<Value, RuntimeError>;

/// A host function callable from script code.
#[derive(Clone)]
pub struct NativeFunction {
    /// Registered name, used in stack traces.
    pub name: Rc<str>,
    /// The entry point.
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A function whose body lives inside some program's bytecode.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    /// Name from the symbol table; empty for anonymous functions.
    pub name: Rc<str>,
    /// Word offset of the function header inside the environment's
    /// bytecode.
    pub entry: usize,
    /// The program whose buffer holds the body and whose symbol table
    /// resolves its LDSYMs.
    pub env: Weak<Program>,
}

/// A closure: a script prototype plus captured values.
///
/// The upvalue sequence is write-once: CLOSURE installs the closure value
/// into the prototype's register before consuming its descriptors, so a
/// self-capturing closure observes itself, and the cell is sealed right
/// after.
#[derive(Debug)]
pub struct Closure {
    /// The wrapped prototype.
    pub proto: ScriptFunction,
    /// Captured values, immutable once set.
    pub upvalues: OnceCell<Box<[Value]>>,
}

/// Any callable value.
#[derive(Debug)]
pub enum Function {
    /// Host extension function.
    Native(NativeFunction),
    /// Function defined by script code inside some program.
    Script(ScriptFunction),
    /// A whole translation unit; calling it runs the top-level body.
    Program(Rc<Program>),
    /// Script function with captured upvalues.
    Closure(Closure),
}

impl Function {
    /// Name used in stack traces; `<lambda>` for anonymous functions.
    pub fn name(&self) -> &str {
        match self {
            Self::Native(n) => &n.name,
            Self::Script(s) if !s.name.is_empty() => &s.name,
            Self::Closure(c) if !c.proto.name.is_empty() => &c.proto.name,
            Self::Script(_) | Self::Closure(_) => "<lambda>",
            Self::Program(p) => p.name(),
        }
    }
}

impl Value {
    /// Wrap a host function into a callable value.
    pub fn native(name: impl AsRef<str>, func: NativeFn) -> Value {
        Value::Function(Rc::new(Function::Native(NativeFunction {
            name: Rc::from(name.as_ref()),
            func,
        })))
    }
}

/// One slot of a program's local symbol table.
///
/// String constants and nested function definitions are resolved at
/// population time; global references start as stubs and are promoted in
/// place by the first successful LDSYM.
#[derive(Debug, Clone)]
pub enum SymbolSlot {
    /// A usable value.
    Resolved(Value),
    /// An unresolved global reference by name.
    Stub(Rc<str>),
}

/// Word-address-to-source mapping of a compiled unit.
///
/// Entries are pushed in address order during compilation; lookup finds the
/// last entry at or before an address. Not serialised into object files.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    entries: Vec<(usize, SourceLocation)>,
}

impl DebugInfo {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that code from `address` on comes from `loc`.
    pub fn push(&mut self, address: usize, loc: SourceLocation) {
        if self.entries.last().map(|(a, _)| *a) != Some(address) {
            self.entries.push((address, loc));
        }
    }

    /// Source location of the code at `address`.
    pub fn lookup(&self, address: usize) -> Option<SourceLocation> {
        let idx = self.entries.partition_point(|(a, _)| *a <= address);
        idx.checked_sub(1).map(|i| self.entries[i].1)
    }
}

/// A compiled translation unit: owned bytecode, the one-shot symbol-table
/// gate, the symbol table itself, and optional debug info.
#[derive(Debug)]
pub struct Program {
    code: Vec<Word>,
    name: Rc<str>,
    symtab: RefCell<Vec<SymbolSlot>>,
    symtab_loaded: Cell<bool>,
    debug: Option<DebugInfo>,
}

impl Program {
    /// Wrap freshly compiled words. The compiler guarantees header shape.
    pub(crate) fn new(code: Vec<Word>, name: Rc<str>, debug: Option<DebugInfo>) -> Self {
        Self {
            code,
            name,
            symtab: RefCell::new(Vec::new()),
            symtab_loaded: Cell::new(false),
            debug,
        }
    }

    /// Read a program back from object-file bytes, validating the header.
    pub fn from_object_bytes(bytes: &[u8], name: impl AsRef<str>) -> Result<Self, BytecodeError> {
        let code = from_bytes(bytes)?;

        Ok(Self::new(code, Rc::from(name.as_ref()), None))
    }

    /// Dump the raw object-file bytes of this program.
    pub fn dump(&self) -> Vec<u8> {
        to_bytes(&self.code)
    }

    /// The bytecode words.
    pub fn code(&self) -> &[Word] {
        &self.code
    }

    /// Program name used in traces; the compile entry points pass the file
    /// name or `<script>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// End of the executable region / start of the symbol table.
    pub fn symtab_offset(&self) -> usize {
        self.code[HDR_SYMTAB_OFFSET] as usize
    }

    /// Declared symbol count.
    pub fn symbol_count(&self) -> usize {
        self.code[HDR_SYMBOL_COUNT] as usize
    }

    /// Register count of the top-level frame.
    pub fn frame_size(&self) -> usize {
        self.code[HDR_FRAME_SIZE] as usize
    }

    /// Whether the symbol table has been populated.
    pub fn symtab_loaded(&self) -> bool {
        self.symtab_loaded.get()
    }

    /// Seal the one-shot symbol-table gate.
    pub(crate) fn mark_symtab_loaded(&self) {
        self.symtab_loaded.set(true);
    }

    /// Shared view of the symbol table.
    pub(crate) fn symtab(&self) -> Ref<'_, Vec<SymbolSlot>> {
        self.symtab.borrow()
    }

    /// Mutable view of the symbol table (population and LDSYM promotion).
    pub(crate) fn symtab_mut(&self) -> RefMut<'_, Vec<SymbolSlot>> {
        self.symtab.borrow_mut()
    }

    /// Source location of the instruction at `address`, when debug info
    /// survived (it does not round-trip through object files).
    pub fn source_of(&self, address: usize) -> Option<SourceLocation> {
        self.debug.as_ref().and_then(|d| d.lookup(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_info_maps_addresses_to_the_latest_entry() {
        let mut info = DebugInfo::new();
        info.push(4, SourceLocation::new(1, 1));
        info.push(9, SourceLocation::new(2, 5));

        assert_eq!(info.lookup(3), None);
        assert_eq!(info.lookup(4), Some(SourceLocation::new(1, 1)));
        assert_eq!(info.lookup(8), Some(SourceLocation::new(1, 1)));
        assert_eq!(info.lookup(100), Some(SourceLocation::new(2, 5)));
    }

    #[test]
    fn function_names_fall_back_to_lambda() {
        let anonymous = ScriptFunction {
            name: Rc::from(""),
            entry: 4,
            env: Weak::new(),
        };

        assert_eq!(Function::Script(anonymous).name(), "<lambda>");
    }
}
