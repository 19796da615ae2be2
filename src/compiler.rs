//! AST → bytecode compiler.
//!
//! One walk over the tree emits the whole translation unit: program header,
//! top-level function header, executable words with nested function bodies
//! inline (stepped over by FUNCTION at run time), and the local symbol
//! table. Forward references — jump targets, body lengths, the program
//! header fields — are reserved and patched once their values are known.
//!
//! Per-function state lives in a [`scope::FuncState`]: a free-list register
//! allocator with a high-water mark that becomes the function's register
//! count, a lexical scope chain, the upvalue table, and the break/continue
//! stack. Expression nodes evaluate into a caller-chosen destination
//! register; locals pin their register for the lifetime of their scope.

mod emit;
mod expr;
mod scope;
mod stmt;
mod symtab;

use crate::ast::{Node, NodeKind, SourceLocation};
use crate::error::{SemanticError, SemanticErrorKind};
use crate::function::{DebugInfo, Function, Program};
use crate::value::Value;

use emit::CodeBuf;
use scope::FuncState;
use symtab::SymtabBuilder;

use sable_asm::{
    Opcode, Word, FUNC_BODY_LEN, FUNC_HEADER_LEN, FUNC_NREGS, HDR_FRAME_SIZE, HDR_MAGIC,
    HDR_SYMBOL_COUNT, HDR_SYMTAB_OFFSET, MAGIC, PROGRAM_HEADER_LEN,
};

use std::rc::Rc;

use tracing::debug;

/// 8-bit register index, compiler side.
pub(crate) type Reg = u8;

/// Where a name resolved.
pub(crate) enum Resolution {
    /// A register of the current function.
    Local(Reg),
    /// An upvalue of the current function.
    Upvalue(u8),
    /// Neither; the reference goes through the global symbol stub.
    Global,
}

/// Single-use compiler for one translation unit.
#[derive(Default)]
pub struct Compiler {
    code: CodeBuf,
    symtab: SymtabBuilder,
    funcs: Vec<FuncState>,
    debug: DebugInfo,
}

/// Compile a parsed translation unit into a callable top-level program
/// value named `<script>`.
pub fn compile(ast: &Node) -> Result<Value, SemanticError> {
    Compiler::new().compile(ast, "<script>")
}

impl Compiler {
    /// Fresh compiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `ast` into a top-level program function value.
    pub fn compile(mut self, ast: &Node, name: &str) -> Result<Value, SemanticError> {
        debug!(unit = name, "compile");

        let program = self.program(ast, name)?;

        Ok(Value::Function(Rc::new(Function::Program(Rc::new(
            program,
        )))))
    }

    fn program(&mut self, ast: &Node, name: &str) -> Result<Program, SemanticError> {
        for _ in 0..PROGRAM_HEADER_LEN {
            self.code.word(0);
        }
        self.code.patch(HDR_MAGIC, MAGIC);

        // The top-level body is a function like any other: header at the
        // entry point, so CALL of the program value needs no special case.
        let header = self.code.here();
        for _ in 0..FUNC_HEADER_LEN {
            self.code.word(0);
        }

        self.funcs.push(FuncState::new(header, &[]));

        match &ast.kind {
            NodeKind::Program(stmts) => {
                for stmt in stmts {
                    self.stmt(stmt)?;
                }
            }
            _ => self.stmt(ast)?,
        }
        self.implicit_return(ast.loc)?;

        let func = self.pop_func();
        let header = func.header();
        let body_len = self.code.here() - (header + FUNC_HEADER_LEN);
        self.code.patch(header + FUNC_BODY_LEN, body_len as Word);
        self.code.patch(header + FUNC_NREGS, func.nregs() as Word);

        let symtab_offset = self.code.here();
        self.code.patch(HDR_SYMTAB_OFFSET, symtab_offset as Word);
        self.code.patch(HDR_SYMBOL_COUNT, self.symtab.len() as Word);
        self.code.patch(HDR_FRAME_SIZE, func.nregs() as Word);

        self.symtab.write(&mut self.code);

        Ok(Program::new(
            std::mem::take(&mut self.code).into_words(),
            Rc::from(name),
            Some(std::mem::take(&mut self.debug)),
        ))
    }

    /* SHARED HELPERS */

    pub(crate) fn func(&mut self) -> &mut FuncState {
        let last = self.funcs.len() - 1;
        &mut self.funcs[last]
    }

    pub(crate) fn pop_func(&mut self) -> FuncState {
        // The push in program()/function_literal() pairs with this pop.
        self.funcs
            .pop()
            .expect("pop_func called with no pushed function")
    }

    pub(crate) fn alloc_reg(&mut self, loc: SourceLocation) -> Result<Reg, SemanticError> {
        self.func()
            .alloc()
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManyRegisters, loc))
    }

    pub(crate) fn free_reg(&mut self, reg: Reg) {
        self.func().free(reg);
    }

    pub(crate) fn implicit_return(&mut self, loc: SourceLocation) -> Result<(), SemanticError> {
        let reg = self.alloc_reg(loc)?;
        self.code.load_nil(reg);
        self.code.op(Opcode::RET(reg));
        self.free_reg(reg);
        Ok(())
    }

    /// Resolve a name: lexical scopes of the current function, then
    /// upvalues inherited through every enclosing function, then global.
    pub(crate) fn resolve(
        &mut self,
        name: &Rc<str>,
        loc: SourceLocation,
    ) -> Result<Resolution, SemanticError> {
        let current = self.funcs.len() - 1;

        if let Some(reg) = self.funcs[current].resolve_local(name) {
            return Ok(Resolution::Local(reg));
        }

        match self.resolve_upvalue(current, name, loc)? {
            Some(index) => Ok(Resolution::Upvalue(index)),
            None => Ok(Resolution::Global),
        }
    }

    /// Find or create the upvalue chain for `name` down to function
    /// `func`. First use creates an entry in every function between the
    /// defining frame and the referencing one: `local` at the nearest
    /// enclosing frame, `outer` further in.
    fn resolve_upvalue(
        &mut self,
        func: usize,
        name: &Rc<str>,
        loc: SourceLocation,
    ) -> Result<Option<u8>, SemanticError> {
        if func == 0 {
            return Ok(None);
        }

        if let Some(index) = self.funcs[func].find_upvalue(name) {
            return Ok(Some(index));
        }

        let parent = func - 1;

        if let Some(reg) = self.funcs[parent].resolve_local(name) {
            return self
                .add_upvalue(func, name, scope::Capture::Local(reg), loc)
                .map(Some);
        }

        if let Some(outer) = self.resolve_upvalue(parent, name, loc)? {
            return self
                .add_upvalue(func, name, scope::Capture::Outer(outer), loc)
                .map(Some);
        }

        Ok(None)
    }

    fn add_upvalue(
        &mut self,
        func: usize,
        name: &Rc<str>,
        capture: scope::Capture,
        loc: SourceLocation,
    ) -> Result<u8, SemanticError> {
        self.funcs[func]
            .add_upvalue(name.clone(), capture)
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManyUpvalues, loc))
    }
}
