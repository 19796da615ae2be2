//! Local symbol-table population and LDSYM.
//!
//! A program's symbol table is read on its first execution only, gated by
//! the one-shot flag. String constants materialise as owned strings (the
//! type-safe rendering of the original's buffer-backed views), stubs keep
//! their name until the first LDSYM resolves them against the globals and
//! memoises the result into the slot, and function definitions become
//! script-function values whose environment is the program being read.

use crate::error::RuntimeError;
use crate::function::{Function, Program, ScriptFunction, SymbolSlot};
use crate::value::Value;
use crate::vm::Vm;

use sable_asm::{decode_str, str_words, BytecodeError, SymbolTag, FUNC_HEADER_LEN};

use std::rc::Rc;

use tracing::trace;

/// Populate `program`'s symbol table if this is its first execution.
pub(crate) fn populate(program: &Rc<Program>) -> Result<(), RuntimeError> {
    if program.symtab_loaded() {
        return Ok(());
    }

    trace!(program = program.name(), "populate symtab");

    let code = program.code();
    let count = program.symbol_count();
    let mut at = program.symtab_offset();
    let mut slots = Vec::with_capacity(count);

    let mut read_str = |at: &mut usize, len: usize| -> Result<String, RuntimeError> {
        let words = code
            .get(*at..*at + str_words(len))
            .ok_or(BytecodeError::TruncatedSymbol)?;
        *at += str_words(len);
        Ok(decode_str(words, len)?)
    };

    for _ in 0..count {
        let header = *code.get(at).ok_or(BytecodeError::TruncatedSymbol)?;
        at += 1;

        let tag = SymbolTag::from_repr((header & 0xff) as u8)
            .ok_or(BytecodeError::UnknownSymbolTag((header & 0xff) as u8))?;

        match tag {
            SymbolTag::String => {
                let s = read_str(&mut at, (header >> 8) as usize)?;
                slots.push(SymbolSlot::Resolved(Value::from(s)));
            }
            SymbolTag::Stub => {
                let name = read_str(&mut at, (header >> 8) as usize)?;
                slots.push(SymbolSlot::Stub(Rc::from(name.as_str())));
            }
            SymbolTag::Function => {
                let entry = *code.get(at).ok_or(BytecodeError::TruncatedSymbol)? as usize;
                let len = *code.get(at + 1).ok_or(BytecodeError::TruncatedSymbol)? as usize;
                at += 2;
                let name = read_str(&mut at, len)?;

                if entry + FUNC_HEADER_LEN > program.symtab_offset() {
                    return Err(RuntimeError::MalformedBytecode(
                        "function entry outside the executable region",
                    ));
                }

                slots.push(SymbolSlot::Resolved(Value::Function(Rc::new(
                    Function::Script(ScriptFunction {
                        name: Rc::from(name.as_str()),
                        entry,
                        env: Rc::downgrade(program),
                    }),
                ))));
            }
        }
    }

    *program.symtab_mut() = slots;
    program.mark_symtab_loaded();
    Ok(())
}

impl Vm {
    pub(crate) fn op_ldsym(&mut self, dst: u8, sym: u16) -> Result<(), RuntimeError> {
        let program = self.frame()?.program.clone();
        let value = self.load_symbol(&program, sym)?;
        self.set_reg(dst, value)
    }

    /// Load a symbol slot, promoting a stub to its resolved value on first
    /// use.
    pub(crate) fn load_symbol(
        &mut self,
        program: &Rc<Program>,
        sym: u16,
    ) -> Result<Value, RuntimeError> {
        let name = {
            let symtab = program.symtab();
            match symtab.get(sym as usize) {
                None => return Err(RuntimeError::BadSymbolIndex(sym)),
                Some(SymbolSlot::Resolved(value)) => return Ok(value.clone()),
                Some(SymbolSlot::Stub(name)) => name.clone(),
            }
        };

        let value = self.globals.get(&Value::Str(name.clone()));
        if value.is_nil() {
            return Err(RuntimeError::UndefinedGlobal(name));
        }

        program.symtab_mut()[sym as usize] = SymbolSlot::Resolved(value.clone());
        Ok(value)
    }

    /// Interned property-name string behind a PROPGET operand.
    pub(crate) fn symbol_string(
        &mut self,
        program: &Rc<Program>,
        sym: u16,
    ) -> Result<Rc<str>, RuntimeError> {
        match self.load_symbol(program, sym)? {
            Value::Str(s) => Ok(s),
            _ => Err(RuntimeError::MalformedBytecode(
                "property name must be a string constant",
            )),
        }
    }
}
