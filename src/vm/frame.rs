//! Stack-frame bookkeeping.
//!
//! Registers live on the shared value stack at `base .. base + nregs +
//! extra_argc`; this header records the frame sizes, argument counts,
//! return linkage, callee and argv cache. A `ret_addr`/`ret_slot` of
//! `None` is the native sentinel: RET from such a frame leaves the
//! dispatch loop and returns the value to the host caller.

use crate::function::{Closure, Function, Program};
use crate::value::Value;

use std::rc::Rc;

#[derive(Debug)]
pub(crate) struct CallFrame {
    /// First register's slot on the value stack.
    pub base: usize,
    /// Register count from the callee's function header.
    pub nregs: usize,
    /// Declared argument count from the function header.
    pub decl_argc: usize,
    /// Variadic arguments beyond the declared ones, stored after the
    /// registers.
    pub extra_argc: usize,
    /// Arguments actually supplied by the caller.
    pub real_argc: usize,
    /// Resume address in the caller, or the native sentinel.
    pub ret_addr: Option<usize>,
    /// Caller slot for the return value, or the native sentinel.
    pub ret_slot: Option<usize>,
    /// The function being executed; closures read their upvalues through
    /// this.
    pub callee: Value,
    /// Program whose bytecode and symbol table this frame runs.
    pub program: Rc<Program>,
    /// Lazily materialised argument array, built by the first ARGV.
    pub argv: Option<Value>,
}

impl CallFrame {
    /// Addressable register slots of this frame.
    pub fn slots(&self) -> usize {
        self.nregs + self.extra_argc
    }

    /// Callee name for stack traces.
    pub fn callee_name(&self) -> Rc<str> {
        match &self.callee {
            Value::Function(func) => Rc::from(func.name()),
            other => Rc::from(other.type_name()),
        }
    }

    /// The executing closure, when the callee is one.
    pub fn closure(&self) -> Option<&Closure> {
        match &self.callee {
            Value::Function(func) => match func.as_ref() {
                Function::Closure(closure) => Some(closure),
                _ => None,
            },
            _ => None,
        }
    }
}
