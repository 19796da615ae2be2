//! The register-based virtual machine.
//!
//! One [`Vm`] owns a contiguous register stack of values, a frame stack, a
//! global hashmap, a class-descriptor hashmap, and a current-trap slot.
//! [`Vm::call_function`] is the single public entry point: it accepts any
//! function value — native, script, top-level program or closure — with an
//! explicit argument vector, and it is re-entrant, so natives invoked by
//! CALL may call back into the VM. Each entry establishes a boundary frame
//! whose return address takes the native sentinel; RET from that frame
//! hands the value back to the host caller instead of continuing dispatch.
//!
//! Errors follow the first-writer-wins trap protocol: the first failure is
//! materialised with its word address and stack trace, remaining frames are
//! unwound to the entry boundary, and the trap stays readable until the
//! next outermost entry clears it.

use crate::error::{FrameInfo, RuntimeError, RuntimeTrap};
use crate::map::ValueMap;
use crate::params::VmParams;
use crate::value::Value;

use sable_asm::{RegisterId, Word};

mod alu;
mod dispatch;
mod flow;
mod frame;
mod index;
mod property;
mod symtab;

use frame::CallFrame;

/// A virtual machine instance.
///
/// The register stack grows geometrically; all internal addressing is by
/// slot index, never by pointer, so growth never invalidates a frame.
#[derive(Debug, Default)]
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: ValueMap,
    classes: ValueMap,
    trap: Option<RuntimeTrap>,
    params: VmParams,
    ip: usize,
}

impl Vm {
    /// VM with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// VM with explicit limits.
    pub fn with_params(params: VmParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// The configured limits.
    pub const fn params(&self) -> &VmParams {
        &self.params
    }

    /// Call any function value with the given arguments.
    ///
    /// An outermost call (no script frame live) clears the previous trap
    /// and any state it left behind; re-entrant calls from natives leave
    /// the surrounding execution untouched.
    pub fn call_function(&mut self, func: &Value, args: &[Value]) -> Result<Value, RuntimeTrap> {
        if self.frames.is_empty() {
            self.trap = None;
            self.stack.clear();
            self.ip = 0;
        }

        self.call_value_trapped(func, args)
    }

    /// The materialised error of the last failed run, until the next
    /// outermost entry.
    pub fn last_trap(&self) -> Option<&RuntimeTrap> {
        self.trap.as_ref()
    }

    /// Stack trace of the last trap: callee names, innermost first.
    pub fn backtrace(&self) -> &[FrameInfo] {
        self.trap
            .as_ref()
            .map(|t| t.backtrace.as_slice())
            .unwrap_or(&[])
    }

    /// Value of a global; nil when unset.
    pub fn get_global(&self, name: &str) -> Value {
        self.globals.get_str(name)
    }

    /// Define or replace a global. Host-side registration overwrites;
    /// script-side GLBVAL does not.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.set_str(name, value);
    }

    /// Register a class descriptor under a type-tag or identity key.
    ///
    /// Primitive types are keyed by their type-name string (`"string"`,
    /// `"array"`, …); host pointers by identity.
    pub fn set_class(&mut self, tag: Value, class: Value) -> Result<(), RuntimeError> {
        self.classes
            .insert(tag, class)
            .map_err(|k| RuntimeError::InvalidKey(k.describe()))
    }

    /* INTERNAL PLUMBING */

    pub(crate) fn frame(&self) -> Result<&CallFrame, RuntimeError> {
        self.frames
            .last()
            .ok_or(RuntimeError::Bug("no active frame"))
    }

    pub(crate) fn frame_mut(&mut self) -> Result<&mut CallFrame, RuntimeError> {
        self.frames
            .last_mut()
            .ok_or(RuntimeError::Bug("no active frame"))
    }

    /// Absolute stack index of a register of the current frame.
    pub(crate) fn reg_index(&self, reg: RegisterId) -> Result<usize, RuntimeError> {
        let frame = self.frame()?;
        let offset = reg as usize;

        if offset < frame.slots() {
            Ok(frame.base + offset)
        } else {
            Err(RuntimeError::RegisterOutOfFrame(reg))
        }
    }

    pub(crate) fn reg(&self, reg: RegisterId) -> Result<&Value, RuntimeError> {
        let index = self.reg_index(reg)?;
        Ok(&self.stack[index])
    }

    /// Store into a register. Callers compute the value before this runs,
    /// which keeps destination/source aliasing sound: the old occupant is
    /// released by the assignment itself.
    pub(crate) fn set_reg(&mut self, reg: RegisterId, value: Value) -> Result<(), RuntimeError> {
        let index = self.reg_index(reg)?;
        self.stack[index] = value;
        Ok(())
    }

    /// Read and advance past the word at the instruction pointer.
    pub(crate) fn fetch(&mut self) -> Result<Word, RuntimeError> {
        let frame = self.frame()?;

        if self.ip >= frame.program.symtab_offset() {
            return Err(RuntimeError::JumpOutOfBounds);
        }

        let word = frame.program.code()[self.ip];
        self.ip += 1;
        Ok(word)
    }

    /// Pop the top frame, releasing every register slot and the argv cache
    /// in one stack truncation.
    pub(crate) fn pop_frame(&mut self) -> Option<CallFrame> {
        let frame = self.frames.pop()?;
        self.stack.truncate(frame.base);
        Some(frame)
    }

    pub(crate) fn unwind_to(&mut self, depth: usize) {
        while self.frames.len() > depth {
            self.pop_frame();
        }
    }

    /// Callee names from the innermost frame outwards.
    pub(crate) fn capture_backtrace(&self) -> Vec<FrameInfo> {
        self.frames
            .iter()
            .rev()
            .map(|frame| FrameInfo::new(frame.callee_name()))
            .collect()
    }

    pub(crate) fn store_trap(&mut self, trap: &RuntimeTrap) {
        // First writer wins; a later error never overwrites the original.
        if self.trap.is_none() {
            self.trap = Some(trap.clone());
        }
    }
}
