//! Calls, returns, jumps, closures and the other control-flow opcodes.

use crate::error::{RuntimeError, RuntimeTrap};
use crate::function::{Closure, Function, Program};
use crate::value::Value;
use crate::vm::dispatch::Step;
use crate::vm::frame::CallFrame;
use crate::vm::{symtab, Vm};

use sable_asm::{
    decode_str, packed_words, str_words, unpack_indices, RegisterId, UpvalKind, FUNC_DECL_ARGC,
    FUNC_HEADER_LEN, FUNC_NREGS, PROGRAM_HEADER_LEN,
};

use std::cell::OnceCell;
use std::rc::Rc;

/// Resolved entry of a script-flavoured callee.
pub(crate) struct ScriptTarget {
    pub entry: usize,
    pub env: Rc<Program>,
}

/// Entry word and environment of a script function, program or closure.
pub(crate) fn resolve_script(callee: &Function) -> Result<ScriptTarget, RuntimeError> {
    match callee {
        Function::Program(program) => Ok(ScriptTarget {
            entry: PROGRAM_HEADER_LEN,
            env: program.clone(),
        }),
        Function::Script(script) => Ok(ScriptTarget {
            entry: script.entry,
            env: script.env.upgrade().ok_or(RuntimeError::DeadEnvironment)?,
        }),
        Function::Closure(closure) => Ok(ScriptTarget {
            entry: closure.proto.entry,
            env: closure
                .proto
                .env
                .upgrade()
                .ok_or(RuntimeError::DeadEnvironment)?,
        }),
        Function::Native(_) => Err(RuntimeError::Bug("native function in script path")),
    }
}

impl Vm {
    /// Public-entry call with full trap reporting.
    pub(crate) fn call_value_trapped(
        &mut self,
        func: &Value,
        args: &[Value],
    ) -> Result<Value, RuntimeTrap> {
        let Value::Function(callee) = func else {
            let trap = RuntimeTrap {
                error: RuntimeError::NotCallable(func.type_name()),
                address: None,
                backtrace: self.capture_backtrace(),
            };
            self.store_trap(&trap);
            return Err(trap);
        };

        match callee.as_ref() {
            Function::Native(native) => {
                let name = native.name.clone();
                (native.func)(self, args).map_err(|error| {
                    let mut backtrace = self.capture_backtrace();
                    backtrace.insert(0, crate::error::FrameInfo::new(name));
                    let trap = RuntimeTrap {
                        error,
                        address: None,
                        backtrace,
                    };
                    self.store_trap(&trap);
                    trap
                })
            }
            _ => {
                let boundary = self.frames.len();
                let saved_ip = self.ip;

                let pushed = (|| -> Result<(), RuntimeError> {
                    let target = resolve_script(callee.as_ref())?;
                    symtab::populate(&target.env)?;
                    self.push_script_frame(func.clone(), &target, args, None, None)?;
                    self.ip = target.entry + FUNC_HEADER_LEN;
                    Ok(())
                })();

                if let Err(error) = pushed {
                    let trap = RuntimeTrap {
                        error,
                        address: None,
                        backtrace: self.capture_backtrace(),
                    };
                    self.store_trap(&trap);
                    self.unwind_to(boundary);
                    self.ip = saved_ip;
                    return Err(trap);
                }

                let result = self.execute(boundary);
                self.ip = saved_ip;
                result
            }
        }
    }

    /// Re-entrant call used by the VM itself (property accessors); the
    /// trap, if any, is already stored by the inner execution.
    pub(crate) fn call_value_internal(
        &mut self,
        func: &Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        self.call_value_trapped(func, args)
            .map_err(|trap| trap.error)
    }

    fn push_script_frame(
        &mut self,
        callee: Value,
        target: &ScriptTarget,
        args: &[Value],
        ret_addr: Option<usize>,
        ret_slot: Option<usize>,
    ) -> Result<(), RuntimeError> {
        let code = target.env.code();
        let header = target.entry;

        if header + FUNC_HEADER_LEN > target.env.symtab_offset() {
            return Err(RuntimeError::MalformedBytecode(
                "function header outside the executable region",
            ));
        }

        let decl_argc = code[header + FUNC_DECL_ARGC] as usize;
        let nregs = code[header + FUNC_NREGS] as usize;
        if decl_argc > nregs || nregs > crate::consts::MAX_REGS {
            return Err(RuntimeError::MalformedBytecode("invalid function header"));
        }

        if self.frames.len() >= self.params.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.params.max_call_depth));
        }

        let real_argc = args.len();
        let extra_argc = real_argc.saturating_sub(decl_argc);
        let slots = nregs + extra_argc;

        if self.stack.len() + slots > self.params.max_stack_slots {
            return Err(RuntimeError::StackOverflow(self.params.max_stack_slots));
        }

        let base = self.stack.len();
        self.stack.resize(base + slots, Value::Nil);

        // Declared arguments land in the first registers; the variadic
        // tail sits past the register file. Missing arguments stay nil.
        for (i, arg) in args.iter().take(decl_argc).enumerate() {
            self.stack[base + i] = arg.clone();
        }
        for (i, arg) in args.iter().skip(decl_argc).enumerate() {
            self.stack[base + nregs + i] = arg.clone();
        }

        self.frames.push(CallFrame {
            base,
            nregs,
            decl_argc,
            extra_argc,
            real_argc,
            ret_addr,
            ret_slot,
            callee,
            program: target.env.clone(),
            argv: None,
        });

        Ok(())
    }

    fn push_native_frame(&mut self, callee: Value) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.params.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.params.max_call_depth));
        }

        let program = self.frame()?.program.clone();
        self.frames.push(CallFrame {
            base: self.stack.len(),
            nregs: 0,
            decl_argc: 0,
            extra_argc: 0,
            real_argc: 0,
            ret_addr: None,
            ret_slot: None,
            callee,
            program,
            argv: None,
        });

        Ok(())
    }

    pub(crate) fn op_call(
        &mut self,
        ret: RegisterId,
        func: RegisterId,
        argc: u8,
    ) -> Result<(), RuntimeError> {
        let argc = argc as usize;

        let mut packed = Vec::with_capacity(packed_words(argc));
        for _ in 0..packed_words(argc) {
            packed.push(self.fetch()?);
        }
        let indices = unpack_indices(&packed, argc);

        let mut args = Vec::with_capacity(argc);
        for index in &indices {
            args.push(self.reg(*index)?.clone());
        }

        let callee_value = self.reg(func)?.clone();
        let ret_slot = self.reg_index(ret)?;

        let Value::Function(callee) = &callee_value else {
            return Err(RuntimeError::NotCallable(callee_value.type_name()));
        };

        match callee.as_ref() {
            Function::Native(native) => {
                let entry = native.func;
                self.push_native_frame(callee_value.clone())?;
                let value = entry(self, &args)?;
                // The pseudo-frame stays on error so the trace names the
                // native; unwinding removes it.
                self.pop_frame();
                self.stack[ret_slot] = value;
                Ok(())
            }
            _ => {
                let target = resolve_script(callee.as_ref())?;
                symtab::populate(&target.env)?;
                self.push_script_frame(
                    callee_value.clone(),
                    &target,
                    &args,
                    Some(self.ip),
                    Some(ret_slot),
                )?;
                self.ip = target.entry + FUNC_HEADER_LEN;
                Ok(())
            }
        }
    }

    pub(crate) fn op_ret(&mut self, src: RegisterId) -> Result<Step, RuntimeError> {
        let value = self.reg(src)?.clone();
        let frame = self
            .pop_frame()
            .ok_or(RuntimeError::Bug("RET without a frame"))?;

        match (frame.ret_addr, frame.ret_slot) {
            (Some(addr), Some(slot)) => {
                self.ip = addr;
                self.stack[slot] = value;
                Ok(Step::Proceed)
            }
            _ => Ok(Step::Exit(value)),
        }
    }

    fn branch(&mut self, offset: i32) -> Result<(), RuntimeError> {
        let target = self.ip as i64 + offset as i64;
        let limit = self.frame()?.program.symtab_offset() as i64;

        if target < PROGRAM_HEADER_LEN as i64 || target >= limit {
            return Err(RuntimeError::JumpOutOfBounds);
        }

        self.ip = target as usize;
        Ok(())
    }

    pub(crate) fn op_jmp(&mut self) -> Result<(), RuntimeError> {
        let offset = self.fetch()? as i32;
        self.branch(offset)
    }

    pub(crate) fn op_branch_if(
        &mut self,
        cond: RegisterId,
        jump_when: bool,
    ) -> Result<(), RuntimeError> {
        let taken = match self.reg(cond)? {
            Value::Bool(b) => *b == jump_when,
            other => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "bool",
                    found: other.type_name(),
                });
            }
        };

        let offset = self.fetch()? as i32;
        if taken {
            self.branch(offset)?;
        }
        Ok(())
    }

    /// FUNCTION: step over the inline function header and body.
    pub(crate) fn op_function(&mut self) -> Result<(), RuntimeError> {
        let body_len = self.fetch()? as usize;
        let target = self.ip + (FUNC_HEADER_LEN - 1) + body_len;

        if target > self.frame()?.program.symtab_offset() {
            return Err(RuntimeError::JumpOutOfBounds);
        }

        self.ip = target;
        Ok(())
    }

    /// ARGV: materialise the argument array on first use, cache it in the
    /// frame header, and hand out the same instance afterwards.
    pub(crate) fn op_argv(&mut self, dst: RegisterId) -> Result<(), RuntimeError> {
        if let Some(argv) = &self.frame()?.argv {
            let argv = argv.clone();
            return self.set_reg(dst, argv);
        }

        let (base, nregs, named, extra) = {
            let frame = self.frame()?;
            (
                frame.base,
                frame.nregs,
                frame.decl_argc.min(frame.real_argc),
                frame.extra_argc,
            )
        };

        let mut values = Vec::with_capacity(named + extra);
        for i in 0..named {
            values.push(self.stack[base + i].clone());
        }
        for i in 0..extra {
            values.push(self.stack[base + nregs + i].clone());
        }

        let argv = Value::array_from(values);
        self.frame_mut()?.argv = Some(argv.clone());
        self.set_reg(dst, argv)
    }

    /// GLBVAL: define a global from a register; the name is inline in the
    /// instruction stream.
    pub(crate) fn op_glbval(&mut self, src: RegisterId, len: u16) -> Result<(), RuntimeError> {
        let len = len as usize;

        let mut words = Vec::with_capacity(str_words(len));
        for _ in 0..str_words(len) {
            words.push(self.fetch()?);
        }
        let name = decode_str(&words, len)?;

        if !self.globals.get_str(&name).is_nil() {
            return Err(RuntimeError::GlobalRedefinition(Rc::from(name.as_str())));
        }

        let value = self.reg(src)?.clone();
        self.globals.set_str(&name, value);
        Ok(())
    }

    /// CLOSURE: wrap the prototype in `reg` and replace it *before*
    /// consuming the descriptors, so a closure capturing its own binding
    /// captures the closure rather than the prototype.
    pub(crate) fn op_closure(&mut self, reg: RegisterId, count: u8) -> Result<(), RuntimeError> {
        let proto = match self.reg(reg)? {
            Value::Function(func) => match func.as_ref() {
                Function::Script(script) => script.clone(),
                _ => {
                    return Err(RuntimeError::MalformedBytecode(
                        "CLOSURE needs a script prototype",
                    ));
                }
            },
            _ => {
                return Err(RuntimeError::MalformedBytecode(
                    "CLOSURE needs a script prototype",
                ));
            }
        };

        let closure = Rc::new(Function::Closure(Closure {
            proto,
            upvalues: OnceCell::new(),
        }));
        self.set_reg(reg, Value::Function(closure.clone()))?;

        let mut captured = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let word = self.fetch()?;
            let kind = UpvalKind::from_repr((word & 0xff) as u8).ok_or(
                RuntimeError::MalformedBytecode("unknown upvalue descriptor kind"),
            )?;
            let operand = ((word >> 8) & 0xff) as u8;

            let value = match kind {
                UpvalKind::Local => self.reg(operand)?.clone(),
                UpvalKind::Outer => {
                    let current = self
                        .frame()?
                        .closure()
                        .ok_or(RuntimeError::MalformedBytecode(
                            "outer capture outside a closure",
                        ))?;
                    current
                        .upvalues
                        .get()
                        .ok_or(RuntimeError::Bug("closure captures not sealed"))?
                        .get(operand as usize)
                        .ok_or(RuntimeError::BadUpvalueIndex(operand))?
                        .clone()
                }
            };
            captured.push(value);
        }

        match closure.as_ref() {
            Function::Closure(c) => c
                .upvalues
                .set(captured.into_boxed_slice())
                .map_err(|_| RuntimeError::Bug("closure captures already sealed")),
            _ => Err(RuntimeError::Bug("closure construction")),
        }
    }

    pub(crate) fn op_ldupval(&mut self, dst: RegisterId, index: u8) -> Result<(), RuntimeError> {
        let value = {
            let closure = self
                .frame()?
                .closure()
                .ok_or(RuntimeError::MalformedBytecode("LDUPVAL outside a closure"))?;
            closure
                .upvalues
                .get()
                .ok_or(RuntimeError::Bug("closure captures not sealed"))?
                .get(index as usize)
                .ok_or(RuntimeError::BadUpvalueIndex(index))?
                .clone()
        };

        self.set_reg(dst, value)
    }
}
