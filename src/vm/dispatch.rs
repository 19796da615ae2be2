//! The dispatch loop.

use crate::error::{RuntimeError, RuntimeTrap};
use crate::value::Value;
use crate::vm::{alu, Vm};

use sable_asm::{decode_f64, decode_i64, ConstKind, Instruction, OpcodeRepr, RegisterId};

use std::cmp::Ordering;

use tracing::trace;

/// Outcome of one instruction.
pub(crate) enum Step {
    /// Keep dispatching.
    Proceed,
    /// A boundary frame returned this value; leave the loop.
    Exit(Value),
}

impl Vm {
    /// Dispatch until the frame stack drops back to `boundary`, i.e. until
    /// the boundary frame pushed by the caller executes RET.
    ///
    /// On failure the trap is materialised with the faulting instruction's
    /// word address and the stack trace captured before unwinding.
    pub(crate) fn execute(&mut self, boundary: usize) -> Result<Value, RuntimeTrap> {
        loop {
            let address = self.ip;

            match self.step() {
                Ok(Step::Proceed) => {}
                Ok(Step::Exit(value)) => return Ok(value),
                Err(error) => {
                    let trap = RuntimeTrap {
                        error,
                        address: Some(address),
                        backtrace: self.capture_backtrace(),
                    };
                    self.store_trap(&trap);
                    self.unwind_to(boundary);
                    return Err(trap);
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step, RuntimeError> {
        let instr = Instruction::new(self.fetch()?);
        let op = OpcodeRepr::from_u8(instr.op())
            .ok_or(RuntimeError::InvalidOpcode(instr.op()))?;

        trace!(?op, a = instr.a(), b = instr.b(), c = instr.c(), "dispatch");

        match op {
            OpcodeRepr::CALL => self.op_call(instr.a(), instr.b(), instr.c())?,
            OpcodeRepr::RET => return self.op_ret(instr.a()),
            OpcodeRepr::JMP => self.op_jmp()?,
            OpcodeRepr::JZE => self.op_branch_if(instr.a(), false)?,
            OpcodeRepr::JNZ => self.op_branch_if(instr.a(), true)?,

            OpcodeRepr::EQ => {
                let equal = self.reg(instr.b())? == self.reg(instr.c())?;
                self.set_reg(instr.a(), Value::Bool(equal))?;
            }
            OpcodeRepr::NE => {
                let equal = self.reg(instr.b())? == self.reg(instr.c())?;
                self.set_reg(instr.a(), Value::Bool(!equal))?;
            }
            OpcodeRepr::LT => self.ordered(instr, |ord| ord == Ordering::Less)?,
            OpcodeRepr::LE => self.ordered(instr, |ord| ord != Ordering::Greater)?,
            OpcodeRepr::GT => self.ordered(instr, |ord| ord == Ordering::Greater)?,
            OpcodeRepr::GE => self.ordered(instr, |ord| ord != Ordering::Less)?,

            OpcodeRepr::ADD => self.binary(instr, alu::add)?,
            OpcodeRepr::SUB => self.binary(instr, alu::sub)?,
            OpcodeRepr::MUL => self.binary(instr, alu::mul)?,
            OpcodeRepr::DIV => self.binary(instr, alu::div)?,
            OpcodeRepr::MOD => self.binary(instr, alu::rem)?,
            OpcodeRepr::NEG => self.unary(instr, alu::neg)?,
            OpcodeRepr::INC => self.step_reg(instr.a(), 1)?,
            OpcodeRepr::DEC => self.step_reg(instr.a(), -1)?,

            OpcodeRepr::AND => self.binary(instr, alu::bit_and)?,
            OpcodeRepr::OR => self.binary(instr, alu::bit_or)?,
            OpcodeRepr::XOR => self.binary(instr, alu::bit_xor)?,
            OpcodeRepr::SHL => self.binary(instr, alu::shl)?,
            OpcodeRepr::SHR => self.binary(instr, alu::shr)?,
            OpcodeRepr::BITNOT => self.unary(instr, alu::bit_not)?,
            OpcodeRepr::LOGNOT => self.unary(instr, alu::log_not)?,

            OpcodeRepr::TYPEOF => {
                let name = Value::from(self.reg(instr.b())?.type_name());
                self.set_reg(instr.a(), name)?;
            }
            OpcodeRepr::CONCAT => self.binary(instr, alu::concat)?,

            OpcodeRepr::LDCONST => self.op_ldconst(instr.a(), instr.b())?,
            OpcodeRepr::LDSYM => self.op_ldsym(instr.a(), instr.mid())?,
            OpcodeRepr::MOV => {
                let value = self.reg(instr.b())?.clone();
                self.set_reg(instr.a(), value)?;
            }
            OpcodeRepr::ARGV => self.op_argv(instr.a())?,

            OpcodeRepr::NEWARR => self.set_reg(instr.a(), Value::new_array())?,
            OpcodeRepr::NEWHASH => self.set_reg(instr.a(), Value::new_hashmap())?,
            OpcodeRepr::IDXGET => self.op_idx_get(instr.a(), instr.b(), instr.c())?,
            OpcodeRepr::IDXSET => self.op_idx_set(instr.a(), instr.b(), instr.c())?,
            OpcodeRepr::ARRPUSH => self.op_arr_push(instr.a(), instr.b())?,

            OpcodeRepr::FUNCTION => self.op_function()?,
            OpcodeRepr::GLBVAL => self.op_glbval(instr.a(), instr.mid())?,
            OpcodeRepr::CLOSURE => self.op_closure(instr.a(), instr.b())?,
            OpcodeRepr::LDUPVAL => self.op_ldupval(instr.a(), instr.b())?,

            OpcodeRepr::METHOD => self.op_method(instr.a(), instr.b(), instr.c())?,
            OpcodeRepr::PROPGET => self.op_propget(instr.a(), instr.mid())?,
            OpcodeRepr::PROPSET => self.op_propset(instr.a(), instr.b(), instr.c())?,
        }

        Ok(Step::Proceed)
    }

    fn binary(
        &mut self,
        instr: Instruction,
        op: fn(&Value, &Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let value = op(self.reg(instr.b())?, self.reg(instr.c())?)?;
        self.set_reg(instr.a(), value)
    }

    fn unary(
        &mut self,
        instr: Instruction,
        op: fn(&Value) -> Result<Value, RuntimeError>,
    ) -> Result<(), RuntimeError> {
        let value = op(self.reg(instr.b())?)?;
        self.set_reg(instr.a(), value)
    }

    fn ordered(
        &mut self,
        instr: Instruction,
        accept: fn(Ordering) -> bool,
    ) -> Result<(), RuntimeError> {
        let ord = alu::compare(self.reg(instr.b())?, self.reg(instr.c())?)?;
        self.set_reg(instr.a(), Value::Bool(accept(ord)))
    }

    /// INC/DEC mutate their register in place.
    fn step_reg(&mut self, reg: RegisterId, delta: i64) -> Result<(), RuntimeError> {
        let index = self.reg_index(reg)?;
        let value = alu::step_by(&self.stack[index], delta)?;
        self.stack[index] = value;
        Ok(())
    }

    fn op_ldconst(&mut self, dst: RegisterId, kind: u8) -> Result<(), RuntimeError> {
        let kind = ConstKind::from_repr(kind)
            .ok_or(RuntimeError::MalformedBytecode("unknown constant kind"))?;

        let value = match kind {
            ConstKind::Nil => Value::Nil,
            ConstKind::False => Value::Bool(false),
            ConstKind::True => Value::Bool(true),
            ConstKind::Int => {
                let lo = self.fetch()?;
                let hi = self.fetch()?;
                Value::Int(decode_i64(lo, hi))
            }
            ConstKind::Float => {
                let lo = self.fetch()?;
                let hi = self.fetch()?;
                Value::Float(decode_f64(lo, hi))
            }
        };

        self.set_reg(dst, value)
    }
}
