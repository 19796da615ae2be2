//! Expression lowering.
//!
//! Every expression evaluates into a destination register chosen by its
//! context. Subexpressions grab fresh registers from the free list and give
//! them back as soon as their value is consumed; the VM's
//! compute-then-store contract makes destination/source aliasing safe, so
//! `OP dst, dst, tmp` is the common shape.

use crate::ast::{BinaryOp, Literal, Node, NodeKind, SourceLocation, UnaryOp};
use crate::compiler::{Compiler, Reg, Resolution};
use crate::consts::MAX_ARGC;
use crate::error::{SemanticError, SemanticErrorKind};

use sable_asm::{
    encode_f64, encode_i64, pack_indices, ConstKind, Opcode, Word, FUNC_BODY_LEN, FUNC_DECL_ARGC,
    FUNC_HEADER_LEN, FUNC_NREGS,
};

use std::rc::Rc;

impl Compiler {
    /// Compile `node` so its value lands in `dst`.
    pub(crate) fn expr(&mut self, node: &Node, dst: Reg) -> Result<(), SemanticError> {
        let loc = node.loc;

        match &node.kind {
            NodeKind::Literal(lit) => self.literal(lit, dst, loc)?,

            NodeKind::Ident(name) => match self.resolve(name, loc)? {
                Resolution::Local(reg) => {
                    if reg != dst {
                        self.code.op(Opcode::MOV(dst, reg));
                    }
                }
                Resolution::Upvalue(index) => self.code.op(Opcode::LDUPVAL(dst, index)),
                Resolution::Global => {
                    let sym = self.intern_stub(name, loc)?;
                    self.code.op(Opcode::LDSYM(dst, sym));
                }
            },

            NodeKind::Argv => self.code.op(Opcode::ARGV(dst)),

            NodeKind::Binary {
                op: BinaryOp::LogAnd,
                left,
                right,
            } => {
                self.expr(left, dst)?;
                self.code.op(Opcode::JZE(dst));
                let done = self.code.reserve();
                self.expr(right, dst)?;
                let here = self.code.here();
                self.code.patch_jump(done, here);
            }

            NodeKind::Binary {
                op: BinaryOp::LogOr,
                left,
                right,
            } => {
                self.expr(left, dst)?;
                self.code.op(Opcode::JNZ(dst));
                let done = self.code.reserve();
                self.expr(right, dst)?;
                let here = self.code.here();
                self.code.patch_jump(done, here);
            }

            NodeKind::Binary { op, left, right } => {
                self.expr(left, dst)?;
                let rhs = self.expr_tmp(right)?;
                self.code.op(binary_opcode(*op, dst, dst, rhs));
                self.free_reg(rhs);
            }

            NodeKind::Unary { op, expr } => {
                self.expr(expr, dst)?;
                match op {
                    UnaryOp::Neg => self.code.op(Opcode::NEG(dst, dst)),
                    UnaryOp::Not => self.code.op(Opcode::LOGNOT(dst, dst)),
                    UnaryOp::BitNot => self.code.op(Opcode::BITNOT(dst, dst)),
                    UnaryOp::TypeOf => self.code.op(Opcode::TYPEOF(dst, dst)),
                    UnaryOp::Plus => {}
                }
            }

            NodeKind::IncDec {
                inc,
                prefix,
                target,
            } => self.inc_dec(*inc, *prefix, target, dst, loc)?,

            NodeKind::Cond { cond, then, els } => {
                let test = self.expr_tmp(cond)?;
                self.code.op(Opcode::JZE(test));
                let to_else = self.code.reserve();
                self.free_reg(test);

                self.expr(then, dst)?;
                self.code.op(Opcode::JMP);
                let to_end = self.code.reserve();

                let here = self.code.here();
                self.code.patch_jump(to_else, here);
                self.expr(els, dst)?;
                let here = self.code.here();
                self.code.patch_jump(to_end, here);
            }

            NodeKind::Assign { target, value } => self.assign(target, value, dst, loc)?,

            NodeKind::CompoundAssign { op, target, value } => {
                self.compound_assign(*op, target, value, dst, loc)?
            }

            NodeKind::Subscript { object, index } => {
                self.expr(object, dst)?;
                let index = self.expr_tmp(index)?;
                self.code.op(Opcode::IDXGET(dst, dst, index));
                self.free_reg(index);
            }

            NodeKind::Member { object, name } => {
                self.expr(object, dst)?;
                let sym = self.intern_string(name, loc)?;
                self.code.op(Opcode::PROPGET(dst, sym));
            }

            NodeKind::Call { func, args } => self.call(func, args, dst, loc)?,

            NodeKind::Array(elems) => {
                self.code.op(Opcode::NEWARR(dst));
                for elem in elems {
                    let value = self.expr_tmp(elem)?;
                    self.code.op(Opcode::ARRPUSH(dst, value));
                    self.free_reg(value);
                }
            }

            NodeKind::Hashmap(pairs) => {
                self.code.op(Opcode::NEWHASH(dst));
                for (key, value) in pairs {
                    let key = self.expr_tmp(key)?;
                    let value = self.expr_tmp(value)?;
                    self.code.op(Opcode::IDXSET(dst, key, value));
                    self.free_reg(value);
                    self.free_reg(key);
                }
            }

            NodeKind::Function { name, params, body } => {
                if params.len() > MAX_ARGC {
                    return Err(SemanticError::new(
                        SemanticErrorKind::TooManyParams(params.len()),
                        loc,
                    ));
                }
                self.function_literal(name.as_ref(), params, body, dst, loc)?;
            }

            _ => {
                return Err(SemanticError::new(
                    SemanticErrorKind::NotAnExpression,
                    loc,
                ));
            }
        }

        Ok(())
    }

    /// Compile `node` into a freshly allocated register the caller frees.
    pub(crate) fn expr_tmp(&mut self, node: &Node) -> Result<Reg, SemanticError> {
        let reg = self.alloc_reg(node.loc)?;
        self.expr(node, reg)?;
        Ok(reg)
    }

    fn literal(
        &mut self,
        lit: &Literal,
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        match lit {
            Literal::Nil => self.code.load_nil(dst),
            Literal::Bool(false) => self.code.op(Opcode::LDCONST(dst, ConstKind::False as u8)),
            Literal::Bool(true) => self.code.op(Opcode::LDCONST(dst, ConstKind::True as u8)),
            Literal::Int(i) => {
                self.code.op(Opcode::LDCONST(dst, ConstKind::Int as u8));
                let [lo, hi] = encode_i64(*i);
                self.code.word(lo);
                self.code.word(hi);
            }
            Literal::Float(f) => {
                self.code.op(Opcode::LDCONST(dst, ConstKind::Float as u8));
                let [lo, hi] = encode_f64(*f);
                self.code.word(lo);
                self.code.word(hi);
            }
            Literal::Str(s) => {
                let sym = self.intern_string(s, loc)?;
                self.code.op(Opcode::LDSYM(dst, sym));
            }
        }

        Ok(())
    }

    fn inc_dec(
        &mut self,
        inc: bool,
        prefix: bool,
        target: &Node,
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        let NodeKind::Ident(name) = &target.kind else {
            return Err(SemanticError::new(
                SemanticErrorKind::InvalidIncDecTarget,
                loc,
            ));
        };

        let var = match self.resolve(name, loc)? {
            Resolution::Local(reg) => reg,
            Resolution::Upvalue(_) => {
                return Err(SemanticError::new(
                    SemanticErrorKind::AssignCaptured(name.clone()),
                    loc,
                ));
            }
            Resolution::Global => {
                return Err(SemanticError::new(
                    SemanticErrorKind::AssignUndeclared(name.clone()),
                    loc,
                ));
            }
        };

        let step = if inc { Opcode::INC(var) } else { Opcode::DEC(var) };

        if prefix {
            self.code.op(step);
            if var != dst {
                self.code.op(Opcode::MOV(dst, var));
            }
        } else {
            if var != dst {
                self.code.op(Opcode::MOV(dst, var));
            }
            self.code.op(step);
        }

        Ok(())
    }

    fn assign(
        &mut self,
        target: &Node,
        value: &Node,
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        match &target.kind {
            NodeKind::Ident(name) => {
                self.expr(value, dst)?;
                match self.resolve(name, loc)? {
                    Resolution::Local(reg) => {
                        if reg != dst {
                            self.code.op(Opcode::MOV(reg, dst));
                        }
                        Ok(())
                    }
                    Resolution::Upvalue(_) => Err(SemanticError::new(
                        SemanticErrorKind::AssignCaptured(name.clone()),
                        loc,
                    )),
                    Resolution::Global => Err(SemanticError::new(
                        SemanticErrorKind::AssignUndeclared(name.clone()),
                        loc,
                    )),
                }
            }

            NodeKind::Subscript { object, index } => {
                self.expr(value, dst)?;
                let object = self.expr_tmp(object)?;
                let index = self.expr_tmp(index)?;
                self.code.op(Opcode::IDXSET(object, index, dst));
                self.free_reg(index);
                self.free_reg(object);
                Ok(())
            }

            NodeKind::Member { object, name } => {
                self.expr(value, dst)?;
                let object = self.expr_tmp(object)?;
                let sym = self.intern_string(name, loc)?;
                let prop = self.alloc_reg(loc)?;
                self.code.op(Opcode::LDSYM(prop, sym));
                self.code.op(Opcode::PROPSET(object, prop, dst));
                self.free_reg(prop);
                self.free_reg(object);
                Ok(())
            }

            _ => Err(SemanticError::new(
                SemanticErrorKind::InvalidAssignTarget,
                loc,
            )),
        }
    }

    fn compound_assign(
        &mut self,
        op: BinaryOp,
        target: &Node,
        value: &Node,
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        // No compound form exists for the short-circuit operators.
        if matches!(op, BinaryOp::LogAnd | BinaryOp::LogOr) {
            return Err(SemanticError::new(
                SemanticErrorKind::InvalidAssignTarget,
                loc,
            ));
        }

        match &target.kind {
            NodeKind::Ident(name) => {
                let var = match self.resolve(name, loc)? {
                    Resolution::Local(reg) => reg,
                    Resolution::Upvalue(_) => {
                        return Err(SemanticError::new(
                            SemanticErrorKind::AssignCaptured(name.clone()),
                            loc,
                        ));
                    }
                    Resolution::Global => {
                        return Err(SemanticError::new(
                            SemanticErrorKind::AssignUndeclared(name.clone()),
                            loc,
                        ));
                    }
                };

                let rhs = self.expr_tmp(value)?;
                self.code.op(binary_opcode(op, var, var, rhs));
                self.free_reg(rhs);
                if var != dst {
                    self.code.op(Opcode::MOV(dst, var));
                }
                Ok(())
            }

            NodeKind::Subscript { object, index } => {
                let object = self.expr_tmp(object)?;
                let index = self.expr_tmp(index)?;
                self.code.op(Opcode::IDXGET(dst, object, index));

                let rhs = self.expr_tmp(value)?;
                self.code.op(binary_opcode(op, dst, dst, rhs));
                self.free_reg(rhs);

                self.code.op(Opcode::IDXSET(object, index, dst));
                self.free_reg(index);
                self.free_reg(object);
                Ok(())
            }

            NodeKind::Member { object, name } => {
                let sym = self.intern_string(name, loc)?;

                let object = self.expr_tmp(object)?;
                self.code.op(Opcode::MOV(dst, object));
                self.code.op(Opcode::PROPGET(dst, sym));

                let rhs = self.expr_tmp(value)?;
                self.code.op(binary_opcode(op, dst, dst, rhs));
                self.free_reg(rhs);

                let prop = self.alloc_reg(loc)?;
                self.code.op(Opcode::LDSYM(prop, sym));
                self.code.op(Opcode::PROPSET(object, prop, dst));
                self.free_reg(prop);
                self.free_reg(object);
                Ok(())
            }

            _ => Err(SemanticError::new(
                SemanticErrorKind::InvalidAssignTarget,
                loc,
            )),
        }
    }

    fn call(
        &mut self,
        callee: &Node,
        args: &[Node],
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        if args.len() > MAX_ARGC {
            return Err(SemanticError::new(
                SemanticErrorKind::TooManyArgs(args.len()),
                loc,
            ));
        }

        // Method call-sites go through the class-chain lookup; everything
        // else evaluates the callee like any expression.
        let func = match &callee.kind {
            NodeKind::Member { object, name } => {
                let object = self.expr_tmp(object)?;
                let sym = self.intern_string(name, callee.loc)?;
                let prop = self.alloc_reg(loc)?;
                self.code.op(Opcode::LDSYM(prop, sym));
                let func = self.alloc_reg(loc)?;
                self.code.op(Opcode::METHOD(func, object, prop));
                self.free_reg(prop);
                self.free_reg(object);
                func
            }
            _ => self.expr_tmp(callee)?,
        };

        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            arg_regs.push(self.expr_tmp(arg)?);
        }

        self.code.op(Opcode::CALL(dst, func, args.len() as u8));
        for word in pack_indices(&arg_regs) {
            self.code.word(word);
        }

        for reg in arg_regs {
            self.free_reg(reg);
        }
        self.free_reg(func);

        Ok(())
    }

    /// Emit a nested function: FUNCTION, header, inline body. The value is
    /// loaded through its symbol-table entry; captures add a CLOSURE wrap.
    pub(crate) fn function_literal(
        &mut self,
        name: Option<&Rc<str>>,
        params: &[Rc<str>],
        body: &Node,
        dst: Reg,
        loc: SourceLocation,
    ) -> Result<(), SemanticError> {
        self.code.op(Opcode::FUNCTION);

        let header = self.code.here();
        for _ in 0..FUNC_HEADER_LEN {
            self.code.word(0);
        }
        self.code.patch(header + FUNC_DECL_ARGC, params.len() as Word);

        self.funcs.push(crate::compiler::scope::FuncState::new(header, params));
        self.stmt(body)?;
        self.implicit_return(loc)?;

        let func = self.pop_func();
        debug_assert!(func.decl_argc() <= func.nregs());

        let header = func.header();
        let body_len = self.code.here() - (header + FUNC_HEADER_LEN);
        self.code.patch(header + FUNC_BODY_LEN, body_len as Word);
        self.code.patch(header + FUNC_NREGS, func.nregs() as Word);

        let interned = name.cloned().unwrap_or_else(|| Rc::from(""));
        let sym = self
            .symtab
            .function(interned, header)
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManySymbols, loc))?;
        self.code.op(Opcode::LDSYM(dst, sym));

        if !func.upvalues.is_empty() {
            self.code
                .op(Opcode::CLOSURE(dst, func.upvalues.len() as u8));
            for upvalue in &func.upvalues {
                self.code.word(upvalue.capture.descriptor());
            }
        }

        Ok(())
    }

    pub(crate) fn intern_string(
        &mut self,
        s: &Rc<str>,
        loc: SourceLocation,
    ) -> Result<u16, SemanticError> {
        self.symtab
            .string(s)
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManySymbols, loc))
    }

    fn intern_stub(&mut self, name: &Rc<str>, loc: SourceLocation) -> Result<u16, SemanticError> {
        self.symtab
            .stub(name)
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManySymbols, loc))
    }
}

/// Map a two-operand AST operator onto its opcode.
fn binary_opcode(op: BinaryOp, a: Reg, b: Reg, c: Reg) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::ADD(a, b, c),
        BinaryOp::Sub => Opcode::SUB(a, b, c),
        BinaryOp::Mul => Opcode::MUL(a, b, c),
        BinaryOp::Div => Opcode::DIV(a, b, c),
        BinaryOp::Mod => Opcode::MOD(a, b, c),
        BinaryOp::BitAnd => Opcode::AND(a, b, c),
        BinaryOp::BitOr => Opcode::OR(a, b, c),
        BinaryOp::BitXor => Opcode::XOR(a, b, c),
        BinaryOp::Shl => Opcode::SHL(a, b, c),
        BinaryOp::Shr => Opcode::SHR(a, b, c),
        BinaryOp::Eq => Opcode::EQ(a, b, c),
        BinaryOp::Ne => Opcode::NE(a, b, c),
        BinaryOp::Lt => Opcode::LT(a, b, c),
        BinaryOp::Le => Opcode::LE(a, b, c),
        BinaryOp::Gt => Opcode::GT(a, b, c),
        BinaryOp::Ge => Opcode::GE(a, b, c),
        BinaryOp::Concat => Opcode::CONCAT(a, b, c),
        BinaryOp::LogAnd | BinaryOp::LogOr => {
            unreachable!("short-circuit operators lower to jumps")
        }
    }
}
