//! Statement lowering.

use crate::ast::{Declarator, Node, NodeKind};
use crate::compiler::scope::LoopState;
use crate::compiler::Compiler;
use crate::consts::MAX_ARGC;
use crate::error::{SemanticError, SemanticErrorKind};

use sable_asm::{encode_str, Opcode};

impl Compiler {
    pub(crate) fn stmt(&mut self, node: &Node) -> Result<(), SemanticError> {
        self.debug.push(self.code.here(), node.loc);

        match &node.kind {
            NodeKind::Block(stmts) => {
                self.func().push_scope();
                for stmt in stmts {
                    self.stmt(stmt)?;
                }
                self.func().pop_scope();
            }

            NodeKind::If { cond, then, els } => {
                let test = self.expr_tmp(cond)?;
                self.code.op(Opcode::JZE(test));
                let skip_then = self.code.reserve();
                self.free_reg(test);

                self.stmt(then)?;

                match els {
                    Some(els) => {
                        self.code.op(Opcode::JMP);
                        let skip_else = self.code.reserve();
                        let here = self.code.here();
                        self.code.patch_jump(skip_then, here);
                        self.stmt(els)?;
                        let here = self.code.here();
                        self.code.patch_jump(skip_else, here);
                    }
                    None => {
                        let here = self.code.here();
                        self.code.patch_jump(skip_then, here);
                    }
                }
            }

            NodeKind::While { cond, body } => {
                let top = self.code.here();

                let test = self.expr_tmp(cond)?;
                self.code.op(Opcode::JZE(test));
                let exit = self.code.reserve();
                self.free_reg(test);

                self.func().loops.push(LoopState::default());
                self.stmt(body)?;

                self.code.op(Opcode::JMP);
                let back = self.code.reserve();
                self.code.patch_jump(back, top);

                let end = self.code.here();
                self.code.patch_jump(exit, end);
                self.close_loop(end, top);
            }

            NodeKind::Do { body, cond } => {
                let top = self.code.here();

                self.func().loops.push(LoopState::default());
                self.stmt(body)?;

                let test_at = self.code.here();
                let test = self.expr_tmp(cond)?;
                self.code.op(Opcode::JNZ(test));
                let back = self.code.reserve();
                self.code.patch_jump(back, top);
                self.free_reg(test);

                let end = self.code.here();
                self.close_loop(end, test_at);
            }

            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.func().push_scope();

                if let Some(init) = init {
                    self.stmt(init)?;
                }

                let top = self.code.here();
                let exit = match cond {
                    Some(cond) => {
                        let test = self.expr_tmp(cond)?;
                        self.code.op(Opcode::JZE(test));
                        let exit = self.code.reserve();
                        self.free_reg(test);
                        Some(exit)
                    }
                    None => None,
                };

                self.func().loops.push(LoopState::default());
                self.stmt(body)?;

                let step_at = self.code.here();
                if let Some(step) = step {
                    let value = self.expr_tmp(step)?;
                    self.free_reg(value);
                }
                self.code.op(Opcode::JMP);
                let back = self.code.reserve();
                self.code.patch_jump(back, top);

                let end = self.code.here();
                if let Some(exit) = exit {
                    self.code.patch_jump(exit, end);
                }
                self.close_loop(end, step_at);

                self.func().pop_scope();
            }

            NodeKind::Return(expr) => match expr {
                Some(expr) => {
                    let value = self.expr_tmp(expr)?;
                    self.code.op(Opcode::RET(value));
                    self.free_reg(value);
                }
                None => self.implicit_return(node.loc)?,
            },

            NodeKind::VarDecl(decls) => self.var_decl(node, decls)?,
            NodeKind::ConstDecl(decls) => self.const_decl(node, decls)?,

            NodeKind::Break => {
                if self.func().loops.is_empty() {
                    return Err(SemanticError::new(
                        SemanticErrorKind::BreakOutsideLoop,
                        node.loc,
                    ));
                }
                self.code.op(Opcode::JMP);
                let slot = self.code.reserve();
                if let Some(state) = self.func().loops.last_mut() {
                    state.breaks.push(slot);
                }
            }

            NodeKind::Continue => {
                if self.func().loops.is_empty() {
                    return Err(SemanticError::new(
                        SemanticErrorKind::ContinueOutsideLoop,
                        node.loc,
                    ));
                }
                self.code.op(Opcode::JMP);
                let slot = self.code.reserve();
                if let Some(state) = self.func().loops.last_mut() {
                    state.continues.push(slot);
                }
            }

            NodeKind::Empty => {}

            // `fn name(…) {…}` is a vardecl wrapping the function literal,
            // so recursive references capture the binding through CLOSURE's
            // self-capture contract.
            NodeKind::Function {
                name: Some(name),
                params,
                body,
            } => {
                if params.len() > MAX_ARGC {
                    return Err(SemanticError::new(
                        SemanticErrorKind::TooManyParams(params.len()),
                        node.loc,
                    ));
                }
                let reg = self
                    .func()
                    .declare(name.clone())
                    .ok_or_else(|| {
                        SemanticError::new(SemanticErrorKind::TooManyRegisters, node.loc)
                    })?;
                self.function_literal(Some(name), params, body, reg, node.loc)?;
            }

            _ => {
                let value = self.expr_tmp(node)?;
                self.free_reg(value);
            }
        }

        Ok(())
    }

    fn close_loop(&mut self, break_to: usize, continue_to: usize) {
        if let Some(state) = self.func().loops.pop() {
            for slot in state.breaks {
                self.code.patch_jump(slot, break_to);
            }
            for slot in state.continues {
                self.code.patch_jump(slot, continue_to);
            }
        }
    }

    fn var_decl(&mut self, node: &Node, decls: &[Declarator]) -> Result<(), SemanticError> {
        for decl in decls {
            let reg = self
                .func()
                .declare(decl.name.clone())
                .ok_or_else(|| SemanticError::new(SemanticErrorKind::TooManyRegisters, node.loc))?;

            match &decl.init {
                Some(init) => self.expr(init, reg)?,
                // Recycled registers hold stale values; nil them.
                None => self.code.load_nil(reg),
            }
        }

        Ok(())
    }

    fn const_decl(&mut self, node: &Node, decls: &[Declarator]) -> Result<(), SemanticError> {
        for decl in decls {
            if decl.name.len() > u16::MAX as usize {
                return Err(SemanticError::new(
                    SemanticErrorKind::NameTooLong(decl.name.clone()),
                    node.loc,
                ));
            }

            let value = self.alloc_reg(node.loc)?;
            match &decl.init {
                Some(init) => self.expr(init, value)?,
                None => self.code.load_nil(value),
            }

            self.code
                .op(Opcode::GLBVAL(value, decl.name.len() as u16));
            for word in encode_str(&decl.name) {
                self.code.word(word);
            }
            self.free_reg(value);
        }

        Ok(())
    }
}
