//! Recursive-descent parser.
//!
//! Grammar summary (loosest binding first): assignment · `?:` · `||` ·
//! `&&` · `|` · `^` · `&` · equality · comparison · `..` · shifts ·
//! additive · multiplicative · unary · postfix. Conditions of `if`, `while`
//! and `do` are parsed with brace literals disabled so the block-opening
//! `{` terminates the expression; every bracketed context re-enables them.

use crate::ast::{BinaryOp, Declarator, Literal, Node, NodeKind, SourceLocation, UnaryOp};
use crate::error::SyntaxError;
use crate::lexer::{tokenize, Token, TokenKind};

use std::rc::Rc;

/// Parse a whole translation unit into a `program` node.
pub fn parse(source: &str) -> Result<Node, SyntaxError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        brace_ok: true,
    }
    .program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    brace_ok: bool,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_next(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn loc(&self) -> SourceLocation {
        self.tokens[self.pos.min(self.tokens.len() - 1)].loc
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.bump())
        } else {
            Err(SyntaxError::new(
                format!("expected {what}, found {:?}", self.peek()),
                self.loc(),
            ))
        }
    }

    fn ident(&mut self, what: &str) -> Result<Rc<str>, SyntaxError> {
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            other => Err(SyntaxError::new(
                format!("expected {what}, found {other:?}"),
                self.loc(),
            )),
        }
    }

    fn program(mut self) -> Result<Node, SyntaxError> {
        let loc = self.loc();
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }

        Ok(Node::new(NodeKind::Program(stmts), loc))
    }

    /* STATEMENTS */

    fn statement(&mut self) -> Result<Node, SyntaxError> {
        match self.peek() {
            TokenKind::LBrace => self.block(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Do => self.do_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Let => self.decl_stmt(false),
            TokenKind::Const => self.decl_stmt(true),
            TokenKind::Break => {
                let loc = self.bump().loc;
                self.expect(&TokenKind::Semi, "`;` after `break`")?;
                Ok(Node::new(NodeKind::Break, loc))
            }
            TokenKind::Continue => {
                let loc = self.bump().loc;
                self.expect(&TokenKind::Semi, "`;` after `continue`")?;
                Ok(Node::new(NodeKind::Continue, loc))
            }
            TokenKind::Semi => {
                let loc = self.bump().loc;
                Ok(Node::new(NodeKind::Empty, loc))
            }
            // `fn name` opens a function statement; a bare `fn (` is a
            // lambda heading an expression statement.
            TokenKind::Fn if matches!(self.peek_next(), TokenKind::Ident(_)) => self.fn_stmt(),
            _ => {
                let expr = self.expression()?;
                self.expect(&TokenKind::Semi, "`;` after expression")?;
                Ok(expr)
            }
        }
    }

    fn block(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.expect(&TokenKind::LBrace, "`{`")?.loc;
        let saved = std::mem::replace(&mut self.brace_ok, true);

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "`}` closing block")?;

        self.brace_ok = saved;
        Ok(Node::new(NodeKind::Block(stmts), loc))
    }

    fn condition(&mut self) -> Result<Node, SyntaxError> {
        let saved = std::mem::replace(&mut self.brace_ok, false);
        let cond = self.expression();
        self.brace_ok = saved;
        cond
    }

    fn if_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        let cond = self.condition()?;
        let then = self.block()?;

        let els = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.if_stmt()?))
            } else {
                Some(Box::new(self.block()?))
            }
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els,
            },
            loc,
        ))
    }

    fn while_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        let cond = self.condition()?;
        let body = self.block()?;

        Ok(Node::new(
            NodeKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            loc,
        ))
    }

    fn do_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        let body = self.block()?;
        self.expect(&TokenKind::While, "`while` after `do` body")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::Semi, "`;` after `do … while` condition")?;

        Ok(Node::new(
            NodeKind::Do {
                body: Box::new(body),
                cond: Box::new(cond),
            },
            loc,
        ))
    }

    fn for_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        self.expect(&TokenKind::LParen, "`(` after `for`")?;

        let init = if self.eat(&TokenKind::Semi) {
            None
        } else if self.check(&TokenKind::Let) {
            Some(Box::new(self.decl_stmt(false)?))
        } else {
            let expr = self.expression()?;
            self.expect(&TokenKind::Semi, "`;` after `for` initialiser")?;
            Some(Box::new(expr))
        };

        let cond = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect(&TokenKind::Semi, "`;` after `for` condition")?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect(&TokenKind::RParen, "`)` closing `for` header")?;

        let body = self.block()?;

        Ok(Node::new(
            NodeKind::For {
                init,
                cond,
                step,
                body: Box::new(body),
            },
            loc,
        ))
    }

    fn return_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;

        let expr = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.expect(&TokenKind::Semi, "`;` after `return`")?;

        Ok(Node::new(NodeKind::Return(expr), loc))
    }

    fn decl_stmt(&mut self, constant: bool) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        let what = if constant { "constant" } else { "variable" };

        let mut decls = Vec::new();
        loop {
            let name = self.ident(&format!("{what} name"))?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.expression()?)
            } else if constant {
                return Err(SyntaxError::new(
                    format!("constant `{name}` requires an initialiser"),
                    self.loc(),
                ));
            } else {
                None
            };
            decls.push(Declarator { name, init });

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semi, "`;` after declaration")?;

        let kind = if constant {
            NodeKind::ConstDecl(decls)
        } else {
            NodeKind::VarDecl(decls)
        };
        Ok(Node::new(kind, loc))
    }

    fn fn_stmt(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.bump().loc;
        let name = self.ident("function name")?;
        let params = self.params()?;
        let body = self.block()?;

        Ok(Node::new(
            NodeKind::Function {
                name: Some(name),
                params,
                body: Box::new(body),
            },
            loc,
        ))
    }

    fn params(&mut self) -> Result<Vec<Rc<str>>, SyntaxError> {
        self.expect(&TokenKind::LParen, "`(` opening parameter list")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.ident("parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`)` closing parameter list")?;

        Ok(params)
    }

    /* EXPRESSIONS */

    fn expression(&mut self) -> Result<Node, SyntaxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Node, SyntaxError> {
        let target = self.ternary()?;

        let compound = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Mod),
            TokenKind::AmpAssign => Some(BinaryOp::BitAnd),
            TokenKind::PipeAssign => Some(BinaryOp::BitOr),
            TokenKind::CaretAssign => Some(BinaryOp::BitXor),
            TokenKind::ShlAssign => Some(BinaryOp::Shl),
            TokenKind::ShrAssign => Some(BinaryOp::Shr),
            _ => return Ok(target),
        };

        let loc = self.bump().loc;
        if !matches!(
            target.kind,
            NodeKind::Ident(_) | NodeKind::Subscript { .. } | NodeKind::Member { .. }
        ) {
            return Err(SyntaxError::new("invalid assignment target", target.loc));
        }

        let value = self.assignment()?;
        let kind = match compound {
            None => NodeKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            Some(op) => NodeKind::CompoundAssign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
        };

        Ok(Node::new(kind, loc))
    }

    fn ternary(&mut self) -> Result<Node, SyntaxError> {
        let cond = self.logical_or()?;

        if !self.check(&TokenKind::Question) {
            return Ok(cond);
        }
        let loc = self.bump().loc;

        let then = self.expression()?;
        self.expect(&TokenKind::Colon, "`:` of conditional expression")?;
        let els = self.ternary()?;

        Ok(Node::new(
            NodeKind::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            },
            loc,
        ))
    }

    fn binary_chain(
        &mut self,
        next: fn(&mut Self) -> Result<Node, SyntaxError>,
        table: &[(TokenKind, BinaryOp)],
    ) -> Result<Node, SyntaxError> {
        let mut left = next(self)?;

        'outer: loop {
            for (kind, op) in table {
                if self.check(kind) {
                    let loc = self.bump().loc;
                    let right = next(self)?;
                    left = Node::new(
                        NodeKind::Binary {
                            op: *op,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        loc,
                    );
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn logical_or(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::logical_and, &[(TokenKind::OrOr, BinaryOp::LogOr)])
    }

    fn logical_and(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::bit_or, &[(TokenKind::AndAnd, BinaryOp::LogAnd)])
    }

    fn bit_or(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::bit_xor, &[(TokenKind::Pipe, BinaryOp::BitOr)])
    }

    fn bit_xor(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::bit_and, &[(TokenKind::Caret, BinaryOp::BitXor)])
    }

    fn bit_and(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::equality, &[(TokenKind::Amp, BinaryOp::BitAnd)])
    }

    fn equality(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(
            Self::comparison,
            &[(TokenKind::Eq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
        )
    }

    fn comparison(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(
            Self::concat,
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
        )
    }

    fn concat(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(Self::shift, &[(TokenKind::DotDot, BinaryOp::Concat)])
    }

    fn shift(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(
            Self::additive,
            &[
                (TokenKind::Shl, BinaryOp::Shl),
                (TokenKind::Shr, BinaryOp::Shr),
            ],
        )
    }

    fn additive(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(
            Self::multiplicative,
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
        )
    }

    fn multiplicative(&mut self) -> Result<Node, SyntaxError> {
        self.binary_chain(
            Self::unary,
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
        )
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::TypeOf => Some(UnaryOp::TypeOf),
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let inc = self.check(&TokenKind::PlusPlus);
                let loc = self.bump().loc;
                let target = self.unary()?;
                return Ok(Node::new(
                    NodeKind::IncDec {
                        inc,
                        prefix: true,
                        target: Box::new(target),
                    },
                    loc,
                ));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                let loc = self.bump().loc;
                let expr = self.unary()?;
                Ok(Node::new(
                    NodeKind::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                    loc,
                ))
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Node, SyntaxError> {
        let mut expr = self.primary()?;

        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let loc = self.bump().loc;
                    let saved = std::mem::replace(&mut self.brace_ok, true);
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "`)` closing argument list")?;
                    self.brace_ok = saved;
                    expr = Node::new(
                        NodeKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        loc,
                    );
                }
                TokenKind::LBracket => {
                    let loc = self.bump().loc;
                    let saved = std::mem::replace(&mut self.brace_ok, true);
                    let index = self.expression()?;
                    self.expect(&TokenKind::RBracket, "`]` closing subscript")?;
                    self.brace_ok = saved;
                    expr = Node::new(
                        NodeKind::Subscript {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        loc,
                    );
                }
                TokenKind::Dot => {
                    let loc = self.bump().loc;
                    let name = self.ident("property name after `.`")?;
                    expr = Node::new(
                        NodeKind::Member {
                            object: Box::new(expr),
                            name,
                        },
                        loc,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let inc = self.check(&TokenKind::PlusPlus);
                    let loc = self.bump().loc;
                    expr = Node::new(
                        NodeKind::IncDec {
                            inc,
                            prefix: false,
                            target: Box::new(expr),
                        },
                        loc,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Node, SyntaxError> {
        let loc = self.loc();

        let kind = match self.peek().clone() {
            TokenKind::Int(i) => {
                self.bump();
                NodeKind::Literal(Literal::Int(i))
            }
            TokenKind::Float(f) => {
                self.bump();
                NodeKind::Literal(Literal::Float(f))
            }
            TokenKind::Str(s) => {
                self.bump();
                NodeKind::Literal(Literal::Str(s))
            }
            TokenKind::True => {
                self.bump();
                NodeKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                NodeKind::Literal(Literal::Bool(false))
            }
            TokenKind::Nil => {
                self.bump();
                NodeKind::Literal(Literal::Nil)
            }
            TokenKind::Ident(name) => {
                self.bump();
                NodeKind::Ident(name)
            }
            TokenKind::Dollar => {
                self.bump();
                NodeKind::Argv
            }
            TokenKind::LParen => {
                self.bump();
                let saved = std::mem::replace(&mut self.brace_ok, true);
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "`)` closing parenthesis")?;
                self.brace_ok = saved;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.bump();
                let saved = std::mem::replace(&mut self.brace_ok, true);
                let mut elems = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elems.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "`]` closing array literal")?;
                self.brace_ok = saved;
                NodeKind::Array(elems)
            }
            TokenKind::LBrace if self.brace_ok => {
                self.bump();
                let mut pairs = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let key = self.expression()?;
                        self.expect(&TokenKind::Colon, "`:` between hashmap key and value")?;
                        let value = self.expression()?;
                        pairs.push((key, value));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "`}` closing hashmap literal")?;
                NodeKind::Hashmap(pairs)
            }
            TokenKind::Fn => {
                self.bump();
                let params = self.params()?;
                let body = self.block()?;
                NodeKind::Function {
                    name: None,
                    params,
                    body: Box::new(body),
                }
            }
            other => {
                return Err(SyntaxError::new(
                    format!("expected expression, found {other:?}"),
                    loc,
                ));
            }
        };

        Ok(Node::new(kind, loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr(source: &str) -> Node {
        let program = parse(&format!("return {source};")).unwrap();
        match program.kind {
            NodeKind::Program(mut stmts) => match stmts.remove(0).kind {
                NodeKind::Return(Some(expr)) => *expr,
                other => panic!("expected return statement, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let expr = parse_expr("1 + 2 * 3");

        let NodeKind::Binary { op, right, .. } = expr.kind else {
            panic!("expected binary node");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            NodeKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn concat_binds_tighter_than_comparison() {
        let expr = parse_expr(r#""a" .. "b" == "ab""#);

        assert!(matches!(
            expr.kind,
            NodeKind::Binary {
                op: BinaryOp::Eq,
                ..
            }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expr("a = b = 1");

        let NodeKind::Assign { value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, NodeKind::Assign { .. }));
    }

    #[test]
    fn postfix_chains() {
        let expr = parse_expr("a.b[0](1, 2)");

        let NodeKind::Call { func, args } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(func.kind, NodeKind::Subscript { .. }));
    }

    #[test]
    fn braces_in_condition_open_the_block() {
        let program = parse("if x { return 1; }").unwrap();

        let NodeKind::Program(stmts) = program.kind else {
            unreachable!();
        };
        assert!(matches!(stmts[0].kind, NodeKind::If { .. }));
    }

    #[test]
    fn hashmap_literals_parse_where_unambiguous() {
        let expr = parse_expr(r#"{ "a": 1, 2: "b" }"#);

        let NodeKind::Hashmap(pairs) = expr.kind else {
            panic!("expected hashmap literal");
        };
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn named_fn_statement_and_lambda_expression() {
        let program = parse("fn add(a, b) { return a + b; } let f = fn (x) { return x; };")
            .unwrap();

        let NodeKind::Program(stmts) = program.kind else {
            unreachable!();
        };
        assert!(
            matches!(&stmts[0].kind, NodeKind::Function { name: Some(n), .. } if n.as_ref() == "add")
        );
        assert!(matches!(&stmts[1].kind, NodeKind::VarDecl(_)));
    }

    #[test]
    fn missing_semicolon_is_a_syntax_error() {
        assert!(parse("return 1").is_err());
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        assert!(parse("1 = 2;").is_err());
    }
}
