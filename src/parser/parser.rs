//! Recursive-descent parser for the Python teaching subset

use crate::diagnostics::{error_codes::syntax, Diagnostic, DiagnosticBag, Span};
use crate::parser::ast::*;
use crate::parser::lexer::{Token, TokenKind};

/// Parser over a complete token stream
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: DiagnosticBag,
}

impl Parser {
    /// Create a parser; `tokens` must end with `Eof`
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: DiagnosticBag::new(),
        }
    }

    /// Parse a whole module
    pub fn parse_module(&mut self) -> Result<Module, DiagnosticBag> {
        let start_span = self.current_span();
        let mut body = Vec::new();

        while !self.is_eof() {
            if self.check(&TokenKind::Newline) {
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Ok(stmts) => body.extend(stmts),
                Err(diag) => {
                    self.errors.push(diag);
                    self.recover_to_next_line();
                }
            }
        }

        if self.errors.has_errors() {
            return Err(self.errors.clone());
        }

        let end_span = self.current_span();
        Ok(Module {
            id: NodeId::new(),
            span: start_span.merge(&end_span),
            body,
        })
    }

    fn recover_to_next_line(&mut self) {
        while !self.is_eof() {
            if self.advance().kind == TokenKind::Newline {
                break;
            }
        }
    }

    // Statements

    fn parse_statement(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        match self.peek().kind {
            TokenKind::Def => Ok(vec![Stmt::FunctionDef(self.parse_function_def()?)]),
            TokenKind::Class => Ok(vec![Stmt::ClassDef(self.parse_class_def()?)]),
            TokenKind::If => Ok(vec![self.parse_if()?]),
            TokenKind::While => Ok(vec![self.parse_while()?]),
            TokenKind::For => Ok(vec![self.parse_for()?]),
            TokenKind::Indent => Err(Diagnostic::error(syntax::INCONSISTENT_INDENT)
                .message("Unexpected indent")
                .span(self.current_span())
                .build()),
            _ => self.parse_simple_statements(),
        }
    }

    /// `small (';' small)* NEWLINE`
    fn parse_simple_statements(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.check(&TokenKind::Semicolon) {
            self.advance();
            if self.check(&TokenKind::Newline) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        self.expect(TokenKind::Newline)?;
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        match self.peek().kind {
            TokenKind::Pass => {
                self.advance();
                Ok(Stmt::Pass {
                    id: NodeId::new(),
                    span: start,
                })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break {
                    id: NodeId::new(),
                    span: start,
                })
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue {
                    id: NodeId::new(),
                    span: start,
                })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                Ok(Stmt::Return {
                    id: NodeId::new(),
                    span: self.span_from(&start),
                    value,
                })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.check(&TokenKind::Comma) {
                    self.advance();
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(Stmt::Assert {
                    id: NodeId::new(),
                    span: self.span_from(&start),
                    test,
                    msg,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        let first = self.parse_testlist()?;

        if self.check(&TokenKind::Colon) {
            self.advance();
            let annotation = self.parse_test()?;
            let value = if self.check(&TokenKind::Eq) {
                self.advance();
                Some(self.parse_testlist()?)
            } else {
                None
            };
            self.check_target(&first)?;
            return Ok(Stmt::AnnAssign {
                id: NodeId::new(),
                span: self.span_from(&start),
                target: first,
                annotation,
                value,
            });
        }

        if let Some(op) = self.augmented_op() {
            self.advance();
            let value = self.parse_testlist()?;
            self.check_target(&first)?;
            return Ok(Stmt::AugAssign {
                id: NodeId::new(),
                span: self.span_from(&start),
                target: first,
                op,
                value,
            });
        }

        if self.check(&TokenKind::Eq) {
            let mut targets = vec![first];
            let mut value = None;
            while self.check(&TokenKind::Eq) {
                self.advance();
                let next = self.parse_testlist()?;
                if let Some(previous) = value.replace(next) {
                    targets.push(previous);
                }
            }
            for target in &targets {
                self.check_target(target)?;
            }
            let value = match value {
                Some(value) => value,
                None => return Err(self.error_unexpected("expression")),
            };
            return Ok(Stmt::Assign {
                id: NodeId::new(),
                span: self.span_from(&start),
                targets,
                value,
            });
        }

        Ok(Stmt::Expr {
            id: NodeId::new(),
            span: self.span_from(&start),
            expr: first,
        })
    }

    fn augmented_op(&mut self) -> Option<BinaryOp> {
        Some(match self.peek().kind {
            TokenKind::PlusEq => BinaryOp::Add,
            TokenKind::MinusEq => BinaryOp::Sub,
            TokenKind::StarEq => BinaryOp::Mul,
            TokenKind::SlashEq => BinaryOp::Div,
            TokenKind::SlashSlashEq => BinaryOp::FloorDiv,
            TokenKind::PercentEq => BinaryOp::Mod,
            TokenKind::StarStarEq => BinaryOp::Pow,
            _ => return None,
        })
    }

    fn check_target(&self, target: &Expr) -> Result<(), Diagnostic> {
        match target {
            Expr::Name { .. } | Expr::Attribute { .. } | Expr::Subscript { .. } => Ok(()),
            Expr::Tuple { elts, .. } | Expr::List { elts, .. } => {
                elts.iter().try_for_each(|e| self.check_target(e))
            }
            other => Err(Diagnostic::error(syntax::UNEXPECTED_TOKEN)
                .message(format!("Cannot assign to expression `{}`", other))
                .span(other.span().clone())
                .build()),
        }
    }

    fn parse_import(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Import)?;
        let mut names = vec![self.parse_alias(true)?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            names.push(self.parse_alias(true)?);
        }
        Ok(Stmt::Import {
            id: NodeId::new(),
            span: self.span_from(&start),
            module: None,
            names,
        })
    }

    fn parse_from_import(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::From)?;
        let module = self.parse_dotted_name()?;
        self.expect(TokenKind::Import)?;

        let parenthesized = self.check(&TokenKind::LParen);
        if parenthesized {
            self.advance();
        }
        let mut names = vec![self.parse_alias(false)?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if parenthesized && self.check(&TokenKind::RParen) {
                break;
            }
            names.push(self.parse_alias(false)?);
        }
        if parenthesized {
            self.expect(TokenKind::RParen)?;
        }

        Ok(Stmt::Import {
            id: NodeId::new(),
            span: self.span_from(&start),
            module: Some(module),
            names,
        })
    }

    fn parse_alias(&mut self, dotted: bool) -> Result<Alias, Diagnostic> {
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            self.expect_ident()?
        };
        let asname = if self.check(&TokenKind::As) {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_dotted_name(&mut self) -> Result<String, Diagnostic> {
        let mut name = self.expect_ident()?;
        while self.check(&TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Def)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params(&TokenKind::RParen, true)?;
        self.expect(TokenKind::RParen)?;

        let returns = if self.check(&TokenKind::Arrow) {
            self.advance();
            Some(self.parse_test()?)
        } else {
            None
        };
        let header = self.span_from(&start);
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;

        Ok(FunctionDef {
            id: NodeId::new(),
            span: header,
            name,
            params,
            returns,
            body,
        })
    }

    fn parse_params(&mut self, close: &TokenKind, annotations: bool) -> Result<Vec<Param>, Diagnostic> {
        let mut params = Vec::new();
        while !self.check(close) {
            let start = self.current_span();
            let name = self.expect_ident()?;
            let annotation = if annotations && self.check(&TokenKind::Colon) {
                self.advance();
                Some(self.parse_test()?)
            } else {
                None
            };
            let default = if self.check(&TokenKind::Eq) {
                self.advance();
                Some(self.parse_test()?)
            } else {
                None
            };
            params.push(Param {
                id: NodeId::new(),
                span: self.span_from(&start),
                name,
                annotation,
                default,
            });
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(params)
    }

    fn parse_class_def(&mut self) -> Result<ClassDef, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Class)?;
        let name = self.expect_ident()?;
        let mut bases = Vec::new();
        if self.check(&TokenKind::LParen) {
            self.advance();
            while !self.check(&TokenKind::RParen) {
                bases.push(self.parse_test()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
            self.expect(TokenKind::RParen)?;
        }
        let header = self.span_from(&start);
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;

        Ok(ClassDef {
            id: NodeId::new(),
            span: header,
            name,
            bases,
            body,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        self.advance();
        let test = self.parse_test()?;
        let span = self.span_from(&start);
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;

        let orelse = match self.peek().kind {
            TokenKind::Elif => vec![self.parse_if()?],
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                self.parse_suite()?
            }
            _ => Vec::new(),
        };

        Ok(Stmt::If {
            id: NodeId::new(),
            span,
            test,
            body,
            orelse,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::While)?;
        let test = self.parse_test()?;
        let span = self.span_from(&start);
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Stmt::While {
            id: NodeId::new(),
            span,
            test,
            body,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::For)?;
        let target = self.parse_target_list()?;
        self.check_target(&target)?;
        self.expect(TokenKind::In)?;
        let iter = self.parse_testlist()?;
        let span = self.span_from(&start);
        self.expect(TokenKind::Colon)?;
        let body = self.parse_suite()?;
        Ok(Stmt::For {
            id: NodeId::new(),
            span,
            target,
            iter,
            body,
        })
    }

    /// Loop targets stop before `in`, so they are parsed below comparisons
    fn parse_target_list(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let first = self.parse_arith()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.check(&TokenKind::In) {
                break;
            }
            elts.push(self.parse_arith()?);
        }
        Ok(Expr::Tuple {
            id: NodeId::new(),
            span: self.span_from(&start),
            elts,
        })
    }

    /// Either an indented block or simple statements on the same line
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        if !self.check(&TokenKind::Newline) {
            return self.parse_simple_statements();
        }
        self.advance();
        self.expect(TokenKind::Indent)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_eof() {
            if self.check(&TokenKind::Newline) {
                self.advance();
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        if self.check(&TokenKind::Dedent) {
            self.advance();
        }
        Ok(body)
    }

    // Expressions

    /// Comma-separated expressions; more than one (or a trailing comma) makes a tuple
    fn parse_testlist(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let first = self.parse_test()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            if self.at_expression_end() {
                break;
            }
            elts.push(self.parse_test()?);
        }
        Ok(Expr::Tuple {
            id: NodeId::new(),
            span: self.span_from(&start),
            elts,
        })
    }

    fn parse_test(&mut self) -> Result<Expr, Diagnostic> {
        if self.check(&TokenKind::Lambda) {
            return self.parse_lambda();
        }
        let start = self.current_span();
        let body = self.parse_or()?;
        if !self.check(&TokenKind::If) {
            return Ok(body);
        }
        self.advance();
        let test = self.parse_or()?;
        self.expect(TokenKind::Else)?;
        let orelse = self.parse_test()?;
        Ok(Expr::IfExp {
            id: NodeId::new(),
            span: self.span_from(&start),
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn parse_lambda(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        self.expect(TokenKind::Lambda)?;
        let params = self.parse_params(&TokenKind::Colon, false)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_test()?;
        Ok(Expr::Lambda {
            id: NodeId::new(),
            span: self.span_from(&start),
            params,
            body: Box::new(body),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BoolOp {
                id: NodeId::new(),
                span: self.span_from(&start),
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::BoolOp {
                id: NodeId::new(),
                span: self.span_from(&start),
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, Diagnostic> {
        if !self.check(&TokenKind::Not) {
            return self.parse_comparison();
        }
        let start = self.current_span();
        self.advance();
        let operand = self.parse_not()?;
        Ok(Expr::UnaryOp {
            id: NodeId::new(),
            span: self.span_from(&start),
            op: UnaryOp::Not,
            operand: Box::new(operand),
        })
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let left = self.parse_arith()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.comparison_op() {
            let right = self.parse_arith()?;
            comparisons.push((op, right));
        }
        if comparisons.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            id: NodeId::new(),
            span: self.span_from(&start),
            left: Box::new(left),
            comparisons,
        })
    }

    /// Consumes and returns a comparison operator, if one is next
    fn comparison_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek().kind {
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtEq => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtEq => CompareOp::Ge,
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::BangEq => CompareOp::Ne,
            TokenKind::In => CompareOp::In,
            TokenKind::Not if self.peek_nth(1).kind == TokenKind::In => {
                self.advance();
                CompareOp::NotIn
            }
            TokenKind::Is if self.peek_nth(1).kind == TokenKind::Not => {
                self.advance();
                CompareOp::IsNot
            }
            TokenKind::Is => CompareOp::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_arith(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary(&[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::SlashSlash, BinaryOp::FloorDiv),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_factor,
        )
    }

    /// Left-associative binary level over `operand`
    fn parse_binary(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, Diagnostic>,
    ) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut left = operand(self)?;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(kind, _)| self.check(kind))
                .map(|(_, op)| *op)
            else {
                break;
            };
            self.advance();
            let right = operand(self)?;
            left = Expr::BinOp {
                id: NodeId::new(),
                span: self.span_from(&start),
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.current_span();
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expr::UnaryOp {
            id: NodeId::new(),
            span: self.span_from(&start),
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let base = self.parse_postfix()?;
        if !self.check(&TokenKind::StarStar) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.parse_factor()?;
        Ok(Expr::BinOp {
            id: NodeId::new(),
            span: self.span_from(&start),
            left: Box::new(base),
            op: BinaryOp::Pow,
            right: Box::new(exponent),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let start = self.current_span();
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    self.expect(TokenKind::RParen)?;
                    expr = Expr::Call {
                        id: NodeId::new(),
                        span: self.span_from(&start),
                        func: Box::new(expr),
                        args,
                        keywords,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_testlist()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Subscript {
                        id: NodeId::new(),
                        span: self.span_from(&start),
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let attr = self.expect_ident()?;
                    expr = Expr::Attribute {
                        id: NodeId::new(),
                        span: self.span_from(&start),
                        value: Box::new(expr),
                        attr,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), Diagnostic> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let is_keyword = matches!(self.peek().kind, TokenKind::Ident(_))
                && self.peek_nth(1).kind == TokenKind::Eq;
            if is_keyword {
                let start = self.current_span();
                let name = self.expect_ident()?;
                self.advance();
                let value = self.parse_test()?;
                keywords.push(Keyword {
                    id: NodeId::new(),
                    span: self.span_from(&start),
                    name,
                    value,
                });
            } else if !keywords.is_empty() {
                return Err(Diagnostic::error(syntax::UNEXPECTED_TOKEN)
                    .message("Positional argument follows keyword argument")
                    .span(self.current_span())
                    .build());
            } else {
                args.push(self.parse_test()?);
            }
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok((args, keywords))
    }

    fn parse_atom(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let id = NodeId::new();
        match token.kind {
            TokenKind::IntLit(value) => {
                self.advance();
                Ok(Expr::Int {
                    id,
                    span: token.span,
                    value,
                })
            }
            TokenKind::FloatLit(value) => {
                self.advance();
                Ok(Expr::Float {
                    id,
                    span: token.span,
                    value,
                })
            }
            TokenKind::StrLit(first) => {
                self.advance();
                let mut value = first;
                while let TokenKind::StrLit(next) = &self.peek().kind {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str {
                    id,
                    span: self.span_from(&token.span),
                    value,
                })
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expr::Bool {
                    id,
                    span: token.span,
                    value: token.kind == TokenKind::True,
                })
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::NoneLit {
                    id,
                    span: token.span,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Name {
                    id,
                    span: token.span,
                    name,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.check(&TokenKind::RParen) {
                    self.advance();
                    return Ok(Expr::Tuple {
                        id,
                        span: self.span_from(&token.span),
                        elts: Vec::new(),
                    });
                }
                let inner = self.parse_testlist()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elts = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    elts.push(self.parse_test()?);
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List {
                    id,
                    span: self.span_from(&token.span),
                    elts,
                })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.parse_test()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_test()?;
                    entries.push((key, value));
                    if !self.check(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RBrace)?;
                Ok(Expr::Dict {
                    id,
                    span: self.span_from(&token.span),
                    entries,
                })
            }
            TokenKind::Eof => Err(Diagnostic::error(syntax::UNEXPECTED_EOF)
                .message("Unexpected end of file")
                .span(token.span)
                .build()),
            _ => Err(self.error_unexpected("expression")),
        }
    }

    // Helpers

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        token
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.peek().span.clone()
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span.clone()
    }

    /// Span from `start` to the end of the last consumed token
    fn span_from(&self, start: &Span) -> Span {
        start.merge(&self.previous_span())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::Eq
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::Colon
        )
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        let token = self.peek();
        let code = if token.kind == TokenKind::Eof {
            syntax::UNEXPECTED_EOF
        } else {
            syntax::UNEXPECTED_TOKEN
        };
        Err(Diagnostic::error(code)
            .message(format!("Expected {:?}, found {:?}", kind, token.kind))
            .span(token.span.clone())
            .build())
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_unexpected("identifier")),
        }
    }

    fn error_unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        Diagnostic::error(syntax::UNEXPECTED_TOKEN)
            .message(format!("Expected {}, found {:?}", expected, token.kind))
            .span(token.span.clone())
            .build()
    }
}
