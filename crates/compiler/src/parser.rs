//! Recursive-descent parser for the Structured Text subset
//!
//! The parser never fails outright: on an unexpected token it records a
//! `PARSE` diagnostic, skips to the next recovery point (`;`, `END_IF`,
//! `END_CASE`, `END_VAR`, `END_PROGRAM`) and keeps going, so one source
//! file always yields exactly one (possibly partial) AST plus any number
//! of errors. Expressions are parsed by precedence with left folding for
//! operators in the same tier.

use crate::ast::{
    BinaryOp, CaseClause, CaseLabel, DataType, Declaration, Expression, LiteralValue, Program,
    Span, Statement, UnaryOp, VarBlock, VarScope,
};
use crate::diagnostics::{line_col, Diagnostic, DiagnosticKind};
use crate::lexer::{tokenize, Comment, Token, TokenKind};
use crate::timeval;

/// Words that can never be identifiers in an expression or path
const RESERVED: &[&str] = &[
    "PROGRAM", "END_PROGRAM", "VAR", "VAR_INPUT", "VAR_OUTPUT", "VAR_IN_OUT", "VAR_TEMP",
    "VAR_GLOBAL", "END_VAR", "IF", "THEN", "ELSIF", "ELSE", "END_IF", "CASE", "OF", "END_CASE",
    "FOR", "TO", "BY", "DO", "END_FOR", "WHILE", "END_WHILE", "REPEAT", "UNTIL", "END_REPEAT",
    "NOT", "AND", "OR", "XOR", "MOD", "TRUE", "FALSE",
];

/// Keywords the recovery scan stops in front of
const RECOVERY_KEYWORDS: &[&str] = &[
    "END_IF", "END_CASE", "END_VAR", "END_PROGRAM", "END_FOR", "END_WHILE", "END_REPEAT",
    "ELSIF", "ELSE", "UNTIL", "VAR", "VAR_INPUT", "VAR_OUTPUT", "VAR_IN_OUT", "VAR_TEMP",
    "VAR_GLOBAL",
];

pub struct ParseResult {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let lexed = tokenize(source);
        Parser {
            source,
            tokens: lexed.tokens,
            comments: lexed.comments,
            pos: 0,
            diagnostics: lexed.diagnostics,
        }
    }

    pub fn parse(mut self) -> ParseResult {
        let mut program = Program::new();

        if self.check_kw("PROGRAM") {
            self.advance();
            match self.expect_ident("a program name after 'PROGRAM'") {
                Ok(name) => program.name = Some(name.text),
                Err(()) => self.synchronize(),
            }
        }

        while !self.at_end() {
            if self.check_kw("END_PROGRAM") {
                self.advance();
                self.eat(TokenKind::Semicolon);
                if !self.at_end() {
                    let span = self.current_span();
                    self.error("unexpected tokens after END_PROGRAM", span);
                }
                break;
            }

            if let Some(scope) = self.peek_var_scope() {
                match self.parse_var_block(scope) {
                    Ok(block) => program.var_blocks.push(block),
                    Err(()) => self.synchronize(),
                }
                continue;
            }

            let before = self.pos;
            match self.parse_statement() {
                Ok(stmt) => program.statements.push(stmt),
                Err(()) => {
                    self.synchronize();
                    // Guarantee progress on a stray structural keyword
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }

        program.span = Span::new(0, self.source.len());
        self.attach_declaration_comments(&mut program);

        ParseResult {
            program,
            diagnostics: self.diagnostics,
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn peek_var_scope(&self) -> Option<VarScope> {
        let token = self.peek()?;
        if token.kind != TokenKind::Ident {
            return None;
        }
        match token.text.to_ascii_uppercase().as_str() {
            "VAR" => Some(VarScope::Local),
            "VAR_INPUT" => Some(VarScope::Input),
            "VAR_OUTPUT" => Some(VarScope::Output),
            "VAR_IN_OUT" => Some(VarScope::InOut),
            "VAR_TEMP" => Some(VarScope::Temp),
            "VAR_GLOBAL" => Some(VarScope::Global),
            _ => None,
        }
    }

    fn parse_var_block(&mut self, scope: VarScope) -> Result<VarBlock, ()> {
        let start = self.current_span().start;
        self.advance();

        let mut decls = Vec::new();
        while !self.at_end() && !self.check_kw("END_VAR") {
            match self.parse_declaration() {
                Ok(decl) => decls.push(decl),
                Err(()) => {
                    self.recover_in_block("END_VAR");
                    if self.check_kw("END_VAR") {
                        break;
                    }
                }
            }
        }

        self.expect_kw("END_VAR")?;
        self.eat(TokenKind::Semicolon);

        Ok(VarBlock {
            scope,
            decls,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ()> {
        let start = self.current_span().start;

        let mut names = vec![self.expect_ident("a variable name")?.text];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident("a variable name after ','")?.text);
        }

        self.expect(TokenKind::Colon, "':' after the variable name")?;

        let type_token = self.expect_ident("a type name")?;
        let data_type = match DataType::from_name(&type_token.text) {
            Some(t) => t,
            None => {
                self.error(
                    &format!("unknown type '{}'", type_token.text),
                    type_token.span,
                );
                return Err(());
            }
        };

        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        if !self.eat(TokenKind::Semicolon) {
            self.error_expected("';' after the declaration");
        }

        Ok(Declaration {
            names,
            data_type,
            init,
            comment: None,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// Attach each trailing comment to the declaration that ends on the
    /// same source line
    fn attach_declaration_comments(&self, program: &mut Program) {
        for block in &mut program.var_blocks {
            for decl in &mut block.decls {
                let (decl_line, _) = line_col(self.source, decl.span.end.saturating_sub(1));
                for comment in &self.comments {
                    if comment.span.start < decl.span.end {
                        continue;
                    }
                    let (comment_line, _) = line_col(self.source, comment.span.start);
                    if comment_line == decl_line {
                        decl.comment = Some(comment.text.clone());
                        break;
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, ()> {
        if self.check_kw("IF") {
            return self.parse_if();
        }
        if self.check_kw("CASE") {
            return self.parse_case();
        }
        if self.check_kw("FOR") {
            return self.parse_for();
        }
        if self.check_kw("WHILE") {
            return self.parse_while();
        }
        if self.check_kw("REPEAT") {
            return self.parse_repeat();
        }

        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident && !is_reserved(&t.text) => {
                self.parse_assignment_or_call()
            }
            Some(t) => {
                let (text, span) = (t.text.clone(), t.span);
                self.error(&format!("expected a statement, found '{}'", text), span);
                Err(())
            }
            None => {
                let span = self.current_span();
                self.error("expected a statement, found end of input", span);
                Err(())
            }
        }
    }

    fn parse_assignment_or_call(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        let path = self.parse_path()?;

        if self.check(TokenKind::LParen) {
            if path.len() > 1 {
                let span = Span::new(start, self.prev_end());
                self.error("a function-block call cannot use a dotted name", span);
                return Err(());
            }
            let args = self.parse_call_arguments()?;
            if !self.eat(TokenKind::Semicolon) {
                self.error_expected("';' after the call");
            }
            return Ok(Statement::FbCall {
                instance: path.into_iter().next().unwrap(),
                args,
                span: Span::new(start, self.prev_end()),
            });
        }

        self.expect(TokenKind::Assign, "':=' after the assignment target")?;
        let value = self.parse_expression()?;
        if !self.eat(TokenKind::Semicolon) {
            self.error_expected("';' after the assignment");
        }

        Ok(Statement::Assignment {
            target: path,
            value,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// `(IN := x, PT := T#1s)`, named arguments only
    fn parse_call_arguments(&mut self) -> Result<Vec<(String, Expression)>, ()> {
        self.expect(TokenKind::LParen, "'(' for the call")?;
        let mut args = Vec::new();
        if self.eat(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            let name = self.expect_ident("an argument name")?.text;
            self.expect(TokenKind::Assign, "':=' after the argument name")?;
            let value = self.parse_expression()?;
            args.push((name, value));
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "')' after the arguments")?;
            break;
        }
        Ok(args)
    }

    fn parse_if(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        self.advance();

        let condition = self.parse_expression()?;
        self.expect_kw("THEN")?;
        let then_branch = self.parse_statement_list(&["ELSIF", "ELSE", "END_IF"]);

        let mut elsif_branches = Vec::new();
        while self.check_kw("ELSIF") {
            self.advance();
            let cond = self.parse_expression()?;
            self.expect_kw("THEN")?;
            let body = self.parse_statement_list(&["ELSIF", "ELSE", "END_IF"]);
            elsif_branches.push((cond, body));
        }

        let else_branch = if self.check_kw("ELSE") {
            self.advance();
            Some(self.parse_statement_list(&["END_IF"]))
        } else {
            None
        };

        self.expect_kw("END_IF")?;
        self.eat(TokenKind::Semicolon);

        Ok(Statement::If {
            condition,
            then_branch,
            elsif_branches,
            else_branch,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_case(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        self.advance();

        let selector = self.parse_expression()?;
        self.expect_kw("OF")?;

        let mut clauses = Vec::new();
        while !self.at_end() && !self.check_kw("ELSE") && !self.check_kw("END_CASE") {
            match self.parse_case_clause() {
                Ok(clause) => clauses.push(clause),
                Err(()) => {
                    self.synchronize();
                    if !self.at_case_label() {
                        break;
                    }
                }
            }
        }

        let else_branch = if self.check_kw("ELSE") {
            self.advance();
            Some(self.parse_statement_list(&["END_CASE"]))
        } else {
            None
        };

        self.expect_kw("END_CASE")?;
        self.eat(TokenKind::Semicolon);

        Ok(Statement::Case {
            selector,
            clauses,
            else_branch,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_case_clause(&mut self) -> Result<CaseClause, ()> {
        let start = self.current_span().start;

        let mut labels = vec![self.parse_case_label()?];
        while self.eat(TokenKind::Comma) {
            labels.push(self.parse_case_label()?);
        }
        self.expect(TokenKind::Colon, "':' after the case label")?;

        // Body runs until the next label, ELSE, or END_CASE
        let mut body = Vec::new();
        while !self.at_end()
            && !self.check_kw("ELSE")
            && !self.check_kw("END_CASE")
            && !self.at_case_label()
        {
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(()) => {
                    self.synchronize();
                    if self.stalled_at_recovery_point(&["ELSE", "END_CASE"]) {
                        break;
                    }
                }
            }
        }

        Ok(CaseClause {
            labels,
            body,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// `3`, `-2`, `1..5`
    fn parse_case_label(&mut self) -> Result<CaseLabel, ()> {
        let low = self.parse_label_int()?;
        if self.eat(TokenKind::DotDot) {
            let high = self.parse_label_int()?;
            if high < low {
                let span = Span::new(self.prev_end().saturating_sub(1), self.prev_end());
                self.error(
                    &format!("case range {}..{} is empty", low, high),
                    span,
                );
            }
            return Ok(CaseLabel::Range(low, high));
        }
        Ok(CaseLabel::Value(low))
    }

    fn parse_label_int(&mut self) -> Result<i64, ()> {
        let negative = self.eat(TokenKind::Minus);
        match self.peek() {
            Some(t) if t.kind == TokenKind::IntLit => {
                let (text, span) = (t.text.clone(), t.span);
                self.advance();
                match text.parse::<i64>() {
                    Ok(v) => Ok(if negative { -v } else { v }),
                    Err(_) => {
                        self.error(&format!("integer '{}' is out of range", text), span);
                        Err(())
                    }
                }
            }
            _ => {
                let span = self.current_span();
                self.error("expected an integer case label", span);
                Err(())
            }
        }
    }

    /// True when the upcoming tokens start a case label
    fn at_case_label(&self) -> bool {
        match self.peek() {
            Some(t) if t.kind == TokenKind::IntLit => true,
            Some(t) if t.kind == TokenKind::Minus => self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|n| n.kind == TokenKind::IntLit),
            _ => false,
        }
    }

    fn parse_for(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        self.advance();

        let var = self.expect_ident("a loop variable after 'FOR'")?.text;
        self.expect(TokenKind::Assign, "':=' after the loop variable")?;
        let from = self.parse_expression()?;
        self.expect_kw("TO")?;
        let to = self.parse_expression()?;
        let by = if self.check_kw("BY") {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_kw("DO")?;
        let body = self.parse_statement_list(&["END_FOR"]);
        self.expect_kw("END_FOR")?;
        self.eat(TokenKind::Semicolon);

        Ok(Statement::For {
            var,
            from,
            to,
            by,
            body,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_while(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        self.advance();

        let condition = self.parse_expression()?;
        self.expect_kw("DO")?;
        let body = self.parse_statement_list(&["END_WHILE"]);
        self.expect_kw("END_WHILE")?;
        self.eat(TokenKind::Semicolon);

        Ok(Statement::While {
            condition,
            body,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_repeat(&mut self) -> Result<Statement, ()> {
        let start = self.current_span().start;
        self.advance();

        let body = self.parse_statement_list(&["UNTIL"]);
        self.expect_kw("UNTIL")?;
        let until = self.parse_expression()?;
        self.expect_kw("END_REPEAT")?;
        self.eat(TokenKind::Semicolon);

        Ok(Statement::Repeat {
            body,
            until,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// Parse statements until one of `terminators` (or end of input),
    /// recovering inside the list so one bad statement does not consume
    /// its siblings
    fn parse_statement_list(&mut self, terminators: &[&str]) -> Vec<Statement> {
        let mut statements = Vec::new();
        while !self.at_end() && !terminators.iter().any(|kw| self.check_kw(kw)) {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(()) => {
                    self.synchronize();
                    if self.stalled_at_recovery_point(terminators) {
                        break;
                    }
                }
            }
        }
        statements
    }

    /// After a synchronize, true when the current token is a structural
    /// keyword that this list does not own; the caller must stop so its
    /// parent can consume it
    fn stalled_at_recovery_point(&self, terminators: &[&str]) -> bool {
        match self.peek() {
            Some(t) => {
                let upper = t.text.to_ascii_uppercase();
                RECOVERY_KEYWORDS.contains(&upper.as_str())
                    && !terminators.contains(&upper.as_str())
            }
            None => true,
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expression, ()> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_xor()?;
        while self.check_kw("OR") {
            self.advance();
            let right = self.parse_xor()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_and()?;
        while self.check_kw("XOR") {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Xor, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_equality()?;
        while self.check_kw("AND") {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::Greater) => BinaryOp::Gt,
                Some(TokenKind::LessEq) => BinaryOp::Le,
                Some(TokenKind::GreaterEq) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, ()> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(t) if t.kind == TokenKind::Star => BinaryOp::Mul,
                Some(t) if t.kind == TokenKind::Slash => BinaryOp::Div,
                Some(t) if t.is_kw("MOD") => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ()> {
        if self.check_kw("NOT") {
            let start = self.current_span().start;
            self.advance();
            let operand = self.parse_unary()?;
            let span = Span::new(start, operand.span().end);
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            });
        }
        if self.check(TokenKind::Minus) {
            let start = self.current_span().start;
            self.advance();
            let operand = self.parse_unary()?;
            let span = Span::new(start, operand.span().end);
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ()> {
        let token = match self.peek() {
            Some(t) => t.clone(),
            None => {
                let span = self.current_span();
                self.error("expected an expression, found end of input", span);
                return Err(());
            }
        };

        match token.kind {
            TokenKind::IntLit => {
                self.advance();
                match token.text.parse::<i64>() {
                    Ok(v) => Ok(Expression::Literal {
                        value: LiteralValue::Int(v),
                        raw: token.text,
                        span: token.span,
                    }),
                    Err(_) => {
                        self.error(
                            &format!("integer '{}' is out of range", token.text),
                            token.span,
                        );
                        Err(())
                    }
                }
            }
            TokenKind::RealLit => {
                self.advance();
                match token.text.parse::<f64>() {
                    Ok(v) => Ok(Expression::Literal {
                        value: LiteralValue::Real(v),
                        raw: token.text,
                        span: token.span,
                    }),
                    Err(_) => {
                        self.error(&format!("bad real literal '{}'", token.text), token.span);
                        Err(())
                    }
                }
            }
            TokenKind::TimeLit => {
                self.advance();
                match timeval::parse_time_literal(&token.text) {
                    Ok(ms) => Ok(Expression::Literal {
                        value: LiteralValue::Time(ms),
                        raw: token.text,
                        span: token.span,
                    }),
                    Err(message) => {
                        self.error(&message, token.span);
                        Err(())
                    }
                }
            }
            TokenKind::StringLit => {
                self.advance();
                let inner = token.text.trim_matches('\'').to_string();
                Ok(Expression::Literal {
                    value: LiteralValue::Str(inner),
                    raw: token.text,
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                let start = token.span.start;
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')' to close the parenthesis")?;
                Ok(Expression::Paren {
                    inner: Box::new(inner),
                    span: Span::new(start, self.prev_end()),
                })
            }
            TokenKind::Ident if token.is_kw("TRUE") || token.is_kw("FALSE") => {
                self.advance();
                Ok(Expression::Literal {
                    value: LiteralValue::Bool(token.is_kw("TRUE")),
                    raw: token.text,
                    span: token.span,
                })
            }
            TokenKind::Ident if !is_reserved(&token.text) => {
                let start = token.span.start;
                let path = self.parse_path()?;
                if path.len() == 1 && self.check(TokenKind::LParen) {
                    // Standard-function call: ABS(x), MAX(a, b)
                    self.advance();
                    let mut args = Vec::new();
                    if !self.eat(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.eat(TokenKind::Comma) {
                                continue;
                            }
                            self.expect(TokenKind::RParen, "')' after the arguments")?;
                            break;
                        }
                    }
                    return Ok(Expression::Call {
                        name: path.into_iter().next().unwrap(),
                        args,
                        span: Span::new(start, self.prev_end()),
                    });
                }
                Ok(Expression::Variable {
                    path,
                    span: Span::new(start, self.prev_end()),
                })
            }
            _ => {
                self.error(
                    &format!("expected an expression, found '{}'", token.text),
                    token.span,
                );
                Err(())
            }
        }
    }

    /// `name` or `name.member[.member]`
    fn parse_path(&mut self) -> Result<Vec<String>, ()> {
        let mut path = vec![self.expect_ident("a name")?.text];
        while self.eat(TokenKind::Dot) {
            path.push(self.expect_ident("a member name after '.'")?.text);
        }
        Ok(path)
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn check_kw(&self, kw: &str) -> bool {
        self.peek().is_some_and(|t| t.is_kw(kw))
    }

    /// Consume the token if it matches; false otherwise
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ()> {
        if self.check(kind) {
            Ok(self.advance().unwrap())
        } else {
            self.error_expected(what);
            Err(())
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<Token, ()> {
        if self.check_kw(kw) {
            Ok(self.advance().unwrap())
        } else {
            self.error_expected(&format!("'{}'", kw));
            Err(())
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Token, ()> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident && !is_reserved(&t.text) => {
                Ok(self.advance().unwrap())
            }
            _ => {
                self.error_expected(what);
                Err(())
            }
        }
    }

    fn error_expected(&mut self, what: &str) {
        let (found, span) = match self.peek() {
            Some(t) => (format!("'{}'", t.text), t.span),
            None => ("end of input".to_string(), self.current_span()),
        };
        self.error(&format!("expected {}, found {}", what, found), span);
    }

    fn error(&mut self, message: &str, span: Span) {
        self.diagnostics
            .push(Diagnostic::at_span(DiagnosticKind::Parse, message, span, self.source));
    }

    /// Span of the current token, or a point span at end of input
    fn current_span(&self) -> Span {
        match self.peek() {
            Some(t) => t.span,
            None => Span::new(self.source.len(), self.source.len()),
        }
    }

    /// End offset of the last consumed token
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    /// Skip forward to just after the next `;`, or stop in front of a
    /// structural keyword so the owning construct can resume
    fn synchronize(&mut self) {
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Semicolon {
                self.advance();
                return;
            }
            let upper = token.text.to_ascii_uppercase();
            if RECOVERY_KEYWORDS.contains(&upper.as_str()) || upper == "END_PROGRAM" {
                return;
            }
            self.advance();
        }
    }

    /// Like `synchronize`, but for declaration lists: also stops before
    /// the given closing keyword
    fn recover_in_block(&mut self, closing: &str) {
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Semicolon {
                self.advance();
                return;
            }
            if token.is_kw(closing) {
                return;
            }
            self.advance();
        }
    }
}

fn is_reserved(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    RESERVED.contains(&upper.as_str())
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    let span = left.span().merge(right.span());
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

/// Convenience entry: parse a source string
pub fn parse(source: &str) -> ParseResult {
    Parser::new(source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let result = parse(source);
        assert!(
            !result.has_errors(),
            "unexpected errors: {:?}",
            result.diagnostics
        );
        result.program
    }

    #[test]
    fn test_parse_program_wrapper() {
        let program = parse_ok(
            "PROGRAM Blinker\nVAR X : BOOL; END_VAR\nX := TRUE;\nEND_PROGRAM",
        );
        assert_eq!(program.name.as_deref(), Some("Blinker"));
        assert_eq!(program.var_blocks.len(), 1);
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_parse_bare_statements_without_program() {
        let program = parse_ok("VAR A, B : BOOL; END_VAR A := B;");
        assert_eq!(program.name, None);
        assert_eq!(program.var_blocks[0].decls[0].names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_declaration_with_init_and_comment() {
        let program = parse_ok(
            "VAR\n  Count : INT := 5; // initial count\n  Delay : TON;\nEND_VAR",
        );
        let decls = &program.var_blocks[0].decls;
        assert_eq!(decls[0].data_type, DataType::Int);
        assert_eq!(decls[0].init.as_ref().unwrap().as_int_literal(), Some(5));
        assert_eq!(decls[0].comment.as_deref(), Some("initial count"));
        assert_eq!(
            decls[1].data_type,
            DataType::FunctionBlock(crate::ast::FbType::Ton)
        );
        assert_eq!(decls[1].comment, None);
    }

    #[test]
    fn test_scope_kinds() {
        let program = parse_ok(
            "VAR_INPUT A : BOOL; END_VAR VAR_OUTPUT B : BOOL; END_VAR \
             VAR_GLOBAL C : INT; END_VAR",
        );
        let scopes: Vec<VarScope> = program.var_blocks.iter().map(|b| b.scope).collect();
        assert_eq!(scopes, vec![VarScope::Input, VarScope::Output, VarScope::Global]);
    }

    #[test]
    fn test_precedence_or_over_and() {
        // A OR B AND C parses as A OR (B AND C)
        let program = parse_ok("VAR A, B, C, X : BOOL; END_VAR X := A OR B AND C;");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => match value {
                Expression::Binary { op: BinaryOp::Or, right, .. } => {
                    assert!(matches!(
                        right.as_ref(),
                        Expression::Binary { op: BinaryOp::And, .. }
                    ));
                }
                other => panic!("expected OR at the root, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_comparison_over_boolean() {
        // X := A < B AND C > D parses as (A < B) AND (C > D)
        let program = parse_ok("VAR A, B, C, D : INT; X : BOOL; END_VAR X := A < B AND C > D;");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => match value {
                Expression::Binary { op: BinaryOp::And, left, right, .. } => {
                    assert!(matches!(
                        left.as_ref(),
                        Expression::Binary { op: BinaryOp::Lt, .. }
                    ));
                    assert!(matches!(
                        right.as_ref(),
                        Expression::Binary { op: BinaryOp::Gt, .. }
                    ));
                }
                other => panic!("expected AND at the root, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_same_tier_folds_left() {
        // A - B - C parses as (A - B) - C
        let program = parse_ok("VAR A, B, C, X : INT; END_VAR X := A - B - C;");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => match value {
                Expression::Binary { op: BinaryOp::Sub, left, .. } => {
                    assert!(matches!(
                        left.as_ref(),
                        Expression::Binary { op: BinaryOp::Sub, .. }
                    ));
                }
                other => panic!("expected SUB at the root, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_tighter_than_mul() {
        // X := -A * B parses as (-A) * B
        let program = parse_ok("VAR A, B, X : INT; END_VAR X := -A * B;");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => {
                assert!(matches!(value, Expression::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_elsif_else() {
        let program = parse_ok(
            "VAR A, B : BOOL; X : INT; END_VAR \
             IF A THEN X := 1; ELSIF B THEN X := 2; ELSE X := 3; END_IF;",
        );
        match &program.statements[0] {
            Statement::If {
                then_branch,
                elsif_branches,
                else_branch,
                ..
            } => {
                assert_eq!(then_branch.len(), 1);
                assert_eq!(elsif_branches.len(), 1);
                assert_eq!(else_branch.as_ref().unwrap().len(), 1);
            }
            other => panic!("expected IF, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_case_labels_ranges_and_lists() {
        let program = parse_ok(
            "VAR P : INT; X, Y, Z : BOOL; END_VAR \
             CASE P OF \
               0: X := TRUE; \
               1..3: Y := TRUE; \
               -1, 5: Z := TRUE; \
             ELSE X := FALSE; \
             END_CASE;",
        );
        match &program.statements[0] {
            Statement::Case { clauses, else_branch, .. } => {
                assert_eq!(clauses.len(), 3);
                assert_eq!(clauses[0].labels, vec![CaseLabel::Value(0)]);
                assert_eq!(clauses[1].labels, vec![CaseLabel::Range(1, 3)]);
                assert_eq!(
                    clauses[2].labels,
                    vec![CaseLabel::Value(-1), CaseLabel::Value(5)]
                );
                assert!(else_branch.is_some());
            }
            other => panic!("expected CASE, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fb_call_named_args() {
        let program = parse_ok(
            "VAR Delay : TON; Run : BOOL; END_VAR Delay(IN := Run, PT := T#500ms);",
        );
        match &program.statements[0] {
            Statement::FbCall { instance, args, .. } => {
                assert_eq!(instance, "Delay");
                assert_eq!(args.len(), 2);
                assert_eq!(args[0].0, "IN");
                assert_eq!(args[1].0, "PT");
                match &args[1].1 {
                    Expression::Literal { value: LiteralValue::Time(ms), raw, .. } => {
                        assert_eq!(*ms, 500);
                        assert_eq!(raw, "T#500ms");
                    }
                    other => panic!("expected TIME literal, got {:?}", other),
                }
            }
            other => panic!("expected FB call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_dotted_assignment_target_and_source() {
        let program = parse_ok("VAR Delay : TON; Out : BOOL; END_VAR Out := Delay.Q;");
        match &program.statements[0] {
            Statement::Assignment { target, value, .. } => {
                assert_eq!(target, &vec!["Out".to_string()]);
                match value {
                    Expression::Variable { path, .. } => {
                        assert_eq!(path, &vec!["Delay".to_string(), "Q".to_string()]);
                    }
                    other => panic!("expected variable, got {:?}", other),
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_loops() {
        let program = parse_ok(
            "VAR I, Total : INT; Go : BOOL; END_VAR \
             FOR I := 1 TO 10 BY 2 DO Total := Total + I; END_FOR; \
             WHILE Go DO Go := FALSE; END_WHILE; \
             REPEAT Total := Total - 1; UNTIL Total <= 0 END_REPEAT;",
        );
        assert_eq!(program.statements.len(), 3);
        assert!(matches!(program.statements[0], Statement::For { .. }));
        assert!(matches!(program.statements[1], Statement::While { .. }));
        assert!(matches!(program.statements[2], Statement::Repeat { .. }));
    }

    #[test]
    fn test_parse_function_call_expression() {
        let program = parse_ok("VAR A, X : INT; END_VAR X := MAX(A, 10);");
        match &program.statements[0] {
            Statement::Assignment { value, .. } => match value {
                Expression::Call { name, args, .. } => {
                    assert_eq!(name, "MAX");
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_missing_semicolon() {
        let result = parse("VAR A, B : BOOL; END_VAR A := TRUE B := FALSE;");
        assert!(result.has_errors());
        // Both assignments survive; only the ';' is reported
        assert_eq!(result.program.statements.len(), 2);
        assert!(result.diagnostics.iter().any(|d| d.message.contains("';'")));
    }

    #[test]
    fn test_recovery_bad_statement_keeps_rest_of_if() {
        let result = parse(
            "VAR A, X, Y : BOOL; END_VAR \
             IF A THEN 42; X := TRUE; END_IF; Y := TRUE;",
        );
        assert!(result.has_errors());
        // IF survived with its good statement, and the trailing statement parsed
        assert_eq!(result.program.statements.len(), 2);
        match &result.program.statements[0] {
            Statement::If { then_branch, .. } => assert_eq!(then_branch.len(), 1),
            other => panic!("expected IF, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_in_var_block() {
        let result = parse("VAR A : BOGUS; B : BOOL; END_VAR B := TRUE;");
        assert!(result.has_errors());
        let block = &result.program.var_blocks[0];
        assert_eq!(block.decls.len(), 1);
        assert_eq!(block.decls[0].names, vec!["B"]);
    }

    #[test]
    fn test_diagnostic_has_line_column_and_excerpt() {
        let result = parse("VAR A : BOOL; END_VAR\nA := ;");
        assert!(result.has_errors());
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.message.contains("expected an expression"))
            .expect("missing expression diagnostic");
        assert_eq!(d.line, Some(2));
        assert!(!d.excerpt.is_empty());
    }

    #[test]
    fn test_bad_time_literal_is_parse_error() {
        let result = parse("VAR Delay : TON; END_VAR Delay(PT := T#12);");
        assert!(result.has_errors());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("expected a unit")));
    }

    #[test]
    fn test_statement_spans_cover_source() {
        let source = "VAR A : BOOL; END_VAR A := TRUE;";
        let program = parse_ok(source);
        let span = program.statements[0].span();
        assert_eq!(&source[span.start..span.end], "A := TRUE;");
    }
}
