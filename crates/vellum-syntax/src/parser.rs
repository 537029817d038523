use std::rc::Rc;

use vellum_core::{BinOp, FnDef, Interner, Node, NodeKind, ScriptError, SourceLoc, Sym};

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

type PResult<T> = Result<T, ScriptError>;

/// Parse a whole program (a series of statements) into a `Block` node.
/// Source is a byte sequence; string literals pass their bytes through
/// untouched.
pub fn parse(source: &[u8], file_id: u16, interner: &mut Interner) -> PResult<Rc<Node>> {
    Parser::new(source, file_id, interner).parse_program()
}

/// Parse a single expression, for REPL / one-shot use. Empty input parses
/// to a Nil literal.
pub fn parse_expression(source: &[u8], file_id: u16, interner: &mut Interner) -> PResult<Rc<Node>> {
    Parser::new(source, file_id, interner).parse_single_expression()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a [u8], file_id: u16, interner: &'a mut Interner) -> Self {
        Parser {
            lexer: Lexer::new(source, file_id, interner),
        }
    }

    fn parse_program(&mut self) -> PResult<Rc<Node>> {
        let loc = self.peek_loc()?;
        let stmts = self.parse_statements_until(&[TokenKind::Eof])?;
        self.expect(&TokenKind::Eof, "Expected end of input")?;
        Ok(Node::new(NodeKind::Block(stmts), loc))
    }

    fn parse_single_expression(&mut self) -> PResult<Rc<Node>> {
        self.skip_newlines()?;
        let tok = self.lexer.peek()?;
        if tok.kind == TokenKind::Eof {
            return Ok(Node::new(NodeKind::NilLit, tok.loc));
        }
        self.parse_statement()
    }

    // ---- Statements ----

    fn parse_statements_until(&mut self, terminators: &[TokenKind]) -> PResult<Vec<Rc<Node>>> {
        let mut stmts = Vec::new();
        self.skip_newlines()?;
        while !terminators.contains(&self.lexer.peek()?.kind) {
            stmts.push(self.parse_statement()?);
            while matches!(
                self.lexer.peek()?.kind,
                TokenKind::Newline | TokenKind::Semicolon
            ) {
                self.lexer.next_token()?;
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Rc<Node>> {
        match self.lexer.peek()?.kind {
            TokenKind::Set => self.parse_set(),
            TokenKind::Let => self.parse_let(),
            TokenKind::Fn => self.parse_fn(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Match => self.parse_match(),
            TokenKind::On => self.parse_on(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Source => self.parse_source(),
            TokenKind::Do => self.parse_do_block(),
            TokenKind::LeftBrace => self.parse_brace_expr(),
            TokenKind::NilCoalesce | TokenKind::FalsyCoalesce => self.parse_coalesce_prefix(),
            _ => self.parse_prefix_call(),
        }
    }

    // ---- Prefix call ----

    fn parse_prefix_call(&mut self) -> PResult<Rc<Node>> {
        let loc = self.peek_loc()?;
        let head = self.parse_atom()?;

        let mut args = Vec::new();
        while self.is_atom_start()? {
            args.push(wrap_auto_call(self.parse_atom()?));
        }

        // Named arguments: trailing =key value pairs
        let mut named = Vec::new();
        while let TokenKind::KeyName(key) = self.lexer.peek()?.kind {
            self.lexer.next_token()?;
            named.push((key, wrap_auto_call(self.parse_atom()?)));
        }

        if args.is_empty() && named.is_empty() {
            // A bare Name or DottedName in statement position is a zero-arg
            // call. Literals remain as-is.
            if matches!(head.kind, NodeKind::Name(_) | NodeKind::DottedName { .. }) {
                return Ok(Node::new(
                    NodeKind::Call {
                        head,
                        args: Vec::new(),
                        named: Vec::new(),
                    },
                    loc,
                ));
            }
            return Ok(head);
        }

        Ok(Node::new(NodeKind::Call { head, args, named }, loc))
    }

    // ---- Atoms ----

    fn parse_atom(&mut self) -> PResult<Rc<Node>> {
        let tok = self.lexer.peek()?;
        let node = match tok.kind {
            TokenKind::Int(value) => {
                self.lexer.next_token()?;
                Node::new(NodeKind::IntLit(value), tok.loc)
            }
            TokenKind::Float(value) => {
                self.lexer.next_token()?;
                Node::new(NodeKind::FloatLit(value), tok.loc)
            }
            TokenKind::Str(_) => {
                let tok = self.lexer.next_token()?;
                let TokenKind::Str(bytes) = tok.kind else {
                    unreachable!()
                };
                Node::new(NodeKind::StringLit(bytes), tok.loc)
            }
            TokenKind::InterpStart(_) => self.parse_string_interpolation()?,
            TokenKind::SymbolLit(sym) => {
                self.lexer.next_token()?;
                Node::new(NodeKind::SymbolLit(sym), tok.loc)
            }
            TokenKind::True => {
                self.lexer.next_token()?;
                Node::new(NodeKind::BoolLit(true), tok.loc)
            }
            TokenKind::False => {
                self.lexer.next_token()?;
                Node::new(NodeKind::BoolLit(false), tok.loc)
            }
            TokenKind::Nil => {
                self.lexer.next_token()?;
                Node::new(NodeKind::NilLit, tok.loc)
            }
            TokenKind::Name(sym) => {
                self.lexer.next_token()?;
                Node::new(NodeKind::Name(sym), tok.loc)
            }
            TokenKind::Underscore => {
                self.lexer.next_token()?;
                let sym = self.lexer.intern(b"_");
                Node::new(NodeKind::Name(sym), tok.loc)
            }
            TokenKind::LeftParen => self.parse_paren_expr()?,
            TokenKind::LeftBrace => self.parse_brace_expr()?,
            TokenKind::LeftBracket => self.parse_array_literal()?,
            TokenKind::Minus => {
                self.lexer.next_token()?;
                let operand = self.parse_atom()?;
                Node::new(NodeKind::UnaryNegate(operand), tok.loc)
            }
            TokenKind::Not => {
                self.lexer.next_token()?;
                let operand = self.parse_atom()?;
                Node::new(NodeKind::UnaryNot(operand), tok.loc)
            }
            TokenKind::Tilde => {
                self.lexer.next_token()?;
                let operand = self.parse_atom()?;
                Node::new(NodeKind::Ref(operand), tok.loc)
            }
            TokenKind::Fn => self.parse_fn()?,
            TokenKind::Do => self.parse_do_block()?,
            _ => {
                return Err(ScriptError::syntax(
                    format!("Unexpected token: {}", tok.kind.describe()),
                    tok.loc,
                ));
            }
        };
        self.parse_postfix(node)
    }

    fn parse_postfix(&mut self, mut base: Rc<Node>) -> PResult<Rc<Node>> {
        loop {
            let tok = self.lexer.peek()?;
            match tok.kind {
                TokenKind::Dot => {
                    self.lexer.next_token()?;
                    let field = self.expect_field_name()?;
                    // Consecutive dots extend one DottedName node
                    if let NodeKind::DottedName { base: inner, fields } = &base.kind {
                        let mut fields = fields.clone();
                        fields.push(field);
                        base = Node::new(
                            NodeKind::DottedName {
                                base: Rc::clone(inner),
                                fields,
                            },
                            base.loc,
                        );
                    } else {
                        let loc = base.loc;
                        base = Node::new(
                            NodeKind::DottedName {
                                base,
                                fields: vec![field],
                            },
                            loc,
                        );
                    }
                }
                TokenKind::LeftBracket if !tok.has_leading_space => {
                    self.lexer.next_token()?;
                    let index = self.parse_infix(0)?;
                    self.expect(&TokenKind::RightBracket, "Expected ']'")?;
                    base = Node::new(NodeKind::Index { target: base, index }, tok.loc);
                }
                _ => break,
            }
        }
        Ok(base)
    }

    // ---- Delimited expressions ----

    fn parse_paren_expr(&mut self) -> PResult<Rc<Node>> {
        self.lexer.next_token()?; // '('
        let expr = self.parse_infix(0)?;
        self.expect(&TokenKind::RightParen, "Expected ')'")?;
        Ok(expr)
    }

    /// `{ ... }` is a map literal when the first token is a key name,
    /// otherwise a statement list (unwrapped when it has one statement).
    fn parse_brace_expr(&mut self) -> PResult<Rc<Node>> {
        let loc = self.peek_loc()?;
        self.lexer.next_token()?; // '{'

        if matches!(self.lexer.peek()?.kind, TokenKind::KeyName(_)) {
            return self.parse_map_literal_body(loc);
        }

        let mut stmts = self.parse_statements_until(&[TokenKind::RightBrace])?;
        self.expect(&TokenKind::RightBrace, "Expected '}'")?;
        if stmts.len() == 1 {
            return Ok(stmts.pop().unwrap());
        }
        Ok(Node::new(NodeKind::Block(stmts), loc))
    }

    fn parse_map_literal_body(&mut self, loc: SourceLoc) -> PResult<Rc<Node>> {
        let mut entries = Vec::new();
        while let TokenKind::KeyName(key) = self.lexer.peek()?.kind {
            self.lexer.next_token()?;
            entries.push((key, self.parse_atom()?));
        }
        self.expect(&TokenKind::RightBrace, "Expected '}'")?;
        Ok(Node::new(NodeKind::MapLit(entries), loc))
    }

    fn parse_array_literal(&mut self) -> PResult<Rc<Node>> {
        let loc = self.peek_loc()?;
        self.lexer.next_token()?; // '['
        let mut elems = Vec::new();
        while self.lexer.peek()?.kind != TokenKind::RightBracket {
            elems.push(self.parse_atom()?);
        }
        self.expect(&TokenKind::RightBracket, "Expected ']'")?;
        Ok(Node::new(NodeKind::ArrayLit(elems), loc))
    }

    fn parse_do_block(&mut self) -> PResult<Rc<Node>> {
        let loc = self.peek_loc()?;
        self.lexer.next_token()?; // 'do'
        let stmts = self.parse_statements_until(&[TokenKind::End])?;
        self.expect(&TokenKind::End, "Expected 'end'")?;
        Ok(Node::new(NodeKind::Block(stmts), loc))
    }

    // ---- String interpolation ----

    fn parse_string_interpolation(&mut self) -> PResult<Rc<Node>> {
        let start = self.lexer.next_token()?;
        let loc = start.loc;
        let TokenKind::InterpStart(prefix) = start.kind else {
            unreachable!()
        };

        let mut parts = Vec::new();
        if !prefix.is_empty() {
            parts.push(Node::new(NodeKind::StringLit(prefix), loc));
        }

        loop {
            parts.push(self.parse_prefix_call()?);

            let tok = self.lexer.peek()?;
            match tok.kind {
                TokenKind::InterpMiddle(_) => {
                    let tok = self.lexer.next_token()?;
                    let TokenKind::InterpMiddle(bytes) = tok.kind else {
                        unreachable!()
                    };
                    if !bytes.is_empty() {
                        parts.push(Node::new(NodeKind::StringLit(bytes), tok.loc));
                    }
                }
                TokenKind::InterpEnd(_) => {
                    let tok = self.lexer.next_token()?;
                    let TokenKind::InterpEnd(bytes) = tok.kind else {
                        unreachable!()
                    };
                    if !bytes.is_empty() {
                        parts.push(Node::new(NodeKind::StringLit(bytes), tok.loc));
                    }
                    break;
                }
                _ => {
                    return Err(ScriptError::syntax(
                        "Expected string interpolation continuation",
                        tok.loc,
                    ));
                }
            }
        }

        Ok(Node::new(NodeKind::StringInterp(parts), loc))
    }

    // ---- Infix expressions (inside parentheses) ----

    fn parse_infix(&mut self, min_prec: i32) -> PResult<Rc<Node>> {
        let mut left = self.parse_infix_primary()?;

        loop {
            let tok = self.lexer.peek()?;
            let Some((op, prec)) = infix_precedence(&tok.kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.lexer.next_token()?;
            let right = self.parse_infix(prec + 1)?; // left-associative
            left = Node::new(
                NodeKind::Infix {
                    op,
                    lhs: left,
                    rhs: right,
                },
                tok.loc,
            );
        }

        Ok(left)
    }

    fn parse_infix_primary(&mut self) -> PResult<Rc<Node>> {
        let tok = self.lexer.peek()?;
        match tok.kind {
            TokenKind::Not => {
                self.lexer.next_token()?;
                let operand = self.parse_infix_primary()?;
                Ok(Node::new(NodeKind::UnaryNot(operand), tok.loc))
            }
            TokenKind::Minus => {
                self.lexer.next_token()?;
                let operand = self.parse_infix_primary()?;
                Ok(Node::new(NodeKind::UnaryNegate(operand), tok.loc))
            }
            _ => self.parse_atom(),
        }
    }

    // ---- Keyword statement forms ----

    fn parse_set(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'set'
        let mut target = vec![self.expect_name("Expected variable name after 'set'")?];
        while self.lexer.peek()?.kind == TokenKind::Dot {
            self.lexer.next_token()?;
            target.push(self.expect_field_name()?);
        }
        let value = self.parse_atom()?;
        Ok(Node::new(NodeKind::Set { target, value }, loc))
    }

    fn parse_let(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'let'
        let name = self.expect_name("Expected variable name after 'let'")?;
        let value = self.parse_atom()?;
        Ok(Node::new(NodeKind::Let { name, value }, loc))
    }

    fn parse_fn(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'fn'
        let mut name = None;

        if let TokenKind::Name(sym) = self.lexer.peek()?.kind {
            self.lexer.next_token()?;
            let next = self.lexer.peek()?;
            if next.kind != TokenKind::LeftBracket {
                return Err(ScriptError::syntax(
                    "Expected '[' after function name",
                    next.loc,
                ));
            }
            name = Some(sym);
        }

        self.expect(&TokenKind::LeftBracket, "Expected '[' for parameter list")?;

        let mut params = Vec::new();
        let mut defaults = Vec::new();
        let mut num_required = 0;
        let mut seen_optional = false;
        let mut rest_param = None;
        let mut kwargs_param = None;

        loop {
            let tok = self.lexer.peek()?;
            match tok.kind {
                TokenKind::RightBracket => break,
                _ if kwargs_param.is_some() => {
                    return Err(ScriptError::syntax(
                        "No parameters allowed after {kwargs} collector",
                        tok.loc,
                    ));
                }
                TokenKind::LeftBracket => {
                    // [rest]: variadic positional collector
                    if rest_param.is_some() {
                        return Err(ScriptError::syntax(
                            "Only one [rest] parameter allowed",
                            tok.loc,
                        ));
                    }
                    self.lexer.next_token()?;
                    rest_param = Some(self.expect_name("Expected rest parameter name")?);
                    self.expect(
                        &TokenKind::RightBracket,
                        "Expected ']' after rest parameter name",
                    )?;
                }
                TokenKind::LeftBrace => {
                    // {kwargs}: variadic named collector
                    self.lexer.next_token()?;
                    kwargs_param = Some(self.expect_name("Expected kwargs parameter name")?);
                    self.expect(
                        &TokenKind::RightBrace,
                        "Expected '}' after kwargs parameter name",
                    )?;
                }
                TokenKind::KeyName(sym) => {
                    // =name default: optional parameter
                    if rest_param.is_some() {
                        return Err(ScriptError::syntax(
                            "Default parameters must come before [rest] collector",
                            tok.loc,
                        ));
                    }
                    seen_optional = true;
                    self.lexer.next_token()?;
                    params.push(sym);
                    defaults.push(self.parse_atom()?);
                }
                TokenKind::Name(sym) => {
                    if rest_param.is_some() {
                        return Err(ScriptError::syntax(
                            "Required parameters must come before [rest] collector",
                            tok.loc,
                        ));
                    }
                    if seen_optional {
                        return Err(ScriptError::syntax(
                            "Required parameters must come before optional parameters",
                            tok.loc,
                        ));
                    }
                    self.lexer.next_token()?;
                    params.push(sym);
                    num_required += 1;
                }
                _ => {
                    return Err(ScriptError::syntax(
                        format!("Expected parameter name, got {}", tok.kind.describe()),
                        tok.loc,
                    ));
                }
            }
        }
        self.expect(&TokenKind::RightBracket, "Expected ']'")?;

        let body = if self.lexer.peek()?.kind == TokenKind::Do {
            self.parse_do_block()?
        } else {
            self.parse_atom()?
        };

        Ok(Node::new(
            NodeKind::Fn(Rc::new(FnDef {
                name,
                params,
                num_required,
                defaults,
                rest_param,
                kwargs_param,
                body,
            })),
            loc,
        ))
    }

    fn parse_if(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'if'
        let mut arms = Vec::new();
        let mut else_body = None;

        let cond = self.parse_atom()?;

        match self.lexer.peek()?.kind {
            TokenKind::Do => {
                // Multi-line form
                self.lexer.next_token()?;
                let stmts = self.parse_statements_until(&[
                    TokenKind::End,
                    TokenKind::Elif,
                    TokenKind::Else,
                ])?;
                arms.push((cond, Node::new(NodeKind::Block(stmts), loc)));

                while self.lexer.peek()?.kind == TokenKind::Elif {
                    self.lexer.next_token()?;
                    let elif_cond = self.parse_atom()?;
                    self.expect(&TokenKind::Do, "Expected 'do' after elif condition")?;
                    let stmts = self.parse_statements_until(&[
                        TokenKind::End,
                        TokenKind::Elif,
                        TokenKind::Else,
                    ])?;
                    arms.push((elif_cond, Node::new(NodeKind::Block(stmts), loc)));
                }

                if self.lexer.peek()?.kind == TokenKind::Else {
                    self.lexer.next_token()?;
                    self.expect(&TokenKind::Do, "Expected 'do' after else")?;
                    let stmts = self.parse_statements_until(&[TokenKind::End])?;
                    else_body = Some(Node::new(NodeKind::Block(stmts), loc));
                }

                self.expect(&TokenKind::End, "Expected 'end'")?;
            }
            TokenKind::LeftBrace => {
                // One-line form: if COND {then} [{else}]
                let then_body = self.parse_brace_expr()?;
                arms.push((cond, then_body));
                if self.lexer.peek()?.kind == TokenKind::LeftBrace {
                    else_body = Some(self.parse_brace_expr()?);
                }
            }
            _ => {
                return Err(ScriptError::syntax(
                    "Expected '{' or 'do' after if condition",
                    loc,
                ));
            }
        }

        Ok(Node::new(NodeKind::If { arms, else_body }, loc))
    }

    fn parse_for(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'for'
        let var = self.expect_name("Expected loop variable")?;
        self.expect(&TokenKind::In, "Expected 'in'")?;
        let iterable = self.parse_range_or_atom()?;
        self.expect(&TokenKind::Do, "Expected 'do'")?;
        let stmts = self.parse_statements_until(&[TokenKind::End])?;
        self.expect(&TokenKind::End, "Expected 'end'")?;
        Ok(Node::new(
            NodeKind::For {
                var,
                iterable,
                body: Node::new(NodeKind::Block(stmts), loc),
            },
            loc,
        ))
    }

    fn parse_while(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'while'
        let cond = self.parse_atom()?;
        self.expect(&TokenKind::Do, "Expected 'do'")?;
        let stmts = self.parse_statements_until(&[TokenKind::End])?;
        self.expect(&TokenKind::End, "Expected 'end'")?;
        Ok(Node::new(
            NodeKind::While {
                cond,
                body: Node::new(NodeKind::Block(stmts), loc),
            },
            loc,
        ))
    }

    fn parse_match(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'match'
        let scrutinee = self.parse_atom()?;
        self.skip_newlines()?;

        let mut arms = Vec::new();
        while self.lexer.peek()?.kind != TokenKind::End {
            let pattern = self.parse_atom()?;
            let body = self.parse_statement()?;
            arms.push((pattern, body));
            while matches!(
                self.lexer.peek()?.kind,
                TokenKind::Newline | TokenKind::Semicolon
            ) {
                self.lexer.next_token()?;
            }
        }
        self.expect(&TokenKind::End, "Expected 'end' after match")?;

        Ok(Node::new(NodeKind::Match { scrutinee, arms }, loc))
    }

    fn parse_on(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'on'
        let tok = self.lexer.peek()?;
        let event = match tok.kind {
            TokenKind::SymbolLit(sym) | TokenKind::Name(sym) => {
                self.lexer.next_token()?;
                sym
            }
            _ => {
                return Err(ScriptError::syntax("Expected event name after 'on'", tok.loc));
            }
        };

        let body = if self.lexer.peek()?.kind == TokenKind::Do {
            self.parse_do_block()?
        } else {
            self.parse_atom()?
        };

        Ok(Node::new(NodeKind::On { event, body }, loc))
    }

    fn parse_return(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'return'
        if self.is_statement_terminator()? {
            return Ok(Node::new(NodeKind::Return(None), loc));
        }
        let value = self.parse_atom()?;
        Ok(Node::new(NodeKind::Return(Some(value)), loc))
    }

    fn parse_source(&mut self) -> PResult<Rc<Node>> {
        let loc = self.lexer.next_token()?.loc; // 'source'
        let filename = self.parse_atom()?;
        Ok(Node::new(NodeKind::Source(filename), loc))
    }

    /// `?? a b` and `?: a b` in statement position parse as the infix node.
    fn parse_coalesce_prefix(&mut self) -> PResult<Rc<Node>> {
        let tok = self.lexer.next_token()?;
        let op = match tok.kind {
            TokenKind::NilCoalesce => BinOp::NilCoalesce,
            _ => BinOp::FalsyCoalesce,
        };
        let lhs = self.parse_atom()?;
        let rhs = self.parse_atom()?;
        Ok(Node::new(NodeKind::Infix { op, lhs, rhs }, tok.loc))
    }

    // ---- Helpers ----

    fn parse_range_or_atom(&mut self) -> PResult<Rc<Node>> {
        let left = self.parse_atom()?;
        let tok = self.lexer.peek()?;
        let op = match tok.kind {
            TokenKind::DotDot => BinOp::RangeExclusive,
            TokenKind::DotDotEqual => BinOp::RangeInclusive,
            _ => return Ok(left),
        };
        self.lexer.next_token()?;
        let right = self.parse_atom()?;
        Ok(Node::new(
            NodeKind::Infix {
                op,
                lhs: left,
                rhs: right,
            },
            tok.loc,
        ))
    }

    fn expect(&mut self, kind: &TokenKind, msg: &str) -> PResult<Token> {
        let tok = self.lexer.next_token()?;
        if &tok.kind != kind {
            return Err(ScriptError::syntax(
                format!("{msg} (got {})", tok.kind.describe()),
                tok.loc,
            ));
        }
        Ok(tok)
    }

    fn expect_name(&mut self, msg: &str) -> PResult<Sym> {
        let tok = self.lexer.next_token()?;
        match tok.kind {
            TokenKind::Name(sym) => Ok(sym),
            _ => Err(ScriptError::syntax(
                format!("{msg} (got {})", tok.kind.describe()),
                tok.loc,
            )),
        }
    }

    /// After `.` any keyword is a legal field name, so `obj.end` works.
    fn expect_field_name(&mut self) -> PResult<Sym> {
        let tok = self.lexer.next_token()?;
        if let TokenKind::Name(sym) = tok.kind {
            return Ok(sym);
        }
        if let Some(text) = tok.kind.keyword_text() {
            return Ok(self.lexer.intern(text.as_bytes()));
        }
        Err(ScriptError::syntax(
            format!(
                "Expected field name after '.' (got {})",
                tok.kind.describe()
            ),
            tok.loc,
        ))
    }

    fn peek_loc(&mut self) -> PResult<SourceLoc> {
        Ok(self.lexer.peek()?.loc)
    }

    fn skip_newlines(&mut self) -> PResult<()> {
        while self.lexer.peek()?.kind == TokenKind::Newline {
            self.lexer.next_token()?;
        }
        Ok(())
    }

    fn is_statement_terminator(&mut self) -> PResult<bool> {
        Ok(matches!(
            self.lexer.peek()?.kind,
            TokenKind::Newline
                | TokenKind::Semicolon
                | TokenKind::Eof
                | TokenKind::End
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::RightBrace
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::InterpMiddle(_)
                | TokenKind::InterpEnd(_)
        ))
    }

    fn is_atom_start(&mut self) -> PResult<bool> {
        Ok(matches!(
            self.lexer.peek()?.kind,
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::InterpStart(_)
                | TokenKind::SymbolLit(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::Name(_)
                | TokenKind::Underscore
                | TokenKind::LeftParen
                | TokenKind::LeftBrace
                | TokenKind::LeftBracket
                | TokenKind::Minus
                | TokenKind::Not
                | TokenKind::Tilde
                | TokenKind::Fn
                | TokenKind::Do
        ))
    }
}

/// The auto-call rule for argument positions: a bare `Name` or `DottedName`
/// becomes a zero-argument `Call` wrapper. `~expr` parses to `Ref`, which is
/// not wrapped; that is how the rule is suppressed.
fn wrap_auto_call(node: Rc<Node>) -> Rc<Node> {
    if matches!(node.kind, NodeKind::Name(_) | NodeKind::DottedName { .. }) {
        let loc = node.loc;
        return Node::new(
            NodeKind::Call {
                head: node,
                args: Vec::new(),
                named: Vec::new(),
            },
            loc,
        );
    }
    node
}

fn infix_precedence(kind: &TokenKind) -> Option<(BinOp, i32)> {
    Some(match kind {
        TokenKind::NilCoalesce => (BinOp::NilCoalesce, 0),
        TokenKind::FalsyCoalesce => (BinOp::FalsyCoalesce, 0),
        TokenKind::Or => (BinOp::Or, 1),
        TokenKind::And => (BinOp::And, 2),
        TokenKind::EqualEqual => (BinOp::Eq, 3),
        TokenKind::BangEqual => (BinOp::Ne, 3),
        TokenKind::Less => (BinOp::Lt, 4),
        TokenKind::Greater => (BinOp::Gt, 4),
        TokenKind::LessEqual => (BinOp::Le, 4),
        TokenKind::GreaterEqual => (BinOp::Ge, 4),
        TokenKind::DotDot => (BinOp::RangeExclusive, 5),
        TokenKind::DotDotEqual => (BinOp::RangeInclusive, 5),
        TokenKind::Plus => (BinOp::Add, 6),
        TokenKind::Minus => (BinOp::Sub, 6),
        TokenKind::Star => (BinOp::Mul, 7),
        TokenKind::Slash => (BinOp::Div, 7),
        TokenKind::Percent => (BinOp::Rem, 7),
        _ => return None,
    })
}
