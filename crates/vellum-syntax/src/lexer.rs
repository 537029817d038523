use vellum_core::{Interner, ScriptError, SourceLoc, Sym};

use crate::token::{classify_keyword, Token, TokenKind};

/// Streaming tokenizer over a byte sequence, with one-token lookahead.
/// String literals carry arbitrary bytes; only identifiers and numbers are
/// constrained to ASCII.
///
/// Newlines are statement separators only at nesting depth zero: a counter
/// tracks open `{ ( [` and newlines inside them are skipped. A `"` string
/// switches the lexer into interpolation mode on an unescaped `{`, after
/// which tokens are lexed as ordinary code until the matching `}` brings the
/// interpolation brace depth back to zero.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    file_id: u16,
    line: u32,
    column: u32,
    nesting_depth: u32,
    in_string: bool,
    interp_brace_depth: u32,
    last_was_space: bool,
    peeked: Option<Token>,
    interner: &'a mut Interner,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Resolve escapes in a raw string fragment. `\n \t \r \\ \" \{ \}` are
/// recognized; a backslash before any other byte preserves both bytes.
fn process_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            i += 1;
            match raw[i] {
                b'n' => out.push(b'\n'),
                b't' => out.push(b'\t'),
                b'r' => out.push(b'\r'),
                b'\\' => out.push(b'\\'),
                b'"' => out.push(b'"'),
                b'{' => out.push(b'{'),
                b'}' => out.push(b'}'),
                other => {
                    out.push(b'\\');
                    out.push(other);
                }
            }
        } else {
            out.push(raw[i]);
        }
        i += 1;
    }
    out
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8], file_id: u16, interner: &'a mut Interner) -> Self {
        Lexer {
            src: source,
            pos: 0,
            file_id,
            line: 1,
            column: 1,
            nesting_depth: 0,
            in_string: false,
            interp_brace_depth: 0,
            last_was_space: true,
            peeked: None,
            interner,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ScriptError> {
        if let Some(tok) = self.peeked.take() {
            return Ok(tok);
        }
        self.scan_token()
    }

    pub fn peek(&mut self) -> Result<Token, ScriptError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan_token()?);
        }
        Ok(self.peeked.clone().unwrap())
    }

    pub(crate) fn intern(&mut self, bytes: &[u8]) -> Sym {
        self.interner.intern(bytes)
    }

    // -- Cursor helpers --

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn current(&self) -> u8 {
        *self.src.get(self.pos).unwrap_or(&0)
    }

    fn peek_byte(&self) -> u8 {
        *self.src.get(self.pos + 1).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.current();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file_id, self.line, self.column)
    }

    fn token(&self, kind: TokenKind, loc: SourceLoc, has_leading_space: bool) -> Token {
        Token {
            kind,
            loc,
            has_leading_space,
        }
    }

    fn skip_ws_and_comments(&mut self) {
        while !self.at_end() {
            match self.current() {
                b' ' | b'\t' | b'\r' => {
                    self.last_was_space = true;
                    self.advance();
                }
                b'#' => {
                    while !self.at_end() && self.current() != b'\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    // -- Scanners --

    fn scan_token(&mut self) -> Result<Token, ScriptError> {
        loop {
            // A closed interpolation resumes string scanning.
            if self.in_string && self.interp_brace_depth == 0 {
                return self.scan_string_continuation();
            }

            self.skip_ws_and_comments();

            if self.at_end() {
                let loc = self.loc();
                return Ok(self.token(TokenKind::Eof, loc, self.last_was_space));
            }

            let start_loc = self.loc();
            let c = self.current();

            if c == b'\n' {
                self.advance();
                self.last_was_space = true;
                // Suppressed inside nesting delimiters
                if self.nesting_depth > 0 {
                    continue;
                }
                // Consecutive newlines collapse into one token
                self.skip_ws_and_comments();
                while !self.at_end() && self.current() == b'\n' {
                    self.advance();
                    self.skip_ws_and_comments();
                }
                return Ok(self.token(TokenKind::Newline, start_loc, true));
            }

            let had_leading_space = self.last_was_space;
            self.last_was_space = false;

            if c.is_ascii_digit() {
                return self.scan_number(start_loc, had_leading_space);
            }
            if is_ident_start(c) {
                return self.scan_name(start_loc, had_leading_space);
            }
            if c == b'"' {
                return self.scan_string(start_loc, had_leading_space);
            }
            if c == b':' && is_ident_start(self.peek_byte()) {
                return self.scan_symbol_literal(start_loc, had_leading_space);
            }

            self.advance();
            let kind = match c {
                b'{' => {
                    if self.in_string {
                        self.interp_brace_depth += 1;
                    } else {
                        self.nesting_depth += 1;
                    }
                    TokenKind::LeftBrace
                }
                b'}' => {
                    if self.in_string {
                        self.interp_brace_depth -= 1;
                        if self.interp_brace_depth == 0 {
                            // End of interpolation expression
                            return self.scan_string_continuation();
                        }
                    } else if self.nesting_depth > 0 {
                        self.nesting_depth -= 1;
                    }
                    TokenKind::RightBrace
                }
                b'(' => {
                    self.nesting_depth += 1;
                    TokenKind::LeftParen
                }
                b')' => {
                    if self.nesting_depth > 0 {
                        self.nesting_depth -= 1;
                    }
                    TokenKind::RightParen
                }
                b'[' => {
                    self.nesting_depth += 1;
                    TokenKind::LeftBracket
                }
                b']' => {
                    if self.nesting_depth > 0 {
                        self.nesting_depth -= 1;
                    }
                    TokenKind::RightBracket
                }
                b';' => TokenKind::Semicolon,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'*' => TokenKind::Star,
                b'/' => TokenKind::Slash,
                b'%' => TokenKind::Percent,
                b'~' => TokenKind::Tilde,
                b'.' => {
                    if self.current() == b'.' {
                        self.advance();
                        if self.current() == b'=' {
                            self.advance();
                            TokenKind::DotDotEqual
                        } else {
                            TokenKind::DotDot
                        }
                    } else {
                        TokenKind::Dot
                    }
                }
                b'<' => {
                    if self.current() == b'=' {
                        self.advance();
                        TokenKind::LessEqual
                    } else {
                        TokenKind::Less
                    }
                }
                b'>' => {
                    if self.current() == b'=' {
                        self.advance();
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    }
                }
                b'=' => {
                    if self.current() == b'=' {
                        self.advance();
                        TokenKind::EqualEqual
                    } else if is_ident_start(self.current()) {
                        let start = self.pos;
                        while !self.at_end() && is_ident_char(self.current()) {
                            self.advance();
                        }
                        let sym = self.interner.intern(&self.src[start..self.pos]);
                        TokenKind::KeyName(sym)
                    } else {
                        return Err(ScriptError::syntax(
                            "Unexpected '='; did you mean '=='?",
                            start_loc,
                        ));
                    }
                }
                b'!' => {
                    if self.current() == b'=' {
                        self.advance();
                        TokenKind::BangEqual
                    } else {
                        return Err(ScriptError::syntax(
                            "Unexpected '!'; did you mean '!='?",
                            start_loc,
                        ));
                    }
                }
                b'?' => {
                    if self.current() == b'?' {
                        self.advance();
                        TokenKind::NilCoalesce
                    } else if self.current() == b':' {
                        self.advance();
                        TokenKind::FalsyCoalesce
                    } else {
                        return Err(ScriptError::syntax(
                            "Unexpected '?'; expected '??' or '?:'",
                            start_loc,
                        ));
                    }
                }
                other => {
                    return Err(ScriptError::syntax(
                        format!("Unexpected character: '{}'", other as char),
                        start_loc,
                    ));
                }
            };

            return Ok(self.token(kind, start_loc, had_leading_space));
        }
    }

    fn scan_number(
        &mut self,
        start_loc: SourceLoc,
        has_leading_space: bool,
    ) -> Result<Token, ScriptError> {
        let start = self.pos;
        let mut is_float = false;

        while !self.at_end() && self.current().is_ascii_digit() {
            self.advance();
        }

        // A decimal point, but not the `..` range operator
        if self.current() == b'.' && self.peek_byte() != b'.' {
            is_float = true;
            self.advance();
            while !self.at_end() && self.current().is_ascii_digit() {
                self.advance();
            }
        }

        // Digits and '.' only, so the slice is always valid UTF-8
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| ScriptError::syntax("Invalid numeric literal", start_loc))?;
        let kind = if is_float {
            let value: f64 = text.parse().map_err(|_| {
                ScriptError::syntax(format!("Invalid float literal: {text}"), start_loc)
            })?;
            TokenKind::Float(value)
        } else {
            let value: i64 = text.parse().map_err(|_| {
                ScriptError::syntax(format!("Invalid integer literal: {text}"), start_loc)
            })?;
            TokenKind::Int(value)
        };
        Ok(self.token(kind, start_loc, has_leading_space))
    }

    fn scan_name(
        &mut self,
        start_loc: SourceLoc,
        has_leading_space: bool,
    ) -> Result<Token, ScriptError> {
        let start = self.pos;
        while !self.at_end() && is_ident_char(self.current()) {
            self.advance();
        }
        let kind = match classify_keyword(&self.src[start..self.pos]) {
            Some(keyword) => keyword,
            None => TokenKind::Name(self.interner.intern(&self.src[start..self.pos])),
        };
        Ok(self.token(kind, start_loc, has_leading_space))
    }

    fn scan_symbol_literal(
        &mut self,
        start_loc: SourceLoc,
        has_leading_space: bool,
    ) -> Result<Token, ScriptError> {
        self.advance(); // ':'
        let start = self.pos;
        while !self.at_end() && is_ident_char(self.current()) {
            self.advance();
        }
        let sym = self.interner.intern(&self.src[start..self.pos]);
        Ok(self.token(TokenKind::SymbolLit(sym), start_loc, has_leading_space))
    }

    fn scan_string(
        &mut self,
        start_loc: SourceLoc,
        has_leading_space: bool,
    ) -> Result<Token, ScriptError> {
        self.advance(); // opening '"'
        let mut raw: Vec<u8> = Vec::new();

        while !self.at_end() && self.current() != b'"' {
            if self.current() == b'\\' {
                raw.push(self.advance());
                if !self.at_end() {
                    raw.push(self.advance());
                }
            } else if self.current() == b'{' {
                // Start of interpolation
                self.in_string = true;
                self.interp_brace_depth = 1;
                self.advance();
                return Ok(self.token(
                    TokenKind::InterpStart(process_escapes(&raw)),
                    start_loc,
                    has_leading_space,
                ));
            } else {
                raw.push(self.advance());
            }
        }

        if self.at_end() {
            return Err(ScriptError::syntax("Unterminated string literal", start_loc));
        }
        self.advance(); // closing '"'
        Ok(self.token(
            TokenKind::Str(process_escapes(&raw)),
            start_loc,
            has_leading_space,
        ))
    }

    /// Resume string scanning after an interpolation's closing `}`.
    fn scan_string_continuation(&mut self) -> Result<Token, ScriptError> {
        let start_loc = self.loc();
        let mut raw: Vec<u8> = Vec::new();

        while !self.at_end() && self.current() != b'"' {
            if self.current() == b'\\' {
                raw.push(self.advance());
                if !self.at_end() {
                    raw.push(self.advance());
                }
            } else if self.current() == b'{' {
                // Another interpolation follows
                self.interp_brace_depth = 1;
                self.advance();
                return Ok(self.token(
                    TokenKind::InterpMiddle(process_escapes(&raw)),
                    start_loc,
                    self.last_was_space,
                ));
            } else {
                raw.push(self.advance());
            }
        }

        if self.at_end() {
            return Err(ScriptError::syntax("Unterminated string literal", start_loc));
        }
        self.advance(); // closing '"'
        self.in_string = false;
        Ok(self.token(
            TokenKind::InterpEnd(process_escapes(&raw)),
            start_loc,
            self.last_was_space,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(source.as_bytes(), 0, &mut interner);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex failure");
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn tokenize_with(source: &str, interner: &mut Interner) -> Vec<Token> {
        let mut lexer = Lexer::new(source.as_bytes(), 0, interner);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token().expect("lex failure");
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn lex_error(source: &str) -> ScriptError {
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(source.as_bytes(), 0, &mut interner);
        loop {
            match lexer.next_token() {
                Ok(tok) if tok.kind == TokenKind::Eof => panic!("expected error for {source:?}"),
                Ok(_) => {}
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn empty_input() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn whitespace_only() {
        let tokens = tokenize("   \t  ");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn simple_set_statement() {
        let mut interner = Interner::new();
        let tokens = tokenize_with("set x 5", &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::Set);
        assert_eq!(tokens[1].kind, TokenKind::Name(interner.intern(b"x")));
        assert_eq!(tokens[2].kind, TokenKind::Int(5));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn numeric_literals() {
        let tokens = tokenize("42 0 3.14 100.0");
        assert_eq!(tokens[0].kind, TokenKind::Int(42));
        assert_eq!(tokens[1].kind, TokenKind::Int(0));
        assert_eq!(tokens[2].kind, TokenKind::Float(3.14));
        assert_eq!(tokens[3].kind, TokenKind::Float(100.0));
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#""hello\nworld""#);
        assert_eq!(tokens[0].kind, TokenKind::Str(b"hello\nworld".to_vec()));

        let tokens = tokenize(r#""escaped\\backslash""#);
        assert_eq!(tokens[0].kind, TokenKind::Str(b"escaped\\backslash".to_vec()));

        let tokens = tokenize(r#""escaped\{brace\}""#);
        assert_eq!(tokens[0].kind, TokenKind::Str(b"escaped{brace}".to_vec()));
    }

    #[test]
    fn unknown_escape_preserves_both_bytes() {
        let tokens = tokenize(r#""a\qb""#);
        assert_eq!(tokens[0].kind, TokenKind::Str(b"a\\qb".to_vec()));
    }

    #[test]
    fn strings_carry_raw_non_utf8_bytes() {
        let mut interner = Interner::new();
        let src = [b'"', b'a', 0xff, b'b', b'"'];
        let mut lexer = Lexer::new(&src, 0, &mut interner);
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Str(vec![b'a', 0xff, b'b']));
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn string_interpolation_simple() {
        let mut interner = Interner::new();
        let tokens = tokenize_with(r#""Hello {name}!""#, &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::InterpStart(b"Hello ".to_vec()));
        assert_eq!(tokens[1].kind, TokenKind::Name(interner.intern(b"name")));
        assert_eq!(tokens[2].kind, TokenKind::InterpEnd(b"!".to_vec()));
    }

    #[test]
    fn string_interpolation_multiple() {
        let mut interner = Interner::new();
        let tokens = tokenize_with(r#""x={x}, y={y}""#, &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::InterpStart(b"x=".to_vec()));
        assert_eq!(tokens[1].kind, TokenKind::Name(interner.intern(b"x")));
        assert_eq!(tokens[2].kind, TokenKind::InterpMiddle(b", y=".to_vec()));
        assert_eq!(tokens[3].kind, TokenKind::Name(interner.intern(b"y")));
        assert_eq!(tokens[4].kind, TokenKind::InterpEnd(b"".to_vec()));
    }

    #[test]
    fn string_interpolation_with_expression() {
        let tokens = tokenize(r#""Result: {add 3 4}""#);
        assert_eq!(tokens[0].kind, TokenKind::InterpStart(b"Result: ".to_vec()));
        assert!(matches!(tokens[1].kind, TokenKind::Name(_)));
        assert_eq!(tokens[2].kind, TokenKind::Int(3));
        assert_eq!(tokens[3].kind, TokenKind::Int(4));
        assert_eq!(tokens[4].kind, TokenKind::InterpEnd(b"".to_vec()));
    }

    #[test]
    fn nested_braces_inside_interpolation() {
        let mut interner = Interner::new();
        let tokens = tokenize_with(r#""v={f {g}}.""#, &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::InterpStart(b"v=".to_vec()));
        assert_eq!(tokens[1].kind, TokenKind::Name(interner.intern(b"f")));
        assert_eq!(tokens[2].kind, TokenKind::LeftBrace);
        assert_eq!(tokens[3].kind, TokenKind::Name(interner.intern(b"g")));
        assert_eq!(tokens[4].kind, TokenKind::RightBrace);
        assert_eq!(tokens[5].kind, TokenKind::InterpEnd(b".".to_vec()));
    }

    #[test]
    fn symbol_literals() {
        let mut interner = Interner::new();
        let tokens = tokenize_with(":stone :interact :_hidden", &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::SymbolLit(interner.intern(b"stone")));
        assert_eq!(tokens[1].kind, TokenKind::SymbolLit(interner.intern(b"interact")));
        assert_eq!(tokens[2].kind, TokenKind::SymbolLit(interner.intern(b"_hidden")));
    }

    #[test]
    fn keywords() {
        let tokens = tokenize("set fn if elif else for in while match on do end return source");
        let expected = [
            TokenKind::Set,
            TokenKind::Fn,
            TokenKind::If,
            TokenKind::Elif,
            TokenKind::Else,
            TokenKind::For,
            TokenKind::In,
            TokenKind::While,
            TokenKind::Match,
            TokenKind::On,
            TokenKind::Do,
            TokenKind::End,
            TokenKind::Return,
            TokenKind::Source,
        ];
        for (i, kind) in expected.iter().enumerate() {
            assert_eq!(&tokens[i].kind, kind);
        }
    }

    #[test]
    fn bool_nil_logical_and_wildcard() {
        let tokens = tokenize("true false nil and or not _");
        assert_eq!(tokens[0].kind, TokenKind::True);
        assert_eq!(tokens[1].kind, TokenKind::False);
        assert_eq!(tokens[2].kind, TokenKind::Nil);
        assert_eq!(tokens[3].kind, TokenKind::And);
        assert_eq!(tokens[4].kind, TokenKind::Or);
        assert_eq!(tokens[5].kind, TokenKind::Not);
        assert_eq!(tokens[6].kind, TokenKind::Underscore);
    }

    #[test]
    fn operators() {
        let tokens = tokenize("+ - * / % < > <= >= == != ~");
        let expected = [
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::LessEqual,
            TokenKind::GreaterEqual,
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::Tilde,
        ];
        for (i, kind) in expected.iter().enumerate() {
            assert_eq!(&tokens[i].kind, kind);
        }
    }

    #[test]
    fn dot_vs_range_operators() {
        let tokens = tokenize("a.b");
        assert_eq!(tokens[1].kind, TokenKind::Dot);

        let tokens = tokenize("0..10");
        assert_eq!(tokens[0].kind, TokenKind::Int(0));
        assert_eq!(tokens[1].kind, TokenKind::DotDot);
        assert_eq!(tokens[2].kind, TokenKind::Int(10));

        let tokens = tokenize("0..=10");
        assert_eq!(tokens[1].kind, TokenKind::DotDotEqual);
    }

    #[test]
    fn newline_as_statement_separator() {
        let tokens = tokenize("set x 5\nset y 10");
        assert_eq!(tokens[3].kind, TokenKind::Newline);
        assert_eq!(tokens[4].kind, TokenKind::Set);
    }

    #[test]
    fn newlines_suppressed_inside_nesting() {
        for source in ["(x +\ny)", "{add\n3\n4}", "[1\n2\n3]"] {
            let tokens = tokenize(source);
            assert!(
                !tokens.iter().any(|t| t.kind == TokenKind::Newline),
                "newline leaked in {source:?}"
            );
        }
    }

    #[test]
    fn consecutive_newlines_collapse() {
        let tokens = tokenize("x\n\n\ny");
        let newlines = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Newline)
            .count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let tokens = tokenize("set x 5 # this is a comment");
        assert_eq!(tokens[3].kind, TokenKind::Eof);

        let tokens = tokenize("# just a comment");
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn source_locations() {
        let tokens = tokenize("set x 5");
        assert_eq!((tokens[0].loc.line, tokens[0].loc.column), (1, 1));
        assert_eq!((tokens[1].loc.line, tokens[1].loc.column), (1, 5));
        assert_eq!((tokens[2].loc.line, tokens[2].loc.column), (1, 7));
    }

    #[test]
    fn leading_space_on_bracket() {
        let tokens = tokenize("a[0]");
        assert_eq!(tokens[1].kind, TokenKind::LeftBracket);
        assert!(!tokens[1].has_leading_space);

        let tokens = tokenize("print [1 2]");
        assert_eq!(tokens[1].kind, TokenKind::LeftBracket);
        assert!(tokens[1].has_leading_space);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut interner = Interner::new();
        let mut lexer = Lexer::new(b"set x", 0, &mut interner);
        assert_eq!(lexer.peek().unwrap().kind, TokenKind::Set);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Set);
        assert!(matches!(lexer.next_token().unwrap().kind, TokenKind::Name(_)));
    }

    #[test]
    fn key_name_tokens() {
        let mut interner = Interner::new();
        let tokens = tokenize_with("{=x 10 =y 20}", &mut interner);
        assert_eq!(tokens[0].kind, TokenKind::LeftBrace);
        assert_eq!(tokens[1].kind, TokenKind::KeyName(interner.intern(b"x")));
        assert_eq!(tokens[2].kind, TokenKind::Int(10));
        assert_eq!(tokens[3].kind, TokenKind::KeyName(interner.intern(b"y")));
        assert_eq!(tokens[4].kind, TokenKind::Int(20));
        assert_eq!(tokens[5].kind, TokenKind::RightBrace);
    }

    #[test]
    fn equal_equal_vs_key_name() {
        let mut interner = Interner::new();
        let tokens = tokenize_with("(a == b) =opt 5", &mut interner);
        assert_eq!(tokens[2].kind, TokenKind::EqualEqual);
        assert_eq!(tokens[5].kind, TokenKind::KeyName(interner.intern(b"opt")));
    }

    #[test]
    fn coalescing_operators() {
        let tokens = tokenize("(a ?? b)");
        assert_eq!(tokens[2].kind, TokenKind::NilCoalesce);

        let tokens = tokenize("(a ?: b)");
        assert_eq!(tokens[2].kind, TokenKind::FalsyCoalesce);
    }

    #[test]
    fn falsy_coalesce_followed_by_symbol() {
        let mut interner = Interner::new();
        let tokens = tokenize_with("(a ?: :default)", &mut interner);
        assert_eq!(tokens[2].kind, TokenKind::FalsyCoalesce);
        assert_eq!(tokens[3].kind, TokenKind::SymbolLit(interner.intern(b"default")));
    }

    #[test]
    fn lone_equal_bang_and_question_are_errors() {
        assert!(lex_error("x = 5").message().contains("=="));
        assert!(lex_error("x ! 5").message().contains("!="));
        lex_error("x ? 5");
    }

    #[test]
    fn unterminated_string_fails() {
        lex_error("\"unterminated");
        lex_error("\"open {x} still open");
    }
}
