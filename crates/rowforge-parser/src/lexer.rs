//! Template lexer.
//!
//! Converts template text into a stream of tokens, tracking byte offset and
//! line/column for error reporting. The one genuinely tricky part is the
//! embedded-expression delimiters: `/*` opens an ordinary SQL comment
//! *unless* the comment spells `/*{{ … }}*/`, in which case it opens an
//! expression block and the lexer switches modes: inside a block, `/` is
//! the division operator and only `}}*/` closes.

use memchr::memmem;

use crate::token::{Token, TokenKind};

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENTED_DELIM: &str = "/*{{";
const RIGHT_COMMENTED_DELIM: &str = "}}*/";
const RIGHT_COMMENT: &str = "*/";

/// Template lexer producing one token at a time.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    /// Byte index of the most recent newline, or -1 before the first one.
    /// Column = pos - line_start.
    line_start: i64,
    start: usize,
    start_line: u32,
    start_col: u32,
    inside_block: bool,
    failed: bool,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            line_start: -1,
            start: 0,
            start_line: 1,
            start_col: 1,
            inside_block: false,
            failed: false,
        }
    }

    /// Tokenize the entire input. The stream ends with either an `Eof`
    /// token or a single terminal `Error` token.
    #[must_use]
    pub fn tokenize(source: &'a str) -> Vec<Token> {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = matches!(tok.kind, TokenKind::Eof | TokenKind::Error);
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        if self.failed {
            return Token {
                kind: TokenKind::Eof,
                pos: self.pos,
                text: String::new(),
                line: self.line,
                col: self.col(),
            };
        }
        self.skip_whitespace();
        self.start = self.pos;
        self.start_line = self.line;
        self.start_col = self.col();

        match self.peek() {
            None => self.emit(TokenKind::Eof),
            Some(b'-') => {
                if self.peek_at(1) == Some(b'-') {
                    self.lex_comment()
                } else {
                    self.lex_char()
                }
            }
            Some(b'/') => {
                if self.inside_block || self.peek_at(1) != Some(b'*') {
                    self.lex_char()
                } else {
                    self.lex_comment()
                }
            }
            Some(b'`' | b'"' | b'\'') => self.lex_quote(),
            Some(b'{') => {
                if self.peek_at(1) == Some(b'{') {
                    self.lex_left_delim()
                } else {
                    self.lex_char()
                }
            }
            Some(b'}') => {
                if self.peek_at(1) == Some(b'}') {
                    self.lex_right_delim()
                } else {
                    self.lex_char()
                }
            }
            Some(b'|') => {
                if self.peek_at(1) == Some(b'|') {
                    self.lex_two_chars(TokenKind::Concat)
                } else {
                    self.lex_char()
                }
            }
            Some(b'<') => match self.peek_at(1) {
                Some(b'=') => self.lex_two_chars(TokenKind::Le),
                Some(b'>') => self.lex_two_chars(TokenKind::Ne),
                _ => self.lex_char(),
            },
            Some(b'>') => {
                if self.peek_at(1) == Some(b'=') {
                    self.lex_two_chars(TokenKind::Ge)
                } else {
                    self.lex_char()
                }
            }
            Some(b'.') => {
                if self.peek_at(1).is_some_and(is_digit) {
                    self.lex_number()
                } else {
                    self.lex_char()
                }
            }
            Some(b':') => {
                if self.peek_at(1) == Some(b'=') {
                    self.lex_two_chars(TokenKind::Assign)
                } else {
                    self.lex_char()
                }
            }
            Some(ch) if is_digit(ch) => self.lex_number(),
            Some(ch) if is_ident_start(ch) => self.lex_ident(),
            Some(_) => self.lex_char(),
        }
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    fn next(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        if ch == b'\n' {
            self.line += 1;
            self.line_start = self.pos as i64;
        }
        self.pos += 1;
        Some(ch)
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if self.next().is_none() {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn col(&self) -> u32 {
        (self.pos as i64 - self.line_start) as u32
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.next();
        }
    }

    fn emit(&mut self, kind: TokenKind) -> Token {
        let text = String::from_utf8_lossy(&self.src[self.start..self.pos]).into_owned();
        let tok = Token {
            kind,
            pos: self.start,
            text,
            line: self.start_line,
            col: self.start_col,
        };
        self.start = self.pos;
        self.start_line = self.line;
        self.start_col = self.col();
        tok
    }

    /// Emit an error token and refuse to advance further: every subsequent
    /// call yields EOF.
    fn error(&mut self, message: &str) -> Token {
        self.failed = true;
        Token {
            kind: TokenKind::Error,
            pos: self.start,
            text: message.to_owned(),
            line: self.start_line,
            col: self.start_col,
        }
    }

    fn accept(&mut self, pred: impl Fn(u8) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.next();
        }
    }

    // -----------------------------------------------------------------------
    // Token scanners
    // -----------------------------------------------------------------------

    /// A single character: a known punctuation/operator kind, or `Char`.
    fn lex_char(&mut self) -> Token {
        let kind = match self.next() {
            Some(b'(') => TokenKind::LeftParen,
            Some(b')') => TokenKind::RightParen,
            Some(b'[') => TokenKind::LeftBrack,
            Some(b']') => TokenKind::RightBrack,
            Some(b'{') => TokenKind::LeftBrace,
            Some(b'}') => TokenKind::RightBrace,
            Some(b';') => TokenKind::Semicolon,
            Some(b',') => TokenKind::Comma,
            Some(b'<') => TokenKind::Lt,
            Some(b'>') => TokenKind::Gt,
            Some(b'=') => TokenKind::Eq,
            Some(b'&') => TokenKind::BitAnd,
            Some(b'|') => TokenKind::BitOr,
            Some(b'^') => TokenKind::BitXor,
            Some(b'~') => TokenKind::BitNot,
            Some(b'+') => TokenKind::Add,
            Some(b'-') => TokenKind::Sub,
            Some(b'*') => TokenKind::Mul,
            Some(b'/') => TokenKind::FloatDiv,
            Some(b'.') => TokenKind::Period,
            Some(b'@') => TokenKind::At,
            _ => TokenKind::Char,
        };
        self.emit(kind)
    }

    fn lex_two_chars(&mut self, kind: TokenKind) -> Token {
        self.advance(2);
        self.emit(kind)
    }

    /// A comment. The `--` or `/*` opener is known to be present; the `/*`
    /// case may instead turn out to open a commented expression block.
    fn lex_comment(&mut self) -> Token {
        if self.peek() == Some(b'-') {
            self.advance(2);
            loop {
                match self.next() {
                    None | Some(b'\n') => return self.emit(TokenKind::Comment),
                    Some(_) => {}
                }
            }
        }

        let rest = &self.src[self.pos..];
        let Some(right_comment_idx) = memmem::find(rest, RIGHT_COMMENT.as_bytes()) else {
            return self.error("unclosed comment");
        };

        // A comment of the exact shape `/*{{ … }}*/` is an expression block:
        // the first `*/` must be the one directly after `}}`.
        let opens_block = rest.starts_with(LEFT_COMMENTED_DELIM.as_bytes());
        let right_delim_idx = memmem::find(rest, RIGHT_COMMENTED_DELIM.as_bytes());
        if opens_block && right_delim_idx.is_some_and(|idx| idx + 2 == right_comment_idx) {
            return self.lex_left_delim();
        }

        self.advance(right_comment_idx + RIGHT_COMMENT.len());
        self.emit(TokenKind::Comment)
    }

    /// A quoted string. Back and double quotes produce identifiers, single
    /// quotes a string literal; a doubled quote character escapes itself.
    fn lex_quote(&mut self) -> Token {
        let Some(quote) = self.next() else {
            return self.error("unterminated quoted string");
        };
        loop {
            match self.next() {
                None => return self.error("unterminated quoted string"),
                Some(ch) if ch == quote => {
                    if self.peek() == Some(quote) {
                        self.next();
                        continue;
                    }
                    return match quote {
                        b'`' | b'"' => self.emit(TokenKind::Ident),
                        _ => self.emit(TokenKind::String),
                    };
                }
                Some(_) => {}
            }
        }
    }

    /// An unquoted identifier or keyword. The first byte is known valid.
    fn lex_ident(&mut self) -> Token {
        self.next();
        self.accept(is_ident_middle);
        let text = &self.src[self.start..self.pos];
        match std::str::from_utf8(text)
            .ok()
            .and_then(TokenKind::lookup_keyword)
        {
            Some(kw) => self.emit(kw),
            None => self.emit(TokenKind::Ident),
        }
    }

    /// `{{` or `/*{{`; the latter switches the lexer into block mode.
    fn lex_left_delim(&mut self) -> Token {
        if self.peek() == Some(b'/') {
            self.advance(LEFT_COMMENTED_DELIM.len());
            self.inside_block = true;
        } else {
            self.advance(LEFT_DELIM.len());
        }
        self.emit(TokenKind::LeftDelim)
    }

    /// `}}` outside block mode, `}}*/` inside (which also exits it).
    fn lex_right_delim(&mut self) -> Token {
        if self.inside_block {
            self.inside_block = false;
            self.advance(RIGHT_COMMENTED_DELIM.len());
        } else {
            self.advance(RIGHT_DELIM.len());
        }
        self.emit(TokenKind::RightDelim)
    }

    /// A number: `[0-9]+(.[0-9]*)?([eE][-+]?[0-9]+)?`, `.[0-9]+`, or a hex
    /// literal `0x…`. Trailing garbage is left for the next token.
    fn lex_number(&mut self) -> Token {
        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x' | b'X'))
            && self.peek_at(2).is_some_and(is_hex_digit)
        {
            self.advance(3);
            self.accept(is_hex_digit);
            return self.emit(TokenKind::Number);
        }

        self.accept(is_digit);
        if self.peek() == Some(b'.') {
            self.next();
            self.accept(is_digit);
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let ch1 = self.peek_at(1);
            let ch2 = self.peek_at(2);
            if ch1.is_some_and(is_digit) {
                self.advance(2);
                self.accept(is_digit);
            } else if matches!(ch1, Some(b'+' | b'-')) && ch2.is_some_and(is_digit) {
                self.advance(3);
                self.accept(is_digit);
            }
        }

        self.emit(TokenKind::Number)
    }
}

const fn is_digit(ch: u8) -> bool {
    ch.is_ascii_digit()
}

const fn is_hex_digit(ch: u8) -> bool {
    ch.is_ascii_hexdigit()
}

const fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_' || ch >= 128
}

const fn is_ident_middle(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

/// Spaces within a line; excludes newlines.
pub(crate) const fn is_space(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\x0b' | b'\x0c')
}

/// Any horizontal or vertical whitespace.
pub(crate) const fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\n' | b'\x0b' | b'\x0c')
}
