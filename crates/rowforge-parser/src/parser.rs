//! Template parser.
//!
//! Hand-written recursive descent with precedence climbing for
//! expressions, two tokens of look-ahead, and a table scanner that passes
//! over arbitrary SQL between statement blocks. Produces the AST from
//! `rowforge-ast`.

use rowforge_ast::{
    unescape, Column, Expr, IntervalUnit, Name, Op, QName, StringUnit, Table, Template, When,
};
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::lexer::{is_space, is_whitespace, Lexer};
use crate::token::{Token, TokenKind};

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const RIGHT_COMMENTED_DELIM: &str = "}}*/";

/// How much source context a syntax error carries.
const MAX_NEAR_LEN: usize = 10;

/// Parse a full template document.
pub fn parse(input: &str) -> Result<Template> {
    Parser::new(input).parse_template()
}

/// Parse a standalone statement (an expression, or several joined with
/// `;`) with no delimiters or tables around it. The whole input must be
/// consumed.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let mut parser = Parser::new(input);
    let stmt = parser.parse_stmt()?;
    parser.expect(TokenKind::Eof)?;
    Ok(stmt)
}

/// Template parser over a pre-lexed token stream.
pub struct Parser<'a> {
    input: &'a str,
    /// Token stream with comments stripped; always ends with Eof or Error.
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let tokens = Lexer::tokenize(input)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        Self {
            input,
            tokens,
            pos: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Stream helpers
    // -----------------------------------------------------------------------

    fn tok(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn tok1(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn next(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.tok().kind != kind {
            return Err(self.error_expected(kind.describe()));
        }
        self.next();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Error construction
    // -----------------------------------------------------------------------

    fn error_expected(&self, what: &str) -> ForgeError {
        self.errorf(format!("expected {what}, found {}", self.tok()))
    }

    fn error_unexpected(&self) -> ForgeError {
        self.errorf(format!("unexpected {}", self.tok()))
    }

    fn errorf(&self, cause: String) -> ForgeError {
        let tok = self.tok();
        let near_bytes = self.input.as_bytes().get(tok.pos..).unwrap_or_default();
        let near_bytes = &near_bytes[..near_bytes.len().min(MAX_NEAR_LEN)];
        let cause = if tok.kind == TokenKind::Error {
            // Surface the lexer's message as the root cause.
            tok.text.clone()
        } else {
            cause
        };
        ForgeError::Syntax {
            line: tok.line,
            column: tok.col,
            near: String::from_utf8_lossy(near_bytes).into_owned(),
            cause,
        }
    }

    // -----------------------------------------------------------------------
    // Template structure
    // -----------------------------------------------------------------------

    fn parse_template(&mut self) -> Result<Template> {
        let mut template = Template {
            global_exprs: self.parse_stmt_block_list()?,
            tables: Vec::new(),
        };
        template.tables.push(self.parse_single_table()?);

        loop {
            if self.tok().kind == TokenKind::Eof {
                return Ok(template);
            }
            if self.tok().kind != TokenKind::LeftDelim {
                return Err(self.error_unexpected());
            }
            let (parent_name, child_name, count) = self.parse_dependency_derive_block()?;

            let table = self.parse_single_table()?;
            if table.name != child_name {
                return Err(self.errorf(format!(
                    "derived table name in the FOR EACH ROW and CREATE TABLE statements \
                     do not match ({} vs {})",
                    child_name,
                    table.name.unique_name()
                )));
            }

            let index = template.tables.len();
            let Some(parent) = template
                .tables
                .iter_mut()
                .find(|table| table.name == parent_name)
            else {
                return Err(self.errorf(format!(
                    "cannot find parent table {parent_name} to generate derived rows"
                )));
            };
            parent.derived.push((index, count));
            template.tables.push(table);
        }
    }

    fn parse_stmt_block_list(&mut self) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        while self.tok().kind == TokenKind::LeftDelim {
            let (stmt, _, _) = self.parse_stmt_block()?;
            list.push(stmt);
        }
        Ok(list)
    }

    /// Parse `{{ stmt }}` or `/*{{ stmt }}*/`, requiring the closing
    /// delimiter to match the opening kind. Returns the statement and the
    /// byte span of the whole block.
    fn parse_stmt_block(&mut self) -> Result<(Expr, usize, usize)> {
        let start = self.tok().pos;
        let left = self.tok().text.clone();
        self.expect(TokenKind::LeftDelim)?;

        let stmt = self.parse_stmt()?;

        let right = &self.tok().text;
        if left == LEFT_DELIM && right != RIGHT_DELIM {
            return Err(self.error_expected(RIGHT_DELIM));
        } else if left != LEFT_DELIM && right != RIGHT_COMMENTED_DELIM {
            return Err(self.error_expected(RIGHT_COMMENTED_DELIM));
        }
        let end = self.tok().pos + self.tok().text.len();
        self.expect(TokenKind::RightDelim)?;
        Ok((stmt, start, end))
    }

    fn parse_single_table(&mut self) -> Result<Table> {
        let table_start = self.tok().pos;
        self.expect(TokenKind::KwCreate)?;
        self.expect(TokenKind::KwTable)?;

        let name = self.parse_qname()?;
        let mut table = Table {
            name,
            ..Table::default()
        };

        self.expect(TokenKind::LeftParen)?;

        // The first identifier-like token since the last block becomes the
        // pending column name; everything else is passed over.
        let mut col_name = String::new();
        let mut block_spans: Vec<(usize, usize)> = Vec::new();
        loop {
            match self.tok().kind {
                TokenKind::Ident => {
                    if col_name.is_empty() {
                        col_name = self.tok().text.clone();
                    }
                    self.next();
                }
                TokenKind::LeftDelim => {
                    let (stmt, block_start, block_end) = self.parse_stmt_block()?;
                    table.columns.push(Column {
                        name: Name::new(&col_name),
                        expr: stmt,
                    });
                    col_name.clear();
                    block_spans.push((block_start, block_end));
                }
                TokenKind::RightParen => break,
                TokenKind::RightBrack | TokenKind::RightBrace | TokenKind::RightDelim => {
                    return Err(self.error_unexpected());
                }
                TokenKind::LeftParen | TokenKind::LeftBrack | TokenKind::LeftBrace => {
                    self.skip_any_balanced_text()?;
                }
                TokenKind::Error | TokenKind::Eof => return Err(self.error_unexpected()),
                _ => {
                    if self.tok().is_ident() && col_name.is_empty() {
                        col_name = self.tok().text.clone();
                    }
                    self.next();
                }
            }
        }
        self.expect(TokenKind::RightParen)?;

        // Table options run to the terminating semicolon or EOF.
        let table_end;
        loop {
            match self.tok().kind {
                TokenKind::LeftParen | TokenKind::LeftBrack | TokenKind::LeftBrace => {
                    self.skip_any_balanced_text()?;
                }
                TokenKind::Semicolon => {
                    table_end = self.tok().pos + self.tok().text.len();
                    self.next();
                    break;
                }
                TokenKind::Eof => {
                    table_end = self.tok().pos;
                    break;
                }
                TokenKind::Error => return Err(self.error_unexpected()),
                _ => self.next(),
            }
        }

        table.content = self.extract_table_content(table_start, table_end, block_spans);
        Ok(table)
    }

    /// Reproduce the table definition from source with every block span
    /// replaced. A span that leaves its line blank takes the whole line with
    /// it; otherwise it collapses to a single space, absorbing one adjacent
    /// space on either side.
    fn extract_table_content(
        &self,
        start: usize,
        end: usize,
        block_spans: Vec<(usize, usize)>,
    ) -> String {
        let input = self.input.as_bytes();
        let mut out = Vec::new();
        let mut cursor = start;

        for (mut l, mut r) in self.merge_block_spans(block_spans) {
            let left_newline = input[cursor..l]
                .iter()
                .rposition(|&b| b == b'\n')
                .map(|i| cursor + i);
            let right_newline = input[r..end]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| r + i);

            let is_blank_line = match (left_newline, right_newline) {
                (Some(ln), Some(rn)) => {
                    input[ln + 1..l].iter().all(|&b| is_space(b))
                        && input[r..rn].iter().all(|&b| is_space(b))
                }
                _ => false,
            };

            let replacement;
            if is_blank_line {
                l = left_newline.unwrap_or(l);
                r = right_newline.map_or(r, |rn| rn + 1);
                replacement = b'\n';
            } else {
                if l > cursor && is_space(input[l - 1]) {
                    l -= 1;
                }
                if r < end && is_space(input[r]) {
                    r += 1;
                }
                replacement = b' ';
            }

            out.extend_from_slice(&input[cursor..l]);
            out.push(replacement);
            cursor = r;
        }
        out.extend_from_slice(&input[cursor..end]);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Merge block spans separated only by whitespace.
    fn merge_block_spans(&self, spans: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
        let input = self.input.as_bytes();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
        for span in spans {
            if let Some(last) = merged.last_mut() {
                if input[last.1..span.0].iter().all(|&b| is_whitespace(b)) {
                    last.1 = span.1;
                    continue;
                }
            }
            merged.push(span);
        }
        merged
    }

    /// `{{ for each row of parent generate expr rows of child }}`
    fn parse_dependency_derive_block(&mut self) -> Result<(QName, QName, Expr)> {
        let left = self.tok().text.clone();
        self.expect(TokenKind::LeftDelim)?;

        for kind in [
            TokenKind::KwFor,
            TokenKind::KwEach,
            TokenKind::KwRow,
            TokenKind::KwOf,
        ] {
            self.expect(kind)?;
        }

        let parent = self.parse_qname()?;
        self.expect(TokenKind::KwGenerate)?;
        let count = self.parse_expr()?;

        if !matches!(self.tok().kind, TokenKind::KwRow | TokenKind::KwRows) {
            return Err(self.error_expected("ROW or ROWS"));
        }
        self.next();
        self.expect(TokenKind::KwOf)?;

        let child = self.parse_qname()?;

        let right = &self.tok().text;
        if left == LEFT_DELIM && right != RIGHT_DELIM {
            return Err(self.error_expected(RIGHT_DELIM));
        } else if left != LEFT_DELIM && right != RIGHT_COMMENTED_DELIM {
            return Err(self.error_expected(RIGHT_COMMENTED_DELIM));
        }
        self.expect(TokenKind::RightDelim)?;

        Ok((parent, child, count))
    }

    fn parse_qname(&mut self) -> Result<QName> {
        if !self.tok().is_ident() {
            return Err(self.error_expected("identifier"));
        }
        let mut parts = vec![Name::new(&self.tok().text)];
        self.next();
        for _ in 0..2 {
            if self.tok().kind != TokenKind::Period {
                break;
            }
            self.next();
            if !self.tok().is_ident() {
                return Err(self.error_expected("identifier"));
            }
            parts.push(Name::new(&self.tok().text));
            self.next();
        }
        Ok(QName { parts })
    }

    /// Skip over text enclosed by `()`, `[]` or `{}`, allowing nesting.
    fn skip_any_balanced_text(&mut self) -> Result<()> {
        match self.tok().kind {
            TokenKind::LeftParen => self.skip_balanced_text(TokenKind::RightParen),
            TokenKind::LeftBrack => self.skip_balanced_text(TokenKind::RightBrack),
            TokenKind::LeftBrace => self.skip_balanced_text(TokenKind::RightBrace),
            _ => Ok(()),
        }
    }

    fn skip_balanced_text(&mut self, close: TokenKind) -> Result<()> {
        self.next();
        loop {
            match self.tok().kind {
                TokenKind::Eof => return Err(self.errorf("unbalanced text".to_owned())),
                TokenKind::RightParen | TokenKind::RightBrack | TokenKind::RightBrace => {
                    if self.tok().kind != close {
                        return Err(self.errorf("unbalanced text".to_owned()));
                    }
                    self.next();
                    return Ok(());
                }
                TokenKind::LeftParen => self.skip_balanced_text(TokenKind::RightParen)?,
                TokenKind::LeftBrack => self.skip_balanced_text(TokenKind::RightBrack)?,
                TokenKind::LeftBrace => self.skip_balanced_text(TokenKind::RightBrace)?,
                TokenKind::Error => return Err(self.error_unexpected()),
                _ => self.next(),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statements and expressions
    // -----------------------------------------------------------------------

    /// A statement: one or more `;`-joined expressions, folded into a
    /// left-associative chain.
    fn parse_stmt(&mut self) -> Result<Expr> {
        let mut expr = self.parse_expr()?;
        while self.tok().kind == TokenKind::Semicolon {
            self.next();
            let next_expr = self.parse_expr()?;
            expr = Expr::Binary {
                op: Op::Semicolon,
                left: Box::new(expr),
                right: Box::new(next_expr),
            };
        }
        Ok(expr)
    }

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary_expr(Op::Semicolon.prec())
    }

    fn parse_binary_expr(&mut self, prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let Some((op, width)) = self.peek_op() else {
                return Ok(left);
            };
            if !op.is_binary() || op.prec() < prec || (op.prec() == prec && !op.is_right_assoc()) {
                return Ok(left);
            }
            for _ in 0..width {
                self.next();
            }
            let right = self.parse_binary_expr(op.prec())?;
            left = match (left, op) {
                (Expr::GetVariable(name), Op::Assign) => Expr::SetVariable {
                    name,
                    value: Box::new(right),
                },
                (left, op) => Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    /// The operator at the cursor, and how many tokens it spans.
    /// `IS NOT` is recognized with the second look-ahead token.
    fn peek_op(&self) -> Option<(Op, usize)> {
        let op = self.tok().op()?;
        if op == Op::Is && self.tok1().op() == Some(Op::Not) {
            return Some((Op::IsNot, 2));
        }
        Some((op, 1))
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        match self.tok().op() {
            // NOT descends at its own precedence so comparisons bind tighter.
            Some(op @ Op::Not) => {
                self.next();
                let expr = self.parse_binary_expr(op.prec())?;
                return Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                });
            }
            // Sign and bit-complement bind directly to a primary.
            Some(op @ (Op::Add | Op::Sub | Op::BitNot)) => {
                self.next();
                let expr = self.parse_primary_expr()?;
                return Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                });
            }
            _ => {}
        }

        let expr = self.parse_primary_expr()?;
        if self.tok().kind != TokenKind::LeftBrack {
            return Ok(expr);
        }
        self.next();
        let index = self.parse_expr()?;
        self.expect(TokenKind::RightBrack)?;
        Ok(Expr::Subscript {
            base: Box::new(expr),
            index: Box::new(index),
        })
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.tok().kind {
            TokenKind::KwRowNum => {
                self.next();
                Ok(Expr::RowNum)
            }
            TokenKind::KwSubRowNum => {
                self.next();
                Ok(Expr::SubRowNum)
            }
            TokenKind::KwNull => {
                self.next();
                Ok(Expr::Constant(Value::Null))
            }
            TokenKind::KwTrue => {
                self.next();
                Ok(Expr::Constant(Value::Bool(true)))
            }
            TokenKind::KwFalse => {
                self.next();
                Ok(Expr::Constant(Value::Bool(false)))
            }
            TokenKind::KwCurrentTimestamp => {
                self.next();
                Ok(Expr::CurrentTimestamp)
            }
            TokenKind::LeftParen => {
                self.next();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RightParen)?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            TokenKind::String => {
                let expr = Expr::Constant(Value::bytes(unescape(&self.tok().text).into_bytes()));
                self.next();
                Ok(expr)
            }
            TokenKind::Number => {
                let value = Value::number_from_literal(&self.tok().text)
                    .map_err(|e| self.errorf(e.to_string()))?;
                self.next();
                Ok(Expr::Constant(value))
            }
            TokenKind::KwCase => self.parse_case_value_when(),
            TokenKind::KwTimestamp => {
                self.next();
                let mut with_time_zone = false;
                if self.tok().kind == TokenKind::KwWith {
                    self.next();
                    self.expect(TokenKind::KwTime)?;
                    self.expect(TokenKind::KwZone)?;
                    with_time_zone = true;
                }
                let value = self.parse_primary_expr()?;
                Ok(Expr::Timestamp {
                    with_time_zone,
                    value: Box::new(value),
                })
            }
            TokenKind::KwInterval => {
                self.next();
                let value = self.parse_expr()?;
                let unit = match self.tok().kind {
                    TokenKind::KwWeek => IntervalUnit::Week,
                    TokenKind::KwDay => IntervalUnit::Day,
                    TokenKind::KwHour => IntervalUnit::Hour,
                    TokenKind::KwMinute => IntervalUnit::Minute,
                    TokenKind::KwSecond => IntervalUnit::Second,
                    TokenKind::KwMillisecond => IntervalUnit::Millisecond,
                    TokenKind::KwMicrosecond => IntervalUnit::Microsecond,
                    _ => return Err(self.error_expected("interval unit")),
                };
                self.next();
                Ok(Expr::Interval {
                    unit,
                    value: Box::new(value),
                })
            }
            TokenKind::KwX => {
                self.next();
                let arg = self.parse_primary_expr()?;
                Ok(Expr::Func {
                    name: QName::new(&["hex", "decode"]),
                    args: vec![arg],
                })
            }
            TokenKind::At => {
                self.next();
                if !self.tok().is_ident() {
                    return Err(self.error_expected("identifier"));
                }
                let name = unescape(&self.tok().text);
                self.next();
                Ok(Expr::GetVariable(name))
            }
            TokenKind::KwArray => {
                self.next();
                self.expect(TokenKind::LeftBrack)?;
                let mut elems = Vec::new();
                loop {
                    if self.tok().kind == TokenKind::RightBrack {
                        self.next();
                        return Ok(Expr::Array(elems));
                    }
                    if !elems.is_empty() {
                        self.expect(TokenKind::Comma)?;
                    }
                    elems.push(self.parse_expr()?);
                }
            }
            TokenKind::KwSubstring => self.parse_substring(),
            TokenKind::KwOverlay => self.parse_overlay(),
            _ => {
                let name = self.parse_qname()?;
                self.expect(TokenKind::LeftParen)?;
                let mut args = Vec::new();
                loop {
                    if self.tok().kind == TokenKind::RightParen {
                        self.next();
                        return Ok(Expr::Func { name, args });
                    }
                    if !args.is_empty() {
                        self.expect(TokenKind::Comma)?;
                    }
                    args.push(self.parse_expr()?);
                }
            }
        }
    }

    fn parse_case_value_when(&mut self) -> Result<Expr> {
        self.expect(TokenKind::KwCase)?;
        let mut value = None;
        let mut whens = Vec::new();
        let mut saw_value_or_when = false;
        loop {
            match self.tok().kind {
                TokenKind::KwWhen => {
                    saw_value_or_when = true;
                    self.next();
                    let cond = self.parse_expr()?;
                    self.expect(TokenKind::KwThen)?;
                    let then = self.parse_stmt()?;
                    whens.push(When { cond, then });
                }
                TokenKind::KwElse => {
                    self.next();
                    let else_ = self.parse_stmt()?;
                    self.expect(TokenKind::KwEnd)?;
                    return Ok(Expr::Case {
                        value,
                        whens,
                        else_: Some(Box::new(else_)),
                    });
                }
                TokenKind::KwEnd => {
                    self.next();
                    return Ok(Expr::Case {
                        value,
                        whens,
                        else_: None,
                    });
                }
                _ => {
                    if saw_value_or_when {
                        return Err(self.error_expected("WHEN, ELSE or END"));
                    }
                    value = Some(Box::new(self.parse_expr()?));
                    saw_value_or_when = true;
                }
            }
        }
    }

    fn parse_substring(&mut self) -> Result<Expr> {
        self.expect(TokenKind::KwSubstring)?;
        self.expect(TokenKind::LeftParen)?;
        let input = self.parse_expr()?;

        let mut from = None;
        if self.tok().kind == TokenKind::KwFrom {
            self.next();
            from = Some(Box::new(self.parse_expr()?));
        }

        let mut for_ = None;
        if self.tok().kind == TokenKind::KwFor {
            self.next();
            for_ = Some(Box::new(self.parse_expr()?));
        }

        let unit = self.parse_using_unit()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Expr::Substring {
            input: Box::new(input),
            from,
            for_,
            unit,
        })
    }

    fn parse_overlay(&mut self) -> Result<Expr> {
        self.expect(TokenKind::KwOverlay)?;
        self.expect(TokenKind::LeftParen)?;
        let input = self.parse_expr()?;

        self.expect(TokenKind::KwPlacing)?;
        let placing = self.parse_expr()?;
        self.expect(TokenKind::KwFrom)?;
        let from = self.parse_expr()?;

        let mut for_ = None;
        if self.tok().kind == TokenKind::KwFor {
            self.next();
            for_ = Some(Box::new(self.parse_expr()?));
        }

        let unit = self.parse_using_unit()?;
        self.expect(TokenKind::RightParen)?;
        Ok(Expr::Overlay {
            input: Box::new(input),
            placing: Box::new(placing),
            from: Box::new(from),
            for_,
            unit,
        })
    }

    fn parse_using_unit(&mut self) -> Result<Option<StringUnit>> {
        if self.tok().kind != TokenKind::KwUsing {
            return Ok(None);
        }
        self.next();
        let unit = match self.tok().kind {
            TokenKind::KwOctets => StringUnit::Octets,
            TokenKind::KwCharacters => StringUnit::Characters,
            _ => return Err(self.error_expected("OCTETS or CHARACTERS")),
        };
        self.next();
        Ok(Some(unit))
    }
}
