//! Tokenizer for Go source files.
//!
//! Produces the token stream (with automatic semicolons) plus every comment
//! with its position, which the parser uses to attach doc comments.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Number,
    Char,
    String,
    Op,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == kw
    }

    /// Human readable form used in syntax errors.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "EOF".to_string(),
            TokenKind::Semicolon if self.text == "\n" => "newline".to_string(),
            _ => format!("{:?}", self.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Raw text including the `//` or `/* */` markers.
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

// Longest first so that the first prefix match is the right one.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

pub fn tokenize(source: &str) -> Result<Lexed, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    insert_semi: bool,
    out: Lexed,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
            insert_semi: false,
            out: Lexed::default(),
        }
    }

    fn column_at(&self, pos: usize) -> u32 {
        (pos.saturating_sub(self.line_start) + 1) as u32
    }

    fn error(&self, message: impl Into<String>, pos: usize) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column_at(pos),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn newline(&mut self) {
        self.line += 1;
        self.line_start = self.pos;
    }

    fn push(&mut self, kind: TokenKind, start: usize, start_line: u32, start_col: u32) {
        let text = self.src.get(start..self.pos).unwrap_or_default().to_string();
        self.insert_semi = match kind {
            TokenKind::Ident | TokenKind::Number | TokenKind::Char | TokenKind::String => true,
            TokenKind::Keyword => matches!(
                text.as_str(),
                "break" | "continue" | "fallthrough" | "return"
            ),
            TokenKind::Op => matches!(text.as_str(), "++" | "--" | ")" | "]" | "}"),
            TokenKind::Semicolon | TokenKind::Eof => false,
        };
        self.out.tokens.push(Token {
            kind,
            text,
            line: start_line,
            column: start_col,
        });
    }

    fn auto_semicolon(&mut self, line: u32, column: u32) {
        if self.insert_semi {
            self.out.tokens.push(Token {
                kind: TokenKind::Semicolon,
                text: "\n".to_string(),
                line,
                column,
            });
            self.insert_semi = false;
        }
    }

    fn run(mut self) -> Result<Lexed, LexError> {
        while let Some(b) = self.peek(0) {
            let start = self.pos;
            let line = self.line;
            let col = self.column_at(start);
            match b {
                b'\n' => {
                    self.auto_semicolon(line, col);
                    self.pos += 1;
                    self.newline();
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment()?,
                b'"' => {
                    self.interpreted_string()?;
                    self.push(TokenKind::String, start, line, col);
                }
                b'`' => {
                    self.raw_string()?;
                    self.push(TokenKind::String, start, line, col);
                }
                b'\'' => {
                    self.rune()?;
                    self.push(TokenKind::Char, start, line, col);
                }
                b'0'..=b'9' => {
                    self.number();
                    self.push(TokenKind::Number, start, line, col);
                }
                b'.' if matches!(self.peek(1), Some(b'0'..=b'9')) => {
                    self.number();
                    self.push(TokenKind::Number, start, line, col);
                }
                _ if is_ident_start(self.src, start) => {
                    self.identifier();
                    let word = self.src.get(start..self.pos).unwrap_or_default();
                    let kind = if KEYWORDS.contains(&word) {
                        TokenKind::Keyword
                    } else {
                        TokenKind::Ident
                    };
                    self.push(kind, start, line, col);
                }
                _ => {
                    let rest = self.src.get(start..).unwrap_or_default();
                    match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
                        Some(op) => {
                            self.pos += op.len();
                            if *op == ";" {
                                self.push(TokenKind::Semicolon, start, line, col);
                            } else {
                                self.push(TokenKind::Op, start, line, col);
                            }
                        }
                        None => {
                            let ch = rest.chars().next().unwrap_or('?');
                            return Err(self.error(format!("invalid character {:?}", ch), start));
                        }
                    }
                }
            }
        }
        let col = self.column_at(self.pos);
        self.auto_semicolon(self.line, col);
        self.out.tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line: self.line,
            column: col,
        });
        Ok(self.out)
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        let text = self.src.get(start..self.pos).unwrap_or_default();
        let text = text.strip_suffix('\r').unwrap_or(text).to_string();
        self.out.comments.push(Comment {
            text,
            line: self.line,
            column: self.column_at(start),
            end_line: self.line,
        });
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.column_at(start);
        self.pos += 2;
        let mut saw_newline = false;
        loop {
            match self.peek(0) {
                None => {
                    return Err(LexError {
                        message: "comment not terminated".to_string(),
                        line: start_line,
                        column: start_col,
                    })
                }
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.pos += 2;
                    break;
                }
                Some(b'\n') => {
                    saw_newline = true;
                    self.pos += 1;
                    self.newline();
                }
                Some(_) => self.pos += 1,
            }
        }
        if saw_newline {
            self.auto_semicolon(start_line, start_col);
        }
        self.out.comments.push(Comment {
            text: self.src.get(start..self.pos).unwrap_or_default().to_string(),
            line: start_line,
            column: start_col,
            end_line: self.line,
        });
        Ok(())
    }

    fn interpreted_string(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return Err(self.error("string literal not terminated", start)),
                Some(b'\\') => self.pos += 2,
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
            self.pos = self.pos.min(self.bytes.len());
        }
    }

    fn raw_string(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let start_line = self.line;
        let start_col = self.column_at(start);
        self.pos += 1;
        loop {
            match self.peek(0) {
                None => {
                    return Err(LexError {
                        message: "raw string literal not terminated".to_string(),
                        line: start_line,
                        column: start_col,
                    })
                }
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'\n') => {
                    self.pos += 1;
                    self.newline();
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn rune(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return Err(self.error("rune literal not terminated", start)),
                Some(b'\\') => self.pos += 2,
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
            self.pos = self.pos.min(self.bytes.len());
        }
    }

    fn number(&mut self) {
        while let Some(b) = self.peek(0) {
            if matches!(b, b'e' | b'E' | b'p' | b'P') && matches!(self.peek(1), Some(b'+' | b'-')) {
                self.pos += 2;
            } else if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self) {
        while self.pos < self.bytes.len() && is_ident_continue(self.src, self.pos) {
            let width = self
                .src
                .get(self.pos..)
                .and_then(|s| s.chars().next())
                .map(char::len_utf8)
                .unwrap_or(1);
            self.pos += width;
        }
    }
}

fn char_at(src: &str, pos: usize) -> Option<char> {
    src.get(pos..).and_then(|s| s.chars().next())
}

fn is_ident_start(src: &str, pos: usize) -> bool {
    char_at(src, pos).map_or(false, |c| c == '_' || c.is_alphabetic())
}

fn is_ident_continue(src: &str, pos: usize) -> bool {
    char_at(src, pos).map_or(false, |c| c == '_' || c.is_alphanumeric())
}

/// Decodes a Go string literal token (interpreted or raw).
pub fn unquote(literal: &str) -> Option<String> {
    if let Some(raw) = literal
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
    {
        return Some(raw.replace('\r', ""));
    }
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            'x' => out.push(hex_escape(&mut chars, 2)?),
            'u' => out.push(hex_escape(&mut chars, 4)?),
            'U' => out.push(hex_escape(&mut chars, 8)?),
            d @ '0'..='7' => {
                let mut value = d.to_digit(8)?;
                for _ in 0..2 {
                    value = value * 8 + chars.next()?.to_digit(8)?;
                }
                out.push(char::from_u32(value)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        value = value.checked_mul(16)? + chars.next()?.to_digit(16)?;
    }
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .unwrap()
            .tokens
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_semicolon_insertion() {
        let toks = kinds("package app\n\ntype A struct{}\n");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec!["package", "app", "\n", "type", "A", "struct", "{", "}", "\n", ""]
        );
        assert_eq!(toks[2].0, TokenKind::Semicolon);
        assert_eq!(toks.last().unwrap().0, TokenKind::Eof);
    }

    #[test]
    fn test_no_semicolon_after_open_brace_or_comma() {
        let toks = kinds("f(a,\n b)\n");
        let semis = toks
            .iter()
            .filter(|(k, _)| *k == TokenKind::Semicolon)
            .count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn test_comments_and_positions() {
        let lexed = tokenize("// doc line\n// second\ntype A int // trailing\n").unwrap();
        assert_eq!(lexed.comments.len(), 3);
        assert_eq!(lexed.comments[0].text, "// doc line");
        assert_eq!(lexed.comments[1].line, 2);
        assert_eq!(lexed.comments[2].column, 12);
        let ty = &lexed.tokens[0];
        assert_eq!((ty.line, ty.column), (3, 1));
    }

    #[test]
    fn test_tags_and_strings() {
        let toks = kinds("ID string `path:\"id\"`\n");
        assert_eq!(toks[2], (TokenKind::String, "`path:\"id\"`".to_string()));
        assert_eq!(unquote(&toks[2].1).unwrap(), "path:\"id\"");
        assert_eq!(unquote(r#""a\tb\"cé""#).unwrap(), "a\tb\"c\u{e9}");
        assert_eq!(unquote(r#""\q""#), None);
    }

    #[test]
    fn test_block_comment_with_newline_acts_as_newline() {
        let toks = kinds("x /* a\n b */ y");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["x", "\n", "y", "\n", ""]);
    }

    #[test]
    fn test_lex_errors() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("`open").is_err());
        assert!(tokenize("/* open").is_err());
        let err = tokenize("a\n  $").unwrap_err();
        assert_eq!((err.line, err.column), (2, 3));
    }

    #[test]
    fn test_unterminated_block_comment_across_lines() {
        let err = tokenize("package app\n/* open\nmore").unwrap_err();
        assert_eq!(err.message, "comment not terminated");
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn test_operators_and_numbers() {
        let toks = kinds("[...]T <-chan 1.5e+3");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["[", "...", "]", "T", "<-", "chan", "1.5e+3", "\n", ""]);
    }
}
