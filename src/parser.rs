//! Declaration-level Go parser.
//!
//! Only what the analyzer needs is built into the tree: the package clause,
//! imports, type declarations and function signatures. Function bodies,
//! `var` and `const` declarations are skipped by bracket matching.

use thiserror::Error;

use crate::lexer::{self, Comment, Token, TokenKind};
use crate::source::SourceLocation;
use crate::syntax::{
    ChanDir, CommentGroup, FieldDecl, FuncDecl, FuncType, Ident, Import, Param, Receiver,
    SourceFile, StructType, TypeExpr, TypeSpec,
};

/// Nesting bound for type expressions.
const MAX_TYPE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub location: SourceLocation,
}

pub fn parse_file(file_name: &str, source: &str) -> Result<SourceFile, SyntaxError> {
    let lexed = lexer::tokenize(source).map_err(|e| SyntaxError {
        message: e.message,
        location: SourceLocation::new(file_name, e.line, e.column),
    })?;
    let mut parser = Parser {
        tokens: lexed.tokens,
        comments: lexed.comments,
        pos: 0,
        file: file_name.to_string(),
    };
    parser.file()
}

struct Parser {
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    pos: usize,
    file: String,
}

#[derive(Debug)]
enum ParamEntry {
    Lone(Ident),
    Named(Ident, TypeExpr),
    Type(TypeExpr),
}

type PResult<T> = Result<T, SyntaxError>;

impl Parser {
    // ───────────────────────────────────────────────────────────────────────
    // Token helpers
    // ───────────────────────────────────────────────────────────────────────

    fn tok(&self) -> &Token {
        self.at(self.pos)
    }

    fn at(&self, index: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[index.min(last)]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn at_eof(&self) -> bool {
        self.tok().kind == TokenKind::Eof
    }

    fn location_of(&self, tok: &Token) -> SourceLocation {
        SourceLocation::new(self.file.clone(), tok.line, tok.column)
    }

    fn here(&self) -> SourceLocation {
        self.location_of(self.tok())
    }

    fn error_here<T>(&self, expected: &str) -> PResult<T> {
        Err(SyntaxError {
            message: format!("expected {}, found {}", expected, self.tok().describe()),
            location: self.here(),
        })
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.tok().is_op(op) {
            self.advance();
            Ok(())
        } else {
            self.error_here(&format!("'{}'", op))
        }
    }

    fn ident(&mut self) -> PResult<Ident> {
        if self.tok().kind != TokenKind::Ident {
            return self.error_here("identifier");
        }
        let id = Ident {
            name: self.tok().text.clone(),
            location: self.here(),
        };
        self.advance();
        Ok(id)
    }

    /// A declaration ends with a semicolon, or right before a closing bracket.
    fn end_of_item(&mut self) -> PResult<()> {
        match self.tok().kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ if self.tok().is_op(")") || self.tok().is_op("}") => Ok(()),
            _ => self.error_here("';' or newline"),
        }
    }

    fn skip_semicolons(&mut self) {
        while self.tok().kind == TokenKind::Semicolon {
            self.advance();
        }
    }

    /// Skips from an opening bracket to just past its matching close.
    fn skip_balanced(&mut self) -> PResult<()> {
        let start = self.here();
        let mut depth = 0usize;
        loop {
            let t = self.tok();
            if t.kind == TokenKind::Eof {
                return Err(SyntaxError {
                    message: "unbalanced brackets".to_string(),
                    location: start,
                });
            }
            if t.kind == TokenKind::Op {
                match t.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.advance();
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Index of the bracket closing the one at `open`, if any.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = open;
        while i < self.tokens.len() {
            let t = &self.tokens[i];
            if t.kind == TokenKind::Eof {
                return None;
            }
            if t.kind == TokenKind::Op {
                match t.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return Some(i);
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        None
    }

    // ───────────────────────────────────────────────────────────────────────
    // Doc comments
    // ───────────────────────────────────────────────────────────────────────

    /// The comment group ending on the line just above the token at `index`
    /// and starting after the previous token's line.
    fn doc_for(&self, index: usize) -> Option<CommentGroup> {
        let decl_line = self.at(index).line;
        let prev_line = if index == 0 { 0 } else { self.at(index - 1).line };
        let last = self.comments.iter().rposition(|c| c.end_line < decl_line)?;
        if self.comments[last].end_line + 1 != decl_line {
            return None;
        }
        let mut first = last;
        while first > 0 {
            let prev = &self.comments[first - 1];
            if prev.end_line + 1 < self.comments[first].line || prev.line <= prev_line {
                break;
            }
            first -= 1;
        }
        if self.comments[first].line <= prev_line {
            return None;
        }
        let head = &self.comments[first];
        Some(CommentGroup {
            lines: self.comments[first..=last]
                .iter()
                .map(|c| c.text.clone())
                .collect(),
            location: SourceLocation::new(self.file.clone(), head.line, head.column),
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // Declarations
    // ───────────────────────────────────────────────────────────────────────

    fn file(&mut self) -> PResult<SourceFile> {
        self.skip_semicolons();
        if !self.tok().is_keyword("package") {
            return self.error_here("'package'");
        }
        self.advance();
        let package = self.ident()?;
        self.end_of_item()?;

        let mut out = SourceFile {
            name: self.file.clone(),
            package,
            imports: Vec::new(),
            types: Vec::new(),
            funcs: Vec::new(),
        };

        self.skip_semicolons();
        while self.tok().is_keyword("import") {
            self.advance();
            if self.tok().is_op("(") {
                self.advance();
                loop {
                    self.skip_semicolons();
                    if self.tok().is_op(")") {
                        self.advance();
                        break;
                    }
                    out.imports.push(self.import_spec()?);
                    self.end_of_item()?;
                }
            } else {
                out.imports.push(self.import_spec()?);
            }
            self.end_of_item()?;
            self.skip_semicolons();
        }

        while !self.at_eof() {
            let t = self.tok();
            if t.kind == TokenKind::Semicolon {
                self.advance();
                continue;
            }
            if t.is_keyword("type") {
                self.type_decl(&mut out.types)?;
            } else if t.is_keyword("func") {
                out.funcs.push(self.func_decl()?);
            } else if t.is_keyword("var") || t.is_keyword("const") {
                self.skip_value_decl()?;
            } else if t.is_keyword("import") {
                return Err(SyntaxError {
                    message: "imports must appear before other declarations".to_string(),
                    location: self.here(),
                });
            } else {
                return Err(SyntaxError {
                    message: format!(
                        "non-declaration statement outside function body, found {}",
                        t.describe()
                    ),
                    location: self.here(),
                });
            }
        }
        Ok(out)
    }

    fn import_spec(&mut self) -> PResult<Import> {
        let location = self.here();
        let alias = match self.tok().kind {
            TokenKind::Ident => {
                let a = self.tok().text.clone();
                self.advance();
                Some(a)
            }
            TokenKind::Op if self.tok().is_op(".") => {
                self.advance();
                Some(".".to_string())
            }
            _ => None,
        };
        if self.tok().kind != TokenKind::String {
            return self.error_here("import path");
        }
        let path = match lexer::unquote(&self.tok().text) {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(SyntaxError {
                    message: format!("invalid import path {}", self.tok().text),
                    location: self.here(),
                })
            }
        };
        self.advance();
        Ok(Import {
            alias,
            path,
            location,
        })
    }

    fn skip_value_decl(&mut self) -> PResult<()> {
        self.advance();
        if self.tok().is_op("(") {
            self.skip_balanced()?;
            return self.end_of_item();
        }
        loop {
            let t = self.tok();
            match t.kind {
                TokenKind::Semicolon | TokenKind::Eof => break,
                TokenKind::Op if matches!(t.text.as_str(), "(" | "[" | "{") => {
                    self.skip_balanced()?
                }
                TokenKind::Op if matches!(t.text.as_str(), ")" | "]" | "}") => {
                    return self.error_here("value");
                }
                _ => self.advance(),
            }
        }
        self.end_of_item()
    }

    fn type_decl(&mut self, out: &mut Vec<TypeSpec>) -> PResult<()> {
        let kw = self.pos;
        self.advance();
        if self.tok().is_op("(") {
            let group_doc = self.doc_for(kw);
            self.advance();
            loop {
                self.skip_semicolons();
                if self.tok().is_op(")") {
                    self.advance();
                    break;
                }
                if self.at_eof() {
                    return self.error_here("')'");
                }
                let own_doc = self.doc_for(self.pos);
                let spec = self.type_spec(own_doc.or_else(|| group_doc.clone()))?;
                out.push(spec);
                self.end_of_item()?;
            }
        } else {
            let doc = self.doc_for(kw);
            out.push(self.type_spec(doc)?);
        }
        self.end_of_item()
    }

    fn type_spec(&mut self, doc: Option<CommentGroup>) -> PResult<TypeSpec> {
        let name = self.ident()?;
        let type_params = if self.tok().is_op("[") && self.is_type_param_list() {
            self.type_params()?
        } else {
            Vec::new()
        };
        let is_alias = self.tok().is_op("=");
        if is_alias {
            self.advance();
        }
        let ty = self.parse_type(0)?;
        Ok(TypeSpec {
            name,
            type_params,
            ty,
            is_alias,
            doc,
        })
    }

    /// Distinguishes `type G[T any] ...` from `type A [N]int`.
    fn is_type_param_list(&self) -> bool {
        let first = self.at(self.pos + 1);
        let second = self.at(self.pos + 2);
        first.kind == TokenKind::Ident && !second.is_op("]")
    }

    /// Collects the names of a `[T any, K comparable]` list and skips the
    /// constraints.
    fn type_params(&mut self) -> PResult<Vec<String>> {
        let open = self.pos;
        let close = match self.matching_close(open) {
            Some(c) => c,
            None => return self.error_here("']'"),
        };
        let mut names = Vec::new();
        let mut depth = 0usize;
        let mut expect_name = true;
        for i in open + 1..close {
            let t = self.at(i);
            if t.is_op("(") || t.is_op("[") || t.is_op("{") {
                depth += 1;
            } else if t.is_op(")") || t.is_op("]") || t.is_op("}") {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && t.is_op(",") {
                expect_name = true;
                continue;
            } else if depth == 0 && expect_name && t.kind == TokenKind::Ident {
                names.push(t.text.clone());
            }
            expect_name = false;
        }
        self.pos = close;
        self.advance();
        Ok(names)
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let kw = self.pos;
        let doc = self.doc_for(kw);
        self.advance();

        let receiver = if self.tok().is_op("(") {
            let recv_loc = self.here();
            let mut params = self.parse_params(0)?;
            if params.len() != 1 {
                return Err(SyntaxError {
                    message: "method has multiple receivers".to_string(),
                    location: recv_loc,
                });
            }
            let p = params.remove(0);
            Some(Receiver {
                name: p.name,
                ty: p.ty,
            })
        } else {
            None
        };

        let name = self.ident()?;
        let type_params = if self.tok().is_op("[") {
            self.type_params()?
        } else {
            Vec::new()
        };
        let ty = self.signature(name.location.clone(), 0)?;
        if self.tok().is_op("{") {
            self.skip_balanced()?;
        }
        self.end_of_item()?;
        Ok(FuncDecl {
            receiver,
            name,
            type_params,
            ty,
            doc,
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // Types
    // ───────────────────────────────────────────────────────────────────────

    fn starts_type(&self) -> bool {
        let t = self.tok();
        match t.kind {
            TokenKind::Ident => true,
            TokenKind::Keyword => matches!(
                t.text.as_str(),
                "map" | "chan" | "func" | "struct" | "interface"
            ),
            TokenKind::Op => matches!(t.text.as_str(), "*" | "[" | "(" | "<-"),
            _ => false,
        }
    }

    fn parse_type(&mut self, depth: usize) -> PResult<TypeExpr> {
        if depth > MAX_TYPE_DEPTH {
            return Err(SyntaxError {
                message: "type expression nested too deeply".to_string(),
                location: self.here(),
            });
        }
        let location = self.here();
        let t = self.tok().clone();
        match t.kind {
            TokenKind::Ident => self.type_name(depth),
            TokenKind::Keyword => match t.text.as_str() {
                "map" => {
                    self.advance();
                    self.expect_op("[")?;
                    let key = self.parse_type(depth + 1)?;
                    self.expect_op("]")?;
                    let value = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Map {
                        key: Box::new(key),
                        value: Box::new(value),
                        location,
                    })
                }
                "chan" => {
                    self.advance();
                    let dir = if self.tok().is_op("<-") {
                        self.advance();
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    };
                    let elem = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Chan {
                        dir,
                        elem: Box::new(elem),
                        location,
                    })
                }
                "func" => {
                    self.advance();
                    Ok(TypeExpr::Func(self.signature(location, depth + 1)?))
                }
                "struct" => {
                    self.advance();
                    Ok(TypeExpr::Struct(self.struct_body(location, depth + 1)?))
                }
                "interface" => {
                    self.advance();
                    if !self.tok().is_op("{") {
                        return self.error_here("'{'");
                    }
                    let open = self.pos;
                    self.skip_balanced()?;
                    let empty = self.tokens[open + 1..self.pos.saturating_sub(1).max(open + 1)]
                        .iter()
                        .all(|t| t.kind == TokenKind::Semicolon);
                    Ok(TypeExpr::Interface { empty, location })
                }
                _ => self.error_here("type"),
            },
            TokenKind::Op => match t.text.as_str() {
                "*" => {
                    self.advance();
                    let elem = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Pointer {
                        elem: Box::new(elem),
                        location,
                    })
                }
                "[" => {
                    self.advance();
                    if self.tok().is_op("]") {
                        self.advance();
                        let elem = self.parse_type(depth + 1)?;
                        return Ok(TypeExpr::Slice {
                            elem: Box::new(elem),
                            location,
                        });
                    }
                    let mut len = String::new();
                    let mut nested = 0usize;
                    loop {
                        let t = self.tok();
                        if t.kind == TokenKind::Eof || t.kind == TokenKind::Semicolon {
                            return self.error_here("']'");
                        }
                        if t.is_op("]") && nested == 0 {
                            break;
                        }
                        if t.is_op("[") || t.is_op("(") {
                            nested += 1;
                        } else if t.is_op("]") || t.is_op(")") {
                            nested = nested.saturating_sub(1);
                        }
                        len.push_str(&t.text);
                        self.advance();
                    }
                    self.advance();
                    let elem = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Array {
                        len,
                        elem: Box::new(elem),
                        location,
                    })
                }
                "<-" => {
                    self.advance();
                    if !self.tok().is_keyword("chan") {
                        return self.error_here("'chan'");
                    }
                    self.advance();
                    let elem = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Chan {
                        dir: ChanDir::Recv,
                        elem: Box::new(elem),
                        location,
                    })
                }
                "(" => {
                    self.advance();
                    let inner = self.parse_type(depth + 1)?;
                    self.expect_op(")")?;
                    Ok(inner)
                }
                "..." => {
                    self.advance();
                    let elem = self.parse_type(depth + 1)?;
                    Ok(TypeExpr::Ellipsis {
                        elem: Box::new(elem),
                        location,
                    })
                }
                _ => self.error_here("type"),
            },
            _ => self.error_here("type"),
        }
    }

    fn type_name(&mut self, depth: usize) -> PResult<TypeExpr> {
        let first = self.ident()?;
        let mut ty = if self.tok().is_op(".") {
            self.advance();
            let name = self.ident()?;
            TypeExpr::Qualified {
                package: first,
                name,
            }
        } else {
            TypeExpr::Name(first)
        };
        if self.tok().is_op("[") && !self.at(self.pos + 1).is_op("]") {
            self.advance();
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type(depth + 1)?);
                if self.tok().is_op(",") {
                    self.advance();
                    if self.tok().is_op("]") {
                        break;
                    }
                } else {
                    break;
                }
            }
            self.expect_op("]")?;
            ty = TypeExpr::Generic {
                base: Box::new(ty),
                args,
            };
        }
        Ok(ty)
    }

    fn signature(&mut self, location: SourceLocation, depth: usize) -> PResult<FuncType> {
        let params = self.parse_params(depth)?;
        let results = if self.tok().is_op("(") {
            self.parse_params(depth)?
        } else if self.starts_type() {
            vec![Param {
                name: None,
                ty: self.parse_type(depth + 1)?,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType {
            params,
            results,
            location,
        })
    }

    fn parse_params(&mut self, depth: usize) -> PResult<Vec<Param>> {
        let open = self.here();
        self.expect_op("(")?;
        let mut entries = Vec::new();
        loop {
            self.skip_semicolons();
            if self.tok().is_op(")") {
                self.advance();
                break;
            }
            entries.push(self.param_entry(depth)?);
            self.skip_semicolons();
            if self.tok().is_op(",") {
                self.advance();
            } else if !self.tok().is_op(")") {
                return self.error_here("',' or ')'");
            }
        }
        group_params(entries, open)
    }

    fn param_entry(&mut self, depth: usize) -> PResult<ParamEntry> {
        if self.tok().kind != TokenKind::Ident {
            return Ok(ParamEntry::Type(self.parse_type(depth + 1)?));
        }
        let next = self.at(self.pos + 1);
        if next.is_op(",") || next.is_op(")") {
            return Ok(ParamEntry::Lone(self.ident()?));
        }
        if next.is_op(".") {
            return Ok(ParamEntry::Type(self.parse_type(depth + 1)?));
        }
        if next.is_op("[") {
            // `G[T]` followed by ',' or ')' is a generic type, anything else
            // is a name followed by an array or slice type.
            let generic = self
                .matching_close(self.pos + 1)
                .map(|close| {
                    let after = self.at(close + 1);
                    after.is_op(",") || after.is_op(")")
                })
                .unwrap_or(false)
                && !self.at(self.pos + 2).is_op("]");
            if generic {
                return Ok(ParamEntry::Type(self.parse_type(depth + 1)?));
            }
        }
        let name = self.ident()?;
        let ty = self.parse_type(depth + 1)?;
        Ok(ParamEntry::Named(name, ty))
    }

    fn struct_body(&mut self, location: SourceLocation, depth: usize) -> PResult<StructType> {
        self.expect_op("{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semicolons();
            if self.tok().is_op("}") {
                self.advance();
                break;
            }
            if self.at_eof() {
                return self.error_here("'}'");
            }
            fields.push(self.field_decl(depth)?);
            self.end_of_item()?;
        }
        Ok(StructType { fields, location })
    }

    fn field_decl(&mut self, depth: usize) -> PResult<FieldDecl> {
        let embedded = if self.tok().is_op("*") {
            true
        } else if self.tok().kind == TokenKind::Ident {
            let next = self.at(self.pos + 1);
            if next.is_op(".")
                || next.kind == TokenKind::Semicolon
                || next.kind == TokenKind::String
                || next.is_op("}")
            {
                true
            } else if next.is_op("[") {
                self.matching_close(self.pos + 1)
                    .map(|close| {
                        let after = self.at(close + 1);
                        after.kind == TokenKind::Semicolon
                            || after.kind == TokenKind::String
                            || after.is_op("}")
                    })
                    .unwrap_or(false)
                    && !self.at(self.pos + 2).is_op("]")
            } else {
                false
            }
        } else {
            return self.error_here("field name or embedded type");
        };

        let (names, ty) = if embedded {
            (Vec::new(), self.parse_type(depth + 1)?)
        } else {
            let mut names = vec![self.ident()?];
            while self.tok().is_op(",") {
                self.advance();
                names.push(self.ident()?);
            }
            (names, self.parse_type(depth + 1)?)
        };

        let tag = if self.tok().kind == TokenKind::String {
            let raw = self.tok().text.clone();
            let tag = lexer::unquote(&raw).ok_or_else(|| SyntaxError {
                message: format!("invalid struct tag {}", raw),
                location: self.here(),
            })?;
            self.advance();
            Some(tag)
        } else {
            None
        };
        Ok(FieldDecl { names, ty, tag })
    }
}

/// Applies Go's parameter grouping: either every entry is named (`a, b int`)
/// or none is (`int, string`).
fn group_params(entries: Vec<ParamEntry>, open: SourceLocation) -> PResult<Vec<Param>> {
    let named = entries.iter().any(|e| matches!(e, ParamEntry::Named(..)));
    let mut out = Vec::new();
    if !named {
        for e in entries {
            let ty = match e {
                ParamEntry::Lone(id) => TypeExpr::Name(id),
                ParamEntry::Type(ty) => ty,
                ParamEntry::Named(..) => continue,
            };
            out.push(Param { name: None, ty });
        }
        return Ok(out);
    }

    let mut pending: Vec<Ident> = Vec::new();
    for e in entries {
        match e {
            ParamEntry::Lone(id) => pending.push(id),
            ParamEntry::Named(id, ty) => {
                for name in pending.drain(..) {
                    out.push(Param {
                        name: Some(name),
                        ty: ty.clone(),
                    });
                }
                out.push(Param { name: Some(id), ty });
            }
            ParamEntry::Type(ty) => {
                return Err(SyntaxError {
                    message: "mixed named and unnamed parameters".to_string(),
                    location: ty.location().clone(),
                })
            }
        }
    }
    if !pending.is_empty() {
        return Err(SyntaxError {
            message: "mixed named and unnamed parameters".to_string(),
            location: open,
        });
    }
    Ok(out)
}
