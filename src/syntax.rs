//! Declaration-level syntax tree produced by the parser.

use std::fmt;

use crate::source::SourceLocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentGroup {
    pub lines: Vec<String>,
    pub location: SourceLocation,
}

impl CommentGroup {
    /// Comment text with markers stripped, one entry per source line.
    pub fn text_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for raw in &self.lines {
            if let Some(body) = raw.strip_prefix("//") {
                out.push(body.strip_prefix(' ').unwrap_or(body).to_string());
            } else if let Some(body) = raw
                .strip_prefix("/*")
                .and_then(|s| s.strip_suffix("*/"))
            {
                for line in body.lines() {
                    out.push(line.trim().to_string());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Name(Ident),
    Qualified {
        package: Ident,
        name: Ident,
    },
    Generic {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    Pointer {
        elem: Box<TypeExpr>,
        location: SourceLocation,
    },
    Slice {
        elem: Box<TypeExpr>,
        location: SourceLocation,
    },
    Array {
        len: String,
        elem: Box<TypeExpr>,
        location: SourceLocation,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
        location: SourceLocation,
    },
    Chan {
        dir: ChanDir,
        elem: Box<TypeExpr>,
        location: SourceLocation,
    },
    Func(FuncType),
    Struct(StructType),
    Interface {
        empty: bool,
        location: SourceLocation,
    },
    Ellipsis {
        elem: Box<TypeExpr>,
        location: SourceLocation,
    },
}

impl TypeExpr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            TypeExpr::Name(id) => &id.location,
            TypeExpr::Qualified { package, .. } => &package.location,
            TypeExpr::Generic { base, .. } => base.location(),
            TypeExpr::Pointer { location, .. }
            | TypeExpr::Slice { location, .. }
            | TypeExpr::Array { location, .. }
            | TypeExpr::Map { location, .. }
            | TypeExpr::Chan { location, .. }
            | TypeExpr::Interface { location, .. }
            | TypeExpr::Ellipsis { location, .. } => location,
            TypeExpr::Func(f) => &f.location,
            TypeExpr::Struct(s) => &s.location,
        }
    }

    /// The type name an embedded field contributes (`T`, `*T`, `pkg.T`).
    pub fn embedded_name(&self) -> Option<&Ident> {
        match self {
            TypeExpr::Name(id) => Some(id),
            TypeExpr::Qualified { name, .. } => Some(name),
            TypeExpr::Pointer { elem, .. } => elem.embedded_name(),
            TypeExpr::Generic { base, .. } => base.embedded_name(),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeExpr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Source-like rendering, used as the originating expression of model slots.
impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name(id) => write!(f, "{}", id.name),
            TypeExpr::Qualified { package, name } => write!(f, "{}.{}", package.name, name.name),
            TypeExpr::Generic { base, args } => {
                write!(f, "{}[", base)?;
                write_list(f, args)?;
                write!(f, "]")
            }
            TypeExpr::Pointer { elem, .. } => write!(f, "*{}", elem),
            TypeExpr::Slice { elem, .. } => write!(f, "[]{}", elem),
            TypeExpr::Array { len, elem, .. } => write!(f, "[{}]{}", len, elem),
            TypeExpr::Map { key, value, .. } => write!(f, "map[{}]{}", key, value),
            TypeExpr::Chan { dir, elem, .. } => match dir {
                ChanDir::Both => write!(f, "chan {}", elem),
                ChanDir::Send => write!(f, "chan<- {}", elem),
                ChanDir::Recv => write!(f, "<-chan {}", elem),
            },
            TypeExpr::Func(func) => write!(f, "func{}", func),
            TypeExpr::Struct(s) => {
                write!(f, "struct{{")?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    let names: Vec<&str> = field.names.iter().map(|n| n.name.as_str()).collect();
                    if !names.is_empty() {
                        write!(f, "{} ", names.join(", "))?;
                    }
                    write!(f, "{}", field.ty)?;
                    if let Some(tag) = &field.tag {
                        write!(f, " {:?}", tag)?;
                    }
                }
                write!(f, "}}")
            }
            TypeExpr::Interface { empty: true, .. } => write!(f, "interface{{}}"),
            TypeExpr::Interface { .. } => write!(f, "interface{{...}}"),
            TypeExpr::Ellipsis { elem, .. } => write!(f, "...{}", elem),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Empty for an embedded field.
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    /// Tag with the literal quotes removed.
    pub tag: Option<String>,
}

impl FieldDecl {
    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub fields: Vec<FieldDecl>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

impl Param {
    pub fn name(&self) -> &str {
        self.name.as_ref().map(|n| n.name.as_str()).unwrap_or("")
    }

    pub fn location(&self) -> &SourceLocation {
        match &self.name {
            Some(n) => &n.location,
            None => self.ty.location(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub location: SourceLocation,
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn params(f: &mut fmt::Formatter<'_>, list: &[Param]) -> fmt::Result {
            for (i, p) in list.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match &p.name {
                    Some(n) => write!(f, "{} {}", n.name, p.ty)?,
                    None => write!(f, "{}", p.ty)?,
                }
            }
            Ok(())
        }
        write!(f, "(")?;
        params(f, &self.params)?;
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [only] if only.name.is_none() => write!(f, " {}", only.ty),
            list => {
                write!(f, " (")?;
                params(f, list)?;
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<String>,
    pub ty: TypeExpr,
    pub is_alias: bool,
    pub doc: Option<CommentGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

impl Receiver {
    /// Base type name of the receiver, with any pointer stripped.
    pub fn type_name(&self) -> Option<&str> {
        self.ty.embedded_name().map(|id| id.name.as_str())
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.ty, TypeExpr::Pointer { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub receiver: Option<Receiver>,
    pub name: Ident,
    pub type_params: Vec<String>,
    pub ty: FuncType,
    pub doc: Option<CommentGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub package: Ident,
    pub imports: Vec<Import>,
    pub types: Vec<TypeSpec>,
    pub funcs: Vec<FuncDecl>,
}
