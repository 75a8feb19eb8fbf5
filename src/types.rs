//! Resolved host types.
//!
//! Type expressions from the syntax tree are resolved against the unit's
//! declared types, the predeclared identifiers and each file's imports.
//! Named types keep their identity (import path and name); their underlying
//! type is looked up on demand through the unit.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::source::SourceLocation;
use crate::syntax::{Import, TypeExpr};

const BASIC_TYPES: &[&str] = &[
    "bool",
    "string",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
    "float32",
    "float64",
    "complex64",
    "complex128",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostType {
    Basic {
        name: String,
    },
    Error,
    /// A declared type. `package` is the import path, empty for the unit
    /// being analyzed.
    Named {
        package: String,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<HostType>,
    },
    TypeParam {
        name: String,
    },
    Pointer {
        elem: Box<HostType>,
    },
    Slice {
        elem: Box<HostType>,
    },
    Array {
        len: String,
        elem: Box<HostType>,
    },
    Map {
        key: Box<HostType>,
        value: Box<HostType>,
    },
    Chan {
        elem: Box<HostType>,
    },
    Func {
        params: Vec<HostType>,
        results: Vec<HostType>,
        variadic: bool,
    },
    Struct {
        fields: Vec<StructField>,
    },
    Interface {
        empty: bool,
    },
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructField {
    pub name: String,
    pub embedded: bool,
    pub ty: HostType,
    pub tag: String,
    pub location: SourceLocation,
}

impl StructField {
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

impl HostType {
    pub fn basic(name: &str) -> Self {
        HostType::Basic {
            name: name.to_string(),
        }
    }

    pub fn named(package: &str, name: &str) -> Self {
        HostType::Named {
            package: package.to_string(),
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn pointer(elem: HostType) -> Self {
        HostType::Pointer {
            elem: Box::new(elem),
        }
    }

    pub fn is_basic(&self, expected: &str) -> bool {
        matches!(self, HostType::Basic { name } if name == expected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HostType::Error)
    }

    pub fn is_named(&self, package: &str, expected: &str) -> bool {
        matches!(self, HostType::Named { package: p, name, .. } if p == package && name == expected)
    }

    /// Name of a type declared in the analyzed unit.
    pub fn local_name(&self) -> Option<&str> {
        match self {
            HostType::Named { package, name, .. } if package.is_empty() => Some(name),
            _ => None,
        }
    }

    pub fn strip_pointer(&self) -> &HostType {
        match self {
            HostType::Pointer { elem } => elem,
            other => other,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[HostType]) -> fmt::Result {
            for (i, t) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", t)?;
            }
            Ok(())
        }
        match self {
            HostType::Basic { name } => write!(f, "{}", name),
            HostType::Error => write!(f, "error"),
            HostType::Named {
                package,
                name,
                args,
            } => {
                if package.is_empty() {
                    write!(f, "{}", name)?;
                } else {
                    write!(f, "{}.{}", package, name)?;
                }
                if !args.is_empty() {
                    write!(f, "[")?;
                    list(f, args)?;
                    write!(f, "]")?;
                }
                Ok(())
            }
            HostType::TypeParam { name } => write!(f, "{}", name),
            HostType::Pointer { elem } => write!(f, "*{}", elem),
            HostType::Slice { elem } => write!(f, "[]{}", elem),
            HostType::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            HostType::Map { key, value } => write!(f, "map[{}]{}", key, value),
            HostType::Chan { elem } => write!(f, "chan {}", elem),
            HostType::Func {
                params,
                results,
                variadic,
            } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if *variadic && i + 1 == params.len() {
                        match p {
                            HostType::Slice { elem } => write!(f, "...{}", elem)?,
                            other => write!(f, "...{}", other)?,
                        }
                    } else {
                        write!(f, "{}", p)?;
                    }
                }
                write!(f, ")")?;
                match results.as_slice() {
                    [] => Ok(()),
                    [one] => write!(f, " {}", one),
                    many => {
                        write!(f, " (")?;
                        list(f, many)?;
                        write!(f, ")")
                    }
                }
            }
            HostType::Struct { fields } => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                    if !field.tag.is_empty() {
                        write!(f, " {:?}", field.tag)?;
                    }
                }
                write!(f, "}}")
            }
            HostType::Interface { empty: true } => write!(f, "interface{{}}"),
            HostType::Interface { empty: false } => write!(f, "interface{{...}}"),
            HostType::Invalid => write!(f, "invalid type"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeProblem {
    pub location: SourceLocation,
    pub message: String,
}

/// The package name an import path is referred to by when it has no alias.
pub fn default_import_name(path: &str) -> String {
    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            if is_major_version(last) {
                parts.pop();
            }
        }
    }
    let last = parts.last().copied().unwrap_or(path);
    let last = match last.rsplit_once('.') {
        Some((base, suffix)) if is_major_version(suffix) => base,
        _ => last,
    };
    let last = last.strip_prefix("go-").unwrap_or(last);
    let last = last.strip_suffix("-go").unwrap_or(last);
    last.replace('-', "_")
}

fn is_major_version(s: &str) -> bool {
    s.len() > 1 && s.starts_with('v') && s[1..].bytes().all(|b| b.is_ascii_digit())
}

/// Resolution scope of one file: the unit's declared types, the file's
/// imports and any type parameters in effect.
pub struct Scope<'a> {
    local_types: &'a HashSet<String>,
    imports: HashMap<String, String>,
    dot_import: Option<String>,
    type_params: HashSet<String>,
}

impl<'a> Scope<'a> {
    pub fn new(local_types: &'a HashSet<String>, imports: &[Import]) -> Self {
        let mut map = HashMap::new();
        let mut dot_import = None;
        for imp in imports {
            match imp.alias.as_deref() {
                Some("_") => {}
                Some(".") => dot_import = Some(imp.path.clone()),
                Some(alias) => {
                    map.insert(alias.to_string(), imp.path.clone());
                }
                None => {
                    map.insert(default_import_name(&imp.path), imp.path.clone());
                }
            }
        }
        Self {
            local_types,
            imports: map,
            dot_import,
            type_params: HashSet::new(),
        }
    }

    pub fn with_type_params<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.type_params.extend(names);
        self
    }

    pub fn resolve(&self, expr: &TypeExpr, problems: &mut Vec<TypeProblem>) -> HostType {
        match expr {
            TypeExpr::Name(id) => self.resolve_name(&id.name, &id.location, problems),
            TypeExpr::Qualified { package, name } => match self.imports.get(&package.name) {
                Some(path) => HostType::named(path, &name.name),
                None => {
                    problems.push(TypeProblem {
                        location: package.location.clone(),
                        message: format!("undefined: {}", package.name),
                    });
                    HostType::Invalid
                }
            },
            TypeExpr::Generic { base, args } => {
                let resolved_args = args.iter().map(|a| self.resolve(a, problems)).collect();
                match self.resolve(base, problems) {
                    HostType::Named { package, name, .. } => HostType::Named {
                        package,
                        name,
                        args: resolved_args,
                    },
                    other => other,
                }
            }
            TypeExpr::Pointer { elem, .. } => HostType::pointer(self.resolve(elem, problems)),
            TypeExpr::Slice { elem, .. } | TypeExpr::Ellipsis { elem, .. } => HostType::Slice {
                elem: Box::new(self.resolve(elem, problems)),
            },
            TypeExpr::Array { len, elem, .. } => HostType::Array {
                len: len.clone(),
                elem: Box::new(self.resolve(elem, problems)),
            },
            TypeExpr::Map { key, value, .. } => HostType::Map {
                key: Box::new(self.resolve(key, problems)),
                value: Box::new(self.resolve(value, problems)),
            },
            TypeExpr::Chan { elem, .. } => HostType::Chan {
                elem: Box::new(self.resolve(elem, problems)),
            },
            TypeExpr::Func(func) => HostType::Func {
                params: func
                    .params
                    .iter()
                    .map(|p| self.resolve(&p.ty, problems))
                    .collect(),
                results: func
                    .results
                    .iter()
                    .map(|p| self.resolve(&p.ty, problems))
                    .collect(),
                variadic: func
                    .params
                    .last()
                    .map_or(false, |p| matches!(p.ty, TypeExpr::Ellipsis { .. })),
            },
            TypeExpr::Struct(s) => {
                let mut fields = Vec::new();
                for decl in &s.fields {
                    let ty = self.resolve(&decl.ty, problems);
                    let tag = decl.tag.clone().unwrap_or_default();
                    if decl.is_embedded() {
                        let (name, location) = match decl.ty.embedded_name() {
                            Some(id) => (id.name.clone(), id.location.clone()),
                            None => (String::new(), decl.ty.location().clone()),
                        };
                        fields.push(StructField {
                            name,
                            embedded: true,
                            ty,
                            tag,
                            location,
                        });
                    } else {
                        for name in &decl.names {
                            fields.push(StructField {
                                name: name.name.clone(),
                                embedded: false,
                                ty: ty.clone(),
                                tag: tag.clone(),
                                location: name.location.clone(),
                            });
                        }
                    }
                }
                HostType::Struct { fields }
            }
            TypeExpr::Interface { empty, .. } => HostType::Interface { empty: *empty },
        }
    }

    fn resolve_name(
        &self,
        name: &str,
        location: &SourceLocation,
        problems: &mut Vec<TypeProblem>,
    ) -> HostType {
        if self.type_params.contains(name) {
            return HostType::TypeParam {
                name: name.to_string(),
            };
        }
        if self.local_types.contains(name) {
            return HostType::named("", name);
        }
        match name {
            "error" => HostType::Error,
            "byte" => HostType::basic("uint8"),
            "rune" => HostType::basic("int32"),
            "any" => HostType::Interface { empty: true },
            "comparable" => HostType::Interface { empty: false },
            _ if BASIC_TYPES.contains(&name) => HostType::basic(name),
            _ => match &self.dot_import {
                Some(path) => HostType::named(path, name),
                None => {
                    problems.push(TypeProblem {
                        location: location.clone(),
                        message: format!("undefined: {}", name),
                    });
                    HostType::Invalid
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::syntax::TypeExpr;

    fn field_types(src: &str) -> (Vec<HostType>, Vec<TypeProblem>) {
        let file = parse_file("app.go", src).unwrap();
        let locals: HashSet<String> = file.types.iter().map(|t| t.name.name.clone()).collect();
        let scope = Scope::new(&locals, &file.imports);
        let mut problems = Vec::new();
        let TypeExpr::Struct(_) = &file.types[0].ty else {
            panic!("first type must be a struct")
        };
        let HostType::Struct { fields } = scope.resolve(&file.types[0].ty, &mut problems) else {
            panic!("not resolved to a struct")
        };
        (fields.into_iter().map(|f| f.ty).collect(), problems)
    }

    #[test]
    fn test_resolves_imports_and_locals() {
        let (types, problems) = field_types(
            r#"package app

import (
	"net/http"
	"github.com/a-h/templ"
	ds "github.com/starfederation/datastar-go/datastar"
)

type T struct {
	R *http.Request
	C templ.Component
	S *ds.ServerSentEventGenerator
	E error
	B []byte
	L *Local
	A any
}

type Local struct{}
"#,
        );
        assert!(problems.is_empty(), "{:?}", problems);
        let rendered: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "*net/http.Request",
                "github.com/a-h/templ.Component",
                "*github.com/starfederation/datastar-go/datastar.ServerSentEventGenerator",
                "error",
                "[]uint8",
                "*Local",
                "interface{}",
            ]
        );
        assert_eq!(types[5].strip_pointer().local_name(), Some("Local"));
    }

    #[test]
    fn test_reports_undefined_names() {
        let (types, problems) =
            field_types("package app\n\ntype T struct {\n\tA Missing\n\tB nope.Thing\n}\n");
        assert_eq!(types, vec![HostType::Invalid, HostType::Invalid]);
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].message, "undefined: Missing");
        assert_eq!(problems[0].location, SourceLocation::new("app.go", 4, 4));
        assert_eq!(problems[1].message, "undefined: nope");
    }

    #[test]
    fn test_default_import_names() {
        assert_eq!(default_import_name("net/http"), "http");
        assert_eq!(default_import_name("github.com/go-chi/chi/v5"), "chi");
        assert_eq!(default_import_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(
            default_import_name("github.com/starfederation/datastar-go/datastar"),
            "datastar"
        );
    }

    #[test]
    fn test_func_type_display() {
        let (types, problems) = field_types(
            "package app\n\ntype T struct {\n\tF func(a int, b ...string) (bool, error)\n}\n",
        );
        assert!(problems.is_empty());
        assert_eq!(types[0].to_string(), "func(int, ...string) (bool, error)");
    }
}
