//! Declaration Indexer
//!
//! Lookup tables over one unit: type declarations by name (sorted, so every
//! later pass iterates in the same order) and methods grouped by receiver
//! in file order.

use std::collections::BTreeMap;

use crate::loader::{FileId, Unit};
use crate::source::SourceLocation;
use crate::syntax::{CommentGroup, FuncDecl, StructType, TypeExpr, TypeSpec};

#[derive(Debug, Clone, Copy)]
pub struct TypeDecl<'a> {
    pub file: FileId,
    pub spec: &'a TypeSpec,
}

impl<'a> TypeDecl<'a> {
    pub fn name(&self) -> &'a str {
        &self.spec.name.name
    }

    pub fn location(&self) -> &'a SourceLocation {
        &self.spec.name.location
    }

    pub fn doc(&self) -> Option<&'a CommentGroup> {
        self.spec.doc.as_ref()
    }

    /// The struct literal of a non-alias struct declaration.
    pub fn struct_type(&self) -> Option<&'a StructType> {
        match &self.spec.ty {
            TypeExpr::Struct(s) if !self.spec.is_alias => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MethodDecl<'a> {
    pub file: FileId,
    pub func: &'a FuncDecl,
}

#[derive(Debug, Default)]
pub struct Index<'a> {
    types: BTreeMap<String, TypeDecl<'a>>,
    methods: BTreeMap<String, Vec<MethodDecl<'a>>>,
    /// Receiver names in order of their first method.
    receivers: Vec<String>,
}

impl<'a> Index<'a> {
    pub fn build(unit: &'a Unit) -> Self {
        let mut index = Index::default();
        for (file, source) in unit.files.iter().enumerate() {
            for spec in &source.types {
                // Redeclarations are type errors; the first one is analyzed.
                index
                    .types
                    .entry(spec.name.name.clone())
                    .or_insert(TypeDecl { file, spec });
            }
            for func in &source.funcs {
                let Some(recv) = func.receiver.as_ref().and_then(|r| r.type_name()) else {
                    continue;
                };
                if !index.methods.contains_key(recv) {
                    index.receivers.push(recv.to_string());
                }
                index
                    .methods
                    .entry(recv.to_string())
                    .or_default()
                    .push(MethodDecl { file, func });
            }
        }
        index
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl<'a>> {
        self.types.get(name)
    }

    /// Type declarations in name order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDecl<'a>> {
        self.types.values()
    }

    pub fn methods_of(&self, receiver: &str) -> &[MethodDecl<'a>] {
        self.methods
            .get(receiver)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every method with its receiver name, in file order per receiver.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodDecl<'a>)> {
        self.receivers
            .iter()
            .flat_map(move |r| self.methods_of(r).iter().map(move |m| (r.as_str(), m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_sorted_and_methods_grouped() {
        let unit = Unit::from_sources(&[
            (
                "b.go",
                "package app\n\ntype Zed struct{}\n\nfunc (z *Zed) Two() {}\n",
            ),
            (
                "a.go",
                "package app\n\ntype Alpha struct{}\n\nfunc (Zed) One() {}\n\nfunc (a Alpha) X() {}\n\nfunc free() {}\n",
            ),
        ])
        .unwrap();
        let index = Index::build(&unit);
        let names: Vec<&str> = index.types().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Alpha", "Zed"]);

        let zed: Vec<&str> = index
            .methods_of("Zed")
            .iter()
            .map(|m| m.func.name.name.as_str())
            .collect();
        assert_eq!(zed, vec!["One", "Two"]);

        let all: Vec<(&str, &str)> = index
            .methods()
            .map(|(r, m)| (r, m.func.name.name.as_str()))
            .collect();
        assert_eq!(all, vec![("Zed", "One"), ("Zed", "Two"), ("Alpha", "X")]);
        assert!(index.methods_of("Missing").is_empty());
    }
}
