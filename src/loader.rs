//! Loader
//!
//! Reads one compilation unit (all non-test `.go` files of a directory),
//! parses it and type-checks every declaration the analyzer looks at.
//! Syntax errors and unit-level problems are fatal; type errors are returned
//! alongside the unit and reported as ordinary diagnostics.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::parser::{parse_file, SyntaxError};
use crate::source::SourceLocation;
use crate::syntax::{FuncDecl, SourceFile, TypeExpr, TypeSpec};
use crate::types::{HostType, Scope, TypeProblem};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no Go files in {0}")]
    NoGoFiles(PathBuf),
    #[error("found packages {first} and {second}")]
    MultiplePackages {
        first: String,
        second: String,
        location: SourceLocation,
    },
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
}

impl LoadError {
    /// Where the failure is anchored, when a position is known.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            LoadError::Syntax(e) => Some(&e.location),
            LoadError::MultiplePackages { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// One parsed compilation unit. Files are kept in file-name order.
#[derive(Debug, Clone)]
pub struct Unit {
    pub package: String,
    pub files: Vec<SourceFile>,
    digest: String,
    local_names: HashSet<String>,
    types: HashMap<String, (usize, usize)>,
}

/// Index of a file within its unit.
pub type FileId = usize;

impl Unit {
    /// Builds a unit from in-memory `(file name, source)` pairs.
    pub fn from_sources(sources: &[(&str, &str)]) -> Result<Unit, LoadError> {
        let mut sorted: Vec<(&str, &str)> = sources.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut files = Vec::with_capacity(sorted.len());
        let mut hasher = Sha256::new();
        for (name, source) in &sorted {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(source.as_bytes());
            hasher.update([0u8]);
            files.push(parse_file(name, source)?);
        }
        let first = match files.first() {
            Some(f) => f,
            None => return Err(LoadError::NoGoFiles(PathBuf::from("."))),
        };
        let package = first.package.name.clone();
        if let Some(other) = files.iter().find(|f| f.package.name != package) {
            return Err(LoadError::MultiplePackages {
                first: package,
                second: other.package.name.clone(),
                location: other.package.location.clone(),
            });
        }

        let mut types = HashMap::new();
        for (fi, file) in files.iter().enumerate() {
            for (ti, spec) in file.types.iter().enumerate() {
                types.entry(spec.name.name.clone()).or_insert((fi, ti));
            }
        }
        let local_names = types.keys().cloned().collect();
        Ok(Unit {
            package,
            files,
            digest: format!("{:x}", hasher.finalize()),
            local_names,
            types,
        })
    }

    /// SHA-256 over the sorted file names and contents.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Position of the package name in the first file.
    pub fn base_location(&self) -> SourceLocation {
        self.files
            .first()
            .map(|f| f.package.location.clone())
            .unwrap_or_default()
    }

    pub fn type_spec(&self, name: &str) -> Option<(FileId, &TypeSpec)> {
        let (fi, ti) = *self.types.get(name)?;
        let spec = self.files.get(fi)?.types.get(ti)?;
        Some((fi, spec))
    }

    pub fn scope(&self, file: FileId) -> Scope<'_> {
        let imports = self
            .files
            .get(file)
            .map(|f| f.imports.as_slice())
            .unwrap_or(&[]);
        Scope::new(&self.local_names, imports)
    }

    fn method_scope(&self, file: FileId, func: &FuncDecl) -> Scope<'_> {
        let mut params = func.type_params.clone();
        if let Some(TypeExpr::Generic { args, .. }) = func.receiver.as_ref().map(|r| match &r.ty {
            TypeExpr::Pointer { elem, .. } => elem.as_ref(),
            other => other,
        }) {
            params.extend(args.iter().filter_map(|a| match a {
                TypeExpr::Name(id) => Some(id.name.clone()),
                _ => None,
            }));
        }
        self.scope(file).with_type_params(params)
    }

    /// Resolves a type expression from a method signature in `file`.
    pub fn resolve_in_method(&self, file: FileId, func: &FuncDecl, expr: &TypeExpr) -> HostType {
        self.method_scope(file, func).resolve(expr, &mut Vec::new())
    }

    /// The underlying type of a declared type, following local named types
    /// and aliases.
    pub fn underlying(&self, ty: &HostType) -> HostType {
        let mut current = ty.clone();
        let mut seen = HashSet::new();
        while let Some(name) = current.local_name().map(str::to_string) {
            if !seen.insert(name.clone()) {
                return HostType::Invalid;
            }
            current = match self.type_spec(&name) {
                Some((fi, spec)) => self
                    .scope(fi)
                    .with_type_params(spec.type_params.iter().cloned())
                    .resolve(&spec.ty, &mut Vec::new()),
                None => return HostType::Invalid,
            };
        }
        current
    }

    /// True when the underlying type of `ty` is the predeclared `basic` type,
    /// so `type Slug string` counts as a string.
    pub fn is_basic_underlying(&self, ty: &HostType, basic: &str) -> bool {
        ty.is_basic(basic) || self.underlying(ty).is_basic(basic)
    }

    /// Follows aliases only, keeping defined named types intact.
    pub fn unalias(&self, ty: &HostType) -> HostType {
        let mut current = ty.clone();
        let mut seen = HashSet::new();
        while let Some(name) = current.local_name().map(str::to_string) {
            match self.type_spec(&name) {
                Some((fi, spec)) if spec.is_alias && seen.insert(name) => {
                    current = self.scope(fi).resolve(&spec.ty, &mut Vec::new());
                }
                _ => break,
            }
        }
        current
    }

    /// Type-checks declarations and reports every problem found.
    pub fn check(&self) -> Vec<TypeProblem> {
        let mut problems = Vec::new();
        let mut seen_types: HashMap<&str, &SourceLocation> = HashMap::new();
        let mut seen_methods: HashMap<(String, String), &SourceLocation> = HashMap::new();

        for (fi, file) in self.files.iter().enumerate() {
            for spec in &file.types {
                if let Some(prev) = seen_types.get(spec.name.name.as_str()) {
                    problems.push(TypeProblem {
                        location: spec.name.location.clone(),
                        message: format!(
                            "{} redeclared in this block (previous at {})",
                            spec.name.name,
                            prev.normalized()
                        ),
                    });
                    continue;
                }
                seen_types.insert(&spec.name.name, &spec.name.location);
                self.scope(fi)
                    .with_type_params(spec.type_params.iter().cloned())
                    .resolve(&spec.ty, &mut problems);
            }

            for func in &file.funcs {
                let scope = self.method_scope(fi, func);
                if let Some(recv) = &func.receiver {
                    let recv_ty = scope.resolve(&recv.ty, &mut problems);
                    match recv_ty.strip_pointer().local_name() {
                        Some(recv_name) => {
                            let key = (recv_name.to_string(), func.name.name.clone());
                            if let Some(prev) = seen_methods.get(&key) {
                                problems.push(TypeProblem {
                                    location: func.name.location.clone(),
                                    message: format!(
                                        "method {}.{} already declared at {}",
                                        key.0,
                                        key.1,
                                        prev.normalized()
                                    ),
                                });
                            } else {
                                seen_methods.insert(key, &func.name.location);
                            }
                        }
                        None if recv_ty != HostType::Invalid => problems.push(TypeProblem {
                            location: recv.ty.location().clone(),
                            message: format!(
                                "cannot define new methods on non-local type {}",
                                recv_ty
                            ),
                        }),
                        None => {}
                    }
                }
                for p in func.ty.params.iter().chain(func.ty.results.iter()) {
                    scope.resolve(&p.ty, &mut problems);
                }
            }
        }
        problems
    }
}

/// Loads the unit in `dir`: every `*.go` file except tests, non-recursive.
pub fn load_dir(dir: &Path) -> Result<Unit, LoadError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| LoadError::Io {
            path: dir.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed")),
        })?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() && name.ends_with(".go") && !name.ends_with("_test.go") {
            paths.push(path.to_path_buf());
        }
    }
    if paths.is_empty() {
        return Err(LoadError::NoGoFiles(dir.to_path_buf()));
    }
    paths.sort();

    let mut contents = Vec::with_capacity(paths.len());
    for path in &paths {
        let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        contents.push((name, source));
    }
    debug!(dir = %dir.display(), files = contents.len(), "loading unit");

    let borrowed: Vec<(&str, &str)> = contents
        .iter()
        .map(|(n, s)| (n.as_str(), s.as_str()))
        .collect();
    Unit::from_sources(&borrowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_sources_orders_files() {
        let unit = Unit::from_sources(&[
            ("b.go", "package app\n\ntype B struct{}\n"),
            ("a.go", "package app\n\ntype A struct{}\n"),
        ])
        .unwrap();
        assert_eq!(unit.files[0].name, "a.go");
        assert_eq!(unit.base_location(), SourceLocation::new("a.go", 1, 9));
        assert!(unit.type_spec("B").is_some());
        assert_eq!(unit.digest().len(), 64);
    }

    #[test]
    fn test_multiple_packages_is_fatal() {
        let err = Unit::from_sources(&[
            ("a.go", "package app\n"),
            ("b.go", "package other\n"),
        ])
        .unwrap_err();
        assert!(matches!(err, LoadError::MultiplePackages { .. }));
        assert_eq!(err.location().unwrap().file, "b.go");
    }

    #[test]
    fn test_check_reports_duplicates_and_undefined() {
        let unit = Unit::from_sources(&[(
            "app.go",
            "package app\n\ntype A struct{ X Nope }\ntype A struct{}\n\nfunc (a A) M() {}\nfunc (a *A) M() {}\n",
        )])
        .unwrap();
        let messages: Vec<String> = unit.check().into_iter().map(|p| p.message).collect();
        assert_eq!(
            messages,
            vec![
                "undefined: Nope".to_string(),
                "A redeclared in this block (previous at app.go:3:6)".to_string(),
                "method A.M already declared at app.go:6:12".to_string(),
            ]
        );
    }

    #[test]
    fn test_underlying_follows_named_types() {
        let unit = Unit::from_sources(&[(
            "app.go",
            "package app\n\ntype S struct{ UserID string }\ntype T S\ntype U = T\n",
        )])
        .unwrap();
        let u = unit.underlying(&HostType::named("", "U"));
        assert!(matches!(u, HostType::Struct { ref fields } if fields[0].name == "UserID"));
        assert_eq!(unit.unalias(&HostType::named("", "U")), HostType::named("", "T"));
    }

    #[test]
    fn test_load_dir_skips_tests_and_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.go"), "package app\n").unwrap();
        fs::write(dir.path().join("app_test.go"), "package app_test\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let unit = load_dir(dir.path()).unwrap();
        assert_eq!(unit.files.len(), 1);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_dir(empty.path()),
            Err(LoadError::NoGoFiles(_))
        ));
    }
}
