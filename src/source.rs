//! Source positions shared by the front end, the model and diagnostics.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// A position in one source file. Lines and columns are 1-based; columns
/// count bytes. An empty `file` or a zero `line` means the position is
/// unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        !self.file.is_empty() && self.line > 0
    }

    /// Keeps only the base name of the file so that output does not depend
    /// on the directory the unit was loaded from.
    pub fn normalized(&self) -> Self {
        if !self.is_known() {
            return Self::unknown();
        }
        let base = Path::new(&self.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.clone());
        Self {
            file: base,
            line: self.line,
            column: self.column,
        }
    }

    /// Total order used for diagnostics: known positions first, then
    /// file name, line, column.
    pub fn cmp_positions(&self, other: &Self) -> Ordering {
        match (self.is_known(), other.is_known()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
            (true, true) => self
                .file
                .cmp(&other.file)
                .then(self.line.cmp(&other.line))
                .then(self.column.cmp(&other.column)),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "<unknown>")
        }
    }
}
