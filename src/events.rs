//! Event type rules: the subject comment, payload field shape and the
//! target-audience marker.

use std::collections::HashSet;

use crate::diagnostics::AnalysisError;
use crate::loader::Unit;
use crate::syntax::CommentGroup;
use crate::tags;
use crate::types::HostType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Valid(String),
    MissingComment,
    InvalidComment,
    InvalidSubject,
}

impl Subject {
    pub fn into_error(self, event: &str) -> Option<AnalysisError> {
        let event = event.to_string();
        match self {
            Subject::Valid(_) => None,
            Subject::MissingComment => Some(AnalysisError::EventCommentMissing { event }),
            Subject::InvalidComment => Some(AnalysisError::EventCommentInvalid { event }),
            Subject::InvalidSubject => Some(AnalysisError::EventSubjectInvalid { event }),
        }
    }
}

/// Reads `<Name> is "<subject>"` from the first doc line that starts with
/// the type name.
pub fn parse_subject(name: &str, doc: Option<&CommentGroup>) -> Subject {
    let doc = match doc {
        Some(d) => d,
        None => return Subject::MissingComment,
    };
    let prefix = format!("{} ", name);
    let want = format!("{} is ", name);
    for line in doc.text_lines() {
        let line = line.trim();
        if !line.starts_with(&prefix) {
            continue;
        }
        let rest = match line.strip_prefix(&want) {
            Some(r) => r.trim(),
            None => return Subject::InvalidComment,
        };
        return match rest
            .strip_prefix('"')
            .and_then(|r| r.strip_suffix('"'))
        {
            Some(subject) if !subject.is_empty() => Subject::Valid(subject.to_string()),
            _ => Subject::InvalidSubject,
        };
    }
    Subject::InvalidComment
}

/// Checks that every payload field, recursively through pointers and local
/// struct types, is exported and carries a `json` tag.
pub fn validate_fields(unit: &Unit, event: &str, ty: &HostType) -> Vec<AnalysisError> {
    let mut errors = Vec::new();
    let mut visited = HashSet::new();
    walk_fields(unit, event, ty, &mut visited, &mut errors);
    errors
}

fn walk_fields(
    unit: &Unit,
    event: &str,
    ty: &HostType,
    visited: &mut HashSet<String>,
    errors: &mut Vec<AnalysisError>,
) {
    if !visited.insert(ty.to_string()) {
        return;
    }
    let fields = match ty {
        HostType::Pointer { elem } => return walk_fields(unit, event, elem, visited, errors),
        HostType::Named { .. } => match unit.underlying(ty) {
            HostType::Struct { fields } => fields,
            _ => return,
        },
        HostType::Struct { fields } => fields.clone(),
        _ => return,
    };
    for field in &fields {
        if !field.is_exported() {
            errors.push(AnalysisError::EventFieldUnexported {
                event: event.to_string(),
                field: field.name.clone(),
            });
        }
        if tags::lookup(&field.tag, "json").is_none() {
            errors.push(AnalysisError::EventFieldMissingTag {
                event: event.to_string(),
                field: field.name.clone(),
            });
        }
        walk_fields(unit, event, &field.ty, visited, errors);
    }
}

/// An event addresses specific users when it has `<field> []string` tagged
/// `json:"-"`.
pub fn has_target_user_ids(unit: &Unit, ty: &HostType, field_name: &str) -> bool {
    let HostType::Struct { fields } = unit.underlying(ty) else {
        return false;
    };
    fields.iter().any(|f| {
        f.name == field_name
            && matches!(&f.ty, HostType::Slice { elem } if elem.is_basic("string"))
            && tags::lookup(&f.tag, "json").as_deref() == Some("-")
    })
}
