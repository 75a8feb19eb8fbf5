//! Shape rules for the structured handler parameters: `path`, `query`,
//! `signals` and `dispatch`.

use crate::conventions::{PARAM_PATH, PARAM_QUERY, PARAM_SIGNALS, TAG_JSON, TAG_PATH, TAG_QUERY};
use crate::diagnostics::AnalysisError;
use crate::loader::Unit;
use crate::syntax::TypeExpr;
use crate::tags;
use crate::types::HostType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructParam {
    Path,
    Query,
    Signals,
}

impl StructParam {
    pub fn param_name(&self) -> &'static str {
        match self {
            StructParam::Path => PARAM_PATH,
            StructParam::Query => PARAM_QUERY,
            StructParam::Signals => PARAM_SIGNALS,
        }
    }

    pub fn tag_key(&self) -> &'static str {
        match self {
            StructParam::Path => TAG_PATH,
            StructParam::Query => TAG_QUERY,
            StructParam::Signals => TAG_JSON,
        }
    }
}

/// Validates an anonymous struct parameter field by field and returns the
/// first violation.
pub fn validate_struct_param(
    unit: &Unit,
    kind: StructParam,
    expr: &TypeExpr,
    ty: &HostType,
    receiver: &str,
    method: &str,
) -> Result<(), AnalysisError> {
    let fields = match (expr, ty) {
        (TypeExpr::Struct(_), HostType::Struct { fields }) => fields,
        _ => {
            return Err(AnalysisError::InputNotStruct {
                receiver: receiver.to_string(),
                method: method.to_string(),
                input: kind.param_name().to_string(),
            })
        }
    };
    for field in fields {
        if !field.is_exported() {
            return Err(AnalysisError::InputFieldUnexported {
                receiver: receiver.to_string(),
                method: method.to_string(),
                input: kind.param_name().to_string(),
                field: field.name.clone(),
            });
        }
        if kind == StructParam::Path && !unit.is_basic_underlying(&field.ty, "string") {
            return Err(AnalysisError::PathFieldNotString {
                receiver: receiver.to_string(),
                method: method.to_string(),
                field: field.name.clone(),
            });
        }
        if tags::lookup(&field.tag, kind.tag_key()).is_none() {
            return Err(AnalysisError::InputFieldMissingTag {
                receiver: receiver.to_string(),
                method: method.to_string(),
                input: kind.param_name().to_string(),
                field: field.name.clone(),
                tag: kind.tag_key().to_string(),
            });
        }
    }
    Ok(())
}

/// Validates the dispatch function type and returns its parameter types.
pub fn validate_dispatch(
    ty: &HostType,
    receiver: &str,
    method: &str,
) -> Result<Vec<HostType>, AnalysisError> {
    let (params, results) = match ty {
        HostType::Func {
            params, results, ..
        } => (params, results),
        _ => {
            return Err(AnalysisError::DispatchNotFunc {
                receiver: receiver.to_string(),
                method: method.to_string(),
            })
        }
    };
    if results.len() != 1 {
        return Err(AnalysisError::DispatchResultCount {
            receiver: receiver.to_string(),
            method: method.to_string(),
        });
    }
    if !results[0].is_error() {
        return Err(AnalysisError::DispatchMustReturnError {
            receiver: receiver.to_string(),
            method: method.to_string(),
        });
    }
    if params.is_empty() {
        return Err(AnalysisError::DispatchNoParams {
            receiver: receiver.to_string(),
            method: method.to_string(),
        });
    }
    Ok(params.clone())
}

/// Fields of a resolved struct with their value for `key`, skipping fields
/// whose value is missing or empty.
pub fn tagged_values(ty: &HostType, key: &str) -> Vec<String> {
    match ty {
        HostType::Struct { fields } => fields
            .iter()
            .filter_map(|f| tags::name(&f.tag, key))
            .filter(|v| !v.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
