//! Error Collector
//!
//! Every validator reports through [`Diagnostics`]. Positions are reduced to
//! the file's base name on insertion and the list is put in its final order
//! by [`Diagnostics::finish`]: known positions first, then file, line,
//! column and insertion order.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::source::SourceLocation;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const E_LOAD: &str = "PA-E001";
pub const E_TYPE_CHECK: &str = "PA-E002";

pub const E_PAGE_NAME_INVALID: &str = "PA-E101";
pub const E_ACTION_NAME_INVALID: &str = "PA-E102";
pub const E_EVENT_HANDLER_NAME_INVALID: &str = "PA-E103";
pub const E_PAGE_MISSING_ROUTE_COMMENT: &str = "PA-E104";
pub const E_PAGE_INVALID_ROUTE_COMMENT: &str = "PA-E105";
pub const E_ACTION_MISSING_ROUTE_COMMENT: &str = "PA-E106";
pub const E_ACTION_INVALID_ROUTE_COMMENT: &str = "PA-E107";
pub const E_ACTION_ROUTE_NOT_UNDER_PAGE: &str = "PA-E108";
pub const E_EVENT_COMMENT_MISSING: &str = "PA-E109";
pub const E_EVENT_COMMENT_INVALID: &str = "PA-E110";
pub const E_EVENT_SUBJECT_INVALID: &str = "PA-E111";

pub const E_PAGE_MISSING_APP_FIELD: &str = "PA-E201";
pub const E_PAGE_HAS_EXTRA_FIELDS: &str = "PA-E202";
pub const E_EMBED_NOT_ABSTRACT: &str = "PA-E203";
pub const E_EVENT_FIELD_UNEXPORTED: &str = "PA-E204";
pub const E_EVENT_FIELD_MISSING_TAG: &str = "PA-E205";
pub const E_SESSION_NOT_STRUCT: &str = "PA-E206";
pub const E_SESSION_MISSING_USER_ID: &str = "PA-E207";
pub const E_INPUT_NOT_STRUCT: &str = "PA-E208";
pub const E_INPUT_FIELD_UNEXPORTED: &str = "PA-E209";
pub const E_INPUT_FIELD_MISSING_TAG: &str = "PA-E210";
pub const E_PATH_FIELD_NOT_STRING: &str = "PA-E211";
pub const E_DISPATCH_NOT_FUNC: &str = "PA-E212";
pub const E_DISPATCH_RESULT_COUNT: &str = "PA-E213";
pub const E_DISPATCH_MUST_RETURN_ERROR: &str = "PA-E214";
pub const E_DISPATCH_NO_PARAMS: &str = "PA-E215";

pub const E_MISSING_REQUEST: &str = "PA-E301";
pub const E_UNKNOWN_INPUT: &str = "PA-E302";
pub const E_INPUT_WRONG_TYPE: &str = "PA-E303";
pub const E_UNKNOWN_OUTPUT: &str = "PA-E304";
pub const E_OUTPUT_WRONG_TYPE: &str = "PA-E305";
pub const E_MULTIPLE_ERROR_RESULTS: &str = "PA-E306";
pub const E_GET_MISSING_BODY: &str = "PA-E307";
pub const E_GET_BODY_WRONG_NAME: &str = "PA-E308";
pub const E_GET_HEAD_WRONG_NAME: &str = "PA-E309";
pub const E_REDIRECT_STATUS_WITHOUT_REDIRECT: &str = "PA-E310";
pub const E_SESSION_OUTPUT_WITH_SSE: &str = "PA-E311";
pub const E_GET_ONLY_OUTPUT: &str = "PA-E312";
pub const E_EVENT_HANDLER_FIRST_ARG_NOT_EVENT: &str = "PA-E313";
pub const E_EVENT_HANDLER_FIRST_ARG_TYPE_NOT_EVENT: &str = "PA-E314";
pub const E_EVENT_HANDLER_SECOND_ARG_NOT_SSE: &str = "PA-E315";
pub const E_EVENT_HANDLER_RETURN_MUST_BE_ERROR: &str = "PA-E316";

pub const E_PATH_FIELD_NOT_IN_ROUTE: &str = "PA-E401";
pub const E_PATH_MISSING_ROUTE_VAR: &str = "PA-E402";
pub const E_DISPATCH_PARAM_NOT_EVENT: &str = "PA-E403";
pub const E_REFLECT_SIGNAL_NOT_IN_SIGNALS: &str = "PA-E404";

pub const E_CONFLICTING_GET_EMBED: &str = "PA-E501";
pub const E_CONFLICTING_EVENT_HANDLER_EMBED: &str = "PA-E502";
pub const E_DUPLICATE_EVENT_HANDLER: &str = "PA-E503";

pub const E_MISSING_APP: &str = "PA-E601";
pub const E_MISSING_PAGE_INDEX: &str = "PA-E602";
pub const E_PAGE_MISSING_GET: &str = "PA-E603";

/// Families of diagnostics. Only `Frontend` load failures and a missing App
/// suppress the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Family {
    Frontend,
    Naming,
    Shape,
    Signature,
    CrossReference,
    Composition,
    Structural,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisError {
    #[error("{message}")]
    Load { message: String },
    #[error("{message}")]
    TypeCheck { message: String },

    #[error("page type {page:?} has invalid name")]
    PageNameInvalid { page: String },
    #[error("action {receiver}.{method} has invalid name")]
    ActionNameInvalid { receiver: String, method: String },
    #[error("event handler {receiver}.{method} has invalid name")]
    EventHandlerNameInvalid { receiver: String, method: String },
    #[error("page {page} is missing path comment")]
    PageMissingRouteComment { page: String },
    #[error("page {page} has invalid path comment")]
    PageInvalidRouteComment { page: String },
    #[error("action handler {receiver}.{method} is missing path comment")]
    ActionMissingRouteComment { receiver: String, method: String },
    #[error("action handler {receiver}.{method} has invalid path comment")]
    ActionInvalidRouteComment { receiver: String, method: String },
    #[error("action handler {receiver}.{method} path {route:?} is not under page path {page_route:?}")]
    ActionRouteNotUnderPage {
        receiver: String,
        method: String,
        route: String,
        page_route: String,
    },
    #[error("event type {event} is missing subject comment")]
    EventCommentMissing { event: String },
    #[error("event type {event} has invalid subject comment")]
    EventCommentInvalid { event: String },
    #[error("event {event} subject is invalid")]
    EventSubjectInvalid { event: String },

    #[error("page {page} is missing the \"App *App\" field")]
    PageMissingAppField { page: String },
    #[error("page {page} has unsupported field {field:?}")]
    PageHasExtraFields { page: String, field: String },
    #[error("{owner} embeds {embedded}, which is not an abstract page")]
    EmbedNotAbstract { owner: String, embedded: String },
    #[error("event {event} field {field} must be exported")]
    EventFieldUnexported { event: String, field: String },
    #[error("event {event} field {field} must have json tag")]
    EventFieldMissingTag { event: String, field: String },
    #[error("type {session} must be a struct")]
    SessionNotStruct { session: String },
    #[error("type {session} is missing field {field}")]
    SessionMissingUserId { session: String, field: String },
    #[error("{receiver}.{method}: {input} parameter must be an anonymous struct")]
    InputNotStruct {
        receiver: String,
        method: String,
        input: String,
    },
    #[error("{receiver}.{method}: {input} field {field} must be exported")]
    InputFieldUnexported {
        receiver: String,
        method: String,
        input: String,
        field: String,
    },
    #[error("{receiver}.{method}: {input} field {field} must have a {tag} tag")]
    InputFieldMissingTag {
        receiver: String,
        method: String,
        input: String,
        field: String,
        tag: String,
    },
    #[error("{receiver}.{method}: path field {field} must be of type string")]
    PathFieldNotString {
        receiver: String,
        method: String,
        field: String,
    },
    #[error("{receiver}.{method}: dispatch parameter must be a function")]
    DispatchNotFunc { receiver: String, method: String },
    #[error("{receiver}.{method}: dispatch function must return exactly one value")]
    DispatchResultCount { receiver: String, method: String },
    #[error("{receiver}.{method}: dispatch function must return error")]
    DispatchMustReturnError { receiver: String, method: String },
    #[error("{receiver}.{method}: dispatch function must have at least one parameter")]
    DispatchNoParams { receiver: String, method: String },

    #[error("{receiver}.{method}: missing the *http.Request parameter")]
    MissingRequest { receiver: String, method: String },
    #[error("{receiver}.{method}: handler has unknown input parameter {input:?}")]
    UnknownInput {
        receiver: String,
        method: String,
        input: String,
    },
    #[error("{receiver}.{method}: input {input} must be of type {expected}")]
    InputWrongType {
        receiver: String,
        method: String,
        input: String,
        expected: String,
    },
    #[error("{receiver}.{method}: unknown output {output:?}")]
    UnknownOutput {
        receiver: String,
        method: String,
        output: String,
    },
    #[error("{receiver}.{method}: output {output} must be of type {expected}")]
    OutputWrongType {
        receiver: String,
        method: String,
        output: String,
        expected: String,
    },
    #[error("{receiver}.{method}: multiple error return values")]
    MultipleErrorResults { receiver: String, method: String },
    #[error("{receiver}.{method}: GET handler must return body")]
    GetMissingBody { receiver: String, method: String },
    #[error("{receiver}.{method}: first component result must be named body, found {found:?}")]
    GetBodyWrongName {
        receiver: String,
        method: String,
        found: String,
    },
    #[error("{receiver}.{method}: second component result must be named head, found {found:?}")]
    GetHeadWrongName {
        receiver: String,
        method: String,
        found: String,
    },
    #[error("{receiver}.{method}: redirectStatus requires redirect")]
    RedirectStatusWithoutRedirect { receiver: String, method: String },
    #[error("{receiver}.{method}: output {output} is incompatible with an SSE input")]
    SessionOutputWithSse {
        receiver: String,
        method: String,
        output: String,
    },
    #[error("{receiver}.{method}: output {output} is only allowed on GET handlers")]
    GetOnlyOutput {
        receiver: String,
        method: String,
        output: String,
    },
    #[error("{receiver}.{method}: first parameter must be named \"event\"")]
    EventHandlerFirstArgNotEvent { receiver: String, method: String },
    #[error("{receiver}.{method}: first parameter type {found} is not an event type")]
    EventHandlerFirstArgTypeNotEvent {
        receiver: String,
        method: String,
        found: String,
    },
    #[error("{receiver}.{method}: second parameter must be the SSE stream")]
    EventHandlerSecondArgNotSse { receiver: String, method: String },
    #[error("{receiver}.{method}: event handler must return exactly one error")]
    EventHandlerReturnMustBeError { receiver: String, method: String },

    #[error("{receiver}.{method}: path field tag {name:?} is not a route variable")]
    PathFieldNotInRoute {
        receiver: String,
        method: String,
        name: String,
    },
    #[error("{receiver}.{method}: route variable {name:?} has no path field")]
    PathMissingRouteVar {
        receiver: String,
        method: String,
        name: String,
    },
    #[error("{receiver}.{method}: dispatch parameter type {found} is not an event type")]
    DispatchParamNotEvent {
        receiver: String,
        method: String,
        found: String,
    },
    #[error("{receiver}.{method}: reflectsignal {signal:?} is not a field of signals")]
    ReflectSignalNotInSignals {
        receiver: String,
        method: String,
        signal: String,
    },

    #[error("conflicting GET handlers in embedded {owner} and {previous_owner} (previous at {previous})")]
    ConflictingGetEmbed {
        page: String,
        owner: String,
        previous_owner: String,
        previous: SourceLocation,
    },
    #[error("conflicting handlers for event {event} in embedded {owner} and {previous_owner} (previous at {previous})")]
    ConflictingEventHandlerEmbed {
        page: String,
        event: String,
        owner: String,
        previous_owner: String,
        previous: SourceLocation,
    },
    #[error("{receiver}.{method}: duplicate event handler for event {event} (previous at {previous})")]
    DuplicateEventHandler {
        receiver: String,
        method: String,
        event: String,
        previous: SourceLocation,
    },

    #[error("missing required type {name:?}")]
    MissingApp { name: String },
    #[error("missing required page type {name:?}")]
    MissingPageIndex { name: String },
    #[error("page {page} is missing the GET handler")]
    PageMissingGet { page: String },
}

impl AnalysisError {
    pub fn code(&self) -> &'static str {
        use AnalysisError::*;
        match self {
            Load { .. } => E_LOAD,
            TypeCheck { .. } => E_TYPE_CHECK,
            PageNameInvalid { .. } => E_PAGE_NAME_INVALID,
            ActionNameInvalid { .. } => E_ACTION_NAME_INVALID,
            EventHandlerNameInvalid { .. } => E_EVENT_HANDLER_NAME_INVALID,
            PageMissingRouteComment { .. } => E_PAGE_MISSING_ROUTE_COMMENT,
            PageInvalidRouteComment { .. } => E_PAGE_INVALID_ROUTE_COMMENT,
            ActionMissingRouteComment { .. } => E_ACTION_MISSING_ROUTE_COMMENT,
            ActionInvalidRouteComment { .. } => E_ACTION_INVALID_ROUTE_COMMENT,
            ActionRouteNotUnderPage { .. } => E_ACTION_ROUTE_NOT_UNDER_PAGE,
            EventCommentMissing { .. } => E_EVENT_COMMENT_MISSING,
            EventCommentInvalid { .. } => E_EVENT_COMMENT_INVALID,
            EventSubjectInvalid { .. } => E_EVENT_SUBJECT_INVALID,
            PageMissingAppField { .. } => E_PAGE_MISSING_APP_FIELD,
            PageHasExtraFields { .. } => E_PAGE_HAS_EXTRA_FIELDS,
            EmbedNotAbstract { .. } => E_EMBED_NOT_ABSTRACT,
            EventFieldUnexported { .. } => E_EVENT_FIELD_UNEXPORTED,
            EventFieldMissingTag { .. } => E_EVENT_FIELD_MISSING_TAG,
            SessionNotStruct { .. } => E_SESSION_NOT_STRUCT,
            SessionMissingUserId { .. } => E_SESSION_MISSING_USER_ID,
            InputNotStruct { .. } => E_INPUT_NOT_STRUCT,
            InputFieldUnexported { .. } => E_INPUT_FIELD_UNEXPORTED,
            InputFieldMissingTag { .. } => E_INPUT_FIELD_MISSING_TAG,
            PathFieldNotString { .. } => E_PATH_FIELD_NOT_STRING,
            DispatchNotFunc { .. } => E_DISPATCH_NOT_FUNC,
            DispatchResultCount { .. } => E_DISPATCH_RESULT_COUNT,
            DispatchMustReturnError { .. } => E_DISPATCH_MUST_RETURN_ERROR,
            DispatchNoParams { .. } => E_DISPATCH_NO_PARAMS,
            MissingRequest { .. } => E_MISSING_REQUEST,
            UnknownInput { .. } => E_UNKNOWN_INPUT,
            InputWrongType { .. } => E_INPUT_WRONG_TYPE,
            UnknownOutput { .. } => E_UNKNOWN_OUTPUT,
            OutputWrongType { .. } => E_OUTPUT_WRONG_TYPE,
            MultipleErrorResults { .. } => E_MULTIPLE_ERROR_RESULTS,
            GetMissingBody { .. } => E_GET_MISSING_BODY,
            GetBodyWrongName { .. } => E_GET_BODY_WRONG_NAME,
            GetHeadWrongName { .. } => E_GET_HEAD_WRONG_NAME,
            RedirectStatusWithoutRedirect { .. } => E_REDIRECT_STATUS_WITHOUT_REDIRECT,
            SessionOutputWithSse { .. } => E_SESSION_OUTPUT_WITH_SSE,
            GetOnlyOutput { .. } => E_GET_ONLY_OUTPUT,
            EventHandlerFirstArgNotEvent { .. } => E_EVENT_HANDLER_FIRST_ARG_NOT_EVENT,
            EventHandlerFirstArgTypeNotEvent { .. } => E_EVENT_HANDLER_FIRST_ARG_TYPE_NOT_EVENT,
            EventHandlerSecondArgNotSse { .. } => E_EVENT_HANDLER_SECOND_ARG_NOT_SSE,
            EventHandlerReturnMustBeError { .. } => E_EVENT_HANDLER_RETURN_MUST_BE_ERROR,
            PathFieldNotInRoute { .. } => E_PATH_FIELD_NOT_IN_ROUTE,
            PathMissingRouteVar { .. } => E_PATH_MISSING_ROUTE_VAR,
            DispatchParamNotEvent { .. } => E_DISPATCH_PARAM_NOT_EVENT,
            ReflectSignalNotInSignals { .. } => E_REFLECT_SIGNAL_NOT_IN_SIGNALS,
            ConflictingGetEmbed { .. } => E_CONFLICTING_GET_EMBED,
            ConflictingEventHandlerEmbed { .. } => E_CONFLICTING_EVENT_HANDLER_EMBED,
            DuplicateEventHandler { .. } => E_DUPLICATE_EVENT_HANDLER,
            MissingApp { .. } => E_MISSING_APP,
            MissingPageIndex { .. } => E_MISSING_PAGE_INDEX,
            PageMissingGet { .. } => E_PAGE_MISSING_GET,
        }
    }

    /// The family is encoded in the hundreds digit of the code.
    pub fn family(&self) -> Family {
        match self.code().as_bytes().get(4) {
            Some(b'1') => Family::Naming,
            Some(b'2') => Family::Shape,
            Some(b'3') => Family::Signature,
            Some(b'4') => Family::CrossReference,
            Some(b'5') => Family::Composition,
            Some(b'6') => Family::Structural,
            _ => Family::Frontend,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub location: SourceLocation,
    #[serde(skip)]
    pub seq: u64,
    pub code: &'static str,
    pub error: AnalysisError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at {}: {}", self.location, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    #[serde(skip)]
    next_seq: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: &SourceLocation, error: AnalysisError) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Diagnostic {
            location: location.normalized(),
            seq,
            code: error.code(),
            error,
        });
    }

    pub fn push_unknown(&mut self, error: AnalysisError) {
        self.push(&SourceLocation::unknown(), error);
    }

    /// Puts the entries in their final, stable order.
    pub fn finish(&mut self) {
        self.entries.sort_by(|a, b| {
            a.location
                .cmp_positions(&b.location)
                .then(a.seq.cmp(&b.seq))
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|d| d.code).collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.iter().any(|d| d.code == code)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}
