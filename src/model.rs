//! App Model
//!
//! The validated description of an application handed to code generators.
//! Every node records the source location of the declaration it came from.
//! The model serializes to camelCase JSON.

use serde::{Deserialize, Serialize};

use crate::conventions::HttpMethod;
use crate::source::SourceLocation;
use crate::types::{HostType, StructField};

// ═══════════════════════════════════════════════════════════════════════════════
// SLOTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A resolved type together with the source expression it was written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub resolved: HostType,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerInputs {
    pub request: Option<Input>,
    pub sse: Option<Input>,
    pub session_token: Option<Input>,
    pub session: Option<Input>,
    pub path: Option<Input>,
    pub query: Option<Input>,
    pub signals: Option<Input>,
    pub dispatch: Option<Input>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerOutputs {
    pub err: Option<Output>,
    pub body: Option<Output>,
    pub head: Option<Output>,
    pub redirect: Option<Output>,
    pub redirect_status: Option<Output>,
    pub new_session: Option<Output>,
    pub close_session: Option<Output>,
    pub enable_background_streaming: Option<Output>,
    pub disable_refresh_after_hidden: Option<Output>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    pub method: HttpMethod,
    /// Declared method name, e.g. `GET` or `POSTSave`.
    pub method_name: String,
    /// The part after the verb; empty for GET.
    pub name: String,
    pub route: String,
    pub location: SourceLocation,
    /// Abstract page the handler was inherited from.
    pub inherited_from: Option<String>,
    pub inputs: HandlerInputs,
    pub outputs: HandlerOutputs,
    /// Event type names the dispatch function accepts.
    pub dispatched_events: Vec<String>,
    pub plugin_inputs: Vec<Input>,
    pub plugin_outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub method_name: String,
    pub name: String,
    pub event_type: String,
    pub location: SourceLocation,
    pub inherited_from: Option<String>,
    pub event: Option<Input>,
    pub sse: Option<Input>,
    pub session_token: Option<Input>,
    pub session: Option<Input>,
    pub err: Option<Output>,
    pub plugin_inputs: Vec<Input>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAGES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageKind {
    Ordinary,
    Index,
    Error404,
    Error500,
}

/// A reference to an embedded abstract page, located at the embed site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedRef {
    pub type_name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub type_name: String,
    pub route: String,
    pub kind: PageKind,
    pub location: SourceLocation,
    pub get: Option<Handler>,
    pub actions: Vec<Handler>,
    pub event_handlers: Vec<EventHandler>,
    pub embeds: Vec<EmbedRef>,
}

impl Page {
    pub fn action(&self, method_name: &str) -> Option<&Handler> {
        self.actions.iter().find(|a| a.method_name == method_name)
    }

    pub fn event_handler_for(&self, event_type: &str) -> Option<&EventHandler> {
        self.event_handlers
            .iter()
            .find(|h| h.event_type == event_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractPage {
    pub type_name: String,
    pub location: SourceLocation,
    pub get: Option<Handler>,
    pub actions: Vec<Handler>,
    pub event_handlers: Vec<EventHandler>,
    pub embeds: Vec<EmbedRef>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// APP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub type_name: String,
    pub subject: String,
    pub has_target_user_ids: bool,
    pub location: SourceLocation,
}

/// An application-wide method such as `Head` or `Recover500`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub name: String,
    pub location: SourceLocation,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionShape {
    pub type_name: String,
    pub location: SourceLocation,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub package: String,
    pub source_digest: String,
    pub location: SourceLocation,
    pub session: Option<SessionShape>,
    pub head: Option<Hook>,
    pub recover500: Option<Hook>,
    pub pages: Vec<Page>,
    pub abstract_pages: Vec<AbstractPage>,
    pub events: Vec<Event>,
}

impl App {
    pub fn page(&self, type_name: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.type_name == type_name)
    }

    pub fn abstract_page(&self, type_name: &str) -> Option<&AbstractPage> {
        self.abstract_pages
            .iter()
            .find(|p| p.type_name == type_name)
    }

    pub fn event(&self, type_name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.type_name == type_name)
    }

    fn page_of_kind(&self, kind: PageKind) -> Option<&Page> {
        self.pages.iter().find(|p| p.kind == kind)
    }

    pub fn index_page(&self) -> Option<&Page> {
        self.page_of_kind(PageKind::Index)
    }

    pub fn error404_page(&self) -> Option<&Page> {
        self.page_of_kind(PageKind::Error404)
    }

    pub fn error500_page(&self) -> Option<&Page> {
        self.page_of_kind(PageKind::Error500)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
