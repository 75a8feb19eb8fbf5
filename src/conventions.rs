//! Naming conventions as data.
//!
//! [`Conventions`] holds the vocabulary the framework recognizes: type names,
//! prefixes, verbs and host type identities. [`Grammar`] compiles it into
//! patterns once, after which classification is a pure function of the
//! declared name.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::HostType;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED VOCABULARY
// ═══════════════════════════════════════════════════════════════════════════════

pub const PARAM_SESSION_TOKEN: &str = "sessionToken";
pub const PARAM_SESSION: &str = "session";
pub const PARAM_PATH: &str = "path";
pub const PARAM_QUERY: &str = "query";
pub const PARAM_SIGNALS: &str = "signals";
pub const PARAM_DISPATCH: &str = "dispatch";
pub const PARAM_EVENT: &str = "event";

pub const OUT_ERR: &str = "err";
pub const OUT_BODY: &str = "body";
pub const OUT_HEAD: &str = "head";
pub const OUT_REDIRECT: &str = "redirect";
pub const OUT_REDIRECT_STATUS: &str = "redirectStatus";
pub const OUT_NEW_SESSION: &str = "newSession";
pub const OUT_CLOSE_SESSION: &str = "closeSession";
pub const OUT_ENABLE_BACKGROUND_STREAMING: &str = "enableBackgroundStreaming";
pub const OUT_DISABLE_REFRESH_AFTER_HIDDEN: &str = "disableRefreshAfterHidden";

pub const TAG_PATH: &str = "path";
pub const TAG_QUERY: &str = "query";
pub const TAG_JSON: &str = "json";
pub const TAG_REFLECT_SIGNAL: &str = "reflectsignal";

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// A type identified by import path and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedType {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub pointer: bool,
}

impl QualifiedType {
    fn new(package: &str, name: &str, pointer: bool) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            pointer,
        }
    }

    pub fn matches(&self, ty: &HostType) -> bool {
        match (self.pointer, ty) {
            (true, HostType::Pointer { elem }) => elem.is_named(&self.package, &self.name),
            (false, other) => other.is_named(&self.package, &self.name),
            _ => false,
        }
    }

    pub fn to_host_type(&self) -> HostType {
        let named = HostType::named(&self.package, &self.name);
        if self.pointer {
            HostType::pointer(named)
        } else {
            named
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conventions {
    pub app_type: String,
    pub session_type: String,
    pub session_user_field: String,
    pub page_prefix: String,
    pub event_prefix: String,
    pub event_handler_prefix: String,
    pub get_method: String,
    pub action_verbs: Vec<String>,
    pub index_page: String,
    pub error404_page: String,
    pub error500_page: String,
    pub head_hook: String,
    pub recover500_hook: String,
    pub target_user_ids_field: String,
    pub request_type: QualifiedType,
    pub sse_type: QualifiedType,
    pub component_type: QualifiedType,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            app_type: "App".to_string(),
            session_type: "Session".to_string(),
            session_user_field: "UserID".to_string(),
            page_prefix: "Page".to_string(),
            event_prefix: "Event".to_string(),
            event_handler_prefix: "On".to_string(),
            get_method: "GET".to_string(),
            action_verbs: vec!["POST".to_string(), "PUT".to_string(), "DELETE".to_string()],
            index_page: "PageIndex".to_string(),
            error404_page: "PageError404".to_string(),
            error500_page: "PageError500".to_string(),
            head_hook: "Head".to_string(),
            recover500_hook: "Recover500".to_string(),
            target_user_ids_field: "TargetUserIDs".to_string(),
            request_type: QualifiedType::new("net/http", "Request", true),
            sse_type: QualifiedType::new(
                "github.com/starfederation/datastar-go/datastar",
                "ServerSentEventGenerator",
                true,
            ),
            component_type: QualifiedType::new("github.com/a-h/templ", "Component", false),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConventionsError {
    #[error("reading conventions file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing conventions file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Conventions {
    /// Loads conventions from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConventionsError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConventionsError> {
        Ok(serde_json::from_str(data)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// What a method name means to the framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    Get,
    /// `verb` is the configured prefix, `suffix` the rest of the name.
    Action { verb: String, suffix: String },
    EventHandler { suffix: String },
    Ignored,
}

/// What a declared type name means, before shape checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    App,
    Session,
    Event,
    Page,
    Other,
}

/// Compiled name patterns.
#[derive(Debug, Clone)]
pub struct Grammar {
    conventions: Conventions,
    page: Regex,
    event: Regex,
    event_handler: Regex,
    actions: Vec<(String, Regex)>,
}

fn prefixed(prefix: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^{}[A-Z][A-Za-z0-9]*$", regex::escape(prefix)))
}

impl Grammar {
    pub fn new(conventions: Conventions) -> Result<Self, ConventionsError> {
        let mut actions = Vec::new();
        for verb in &conventions.action_verbs {
            actions.push((verb.clone(), prefixed(verb)?));
        }
        // Longer verbs first so that a verb that prefixes another never
        // claims its names.
        actions.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Ok(Self {
            page: prefixed(&conventions.page_prefix)?,
            event: prefixed(&conventions.event_prefix)?,
            event_handler: prefixed(&conventions.event_handler_prefix)?,
            actions,
            conventions,
        })
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    pub fn is_valid_page_name(&self, name: &str) -> bool {
        self.page.is_match(name)
    }

    pub fn is_valid_event_name(&self, name: &str) -> bool {
        self.event.is_match(name)
    }

    pub fn is_valid_event_handler_name(&self, name: &str) -> bool {
        self.event_handler.is_match(name)
    }

    pub fn is_valid_action_name(&self, verb: &str, name: &str) -> bool {
        self.actions
            .iter()
            .find(|(v, _)| v == verb)
            .map_or(false, |(_, re)| re.is_match(name))
    }

    pub fn classify_type_name(&self, name: &str) -> NameKind {
        let c = &self.conventions;
        if name == c.app_type {
            NameKind::App
        } else if name == c.session_type {
            NameKind::Session
        } else if name.starts_with(&c.event_prefix) {
            NameKind::Event
        } else if name.starts_with(&c.page_prefix) {
            NameKind::Page
        } else {
            NameKind::Other
        }
    }

    /// Classifies a method name. Names not starting with an uppercase ASCII
    /// letter are never reserved.
    pub fn classify_method(&self, name: &str) -> MethodKind {
        if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            return MethodKind::Ignored;
        }
        let c = &self.conventions;
        if name == c.get_method {
            return MethodKind::Get;
        }
        for (verb, _) in &self.actions {
            if let Some(rest) = name.strip_prefix(verb.as_str()) {
                return MethodKind::Action {
                    verb: verb.clone(),
                    suffix: rest.to_string(),
                };
            }
        }
        if let Some(rest) = name.strip_prefix(c.event_handler_prefix.as_str()) {
            return MethodKind::EventHandler {
                suffix: rest.to_string(),
            };
        }
        MethodKind::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> Grammar {
        Grammar::new(Conventions::default()).unwrap()
    }

    #[test]
    fn test_page_name_grammar() {
        let g = grammar();
        assert!(g.is_valid_page_name("PageIndex"));
        assert!(g.is_valid_page_name("PageA1"));
        assert!(!g.is_valid_page_name("Page"));
        assert!(!g.is_valid_page_name("Pagelower"));
        assert!(!g.is_valid_page_name("Page_X"));
        assert!(!g.is_valid_page_name("PageÄrger"));
        assert!(!g.is_valid_page_name("PageA b"));
    }

    #[test]
    fn test_classify_method() {
        let g = grammar();
        assert_eq!(g.classify_method("GET"), MethodKind::Get);
        assert_eq!(
            g.classify_method("POSTSave"),
            MethodKind::Action {
                verb: "POST".into(),
                suffix: "Save".into()
            }
        );
        assert_eq!(
            g.classify_method("DELETE"),
            MethodKind::Action {
                verb: "DELETE".into(),
                suffix: String::new()
            }
        );
        assert_eq!(
            g.classify_method("OnThing"),
            MethodKind::EventHandler {
                suffix: "Thing".into()
            }
        );
        assert_eq!(g.classify_method("HEAD"), MethodKind::Ignored);
        assert_eq!(g.classify_method("GETX"), MethodKind::Ignored);
        assert_eq!(g.classify_method("onThing"), MethodKind::Ignored);
        assert_eq!(g.classify_method("helper"), MethodKind::Ignored);
        assert!(!g.is_valid_action_name("DELETE", "DELETE"));
        assert!(g.is_valid_action_name("PUT", "PUTItem"));
    }

    #[test]
    fn test_classify_type_name() {
        let g = grammar();
        assert_eq!(g.classify_type_name("App"), NameKind::App);
        assert_eq!(g.classify_type_name("Session"), NameKind::Session);
        assert_eq!(g.classify_type_name("EventFoo"), NameKind::Event);
        assert_eq!(g.classify_type_name("PageFoo"), NameKind::Page);
        assert_eq!(g.classify_type_name("Base"), NameKind::Other);
    }

    #[test]
    fn test_conventions_from_json_keeps_defaults() {
        let c = Conventions::from_json_str(r#"{"pagePrefix": "View", "actionVerbs": ["POST"]}"#)
            .unwrap();
        assert_eq!(c.page_prefix, "View");
        assert_eq!(c.app_type, "App");
        let g = Grammar::new(c).unwrap();
        assert!(g.is_valid_page_name("ViewHome"));
        assert_eq!(g.classify_method("PUTX"), MethodKind::Ignored);
    }

    #[test]
    fn test_host_identity_matching() {
        let c = Conventions::default();
        let req = HostType::pointer(HostType::named("net/http", "Request"));
        assert!(c.request_type.matches(&req));
        assert!(!c.request_type.matches(&HostType::named("net/http", "Request")));
        assert!(c
            .component_type
            .matches(&HostType::named("github.com/a-h/templ", "Component")));
        assert_eq!(c.sse_type.to_host_type().to_string(), "*github.com/starfederation/datastar-go/datastar.ServerSentEventGenerator");
    }
}
