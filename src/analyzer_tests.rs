use std::fs;
use std::path::PathBuf;

use crate::diagnostics::*;
use crate::model::{Input, Output, PageKind, TypeRef};
use crate::plugin::{EventHandlerPluginContext, Plugin, PluginContext};
use crate::types::HostType;
use crate::{Analysis, Analyzer, SourceLocation};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn analyze(name: &str) -> Analysis {
    Analyzer::new().analyze(fixture(name))
}

fn lines(analysis: &Analysis) -> Vec<u32> {
    analysis.diagnostics.iter().map(|d| d.location.line).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLEAN UNITS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_minimal_app() {
    let analysis = analyze("minimal");
    assert!(analysis.is_clean(), "{}", analysis.diagnostics);
    let app = analysis.app.unwrap();
    assert_eq!(app.package, "app");
    assert_eq!(app.pages.len(), 1);
    let index = app.index_page().unwrap();
    assert_eq!(index.route, "/");
    assert_eq!(index.kind, PageKind::Index);
    let get = index.get.as_ref().unwrap();
    assert!(get.inputs.request.is_some());
    assert!(get.outputs.body.is_some() && get.outputs.err.is_some());
    assert_eq!(app.source_digest.len(), 64);
}

#[test]
fn test_basic_app_hooks_and_special_pages() {
    let analysis = analyze("basic");
    assert!(analysis.is_clean(), "{}", analysis.diagnostics);
    let app = analysis.app.unwrap();

    let head = app.head.as_ref().unwrap();
    assert_eq!(head.inputs.len(), 1);
    assert_eq!(head.outputs.len(), 2);
    let recover = app.recover500.as_ref().unwrap();
    assert_eq!(recover.inputs[0].name, "err");

    assert_eq!(app.error404_page().unwrap().route, "/not-found");
    assert_eq!(app.error500_page().unwrap().route, "/internal-error");
    let example = app.page("PageExample").unwrap();
    assert_eq!(example.kind, PageKind::Ordinary);
    let outputs = &example.get.as_ref().unwrap().outputs;
    assert!(outputs.body.is_some() && outputs.head.is_some());

    let names: Vec<&str> = app.pages.iter().map(|p| p.type_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["PageError404", "PageError500", "PageExample", "PageIndex"]
    );
}

#[test]
fn test_session_across_files() {
    let analysis = analyze("session");
    assert!(analysis.is_clean(), "{}", analysis.diagnostics);
    let app = analysis.app.unwrap();

    let session = app.session.as_ref().unwrap();
    assert_eq!(session.type_name, "Session");
    assert_eq!(session.location.file, "session.go");
    assert_eq!(session.fields.len(), 2);

    let index = app.index_page().unwrap();
    assert!(index.get.as_ref().unwrap().inputs.session.is_some());
    let login = index.action("POSTLogin").unwrap();
    assert_eq!(login.route, "/login");
    assert!(login.inputs.session_token.is_some());
    assert!(login.outputs.new_session.is_some());
    assert!(login.outputs.redirect_status.is_some());
    let logout = index.action("POSTLogout").unwrap();
    assert!(logout.outputs.close_session.is_some());
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPOSITION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_embed_flattening() {
    let analysis = analyze("embed");
    assert!(analysis.is_clean(), "{}", analysis.diagnostics);
    let app = analysis.app.unwrap();

    let abstract_names: Vec<&str> = app
        .abstract_pages
        .iter()
        .map(|a| a.type_name.as_str())
        .collect();
    assert_eq!(abstract_names, vec!["Framed", "Layout", "Ticker"]);

    let concrete = app.page("PageConcrete").unwrap();
    let get = concrete.get.as_ref().unwrap();
    assert_eq!(get.inherited_from.as_deref(), Some("Layout"));
    assert_eq!(get.route, "/concrete");
    assert_eq!(concrete.event_handlers.len(), 3);
    assert!(concrete.event_handler_for("EventC").unwrap().inherited_from.is_none());
    assert_eq!(
        concrete.event_handler_for("EventB").unwrap().inherited_from.as_deref(),
        Some("Framed")
    );
    assert_eq!(
        concrete.event_handler_for("EventA").unwrap().inherited_from.as_deref(),
        Some("Layout")
    );

    let overridden = app.page("PageOverride").unwrap();
    assert!(overridden.get.as_ref().unwrap().inherited_from.is_none());
    assert_eq!(overridden.event_handlers.len(), 1);
    assert!(overridden.event_handlers[0].inherited_from.is_none());

    let by_event = app.page("PageOverrideEvent").unwrap();
    assert_eq!(by_event.event_handlers.len(), 1);
    assert_eq!(by_event.event_handlers[0].method_name, "OnNewA");

    let multi = app.page("PageMulti").unwrap();
    assert_eq!(
        multi.get.as_ref().unwrap().inherited_from.as_deref(),
        Some("Layout")
    );
    assert_eq!(
        multi.event_handler_for("EventD").unwrap().inherited_from.as_deref(),
        Some("Ticker")
    );
    assert_eq!(multi.embeds.len(), 2);

    // Abstract pages keep only their own handlers.
    let framed = app.abstract_page("Framed").unwrap();
    assert_eq!(framed.event_handlers.len(), 1);
    assert!(framed.get.is_none());
}

#[test]
fn test_conflicting_get_embed_anchored_at_second_embed() {
    let analysis = analyze("err_embed_conflicting_get");
    assert_eq!(analysis.diagnostics.codes(), vec![E_CONFLICTING_GET_EMBED]);
    let d = &analysis.diagnostics.entries()[0];
    assert_eq!(d.location.file, "app.go");
    assert_eq!(d.location.line, 15);
    match &d.error {
        AnalysisError::ConflictingGetEmbed {
            page,
            owner,
            previous_owner,
            previous,
        } => {
            assert_eq!(page, "PageIndex");
            assert_eq!(owner, "BaseB");
            assert_eq!(previous_owner, "BaseA");
            assert_eq!(previous.line, 14);
        }
        other => panic!("unexpected {:?}", other),
    }

    // The model survives composition errors.
    let app = analysis.app.unwrap();
    let get = app.index_page().unwrap().get.as_ref().unwrap();
    assert_eq!(get.inherited_from.as_deref(), Some("BaseA"));
}

#[test]
fn test_embedding_a_non_abstract_type() {
    let src = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
)

type App struct{}

type Plain struct{ Name string }

// PageIndex is /
type PageIndex struct {
	App *App
	Plain
}

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }
"#;
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert_eq!(analysis.diagnostics.codes(), vec![E_EMBED_NOT_ABSTRACT]);
    assert_eq!(lines(&analysis), vec![16]);
    assert!(analysis.app.unwrap().index_page().unwrap().embeds.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTES, PARAMETERS, REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_path_errors() {
    let analysis = analyze("err_path");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_INPUT_NOT_STRUCT,
            E_PATH_FIELD_NOT_STRING,
            E_INPUT_FIELD_MISSING_TAG,
            E_PATH_FIELD_NOT_IN_ROUTE,
            E_PATH_MISSING_ROUTE_VAR,
        ],
        "{}",
        analysis.diagnostics
    );
    let app = analysis.app.unwrap();
    let wildcard = app.page("PageWildcard").unwrap();
    assert_eq!(wildcard.route, "/files/{dir}/{rest...}");
    assert!(wildcard.get.as_ref().unwrap().inputs.path.is_some());
}

#[test]
fn test_action_routes() {
    let analysis = analyze("actions");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_ACTION_ROUTE_NOT_UNDER_PAGE,
            E_ACTION_MISSING_ROUTE_COMMENT,
            E_ACTION_INVALID_ROUTE_COMMENT,
        ],
        "{}",
        analysis.diagnostics
    );
    let app = analysis.app.unwrap();
    let item = app.page("PageItem").unwrap();
    assert_eq!(item.route, "/items/{id}");

    let save = item.action("POSTSave").unwrap();
    assert_eq!(save.route, "/items/{id}/save");
    assert_eq!(save.name, "Save");
    assert!(save.inputs.sse.is_some() && save.inputs.path.is_some());

    let remove = item.action("DELETERemove").unwrap();
    assert_eq!(remove.route, "/items/{id}");
    assert!(remove.outputs.redirect.is_some());

    // Unexported helpers are not handlers.
    assert_eq!(item.actions.len(), 5);
    assert!(item.action("helper").is_none());
}

#[test]
fn test_signals_and_reflected_query() {
    let analysis = analyze("signals");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_REFLECT_SIGNAL_NOT_IN_SIGNALS,
            E_REFLECT_SIGNAL_NOT_IN_SIGNALS,
            E_INPUT_FIELD_MISSING_TAG,
        ],
        "{}",
        analysis.diagnostics
    );
    let app = analysis.app.unwrap();
    let get = app.index_page().unwrap().get.as_ref().unwrap();
    assert!(get.inputs.query.is_some() && get.inputs.signals.is_some());
}

#[test]
fn test_dispatch() {
    let analysis = analyze("dispatch");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_DISPATCH_PARAM_NOT_EVENT,
            E_DISPATCH_RESULT_COUNT,
            E_DISPATCH_NOT_FUNC,
        ],
        "{}",
        analysis.diagnostics
    );
    match &analysis.diagnostics.entries()[0].error {
        AnalysisError::DispatchParamNotEvent { found, .. } => assert_eq!(found, "NotAnEvent"),
        other => panic!("unexpected {:?}", other),
    }

    let app = analysis.app.unwrap();
    let create = app.index_page().unwrap().action("POSTCreate").unwrap();
    assert_eq!(create.dispatched_events, vec!["EventCreated", "EventDeleted"]);

    let created = app.event("EventCreated").unwrap();
    assert_eq!(created.subject, "items.created");
    assert!(created.has_target_user_ids);
    assert!(!app.event("EventDeleted").unwrap().has_target_user_ids);
    assert!(app.event("NotAnEvent").is_none());
}

#[test]
fn test_signature_errors() {
    let analysis = analyze("err_signatures");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_ACTION_NAME_INVALID,
            E_EVENT_HANDLER_NAME_INVALID,
            E_INPUT_WRONG_TYPE,
            E_REDIRECT_STATUS_WITHOUT_REDIRECT,
            E_EVENT_HANDLER_FIRST_ARG_NOT_EVENT,
            E_EVENT_HANDLER_RETURN_MUST_BE_ERROR,
        ],
        "{}",
        analysis.diagnostics
    );
    assert_eq!(lines(&analysis), vec![29, 33, 41, 46, 60, 60]);
    match &analysis.diagnostics.entries()[2].error {
        AnalysisError::InputWrongType { input, expected, .. } => {
            assert_eq!(input, "sessionToken");
            assert_eq!(expected, "string");
        }
        other => panic!("unexpected {:?}", other),
    }

    // Badly named handlers are still attached.
    let app = analysis.app.unwrap();
    let index = app.index_page().unwrap();
    assert_eq!(index.action("POSTsave").unwrap().route, "/save");
    assert_eq!(index.event_handlers.len(), 1);
    assert_eq!(index.event_handlers[0].method_name, "Onthing");

    // Named types count by their underlying type.
    let slug = index.action("POSTSlug").unwrap();
    assert!(slug.inputs.path.is_some());
    assert!(slug.outputs.redirect.is_some() && slug.outputs.redirect_status.is_some());
}

#[test]
fn test_inherited_handler_with_an_owned_method_name_is_dropped() {
    let src = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
	"github.com/starfederation/datastar-go/datastar"
)

type App struct{}

// EventA is "a"
type EventA struct {
	ID string `json:"id"`
}

// EventB is "b"
type EventB struct {
	ID string `json:"id"`
}

type Base struct{ App *App }

func (Base) OnUpdate(event EventB, sse *datastar.ServerSentEventGenerator) error { return nil }

// PageIndex is /
type PageIndex struct {
	App *App
	Base
}

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }

func (PageIndex) OnUpdate(event EventA, sse *datastar.ServerSentEventGenerator) error { return nil }
"#;
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert!(analysis.is_clean(), "{}", analysis.diagnostics);
    let app = analysis.app.unwrap();
    let index = app.index_page().unwrap();
    assert_eq!(index.event_handlers.len(), 1);
    let own = &index.event_handlers[0];
    assert_eq!(own.event_type, "EventA");
    assert!(own.inherited_from.is_none());
    assert!(index.event_handler_for("EventB").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_event_errors() {
    let analysis = analyze("err_events");
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_EVENT_COMMENT_MISSING,
            E_EVENT_SUBJECT_INVALID,
            E_EVENT_COMMENT_INVALID,
            E_EVENT_FIELD_UNEXPORTED,
            E_EVENT_FIELD_MISSING_TAG,
            E_EVENT_HANDLER_FIRST_ARG_NOT_EVENT,
            E_EVENT_HANDLER_FIRST_ARG_TYPE_NOT_EVENT,
            E_DUPLICATE_EVENT_HANDLER,
        ],
        "{}",
        analysis.diagnostics
    );

    let duplicate = analysis.diagnostics.entries().last().unwrap();
    match &duplicate.error {
        AnalysisError::DuplicateEventHandler {
            method,
            event,
            previous,
            ..
        } => {
            assert_eq!(method, "OnSecond");
            assert_eq!(event, "EventFoo");
            assert!(previous.line < duplicate.location.line);
        }
        other => panic!("unexpected {:?}", other),
    }

    let app = analysis.app.unwrap();
    let events: Vec<&str> = app.events.iter().map(|e| e.type_name.as_str()).collect();
    assert_eq!(events, vec!["EventFoo", "EventMissingTag", "EventUnexported"]);
    assert!(app.event("EventFoo").unwrap().has_target_user_ids);

    let page = app.page("PageEventTest").unwrap();
    assert_eq!(page.event_handlers.len(), 1);
    assert_eq!(page.event_handlers[0].method_name, "OnFirst");
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURAL
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_app_and_index() {
    let analysis = analyze("no_app");
    assert!(analysis.app.is_none());
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![E_MISSING_APP, E_MISSING_PAGE_INDEX]
    );
    for d in analysis.diagnostics.iter() {
        assert_eq!(d.location, SourceLocation::new("app.go", 1, 9));
    }
}

#[test]
fn test_page_rules() {
    let src = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
)

type App struct{}

// PageIndex is /
type PageIndex struct {
	App   *App
	Extra string
}

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }

type PageNoComment struct{ App *App }

func (PageNoComment) GET(r *http.Request) (body templ.Component, err error) { return }

// Pagelower is /lower
type Pagelower struct{}
"#;
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![
            E_PAGE_HAS_EXTRA_FIELDS,
            E_PAGE_MISSING_ROUTE_COMMENT,
            E_PAGE_NAME_INVALID,
            E_PAGE_MISSING_APP_FIELD,
            E_PAGE_MISSING_GET,
        ],
        "{}",
        analysis.diagnostics
    );
    assert_eq!(lines(&analysis), vec![14, 19, 24, 24, 24]);
}

#[test]
fn test_invalid_page_route_comment() {
    let src = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
)

type App struct{}

// PageIndex is /
type PageIndex struct{ App *App }

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }

// PageAbout lives at /about
type PageAbout struct{ App *App }

func (PageAbout) GET(r *http.Request) (body templ.Component, err error) { return }
"#;
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert_eq!(
        analysis.diagnostics.codes(),
        vec![E_PAGE_INVALID_ROUTE_COMMENT],
        "{}",
        analysis.diagnostics
    );
    assert_eq!(lines(&analysis), vec![17]);
    let app = analysis.app.unwrap();
    assert!(app.page("PageAbout").unwrap().route.is_empty());
}

fn session_unit(session: &str) -> Analysis {
    let src = format!(
        r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
)

type App struct{{}}

{}

// PageIndex is /
type PageIndex struct{{ App *App }}

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) {{ return }}
"#,
        session
    );
    Analyzer::new().analyze_sources(&[("app.go", src.as_str())])
}

#[test]
fn test_session_shape_rules() {
    let not_struct = session_unit("type Session string");
    assert_eq!(not_struct.diagnostics.codes(), vec![E_SESSION_NOT_STRUCT]);
    assert_eq!(lines(&not_struct), vec![11]);
    assert!(not_struct.app.unwrap().session.is_none());

    let no_user = session_unit("type Session struct {\n\tName string\n}");
    assert_eq!(no_user.diagnostics.codes(), vec![E_SESSION_MISSING_USER_ID]);
    match &no_user.diagnostics.entries()[0].error {
        AnalysisError::SessionMissingUserId { field, .. } => assert_eq!(field, "UserID"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(no_user.app.unwrap().session.is_some());

    let valid = session_unit("type Session struct {\n\tUserID string\n}");
    assert!(valid.is_clean(), "{}", valid.diagnostics);
}

#[test]
fn test_type_errors_do_not_suppress_the_model() {
    let src = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
)

type App struct{}

type Other struct{ F Missing }

// PageIndex is /
type PageIndex struct{ App *App }

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }
"#;
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert_eq!(analysis.diagnostics.codes(), vec![E_TYPE_CHECK]);
    assert_eq!(lines(&analysis), vec![11]);
    assert!(analysis.app.is_some());
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRONTEND
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_syntax_error_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("app.go"),
        "package app\n\ntype App struct{}\n",
    )
    .unwrap();
    fs::write(dir.path().join("broken.go"), "package app\n\nfunc (\n").unwrap();

    let analysis = Analyzer::new().analyze(dir.path());
    assert!(analysis.app.is_none());
    assert_eq!(analysis.diagnostics.codes(), vec![E_LOAD]);
    assert_eq!(analysis.diagnostics.entries()[0].location.file, "broken.go");
}

#[test]
fn test_unterminated_block_comment_is_a_load_error() {
    let src = "package app\n\ntype App struct{}\n/* x\n";
    let analysis = Analyzer::new().analyze_sources(&[("app.go", src)]);
    assert!(analysis.app.is_none());
    assert_eq!(analysis.diagnostics.codes(), vec![E_LOAD]);
    assert_eq!(lines(&analysis), vec![4]);
}

#[test]
fn test_unloadable_directories() {
    let empty = tempfile::tempdir().unwrap();
    let analysis = Analyzer::new().analyze(empty.path());
    assert!(analysis.app.is_none());
    assert_eq!(analysis.diagnostics.codes(), vec![E_LOAD]);
    assert!(!analysis.diagnostics.entries()[0].location.is_known());

    let mixed = tempfile::tempdir().unwrap();
    fs::write(mixed.path().join("a.go"), "package a\n").unwrap();
    fs::write(mixed.path().join("b.go"), "package b\n").unwrap();
    let analysis = Analyzer::new().analyze(mixed.path());
    assert!(analysis.app.is_none());
    assert_eq!(analysis.diagnostics.codes(), vec![E_LOAD]);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETERMINISM & PLUGINS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_analysis_is_deterministic() {
    for name in ["embed", "err_events", "err_path", "dispatch"] {
        let first = analyze(name);
        let second = analyze(name);
        assert_eq!(first.app, second.app, "{}", name);
        assert_eq!(first.diagnostics, second.diagnostics, "{}", name);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_file_order_does_not_matter() {
    let app = "package app\n\ntype App struct{}\n";
    let page = "package app\n\nimport (\n\t\"net/http\"\n\n\t\"github.com/a-h/templ\"\n)\n\n// PageIndex is /\ntype PageIndex struct{ App *App }\n\nfunc (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }\n";
    let forward = Analyzer::new().analyze_sources(&[("app.go", app), ("index.go", page)]);
    let reverse = Analyzer::new().analyze_sources(&[("index.go", page), ("app.go", app)]);
    assert!(forward.is_clean(), "{}", forward.diagnostics);
    assert_eq!(forward.app, reverse.app);
}

#[test]
fn test_analyze_many_keeps_input_order() {
    let results = Analyzer::new().analyze_many(&[fixture("no_app"), fixture("minimal")]);
    assert_eq!(results.len(), 2);
    assert!(results[0].app.is_none());
    assert!(results[1].is_clean());
}

struct Noop;

impl Plugin for Noop {}

struct Tracing;

fn synthetic(name: &str) -> TypeRef {
    TypeRef {
        resolved: HostType::basic("string"),
        expr: name.to_string(),
    }
}

impl Plugin for Tracing {
    fn on_get_inputs(&self, ctx: &PluginContext<'_>) -> Vec<Input> {
        vec![Input {
            name: format!("trace{}", ctx.owner.type_name()),
            ty: synthetic("string"),
            location: ctx.handler.location.clone(),
        }]
    }

    fn on_action_outputs(&self, ctx: &PluginContext<'_>) -> Vec<Output> {
        vec![Output {
            name: format!("audit{}", ctx.handler.name),
            ty: synthetic("string"),
            location: ctx.handler.location.clone(),
        }]
    }

    fn on_event_handler_inputs(&self, ctx: &EventHandlerPluginContext<'_>) -> Vec<Input> {
        vec![Input {
            name: ctx.event_handler.event_type.clone(),
            ty: synthetic("string"),
            location: ctx.event_handler.location.clone(),
        }]
    }
}

#[test]
fn test_noop_plugin_changes_nothing() {
    for name in ["embed", "session", "dispatch"] {
        let plain = analyze(name);
        let with_plugin = Analyzer::new().with_plugin(Noop).analyze(fixture(name));
        assert_eq!(plain.app, with_plugin.app);
        assert_eq!(plain.diagnostics, with_plugin.diagnostics);
    }
}

#[test]
fn test_plugin_additions() {
    let analysis = Analyzer::new().with_plugin(Tracing).analyze(fixture("embed"));
    assert!(analysis.is_clean());
    let app = analysis.app.unwrap();

    // Additions made on an abstract page travel with the inherited handler.
    let concrete = app.page("PageConcrete").unwrap();
    let get = concrete.get.as_ref().unwrap();
    assert_eq!(get.plugin_inputs.len(), 1);
    assert_eq!(get.plugin_inputs[0].name, "traceLayout");
    assert!(get.plugin_outputs.is_empty());

    let own = app.page("PageOverride").unwrap().get.as_ref().unwrap();
    assert_eq!(own.plugin_inputs[0].name, "tracePageOverride");

    for handler in &concrete.event_handlers {
        assert_eq!(handler.plugin_inputs.len(), 1);
        assert_eq!(handler.plugin_inputs[0].name, handler.event_type);
    }

    let session = Analyzer::new().with_plugin(Tracing).analyze(fixture("session"));
    let app = session.app.unwrap();
    let login = app.index_page().unwrap().action("POSTLogin").unwrap();
    assert!(login.plugin_inputs.is_empty());
    assert_eq!(login.plugin_outputs[0].name, "auditLogin");
}

#[test]
fn test_custom_conventions() {
    let conventions = crate::Conventions {
        index_page: "PageHome".to_string(),
        ..crate::Conventions::default()
    };
    let analysis = Analyzer::new()
        .with_conventions(conventions)
        .unwrap()
        .analyze(fixture("minimal"));
    assert_eq!(analysis.diagnostics.codes(), vec![E_MISSING_PAGE_INDEX]);
    let app = analysis.app.unwrap();
    assert_eq!(app.pages[0].kind, PageKind::Ordinary);
}

#[test]
fn test_conventions_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conventions.json");
    fs::write(&path, r#"{ "indexPage": "PageHome", "actionVerbs": ["POST"] }"#).unwrap();
    let conventions = crate::Conventions::from_json_file(&path).unwrap();
    assert_eq!(conventions.index_page, "PageHome");
    assert_eq!(conventions.app_type, "App");

    let analysis = Analyzer::new()
        .with_conventions(conventions)
        .unwrap()
        .analyze(fixture("actions"));
    // DELETE and PUT are no longer actions.
    let app = analysis.app.unwrap();
    assert_eq!(app.page("PageItem").unwrap().actions.len(), 2);
}

#[test]
fn test_model_json_is_camel_case() {
    let app = analyze("session").app.unwrap();
    let json = app.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["package"], "app");
    assert!(value["sourceDigest"].is_string());
    let index = &value["pages"][0];
    assert_eq!(index["typeName"], "PageIndex");
    assert!(index["actions"][0]["outputs"]["newSession"].is_object());
}

#[test]
fn test_clean_fixtures_stay_clean() {
    let analyzer = Analyzer::new();
    for name in ["minimal", "basic", "embed", "session"] {
        for _ in 0..2 {
            let analysis = analyzer.analyze(fixture(name));
            assert!(analysis.is_clean(), "{}: {}", name, analysis.diagnostics);
        }
    }
}
