//! Property tests: the frontend never panics on arbitrary input, analysis
//! always returns for arbitrary handler signatures, and the handler slot
//! grammar accepts exactly the ordered parameter lists.

use proptest::prelude::*;

use crate::diagnostics::E_UNKNOWN_INPUT;
use crate::lexer::tokenize;
use crate::parser::parse_file;
use crate::Analyzer;

const HEADER: &str = r#"package app

import (
	"net/http"

	"github.com/a-h/templ"
	"github.com/starfederation/datastar-go/datastar"
)

type App struct{}

type Session struct{ UserID string }

// EventA is "a"
type EventA struct {
	ID string `json:"id"`
}

// PageIndex is /
type PageIndex struct{ App *App }

func (PageIndex) GET(r *http.Request) (body templ.Component, err error) { return }
"#;

/// Optional slots after the request, in grammar order.
const SLOTS: &[&str] = &[
    "sse *datastar.ServerSentEventGenerator",
    "sessionToken string",
    "session Session",
    "path struct{}",
    "query struct{}",
    "signals struct{}",
    "dispatch func(EventA) error",
];

/// Parameters for arbitrary signatures, well formed or not.
const PARAMS: &[&str] = &[
    "r *http.Request",
    "sse *datastar.ServerSentEventGenerator",
    "sessionToken string",
    "sessionToken int",
    "session Session",
    "session *Session",
    "path struct{ ID string `path:\"id\"` }",
    "path struct{ id int }",
    "query struct{ Q string `query:\"q\" reflectsignal:\"s\"` }",
    "signals struct{ S string `json:\"s\"` }",
    "signals int",
    "dispatch func(EventA) error",
    "dispatch func(int)",
    "event EventA",
    "event *EventA",
    "event int",
    "x Unknown",
    "a, b string",
    "string",
    "_ int",
    "ctx context.Context",
    "m map[string][]*EventA",
    "ch <-chan int",
    "rest ...int",
];

const RESULTS: &[&str] = &[
    "err error",
    "body templ.Component",
    "head templ.Component",
    "redirect string",
    "redirectStatus int",
    "newSession Session",
    "closeSession bool",
    "enableBackgroundStreaming bool",
    "disableRefreshAfterHidden bool",
    "x int",
    "error",
    "templ.Component",
];

const METHODS: &[&str] = &["GET", "POSTRun", "PUTx", "DELETE", "OnA", "Onlower", "OnB"];

fn method_source(method: &str, params: &[&str], results: &[&str]) -> String {
    let results = if results.is_empty() {
        String::new()
    } else {
        format!(" ({})", results.join(", "))
    };
    format!(
        "{}\n// {} is /run\nfunc (PageIndex) {}({}){} {{\n\treturn\n}}\n",
        HEADER,
        method,
        method,
        params.join(", "),
        results
    )
}

fn action_source(slots: &[usize]) -> String {
    let mut src = format!("{}\n// POSTRun is /run\nfunc (PageIndex) POSTRun(\n\tr *http.Request,\n", HEADER);
    for &i in slots {
        src.push('\t');
        src.push_str(SLOTS[i]);
        src.push_str(",\n");
    }
    src.push_str(") error {\n\treturn nil\n}\n");
    src
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn fuzz_tokenize_arbitrary_input(src in any::<String>()) {
        let _ = tokenize(&src);
    }

    #[test]
    fn fuzz_parse_arbitrary_input(src in "\\PC{0,200}") {
        let _ = parse_file("fuzz.go", &src);
    }

    #[test]
    fn fuzz_parse_go_like_input(
        tokens in prop::collection::vec(
            prop::sample::select(vec![
                "package", "app", "type", "func", "struct", "interface", "{", "}", "(", ")",
                "[", "]", "*", ",", ";", "\n", "//", "/*", "*/", "`json:\"x\"`", "\"s\"",
                "map", "chan", "<-", "...", "=", "import", "X", "error",
            ]),
            0..60,
        )
    ) {
        let src = format!("package app\n{}", tokens.join(" "));
        let _ = parse_file("fuzz.go", &src);
    }

    #[test]
    fn fuzz_arbitrary_handler_signatures(
        method in prop::sample::select(METHODS.to_vec()),
        params in prop::collection::vec(prop::sample::select(PARAMS.to_vec()), 0..=10),
        results in prop::collection::vec(prop::sample::select(RESULTS.to_vec()), 0..4),
    ) {
        let src = method_source(method, &params, &results);
        let analysis = Analyzer::new().analyze_sources(&[("app.go", src.as_str())]);
        let again = Analyzer::new().analyze_sources(&[("app.go", src.as_str())]);
        prop_assert_eq!(analysis.diagnostics, again.diagnostics);
    }

    #[test]
    fn fuzz_action_slot_order(slots in prop::collection::vec(0..SLOTS.len(), 0..10)) {
        let src = action_source(&slots);
        let analysis = Analyzer::new().analyze_sources(&[("app.go", src.as_str())]);
        prop_assert!(analysis.app.is_some());

        let ordered = slots.windows(2).all(|w| w[0] < w[1]);
        if ordered {
            prop_assert!(analysis.is_clean(), "{:?}\n{}", slots, analysis.diagnostics);
        } else {
            prop_assert!(analysis.diagnostics.contains(E_UNKNOWN_INPUT), "{:?}", slots);
        }

        // Diagnostics are reported in source order.
        let positions: Vec<(u32, u32)> = analysis
            .diagnostics
            .iter()
            .map(|d| (d.location.line, d.location.column))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        prop_assert_eq!(positions, sorted);

        let again = Analyzer::new().analyze_sources(&[("app.go", src.as_str())]);
        prop_assert_eq!(analysis.diagnostics, again.diagnostics);
    }
}
