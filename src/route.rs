//! Route comments and route patterns.

use lazy_static::lazy_static;
use regex::Regex;

use crate::syntax::CommentGroup;

lazy_static! {
    static ref ROUTE_VAR: Regex = Regex::new(r"\{([^{}]*)\}").expect("static pattern");
}

/// Outcome of reading `<Name> is <path>` from the first doc line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteComment {
    /// No doc comment, or the first line does not start with the name.
    NotAttempted,
    Malformed,
    WellFormed(String),
}

pub fn parse_route_comment(name: &str, doc: Option<&CommentGroup>) -> RouteComment {
    let lines = match doc {
        Some(d) => d.text_lines(),
        None => return RouteComment::NotAttempted,
    };
    let first = match lines.first() {
        Some(l) => l.trim(),
        None => return RouteComment::NotAttempted,
    };
    let after_name = match first.strip_prefix(name) {
        Some(rest) if rest.starts_with(' ') => rest,
        _ => return RouteComment::NotAttempted,
    };
    let route = match after_name.strip_prefix(" is ") {
        Some(r) => r.trim(),
        None => return RouteComment::Malformed,
    };
    if !is_well_formed(route) {
        return RouteComment::Malformed;
    }
    if let Some(second) = lines.get(1) {
        if !second.trim().is_empty() {
            return RouteComment::Malformed;
        }
    }
    RouteComment::WellFormed(route.to_string())
}

pub fn is_well_formed(route: &str) -> bool {
    route.starts_with('/') && !route.chars().any(char::is_whitespace)
}

/// Variable names of a route pattern in order of appearance. `{$}` marks an
/// exact match and a trailing `...` marks a wildcard; neither is part of the
/// name.
pub fn vars(route: &str) -> Vec<String> {
    ROUTE_VAR
        .captures_iter(route)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| *name != "$")
        .map(|name| name.strip_suffix("...").unwrap_or(name).to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Whether an action route equals the page route or is nested under it.
pub fn is_under(route: &str, page_route: &str) -> bool {
    let page = clean(page_route);
    let route = clean(route);
    if page == "/" {
        return route.starts_with('/');
    }
    route == page || route.starts_with(&format!("{}/", page))
}

/// Drops a trailing exact-match marker and trailing slashes.
fn clean(route: &str) -> &str {
    let route = route.strip_suffix("{$}").unwrap_or(route);
    let trimmed = route.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
