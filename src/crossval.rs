//! Cross-Validator
//!
//! Consistency checks that need more than one declaration: route variables
//! against path fields, dispatched types against declared events and
//! reflected signals against the signals struct. Every check is independent.

use std::collections::{BTreeSet, HashSet};

use crate::conventions::{TAG_JSON, TAG_PATH, TAG_REFLECT_SIGNAL};
use crate::diagnostics::{AnalysisError, Diagnostics};
use crate::model::{Handler, Page};
use crate::params::tagged_values;
use crate::route;
use crate::source::SourceLocation;

pub struct CrossValidator<'a> {
    pub event_types: &'a BTreeSet<String>,
    /// Handlers whose path parameter failed its shape check.
    pub invalid_paths: &'a HashSet<SourceLocation>,
}

impl<'a> CrossValidator<'a> {
    /// Route and path field consistency for a flattened page. Each handler
    /// is checked once per route, however many pages inherit it.
    pub fn check_routes(
        &self,
        page: &Page,
        checked: &mut HashSet<(SourceLocation, String)>,
        diags: &mut Diagnostics,
    ) {
        for handler in page.get.iter().chain(page.actions.iter()) {
            if !route::is_well_formed(&handler.route)
                || self.invalid_paths.contains(&handler.location)
                || !checked.insert((handler.location.clone(), handler.route.clone()))
            {
                continue;
            }
            let receiver = handler.inherited_from.as_deref().unwrap_or(&page.type_name);
            check_route_vars(receiver, handler, diags);
        }
    }

    /// Dispatch and reflected signal checks on a handler's own declaration.
    pub fn check_references(&self, receiver: &str, handler: &Handler, diags: &mut Diagnostics) {
        if let Some(dispatch) = &handler.inputs.dispatch {
            for found in &handler.dispatched_events {
                if !self.event_types.contains(found) {
                    diags.push(
                        &dispatch.location,
                        AnalysisError::DispatchParamNotEvent {
                            receiver: receiver.to_string(),
                            method: handler.method_name.clone(),
                            found: found.clone(),
                        },
                    );
                }
            }
        }

        let Some(query) = &handler.inputs.query else {
            return;
        };
        let signals: HashSet<String> = handler
            .inputs
            .signals
            .as_ref()
            .map(|s| tagged_values(&s.ty.resolved, TAG_JSON).into_iter().collect())
            .unwrap_or_default();
        for signal in tagged_values(&query.ty.resolved, TAG_REFLECT_SIGNAL) {
            if !signals.contains(&signal) {
                diags.push(
                    &query.location,
                    AnalysisError::ReflectSignalNotInSignals {
                        receiver: receiver.to_string(),
                        method: handler.method_name.clone(),
                        signal,
                    },
                );
            }
        }
    }
}

fn check_route_vars(receiver: &str, handler: &Handler, diags: &mut Diagnostics) {
    let vars = route::vars(&handler.route);
    let fields = handler
        .inputs
        .path
        .as_ref()
        .map(|p| tagged_values(&p.ty.resolved, TAG_PATH))
        .unwrap_or_default();

    for name in fields.iter().filter(|f| !vars.contains(f)) {
        diags.push(
            &handler.location,
            AnalysisError::PathFieldNotInRoute {
                receiver: receiver.to_string(),
                method: handler.method_name.clone(),
                name: name.clone(),
            },
        );
    }
    for name in vars.iter().filter(|v| !fields.contains(v)) {
        diags.push(
            &handler.location,
            AnalysisError::PathMissingRouteVar {
                receiver: receiver.to_string(),
                method: handler.method_name.clone(),
                name: name.clone(),
            },
        );
    }
}
