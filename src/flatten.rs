//! Flattening Engine
//!
//! Merges a page's own handlers with those contributed by its abstract page
//! composition graph. The graph is walked breadth-first from the page's
//! direct embeds; every abstract page is visited at most once, so diamond
//! composition contributes through the first path that reaches it.
//!
//! - GET: the page's own GET always wins. Otherwise the first abstract page
//!   with a GET owns it and any later one is a conflict.
//! - Actions: first method name wins; later ones are shadowed.
//! - Event handlers: keyed by event type. A type the page handles itself is
//!   never inherited; two abstract pages handling it are a conflict.
//!
//! Actions and event handlers share one method namespace. An inherited
//! method whose name the page (or an earlier contributor) already owns is
//! dropped, whatever it handles.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::trace;

use crate::diagnostics::{AnalysisError, Diagnostics};
use crate::model::{AbstractPage, Page};
use crate::source::SourceLocation;

/// Counts of what a page inherited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inherited {
    pub get: bool,
    pub actions: usize,
    pub event_handlers: usize,
}

/// Who contributed a handler and where that contributor was embedded.
struct Claim {
    owner: String,
    embed_site: SourceLocation,
}

pub fn flatten_page(
    page: &mut Page,
    abstracts: &BTreeMap<String, AbstractPage>,
    diags: &mut Diagnostics,
) -> Inherited {
    let mut inherited = Inherited::default();
    if page.embeds.is_empty() {
        return inherited;
    }

    let own_get = page.get.is_some();
    let mut get_claim: Option<Claim> = None;
    let mut method_names: HashSet<String> = page
        .actions
        .iter()
        .map(|a| a.method_name.clone())
        .chain(page.event_handlers.iter().map(|h| h.method_name.clone()))
        .collect();
    // `None` marks an event type the page handles itself.
    let mut events: HashMap<String, Option<Claim>> = page
        .event_handlers
        .iter()
        .map(|h| (h.event_type.clone(), None))
        .collect();

    let mut visited = HashSet::new();
    let mut queue: VecDeque<(String, SourceLocation)> = page
        .embeds
        .iter()
        .map(|e| (e.type_name.clone(), e.location.clone()))
        .collect();

    while let Some((name, embed_site)) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            trace!(page = %page.type_name, embed = %name, "already visited");
            continue;
        }
        let Some(ap) = abstracts.get(&name) else {
            continue;
        };
        queue.extend(
            ap.embeds
                .iter()
                .map(|e| (e.type_name.clone(), e.location.clone())),
        );

        if let Some(get) = &ap.get {
            if !own_get {
                match &get_claim {
                    Some(prev) => diags.push(
                        &embed_site,
                        AnalysisError::ConflictingGetEmbed {
                            page: page.type_name.clone(),
                            owner: name.clone(),
                            previous_owner: prev.owner.clone(),
                            previous: prev.embed_site.clone(),
                        },
                    ),
                    None => {
                        let mut get = get.clone();
                        get.inherited_from = Some(name.clone());
                        get.route = page.route.clone();
                        page.get = Some(get);
                        inherited.get = true;
                        get_claim = Some(Claim {
                            owner: name.clone(),
                            embed_site: embed_site.clone(),
                        });
                    }
                }
            }
        }

        for action in &ap.actions {
            if !method_names.insert(action.method_name.clone()) {
                continue;
            }
            let mut action = action.clone();
            action.inherited_from = Some(name.clone());
            page.actions.push(action);
            inherited.actions += 1;
        }

        for handler in &ap.event_handlers {
            match events.get(&handler.event_type) {
                Some(None) => {}
                Some(Some(prev)) => diags.push(
                    &embed_site,
                    AnalysisError::ConflictingEventHandlerEmbed {
                        page: page.type_name.clone(),
                        event: handler.event_type.clone(),
                        owner: name.clone(),
                        previous_owner: prev.owner.clone(),
                        previous: prev.embed_site.clone(),
                    },
                ),
                None if method_names.contains(&handler.method_name) => {
                    trace!(page = %page.type_name, method = %handler.method_name, "shadowed");
                }
                None => {
                    method_names.insert(handler.method_name.clone());
                    events.insert(
                        handler.event_type.clone(),
                        Some(Claim {
                            owner: name.clone(),
                            embed_site: embed_site.clone(),
                        }),
                    );
                    let mut handler = handler.clone();
                    handler.inherited_from = Some(name.clone());
                    page.event_handlers.push(handler);
                    inherited.event_handlers += 1;
                }
            }
        }
    }
    inherited
}
