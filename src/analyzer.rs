//! Analysis pipeline
//!
//! One [`AnalysisContext`] owns every table, visited set and the diagnostic
//! sink for a single unit. Passes run strictly in order:
//!
//! 1. type check, index, event names, App
//! 2. types: session, events, pages and abstract pages
//! 3. embeds
//! 4. methods (signatures and plugins)
//! 5. flatten, cross-validate, required handlers
//! 6. finalize

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use crate::conventions::{Grammar, HttpMethod, MethodKind, NameKind};
use crate::crossval::CrossValidator;
use crate::diagnostics::{AnalysisError, Diagnostics};
use crate::events::{self, Subject};
use crate::flatten::{flatten_page, Inherited};
use crate::index::{Index, MethodDecl, TypeDecl};
use crate::loader::{FileId, Unit};
use crate::model::{
    AbstractPage, App, EmbedRef, Event, EventHandler, Handler, Hook, Page, PageKind,
    SessionShape,
};
use crate::plugin::{
    collect_event_handler_additions, collect_handler_additions, EventHandlerPluginContext, Owner,
    Plugin, PluginContext,
};
use crate::route::{self, RouteComment};
use crate::signature::{MethodSite, SignatureEnv};
use crate::source::SourceLocation;
use crate::syntax::FieldDecl;
use crate::types::HostType;

/// Position of a freshly attached handler within its owner.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Get,
    Action(usize),
    EventHandler(usize),
}

/// Mutable view of the handler lists shared by pages and abstract pages.
struct Slots<'s> {
    get: &'s mut Option<Handler>,
    actions: &'s mut Vec<Handler>,
    event_handlers: &'s mut Vec<EventHandler>,
}

pub(crate) struct AnalysisContext<'a> {
    unit: &'a Unit,
    grammar: &'a Grammar,
    plugins: &'a [Box<dyn Plugin>],
    index: Index<'a>,
    diags: Diagnostics,

    event_types: BTreeSet<String>,
    app_found: bool,
    session: Option<SessionShape>,
    events: Vec<Event>,
    head: Option<Hook>,
    recover500: Option<Hook>,
    pages: BTreeMap<String, Page>,
    abstracts: BTreeMap<String, AbstractPage>,

    /// (receiver, event type) to the first handler's position.
    seen_event_handlers: HashMap<(String, String), SourceLocation>,
    invalid_paths: HashSet<SourceLocation>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        unit: &'a Unit,
        grammar: &'a Grammar,
        plugins: &'a [Box<dyn Plugin>],
    ) -> Self {
        Self {
            unit,
            grammar,
            plugins,
            index: Index::build(unit),
            diags: Diagnostics::new(),
            event_types: BTreeSet::new(),
            app_found: false,
            session: None,
            events: Vec::new(),
            head: None,
            recover500: None,
            pages: BTreeMap::new(),
            abstracts: BTreeMap::new(),
            seen_event_handlers: HashMap::new(),
            invalid_paths: HashSet::new(),
        }
    }

    pub fn run(mut self) -> (Option<App>, Diagnostics) {
        self.type_check();
        self.collect_event_types();
        self.init_app();
        self.first_pass_types();
        self.validate_events();
        debug!(
            pages = self.pages.len(),
            abstract_pages = self.abstracts.len(),
            events = self.events.len(),
            "types classified"
        );
        self.second_pass_embeds();
        self.third_pass_methods();
        self.flatten_pages();
        self.cross_validate();
        self.validate_required_handlers();

        let app = self.finalize();
        let mut diags = self.diags;
        diags.finish();
        debug!(diagnostics = diags.len(), model = app.is_some(), "analysis finished");
        (app, diags)
    }

    fn local(name: &str) -> HostType {
        HostType::named("", name)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SETUP
    // ═══════════════════════════════════════════════════════════════════════════

    fn type_check(&mut self) {
        for problem in self.unit.check() {
            self.diags.push(
                &problem.location,
                AnalysisError::TypeCheck {
                    message: problem.message,
                },
            );
        }
    }

    fn collect_event_types(&mut self) {
        for decl in self.index.types() {
            if self.grammar.is_valid_event_name(decl.name()) {
                self.event_types.insert(decl.name().to_string());
            }
        }
    }

    fn init_app(&mut self) {
        let name = &self.grammar.conventions().app_type;
        if self.index.get(name).is_some() {
            self.app_found = true;
            return;
        }
        self.diags.push(
            &self.unit.base_location(),
            AnalysisError::MissingApp { name: name.clone() },
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FIRST PASS: TYPES
    // ═══════════════════════════════════════════════════════════════════════════

    fn first_pass_types(&mut self) {
        let decls: Vec<TypeDecl<'a>> = self.index.types().copied().collect();
        for decl in decls {
            let kind = self.grammar.classify_type_name(decl.name());
            trace!(name = decl.name(), ?kind, "classifying type");
            match kind {
                NameKind::App => {}
                NameKind::Session => self.session_type(&decl),
                NameKind::Event if self.event_types.contains(decl.name()) => {
                    self.event_type(&decl)
                }
                _ => self.page_or_abstract(&decl),
            }
        }
    }

    fn session_type(&mut self, decl: &TypeDecl<'a>) {
        let name = decl.name();
        let HostType::Struct { fields } = self.unit.underlying(&Self::local(name)) else {
            self.diags.push(
                decl.location(),
                AnalysisError::SessionNotStruct {
                    session: name.to_string(),
                },
            );
            return;
        };
        let user_field = &self.grammar.conventions().session_user_field;
        if !fields.iter().any(|f| &f.name == user_field) {
            self.diags.push(
                decl.location(),
                AnalysisError::SessionMissingUserId {
                    session: name.to_string(),
                    field: user_field.clone(),
                },
            );
        }
        self.session = Some(SessionShape {
            type_name: name.to_string(),
            location: decl.location().clone(),
            fields,
        });
    }

    fn event_type(&mut self, decl: &TypeDecl<'a>) {
        let name = decl.name();
        match events::parse_subject(name, decl.doc()) {
            Subject::Valid(subject) => {
                let field = &self.grammar.conventions().target_user_ids_field;
                self.events.push(Event {
                    type_name: name.to_string(),
                    subject,
                    has_target_user_ids: events::has_target_user_ids(
                        self.unit,
                        &Self::local(name),
                        field,
                    ),
                    location: decl.location().clone(),
                });
            }
            invalid => {
                if let Some(err) = invalid.into_error(name) {
                    self.diags.push(decl.location(), err);
                }
            }
        }
    }

    fn is_app_field(&self, file: FileId, field: &FieldDecl) -> bool {
        let app = &self.grammar.conventions().app_type;
        let ty = self.unit.scope(file).resolve(&field.ty, &mut Vec::new());
        matches!(&ty, HostType::Pointer { elem } if elem.local_name() == Some(app.as_str()))
    }

    fn page_or_abstract(&mut self, decl: &TypeDecl<'a>) {
        let Some(st) = decl.struct_type() else {
            return;
        };
        let name = decl.name();
        let app = self.grammar.conventions().app_type.clone();
        let has_app = st.fields.iter().any(|f| {
            f.names.len() == 1 && f.names[0].name == app && self.is_app_field(decl.file, f)
        });

        if self.grammar.classify_type_name(name) != NameKind::Page {
            if has_app {
                trace!(name, "abstract page");
                self.abstracts.insert(
                    name.to_string(),
                    AbstractPage {
                        type_name: name.to_string(),
                        location: decl.location().clone(),
                        get: None,
                        actions: Vec::new(),
                        event_handlers: Vec::new(),
                        embeds: Vec::new(),
                    },
                );
            }
            return;
        }

        let at = decl.location();
        let page = name.to_string();
        if !self.grammar.is_valid_page_name(name) {
            self.diags
                .push(at, AnalysisError::PageNameInvalid { page: page.clone() });
        }
        if !has_app {
            self.diags
                .push(at, AnalysisError::PageMissingAppField { page: page.clone() });
        }
        let mut app_seen = false;
        for field in &st.fields {
            for ident in &field.names {
                if ident.name == app && !app_seen && self.is_app_field(decl.file, field) {
                    app_seen = true;
                    continue;
                }
                self.diags.push(
                    &ident.location,
                    AnalysisError::PageHasExtraFields {
                        page: page.clone(),
                        field: ident.name.clone(),
                    },
                );
            }
        }

        let route = match route::parse_route_comment(name, decl.doc()) {
            RouteComment::WellFormed(route) => route,
            RouteComment::NotAttempted => {
                self.diags
                    .push(at, AnalysisError::PageMissingRouteComment { page: page.clone() });
                String::new()
            }
            RouteComment::Malformed => {
                self.diags
                    .push(at, AnalysisError::PageInvalidRouteComment { page: page.clone() });
                String::new()
            }
        };

        let c = self.grammar.conventions();
        let kind = if name == c.index_page {
            PageKind::Index
        } else if name == c.error404_page {
            PageKind::Error404
        } else if name == c.error500_page {
            PageKind::Error500
        } else {
            PageKind::Ordinary
        };
        trace!(name, route = %route, ?kind, "page");
        self.pages.insert(
            page.clone(),
            Page {
                type_name: page,
                route,
                kind,
                location: at.clone(),
                get: None,
                actions: Vec::new(),
                event_handlers: Vec::new(),
                embeds: Vec::new(),
            },
        );
    }

    fn validate_events(&mut self) {
        for name in &self.event_types {
            let Some(decl) = self.index.get(name) else {
                continue;
            };
            for err in events::validate_fields(self.unit, name, &Self::local(name)) {
                self.diags.push(decl.location(), err);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SECOND PASS: EMBEDS
    // ═══════════════════════════════════════════════════════════════════════════

    fn second_pass_embeds(&mut self) {
        let owners: Vec<String> = self
            .pages
            .keys()
            .chain(self.abstracts.keys())
            .cloned()
            .collect();
        for owner in owners {
            let Some(st) = self.index.get(&owner).and_then(|d| d.struct_type()) else {
                continue;
            };
            let mut embeds = Vec::new();
            for field in st.fields.iter().filter(|f| f.is_embedded()) {
                let Some(embedded) = field.ty.embedded_name() else {
                    continue;
                };
                let site = field.ty.location();
                if self.abstracts.contains_key(&embedded.name) {
                    embeds.push(EmbedRef {
                        type_name: embedded.name.clone(),
                        location: site.clone(),
                    });
                } else {
                    self.diags.push(
                        site,
                        AnalysisError::EmbedNotAbstract {
                            owner: owner.clone(),
                            embedded: embedded.name.clone(),
                        },
                    );
                }
            }
            if let Some(page) = self.pages.get_mut(&owner) {
                page.embeds = embeds;
            } else if let Some(ap) = self.abstracts.get_mut(&owner) {
                ap.embeds = embeds;
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // THIRD PASS: METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    fn third_pass_methods(&mut self) {
        let methods: Vec<(String, MethodDecl<'a>)> = self
            .index
            .methods()
            .map(|(recv, m)| (recv.to_string(), *m))
            .collect();
        let grammar = self.grammar;
        let conventions = grammar.conventions();

        for (recv, m) in methods {
            let name = m.func.name.name.as_str();
            let site = MethodSite {
                file: m.file,
                func: m.func,
                receiver: &recv,
            };

            if recv == conventions.app_type {
                let env = SignatureEnv {
                    unit: self.unit,
                    grammar,
                    event_types: &self.event_types,
                };
                if name == conventions.head_hook {
                    self.head = Some(env.parse_hook(&site));
                } else if name == conventions.recover500_hook {
                    self.recover500 = Some(env.parse_hook(&site));
                }
                continue;
            }
            if !self.pages.contains_key(&recv) && !self.abstracts.contains_key(&recv) {
                continue;
            }

            let at = site.func.name.location.clone();
            match grammar.classify_method(name) {
                MethodKind::Get => self.attach_handler(&site, HttpMethod::Get, ""),
                MethodKind::Action { verb, suffix } => {
                    if !grammar.is_valid_action_name(&verb, name) {
                        self.diags.push(
                            &at,
                            AnalysisError::ActionNameInvalid {
                                receiver: recv.clone(),
                                method: name.to_string(),
                            },
                        );
                    }
                    match HttpMethod::from_verb(&verb) {
                        Some(method) => self.attach_handler(&site, method, &suffix),
                        None => trace!(verb = %verb, "verb has no HTTP method"),
                    }
                }
                MethodKind::EventHandler { suffix } => {
                    if !grammar.is_valid_event_handler_name(name) {
                        self.diags.push(
                            &at,
                            AnalysisError::EventHandlerNameInvalid {
                                receiver: recv.clone(),
                                method: name.to_string(),
                            },
                        );
                    }
                    self.attach_event_handler(&site, &suffix);
                }
                MethodKind::Ignored => trace!(receiver = %recv, method = name, "ignored method"),
            }
        }
    }

    fn attach_handler(&mut self, site: &MethodSite<'_>, method: HttpMethod, suffix: &str) {
        let recv = site.receiver;
        let name = site.func.name.name.as_str();
        let at = &site.func.name.location;
        let page_route = self.pages.get(recv).map(|p| p.route.clone());

        let env = SignatureEnv {
            unit: self.unit,
            grammar: self.grammar,
            event_types: &self.event_types,
        };
        let mut parsed = env.parse_handler(site, method, suffix, String::new(), &mut self.diags);

        if method == HttpMethod::Get {
            parsed.handler.route = page_route.unwrap_or_default();
        } else {
            match route::parse_route_comment(name, site.func.doc.as_ref()) {
                RouteComment::NotAttempted => self.diags.push(
                    at,
                    AnalysisError::ActionMissingRouteComment {
                        receiver: recv.to_string(),
                        method: name.to_string(),
                    },
                ),
                RouteComment::Malformed => self.diags.push(
                    at,
                    AnalysisError::ActionInvalidRouteComment {
                        receiver: recv.to_string(),
                        method: name.to_string(),
                    },
                ),
                RouteComment::WellFormed(route) => {
                    if let Some(page_route) = page_route.filter(|r| !r.is_empty()) {
                        if !route::is_under(&route, &page_route) {
                            self.diags.push(
                                at,
                                AnalysisError::ActionRouteNotUnderPage {
                                    receiver: recv.to_string(),
                                    method: name.to_string(),
                                    route: route.clone(),
                                    page_route,
                                },
                            );
                        }
                    }
                    parsed.handler.route = route;
                }
            }
        }
        if !parsed.path_valid {
            self.invalid_paths.insert(parsed.handler.location.clone());
        }

        let Some(slots) = self.slots_mut(recv) else {
            return;
        };
        let slot = if method == HttpMethod::Get {
            if slots.get.is_some() {
                return;
            }
            *slots.get = Some(parsed.handler);
            Slot::Get
        } else {
            slots.actions.push(parsed.handler);
            Slot::Action(slots.actions.len() - 1)
        };
        trace!(receiver = recv, method = name, "handler attached");
        self.run_plugins(recv, slot);
    }

    fn attach_event_handler(&mut self, site: &MethodSite<'_>, suffix: &str) {
        let recv = site.receiver;
        let env = SignatureEnv {
            unit: self.unit,
            grammar: self.grammar,
            event_types: &self.event_types,
        };
        let Some(handler) = env.parse_event_handler(site, suffix, &mut self.diags) else {
            return;
        };

        let key = (recv.to_string(), handler.event_type.clone());
        if let Some(previous) = self.seen_event_handlers.get(&key) {
            self.diags.push(
                &handler.location,
                AnalysisError::DuplicateEventHandler {
                    receiver: recv.to_string(),
                    method: handler.method_name.clone(),
                    event: handler.event_type.clone(),
                    previous: previous.normalized(),
                },
            );
            return;
        }
        self.seen_event_handlers
            .insert(key, handler.location.clone());

        let Some(slots) = self.slots_mut(recv) else {
            return;
        };
        slots.event_handlers.push(handler);
        let slot = Slot::EventHandler(slots.event_handlers.len() - 1);
        self.run_plugins(recv, slot);
    }

    fn owner(&self, recv: &str) -> Option<Owner<'_>> {
        self.pages
            .get(recv)
            .map(Owner::Page)
            .or_else(|| self.abstracts.get(recv).map(Owner::Abstract))
    }

    fn slots_mut(&mut self, recv: &str) -> Option<Slots<'_>> {
        if let Some(p) = self.pages.get_mut(recv) {
            return Some(Slots {
                get: &mut p.get,
                actions: &mut p.actions,
                event_handlers: &mut p.event_handlers,
            });
        }
        self.abstracts.get_mut(recv).map(|a| Slots {
            get: &mut a.get,
            actions: &mut a.actions,
            event_handlers: &mut a.event_handlers,
        })
    }

    /// Lets plugins append synthetic slots to the handler just attached.
    fn run_plugins(&mut self, recv: &str, slot: Slot) {
        let plugins = self.plugins;
        if plugins.is_empty() {
            return;
        }
        let Some(owner) = self.owner(recv) else {
            return;
        };
        let (get, actions, event_handlers) = match owner {
            Owner::Page(p) => (&p.get, &p.actions, &p.event_handlers),
            Owner::Abstract(a) => (&a.get, &a.actions, &a.event_handlers),
        };
        let handler_additions = |handler: Option<&Handler>| {
            handler.map(|handler| {
                let ctx = PluginContext {
                    owner,
                    handler,
                    receiver: recv,
                };
                let additions = collect_handler_additions(plugins, &ctx);
                (additions.inputs, additions.outputs)
            })
        };
        let additions = match slot {
            Slot::Get => handler_additions(get.as_ref()),
            Slot::Action(i) => handler_additions(actions.get(i)),
            Slot::EventHandler(i) => event_handlers.get(i).map(|event_handler| {
                let ctx = EventHandlerPluginContext {
                    owner,
                    event_handler,
                    receiver: recv,
                };
                (collect_event_handler_additions(plugins, &ctx), Vec::new())
            }),
        };
        let Some((inputs, outputs)) = additions else {
            return;
        };
        if inputs.is_empty() && outputs.is_empty() {
            return;
        }

        let Some(slots) = self.slots_mut(recv) else {
            return;
        };
        let handler = match slot {
            Slot::Get => slots.get.as_mut(),
            Slot::Action(i) => slots.actions.get_mut(i),
            Slot::EventHandler(i) => {
                if let Some(handler) = slots.event_handlers.get_mut(i) {
                    handler.plugin_inputs.extend(inputs);
                }
                return;
            }
        };
        if let Some(handler) = handler {
            handler.plugin_inputs.extend(inputs);
            handler.plugin_outputs.extend(outputs);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FLATTEN & VALIDATE
    // ═══════════════════════════════════════════════════════════════════════════

    fn flatten_pages(&mut self) {
        for page in self.pages.values_mut() {
            let inherited = flatten_page(page, &self.abstracts, &mut self.diags);
            if inherited != Inherited::default() {
                debug!(
                    page = %page.type_name,
                    get = inherited.get,
                    actions = inherited.actions,
                    event_handlers = inherited.event_handlers,
                    "flattened"
                );
            }
        }
    }

    fn cross_validate(&mut self) {
        let validator = CrossValidator {
            event_types: &self.event_types,
            invalid_paths: &self.invalid_paths,
        };
        let mut checked = HashSet::new();
        for page in self.pages.values() {
            validator.check_routes(page, &mut checked, &mut self.diags);
            for handler in page.get.iter().chain(page.actions.iter()) {
                if handler.inherited_from.is_none() {
                    validator.check_references(&page.type_name, handler, &mut self.diags);
                }
            }
        }
        for ap in self.abstracts.values() {
            for handler in ap.get.iter().chain(ap.actions.iter()) {
                validator.check_references(&ap.type_name, handler, &mut self.diags);
            }
        }
    }

    fn validate_required_handlers(&mut self) {
        for page in self.pages.values() {
            if page.get.is_none() {
                self.diags.push(
                    &page.location,
                    AnalysisError::PageMissingGet {
                        page: page.type_name.clone(),
                    },
                );
            }
        }
        let index = &self.grammar.conventions().index_page;
        if !self.pages.contains_key(index) {
            self.diags.push(
                &self.unit.base_location(),
                AnalysisError::MissingPageIndex {
                    name: index.clone(),
                },
            );
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FINALIZE
    // ═══════════════════════════════════════════════════════════════════════════

    fn finalize(&mut self) -> Option<App> {
        if !self.app_found {
            return None;
        }
        let location = self
            .index
            .get(&self.grammar.conventions().app_type)
            .map(|d| d.location().clone())
            .unwrap_or_else(|| self.unit.base_location());
        Some(App {
            package: self.unit.package.clone(),
            source_digest: self.unit.digest().to_string(),
            location,
            session: self.session.take(),
            head: self.head.take(),
            recover500: self.recover500.take(),
            pages: std::mem::take(&mut self.pages).into_values().collect(),
            abstract_pages: std::mem::take(&mut self.abstracts).into_values().collect(),
            events: std::mem::take(&mut self.events),
        })
    }
}
