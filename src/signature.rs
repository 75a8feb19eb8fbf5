//! Signature Parser
//!
//! Matches a handler's parameters against the ordered slot grammar
//! `request, sse, sessionToken, session, path, query, signals, dispatch`
//! and its named results against the output vocabulary. Every violation is
//! reported; parsing continues so the handler is still built.

use std::collections::BTreeSet;

use crate::conventions::{
    Grammar, HttpMethod, OUT_BODY, OUT_CLOSE_SESSION, OUT_DISABLE_REFRESH_AFTER_HIDDEN,
    OUT_ENABLE_BACKGROUND_STREAMING, OUT_ERR, OUT_HEAD, OUT_NEW_SESSION, OUT_REDIRECT,
    OUT_REDIRECT_STATUS, PARAM_DISPATCH, PARAM_EVENT, PARAM_SESSION, PARAM_SESSION_TOKEN,
};
use crate::diagnostics::{AnalysisError, Diagnostics};
use crate::loader::{FileId, Unit};
use crate::model::{
    EventHandler, Handler, HandlerInputs, HandlerOutputs, Hook, Input, Output, TypeRef,
};
use crate::params::{self, StructParam};
use crate::source::SourceLocation;
use crate::syntax::{FuncDecl, Param};
use crate::types::HostType;

/// A method declaration being parsed.
#[derive(Debug, Clone, Copy)]
pub struct MethodSite<'a> {
    pub file: FileId,
    pub func: &'a FuncDecl,
    pub receiver: &'a str,
}

impl<'a> MethodSite<'a> {
    fn name(&self) -> &'a str {
        &self.func.name.name
    }

    fn location(&self) -> &'a SourceLocation {
        &self.func.name.location
    }
}

#[derive(Debug, Clone)]
pub struct ParsedHandler {
    pub handler: Handler,
    /// False when the path parameter failed its shape check.
    pub path_valid: bool,
}

/// What the signature parser needs to know about the unit.
pub struct SignatureEnv<'a> {
    pub unit: &'a Unit,
    pub grammar: &'a Grammar,
    pub event_types: &'a BTreeSet<String>,
}

struct Resolved<'p> {
    param: &'p Param,
    ty: HostType,
}

impl<'a> SignatureEnv<'a> {
    fn resolve_all<'p>(&self, site: &MethodSite<'_>, list: &'p [Param]) -> Vec<Resolved<'p>> {
        list.iter()
            .map(|param| Resolved {
                param,
                ty: self.unit.resolve_in_method(site.file, site.func, &param.ty),
            })
            .collect()
    }

    fn input(r: &Resolved<'_>) -> Input {
        Input {
            name: r.param.name().to_string(),
            ty: TypeRef {
                resolved: r.ty.clone(),
                expr: r.param.ty.to_string(),
            },
            location: r.param.location().clone(),
        }
    }

    fn output(r: &Resolved<'_>) -> Output {
        Output {
            name: r.param.name().to_string(),
            ty: TypeRef {
                resolved: r.ty.clone(),
                expr: r.param.ty.to_string(),
            },
            location: r.param.location().clone(),
        }
    }

    fn is_session(&self, ty: &HostType) -> bool {
        self.unit.unalias(ty).local_name() == Some(self.grammar.conventions().session_type.as_str())
    }

    fn is_event(&self, ty: &HostType) -> bool {
        self.unit
            .unalias(ty.strip_pointer())
            .local_name()
            .map_or(false, |n| self.event_types.contains(n))
    }

    fn wrong_input(site: &MethodSite<'_>, r: &Resolved<'_>, expected: &str) -> AnalysisError {
        AnalysisError::InputWrongType {
            receiver: site.receiver.to_string(),
            method: site.name().to_string(),
            input: r.param.name().to_string(),
            expected: expected.to_string(),
        }
    }

    fn wrong_output(site: &MethodSite<'_>, r: &Resolved<'_>, expected: &str) -> AnalysisError {
        AnalysisError::OutputWrongType {
            receiver: site.receiver.to_string(),
            method: site.name().to_string(),
            output: r.param.name().to_string(),
            expected: expected.to_string(),
        }
    }

    /// Consumes the optional `sessionToken` and `session` slots starting at
    /// `i` and returns the index of the first unconsumed parameter.
    fn session_slots(
        &self,
        site: &MethodSite<'_>,
        params: &[Resolved<'_>],
        mut i: usize,
        token: &mut Option<Input>,
        session: &mut Option<Input>,
        diags: &mut Diagnostics,
    ) -> usize {
        if let Some(r) = params.get(i).filter(|r| r.param.name() == PARAM_SESSION_TOKEN) {
            if !self.unit.is_basic_underlying(&r.ty, "string") {
                diags.push(r.param.location(), Self::wrong_input(site, r, "string"));
            }
            *token = Some(Self::input(r));
            i += 1;
        }
        if let Some(r) = params.get(i).filter(|r| r.param.name() == PARAM_SESSION) {
            if !self.is_session(&r.ty) {
                let expected = self.grammar.conventions().session_type.clone();
                diags.push(r.param.location(), Self::wrong_input(site, r, &expected));
            }
            *session = Some(Self::input(r));
            i += 1;
        }
        i
    }

    fn unknown_inputs(site: &MethodSite<'_>, rest: &[Resolved<'_>], diags: &mut Diagnostics) {
        for r in rest {
            let input = if r.param.name().is_empty() {
                r.param.ty.to_string()
            } else {
                r.param.name().to_string()
            };
            diags.push(
                r.param.location(),
                AnalysisError::UnknownInput {
                    receiver: site.receiver.to_string(),
                    method: site.name().to_string(),
                    input,
                },
            );
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // HTTP handlers
    // ───────────────────────────────────────────────────────────────────────

    pub fn parse_handler(
        &self,
        site: &MethodSite<'_>,
        method: HttpMethod,
        suffix: &str,
        route: String,
        diags: &mut Diagnostics,
    ) -> ParsedHandler {
        let params = self.resolve_all(site, &site.func.ty.params);
        let mut handler = Handler {
            method,
            method_name: site.name().to_string(),
            name: suffix.to_string(),
            route,
            location: site.location().clone(),
            inherited_from: None,
            inputs: HandlerInputs::default(),
            outputs: HandlerOutputs::default(),
            dispatched_events: Vec::new(),
            plugin_inputs: Vec::new(),
            plugin_outputs: Vec::new(),
        };
        let path_valid = self.handler_inputs(site, &params, &mut handler, diags);
        self.handler_outputs(site, &mut handler, diags);
        ParsedHandler {
            handler,
            path_valid,
        }
    }

    fn handler_inputs(
        &self,
        site: &MethodSite<'_>,
        params: &[Resolved<'_>],
        handler: &mut Handler,
        diags: &mut Diagnostics,
    ) -> bool {
        let conventions = self.grammar.conventions();
        let inputs = &mut handler.inputs;
        let mut path_valid = true;

        match params.first() {
            Some(r) if conventions.request_type.matches(&r.ty) => {
                inputs.request = Some(Self::input(r));
            }
            _ => {
                diags.push(
                    site.location(),
                    AnalysisError::MissingRequest {
                        receiver: site.receiver.to_string(),
                        method: site.name().to_string(),
                    },
                );
                return path_valid;
            }
        }
        let mut i = 1;

        if let Some(r) = params.get(i).filter(|r| conventions.sse_type.matches(&r.ty)) {
            inputs.sse = Some(Self::input(r));
            i += 1;
        }
        i = self.session_slots(
            site,
            params,
            i,
            &mut inputs.session_token,
            &mut inputs.session,
            diags,
        );

        for kind in [StructParam::Path, StructParam::Query, StructParam::Signals] {
            let Some(r) = params.get(i).filter(|r| r.param.name() == kind.param_name()) else {
                continue;
            };
            if let Err(e) =
                params::validate_struct_param(
                self.unit,
                kind,
                &r.param.ty,
                &r.ty,
                site.receiver,
                site.name(),
            )
            {
                diags.push(r.param.location(), e);
                if kind == StructParam::Path {
                    path_valid = false;
                }
            }
            let slot = match kind {
                StructParam::Path => &mut inputs.path,
                StructParam::Query => &mut inputs.query,
                StructParam::Signals => &mut inputs.signals,
            };
            *slot = Some(Self::input(r));
            i += 1;
        }

        if let Some(r) = params.get(i).filter(|r| r.param.name() == PARAM_DISPATCH) {
            match params::validate_dispatch(&r.ty, site.receiver, site.name()) {
                Ok(types) => {
                    handler.dispatched_events = types
                        .iter()
                        .map(|t| {
                            let t = self.unit.unalias(t.strip_pointer());
                            t.local_name()
                                .map(str::to_string)
                                .unwrap_or_else(|| t.to_string())
                        })
                        .collect();
                }
                Err(e) => diags.push(r.param.location(), e),
            }
            handler.inputs.dispatch = Some(Self::input(r));
            i += 1;
        }

        Self::unknown_inputs(site, params.get(i..).unwrap_or(&[]), diags);
        path_valid
    }

    fn handler_outputs(&self, site: &MethodSite<'_>, handler: &mut Handler, diags: &mut Diagnostics) {
        let conventions = self.grammar.conventions();
        let results = self.resolve_all(site, &site.func.ty.results);
        let is_get = handler.method == HttpMethod::Get;
        let component = conventions.component_type.to_host_type().to_string();
        let session = conventions.session_type.clone();
        let outs = &mut handler.outputs;

        let mut error_count = 0;
        let mut component_count = 0;
        let mut body_seen = false;

        for r in &results {
            let name = r.param.name();
            let loc = r.param.location();

            if r.ty.is_error() {
                error_count += 1;
                if error_count == 2 {
                    diags.push(
                        site.location(),
                        AnalysisError::MultipleErrorResults {
                            receiver: site.receiver.to_string(),
                            method: site.name().to_string(),
                        },
                    );
                }
                if outs.err.is_none() {
                    outs.err = Some(Self::output(r));
                }
                continue;
            }

            if conventions.component_type.matches(&r.ty) {
                component_count += 1;
                if is_get && component_count == 1 && name != OUT_BODY {
                    body_seen = true;
                    diags.push(
                        loc,
                        AnalysisError::GetBodyWrongName {
                            receiver: site.receiver.to_string(),
                            method: site.name().to_string(),
                            found: name.to_string(),
                        },
                    );
                    continue;
                }
                if is_get && component_count == 2 && name != OUT_HEAD {
                    diags.push(
                        loc,
                        AnalysisError::GetHeadWrongName {
                            receiver: site.receiver.to_string(),
                            method: site.name().to_string(),
                            found: name.to_string(),
                        },
                    );
                    continue;
                }
            }

            let basic = |b: &str| self.unit.is_basic_underlying(&r.ty, b);
            let (slot, valid, expected): (&mut Option<Output>, bool, &str) = match name {
                OUT_BODY => {
                    body_seen = true;
                    (&mut outs.body, conventions.component_type.matches(&r.ty), component.as_str())
                }
                OUT_HEAD => (&mut outs.head, conventions.component_type.matches(&r.ty), component.as_str()),
                OUT_REDIRECT => (&mut outs.redirect, basic("string"), "string"),
                OUT_REDIRECT_STATUS => (&mut outs.redirect_status, basic("int"), "int"),
                OUT_NEW_SESSION => (&mut outs.new_session, self.is_session(&r.ty), session.as_str()),
                OUT_CLOSE_SESSION => (&mut outs.close_session, basic("bool"), "bool"),
                OUT_ENABLE_BACKGROUND_STREAMING => {
                    (&mut outs.enable_background_streaming, basic("bool"), "bool")
                }
                OUT_DISABLE_REFRESH_AFTER_HIDDEN => {
                    (&mut outs.disable_refresh_after_hidden, basic("bool"), "bool")
                }
                OUT_ERR => {
                    diags.push(loc, Self::wrong_output(site, r, "error"));
                    continue;
                }
                _ => {
                    let output = if name.is_empty() {
                        r.param.ty.to_string()
                    } else {
                        name.to_string()
                    };
                    diags.push(
                        loc,
                        AnalysisError::UnknownOutput {
                            receiver: site.receiver.to_string(),
                            method: site.name().to_string(),
                            output,
                        },
                    );
                    continue;
                }
            };
            if valid {
                *slot = Some(Self::output(r));
            } else {
                diags.push(loc, Self::wrong_output(site, r, expected));
            }
        }

        let at = site.location();
        let receiver = site.receiver.to_string();
        let method = site.name().to_string();

        if is_get && !body_seen {
            diags.push(
                at,
                AnalysisError::GetMissingBody {
                    receiver: receiver.clone(),
                    method: method.clone(),
                },
            );
        }
        if outs.redirect_status.is_some() && outs.redirect.is_none() {
            diags.push(
                at,
                AnalysisError::RedirectStatusWithoutRedirect {
                    receiver: receiver.clone(),
                    method: method.clone(),
                },
            );
        }
        if handler.inputs.sse.is_some() {
            for (present, output) in [
                (outs.new_session.is_some(), OUT_NEW_SESSION),
                (outs.close_session.is_some(), OUT_CLOSE_SESSION),
            ] {
                if present {
                    diags.push(
                        at,
                        AnalysisError::SessionOutputWithSse {
                            receiver: receiver.clone(),
                            method: method.clone(),
                            output: output.to_string(),
                        },
                    );
                }
            }
        }
        if !is_get {
            for (present, output) in [
                (outs.enable_background_streaming.is_some(), OUT_ENABLE_BACKGROUND_STREAMING),
                (
                    outs.disable_refresh_after_hidden.is_some(),
                    OUT_DISABLE_REFRESH_AFTER_HIDDEN,
                ),
            ] {
                if present {
                    diags.push(
                        at,
                        AnalysisError::GetOnlyOutput {
                            receiver: receiver.clone(),
                            method: method.clone(),
                            output: output.to_string(),
                        },
                    );
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Event handlers
    // ───────────────────────────────────────────────────────────────────────

    /// Parses an event handler. Returns `None` when the handled event type
    /// cannot be determined.
    pub fn parse_event_handler(
        &self,
        site: &MethodSite<'_>,
        suffix: &str,
        diags: &mut Diagnostics,
    ) -> Option<EventHandler> {
        let params = self.resolve_all(site, &site.func.ty.params);
        let receiver = site.receiver.to_string();
        let method = site.name().to_string();

        let first = match params.first() {
            Some(r) if r.param.name() == PARAM_EVENT => r,
            _ => {
                diags.push(
                    site.location(),
                    AnalysisError::EventHandlerFirstArgNotEvent { receiver, method },
                );
                self.event_handler_result(site, diags);
                return None;
            }
        };
        if !self.is_event(&first.ty) {
            diags.push(
                first.param.location(),
                AnalysisError::EventHandlerFirstArgTypeNotEvent {
                    receiver,
                    method,
                    found: first.ty.to_string(),
                },
            );
            self.event_handler_result(site, diags);
            return None;
        }
        let event_type = self
            .unit
            .unalias(first.ty.strip_pointer())
            .local_name()
            .unwrap_or_default()
            .to_string();

        let mut handler = EventHandler {
            method_name: method.clone(),
            name: suffix.to_string(),
            event_type,
            location: site.location().clone(),
            inherited_from: None,
            event: Some(Self::input(first)),
            sse: None,
            session_token: None,
            session: None,
            err: None,
            plugin_inputs: Vec::new(),
        };

        let mut i = 1;
        match params.get(1) {
            Some(r) if self.grammar.conventions().sse_type.matches(&r.ty) => {
                handler.sse = Some(Self::input(r));
                i += 1;
            }
            _ => diags.push(
                site.location(),
                AnalysisError::EventHandlerSecondArgNotSse {
                    receiver: receiver.clone(),
                    method: method.clone(),
                },
            ),
        }
        i = self.session_slots(
            site,
            &params,
            i,
            &mut handler.session_token,
            &mut handler.session,
            diags,
        );
        Self::unknown_inputs(site, params.get(i..).unwrap_or(&[]), diags);
        handler.err = self.event_handler_result(site, diags);
        Some(handler)
    }

    /// Checks that an event handler returns exactly one `error`.
    fn event_handler_result(
        &self,
        site: &MethodSite<'_>,
        diags: &mut Diagnostics,
    ) -> Option<Output> {
        let results = self.resolve_all(site, &site.func.ty.results);
        match results.as_slice() {
            [only] if only.ty.is_error() => Some(Self::output(only)),
            _ => {
                diags.push(
                    site.location(),
                    AnalysisError::EventHandlerReturnMustBeError {
                        receiver: site.receiver.to_string(),
                        method: site.name().to_string(),
                    },
                );
                None
            }
        }
    }

    /// Records an application hook without validating its signature.
    pub fn parse_hook(&self, site: &MethodSite<'_>) -> Hook {
        Hook {
            name: site.name().to_string(),
            location: site.location().clone(),
            inputs: self
                .resolve_all(site, &site.func.ty.params)
                .iter()
                .map(Self::input)
                .collect(),
            outputs: self
                .resolve_all(site, &site.func.ty.results)
                .iter()
                .map(Self::output)
                .collect(),
        }
    }
}
