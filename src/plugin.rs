//! Plugin hooks.
//!
//! Plugins run after a handler has been parsed and attached to its page. They
//! may append synthetic inputs and outputs; they never see a mutable model.
//! Every hook has a no-op default so a plugin only implements what it needs.

use crate::model::{AbstractPage, EventHandler, Handler, Input, Output, Page};

/// The page or abstract page that owns the handler being processed.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Page(&'a Page),
    Abstract(&'a AbstractPage),
}

impl<'a> Owner<'a> {
    pub fn type_name(&self) -> &'a str {
        match self {
            Owner::Page(p) => &p.type_name,
            Owner::Abstract(a) => &a.type_name,
        }
    }

    pub fn page(&self) -> Option<&'a Page> {
        match self {
            Owner::Page(p) => Some(p),
            Owner::Abstract(_) => None,
        }
    }

    pub fn abstract_page(&self) -> Option<&'a AbstractPage> {
        match self {
            Owner::Abstract(a) => Some(a),
            Owner::Page(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    pub owner: Owner<'a>,
    pub handler: &'a Handler,
    pub receiver: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct EventHandlerPluginContext<'a> {
    pub owner: Owner<'a>,
    pub event_handler: &'a EventHandler,
    pub receiver: &'a str,
}

pub trait Plugin: Send + Sync {
    fn on_get_inputs(&self, _ctx: &PluginContext<'_>) -> Vec<Input> {
        Vec::new()
    }

    fn on_get_outputs(&self, _ctx: &PluginContext<'_>) -> Vec<Output> {
        Vec::new()
    }

    fn on_action_inputs(&self, _ctx: &PluginContext<'_>) -> Vec<Input> {
        Vec::new()
    }

    fn on_action_outputs(&self, _ctx: &PluginContext<'_>) -> Vec<Output> {
        Vec::new()
    }

    fn on_event_handler_inputs(&self, _ctx: &EventHandlerPluginContext<'_>) -> Vec<Input> {
        Vec::new()
    }
}

/// Additions collected from all plugins for one handler.
#[derive(Debug, Default)]
pub(crate) struct Additions {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

pub(crate) fn collect_handler_additions(
    plugins: &[Box<dyn Plugin>],
    ctx: &PluginContext<'_>,
) -> Additions {
    let mut out = Additions::default();
    let is_get = ctx.handler.method == crate::conventions::HttpMethod::Get;
    for plugin in plugins {
        if is_get {
            out.inputs.extend(plugin.on_get_inputs(ctx));
            out.outputs.extend(plugin.on_get_outputs(ctx));
        } else {
            out.inputs.extend(plugin.on_action_inputs(ctx));
            out.outputs.extend(plugin.on_action_outputs(ctx));
        }
    }
    out
}

pub(crate) fn collect_event_handler_additions(
    plugins: &[Box<dyn Plugin>],
    ctx: &EventHandlerPluginContext<'_>,
) -> Vec<Input> {
    plugins
        .iter()
        .flat_map(|p| p.on_event_handler_inputs(ctx))
        .collect()
}
