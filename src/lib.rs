//! # Page Analyzer
//!
//! Static model extraction and validation for convention-based page
//! handlers written in Go.
//!
//! ## Pipeline
//!
//! 1. **Load**: parse every non-test `.go` file of one directory and
//!    type-check the declarations. Syntax errors are fatal.
//! 2. **Classify**: decide what each type and method is from its name
//!    (`App`, `Session`, `Event*`, `Page*`, abstract pages, `GET`, `POST*`,
//!    `On*`), reading routes and event subjects from doc comments.
//! 3. **Parse signatures**: match parameters and results against the slot
//!    grammar of the framework.
//! 4. **Flatten**: merge handlers inherited through embedded abstract pages.
//! 5. **Cross-validate**: routes against path fields, dispatched events
//!    against declared events, reflected signals against signals.
//!
//! ## Output
//!
//! An [`Analysis`] holds the [`model::App`] (absent only when loading
//! failed or the `App` type is missing) and every [`diagnostics::Diagnostic`]
//! in a stable order.

use std::path::Path;

use lazy_static::lazy_static;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{instrument, warn};

mod analyzer;
mod crossval;
mod events;
mod flatten;
mod index;
mod params;
mod route;
mod signature;
mod tags;

pub mod conventions;
pub mod diagnostics;
pub mod lexer;
pub mod loader;
pub mod model;
pub mod parser;
pub mod plugin;
pub mod source;
pub mod syntax;
pub mod types;

#[cfg(test)]
mod analyzer_tests;
#[cfg(test)]
mod fuzz_tests;

pub use conventions::{Conventions, ConventionsError};
pub use diagnostics::{AnalysisError, Diagnostic, Diagnostics, Family};
pub use loader::{LoadError, Unit};
pub use model::App;
pub use plugin::Plugin;
pub use source::SourceLocation;

use analyzer::AnalysisContext;
use conventions::Grammar;

lazy_static! {
    static ref DEFAULT_GRAMMAR: Grammar =
        Grammar::new(Conventions::default()).expect("default conventions compile");
}

/// The result of analyzing one compilation unit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub app: Option<App>,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    /// True when no diagnostics were emitted.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    fn load_failure(err: LoadError) -> Self {
        warn!(error = %err, "failed to load unit");
        let mut diagnostics = Diagnostics::new();
        let location = err.location().cloned().unwrap_or_else(SourceLocation::unknown);
        diagnostics.push(
            &location,
            AnalysisError::Load {
                message: err.to_string(),
            },
        );
        Analysis {
            app: None,
            diagnostics,
        }
    }
}

pub struct Analyzer {
    grammar: Grammar,
    plugins: Vec<Box<dyn Plugin>>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            grammar: DEFAULT_GRAMMAR.clone(),
            plugins: Vec::new(),
        }
    }

    pub fn with_conventions(mut self, conventions: Conventions) -> Result<Self, ConventionsError> {
        self.grammar = Grammar::new(conventions)?;
        Ok(self)
    }

    /// Registers a plugin. Plugins run in registration order.
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn conventions(&self) -> &Conventions {
        self.grammar.conventions()
    }

    /// Loads and analyzes the unit in `dir`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn analyze(&self, dir: impl AsRef<Path>) -> Analysis {
        match loader::load_dir(dir.as_ref()) {
            Ok(unit) => self.analyze_unit(&unit),
            Err(err) => Analysis::load_failure(err),
        }
    }

    /// Analyzes in-memory `(file name, source)` pairs as one unit.
    #[instrument(skip_all, fields(files = sources.len()))]
    pub fn analyze_sources(&self, sources: &[(&str, &str)]) -> Analysis {
        match Unit::from_sources(sources) {
            Ok(unit) => self.analyze_unit(&unit),
            Err(err) => Analysis::load_failure(err),
        }
    }

    /// Analyzes an already loaded unit.
    pub fn analyze_unit(&self, unit: &Unit) -> Analysis {
        let (app, diagnostics) = AnalysisContext::new(unit, &self.grammar, &self.plugins).run();
        Analysis { app, diagnostics }
    }

    /// Analyzes independent units in parallel. Results keep the input order.
    pub fn analyze_many<P>(&self, dirs: &[P]) -> Vec<Analysis>
    where
        P: AsRef<Path> + Sync,
    {
        dirs.par_iter().map(|dir| self.analyze(dir)).collect()
    }
}
