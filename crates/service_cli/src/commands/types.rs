//! `itsolve types`: list what the registries know about.

use serde::Serialize;
use solver_core::DenseVector;
use solver_krylov::KrylovRegistry;
use solver_newton::LineSearchRegistry;
use solver_ordering::BasicOrdering;

use super::output::{emit, Report};
use super::PRECONDITIONERS;
use crate::config::OutputFormat;
use crate::Result;

/// Registered type names per component.
#[derive(Debug, Clone, Serialize)]
pub struct TypesReport {
    pub krylov_methods: Vec<String>,
    pub line_searches: Vec<String>,
    pub preconditioners: Vec<String>,
    pub orderings: Vec<String>,
}

impl Report for TypesReport {
    fn title(&self) -> String {
        "Registered types".to_string()
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ksp", self.krylov_methods.join(", ")),
            ("line search", self.line_searches.join(", ")),
            ("pc", self.preconditioners.join(", ")),
            ("ao", self.orderings.join(", ")),
        ]
    }
}

/// Collect the default registries.
pub fn execute() -> TypesReport {
    let methods = KrylovRegistry::<DenseVector>::with_defaults();
    let line_searches = LineSearchRegistry::<DenseVector>::with_defaults();
    TypesReport {
        krylov_methods: methods.names().into_iter().map(str::to_string).collect(),
        line_searches: line_searches.names().into_iter().map(str::to_string).collect(),
        preconditioners: PRECONDITIONERS.iter().map(|s| s.to_string()).collect(),
        orderings: vec![BasicOrdering::NAME.to_string()],
    }
}

/// Run the `types` command.
pub fn run(format: OutputFormat) -> Result<()> {
    emit(&execute(), format)
}
