//! `itsolve ordering`: translate indices through a basic application ordering.

use serde::Serialize;
use solver_ordering::ApplicationOrdering;
use tracing::info;

use super::output::{emit, Report};
use super::parse_index_list;
use crate::config::OutputFormat;
use crate::Result;

/// Arguments of the `ordering` command.
#[derive(Debug, Clone)]
pub struct OrderingArgs {
    /// Application numbering of native indices `0..n` (or of `native`).
    pub application: String,
    pub native: Option<String>,
    pub indices: String,
    /// Map application indices to native instead.
    pub reverse: bool,
    pub view: bool,
}

/// Translated indices.
#[derive(Debug, Clone, Serialize)]
pub struct OrderingReport {
    pub size: usize,
    pub direction: &'static str,
    pub input: Vec<i64>,
    pub output: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

fn join(indices: &[i64]) -> String {
    indices
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Report for OrderingReport {
    fn title(&self) -> String {
        format!("Application ordering (n = {})", self.size)
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("direction", self.direction.to_string()),
            ("input", join(&self.input)),
            ("output", join(&self.output)),
        ]
    }

    fn details(&self) -> Vec<String> {
        self.view
            .as_deref()
            .map(|view| view.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Build the ordering and translate `indices`.
pub fn execute(args: &OrderingArgs) -> Result<OrderingReport> {
    let application = parse_index_list(&args.application)?;
    let native = args.native.as_deref().map(parse_index_list).transpose()?;
    let mut ordering = ApplicationOrdering::basic(&application, native.as_deref())?;

    let input = parse_index_list(&args.indices)?;
    let mut output = input.clone();
    let direction = if args.reverse {
        ordering.application_to_native(&mut output)?;
        "application -> native"
    } else {
        ordering.native_to_application(&mut output)?;
        "native -> application"
    };
    info!(size = ordering.size(), count = input.len(), direction, "translated indices");

    let view = if args.view {
        let mut text = String::new();
        ordering.view(&mut text)?;
        Some(text)
    } else {
        None
    };
    let size = ordering.size();
    ordering.destroy();

    Ok(OrderingReport {
        size,
        direction,
        input,
        output,
        view,
    })
}

/// Run the `ordering` command.
pub fn run(args: &OrderingArgs, format: OutputFormat) -> Result<()> {
    let report = execute(args)?;
    emit(&report, format)
}
