//! itsolve CLI - Command Line Front End for the Iterative Solvers
//!
//! Runs the Krylov, Newton and ordering layers on small model problems.
//!
//! # Commands
//!
//! - `itsolve linear` - Krylov solve of a 1-D Poisson or scaled identity system
//! - `itsolve trust-region` - QCG trust-region step on a shifted Laplacian
//! - `itsolve newton` - Newton solve of the 1-D Bratu problem
//! - `itsolve ordering` - Translate indices through an application ordering
//! - `itsolve types` - List registered solver types
//!
//! # Architecture
//!
//! As part of the **S**ervice layer, this crate wires configuration
//! (TOML file, `ITSOLVE_*` environment variables, flags) into the solver
//! crates and prints reports as tables or JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

use commands::linear::LinearArgs;
use commands::newton::NewtonArgs;
use commands::ordering::OrderingArgs;
use commands::trust_region::TrustRegionArgs;
use config::{build_config, CliArgs, LogLevel};

/// Iterative solver toolkit CLI
#[derive(Parser)]
#[command(name = "itsolve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a model linear system with a Krylov method
    Linear {
        /// Number of unknowns
        #[arg(short = 'n', long, default_value = "64")]
        size: usize,

        /// Model problem (poisson, identity)
        #[arg(short, long, default_value = "poisson")]
        problem: String,

        /// Krylov method (richardson, tfqmr, qcg)
        #[arg(short = 't', long)]
        ksp_type: Option<String>,

        /// Preconditioner (none, jacobi)
        #[arg(long, default_value = "none")]
        pc: String,

        /// Preconditioning side (left, right, symmetric)
        #[arg(long)]
        pc_side: Option<String>,

        /// Relative residual tolerance
        #[arg(long)]
        rtol: Option<f64>,

        /// Iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Print the solver description after the report
        #[arg(long)]
        view: bool,
    },

    /// Compute a QCG trust-region step
    TrustRegion {
        /// Number of unknowns
        #[arg(short = 'n', long, default_value = "64")]
        size: usize,

        /// Trust-region radius
        #[arg(short, long)]
        radius: f64,

        /// Shift added to the Laplacian diagonal (negative values make it indefinite)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        shift: f64,

        /// Preconditioner (none, jacobi)
        #[arg(long, default_value = "none")]
        pc: String,
    },

    /// Solve the 1-D Bratu problem with Newton's method
    Newton {
        /// Number of interior grid points
        #[arg(short = 'n', long, default_value = "63")]
        size: usize,

        /// Bratu parameter
        #[arg(short, long, default_value = "1.0")]
        lambda: f64,

        /// Line search (basic, basicnonorms, quadratic, cubic)
        #[arg(long)]
        line_search: Option<String>,

        /// Newton iteration cap
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Preconditioner for the inner linear solves (none, jacobi)
        #[arg(long, default_value = "none")]
        pc: String,

        /// Print the solver description after the report
        #[arg(long)]
        view: bool,
    },

    /// Translate indices through a basic application ordering
    Ordering {
        /// Application index of each native index, comma separated
        #[arg(short, long, allow_hyphen_values = true)]
        application: String,

        /// Native indices paired with `--application` (default 0..n)
        #[arg(long, allow_hyphen_values = true)]
        native: Option<String>,

        /// Indices to translate, comma separated; negatives pass through
        #[arg(short, long, allow_hyphen_values = true)]
        indices: String,

        /// Translate application indices to native
        #[arg(long)]
        reverse: bool,

        /// Print the ordering table after the report
        #[arg(long)]
        view: bool,
    },

    /// List registered solver types
    Types,
}

/// Initialise tracing with `RUST_LOG` taking precedence over the configured level.
fn init_tracing(level: LogLevel) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str())))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = build_config(&CliArgs {
        config_file: cli.config,
        log_level: cli.log_level,
        format: cli.format,
    })?;
    init_tracing(config.log_level);
    debug!(log_level = %config.log_level, format = %config.format, "configuration loaded");

    match cli.command {
        Commands::Linear {
            size,
            problem,
            ksp_type,
            pc,
            pc_side,
            rtol,
            max_iterations,
            view,
        } => commands::linear::run(
            &config.linear,
            &LinearArgs {
                size,
                problem,
                ksp_type,
                pc,
                pc_side,
                rtol,
                max_iterations,
                view,
            },
            config.format,
        ),
        Commands::TrustRegion {
            size,
            radius,
            shift,
            pc,
        } => commands::trust_region::run(
            &config.linear,
            &TrustRegionArgs {
                size,
                radius,
                shift,
                pc,
            },
            config.format,
        ),
        Commands::Newton {
            size,
            lambda,
            line_search,
            max_iterations,
            pc,
            view,
        } => commands::newton::run(
            &config.newton,
            &NewtonArgs {
                size,
                lambda,
                line_search,
                max_iterations,
                pc,
                view,
            },
            config.format,
        ),
        Commands::Ordering {
            application,
            native,
            indices,
            reverse,
            view,
        } => commands::ordering::run(
            &OrderingArgs {
                application,
                native,
                indices,
                reverse,
                view,
            },
            config.format,
        ),
        Commands::Types => commands::types::run(config.format),
    }
}
