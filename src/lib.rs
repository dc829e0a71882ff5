//! cbloop: cooperative async/await for the Cb interpreter
//!
//! Async calls become tasks that a single-threaded scheduler advances one
//! top-level statement at a time, interleaving them round-robin. `await`
//! drives the scheduler until the awaited task is done; `sleep` and
//! `timeout` are plain timers checked on every step.
//!
//! # Example
//!
//! ```no_run
//! use cbloop::{run_source, Result};
//!
//! fn main() -> Result<()> {
//!     let report = run_source(r#"(
//!         functions: [(name: "answer", is_async: true, body: [Return(Some(Lit(Int(42))))])],
//!         main: [Print(Await(Call(name: "answer", args: [])))],
//!     )"#)?;
//!     assert_eq!(report.output, vec!["42".to_string()]);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod backends;
pub mod frontend;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::backends::interpreter::Interpreter;
use crate::frontend::ast::Program;
use crate::frontend::ProgramSummary;
use crate::runtime::scheduler::{Scheduler, SchedulerStats, TaskSummary};
use crate::util::config::RuntimeConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display name
pub const NAME: &str = "cbloop (Cb async runtime)";

/// What a finished run leaves behind
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Captured `print` output
    pub output: Vec<String>,
    /// Every task ever registered, in registration order
    pub tasks: Vec<TaskSummary>,
    pub stats: SchedulerStats,
}

/// Execute a parsed program with the given configuration.
pub fn run_program(
    program: &Program,
    config: &RuntimeConfig,
) -> Result<RunReport> {
    let mut scheduler = Scheduler::with_config(config.scheduler.clone());
    let mut interpreter = Interpreter::with_config(config.interpreter.clone());
    interpreter
        .run_program(program, &mut scheduler)
        .context("Program aborted")?;
    debug!("Run complete: {:?}", scheduler.stats());
    Ok(RunReport {
        output: interpreter.take_output(),
        tasks: scheduler.summaries(),
        stats: scheduler.stats().clone(),
    })
}

/// Run RON program source with default configuration (output not echoed).
pub fn run_source(source: &str) -> Result<RunReport> {
    let mut config = RuntimeConfig::default();
    config.interpreter.echo_output = false;
    run_source_with(source, &config)
}

/// Run RON program source.
pub fn run_source_with(
    source: &str,
    config: &RuntimeConfig,
) -> Result<RunReport> {
    let program = frontend::parse_program(source).context("Failed to parse program")?;
    run_program(&program, config)
}

/// Run a RON program file.
pub fn run_file(
    path: &Path,
    config: &RuntimeConfig,
) -> Result<RunReport> {
    debug!("Running {}", path.display());
    let program = frontend::load_program(path)
        .with_context(|| format!("Failed to load program: {}", path.display()))?;
    run_program(&program, config)
}

/// Load a program file without running it.
pub fn check_file(path: &Path) -> Result<ProgramSummary> {
    let program = frontend::load_program(path)
        .with_context(|| format!("Failed to load program: {}", path.display()))?;
    Ok(ProgramSummary::of(&program))
}
