//! Pageflow CLI Library
//!
//! Command-line interface for the Pageflow acceptance harness: runs the
//! built-in to-do suites, lists them, prints the effective configuration and
//! serves the to-do backend stub.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)] // String building is clear and correct
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, DriverKind, HarnessArgs, ListArgs, ReportFormat, SeedArg,
    SelectArgs, ServeArgs, TestArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{describe_scenario, format_summary, ConsoleSink, ProgressReporter, Tally};
pub use runner::{
    apply_overrides, driver_factory, render_config, render_list, render_report,
    resolve_harness_config, scenario_filter, select_scenarios, write_artifacts, TestRunner,
    JSON_REPORT, JUNIT_REPORT,
};
