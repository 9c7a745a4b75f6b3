//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use pageflow::todo::SeedMode;
use std::path::PathBuf;

use crate::config::ColorChoice;

/// Pageflow: page-object acceptance testing for browser-driven scenarios
#[derive(Parser, Debug)]
#[command(name = "pageflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run acceptance scenarios
    Test(TestArgs),

    /// List scenarios without running them
    List(ListArgs),

    /// Print the effective harness configuration
    Config(ConfigArgs),

    /// Serve the to-do backend stub
    Serve(ServeArgs),
}

/// Scenario selection shared by `test` and `list`
#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
    /// Only scenarios carrying this tag (repeatable, any of)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Only scenarios of this suite
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Only scenarios whose `suite::name` contains this text
    #[arg(short, long)]
    pub grep: Option<String>,
}

/// Harness options shared by `test` and `config`
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Harness config file (.yaml, .yml or .json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL relative navigation resolves against
    #[arg(long)]
    pub base_url: Option<String>,

    /// Per-action timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Whole-scenario retries on failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Parallel workers (0 = one per core)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Run the browser without a window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Run the browser with a window
    #[arg(long)]
    pub headed: bool,

    /// Initial to-do list of the sample app
    #[arg(long)]
    pub seed: Option<SeedArg>,

    /// To-do backend queried for `GET /items` by the service seed
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Rewrite visual snapshot baselines instead of comparing
    #[arg(long)]
    pub update_snapshots: bool,

    /// Output directory for reports and screenshots
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop scheduling scenarios after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

impl HarnessArgs {
    /// `Some` when `--headless` or `--headed` was given
    #[must_use]
    pub const fn headless_override(&self) -> Option<bool> {
        if self.headless {
            Some(true)
        } else if self.headed {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the test command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Scenario selection
    #[command(flatten)]
    pub select: SelectArgs,

    /// Harness overrides
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Browser driver
    #[arg(long, default_value = "mock")]
    pub driver: DriverKind,

    /// Format of the report printed to stdout
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Scenario selection
    #[command(flatten)]
    pub select: SelectArgs,

    /// Print a JSON array instead of one id per line
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Harness overrides
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// JSON file of `{text, completed}` items served at `/items`
    #[arg(long)]
    pub items: Option<PathBuf>,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Detect from the terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Browser driver
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverKind {
    /// In-process simulated browser running the sample app
    #[default]
    Mock,
    /// Chromium over CDP (needs the `browser` feature)
    Chromium,
}

/// Seed argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedArg {
    /// Built-in three-item list
    Static,
    /// Items from the backend
    Service,
}

impl From<SeedArg> for SeedMode {
    fn from(arg: SeedArg) -> Self {
        match arg {
            SeedArg::Static => Self::Static,
            SeedArg::Service => Self::Service,
        }
    }
}

/// Report format on stdout
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON run report
    Json,
    /// JUnit XML
    Junit,
}
