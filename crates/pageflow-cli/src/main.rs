//! Pageflow CLI: run page-object acceptance suites
//!
//! ## Usage
//!
//! ```bash
//! pageflow test                         # Run every scenario
//! pageflow test --tag smoke             # Only scenarios tagged smoke
//! pageflow test --format junit -o out   # JUnit on stdout, reports in out/
//! pageflow list --suite 02-advanced     # Show what would run
//! pageflow test --update-snapshots      # Rewrite 03-visual baselines
//! pageflow serve --items items.json     # To-do backend stub on :8000
//! pageflow test --seed service          # Seed from the backend's GET /items
//! ```

use clap::Parser;
use pageflow_cli::{
    handlers, render_config, render_list, render_report, resolve_harness_config,
    select_scenarios, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs,
    ListArgs, ServeArgs, TestArgs, TestRunner, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &CliConfig) -> CliResult<()> {
    match command {
        Commands::Test(args) => run_tests(config, &args),
        Commands::List(args) => run_list(&args),
        Commands::Config(args) => run_config(&args),
        Commands::Serve(args) => run_serve(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let color: ColorChoice = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(color)
}

fn init_tracing(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

fn run_tests(config: &CliConfig, args: &TestArgs) -> CliResult<()> {
    let rt = runtime()?;
    let run = rt.block_on(TestRunner::new(config.clone()).run(args))?;

    print!("{}", render_report(&run, args.format)?);

    if run.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: run.failed_count(),
            total: run.total(),
        })
    }
}

fn run_list(args: &ListArgs) -> CliResult<()> {
    print!("{}", render_list(&select_scenarios(&args.select), args.json)?);
    Ok(())
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let config = resolve_harness_config(&args.harness)?;
    print!("{}", render_config(&config, args.json)?);
    Ok(())
}

fn run_serve(args: &ServeArgs) -> CliResult<()> {
    runtime()?.block_on(handlers::serve(args))
}
