//! `replcheck` command-line entry point.
//!
//! Starts the configured REPL on a pseudo-terminal, runs a suite against it
//! and prints the results. Exits 0 only when nothing failed, every group ran
//! to completion and the run was not interrupted.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use replcheck::config::env::{DEFAULT_PREFIX, EnvConfig};
use replcheck::config::file::load_config;
use replcheck::report::{Console, no_color_requested};
use replcheck::suite::{self, Suite, SuiteReport, run_suite};
use replcheck::{
    ExpectError, HarnessConfig, Markers, PatternSpec, PtySession, Result, ScenarioRunner,
    Session, TestLedger,
};
use tracing_subscriber::EnvFilter;

/// Drive an interactive REPL through a pseudo-terminal and check its output.
#[derive(Clone, Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// Harness configuration file (TOML).
    #[clap(long = "config")]
    config: Option<PathBuf>,

    /// Suite file (TOML); the built-in RShell suite runs when omitted.
    #[clap(long = "suite")]
    suite: Option<PathBuf>,

    /// Also print the ledger and summary as JSON.
    #[clap(long = "json")]
    json: bool,

    /// Disable colored output.
    #[clap(long = "no-color")]
    no_color: bool,

    /// Increase log verbosity on stderr (repeatable).
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Literal primary prompt marker.
    #[clap(long = "prompt")]
    prompt: Option<String>,

    /// Default step timeout in milliseconds.
    #[clap(long = "step-timeout-ms")]
    step_timeout_ms: Option<u64>,

    /// Startup timeout in milliseconds.
    #[clap(long = "startup-timeout-ms")]
    startup_timeout_ms: Option<u64>,

    /// Line sent to ask the program to exit.
    #[clap(long = "quit-command")]
    quit_command: Option<String>,

    /// Program and arguments to run instead of the configured command.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    /// Overlay command-line flags onto `config`.
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some((program, args)) = self.command.split_first() {
            config.session.program.clone_from(program);
            config.session.args = args.to_vec();
        }
        if let Some(prompt) = &self.prompt {
            config.markers.prompt = PatternSpec::literal(prompt);
        }
        if let Some(ms) = self.step_timeout_ms {
            config.timeouts.step = Duration::from_millis(ms);
        }
        if let Some(ms) = self.startup_timeout_ms {
            config.timeouts.startup = Duration::from_millis(ms);
        }
        if let Some(quit) = &self.quit_command {
            config.session.shutdown.quit_command.clone_from(quit);
        }
    }

    fn color(&self) -> bool {
        !self.no_color && !no_color_requested()
    }
}

/// Defaults, then the config file, then the environment, then flags.
fn layered_config(cli: &Cli, env: &EnvConfig) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    env.apply(&mut config)?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// How waiting for the first prompt ended.
#[derive(Debug)]
enum Startup {
    Ready,
    Failed(ExpectError),
    Interrupted,
}

/// Wait for the first prompt unless `interrupt` resolves first.
async fn start<S: Session>(runner: &mut ScenarioRunner<S>, interrupt: impl Future<Output = ()>) -> Startup {
    tokio::select! {
        result = runner.await_ready() => match result {
            Ok(()) => Startup::Ready,
            Err(e) => Startup::Failed(e),
        },
        () = interrupt => Startup::Interrupted,
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = layered_config(cli, &EnvConfig::from_env(DEFAULT_PREFIX))?;
    let suite = match &cli.suite {
        Some(path) => Suite::load(path)?,
        None => suite::rshell(),
    };
    let markers = Markers::compile(&config.markers)?;

    let mut console = Console::stdout(cli.color());
    console.banner(&suite.title);
    console.starting(&config.session.command_line());

    let session = match PtySession::spawn(&config.session).await {
        Ok(session) => session,
        Err(e) => {
            console.start_failed(&e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let mut runner = ScenarioRunner::new(session, markers, config.timeouts);
    match start(&mut runner, interrupted()).await {
        Startup::Ready => console.started(),
        Startup::Failed(e) => {
            console.start_failed(&e);
            runner.shutdown().await;
            return Ok(ExitCode::FAILURE);
        }
        Startup::Interrupted => {
            console.interrupted();
            runner.shutdown().await;
            console.summary(&TestLedger::new().summary());
            return Ok(ExitCode::FAILURE);
        }
    }

    let mut ledger = TestLedger::new();
    let report = tokio::select! {
        report = run_suite(&mut runner, &suite, &mut ledger, &mut console) => Some(report),
        () = interrupted() => None,
    };
    if report.is_none() {
        console.interrupted();
    }

    runner.shutdown().await;

    let summary = ledger.summary();
    console.summary(&summary);
    if cli.json {
        console.json(&ledger)?;
    }

    let clean = report.as_ref().is_some_and(SuiteReport::completed) && summary.all_passed();
    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(error: &ExpectError) {
    tracing::error!(error = %error.summary(), "harness failed");
    eprintln!("error: {error}");
}
