//! Pollster CLI - run a command until it exits 0
//!
//! Exit code 0 from the command means "ready", 1 means "not yet", anything
//! else aborts the poll.

mod logging;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use serde_json::json;
use std::process::ExitCode;
use tracing::info;

use pollster_core::application::constants::DEFAULT_SUBPROCESS_TIMEOUT_MS;
use pollster_core::domain::{ConfigError, Interval, MaxAttempts, PollConfig, PollReport};
use pollster_core::{PollError, Poller};
use pollster_infra_system::{SpawnOptions, StdioMode, SubprocessPredicate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command exited 0 within the budget
const EXIT_READY: u8 = 0;
/// Attempt budget exhausted
const EXIT_EXHAUSTED: u8 = 1;
/// Configuration or predicate error
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "pollster")]
#[command(about = "Poll a command until it succeeds", long_about = None)]
#[command(version)]
struct Cli {
    /// Milliseconds between the end of one attempt and the start of the next
    #[arg(short, long, env = "POLLSTER_INTERVAL_MS", value_parser = parse_interval,
          default_value = "1000", allow_negative_numbers = true)]
    interval: Interval,

    /// Maximum number of attempts ("inf" for unbounded)
    #[arg(short = 'n', long, env = "POLLSTER_MAX_ATTEMPTS", value_parser = parse_max_attempts,
          default_value = "inf", allow_negative_numbers = true)]
    max_attempts: MaxAttempts,

    /// Milliseconds one attempt may run before the command is killed
    #[arg(short, long, env = "POLLSTER_TIMEOUT_MS", default_value_t = DEFAULT_SUBPROCESS_TIMEOUT_MS,
          allow_negative_numbers = true)]
    timeout: i64,

    /// Working directory for the command (~ is expanded)
    #[arg(long)]
    cwd: Option<String>,

    /// Extra environment variable for the command (KEY=VALUE, repeatable)
    #[arg(short, long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Signal sent when an attempt times out (default SIGKILL)
    #[arg(long)]
    kill_signal: Option<String>,

    /// Show the command's stdout/stderr
    #[arg(long)]
    show_output: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Command and arguments to poll
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn parse_interval(s: &str) -> std::result::Result<Interval, ConfigError> {
    s.parse()
}

fn parse_max_attempts(s: &str) -> std::result::Result<MaxAttempts, ConfigError> {
    s.parse()
}

fn parse_env_pair(s: &str) -> std::result::Result<(String, String), ConfigError> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidOption(format!(
            "environment variable {} is not KEY=VALUE",
            s
        ))),
    }
}

impl Cli {
    fn spawn_options(&self) -> SpawnOptions {
        let mut options = SpawnOptions::new().stdio(if self.show_output {
            StdioMode::Inherit
        } else {
            StdioMode::Null
        });

        if let Some(cwd) = &self.cwd {
            options = options.cwd(shellexpand::tilde(cwd).into_owned());
        }
        for (key, value) in &self.env {
            options = options.env(key, value);
        }
        if let Some(signal) = &self.kill_signal {
            options = options.kill_signal(signal);
        }

        options
    }

    fn predicate(&self) -> Result<SubprocessPredicate> {
        let (program, args) = self
            .command
            .split_first()
            .context("No command given")?;

        SubprocessPredicate::new(program, args.iter().cloned(), self.spawn_options(), self.timeout)
            .context("Invalid predicate configuration")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{} {:#}", "warning:".yellow().bold(), e);
    }

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if cli.json {
                println!("{}", json!({ "state": "FAILED", "error": format!("{:#}", e) }));
            } else {
                eprintln!("{} {:#}", "error:".red().bold(), e);
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let predicate = cli.predicate()?;
    let config = PollConfig::new(cli.interval, cli.max_attempts);

    info!(
        version = VERSION,
        command = ?cli.command,
        interval_ms = config.interval.as_millis(),
        max_attempts = %config.max_attempts,
        "Pollster starting"
    );

    let outcome = Poller::default().poll(&predicate, &config).await;
    Ok(report(cli, outcome))
}

/// Print the outcome and pick the exit code
fn report(cli: &Cli, outcome: pollster_core::Result<PollReport>) -> u8 {
    match outcome {
        Ok(report) => {
            if cli.json {
                println!("{}", json!(report));
            } else {
                println!(
                    "{} condition met after {} attempt(s) in {}ms",
                    "✓".green().bold(),
                    report.attempts,
                    report.elapsed_ms
                );
            }
            EXIT_READY
        }
        Err(e) => {
            let code = if e.is_exhausted() {
                EXIT_EXHAUSTED
            } else {
                EXIT_ERROR
            };
            if cli.json {
                let attempts = match &e {
                    PollError::AttemptsExhausted { attempts } => Some(*attempts),
                    _ => None,
                };
                println!(
                    "{}",
                    json!({ "state": "FAILED", "error": e.to_string(), "attempts": attempts })
                );
            } else {
                eprintln!("{} {}", "✗".red().bold(), e);
            }
            code
        }
    }
}
