use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use elevated_launcher::config::{load_config, validate_config, Config, ConfigLoader};
use elevated_launcher::{
    LaunchError, LaunchOptions, LaunchSpec, LaunchedProcess, Launcher, OsApi, ProcessState,
};

/// Start a program in the interactive user's desktop session
#[derive(Debug, Parser)]
#[command(name = "elevated-launcher", version, about)]
struct Cli {
    /// Executable to start
    #[arg(long)]
    path: String,

    /// Argument string appended to the executable path
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    args: String,

    /// Working directory of the child
    #[arg(long)]
    workdir: Option<String>,

    /// Configuration file (defaults to elevated-launcher.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wait at most this long for the child; overrides the configured timeout
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Return as soon as the child is running
    #[arg(long)]
    no_wait: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn spec(&self) -> LaunchSpec {
        let mut spec = LaunchSpec::new(self.path.as_str()).with_arguments(self.args.as_str());
        if let Some(dir) = &self.workdir {
            spec = spec.with_working_directory(dir.as_str());
        }
        spec
    }
}

const EXIT_LAUNCH_FAILED: i32 = 1;
const EXIT_TIMED_OUT: i32 = 124;
const EXIT_INTERRUPTED: i32 = 130;

/// How supervision of the child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Detached,
    Exited,
    TimedOut { killed: bool },
    Interrupted,
}

#[derive(Debug, Serialize)]
struct LaunchReport {
    command_line: String,
    pid: u32,
    outcome: Outcome,
    #[serde(flatten)]
    state: ProcessState,
}

impl LaunchReport {
    /// Exit code of this program: the child's own code when it exited on
    /// its own, never a success code for a child that was cut short
    fn exit_code(&self) -> i32 {
        match (self.outcome, self.state) {
            (Outcome::TimedOut { .. }, _) => EXIT_TIMED_OUT,
            (Outcome::Interrupted, _) => EXIT_INTERRUPTED,
            (_, ProcessState::Exited(code)) => code as i32,
            (Outcome::Detached, _) => 0,
            _ => EXIT_LAUNCH_FAILED,
        }
    }
}

#[derive(Debug, Serialize)]
struct FailureReport {
    error: String,
    kind: &'static str,
    os_code: Option<u32>,
}

impl From<&LaunchError> for FailureReport {
    fn from(err: &LaunchError) -> Self {
        FailureReport {
            error: err.to_string(),
            kind: err.kind(),
            os_code: err.os_code(),
        }
    }
}

fn load(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::new(path)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => load_config().context("loading default configuration")?,
    };
    validate_config(&config)?;
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Kill the child and block until the OS reports it gone
fn terminate<O: OsApi>(process: &LaunchedProcess<O>) -> Result<()> {
    process.kill()?;
    process.wait()?;
    Ok(())
}

/// Wait for the child, racing Ctrl+C; a timeout optionally kills it
async fn supervise<O: OsApi + 'static>(
    process: Arc<LaunchedProcess<O>>,
    timeout: Option<Duration>,
    kill_on_timeout: bool,
) -> Result<Outcome> {
    let waiter = Arc::clone(&process);
    let wait = tokio::task::spawn_blocking(move || match timeout {
        Some(timeout) => waiter.wait_timeout(timeout),
        None => waiter.wait().map(|()| true),
    });

    tokio::select! {
        joined = wait => {
            if joined.context("wait task failed")?? {
                return Ok(Outcome::Exited);
            }
            warn!(pid = process.pid(), ?timeout, "child still running after timeout");
            if kill_on_timeout {
                terminate(&process)?;
            }
            Ok(Outcome::TimedOut { killed: kill_on_timeout })
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            warn!(pid = process.pid(), "interrupted, terminating child");
            terminate(&process)?;
            Ok(Outcome::Interrupted)
        }
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
async fn run<O: OsApi + 'static>(os: Arc<O>, cli: &Cli, config: &Config) -> Result<i32> {
    let spec = cli.spec();
    let launcher = Launcher::with_options(os, LaunchOptions::from_config(config));

    let process = match launcher.start_elevated(&spec) {
        Ok(process) => Arc::new(process),
        Err(err) => {
            error!(kind = err.kind(), os_code = ?err.os_code(), "{}", err);
            let report = FailureReport::from(&err);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                eprintln!("launch failed [{}]: {}", report.kind, report.error);
            }
            return Ok(EXIT_LAUNCH_FAILED);
        }
    };

    let outcome = if cli.no_wait {
        Outcome::Detached
    } else {
        let timeout = match cli.timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => config.launch.wait_timeout(),
        };
        supervise(Arc::clone(&process), timeout, config.launch.kill_on_timeout).await?
    };

    let report = LaunchReport {
        command_line: spec.command_line(),
        pid: process.pid(),
        outcome,
        state: process.state()?,
    };
    info!(pid = report.pid, ?outcome, state = %report.state, "done");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} (pid {}): {}", report.command_line, report.pid, report.state);
    }
    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load(&cli)?;
    init_logging(&config.logging.level);

    info!("Starting Elevated-Launcher v{}", env!("CARGO_PKG_VERSION"));

    // Verify Windows platform
    #[cfg(not(target_os = "windows"))]
    {
        anyhow::bail!("Elevated-Launcher only supports Windows platform");
    }

    #[cfg(target_os = "windows")]
    {
        let code = run(Arc::new(elevated_launcher::Win32Os), &cli, &config).await?;
        std::process::exit(code);
    }
}
