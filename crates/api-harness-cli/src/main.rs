// crates/api-harness-cli/src/main.rs
// ============================================================================
// Module: API Harness CLI Entry Point
// Description: Command dispatcher for config inspection and endpoint probes.
// Purpose: Expose the harness configuration and a retried probe test.
// Dependencies: api-harness-config, api-harness-core, clap, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `api-harness config show` prints every resolved configuration key with the
//! layer it came from; the API token is redacted. `api-harness probe` runs one
//! GET request through the full harness: request template, client registry,
//! soft checks, retry loop, lifecycle events, and optional artifacts. The exit
//! code is non-zero when the probe fails.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use api_harness_config::ConfigCell;
use api_harness_config::ConfigEntry;
use api_harness_config::ConfigError;
use api_harness_config::ConfigOverrides;
use api_harness_config::ConfigStore;
use api_harness_config::keys;
use api_harness_core::ApiRequest;
use api_harness_core::ArtifactError;
use api_harness_core::ArtifactSink;
use api_harness_core::ClientError;
use api_harness_core::ClientRegistry;
use api_harness_core::ExpectedOutcome;
use api_harness_core::LifecycleNotifier;
use api_harness_core::RequestTemplate;
use api_harness_core::ResponseExpectation;
use api_harness_core::SuiteReport;
use api_harness_core::TestCase;
use api_harness_core::TestId;
use api_harness_core::TestRunner;
use api_harness_core::TestStatus;
use api_harness_core::checks;
use api_harness_core::init_logging;
use api_harness_core::write_suite_summary;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "api-harness", version, disable_help_subcommand = true)]
struct Cli {
    /// Log level for harness crates when `RUST_LOG` is unset.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration inspection.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run one retried GET probe against the configured service.
    Probe(ProbeCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print resolved keys with their sources.
    Show(ConfigShowCommand),
}

/// Where configuration comes from.
#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Config file path; defaults to `API_HARNESS_CONFIG`, then `api-harness.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override a key for this run; repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

/// Arguments for `config show`.
#[derive(Args, Debug)]
struct ConfigShowCommand {
    /// Config sources.
    #[command(flatten)]
    source: ConfigArgs,
    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// Arguments for `probe`.
#[derive(Args, Debug)]
struct ProbeCommand {
    /// Config sources.
    #[command(flatten)]
    source: ConfigArgs,
    /// Path to probe; defaults to `api.users.endpoint`.
    #[arg(long, value_name = "PATH")]
    path: Option<String>,
    /// Expected outcome.
    #[arg(long, value_name = "OUTCOME", default_value = "success")]
    expect: ExpectedOutcome,
    /// Fail when the response takes this long or longer.
    #[arg(long, value_name = "MS")]
    max_time_ms: Option<u64>,
    /// Directory for failure snapshots and the run summary.
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::new(format!("configuration error: {err}"))
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        Self::new(format!("client error: {err}"))
    }
}

impl From<ArtifactError> for CliError {
    fn from(err: ArtifactError) -> Self {
        Self::new(format!("artifact error: {err}"))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if !init_logging(&cli.log_level) {
        debug!("logging already initialized");
    }
    match cli.command {
        Commands::Config {
            command: ConfigCommand::Show(command),
        } => command_config_show(&command),
        Commands::Probe(command) => command_probe(command),
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Loads the store once through a [`ConfigCell`].
fn load_store(args: &ConfigArgs) -> CliResult<Arc<ConfigStore>> {
    let overrides =
        ConfigOverrides::from_env()?.merged_with(ConfigOverrides::from_assignments(&args.set)?);
    let cell = ConfigCell::new(args.config.clone(), overrides);
    Ok(cell.get()?)
}

/// Prints resolved entries and any missing required keys.
fn command_config_show(command: &ConfigShowCommand) -> CliResult<ExitCode> {
    let store = load_store(&command.source)?;
    let entries: Vec<ConfigEntry> = store.entries().into_iter().map(redact_entry).collect();
    if command.json {
        let text = serde_json::to_string_pretty(&entries)
            .map_err(|err| CliError::new(format!("failed to render entries: {err}")))?;
        write_stdout_line(&text).map_err(|err| output_error("stdout", &err))?;
    } else {
        write_stdout_line(&render_entries(&entries)).map_err(|err| output_error("stdout", &err))?;
    }
    for key in store.missing_required() {
        write_stderr_line(&format!("missing required key: {key}"))
            .map_err(|err| output_error("stderr", &err))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Masks the API token value.
fn redact_entry(mut entry: ConfigEntry) -> ConfigEntry {
    if entry.key == keys::API_TOKEN && !entry.value.is_empty() {
        entry.value = "<redacted>".to_string();
    }
    entry
}

/// Renders entries as aligned `key = value (source)` lines.
fn render_entries(entries: &[ConfigEntry]) -> String {
    let width = entries.iter().map(|entry| entry.key.len()).max().unwrap_or(0);
    entries
        .iter()
        .map(|entry| format!("{:width$} = \"{}\" ({})", entry.key, entry.value, entry.source))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// SECTION: Probe
// ============================================================================

/// Runs one retried probe test and reports the result.
fn command_probe(command: ProbeCommand) -> CliResult<ExitCode> {
    let store = load_store(&command.source)?;
    let registry = ClientRegistry::global();
    registry.configure(&store)?;
    let path = match command.path {
        Some(path) => path,
        None => store.users_endpoint()?,
    };

    let mut notifier = LifecycleNotifier::default();
    if let Some(dir) = &command.artifacts {
        notifier = notifier.with_sink(Arc::new(ArtifactSink::new(dir.clone())?));
    }
    let runner = TestRunner::from_config(notifier, &store);
    let case = probe_case(
        Arc::clone(&store),
        registry,
        path,
        ResponseExpectation::for_outcome(command.expect),
        command.max_time_ms.map(Duration::from_millis),
    );
    let report = runner.run_suite("probe", vec![case]);
    if let Some(dir) = &command.artifacts {
        write_suite_summary(dir, &report)?;
    }
    write_stdout_line(&render_probe_report(&report)).map_err(|err| output_error("stdout", &err))?;
    Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Builds the probe test case.
fn probe_case(
    store: Arc<ConfigStore>,
    registry: &'static ClientRegistry,
    path: String,
    expectation: ResponseExpectation,
    max_time: Option<Duration>,
) -> TestCase {
    TestCase::new(TestId::new("probe", path.clone()), move |ctx| {
        let template = RequestTemplate::build_common(&store);
        let response = registry.send(&template, ApiRequest::get(path.clone()))?;
        checks::log_response_details(&response);
        checks::check_basic(ctx.soft, &response);
        checks::check_expectation(ctx.soft, &response, &expectation);
        if let Some(max) = max_time {
            checks::check_response_time(ctx.soft, &response, max);
        }
        Ok(())
    })
}

/// One summary line per probe plus failure detail.
fn render_probe_report(report: &SuiteReport) -> String {
    let mut lines = Vec::new();
    for test in &report.tests {
        lines.push(format!(
            "{}: {} after {} attempt(s) in {} ms",
            test.test,
            test.status.as_str(),
            test.attempts,
            test.duration_ms
        ));
        if test.status == TestStatus::Failed
            && let Some(failure) = &test.failure
        {
            lines.extend(failure.message().lines().map(|line| format!("  {line}")));
        }
    }
    lines.join("\n")
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Wraps an output failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
