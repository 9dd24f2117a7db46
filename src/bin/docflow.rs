//! CLI binary for edgequake-docflow.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DocflowConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docflow::{
    DocflowConfig, IntentMenu, Orchestrator, ProgressCallback, RelayClient, SubmissionPhase,
    SubmissionProgressCallback, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the submission through its phases.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new(filename: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message(filename.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl SubmissionProgressCallback for CliProgressCallback {
    fn on_phase(&self, phase: SubmissionPhase) {
        match phase {
            SubmissionPhase::Uploading => self.bar.set_prefix("Uploading"),
            SubmissionPhase::Invoking => {
                self.bar.set_prefix("Running workflow");
                self.bar.set_message("waiting for the engine…");
            }
            SubmissionPhase::Done | SubmissionPhase::Failed => self.bar.finish_and_clear(),
            SubmissionPhase::Idle => {}
        }
    }

    fn on_upload_complete(&self, filename: &str, file_id: &str) {
        self.bar.println(format!(
            "  {} Uploaded {}  {}",
            green("✓"),
            bold(filename),
            dim(file_id)
        ));
    }

    fn on_submission_complete(&self, text_len: usize) {
        self.bar.println(format!(
            "  {} Workflow finished  {}  {}",
            green("✓"),
            dim(&format!("{text_len} chars")),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64())),
        ));
    }

    fn on_submission_error(&self, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!("  {} {}", red("✗"), red(first_line)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise meeting minutes (calls Dify directly)
  docflow run minutes.txt

  # Extract action items, pass an extra workflow input
  docflow run --intent action_items --input format=markdown minutes.docx

  # Go through a relay server instead of holding the key locally
  docflow run --relay-url http://localhost:3000/api minutes.pdf

  # Raw workflow response as JSON
  docflow run --json minutes.txt > result.json

  # List the intents (default menu, or your own)
  docflow intents --intents menu.json

  # Run the relay server
  docflow serve --bind 0.0.0.0:3000

INTENT MENU FILE:
  A JSON array of {"value", "label", "execution_option"} objects:
  [{"value": "summary", "label": "Summary", "execution_option": "summary"}]

ENVIRONMENT VARIABLES:
  DIFY_API_URL            Dify API base URL, e.g. https://api.dify.ai/v1
  DIFY_API_KEY            Workflow app API key (app-…)
  DOCFLOW_DOCUMENT_INPUT  Name of the workflow's file input (default: document)
  DOCFLOW_USER_PREFIX     Prefix of the per-request user token (default: docflow)
  DOCFLOW_RELAY_URL       Relay server base URL for `run`
  DOCFLOW_BIND            Listen address for `serve`

  A .env file in the working directory is loaded first.
"#;

/// Run Dify document workflows from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    version,
    about = "Upload a document and run a Dify workflow on it",
    long_about = "Upload a document to the Dify file store, run a published workflow on it \
with a chosen processing intent (summary, action items, …), and print the generated text. \
Also runs a relay server that holds the API key on behalf of clients.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCFLOW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCFLOW_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a document and run the workflow on it.
    Run(RunArgs),
    /// List the processing intents.
    Intents(IntentsArgs),
    /// Run the relay server.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

/// Settings of the remote API.
#[derive(Args, Debug)]
struct RemoteArgs {
    /// Dify API base URL.
    #[arg(long, env = "DIFY_API_URL")]
    api_url: Option<String>,

    /// Dify workflow app API key.
    #[arg(long, env = "DIFY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Document to upload.
    file: PathBuf,

    /// Processing intent value (see `docflow intents`). Default: first in the menu.
    #[arg(short, long, env = "DOCFLOW_INTENT")]
    intent: Option<String>,

    /// JSON file with a custom intent menu.
    #[arg(long, env = "DOCFLOW_INTENTS")]
    intents: Option<PathBuf>,

    /// Send the submission through a relay server at this base URL.
    #[arg(long, env = "DOCFLOW_RELAY_URL")]
    relay_url: Option<String>,

    #[command(flatten)]
    remote: RemoteArgs,

    /// Name of the workflow's file input.
    #[arg(long, env = "DOCFLOW_DOCUMENT_INPUT", default_value = "document")]
    document_input: String,

    /// Prefix of the per-request user token.
    #[arg(long, env = "DOCFLOW_USER_PREFIX", default_value = "docflow")]
    user_prefix: String,

    /// Extra text input for the workflow, as NAME=VALUE. Repeatable.
    #[arg(long = "input", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    inputs: Vec<(String, String)>,

    /// Print the raw workflow response as JSON instead of text.
    #[arg(long, env = "DOCFLOW_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCFLOW_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct IntentsArgs {
    /// JSON file with a custom intent menu.
    #[arg(long, env = "DOCFLOW_INTENTS")]
    intents: Option<PathBuf>,

    /// Print the menu as JSON.
    #[arg(long)]
    json: bool,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "DOCFLOW_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    #[command(flatten)]
    remote: RemoteArgs,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "DOCFLOW_MAX_UPLOAD_MB", default_value_t = 15)]
    max_upload_mb: usize,
}

/// Parse `NAME=VALUE`.
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty input name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before clap reads `env = ...` defaults.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides all the feedback that matters during `run`;
    // library INFO logs would only interleave with it.
    let spinner_active = match &cli.command {
        Command::Run(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner_active {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => run(args, cli.quiet, spinner_active && !cli.verbose).await,
        Command::Intents(args) => list_intents(args).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => serve(args).await,
    }
}

async fn run(args: RunArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let menu = load_menu(args.intents.as_deref()).await?;
    let intent = match args.intent.as_deref() {
        Some(value) => menu.select(value)?.clone(),
        None => menu.first().clone(),
    };

    let file = UploadedFile::from_path(&args.file)
        .await
        .context("Failed to read document")?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(&file.filename) as Arc<dyn SubmissionProgressCallback>)
    } else {
        None
    };

    let mut builder = DocflowConfig::builder()
        .document_input(args.document_input)
        .user_prefix(args.user_prefix);
    if let Some(url) = args.remote.api_url {
        builder = builder.api_base_url(url);
    }
    if let Some(key) = args.remote.api_key {
        builder = builder.api_key(key);
    }
    for (name, value) in args.inputs {
        builder = builder.extra_input(name, value);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let orchestrator = match args.relay_url {
        Some(url) => {
            let relay = Arc::new(RelayClient::new(url));
            Orchestrator::with_relays(config, relay.clone(), relay)
        }
        None => Orchestrator::from_config(config),
    };

    let started = Instant::now();
    let result = orchestrator
        .submit(Some(file), &intent)
        .await
        .context("Submission failed")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        let json = serde_json::to_string_pretty(result.raw()).context("Failed to serialise result")?;
        writeln!(handle, "{json}").context("Failed to write to stdout")?;
    } else {
        let text = result.display_text();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        if result.is_fallback() && !quiet {
            eprintln!(
                "{}",
                dim("(unrecognised response shape; printed raw JSON)")
            );
        }
    }

    if !quiet && !show_progress && !args.json {
        eprintln!(
            "{} {} via '{}' in {}ms",
            green("✔"),
            intent.label,
            intent.execution_option,
            started.elapsed().as_millis()
        );
    }
    Ok(())
}

async fn list_intents(args: IntentsArgs) -> Result<()> {
    let menu = load_menu(args.intents.as_deref()).await?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&menu).context("Failed to serialise menu")?
        );
        return Ok(());
    }
    for intent in menu.iter() {
        println!(
            "{:<18} {:<20} {}",
            bold(&intent.value),
            intent.label,
            dim(&intent.execution_option)
        );
    }
    Ok(())
}

#[cfg(feature = "server")]
async fn serve(args: ServeArgs) -> Result<()> {
    let mut builder = DocflowConfig::builder().max_upload_bytes(mib_to_bytes(args.max_upload_mb));
    if let Some(url) = args.remote.api_url {
        builder = builder.api_base_url(url);
    }
    if let Some(key) = args.remote.api_key {
        builder = builder.api_key(key);
    }
    let config = builder.build().context("Invalid configuration")?;

    if let Err(e) = config.credentials() {
        // Still serve: every request will answer 500 with this message.
        eprintln!("{} {}", red("⚠"), e);
    }

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    edgequake_docflow::server::serve(listener, &config)
        .await
        .context("Relay server stopped")
}

/// `mib` MiB in bytes, clamped at `usize::MAX`.
#[cfg(feature = "server")]
fn mib_to_bytes(mib: usize) -> usize {
    mib.saturating_mul(1024 * 1024)
}

/// The menu from `path`, or the built-in default.
async fn load_menu(path: Option<&Path>) -> Result<IntentMenu> {
    match path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read intent menu from {:?}", path))?;
            IntentMenu::from_json_str(&json).context("Invalid intent menu")
        }
        None => Ok(IntentMenu::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_inputs() {
        assert_eq!(
            parse_key_value("format=markdown").unwrap(),
            ("format".to_string(), "markdown".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("format").is_err());
        assert!(parse_key_value(" =x").is_err());
    }

    #[cfg(feature = "server")]
    #[test]
    fn upload_limit_saturates() {
        assert_eq!(mib_to_bytes(15), 15 * 1024 * 1024);
        assert_eq!(mib_to_bytes(usize::MAX), usize::MAX);
        assert_eq!(mib_to_bytes(usize::MAX / 1024), usize::MAX);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
