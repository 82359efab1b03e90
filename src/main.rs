//! Preview Sandbox CLI
//!
//! Single-shot mode:
//!   preview-sandbox run --markup page.html --style page.css --script page.js
//!
//! Server mode (persistent process, reads from stdin):
//!   preview-sandbox serve
//!
//! Protocol (server mode):
//!   Request (stdin, one JSON object per line):
//!     {"op":"schedule","markup":"<p>hi</p>","style":"","script":"console.log(1)"}
//!     {"op":"entries","wait_ms":1000}
//!
//!   Response (stdout):
//!     Status:Ok
//!     Length:57
//!
//!     {"generation":1}
//!
//!   Error response:
//!     Status:Error
//!     Length:42
//!
//!     isolated execution unavailable: ...

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use preview_sandbox::{
    ConsoleMethod, DiagnosticEntry, PreviewConfig, PreviewEngine, RunGeneration, SourceBundle,
};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

/// Sandboxed live-preview engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one preview and print its console output
    Run {
        /// Markup fragment file
        #[arg(long)]
        markup: Option<PathBuf>,

        /// Style fragment file
        #[arg(long)]
        style: Option<PathBuf>,

        /// Script fragment file
        #[arg(long)]
        script: Option<PathBuf>,

        /// JSON bundle file ({"markup","style","script"}); fragment files override its fields
        #[arg(long)]
        bundle: Option<PathBuf>,

        /// How long to wait for the run to settle
        #[arg(long, default_value_t = 5000)]
        wait_ms: u64,

        /// Print the synthesized document to stdout
        #[arg(long)]
        print_document: bool,
    },

    /// Persistent mode: JSON requests on stdin, framed responses on stdout
    Serve,
}

/// One line of server-mode input.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    Schedule(SourceBundle),
    Run(SourceBundle),
    Clear,
    Reset,
    Entries {
        #[serde(default)]
        wait_ms: Option<u64>,
    },
}

fn read_fragment(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn load_bundle(
    bundle: Option<&Path>,
    markup: Option<&Path>,
    style: Option<&Path>,
    script: Option<&Path>,
) -> Result<SourceBundle> {
    let mut out = match bundle {
        Some(path) => serde_json::from_str(&read_fragment(path)?)
            .map_err(|e| anyhow!("Invalid bundle JSON in '{}': {}", path.display(), e))?,
        None => SourceBundle::default(),
    };
    if let Some(path) = markup {
        out.markup = read_fragment(path)?;
    }
    if let Some(path) = style {
        out.style = read_fragment(path)?;
    }
    if let Some(path) = script {
        out.script = read_fragment(path)?;
    }
    Ok(out)
}

fn print_entry(entry: &DiagnosticEntry) {
    let label = match entry.method {
        ConsoleMethod::Log => "LOG",
        ConsoleMethod::Warn => "WARN",
        ConsoleMethod::Error => "ERROR",
    };
    eprintln!("[{}] {}", label, entry.text());
}

/// Wait for a run to settle, bounded by `wait_ms`. Returns whether it did.
async fn settle(engine: &PreviewEngine, generation: RunGeneration, wait_ms: u64) -> bool {
    tokio::time::timeout(
        Duration::from_millis(wait_ms),
        engine.wait_settled(generation),
    )
    .await
    .is_ok()
}

/// Run in single-shot mode
async fn run_single_shot(
    config: PreviewConfig,
    bundle: SourceBundle,
    wait_ms: u64,
    print_document: bool,
) -> Result<()> {
    let mut engine = PreviewEngine::start(config)?;
    let generation = engine.run(&bundle)?;

    if print_document {
        if let Some(document) = engine.last_document() {
            println!("{}", document);
        }
    }

    if !settle(&engine, generation, wait_ms).await {
        tracing::warn!(
            generation = %generation,
            wait_ms,
            "preview still running, showing output so far"
        );
    }

    for entry in engine.entries() {
        print_entry(&entry);
    }
    for notice in engine.drain_notices() {
        tracing::info!("{}", notice.message);
    }

    Ok(())
}

/// Run in server mode (persistent process, reads requests from stdin)
async fn run_server(config: PreviewConfig) -> Result<()> {
    let mut engine = PreviewEngine::start(config)?;
    let mut stdout = std::io::stdout();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    tracing::info!("server ready, reading from stdin");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                write_response(&mut stdout, false, &format!("Invalid request JSON: {}", e))?;
                continue;
            }
        };

        let body = match request {
            Request::Schedule(bundle) => engine
                .schedule(&bundle)
                .map(|generation| serde_json::json!({ "generation": generation })),
            Request::Run(bundle) => engine
                .run(&bundle)
                .map(|generation| serde_json::json!({ "generation": generation })),
            Request::Clear => {
                engine.clear_console();
                Ok(serde_json::json!({ "cleared": true }))
            }
            Request::Reset => engine
                .reset()
                .map(|generation| serde_json::json!({ "generation": generation })),
            Request::Entries { wait_ms } => {
                let generation = engine.current_generation();
                let settled = match wait_ms {
                    Some(ms) => settle(&engine, generation, ms).await,
                    None => false,
                };
                Ok(serde_json::json!({
                    "generation": generation,
                    "settled": settled,
                    "entries": engine.entries(),
                }))
            }
        };

        for notice in engine.drain_notices() {
            tracing::info!("{}", notice.message);
        }

        match body {
            Ok(body) => write_response(&mut stdout, true, &body.to_string())?,
            Err(e) => write_response(&mut stdout, false, &e.to_string())?,
        }
    }

    tracing::info!("server shutting down");
    Ok(())
}

/// Write response in length-prefixed protocol
fn write_response(stdout: &mut std::io::Stdout, ok: bool, body: &str) -> Result<()> {
    let status = if ok { "Ok" } else { "Error" };
    let length = body.len();

    writeln!(stdout, "Status:{}", status)?;
    writeln!(stdout, "Length:{}", length)?;
    writeln!(stdout)?; // Empty line separator
    write!(stdout, "{}", body)?;
    stdout.flush()?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the serve protocol, so logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PreviewConfig::from_path(path)?,
        None => PreviewConfig::default(),
    };

    match cli.command {
        Command::Run {
            markup,
            style,
            script,
            bundle,
            wait_ms,
            print_document,
        } => {
            let bundle = load_bundle(
                bundle.as_deref(),
                markup.as_deref(),
                style.as_deref(),
                script.as_deref(),
            )?;
            run_single_shot(config, bundle, wait_ms, print_document).await
        }
        Command::Serve => run_server(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let request: Request =
            serde_json::from_str(r#"{"op":"schedule","js":"console.log(1)"}"#).unwrap();
        match request {
            Request::Schedule(bundle) => assert_eq!(bundle.script, "console.log(1)"),
            other => panic!("unexpected request: {:?}", other),
        }

        let request: Request = serde_json::from_str(r#"{"op":"entries"}"#).unwrap();
        assert!(matches!(request, Request::Entries { wait_ms: None }));

        assert!(serde_json::from_str::<Request>(r#"{"op":"format"}"#).is_err());
    }
}
