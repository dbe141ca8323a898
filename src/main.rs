mod catalog;
mod config;
mod context;
mod fsm;
mod generation;
mod language;
mod opportunity;
mod patterns;
mod pipeline;
mod policy;
mod providers;
mod safety;
mod selector;
mod session;
mod traits;
mod types;

#[cfg(test)]
mod testing;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::catalog::PracticeCatalog;
use crate::config::{AppConfig, ProviderKind};
use crate::pipeline::CoachingPipeline;
use crate::providers::AnthropicProvider;
use crate::session::InMemorySessionStore;
use crate::traits::ModelProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("coachd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("coachd {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Usage: coachd [--version] [--help]");
                println!();
                println!("Reads config.toml from the working directory and runs a");
                println!("terminal coaching session. In-session commands:");
                println!("  /accept     accept the offered practice");
                println!("  /decline    decline the offered practice");
                println!("  /step NAME  advance the active practice step");
                println!("  /calm       leave crisis mode");
                println!("  /quit       exit");
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {other}");
                return Ok(());
            }
        }
    }

    let config = AppConfig::load(&PathBuf::from("config.toml"))?;

    let provider: Arc<dyn ModelProvider> = match config.provider.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
            &config.provider.api_key,
            &config.provider.base_url,
        )?),
    };

    let catalog = match &config.coaching.catalog_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            PracticeCatalog::from_json(&json)?
        }
        None => PracticeCatalog::builtin(),
    };
    info!(
        practices = catalog.entries().len(),
        schema = PracticeCatalog::SCHEMA_VERSION,
        "practice catalog loaded"
    );

    let pipeline = CoachingPipeline::new(
        provider,
        &config,
        Arc::new(catalog),
        Arc::new(InMemorySessionStore::new()),
    );

    // Minimal terminal surface. Real bot transports are external
    // collaborators driving the same pipeline entry points.
    info!("coachd ready, reading turns from stdin");
    let session_id = "terminal";
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match text {
            "/quit" => break,
            "/accept" => {
                let ok = pipeline.accept_practice(session_id).await;
                println!("{}", if ok { "Practice started." } else { "Nothing to accept." });
            }
            "/decline" => {
                let ok = pipeline.decline_practice(session_id).await;
                println!("{}", if ok { "Okay, maybe later." } else { "Nothing to decline." });
            }
            "/calm" => {
                let ok = pipeline.stabilize_from_crisis(session_id).await;
                println!("{}", if ok { "Back to normal mode." } else { "Not in crisis mode." });
            }
            _ if text.starts_with("/step ") => {
                let step = text.trim_start_matches("/step ").trim();
                let ok = pipeline.advance_practice_step(session_id, step).await;
                println!("{}", if ok { "Step advanced." } else { "Cannot advance to that step." });
            }
            _ => {
                let reply = pipeline.process(session_id, text).await;
                println!("{reply}");
            }
        }
    }

    Ok(())
}
