mod errlog;
mod paths;
mod plugin;
mod repl;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cadence_core::{ControllerConfig, EngineSession, GenerationController, UnknownDisplay};
use plugin::PluginEngine;

/// Stream text from a local inference engine plugin.
#[derive(Debug, Parser)]
#[command(name = "cadence", version, about)]
struct Args {
    /// Vocabulary JSON (flat map or tokenizer.json).
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// Model file handed to the engine.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Engine plugin shared library.
    #[arg(long)]
    plugin: Option<PathBuf>,

    /// Controller config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_new_tokens: Option<usize>,

    /// How unmapped ids render: `empty` or `marker`.
    #[arg(long)]
    unknown_display: Option<UnknownDisplay>,

    /// Generate once for this prompt and exit instead of reading stdin.
    #[arg(long)]
    prompt: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<ControllerConfig> {
    let cfg = match &args.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => {
            let path = paths::default_config_path();
            if path.exists() {
                ControllerConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?
            } else {
                ControllerConfig::default()
            }
        }
    };

    let mut cfg = cfg.with_env_overrides();
    if let Some(n) = args.max_new_tokens {
        cfg.max_new_tokens = n;
    }
    if let Some(d) = args.unknown_display {
        cfg.unknown_display = d;
    }
    Ok(cfg)
}

fn run(args: Args) -> Result<()> {
    let cfg = load_config(&args)?;
    let max_new_tokens = cfg.max_new_tokens;

    let vocab_path = args.vocab.clone().unwrap_or_else(paths::default_vocab_path);
    let controller = GenerationController::from_resource(&vocab_path, cfg)
        .with_context(|| format!("loading vocabulary {}", vocab_path.display()))?;

    let engine = PluginEngine::load(args.plugin.as_deref()).map_err(|e| anyhow!(e))?;
    let model_path = args.model.clone().unwrap_or_else(paths::default_model_path);
    let mut session = EngineSession::open(engine, &model_path)
        .with_context(|| format!("starting engine with {}", model_path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match args.prompt.as_deref() {
        Some(prompt) => {
            repl::run_once(&mut session, &controller, prompt, max_new_tokens, &mut out).map(|_| ())
        }
        None => {
            let stdin = io::stdin();
            repl::run_repl(&mut session, &controller, max_new_tokens, stdin.lock(), &mut out)
        }
    };
    out.flush()?;
    session.close();
    result
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            errlog::record("startup", &e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
