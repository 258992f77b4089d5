use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use open_pilot::agent_engine::engine::plan_once;
use open_pilot::config;
use open_pilot::errors::{PilotError, PilotResult};
use open_pilot::llm::factory::ModelKind;

/// Turn a natural-language objective into keyboard and mouse actions.
#[derive(Debug, Parser)]
#[command(name = "open-pilot", version, about)]
struct Cli {
    /// What to accomplish, e.g. "open google".
    objective: String,

    /// Model identifier (overrides config and OPEN_PILOT_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Path to config.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_steps: Option<u32>,

    /// Send this image instead of capturing the screen.
    #[arg(long)]
    static_image: Option<PathBuf>,

    /// Request a single plan, print it as JSON and exit.
    #[arg(long)]
    once: bool,

    /// Record a JSONL session history.
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    open_pilot::init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "open-pilot failed");
            eprintln!("error: {e}");
            if matches!(e, PilotError::UnsupportedModel(_)) {
                eprintln!("known models: {}", ModelKind::IDENTIFIERS.join(", "));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> PilotResult<()> {
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        cfg.model.name = model;
    }
    if let Some(max_steps) = cli.max_steps {
        cfg.agent.max_steps = max_steps;
    }
    cfg.agent.history |= cli.history;

    let capture = open_pilot::capture_provider(&cfg, cli.static_image.as_deref())?;
    let backend = open_pilot::build_backend(&cfg, capture)?;

    if cli.once {
        let plan = plan_once(backend.as_ref(), &cli.objective, 0).await?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let mut engine = open_pilot::build_engine(&cfg, backend)?;
    let summary = engine.run(&cli.objective).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
