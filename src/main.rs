//! ChatML console assistant — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args and load config
//!   3. Init logger (CLI `-v` flags > RUST_LOG > config)
//!   4. Build provider and token counter
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Run the console loop until goodbye, EOF or shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use chatml_turn::chat::ChatSession;
use chatml_turn::error::AppError;
use chatml_turn::llm::{TokenCounter, providers};
use chatml_turn::{config, console, logger};

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    let provider = providers::build(&config.llm, config.llm_api_key.clone())?;
    let tokens = TokenCounter::from_name(&config.llm.tokenizer)?;

    info!(
        provider = provider.name(),
        deployment = %config.turn.deployment,
        model = %config.turn.model,
        max_tokens = config.turn.max_tokens,
        "chat session ready"
    );

    let mut session = ChatSession::new(config.turn, provider, tokens);

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let reason = console::run(&mut session, shutdown).await?;
    info!(?reason, turns = session.transcript().len() / 2, "console closed");

    Ok(())
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: chatml-turn [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: {})", config::DEFAULT_CONFIG_PATH);
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                println!();
                println!("Environment:");
                println!("  {}       Azure OpenAI key (required for the azure provider)", config::API_KEY_ENV);
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    CliArgs { log_level: logger::verbosity_level(verbosity), config_path }
}
