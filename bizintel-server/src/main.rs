use std::io::Read;
use std::sync::Arc;

use bizintel_core::config::{api_key_from_env, API_KEY_ENV};
use bizintel_core::retrieval::build_index;
use bizintel_core::{BizintelConfig, BizintelError, OpenAiEmbeddingClient};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use bizintel_server::gateway::{self, ApiGatewayEvent};
use bizintel_server::router::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "bizintel.toml")]
    config: String,

    /// Print the effective configuration summary and exit
    #[arg(long)]
    health: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Handle one API-Gateway proxy event read from stdin
    Invoke,
    /// Chunk and embed a policy document into a similarity index file
    BuildIndex {
        #[arg(long)]
        source: String,
        #[arg(long)]
        output: String,
        /// Characters per chunk (defaults to retrieval.chunk_chars)
        #[arg(long)]
        chunk_chars: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match BizintelConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Logs go to stderr so `invoke` keeps stdout for the response
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.health {
        print_health(&config);
        return Ok(());
    }

    let api_key = api_key_from_env().ok_or(BizintelError::MissingApiKey(API_KEY_ENV))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, &api_key).await,
        Command::Invoke => invoke(config, &api_key).await,
        Command::BuildIndex {
            source,
            output,
            chunk_chars,
        } => {
            let chunk_chars = chunk_chars.unwrap_or(config.retrieval.chunk_chars);
            build(&config, &api_key, &source, &output, chunk_chars).await
        }
    }
}

fn print_health(config: &BizintelConfig) {
    let key = if api_key_from_env().is_some() { "✅" } else { "❌" };
    println!("{} {} set", key, API_KEY_ENV);
    println!("✅ completion model: {} ({})", config.completion.model, config.completion.base_url);
    match config.retrieval.index_path.as_deref() {
        Some(path) if std::path::Path::new(path).exists() => println!("✅ policy index: {}", path),
        Some(path) => println!("❌ policy index missing: {}", path),
        None => println!("➖ policy index: not configured"),
    }
    println!(
        "✅ HTTP address: {}:{}",
        config.http.host, config.http.port
    );
}

async fn serve(config: BizintelConfig, api_key: &str) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config, api_key)?);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    bizintel_server::http::start_http_server(state, tx.subscribe()).await
}

async fn invoke(config: BizintelConfig, api_key: &str) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let event: ApiGatewayEvent = serde_json::from_str(&input)?;

    let state = AppState::from_config(config, api_key)?;
    let response = gateway::handle_event(&state, event).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn build(
    config: &BizintelConfig,
    api_key: &str,
    source: &str,
    output: &str,
    chunk_chars: usize,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(source).map_err(BizintelError::from)?;
    let source_name = std::path::Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);

    let client = OpenAiEmbeddingClient::new(api_key, config.embedding.clone())?;
    let index = build_index(&text, source_name, chunk_chars, &config.embedding.model, &client).await?;
    index.save(output)?;

    tracing::info!(passages = index.len(), output, "Policy index written");
    Ok(())
}
