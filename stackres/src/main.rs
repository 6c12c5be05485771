//! stackres: run custom-resource handlers from the command line.
//!
//! - `handle` processes a full orchestrator event, including the callback
//! - `run` executes a handler against a local property file and prints the result
//! - `list` shows the registered handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stackres::provider::memory::ProviderState;
use stackres::{
    Dispatcher, Event, HandlerConfig, HttpResponder, InvocationContext, MemoryProvider,
    Properties, Providers, Registry,
};

#[derive(Parser)]
#[command(name = "stackres", version, about = "CloudFormation custom-resource handlers")]
struct Cli {
    /// Provider state fixture (JSON)
    #[arg(long, env = "STACKRES_STATE", global = true)]
    state: Option<PathBuf>,

    /// Region used when the function ARN does not name one
    #[arg(long, env = "AWS_REGION", global = true)]
    region: Option<String>,

    /// Log stream referenced in callback reasons
    #[arg(long, env = "AWS_LAMBDA_LOG_STREAM_NAME", default_value = "", global = true)]
    log_stream_name: String,

    /// ARN of the invoked function
    #[arg(long, env = "STACKRES_FUNCTION_ARN", global = true)]
    function_arn: Option<String>,

    /// Delay between convergence polls in milliseconds
    #[arg(long, default_value_t = 1000, global = true)]
    wait_interval_ms: u64,

    /// Maximum number of convergence polls
    #[arg(long, default_value_t = 30, global = true)]
    wait_attempts: u32,

    /// Timeout for the callback request in seconds
    #[arg(long, default_value_t = 30, global = true)]
    callback_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle an orchestrator event and send the response
    Handle {
        /// Event JSON file
        #[arg(long)]
        event: PathBuf,

        /// Handler name (defaults to the event's ResourceType)
        #[arg(long, env = "STACKRES_HANDLER")]
        handler: Option<String>,
    },

    /// Run a handler against a property file and print the result
    Run {
        /// Handler name
        handler: String,

        /// Property JSON file, optionally with a RequestType
        file: PathBuf,
    },

    /// List registered handlers
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackres=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = HandlerConfig {
        wait_interval: Duration::from_millis(cli.wait_interval_ms),
        wait_attempts: cli.wait_attempts,
        callback_timeout: Duration::from_secs(cli.callback_timeout_secs),
        region: cli.region.clone(),
        log_stream_name: cli.log_stream_name.clone(),
    };

    let provider = Arc::new(load_provider(cli.state.as_deref()).await?);
    let registry = Registry::new(&Providers::from_memory(provider), &config);
    let responder = Arc::new(
        HttpResponder::new(config.callback_timeout).context("Failed to build HTTP client")?,
    );
    let dispatcher = Dispatcher::new(registry, responder);

    let ctx = InvocationContext::new(
        config.log_stream_name.clone(),
        cli.function_arn.clone(),
        config.region.clone(),
    );

    match cli.command {
        Commands::Handle {
            event: path,
            handler,
        } => {
            let raw = read(&path).await?;
            let event: Event = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid event JSON in {}", path.display()))?;

            let body = dispatcher
                .handle(&event, handler.as_deref(), &ctx)
                .await
                .context("Failed to deliver response")?;
            info!(status = ?body.status, "Event handled");
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Run { handler, file } => {
            let raw = read(&file).await?;
            let value: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON in {}", file.display()))?;
            let request_type = value
                .get("RequestType")
                .and_then(Value::as_str)
                .unwrap_or("Create")
                .to_string();
            let properties = Properties::from_value(value)?;

            info!(handler = %handler, request_type = %request_type, "Running directly");
            let outputs = dispatcher
                .execute(&handler, &request_type, &properties, &ctx)
                .await
                .with_context(|| format!("{handler} failed"))?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        Commands::List => {
            for name in dispatcher.registry().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}

async fn load_provider(path: Option<&Path>) -> Result<MemoryProvider> {
    let Some(path) = path else {
        return Ok(MemoryProvider::new(ProviderState::default()));
    };
    let raw = read(path).await?;
    let provider = MemoryProvider::from_json(&raw)
        .with_context(|| format!("Invalid provider state in {}", path.display()))?;
    info!(path = %path.display(), "Loaded provider state");
    Ok(provider)
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}
