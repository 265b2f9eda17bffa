//! Filegate - REST File Manager for Object Storage
//!
//! Serves file, folder and bucket operations over HTTP and forwards them
//! to a Supabase-compatible storage service.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filegate::api::HttpServer;
use filegate::config::FilegateConfig;
use filegate::error::Result;
use filegate::manager::{FileManager, ManagerLimits};
use filegate::storage::{MemoryStore, ObjectStore, SupabaseStore};

/// Filegate - REST file manager for object storage
#[derive(Parser)]
#[command(name = "filegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "filegate.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Start {
        /// Serve from an in-memory store instead of the configured backend
        #[arg(long)]
        memory: bool,

        /// Buckets to create in the in-memory store
        #[arg(long = "bucket", requires = "memory")]
        buckets: Vec<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "filegate.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file and environment
    Validate,

    /// Query a running server
    Status {
        /// Server address to query
        #[arg(short, long, default_value = "localhost:8000")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { memory, buckets } => {
            run_start(cli.config, cli.log_level, memory, buckets).await
        }
        Commands::Init { output, force } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "pretty");
            run_init(output, force)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "pretty");
            run_validate(cli.config)
        }
        Commands::Status { address } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "pretty");
            run_status(address).await
        }
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the HTTP API
async fn run_start(
    config_path: PathBuf,
    log_level: Option<String>,
    memory: bool,
    buckets: Vec<String>,
) -> Result<()> {
    let config = match FilegateConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(e);
        }
    };

    init_logging(
        log_level.as_deref().unwrap_or(&config.logging.level),
        &config.logging.format,
    );
    tracing::info!("Starting filegate...");

    let store: Arc<dyn ObjectStore> = if memory {
        tracing::warn!("Using in-memory store; contents are lost on exit");
        Arc::new(MemoryStore::with_buckets(buckets))
    } else {
        if let Err(e) = config.validate() {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e);
        }
        let store = match SupabaseStore::new(&config.storage, config.request_timeout()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to create storage client: {}", e);
                return Err(e);
            }
        };
        tracing::info!("Storage backend: {}", config.storage.url);
        Arc::new(store)
    };

    let manager = FileManager::new(store, ManagerLimits::from(&config.storage));
    let server = HttpServer::new(config, manager);

    server.start(shutdown_signal()).await
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}

/// Initialize configuration file
fn run_init(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        eprintln!("{} already exists (use --force to overwrite)", output.display());
        return Err(filegate::Error::Config(format!(
            "{} already exists",
            output.display()
        )));
    }

    let mut config = FilegateConfig::default();
    config.storage.url = "https://your-project.supabase.co".to_string();
    config.storage.key = "changeme".to_string();

    let content = format!(
        "# Filegate Configuration\n\
         # SUPABASE_URL, SUPABASE_KEY and FILEGATE_BIND override the values below.\n\n{}",
        config.to_toml()?
    );

    std::fs::write(&output, content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the storage url and key, or export SUPABASE_URL and SUPABASE_KEY.");
    println!("Then start with: filegate --config {} start", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    let result = FilegateConfig::load(&config_path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Bind Address:   {}", config.server.bind_address);
            println!("  Storage URL:    {}", config.storage.url);
            println!("  Storage Key:    {}", redact(&config.storage.key));
            println!("  List Limit:     {}", config.storage.list_limit);
            println!("  Link Validity:  {} s", config.storage.signed_url_ttl_secs);
            println!("  CORS Origins:   {:?}", config.api.cors_origins);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Query a running server's health and buckets
async fn run_status(address: String) -> Result<()> {
    let base = if address.starts_with("http://") || address.starts_with("https://") {
        address
    } else {
        format!("http://{}", address)
    };

    let health: serde_json::Value = reqwest::get(format!("{}/health/", base)).await?.json().await?;
    println!("Health: {}", health["message"].as_str().unwrap_or("unknown"));

    let buckets: serde_json::Value = reqwest::get(format!("{}/list_buckets", base))
        .await?
        .json()
        .await?;
    println!("{}", serde_json::to_string_pretty(&buckets)?);

    Ok(())
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}
