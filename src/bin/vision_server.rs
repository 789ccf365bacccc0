use clap::Parser;
use std::sync::Arc;
use vision_etl::server::run_server;
use vision_etl::utils::{logger, validation::Validate};
use vision_etl::{OpenRouterClient, ServerConfig};

#[derive(Parser)]
#[command(name = "vision-server")]
#[command(about = "Proxy that relays uploaded document images to a vision model")]
struct Args {
    /// Path to TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen address from the config
    #[arg(long)]
    bind: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match ServerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }

    logger::init_server_logger(args.verbose, config.server.log_json);
    tracing::info!("🚀 Starting vision-server");

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    let model = OpenRouterClient::new(config.openrouter_settings()?)?;
    run_server(&config, Arc::new(model)).await?;

    Ok(())
}

fn display_config_summary(config: &ServerConfig) {
    println!("📋 Configuration Summary:");
    println!("  Bind: {}", config.server.bind);
    println!("  Provider: {}", config.provider.endpoint);
    if config.server.allowed_origins.is_empty() {
        println!("  CORS: any origin");
    } else {
        println!("  CORS: {}", config.server.allowed_origins.join(", "));
    }
    println!("  Max Upload: {} MB", config.server.max_upload_mb);
    match config.provider.timeout_seconds {
        Some(timeout) => println!("  Request Timeout: {}s", timeout),
        None => println!("  Request Timeout: transport default"),
    }
    println!();
}
