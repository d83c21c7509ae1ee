use clap::{Parser, Subcommand};
use gmail_relay::{cli, server, session::Authorization};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gmrelay")]
#[command(about = "Gmail relay - send mail through one OAuth2-authorized Gmail account", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults to ~/.gmail-relay/config.toml)
    #[arg(short, long, env = "GMAIL_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay service
    Start {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the consent URL if no token is stored yet
    AuthUrl,
    /// Show credential and token status
    Status,
    /// Write a starter configuration file
    Init {
        /// Address used in the `from` header
        #[arg(long)]
        sender: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Get config path (use default if not specified)
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => cli::AppConfig::default_path()
            .unwrap_or_else(|_| PathBuf::from("config/default.toml")),
    };

    match cli.command {
        Commands::Start { port } => {
            let mut config = cli::AppConfig::from_file(&config_path)?;

            // Override port if specified
            if let Some(port) = port {
                config.server.port = port;
            }

            tracing::info!("Starting Gmail relay on port {}", config.server.port);
            println!("📨 Gmail relay v{}", env!("CARGO_PKG_VERSION"));
            println!("📡 Starting server on {}:{}", config.server.host, config.server.port);
            println!("   Sending as: {}", config.gmail.sender);
            println!();
            println!("Press Ctrl+C to stop");

            server::start_server(config).await?;
        }
        Commands::AuthUrl => {
            let config = cli::AppConfig::from_file(&config_path)?;
            let state = server::AppState::from_config(&config).await?;
            match state.session.ensure_authorized().await? {
                Authorization::Ready => {
                    println!("✅ A token is already stored at {}", config.gmail.token_path.display());
                }
                Authorization::Required { url } => {
                    println!("Open this URL to authorize the relay:");
                    println!();
                    println!("{}", url);
                }
            }
        }
        Commands::Status => {
            let config = cli::AppConfig::from_file(&config_path)?;
            let state = server::AppState::from_config(&config).await?;
            println!("Session: {}", state.session.state().await);
            println!("Credentials: {}", config.gmail.credentials_path.display());
            println!(
                "Token file: {} ({})",
                config.gmail.token_path.display(),
                if state.session.token_file_exists().await { "present" } else { "absent" }
            );

            if let Some(token) = state.session.current_token().await {
                let status = if token.is_expired() { "expired" } else { "valid" };
                println!("Token: {} (expires {})", status, token.expiry_date);
                println!("Scope: {}", token.scope);
                println!(
                    "Refresh token: {}",
                    if token.refresh_token.as_ref().is_some_and(|t| !t.expose_secret().is_empty()) {
                        "present"
                    } else {
                        "missing"
                    }
                );
            }
        }
        Commands::Init { sender } => {
            cli::AppConfig::write_template(&config_path, &sender)?;
            println!("✅ Configuration written to {}", config_path.display());
            println!("   Place credentials.json where gmail.credentials_path points before starting.");
        }
    }

    Ok(())
}
