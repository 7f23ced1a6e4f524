//! `carelink`: command-line client for the care marketplace API.
//!
//! Every call goes through the request governor, so the CLI sees the same
//! caching, rate limiting and circuit breaking as any other client.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use carelink::analytics::AnalyticsBatcher;
use carelink::api::{NewSession, SignIn, SignUp};
use carelink::auth::{FileTokenStore, MemoryTokenStore, TokenStore};
use carelink::config::{load_config, validation::validate_config, ClientConfig, ConfigError};
use carelink::domain::Role;
use carelink::observability::{logging, metrics};
use carelink::transport::HttpTransport;
use carelink::{CareClient, Governor, GovernorError, Shutdown};

#[derive(Parser)]
#[command(name = "carelink")]
#[command(about = "Command-line client for the care marketplace API", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `api.base_url`
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the issued tokens
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the issued tokens
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "individual")]
        role: Role,
    },
    /// Sign out and forget stored tokens
    Signout,
    /// Exchange the refresh token for a new token pair
    Refresh,
    /// Show the signed-in profile, or another by id
    Profile {
        #[arg(long)]
        id: Option<String>,
    },
    /// List therapy sessions
    Sessions,
    /// Book a session with a therapist
    Book {
        #[arg(long)]
        therapist: String,
        /// Start time, RFC 3339 (e.g. 2026-03-02T09:00:00Z)
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long, default_value_t = 50)]
        minutes: u32,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel a session
    Cancel { id: String },
    /// Mark a session completed
    Complete { id: String },
    /// Governed GET of an arbitrary API path
    Get { path: String },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Signin { .. } => "signin",
            Commands::Signup { .. } => "signup",
            Commands::Signout => "signout",
            Commands::Refresh => "refresh",
            Commands::Profile { .. } => "profile",
            Commands::Sessions => "sessions",
            Commands::Book { .. } => "book",
            Commands::Cancel { .. } => "cancel",
            Commands::Complete { .. } => "complete",
            Commands::Get { .. } => "get",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tokens: Arc<dyn TokenStore> = match &config.auth.token_path {
        Some(path) => Arc::new(FileTokenStore::open(path)?),
        None => Arc::new(MemoryTokenStore::new()),
    };
    let transport = Arc::new(HttpTransport::new(&config.api)?);
    let governor = Governor::new(&config, transport, tokens);
    let client = CareClient::new(governor.clone());

    let shutdown = Shutdown::new();
    let analytics = if config.analytics.enabled {
        let batcher = AnalyticsBatcher::new(governor.clone(), config.analytics.clone());
        batcher.track("cli_command", json!({ "command": cli.command.name() }));
        let handle = tokio::spawn(batcher.run(shutdown.subscribe()));
        Some(handle)
    } else {
        None
    };

    tracing::debug!(command = cli.command.name(), base_url = %config.api.base_url, "Running command");
    let outcome = tokio::select! {
        outcome = run(&client, cli.command) => Some(outcome),
        _ = shutdown.trigger_on_ctrl_c() => None,
    };

    if let Some(handle) = analytics {
        shutdown.trigger();
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Analytics task ended abnormally");
        }
    }

    let Some(outcome) = outcome else {
        eprintln!("Interrupted");
        std::process::exit(130);
    };

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let GovernorError::Http {
                details: Some(details),
                ..
            } = &e
            {
                eprintln!("Details: {}", details);
            }
            std::process::exit(1);
        }
    }
}

async fn run(client: &CareClient, command: Commands) -> carelink::Result<Value> {
    let value = match command {
        Commands::Signin { email, password } => {
            let session = client.sign_in(&SignIn { email, password }).await?;
            json!({ "signed_in": true, "user": session.user })
        }
        Commands::Signup {
            email,
            password,
            name,
            role,
        } => {
            let session = client
                .sign_up(&SignUp {
                    email,
                    password,
                    full_name: name,
                    role,
                })
                .await?;
            json!({ "signed_in": true, "user": session.user })
        }
        Commands::Signout => {
            client.sign_out().await?;
            json!({ "signed_in": false })
        }
        Commands::Refresh => {
            client.refresh().await?;
            json!({ "refreshed": true })
        }
        Commands::Profile { id } => serde_json::to_value(client.profile(id.as_deref()).await?)?,
        Commands::Sessions => serde_json::to_value(client.sessions().await?)?,
        Commands::Book {
            therapist,
            at,
            minutes,
            notes,
        } => {
            let session = client
                .book_session(&NewSession {
                    therapist_id: therapist,
                    scheduled_at: at,
                    duration_minutes: minutes,
                    notes,
                })
                .await?;
            serde_json::to_value(session)?
        }
        Commands::Cancel { id } => serde_json::to_value(client.cancel_session(&id).await?)?,
        Commands::Complete { id } => serde_json::to_value(client.complete_session(&id).await?)?,
        Commands::Get { path } => client.governor().get(&path).await?,
    };
    Ok(value)
}
