//! bookswap server entry point.

use bookswap::{
    auth::AuthService,
    config::{Cli, Command, Config, UserCommand},
    db::Database,
    images::ImgurClient,
    server,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Serve { bind }) => {
            cmd_serve(config, bind, cli.imgur_client_id.as_deref()).await
        }
        None => cmd_serve(config, None, cli.imgur_client_id.as_deref()).await,
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nSet [imgur] client_id in config.toml (or IMGUR_CLIENT_ID).");
    println!("Then run: bookswap user add <name>");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = AuthService::new(db, config.auth.session_days);

    match action {
        UserCommand::Add { name } => {
            let user = auth.create_user(&name)?;
            let (_, token) = auth.issue_token(&user.name)?;
            println!("Created user: {} (id: {})", user.name, user.id);
            println!("Token: {}", token);
        }

        UserCommand::Del { name } => {
            if auth.delete_user(&name)? {
                println!("Deleted user: {}", name);
            } else {
                println!("User not found: {}", name);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<24} {:<36} CREATED", "NAME", "ID");
                println!("{}", "-".repeat(80));
                for user in users {
                    let created = bookswap::db::timestamp_to_datetime(user.created_at)
                        .format("%Y-%m-%d %H:%M");
                    println!("{:<24} {:<36} {}", user.name, user.id, created);
                }
            }
        }

        UserCommand::Token { name } => {
            let (user, token) = auth.issue_token(&name)?;
            println!("Token for {}: {}", user.name, token);
        }

        UserCommand::Revoke { token } => {
            auth.revoke(&token)?;
            println!("Token revoked.");
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(
    mut config: Config,
    bind: Option<std::net::SocketAddr>,
    imgur_client_id: Option<&str>,
) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookswap=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client_id = config.imgur_client_id(imgur_client_id)?;
    let images = ImgurClient::new(
        config.imgur.endpoint.clone(),
        client_id,
        Duration::from_secs(config.imgur.timeout_seconds),
    )?;

    // Open database
    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        max_upload_bytes = config.upload.max_bytes,
        "Starting bookswap server"
    );

    let state = server::AppState::new(&config, db, Arc::new(images));

    match state.auth.cleanup_expired() {
        Ok(removed) if removed > 0 => tracing::info!(removed, "Removed expired sessions"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to clean up sessions"),
    }

    // Create router
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
