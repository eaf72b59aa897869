use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default cap for uploaded images (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Book-sharing backend with image uploads and reviews.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookswap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKSWAP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Client id for the image host (overrides the config file).
    #[arg(long, env = "IMGUR_CLIENT_ID", global = true, hide_env_values = true)]
    pub imgur_client_id: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user and print an access token.
    Add {
        /// Display name, unique.
        name: String,
    },

    /// Delete a user together with their books.
    Del {
        /// Name of the user to delete.
        name: String,
    },

    /// List all users.
    List,

    /// Issue a fresh access token for a user.
    Token {
        /// Name of the user.
        name: String,
    },

    /// Revoke an access token.
    Revoke {
        /// Token to revoke.
        token: String,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Upload limits.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Image host configuration.
    #[serde(default)]
    pub imgur: ImgurConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        3000,
    )
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookswap.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Access token lifetime in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
        }
    }
}

fn default_session_days() -> u32 {
    30
}

/// Upload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted image, in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Image host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgurConfig {
    /// Upload endpoint.
    #[serde(default = "default_imgur_endpoint")]
    pub endpoint: String,

    /// Client id sent as `Authorization: Client-ID <id>`. Required to serve.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_imgur_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ImgurConfig {
    fn default() -> Self {
        Self {
            endpoint: default_imgur_endpoint(),
            client_id: None,
            timeout_seconds: default_imgur_timeout(),
        }
    }
}

fn default_imgur_endpoint() -> String {
    "https://api.imgur.com/3/image".to_string()
}

fn default_imgur_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookswap.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookswap").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/bookswap/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Resolve the image host client id, preferring the CLI/env override.
    ///
    /// There is no built-in fallback credential.
    pub fn imgur_client_id(&self, cli_override: Option<&str>) -> crate::error::Result<String> {
        cli_override
            .or(self.imgur.client_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                crate::error::AppError::Config(
                    "Image host client id is required: set [imgur] client_id or IMGUR_CLIENT_ID"
                        .to_string(),
                )
            })
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# bookswap configuration

[server]
bind = "0.0.0.0:3000"

[database]
# path = "/var/lib/bookswap/bookswap.db"

[auth]
# Access token lifetime in days
session_days = 30

[upload]
# Largest accepted image in bytes (5 MiB)
max_bytes = 5242880

[imgur]
# endpoint = "https://api.imgur.com/3/image"
# Required. Can also be supplied through IMGUR_CLIENT_ID.
# client_id = ""
timeout_seconds = 30
"#
        .to_string()
    }
}
