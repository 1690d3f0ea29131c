use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser, Subcommand};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::auth::TokenPolicy;
use crate::keepalive::REFRESH_INTERVAL;

/// Admin API root used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1/";

/// Token file used when nothing else is configured.
pub const DEFAULT_TOKEN_FILE: &str = ".admin-console/token.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Admin API root, e.g. http://localhost:3000/api/v1/
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Where the session token is kept between invocations
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in with email and password and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CONSOLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and clear the stored token
    Logout,
    /// Keep the stored session alive until interrupted
    Keepalive {
        /// Seconds between checks (overrides auth.refresh_interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Export a conversation's message history to a JSON file
    #[command(group(ArgGroup::new("source").required(true).args(["conversation", "input"])))]
    Export {
        /// Conversation to fetch from the server
        #[arg(long)]
        conversation: Option<String>,
        /// Previously saved exchanges (JSON array) to export offline
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory (overrides export.dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the logged-in profile and licensing state
    Status,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub refresh_interval_secs: u64,
    pub refresh_window_secs: u64,
    pub token_lifetime_secs: u64,
    pub token_file: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub dir: PathBuf,
}

impl AuthConfig {
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    #[must_use]
    pub fn policy(&self) -> TokenPolicy {
        TokenPolicy {
            refresh_window: Duration::from_secs(self.refresh_window_secs),
            token_lifetime: Duration::from_secs(self.token_lifetime_secs),
        }
    }
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<(Cli, Self), config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        let config = Self::from_cli(&cli)?;
        Ok((cli, config))
    }

    /// Layer defaults, config files, environment and CLI flags.
    ///
    /// Priority: CLI flag > `CONSOLE_` env > `--config` file > `./config.yaml` > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.base_url", DEFAULT_BASE_URL)?
            .set_default("auth.refresh_interval_secs", REFRESH_INTERVAL.as_secs())?
            .set_default("auth.refresh_window_secs", 600_u64)?
            .set_default("auth.token_lifetime_secs", 3600_u64)?
            .set_default("auth.token_file", DEFAULT_TOKEN_FILE)?
            .set_default("export.dir", ".")?;

        builder = builder.add_source(File::new("config.yaml", FileFormat::Yaml).required(false));

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // E.g. CONSOLE_SERVER__BASE_URL=http://admin.internal/api/v1/
        builder = builder.add_source(
            Environment::with_prefix("CONSOLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.base_url {
            builder = builder.set_override("server.base_url", url.as_str())?;
        }
        if let Some(path) = &cli.token_file {
            builder =
                builder.set_override("auth.token_file", path.to_string_lossy().into_owned())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
