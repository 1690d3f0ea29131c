//! Admin Console command-line client
//!
//! Entry point for logging in, keeping the session alive and exporting
//! conversation history.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use admin_console::auth::{FileTokenStore, TokenStore};
use admin_console::client::AdminClient;
use admin_console::config::{AppConfig, Cli, Command};
use admin_console::console::Shell;
use admin_console::history::{MessageDownload, load_exchanges};
use admin_console::keepalive::{Keepalive, KeepaliveState};
use admin_console::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let config = AppConfig::from_cli(&cli).context("Configuration error")?;

    let store: Arc<dyn TokenStore> = Arc::new(
        FileTokenStore::open(&config.auth.token_file, config.auth.policy())
            .context("Failed to open token file")?,
    );
    let client = AdminClient::new(&config.server.base_url, Arc::clone(&store))?;

    info!(
        name: "console.config.loaded",
        base_url = %config.server.base_url,
        token_file = %config.auth.token_file.display(),
        "Configuration loaded"
    );

    match cli.command {
        Command::Login { email, password } => {
            client.auth().login_basic(&email, &password).await?;
            println!("Logged in as {email}");
        }
        Command::Logout => {
            client.auth().logout().await?;
            println!("Logged out");
        }
        Command::Keepalive { interval_secs } => {
            if store.get_token(true)?.is_none() {
                bail!("No session token stored; run `admin-console login` first");
            }

            let period = interval_secs.map_or_else(
                || config.auth.refresh_interval(),
                |secs| std::time::Duration::from_secs(secs.max(1)),
            );
            let handle = Keepalive::new(Arc::clone(&store), Arc::new(client)).spawn(period);

            let cancel = handle.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            match handle.wait().await {
                KeepaliveState::Disarmed => {
                    println!("Session can no longer be refreshed; keepalive stopped");
                }
                _ => println!("Keepalive stopped"),
            }
        }
        Command::Export {
            conversation,
            input,
            out,
        } => {
            let exchanges = match (conversation, input) {
                (Some(id), _) => client.history().messages(&id).await?,
                (None, Some(path)) => load_exchanges(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Either --conversation or --input is required"),
            };

            let download = MessageDownload::new(&exchanges)?;
            let dir = out.unwrap_or_else(|| config.export.dir.clone());
            let url = download.save(&dir)?;
            println!("{url}");
        }
        Command::Status => match Shell::bootstrap(&client).await? {
            None => println!("Not logged in"),
            Some(shell) => {
                println!("Logged in as {}", shell.profile.email);
                if !shell.is_licensed() {
                    println!("Warning: this server is not licensed");
                }
            }
        },
    }

    Ok(())
}
