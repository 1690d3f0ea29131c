//! Token storage slot.
//!
//! The session token lives in exactly one place per process: written at
//! login, read and overwritten by the keepalive, cleared at logout.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::warn;

use super::token::StoredToken;
use crate::error::Result;

/// Timing rules applied to stored tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// A token is refreshed once it expires within this window.
    pub refresh_window: Duration,
    /// Lifetime assumed for tokens that carry no `exp` claim.
    pub token_lifetime: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            refresh_window: Duration::from_secs(10 * 60),
            token_lifetime: Duration::from_secs(60 * 60),
        }
    }
}

/// Storage boundary for the session token.
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Read the stored token.
    ///
    /// With `force_refresh` set, the backing storage is re-read instead of
    /// answering from any cached copy.
    fn get_token(&self, force_refresh: bool) -> Result<Option<StoredToken>>;

    /// Replace the stored token.
    fn set_token(&self, token: &str) -> Result<()>;

    /// Remove the stored token.
    fn clear_token(&self) -> Result<()>;

    /// Timing rules for this store.
    fn policy(&self) -> TokenPolicy;

    /// Whether the stored token is close enough to expiry to be renewed.
    ///
    /// A missing or unreadable token never needs a refresh.
    fn token_needs_refresh(&self) -> bool {
        match self.get_token(false) {
            Ok(Some(stored)) => stored.expires_within(self.policy().refresh_window, Utc::now()),
            Ok(None) => false,
            Err(e) => {
                warn!(name: "auth.store.read_failed", error = %e, "Could not read stored token");
                false
            }
        }
    }
}

/// In-process token slot.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<StoredToken>>,
    policy: TokenPolicy,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            slot: RwLock::new(None),
            policy,
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self, _force_refresh: bool) -> Result<Option<StoredToken>> {
        Ok(self.slot.read().unwrap().clone())
    }

    fn set_token(&self, token: &str) -> Result<()> {
        let stored = StoredToken::issue(token, Utc::now(), self.policy.token_lifetime);
        *self.slot.write().unwrap() = Some(stored);
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        *self.slot.write().unwrap() = None;
        Ok(())
    }

    fn policy(&self) -> TokenPolicy {
        self.policy
    }
}

/// Token slot persisted as a JSON file, so separate invocations of the
/// binary share one session.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<StoredToken>>,
    policy: TokenPolicy,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any token already saved there.
    ///
    /// A file that does not parse is treated as empty so a fresh login can
    /// overwrite it.
    pub fn open(path: impl Into<PathBuf>, policy: TokenPolicy) -> Result<Self> {
        let path = path.into();
        let cached = read_token_file(&path)?;
        Ok(Self {
            path,
            cached: RwLock::new(cached),
            policy,
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get_token(&self, force_refresh: bool) -> Result<Option<StoredToken>> {
        if force_refresh {
            let fresh = read_token_file(&self.path)?;
            *self.cached.write().unwrap() = fresh.clone();
            return Ok(fresh);
        }
        Ok(self.cached.read().unwrap().clone())
    }

    fn set_token(&self, token: &str) -> Result<()> {
        let stored = StoredToken::issue(token, Utc::now(), self.policy.token_lifetime);
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        // Write beside the target and rename over it, so readers never see
        // a half-written file.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&serde_json::to_vec_pretty(&stored)?)?;
        tmp.persist(&self.path).map_err(std::io::Error::from)?;
        *self.cached.write().unwrap() = Some(stored);
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *self.cached.write().unwrap() = None;
        Ok(())
    }

    fn policy(&self) -> TokenPolicy {
        self.policy
    }
}

fn read_token_file(path: &Path) -> Result<Option<StoredToken>> {
    match std::fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                warn!(
                    name: "auth.store.corrupt",
                    path = %path.display(),
                    error = %e,
                    "Ignoring unreadable token file"
                );
                Ok(None)
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
