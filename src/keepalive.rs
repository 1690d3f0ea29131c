//! Session keepalive.
//!
//! A background timer that renews the session token before it expires.
//! Each tick checks the store; when the token is inside its refresh window
//! the server is asked for a new one. A server answering with the token we
//! already hold cannot refresh any further, so the timer disarms itself.
//!
//! Ticks are awaited one at a time, so two refreshes never overlap even when
//! the server is slower than the tick period.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::auth::TokenStore;
use crate::error::{Error, Result};

/// Default tick period (5 minutes).
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Source of renewed session tokens.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Ask the server for a renewed token.
    async fn refresh(&self) -> Result<String>;
}

/// Where the keepalive is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveState {
    /// Waiting for the next tick.
    Idle,
    /// A refresh call is in flight.
    Refreshing,
    /// The server stopped issuing new tokens; no further ticks.
    Disarmed,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The token is not inside its refresh window; nothing was sent.
    NotDue,
    /// A new token was stored.
    Refreshed,
    /// The server returned the token already held; the timer is disarmed.
    Unchanged,
    /// The refresh failed and was logged; the next tick retries.
    Failed,
    /// The keepalive was already disarmed.
    Disarmed,
}

/// The refresh state machine.
pub struct Keepalive {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    state: KeepaliveState,
}

impl std::fmt::Debug for Keepalive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keepalive")
            .field("store", &self.store)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Keepalive {
    /// Create an idle keepalive.
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            state: KeepaliveState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> KeepaliveState {
        self.state
    }

    /// Run one timer tick.
    ///
    /// Never fails: errors are logged and leave the keepalive armed.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.state == KeepaliveState::Disarmed {
            return TickOutcome::Disarmed;
        }

        match self.try_refresh().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = KeepaliveState::Idle;
                error!(
                    name: "auth.refresh.failed",
                    error = %e,
                    "Error validating & refreshing token"
                );
                TickOutcome::Failed
            }
        }
    }

    async fn try_refresh(&mut self) -> Result<TickOutcome> {
        if !self.store.token_needs_refresh() {
            return Ok(TickOutcome::NotDue);
        }

        let current = self.store.get_token(false)?.ok_or(Error::NoToken)?;

        self.state = KeepaliveState::Refreshing;
        let new_token = self.refresher.refresh().await?;

        if new_token == current.token {
            self.state = KeepaliveState::Disarmed;
            info!(
                name: "auth.keepalive.disarmed",
                "Server returned the current token; stopping refresh timer"
            );
            return Ok(TickOutcome::Unchanged);
        }

        self.store.set_token(&new_token)?;
        self.state = KeepaliveState::Idle;
        info!(name: "auth.token.refreshed", "Token refreshed successfully");
        Ok(TickOutcome::Refreshed)
    }

    /// Arm the timer on a background task.
    ///
    /// The first tick fires one `period` from now. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn spawn(mut self, period: Duration) -> KeepaliveHandle {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(name: "auth.keepalive.armed", period_secs = period.as_secs(), "Keepalive armed");

            loop {
                tokio::select! {
                    biased;
                    () = stop.cancelled() => {
                        debug!(name: "auth.keepalive.cancelled", "Keepalive cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if self.tick().await == TickOutcome::Unchanged {
                            break;
                        }
                    }
                }
            }

            self.state
        });

        KeepaliveHandle { cancel, task }
    }
}

/// Owner of a running keepalive task.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct KeepaliveHandle {
    cancel: CancellationToken,
    task: JoinHandle<KeepaliveState>,
}

impl KeepaliveHandle {
    /// Whether the timer has stopped, by cancellation or by disarming.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the timer and wait for the task to exit.
    ///
    /// Returns the state the keepalive ended in.
    pub async fn shutdown(self) -> KeepaliveState {
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the timer to stop on its own (or be cancelled elsewhere).
    pub async fn wait(mut self) -> KeepaliveState {
        match (&mut self.task).await {
            Ok(state) => state,
            Err(e) => {
                error!(name: "auth.keepalive.panicked", error = %e, "Keepalive task ended abnormally");
                KeepaliveState::Idle
            }
        }
    }

    /// Token that cancels this keepalive, for wiring into a shutdown signal.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for KeepaliveHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
