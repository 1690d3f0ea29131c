//! Admin shell state: the logged-in profile and the licensing banner.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::AdminClient;
use crate::error::Result;

/// Status string the server reports for a licensed installation.
pub const LICENSED_STATUS: &str = "licensed";

/// Profile of the logged-in administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_super_admin: bool,
}

/// Licensing state of the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Licensing {
    #[serde(default)]
    pub is_pro: bool,
    #[serde(default)]
    pub status: Option<String>,
}

/// Whether the "not licensed" warning should stay hidden.
///
/// Unknown licensing and community editions count as licensed; a pro
/// edition must report the `licensed` status.
#[must_use]
pub fn is_licensed(licensing: Option<&Licensing>) -> bool {
    match licensing {
        None => true,
        Some(l) if !l.is_pro => true,
        Some(l) => l.status.as_deref() == Some(LICENSED_STATUS),
    }
}

/// What the shell needs before it can show anything.
#[derive(Debug, Clone)]
pub struct Shell {
    pub profile: UserProfile,
    pub licensing: Option<Licensing>,
}

impl Shell {
    /// Fetch profile and licensing concurrently.
    ///
    /// Returns `Ok(None)` when there is no profile to show. A licensing
    /// failure is logged and treated as unknown.
    pub async fn bootstrap(client: &AdminClient) -> Result<Option<Self>> {
        let console = client.console();
        let (profile, licensing) = futures::join!(console.profile(), console.licensing());

        let profile = match profile {
            Ok(profile) => profile,
            Err(crate::Error::Api { status: 401 | 403 | 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let licensing = licensing
            .inspect_err(|e| {
                warn!(name: "console.licensing.unavailable", error = %e, "Licensing status unavailable");
            })
            .ok();

        Ok(Some(Self { profile, licensing }))
    }

    /// Whether the licensing banner is hidden.
    #[must_use]
    pub fn is_licensed(&self) -> bool {
        is_licensed(self.licensing.as_ref())
    }
}
