//! HTTP client for the admin server.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenStore;
use crate::console::{Licensing, UserProfile};
use crate::error::{Error, Result};
use crate::history::MessageExchange;
use crate::keepalive::TokenRefresher;

/// Envelope wrapping every admin API response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub payload: T,
}

/// Body of `GET auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub new_token: String,
}

/// Body of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginPayload {
    pub jwt: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client for the admin API.
///
/// Requests built with the secured builder carry the stored session token
/// as a bearer credential.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use admin_console::auth::{MemoryTokenStore, TokenPolicy};
/// use admin_console::client::AdminClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryTokenStore::new(TokenPolicy::default()));
/// let client = AdminClient::new("http://localhost:3000/api/v1/", store)?;
///
/// client.auth().login_basic("admin@example.com", "secret").await?;
/// let history = client.history().messages("conv-42").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdminClient {
    base_url: Url,
    http: reqwest::Client,
    store: Arc<dyn TokenStore>,
}

impl AdminClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the admin API (e.g. "http://localhost:3000/api/v1/")
    /// * `store` - Slot holding the session token
    pub fn new(base_url: impl AsRef<str>, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::with_client(base_url, store, reqwest::Client::new())
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(
        base_url: impl AsRef<str>,
        store: Arc<dyn TokenStore>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            base_url,
            http,
            store,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The token slot this client authenticates from.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the Auth API.
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi { client: self }
    }

    /// Access the History API.
    pub fn history(&self) -> HistoryApi<'_> {
        HistoryApi { client: self }
    }

    /// Access the Console API (profile, licensing).
    pub fn console(&self) -> ConsoleApi<'_> {
        ConsoleApi { client: self }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn secured(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let request = self.http.request(method, self.url(path)?);
        Ok(match self.store.get_token(false)? {
            Some(stored) => request.bearer_auth(stored.token),
            None => request,
        })
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl TokenRefresher for AdminClient {
    async fn refresh(&self) -> Result<String> {
        self.auth().refresh().await
    }
}

// =============================================================================
// Auth API
// =============================================================================

/// Auth API client.
#[derive(Debug)]
pub struct AuthApi<'a> {
    client: &'a AdminClient,
}

impl AuthApi<'_> {
    /// Ask the server for a renewed session token.
    ///
    /// Returns the token the server handed back; storing it is up to the
    /// caller.
    pub async fn refresh(&self) -> Result<String> {
        let response = self
            .client
            .secured(reqwest::Method::GET, "auth/refresh")?
            .send()
            .await?;
        let body: Envelope<RefreshPayload> = AdminClient::handle_response(response).await?;
        Ok(body.payload.new_token)
    }

    /// Log in with email and password, storing the issued token.
    pub async fn login_basic(&self, email: &str, password: &str) -> Result<()> {
        let response = self
            .client
            .http
            .post(self.client.url("auth/login/basic/default")?)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let body: Envelope<LoginPayload> = AdminClient::handle_response(response).await?;
        self.client.store.set_token(&body.payload.jwt)?;
        debug!(name: "auth.login.succeeded", email = %email, "Logged in");
        Ok(())
    }

    /// Invalidate the session server-side and clear the stored token.
    ///
    /// The local token is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let outcome = match self.client.secured(reqwest::Method::POST, "auth/logout") {
            Ok(request) => match request.send().await {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(Error::Api {
                    status: response.status().as_u16(),
                    message: response.text().await.unwrap_or_default(),
                }),
                Err(e) => Err(e.into()),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            warn!(name: "auth.logout.remote_failed", error = %e, "Server-side logout failed");
        }
        self.client.store.clear_token()?;
        outcome
    }
}

// =============================================================================
// History API
// =============================================================================

/// History API client.
#[derive(Debug)]
pub struct HistoryApi<'a> {
    client: &'a AdminClient,
}

impl HistoryApi<'_> {
    /// Get the message exchanges of a conversation, oldest first.
    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageExchange>> {
        let response = self
            .client
            .secured(
                reqwest::Method::GET,
                &format!("mod/history/messages/{conversation_id}"),
            )?
            .send()
            .await?;
        AdminClient::handle_response(response).await
    }
}

// =============================================================================
// Console API
// =============================================================================

/// Console API client.
#[derive(Debug)]
pub struct ConsoleApi<'a> {
    client: &'a AdminClient,
}

impl ConsoleApi<'_> {
    /// Get the profile of the logged-in user.
    pub async fn profile(&self) -> Result<UserProfile> {
        let response = self
            .client
            .secured(reqwest::Method::GET, "auth/me/profile")?
            .send()
            .await?;
        let body: Envelope<UserProfile> = AdminClient::handle_response(response).await?;
        Ok(body.payload)
    }

    /// Get the server's licensing status.
    pub async fn licensing(&self) -> Result<Licensing> {
        let response = self
            .client
            .secured(reqwest::Method::GET, "admin/license/status")?
            .send()
            .await?;
        let body: Envelope<Licensing> = AdminClient::handle_response(response).await?;
        Ok(body.payload)
    }
}
