//! Supabase REST API client for auth and channel storage.
//!
//! One client instance is constructed at process start and shared read-only
//! by everything that issues remote calls. Auth state lives behind an
//! `RwLock`; session-lifecycle changes are mirrored onto a broadcast stream
//! that observers can subscribe to.

use crate::auth::{AuthEvent, AuthSession, OAuthProvider, Record};
use crate::error::{SupabaseError, SupabaseResult};
use crate::oauth::OAuthCallbackServer;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// The single table channel records live in.
const CHANNELS_TABLE: &str = "channels";

/// Capacity of the auth-event broadcast channel.
const AUTH_EVENT_CAPACITY: usize = 16;

/// Supabase client for auth and channel-table operations.
#[derive(Clone)]
pub struct SupabaseClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<AuthSession>>>,
    auth_events: broadcast::Sender<AuthEvent>,
    session_store: Option<PathBuf>,
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            anon_key: anon_key.into(),
            session: Arc::new(RwLock::new(None)),
            auth_events,
            session_store: None,
        }
    }

    /// Persist the session as JSON at `path` across restarts.
    pub fn with_session_store(mut self, path: PathBuf) -> Self {
        self.session_store = Some(path);
        self
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Build the auth API URL for an endpoint.
    fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, endpoint)
    }

    /// Subscribe to session-lifecycle events.
    ///
    /// Events are delivered for the process duration, independent of any
    /// in-flight call. Subscribe before triggering auth operations;
    /// a broadcast receiver only sees events sent after it was created.
    pub fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    /// The current session, if signed in.
    pub async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Bearer token for data-plane requests: the session access token when
    /// signed in, otherwise the anon key.
    async fn bearer_token(&self) -> String {
        match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        }
    }

    /// Sign in with an OAuth provider via the browser.
    ///
    /// Builds the authorize URL, starts a local callback server, and waits
    /// for the redirect. The URL is logged for the user to open. On success
    /// the session is installed and `SIGNED_IN` is broadcast; there is no
    /// other success signal.
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> SupabaseResult<()> {
        self.sign_in_with_oauth_via(provider, OAuthCallbackServer::with_defaults())
            .await
    }

    /// Sign in with an OAuth provider using a specific callback server.
    pub async fn sign_in_with_oauth_via(
        &self,
        provider: OAuthProvider,
        server: OAuthCallbackServer,
    ) -> SupabaseResult<()> {
        let authorize_url = server.authorize_url(&self.api_url, provider);
        info!(
            provider = provider.as_str(),
            url = %authorize_url,
            "Open this URL in a browser to continue sign-in"
        );

        let result = server.wait_for_callback().await?;

        if !result.success {
            return Err(SupabaseError::OAuth(
                result
                    .error
                    .unwrap_or_else(|| "OAuth flow failed".to_string()),
            ));
        }

        let missing = |field: &str| SupabaseError::OAuth(format!("Callback missing {}", field));
        let session = AuthSession {
            access_token: result.access_token.ok_or_else(|| missing("access_token"))?,
            refresh_token: result
                .refresh_token
                .ok_or_else(|| missing("refresh_token"))?,
            user_id: result.user_id.ok_or_else(|| missing("user_id"))?,
            email: result.email,
            expires_at: Utc::now() + chrono::Duration::seconds(result.expires_in.unwrap_or(3600)),
        };

        info!(provider = provider.as_str(), user_id = %session.user_id, "OAuth sign-in complete");
        self.install_session(session, AuthEvent::SignedIn).await
    }

    /// Terminate the current session.
    ///
    /// Calls the auth API when a session exists, then clears local state.
    /// Clearing always broadcasts `SIGNED_OUT`, even when there was no
    /// remote session to terminate.
    pub async fn sign_out(&self) -> SupabaseResult<()> {
        let session = self.session.read().await.clone();

        if let Some(session) = session {
            let url = self.auth_url("logout");
            debug!("Signing out");

            let response = self
                .http_client
                .post(&url)
                .header("apikey", &self.anon_key)
                .header("Authorization", format!("Bearer {}", session.access_token))
                .send()
                .await?;

            self.check_response(response).await?;
        }

        self.clear_session().await
    }

    /// Exchange the refresh token for a new session.
    ///
    /// Broadcasts `TOKEN_REFRESHED` on success.
    pub async fn refresh_session(&self) -> SupabaseResult<()> {
        let refresh_token = {
            let guard = self.session.read().await;
            match guard.as_ref() {
                Some(session) => session.refresh_token.clone(),
                None => return Err(SupabaseError::OAuth("No session to refresh".to_string())),
            }
        };

        let url = format!("{}?grant_type=refresh_token", self.auth_url("token"));

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, "Token refresh failed");
            return Err(SupabaseError::Supabase { status, message });
        }

        #[derive(serde::Deserialize)]
        struct RefreshResponse {
            access_token: String,
            refresh_token: String,
            expires_in: i64,
            user: RefreshUser,
        }

        #[derive(serde::Deserialize)]
        struct RefreshUser {
            id: String,
            #[serde(default)]
            email: Option<String>,
        }

        let data: RefreshResponse = response.json().await?;

        let session = AuthSession {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            user_id: data.user.id,
            email: data.user.email,
            expires_at: Utc::now() + chrono::Duration::seconds(data.expires_in),
        };

        info!(user_id = %session.user_id, "Session refreshed");
        self.install_session(session, AuthEvent::TokenRefreshed)
            .await
    }

    /// Insert one channel record. The fields map is passed through unchanged.
    pub async fn insert_channel(&self, fields: Record) -> SupabaseResult<()> {
        let url = self.rest_url(CHANNELS_TABLE);

        debug!("Inserting channel");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer_token().await))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&fields)
            .send()
            .await?;

        self.check_response(response).await?;

        debug!("Channel inserted");
        Ok(())
    }

    /// Select all channel records, exactly as the backend returns them.
    pub async fn list_channels(&self) -> SupabaseResult<Vec<Record>> {
        let url = format!("{}?select=*", self.rest_url(CHANNELS_TABLE));

        debug!("Loading channels");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer_token().await))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, "Failed to load channels");
            return Err(SupabaseError::Supabase { status, message });
        }

        let records: Vec<Record> = response.json().await?;
        debug!(count = records.len(), "Channels loaded");
        Ok(records)
    }

    /// Restore a previously persisted session, if a store is configured and
    /// a session file exists. Broadcasts `SIGNED_IN` when one was restored.
    pub async fn load_persisted_session(&self) -> SupabaseResult<bool> {
        let Some(path) = &self.session_store else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }

        let content = std::fs::read_to_string(path)?;
        let session: AuthSession = serde_json::from_str(&content)?;

        if session.is_expired() {
            warn!(user_id = %session.user_id, "Persisted session has expired");
        }

        info!(user_id = %session.user_id, "Restored persisted session");

        {
            let mut guard = self.session.write().await;
            *guard = Some(session);
        }
        let _ = self.auth_events.send(AuthEvent::SignedIn);
        Ok(true)
    }

    /// Store a session, persist it if configured, and broadcast `event`.
    async fn install_session(&self, session: AuthSession, event: AuthEvent) -> SupabaseResult<()> {
        if let Some(path) = &self.session_store {
            let content = serde_json::to_string_pretty(&session)?;
            std::fs::write(path, content)?;
        }

        {
            let mut guard = self.session.write().await;
            *guard = Some(session);
        }

        let _ = self.auth_events.send(event);
        Ok(())
    }

    /// Drop the session, remove any persisted copy, and broadcast `SIGNED_OUT`.
    async fn clear_session(&self) -> SupabaseResult<()> {
        {
            let mut guard = self.session.write().await;
            *guard = None;
        }

        if let Some(path) = &self.session_store {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Session cleared");
        let _ = self.auth_events.send(AuthEvent::SignedOut);
        Ok(())
    }

    /// Check an HTTP response for errors.
    async fn check_response(&self, response: reqwest::Response) -> SupabaseResult<()> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, "Supabase request failed");
            return Err(SupabaseError::Supabase { status, message });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
