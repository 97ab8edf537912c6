//! Intent dispatch and auth-event observation.

use crate::messages::{classify_auth_event, Intent, Notification};
use async_trait::async_trait;
use std::sync::Arc;
use supabase_api::{AuthEvent, OAuthProvider, Record, SupabaseClient, SupabaseError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The backend operations the bridge issues, one per intent.
///
/// Implemented by [`SupabaseClient`]; test code substitutes a recording
/// mock. The error type is opaque to the bridge; it does not distinguish
/// failure kinds, it only logs the value.
#[async_trait]
pub trait ChannelBackend: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<(), Self::Error>;
    async fn sign_out(&self) -> Result<(), Self::Error>;
    async fn insert_channel(&self, fields: Record) -> Result<(), Self::Error>;
    async fn list_channels(&self) -> Result<Vec<Record>, Self::Error>;
}

#[async_trait]
impl ChannelBackend for SupabaseClient {
    type Error = SupabaseError;

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<(), Self::Error> {
        SupabaseClient::sign_in_with_oauth(self, provider).await
    }

    async fn sign_out(&self) -> Result<(), Self::Error> {
        SupabaseClient::sign_out(self).await
    }

    async fn insert_channel(&self, fields: Record) -> Result<(), Self::Error> {
        SupabaseClient::insert_channel(self, fields).await
    }

    async fn list_channels(&self) -> Result<Vec<Record>, Self::Error> {
        SupabaseClient::list_channels(self).await
    }
}

/// The bridge between the application core and the backend.
///
/// Holds the injected backend client and the notification sender; started
/// with [`Bridge::spawn`].
pub struct Bridge<B: ChannelBackend> {
    backend: Arc<B>,
    notifications: mpsc::Sender<Notification>,
}

/// Join handles for the two bridge loops.
pub struct BridgeHandle {
    intent_loop: JoinHandle<()>,
    auth_observer: JoinHandle<()>,
}

impl BridgeHandle {
    /// Abort both loops.
    pub fn abort(&self) {
        self.intent_loop.abort();
        self.auth_observer.abort();
    }

    /// Wait for both loops to finish. They end when their inbound
    /// channels close.
    pub async fn join(self) {
        let _ = self.intent_loop.await;
        let _ = self.auth_observer.await;
    }
}

impl<B: ChannelBackend> Bridge<B> {
    /// Create a new bridge over an injected backend client.
    pub fn new(backend: Arc<B>, notifications: mpsc::Sender<Notification>) -> Self {
        Self {
            backend,
            notifications,
        }
    }

    /// Start the bridge: an intent-dispatch loop and an independent
    /// auth-event observer, each on its own task.
    pub fn spawn(
        self,
        intents: mpsc::Receiver<Intent>,
        auth_events: broadcast::Receiver<AuthEvent>,
    ) -> BridgeHandle {
        let auth_observer = tokio::spawn(run_auth_observer(
            auth_events,
            self.notifications.clone(),
        ));
        let intent_loop = tokio::spawn(run_intent_loop(
            self.backend,
            intents,
            self.notifications,
        ));

        BridgeHandle {
            intent_loop,
            auth_observer,
        }
    }
}

/// Receive intents and spawn one detached handler task per intent.
///
/// Handlers are not mutually exclusive and complete in network order;
/// a hung backend call hangs only its own handler.
async fn run_intent_loop<B: ChannelBackend>(
    backend: Arc<B>,
    mut intents: mpsc::Receiver<Intent>,
    notifications: mpsc::Sender<Notification>,
) {
    while let Some(intent) = intents.recv().await {
        debug!(?intent, "Bridge received intent");
        let backend = backend.clone();
        let notifications = notifications.clone();
        tokio::spawn(async move {
            handle_intent(backend, notifications, intent).await;
        });
    }
    debug!("Intent channel closed; bridge stopping");
}

/// Issue the single backend call for one intent and relay the result.
///
/// Sign-in, sign-out, and create failures are logged and produce no
/// notification; the core observes them only as absent side effects.
/// Load always produces exactly one notification, folding failure into
/// an absent payload.
async fn handle_intent<B: ChannelBackend>(
    backend: Arc<B>,
    notifications: mpsc::Sender<Notification>,
    intent: Intent,
) {
    match intent {
        Intent::SignInWithOAuth { provider } => {
            if let Err(err) = backend.sign_in_with_oauth(provider).await {
                error!(provider = provider.as_str(), error = %err, "OAuth sign-in failed");
            }
        }
        Intent::SignOut => {
            if let Err(err) = backend.sign_out().await {
                error!(error = %err, "Sign-out failed");
            }
        }
        Intent::CreateChannel { fields } => {
            if let Err(err) = backend.insert_channel(fields).await {
                error!(error = %err, "Channel insert failed");
            }
        }
        Intent::LoadChannels => {
            let records = match backend.list_channels().await {
                Ok(rows) => Some(rows),
                Err(err) => {
                    debug!(error = %err, "Channel select produced no data");
                    None
                }
            };
            if notifications
                .send(Notification::ChannelsLoaded { records })
                .await
                .is_err()
            {
                warn!("Notification channel closed; dropping loaded channels");
            }
        }
    }
}

/// Relay auth events to the core for the process duration.
async fn run_auth_observer(
    mut auth_events: broadcast::Receiver<AuthEvent>,
    notifications: mpsc::Sender<Notification>,
) {
    loop {
        match auth_events.recv().await {
            Ok(event) => {
                info!(tag = event.as_tag(), "Auth state changed");
                if notifications
                    .send(classify_auth_event(event))
                    .await
                    .is_err()
                {
                    debug!("Notification channel closed; stopping auth observer");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Auth event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Auth event stream closed; stopping auth observer");
                break;
            }
        }
    }
}
