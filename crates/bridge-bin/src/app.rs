//! Process wiring: client construction, channel setup, bridge startup.

use crate::console::ConsoleCore;
use backend_bridge::Bridge;
use bridge_config::{Config, Paths};
use std::sync::Arc;
use supabase_api::SupabaseClient;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Capacity of the intent queue from the core.
const INTENT_QUEUE_CAPACITY: usize = 64;
/// Capacity of the notification queue to the core.
const NOTIFICATION_QUEUE_CAPACITY: usize = 64;

/// Wire the client, channels, and bridge, then hand control to the console.
pub async fn run(config: Config, paths: Paths) -> anyhow::Result<()> {
    let url = config.supabase_url()?;

    let client = SupabaseClient::new(
        config.supabase_url.as_str(),
        config.supabase_anon_key.as_str(),
    )
    .with_session_store(paths.session_file());

    let (intent_tx, intent_rx) = mpsc::channel(INTENT_QUEUE_CAPACITY);
    let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_QUEUE_CAPACITY);
    let auth_events = client.subscribe_auth_events();

    let client = Arc::new(client);
    let handle = Bridge::new(client.clone(), notify_tx).spawn(intent_rx, auth_events);
    info!(url = %url, "Bridge started");

    // Restore after the observer is wired so the sign-in event is relayed.
    if let Err(err) = client.load_persisted_session().await {
        warn!(error = %err, "Failed to restore persisted session");
    }

    let core = ConsoleCore::new(config.core_api_key.clone(), client);
    core.run(intent_tx, notify_rx).await?;

    handle.abort();
    Ok(())
}
