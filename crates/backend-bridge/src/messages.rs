//! The two closed message vocabularies exchanged with the application core.

use supabase_api::{AuthEvent, OAuthProvider, Record};

/// An outbound request from the application core.
///
/// Consumed exactly once by the bridge; never retried or deduplicated.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Start a browser OAuth flow for the named provider.
    SignInWithOAuth { provider: OAuthProvider },
    /// Terminate the current session.
    SignOut,
    /// Insert one channel record with the given fields.
    CreateChannel { fields: Record },
    /// Load all channel records.
    LoadChannels,
}

/// An inbound event reporting a result or state change to the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    UserSignedIn,
    UserSignedOut,
    /// The channel rows exactly as the backend returned them.
    /// `None` when the backend produced no data (including on failure).
    ChannelsLoaded { records: Option<Vec<Record>> },
}

/// Narrow a backend auth event to the binary signal the core understands.
///
/// The sign-out tag maps to [`Notification::UserSignedOut`]; every other
/// tag implies an active session. Pure function of the tag only.
pub fn classify_auth_event(event: AuthEvent) -> Notification {
    if event.is_signed_out() {
        Notification::UserSignedOut
    } else {
        Notification::UserSignedIn
    }
}
