//! Auth vocabulary: providers, session-lifecycle events, and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An opaque row in the remote table. Schema is owned by the backend;
/// the bridge never validates or transforms it.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// OAuth providers the backend supports for browser sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    /// The provider name as the auth API expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }

    /// Parse a provider name. Returns None for unknown providers.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google" => Some(OAuthProvider::Google),
            "github" => Some(OAuthProvider::Github),
            _ => None,
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session-lifecycle event pushed on the auth-event stream.
///
/// Fixed vocabulary matching the backend's wire tags. Consumers that only
/// care about signed-in vs. signed-out should use [`AuthEvent::is_signed_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEvent {
    /// The wire tag for this event.
    pub fn as_tag(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated => "USER_UPDATED",
        }
    }

    /// Parse a wire tag. Returns None for tags outside the vocabulary.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SIGNED_IN" => Some(AuthEvent::SignedIn),
            "SIGNED_OUT" => Some(AuthEvent::SignedOut),
            "TOKEN_REFRESHED" => Some(AuthEvent::TokenRefreshed),
            "USER_UPDATED" => Some(AuthEvent::UserUpdated),
            _ => None,
        }
    }

    /// Whether this is the sign-out tag. Every other tag implies an
    /// active session.
    pub fn is_signed_out(&self) -> bool {
        matches!(self, AuthEvent::SignedOut)
    }
}

/// An authenticated backend session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// JWT access token for API authentication.
    pub access_token: String,
    /// Refresh token for the refresh-token grant.
    pub refresh_token: String,
    /// The authenticated user's ID.
    pub user_id: String,
    /// The authenticated user's email, when the provider shares it.
    pub email: Option<String>,
    /// Access token expiry time.
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn provider_wire_names() {
        assert_eq!(OAuthProvider::Google.as_str(), "google");
        assert_eq!(OAuthProvider::Github.as_str(), "github");
    }

    #[test]
    fn provider_from_name_roundtrip() {
        assert_eq!(
            OAuthProvider::from_name("google"),
            Some(OAuthProvider::Google)
        );
        assert_eq!(
            OAuthProvider::from_name("github"),
            Some(OAuthProvider::Github)
        );
        assert_eq!(OAuthProvider::from_name("gitlab"), None);
        assert_eq!(OAuthProvider::from_name(""), None);
    }

    #[test]
    fn auth_event_tags_roundtrip() {
        for event in [
            AuthEvent::SignedIn,
            AuthEvent::SignedOut,
            AuthEvent::TokenRefreshed,
            AuthEvent::UserUpdated,
        ] {
            assert_eq!(AuthEvent::from_tag(event.as_tag()), Some(event));
        }
        assert_eq!(AuthEvent::from_tag("PASSWORD_RECOVERY"), None);
    }

    #[test]
    fn only_signed_out_is_signed_out() {
        assert!(AuthEvent::SignedOut.is_signed_out());
        assert!(!AuthEvent::SignedIn.is_signed_out());
        assert!(!AuthEvent::TokenRefreshed.is_signed_out());
        assert!(!AuthEvent::UserUpdated.is_signed_out());
    }

    #[test]
    fn session_expiry() {
        let mut session = AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "user-1".to_string(),
            email: None,
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(!session.is_expired());

        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = AuthSession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            expires_at: Utc::now(),
        };

        let json = serde_json::to_string(&session).unwrap();
        let parsed: AuthSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.access_token, "access");
        assert_eq!(parsed.user_id, "user-1");
        assert_eq!(parsed.email.as_deref(), Some("user@example.com"));
    }
}
