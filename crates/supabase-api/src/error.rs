//! Error types for Supabase operations.

use thiserror::Error;

/// Error type for all Supabase auth and data operations.
///
/// The bridge does not distinguish error kinds; callers surface whatever
/// value the failed call produced.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase API returned a non-success HTTP status.
    ///
    /// Contains the HTTP status code and response body for debugging.
    #[error("Supabase error: {status} - {message}")]
    Supabase {
        /// The HTTP status code returned by Supabase.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// The browser-based OAuth flow failed or returned an incomplete result.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (callback server socket, session file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for Supabase operations.
pub type SupabaseResult<T> = Result<T, SupabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supabase_error_display() {
        let err = SupabaseError::Supabase {
            status: 401,
            message: "JWT expired".to_string(),
        };
        assert_eq!(format!("{}", err), "Supabase error: 401 - JWT expired");
    }

    #[test]
    fn oauth_error_display() {
        let err = SupabaseError::OAuth("access_denied".to_string());
        assert_eq!(format!("{}", err), "OAuth error: access_denied");
    }

    #[test]
    fn json_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json {{{").unwrap_err();
        let err: SupabaseError = serde_err.into();
        assert!(format!("{}", err).starts_with("JSON error:"));
    }
}
