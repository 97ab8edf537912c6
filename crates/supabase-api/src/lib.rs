//! Supabase client for the channeldir bridge.
//!
//! This crate provides:
//! - OAuth sign-in via browser redirect and a local HTTP callback server
//! - Sign-out and refresh-token calls against the GoTrue auth API
//! - Insert/select on the `channels` table via the PostgREST API
//! - An auth-event broadcast stream mirroring session lifecycle changes
//! - Optional on-disk session persistence

mod auth;
mod client;
mod error;
mod oauth;

pub use auth::{AuthEvent, AuthSession, OAuthProvider, Record};
pub use client::SupabaseClient;
pub use error::{SupabaseError, SupabaseResult};
pub use oauth::{OAuthCallbackServer, OAuthResult, DEFAULT_OAUTH_PORT, DEFAULT_OAUTH_TIMEOUT_SECS};
