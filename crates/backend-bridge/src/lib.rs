//! Backend bridge between the application core and Supabase.
//!
//! The bridge receives [`Intent`]s from the application core over a typed
//! channel, issues exactly one backend call per intent, and relays results
//! back as [`Notification`]s. It also observes the backend's auth-event
//! stream for the process duration and narrows each event to a binary
//! signed-in/signed-out signal.
//!
//! # Architecture
//!
//! ```text
//! Core ──Intent──▶ Bridge ──one call──▶ Supabase
//!      ◀─Notification── Bridge ◀──auth events──┘
//! ```
//!
//! # Design Principles
//!
//! - **Fire-and-forget**: each intent runs in its own detached task;
//!   handlers never block one another and carry no shared mutable state
//! - **Errors are logged, not surfaced**: a failed sign-in, sign-out, or
//!   insert produces a diagnostic log entry and nothing else
//! - **Pass-through payloads**: record fields and loaded rows cross the
//!   bridge unchanged

mod bridge;
mod messages;

pub use bridge::{Bridge, BridgeHandle, ChannelBackend};
pub use messages::{classify_auth_event, Intent, Notification};
pub use supabase_api::Record;
