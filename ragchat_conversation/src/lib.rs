#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Conversation state and the per-turn request lifecycle.
//!
//! # Key Features
//! - Append-only transcript with a single "fresh" marker on the newest entry
//! - Change notification for presentation layers via `tokio::sync::watch`
//! - Single-flight turns: a submission while a turn is outstanding is dropped
//! - Exchange failures folded into a fixed apology reply, never propagated

mod lifecycle;
mod store;

pub use lifecycle::{LifecycleConfig, RequestLifecycle};
pub use store::ConversationStore;
