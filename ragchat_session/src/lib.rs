#![deny(
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

//! Durable client identity.
//!
//! A session id is read from per-installation key-value storage, or generated
//! and written there on first use, so every turn of every run from the same
//! installation correlates on the remote side.

mod identity;
mod store;

pub use identity::SessionIdentity;
pub use store::{FileStore, MemoryStore};
