//! Shared constants.

/// Assistant reply substituted when an exchange fails.
pub const FALLBACK_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// Storage key under which the session id is persisted.
pub const SESSION_KEY: &str = "chat_session_id";

/// Directory under the home directory holding config and state files.
pub const APP_DIR: &str = "ragchat";
