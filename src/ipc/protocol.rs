//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::RouterEvent;
use crate::router::RouterState;

/// Requests from the recognizer or UI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Deliver one recognizer text fragment
    PushFragment { text: String },

    /// Manually select a section by name
    SelectSection { name: String },

    /// Manually replace the active section's content
    SetContent { text: String },

    /// Reset the whole document to empty sections
    ResetDocument,

    /// Subscribe to router event notifications
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Request queued for the router
    Accepted,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients
///
/// The router event is nested under its own key so its serde tag does not
/// collide with the notification's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A router event occurred
    Event { event: RouterEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current routing state
    pub state: RouterState,

    /// Display name of the active section, if any
    pub active_section: Option<String>,

    /// The fixed section catalogue, in order
    pub sections: Vec<String>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
