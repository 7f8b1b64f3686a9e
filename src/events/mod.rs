//! Notifications emitted by the router
//!
//! Broadcast to logging and UI collaborators, and pushed to subscribed IPC
//! clients as JSON.

use serde::{Deserialize, Serialize};

/// Events emitted by the router while processing fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterEvent {
    /// A navigation command resolved and the named section became active.
    SectionActivated {
        /// Catalogue display name of the section.
        name: String,
        /// The section's stored text at activation time.
        text: String,
    },

    /// A dictated fragment replaced the active section's text.
    ContentCommitted {
        /// Catalogue display name of the section.
        name: String,
        /// The committed text.
        text: String,
    },

    /// A fragment looked like the start of a command and is being withheld.
    CommandSuspected {
        /// The raw fragment that raised suspicion.
        fragment: String,
    },

    /// A command matched but its target resolved to no catalogue section.
    CommandRejected {
        /// The captured target phrase that failed to resolve.
        target: String,
    },

    /// A content fragment arrived with no active section and was dropped.
    NoActiveSection {
        /// The dropped raw fragment.
        fragment: String,
    },

    /// Command suspicion timed out without a command completing.
    SuspicionExpired,
}

impl std::fmt::Display for RouterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterEvent::SectionActivated { name, .. } => {
                write!(f, "SECTION_ACTIVATED ({name})")
            }
            RouterEvent::ContentCommitted { name, .. } => {
                write!(f, "CONTENT_COMMITTED ({name})")
            }
            RouterEvent::CommandSuspected { fragment } => {
                write!(f, "COMMAND_SUSPECTED ({fragment})")
            }
            RouterEvent::CommandRejected { target } => {
                write!(f, "COMMAND_REJECTED ({target})")
            }
            RouterEvent::NoActiveSection { .. } => write!(f, "NO_ACTIVE_SECTION"),
            RouterEvent::SuspicionExpired => write!(f, "SUSPICION_EXPIRED"),
        }
    }
}
