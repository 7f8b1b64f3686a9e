//! Command/dictation routing
//!
//! The router is the daemon's central state machine: it consumes recognizer
//! fragments one at a time, decides whether each is a navigation command,
//! the possible start of one, or dictated content, and mutates the section
//! store accordingly. A periodic timeout monitor backs it out of command
//! suspicion when no further fragments arrive.

mod machine;
mod timeout;

pub use machine::{Router, RouterMsg, RouterState, RouterStatus};
pub use timeout::TimeoutMonitor;
