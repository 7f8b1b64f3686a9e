//! IPC module for recognizer and UI communication
//!
//! The recognizer process pushes fragments and the UI issues manual
//! actions and status queries over the same Unix socket.

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response};
pub use server::Server;
