//! Spoken navigation command detection
//!
//! Recognizes "go to <section>" style commands in normalized recognizer
//! fragments, including the common misrecognitions of the phrase, and
//! recovers commands whose words arrived split across fragments.

mod grammar;
mod history;

pub use grammar::{CommandMatch, CommandMatcher, Grammar};
pub use history::HistoryBuffer;
