//! Tallies how much active time is spent on every website.
//! The daemon is launched by the browser, receives tab, window and idle notifications over stdin,
//! attributes elapsed time to sites and optionally flushes the counters to a remote collector.
//! The cli inspects and edits the same persisted state.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod host;
pub mod utils;
