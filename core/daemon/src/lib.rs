//! fieldtrace-daemon: the tracking agent.
//!
//! Orchestrates the two location-observation channels (a foreground
//! subscription and a named background task), funnels every observed fix
//! through a single record-and-ship path, and mirrors each fix into a local
//! SQLite ledger. The binary in `main.rs` is a thin wrapper; everything here
//! is exercised directly by the integration tests.

pub mod background;
pub mod foreground;
pub mod ledger;
pub mod lifecycle;
pub mod record;
pub mod source;
