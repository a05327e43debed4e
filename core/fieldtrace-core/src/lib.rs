//! # fieldtrace-core
//!
//! Core library for the fieldtrace agent, providing the shared logic for all
//! clients (daemon, CLI).
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with
//!   threads if needed.
//! - **Disk is the source of truth**: the session store is backed exclusively
//!   by persistent storage so a background invocation in a restarted process
//!   observes the latest identity.
//! - **Graceful degradation**: a missing config or permissions file yields
//!   defaults, not errors.

pub mod config;
pub mod device;
pub mod error;
pub mod permissions;
pub mod remote;
pub mod session;
pub mod storage;

pub use config::AgentConfig;
pub use error::{Result, TrackError};
pub use permissions::{PermissionGate, PlatformGate};
pub use remote::{FixShipper, RemoteClient};
pub use session::SessionStore;
pub use storage::StorageConfig;
