//! # vox-daemon
//!
//! The resident synthesis service (`voxd`).
//!
//! Owns one engine instance and one voice cache, streams audio frames the
//! moment they are produced, and shuts itself down after a configurable
//! idle period. The bound endpoint is the single-instance lock; there is
//! no other cross-process coordination.

pub mod cache;
pub mod context;
pub mod idle;
pub mod server;

pub use cache::VoiceCache;
pub use context::{ActivityTracker, DaemonContext};
pub use idle::IdleMonitor;
pub use server::VoxServer;
