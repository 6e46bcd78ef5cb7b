//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the engine is open.
//!
//! # Tasks
//! - Expiry cleanup: purges expired entries from both local stores

mod cleanup;

pub use cleanup::spawn_cleanup_task;
