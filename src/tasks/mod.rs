//! Background Tasks Module
//!
//! Contains background tasks that run while the shell is serving commands.
//!
//! # Tasks
//! - Expiration sweep: removes expired items from memory nodes at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
