//! Utility functions and helpers
//!
//! This module contains crash-safe file writing used by the file store.

pub mod atomic;

pub use atomic::{atomic_write, cleanup_temp_file, temp_path};
