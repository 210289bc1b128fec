//! sp-core: shared types, errors, configuration, and event system.
//!
//! This crate is the foundational dependency for the other sp-* crates,
//! providing segment indices and byte ranges, the immutable segment
//! catalog, a unified error type, pump configuration, and a broadcast
//! event bus.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod index;

// Re-export the most commonly used items at the crate root.
pub use catalog::{ByteRange, Catalog, SegmentDescriptor};
pub use error::{Error, Result};
pub use index::SegmentIndex;
