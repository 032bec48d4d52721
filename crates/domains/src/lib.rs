//! # domains
//!
//! Entities, value types and port traits for the forum post engine.
//! Nothing in this crate performs I/O; adapters implement the ports.

pub mod errors;
pub mod models;
pub mod paging;
pub mod path;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use paging::*;
pub use path::*;
pub use ports::*;
