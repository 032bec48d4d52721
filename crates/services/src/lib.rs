//! # services
//!
//! Use cases for thread posts: batch creation, the paged retrieval engine
//! and message edits. Parameter parsing lives here too, so the transport
//! layer only has to hand over the raw query strings.

pub mod cursor;
pub mod post_service;
pub mod sort_selector;

pub use post_service::{PostService, PostServiceConfig};
pub use sort_selector::{RawPageParams, SortSelector};
