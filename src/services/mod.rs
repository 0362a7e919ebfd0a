//! Service Usage helpers
//!
//! - [`registry`] - Display name to service id table (bundled JSON)
//! - [`resolver`] - Tiered name resolution over the table
//! - [`similarity`] - Similarity ratio used by the fuzzy tier

pub mod registry;
pub mod resolver;
pub mod similarity;

pub use registry::ApiNameTable;
pub use resolver::{ApiMatch, ApiResolver, MatchKind};
