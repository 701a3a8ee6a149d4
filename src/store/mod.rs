//! Durable local state: cached binaries, resource snapshots, and the
//! cross-system identity mapping.

pub mod cache;
pub mod content;
pub mod mapping;

pub use cache::{CacheRecord, ResourceCache};
pub use content::{ContentStore, StagedWrite};
pub use mapping::MappingStore;
