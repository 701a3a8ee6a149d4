//! vidport - pull/cache/push migration between hosted video platforms
//!
//! Migrates a library of videos and user profiles from a records-API
//! source platform to a video-hosting destination. Every asset is pulled
//! into a local cache, normalized where the destination demands it, then
//! pushed through the destination's upload API.
//!
//! # Architecture
//!
//! The engine is built for interruption:
//! - Every durable state change commits individually and atomically
//! - The identity mapping store records each confirmed upload before the
//!   next resource is touched
//! - Re-running pull or push only performs the work that is still missing
//!
//! # Modules
//!
//! - `domain`: Data structures (Video, Attachment, Profile)
//! - `store`: Local state (ContentStore, ResourceCache, MappingStore)
//! - `platform`: Source/Destination traits and their HTTP clients
//! - `engine`: Pull and push loops, ownership resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Mirror the source into the local cache
//! vidport pull
//!
//! # Trial-push a couple of videos
//! vidport push --limit 2
//!
//! # Push everything, skipping failures for later inspection
//! vidport push --skip-errors
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod media;
pub mod platform;
pub mod store;

// Re-export main types at crate root for convenience
pub use domain::{Attachment, Profile, Video};
pub use engine::{OwnershipTable, PullEngine, PullReport, PushEngine, PushOptions, PushReport};
pub use error::{MigrateError, Result};
pub use platform::{AccessToken, Destination, Source};
pub use store::{ContentStore, MappingStore, ResourceCache};
