//! Version history for versionable entities.
//!
//! Every committed save of a versionable entity appends exactly one
//! [`VersionRecord`], numbered 1, 2, 3, ... with no gaps. The record is
//! written by [`VersioningHandler`] through the same transaction as the save.

mod handler;
mod record;
mod store;

pub use handler::VersioningHandler;
pub use record::VersionRecord;
pub use store::{VersionStore, VERSIONS_COLLECTION};
