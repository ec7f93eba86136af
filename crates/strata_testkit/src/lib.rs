//! # Strata Testkit
//!
//! Test utilities for Strata.
//!
//! This crate provides:
//! - Test databases over memory or a temporary file
//! - Sample entities covering every capability combination the tests need
//! - Handlers that record or fail lifecycle hooks
//! - A storage backend with injectable failures
//! - A deterministic embedding service
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use strata_testkit::prelude::*;
//!
//! let db = TestDatabase::memory();
//! let tasks = db.repository::<Task>().build();
//! let saved = tasks.save(Task::new("write tests")).unwrap().into_entity();
//! assert_eq!(tasks.history(saved.uuid()).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod embedder;
pub mod entities;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod handlers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::embedder::*;
    pub use crate::entities::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::handlers::*;
    pub use strata_core::Entity;
}

pub use embedder::*;
pub use entities::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use handlers::*;
