//! # Strata Storage
//!
//! Byte-store backends underneath the Strata commit journal.
//!
//! Backends are **opaque**: they append, read back and truncate bytes and
//! know nothing about frames, commits or entities. `strata_core` owns the
//! journal format.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - a single append-only file
//!
//! ## Example
//!
//! ```rust
//! use strata_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"frame-1").unwrap();
//! backend.append(b"frame-2").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"frame-1frame-2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
