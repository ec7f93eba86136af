//! Atomic units of work across one or more collections.
//!
//! Strata transactions are:
//! - **Atomic**: every write in a body commits together or not at all
//! - **Serialized**: one writer at a time
//! - **Isolated**: readers outside the body see committed state only
//! - **Durable**: a commit is journaled before it becomes visible

mod context;
mod manager;
mod state;

pub use context::TransactionContext;
pub use manager::TransactionManager;
