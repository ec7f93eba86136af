//! Lifecycle hooks around saves and deletes.
//!
//! Hooks come in two kinds:
//!
//! - `before_save` / `before_delete` run inside the transaction, in
//!   registration order. The first error aborts: nothing is written and the
//!   error reaches the caller as returned by the hook.
//! - `after_save` / `after_delete` run after the commit. Their errors are
//!   logged and collected on the returned [`Outcome`]; the committed write
//!   stays.

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::transaction::TransactionContext;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Per-call options for a save.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Set `updated_at` to now. On by default.
    pub touch: bool,
    /// Version the caller last saw; a different latest version is a
    /// conflict. Only checked for versionable types.
    pub expected_version: Option<u64>,
    /// Actor recorded on the version record; the database default if unset.
    pub modified_by: Option<String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            touch: true,
            expected_version: None,
            modified_by: None,
        }
    }
}

impl SaveOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves `updated_at` as it is.
    #[must_use]
    pub fn without_touch(mut self) -> Self {
        self.touch = false;
        self
    }

    /// Requires the latest stored version to be `version`.
    #[must_use]
    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Records `actor` as the author of the change.
    #[must_use]
    pub fn modified_by(mut self, actor: impl Into<String>) -> Self {
        self.modified_by = Some(actor.into());
        self
    }
}

/// What a `before_save` hook sees.
#[derive(Debug)]
pub struct SaveEvent<'e, T> {
    /// The entity about to be written. Hooks may modify it.
    pub entity: &'e mut T,
    /// The last persisted state, or `None` for a first save.
    pub previous: Option<&'e T>,
    /// The caller's options.
    pub options: &'e SaveOptions,
}

/// Lifecycle phase a hook ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    /// Before the entity write, inside the transaction.
    BeforeSave,
    /// After the commit of a save.
    AfterSave,
    /// Before the delete, inside the transaction.
    BeforeDelete,
    /// After the commit of a delete.
    AfterDelete,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeSave => "before_save",
            Self::AfterSave => "after_save",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
        })
    }
}

/// A best-effort hook that failed after commit.
#[derive(Debug)]
pub struct HookFailure {
    /// Name of the handler.
    pub handler: String,
    /// Phase it failed in.
    pub phase: HookPhase,
    /// What it returned.
    pub error: StoreError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.handler, self.phase, self.error)
    }
}

/// Result of a committed save or delete.
///
/// `hook_failures` lists best-effort hooks that failed; each can be retried
/// independently. The write itself is committed either way.
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    /// The entity as written (or as it was before deletion).
    pub entity: T,
    /// Failed best-effort hooks, in the order they ran.
    pub hook_failures: Vec<HookFailure>,
}

impl<T: Entity> Outcome<T> {
    pub(crate) fn new(entity: T, hook_failures: Vec<HookFailure>) -> Self {
        Self {
            entity,
            hook_failures,
        }
    }

    /// Returns true if every best-effort hook succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.hook_failures.is_empty()
    }

    /// Returns the entity, or [`StoreError::PartialFailure`] if any
    /// best-effort hook failed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PartialFailure`] naming each failed hook.
    pub fn into_result(self) -> StoreResult<T> {
        if self.hook_failures.is_empty() {
            return Ok(self.entity);
        }
        Err(StoreError::PartialFailure {
            entity_type: T::ENTITY_TYPE.to_string(),
            uuid: self.entity.uuid(),
            failures: self.hook_failures.iter().map(ToString::to_string).collect(),
        })
    }

    /// Returns the entity and drops the failure list.
    pub fn into_entity(self) -> T {
        self.entity
    }
}

/// Lifecycle hooks for entities of type `T`.
///
/// All methods default to doing nothing.
pub trait EntityHandler<T: Entity>: Send + Sync {
    /// Name used in logs and [`HookFailure`]s.
    fn name(&self) -> &str;

    /// Extra collections this handler writes inside the transaction.
    ///
    /// They are added to the scope of every transaction the repository
    /// opens.
    fn collections(&self) -> Vec<String> {
        Vec::new()
    }

    /// Runs before the entity is written. An error aborts the save.
    ///
    /// # Errors
    ///
    /// Any error vetoes the save and is returned to the caller unchanged.
    fn before_save(
        &self,
        _ctx: &mut TransactionContext<'_>,
        _event: &mut SaveEvent<'_, T>,
    ) -> StoreResult<()> {
        Ok(())
    }

    /// Runs after the save committed.
    ///
    /// # Errors
    ///
    /// Errors are recorded on the [`Outcome`]; the save stays committed.
    fn after_save(&self, _entity: &T) -> StoreResult<()> {
        Ok(())
    }

    /// Runs before the entity is deleted. An error aborts the delete.
    ///
    /// # Errors
    ///
    /// Any error vetoes the delete and is returned to the caller unchanged.
    fn before_delete(&self, _ctx: &mut TransactionContext<'_>, _entity: &T) -> StoreResult<()> {
        Ok(())
    }

    /// Runs after the delete committed.
    ///
    /// # Errors
    ///
    /// Errors are recorded on the [`Outcome`]; the delete stays committed.
    fn after_delete(&self, _entity: &T) -> StoreResult<()> {
        Ok(())
    }
}

/// Registered handlers of one repository, in order.
pub(crate) struct HandlerChain<T: Entity> {
    handlers: Vec<Arc<dyn EntityHandler<T>>>,
}

impl<T: Entity> HandlerChain<T> {
    pub(crate) fn new(handlers: Vec<Arc<dyn EntityHandler<T>>>) -> Self {
        Self { handlers }
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub(crate) fn collections(&self) -> BTreeSet<String> {
        self.handlers
            .iter()
            .flat_map(|h| h.collections())
            .collect()
    }

    pub(crate) fn before_save(
        &self,
        ctx: &mut TransactionContext<'_>,
        event: &mut SaveEvent<'_, T>,
    ) -> StoreResult<()> {
        for handler in &self.handlers {
            handler.before_save(ctx, event).inspect_err(|err| {
                warn!(
                    handler = handler.name(),
                    entity_type = T::ENTITY_TYPE,
                    error = %err,
                    "before_save aborted the save"
                );
            })?;
        }
        Ok(())
    }

    pub(crate) fn before_delete(
        &self,
        ctx: &mut TransactionContext<'_>,
        entity: &T,
    ) -> StoreResult<()> {
        for handler in &self.handlers {
            handler.before_delete(ctx, entity).inspect_err(|err| {
                warn!(
                    handler = handler.name(),
                    entity_type = T::ENTITY_TYPE,
                    error = %err,
                    "before_delete aborted the delete"
                );
            })?;
        }
        Ok(())
    }

    pub(crate) fn after_save(&self, entity: &T) -> Vec<HookFailure> {
        self.run_best_effort(HookPhase::AfterSave, |h| h.after_save(entity))
    }

    pub(crate) fn after_delete(&self, entity: &T) -> Vec<HookFailure> {
        self.run_best_effort(HookPhase::AfterDelete, |h| h.after_delete(entity))
    }

    fn run_best_effort<F>(&self, phase: HookPhase, mut hook: F) -> Vec<HookFailure>
    where
        F: FnMut(&dyn EntityHandler<T>) -> StoreResult<()>,
    {
        let mut failures = Vec::new();
        for handler in &self.handlers {
            if let Err(error) = hook(handler.as_ref()) {
                warn!(
                    handler = handler.name(),
                    entity_type = T::ENTITY_TYPE,
                    %phase,
                    error = %error,
                    "best-effort hook failed after commit"
                );
                failures.push(HookFailure {
                    handler: handler.name().to_string(),
                    phase,
                    error,
                });
            }
        }
        failures
    }
}
