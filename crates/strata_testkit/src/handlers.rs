//! Handlers that record or fail hooks, for exercising the pipeline.

use parking_lot::Mutex;
use std::marker::PhantomData;
use strata_core::{
    Entity, EntityHandler, HookPhase, SaveEvent, StoreError, StoreResult, TransactionContext,
};
use uuid::Uuid;

/// Records every hook invocation as `(phase, uuid)`.
pub struct RecordingHandler<T: Entity> {
    name: String,
    events: Mutex<Vec<(HookPhase, Uuid)>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> RecordingHandler<T> {
    /// Creates a recorder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<(HookPhase, Uuid)> {
        self.events.lock().clone()
    }

    /// Phases recorded so far, in order.
    pub fn phases(&self) -> Vec<HookPhase> {
        self.events.lock().iter().map(|(phase, _)| *phase).collect()
    }

    fn record(&self, phase: HookPhase, uuid: Uuid) {
        self.events.lock().push((phase, uuid));
    }
}

impl<T: Entity> EntityHandler<T> for RecordingHandler<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_save(
        &self,
        _ctx: &mut TransactionContext<'_>,
        event: &mut SaveEvent<'_, T>,
    ) -> StoreResult<()> {
        self.record(HookPhase::BeforeSave, event.entity.uuid());
        Ok(())
    }

    fn after_save(&self, entity: &T) -> StoreResult<()> {
        self.record(HookPhase::AfterSave, entity.uuid());
        Ok(())
    }

    fn before_delete(&self, _ctx: &mut TransactionContext<'_>, entity: &T) -> StoreResult<()> {
        self.record(HookPhase::BeforeDelete, entity.uuid());
        Ok(())
    }

    fn after_delete(&self, entity: &T) -> StoreResult<()> {
        self.record(HookPhase::AfterDelete, entity.uuid());
        Ok(())
    }
}

/// Fails in one phase, optionally only for one entity.
pub struct FailingHandler<T: Entity> {
    phase: HookPhase,
    only: Option<Uuid>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> FailingHandler<T> {
    /// Fails every call in `phase`.
    pub fn new(phase: HookPhase) -> Self {
        Self {
            phase,
            only: None,
            _marker: PhantomData,
        }
    }

    /// Fails calls in `phase` for the entity with `uuid` only.
    pub fn for_entity(phase: HookPhase, uuid: Uuid) -> Self {
        Self {
            phase,
            only: Some(uuid),
            _marker: PhantomData,
        }
    }

    fn check(&self, phase: HookPhase, uuid: Uuid) -> StoreResult<()> {
        if phase == self.phase && self.only.map_or(true, |only| only == uuid) {
            return Err(StoreError::transaction_aborted(format!(
                "{phase} rejected {} {uuid}",
                T::ENTITY_TYPE
            )));
        }
        Ok(())
    }
}

impl<T: Entity> EntityHandler<T> for FailingHandler<T> {
    fn name(&self) -> &str {
        "failing"
    }

    fn before_save(
        &self,
        _ctx: &mut TransactionContext<'_>,
        event: &mut SaveEvent<'_, T>,
    ) -> StoreResult<()> {
        self.check(HookPhase::BeforeSave, event.entity.uuid())
    }

    fn after_save(&self, entity: &T) -> StoreResult<()> {
        self.check(HookPhase::AfterSave, entity.uuid())
    }

    fn before_delete(&self, _ctx: &mut TransactionContext<'_>, entity: &T) -> StoreResult<()> {
        self.check(HookPhase::BeforeDelete, entity.uuid())
    }

    fn after_delete(&self, entity: &T) -> StoreResult<()> {
        self.check(HookPhase::AfterDelete, entity.uuid())
    }
}
