//! The hook that writes a version record with every save.

use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::handler::{EntityHandler, SaveEvent};
use crate::transaction::TransactionContext;
use crate::types::Timestamp;
use crate::version::{VersionRecord, VersionStore, VERSIONS_COLLECTION};
use std::marker::PhantomData;
use std::sync::Arc;
use strata_codec::diff_fields;

/// Appends one [`VersionRecord`] per save of a versionable entity.
///
/// Runs as the last `before_save` hook, so the record is written through the
/// same transaction as the entity and describes the entity exactly as the
/// adapter stores it: either both commit or neither does.
pub struct VersioningHandler<T: Entity> {
    versions: Arc<VersionStore>,
    snapshots: bool,
    default_actor: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> VersioningHandler<T> {
    /// Creates the handler.
    ///
    /// `snapshots` stores the full field state on every record;
    /// `default_actor` is recorded when a save names no actor.
    pub fn new(
        versions: Arc<VersionStore>,
        snapshots: bool,
        default_actor: impl Into<String>,
    ) -> Self {
        Self {
            versions,
            snapshots,
            default_actor: default_actor.into(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> EntityHandler<T> for VersioningHandler<T> {
    fn name(&self) -> &str {
        "versioning"
    }

    fn collections(&self) -> Vec<String> {
        vec![VERSIONS_COLLECTION.to_string()]
    }

    fn before_save(
        &self,
        ctx: &mut TransactionContext<'_>,
        event: &mut SaveEvent<'_, T>,
    ) -> StoreResult<()> {
        let entity_id = event.entity.uuid();
        let latest = self
            .versions
            .latest_number_in(ctx, T::ENTITY_TYPE, entity_id)?;

        if let Some(expected) = event.options.expected_version {
            if expected != latest {
                return Err(StoreError::conflict(
                    T::ENTITY_TYPE,
                    format!("{entity_id} expected at version {expected}, latest is {latest}"),
                ));
            }
        }

        let after = event.entity.to_fields();
        let changes = match event.previous {
            Some(previous) => diff_fields(&previous.to_fields(), &after),
            None => after.clone(),
        };

        let record = VersionRecord {
            entity_type: T::ENTITY_TYPE.to_string(),
            entity_id,
            version_number: latest + 1,
            modified_by: event
                .options
                .modified_by
                .clone()
                .unwrap_or_else(|| self.default_actor.clone()),
            modified_at: Timestamp::now(),
            changes,
            snapshot: self.snapshots.then_some(after),
        };
        self.versions.append_in(ctx, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::SaveOptions;
    use crate::test_support::{transactions, Doc};
    use strata_codec::Value;

    fn save_version(
        handler: &VersioningHandler<Doc>,
        tm: &crate::TransactionManager,
        entity: &mut Doc,
        previous: Option<&Doc>,
        options: &SaveOptions,
    ) -> StoreResult<()> {
        tm.run(&[VERSIONS_COLLECTION], |ctx| {
            let mut event = SaveEvent {
                entity,
                previous,
                options,
            };
            handler.before_save(ctx, &mut event)
        })
    }

    #[test]
    fn first_save_records_all_fields_then_diffs() {
        let tm = transactions();
        let versions = Arc::new(VersionStore::new(Arc::clone(&tm)));
        let handler = VersioningHandler::<Doc>::new(Arc::clone(&versions), false, "system");
        let options = SaveOptions::default();

        let mut doc = Doc::new("A");
        save_version(&handler, &tm, &mut doc, None, &options).unwrap();

        let previous = doc.clone();
        doc.title = "B".into();
        save_version(&handler, &tm, &mut doc, Some(&previous), &options).unwrap();

        let history = versions.history("doc", doc.uuid()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].changes, doc_fields("A"));
        assert_eq!(history[1].version_number, 2);
        assert_eq!(
            history[1].changes.get("title"),
            Some(&Value::from("B"))
        );
        assert_eq!(history[1].changes.len(), 1);
        assert_eq!(history[1].modified_by, "system");
        assert!(history[1].snapshot.is_none());
    }

    #[test]
    fn expected_version_mismatch_conflicts() {
        let tm = transactions();
        let versions = Arc::new(VersionStore::new(Arc::clone(&tm)));
        let handler = VersioningHandler::<Doc>::new(Arc::clone(&versions), true, "system");

        let mut doc = Doc::new("A");
        save_version(&handler, &tm, &mut doc, None, &SaveOptions::new().expect_version(0)).unwrap();

        let stale = SaveOptions::new().expect_version(0).modified_by("ana");
        let err = save_version(&handler, &tm, &mut doc.clone(), Some(&doc), &stale).unwrap_err();
        assert!(err.is_conflict());

        let fresh = SaveOptions::new().expect_version(1).modified_by("ana");
        save_version(&handler, &tm, &mut doc.clone(), Some(&doc), &fresh).unwrap();

        let latest = versions.latest("doc", doc.uuid()).unwrap().unwrap();
        assert_eq!(latest.version_number, 2);
        assert_eq!(latest.modified_by, "ana");
        assert!(latest.changes.is_empty());
        assert_eq!(latest.snapshot, Some(doc_fields("A")));
    }

    fn doc_fields(title: &str) -> strata_codec::FieldMap {
        Doc::new(title).to_fields()
    }
}
