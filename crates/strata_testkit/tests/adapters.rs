//! Swapping the adapter behind a repository.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::{
    PersistenceAdapter, SearchHit, StoreAdapter, StoreResult, TransactionContext,
    TransactionManager,
};
use strata_testkit::prelude::*;
use uuid::Uuid;

/// Answers semantic search from a pretend index and counts the calls;
/// everything else goes to the built-in adapter.
struct IndexedNotes {
    inner: StoreAdapter<Note>,
    searches: AtomicUsize,
}

impl PersistenceAdapter<Note> for IndexedNotes {
    fn collection(&self) -> &str {
        self.inner.collection()
    }

    fn transactions(&self) -> &TransactionManager {
        self.inner.transactions()
    }

    fn find_by_id(&self, id: u64) -> StoreResult<Option<Note>> {
        self.inner.find_by_id(id)
    }

    fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<Note>> {
        self.inner.find_by_uuid(uuid)
    }

    fn find_all(&self) -> StoreResult<Vec<Note>> {
        self.inner.find_all()
    }

    fn count(&self) -> StoreResult<usize> {
        self.inner.count()
    }

    fn find_by_id_in(&self, ctx: &TransactionContext<'_>, id: u64) -> StoreResult<Option<Note>> {
        self.inner.find_by_id_in(ctx, id)
    }

    fn find_by_uuid_in(
        &self,
        ctx: &TransactionContext<'_>,
        uuid: Uuid,
    ) -> StoreResult<Option<Note>> {
        self.inner.find_by_uuid_in(ctx, uuid)
    }

    fn find_all_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<Vec<Note>> {
        self.inner.find_all_in(ctx)
    }

    fn count_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<usize> {
        self.inner.count_in(ctx)
    }

    fn save_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        entity: Note,
        touch: bool,
    ) -> StoreResult<Note> {
        self.inner.save_in(ctx, entity, touch)
    }

    fn delete_in(&self, ctx: &mut TransactionContext<'_>, id: u64) -> StoreResult<bool> {
        self.inner.delete_in(ctx, id)
    }

    fn semantic_search_scored(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        similarity: &dyn Fn(&[f32], &[f32]) -> f32,
    ) -> StoreResult<Vec<SearchHit<Note>>> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.inner.semantic_search_scored(query, limit, min_similarity, similarity)
    }
}

#[test]
fn registered_adapter_serves_later_repositories() {
    let db = TestDatabase::memory();
    let indexed = Arc::new(IndexedNotes {
        inner: StoreAdapter::new(Arc::clone(db.transactions())),
        searches: AtomicUsize::new(0),
    });
    db.register_adapter::<Note>(Arc::clone(&indexed) as Arc<dyn PersistenceAdapter<Note>>);

    let embedder = FixedEmbedder::new()
        .with("rust", vec![1.0, 0.0])
        .with("ownership", vec![0.9, 0.1]);
    let notes = db.repository::<Note>().embedder(Arc::new(embedder)).build();
    notes.save(Note::new("ownership")).unwrap().into_entity();

    let hits = notes.search("rust").unwrap();

    assert_eq!(indexed.searches.load(Ordering::Relaxed), 1);
    assert_eq!(hits.len(), 1);
    assert_eq!(db.adapter::<Tag>().collection(), "tag");
}

#[test]
fn embeddings_are_generated_before_saving() {
    let db = TestDatabase::memory();
    let embedder = Arc::new(
        FixedEmbedder::new()
            .with("cats purr", vec![1.0, 0.0, 0.0])
            .with("dogs bark", vec![0.0, 1.0, 0.0])
            .with("kittens", vec![0.9, 0.1, 0.0])
            .failing_on("offline"),
    );
    let notes = db
        .repository::<Note>()
        .embedder(Arc::clone(&embedder) as Arc<dyn strata_core::EmbeddingService>)
        .search_defaults(1, 0.5)
        .build();

    let cats = notes
        .save(Note::new("cats purr").owned_by("ana"))
        .unwrap()
        .into_entity();
    notes.save(Note::new("dogs bark").owned_by("bo")).unwrap().into_entity();
    assert_eq!(cats.embedding.as_deref(), Some(&[1.0, 0.0, 0.0][..]));

    let hits = notes.search("kittens").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity.uuid(), cats.uuid());

    assert!(notes.save(Note::new("offline")).is_err());
    assert_eq!(notes.count().unwrap(), 2);
    assert_eq!(notes.find_by_owner("bo").unwrap().len(), 1);
    assert_eq!(
        embedder.calls(),
        vec!["cats purr", "dogs bark", "kittens", "offline"]
    );
}

#[test]
fn text_search_without_embedder_is_unsupported() {
    let db = TestDatabase::memory();
    let notes = db.repository::<Note>().build();
    assert!(notes.search("anything").unwrap_err().is_unsupported());
    assert!(notes.semantic_search_vector(&[1.0], 3, 0.0).unwrap().is_empty());
}
