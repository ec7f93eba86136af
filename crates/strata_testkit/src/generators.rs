//! Property-based test generators using proptest.

use crate::entities::{Note, Task};
use proptest::prelude::*;

/// Strategy for task titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("Invalid regex")
}

/// Strategy for fresh, unsaved tasks.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (title_strategy(), any::<bool>(), prop::option::of(0i64..5)).prop_map(
        |(title, done, priority)| {
            let mut task = Task::new(title);
            task.done = done;
            task.priority = priority;
            task
        },
    )
}

/// Strategy for a sequence of titles to save one after another.
pub fn title_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(title_strategy(), 1..=max_len)
}

/// Strategy for non-zero embedding vectors of `dims` dimensions.
pub fn embedding_strategy(dims: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, dims)
        .prop_filter("vector must not be zero", |v| v.iter().any(|x| x.abs() > 1e-3))
}

/// Strategy for notes carrying an embedding.
pub fn embedded_note_strategy(dims: usize) -> impl Strategy<Value = Note> {
    (title_strategy(), embedding_strategy(dims))
        .prop_map(|(body, embedding)| Note::new(body).with_embedding(embedding))
}
