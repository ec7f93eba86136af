//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use strata_testkit::{Note, Task};

/// Random unit-length vector of `dims` dimensions.
pub fn random_embedding(dims: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
    v.into_iter().map(|x| x / norm).collect()
}

/// Random lowercase title of `len` characters.
pub fn random_title(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Fresh tasks with random titles.
pub fn generate_tasks(count: usize) -> Vec<Task> {
    (0..count).map(|_| Task::new(random_title(16))).collect()
}

/// Fresh notes with random embeddings.
pub fn generate_notes(count: usize, dims: usize) -> Vec<Note> {
    (0..count)
        .map(|_| Note::new(random_title(32)).with_embedding(random_embedding(dims)))
        .collect()
}
