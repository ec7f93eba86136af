//! Deterministic embedding service.

use parking_lot::Mutex;
use std::collections::HashMap;
use strata_core::{EmbeddingService, StoreError, StoreResult};

/// Number of dimensions of generated vectors.
pub const EMBEDDING_DIMS: usize = 8;

/// An [`EmbeddingService`] that never calls out.
///
/// Texts registered with [`with`](Self::with) map to their fixed vector;
/// anything else gets a vector of letter counts bucketed into
/// [`EMBEDDING_DIMS`] slots. Texts registered with
/// [`failing_on`](Self::failing_on) return an error.
#[derive(Default)]
pub struct FixedEmbedder {
    fixed: HashMap<String, Vec<f32>>,
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FixedEmbedder {
    /// Creates an embedder with no fixed vectors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `text` to `vector`.
    #[must_use]
    pub fn with(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Makes generation fail for `text`.
    #[must_use]
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.push(text.into());
        self
    }

    /// Every text generation was requested for, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl EmbeddingService for FixedEmbedder {
    fn generate(&self, text: &str) -> StoreResult<Vec<f32>> {
        self.calls.lock().push(text.to_string());
        if self.failing.iter().any(|t| t == text) {
            return Err(StoreError::invalid_operation(format!(
                "no embedding for {text:?}"
            )));
        }
        if let Some(vector) = self.fixed.get(text) {
            return Ok(vector.clone());
        }
        let mut vector = vec![0.0f32; EMBEDDING_DIMS];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            let slot = (c.to_ascii_lowercase() as usize - 'a' as usize) % EMBEDDING_DIMS;
            vector[slot] += 1.0;
        }
        Ok(vector)
    }
}
