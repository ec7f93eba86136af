//! Database configuration.

use std::path::PathBuf;

/// Where committed transactions are journaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Keep everything in memory; nothing survives the process.
    Memory,
    /// Journal to a file at the given path.
    File(PathBuf),
    /// Pick the platform's default: in memory on wasm targets, a file at
    /// the given path everywhere else.
    Auto(PathBuf),
}

impl BackendConfig {
    /// Resolves [`BackendConfig::Auto`] for the current platform.
    #[must_use]
    pub fn resolve(self) -> Self {
        match self {
            Self::Auto(path) => {
                if cfg!(target_family = "wasm") {
                    Self::Memory
                } else {
                    Self::File(path)
                }
            }
            other => other,
        }
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Journal backend.
    pub backend: BackendConfig,

    /// Whether to fsync the journal on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Default number of hits returned by semantic search.
    pub search_limit: usize,

    /// Default minimum cosine similarity for semantic search hits.
    pub min_similarity: f32,

    /// Whether version records carry a full snapshot of the new state.
    pub version_snapshots: bool,

    /// Actor recorded as `modifiedBy` when a save names none.
    pub default_actor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            sync_on_commit: true,
            search_limit: 10,
            min_similarity: 0.0,
            version_snapshots: false,
            default_actor: "system".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the journal backend.
    #[must_use]
    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the default semantic search limit.
    #[must_use]
    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Sets the default minimum similarity for semantic search.
    #[must_use]
    pub fn min_similarity(mut self, min: f32) -> Self {
        self.min_similarity = min;
        self
    }

    /// Sets whether version records carry full snapshots.
    #[must_use]
    pub fn version_snapshots(mut self, value: bool) -> Self {
        self.version_snapshots = value;
        self
    }

    /// Sets the default actor recorded on version records.
    #[must_use]
    pub fn default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendConfig::Memory);
        assert!(config.sync_on_commit);
        assert_eq!(config.search_limit, 10);
        assert!(!config.version_snapshots);
        assert_eq!(config.default_actor, "system");
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .backend(BackendConfig::File(PathBuf::from("data/journal")))
            .sync_on_commit(false)
            .min_similarity(0.75)
            .version_snapshots(true)
            .default_actor("importer");

        assert_eq!(config.backend, BackendConfig::File("data/journal".into()));
        assert!(!config.sync_on_commit);
        assert!((config.min_similarity - 0.75).abs() < f32::EPSILON);
        assert!(config.version_snapshots);
        assert_eq!(config.default_actor, "importer");
    }

    #[test]
    fn auto_backend_resolves_to_file_on_native() {
        let resolved = BackendConfig::Auto(PathBuf::from("j")).resolve();
        if cfg!(target_family = "wasm") {
            assert_eq!(resolved, BackendConfig::Memory);
        } else {
            assert_eq!(resolved, BackendConfig::File(PathBuf::from("j")));
        }
    }
}
