//! Test fixtures and database helpers.

use std::path::{Path, PathBuf};
use std::sync::Once;
use strata_core::{BackendConfig, Config, Database};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber for tests.
///
/// The filter comes from `RUST_LOG`, defaulting to `warn`. Output goes
/// through the test writer so it is captured per test. Safe to call from
/// every test; only the first call installs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    config: Config,
    /// Kept alive so the journal is not removed while in use.
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with(Config::default())
    }

    /// Creates a new in-memory test database with custom settings.
    pub fn memory_with(config: Config) -> Self {
        init_tracing();
        let config = config.backend(BackendConfig::Memory);
        Self {
            db: Database::open(config.clone()).expect("Failed to open in-memory database"),
            config,
            temp_dir: None,
        }
    }

    /// Creates a new file-backed test database in a temporary directory.
    pub fn file() -> Self {
        Self::file_with(Config::default())
    }

    /// Creates a new file-backed test database with custom settings.
    pub fn file_with(config: Config) -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = config.backend(BackendConfig::File(journal_path(temp_dir.path())));
        Self {
            db: Database::open(config.clone()).expect("Failed to open file database"),
            config,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the journal path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| journal_path(d.path()))
    }

    /// Closes the database and opens it again from its journal.
    ///
    /// # Panics
    ///
    /// Panics for in-memory databases, which have nothing to reopen from.
    pub fn reopen(self) -> Self {
        assert!(self.temp_dir.is_some(), "only file databases can be reopened");
        let Self {
            db,
            config,
            temp_dir,
        } = self;
        drop(db);
        Self {
            db: Database::open(config.clone()).expect("Failed to reopen file database"),
            config,
            temp_dir,
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

fn journal_path(dir: &Path) -> PathBuf {
    dir.join("strata.journal")
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-backed database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}
