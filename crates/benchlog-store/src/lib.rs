//! Prompt catalog and benchmark log stores
//!
//! Backends: in-memory (tests, dry runs), JSON documents on disk, and
//! PostgreSQL. All of them implement [`PromptCatalog`] and [`LogStore`].

pub mod error;
pub mod file;
pub mod history;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileLogStore, FilePromptCatalog};
pub use history::{collect_all, collect_history, full_scan, history};
pub use memory::{MemoryLogStore, MemoryPromptCatalog, ScanOrder};
pub use postgres::{PgLogStore, PgPromptCatalog};
pub use traits::{ContinuationToken, LogStore, PromptCatalog, ScanPage};

use benchlog_core::{BenchConfig, StorageBackend};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid"));

/// Store identifiers become file names and table names
pub fn validate_identifier(identifier: &str) -> StoreResult<()> {
    if IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(identifier.to_string()))
    }
}

/// The catalog and log a run works against
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn PromptCatalog>,
    pub log: Arc<dyn LogStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the configured backend.
///
/// The memory backend still reads the prompt catalog from `data_dir`, it
/// only keeps the benchmark log in process.
pub async fn open(config: &BenchConfig) -> StoreResult<Stores> {
    let storage = &config.storage;
    info!(backend = ?storage.backend, "Opening stores");

    match storage.backend {
        StorageBackend::Memory => Ok(Stores {
            catalog: Arc::new(FilePromptCatalog::new(&storage.data_dir, &config.prompt_catalog)?),
            log: Arc::new(MemoryLogStore::new()),
        }),
        StorageBackend::File => Ok(Stores {
            catalog: Arc::new(FilePromptCatalog::new(&storage.data_dir, &config.prompt_catalog)?),
            log: Arc::new(FileLogStore::open(&storage.data_dir, &config.benchmark_table).await?),
        }),
        StorageBackend::Postgres => {
            let url = storage.database_url.as_deref().ok_or_else(|| {
                StoreError::Unavailable("storage.database_url is not set".to_string())
            })?;
            let pool = postgres::connect(url, config.endpoint.store_timeout()).await?;

            let catalog = PgPromptCatalog::new(pool.clone(), &config.prompt_catalog)?;
            let log = PgLogStore::new(pool, &config.benchmark_table)?;
            catalog.ensure_schema().await?;
            log.ensure_schema().await?;

            Ok(Stores {
                catalog: Arc::new(catalog),
                log: Arc::new(log),
            })
        }
    }
}
