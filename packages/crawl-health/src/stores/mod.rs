//! Storage implementations for crawl health.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)
//! - `PostgresStore` - PostgreSQL storage (requires `postgres` feature)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use std::sync::Arc;

use crate::error::{HealthError, Result};
use crate::traits::store::HealthStore;

/// Open the backend matching a database URL's scheme.
///
/// `memory:` opens a throwaway [`MemoryStore`].
pub async fn connect(database_url: &str) -> Result<Arc<dyn HealthStore>> {
    if database_url == "memory:" {
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        if database_url.starts_with("sqlite:") {
            return Ok(Arc::new(SqliteStore::new(database_url).await?));
        }
    }

    #[cfg(feature = "postgres")]
    {
        if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
            return Ok(Arc::new(PostgresStore::new(database_url).await?));
        }
    }

    Err(HealthError::Config(format!(
        "unsupported database URL (is the backend feature enabled?): {}",
        database_url
    )))
}
