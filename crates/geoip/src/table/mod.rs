//! Range table backends.

use std::path::Path;

use crate::{Location, TableError};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRangeTable;
pub use sqlite::SqliteRangeTable;

/// An ordered table of address ranges.
#[allow(async_fn_in_trait)]
pub trait RangeTable: Send + Sync {
    /// The location of the row with the greatest `ip_start` that is less than or
    /// equal to `ip`, or `None` when every row starts above it.
    async fn predecessor(&self, ip: u32) -> Result<Option<Location>, TableError>;
}

/// The range table chosen by configuration.
pub enum RangeStore {
    /// Sorted rows held in memory.
    Memory(MemoryRangeTable),
    /// Rows queried from SQLite per lookup.
    Sqlite(SqliteRangeTable),
}

impl RangeStore {
    /// Opens the SQLite database at `path`, copying it into memory when `preload` is set.
    pub async fn open(path: &Path, max_connections: u32, preload: bool) -> Result<Self, TableError> {
        let sqlite = SqliteRangeTable::open(path, max_connections).await?;

        if !preload {
            log::debug!("Resolving lookups against {}", path.display());
            return Ok(Self::Sqlite(sqlite));
        }

        let records = sqlite.load_all().await?;
        sqlite.close().await;

        let table = MemoryRangeTable::from_records(records);
        log::info!("Loaded {} ranges from {} into memory", table.len(), path.display());

        Ok(Self::Memory(table))
    }
}

impl RangeTable for RangeStore {
    async fn predecessor(&self, ip: u32) -> Result<Option<Location>, TableError> {
        match self {
            RangeStore::Memory(table) => table.predecessor(ip).await,
            RangeStore::Sqlite(table) => table.predecessor(ip).await,
        }
    }
}
