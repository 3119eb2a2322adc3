//! In-memory range table.

use crate::{Location, RangeRecord, TableError};

use super::RangeTable;

/// Range rows sorted by `ip_start`, searched with a binary search.
#[derive(Debug, Clone, Default)]
pub struct MemoryRangeTable {
    records: Vec<RangeRecord>,
}

impl MemoryRangeTable {
    /// Builds a table from rows in any order. When two rows share a start, the later one wins.
    pub fn from_records(mut records: Vec<RangeRecord>) -> Self {
        // Stable, so rows with equal starts keep their input order.
        records.sort_by_key(|record| record.ip_start);

        let mut deduped: Vec<RangeRecord> = Vec::with_capacity(records.len());

        for record in records {
            match deduped.last_mut() {
                Some(last) if last.ip_start == record.ip_start => *last = record,
                _ => deduped.push(record),
            }
        }

        Self { records: deduped }
    }

    /// The row whose range contains `ip`.
    pub fn find(&self, ip: u32) -> Option<&RangeRecord> {
        let idx = self.records.partition_point(|record| record.ip_start <= ip);
        idx.checked_sub(1).map(|idx| &self.records[idx])
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RangeTable for MemoryRangeTable {
    async fn predecessor(&self, ip: u32) -> Result<Option<Location>, TableError> {
        Ok(self.find(ip).map(|record| record.location.clone()))
    }
}
