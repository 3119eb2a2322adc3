//! IP geolocation for freegeoip.
//!
//! A lookup first checks the address against a small, fixed set of reserved
//! IPv4 blocks and answers those without touching the dataset. Every other
//! address is resolved with a predecessor search over a range table keyed by
//! the first address of each range.
//!
//! Two range tables are provided:
//! - [`SqliteRangeTable`] queries the freegeoip SQLite database per lookup
//! - [`MemoryRangeTable`] binary-searches a sorted copy held in memory

#![deny(missing_docs)]

mod error;
mod record;
mod reserved;
mod resolver;
mod table;

pub use error::{ResolveError, TableError};
pub use record::{GeoRecord, Location, RangeRecord};
pub use reserved::{ReservedRange, ReservedRanges};
pub use resolver::Resolver;
pub use table::{MemoryRangeTable, RangeStore, RangeTable, SqliteRangeTable};
