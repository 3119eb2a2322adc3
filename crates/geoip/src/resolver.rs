//! Address to location resolution.

use std::net::{IpAddr, Ipv4Addr};

use config::GeoipConfig;

use crate::{GeoRecord, Location, RangeStore, RangeTable, ReservedRanges, ResolveError, TableError};

/// Resolves IPv4 addresses to locations.
///
/// Reserved blocks are answered from memory with the `RD`/`Reserved` sentinel.
/// Everything else is looked up in the range table. The resolver holds no
/// mutable state and can be shared between tasks as is.
pub struct Resolver<T = RangeStore> {
    reserved: ReservedRanges,
    table: T,
}

impl Resolver<RangeStore> {
    /// Opens the configured dataset.
    pub async fn from_config(config: &GeoipConfig) -> Result<Self, TableError> {
        let reserved = ReservedRanges::from_config(config.reserved.as_deref());
        let table = RangeStore::open(&config.database, config.max_connections, config.preload).await?;

        log::debug!("Resolver ready with {} reserved blocks", reserved.len());

        Ok(Self::new(reserved, table))
    }
}

impl<T: RangeTable> Resolver<T> {
    /// A resolver over the given reserved blocks and range table.
    pub fn new(reserved: ReservedRanges, table: T) -> Self {
        Self { reserved, table }
    }

    /// Resolves a textual address.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are resolved as the IPv4
    /// address they carry; any other IPv6 address is rejected with
    /// [`ResolveError::UnsupportedAddress`]. Surrounding whitespace is ignored and the
    /// record echoes the trimmed address.
    pub async fn lookup(&self, address: &str) -> Result<GeoRecord, ResolveError> {
        let address = address.trim();

        let ip = match address.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => ip,
            Ok(IpAddr::V6(ip)) => ip
                .to_ipv4_mapped()
                .ok_or_else(|| ResolveError::UnsupportedAddress(address.to_string()))?,
            Err(_) => return Err(ResolveError::InvalidAddress(address.to_string())),
        };

        let location = self.locate(ip).await?;

        Ok(GeoRecord::new(address, location))
    }

    /// Resolves an already parsed address.
    pub async fn lookup_addr(&self, ip: Ipv4Addr) -> Result<GeoRecord, ResolveError> {
        let location = self.locate(ip).await?;

        Ok(GeoRecord::new(ip.to_string(), location))
    }

    async fn locate(&self, ip: Ipv4Addr) -> Result<Location, ResolveError> {
        let bits = ip.to_bits();

        if let Some(range) = self.reserved.find(bits) {
            log::debug!("{ip} is in reserved block {}/{}", range.base(), range.mask());
            return Ok(Location::reserved());
        }

        match self.table.predecessor(bits).await {
            Ok(Some(location)) => Ok(location),
            Ok(None) => Err(ResolveError::NotFound(ip.to_string())),
            Err(err) => {
                log::error!("Range lookup for {ip} failed: {err}");
                Err(ResolveError::Lookup(err))
            }
        }
    }
}
