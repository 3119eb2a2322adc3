//! Geolocation dataset configuration.

use std::{fmt, net::Ipv4Addr, path::PathBuf, str::FromStr};

use serde::Deserialize;

/// Where the range table comes from and which blocks bypass it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeoipConfig {
    /// Path to the SQLite range database.
    pub database: PathBuf,
    /// Read the whole range table into memory at startup instead of querying SQLite per lookup.
    pub preload: bool,
    /// Size of the SQLite connection pool.
    pub max_connections: u32,
    /// Replaces the built-in reserved blocks when set.
    pub reserved: Option<Vec<ReservedBlock>>,
}

impl Default for GeoipConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./db/ipdb.sqlite"),
            preload: false,
            max_connections: 8,
            reserved: None,
        }
    }
}

/// An IPv4 block in CIDR notation, e.g. `192.168.0.0/16`. A bare address is a /32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ReservedBlock {
    /// First address of the block.
    pub network: Ipv4Addr,
    /// Number of leading bits that must match.
    pub prefix_len: u8,
}

/// Why a reserved block could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBlock(String);

impl fmt::Display for InvalidBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid IPv4 block '{}', expected a.b.c.d/len", self.0)
    }
}

impl std::error::Error for InvalidBlock {}

impl FromStr for ReservedBlock {
    type Err = InvalidBlock;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBlock(s.to_string());

        let (network, prefix_len) = match s.split_once('/') {
            Some((network, len)) => (network, len.parse::<u8>().map_err(|_| invalid())?),
            None => (s, 32),
        };

        if prefix_len > 32 {
            return Err(invalid());
        }

        let network = network.trim().parse::<Ipv4Addr>().map_err(|_| invalid())?;

        Ok(Self { network, prefix_len })
    }
}

impl TryFrom<String> for ReservedBlock {
    type Error = InvalidBlock;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ReservedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::ReservedBlock;

    #[test]
    fn parses_cidr() {
        let block: ReservedBlock = "172.16.0.0/12".parse().unwrap();

        assert_eq!(block.network, Ipv4Addr::new(172, 16, 0, 0));
        assert_eq!(block.prefix_len, 12);
        assert_eq!(block.to_string(), "172.16.0.0/12");
    }

    #[test]
    fn bare_address_is_a_host_block() {
        let block: ReservedBlock = "255.255.255.255".parse().unwrap();
        assert_eq!(block.prefix_len, 32);
    }

    #[test]
    fn rejects_garbage() {
        insta::assert_snapshot!("10.0.0.0/33".parse::<ReservedBlock>().unwrap_err(), @"invalid IPv4 block '10.0.0.0/33', expected a.b.c.d/len");
        assert!("::1/128".parse::<ReservedBlock>().is_err());
        assert!("10.0.0.0/x".parse::<ReservedBlock>().is_err());
    }
}
