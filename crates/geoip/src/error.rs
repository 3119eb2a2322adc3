//! Error types for geolocation lookups.

/// Errors returned by [`crate::Resolver::lookup`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The input is not an IP address at all.
    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    /// The input is an IPv6 address. Only IPv4 (including IPv4-mapped IPv6) is resolved.
    #[error("'{0}' is not an IPv4 address")]
    UnsupportedAddress(String),

    /// No range in the table starts at or below the address.
    #[error("no location known for {0}")]
    NotFound(String),

    /// The range table could not be read.
    #[error("range table lookup failed: {0}")]
    Lookup(#[from] TableError),
}

/// Errors raised by range table backends.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The underlying database failed.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A row held a value that does not fit the record.
    #[error("malformed range row: {0}")]
    Malformed(String),
}
