//! Geolocation records.

use serde::Serialize;

/// Country code reported for reserved addresses.
pub const RESERVED_COUNTRY_CODE: &str = "RD";
/// Country name reported for reserved addresses.
pub const RESERVED_COUNTRY_NAME: &str = "Reserved";

/// Everything the dataset knows about one address range.
///
/// Unknown text fields are empty strings and unknown coordinates are zero.
/// The serialized field names are the ones freegeoip clients expect.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Country name in English.
    pub country_name: String,
    /// Region (state, province) code.
    pub region_code: String,
    /// Region name.
    pub region_name: String,
    /// City name.
    #[serde(rename = "city")]
    pub city_name: String,
    /// Postal code.
    #[serde(rename = "zipcode")]
    pub postal_code: String,
    /// Latitude in degrees.
    pub latitude: f32,
    /// Longitude in degrees.
    pub longitude: f32,
    /// Metro (DMA) code, US only.
    pub metro_code: String,
    /// Telephone area code, US only.
    #[serde(rename = "areacode")]
    pub area_code: String,
}

impl Location {
    /// The sentinel location for reserved blocks.
    pub fn reserved() -> Self {
        Self {
            country_code: RESERVED_COUNTRY_CODE.to_string(),
            country_name: RESERVED_COUNTRY_NAME.to_string(),
            ..Default::default()
        }
    }

    /// Whether this is the reserved sentinel.
    pub fn is_reserved(&self) -> bool {
        self.country_code == RESERVED_COUNTRY_CODE
    }
}

/// The answer to a lookup: the queried address and its location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoRecord {
    /// The address that was looked up, as given.
    pub ip: String,
    /// Where it is.
    #[serde(flatten)]
    pub location: Location,
}

impl GeoRecord {
    /// Pairs an address with its location.
    pub fn new(ip: impl Into<String>, location: Location) -> Self {
        Self {
            ip: ip.into(),
            location,
        }
    }
}

/// One row of the range table: `location` holds for every address from
/// `ip_start` up to, but excluding, the next row's `ip_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRecord {
    /// First address of the range as a big-endian integer.
    pub ip_start: u32,
    /// Location of the range.
    pub location: Location,
}
