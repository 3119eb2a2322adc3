//! SQLite range table over the freegeoip `ipdb.sqlite` layout.
//!
//! `city_blocks(ip_start, loc_id)` holds the range starts and links each one
//! to `city_location`, which in turn is joined to `country_blocks` and
//! `region_names` for the country and region names.

use std::path::Path;

use futures::TryStreamExt;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};

use crate::{Location, RangeRecord, TableError};

use super::RangeTable;

const LOCATION_COLUMNS: &str = "\
    block.ip_start AS ip_start, \
    city_location.country_code AS country_code, \
    country_blocks.country_name AS country_name, \
    city_location.region_code AS region_code, \
    region_names.region_name AS region_name, \
    city_location.city_name AS city_name, \
    city_location.postal_code AS postal_code, \
    city_location.latitude AS latitude, \
    city_location.longitude AS longitude, \
    city_location.metro_code AS metro_code, \
    city_location.area_code AS area_code";

const LOCATION_JOINS: &str = "\
    NATURAL JOIN city_location \
    LEFT JOIN country_blocks ON \
      city_location.country_code = country_blocks.country_code \
    LEFT JOIN region_names ON \
      city_location.country_code = region_names.country_code \
      AND city_location.region_code = region_names.region_code";

/// Range table backed by a read-only SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteRangeTable {
    pool: SqlitePool,
}

impl SqliteRangeTable {
    /// Opens the database read-only. Fails if the file does not exist.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, TableError> {
        let options = SqliteConnectOptions::new().filename(path).read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Uses an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every range in ascending `ip_start` order.
    pub async fn load_all(&self) -> Result<Vec<RangeRecord>, TableError> {
        let query = format!("SELECT {LOCATION_COLUMNS} FROM city_blocks AS block {LOCATION_JOINS} ORDER BY block.ip_start");

        let mut rows = sqlx::query(&query).fetch(&self.pool);
        let mut records = Vec::new();

        while let Some(row) = rows.try_next().await? {
            records.push(range_from_row(&row)?);
        }

        Ok(records)
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RangeTable for SqliteRangeTable {
    async fn predecessor(&self, ip: u32) -> Result<Option<Location>, TableError> {
        // Pick the block first so a block with a dangling location cannot make
        // the search fall back to an earlier range.
        let query = format!(
            "SELECT {LOCATION_COLUMNS} \
             FROM (SELECT ip_start, loc_id FROM city_blocks WHERE ip_start <= ? ORDER BY ip_start DESC LIMIT 1) AS block \
             {LOCATION_JOINS}"
        );

        let row = sqlx::query(&query)
            .bind(i64::from(ip))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| range_from_row(&row).map(|range| range.location))
            .transpose()
    }
}

fn range_from_row(row: &SqliteRow) -> Result<RangeRecord, TableError> {
    let ip_start: i64 = row.try_get("ip_start")?;
    let ip_start = u32::try_from(ip_start).map_err(|_| TableError::Malformed(format!("ip_start {ip_start} out of range")))?;

    let text = |column: &str| -> Result<String, TableError> {
        Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
    };

    let coordinate = |column: &str| -> Result<f32, TableError> {
        Ok(row.try_get::<Option<f64>, _>(column)?.unwrap_or_default() as f32)
    };

    Ok(RangeRecord {
        ip_start,
        location: Location {
            country_code: text("country_code")?,
            country_name: text("country_name")?,
            region_code: text("region_code")?,
            region_name: text("region_name")?,
            city_name: text("city_name")?,
            postal_code: text("postal_code")?,
            latitude: coordinate("latitude")?,
            longitude: coordinate("longitude")?,
            metro_code: text("metro_code")?,
            area_code: text("area_code")?,
        },
    })
}
