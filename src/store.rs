//! Cache Store Module
//!
//! This module keeps geolocation records in one SQLite table keyed by IP
//! address. Rows are upserted on every refresh and never deleted; stale rows
//! wait to be overwritten.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, TimeZone, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{GeoError, Result};
use crate::models::{GeoRecord, Subdivision, ME};

/// Timestamp layout used in the `updated_at` / `created_at` columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of a `put`.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Inserted(GeoRecord),
    Updated(GeoRecord),
    /// Nothing to save: the record had no usable key.
    Skipped,
}

impl SaveOutcome {
    pub fn record(&self) -> Option<&GeoRecord> {
        match self {
            SaveOutcome::Inserted(r) | SaveOutcome::Updated(r) => Some(r),
            SaveOutcome::Skipped => None,
        }
    }
}

/// A record is fresh while its age is within `ttl_days`, boundary included.
pub fn is_fresh(updated_at: DateTime<Utc>, ttl_days: u32, now: DateTime<Utc>) -> bool {
    now - updated_at <= Duration::days(i64::from(ttl_days))
}

pub struct GeoStore {
    conn: Connection,
}

impl GeoStore {
    /// Opens the database at `db_path`, creating the file and schema if needed.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path).map_err(|e| {
            GeoError::Storage(format!("cannot open database {}: {}", db_path.display(), e))
        })?;
        info!("Initializing database at {}", db_path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS geoip (
                ip_address TEXT PRIMARY KEY,
                network TEXT,
                city_name TEXT,
                continent_code TEXT,
                continent_name TEXT,
                country_iso_code TEXT,
                country_name TEXT,
                accuracy_radius INTEGER,
                latitude REAL,
                longitude REAL,
                time_zone TEXT,
                postal_code TEXT,
                subdivisions TEXT,
                static_ip_score INTEGER,
                user_type TEXT,
                asn INTEGER,
                asn_org TEXT,
                connection_type TEXT,
                isp TEXT,
                organization TEXT,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Returns the cached record for `ip`. The `me` alias is never cached.
    pub fn get(&self, ip: &str) -> Result<Option<GeoRecord>> {
        if ip == ME {
            debug!("IP is 'me', skipping database check");
            return Ok(None);
        }
        let record = self
            .conn
            .query_row(
                "SELECT * FROM geoip WHERE ip_address = ?1",
                params![ip],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Upserts `record` with the current time as `updated_at`.
    pub fn put(&self, record: &GeoRecord) -> Result<SaveOutcome> {
        self.put_at(record, Utc::now())
    }

    /// Upserts `record` as of `now`, carrying an existing `created_at` forward.
    pub fn put_at(&self, record: &GeoRecord, now: DateTime<Utc>) -> Result<SaveOutcome> {
        if record.ip_address.is_empty() || record.ip_address == ME {
            info!("No IP info to save");
            return Ok(SaveOutcome::Skipped);
        }

        let now = now.trunc_subsecs(0);
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM geoip WHERE ip_address = ?1",
                params![record.ip_address],
                |row| row.get(0),
            )
            .optional()?;
        let created_at = match &existing {
            Some(stamp) => parse_timestamp(stamp)?,
            None => now,
        };

        let subdivisions = serde_json::to_string(&record.subdivisions)?;
        self.conn.execute(
            "INSERT INTO geoip (
                ip_address, network, city_name, continent_code, continent_name,
                country_iso_code, country_name, accuracy_radius, latitude, longitude,
                time_zone, postal_code, subdivisions, static_ip_score, user_type,
                asn, asn_org, connection_type, isp, organization, updated_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            ON CONFLICT(ip_address) DO UPDATE SET
                network = excluded.network,
                city_name = excluded.city_name,
                continent_code = excluded.continent_code,
                continent_name = excluded.continent_name,
                country_iso_code = excluded.country_iso_code,
                country_name = excluded.country_name,
                accuracy_radius = excluded.accuracy_radius,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                time_zone = excluded.time_zone,
                postal_code = excluded.postal_code,
                subdivisions = excluded.subdivisions,
                static_ip_score = excluded.static_ip_score,
                user_type = excluded.user_type,
                asn = excluded.asn,
                asn_org = excluded.asn_org,
                connection_type = excluded.connection_type,
                isp = excluded.isp,
                organization = excluded.organization,
                updated_at = excluded.updated_at",
            params![
                record.ip_address,
                record.network,
                record.city_name,
                record.continent_code,
                record.continent_name,
                record.country_iso_code,
                record.country_name,
                record.accuracy_radius,
                record.latitude,
                record.longitude,
                record.time_zone,
                record.postal_code,
                subdivisions,
                record.static_ip_score,
                record.user_type,
                record.asn,
                record.asn_org,
                record.connection_type,
                record.isp,
                record.organization,
                format_timestamp(now),
                format_timestamp(created_at),
            ],
        )?;

        let stored = GeoRecord {
            updated_at: Some(now),
            created_at: Some(created_at),
            ..record.clone()
        };
        info!("Saved IP info for {}", stored.ip_address);
        Ok(if existing.is_some() {
            SaveOutcome::Updated(stored)
        } else {
            SaveOutcome::Inserted(stored)
        })
    }

    /// Number of cached addresses.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM geoip", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| GeoError::Storage(format!("bad timestamp {:?}: {}", s, e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<GeoRecord> {
    let text = |name: &str| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(name)?.unwrap_or_default())
    };
    let stamp = |name: &str| -> rusqlite::Result<Option<DateTime<Utc>>> {
        Ok(row
            .get::<_, Option<String>>(name)?
            .and_then(|s| parse_timestamp(&s).ok()))
    };
    let subdivisions: Vec<Subdivision> = serde_json::from_str(&text("subdivisions")?).unwrap_or_default();

    Ok(GeoRecord {
        ip_address: text("ip_address")?,
        network: text("network")?,
        city_name: text("city_name")?,
        continent_code: text("continent_code")?,
        continent_name: text("continent_name")?,
        country_iso_code: text("country_iso_code")?,
        country_name: text("country_name")?,
        accuracy_radius: row.get::<_, Option<u32>>("accuracy_radius")?.unwrap_or_default(),
        latitude: row.get::<_, Option<f64>>("latitude")?.unwrap_or_default(),
        longitude: row.get::<_, Option<f64>>("longitude")?.unwrap_or_default(),
        time_zone: text("time_zone")?,
        postal_code: text("postal_code")?,
        subdivisions,
        static_ip_score: row.get::<_, Option<i64>>("static_ip_score")?.unwrap_or_default(),
        user_type: text("user_type")?,
        asn: row.get::<_, Option<u32>>("asn")?.unwrap_or_default(),
        asn_org: text("asn_org")?,
        connection_type: text("connection_type")?,
        isp: text("isp")?,
        organization: text("organization")?,
        updated_at: stamp("updated_at")?,
        created_at: stamp("created_at")?,
    })
}
