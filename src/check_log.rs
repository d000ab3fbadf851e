//! Check Log Module
//!
//! This module persists every DNS probe result in a SQLite table so earlier
//! runs can be read back.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

use crate::dns_report::CheckReport;
use crate::error::{GeoError, Result};
use crate::models::ProbeStatus;
use crate::store::{format_timestamp, parse_timestamp};

/// One stored probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRow {
    pub checked_at: DateTime<Utc>,
    pub fqdn: String,
    pub nameserver: String,
    pub status: ProbeStatus,
}

pub struct CheckLog {
    conn: Connection,
}

impl CheckLog {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path).map_err(|e| {
            GeoError::Storage(format!("cannot open database {}: {}", db_path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS dns_checks (
                id INTEGER PRIMARY KEY,
                checked_at TEXT NOT NULL,
                fqdn TEXT NOT NULL,
                nameserver TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('PASS', 'FAIL'))
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Stores one row per probe in `report`, all in a single transaction.
    pub fn record(&mut self, report: &CheckReport) -> Result<usize> {
        let checked_at = format_timestamp(report.finished_at);
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dns_checks (checked_at, fqdn, nameserver, status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for check in &report.checks {
                for (nameserver, status) in &check.results {
                    written += stmt.execute(params![
                        checked_at,
                        check.name,
                        nameserver,
                        status.to_string()
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Most recent rows first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ProbeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT checked_at, fqdn, nameserver, status FROM dns_checks
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (checked_at, fqdn, nameserver, status) = row?;
            out.push(ProbeRow {
                checked_at: parse_timestamp(&checked_at)?,
                fqdn,
                nameserver,
                status: status.parse().map_err(GeoError::Storage)?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DomainCheck;

    #[test]
    fn test_record_and_read_back() {
        let mut log = CheckLog::open_in_memory().unwrap();
        let mut first = DomainCheck::new("example.com");
        first.push("1.1.1.1", ProbeStatus::Pass);
        first.push("9.9.9.9", ProbeStatus::Fail);
        let mut second = DomainCheck::new("example.org");
        second.push("1.1.1.1", ProbeStatus::Pass);
        second.push("9.9.9.9", ProbeStatus::Pass);

        let finished_at = parse_timestamp("2024-06-01 07:00:00").unwrap();
        let report = CheckReport {
            company: "Acme".into(),
            nameservers: vec!["1.1.1.1".into(), "9.9.9.9".into()],
            checks: vec![first, second],
            finished_at,
        };
        assert_eq!(log.record(&report).unwrap(), 4);

        let rows = log.recent(3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            ProbeRow {
                checked_at: finished_at,
                fqdn: "example.org".into(),
                nameserver: "9.9.9.9".into(),
                status: ProbeStatus::Pass,
            }
        );
        assert_eq!(rows[2].status, ProbeStatus::Fail);
        assert_eq!(rows[2].fqdn, "example.com");
    }
}
