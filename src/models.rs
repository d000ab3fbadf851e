//! Data Models Module
//!
//! This module defines the core data structures: the flattened geolocation
//! record kept in the cache, the validated lookup target, and the status
//! values produced by the DNS checker.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::GeoError;

/// The literal that asks the upstream service to geolocate the caller.
pub const ME: &str = "me";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Subdivision {
    pub iso_code: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct GeoRecord {
    pub ip_address: String,
    pub network: String,
    pub city_name: String,
    pub continent_code: String,
    pub continent_name: String,
    pub country_iso_code: String,
    pub country_name: String,
    pub accuracy_radius: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub time_zone: String,
    pub postal_code: String,
    pub subdivisions: Vec<Subdivision>,
    pub static_ip_score: i64,
    pub user_type: String,
    pub asn: u32,
    pub asn_org: String,
    pub connection_type: String,
    pub isp: String,
    pub organization: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl GeoRecord {
    /// Subdivisions as `ISO:Name` pairs joined by `;`, for flat outputs.
    pub fn subdivisions_text(&self) -> String {
        self.subdivisions
            .iter()
            .map(|s| format!("{}:{}", s.iso_code, s.name))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Field names and display values in column order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let stamp = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        };
        vec![
            ("ip_address", self.ip_address.clone()),
            ("network", self.network.clone()),
            ("city_name", self.city_name.clone()),
            ("continent_code", self.continent_code.clone()),
            ("continent_name", self.continent_name.clone()),
            ("country_iso_code", self.country_iso_code.clone()),
            ("country_name", self.country_name.clone()),
            ("accuracy_radius", self.accuracy_radius.to_string()),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("time_zone", self.time_zone.clone()),
            ("postal_code", self.postal_code.clone()),
            ("subdivisions", self.subdivisions_text()),
            ("static_ip_score", self.static_ip_score.to_string()),
            ("user_type", self.user_type.clone()),
            ("asn", self.asn.to_string()),
            ("asn_org", self.asn_org.clone()),
            ("connection_type", self.connection_type.clone()),
            ("isp", self.isp.clone()),
            ("organization", self.organization.clone()),
            ("updated_at", stamp(&self.updated_at)),
            ("created_at", stamp(&self.created_at)),
        ]
    }
}

/// What the caller asked to geolocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Me,
    Addr(IpAddr),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Me => write!(f, "{}", ME),
            Target::Addr(ip) => write!(f, "{}", ip),
        }
    }
}

impl FromStr for Target {
    type Err = GeoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ME {
            return Ok(Target::Me);
        }
        s.parse::<IpAddr>()
            .map(Target::Addr)
            .map_err(|_| GeoError::Validation(s.to_string()))
    }
}

/// Where a resolved record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Upstream,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache => write!(f, "cache"),
            Source::Upstream => write!(f, "upstream"),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Pass,
    Fail,
}

impl ProbeStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, ProbeStatus::Pass)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Pass => write!(f, "PASS"),
            ProbeStatus::Fail => write!(f, "FAIL"),
        }
    }
}

impl FromStr for ProbeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PASS" => Ok(ProbeStatus::Pass),
            "FAIL" => Ok(ProbeStatus::Fail),
            _ => Err(format!("Invalid probe status: {}", s)),
        }
    }
}

/// Results for one domain across every configured nameserver.
#[derive(Debug, Clone, Serialize)]
pub struct DomainCheck {
    pub name: String,
    pub overall: ProbeStatus,
    pub results: Vec<(String, ProbeStatus)>,
}

impl DomainCheck {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overall: ProbeStatus::Pass,
            results: Vec::new(),
        }
    }

    /// Records one probe; any failure marks the whole domain as failed.
    pub fn push(&mut self, nameserver: impl Into<String>, status: ProbeStatus) {
        if !status.is_pass() {
            self.overall = ProbeStatus::Fail;
        }
        self.results.push((nameserver.into(), status));
    }

    pub fn status_for(&self, nameserver: &str) -> Option<ProbeStatus> {
        self.results
            .iter()
            .find(|(ns, _)| ns == nameserver)
            .map(|(_, status)| *status)
    }
}
