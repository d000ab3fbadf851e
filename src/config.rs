//! Configuration Module
//!
//! This module reads the JSON configuration files for `geocache` and
//! `dnscheck`, fills in defaults for anything left out, and applies
//! environment overrides for the cache settings. Credentials and the edition
//! table are validated here so a bad setup fails before any network call.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default freshness window for cached records, in days.
pub const DEFAULT_TTL_DAYS: u32 = 7;

/// Default port probed when a nameserver entry has none.
pub const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub maxmind: MaxMindConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_log")]
    pub log: PathBuf,
}

#[derive(Clone, Deserialize)]
pub struct MaxMindConfig {
    #[serde(default, deserialize_with = "string_or_number")]
    pub account: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub edition: String,
    #[serde(default)]
    pub editions: BTreeMap<String, String>,
    #[serde(default)]
    pub pretty: bool,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_ttl() -> u32 {
    DEFAULT_TTL_DAYS
}

fn default_database() -> PathBuf {
    PathBuf::from("geo.db")
}

fn default_log() -> PathBuf {
    PathBuf::from("geo.log")
}

fn default_timeout() -> u64 {
    30
}

/// MaxMind account IDs are numeric, but hand-written configs often quote them.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            database: default_database(),
            log: default_log(),
        }
    }
}

impl Default for MaxMindConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            key: String::new(),
            edition: String::new(),
            editions: BTreeMap::new(),
            pretty: false,
            timeout: default_timeout(),
        }
    }
}

impl Config {
    /// Reads the configuration file at `path` and applies `GEOCACHE_*`
    /// environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            GeoError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| GeoError::Config(format!("invalid config: {}", e)))
    }

    /// Applies overrides from a variable source. Empty or unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if let Some(ttl) = non_empty("GEOCACHE_TTL_DAYS").and_then(|s| s.parse().ok()) {
            self.general.ttl = ttl;
        }
        if let Some(db) = non_empty("GEOCACHE_DB_PATH") {
            self.general.database = PathBuf::from(db);
        }
        if let Some(log) = non_empty("GEOCACHE_LOG_PATH") {
            self.general.log = PathBuf::from(log);
        }
    }
}

impl MaxMindConfig {
    /// Returns the base URL of the selected edition after checking that the
    /// account, key and edition are all usable.
    pub fn endpoint(&self) -> Result<&str> {
        if self.account.trim().is_empty() {
            return Err(GeoError::Config("MaxMind account is missing".into()));
        }
        if self.key.trim().is_empty() {
            return Err(GeoError::Config("MaxMind license key is missing".into()));
        }
        if self.edition.trim().is_empty() {
            return Err(GeoError::Config("MaxMind edition is missing".into()));
        }
        match self.editions.get(&self.edition) {
            Some(url) if !url.trim().is_empty() => Ok(url.as_str()),
            _ => Err(GeoError::Config(format!(
                "Invalid MaxMind edition: {}",
                self.edition
            ))),
        }
    }
}

// The license key must never end up in a log line.
impl fmt::Debug for MaxMindConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindConfig")
            .field("account", &self.account)
            .field("key", &if self.key.is_empty() { "" } else { "***" })
            .field("edition", &self.edition)
            .field("editions", &self.editions)
            .field("pretty", &self.pretty)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the `dnscheck` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsCheckConfig {
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default = "default_dns_database")]
    pub database: PathBuf,
    #[serde(default = "default_dns_timeout")]
    pub timeout: u64,
}

fn default_company() -> String {
    "Example".to_string()
}

fn default_dns_database() -> PathBuf {
    PathBuf::from("dns.db")
}

fn default_dns_timeout() -> u64 {
    3
}

impl DnsCheckConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            GeoError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| GeoError::Config(format!("invalid config: {}", e)))?;
        if config.nameservers.is_empty() {
            return Err(GeoError::Config("no nameservers configured".into()));
        }
        if config.domains.is_empty() {
            return Err(GeoError::Config("no domains configured".into()));
        }
        Ok(config)
    }

    /// Parses every nameserver entry into a socket address, defaulting to port 53.
    pub fn nameserver_addrs(&self) -> Result<Vec<SocketAddr>> {
        self.nameservers
            .iter()
            .map(|entry| parse_nameserver(entry))
            .collect()
    }
}

/// Accepts `1.1.1.1`, `1.1.1.1:5353`, `2606:4700::1111` and `[2606:4700::1111]:53`.
pub fn parse_nameserver(entry: &str) -> Result<SocketAddr> {
    let entry = entry.trim();
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DNS_PORT));
    }
    entry
        .parse::<SocketAddr>()
        .map_err(|_| GeoError::Config(format!("Invalid nameserver address: {}", entry)))
}
