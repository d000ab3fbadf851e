//! geocache Library
//!
//! This library provides the pieces behind the `geocache` and `dnscheck`
//! binaries: configuration, error handling, data models, the SQLite
//! geolocation cache, the MaxMind lookup client, the cache-or-lookup policy,
//! DNS probing with its HTML report and result log, and logging setup.

pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod lookup;
pub mod geolocator;
pub mod logging;
pub mod dns_probe;
pub mod dns_report;
pub mod check_log;

pub use config::{Config, DnsCheckConfig};
pub use error::GeoError;
pub use geolocator::{Geolocator, Resolution};
pub use lookup::LookupClient;
pub use models::{GeoRecord, Target};
pub use store::GeoStore;
