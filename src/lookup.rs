//! MaxMind Lookup Module
//!
//! This module queries the MaxMind GeoIP2 web service for one address and
//! flattens the nested response into a `GeoRecord`. The service response is
//! only partially trusted: any field that is missing or has an unexpected type
//! falls back to its zero value instead of failing the lookup.
use crate::config::MaxMindConfig;
use crate::error::{GeoError, Result};
use crate::models::{GeoRecord, Subdivision, Target};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// LookupClient issues authenticated requests against one MaxMind edition.
pub struct LookupClient {
    client: Client,
    base_url: String,
    account: String,
    key: String,
    pretty: bool,
}

impl LookupClient {
    /// Validates the MaxMind settings and builds the HTTP client.
    ///
    /// No request is made here, so a bad configuration never reaches the network.
    pub fn new(config: &MaxMindConfig) -> Result<Self> {
        let base_url = config.endpoint()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout.max(1)))
            .build()
            .map_err(|e| GeoError::Config(format!("Failed to create HTTP client: {}", e)))?;
        info!("Using MaxMind edition: {}", config.edition);
        debug!("MaxMind edition URL: {}", base_url);
        Ok(Self {
            client,
            base_url,
            account: config.account.clone(),
            key: config.key.clone(),
            pretty: config.pretty,
        })
    }

    /// Full request URI for `target`.
    pub fn uri(&self, target: &Target) -> String {
        let mut uri = format!("{}{}", self.base_url, target);
        if self.pretty {
            uri.push_str("?pretty");
        }
        uri
    }

    /// Geolocates `target` with a single GET. No retries.
    pub async fn lookup(&self, target: &Target) -> Result<GeoRecord> {
        let uri = self.uri(target);
        info!("Geolocating IP: {}", target);
        debug!("MaxMind URI: {}", uri);

        let response = self
            .client
            .get(&uri)
            .basic_auth(&self.account, Some(&self.key))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GeoError::Network(describe_failure(status, &body)));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| GeoError::Network(format!("response is not JSON: {}", e)))?;
        if !raw.is_object() {
            return Err(GeoError::Network("response is not a JSON object".into()));
        }

        let mut record = parse_record(&raw);
        // An explicit address is always the cache key, whatever form the
        // service reports it in. Only `me` takes the reported address.
        if let Target::Addr(ip) = target {
            record.ip_address = ip.to_string();
        }

        match raw.pointer("/maxmind/queries_remaining").and_then(Value::as_u64) {
            Some(remaining) => info!("MaxMind remaining queries: {}", remaining),
            None => info!("MaxMind remaining queries: N/A"),
        }
        debug!("MaxMind response: {:?}", record);
        Ok(record)
    }
}

impl fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupClient")
            .field("base_url", &self.base_url)
            .field("account", &self.account)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

/// MaxMind error bodies look like `{"code": "...", "error": "..."}`.
fn describe_failure(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .map(|v| {
            let code = text(&v, "/code");
            let error = text(&v, "/error");
            match (code.is_empty(), error.is_empty()) {
                (true, true) => String::new(),
                (false, true) => code,
                (true, false) => error,
                (false, false) => format!("{}: {}", code, error),
            }
        })
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());
    format!("HTTP {} - {}", status, detail)
}

fn text(v: &Value, pointer: &str) -> String {
    v.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn float(v: &Value, pointer: &str) -> f64 {
    v.pointer(pointer).and_then(Value::as_f64).unwrap_or(0.0)
}

fn unsigned(v: &Value, pointer: &str) -> u32 {
    v.pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

// static_ip_score is published as a decimal; the cache keeps whole numbers.
fn integer(v: &Value, pointer: &str) -> i64 {
    v.pointer(pointer)
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// Flattens a GeoIP2 response into a record. Never fails.
pub fn parse_record(raw: &Value) -> GeoRecord {
    let subdivisions = raw
        .get("subdivisions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|s| Subdivision {
                    iso_code: text(s, "/iso_code"),
                    name: text(s, "/names/en"),
                })
                .collect()
        })
        .unwrap_or_default();

    GeoRecord {
        ip_address: text(raw, "/traits/ip_address"),
        network: text(raw, "/traits/network"),
        city_name: text(raw, "/city/names/en"),
        continent_code: text(raw, "/continent/code"),
        continent_name: text(raw, "/continent/names/en"),
        country_iso_code: text(raw, "/country/iso_code"),
        country_name: text(raw, "/country/names/en"),
        accuracy_radius: unsigned(raw, "/location/accuracy_radius"),
        latitude: float(raw, "/location/latitude"),
        longitude: float(raw, "/location/longitude"),
        time_zone: text(raw, "/location/time_zone"),
        postal_code: text(raw, "/postal/code"),
        subdivisions,
        static_ip_score: integer(raw, "/traits/static_ip_score"),
        user_type: text(raw, "/traits/user_type"),
        asn: unsigned(raw, "/traits/autonomous_system_number"),
        asn_org: text(raw, "/traits/autonomous_system_organization"),
        connection_type: text(raw, "/traits/connection_type"),
        isp: text(raw, "/traits/isp"),
        organization: text(raw, "/traits/organization"),
        updated_at: None,
        created_at: None,
    }
}
