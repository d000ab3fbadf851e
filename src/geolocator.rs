//! Geolocator Module
//!
//! This module decides between the cache and the MaxMind service. `me` always
//! goes upstream, `force` skips the cache read, and everything else is served
//! from the cache while the stored row is fresh.

use chrono::{DateTime, Utc};
use log::info;

use crate::error::Result;
use crate::lookup::LookupClient;
use crate::models::{GeoRecord, Source, Target};
use crate::store::{is_fresh, GeoStore, SaveOutcome};

/// A resolved record and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub record: GeoRecord,
    pub source: Source,
}

pub struct Geolocator {
    store: GeoStore,
    client: LookupClient,
    ttl_days: u32,
}

impl Geolocator {
    pub fn new(store: GeoStore, client: LookupClient, ttl_days: u32) -> Self {
        Self {
            store,
            client,
            ttl_days,
        }
    }

    pub fn store(&self) -> &GeoStore {
        &self.store
    }

    pub async fn resolve(&self, target: &Target, force: bool) -> Result<Resolution> {
        self.resolve_at(target, force, Utc::now()).await
    }

    /// Same as `resolve`, with freshness and write times taken from `now`.
    pub async fn resolve_at(
        &self,
        target: &Target,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        match target {
            Target::Me => info!("IP is 'me', skipping database check"),
            Target::Addr(_) if force => {
                info!("Force flag is set, ignoring database and geolocating IP: {}", target)
            }
            Target::Addr(ip) => {
                if let Some(cached) = self.cached(&ip.to_string(), now)? {
                    return Ok(Resolution {
                        record: cached,
                        source: Source::Cache,
                    });
                }
                info!("IP info not found in database or expired, geolocating IP: {}", ip);
            }
        }

        let fetched = self.client.lookup(target).await?;
        let record = match self.store.put_at(&fetched, now)? {
            SaveOutcome::Inserted(stored) | SaveOutcome::Updated(stored) => stored,
            SaveOutcome::Skipped => fetched,
        };
        Ok(Resolution {
            record,
            source: Source::Upstream,
        })
    }

    fn cached(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<GeoRecord>> {
        let Some(record) = self.store.get(ip)? else {
            return Ok(None);
        };
        match record.updated_at {
            Some(updated_at) if is_fresh(updated_at, self.ttl_days, now) => {
                info!("IP info is still valid (TTL: {} days) for {}", self.ttl_days, ip);
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }
}
