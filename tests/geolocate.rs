/// End-to-end tests for the geolocation cache.
///
/// These run the full cache-or-lookup flow against a mocked MaxMind service
/// and a SQLite file in a temporary directory:
/// - A first lookup goes upstream and is stored,
/// - A repeat lookup within the TTL is served from the cache,
/// - Configuration problems stop the run before any request is made.
use anyhow::Result;
use serde_json::json;
use std::fs;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[cfg(test)]
mod tests {
    use super::*;
    use geocache::models::Source;
    use geocache::{Config, GeoError, GeoStore, Geolocator, LookupClient, Target};

    fn write_config(dir: &std::path::Path, base_url: &str, ttl: u32) -> Result<Config> {
        let config_path = dir.join("config.json");
        fs::write(
            &config_path,
            json!({
                "general": {
                    "ttl": ttl,
                    "database": dir.join("geo.db"),
                    "log": dir.join("geo.log")
                },
                "maxmind": {
                    "account": 1234,
                    "key": "license",
                    "edition": "insights",
                    "editions": {
                        "city": format!("{}/geoip/v2.1/city/", base_url),
                        "insights": format!("{}/geoip/v2.1/insights/", base_url)
                    }
                }
            })
            .to_string(),
        )?;
        Ok(Config::load(&config_path)?)
    }

    fn insights_body() -> serde_json::Value {
        json!({
            "city": { "names": { "en": "Minneapolis" } },
            "continent": { "code": "NA", "names": { "en": "North America" } },
            "country": { "iso_code": "US", "names": { "en": "United States" } },
            "location": {
                "accuracy_radius": 20,
                "latitude": 44.9759,
                "longitude": -93.2166,
                "time_zone": "America/Chicago"
            },
            "postal": { "code": "55414" },
            "subdivisions": [{ "iso_code": "MN", "names": { "en": "Minnesota" } }],
            "traits": {
                "static_ip_score": 1.0,
                "user_type": "residential",
                "autonomous_system_number": 7922,
                "autonomous_system_organization": "COMCAST-7922",
                "connection_type": "Cable/DSL",
                "isp": "Comcast Cable",
                "organization": "Comcast",
                "ip_address": "203.0.113.5",
                "network": "203.0.113.0/24"
            },
            "maxmind": { "queries_remaining": 120 }
        })
    }

    fn geolocator(config: &Config) -> Result<Geolocator> {
        let client = LookupClient::new(&config.maxmind)?;
        let store = GeoStore::open(&config.general.database)?;
        Ok(Geolocator::new(store, client, config.general.ttl))
    }

    /// First call goes upstream once, second call the same day is a cache hit.
    #[tokio::test]
    async fn test_first_lookup_then_cache_hit() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geoip/v2.1/insights/203.0.113.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let config = write_config(dir.path(), &server.uri(), 7)?;
        let target: Target = "203.0.113.5".parse()?;

        let first = geolocator(&config)?.resolve(&target, false).await?;
        assert_eq!(first.source, Source::Upstream);
        assert_eq!(first.record.isp, "Comcast Cable");
        assert!(first.record.created_at.is_some());
        assert_eq!(first.record.created_at, first.record.updated_at);

        // A new process would reopen the database file.
        let second = geolocator(&config)?.resolve(&target, false).await?;
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.record, first.record);
        Ok(())
    }

    /// The force flag refreshes the row but keeps its creation time.
    #[tokio::test]
    async fn test_force_refresh_keeps_created_at() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let config = write_config(dir.path(), &server.uri(), 7)?;
        let target: Target = "203.0.113.5".parse()?;
        let geo = geolocator(&config)?;

        let first = geo.resolve(&target, false).await?;
        let forced = geo.resolve(&target, true).await?;
        assert_eq!(forced.source, Source::Upstream);
        assert_eq!(forced.record.created_at, first.record.created_at);
        assert!(forced.record.updated_at >= first.record.updated_at);
        assert_eq!(geo.store().count()?, 1);
        Ok(())
    }

    /// An unknown edition is rejected before anything is sent.
    #[tokio::test]
    async fn test_bad_edition_makes_no_request() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(insights_body()))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let mut config = write_config(dir.path(), &server.uri(), 7)?;
        config.maxmind.edition = "enterprise".into();
        let err = LookupClient::new(&config.maxmind).unwrap_err();
        assert!(matches!(err, GeoError::Config(_)));
        Ok(())
    }

    /// Malformed addresses never reach the cache or the service.
    #[test]
    fn test_invalid_ip_is_validation_error() {
        for bad in ["example.com", "300.1.1.1", "", "localhost"] {
            let err = bad.parse::<Target>().unwrap_err();
            assert!(matches!(err, GeoError::Validation(_)));
        }
    }
}
