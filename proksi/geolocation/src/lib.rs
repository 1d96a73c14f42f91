//! Looks up an endpoint's country/city/ISP by IP, rate-limited against the
//! free tier of whichever lookup service is configured.
//!
//! Grounded on `examples/original_source/pkg/geolocation/ipapi.go`'s
//! `IpapiGeolocator`.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use proksi_core::Geolocation;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider reported failure: {0}")]
    Provider(String),
}

const DEFAULT_RATE_LIMIT_PER_MINUTE: NonZeroU32 = nonzero!(40u32);

#[derive(Debug, Deserialize)]
struct IpapiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "country")]
    country_name: Option<String>,
    #[serde(default, rename = "regionName")]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    org: Option<String>,
}

impl IpapiResponse {
    fn is_success(&self) -> bool {
        self.status == "success"
    }

    fn into_geolocation(self) -> Geolocation {
        Geolocation {
            country: self.country_name,
            region: self.region_name,
            city: self.city,
            lat: self.lat,
            lon: self.lon,
            isp: self.isp,
            org: self.org,
        }
    }
}

type Limiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Locates IPs against `http://ip-api.com`'s free JSON endpoint by default;
/// the base URL is constructor-injected rather than hardcoded so tests can
/// point it at a local stand-in.
pub struct Geolocator {
    client: reqwest::Client,
    base_url: String,
    limiter: Arc<Limiter>,
}

impl Geolocator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_rate_limit(base_url, DEFAULT_RATE_LIMIT_PER_MINUTE)
    }

    pub fn with_rate_limit(base_url: impl Into<String>, per_minute: NonZeroU32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        }
    }

    pub fn default_ip_api() -> Self {
        Self::new("http://ip-api.com/json")
    }

    pub async fn locate(&self, ip: IpAddr) -> Result<Geolocation, LocateError> {
        self.limiter.until_ready().await;

        let url = format!(
            "{}/{}?lang=en&fields=status,message,country,regionName,city,lat,lon,isp,org",
            self.base_url, ip
        );
        let dto: IpapiResponse = self.client.get(url).send().await?.json().await?;

        if !dto.is_success() {
            return Err(LocateError::Provider(dto.message));
        }
        Ok(dto.into_geolocation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn locate_returns_geolocation_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "country": "Testland",
                "regionName": "Test Region",
                "city": "Testville",
                "lat": 1.0,
                "lon": 2.0,
                "isp": "Test ISP",
                "org": "Test Org",
            })))
            .mount(&server)
            .await;

        let geolocator = Geolocator::new(server.uri());
        let geo = geolocator.locate("1.2.3.4".parse().unwrap()).await.unwrap();
        assert_eq!(geo.country.as_deref(), Some("Testland"));
        assert_eq!(geo.city.as_deref(), Some("Testville"));
    }

    /// The original's `Locate` checked `if dto.isSuccess() { return err }`
    /// — inverted from its own intent. This exercises the corrected
    /// behavior: a `"fail"` status must surface as an error, not succeed.
    #[tokio::test]
    async fn locate_errors_on_provider_reported_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail",
                "message": "invalid query",
            })))
            .mount(&server)
            .await;

        let geolocator = Geolocator::new(server.uri());
        let err = geolocator.locate("1.2.3.4".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, LocateError::Provider(msg) if msg == "invalid query"));
    }
}
