use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use railway_core::{Coordinates, GeocodeError, Geocoder, RetryingGeocoder};
use crate::app_config::GeocodingConfig;

/// Nominatim-compatible geocoder (`GET {base_url}/search?q=...&format=json&limit=1`).
#[derive(Clone, Debug)]
pub struct HttpGeocoder {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl HttpGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The geocoder used by the service: HTTP lookups retried on timeout
    pub fn with_retries(config: &GeocodingConfig) -> Result<RetryingGeocoder<Self>, reqwest::Error> {
        Ok(RetryingGeocoder::new(Self::new(config)?, config.retry_policy()))
    }
}

fn request_error(err: reqwest::Error) -> GeocodeError {
    if err.is_timeout() {
        GeocodeError::Timeout
    } else {
        GeocodeError::Provider(err.to_string())
    }
}

fn parse_place(name: &str, places: Vec<Place>) -> Result<Coordinates, GeocodeError> {
    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| GeocodeError::NotFound(name.to_string()))?;

    let latitude = place.lat.parse::<f64>().map_err(|e| GeocodeError::Provider(format!("bad latitude: {e}")))?;
    let longitude = place.lon.parse::<f64>().map_err(|e| GeocodeError::Provider(format!("bad longitude: {e}")))?;

    Ok(Coordinates { latitude, longitude })
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn lookup(&self, name: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .http_client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", name), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Provider(format!("HTTP {status}")));
        }

        let places: Vec<Place> = response.json().await.map_err(request_error)?;
        parse_place(name, places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_place() {
        let places: Vec<Place> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "50.4500336", "lon": "30.5241361", "display_name": "Kyiv"}]"#,
        )
        .unwrap();

        let coords = parse_place("Kyiv", places).unwrap();
        assert_eq!(coords.latitude, 50.4500336);
        assert_eq!(coords.longitude, 30.5241361);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        assert!(matches!(parse_place("Atlantis", Vec::new()), Err(GeocodeError::NotFound(name)) if name == "Atlantis"));
    }

    #[test]
    fn test_garbage_coordinates_are_provider_errors() {
        let places = vec![Place { lat: "north".into(), lon: "30.5".into() }];
        assert!(matches!(parse_place("Kyiv", places), Err(GeocodeError::Provider(_))));
    }
}
