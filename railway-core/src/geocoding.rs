use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Geocoding provider timed out")]
    Timeout,
    #[error("No location found for '{0}'")]
    NotFound(String),
    #[error("Geocoding provider error: {0}")]
    Provider(String),
    #[error("Gave up after {attempts} timed out attempts")]
    Exhausted { attempts: u32 },
}

/// Resolves a place name to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<Coordinates, GeocodeError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Retries the wrapped geocoder on timeouts only, with a fixed pause between attempts.
pub struct RetryingGeocoder<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: Geocoder> RetryingGeocoder<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for RetryingGeocoder<G> {
    async fn lookup(&self, name: &str) -> Result<Coordinates, GeocodeError> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.inner.lookup(name).await {
                Err(GeocodeError::Timeout) => {
                    tracing::warn!("Geocoding '{}' timed out (attempt {}/{})", name, attempt, attempts);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
                other => return other,
            }
        }

        Err(GeocodeError::Exhausted { attempts })
    }
}

/// Fixed lookup table, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: std::collections::HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, name: &str, latitude: f64, longitude: f64) -> Self {
        self.places.insert(name.to_lowercase(), Coordinates { latitude, longitude });
        self
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn lookup(&self, name: &str) -> Result<Coordinates, GeocodeError> {
        self.places
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| GeocodeError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Times out `failures` times, then answers
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Geocoder for Flaky {
        async fn lookup(&self, _name: &str) -> Result<Coordinates, GeocodeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(GeocodeError::Timeout)
            } else {
                Ok(Coordinates { latitude: 50.45, longitude: 30.52 })
            }
        }
    }

    struct Broken {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Geocoder for Broken {
        async fn lookup(&self, _name: &str) -> Result<Coordinates, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GeocodeError::Provider("HTTP 500".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_timeouts() {
        let calls = Arc::new(AtomicU32::new(0));
        let geocoder = RetryingGeocoder::new(Flaky { failures: 4, calls: calls.clone() }, RetryPolicy::default());

        let coords = geocoder.lookup("Kyiv").await.unwrap();
        assert_eq!(coords.latitude, 50.45);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let geocoder = RetryingGeocoder::new(Flaky { failures: 10, calls: calls.clone() }, RetryPolicy::default());

        let err = geocoder.lookup("Kyiv").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Exhausted { attempts: 5 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let geocoder = RetryingGeocoder::new(Broken { calls: calls.clone() }, RetryPolicy::default());

        assert!(matches!(geocoder.lookup("Kyiv").await, Err(GeocodeError::Provider(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_lookup_is_case_insensitive() {
        let geocoder = StaticGeocoder::new().with_place("Kyiv", 50.4500336, 30.5241361);
        assert!(geocoder.lookup("KYIV").await.is_ok());
        assert!(matches!(geocoder.lookup("Atlantis").await, Err(GeocodeError::NotFound(_))));
    }
}
