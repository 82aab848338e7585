//! Resilient environmental data fetching
//!
//! Every attempt is bounded by a timeout. Unavailable providers are retried
//! with capped exponential backoff; unknown locations are not. A per-location
//! cache of the last good snapshot is consulted only when configured and only
//! after every attempt has failed.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use shared::EnvironmentalSnapshot;
use thiserror::Error;

use crate::config::FetchConfig;
use crate::external::{EnvironmentalDataProvider, ProviderError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataFetchError {
    #[error("location not found: {0}")]
    LocationNotFound(String),

    #[error("environmental data for {location} unavailable after {attempts} attempts: {last_error}")]
    Exhausted {
        location: String,
        attempts: u32,
        last_error: ProviderError,
    },
}

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Live,
    Cache,
}

#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    pub snapshot: EnvironmentalSnapshot,
    pub source: DataSource,
    pub attempts: u32,
}

/// Wraps a provider with timeout, retry and optional cache fallback
pub struct ResilientProvider<P> {
    provider: P,
    policy: FetchConfig,
    cache: RwLock<HashMap<String, EnvironmentalSnapshot>>,
}

impl<P: EnvironmentalDataProvider> ResilientProvider<P> {
    pub fn new(provider: P, policy: FetchConfig) -> Self {
        Self {
            provider,
            policy,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self
            .policy
            .backoff_base_ms
            .saturating_mul(factor)
            .min(self.policy.backoff_max_ms);
        Duration::from_millis(millis)
    }

    pub async fn fetch(&self, location: &str) -> Result<FetchedSnapshot, DataFetchError> {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let timeout = Duration::from_millis(self.policy.timeout_ms);
        let mut last_error = ProviderError::Unavailable("no attempt made".to_string());

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                tracing::warn!(
                    location,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Retrying environmental fetch"
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = tokio::time::timeout(timeout, self.provider.fetch(location))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::Unavailable(format!(
                        "timed out after {} ms",
                        self.policy.timeout_ms
                    )))
                });

            match outcome {
                Ok(snapshot) => {
                    self.remember(location, &snapshot);
                    return Ok(FetchedSnapshot {
                        snapshot,
                        source: DataSource::Live,
                        attempts: attempt + 1,
                    });
                }
                Err(err) if err.is_retryable() => last_error = err,
                Err(ProviderError::LocationNotFound(name)) => {
                    return Err(DataFetchError::LocationNotFound(name));
                }
                Err(err) => {
                    return Err(DataFetchError::Exhausted {
                        location: location.to_string(),
                        attempts: attempt + 1,
                        last_error: err,
                    });
                }
            }
        }

        if self.policy.fallback_to_cache {
            if let Some(snapshot) = self.cached(location) {
                tracing::warn!(location, "Serving cached environmental snapshot");
                return Ok(FetchedSnapshot {
                    snapshot,
                    source: DataSource::Cache,
                    attempts: max_attempts,
                });
            }
        }

        Err(DataFetchError::Exhausted {
            location: location.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    fn cache_key(location: &str) -> String {
        location.trim().to_lowercase()
    }

    fn remember(&self, location: &str, snapshot: &EnvironmentalSnapshot) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(Self::cache_key(location), snapshot.clone());
        }
    }

    fn cached(&self, location: &str) -> Option<EnvironmentalSnapshot> {
        let cache = self.cache.read().ok()?;
        let snapshot = cache.get(&Self::cache_key(location))?;
        let max_age = i64::try_from(self.policy.cache_max_age_secs).unwrap_or(i64::MAX);
        if snapshot.age_seconds(Utc::now()) > max_age {
            return None;
        }
        Some(snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Measurements;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl EnvironmentalDataProvider for Flaky {
        async fn fetch(&self, location: &str) -> Result<EnvironmentalSnapshot, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if location == "Atlantis" {
                return Err(ProviderError::LocationNotFound(location.to_string()));
            }
            if call < self.failures {
                return Err(ProviderError::Unavailable("503".to_string()));
            }
            Ok(EnvironmentalSnapshot::complete(
                location,
                Measurements {
                    pm25: 10.0,
                    pm10: 20.0,
                    temperature: 25.0,
                    humidity: 50.0,
                    pressure: 1012.0,
                    wind_speed: 2.0,
                    pollen_level: 50.0,
                },
            ))
        }
    }

    fn policy() -> FetchConfig {
        FetchConfig {
            timeout_ms: 200,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
            fallback_to_cache: false,
            cache_max_age_secs: 60,
        }
    }

    fn flaky(failures: usize, policy: FetchConfig) -> ResilientProvider<Flaky> {
        ResilientProvider::new(
            Flaky {
                failures,
                calls: AtomicUsize::new(0),
            },
            policy,
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let provider = flaky(0, FetchConfig {
            backoff_base_ms: 200,
            backoff_max_ms: 1000,
            ..policy()
        });
        assert_eq!(provider.backoff(0), Duration::from_millis(200));
        assert_eq!(provider.backoff(1), Duration::from_millis(400));
        assert_eq!(provider.backoff(2), Duration::from_millis(800));
        assert_eq!(provider.backoff(3), Duration::from_millis(1000));
        assert_eq!(provider.backoff(70), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() {
        let provider = flaky(2, policy());
        let fetched = provider.fetch("Pune").await.unwrap();
        assert_eq!(fetched.attempts, 3);
        assert_eq!(fetched.source, DataSource::Live);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let provider = flaky(3, policy());
        let err = provider.fetch("Pune").await.unwrap_err();
        assert!(matches!(err, DataFetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(provider.provider().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_location_not_retried() {
        let provider = flaky(0, policy());
        let err = provider.fetch("Atlantis").await.unwrap_err();
        assert_eq!(err, DataFetchError::LocationNotFound("Atlantis".to_string()));
        assert_eq!(provider.provider().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_only_when_enabled() {
        // a healthy provider fills the cache, then a failing one inherits it
        let provider = flaky(0, policy());
        provider.fetch("Pune").await.unwrap();
        let failing = ResilientProvider {
            provider: Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            policy: policy(),
            cache: RwLock::new(provider.cache.read().unwrap().clone()),
        };
        assert!(failing.fetch("Pune").await.is_err());

        let with_cache = ResilientProvider {
            policy: FetchConfig {
                fallback_to_cache: true,
                ..policy()
            },
            ..failing
        };
        let fetched = with_cache.fetch("pune ").await.unwrap();
        assert_eq!(fetched.source, DataSource::Cache);
        assert!(with_cache.fetch("Mumbai").await.is_err());
    }

    #[tokio::test]
    async fn test_stale_cache_entry_refused() {
        let provider = ResilientProvider::new(
            Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            FetchConfig {
                fallback_to_cache: true,
                cache_max_age_secs: 60,
                ..policy()
            },
        );
        let observed = Utc::now() - chrono::Duration::hours(5);
        let stale = EnvironmentalSnapshot::complete(
            "Pune",
            Measurements {
                pm25: 10.0,
                pm10: 20.0,
                temperature: 25.0,
                humidity: 50.0,
                pressure: 1012.0,
                wind_speed: 2.0,
                pollen_level: 50.0,
            },
        )
        .with_observed_at(observed);
        provider.remember("Pune", &stale);

        let err = provider.fetch("Pune").await.unwrap_err();
        assert!(matches!(err, DataFetchError::Exhausted { attempts: 3, .. }));

        provider.remember("Pune", &stale.clone().with_observed_at(Utc::now()));
        let fetched = provider.fetch("Pune").await.unwrap();
        assert_eq!(fetched.source, DataSource::Cache);
    }
}
