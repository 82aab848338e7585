//! External API integrations

pub mod openweather;

use std::future::Future;

use shared::EnvironmentalSnapshot;
use thiserror::Error;

pub use openweather::OpenWeatherClient;

/// Failure reported by an environmental data source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("location not found: {0}")]
    LocationNotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

/// Source of point-in-time environmental measurements
pub trait EnvironmentalDataProvider: Send + Sync + 'static {
    fn fetch(
        &self,
        location: &str,
    ) -> impl Future<Output = Result<EnvironmentalSnapshot, ProviderError>> + Send;
}
