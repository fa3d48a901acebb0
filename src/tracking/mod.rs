//! Experiment tracking against an MLflow-compatible REST endpoint.
//!
//! Connection settings come from the environment, read once at startup into
//! an explicit struct that is passed to each operation. Credentials never
//! appear in source.

mod client;
mod run;

pub use client::{TrackingClient, TrackingError};
pub use run::{RunStatus, TrackingRun};

/// Environment variable holding the tracking server URI.
pub const TRACKING_URI_VAR: &str = "GLYCO_TRACKING_URI";
/// Environment variable holding the basic-auth username.
pub const TRACKING_USERNAME_VAR: &str = "GLYCO_TRACKING_USERNAME";
/// Environment variable holding the basic-auth password.
pub const TRACKING_PASSWORD_VAR: &str = "GLYCO_TRACKING_PASSWORD";

/// Experiment id runs are attached to when none is configured server-side.
pub const DEFAULT_EXPERIMENT_ID: &str = "0";

/// Connection settings for the tracking service.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Base URI of the tracking server.
    pub uri: url::Url,
    /// Basic-auth username, if the server requires one.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl TrackingConfig {
    /// Read tracking settings from the environment.
    ///
    /// Returns `Ok(None)` when no tracking URI is configured; the pipelines
    /// then run without a tracker.
    pub fn from_env() -> Result<Option<Self>, TrackingError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TrackingConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, TrackingError> {
        let Some(raw) = lookup(TRACKING_URI_VAR) else {
            return Ok(None);
        };
        let uri = url::Url::parse(&raw).map_err(|source| TrackingError::InvalidUri {
            raw: raw.clone(),
            source,
        })?;
        Ok(Some(Self {
            uri,
            username: lookup(TRACKING_USERNAME_VAR),
            password: lookup(TRACKING_PASSWORD_VAR),
        }))
    }
}
