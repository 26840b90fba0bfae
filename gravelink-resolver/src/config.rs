//! Resolver configuration
//!
//! Every threshold the pipeline uses is configurable. Values come from the
//! `[resolver]` table of the gravelink config file; absent keys fall back to
//! the documented defaults below.

use gravelink_common::config::TomlConfig;
use gravelink_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_WEB_BASE_URL: &str = "https://www.familysearch.org";
pub const DEFAULT_CLIENT_ID: &str = "a02f100000TnN56AAF";
pub const DEFAULT_IP_ADDRESS: &str = "216.49.186.122";
pub const USER_AGENT: &str = concat!("gravelink/", env!("CARGO_PKG_VERSION"));

/// Archive collection that indexes a source website's memorials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCollection {
    #[default]
    FindAGrave,
    BillionGraves,
}

impl SourceCollection {
    /// Archive collection identifier
    pub fn collection_id(&self) -> &'static str {
        match self {
            SourceCollection::FindAGrave => "2221801",
            SourceCollection::BillionGraves => "2026973",
        }
    }
}

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Pending person lookups needed before a size-triggered flush
    pub min_person_batch_size: usize,
    /// Upper bound on IDs sent in one bulk lookup
    pub max_person_batch_size: usize,
    /// Deadline after which a partial batch flushes anyway
    pub person_batch_interval_ms: u64,
    /// Anonymous sessions older than this are replaced before use
    pub anonymous_session_max_age_secs: u64,
    /// Rotate the anonymous session after this many requests (0 disables)
    pub anonymous_refresh_after_requests: u32,
    /// Every API call takes at least this long
    pub min_response_latency_ms: u64,
    /// Wall-clock budget for a single HTTP call
    pub request_timeout_ms: u64,
    /// Token-bucket cap on request rate per client
    pub max_requests_per_second: u32,
    /// Event bus buffer
    pub event_capacity: usize,
    /// Search results above this count are treated as a rate-limit symptom
    pub max_plausible_matches: usize,
    pub web_base_url: String,
    pub client_id: String,
    pub ip_address: String,
    pub source_collection: SourceCollection,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_person_batch_size: 10,
            max_person_batch_size: 50,
            person_batch_interval_ms: 15_000,
            anonymous_session_max_age_secs: 600,
            anonymous_refresh_after_requests: 100,
            min_response_latency_ms: 1_000,
            request_timeout_ms: 10_000,
            max_requests_per_second: 2,
            event_capacity: 1_000,
            max_plausible_matches: 1,
            web_base_url: DEFAULT_WEB_BASE_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            ip_address: DEFAULT_IP_ADDRESS.to_string(),
            source_collection: SourceCollection::default(),
        }
    }
}

impl ResolverConfig {
    /// Read the `[resolver]` table of a loaded config file
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        let resolver: ResolverConfig = toml::Value::Table(config.resolver.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [resolver] section: {}", e)))?;
        resolver.validate()?;
        Ok(resolver)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.min_person_batch_size == 0 {
            return Err(Error::Config(
                "min_person_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_person_batch_size < self.min_person_batch_size {
            return Err(Error::Config(format!(
                "max_person_batch_size ({}) must not be below min_person_batch_size ({})",
                self.max_person_batch_size, self.min_person_batch_size
            )));
        }
        if self.max_requests_per_second == 0 {
            return Err(Error::Config(
                "max_requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.web_base_url.trim().is_empty() {
            return Err(Error::Config("web_base_url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn person_batch_interval(&self) -> Duration {
        Duration::from_millis(self.person_batch_interval_ms)
    }

    pub fn anonymous_session_max_age(&self) -> Duration {
        Duration::from_secs(self.anonymous_session_max_age_secs)
    }

    pub fn min_response_latency(&self) -> Duration {
        Duration::from_millis(self.min_response_latency_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Trim a trailing slash so paths can be appended directly
    pub fn base_url(&self) -> &str {
        self.web_base_url.trim_end_matches('/')
    }
}
