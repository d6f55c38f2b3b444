//! Configuration types for the webhook provider
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::filter::DomainFilter;

/// Provider configuration, validated once at startup
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// DreamHost API key
    /// ⚠️ NEVER log this value
    pub api_key: String,

    /// Base URL of the DreamHost API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Dry-run mode: list records but do not add or remove any
    #[serde(default)]
    pub dry_run: bool,

    /// Domains to include (literal mode)
    #[serde(default)]
    pub domain_filter: Vec<String>,

    /// Domains to exclude (literal mode)
    #[serde(default)]
    pub exclude_domains: Vec<String>,

    /// Include pattern; when non-empty, regex mode is used
    #[serde(default)]
    pub regex_domain_filter: String,

    /// Exclude pattern (regex mode only)
    #[serde(default)]
    pub regex_domain_exclusion: String,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<REDACTED>")
            .field("api_url", &self.api_url)
            .field("dry_run", &self.dry_run)
            .field("domain_filter", &self.domain_filter)
            .field("exclude_domains", &self.exclude_domains)
            .field("regex_domain_filter", &self.regex_domain_filter)
            .field("regex_domain_exclusion", &self.regex_domain_exclusion)
            .field("reconciler", &self.reconciler)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            dry_run: false,
            domain_filter: Vec::new(),
            exclude_domains: Vec::new(),
            regex_domain_filter: String::new(),
            regex_domain_exclusion: String::new(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Create a configuration with the given API key and no filters
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("DreamHost API key cannot be empty"));
        }

        if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "DreamHost API URL must use HTTP or HTTPS scheme. Got: {}",
                self.api_url
            )));
        }

        self.reconciler.validate()?;

        Ok(())
    }

    /// True when the regex filter mode is selected
    pub fn uses_regex_filter(&self) -> bool {
        !self.regex_domain_filter.is_empty()
    }

    /// Build the domain filter selected by this configuration
    ///
    /// Regex mode is chosen when `regex_domain_filter` is non-empty, otherwise
    /// the literal lists are used. Logs a one-line summary of the result.
    pub fn domain_filter(&self) -> Result<DomainFilter, crate::Error> {
        let mut parts = Vec::new();

        let filter = if self.uses_regex_filter() {
            parts.push(format!("Regexp domain filter: '{}'", self.regex_domain_filter));
            if !self.regex_domain_exclusion.is_empty() {
                parts.push(format!("with exclusion: '{}'", self.regex_domain_exclusion));
            }
            DomainFilter::regex(&self.regex_domain_filter, &self.regex_domain_exclusion)?
        } else {
            if !self.regex_domain_exclusion.is_empty() {
                warn!("Regexp domain exclusion is ignored without a regexp domain filter");
            }
            if !self.domain_filter.is_empty() {
                parts.push(format!("zoneNode filter: '{}'", self.domain_filter.join(",")));
            }
            if !self.exclude_domains.is_empty() {
                parts.push(format!("Exclude domain filter: '{}'", self.exclude_domains.join(",")));
            }
            DomainFilter::with_exclusions(&self.domain_filter, &self.exclude_domains)
        };

        if parts.is_empty() {
            info!("Creating DreamHost provider with no kind of domain filters");
        } else {
            info!("Creating DreamHost provider with {}", parts.join(", "));
        }

        Ok(filter)
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Capacity of the reconcile event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.dreamhost.com".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(ProviderConfig::new("").validate().is_err());
        assert!(ProviderConfig::new("   ").validate().is_err());
        assert!(ProviderConfig::new("ABCDEF0123456789").validate().is_ok());
    }

    #[test]
    fn api_url_must_be_http() {
        let mut config = ProviderConfig::new("key");
        assert_eq!(config.api_url, "https://api.dreamhost.com");

        config.api_url = "ftp://api.dreamhost.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let mut config = ProviderConfig::new("key");
        config.reconciler.event_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn regex_mode_selected_by_non_empty_include() {
        let mut config = ProviderConfig::new("key");
        config.domain_filter = vec!["example.com".to_string()];
        config.regex_domain_filter = r"\.example\.org$".to_string();

        let filter = config.domain_filter().unwrap();
        assert!(matches!(filter, DomainFilter::Regex { .. }));
        assert!(filter.matches("www.example.org"));
        assert!(!filter.matches("www.example.com"));
    }

    #[test]
    fn literal_mode_ignores_regex_exclusion() {
        let mut config = ProviderConfig::new("key");
        config.domain_filter = vec!["example.com".to_string()];
        config.regex_domain_exclusion = "^www".to_string();

        let filter = config.domain_filter().unwrap();
        assert!(matches!(filter, DomainFilter::Names { .. }));
        assert!(filter.matches("www.example.com"));
    }

    #[test]
    fn invalid_regex_is_a_filter_error() {
        let mut config = ProviderConfig::new("key");
        config.regex_domain_filter = "([".to_string();

        let err = config.domain_filter().unwrap_err();
        assert!(matches!(err, crate::Error::Filter(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ProviderConfig::new("super-secret-key");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<REDACTED>"));
    }
}
