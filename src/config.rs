//! Configuration types for Rewind

use serde::{Deserialize, Serialize};

use crate::cassette::{validate_cassette_name, Cassette, CassetteOptions, MatchOn, RecordMode};
use crate::{Result, RewindError};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Permit live traffic while no cassette is inserted
    #[serde(default)]
    pub allow_http_connections_when_no_cassette: bool,
    /// Let requests to the local machine through untouched
    #[serde(default)]
    pub ignore_localhost: bool,
    /// Hosts whose requests are let through untouched
    #[serde(default)]
    pub ignore_hosts: Vec<String>,
    /// Integrations that never intercept
    #[serde(default)]
    pub disabled_integrations: Vec<String>,
    /// Cassette inserted by the proxy
    #[serde(default)]
    pub cassette: CassetteConfig,
    /// Proxy endpoint configurations
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Cassette configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CassetteConfig {
    /// Cassette name
    #[serde(default = "default_cassette_name")]
    pub name: String,
    /// Recording mode
    #[serde(default)]
    pub record: RecordMode,
    /// Request components used for matching
    #[serde(default = "default_match_on")]
    pub match_requests_on: Vec<MatchOn>,
    /// Allow interactions to be played back more than once
    #[serde(default)]
    pub allow_playback_repeats: bool,
}

fn default_cassette_name() -> String {
    "default".to_string()
}

fn default_match_on() -> Vec<MatchOn> {
    CassetteOptions::default().match_requests_on
}

impl Default for CassetteConfig {
    fn default() -> Self {
        Self {
            name: default_cassette_name(),
            record: RecordMode::default(),
            match_requests_on: default_match_on(),
            allow_playback_repeats: false,
        }
    }
}

impl CassetteConfig {
    /// Cassette options described by this configuration
    #[must_use]
    pub fn options(&self) -> CassetteOptions {
        CassetteOptions {
            record: self.record,
            match_requests_on: self.match_requests_on.clone(),
            allow_playback_repeats: self.allow_playback_repeats,
        }
    }

    /// Build an empty cassette
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid
    pub fn build(&self) -> Result<Cassette> {
        Cassette::new(&self.name, self.options())
    }
}

/// Endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Target host to proxy to
    pub target_host: String,
    /// Target port
    pub target_port: u16,
    /// Source port to listen on
    pub source_port: u16,
    /// Target scheme
    #[serde(default = "default_http")]
    pub target_type: String,
}

fn default_http() -> String {
    "http".to_string()
}

impl EndpointConfig {
    /// Absolute URI on the target for a path and query
    #[must_use]
    pub fn target_uri(&self, path_and_query: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.target_type, self.target_host, self.target_port, path_and_query
        )
    }
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Maximum request size in bytes
    pub max_request_size: usize,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Maximum headers per request
    pub max_headers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: 4096,
            max_request_size: 16 * 1024 * 1024,   // 16 MB
            max_response_size: 256 * 1024 * 1024, // 256 MB
            max_headers: 128,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RewindError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| RewindError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        validate_cassette_name(&self.cassette.name)
            .map_err(|e| RewindError::ConfigError(format!("cassette: {e}")))?;

        if self.cassette.match_requests_on.is_empty() {
            return Err(RewindError::ConfigError(
                "cassette: match_requests_on cannot be empty".to_string(),
            ));
        }

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.target_host.is_empty() {
                return Err(RewindError::ConfigError(format!(
                    "Endpoint {i}: target_host cannot be empty"
                )));
            }

            if endpoint.target_port == 0 {
                return Err(RewindError::ConfigError(format!(
                    "Endpoint {i}: target_port cannot be 0"
                )));
            }

            if endpoint.source_port == 0 {
                return Err(RewindError::ConfigError(format!(
                    "Endpoint {i}: source_port cannot be 0"
                )));
            }

            // The forwarding client has no TLS connector.
            if endpoint.target_type != "http" {
                return Err(RewindError::ConfigError(format!(
                    "Endpoint {i}: unsupported target_type '{}'",
                    endpoint.target_type
                )));
            }
        }

        let limits = [
            ("max_connections", self.limits.max_connections),
            ("max_request_size", self.limits.max_request_size),
            ("max_response_size", self.limits.max_response_size),
            ("max_headers", self.limits.max_headers),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(RewindError::ConfigError(format!("{name} must be > 0")));
            }
        }

        Ok(())
    }

    /// Validate configuration for running the proxy
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid or has no endpoint
    pub fn validate_for_proxy(&self) -> Result<()> {
        self.validate()?;

        if self.endpoints.is_empty() {
            return Err(RewindError::ConfigError(
                "At least one endpoint must be configured".to_string(),
            ));
        }

        Ok(())
    }
}
