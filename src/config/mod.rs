use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::engine::DecisionPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub voting: VotingConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("ASAMBLEA_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path is unreasonably long"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("ASAMBLEA_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.voting.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub voters_max_capacity: u64,
    pub voters_ttl_seconds: u64,
    pub tallies_max_capacity: u64,
    pub tallies_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.voters_max_capacity >= 16,
            "Voter cache capacity must be at least 16"
        );
        assert!(
            self.voters_ttl_seconds <= 86_400,
            "Voter cache TTL cannot exceed one day"
        );
        assert!(
            self.tallies_max_capacity >= 16,
            "Tally cache capacity must be at least 16"
        );
        assert!(
            self.tallies_ttl_seconds <= 86_400,
            "Tally cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

/// Decision-rule settings. The whole section is optional; the defaults match
/// the customary Spanish ballot labels and a simple majority.
#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    #[serde(default = "VotingConfig::default_affirmative_labels")]
    pub affirmative_labels: Vec<String>,
    #[serde(default = "VotingConfig::default_approval_threshold_percent")]
    pub approval_threshold_percent: Decimal,
}

impl VotingConfig {
    pub fn decision_policy(&self) -> DecisionPolicy {
        DecisionPolicy {
            affirmative_labels: self.affirmative_labels.clone(),
            approval_threshold_percent: self.approval_threshold_percent,
        }
    }

    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.approval_threshold_percent > Decimal::ZERO,
            "Approval threshold must be positive"
        );
        assert!(
            self.approval_threshold_percent <= Decimal::ONE_HUNDRED,
            "Approval threshold cannot exceed 100"
        );
        assert!(
            !self.affirmative_labels.is_empty(),
            "At least one affirmative label is required"
        );
        assert!(
            self.affirmative_labels
                .iter()
                .all(|label| !label.trim().is_empty()),
            "Affirmative labels cannot be blank"
        );
        Ok(())
    }

    fn default_affirmative_labels() -> Vec<String> {
        vec![
            "Acepta".to_string(),
            "Sí".to_string(),
            "Aprueba".to_string(),
        ]
    }

    fn default_approval_threshold_percent() -> Decimal {
        Decimal::from(50)
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            affirmative_labels: Self::default_affirmative_labels(),
            approval_threshold_percent: Self::default_approval_threshold_percent(),
        }
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
