// src/config.rs

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

/// Catchment Explorer API - scenario, model and job service for catchment
/// management optimisation
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Scenario (TOML) to load at startup
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Solution set (CSV) to load after the startup scenario
    #[arg(long, requires = "scenario")]
    pub solution_set: Option<PathBuf>,

    /// Port for the versioned API listener
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Port for the admin listener
    #[arg(long)]
    pub admin_port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode configuration: {0}")]
    Decode(#[from] toml::de::Error),

    #[error("invalid value [{value}] for environment variable {name}")]
    InvalidEnvVar { name: &'static str, value: String },

    #[error("JobQueueLength must be at least 1")]
    InvalidQueueLength,

    #[error("API and admin listeners cannot share port {0}")]
    PortClash(u16),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields, default)]
pub struct ServerConfig {
    pub service_name: String,
    pub api_port: u16,
    pub admin_port: u16,
    pub cache_maximum_age_in_seconds: u64,
    pub job_queue_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: "Catchment Explorer".to_string(),
            api_port: 8080,
            admin_port: 8081,
            cache_maximum_age_in_seconds: 10,
            job_queue_length: 1,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the config file, then the environment, then the
    /// command line.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        if let Some(port) = args.api_port {
            config.api_port = port;
        }
        if let Some(port) = args.admin_port {
            config.admin_port = port;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = parse_env(&lookup, "API_PORT")? {
            self.api_port = port;
        }
        if let Some(port) = parse_env(&lookup, "ADMIN_PORT")? {
            self.admin_port = port;
        }
        if let Some(age) = parse_env(&lookup, "CACHE_MAX_AGE")? {
            self.cache_maximum_age_in_seconds = age;
        }
        if let Some(length) = parse_env(&lookup, "JOB_QUEUE_LENGTH")? {
            self.job_queue_length = length;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job_queue_length == 0 {
            return Err(ConfigError::InvalidQueueLength);
        }
        if self.api_port == self.admin_port {
            return Err(ConfigError::PortClash(self.api_port));
        }
        Ok(())
    }
}

fn parse_env<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar { name, value }),
        None => Ok(None),
    }
}
