//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HISTORY_PAGE_SIZE, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_QUEUE_CAPACITY,
};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub reconciler: ReconcilerConfig,
    pub services: ServicesConfig,
    pub tenant_id: String,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// How the reconciler decides a one-shot job has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShotCompletion {
    /// Any finished run ends the job, failed runs included.
    #[default]
    AnyTerminal,
    /// Only a successful run ends the job; failed runs keep it `Going`.
    SuccessOnly,
}

impl std::str::FromStr for OneShotCompletion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any_terminal" => Ok(Self::AnyTerminal),
            "success_only" => Ok(Self::SuccessOnly),
            other => Err(format!("Invalid OneShotCompletion: {other}")),
        }
    }
}

/// Status reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub poll_interval_secs: u64,
    pub queue_capacity: usize,
    pub history_page_size: u32,
    pub query_timeout_secs: u64,
    pub join_timeout_secs: u64,
    #[serde(default)]
    pub one_shot_completion: OneShotCompletion,
}

/// Endpoints of the external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub sync_engine_url: String,
    pub type_mapping_url: String,
    pub audit_url: String,
    pub masking_url: String,
    pub callback_url: String,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            query_timeout_secs: 30,
            join_timeout_secs: 5,
            one_shot_completion: OneShotCompletion::AnyTerminal,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { path: "datapush.db".to_string(), pool_size: 8 },
            reconciler: ReconcilerConfig::default(),
            services: ServicesConfig {
                sync_engine_url: "http://localhost:8081".to_string(),
                type_mapping_url: "http://localhost:8082".to_string(),
                audit_url: "http://localhost:8083".to_string(),
                masking_url: "http://localhost:8084".to_string(),
                callback_url: "http://localhost:8085".to_string(),
                timeout_secs: 30,
                api_token: None,
            },
            tenant_id: "default".to_string(),
        }
    }
}
