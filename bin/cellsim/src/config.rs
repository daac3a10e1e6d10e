use crate::plan::PlanRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level scenario configuration of the `cellsim` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network description file; the local preset when absent
    #[serde(default)]
    pub network: Option<PathBuf>,

    /// Serve Prometheus metrics on this port
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Operations submitted in order, each relayed to completion
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,

    #[serde(flatten)]
    pub request: PlanRequest,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        Ok(config)
    }
}
