//! Optional TOML configuration.
//!
//! CLI flags win over the file; the file wins over built-in defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsOptions, DEFAULT_CRITICAL_LIMIT, OBLIGATIONS_CATEGORY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Category feeding the KPIs. An empty string counts every category.
    #[serde(default = "default_category")]
    pub category: String,

    /// Number of critical items to list.
    #[serde(default = "default_critical_limit")]
    pub critical_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            critical_limit: default_critical_limit(),
        }
    }
}

fn default_category() -> String {
    OBLIGATIONS_CATEGORY.to_string()
}

fn default_critical_limit() -> usize {
    DEFAULT_CRITICAL_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "dashboard_report.md".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Loads `path` when given, otherwise `gii.toml` in the working directory
    /// if present, otherwise defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = Path::new("gii.toml");
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn metrics_options(&self) -> MetricsOptions {
        let category = self.dashboard.category.trim();
        MetricsOptions {
            category: (!category.is_empty()).then(|| category.to_string()),
            critical_limit: self.dashboard.critical_limit,
        }
    }
}
