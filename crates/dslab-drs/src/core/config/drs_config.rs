//! Per-cluster DRS configuration with global fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::common::ClusterId;
use crate::core::imbalance::DrsMetric;
use crate::error::ConfigurationError;

pub const DEFAULT_METRIC: &str = "cpu";
pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_ITERATIONS: f64 = 0.2;
pub const DEFAULT_ALGORITHM: &str = "balanced";
pub const DEFAULT_STORAGE_ALLOCATORS: [&str; 3] = ["LocalStorage", "ClusterScope", "ZoneWide"];

/// Validated configuration of a single DRS run.
#[derive(Debug, Clone, PartialEq)]
pub struct DrsConfig {
    /// Imbalance metric (`drs.imbalance.metric`).
    pub metric: DrsMetric,
    /// Imbalance threshold in `[0, 1]` (`drs.imbalance.threshold`).
    pub threshold: f64,
    /// Maximum number of migrations as a fraction of the workload count, in `(0, 1]` (`drs.iterations`).
    pub iterations: f64,
    /// DRS algorithm name (`drs.algorithm`).
    pub algorithm: String,
}

impl DrsConfig {
    /// Creates config for the default algorithm, fails on unknown metric or out of range values.
    pub fn new(metric: &str, threshold: f64, iterations: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            metric: metric.parse()?,
            threshold: validate_threshold(threshold)?,
            iterations: validate_iterations(iterations)?,
            algorithm: DEFAULT_ALGORITHM.to_string(),
        })
    }

    pub fn with_algorithm(mut self, algorithm: &str) -> Self {
        self.algorithm = algorithm.to_string();
        self
    }
}

impl Default for DrsConfig {
    fn default() -> Self {
        Self {
            metric: DrsMetric::Cpu,
            threshold: DEFAULT_THRESHOLD,
            iterations: DEFAULT_ITERATIONS,
            algorithm: DEFAULT_ALGORITHM.to_string(),
        }
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64, ConfigurationError> {
    if (0. ..=1.).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigurationError::InvalidThreshold(threshold))
    }
}

pub fn validate_iterations(iterations: f64) -> Result<f64, ConfigurationError> {
    if iterations > 0. && iterations <= 1. {
        Ok(iterations)
    } else {
        Err(ConfigurationError::InvalidIterations(iterations))
    }
}

/// Raw setting values, each of them may be absent and then resolved from the next level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrsSettings {
    pub metric: Option<String>,
    pub threshold: Option<f64>,
    pub iterations: Option<f64>,
    pub algorithm: Option<String>,
}

impl DrsSettings {
    fn or(&self, fallback: &DrsSettings) -> DrsSettings {
        DrsSettings {
            metric: self.metric.clone().or_else(|| fallback.metric.clone()),
            threshold: self.threshold.or(fallback.threshold),
            iterations: self.iterations.or(fallback.iterations),
            algorithm: self.algorithm.clone().or_else(|| fallback.algorithm.clone()),
        }
    }
}

/// Holds raw DRS config parsed from YAML file.
#[derive(Debug, Default, Deserialize)]
struct RawDrsConfig {
    pub metric: Option<String>,
    pub threshold: Option<f64>,
    pub iterations: Option<f64>,
    pub algorithm: Option<String>,
    pub storage_allocators: Option<Vec<String>>,
    pub clusters: Option<Vec<RawClusterSettings>>,
}

#[derive(Debug, Deserialize)]
struct RawClusterSettings {
    pub id: ClusterId,
    pub metric: Option<String>,
    pub threshold: Option<f64>,
    pub iterations: Option<f64>,
    pub algorithm: Option<String>,
}

/// Configuration source resolving settings per cluster with global fallback and built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DrsConfigStore {
    global: DrsSettings,
    clusters: BTreeMap<ClusterId, DrsSettings>,
    storage_allocators: Vec<String>,
}

impl Default for DrsConfigStore {
    fn default() -> Self {
        Self::new(DrsSettings::default())
    }
}

impl DrsConfigStore {
    pub fn new(global: DrsSettings) -> Self {
        Self {
            global,
            clusters: BTreeMap::new(),
            storage_allocators: DEFAULT_STORAGE_ALLOCATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reads config from YAML file (absent values fall back to defaults).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(file_name).map_err(|e| ConfigurationError::Read {
            file: file_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content, file_name)
    }

    /// Parses config from YAML string, `source` is used in error messages only.
    pub fn from_yaml(content: &str, source: &str) -> Result<Self, ConfigurationError> {
        let raw: RawDrsConfig = serde_yaml::from_str(content).map_err(|e| ConfigurationError::Parse {
            file: source.to_string(),
            message: e.to_string(),
        })?;

        let mut store = Self::new(DrsSettings {
            metric: raw.metric,
            threshold: raw.threshold,
            iterations: raw.iterations,
            algorithm: raw.algorithm,
        });
        if let Some(allocators) = raw.storage_allocators {
            store.storage_allocators = allocators;
        }
        for cluster in raw.clusters.unwrap_or_default() {
            store.set_cluster_settings(
                cluster.id,
                DrsSettings {
                    metric: cluster.metric,
                    threshold: cluster.threshold,
                    iterations: cluster.iterations,
                    algorithm: cluster.algorithm,
                },
            );
        }
        Ok(store)
    }

    pub fn set_cluster_settings(&mut self, cluster_id: ClusterId, settings: DrsSettings) {
        self.clusters.insert(cluster_id, settings);
    }

    pub fn set_storage_allocators(&mut self, allocators: Vec<String>) {
        self.storage_allocators = allocators;
    }

    /// Names of storage pool allocators in the order they are consulted.
    pub fn storage_allocators(&self) -> &[String] {
        &self.storage_allocators
    }

    /// Resolves and validates configuration of the cluster.
    pub fn resolve(&self, cluster_id: ClusterId) -> Result<DrsConfig, ConfigurationError> {
        let settings = match self.clusters.get(&cluster_id) {
            Some(cluster) => cluster.or(&self.global),
            None => self.global.clone(),
        };
        let config = DrsConfig::new(
            settings.metric.as_deref().unwrap_or(DEFAULT_METRIC),
            settings.threshold.unwrap_or(DEFAULT_THRESHOLD),
            settings.iterations.unwrap_or(DEFAULT_ITERATIONS),
        )?
        .with_algorithm(settings.algorithm.as_deref().unwrap_or(DEFAULT_ALGORITHM));
        Ok(config)
    }
}
