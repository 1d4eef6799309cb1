//! Cluster imbalance evaluation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::cluster_state::ClusterState;
use crate::error::ConfigurationError;

/// Resource dimension(s) used to decide whether a cluster needs DRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrsMetric {
    Cpu,
    Memory,
    /// Both CPU and memory imbalance must cross the threshold.
    Both,
    /// Either CPU or memory imbalance must cross the threshold.
    Either,
}

impl DrsMetric {
    /// Returns true for `both` and `either`, which score migrations by CPU and memory together.
    pub fn is_combined(&self) -> bool {
        matches!(self, DrsMetric::Both | DrsMetric::Either)
    }
}

impl FromStr for DrsMetric {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(DrsMetric::Cpu),
            "memory" => Ok(DrsMetric::Memory),
            "both" => Ok(DrsMetric::Both),
            "either" => Ok(DrsMetric::Either),
            _ => Err(ConfigurationError::UnknownMetric(s.to_string())),
        }
    }
}

impl fmt::Display for DrsMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DrsMetric::Cpu => "cpu",
            DrsMetric::Memory => "memory",
            DrsMetric::Both => "both",
            DrsMetric::Either => "either",
        };
        write!(f, "{}", name)
    }
}

/// Normalized spread of the values: population standard deviation divided by the mean.
///
/// Returns zero for an empty list or zero mean.
pub fn cluster_imbalance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0. {
        return 0.;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// CPU and memory imbalance of a cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClusterImbalance {
    pub cpu: f64,
    pub memory: f64,
}

impl ClusterImbalance {
    pub fn from_lists(cpu_used: &[f64], memory_used: &[f64]) -> Self {
        Self {
            cpu: cluster_imbalance(cpu_used),
            memory: cluster_imbalance(memory_used),
        }
    }

    pub fn of(state: &ClusterState) -> Self {
        Self::from_lists(&state.cpu_used_list(), &state.memory_used_list())
    }

    /// Single score used to compare placements under the metric.
    /// Combined metrics sum CPU and memory imbalance.
    pub fn score(&self, metric: DrsMetric) -> f64 {
        match metric {
            DrsMetric::Cpu => self.cpu,
            DrsMetric::Memory => self.memory,
            DrsMetric::Both | DrsMetric::Either => self.cpu + self.memory,
        }
    }

    /// Applies the metric rule to per-resource comparison results.
    fn check(&self, metric: DrsMetric, pred: impl Fn(f64) -> bool) -> bool {
        match metric {
            DrsMetric::Cpu => pred(self.cpu),
            DrsMetric::Memory => pred(self.memory),
            DrsMetric::Both => pred(self.cpu) && pred(self.memory),
            DrsMetric::Either => pred(self.cpu) || pred(self.memory),
        }
    }

    pub fn exceeds(&self, metric: DrsMetric, threshold: f64) -> bool {
        self.check(metric, |imbalance| imbalance > threshold)
    }

    pub fn below(&self, metric: DrsMetric, threshold: f64) -> bool {
        self.check(metric, |imbalance| imbalance < threshold)
    }
}

/// Decides whether a cluster is imbalanced enough to be rebalanced.
pub struct ImbalanceEvaluator {
    metric: DrsMetric,
    threshold: f64,
}

impl ImbalanceEvaluator {
    pub fn new(metric: DrsMetric, threshold: f64) -> Self {
        Self { metric, threshold }
    }

    pub fn imbalance(&self, state: &ClusterState) -> ClusterImbalance {
        ClusterImbalance::of(state)
    }

    /// Returns true if imbalance under the configured metric rule exceeds the threshold.
    pub fn needs_drs(&self, state: &ClusterState) -> bool {
        let imbalance = self.imbalance(state);
        let result = imbalance.exceeds(self.metric, self.threshold);
        log::debug!(
            "cluster {}: cpu imbalance {:.4}, memory imbalance {:.4}, metric {}, threshold {} -> needs drs: {}",
            state.cluster_id(),
            imbalance.cpu,
            imbalance.memory,
            self.metric,
            self.threshold,
            result
        );
        result
    }
}
