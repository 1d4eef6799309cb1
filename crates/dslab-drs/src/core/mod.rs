pub mod cluster_state;
pub mod common;
pub mod config;
pub mod cost_benefit;
pub mod drs_algorithm;
pub mod drs_algorithms;
pub mod imbalance;
pub mod model;
pub mod plan;
pub mod plan_generator;
pub mod provider;
