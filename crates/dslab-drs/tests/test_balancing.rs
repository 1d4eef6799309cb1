use rstest::rstest;

use dslab_drs::core::cluster_state::ClusterState;
use dslab_drs::core::common::{HostId, VmId};
use dslab_drs::core::config::{DrsConfig, DrsConfigStore};
use dslab_drs::core::cost_benefit::{ImbalanceGoal, MigrationCostBenefitEstimator};
use dslab_drs::core::drs_algorithm::{drs_algorithm_resolver, DrsAlgorithm};
use dslab_drs::core::drs_algorithms::balanced::Balanced;
use dslab_drs::core::drs_algorithms::condensed::Condensed;
use dslab_drs::core::imbalance::{cluster_imbalance, ClusterImbalance, DrsMetric};
use dslab_drs::core::model::{Host, HostUtilization, ServiceOffering, Workload};
use dslab_drs::core::plan::ClusterDrsPlan;
use dslab_drs::core::plan_generator::{iteration_budget, DrsPlanGenerator};
use dslab_drs::error::{ConfigurationError, DrsError};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {} got {}",
        expected,
        actual
    );
}

fn host(id: HostId, memory_total: u64) -> Host {
    Host {
        id,
        name: format!("h{}", id),
        cluster_id: 1,
        zone_id: 1,
        cpu_total: 0,
        memory_total,
    }
}

fn usage(cpu_used: u64, memory_used: u64) -> HostUtilization {
    HostUtilization {
        cpu_used,
        memory_used,
        ..Default::default()
    }
}

fn vm(id: VmId, host_id: HostId, memory: u64) -> Workload {
    Workload::new(id, &format!("vm{}", id), host_id, ServiceOffering::new(1, 1, memory))
}

// Two hosts with CPU usage 1 and 2, memory usage 512 and 2048 MB.
// The only VM (1 CPU, 512 MB) runs on host 2, both hosts have 8 GB of memory.
fn two_hosts_state() -> ClusterState {
    let mut state = ClusterState::new(1);
    state.add_host(host(1, 8192), usage(1, 512));
    state.add_host(host(2, 8192), usage(2, 2048));
    state.add_workload(vm(1, 2, 512));
    state
}

// Three hosts with 8 GB of memory, three VMs with 1 GB each are placed on host 1.
fn packed_state() -> ClusterState {
    let mut state = ClusterState::new(1);
    state.add_host(host(1, 8192), usage(3, 3072));
    state.add_host(host(2, 8192), usage(0, 0));
    state.add_host(host(3, 8192), usage(0, 0));
    for id in 1..=3 {
        state.add_workload(vm(id, 1, 1024));
    }
    state
}

fn moves(plan: &ClusterDrsPlan) -> Vec<(VmId, HostId, HostId)> {
    plan.migrations
        .iter()
        .map(|m| (m.vm_id, m.source_host, m.destination_host))
        .collect()
}

#[test]
// Imbalance is the population standard deviation divided by the mean.
fn test_cluster_imbalance() {
    assert_eq!(cluster_imbalance(&[]), 0.);
    assert_eq!(cluster_imbalance(&[0., 0., 0.]), 0.);
    assert_eq!(cluster_imbalance(&[5., 5.]), 0.);
    assert_approx(cluster_imbalance(&[1., 2.]), 0.333);
    assert_approx(cluster_imbalance(&[512., 2048.]), 0.6);
}

#[test]
fn test_imbalance_of_state() {
    let imbalance = ClusterImbalance::of(&two_hosts_state());
    assert_approx(imbalance.cpu, 0.333);
    assert_approx(imbalance.memory, 0.6);
    assert_approx(imbalance.score(DrsMetric::Both), 0.933);
}

#[rstest]
#[case("cpu", false)]
#[case("memory", true)]
#[case("both", false)]
#[case("either", true)]
#[case("Memory", true)]
// CPU imbalance 0.333 and memory imbalance 0.6 are checked against threshold 0.5 under every metric rule.
fn test_needs_drs(#[case] metric: &str, #[case] expected: bool) {
    let config = DrsConfig::new(metric, 0.5, 0.2).unwrap();
    assert_eq!(Balanced::new().needs_drs(&two_hosts_state(), &config), expected);
}

#[test]
fn test_unknown_metric() {
    assert_eq!(
        DrsConfig::new("disk", 0.5, 0.2),
        Err(ConfigurationError::UnknownMetric("disk".to_string()))
    );
    assert_eq!(
        "".parse::<DrsMetric>(),
        Err(ConfigurationError::UnknownMetric("".to_string()))
    );
}

#[rstest]
#[case(-0.1, 0.2)]
#[case(1.1, 0.2)]
#[case(0.5, 0.)]
#[case(0.5, 1.5)]
fn test_invalid_config_values(#[case] threshold: f64, #[case] iterations: f64) {
    assert!(DrsConfig::new("cpu", threshold, iterations).is_err());
}

#[test]
// Moving the VM to host 1 changes memory usage to 1024 and 1536 MB.
fn test_memory_metric_estimation() {
    let state = two_hosts_state();
    let metrics = MigrationCostBenefitEstimator::new(DrsMetric::Memory, ImbalanceGoal::Decrease).estimate(&state, 1, 1);
    assert_approx(metrics.improvement, 0.4);
    assert_approx(metrics.cost, 512.);
    assert_approx(metrics.benefit, 3276.8);
}

#[test]
// CPU imbalance does not change, so combined metrics get the memory part only and subtract the cost.
fn test_combined_metric_estimation() {
    let state = two_hosts_state();
    let metrics = MigrationCostBenefitEstimator::new(DrsMetric::Both, ImbalanceGoal::Decrease).estimate(&state, 1, 1);
    assert_approx(metrics.benefit, 3276.8);
    assert_approx(metrics.improvement, 3276.8 - 512.);

    let cpu = MigrationCostBenefitEstimator::new(DrsMetric::Cpu, ImbalanceGoal::Decrease).estimate(&state, 1, 1);
    assert_approx(cpu.improvement, 0.);
}

#[test]
fn test_estimation_of_unknown_entities() {
    let state = two_hosts_state();
    let estimator = MigrationCostBenefitEstimator::new(DrsMetric::Memory, ImbalanceGoal::Decrease);
    assert_eq!(estimator.estimate(&state, 7, 1).improvement, 0.);
    assert_eq!(estimator.estimate(&state, 1, 7).cost, 0.);
    assert_eq!(estimator.estimate(&state, 1, 2).benefit, 0.);
    assert_eq!(
        estimator.estimate(&ClusterState::new(1), 1, 1).improvement,
        0.
    );
}

#[rstest]
#[case(0.2, 10, 2)]
#[case(0.2, 3, 1)]
#[case(0.5, 5, 2)]
#[case(1.0, 5, 5)]
#[case(0.5, 0, 1)]
fn test_iteration_budget(#[case] iterations: f64, #[case] workloads: usize, #[case] expected: usize) {
    assert_eq!(iteration_budget(iterations, workloads), expected);
}

#[test]
// The fixture cluster is rebalanced by a single migration of the VM to host 1.
fn test_plan_for_two_hosts() {
    let config = DrsConfig::new("memory", 0.5, 1.).unwrap();
    let algorithm = Balanced::new();
    let plan = DrsPlanGenerator::new(&algorithm, &config)
        .generate(&two_hosts_state(), None)
        .unwrap();
    assert_eq!(moves(&plan), vec![(1, 2, 1)]);
    assert_eq!(plan.algorithm, "balanced");
    assert!(plan.id.is_some());
    assert_approx(plan.migrations[0].improvement, 0.4);
    assert_approx(plan.migrations[0].cost_estimate, 512.);
    assert_approx(plan.migrations[0].benefit_estimate, 3276.8);
    assert!(plan.migrations[0].storage_mapping.is_empty());
}

#[test]
// Balanced cluster produces an empty plan.
fn test_plan_without_drs() {
    let config = DrsConfig::new("cpu", 0.5, 1.).unwrap();
    let algorithm = Balanced::new();
    let plan = DrsPlanGenerator::new(&algorithm, &config)
        .generate(&two_hosts_state(), None)
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
// All moves from host 1 are equally good at first, so the first VM goes to the first host.
// Then the next VM goes to host 3, after that the cluster is balanced and generation stops
// before the budget of three migrations is spent.
fn test_plan_tie_break_and_stop() {
    let config = DrsConfig::new("memory", 0.1, 1.).unwrap();
    let algorithm = Balanced::new();
    let baseline = packed_state();
    let plan = DrsPlanGenerator::new(&algorithm, &config).generate(&baseline, None).unwrap();
    assert_eq!(moves(&plan), vec![(1, 1, 2), (2, 1, 3)]);

    // baseline is not modified
    assert_eq!(baseline.get_workload(1).unwrap().host_id, 1);
    assert_eq!(baseline.get_host(1).unwrap().memory_used, 3072);
}

#[test]
// Iterations fraction limits the plan length, request value overrides the configured one.
fn test_plan_budget() {
    let config = DrsConfig::new("memory", 0.1, 0.34).unwrap();
    let algorithm = Balanced::new();
    let generator = DrsPlanGenerator::new(&algorithm, &config);
    assert_eq!(generator.generate(&packed_state(), None).unwrap().len(), 1);
    assert_eq!(generator.generate(&packed_state(), Some(1.)).unwrap().len(), 2);
    assert_eq!(
        generator.generate(&packed_state(), Some(0.)),
        Err(DrsError::Configuration(ConfigurationError::InvalidIterations(0.)))
    );
}

#[test]
// Non-migratable VMs are never moved.
fn test_plan_skips_pinned_workloads() {
    let mut state = ClusterState::new(1);
    state.add_host(host(1, 8192), usage(3, 3072));
    state.add_host(host(2, 8192), usage(0, 0));
    state.add_host(host(3, 8192), usage(0, 0));
    let mut pinned = vm(1, 1, 1024);
    pinned.migratable = false;
    state.add_workload(pinned);
    state.add_workload(vm(2, 1, 1024));
    state.add_workload(vm(3, 1, 1024));

    let config = DrsConfig::new("memory", 0.1, 1.).unwrap();
    let algorithm = Balanced::new();
    let plan = DrsPlanGenerator::new(&algorithm, &config).generate(&state, None).unwrap();
    assert_eq!(moves(&plan), vec![(2, 1, 2), (3, 1, 3)]);
}

#[test]
// No VM fits any other host, generation stops early with an empty plan instead of failing.
fn test_plan_without_capacity() {
    let mut state = ClusterState::new(1);
    state.add_host(host(1, 2048), usage(2, 2048));
    state.add_host(host(2, 2048), usage(1, 1536));
    state.add_workload(vm(1, 1, 1024));
    state.add_workload(vm(2, 1, 1024));
    state.add_workload(vm(3, 2, 1536));

    let config = DrsConfig::new("memory", 0.1, 1.).unwrap();
    let algorithm = Balanced::new();
    let plan = DrsPlanGenerator::new(&algorithm, &config).generate(&state, None).unwrap();
    assert!(plan.is_empty());
}

#[test]
// Condensed algorithm packs two VMs onto one host.
fn test_condensed_plan() {
    let mut state = ClusterState::new(1);
    state.add_host(host(1, 8192), usage(1, 1024));
    state.add_host(host(2, 8192), usage(1, 1024));
    state.add_workload(vm(1, 1, 1024));
    state.add_workload(vm(2, 2, 1024));

    let config = DrsConfig::new("memory", 0.5, 1.).unwrap().with_algorithm("condensed");
    let algorithm = drs_algorithm_resolver(&config.algorithm).unwrap();
    assert_eq!(algorithm.name(), "condensed");
    let plan = DrsPlanGenerator::new(algorithm.as_ref(), &config)
        .generate(&state, None)
        .unwrap();
    assert_eq!(moves(&plan), vec![(1, 1, 2)]);
    assert_approx(plan.migrations[0].improvement, 1.);

    assert!(!Condensed::new().needs_drs(&two_hosts_state(), &DrsConfig::new("memory", 0.5, 1.).unwrap()));
}

#[test]
// Same inputs produce the same migrations.
fn test_plan_is_deterministic() {
    let config = DrsConfig::new("either", 0.1, 1.).unwrap();
    let algorithm = Balanced::new();
    let generator = DrsPlanGenerator::new(&algorithm, &config);
    let first = generator.generate(&packed_state(), None).unwrap();
    let second = generator.generate(&packed_state(), None).unwrap();
    assert_eq!(first.migrations, second.migrations);
    assert_ne!(first.id, second.id);
}

#[test]
fn test_algorithm_resolver() {
    assert_eq!(drs_algorithm_resolver("balanced").unwrap().name(), "balanced");
    assert_eq!(drs_algorithm_resolver("Condensed").unwrap().name(), "condensed");
    assert!(matches!(
        drs_algorithm_resolver("greedy"),
        Err(ConfigurationError::UnknownAlgorithm(name)) if name == "greedy"
    ));
}

#[test]
// Cluster settings fall back to global settings and then to defaults.
fn test_config_from_file() {
    let store = DrsConfigStore::from_file(&name_wrapper("drs.yaml")).unwrap();
    assert_eq!(store.storage_allocators(), ["LocalStorage", "ClusterScope", "ZoneWide"]);

    let global = store.resolve(1).unwrap();
    assert_eq!(global.metric, DrsMetric::Memory);
    assert_eq!(global.threshold, 0.4);
    assert_eq!(global.iterations, 0.5);
    assert_eq!(global.algorithm, "balanced");

    let condensed = store.resolve(2).unwrap();
    assert_eq!(condensed.metric, DrsMetric::Either);
    assert_eq!(condensed.threshold, 0.4);
    assert_eq!(condensed.algorithm, "condensed");

    let strict = store.resolve(3).unwrap();
    assert_eq!(strict.metric, DrsMetric::Memory);
    assert_eq!(strict.threshold, 0.1);

    assert_eq!(DrsConfigStore::default().resolve(1).unwrap(), DrsConfig::default());
}

#[test]
// Invalid values are reported when the cluster config is resolved.
fn test_invalid_config_file() {
    let store = DrsConfigStore::from_yaml("metric: gpu\n", "inline").unwrap();
    assert_eq!(
        store.resolve(1),
        Err(ConfigurationError::UnknownMetric("gpu".to_string()))
    );
    let store = DrsConfigStore::from_yaml("threshold: 1.5\n", "inline").unwrap();
    assert_eq!(store.resolve(1), Err(ConfigurationError::InvalidThreshold(1.5)));
    assert!(matches!(
        DrsConfigStore::from_yaml("threshold: [1", "inline"),
        Err(ConfigurationError::Parse { .. })
    ));
    assert!(matches!(
        DrsConfigStore::from_file(&name_wrapper("missing.yaml")),
        Err(ConfigurationError::Read { .. })
    ));
}
