use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use dslab_drs::core::common::{ClusterId, HostId, PoolId, VmId};
use dslab_drs::core::config::DrsConfigStore;
use dslab_drs::core::model::{
    DiskOffering, Host, HostUtilization, ServiceOffering, StoragePool, StorageScope, Volume, VolumeType, Workload,
};
use dslab_drs::core::plan::ClusterDrsPlan;
use dslab_drs::core::provider::ResourceSnapshotProvider;
use dslab_drs::error::{ConfigurationError, DrsError};
use dslab_drs::inventory::InMemoryInventory;
use dslab_drs::service::{ClusterDrsService, GenerateDrsPlanRequest, InMemoryPlanStore};
use dslab_drs::storage::repository::{PoolRepository, VolumeRepository};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn load_inventory() -> Arc<InMemoryInventory> {
    Arc::new(InMemoryInventory::from_file(&name_wrapper("inventory.yaml")).unwrap())
}

fn load_configs() -> DrsConfigStore {
    DrsConfigStore::from_file(&name_wrapper("drs.yaml")).unwrap()
}

fn service_with_storage() -> ClusterDrsService {
    let inventory = load_inventory();
    ClusterDrsService::new(inventory.clone(), load_configs(), Arc::new(InMemoryPlanStore::new()))
        .with_storage(inventory.clone(), inventory)
        .unwrap()
}

fn full_request(cluster_id: ClusterId) -> GenerateDrsPlanRequest {
    GenerateDrsPlanRequest {
        cluster_id,
        iterations: Some(1.),
        save_plan: true,
    }
}

fn moves(plan: &ClusterDrsPlan) -> Vec<(VmId, HostId, HostId)> {
    plan.migrations
        .iter()
        .map(|m| (m.vm_id, m.source_host, m.destination_host))
        .collect()
}

/// Blocks the first request for cluster 1 until released.
struct BlockingProvider {
    inner: Arc<InMemoryInventory>,
    blocked: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl ResourceSnapshotProvider for BlockingProvider {
    fn cluster_hosts(&self, cluster_id: ClusterId) -> Result<Vec<Host>, DrsError> {
        if cluster_id == 1 && !self.blocked.swap(true, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.inner.cluster_hosts(cluster_id)
    }

    fn host_utilization(&self, host_id: HostId) -> Result<HostUtilization, DrsError> {
        self.inner.host_utilization(host_id)
    }

    fn workloads_on_host(&self, host_id: HostId) -> Result<Vec<Workload>, DrsError> {
        self.inner.workloads_on_host(host_id)
    }
}

/// Fails to report utilization of any host.
struct FailingProvider {
    inner: Arc<InMemoryInventory>,
}

impl ResourceSnapshotProvider for FailingProvider {
    fn cluster_hosts(&self, cluster_id: ClusterId) -> Result<Vec<Host>, DrsError> {
        self.inner.cluster_hosts(cluster_id)
    }

    fn host_utilization(&self, host_id: HostId) -> Result<HostUtilization, DrsError> {
        let host = self.inner.host(host_id).ok_or(DrsError::HostNotFound(host_id))?;
        Err(DrsError::Fetch {
            cluster_id: host.cluster_id,
            resource: format!("utilization of host {}", host_id),
            message: "capacity service is unavailable".to_string(),
        })
    }

    fn workloads_on_host(&self, host_id: HostId) -> Result<Vec<Workload>, DrsError> {
        self.inner.workloads_on_host(host_id)
    }
}

/// Fails to read either pools or volumes.
struct FailingRepository {
    inner: Arc<InMemoryInventory>,
    fail_pools: bool,
    fail_volumes: bool,
}

impl FailingRepository {
    fn fetch_error(&self, cluster_id: ClusterId, resource: String) -> DrsError {
        DrsError::Fetch {
            cluster_id,
            resource,
            message: "storage service is unavailable".to_string(),
        }
    }
}

impl PoolRepository for FailingRepository {
    fn find_by_id(&self, pool_id: PoolId) -> Result<Option<StoragePool>, DrsError> {
        let pool = self.inner.find_by_id(pool_id)?;
        if self.fail_pools {
            let cluster_id = pool.and_then(|p| p.cluster_id).unwrap_or_default();
            return Err(self.fetch_error(cluster_id, format!("pool {}", pool_id)));
        }
        Ok(pool)
    }

    fn hosts_connected_to(&self, pool_id: PoolId) -> Result<BTreeSet<HostId>, DrsError> {
        self.inner.hosts_connected_to(pool_id)
    }

    fn list_pools(&self) -> Result<Vec<StoragePool>, DrsError> {
        self.inner.list_pools()
    }
}

impl VolumeRepository for FailingRepository {
    fn usable_volumes_for_instance(&self, vm_id: VmId) -> Result<Vec<Volume>, DrsError> {
        if self.fail_volumes {
            let host_id = self.inner.workload(vm_id).map(|w| w.host_id).unwrap_or_default();
            let cluster_id = self.inner.host(host_id).map(|h| h.cluster_id).unwrap_or_default();
            return Err(self.fetch_error(cluster_id, format!("volumes of vm {}", vm_id)));
        }
        self.inner.usable_volumes_for_instance(vm_id)
    }
}

// Hosts 1 and 2 with 8 GB of memory, four 1 GB VMs on host 1. Every VM has a 1 KB root volume on the local pool
// of host 1, the local pool of host 2 fits only one of them.
fn small_local_pool_inventory() -> InMemoryInventory {
    let mut inventory = InMemoryInventory::new();
    for (id, memory_used, cpu_used) in [(1, 4096, 4000), (2, 0, 0)] {
        let host = Host {
            id,
            name: format!("h{}", id),
            cluster_id: 1,
            zone_id: 1,
            cpu_total: 16000,
            memory_total: 8192,
        };
        let utilization = HostUtilization {
            cpu_used,
            memory_used,
            ..Default::default()
        };
        inventory.add_host(host, utilization);
    }
    for (id, host_id, capacity) in [(30, 1, 1 << 20), (31, 2, 1500)] {
        inventory.add_pool(StoragePool {
            id,
            name: format!("local-h{}", host_id),
            scope: StorageScope::Host,
            zone_id: 1,
            cluster_id: Some(1),
            host_id: Some(host_id),
            managed: false,
            tags: Vec::new(),
            capacity,
            used: 0,
            status: Default::default(),
        });
    }
    for vm_id in 1..=4 {
        inventory
            .add_workload(Workload::new(vm_id, &format!("vm{}", vm_id), 1, ServiceOffering::new(1, 1000, 1024)))
            .add_volume(Volume {
                id: 100 + vm_id,
                name: format!("root-vm{}", vm_id),
                vm_id,
                volume_type: VolumeType::Root,
                pool_id: 30,
                size: 1024,
                disk_offering: DiskOffering::default(),
            });
    }
    inventory
}

#[test]
fn test_inventory_from_file() {
    let inventory = load_inventory();
    assert_eq!(inventory.cluster_ids(), vec![1, 2]);
    assert_eq!(inventory.cluster_hosts(1).unwrap().len(), 3);
    assert_eq!(inventory.workloads_on_host(1).unwrap().len(), 3);
    assert_eq!(inventory.host_utilization(1).unwrap().memory_used, 3072);
    assert_eq!(inventory.host_utilization(2).unwrap().memory_used, 0);
    assert_eq!(inventory.host_utilization(77), Err(DrsError::HostNotFound(77)));
    assert_eq!(inventory.cluster_hosts(9), Err(DrsError::ClusterNotFound(9)));
}

#[test]
// Three VMs on host 1 are spread over hosts 1-3. VM 1 moves with its local root volume to the local pool of host 2.
// VM 2 also has local storage, which host 3 lacks, so VM 3 with shared volumes is moved to host 3 instead.
fn test_generate_plan_with_storage() {
    init_logger();
    let service = service_with_storage();
    let plan = service.generate_drs_plan(&full_request(1)).unwrap();

    assert_eq!(moves(&plan), vec![(1, 1, 2), (3, 1, 3)]);
    assert_eq!(plan.migrations[0].storage_mapping.iter().collect::<Vec<_>>(), vec![(101, 31)]);
    assert!(plan.migrations[1].storage_mapping.is_empty());
    assert!(plan.id.is_some());
    assert_eq!(service.list_drs_plans(1), vec![plan]);
    assert!(service.list_drs_plans(2).is_empty());
}

#[test]
// Without storage planner the first of equally good candidates is taken.
fn test_generate_plan_without_storage() {
    let service = ClusterDrsService::new(load_inventory(), load_configs(), Arc::new(InMemoryPlanStore::new()));
    let plan = service.generate_drs_plan(&full_request(1)).unwrap();
    assert_eq!(moves(&plan), vec![(1, 1, 2), (2, 1, 3)]);
    assert!(plan.migrations.iter().all(|m| m.storage_mapping.is_empty()));
}

#[test]
// Plan which is not saved has no ID but keeps its migrations, the configured fraction allows one migration.
fn test_plan_without_saving() {
    let service = service_with_storage();
    let request = GenerateDrsPlanRequest {
        save_plan: false,
        ..GenerateDrsPlanRequest::new(1)
    };
    let plan = service.generate_drs_plan(&request).unwrap();
    assert_eq!(plan.id, None);
    assert_eq!(moves(&plan), vec![(1, 1, 2)]);
    assert!(service.list_drs_plans(1).is_empty());
}

#[test]
// Cluster 2 is configured to use the condensed algorithm.
fn test_condensed_cluster() {
    let service = service_with_storage();
    let plan = service.generate_drs_plan(&GenerateDrsPlanRequest::new(2)).unwrap();
    assert_eq!(plan.algorithm, "condensed");
    assert_eq!(moves(&plan), vec![(4, 4, 5)]);
    assert!((plan.migrations[0].improvement - (2. * 8192. - 1024.)).abs() < 0.01);
}

#[test]
fn test_errors() {
    let service = service_with_storage();
    assert_eq!(
        service.generate_drs_plan(&GenerateDrsPlanRequest::new(99)),
        Err(DrsError::ClusterNotFound(99))
    );
    assert_eq!(
        service.generate_drs_plan(&GenerateDrsPlanRequest {
            iterations: Some(2.),
            ..GenerateDrsPlanRequest::new(1)
        }),
        Err(DrsError::Configuration(ConfigurationError::InvalidIterations(2.)))
    );

    let configs = DrsConfigStore::from_yaml("algorithm: greedy\n", "inline").unwrap();
    let service = ClusterDrsService::new(load_inventory(), configs, Arc::new(InMemoryPlanStore::new()));
    assert_eq!(
        service.generate_drs_plan(&GenerateDrsPlanRequest::new(1)),
        Err(DrsError::Configuration(ConfigurationError::UnknownAlgorithm("greedy".to_string())))
    );

    let mut configs = load_configs();
    configs.set_storage_allocators(vec!["FirstFit".to_string()]);
    let inventory = load_inventory();
    let result = ClusterDrsService::new(inventory.clone(), configs, Arc::new(InMemoryPlanStore::new()))
        .with_storage(inventory.clone(), inventory);
    assert!(matches!(result, Err(ConfigurationError::UnknownAllocator(_))));
}

#[test]
// Fetch failure aborts plan generation.
fn test_fetch_error() {
    let provider = Arc::new(FailingProvider {
        inner: load_inventory(),
    });
    let service = ClusterDrsService::new(provider, load_configs(), Arc::new(InMemoryPlanStore::new()));
    assert!(matches!(
        service.generate_drs_plan(&GenerateDrsPlanRequest::new(1)),
        Err(DrsError::Fetch { cluster_id: 1, .. })
    ));
    assert!(service.list_drs_plans(1).is_empty());
}

#[test]
// Storage read failure aborts plan generation, no plan is saved.
fn test_storage_fetch_error() {
    for (fail_pools, fail_volumes) in [(true, false), (false, true)] {
        let inventory = load_inventory();
        let repository = Arc::new(FailingRepository {
            inner: inventory.clone(),
            fail_pools,
            fail_volumes,
        });
        let service = ClusterDrsService::new(inventory, load_configs(), Arc::new(InMemoryPlanStore::new()))
            .with_storage(repository.clone(), repository)
            .unwrap();
        assert!(matches!(
            service.generate_drs_plan(&full_request(1)),
            Err(DrsError::Fetch { cluster_id: 1, .. })
        ));
        assert!(service.list_drs_plans(1).is_empty());
    }
}

#[test]
// Local pool of host 2 is filled by the first migration, so the other VMs can't follow it there.
fn test_planned_migrations_share_pool_capacity() {
    init_logger();
    let inventory = Arc::new(small_local_pool_inventory());
    let configs = DrsConfigStore::from_yaml("metric: memory\nthreshold: 0.1\n", "inline").unwrap();
    let service = ClusterDrsService::new(inventory.clone(), configs, Arc::new(InMemoryPlanStore::new()))
        .with_storage(inventory.clone(), inventory)
        .unwrap();
    let plan = service.generate_drs_plan(&full_request(1)).unwrap();

    assert_eq!(moves(&plan), vec![(1, 1, 2)]);
    assert_eq!(plan.migrations[0].storage_mapping.iter().collect::<Vec<_>>(), vec![(101, 31)]);
}

#[test]
// Second request for a cluster is rejected while the first one is processed, other clusters are not affected.
fn test_concurrent_requests() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let provider = Arc::new(BlockingProvider {
        inner: load_inventory(),
        blocked: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let service = Arc::new(ClusterDrsService::new(
        provider,
        load_configs(),
        Arc::new(InMemoryPlanStore::new()),
    ));

    let handle = {
        let service = service.clone();
        thread::spawn(move || service.generate_drs_plan(&GenerateDrsPlanRequest::new(1)))
    };
    entered_rx.recv().unwrap();

    assert_eq!(
        service.generate_drs_plan(&GenerateDrsPlanRequest::new(1)),
        Err(DrsError::GenerationInProgress(1))
    );
    assert!(service.generate_drs_plan(&GenerateDrsPlanRequest::new(2)).is_ok());

    release_tx.send(()).unwrap();
    assert!(handle.join().unwrap().is_ok());
    assert!(service.generate_drs_plan(&GenerateDrsPlanRequest::new(1)).is_ok());
    assert_eq!(service.list_drs_plans(1).len(), 2);
}

#[test]
// Batch results follow the order of requests, failed requests do not affect others.
fn test_batch_generation() {
    let service = Arc::new(service_with_storage());
    let results = service.generate_drs_plans(vec![full_request(1), full_request(2), full_request(99)], 2);

    assert_eq!(results.len(), 3);
    assert_eq!(
        results.iter().map(|(cluster_id, _)| *cluster_id).collect::<Vec<_>>(),
        vec![1, 2, 99]
    );
    assert_eq!(moves(results[0].1.as_ref().unwrap()), vec![(1, 1, 2), (3, 1, 3)]);
    assert_eq!(moves(results[1].1.as_ref().unwrap()), vec![(4, 4, 5)]);
    assert_eq!(results[2].1, Err(DrsError::ClusterNotFound(99)));
}

#[test]
fn test_plan_export() {
    let service = service_with_storage();
    let plan = service.generate_drs_plan(&full_request(1)).unwrap();

    let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
    assert_eq!(json["cluster_id"], 1);
    assert_eq!(json["algorithm"], "balanced");
    assert_eq!(json["migrations"].as_array().unwrap().len(), 2);
    assert_eq!(json["migrations"][0]["storage_mapping"]["101"], 31);

    let mut buffer = Vec::new();
    plan.write_csv(&mut buffer).unwrap();
    let csv = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("plan_id,cluster_id,step,vm_id,source_host,destination_host"));
    assert!(lines[1].starts_with(&format!("{},1,1,1,1,2,", plan.id.unwrap())));
    assert!(lines[2].ends_with(",0"));
}
