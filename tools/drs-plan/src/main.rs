use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Builder;

use dslab_drs::core::common::ClusterId;
use dslab_drs::core::config::DrsConfigStore;
use dslab_drs::core::plan::write_plans_csv;
use dslab_drs::inventory::InMemoryInventory;
use dslab_drs::service::{ClusterDrsService, GenerateDrsPlanRequest, InMemoryPlanStore};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Generates DRS plans for clusters described in inventory file
struct Args {
    /// Path to YAML file with inventory (clusters, hosts, VMs, storage pools and volumes)
    #[arg(short, long)]
    inventory: PathBuf,

    /// Path to YAML file with DRS configuration (default - built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cluster to generate plan for, can be repeated (default - all clusters)
    #[arg(long = "cluster")]
    clusters: Vec<ClusterId>,

    /// Maximum number of migrations as a fraction of VM count, overrides configuration
    #[arg(long)]
    iterations: Option<f64>,

    /// Path to produced JSON file with plans (default - print to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to produced CSV file with plan steps
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Do not plan storage migration of VM volumes
    #[arg(long)]
    skip_storage: bool,

    /// Number of threads to use (default - use all available cores)
    #[arg(short, long, default_value_t = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))]
    threads: usize,
}

fn main() -> anyhow::Result<()> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    let args = Args::parse();

    let inventory = Arc::new(InMemoryInventory::from_file(&args.inventory.to_string_lossy())?);
    let configs = match &args.config {
        Some(path) => DrsConfigStore::from_file(&path.to_string_lossy())?,
        None => DrsConfigStore::default(),
    };

    let mut service = ClusterDrsService::new(inventory.clone(), configs, Arc::new(InMemoryPlanStore::new()));
    if !args.skip_storage {
        service = service.with_storage(inventory.clone(), inventory.clone())?;
    }
    let service = Arc::new(service);

    let clusters = if args.clusters.is_empty() {
        inventory.cluster_ids()
    } else {
        args.clusters.clone()
    };
    let requests = clusters
        .iter()
        .map(|&cluster_id| GenerateDrsPlanRequest {
            cluster_id,
            iterations: args.iterations,
            save_plan: true,
        })
        .collect();

    let mut plans = Vec::new();
    let mut failed = 0;
    for (cluster_id, result) in service.generate_drs_plans(requests, args.threads) {
        match result {
            Ok(plan) => plans.push(plan),
            Err(e) => {
                log::error!("cluster {}: {}", cluster_id, e);
                failed += 1;
            }
        }
    }

    let json = serde_json::to_string_pretty(&plans)?;
    match &args.output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("can't write {}", path.display()))?,
        None => println!("{}", json),
    }
    if let Some(path) = &args.csv {
        let file = std::fs::File::create(path).with_context(|| format!("can't create {}", path.display()))?;
        write_plans_csv(&plans, file)?;
    }

    log::info!(
        "generated {} plans with {} migrations",
        plans.len(),
        plans.iter().map(|p| p.len()).sum::<usize>()
    );
    if failed > 0 {
        bail!("failed to generate plans for {} of {} clusters", failed, clusters.len());
    }
    Ok(())
}
