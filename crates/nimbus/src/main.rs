use clap::{Parser, Subcommand};
use nimbus_cluster::{ClusterState, ClusterStateConfig};
use nimbus_core::{Node, Pod};
use nimbus_scheduler::{PluginSet, Scheduler, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "nimbus", about = "Nimbus workload scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demonstration scenario: create nodes and pods, schedule them
    Demo {
        /// Number of nodes to create
        #[arg(long, default_value_t = 5)]
        nodes: usize,
        /// Number of pods to submit
        #[arg(long, default_value_t = 3)]
        pods: usize,
        /// Leave every node schedulable (by default the first is cordoned)
        #[arg(long)]
        no_cordon: bool,
        /// How long to let the engine run before reporting, in seconds
        #[arg(long, default_value_t = 4)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            nodes,
            pods,
            no_cordon,
            wait_secs,
        } => run_demo(nodes, pods, !no_cordon, wait_secs).await,
    }
}

/// Create a small cluster, run the engine over it, and print the bindings
async fn run_demo(
    node_count: usize,
    pod_count: usize,
    cordon_first: bool,
    wait_secs: u64,
) -> miette::Result<()> {
    info!("Starting nimbus demo: {} nodes, {} pods", node_count, pod_count);

    let cluster = Arc::new(ClusterState::new(ClusterStateConfig::default()));

    let scheduler = Arc::new(
        Scheduler::new(
            cluster.clone(),
            &PluginSet::default(),
            SchedulerConfig::default(),
        )
        .map_err(|e| miette::miette!("Failed to initialize scheduler: {}", e))?,
    );
    scheduler.start();

    for i in 0..node_count {
        let name = format!("node-{}", i);
        let unschedulable = cordon_first && i == 0;
        cluster
            .add_node(make_node(&name, unschedulable))
            .await
            .map_err(|e| miette::miette!("Failed to create node {}: {}", name, e))?;
    }

    for i in 0..pod_count {
        let name = format!("pod-{}", i);
        cluster
            .add_pod(make_pod(&name))
            .await
            .map_err(|e| miette::miette!("Failed to create pod {}: {}", name, e))?;
    }

    tokio::time::sleep(Duration::from_secs(wait_secs)).await;

    for pod in cluster.list_pods().await {
        let name = pod.metadata.name.as_deref().unwrap_or("unknown");
        match pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) {
            Some(node) => info!("Pod {} is bound to {}", name, node),
            None => info!("Pod {} is still pending", name),
        }
    }
    for status in scheduler.queue_statuses() {
        info!(
            "Queued: {} ({:?}, attempts {}, last failure: {})",
            status.name,
            status.partition,
            status.attempts,
            status.last_failure.as_deref().unwrap_or("none")
        );
    }

    scheduler.shutdown().await;
    info!("Demo finished");
    Ok(())
}

fn make_node(name: &str, unschedulable: bool) -> Node {
    let mut node = Node::default();
    node.metadata.name = Some(name.to_string());
    node.spec = Some(Default::default());
    node.spec.as_mut().unwrap().unschedulable = Some(unschedulable);
    node
}

fn make_pod(name: &str) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.name = Some(name.to_string());
    pod.spec = Some(Default::default());
    pod.spec.as_mut().unwrap().containers = vec![Default::default()];
    pod.spec.as_mut().unwrap().containers[0].name = "main".to_string();
    pod
}
