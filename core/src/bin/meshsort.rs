//! `meshsort`: one node of a distributed sort.
//!
//! # Usage
//!
//! ```text
//! meshsort 0 input-0.dat output-0.dat cluster.yaml
//! meshsort 2 input-2.dat output-2.dat cluster.yaml --dial-max-attempts 240
//! RUST_LOG=meshsort_core=debug meshsort 1 in.dat out.dat cluster.json
//! ```
//!
//! Exits 0 only when the output file was fully written. Any other exit status
//! means the output must not be trusted.

use clap::Parser;
use meshsort_common::{
    ClusterTopology, Diagnose, NodeId, ReceivePolicy, Result, ShuffleConfig,
};
use meshsort_core::ShuffleNode;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "meshsort",
    version,
    about = "Sort this node's partition of a record set distributed across a cluster"
)]
struct Cli {
    /// This node's id: its position in the topology file.
    self_id: NodeId,

    /// Local input file of 100-byte records.
    input: PathBuf,

    /// Where to write this node's sorted partition.
    output: PathBuf,

    /// Cluster topology file (YAML, or JSON with a `.json` extension).
    topology: PathBuf,

    /// Delay between dial attempts to a peer that is not yet listening.
    #[arg(long, default_value_t = 250)]
    dial_retry_ms: u64,

    /// Give up on a peer after this many failed dials (default: retry forever).
    #[arg(long)]
    dial_max_attempts: Option<u32>,

    /// Accept every received record without re-checking its partition.
    #[arg(long)]
    trust_sender: bool,

    /// Records buffered per producer before appending to the shared sink.
    #[arg(long, default_value_t = 1024)]
    batch_size: usize,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn shuffle_config(&self) -> ShuffleConfig {
        let policy = if self.trust_sender {
            ReceivePolicy::Trust
        } else {
            ReceivePolicy::Validate
        };
        ShuffleConfig::default()
            .with_dial_retry_interval(Duration::from_millis(self.dial_retry_ms))
            .with_dial_max_attempts(self.dial_max_attempts)
            .with_receive_policy(policy)
            .with_sink_batch_size(self.batch_size)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: &Cli) -> Result<()> {
    let topology = ClusterTopology::load(&cli.topology, cli.self_id)?;
    info!(
        "Node {} of {} starting ({})",
        cli.self_id,
        topology.node_count(),
        topology.self_node().address()
    );

    let node = ShuffleNode::new(topology, cli.shuffle_config());
    let metrics = node.run(&cli.input, &cli.output).await?;
    info!(
        "Done: read {}, sent {}, received {}, wrote {} records",
        metrics.sender.records_read,
        metrics.sender.total_sent(),
        metrics.records_received(),
        metrics.records_written
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            let report = anyhow::Error::from(err);
            error!("meshsort failed: {:#}", report);
            eprintln!("meshsort: {:#}", report);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
