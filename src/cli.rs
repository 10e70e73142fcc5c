//! Command-line surface, parsed with `clap`.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "chord", about = "A Chord DHT node")]
pub struct Cli {
    /// gRPC address this node listens on, e.g. 127.0.0.1:5601.
    #[arg(long)]
    pub listen: String,

    /// Address of an existing ring member to join through. Omit to start a new ring.
    #[arg(long)]
    pub bootstrap: Option<String>,

    /// Replication factor R (number of nodes holding each key, including the primary).
    /// Defaults to 3; unset here so a `--config` file's value doesn't get
    /// silently shadowed by a CLI default that was never explicitly chosen.
    #[arg(long)]
    pub replication: Option<usize>,

    /// Stabilization tick interval in milliseconds. Defaults to 1000; unset
    /// for the same reason as `replication` above.
    #[arg(long = "stabilize-interval-ms")]
    pub stabilize_interval_ms: Option<u64>,

    /// Optional `.ini` file with overrides for any of the above.
    #[arg(long)]
    pub config: Option<String>,

    /// Enables the debug introspection RPCs (`GetNodeSummary`, `GetKvStoreSize`, `GetKvStoreData`).
    #[arg(long = "dev-mode", default_value_t = false)]
    pub dev_mode: bool,

    /// Optional JSON snapshot file to load from at startup and checkpoint to periodically.
    #[arg(long = "snapshot-file")]
    pub snapshot_file: Option<String>,
}
