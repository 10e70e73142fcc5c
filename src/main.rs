use std::error::Error;
use std::time::Duration;

use clap::Parser;
use log::{info, warn, LevelFilter};
use tonic::transport::Server;

use chord::cli::Cli;
use chord::config::Config;
use chord::node::{Node, NodeInfo};
use chord::persistence::{self, JsonFileSnapshotStore, SnapshotStore};
use chord::rpc::chord_proto::chord_server::ChordServer;
use chord::rpc::chord_proto::FILE_DESCRIPTOR_SET;
use chord::rpc::ChordRpcService;
use chord::scheduler::StabilizationScheduler;

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().with_level(LevelFilter::Info).init()?;

    let cli = Cli::parse();
    let config = Config::load(cli)?;

    let info = NodeInfo::new(config.listen_address.clone());
    info!("starting node {} listening on {}", info, config.listen_address);

    let snapshot_backend: Option<Box<dyn SnapshotStore>> =
        config.snapshot_file.clone().map(|path| Box::new(JsonFileSnapshotStore::new(path)) as Box<dyn SnapshotStore>);

    let node = match &config.bootstrap_address {
        Some(bootstrap) => {
            info!("joining ring through {bootstrap}");
            Node::join(info, bootstrap.clone(), config.clone()).await?
        }
        None => {
            info!("no bootstrap address given, starting a new ring");
            Node::create(info, config.clone())
        }
    };

    if let Some(backend) = &snapshot_backend {
        persistence::restore(&node, backend.as_ref());
    }

    let scheduler_handle = StabilizationScheduler::spawn(node.clone(), config.stabilize_interval);

    let checkpoint_handle = snapshot_backend.map(|backend| {
        let node = node.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CHECKPOINT_INTERVAL);
            loop {
                ticker.tick().await;
                persistence::checkpoint(&node, backend.as_ref());
            }
        })
    });

    let listen_addr = config.listen_address.parse()?;
    let service = ChordRpcService::new(node.clone());
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build()?;

    info!("gRPC service listening on {}", config.listen_address);
    let serve_result = Server::builder()
        .add_service(ChordServer::new(service))
        .add_service(reflection_service)
        .serve(listen_addr)
        .await;

    scheduler_handle.abort();
    if let Some(handle) = checkpoint_handle {
        handle.abort();
    }

    if let Err(e) = serve_result {
        warn!("gRPC server exited with an error: {e}");
        return Err(e.into());
    }
    Ok(())
}
