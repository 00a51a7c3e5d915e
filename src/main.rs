use anyhow::Context;
use clap::Parser;
use disk_register::cluster::node::{ClusterNode, Role};
use disk_register::command::server::CommandServer;
use disk_register::config::NodeConfig;
use disk_register::discovery::beacon::CoordinatorBeacon;
use disk_register::discovery::detect_local_ipv4;
use disk_register::discovery::service::{DiscoveryService, parse_coordinator_address};
use disk_register::membership::health::HealthMonitor;
use disk_register::membership::types::PeerId;
use disk_register::rpc;
use disk_register::rpc::client::PeerClient;
use disk_register::storage::disk::DiskStore;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let local_ip = match config.host {
        Some(ip) => ip,
        None => detect_local_ipv4().await,
    };
    tracing::info!("Local IP: {}", local_ip);

    // 1. Find the coordinator (or decide to be it):
    let coordinator = match &config.leader {
        Some(address) => Some(
            parse_coordinator_address(address, config.rpc_port)
                .with_context(|| format!("invalid --leader address '{}'", address))?,
        ),
        None => {
            tracing::info!("Searching the network for a coordinator...");
            DiscoveryService::new(local_ip, &config).discover().await
        }
    };

    let role = match &coordinator {
        None => {
            tracing::info!("No coordinator found - becoming coordinator");
            Role::Coordinator
        }
        Some(address) => {
            tracing::info!("Coordinator found: {}", address);
            Role::Follower
        }
    };

    // 2. RPC listener: the coordinator owns the base port, followers take the next free one.
    let listener = match role {
        Role::Coordinator => TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.rpc_port))
            .await
            .with_context(|| format!("failed to bind RPC port {}", config.rpc_port))?,
        Role::Follower => rpc::bind_first_free(config.rpc_port).await?,
    };
    let port = listener.local_addr()?.port();
    let local = PeerId::new(local_ip.to_string(), port);

    // 3. Node context:
    let store = DiskStore::open(config.mode, config.data_dir(&local.host, port))?;
    let node = ClusterNode::new(config.clone(), local, role, store, PeerClient::new()?);

    tracing::info!("Node: {}", node.local());
    tracing::info!("Role: {}", role.name());
    tracing::info!("I/O Mode: {}", node.store.mode().name());
    tracing::info!(
        "Tolerance: {} (data copied to {} nodes)",
        config.tolerance,
        config.tolerance + 1
    );
    tracing::info!("Data Directory: {}", node.store.data_dir().display());

    let rpc_server = rpc::spawn_server(listener, node.clone());

    // 4. Role-specific services:
    match coordinator {
        None => {
            let beacon = CoordinatorBeacon::bind(
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.discovery_port)),
                node.local().clone(),
            )
            .await?;
            tokio::spawn(beacon.run());

            let commands = CommandServer::bind(SocketAddr::from((
                Ipv4Addr::UNSPECIFIED,
                config.command_port,
            )))
            .await?;
            tokio::spawn(commands.run(node.clone()));

            node.spawn_size_refresher();
        }
        Some(coordinator) => {
            if let Err(e) = node.join_cluster(&coordinator).await {
                tracing::error!("Could not join coordinator {}: {:#}", coordinator, e);
            }
        }
    }

    // 5. Background monitors:
    HealthMonitor::new(node.registry.clone(), node.client.clone()).spawn();
    node.spawn_stats_reporter();

    tracing::info!("Press Ctrl+C to shutdown");
    rpc_server.await?;

    Ok(())
}
