//! `ringwayd`, the Ringway daemon.
//!
//! One binary for both roles of a Ringway deployment, plus a few client
//! commands for poking at a running cluster.
//!
//! # Usage
//!
//! ```text
//! ringwayd node -l 127.0.0.1:50051 -d ./node1          # storage node
//! ringwayd node -l 127.0.0.1:50052 --memory            # in-memory node
//! ringwayd router 127.0.0.1:50051 127.0.0.1:50052      # router
//! ringwayd put --router 127.0.0.1:50050 user-42 age=42 country=ES
//! ringwayd get --router 127.0.0.1:50050 user-42 --group demographics
//! ringwayd locate user-42 -n 127.0.0.1:50051 -n 127.0.0.1:50052
//! ringwayd ping 127.0.0.1:50050
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ringway_net::{Backend, NodeClient, TcpConnector, serve};
use ringway_placement::HashRing;
use ringway_router::{MembershipEvent, Router};
use ringway_store::{FeatureStore, FjallStore, MemoryStore};
use ringway_types::{Feature, ReadRequest, WriteRequest};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use ringwayd::config::CliConfig;
use ringwayd::{NodeService, RouterService};

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ringwayd", version, about = "Consistent-hash request router")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cluster secret (routers and nodes must share it).
    ///
    /// Overrides `[cluster] secret` in the config file.
    #[arg(long, global = true, env = "RINGWAY_SECRET", hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a router in front of a set of storage nodes.
    Router {
        /// Override listen address (e.g. "127.0.0.1:50050").
        #[arg(short = 'l', long)]
        listen_addr: Option<String>,

        /// Storage node addresses. Replaces `[router] nodes` when given.
        nodes: Vec<String>,
    },

    /// Run a storage node.
    Node {
        /// Override listen address (e.g. "127.0.0.1:50051").
        #[arg(short = 'l', long)]
        listen_addr: Option<String>,

        /// Override data directory (useful for running multiple instances).
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Keep features in memory only.
        #[arg(short, long)]
        memory: bool,
    },

    /// Write feature fields for a routing key.
    Put {
        /// Router (or node) address.
        #[arg(long)]
        router: String,

        /// Routing key (entity id).
        key: String,

        /// Fields as `name=value`.
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Read feature fields for a routing key.
    Get {
        /// Router (or node) address.
        #[arg(long)]
        router: String,

        /// Routing key (entity id).
        key: String,

        /// Feature group label echoed in the response.
        #[arg(long, default_value = "")]
        group: String,
    },

    /// Print the node owning a routing key.
    Locate {
        /// Routing key to place.
        key: String,

        /// Node addresses. Defaults to `[router] nodes`.
        #[arg(short, long = "node")]
        nodes: Vec<String>,
    },

    /// Health-check a router or node.
    Ping {
        /// Address to ping.
        addr: String,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    if let Some(secret) = cli.secret {
        config.cluster.secret = secret;
    }

    match cli.command {
        Commands::Router { listen_addr, nodes } => {
            // CLI args override config file values.
            if let Some(addr) = listen_addr {
                config.router.listen_addr = addr;
            }
            if !nodes.is_empty() {
                config.router.nodes = nodes;
            }
            cmd_router(config).await
        }
        Commands::Node {
            listen_addr,
            data_dir,
            memory,
        } => {
            if let Some(addr) = listen_addr {
                config.node.listen_addr = addr;
            }
            if let Some(dir) = data_dir {
                config.node.data_dir = dir;
            }
            if memory {
                config.node.backend = "memory".to_string();
            }
            cmd_node(config).await
        }
        Commands::Put {
            router,
            key,
            fields,
        } => cmd_put(&config, &router, key, &fields).await,
        Commands::Get { router, key, group } => cmd_get(&config, &router, key, group).await,
        Commands::Locate { key, nodes } => {
            if !nodes.is_empty() {
                config.router.nodes = nodes;
            }
            cmd_locate(&config, &key)
        }
        Commands::Ping { addr } => cmd_ping(&config, &addr).await,
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("received ctrl-c");
}

// -----------------------------------------------------------------------
// ringwayd router
// -----------------------------------------------------------------------

async fn cmd_router(config: CliConfig) -> Result<()> {
    if config.router.nodes.is_empty() {
        bail!("no storage nodes configured (pass node addresses or set [router] nodes)");
    }

    info!(
        listen_addr = %config.router.listen_addr,
        nodes = config.router.nodes.len(),
        secured = config.cluster_secret().is_some(),
        "starting router"
    );

    let connector = TcpConnector::new(config.client_config());
    let router = Arc::new(
        Router::new(&config.router.nodes, Arc::new(connector))
            .context("failed to build router")?,
    );

    for (node, outcome) in router.ping_all().await {
        match outcome {
            Ok(()) => info!(%node, "node reachable"),
            Err(e) => warn!(%node, %e, "node not reachable yet"),
        }
    }

    tokio::spawn(log_membership(router.subscribe()));

    let listener = TcpListener::bind(&config.router.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.router.listen_addr))?;
    info!(addr = %config.router.listen_addr, "router ready");

    serve(
        listener,
        Arc::new(RouterService::new(router)),
        config.cluster_secret(),
        shutdown_signal(),
    )
    .await
    .context("router server failed")?;

    Ok(())
}

/// Log membership changes until the router goes away.
///
/// Returns how many events were logged.
async fn log_membership(mut events: broadcast::Receiver<MembershipEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(MembershipEvent::NodeAdded(node)) => info!(%node, "membership: node added"),
            Ok(MembershipEvent::NodeRemoved(node)) => info!(%node, "membership: node removed"),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "membership listener lagged, events dropped");
                continue;
            }
            Err(RecvError::Closed) => return logged,
        }
        logged += 1;
    }
}

// -----------------------------------------------------------------------
// ringwayd node
// -----------------------------------------------------------------------

async fn cmd_node(config: CliConfig) -> Result<()> {
    info!(
        listen_addr = %config.node.listen_addr,
        data_dir = %config.node.data_dir.display(),
        backend = %config.node.backend,
        "starting storage node"
    );

    let store: Arc<dyn FeatureStore> = match config.node.backend.as_str() {
        "memory" => {
            info!("using in-memory feature store");
            Arc::new(MemoryStore::new())
        }
        "file" => {
            std::fs::create_dir_all(&config.node.data_dir)
                .context("failed to create data directory")?;
            let path = config.node.data_dir.join("features");
            info!(path = %path.display(), "using on-disk feature store");
            Arc::new(FjallStore::open(&path).context("failed to open feature store")?)
        }
        other => bail!("unknown storage backend {other:?} (expected \"file\" or \"memory\")"),
    };

    let listener = TcpListener::bind(&config.node.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.node.listen_addr))?;
    info!(addr = %config.node.listen_addr, "storage node ready");

    serve(
        listener,
        Arc::new(NodeService::new(store)),
        config.cluster_secret(),
        shutdown_signal(),
    )
    .await
    .context("node server failed")?;

    Ok(())
}

// -----------------------------------------------------------------------
// Client commands
// -----------------------------------------------------------------------

async fn cmd_put(config: &CliConfig, addr: &str, key: String, fields: &[String]) -> Result<()> {
    let fields = fields
        .iter()
        .map(|f| parse_field(f))
        .collect::<Result<Vec<_>>>()?;
    let count = fields.len();

    let client = NodeClient::new(addr, config.client_config())?;
    client
        .put_features(&WriteRequest {
            routing_key: key.clone(),
            fields,
        })
        .await
        .with_context(|| format!("put {key} via {addr} failed"))?;

    println!("stored {count} field(s) for {key}");
    Ok(())
}

async fn cmd_get(config: &CliConfig, addr: &str, key: String, group: String) -> Result<()> {
    let client = NodeClient::new(addr, config.client_config())?;
    let response = client
        .get_features(&ReadRequest {
            routing_key: key.clone(),
            group_label: group,
        })
        .await
        .with_context(|| format!("get {key} via {addr} failed"))?;

    if response.fields.is_empty() {
        println!("no fields stored for {key}");
        return Ok(());
    }
    for (name, value) in &response.fields {
        println!("{name}={}", String::from_utf8_lossy(value));
    }
    Ok(())
}

fn cmd_locate(config: &CliConfig, key: &str) -> Result<()> {
    let mut ring = HashRing::new();
    for node in &config.router.nodes {
        ring.add_node(node);
    }

    match ring.resolve(key) {
        Some(node) => {
            println!("{key} -> {node} (position {:#018x})", ring.position(key));
            Ok(())
        }
        None => bail!("no nodes configured (pass -n or set [router] nodes)"),
    }
}

async fn cmd_ping(config: &CliConfig, addr: &str) -> Result<()> {
    let client = NodeClient::new(addr, config.client_config())?;
    let start = std::time::Instant::now();
    client
        .ping()
        .await
        .with_context(|| format!("ping {addr} failed"))?;
    println!("{addr}: pong in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

/// Parse `name=value` into a [`Feature`].
fn parse_field(s: &str) -> Result<Feature> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(Feature::new(name, value.as_bytes())),
        _ => bail!("invalid field {s:?} (expected name=value)"),
    }
}
