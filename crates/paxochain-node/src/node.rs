//! Process orchestration: wires a [`Messenger`] to either a [`ReplicaDriver`]
//! or a [`ClientEngine`] and runs the interactive stdin REPL described by
//! the roster's command surface.

use std::collections::HashMap;
use std::sync::Arc;

use paxochain_consensus::Replica;
use paxochain_core::{ClientEngine, ReplicaDriver};
use paxochain_network::Messenger;
use paxochain_primitives::NodeKind;
use paxochain_storage::Blockchain;
use paxochain_types::{Envelope, Message, OpType, Operation, ProcessId};
use rand::Rng;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::config::NodeConfig;

/// Errors raised orchestrating a running process.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Storage (backup file) error.
    #[error("storage error: {0}")]
    Storage(#[from] paxochain_storage::StorageError),
    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] paxochain_network::NetworkError),
    /// Core orchestration error.
    #[error("core error: {0}")]
    Core(#[from] paxochain_core::CoreError),
    /// IO error reading stdin.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Runs a single server replica: opens its backup file, connects the
/// messenger, and drives the stdin REPL until `q`.
pub async fn run_server(config: NodeConfig) -> NodeResult<()> {
    let self_id = ProcessId::new(NodeKind::Server, config.pid);
    let messenger = Messenger::with_send_delay(self_id, config.roster.clone(), config.host.clone(), config.send_delay);
    let chain = Blockchain::open(config.backup_path())?;
    info!(pid = config.pid, depth = chain.depth(), "restored blockchain backup");
    let replica = Replica::new(config.pid, config.roster.clone(), chain);
    let driver = ReplicaDriver::new(replica, Arc::clone(&messenger));

    let handler_driver = Arc::clone(&driver);
    messenger
        .connect(move |envelope: Envelope| {
            let driver = Arc::clone(&handler_driver);
            async move {
                if let Err(e) = driver.handle_envelope(envelope).await {
                    warn!("failed to handle envelope: {e}");
                }
            }
        })
        .await?;

    info!(pid = config.pid, "server listening, awaiting commands");
    server_repl(driver).await
}

/// Runs a single client: connects the messenger, spawns the response
/// printer, and drives the stdin REPL until `q`.
pub async fn run_client(config: NodeConfig) -> NodeResult<()> {
    let self_id = ProcessId::new(NodeKind::Client, config.pid);
    let messenger = Messenger::with_send_delay(self_id, config.roster.clone(), config.host.clone(), config.send_delay);
    let (engine, mut responses) =
        ClientEngine::new(config.pid, config.roster.n_servers(), Arc::clone(&messenger), config.wait_time);

    let handler_engine = Arc::clone(&engine);
    messenger
        .connect(move |envelope: Envelope| {
            let engine = Arc::clone(&handler_engine);
            async move {
                engine.handle_envelope(envelope.sender.pid, envelope.body);
            }
        })
        .await?;

    tokio::spawn(async move {
        while let Some((operation, message)) = responses.recv().await {
            println!("response to {operation:?}: {message}");
        }
    });

    info!(pid = config.pid, "client listening, awaiting commands");
    client_repl(engine).await
}

async fn server_repl(driver: Arc<ReplicaDriver>) -> NodeResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["connect"] | ["c"] => info!("already connected"),
            ["q"] => {
                info!("shutting down");
                driver.shutdown().await;
                std::process::exit(1);
            }
            ["broadcast", target] => broadcast(driver.messenger(), target, "broadcast from server".into()).await,
            ["unicast", "s", pid] | ["unicast", "server", pid] => {
                unicast(driver.messenger(), NodeKind::Server, pid, "unicast".into()).await
            }
            ["unicast", "c", pid] | ["unicast", "client", pid] => {
                unicast(driver.messenger(), NodeKind::Client, pid, "unicast".into()).await
            }
            ["failLink", kind, pid] => fail_link(driver.messenger(), kind, pid, true),
            ["fixLink", kind, pid] => fail_link(driver.messenger(), kind, pid, false),
            ["failProcess"] => fail_process(driver.messenger()),
            ["fixProcess"] => fix_process(driver.messenger()),
            ["printBlockchain"] | ["pb"] => print_blockchain(&driver),
            ["printKVStore"] | ["pk"] => print_kv_store(&driver),
            ["printQueue"] | ["pq"] => info!(len = driver.queue_len(), "request queue"),
            [] => {}
            other => warn!(?other, "unrecognized command"),
        }
    }
    Ok(())
}

async fn client_repl(engine: Arc<ClientEngine>) -> NodeResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["connect"] | ["c"] => info!("already connected"),
            ["random"] => engine.send_request(random_operation()),
            ["q"] => {
                info!("shutting down");
                engine.shutdown().await;
                std::process::exit(1);
            }
            ["broadcast", target] => broadcast(engine.messenger(), target, "broadcast from client".into()).await,
            ["unicast", "s", pid] | ["unicast", "server", pid] => {
                unicast(engine.messenger(), NodeKind::Server, pid, "unicast".into()).await
            }
            ["op", "get", key] => engine.send_request(Operation::get(key)),
            ["op", "put", key, value] => engine.send_request(Operation::put(key, value)),
            ["failLink", kind, pid] => fail_link(engine.messenger(), kind, pid, true),
            ["fixLink", kind, pid] => fail_link(engine.messenger(), kind, pid, false),
            ["failProcess"] => fail_process(engine.messenger()),
            ["fixProcess"] => fix_process(engine.messenger()),
            [] => {}
            other => warn!(?other, "unrecognized command"),
        }
    }
    Ok(())
}

fn random_operation() -> Operation {
    let mut rng = rand::thread_rng();
    let key = format!("key{}", rng.gen_range(0..10));
    if rng.gen_bool(0.5) {
        Operation::get(&key)
    } else {
        Operation::put(&key, "value")
    }
}

async fn broadcast(messenger: &Arc<Messenger>, target: &str, text: String) {
    match target {
        "s" => messenger.broadcast_servers(Message::Test { message: text }).await,
        "c" => messenger.broadcast_clients(Message::Test { message: text }).await,
        "a" => messenger.broadcast_all(Message::Test { message: text }).await,
        other => warn!(target = other, "unknown broadcast target, expected s|c|a"),
    }
}

async fn unicast(messenger: &Arc<Messenger>, kind: NodeKind, pid: &str, text: String) {
    let pid: u32 = match pid.parse() {
        Ok(p) => p,
        Err(_) => {
            warn!(pid, "invalid pid");
            return;
        }
    };
    let result = match kind {
        NodeKind::Server => messenger.send_server(pid, Message::Test { message: text }).await,
        NodeKind::Client => messenger.send_client(pid, Message::Test { message: text }).await,
    };
    if let Err(e) = result {
        warn!("unicast failed: {e}");
    }
}

fn fail_link(messenger: &Arc<Messenger>, kind: &str, pid: &str, fail: bool) {
    let pid: u32 = match pid.parse() {
        Ok(p) => p,
        Err(_) => {
            warn!(pid, "invalid pid");
            return;
        }
    };
    let kind = match kind {
        "s" | "server" => NodeKind::Server,
        "c" | "client" => NodeKind::Client,
        other => {
            warn!(kind = other, "unknown link kind, expected s|c");
            return;
        }
    };
    if fail {
        messenger.fail_link(kind, pid);
    } else {
        messenger.fix_link(kind, pid);
    }
}

/// Simulates the whole process going dark: marks every peer's link, in
/// both directions, as failed. `fixProcess` reverses it.
fn fail_process(messenger: &Arc<Messenger>) {
    let roster = messenger.roster();
    for pid in 0..roster.n_servers() {
        messenger.fail_link(NodeKind::Server, pid);
    }
    for pid in 0..roster.n_clients() {
        messenger.fail_link(NodeKind::Client, pid);
    }
    error!("process simulated as failed: all links marked failed");
}

fn fix_process(messenger: &Arc<Messenger>) {
    let roster = messenger.roster();
    for pid in 0..roster.n_servers() {
        messenger.fix_link(NodeKind::Server, pid);
    }
    for pid in 0..roster.n_clients() {
        messenger.fix_link(NodeKind::Client, pid);
    }
    info!("process recovered: all links restored");
}

fn print_blockchain(driver: &Arc<ReplicaDriver>) {
    for (depth, block) in driver.blocks().into_iter().enumerate() {
        println!("[{depth}] {block:?}");
    }
}

fn print_kv_store(driver: &Arc<ReplicaDriver>) {
    let mut store: HashMap<String, String> = HashMap::new();
    for block in driver.blocks() {
        if block.operation.op == OpType::Put {
            if let Some(value) = block.operation.value {
                store.insert(block.operation.key, value);
            }
        }
    }
    for (key, value) in store {
        println!("{key} = {value}");
    }
}
