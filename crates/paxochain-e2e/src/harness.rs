//! In-process, loopback-networked cluster harness.
//!
//! Builds a full roster of [`ReplicaDriver`]s and [`ClientEngine`]s, each
//! bound to its own real `TcpListener` on `127.0.0.1`, and wires them
//! together exactly as `paxochain-node` does for `run_server`/`run_client`,
//! with the roster, send delay, and client wait time parameterized for test
//! speed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use paxochain_consensus::Replica;
use paxochain_core::{ClientEngine, ReplicaDriver};
use paxochain_network::Messenger;
use paxochain_primitives::{NodeKind, Roster};
use paxochain_storage::Blockchain;
use paxochain_types::{Envelope, Operation, ProcessId};
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::warn;

use crate::{E2EError, E2EResult};

/// Artificial per-send delay used by every harness cluster. Short enough
/// that a scenario's Prepare/Accept/Decide round trip takes milliseconds,
/// long enough to still exercise the same `tokio::spawn`-per-send path
/// `paxochain-node` uses in production.
const TEST_SEND_DELAY: Duration = Duration::from_millis(2);

/// Client re-hint timeout used by every harness cluster. Short, so a
/// leader-failure scenario doesn't spend real wall-clock time idling.
const TEST_WAIT_TIME: Duration = Duration::from_millis(120);

/// How long a harness will poll for a condition (a response, a depth, a
/// dictionary value) before giving up and reporting a timeout.
const POLL_BUDGET: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

// Monotonic offset so concurrently-running `#[tokio::test]`s in this binary
// never collide on a port range, even when started within the same
// microsecond.
static PORT_OFFSET: AtomicU32 = AtomicU32::new(0);

fn pick_port_base() -> u16 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let offset = PORT_OFFSET.fetch_add(1, Ordering::Relaxed);
    // Stay comfortably inside the ephemeral range and leave 1000 ports of
    // headroom per harness for the client roster's base.
    20000 + ((nanos ^ offset.wrapping_mul(2654435761)) % 20000) as u16
}

/// A running replica or client, plus whatever the harness needs to drive or
/// inspect it from outside.
struct ClientHandle {
    engine: Arc<ClientEngine>,
    responses: AsyncMutex<mpsc::UnboundedReceiver<(Operation, String)>>,
}

/// A full in-process PaxoChain cluster: `n_servers` replicas and
/// `n_clients` clients, connected over loopback TCP.
pub struct ClusterHarness {
    roster: Roster,
    _backing_dir: TempDir,
    replicas: Vec<Arc<ReplicaDriver>>,
    clients: Vec<ClientHandle>,
}

impl ClusterHarness {
    /// Start a cluster with `n_servers` replicas (must be odd, per the
    /// roster's quorum invariant) and `n_clients` clients, each backed by a
    /// real on-disk log in a scratch temp directory.
    pub async fn start(n_servers: u32, n_clients: u32) -> E2EResult<Self> {
        let server_base = pick_port_base();
        let client_base = pick_port_base();
        let roster = Roster::new(n_servers, n_clients, server_base, client_base)?;
        let backing_dir = tempfile::tempdir().map_err(|e| {
            E2EError::Storage(paxochain_storage::StorageError::Io(e))
        })?;

        let mut replicas = Vec::new();
        for pid in 0..n_servers {
            replicas.push(Self::spawn_replica(pid, &roster, backing_dir.path()).await?);
        }

        let mut clients = Vec::new();
        for pid in 0..n_clients {
            clients.push(Self::spawn_client(pid, &roster).await?);
        }

        Ok(ClusterHarness {
            roster,
            _backing_dir: backing_dir,
            replicas,
            clients,
        })
    }

    fn backup_path(dir: &std::path::Path, pid: u32) -> PathBuf {
        dir.join(format!("blockchain_backup_{pid}.txt"))
    }

    async fn spawn_replica(pid: u32, roster: &Roster, dir: &std::path::Path) -> E2EResult<Arc<ReplicaDriver>> {
        let self_id = ProcessId::new(NodeKind::Server, pid);
        let messenger = Messenger::with_send_delay(self_id, roster.clone(), "127.0.0.1", TEST_SEND_DELAY);
        let chain = Blockchain::open(Self::backup_path(dir, pid))?;
        let replica = Replica::new(pid, roster.clone(), chain);
        let driver = ReplicaDriver::new(replica, Arc::clone(&messenger));

        let handler_driver = Arc::clone(&driver);
        messenger
            .connect(move |envelope: Envelope| {
                let driver = Arc::clone(&handler_driver);
                async move {
                    if let Err(e) = driver.handle_envelope(envelope).await {
                        warn!("replica failed to handle envelope: {e}");
                    }
                }
            })
            .await?;
        Ok(driver)
    }

    async fn spawn_client(pid: u32, roster: &Roster) -> E2EResult<ClientHandle> {
        let self_id = ProcessId::new(NodeKind::Client, pid);
        let messenger = Messenger::with_send_delay(self_id, roster.clone(), "127.0.0.1", TEST_SEND_DELAY);
        let (engine, responses) =
            ClientEngine::new(pid, roster.n_servers(), Arc::clone(&messenger), TEST_WAIT_TIME);

        let handler_engine = Arc::clone(&engine);
        messenger
            .connect(move |envelope: Envelope| {
                let engine = Arc::clone(&handler_engine);
                async move {
                    engine.handle_envelope(envelope.sender.pid, envelope.body);
                }
            })
            .await?;
        Ok(ClientHandle { engine, responses: AsyncMutex::new(responses) })
    }

    /// Number of server replicas in this cluster.
    pub fn n_servers(&self) -> u32 {
        self.roster.n_servers()
    }

    /// Issue a PUT from `client` and block until its `ClientResponse`
    /// arrives, returning the acknowledgement string.
    pub async fn put(&self, client: u32, key: &str, value: &str) -> E2EResult<String> {
        self.request(client, Operation::put(key, value)).await
    }

    /// Issue a GET from `client` and block until its `ClientResponse`
    /// arrives, returning the looked-up value (or `"NO_KEY"`).
    pub async fn get(&self, client: u32, key: &str) -> E2EResult<String> {
        self.request(client, Operation::get(key)).await
    }

    async fn request(&self, client: u32, op: Operation) -> E2EResult<String> {
        let handle = &self.clients[client as usize];
        handle.engine.send_request(op);
        let mut rx = handle.responses.lock().await;
        match tokio::time::timeout(POLL_BUDGET, rx.recv()).await {
            Ok(Some((_, message))) => Ok(message),
            _ => Err(E2EError::TimedOut(format!("response to client {client}'s request"))),
        }
    }

    /// This replica's current log depth.
    pub fn depth(&self, pid: u32) -> u64 {
        self.replicas[pid as usize].depth()
    }

    /// This replica's dictionary projection for `key`.
    pub fn dict_get(&self, pid: u32, key: &str) -> String {
        self.replicas[pid as usize].get(key)
    }

    /// This replica's full chain, in depth order, for diagnostics and
    /// cross-replica safety comparisons.
    pub fn blocks(&self, pid: u32) -> Vec<paxochain_types::Block> {
        self.replicas[pid as usize].blocks()
    }

    /// The underlying client engine for `client`, for scenarios that need to
    /// observe engine-internal state (`in_flight_len`) directly, rather than
    /// only through the request/response helpers.
    pub fn client_engine(&self, client: u32) -> Arc<ClientEngine> {
        Arc::clone(&self.clients[client as usize].engine)
    }

    /// Block (polling) until replica `pid`'s log depth reaches at least
    /// `depth`, or the poll budget elapses.
    pub async fn wait_for_depth(&self, pid: u32, depth: u64) -> E2EResult<()> {
        let deadline = tokio::time::Instant::now() + POLL_BUDGET;
        while self.depth(pid) < depth {
            if tokio::time::Instant::now() >= deadline {
                return Err(E2EError::TimedOut(format!("replica {pid} reaching depth {depth}")));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    /// Cut `pid` off from its peers in both directions: `failProcess` run
    /// against a single server rather than the whole roster.
    pub fn isolate_server(&self, pid: u32) {
        for (other, driver) in self.replicas.iter().enumerate() {
            if other as u32 == pid {
                for peer in 0..self.n_servers() {
                    if peer != pid {
                        driver.messenger().fail_link(NodeKind::Server, peer);
                    }
                }
            } else {
                driver.messenger().fail_link(NodeKind::Server, pid);
            }
        }
    }

    /// Undo [`ClusterHarness::isolate_server`].
    pub fn restore_server(&self, pid: u32) {
        for (other, driver) in self.replicas.iter().enumerate() {
            if other as u32 == pid {
                for peer in 0..self.n_servers() {
                    if peer != pid {
                        driver.messenger().fix_link(NodeKind::Server, peer);
                    }
                }
            } else {
                driver.messenger().fix_link(NodeKind::Server, pid);
            }
        }
    }

    /// `pid` can still send, but nobody will process what it sends; its own
    /// incoming-link filter is untouched. Used for the leader-re-hint
    /// scenario, where only the receiving side ignores the failed leader.
    pub fn deafen_server(&self, pid: u32) {
        for (other, driver) in self.replicas.iter().enumerate() {
            if other as u32 != pid {
                driver.messenger().fail_link(NodeKind::Server, pid);
            }
        }
    }
}
