//! The Messenger: a per-peer outbound-stream abstraction over the fixed
//! server/client roster, with injectable failed-link filters and an
//! artificial per-send delay.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use paxochain_primitives::{NodeKind, Roster};
use paxochain_types::{Envelope, Message, ProcessId};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::peer::{read_envelope, write_envelope};

/// Default artificial per-send delay, simulating ~2 seconds of network
/// latency.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(2);

struct Slot {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Peer registry, link-failure simulation, and per-message dispatch for one
/// process (server or client) in the fixed roster.
pub struct Messenger {
    self_id: ProcessId,
    roster: Roster,
    host: String,
    send_delay: Duration,
    servers: Mutex<HashMap<u32, Slot>>,
    clients: Mutex<HashMap<u32, Slot>>,
    failed_servers: Mutex<HashSet<u32>>,
    failed_clients: Mutex<HashSet<u32>>,
}

impl Messenger {
    /// Build a messenger for `self_id`, addressing peers at `host` using
    /// the ports in `roster`.
    pub fn new(self_id: ProcessId, roster: Roster, host: impl Into<String>) -> Arc<Self> {
        Self::with_send_delay(self_id, roster, host, DEFAULT_SEND_DELAY)
    }

    /// Build a messenger with a non-default artificial send delay, primarily
    /// for tests, which need this far shorter than production's ~2s so a
    /// multi-replica scenario doesn't take minutes to run.
    pub fn with_send_delay(
        self_id: ProcessId,
        roster: Roster,
        host: impl Into<String>,
        send_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Messenger {
            self_id,
            roster,
            host: host.into(),
            send_delay,
            servers: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            failed_servers: Mutex::new(HashSet::new()),
            failed_clients: Mutex::new(HashSet::new()),
        })
    }

    /// This process's own pid/kind.
    pub fn self_id(&self) -> ProcessId {
        self.self_id
    }

    /// The roster this messenger was built against.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    fn port_for(&self, kind: NodeKind, pid: u32) -> u16 {
        match kind {
            NodeKind::Server => self.roster.server_port(pid),
            NodeKind::Client => self.roster.client_port(pid),
        }
    }

    fn addr_for(&self, kind: NodeKind, pid: u32) -> SocketAddr {
        format!("{}:{}", self.host, self.port_for(kind, pid))
            .parse()
            .expect("host:port must parse as a socket address")
    }

    /// The address this process itself should listen on.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr_for(self.self_id.kind, self.self_id.pid)
    }

    /// Bind the listener and dial every other peer in the roster.
    ///
    /// Unreachable peers are logged and left with no outbound slot; a slot
    /// is dialed lazily on the first send to that peer instead.
    pub async fn connect<F, Fut>(self: &Arc<Self>, handler: F) -> NetworkResult<()>
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.local_addr()).await?;
        info!(addr = %self.local_addr(), "messenger listening");
        self.spawn_accept_loop(listener, Arc::new(handler));

        for pid in 0..self.roster.n_servers() {
            if self.self_id.kind == NodeKind::Server && pid == self.self_id.pid {
                continue;
            }
            self.dial(NodeKind::Server, pid).await.ok();
        }
        for pid in 0..self.roster.n_clients() {
            if self.self_id.kind == NodeKind::Client && pid == self.self_id.pid {
                continue;
            }
            self.dial(NodeKind::Client, pid).await.ok();
        }
        Ok(())
    }

    fn spawn_accept_loop<F, Fut>(self: &Arc<Self>, listener: TcpListener, handler: Arc<F>)
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(%addr, "inbound connection accepted");
                        this.spawn_reader(stream, Arc::clone(&handler));
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                    }
                }
            }
        });
    }

    fn spawn_reader<F, Fut>(self: &Arc<Self>, mut stream: TcpStream, handler: Arc<F>)
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match read_envelope(&mut stream).await {
                    Ok(Some(envelope)) => this.on_envelope(envelope, &handler).await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("decode failure, dropping message: {e}");
                        break;
                    }
                }
            }
        });
    }

    async fn on_envelope<F, Fut>(self: &Arc<Self>, envelope: Envelope, handler: &Arc<F>)
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let sender = envelope.sender;
        if self.is_failed(sender.kind, sender.pid) {
            debug!(?sender, "dropping message from failed link");
            return;
        }
        // A not-yet-connected peer gets an outbound slot dialed back on
        // first contact; an already-connected peer whose slot went stale
        // is left to redial lazily on the next send.
        if !self.has_outbound(sender.kind, sender.pid) {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                this.dial(sender.kind, sender.pid).await.ok();
            });
        }
        if matches!(envelope.body, Message::Quit) {
            self.close_outbound(sender.kind, sender.pid);
        }
        let handler = Arc::clone(handler);
        tokio::spawn(async move {
            handler(envelope).await;
        });
    }

    fn has_outbound(&self, kind: NodeKind, pid: u32) -> bool {
        match kind {
            NodeKind::Server => self.servers.lock().contains_key(&pid),
            NodeKind::Client => self.clients.lock().contains_key(&pid),
        }
    }

    fn close_outbound(&self, kind: NodeKind, pid: u32) {
        match kind {
            NodeKind::Server => self.servers.lock().remove(&pid),
            NodeKind::Client => self.clients.lock().remove(&pid),
        };
    }

    /// Dial `pid` of kind `kind` and install a fresh outbound writer slot,
    /// replacing any existing one.
    async fn dial(self: &Arc<Self>, kind: NodeKind, pid: u32) -> NetworkResult<()> {
        let addr = self.addr_for(kind, pid);
        let stream = match TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                warn!(%addr, "dial failed: {e}");
                return Err(e.into());
            }
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.spawn_writer(stream, rx);
        match kind {
            NodeKind::Server => self.servers.lock().insert(pid, Slot { tx }),
            NodeKind::Client => self.clients.lock().insert(pid, Slot { tx }),
        };
        Ok(())
    }

    fn spawn_writer(self: &Arc<Self>, mut stream: TcpStream, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        let delay = self.send_delay;
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                tokio::time::sleep(delay).await;
                if let Err(e) = write_envelope(&mut stream, &envelope).await {
                    warn!("send failed, closing outbound slot: {e}");
                    break;
                }
            }
        });
    }

    fn is_failed(&self, kind: NodeKind, pid: u32) -> bool {
        match kind {
            NodeKind::Server => self.failed_servers.lock().contains(&pid),
            NodeKind::Client => self.failed_clients.lock().contains(&pid),
        }
    }

    /// Simulate a one-directional link failure to/from `pid`: sends to it
    /// are dropped and messages declaring it as sender are dropped after
    /// decode.
    pub fn fail_link(&self, kind: NodeKind, pid: u32) {
        match kind {
            NodeKind::Server => self.failed_servers.lock().insert(pid),
            NodeKind::Client => self.failed_clients.lock().insert(pid),
        };
    }

    /// Undo a prior [`Messenger::fail_link`].
    pub fn fix_link(&self, kind: NodeKind, pid: u32) {
        match kind {
            NodeKind::Server => self.failed_servers.lock().remove(&pid),
            NodeKind::Client => self.failed_clients.lock().remove(&pid),
        };
    }

    /// `true` if the link to `pid` has been artificially failed.
    pub fn is_link_failed(&self, kind: NodeKind, pid: u32) -> bool {
        self.is_failed(kind, pid)
    }

    /// Send `body` to a single server, dialing lazily if no slot exists.
    pub async fn send_server(self: &Arc<Self>, pid: u32, body: Message) -> NetworkResult<()> {
        self.send(NodeKind::Server, pid, body).await
    }

    /// Send `body` to a single client, dialing lazily if no slot exists.
    pub async fn send_client(self: &Arc<Self>, pid: u32, body: Message) -> NetworkResult<()> {
        self.send(NodeKind::Client, pid, body).await
    }

    async fn send(self: &Arc<Self>, kind: NodeKind, pid: u32, body: Message) -> NetworkResult<()> {
        if self.is_failed(kind, pid) {
            debug!(?kind, pid, "dropping send to failed link");
            return Ok(());
        }
        if !self.has_outbound(kind, pid) {
            self.dial(kind, pid).await?;
        }
        let envelope = Envelope::new(self.self_id, body);
        let sent = match kind {
            NodeKind::Server => self.servers.lock().get(&pid).map(|s| s.tx.send(envelope.clone())),
            NodeKind::Client => self.clients.lock().get(&pid).map(|s| s.tx.send(envelope.clone())),
        };
        match sent {
            Some(Ok(())) => Ok(()),
            Some(Err(_)) | None => {
                // Stale or missing slot: one lazy redial attempt.
                self.dial(kind, pid).await?;
                let retried = match kind {
                    NodeKind::Server => self.servers.lock().get(&pid).map(|s| s.tx.send(envelope)),
                    NodeKind::Client => self.clients.lock().get(&pid).map(|s| s.tx.send(envelope)),
                };
                match retried {
                    Some(Ok(())) => Ok(()),
                    _ => Err(NetworkError::ChannelClosed),
                }
            }
        }
    }

    /// Broadcast `body` to every server other than self (self-votes are
    /// implicit in the consensus quorum math, never delivered as a
    /// message).
    pub async fn broadcast_servers(self: &Arc<Self>, body: Message) {
        for pid in 0..self.roster.n_servers() {
            if self.self_id.kind == NodeKind::Server && pid == self.self_id.pid {
                continue;
            }
            if let Err(e) = self.send_server(pid, body.clone()).await {
                warn!(pid, "broadcast to server failed: {e}");
            }
        }
    }

    /// Broadcast `body` to every client.
    pub async fn broadcast_clients(self: &Arc<Self>, body: Message) {
        for pid in 0..self.roster.n_clients() {
            if self.self_id.kind == NodeKind::Client && pid == self.self_id.pid {
                continue;
            }
            if let Err(e) = self.send_client(pid, body.clone()).await {
                warn!(pid, "broadcast to client failed: {e}");
            }
        }
    }

    /// Broadcast `body` to every server and every client (used for
    /// `Decide`, which both finalizes the log and lets clients re-hint
    /// their `leaderID`).
    pub async fn broadcast_all(self: &Arc<Self>, body: Message) {
        self.broadcast_servers(body.clone()).await;
        self.broadcast_clients(body).await;
    }

    /// Send `Quit` to every peer and drop all outbound slots, as the `q`
    /// REPL command does before the process exits.
    pub async fn shutdown(self: &Arc<Self>) {
        self.broadcast_all(Message::Quit).await;
        self.servers.lock().clear();
        self.clients.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_messenger(kind: NodeKind, pid: u32) -> Arc<Messenger> {
        let roster = Roster::new(3, 1, 3201, 2201).unwrap();
        Messenger::with_send_delay(
            ProcessId::new(kind, pid),
            roster,
            "127.0.0.1",
            Duration::from_millis(1),
        )
    }

    type BoxedHandler = Box<dyn Fn(Envelope) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

    fn counting_handler() -> (Arc<AtomicUsize>, BoxedHandler) {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = Arc::clone(&counter);
        let handler: BoxedHandler = Box::new(move |_env: Envelope| {
            let counter = Arc::clone(&counter2);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (counter, handler)
    }

    #[tokio::test]
    async fn fail_link_drops_inbound_dispatch() {
        let messenger = test_messenger(NodeKind::Server, 0);
        messenger.fail_link(NodeKind::Server, 1);
        assert!(messenger.is_link_failed(NodeKind::Server, 1));

        let (counter, handler) = counting_handler();
        let envelope = Envelope::new(ProcessId::new(NodeKind::Server, 1), Message::Quit);
        messenger.on_envelope(envelope, &Arc::new(handler)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fix_link_restores_delivery() {
        let messenger = test_messenger(NodeKind::Server, 0);
        messenger.fail_link(NodeKind::Client, 0);
        messenger.fix_link(NodeKind::Client, 0);
        assert!(!messenger.is_link_failed(NodeKind::Client, 0));

        let (counter, handler) = counting_handler();
        let envelope = Envelope::new(ProcessId::new(NodeKind::Client, 0), Message::Quit);
        messenger.on_envelope(envelope, &Arc::new(handler)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_outbound_on_empty_slot_set_is_a_no_op() {
        let messenger = test_messenger(NodeKind::Server, 0);
        messenger.close_outbound(NodeKind::Server, 1);
        assert!(!messenger.has_outbound(NodeKind::Server, 1));
    }

    #[tokio::test]
    async fn send_to_failed_link_is_a_silent_no_op() {
        let messenger = test_messenger(NodeKind::Server, 0);
        messenger.fail_link(NodeKind::Server, 1);
        let result = messenger.send_server(1, Message::Quit).await;
        assert!(result.is_ok());
        assert!(!messenger.has_outbound(NodeKind::Server, 1));
    }
}
