//! Client request lifecycle: dispatch, `WAIT_TIME` timeout, leader re-hint,
//! and in-flight dedup.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use paxochain_network::Messenger;
use paxochain_types::{Ballot, Message, Operation};
use rand::Rng;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

/// Default client timeout before re-hinting a random server.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(30);

/// Drives outstanding client requests: dispatch, timeout-triggered
/// re-hint, and in-flight dedup by `(op, key)`.
pub struct ClientEngine {
    self_id: u32,
    n_servers: u32,
    wait_time: Duration,
    messenger: Arc<Messenger>,
    leader_id: Mutex<u32>,
    in_flight: Mutex<Vec<Operation>>,
    notify: Notify,
    responses: mpsc::UnboundedSender<(Operation, String)>,
}

impl ClientEngine {
    /// Build a client engine. Returns the engine and a channel that yields
    /// `(operation, message)` as each `ClientResponse` arrives, for the
    /// REPL to print.
    pub fn new(
        self_id: u32,
        n_servers: u32,
        messenger: Arc<Messenger>,
        wait_time: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(Operation, String)>) {
        let (responses, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(ClientEngine {
            self_id,
            n_servers,
            wait_time,
            messenger,
            leader_id: Mutex::new(0),
            in_flight: Mutex::new(Vec::new()),
            notify: Notify::new(),
            responses,
        });
        (engine, rx)
    }

    /// This client's own pid.
    pub fn self_id(&self) -> u32 {
        self.self_id
    }

    /// The server this client currently believes is leader.
    pub fn leader_id(&self) -> u32 {
        *self.leader_id.lock()
    }

    /// Number of requests currently awaiting a response.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// The messenger this engine sends through, for REPL commands that
    /// operate on links directly (`failLink`/`fixLink`/`broadcast`).
    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    /// Broadcast `Quit` and drop all outbound slots, as the `q` command
    /// does before the process exits.
    pub async fn shutdown(&self) {
        self.messenger.shutdown().await;
    }

    /// Issue `op`, spawning a watcher that retries against a freshly
    /// hinted random server every `wait_time` until a response arrives.
    /// Returns immediately; the response (if any) surfaces on the channel
    /// returned by [`ClientEngine::new`].
    pub fn send_request(self: &Arc<Self>, op: Operation) {
        self.in_flight.lock().push(op.clone());
        let this = Arc::clone(self);
        tokio::spawn(async move { this.watch(op).await });
    }

    async fn watch(self: Arc<Self>, op: Operation) {
        let leader = self.leader_id();
        self.dispatch(leader, op.clone(), false).await;

        loop {
            if !self.is_in_flight(&op) {
                return;
            }
            let notified = self.notify.notified();
            tokio::select! {
                _ = notified => {
                    if !self.is_in_flight(&op) {
                        return;
                    }
                }
                _ = tokio::time::sleep(self.wait_time) => {
                    if !self.is_in_flight(&op) {
                        return;
                    }
                    let hinted = rand::thread_rng().gen_range(0..self.n_servers);
                    *self.leader_id.lock() = hinted;
                    debug!(hinted, "client request timed out, re-hinting leader");
                    self.dispatch(hinted, op.clone(), true).await;
                }
            }
        }
    }

    async fn dispatch(&self, server: u32, operation: Operation, force_leader: bool) {
        let message = Message::ClientRequest { operation, client: self.self_id, force_leader };
        if let Err(e) = self.messenger.send_server(server, message).await {
            warn!(server, "failed to send client request: {e}");
        }
    }

    fn is_in_flight(&self, op: &Operation) -> bool {
        self.in_flight.lock().iter().any(|o| o == op)
    }

    /// Handle one inbound envelope: a `ClientResponse` clears every
    /// in-flight entry equal to its operation (value-independent) and
    /// wakes every watcher; a `Decide` re-hints `leaderID` to the deciding
    /// ballot's proposer.
    pub fn handle_envelope(&self, sender_pid: u32, body: Message) {
        match body {
            Message::ClientResponse { operation, message } => {
                self.in_flight.lock().retain(|o| o != &operation);
                self.notify.notify_waiters();
                let _ = self.responses.send((operation, message));
            }
            Message::Decide { ballot, .. } => {
                self.update_leader_hint(ballot);
            }
            other => {
                debug!(from = sender_pid, kind = other.kind_str(), "client ignoring message");
            }
        }
    }

    fn update_leader_hint(&self, ballot: Ballot) {
        *self.leader_id.lock() = ballot.pid;
    }
}
