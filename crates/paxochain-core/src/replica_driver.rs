//! Glue between the [`Replica`] state machine and a live [`Messenger`].

use std::sync::Arc;

use parking_lot::Mutex;
use paxochain_consensus::{Outbound, Recipient, Replica};
use paxochain_network::Messenger;
use paxochain_types::{Block, Envelope, Message};

use crate::error::CoreResult;

/// Owns one replica's Paxos state and the messenger used to reach its
/// peers; every inbound envelope is fed to the replica and every resulting
/// `Outbound` is drained and sent.
pub struct ReplicaDriver {
    replica: Mutex<Replica>,
    messenger: Arc<Messenger>,
}

impl ReplicaDriver {
    /// Build a driver over an already-constructed replica and messenger.
    pub fn new(replica: Replica, messenger: Arc<Messenger>) -> Arc<Self> {
        Arc::new(ReplicaDriver {
            replica: Mutex::new(replica),
            messenger,
        })
    }

    /// Handle one inbound envelope: dispatch it to the replica, then drain
    /// and send every message it queued in response.
    pub async fn handle_envelope(self: &Arc<Self>, envelope: Envelope) -> CoreResult<()> {
        let outbound = {
            let mut replica = self.replica.lock();
            replica.dispatch(envelope.sender, envelope.body)?;
            replica.take_messages()
        };
        for message in outbound {
            self.deliver(message).await?;
        }
        Ok(())
    }

    async fn deliver(&self, outbound: Outbound) -> CoreResult<()> {
        match outbound.to {
            Recipient::Server(pid) => self.messenger.send_server(pid, outbound.body).await?,
            Recipient::AllServers => self.messenger.broadcast_servers(outbound.body).await,
            Recipient::Client(pid) => self.messenger.send_client(pid, outbound.body).await?,
            Recipient::AllClients => self.messenger.broadcast_clients(outbound.body).await,
            Recipient::AllNodes => self.messenger.broadcast_all(outbound.body).await,
        }
        Ok(())
    }

    /// This replica's own pid.
    pub fn self_id(&self) -> u32 {
        self.replica.lock().self_id()
    }

    /// The replica currently believed to be leader, if established.
    pub fn leader_id(&self) -> Option<u32> {
        self.replica.lock().leader_id()
    }

    /// `true` if this replica currently believes itself the leader.
    pub fn is_leader(&self) -> bool {
        self.replica.lock().is_leader()
    }

    /// Current log depth.
    pub fn depth(&self) -> u64 {
        self.replica.lock().depth()
    }

    /// Look up a key in the dictionary projection (`"NO_KEY"` if absent).
    pub fn get(&self, key: &str) -> String {
        self.replica.lock().get(key)
    }

    /// Snapshot of the full chain, for `printBlockchain`.
    pub fn blocks(&self) -> Vec<Block> {
        self.replica.lock().blocks()
    }

    /// Number of requests awaiting agreement, for `printQueue`.
    pub fn queue_len(&self) -> usize {
        self.replica.lock().queue_len()
    }

    /// The messenger this driver sends through, for REPL commands that
    /// operate on links directly (`failLink`/`fixLink`).
    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    /// Broadcast `Quit` and drop all outbound slots, as the `q` command
    /// does before the process exits.
    pub async fn shutdown(&self) {
        self.messenger.shutdown().await;
    }

    /// Send a one-off diagnostic `Test` message, for the `broadcast`/
    /// `unicast` REPL commands.
    pub async fn send_test(&self, to: Recipient, text: String) -> CoreResult<()> {
        self.deliver(Outbound::new(to, Message::Test { message: text })).await
    }
}

impl std::fmt::Debug for ReplicaDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaDriver")
            .field("self_id", &self.self_id())
            .field("depth", &self.depth())
            .finish()
    }
}
