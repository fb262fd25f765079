//! Wire message taxonomy exchanged between replicas and clients.

use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;
use crate::block::Block;
use crate::operation::Operation;
use paxochain_primitives::NodeKind;

/// Identifies the process that sent a message: pid and node type, attached
/// explicitly by the network layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ProcessId {
    /// Whether the sender is a server or a client.
    pub kind: NodeKind,
    /// The sender's roster index.
    pub pid: u32,
}

impl ProcessId {
    /// Build a process id.
    pub fn new(kind: NodeKind, pid: u32) -> Self {
        ProcessId { kind, pid }
    }
}

/// Every message type exchanged over the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message {
    /// Paxos phase 1A: proposer solicits promises for `ballot`.
    PrepareRequest {
        /// The ballot being proposed.
        ballot: Ballot,
        /// Sender's current log depth, used to detect a lagging peer.
        depth: u64,
    },
    /// Paxos phase 1B: acceptor's reply to a `PrepareRequest`.
    Promise {
        /// The ballot being promised.
        ballot: Ballot,
        /// Highest ballot this acceptor has accepted a value in.
        accept_num: Ballot,
        /// The value accepted under `accept_num`, if any.
        accept_val: Option<Block>,
        /// Sender's current log depth.
        depth: u64,
    },
    /// Paxos phase 2A: proposer asks acceptors to accept `value`.
    AcceptRequest {
        /// The ballot under which `value` is proposed.
        ballot: Ballot,
        /// The block being proposed.
        value: Block,
        /// Sender's current log depth.
        depth: u64,
    },
    /// Paxos phase 2B: acceptor's reply to an `AcceptRequest`.
    Accept {
        /// The ballot this acceptor accepted.
        ballot: Ballot,
        /// The value this acceptor accepted.
        value: Block,
        /// Sender's current log depth.
        depth: u64,
    },
    /// Broadcast once a value reaches quorum: every recipient finalizes it
    /// unconditionally.
    Decide {
        /// The ballot the value was decided under.
        ballot: Ballot,
        /// The decided value.
        value: Block,
    },
    /// A client's GET/PUT request.
    ClientRequest {
        /// The operation being requested.
        operation: Operation,
        /// The requesting client's roster index, carried in the message
        /// body (rather than inferred from the envelope's sender) so it
        /// survives a server-to-server forward to the current leader.
        client: u32,
        /// If set, the receiving replica must not forward this request even
        /// if it believes another replica is the leader; it should itself
        /// begin a new election.
        force_leader: bool,
    },
    /// A replica's reply to a `ClientRequest`.
    ClientResponse {
        /// The operation this response fulfills.
        operation: Operation,
        /// `"NO_KEY"` for a GET on a missing key, the stored value for a
        /// successful GET, or an acknowledgement string for a PUT.
        message: String,
    },
    /// Catch-up data filling exactly one missing log slot.
    RecoveryData {
        /// The depth this block belongs at (the recipient's log must
        /// currently be exactly one shorter).
        depth: u64,
        /// The block to append.
        block: Block,
    },
    /// Graceful disconnect notice.
    Quit,
    /// Diagnostic ping with no protocol effect.
    Test {
        /// Free-form text.
        message: String,
    },
}

impl Message {
    /// A short tag naming the variant, for logging on every dispatch.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Message::PrepareRequest { .. } => "PrepareRequest",
            Message::Promise { .. } => "Promise",
            Message::AcceptRequest { .. } => "AcceptRequest",
            Message::Accept { .. } => "Accept",
            Message::Decide { .. } => "Decide",
            Message::ClientRequest { .. } => "ClientRequest",
            Message::ClientResponse { .. } => "ClientResponse",
            Message::RecoveryData { .. } => "RecoveryData",
            Message::Quit => "Quit",
            Message::Test { .. } => "Test",
        }
    }
}

/// A message paired with the process that sent it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// The sender.
    pub sender: ProcessId,
    /// The message body.
    pub body: Message,
}

impl Envelope {
    /// Wrap a message with its sender.
    pub fn new(sender: ProcessId, body: Message) -> Self {
        Envelope { sender, body }
    }
}
