//! Messages a [`crate::Replica`] wants sent, queued for the driver to drain.

use paxochain_types::Message;

/// Who an outbound message should go to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    /// A single server replica, by pid.
    Server(u32),
    /// Every server replica except self.
    AllServers,
    /// A single client, by pid.
    Client(u32),
    /// Every client in the roster.
    AllClients,
    /// Every server and every client. Used for `Decide`, which finalizes the
    /// log on every replica and lets every client re-hint its `leaderID`.
    AllNodes,
}

/// A message queued for delivery by the network layer.
#[derive(Clone, Debug)]
pub struct Outbound {
    /// Destination.
    pub to: Recipient,
    /// Message body.
    pub body: Message,
}

impl Outbound {
    /// Build an outbound message.
    pub fn new(to: Recipient, body: Message) -> Self {
        Outbound { to, body }
    }
}
