//! Process identifiers for the fixed server/client roster.

use std::fmt;

/// Index of a server replica within the fixed roster, `0..N_SERVERS`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicaId(pub u32);

/// Index of a client within the fixed roster, `0..N_CLIENTS`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientId(pub u32);

impl ReplicaId {
    /// The underlying roster index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl ClientId {
    /// The underlying roster index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ReplicaId {
    fn from(v: u32) -> Self {
        ReplicaId(v)
    }
}

impl From<u32> for ClientId {
    fn from(v: u32) -> Self {
        ClientId(v)
    }
}

/// Which kind of process a pid belongs to: the `nodeType` tag every wire
/// message carries so recipients can route without ambiguity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// A server (replica) process.
    Server,
    /// A client process.
    Client,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Server => write!(f, "Server"),
            NodeKind::Client => write!(f, "Client"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_id_ordering_is_numeric() {
        assert!(ReplicaId(1) < ReplicaId(2));
        assert!(ReplicaId(0) < ReplicaId(10));
    }

    #[test]
    fn index_matches_inner_value() {
        assert_eq!(ReplicaId(3).index(), 3);
        assert_eq!(ClientId(2).index(), 2);
    }

    #[test]
    fn node_kind_display() {
        assert_eq!(NodeKind::Server.to_string(), "Server");
        assert_eq!(NodeKind::Client.to_string(), "Client");
    }
}
