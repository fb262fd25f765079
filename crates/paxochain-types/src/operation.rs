//! Client-visible operations (`GET`/`PUT`) and their canonical rendering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of operation a client may request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum OpType {
    /// Look up a key.
    Get,
    /// Store a value at a key.
    Put,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Get => write!(f, "GET"),
            OpType::Put => write!(f, "PUT"),
        }
    }
}

/// A single client operation.
///
/// Equality (and therefore in-flight request dedup) deliberately ignores
/// `value`: a client re-sending the identical `(op, key)` pair, even with a
/// different value on a retried `PUT`, is treated as the same outstanding
/// request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    /// GET or PUT.
    pub op: OpType,
    /// The key the operation addresses.
    pub key: String,
    /// The value to store; `None` for GET, and for a PUT issued with no
    /// explicit value.
    pub value: Option<String>,
}

impl Operation {
    /// Build a GET operation.
    pub fn get(key: impl Into<String>) -> Self {
        Operation {
            op: OpType::Get,
            key: key.into(),
            value: None,
        }
    }

    /// Build a PUT operation.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Operation {
            op: OpType::Put,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Canonical text used as the proof-of-work payload and the operation's
    /// contribution to a block's rendered form. Deterministic across
    /// replicas regardless of field order in memory.
    pub fn render(&self) -> String {
        match &self.value {
            Some(v) => format!("{}:{}:{}", self.op, self.key, v),
            None => format!("{}:{}:None", self.op, self.key),
        }
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.key == other.key
    }
}

impl Eq for Operation {}
