//! Wire messages between workers and the coordinator.
//!
//! Everything a node needs to say to the coordinator is a `Request`; the
//! coordinator answers `Get` requests with a `Reply`. Both are plain serde
//! types so a transport can frame them however it likes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::row::{Matrix, Row};

/// Rank of a node in the session; rank 0 is the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const COORDINATOR: NodeId = NodeId(0);

    #[inline]
    pub fn is_coordinator(self) -> bool {
        self == Self::COORDINATOR
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One worker thread: node rank plus slot index within that node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId {
    pub node: NodeId,
    pub slot: usize,
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.slot)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Claim the next job; answered when one is available or the run ends.
    Get { from: WorkerId },
    /// The claimed job is retired; `rows` are its reduced neighbours.
    Complete { from: WorkerId, rows: Matrix },
    /// Rows admitted without a claimed job (initial and known facets).
    Seed { rows: Matrix },
    /// No further `Seed` requests will follow.
    SeedingDone,
    /// Stop the run. `from` is `None` when the driver aborts during setup.
    Abort {
        from: Option<WorkerId>,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Job(Row),
    /// Cluster-wide termination; sent exactly once per worker.
    Empty,
    Abort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_request_survives_a_json_hop() {
        let req = Request::Complete {
            from: WorkerId {
                node: NodeId(2),
                slot: 1,
            },
            rows: vec![Row::from([1, -2, 3])],
        };
        let wire = serde_json::to_vec(&req).unwrap();
        let back: Request = serde_json::from_slice(&wire).unwrap();
        assert_eq!(back, req);
    }
}
