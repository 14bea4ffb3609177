use std::fmt;
use std::error::Error;

use crate::gravtree::{BodyId, NodeId};

/// Represents errors that can occur while maintaining the tree or evaluating forces.
///
/// Apart from `OutsideDomain`, `InvalidMass` and `InvalidConfig`, every variant is a
/// broken invariant: the operation that produced it stops immediately and the tree
/// should not be trusted afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// The body id is not present in the body store.
    UnknownBody(BodyId),
    /// The body has no leaf back-reference, so it is not currently indexed.
    NotIndexed(BodyId),
    /// The body already has a leaf and cannot be inserted a second time.
    AlreadyIndexed(BodyId),
    /// The body's recorded leaf does not list it.
    NotInLeaf { body: BodyId, node: NodeId },
    /// None of the four children accepted a body that lies inside their parent.
    Redistribution { body: BodyId, node: NodeId },
    /// A collapse could not reinsert one of the bodies of the removed children.
    PruneFailed { body: BodyId, node: NodeId },
    /// The node handle does not refer to a live node.
    StaleNode(NodeId),
    /// Reported by the invariant checker.
    InvariantViolation(String),
    /// The body's position lies outside the simulation domain.
    OutsideDomain(BodyId),
    /// Indicates an invalid mass value (negative or not finite).
    InvalidMass,
    /// Rejected configuration values.
    InvalidConfig(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeError::UnknownBody(id) => write!(f, "Unknown body {}", id),
            TreeError::NotIndexed(id) => write!(f, "Body {} is not indexed", id),
            TreeError::AlreadyIndexed(id) => write!(f, "Body {} is already indexed", id),
            TreeError::NotInLeaf { body, node } => write!(f, "Body {} is not held by leaf {}", body, node),
            TreeError::Redistribution { body, node } => {
                write!(f, "No child of node {} accepted body {}", node, body)
            }
            TreeError::PruneFailed { body, node } => {
                write!(f, "Unable to reinsert body {} while collapsing node {}", body, node)
            }
            TreeError::StaleNode(node) => write!(f, "Node {} is not live", node),
            TreeError::InvariantViolation(msg) => write!(f, "Invariant violated: {}", msg),
            TreeError::OutsideDomain(id) => write!(f, "Body {} lies outside the domain", id),
            TreeError::InvalidMass => write!(f, "Invalid mass value"),
            TreeError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for TreeError {}

impl TreeError {
    /// True for the outcomes a driver is expected to recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TreeError::OutsideDomain(_) | TreeError::InvalidMass | TreeError::InvalidConfig(_)
        )
    }
}
