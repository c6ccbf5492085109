//! DOM operation errors

use crate::NodeId;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node id does not belong to this tree
    #[error("node {0:?} not found")]
    NodeNotFound(NodeId),

    /// Target cannot hold children (text, comment, doctype, void element)
    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),

    /// Inserting a node under itself or one of its descendants
    #[error("cannot insert {child:?} under {parent:?}: would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    /// Attribute access on a node that is not an element
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    /// Reference node is not a child of the given parent
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// Operation needs a node attached to the document
    #[error("node {0:?} is not attached to the document")]
    Detached(NodeId),

    /// Positional access outside the collection
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
