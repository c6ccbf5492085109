//! Sift DOM - Path-indexed document model
//!
//! Arena DOM tree whose nodes carry hierarchical sibling-ordinal paths,
//! a process-wide token registry for tag and attribute names, range
//! queryable path indexes and ordered selection sets.

mod document;
mod error;
mod index;
mod node;
mod path;
mod selection;
mod tag_action;
mod token;
mod tree;

pub use document::Document;
pub use error::{DomError, DomResult};
pub use index::{PathIndex, Selector, SelectorTable};
pub use node::{Attribute, ElementData, Namespace, Node, NodeData, NodeKind};
pub use path::{NodePath, Ordinals, PathComparer, PathSegment, MAX_ORDINAL, ORDINAL_ESCAPE};
pub use selection::{DocumentOrder, SelectionOrder, SelectionSet};
pub use tag_action::{special_tag_action, TagAction};
pub use token::{intern, intern_case_sensitive, registry, Token, TokenProperties, TokenRegistry};
pub use tree::{Children, Descendants, DomTree};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);
    /// Invalid/null node ID
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}
