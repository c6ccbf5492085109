//! DOM Tree (arena-based allocation)
//!
//! Every node of one document lives in a single `Vec`, addressed by
//! `NodeId`. Detached nodes stay in the arena until the tree is dropped.
//! Node paths are recomputed on every structural change, so path order is
//! always document order for attached nodes. Bulk construction can defer
//! that work with [`DomTree::defer_paths`] and settle every path in one
//! pass with [`DomTree::resolve_paths`].

use std::cmp::Ordering;

use crate::error::{DomError, DomResult};
use crate::node::{ElementData, Node, NodeData, NodeKind};
use crate::path::NodePath;
use crate::token::{self, Token};
use crate::NodeId;

/// Arena-based DOM tree
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    /// Bumped on every structural mutation
    generation: u64,
    /// Links are maintained but paths wait for `resolve_paths`
    deferred: bool,
}

impl DomTree {
    /// Create a tree rooted at a document node
    pub fn new() -> Self {
        Self::with_root(NodeData::Document)
    }

    /// Create a tree rooted at a fragment node
    pub fn new_fragment() -> Self {
        Self::with_root(NodeData::Fragment)
    }

    fn with_root(data: NodeData) -> Self {
        let mut root = Node::new(data);
        root.attached = true;
        Self {
            nodes: vec![root],
            generation: 0,
            deferred: false,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by ID
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NodeNotFound(id))
    }

    /// Number of nodes in the arena, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural mutation counter
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    /// Mutable element data. Attribute changes made here bypass any index
    /// built over the tree.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    /// Tag token of an element, `Token::NONE` for other nodes
    pub fn tag(&self, id: NodeId) -> Token {
        self.get(id).map_or(Token::NONE, Node::tag)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(Node::kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_valid())
    }

    /// Current path of an attached node
    pub fn path(&self, id: NodeId) -> Option<&NodePath> {
        self.get(id).filter(|n| n.attached).map(|n| &n.path)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.attached)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a detached element, interning its name
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.create_element_token(token::intern(name))
    }

    pub fn create_element_token(&mut self, name: Token) -> NodeId {
        self.push(Node::element(name))
    }

    pub fn create_element_data(&mut self, data: ElementData) -> NodeId {
        self.push(Node::new(NodeData::Element(data)))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(Node::text(content))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(Node::new(NodeData::Comment(content.to_owned())))
    }

    pub fn create_doctype(&mut self, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.push(Node::new(NodeData::Doctype {
            name: name.to_owned(),
            public_id: public_id.to_owned(),
            system_id: system_id.to_owned(),
        }))
    }

    /// Iterate over the children of a node
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.get(id).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    /// Pre-order iteration over the descendants of a node (excluding it)
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            scope: id,
            next: self.get(id).map_or(NodeId::NONE, |n| n.first_child),
        }
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.get(node).map_or(NodeId::NONE, |n| n.parent);
        while current.is_valid() {
            if current == ancestor {
                return true;
            }
            current = self.nodes[current.index()].parent;
        }
        false
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if !parent_node.is_container() {
            return Err(DomError::NotAContainer(parent));
        }
        if child == parent
            || child == NodeId::ROOT
            || matches!(child_node.kind(), NodeKind::Document)
            || self.is_ancestor_of(child, parent)
        {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`, moving it if needed
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.check_insert(parent, child)?;
        self.unlink(child);

        let last = self.nodes[parent.index()].last_child;
        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = last;
            node.next_sibling = NodeId::NONE;
        }
        if last.is_valid() {
            self.nodes[last.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        let parent_node = &mut self.nodes[parent.index()];
        parent_node.last_child = child;
        parent_node.child_count += 1;

        self.refresh_from(child);
        Ok(())
    }

    /// Insert `child` before `reference`, which must be a child of `parent`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> DomResult<()> {
        self.check_insert(parent, child)?;
        if self.node(reference)?.parent != parent {
            return Err(DomError::NotAChild { parent, child: reference });
        }
        if child == reference {
            return Ok(());
        }
        self.unlink(child);

        let prev = self.nodes[reference.index()].prev_sibling;
        {
            let node = &mut self.nodes[child.index()];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        self.nodes[reference.index()].prev_sibling = child;
        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = child;
        } else {
            self.nodes[parent.index()].first_child = child;
        }
        self.nodes[parent.index()].child_count += 1;

        self.refresh_from(child);
        Ok(())
    }

    /// Remove a node from its parent. The subtree stays in the arena,
    /// detached, and can be inserted again.
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        if id == NodeId::ROOT {
            return Err(DomError::HierarchyRequest { parent: NodeId::NONE, child: id });
        }
        self.node(id)?;
        self.unlink(id);
        self.generation += 1;
        Ok(())
    }

    /// Unlink from the current parent and renumber the siblings that followed
    fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.index()];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if !parent.is_valid() {
            return;
        }

        if prev.is_valid() {
            self.nodes[prev.index()].next_sibling = next;
        } else {
            self.nodes[parent.index()].first_child = next;
        }
        if next.is_valid() {
            self.nodes[next.index()].prev_sibling = prev;
        } else {
            self.nodes[parent.index()].last_child = prev;
        }
        self.nodes[parent.index()].child_count -= 1;

        {
            let node = &mut self.nodes[id.index()];
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
        self.mark_detached(id);

        if next.is_valid() {
            self.refresh_from(next);
        }
    }

    fn mark_detached(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.index()];
            if !node.attached && node.path.is_root() {
                continue;
            }
            node.attached = false;
            node.path.clear();
            stack.extend(self.children(current));
        }
    }

    /// Stop recomputing paths on structural change. Until
    /// [`resolve_paths`](Self::resolve_paths), nodes linked in are not
    /// reported as attached and paths already assigned may be stale.
    pub fn defer_paths(&mut self) {
        self.deferred = true;
    }

    pub fn is_deferring_paths(&self) -> bool {
        self.deferred
    }

    /// Assign every path under the root in one pre-order walk and resume
    /// per-change maintenance. A no-op unless paths are deferred.
    pub fn resolve_paths(&mut self) {
        if !self.deferred {
            return;
        }
        self.deferred = false;
        self.generation += 1;
        self.assign_paths(NodeId::ROOT, NodePath::root());
        tracing::trace!("Resolved paths for {} nodes", self.nodes.len());
    }

    /// Recompute ordinals and paths for `first`, its following siblings and
    /// all of their descendants
    fn refresh_from(&mut self, first: NodeId) {
        self.generation += 1;
        if self.deferred {
            return;
        }

        let (parent, prev) = {
            let node = &self.nodes[first.index()];
            (node.parent, node.prev_sibling)
        };
        let (parent_path, attached) = {
            let parent_node = &self.nodes[parent.index()];
            (parent_node.path.clone(), parent_node.attached)
        };

        let mut ordinal = if prev.is_valid() {
            self.nodes[prev.index()].path.ordinal().map_or(0, |o| o + 1)
        } else {
            0
        };

        let mut current = first;
        while current.is_valid() {
            if attached {
                let path = parent_path.child(ordinal);
                self.assign_paths(current, path);
            } else {
                self.mark_detached(current);
            }
            ordinal += 1;
            current = self.nodes[current.index()].next_sibling;
        }
    }

    fn assign_paths(&mut self, id: NodeId, path: NodePath) {
        let mut stack = vec![(id, path)];
        while let Some((current, path)) = stack.pop() {
            let mut child = self.nodes[current.index()].first_child;
            let mut ordinal = 0u32;
            while child.is_valid() {
                stack.push((child, path.child(ordinal)));
                ordinal += 1;
                child = self.nodes[child.index()].next_sibling;
            }
            let node = &mut self.nodes[current.index()];
            node.path = path;
            node.attached = true;
        }
    }

    /// Append character data, extending the last child when it is text
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> DomResult<NodeId> {
        let last = self.node(parent)?.last_child;
        if last.is_valid() {
            if let NodeData::Text(existing) = &mut self.nodes[last.index()].data {
                existing.push_str(text);
                return Ok(last);
            }
        }
        let id = self.create_text(text);
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Insert character data before `reference`, merging into a preceding
    /// text sibling when there is one
    pub fn insert_text_before(
        &mut self,
        parent: NodeId,
        reference: NodeId,
        text: &str,
    ) -> DomResult<NodeId> {
        let prev = self.node(reference)?.prev_sibling;
        if prev.is_valid() {
            if let NodeData::Text(existing) = &mut self.nodes[prev.index()].data {
                existing.push_str(text);
                return Ok(prev);
            }
        }
        let id = self.create_text(text);
        self.insert_before(parent, id, reference)?;
        Ok(id)
    }

    /// Deep copy of a subtree; the copy is detached
    pub fn clone_subtree(&mut self, id: NodeId) -> DomResult<NodeId> {
        let data = self.node(id)?.data.clone();
        let copy = self.push(Node::new(data));

        let mut pending = vec![(id, copy)];
        while let Some((original, cloned_parent)) = pending.pop() {
            let children: Vec<NodeId> = self.children(original).collect();
            for child in children {
                let data = self.nodes[child.index()].data.clone();
                let cloned = self.push(Node::new(data));
                self.append_child(cloned_parent, cloned)?;
                pending.push((child, cloned));
            }
        }
        Ok(copy)
    }

    /// Order two nodes by document position. Attached nodes sort before
    /// detached ones; detached nodes fall back to creation order.
    pub fn compare_document_order(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => match (x.attached, y.attached) {
                (true, true) => x.path.cmp(&y.path).then(a.0.cmp(&b.0)),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.0.cmp(&b.0),
            },
            _ => a.0.cmp(&b.0),
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.get(id).and_then(Node::as_text) {
            return text.to_owned();
        }
        self.descendants(id)
            .filter_map(|d| self.nodes[d.index()].as_text())
            .collect()
    }

    /// Nearest ancestor-or-self element with the given tag
    pub fn closest(&self, id: NodeId, tag: Token) -> Option<NodeId> {
        let mut current = id;
        while current.is_valid() {
            let node = self.get(current)?;
            if node.tag() == tag {
                return Some(current);
            }
            current = node.parent;
        }
        None
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's children
pub struct Children<'a> {
    tree: &'a DomTree,
    next: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if !self.next.is_valid() {
            return None;
        }
        let current = self.next;
        self.next = self.tree.nodes[current.index()].next_sibling;
        Some(current)
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a DomTree,
    scope: NodeId,
    next: NodeId,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if !self.next.is_valid() {
            return None;
        }
        let current = self.next;
        let nodes = &self.tree.nodes;

        let node = &nodes[current.index()];
        self.next = if node.first_child.is_valid() {
            node.first_child
        } else {
            let mut cursor = current;
            loop {
                if cursor == self.scope {
                    break NodeId::NONE;
                }
                let n = &nodes[cursor.index()];
                if n.next_sibling.is_valid() {
                    break n.next_sibling;
                }
                cursor = n.parent;
                if !cursor.is_valid() || cursor == self.scope {
                    break NodeId::NONE;
                }
            }
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ORDINAL_ESCAPE;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let span = tree.create_element("span");
        let text = tree.create_text("Hello");
        tree.append_child(tree.root(), div).unwrap();
        tree.append_child(div, span).unwrap();
        tree.append_child(span, text).unwrap();
        (tree, div, span, text)
    }

    #[test]
    fn test_paths_follow_structure() {
        let (tree, div, span, text) = sample();
        assert!(tree.path(tree.root()).unwrap().is_root());
        assert_eq!(tree.path(div).unwrap().as_slice(), &[0]);
        assert_eq!(tree.path(span).unwrap().as_slice(), &[0, 0]);
        assert_eq!(tree.path(text).unwrap().as_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_insert_before_renumbers_following_siblings() {
        let (mut tree, div, span, text) = sample();
        let em = tree.create_element("em");
        tree.insert_before(div, em, span).unwrap();
        assert_eq!(tree.path(em).unwrap().as_slice(), &[0, 0]);
        assert_eq!(tree.path(span).unwrap().as_slice(), &[0, 1]);
        assert_eq!(tree.path(text).unwrap().as_slice(), &[0, 1, 0]);
        assert_eq!(tree.children(div).collect::<Vec<_>>(), vec![em, span]);
    }

    #[test]
    fn test_detach_clears_paths() {
        let (mut tree, div, span, text) = sample();
        let b = tree.create_element("b");
        tree.append_child(div, b).unwrap();
        tree.detach(span).unwrap();
        assert!(!tree.is_attached(span));
        assert!(!tree.is_attached(text));
        assert_eq!(tree.path(b).unwrap().as_slice(), &[0, 0]);
        assert_eq!(tree.get(div).unwrap().child_count, 1);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let (mut tree, div, span, _) = sample();
        assert_eq!(
            tree.append_child(span, div),
            Err(DomError::HierarchyRequest { parent: span, child: div })
        );
    }

    #[test]
    fn test_void_element_is_not_a_container() {
        let mut tree = DomTree::new();
        let br = tree.create_element("br");
        let text = tree.create_text("x");
        assert_eq!(tree.append_child(br, text), Err(DomError::NotAContainer(br)));
    }

    #[test]
    fn test_append_text_coalesces() {
        let mut tree = DomTree::new();
        let p = tree.create_element("p");
        tree.append_child(tree.root(), p).unwrap();
        let first = tree.append_text(p, "Hello").unwrap();
        let second = tree.append_text(p, ", world").unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.text_content(p), "Hello, world");
        assert_eq!(tree.get(p).unwrap().child_count, 1);
    }

    #[test]
    fn test_descendants_pre_order() {
        let (mut tree, div, span, text) = sample();
        let b = tree.create_element("b");
        tree.append_child(div, b).unwrap();
        let order: Vec<_> = tree.descendants(tree.root()).collect();
        assert_eq!(order, vec![div, span, text, b]);
        assert_eq!(tree.descendants(span).collect::<Vec<_>>(), vec![text]);
    }

    #[test]
    fn test_clone_subtree_is_detached_copy() {
        let (mut tree, div, _, _) = sample();
        let copy = tree.clone_subtree(div).unwrap();
        assert_ne!(copy, div);
        assert!(!tree.is_attached(copy));
        assert_eq!(tree.text_content(copy), "Hello");
        assert_eq!(tree.descendants(copy).count(), 2);
    }

    #[test]
    fn test_deferred_paths_resolve_in_one_pass() {
        let mut tree = DomTree::new();
        tree.defer_paths();
        let table = tree.create_element("table");
        tree.append_child(tree.root(), table).unwrap();
        let mut inserted = Vec::new();
        for _ in 0..50 {
            let tr = tree.create_element("tr");
            tree.append_child(table, tr).unwrap();
            let span = tree.create_element("span");
            tree.insert_before(tree.root(), span, table).unwrap();
            inserted.push(span);
        }
        assert!(!tree.is_attached(table));

        tree.resolve_paths();
        assert!(!tree.is_deferring_paths());
        for (i, &span) in inserted.iter().enumerate() {
            assert_eq!(tree.path(span).unwrap().as_slice(), &[i as u16]);
        }
        assert_eq!(tree.path(table).unwrap().as_slice(), &[50]);
        let last_row = tree.get(table).unwrap().last_child;
        assert_eq!(tree.path(last_row).unwrap().as_slice(), &[50, 49]);
    }

    #[test]
    fn test_wide_parent_keeps_sibling_order() {
        let mut tree = DomTree::new();
        let count = ORDINAL_ESCAPE as usize + 10;
        let children: Vec<NodeId> = (0..count)
            .map(|_| {
                let id = tree.create_element("i");
                tree.append_child(tree.root(), id).unwrap();
                id
            })
            .collect();
        let tail = &children[count - 12..];
        for pair in tail.windows(2) {
            assert_eq!(tree.compare_document_order(pair[0], pair[1]), Ordering::Less);
        }
        assert_eq!(
            tree.path(children[count - 1]).unwrap().ordinal(),
            Some(count as u32 - 1)
        );
    }

    #[test]
    fn test_document_order_comparison() {
        let (mut tree, div, span, text) = sample();
        let loose = tree.create_element("i");
        assert_eq!(tree.compare_document_order(div, text), Ordering::Less);
        assert_eq!(tree.compare_document_order(text, span), Ordering::Greater);
        assert_eq!(tree.compare_document_order(loose, div), Ordering::Greater);
    }
}
