//! Document - High-level document API
//!
//! Owns a [`DomTree`] together with two [`PathIndex`]es: one keyed by node
//! path, one keyed by a per-document selector code followed by node path. While indexing
//! is enabled every structural or attribute change made through this type
//! keeps both indexes in step with the tree. During bulk construction the
//! indexes can be suspended and rebuilt once at the end.

use crate::error::{DomError, DomResult};
use crate::index::{PathIndex, Selector, SelectorTable};
use crate::node::Node;
use crate::path::PathSegment;
use crate::selection::{DocumentOrder, SelectionOrder, SelectionSet};
use crate::token::{self, Token};
use crate::tree::DomTree;
use crate::NodeId;

/// HTML Document
#[derive(Debug, Clone)]
pub struct Document {
    tree: DomTree,
    nodes: PathIndex,
    selectors: PathIndex,
    codes: SelectorTable,
    indexing: bool,
}

impl Document {
    /// Create an empty document with indexing enabled
    pub fn new() -> Self {
        Self::from_tree(DomTree::new())
    }

    /// Create an empty fragment with indexing enabled
    pub fn new_fragment() -> Self {
        Self::from_tree(DomTree::new_fragment())
    }

    /// Wrap an existing tree and index it
    pub fn from_tree(tree: DomTree) -> Self {
        let mut doc = Self::unindexed(tree);
        doc.enable_indexing();
        doc
    }

    /// Wrap a tree without building indexes
    pub fn unindexed(tree: DomTree) -> Self {
        Self {
            tree,
            nodes: PathIndex::new(),
            selectors: PathIndex::new(),
            codes: SelectorTable::new(),
            indexing: false,
        }
    }

    /// The underlying tree
    #[inline]
    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    /// Mutable access to the tree. Changes made here are not reflected in
    /// the indexes until [`rebuild_indexes`](Self::rebuild_indexes).
    #[inline]
    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn is_indexing(&self) -> bool {
        self.indexing
    }

    /// Stop maintaining the indexes and drop their contents
    pub fn suspend_indexing(&mut self) {
        self.indexing = false;
        self.nodes.clear();
        self.selectors.clear();
    }

    /// Start maintaining the indexes, rebuilding them from the tree.
    /// Deferred tree paths are resolved first.
    pub fn enable_indexing(&mut self) {
        self.tree.resolve_paths();
        self.indexing = true;
        self.rebuild_indexes();
    }

    /// Reindex every attached node
    pub fn rebuild_indexes(&mut self) {
        self.nodes.clear();
        self.selectors.clear();
        self.codes.clear();
        if !self.indexing {
            return;
        }
        self.index_subtree(self.tree.root());
        tracing::debug!(
            "Indexed {} nodes, {} selector keys",
            self.nodes.len(),
            self.selectors.len()
        );
    }

    /// Node index: bare node paths
    pub fn node_index(&self) -> &PathIndex {
        &self.nodes
    }

    /// Selector index: selector code followed by node path
    pub fn selector_index(&self) -> &PathIndex {
        &self.selectors
    }

    /// Codes leading the selector-index keys of this document
    pub fn selector_codes(&self) -> &SelectorTable {
        &self.codes
    }

    // ===== Creation =====

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.tree.create_element(name)
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.tree.create_text(content)
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.tree.create_comment(content)
    }

    // ===== Indexed mutation =====

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        if !self.indexing {
            return self.tree.append_child(parent, child);
        }
        let mut affected = vec![child];
        affected.extend(self.following_siblings(child));
        self.reindexing(affected, |tree| tree.append_child(parent, child))
    }

    /// Insert `child` before `reference`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> DomResult<()> {
        if !self.indexing {
            return self.tree.insert_before(parent, child, reference);
        }
        let mut affected = vec![child];
        affected.extend(self.following_siblings(child));
        affected.push(reference);
        affected.extend(self.following_siblings(reference));
        self.reindexing(affected, |tree| tree.insert_before(parent, child, reference))
    }

    /// Detach a node (and its subtree) from the document
    pub fn remove(&mut self, id: NodeId) -> DomResult<()> {
        if !self.indexing {
            return self.tree.detach(id);
        }
        let mut affected = vec![id];
        affected.extend(self.following_siblings(id));
        self.reindexing(affected, |tree| tree.detach(id))
    }

    /// Append character data to `parent`, extending a trailing text node
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> DomResult<NodeId> {
        let id = self.tree.append_text(parent, text)?;
        if self.indexing {
            self.index_node(id);
        }
        Ok(id)
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> DomResult<Option<String>> {
        let name = token::intern(name);
        self.reindexing_node(id, |tree| {
            let element = tree.element_mut(id).ok_or(DomError::NotAnElement(id))?;
            Ok(element.set_attr(name, value))
        })
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> DomResult<Option<String>> {
        let Some(name) = token::registry().lookup(name, false) else {
            return Ok(None);
        };
        self.reindexing_node(id, |tree| {
            let element = tree.element_mut(id).ok_or(DomError::NotAnElement(id))?;
            Ok(element.remove_attr(name))
        })
    }

    fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let mut siblings = Vec::new();
        let mut next = self.tree.get(id).map_or(NodeId::NONE, |n| n.next_sibling);
        while let Some(node) = self.tree.get(next) {
            siblings.push(next);
            next = node.next_sibling;
        }
        siblings
    }

    /// Run a structural change, unindexing the subtrees rooted at `affected`
    /// before and reindexing them after
    fn reindexing<T>(
        &mut self,
        affected: Vec<NodeId>,
        change: impl FnOnce(&mut DomTree) -> DomResult<T>,
    ) -> DomResult<T> {
        for &id in &affected {
            self.unindex_subtree(id);
        }
        let result = change(&mut self.tree);
        for &id in &affected {
            self.index_subtree(id);
        }
        result
    }

    fn reindexing_node<T>(
        &mut self,
        id: NodeId,
        change: impl FnOnce(&mut DomTree) -> DomResult<T>,
    ) -> DomResult<T> {
        if !self.indexing {
            return change(&mut self.tree);
        }
        self.unindex_node(id);
        let result = change(&mut self.tree);
        self.index_node(id);
        result
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        if self.tree.get(id).is_none() {
            return Vec::new();
        }
        std::iter::once(id).chain(self.tree.descendants(id)).collect()
    }

    fn index_subtree(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.index_node(node);
        }
    }

    fn unindex_subtree(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.unindex_node(node);
        }
    }

    fn index_node(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id).filter(|n| n.is_attached()) else {
            return;
        };
        let path = node.path().as_slice();
        if !insert_unique(&mut self.nodes, path, id) {
            return;
        }
        for selector in selectors_of(node) {
            if let Some(code) = self.codes.code(selector) {
                insert_unique(&mut self.selectors, &SelectorTable::key(code, path), id);
            }
        }
    }

    fn unindex_node(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id).filter(|n| n.is_attached()) else {
            return;
        };
        let path = node.path().as_slice();
        if self.nodes.get(path) == Some(id) {
            self.nodes.remove(path);
        }
        for selector in selectors_of(node) {
            let Some(code) = self.codes.lookup(selector) else {
                continue;
            };
            let key = SelectorTable::key(code, path);
            if self.selectors.get(&key) == Some(id) {
                self.selectors.remove(&key);
            }
        }
    }

    // ===== Queries =====

    /// Node stored at an exact path
    pub fn node_at(&self, path: &[PathSegment]) -> Option<NodeId> {
        self.nodes.get(path)
    }

    /// Range query over the node index
    pub fn range(
        &self,
        prefix: &[PathSegment],
        depth: usize,
        include_descendants: bool,
    ) -> Vec<NodeId> {
        self.nodes.range(prefix, depth, include_descendants)
    }

    /// Range query over the selector index for one selector; a bare
    /// [`Token`] selects by tag
    pub fn selector_range<'a>(
        &self,
        selector: impl Into<Selector<'a>>,
        prefix: &[PathSegment],
        depth: usize,
        include_descendants: bool,
    ) -> Vec<NodeId> {
        let Some(code) = self.codes.lookup(selector.into()) else {
            return Vec::new();
        };
        let key = SelectorTable::key(code, prefix);
        self.selectors.range(&key, depth, include_descendants)
    }

    fn select(&self, selector: Option<Selector<'_>>) -> SelectionSet {
        let nodes = match selector {
            Some(selector) => self.selector_range(selector, &[], 0, true),
            None => Vec::new(),
        };
        SelectionSet::from_source(nodes, SelectionOrder::Ascending, SelectionOrder::Ascending)
    }

    /// Elements with the given tag name, in document order
    pub fn elements_by_tag(&self, name: &str) -> SelectionSet {
        self.select(token::registry().lookup(name, false).map(Selector::Tag))
    }

    /// First element with the given id in document order
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.selector_range(Selector::Id(id), &[], 0, true)
            .into_iter()
            .next()
    }

    /// Elements carrying a class, in document order
    pub fn elements_by_class(&self, class: &str) -> SelectionSet {
        self.select(Some(Selector::Class(class)))
    }

    /// Elements carrying an attribute, in document order
    pub fn elements_with_attribute(&self, name: &str) -> SelectionSet {
        self.select(token::registry().lookup(name, false).map(Selector::Attribute))
    }

    /// Descendants of `id` with the given tag, from the selector index
    pub fn descendants_by_tag(&self, id: NodeId, name: &str) -> SelectionSet {
        let tag = token::registry().lookup(name, false);
        let (Some(tag), Some(path)) = (tag, self.tree.path(id)) else {
            return self.select(None);
        };
        let selector = Selector::Tag(tag);
        let nodes = self.selector_range(selector, path.as_slice(), 1, true);
        SelectionSet::from_source(nodes, SelectionOrder::Ascending, SelectionOrder::Ascending)
    }

    fn child_by_tag(&self, parent: NodeId, tag: Token) -> Option<NodeId> {
        self.tree.children(parent).find(|&c| self.tree.tag(c) == tag)
    }

    /// `<html>` element
    pub fn html(&self) -> Option<NodeId> {
        self.child_by_tag(self.root(), Token::HTML)
    }

    /// `<head>` element
    pub fn head(&self) -> Option<NodeId> {
        self.child_by_tag(self.html()?, Token::HEAD)
    }

    /// `<body>` element
    pub fn body(&self) -> Option<NodeId> {
        self.child_by_tag(self.html()?, Token::BODY)
    }

    /// Text of the first `<title>` in `<head>`
    pub fn title(&self) -> String {
        self.head()
            .and_then(|head| self.child_by_tag(head, Token::TITLE))
            .map(|title| self.tree.text_content(title))
            .unwrap_or_default()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentOrder for Document {
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> std::cmp::Ordering {
        self.tree.compare_document_order(a, b)
    }

    fn order_generation(&self) -> u64 {
        self.tree.generation()
    }
}

/// Selectors a node is indexed under
fn selectors_of(node: &Node) -> Vec<Selector<'_>> {
    let Some(element) = node.as_element() else {
        return Vec::new();
    };
    let mut selectors = vec![Selector::Tag(element.name)];
    if let Some(id) = element.id() {
        selectors.push(Selector::Id(id));
    }
    selectors.extend(element.classes.iter().map(|c| Selector::Class(c)));
    selectors.extend(element.attrs.iter().map(|a| Selector::Attribute(a.name)));
    selectors
}

/// Add `key`, keeping an existing entry that belongs to another node
fn insert_unique(index: &mut PathIndex, key: &[PathSegment], id: NodeId) -> bool {
    match index.get(key) {
        Some(existing) if existing != id => {
            tracing::warn!("index key {:?} already held by {:?}, skipping {:?}", key, existing, id);
            false
        }
        _ => {
            index.add(key, id);
            true
        }
    }
}
