//! Selection Set
//!
//! Ordered, reference-unique collection of nodes. A selection starts as a
//! read-only view over a source sequence with a declared input order and
//! becomes an owned `IndexSet` on its first mutation. Output in document
//! order (ascending or descending by node path) is computed on demand and
//! cached until the selection or the tree changes.
//!
//! Equality is node identity (`NodeId`), never node content.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexSet;

use crate::error::{DomError, DomResult};
use crate::tree::DomTree;
use crate::NodeId;

/// Order in which a selection yields its nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionOrder {
    /// Order of addition (or of the source sequence)
    #[default]
    OrderAdded,
    /// Document order
    Ascending,
    /// Reverse document order
    Descending,
}

/// Provides document order for sorting selections
pub trait DocumentOrder {
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering;

    /// Changes whenever the order of existing nodes may have changed
    fn order_generation(&self) -> u64 {
        0
    }
}

impl DocumentOrder for DomTree {
    fn compare_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        self.compare_document_order(a, b)
    }

    fn order_generation(&self) -> u64 {
        self.generation()
    }
}

type Source = Box<dyn Iterator<Item = NodeId>>;

/// Read-only projection of a source sequence, enumerated at most once
struct View {
    source: RefCell<Option<Source>>,
    items: OnceCell<Vec<NodeId>>,
    input_order: SelectionOrder,
}

impl View {
    fn items(&self) -> &[NodeId] {
        self.items.get_or_init(|| {
            let source = self.source.borrow_mut().take();
            let mut seen = HashSet::new();
            source
                .into_iter()
                .flatten()
                .filter(|id| seen.insert(*id))
                .collect()
        })
    }
}

enum Backing {
    View(View),
    Owned(IndexSet<NodeId>),
}

struct OrderedCache {
    order: SelectionOrder,
    generation: u64,
    nodes: Vec<NodeId>,
}

/// Ordered set of node references
pub struct SelectionSet {
    backing: Backing,
    output_order: SelectionOrder,
    ordered: RefCell<Option<OrderedCache>>,
}

impl SelectionSet {
    /// Empty selection
    pub fn new(output_order: SelectionOrder) -> Self {
        Self {
            backing: Backing::Owned(IndexSet::new()),
            output_order,
            ordered: RefCell::new(None),
        }
    }

    /// Selection over `source`, which is not enumerated until first read.
    ///
    /// `input_order` declares the order `source` yields nodes in; no
    /// sorting happens when it matches the output order.
    pub fn from_source<I>(
        source: I,
        input_order: SelectionOrder,
        output_order: SelectionOrder,
    ) -> Self
    where
        I: IntoIterator<Item = NodeId>,
        I::IntoIter: 'static,
    {
        Self {
            backing: Backing::View(View {
                source: RefCell::new(Some(Box::new(source.into_iter()))),
                items: OnceCell::new(),
                input_order,
            }),
            output_order,
            ordered: RefCell::new(None),
        }
    }

    pub fn output_order(&self) -> SelectionOrder {
        self.output_order
    }

    /// Change the output order. The underlying insertion order is kept.
    pub fn set_output_order(&mut self, order: SelectionOrder) {
        self.output_order = order;
    }

    /// Builder form of [`set_output_order`](Self::set_output_order)
    pub fn with_order(mut self, order: SelectionOrder) -> Self {
        self.output_order = order;
        self
    }

    /// Whether the selection still projects its source
    pub fn is_materialized(&self) -> bool {
        matches!(self.backing, Backing::Owned(_))
    }

    /// Number of nodes; enumerates the source once if not yet done
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::View(view) => view.items().len(),
            Backing::Owned(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, node: NodeId) -> bool {
        match &self.backing {
            Backing::View(view) => view.items().contains(&node),
            Backing::Owned(set) => set.contains(&node),
        }
    }

    /// Nodes in insertion order
    fn added(&self) -> Box<dyn Iterator<Item = NodeId> + '_> {
        match &self.backing {
            Backing::View(view) => Box::new(view.items().iter().copied()),
            Backing::Owned(set) => Box::new(set.iter().copied()),
        }
    }

    /// Nodes in insertion order, ignoring the output order
    pub fn added_order(&self) -> Vec<NodeId> {
        self.added().collect()
    }

    /// Nodes in the current output order
    pub fn to_vec<D: DocumentOrder + ?Sized>(&self, doc: &D) -> Vec<NodeId> {
        let input_order = match &self.backing {
            Backing::View(view) => view.input_order,
            Backing::Owned(_) => SelectionOrder::OrderAdded,
        };
        if self.output_order == input_order || self.output_order == SelectionOrder::OrderAdded {
            return self.added_order();
        }

        let generation = doc.order_generation();
        if let Some(cache) = self.ordered.borrow().as_ref() {
            if cache.order == self.output_order && cache.generation == generation {
                return cache.nodes.clone();
            }
        }

        let mut nodes = self.added_order();
        match (input_order, self.output_order) {
            (SelectionOrder::Ascending, SelectionOrder::Descending)
            | (SelectionOrder::Descending, SelectionOrder::Ascending) => nodes.reverse(),
            (_, SelectionOrder::Ascending) => nodes.sort_by(|a, b| doc.compare_nodes(*a, *b)),
            (_, SelectionOrder::Descending) => nodes.sort_by(|a, b| doc.compare_nodes(*b, *a)),
            (_, SelectionOrder::OrderAdded) => {}
        }

        *self.ordered.borrow_mut() = Some(OrderedCache {
            order: self.output_order,
            generation,
            nodes: nodes.clone(),
        });
        nodes
    }

    /// Iterate in the current output order
    pub fn iter<D: DocumentOrder + ?Sized>(&self, doc: &D) -> std::vec::IntoIter<NodeId> {
        self.to_vec(doc).into_iter()
    }

    /// Node at `index` in the current output order
    pub fn get<D: DocumentOrder + ?Sized>(&self, index: usize, doc: &D) -> Option<NodeId> {
        if self.output_order == SelectionOrder::OrderAdded {
            return match &self.backing {
                Backing::View(view) => view.items().get(index).copied(),
                Backing::Owned(set) => set.get_index(index).copied(),
            };
        }
        self.to_vec(doc).get(index).copied()
    }

    /// Switch to the owned representation and drop cached orderings
    fn materialize(&mut self) -> &mut IndexSet<NodeId> {
        self.ordered.get_mut().take();
        if let Backing::View(view) = &self.backing {
            let set: IndexSet<NodeId> = view.items().iter().copied().collect();
            tracing::trace!("Materializing selection of {} nodes", set.len());
            self.backing = Backing::Owned(set);
        }
        match &mut self.backing {
            Backing::Owned(set) => set,
            Backing::View(_) => unreachable!("selection was materialized above"),
        }
    }

    /// Add a node; `false` if it was already present
    pub fn add(&mut self, node: NodeId) -> bool {
        self.materialize().insert(node)
    }

    /// Remove a node; `false` if it was not present
    pub fn remove(&mut self, node: NodeId) -> bool {
        self.materialize().shift_remove(&node)
    }

    pub fn clear(&mut self) {
        self.materialize().clear();
    }

    /// Insert at `index` of the insertion order. A node already present is
    /// left where it is and `false` is returned.
    pub fn insert(&mut self, index: usize, node: NodeId) -> DomResult<bool> {
        let set = self.materialize();
        if index > set.len() {
            return Err(DomError::IndexOutOfRange { index, len: set.len() });
        }
        if set.contains(&node) {
            return Ok(false);
        }
        set.shift_insert(index, node);
        Ok(true)
    }

    /// Replace the node at `index` of the insertion order, returning the
    /// node that was there. If `node` was present elsewhere it moves.
    pub fn set(&mut self, index: usize, node: NodeId) -> DomResult<NodeId> {
        let set = self.materialize();
        let len = set.len();
        let Some(old) = set.shift_remove_index(index) else {
            return Err(DomError::IndexOutOfRange { index, len });
        };
        let mut target = index;
        if let Some(existing) = set.get_index_of(&node) {
            set.shift_remove_index(existing);
            if existing < target {
                target -= 1;
            }
        }
        set.shift_insert(target.min(set.len()), node);
        Ok(old)
    }

    /// Remove the node at `index` of the insertion order
    pub fn remove_at(&mut self, index: usize) -> DomResult<NodeId> {
        let set = self.materialize();
        let len = set.len();
        set.shift_remove_index(index)
            .ok_or(DomError::IndexOutOfRange { index, len })
    }

    pub fn union_with(&mut self, other: impl IntoIterator<Item = NodeId>) {
        let set = self.materialize();
        set.extend(other);
    }

    pub fn intersect_with(&mut self, other: impl IntoIterator<Item = NodeId>) {
        let keep: HashSet<NodeId> = other.into_iter().collect();
        self.materialize().retain(|id| keep.contains(id));
    }

    pub fn except_with(&mut self, other: impl IntoIterator<Item = NodeId>) {
        let set = self.materialize();
        for id in other {
            set.shift_remove(&id);
        }
    }

    /// Keep nodes present in exactly one of the two collections
    pub fn symmetric_except_with(&mut self, other: impl IntoIterator<Item = NodeId>) {
        let mut seen = HashSet::new();
        let set = self.materialize();
        for id in other {
            if !seen.insert(id) {
                continue;
            }
            if !set.shift_remove(&id) {
                set.insert(id);
            }
        }
    }

    fn members(&self) -> HashSet<NodeId> {
        self.added().collect()
    }

    pub fn is_subset_of(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let other: HashSet<NodeId> = other.into_iter().collect();
        self.added().all(|id| other.contains(&id))
    }

    pub fn is_superset_of(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let mine = self.members();
        other.into_iter().all(|id| mine.contains(&id))
    }

    pub fn is_proper_subset_of(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let other: HashSet<NodeId> = other.into_iter().collect();
        let mine = self.members();
        mine.len() < other.len() && mine.is_subset(&other)
    }

    pub fn is_proper_superset_of(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let other: HashSet<NodeId> = other.into_iter().collect();
        let mine = self.members();
        mine.len() > other.len() && mine.is_superset(&other)
    }

    /// Whether any node is shared
    pub fn overlaps(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let mine = self.members();
        other.into_iter().any(|id| mine.contains(&id))
    }

    /// Same members, regardless of order
    pub fn set_equals(&self, other: impl IntoIterator<Item = NodeId>) -> bool {
        let other: HashSet<NodeId> = other.into_iter().collect();
        self.members() == other
    }

    /// Copy the selection, deep-cloning every node. The copies are detached
    /// and listed in this selection's output order.
    pub fn deep_clone(&self, tree: &mut DomTree) -> DomResult<SelectionSet> {
        let nodes = self.to_vec(&*tree);
        let mut copy = SelectionSet::new(self.output_order);
        for node in nodes {
            let cloned = tree.clone_subtree(node)?;
            copy.add(cloned);
        }
        Ok(copy)
    }
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new(SelectionOrder::OrderAdded)
    }
}

impl FromIterator<NodeId> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            backing: Backing::Owned(iter.into_iter().collect()),
            output_order: SelectionOrder::OrderAdded,
            ordered: RefCell::new(None),
        }
    }
}

impl Extend<NodeId> for SelectionSet {
    fn extend<T: IntoIterator<Item = NodeId>>(&mut self, iter: T) {
        self.union_with(iter);
    }
}

impl fmt::Debug for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SelectionSet");
        debug.field("output_order", &self.output_order);
        match &self.backing {
            Backing::View(view) => match view.items.get() {
                Some(items) => debug.field("view", items),
                None => debug.field("view", &"<not enumerated>"),
            },
            Backing::Owned(set) => debug.field("owned", set),
        };
        debug.finish()
    }
}
