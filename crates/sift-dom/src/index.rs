//! Path-Indexed Store
//!
//! Sorted associative structure over token-path keys. Exact lookups go
//! through a hash map; prefix scans walk a sorted key set bounded by
//! `prefix` and `prefix + SENTINEL`. The two are kept in lock-step.
//!
//! Keys come in two shapes inside a [`Document`](crate::Document): a bare
//! node path, or a selector code followed by a node path (see
//! [`SelectorTable`]).

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use crate::path::{PathComparer, PathSegment};
use crate::token::Token;
use crate::NodeId;

type Key = Box<[PathSegment]>;

/// Key of the sorted set, ordered by [`PathComparer`]
#[derive(Debug, Clone, PartialEq, Eq)]
struct SortedKey(Key);

impl Ord for SortedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        PathComparer::compare(&self.0, &other.0)
    }
}

impl PartialOrd for SortedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&[PathSegment]> for SortedKey {
    fn from(key: &[PathSegment]) -> Self {
        Self(key.into())
    }
}

/// Range-queryable map from token paths to nodes
#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    lookup: HashMap<Key, NodeId>,
    keys: BTreeSet<SortedKey>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the node previously stored
    /// under `key`
    pub fn add(&mut self, key: &[PathSegment], node: NodeId) -> Option<NodeId> {
        PathComparer::validate(key);
        let previous = self.lookup.insert(key.into(), node);
        if previous.is_none() {
            self.keys.insert(key.into());
        }
        previous
    }

    /// Remove an entry; `None` when the key was not present
    pub fn remove(&mut self, key: &[PathSegment]) -> Option<NodeId> {
        let node = self.lookup.remove(key)?;
        self.keys.remove(&SortedKey::from(key));
        Some(node)
    }

    pub fn get(&self, key: &[PathSegment]) -> Option<NodeId> {
        self.lookup.get(key).copied()
    }

    pub fn contains(&self, key: &[PathSegment]) -> bool {
        self.lookup.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn clear(&mut self) {
        self.lookup.clear();
        self.keys.clear();
    }

    /// Keys starting with `prefix`, in path order (the prefix itself first
    /// when present)
    pub fn range_keys<'a>(
        &'a self,
        prefix: &[PathSegment],
    ) -> impl Iterator<Item = &'a [PathSegment]> + 'a {
        let start = SortedKey::from(prefix);
        let end = SortedKey(PathComparer::upper_bound(prefix).into_boxed_slice());
        self.keys
            .range((Bound::Included(start), Bound::Excluded(end)))
            .map(|k| &*k.0)
    }

    /// Nodes under `prefix`. Depth counts tree levels, so a large sibling
    /// ordinal spelled with several segments is still one level.
    ///
    /// * `depth == 0`, no descendants: the exact entry for `prefix`
    /// * `depth == d`, no descendants: keys exactly `d` levels deeper
    /// * `include_descendants`: keys at least `d` levels deeper
    pub fn range(
        &self,
        prefix: &[PathSegment],
        depth: usize,
        include_descendants: bool,
    ) -> Vec<NodeId> {
        if depth == 0 && !include_descendants {
            return self.get(prefix).into_iter().collect();
        }
        self.range_keys(prefix)
            .filter(|key| {
                let levels = PathComparer::levels(&key[prefix.len()..]);
                match include_descendants {
                    true => levels >= depth,
                    false => levels == depth,
                }
            })
            .filter_map(|key| self.lookup.get(key).copied())
            .collect()
    }

    /// All entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&[PathSegment], NodeId)> + '_ {
        self.keys.iter().map(|k| (&*k.0, self.lookup[&k.0]))
    }
}

/// What a selector-index entry matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector<'a> {
    Tag(Token),
    Id(&'a str),
    Class(&'a str),
    Attribute(Token),
}

impl From<Token> for Selector<'_> {
    fn from(tag: Token) -> Self {
        Selector::Tag(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SelectorName {
    Tag(Token),
    Id(Box<str>),
    Class(Box<str>),
    Attribute(Token),
}

impl From<Selector<'_>> for SelectorName {
    fn from(selector: Selector<'_>) -> Self {
        match selector {
            Selector::Tag(tag) => SelectorName::Tag(tag),
            Selector::Id(id) => SelectorName::Id(id.into()),
            Selector::Class(class) => SelectorName::Class(class.into()),
            Selector::Attribute(name) => SelectorName::Attribute(name),
        }
    }
}

/// Per-document codes for selector-index keys
///
/// Id values and class names are document content, so their codes live
/// with the document rather than in the process-wide token registry. A
/// code is the leading segment of a selector key; codes are handed out in
/// first-seen order and never reused.
#[derive(Debug, Clone)]
pub struct SelectorTable {
    codes: HashMap<SelectorName, PathSegment>,
    limit: usize,
    exhausted: bool,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self::with_limit(Token::SENTINEL.0 as usize)
    }
}

impl SelectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that stops handing out codes after `limit` selectors
    pub fn with_limit(limit: usize) -> Self {
        Self {
            codes: HashMap::new(),
            limit: limit.min(Token::SENTINEL.0 as usize),
            exhausted: false,
        }
    }

    /// Code for `selector`, assigning the next free one. `None` once the
    /// code space is used up; such selectors are left out of the index.
    pub fn code(&mut self, selector: Selector<'_>) -> Option<PathSegment> {
        let name = SelectorName::from(selector);
        if let Some(&code) = self.codes.get(&name) {
            return Some(code);
        }
        let next = self.codes.len();
        if next >= self.limit {
            if !self.exhausted {
                tracing::warn!(
                    "selector code space exhausted at {:?}, later selectors are not indexed",
                    name
                );
                self.exhausted = true;
            }
            return None;
        }
        let code = next as PathSegment;
        self.codes.insert(name, code);
        Some(code)
    }

    /// Existing code for `selector`, without assigning
    pub fn lookup(&self, selector: Selector<'_>) -> Option<PathSegment> {
        self.codes.get(&SelectorName::from(selector)).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
        self.exhausted = false;
    }

    /// `code` followed by `path`
    pub fn key(code: PathSegment, path: &[PathSegment]) -> Vec<PathSegment> {
        let mut key = Vec::with_capacity(path.len() + 1);
        key.push(code);
        key.extend_from_slice(path);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(keys: &[&[u16]]) -> PathIndex {
        let mut index = PathIndex::new();
        for (i, key) in keys.iter().enumerate() {
            index.add(key, NodeId(i as u32));
        }
        index
    }

    #[test]
    fn test_exact_lookup() {
        let index = index_of(&[&[0], &[0, 1]]);
        assert_eq!(index.get(&[0, 1]), Some(NodeId(1)));
        assert_eq!(index.range(&[0], 0, false), vec![NodeId(0)]);
        assert_eq!(index.get(&[2]), None);
    }

    #[test]
    fn test_range_keys_in_order() {
        let index = index_of(&[&[0, 2], &[0], &[1], &[0, 1, 0], &[0, 1]]);
        let keys: Vec<&[u16]> = index.range_keys(&[0]).collect();
        let expected: Vec<&[u16]> = vec![&[0], &[0, 1], &[0, 1, 0], &[0, 2]];
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_depth_bounded_range() {
        let index = index_of(&[&[0], &[0, 0], &[0, 1], &[0, 1, 0], &[1]]);
        assert_eq!(index.range(&[0], 1, false), vec![NodeId(1), NodeId(2)]);
        assert_eq!(index.range(&[0], 2, false), vec![NodeId(3)]);
        assert_eq!(
            index.range(&[0], 0, true),
            vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]
        );
        assert_eq!(index.range(&[0], 1, true), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn test_remove_keeps_structures_in_sync() {
        let mut index = index_of(&[&[0], &[0, 0]]);
        assert_eq!(index.remove(&[0, 0]), Some(NodeId(1)));
        assert_eq!(index.remove(&[0, 0]), None);
        assert_eq!(index.len(), 1);
        assert_eq!(index.range_keys(&[]).count(), 1);
    }

    #[test]
    fn test_replace_does_not_duplicate_key() {
        let mut index = PathIndex::new();
        assert_eq!(index.add(&[4], NodeId(1)), None);
        assert_eq!(index.add(&[4], NodeId(2)), Some(NodeId(1)));
        assert_eq!(index.iter().count(), 1);
        assert_eq!(index.get(&[4]), Some(NodeId(2)));
    }

    #[test]
    fn test_escaped_ordinals_count_as_one_level() {
        use crate::path::NodePath;

        let parent = NodePath::root().child(0);
        let near = parent.child(3);
        let far = parent.child(80_000);
        let below = far.child(0);
        let mut index = PathIndex::new();
        index.add(parent.as_slice(), NodeId(0));
        index.add(near.as_slice(), NodeId(1));
        index.add(far.as_slice(), NodeId(2));
        index.add(below.as_slice(), NodeId(3));

        assert_eq!(index.range(parent.as_slice(), 1, false), vec![NodeId(1), NodeId(2)]);
        assert_eq!(index.range(parent.as_slice(), 2, false), vec![NodeId(3)]);
        assert_eq!(index.range(far.as_slice(), 1, true), vec![NodeId(3)]);
    }

    #[test]
    fn test_selector_codes_are_disjoint() {
        let mut table = SelectorTable::new();
        let id = table.code(Selector::Id("title")).unwrap();
        let class = table.code(Selector::Class("title")).unwrap();
        let attr = table.code(Selector::Attribute(Token::TITLE)).unwrap();
        let tag = table.code(Token::TITLE.into()).unwrap();
        let codes = [id, class, attr, tag];
        for (i, a) in codes.iter().enumerate() {
            assert!(codes[i + 1..].iter().all(|b| a != b));
        }
        assert_eq!(table.code(Selector::Id("title")), Some(id));
        assert_eq!(table.lookup(Selector::Class("title")), Some(class));
        assert_eq!(table.lookup(Selector::Class("other")), None);
        assert_eq!(SelectorTable::key(7, &[0, 3]), vec![7, 0, 3]);
    }

    #[test]
    fn test_selector_table_limit() {
        let mut table = SelectorTable::with_limit(2);
        assert_eq!(table.code(Selector::Class("a")), Some(0));
        assert_eq!(table.code(Selector::Class("b")), Some(1));
        assert_eq!(table.code(Selector::Class("c")), None);
        assert_eq!(table.code(Selector::Class("a")), Some(0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup(Selector::Class("c")), None);
    }
}
