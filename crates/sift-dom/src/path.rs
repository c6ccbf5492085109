//! Node paths and the path comparer
//!
//! A node path holds one level per tree depth: the node's ordinal among
//! its siblings. The document root has the empty path. Lexicographic
//! order over paths is document (pre-order) order, and every descendant of
//! a node carries that node's path as a prefix.
//!
//! Ordinals below [`ORDINAL_ESCAPE`] take one segment. Larger ordinals are
//! written as the escape segment followed by two base-`0xFFFF` digits, so
//! they still sort after every single-segment sibling and the sentinel
//! never appears inside a key.

use std::cmp::Ordering;
use std::fmt;

use crate::token::Token;

/// One segment of a path key
pub type PathSegment = u16;

/// Leading segment of a three-segment ordinal
pub const ORDINAL_ESCAPE: PathSegment = Token::SENTINEL.0 - 1;

const DIGIT_RADIX: u32 = Token::SENTINEL.0 as u32;

/// Largest ordinal a node can have among its siblings
pub const MAX_ORDINAL: u32 = ORDINAL_ESCAPE as u32 + DIGIT_RADIX * DIGIT_RADIX - 1;

/// Position of a node in its tree
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    /// Path of the document root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of this node's child at `ordinal`
    pub fn child(&self, ordinal: u32) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 3);
        segments.extend_from_slice(&self.0);
        push_ordinal(&mut segments, ordinal);
        Self(segments)
    }

    /// Number of levels below the root
    pub fn depth(&self) -> usize {
        PathComparer::levels(&self.0)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[PathSegment] {
        &self.0
    }

    /// Sibling ordinals from the top level down
    pub fn ordinals(&self) -> Ordinals<'_> {
        Ordinals { segments: &self.0 }
    }

    /// Ordinal among siblings; `None` for the root
    pub fn ordinal(&self) -> Option<u32> {
        self.ordinals().last()
    }

    /// Whether `self` is `other` or one of its descendants
    pub fn starts_with(&self, other: &NodePath) -> bool {
        self.0.starts_with(&other.0)
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

fn push_ordinal(segments: &mut Vec<PathSegment>, ordinal: u32) {
    if ordinal < ORDINAL_ESCAPE as u32 {
        segments.push(ordinal as PathSegment);
        return;
    }
    let ordinal = if ordinal > MAX_ORDINAL {
        tracing::warn!("sibling ordinal {} exceeds path range, clamping", ordinal);
        MAX_ORDINAL
    } else {
        ordinal
    };
    let offset = ordinal - ORDINAL_ESCAPE as u32;
    segments.push(ORDINAL_ESCAPE);
    segments.push((offset / DIGIT_RADIX) as PathSegment);
    segments.push((offset % DIGIT_RADIX) as PathSegment);
}

/// Iterator over the ordinals of a path
pub struct Ordinals<'a> {
    segments: &'a [PathSegment],
}

impl Iterator for Ordinals<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let (&first, rest) = self.segments.split_first()?;
        if first != ORDINAL_ESCAPE {
            self.segments = rest;
            return Some(first as u32);
        }
        match rest {
            [high, low, tail @ ..] => {
                self.segments = tail;
                Some(ORDINAL_ESCAPE as u32 + *high as u32 * DIGIT_RADIX + *low as u32)
            }
            _ => {
                self.segments = &[];
                None
            }
        }
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        PathComparer::validate(&segments);
        Self(segments)
    }
}

impl AsRef<[PathSegment]> for NodePath {
    fn as_ref(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for ordinal in self.ordinals() {
            write!(f, "/{ordinal}")?;
        }
        Ok(())
    }
}

/// Total order over token-path keys
///
/// Keys compare segment by segment; a proper prefix sorts before every
/// key it prefixes. This is the order of the sorted key set inside
/// [`PathIndex`](crate::PathIndex).
#[derive(Debug, Clone, Copy, Default)]
pub struct PathComparer;

impl PathComparer {
    #[inline]
    pub fn compare(a: &[PathSegment], b: &[PathSegment]) -> Ordering {
        for (x, y) in a.iter().zip(b) {
            match x.cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.len().cmp(&b.len())
    }

    /// Exclusive end key of a prefix scan: `prefix` followed by the sentinel
    pub fn upper_bound(prefix: &[PathSegment]) -> Vec<PathSegment> {
        let mut end = Vec::with_capacity(prefix.len() + 1);
        end.extend_from_slice(prefix);
        end.push(Token::SENTINEL.0);
        end
    }

    /// Number of tree levels spelled by a run of path segments
    pub fn levels(segments: &[PathSegment]) -> usize {
        Ordinals { segments }.count()
    }

    /// Abort on a key that embeds the reserved sentinel
    pub fn validate(key: &[PathSegment]) {
        assert!(
            !key.contains(&Token::SENTINEL.0),
            "malformed path key {key:?}: contains the reserved sentinel"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(PathComparer::compare(&[0, 1], &[0, 1, 0]), Ordering::Less);
        assert_eq!(PathComparer::compare(&[0, 2], &[0, 1, 7]), Ordering::Greater);
        assert_eq!(PathComparer::compare(&[3], &[3]), Ordering::Equal);
    }

    #[test]
    fn test_comparer_agrees_with_slice_order() {
        let keys: [&[u16]; 5] = [&[], &[0], &[0, 0], &[0, 1], &[1]];
        for a in keys {
            for b in keys {
                assert_eq!(PathComparer::compare(a, b), a.cmp(b));
            }
        }
    }

    #[test]
    fn test_upper_bound_excludes_siblings() {
        let end = PathComparer::upper_bound(&[0, 1]);
        assert_eq!(
            PathComparer::compare(&[0, 1, ORDINAL_ESCAPE, 4, 4], &end),
            Ordering::Less
        );
        assert_eq!(PathComparer::compare(&[0, 2], &end), Ordering::Greater);
    }

    #[test]
    fn test_child_paths() {
        let root = NodePath::root();
        let child = root.child(2).child(0);
        assert_eq!(child.as_slice(), &[2, 0]);
        assert_eq!(child.depth(), 2);
        assert!(child.starts_with(&root.child(2)));
        assert_eq!(format!("{child:?}"), "/2/0");
    }

    #[test]
    fn test_large_ordinals_keep_order() {
        let root = NodePath::root();
        let ordinals = [
            0,
            ORDINAL_ESCAPE as u32 - 1,
            ORDINAL_ESCAPE as u32,
            ORDINAL_ESCAPE as u32 + 1,
            70_000,
            200_000,
            MAX_ORDINAL,
        ];
        let paths: Vec<NodePath> = ordinals.iter().map(|&o| root.child(o)).collect();
        for (path, &ordinal) in paths.iter().zip(&ordinals) {
            assert_eq!(path.ordinal(), Some(ordinal));
            assert_eq!(path.depth(), 1);
            assert!(!path.as_slice().contains(&Token::SENTINEL.0));
        }
        for pair in paths.windows(2) {
            assert_eq!(
                PathComparer::compare(pair[0].as_slice(), pair[1].as_slice()),
                Ordering::Less
            );
        }
    }

    #[test]
    fn test_levels_below_escaped_ordinal() {
        let path = NodePath::root().child(1).child(70_000).child(3);
        assert_eq!(path.as_slice().len(), 5);
        assert_eq!(path.depth(), 3);
        assert_eq!(path.ordinals().collect::<Vec<_>>(), vec![1, 70_000, 3]);
        assert_eq!(format!("{path:?}"), "/1/70000/3");
    }

    #[test]
    #[should_panic(expected = "malformed path key")]
    fn test_sentinel_in_path_is_fatal() {
        let _ = NodePath::from(vec![1, u16::MAX]);
    }
}
