//! DOM Node - Arena representation
//!
//! Nodes reference each other by `NodeId` instead of pointers. The parent
//! owns its children through the first/last child links; parent and
//! sibling links are navigation only.

use crate::path::NodePath;
use crate::token::{self, Token, TokenProperties};
use crate::NodeId;

/// DOM Node - Core structure
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if root or detached)
    pub parent: NodeId,
    /// First child
    pub first_child: NodeId,
    /// Last child (for O(1) append)
    pub last_child: NodeId,
    /// Previous sibling
    pub prev_sibling: NodeId,
    /// Next sibling
    pub next_sibling: NodeId,
    /// Number of children
    pub child_count: u32,
    /// Position from the tree root; empty while detached
    pub(crate) path: NodePath,
    /// Reachable from the tree root
    pub(crate) attached: bool,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            child_count: 0,
            path: NodePath::root(),
            attached: false,
            data,
        }
    }

    /// Create a new element node
    pub fn element(name: Token) -> Self {
        Self::new(NodeData::Element(ElementData::new(name)))
    }

    /// Create a new text node
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(NodeData::Text(content.into()))
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Current path; empty for detached nodes
    #[inline]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Check if this is an element
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is text
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Whether this node may own children
    pub fn is_container(&self) -> bool {
        match &self.data {
            NodeData::Document | NodeData::Fragment => true,
            NodeData::Element(e) => !e.is_void(),
            NodeData::Doctype { .. } | NodeData::Text(_) | NodeData::Comment(_) => false,
        }
    }

    /// Get element data if this is an element
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Tag token for elements, `Token::NONE` otherwise
    #[inline]
    pub fn tag(&self) -> Token {
        self.as_element().map_or(Token::NONE, |e| e.name)
    }
}

/// Node variant without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Fragment,
    Doctype,
    Element,
    Text,
    Comment,
}

/// Node-specific data
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root
    Document,
    /// Fragment root
    Fragment,
    /// DOCTYPE
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document => NodeKind::Document,
            NodeData::Fragment => NodeKind::Fragment,
            NodeData::Doctype { .. } => NodeKind::Doctype,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }
}

/// Element namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

/// Element-specific data
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Tag name
    pub name: Token,
    pub namespace: Namespace,
    /// Attributes in source order
    pub attrs: Vec<Attribute>,
    /// Cached id attribute (very common lookup)
    pub id: Option<String>,
    /// Cached class list
    pub classes: Vec<String>,
}

/// Attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: Token,
    pub value: String,
}

impl ElementData {
    pub fn new(name: Token) -> Self {
        Self {
            name,
            namespace: Namespace::Html,
            attrs: Vec::new(),
            id: None,
            classes: Vec::new(),
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.namespace == Namespace::Html && self.name.has(TokenProperties::VOID)
    }

    /// Get an attribute value
    pub fn attr(&self, name: Token) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Get an attribute value by name
    pub fn attr_by_name(&self, name: &str) -> Option<&str> {
        token::registry()
            .lookup(name, false)
            .and_then(|t| self.attr(t))
    }

    pub fn has_attr(&self, name: Token) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Compare an attribute value, ignoring case where the attribute's
    /// values are case-insensitive
    pub fn attr_equals(&self, name: Token, expected: &str) -> bool {
        match self.attr(name) {
            Some(value) if name.has(TokenProperties::CASE_INSENSITIVE_VALUE) => {
                value.eq_ignore_ascii_case(expected)
            }
            Some(value) => value == expected,
            None => false,
        }
    }

    /// Set an attribute, returning the previous value.
    ///
    /// Boolean attributes given an empty value store their own name.
    pub fn set_attr(&mut self, name: Token, value: impl Into<String>) -> Option<String> {
        let mut value = value.into();
        if value.is_empty() && name.has(TokenProperties::BOOLEAN_ATTRIBUTE) {
            value = name.name().to_owned();
        }
        self.refresh_cache(name, Some(&value));

        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                return Some(std::mem::replace(&mut attr.value, value));
            }
        }
        self.attrs.push(Attribute { name, value });
        None
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: Token) -> Option<String> {
        let index = self.attrs.iter().position(|a| a.name == name)?;
        self.refresh_cache(name, None);
        Some(self.attrs.remove(index).value)
    }

    fn refresh_cache(&mut self, name: Token, value: Option<&str>) {
        match name {
            Token::ID => self.id = value.map(str::to_owned),
            Token::CLASS => {
                self.classes = value
                    .map(|v| v.split_ascii_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default();
            }
            _ => {}
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Form control value: the `value` attribute where the element has one
    pub fn value(&self) -> Option<&str> {
        if self.name.has(TokenProperties::HAS_VALUE_ATTRIBUTE) {
            self.attr(Token::VALUE)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_cache() {
        let mut elem = ElementData::new(Token::DIV);
        elem.set_attr(Token::ID, "main");
        elem.set_attr(Token::CLASS, "a  b c");
        assert_eq!(elem.id(), Some("main"));
        assert!(elem.has_class("b"));
        assert_eq!(elem.classes.len(), 3);

        assert_eq!(elem.remove_attr(Token::CLASS), Some("a  b c".to_string()));
        assert!(elem.classes.is_empty());
        assert!(!elem.has_attr(Token::CLASS));
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut elem = ElementData::new(Token::INPUT);
        assert_eq!(elem.set_attr(Token::VALUE, "1"), None);
        assert_eq!(elem.set_attr(Token::VALUE, "2"), Some("1".to_string()));
        assert_eq!(elem.value(), Some("2"));
        assert_eq!(elem.attrs.len(), 1);
    }

    #[test]
    fn test_boolean_attribute_value() {
        let mut elem = ElementData::new(Token::INPUT);
        elem.set_attr(Token::CHECKED, "");
        assert_eq!(elem.attr(Token::CHECKED), Some("checked"));
    }

    #[test]
    fn test_case_insensitive_values() {
        let mut elem = ElementData::new(Token::INPUT);
        elem.set_attr(Token::TYPE, "TEXT");
        elem.set_attr(Token::NAME, "User");
        assert!(elem.attr_equals(Token::TYPE, "text"));
        assert!(!elem.attr_equals(Token::NAME, "user"));
    }

    #[test]
    fn test_container_capability() {
        assert!(Node::element(Token::DIV).is_container());
        assert!(!Node::element(Token::BR).is_container());
        assert!(!Node::text("x").is_container());
        assert!(Node::new(NodeData::Fragment).is_container());
    }
}
