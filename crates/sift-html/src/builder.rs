//! Tree construction
//!
//! Builds a [`Document`] from tokenizer events. Keeps a stack of open
//! elements and, before every insertion, consults the optional-tag rules
//! to close open elements or synthesize missing ones. Content that shows
//! up directly inside table structure is foster-parented in front of the
//! table. Indexing stays suspended until [`TreeBuilder::finish`].

use sift_dom::{
    special_tag_action, Document, DomResult, DomTree, ElementData, Namespace, NodeId, TagAction,
    Token,
};

use crate::context::ResolvedMode;
use crate::encoding::charset_from_content;

/// Receives the raw label of an in-document encoding declaration and
/// returns whether it was accepted
pub type EncodingHook = Box<dyn FnMut(&str) -> bool>;

/// Tree construction switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub allow_self_closing: bool,
    pub strip_comments: bool,
}

/// Upper bound on tag actions applied for a single insertion
const MAX_TAG_ACTIONS: usize = 16;

/// Elements allowed directly inside table structure
const TABLE_CONTENT: &[Token] = &[
    Token::CAPTION,
    Token::COLGROUP,
    Token::COL,
    Token::THEAD,
    Token::TBODY,
    Token::TFOOT,
    Token::TR,
    Token::TD,
    Token::TH,
    Token::SCRIPT,
    Token::STYLE,
    Token::TEMPLATE,
];

/// Tokenizer-driven document builder
pub struct TreeBuilder {
    doc: Document,
    mode: ResolvedMode,
    options: BuildOptions,
    /// Open elements; the tree root is always at the bottom
    open: Vec<NodeId>,
    encoding_hook: Option<EncodingHook>,
}

impl TreeBuilder {
    pub fn new(mode: ResolvedMode, options: BuildOptions) -> Self {
        let tree = if mode.is_document() {
            DomTree::new()
        } else {
            DomTree::new_fragment()
        };
        let mut doc = Document::unindexed(tree);
        doc.tree_mut().defer_paths();
        Self {
            open: vec![doc.root()],
            doc,
            mode,
            options,
            encoding_hook: None,
        }
    }

    pub fn with_encoding_hook(mut self, hook: EncodingHook) -> Self {
        self.encoding_hook = Some(hook);
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn mode(&self) -> ResolvedMode {
        self.mode
    }

    /// Innermost open element
    pub fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(NodeId::ROOT)
    }

    /// Whether `id` is the innermost open element
    pub fn is_current(&self, id: NodeId) -> bool {
        self.current() == id
    }

    /// Open elements from the root outwards
    pub fn open_elements(&self) -> &[NodeId] {
        &self.open
    }

    fn tree(&self) -> &DomTree {
        self.doc.tree()
    }

    /// Tag used for tag actions; the root stands in for the parsing context
    fn effective_tag(&self, id: NodeId) -> Token {
        if id == self.doc.root() {
            self.mode.context()
        } else {
            self.tree().tag(id)
        }
    }

    pub fn namespace(&self, id: NodeId) -> Namespace {
        self.tree().element(id).map_or(Namespace::Html, |e| e.namespace)
    }

    fn in_table_context(&self) -> bool {
        matches!(
            self.effective_tag(self.current()),
            Token::TABLE | Token::TBODY | Token::THEAD | Token::TFOOT | Token::TR
        )
    }

    /// Innermost open table and its parent, for foster parenting
    fn foster_target(&self) -> Option<(NodeId, NodeId)> {
        let root = self.doc.root();
        let table = self
            .open
            .iter()
            .rev()
            .copied()
            .find(|&id| id != root && self.tree().tag(id) == Token::TABLE)?;
        let parent = self.tree().parent(table)?;
        Some((parent, table))
    }

    /// Close or synthesize elements until `child` can be inserted
    fn apply_tag_actions(&mut self, child: Token) {
        for _ in 0..MAX_TAG_ACTIONS {
            let current = self.current();
            if self.namespace(current) != Namespace::Html {
                return;
            }
            let parent = self.effective_tag(current);
            match special_tag_action(parent, child, self.mode.is_document()) {
                TagAction::Nothing => return,
                TagAction::CloseParent => {
                    if self.open.len() <= 1 {
                        return;
                    }
                    tracing::trace!("<{}> closes <{}>", child, parent);
                    self.open.pop();
                }
                TagAction::Generate(tag) => {
                    tracing::trace!("<{}> inside <{}> implies <{}>", child, parent, tag);
                    self.generate(tag);
                }
            }
        }
        tracing::warn!("tag actions for <{}> did not settle", child);
    }

    /// Open an implied element, reusing an existing `html`/`head`/`body`
    fn generate(&mut self, tag: Token) {
        let existing = match tag {
            Token::HTML => self.doc.html(),
            Token::HEAD => self.doc.head(),
            Token::BODY => self.doc.body(),
            _ => None,
        };
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.doc.tree_mut().create_element_token(tag);
                let parent = self.current();
                report(self.doc.append_child(parent, id));
                id
            }
        };
        self.open.push(id);
    }

    /// Fold a repeated `html`/`head`/`body` start tag into the existing
    /// element. Returns `true` when the tag was consumed.
    fn merge_into_existing(&mut self, tag: Token, attrs: &[(&str, &str)]) -> bool {
        let existing = match tag {
            Token::HTML => self.doc.html(),
            Token::HEAD => self.doc.head(),
            Token::BODY => self.doc.body(),
            _ => None,
        };
        let Some(id) = existing else {
            return false;
        };
        if tag != Token::HEAD {
            for &(name, value) in attrs {
                let name = sift_dom::intern(name);
                if let Some(element) = self.doc.tree_mut().element_mut(id) {
                    if !element.has_attr(name) {
                        element.set_attr(name, value);
                    }
                }
            }
        }
        tracing::trace!("merged repeated <{}>", tag);
        true
    }

    /// Start tag. Returns the inserted element, or `None` when the tag was
    /// merged into an existing element.
    pub fn start_tag(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        self_closing: bool,
    ) -> Option<NodeId> {
        let tag = sift_dom::intern(name);
        let namespace = match tag {
            Token::SVG => Namespace::Svg,
            Token::MATH => Namespace::MathMl,
            _ => self.namespace(self.current()),
        };

        let html = namespace == Namespace::Html;
        if html {
            if self.mode.is_document()
                && matches!(tag, Token::HTML | Token::HEAD | Token::BODY)
                && self.merge_into_existing(tag, attrs)
            {
                return None;
            }
            self.apply_tag_actions(tag);
        }

        let mut data = ElementData::new(tag);
        data.namespace = namespace;
        for &(attr, value) in attrs {
            let attr = sift_dom::intern(attr);
            if !data.has_attr(attr) {
                data.set_attr(attr, value);
            }
        }
        let is_void = data.is_void();
        let id = self.doc.tree_mut().create_element_data(data);

        if html && self.in_table_context() && !TABLE_CONTENT.contains(&tag) {
            self.foster_element(id);
        } else {
            let parent = self.current();
            report(self.doc.append_child(parent, id));
        }

        let closed = self_closing && (self.options.allow_self_closing || !html);
        if !is_void && !closed {
            self.open.push(id);
        }
        tracing::trace!("open <{}> depth {}", tag, self.open.len());

        if tag == Token::META {
            self.inspect_meta(id);
        }
        Some(id)
    }

    /// End tag: close up to the innermost matching open element, or ignore
    pub fn end_tag(&mut self, name: &str) {
        let Some(tag) = sift_dom::registry().lookup(name, false) else {
            tracing::trace!("ignoring end tag </{}> that was never opened", name);
            return;
        };
        if self.mode.is_document() && matches!(tag, Token::HTML | Token::BODY) {
            return;
        }
        let root = self.doc.root();
        let position = self
            .open
            .iter()
            .rposition(|&id| id != root && self.tree().tag(id) == tag);
        match position {
            Some(position) => self.open.truncate(position),
            None => tracing::trace!("ignoring unmatched end tag </{}>", tag),
        }
    }

    /// Character data
    pub fn characters(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if text.chars().all(is_html_whitespace) {
            let current = self.current();
            let tag = self.effective_tag(current);
            if self.mode.is_document() && matches!(tag, Token::NONE | Token::HTML) {
                return;
            }
            self.append_text(current, text);
            return;
        }

        if self.namespace(self.current()) == Namespace::Html {
            self.apply_tag_actions(Token::NONE);
        }
        if self.in_table_context() {
            self.foster_text(text);
        } else {
            let current = self.current();
            self.append_text(current, text);
        }
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        report(self.doc.append_text(parent, text));
    }

    /// Insert text in front of the open table, merging with a preceding
    /// text node. Without a parented table the text goes to the current
    /// element.
    pub fn foster_text(&mut self, text: &str) {
        match self.foster_target() {
            Some((parent, table)) => {
                tracing::trace!("foster-parenting text before table");
                report(self.doc.tree_mut().insert_text_before(parent, table, text));
            }
            None => {
                let current = self.current();
                self.append_text(current, text);
            }
        }
    }

    /// Insert an element in front of the open table, or into the current
    /// element when the table has no parent
    pub fn foster_element(&mut self, id: NodeId) {
        match self.foster_target() {
            Some((parent, table)) => {
                tracing::trace!("foster-parenting <{}> before table", self.tree().tag(id));
                report(self.doc.insert_before(parent, id, table));
            }
            None => {
                let current = self.current();
                report(self.doc.append_child(current, id));
            }
        }
    }

    /// Remove a node from its parent, closing it if it was open
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        self.doc.remove(id)?;
        if let Some(position) = self.open.iter().position(|&open| open == id) {
            self.open.truncate(position.max(1));
        }
        Ok(())
    }

    pub fn comment(&mut self, text: &str) {
        if self.options.strip_comments {
            return;
        }
        let id = self.doc.create_comment(text);
        let parent = self.current();
        report(self.doc.append_child(parent, id));
    }

    pub fn doctype(&mut self, name: &str, public_id: &str, system_id: &str) {
        if !self.mode.is_document() || self.open.len() > 1 {
            tracing::trace!("ignoring misplaced doctype");
            return;
        }
        let id = self.doc.tree_mut().create_doctype(name, public_id, system_id);
        let root = self.doc.root();
        report(self.doc.append_child(root, id));
    }

    /// Offer a `<meta>` encoding declaration to the encoding hook
    fn inspect_meta(&mut self, id: NodeId) {
        let Some(element) = self.tree().element(id) else {
            return;
        };
        let label = match element.attr(Token::CHARSET) {
            Some(charset) => Some(charset.to_owned()),
            None if element
                .attr(Token::HTTP_EQUIV)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("content-type")) =>
            {
                element
                    .attr(Token::CONTENT)
                    .and_then(charset_from_content)
                    .map(str::to_owned)
            }
            None => None,
        };
        let Some(label) = label else {
            return;
        };
        match self.encoding_hook.as_mut() {
            Some(hook) => {
                let accepted = hook(&label);
                tracing::debug!("meta encoding {:?} accepted: {}", label, accepted);
            }
            None => tracing::trace!("meta encoding {:?} ignored for decoded input", label),
        }
    }

    /// Hand over the finished document with every node path assigned,
    /// building its indexes if asked
    pub fn finish(&mut self, index: bool) -> Document {
        self.open.truncate(1);
        let mut doc = std::mem::replace(&mut self.doc, Document::unindexed(DomTree::new()));
        if index {
            doc.enable_indexing();
        } else {
            doc.tree_mut().resolve_paths();
        }
        tracing::debug!("Built {} nodes ({:?})", doc.tree().len(), self.mode);
        doc
    }
}

fn is_html_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C')
}

fn report<T>(result: DomResult<T>) {
    if let Err(e) = result {
        tracing::warn!("tree construction: {}", e);
    }
}
