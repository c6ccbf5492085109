//! Parse options

use serde::{Deserialize, Serialize};

/// How the input is turned into a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Decide from the first tag in the input
    #[default]
    Auto,
    /// Full document with implied `html`, `head` and `body`
    Document,
    /// Body content without the document skeleton
    Content,
    /// Content parsed inside a context element
    Fragment,
}

/// Options for [`HtmlParser`](crate::HtmlParser)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub mode: ParseMode,
    /// Context element name for [`ParseMode::Fragment`]
    pub fragment_context: Option<String>,
    /// Caller-declared encoding label
    pub encoding: Option<String>,
    /// Bytes buffered up front for sniffing; an encoding declaration found
    /// within them restarts the parse instead of switching mid-stream
    pub preprocessor_block_size: usize,
    /// Treat `<tag/>` as an empty element
    pub allow_self_closing: bool,
    /// Drop comments instead of adding comment nodes
    pub strip_comments: bool,
    /// Build the path indexes once the tree is complete
    pub index: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Auto,
            fragment_context: None,
            encoding: None,
            preprocessor_block_size: 4096,
            allow_self_closing: false,
            strip_comments: false,
            index: true,
        }
    }
}

impl ParseOptions {
    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fragment mode with the given context element
    pub fn with_fragment_context(mut self, context: &str) -> Self {
        self.mode = ParseMode::Fragment;
        self.fragment_context = Some(context.to_owned());
        self
    }

    pub fn with_encoding(mut self, label: &str) -> Self {
        self.encoding = Some(label.to_owned());
        self
    }

    pub fn with_preprocessor_block_size(mut self, size: usize) -> Self {
        self.preprocessor_block_size = size;
        self
    }

    pub fn with_self_closing(mut self, allow: bool) -> Self {
        self.allow_self_closing = allow;
        self
    }

    pub fn with_strip_comments(mut self, strip: bool) -> Self {
        self.strip_comments = strip;
        self
    }

    pub fn with_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }
}
