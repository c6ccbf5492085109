//! html5ever token sink
//!
//! Forwards tokenizer output to the [`TreeBuilder`] and tells the
//! tokenizer when an element's content must be read as raw text.

use std::cell::RefCell;

use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{Tag, TagKind, Token as HtmlToken, TokenSink, TokenSinkResult};
use sift_dom::{Document, Namespace, Token};

use crate::builder::TreeBuilder;

/// Token sink driving a [`TreeBuilder`]
pub struct BuilderSink {
    builder: RefCell<TreeBuilder>,
}

impl BuilderSink {
    pub fn new(builder: TreeBuilder) -> Self {
        Self {
            builder: RefCell::new(builder),
        }
    }

    /// Hand over the built document
    pub fn finish(&self, index: bool) -> Document {
        self.builder.borrow_mut().finish(index)
    }

    fn start_tag(&self, tag: &Tag) -> TokenSinkResult<()> {
        let attrs: Vec<(&str, &str)> = tag
            .attrs
            .iter()
            .map(|attr| (&*attr.name.local, &*attr.value))
            .collect();

        let mut builder = self.builder.borrow_mut();
        let Some(id) = builder.start_tag(&tag.name, &attrs, tag.self_closing) else {
            return TokenSinkResult::Continue;
        };
        if !builder.is_current(id) || builder.namespace(id) != Namespace::Html {
            return TokenSinkResult::Continue;
        }
        raw_content_state(builder.document().tree().tag(id))
    }
}

/// Tokenizer state for the content of a freshly opened HTML element
fn raw_content_state(tag: Token) -> TokenSinkResult<()> {
    match tag {
        Token::SCRIPT => TokenSinkResult::RawData(RawKind::ScriptData),
        Token::STYLE | Token::XMP | Token::IFRAME | Token::NOEMBED | Token::NOFRAMES => {
            TokenSinkResult::RawData(RawKind::Rawtext)
        }
        Token::TITLE | Token::TEXTAREA => TokenSinkResult::RawData(RawKind::Rcdata),
        Token::PLAINTEXT => TokenSinkResult::Plaintext,
        _ => TokenSinkResult::Continue,
    }
}

impl TokenSink for BuilderSink {
    type Handle = ();

    fn process_token(&self, token: HtmlToken, line_number: u64) -> TokenSinkResult<()> {
        match token {
            HtmlToken::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(&tag),
                TagKind::EndTag => self.builder.borrow_mut().end_tag(&tag.name),
            },
            HtmlToken::CharacterTokens(text) => self.builder.borrow_mut().characters(&text),
            HtmlToken::NullCharacterToken => self.builder.borrow_mut().characters("\u{FFFD}"),
            HtmlToken::CommentToken(text) => self.builder.borrow_mut().comment(&text),
            HtmlToken::DoctypeToken(doctype) => self.builder.borrow_mut().doctype(
                doctype.name.as_deref().unwrap_or(""),
                doctype.public_id.as_deref().unwrap_or(""),
                doctype.system_id.as_deref().unwrap_or(""),
            ),
            HtmlToken::ParseError(message) => {
                tracing::trace!("line {}: {}", line_number, message);
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl std::fmt::Debug for BuilderSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let builder = self.builder.borrow();
        f.debug_struct("BuilderSink")
            .field("mode", &builder.mode())
            .field("current", &builder.document().tree().tag(builder.current()))
            .field("depth", &builder.open_elements().len())
            .finish()
    }
}
