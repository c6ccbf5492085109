//! Parsing mode resolution
//!
//! `Auto` mode looks at the first tag of the input: a doctype or one of
//! `html`/`head`/`body` means a full document, a tag that only makes sense
//! inside a particular parent means a fragment in that parent, anything
//! else is body content. The decision is made once, before tokenizing.

use sift_dom::Token;

use crate::config::{ParseMode, ParseOptions};
use crate::error::{HtmlError, HtmlResult};

/// Parsing mode after `Auto` has been decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedMode {
    Document,
    Content,
    /// Content parsed as children of the given context element
    Fragment(Token),
}

impl ResolvedMode {
    /// Tag the tree root stands in for when evaluating tag actions
    pub fn context(self) -> Token {
        match self {
            ResolvedMode::Document => Token::NONE,
            ResolvedMode::Content => Token::BODY,
            ResolvedMode::Fragment(context) => context,
        }
    }

    pub fn is_document(self) -> bool {
        self == ResolvedMode::Document
    }
}

/// Parent a tag needs when it starts a fragment
pub fn default_context(tag: Token) -> Option<Token> {
    let context = match tag {
        Token::TR => Token::TBODY,
        Token::TD | Token::TH => Token::TR,
        Token::THEAD | Token::TBODY | Token::TFOOT | Token::CAPTION | Token::COLGROUP => {
            Token::TABLE
        }
        Token::COL => Token::COLGROUP,
        Token::OPTION | Token::OPTGROUP => Token::SELECT,
        Token::LI => Token::UL,
        Token::DT | Token::DD => Token::DL,
        Token::RP | Token::RT => Token::RUBY,
        Token::LEGEND => Token::FIELDSET,
        _ => return None,
    };
    Some(context)
}

/// Mode to use before any input has been seen; `None` means sniff
pub fn mode_from_options(options: &ParseOptions) -> HtmlResult<Option<ResolvedMode>> {
    let resolved = match options.mode {
        ParseMode::Auto => None,
        ParseMode::Document => Some(ResolvedMode::Document),
        ParseMode::Content => Some(ResolvedMode::Content),
        ParseMode::Fragment => match options.fragment_context.as_deref() {
            Some(name) if name.trim().is_empty() => {
                return Err(HtmlError::InvalidContext(name.to_owned()));
            }
            Some(name) => Some(ResolvedMode::Fragment(sift_dom::intern(name.trim()))),
            None => None,
        },
    };
    Ok(resolved)
}

/// Decide the mode from the start of the decoded input
pub fn sniff_mode(text: &str) -> ResolvedMode {
    let mode = match first_tag(text) {
        FirstTag::Doctype => ResolvedMode::Document,
        FirstTag::Element(name) => {
            let tag = sift_dom::intern(&name);
            match tag {
                Token::HTML | Token::HEAD | Token::BODY => ResolvedMode::Document,
                _ => default_context(tag).map_or(ResolvedMode::Content, ResolvedMode::Fragment),
            }
        }
        FirstTag::None => ResolvedMode::Content,
    };
    tracing::debug!("Sniffed parsing mode {:?}", mode);
    mode
}

/// Sniffing for fragment mode without an explicit context
pub fn sniff_fragment_context(text: &str) -> ResolvedMode {
    match first_tag(text) {
        FirstTag::Element(name) => default_context(sift_dom::intern(&name))
            .map_or(ResolvedMode::Content, ResolvedMode::Fragment),
        FirstTag::Doctype | FirstTag::None => ResolvedMode::Content,
    }
}

enum FirstTag {
    Doctype,
    Element(String),
    None,
}

fn first_tag(text: &str) -> FirstTag {
    let mut rest = text.trim_start_matches('\u{FEFF}');
    loop {
        let Some(open) = rest.find('<') else {
            return FirstTag::None;
        };
        rest = &rest[open + 1..];
        if let Some(comment) = rest.strip_prefix("!--") {
            match comment.find("-->") {
                Some(end) => rest = &comment[end + 3..],
                None => return FirstTag::None,
            }
            continue;
        }
        if rest.get(..8).is_some_and(|s| s.eq_ignore_ascii_case("!doctype")) {
            return FirstTag::Doctype;
        }
        if rest.starts_with('?') || rest.starts_with('!') {
            match rest.find('>') {
                Some(end) => rest = &rest[end + 1..],
                None => return FirstTag::None,
            }
            continue;
        }
        if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let end = rest
                .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
                .unwrap_or(rest.len());
            return FirstTag::Element(rest[..end].to_ascii_lowercase());
        }
    }
}
