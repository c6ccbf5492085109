//! Optional-tag rules
//!
//! Decides what happens to the open element when a new child arrives:
//! leave it open, close it first, or synthesize an intermediate element.
//! Character data is evaluated as a child with `Token::NONE`.

use crate::token::{Token, TokenProperties};

/// Action to take before inserting a new child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Insert the child into the open element
    Nothing,
    /// Close the open element, then re-evaluate against its parent
    CloseParent,
    /// Open the given element inside the open element, then re-evaluate
    Generate(Token),
}

/// Rule for inserting `child` while `parent` is the open element.
///
/// `parent == Token::NONE` stands for the document root. With
/// `is_document` set the implied `html`/`head`/`body` rules apply too.
pub fn special_tag_action(parent: Token, child: Token, is_document: bool) -> TagAction {
    if is_document {
        let action = document_action(parent, child);
        if action != TagAction::Nothing {
            return action;
        }
    }

    match parent {
        Token::HEAD => {
            if child.has(TokenProperties::METADATA_TAG) {
                TagAction::Nothing
            } else {
                TagAction::CloseParent
            }
        }
        Token::P => close_if(child.has(TokenProperties::PARAGRAPH_CLOSER)),
        Token::LI => close_if(child == Token::LI),
        Token::DT | Token::DD => close_if(matches!(child, Token::DT | Token::DD)),
        Token::RP | Token::RT => close_if(matches!(child, Token::RP | Token::RT)),
        Token::OPTION => close_if(matches!(child, Token::OPTION | Token::OPTGROUP)),
        Token::OPTGROUP => close_if(child == Token::OPTGROUP),
        Token::TD | Token::TH => close_if(matches!(
            child,
            Token::TD | Token::TH | Token::TR | Token::TBODY | Token::THEAD | Token::TFOOT
        )),
        Token::TR => close_if(matches!(
            child,
            Token::TR | Token::TBODY | Token::THEAD | Token::TFOOT
        )),
        Token::THEAD | Token::TBODY => match child {
            Token::TBODY | Token::TFOOT => TagAction::CloseParent,
            Token::TD | Token::TH => TagAction::Generate(Token::TR),
            _ => TagAction::Nothing,
        },
        Token::TFOOT => match child {
            Token::TBODY => TagAction::CloseParent,
            Token::TD | Token::TH => TagAction::Generate(Token::TR),
            _ => TagAction::Nothing,
        },
        Token::TABLE => match child {
            Token::TR | Token::TD | Token::TH => TagAction::Generate(Token::TBODY),
            _ => TagAction::Nothing,
        },
        _ => TagAction::Nothing,
    }
}

fn document_action(parent: Token, child: Token) -> TagAction {
    match parent {
        Token::NONE => {
            if child == Token::HTML {
                TagAction::Nothing
            } else {
                TagAction::Generate(Token::HTML)
            }
        }
        Token::HTML => match child {
            Token::HEAD | Token::BODY => TagAction::Nothing,
            c if c.has(TokenProperties::METADATA_TAG) => TagAction::Generate(Token::HEAD),
            _ => TagAction::Generate(Token::BODY),
        },
        _ => TagAction::Nothing,
    }
}

#[inline]
fn close_if(close: bool) -> TagAction {
    if close {
        TagAction::CloseParent
    } else {
        TagAction::Nothing
    }
}
