//! Token Registry - Process-wide name interning
//!
//! Tag and attribute names are stored once and referenced by a 16-bit
//! token. A fixed vocabulary of names that drive tree construction is
//! registered first, in a fixed order, so those tokens are stable
//! constants (`Token::LI`, `Token::TABLE`, ...) and carry property flags.
//!
//! The registry lives for the whole process. Names are never removed and
//! tokens are never renumbered.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, RwLock};

use bitflags::bitflags;

/// Interned name ID - just 2 bytes
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Token(pub u16);

bitflags! {
    /// Parsing-relevant properties of a hardcoded token
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TokenProperties: u16 {
        const BLOCK_ELEMENT = 1 << 0;
        const VOID = 1 << 1;
        const BOOLEAN_ATTRIBUTE = 1 << 2;
        /// Element whose start or end tag may be implied
        const AUTO_OPEN_OR_CLOSE = 1 << 3;
        /// Start tag closes an open `p`
        const PARAGRAPH_CLOSER = 1 << 4;
        /// Element that belongs in `head`
        const METADATA_TAG = 1 << 5;
        /// Attribute whose value compares case-insensitively
        const CASE_INSENSITIVE_VALUE = 1 << 6;
        const HAS_VALUE_ATTRIBUTE = 1 << 7;
        const FORM_INPUT_CONTROL = 1 << 8;
    }
}

macro_rules! hardcoded_tokens {
    ($($konst:ident = $name:literal),* $(,)?) => {
        #[repr(u16)]
        #[allow(dead_code, non_camel_case_types, clippy::upper_case_acronyms)]
        enum Hardcoded {
            Empty = 0,
            $($konst,)*
        }

        /// Names registered at startup; the index is the token value.
        const HARDCODED_NAMES: &[&str] = &["", $($name,)*];

        impl Token {
            $(pub const $konst: Token = Token(Hardcoded::$konst as u16);)*
        }
    };
}

hardcoded_tokens! {
    // attributes
    CLASS = "class",
    ID = "id",
    VALUE = "value",
    SELECTED = "selected",
    CHECKED = "checked",
    READONLY = "readonly",
    DISABLED = "disabled",
    MULTIPLE = "multiple",
    REQUIRED = "required",
    AUTOFOCUS = "autofocus",
    HIDDEN = "hidden",
    TYPE = "type",
    NAME = "name",
    HREF = "href",
    SRC = "src",
    CHARSET = "charset",
    HTTP_EQUIV = "http-equiv",
    CONTENT = "content",
    // one token for the `dir` attribute and the `<dir>` element, so it
    // carries the block flags and CASE_INSENSITIVE_VALUE together
    DIR = "dir",
    METHOD = "method",
    ENCTYPE = "enctype",
    ALIGN = "align",
    VALIGN = "valign",
    ASYNC = "async",
    DEFER = "defer",
    AUTOPLAY = "autoplay",
    CONTROLS = "controls",
    LOOP = "loop",
    MUTED = "muted",
    OPEN = "open",
    NOVALIDATE = "novalidate",
    FORMNOVALIDATE = "formnovalidate",
    ISMAP = "ismap",
    REVERSED = "reversed",
    DEFAULT = "default",
    ALLOWFULLSCREEN = "allowfullscreen",
    NOWRAP = "nowrap",
    // document structure
    HTML = "html",
    HEAD = "head",
    BODY = "body",
    // metadata
    BASE = "base",
    BASEFONT = "basefont",
    BGSOUND = "bgsound",
    LINK = "link",
    META = "meta",
    NOSCRIPT = "noscript",
    SCRIPT = "script",
    STYLE = "style",
    TEMPLATE = "template",
    TITLE = "title",
    // tables
    TABLE = "table",
    CAPTION = "caption",
    COLGROUP = "colgroup",
    COL = "col",
    THEAD = "thead",
    TBODY = "tbody",
    TFOOT = "tfoot",
    TR = "tr",
    TD = "td",
    TH = "th",
    // lists and repeaters
    UL = "ul",
    OL = "ol",
    LI = "li",
    DL = "dl",
    DT = "dt",
    DD = "dd",
    RP = "rp",
    RT = "rt",
    RUBY = "ruby",
    // forms
    FORM = "form",
    INPUT = "input",
    SELECT = "select",
    OPTION = "option",
    OPTGROUP = "optgroup",
    DATALIST = "datalist",
    TEXTAREA = "textarea",
    BUTTON = "button",
    LABEL = "label",
    FIELDSET = "fieldset",
    LEGEND = "legend",
    METER = "meter",
    PROGRESS = "progress",
    OUTPUT = "output",
    KEYGEN = "keygen",
    // block content
    P = "p",
    DIV = "div",
    ADDRESS = "address",
    ARTICLE = "article",
    ASIDE = "aside",
    BLOCKQUOTE = "blockquote",
    CENTER = "center",
    DETAILS = "details",
    DIALOG = "dialog",
    FIGCAPTION = "figcaption",
    FIGURE = "figure",
    FOOTER = "footer",
    HEADER = "header",
    HGROUP = "hgroup",
    H1 = "h1",
    H2 = "h2",
    H3 = "h3",
    H4 = "h4",
    H5 = "h5",
    H6 = "h6",
    HR = "hr",
    MAIN = "main",
    MENU = "menu",
    NAV = "nav",
    PRE = "pre",
    LISTING = "listing",
    PLAINTEXT = "plaintext",
    SECTION = "section",
    SUMMARY = "summary",
    XMP = "xmp",
    // void and embedded
    AREA = "area",
    BR = "br",
    EMBED = "embed",
    IMG = "img",
    PARAM = "param",
    SOURCE = "source",
    TRACK = "track",
    WBR = "wbr",
    FRAME = "frame",
    COMMAND = "command",
    IFRAME = "iframe",
    NOEMBED = "noembed",
    NOFRAMES = "noframes",
    // phrasing
    A = "a",
    SPAN = "span",
    // foreign roots
    SVG = "svg",
    MATH = "math",
}

impl Token {
    /// No token / the empty name
    pub const NONE: Token = Token(0);

    /// Reserved maximum value. Never assigned to a name; used as the
    /// exclusive upper bound of prefix scans.
    pub const SENTINEL: Token = Token(u16::MAX);

    /// Number of names registered at startup (including the empty name).
    pub const HARDCODED_COUNT: usize = HARDCODED_NAMES.len();

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Whether this token belongs to the pre-registered vocabulary
    #[inline]
    pub fn is_hardcoded(self) -> bool {
        (self.0 as usize) < Self::HARDCODED_COUNT
    }

    /// The interned name
    pub fn name(self) -> &'static str {
        registry().name(self)
    }

    /// Property flags; empty for tokens outside the hardcoded range
    #[inline]
    pub fn properties(self) -> TokenProperties {
        registry().properties(self)
    }

    #[inline]
    pub fn has(self, property: TokenProperties) -> bool {
        self.properties().contains(property)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({}:{:?})", self.0, self.name())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const BLOCK_ELEMENTS: &[Token] = &[
    Token::ADDRESS, Token::ARTICLE, Token::ASIDE, Token::BLOCKQUOTE, Token::BODY,
    Token::CAPTION, Token::CENTER, Token::DD, Token::DETAILS, Token::DIALOG,
    Token::DIR, Token::DIV, Token::DL, Token::DT, Token::FIELDSET, Token::FIGCAPTION,
    Token::FIGURE, Token::FOOTER, Token::FORM, Token::H1, Token::H2, Token::H3,
    Token::H4, Token::H5, Token::H6, Token::HEADER, Token::HGROUP, Token::HR,
    Token::HTML, Token::LI, Token::LISTING, Token::MAIN, Token::MENU, Token::NAV,
    Token::NOSCRIPT, Token::OL, Token::OUTPUT, Token::P, Token::PLAINTEXT,
    Token::PRE, Token::SECTION, Token::SUMMARY, Token::TABLE, Token::TBODY,
    Token::TD, Token::TFOOT, Token::TH, Token::THEAD, Token::TR, Token::UL,
    Token::XMP,
];

const VOID_ELEMENTS: &[Token] = &[
    Token::AREA, Token::BASE, Token::BASEFONT, Token::BGSOUND, Token::BR,
    Token::COL, Token::COMMAND, Token::EMBED, Token::FRAME, Token::HR, Token::IMG,
    Token::INPUT, Token::KEYGEN, Token::LINK, Token::META, Token::PARAM,
    Token::SOURCE, Token::TRACK, Token::WBR,
];

const BOOLEAN_ATTRIBUTES: &[Token] = &[
    Token::ALLOWFULLSCREEN, Token::ASYNC, Token::AUTOFOCUS, Token::AUTOPLAY,
    Token::CHECKED, Token::CONTROLS, Token::DEFAULT, Token::DEFER, Token::DISABLED,
    Token::FORMNOVALIDATE, Token::HIDDEN, Token::ISMAP, Token::LOOP, Token::MULTIPLE,
    Token::MUTED, Token::NOVALIDATE, Token::NOWRAP, Token::OPEN, Token::READONLY,
    Token::REQUIRED, Token::REVERSED, Token::SELECTED,
];

const AUTO_OPEN_OR_CLOSE: &[Token] = &[
    Token::BODY, Token::COLGROUP, Token::DD, Token::DT, Token::HEAD, Token::HTML,
    Token::LI, Token::OPTGROUP, Token::OPTION, Token::P, Token::RP, Token::RT,
    Token::TBODY, Token::TD, Token::TFOOT, Token::TH, Token::THEAD, Token::TR,
];

const PARAGRAPH_CLOSERS: &[Token] = &[
    Token::ADDRESS, Token::ARTICLE, Token::ASIDE, Token::BLOCKQUOTE, Token::CENTER,
    Token::DD, Token::DETAILS, Token::DIALOG, Token::DIR, Token::DIV, Token::DL, Token::DT,
    Token::FIELDSET, Token::FIGCAPTION, Token::FIGURE, Token::FOOTER, Token::FORM,
    Token::H1, Token::H2, Token::H3, Token::H4, Token::H5, Token::H6, Token::HEADER,
    Token::HGROUP, Token::HR, Token::LI, Token::LISTING, Token::MAIN, Token::MENU,
    Token::NAV, Token::OL, Token::P, Token::PLAINTEXT, Token::PRE, Token::SECTION,
    Token::SUMMARY, Token::TABLE, Token::UL, Token::XMP,
];

const METADATA_TAGS: &[Token] = &[
    Token::BASE, Token::BASEFONT, Token::BGSOUND, Token::COMMAND, Token::LINK,
    Token::META, Token::NOSCRIPT, Token::SCRIPT, Token::STYLE, Token::TEMPLATE,
    Token::TITLE,
];

const CASE_INSENSITIVE_VALUES: &[Token] = &[
    Token::ALIGN, Token::DIR, Token::ENCTYPE, Token::HTTP_EQUIV, Token::METHOD,
    Token::TYPE, Token::VALIGN,
];

const HAS_VALUE_ATTRIBUTE: &[Token] = &[
    Token::BUTTON, Token::INPUT, Token::LI, Token::METER, Token::OPTION,
    Token::PARAM, Token::PROGRESS, Token::SELECT, Token::TEXTAREA,
];

const FORM_INPUT_CONTROLS: &[Token] = &[
    Token::BUTTON, Token::INPUT, Token::SELECT, Token::TEXTAREA,
];

struct Tables {
    by_name: HashMap<&'static str, Token>,
    names: Vec<&'static str>,
}

/// Process-wide token table
///
/// Interned names are leaked into `'static` storage; the vocabulary is
/// append-only and bounded by the 16-bit token space.
pub struct TokenRegistry {
    tables: RwLock<Tables>,
    properties: Box<[TokenProperties]>,
}

static REGISTRY: OnceLock<TokenRegistry> = OnceLock::new();

/// The global registry, pre-registering the hardcoded names on first use
pub fn registry() -> &'static TokenRegistry {
    REGISTRY.get_or_init(TokenRegistry::with_hardcoded)
}

/// Intern a case-insensitive name (tag and attribute names)
pub fn intern(name: &str) -> Token {
    registry().intern(name, false)
}

/// Intern a name exactly as written
pub fn intern_case_sensitive(name: &str) -> Token {
    registry().intern(name, true)
}

fn fold_case(name: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive || !name.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(name.to_ascii_lowercase())
    }
}

impl TokenRegistry {
    fn with_hardcoded() -> Self {
        let registry = Self {
            tables: RwLock::new(Tables {
                by_name: HashMap::with_capacity(512),
                names: Vec::with_capacity(512),
            }),
            properties: build_properties(),
        };

        for (index, name) in HARDCODED_NAMES.iter().enumerate() {
            let token = registry.insert(name);
            assert_eq!(
                token.0 as usize, index,
                "hardcoded token {name:?} registered out of order"
            );
        }
        let registered = registry.len();
        assert_eq!(
            registered,
            Token::HARDCODED_COUNT,
            "token table self-check failed: {registered} names registered, expected {}",
            Token::HARDCODED_COUNT
        );

        tracing::debug!("Token registry initialised with {} hardcoded names", registered);
        registry
    }

    /// Intern `name`, returning the existing token if already present.
    ///
    /// Concurrent callers interning the same new name observe one token.
    pub fn intern(&self, name: &str, case_sensitive: bool) -> Token {
        let name = fold_case(name, case_sensitive);
        if let Some(token) = self.lookup_exact(&name) {
            return token;
        }
        self.insert(&name)
    }

    /// Find a token without interning
    pub fn lookup(&self, name: &str, case_sensitive: bool) -> Option<Token> {
        self.lookup_exact(&fold_case(name, case_sensitive))
    }

    fn lookup_exact(&self, name: &str) -> Option<Token> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.by_name.get(name).copied()
    }

    fn insert(&self, name: &str) -> Token {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have won the race between our lookup and the write lock
        if let Some(&token) = tables.by_name.get(name) {
            return token;
        }

        let next = tables.names.len();
        assert!(
            next < Token::SENTINEL.0 as usize,
            "token space exhausted while interning {name:?}"
        );

        let stored: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let token = Token(next as u16);
        tables.names.push(stored);
        tables.by_name.insert(stored, token);
        token
    }

    /// Name of `token`; the empty string for unknown tokens
    pub fn name(&self, token: Token) -> &'static str {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.names.get(token.0 as usize).copied().unwrap_or("")
    }

    #[inline]
    pub fn properties(&self, token: Token) -> TokenProperties {
        self.properties
            .get(token.0 as usize)
            .copied()
            .unwrap_or_default()
    }

    #[inline]
    pub fn has_property(&self, token: Token, property: TokenProperties) -> bool {
        self.properties(token).contains(property)
    }

    /// Number of interned names
    pub fn len(&self) -> usize {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_properties() -> Box<[TokenProperties]> {
    let mut table = vec![TokenProperties::empty(); Token::HARDCODED_COUNT];
    let groups: [(&[Token], TokenProperties); 9] = [
        (BLOCK_ELEMENTS, TokenProperties::BLOCK_ELEMENT),
        (VOID_ELEMENTS, TokenProperties::VOID),
        (BOOLEAN_ATTRIBUTES, TokenProperties::BOOLEAN_ATTRIBUTE),
        (AUTO_OPEN_OR_CLOSE, TokenProperties::AUTO_OPEN_OR_CLOSE),
        (PARAGRAPH_CLOSERS, TokenProperties::PARAGRAPH_CLOSER),
        (METADATA_TAGS, TokenProperties::METADATA_TAG),
        (CASE_INSENSITIVE_VALUES, TokenProperties::CASE_INSENSITIVE_VALUE),
        (HAS_VALUE_ATTRIBUTE, TokenProperties::HAS_VALUE_ATTRIBUTE),
        (FORM_INPUT_CONTROLS, TokenProperties::FORM_INPUT_CONTROL),
    ];
    for (tokens, property) in groups {
        for token in tokens {
            table[token.0 as usize] |= property;
        }
    }
    table.into_boxed_slice()
}
