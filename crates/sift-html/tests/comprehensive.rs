//! Comprehensive tests for sift-html
//!
//! Tree construction: implied tags, foster parenting, parsing modes and
//! the indexes built on the result.

use sift_dom::{NodeId, NodeKind, Token};
use sift_html::{Document, HtmlParser, ParseMode, ParseOptions, ResolvedMode};

fn parse(html: &str) -> Document {
    sift_html::parse(html).unwrap()
}

fn child_tags(doc: &Document, parent: NodeId) -> Vec<Token> {
    doc.tree()
        .children(parent)
        .filter(|&c| doc.tree().kind(c) == Some(NodeKind::Element))
        .map(|c| doc.tree().tag(c))
        .collect()
}

fn only(doc: &Document, tag: &str) -> NodeId {
    let found = doc.elements_by_tag(tag).to_vec(doc);
    assert_eq!(found.len(), 1, "expected one <{}>", tag);
    found[0]
}

// ============================================================================
// OPTIONAL TAGS
// ============================================================================

#[test]
fn test_list_items_become_siblings() {
    let doc = parse("<ul><li>A<li>B</ul>");
    let ul = only(&doc, "ul");
    assert_eq!(child_tags(&doc, ul), vec![Token::LI, Token::LI]);

    let items = doc.elements_by_tag("li").to_vec(&doc);
    assert_eq!(doc.tree().text_content(items[0]), "A");
    assert_eq!(doc.tree().text_content(items[1]), "B");
}

#[test]
fn test_table_gets_implied_tbody() {
    let doc = parse("<table><tr><td>1</table>");
    let table = only(&doc, "table");
    let tbody = only(&doc, "tbody");
    let tr = only(&doc, "tr");
    let td = only(&doc, "td");

    assert_eq!(doc.tree().parent(tbody), Some(table));
    assert_eq!(doc.tree().parent(tr), Some(tbody));
    assert_eq!(doc.tree().parent(td), Some(tr));
    assert_eq!(doc.tree().text_content(td), "1");
}

#[test]
fn test_cells_close_each_other() {
    let doc = parse("<table><tr><td>a<td>b<tr><td>c</table>");
    let rows = doc.elements_by_tag("tr").to_vec(&doc);
    assert_eq!(rows.len(), 2);
    assert_eq!(child_tags(&doc, rows[0]), vec![Token::TD, Token::TD]);
    assert_eq!(child_tags(&doc, rows[1]), vec![Token::TD]);
}

#[test]
fn test_block_closes_paragraph() {
    let doc = parse("<p>A<div>B</div>");
    let p = only(&doc, "p");
    let div = only(&doc, "div");
    assert_eq!(doc.tree().parent(div), Some(doc.root()));
    assert_eq!(doc.tree().text_content(p), "A");
}

#[test]
fn test_inline_stays_in_paragraph() {
    let doc = parse("<p>A<span>B</span>C</p>");
    let p = only(&doc, "p");
    assert_eq!(child_tags(&doc, p), vec![Token::SPAN]);
    assert_eq!(doc.tree().text_content(p), "ABC");
}

#[test]
fn test_options_and_definitions() {
    let doc = parse("<select><option>a<option>b<optgroup><option>c</select><dl><dt>x<dd>y<dt>z</dl>");
    assert_eq!(doc.elements_by_tag("option").len(), 3);
    let dl = only(&doc, "dl");
    assert_eq!(child_tags(&doc, dl), vec![Token::DT, Token::DD, Token::DT]);
}

// ============================================================================
// FOSTER PARENTING
// ============================================================================

#[test]
fn test_text_in_table_moves_before_it() {
    let doc = parse("<table>X<tr><td>Y</td></tr></table>");
    let table = only(&doc, "table");
    let first = doc.tree().children(doc.root()).next().unwrap();

    assert_eq!(doc.get(first).and_then(|n| n.as_text()), Some("X"));
    assert_eq!(doc.tree().children(doc.root()).nth(1), Some(table));
    assert_eq!(doc.tree().text_content(only(&doc, "td")), "Y");
}

#[test]
fn test_element_in_table_moves_before_it() {
    let doc = parse("<table><tr><td>1</td></tr><b>bold</b></table>");
    let table = only(&doc, "table");
    let b = only(&doc, "b");
    let top: Vec<NodeId> = doc.tree().children(doc.root()).collect();
    assert_eq!(top, vec![b, table]);
}

#[test]
fn test_many_fostered_elements_keep_path_order() {
    let rows = 2_000;
    let html = format!("<table>{}</table>", "<tr><td>a</td></tr><span></span>".repeat(rows));
    let doc = parse(&html);
    let table = only(&doc, "table");

    let spans = doc.elements_by_tag("span").to_vec(&doc);
    assert_eq!(spans.len(), rows);
    assert!(spans.iter().all(|&s| doc.tree().parent(s) == Some(doc.root())));
    assert_eq!(doc.tree().children(doc.root()).last(), Some(table));
    assert_eq!(doc.elements_by_tag("td").len(), rows);

    let root = doc.root();
    let pre_order: Vec<NodeId> =
        std::iter::once(root).chain(doc.tree().descendants(root)).collect();
    let by_path: Vec<NodeId> = doc.node_index().iter().map(|(_, id)| id).collect();
    assert_eq!(by_path, pre_order);
    assert_eq!(doc.tree().path(table).unwrap().ordinal(), Some(rows as u32));
}

// ============================================================================
// DOCUMENT MODE
// ============================================================================

#[test]
fn test_document_skeleton() {
    let doc = parse("<!DOCTYPE html><title>T</title><p>x");
    let kinds: Vec<_> = doc
        .tree()
        .children(doc.root())
        .filter_map(|c| doc.tree().kind(c))
        .collect();
    assert_eq!(kinds, vec![NodeKind::Doctype, NodeKind::Element]);

    let html = doc.html().unwrap();
    assert_eq!(child_tags(&doc, html), vec![Token::HEAD, Token::BODY]);
    assert_eq!(doc.title(), "T");
    assert_eq!(child_tags(&doc, doc.body().unwrap()), vec![Token::P]);
}

#[test]
fn test_explicit_skeleton_is_not_duplicated() {
    let doc = parse("<html lang=en>\n<head><title>x</title></head>\n<body class=a><p>y</p></body>\n</html>");
    assert_eq!(doc.elements_by_tag("html").len(), 1);
    assert_eq!(doc.elements_by_tag("head").len(), 1);
    assert_eq!(doc.elements_by_tag("body").len(), 1);

    let html = doc.html().unwrap();
    assert_eq!(child_tags(&doc, html), vec![Token::HEAD, Token::BODY]);
    assert_eq!(doc.tree().element(html).unwrap().attr_by_name("lang"), Some("en"));
}

#[test]
fn test_head_content_after_body_content() {
    let doc = parse("<html><meta charset=utf-8><div>a</div></html>");
    let head = doc.head().unwrap();
    let body = doc.body().unwrap();
    assert_eq!(child_tags(&doc, head), vec![Token::META]);
    assert_eq!(child_tags(&doc, body), vec![Token::DIV]);
}

#[test]
fn test_forced_document_mode() {
    let options = ParseOptions::default().with_mode(ParseMode::Document);
    let output = HtmlParser::with_options(options).parse("<p>hi").unwrap();
    assert_eq!(output.mode, ResolvedMode::Document);
    assert!(output.document.body().is_some());
}

// ============================================================================
// CONTENT AND FRAGMENT MODES
// ============================================================================

#[test]
fn test_content_mode_has_no_skeleton() {
    let output = HtmlParser::new().parse("<div>a</div><div>b</div>").unwrap();
    assert_eq!(output.mode, ResolvedMode::Content);
    let doc = output.document;
    assert!(doc.html().is_none());
    assert_eq!(child_tags(&doc, doc.root()), vec![Token::DIV, Token::DIV]);
}

#[test]
fn test_fragment_with_context() {
    let doc = sift_html::parse_fragment("<td>a<td>b", "tr").unwrap();
    assert_eq!(doc.tree().kind(doc.root()), Some(NodeKind::Fragment));
    assert_eq!(child_tags(&doc, doc.root()), vec![Token::TD, Token::TD]);
}

#[test]
fn test_fragment_context_is_sniffed() {
    let output = HtmlParser::new().parse("<tr><td>1</td></tr>").unwrap();
    assert_eq!(output.mode, ResolvedMode::Fragment(Token::TBODY));
    let doc = output.document;
    assert_eq!(child_tags(&doc, doc.root()), vec![Token::TR]);
    assert!(doc.elements_by_tag("tbody").is_empty());
}

#[test]
fn test_fragment_mode_without_context_sniffs() {
    let options = ParseOptions::default().with_mode(ParseMode::Fragment);
    let output = HtmlParser::with_options(options).parse("<li>a<li>b").unwrap();
    assert_eq!(output.mode, ResolvedMode::Fragment(Token::UL));

    let options = ParseOptions::default().with_mode(ParseMode::Fragment);
    let output = HtmlParser::with_options(options).parse("<html><p>x").unwrap();
    assert_eq!(output.mode, ResolvedMode::Content);
}

// ============================================================================
// TOKENIZER STATES
// ============================================================================

#[test]
fn test_script_content_is_raw() {
    let doc = parse(r#"<script>if (a<b) { x = "<p>"; }</script><p>ok</p>"#);
    let script = only(&doc, "script");
    assert_eq!(doc.tree().text_content(script), r#"if (a<b) { x = "<p>"; }"#);
    assert_eq!(doc.elements_by_tag("p").len(), 1);
}

#[test]
fn test_textarea_and_title_are_rcdata() {
    let doc = parse("<textarea><b>x</b> &amp;</textarea>");
    assert!(doc.elements_by_tag("b").is_empty());
    assert_eq!(doc.tree().text_content(only(&doc, "textarea")), "<b>x</b> &");
}

#[test]
fn test_foreign_content_namespace() {
    let doc = parse(r#"<svg><circle r="4"/><g></g></svg><p>x</p>"#);
    let circle = only(&doc, "circle");
    let g = only(&doc, "g");
    let svg = only(&doc, "svg");
    assert_eq!(doc.tree().parent(g), Some(svg));
    assert_eq!(doc.tree().element(circle).unwrap().namespace, sift_dom::Namespace::Svg);
    assert_eq!(doc.tree().parent(only(&doc, "p")), Some(doc.root()));
}

// ============================================================================
// OPTIONS
// ============================================================================

#[test]
fn test_self_closing_is_opt_in() {
    let doc = parse("<div/><span>x</span>");
    let div = only(&doc, "div");
    assert_eq!(child_tags(&doc, div), vec![Token::SPAN]);

    let options = ParseOptions::default().with_self_closing(true);
    let doc = HtmlParser::with_options(options).parse("<div/><span>x</span>").unwrap().document;
    assert_eq!(child_tags(&doc, doc.root()), vec![Token::DIV, Token::SPAN]);
}

#[test]
fn test_comments() {
    let doc = parse("<div><!-- note --></div>");
    let div = only(&doc, "div");
    let comment = doc.tree().children(div).next().unwrap();
    assert_eq!(doc.tree().kind(comment), Some(NodeKind::Comment));

    let options = ParseOptions::default().with_strip_comments(true);
    let doc = HtmlParser::with_options(options).parse("<div><!-- note --></div>").unwrap().document;
    assert_eq!(doc.tree().children(only(&doc, "div")).count(), 0);
}

// ============================================================================
// INDEXES
// ============================================================================

#[test]
fn test_parsed_document_is_indexed() {
    let doc = parse(r#"<div id="main"><p class="a b">1</p><p class="b" data-x>2</p></div>"#);
    assert!(doc.is_indexing());

    let main = doc.element_by_id("main").unwrap();
    assert_eq!(doc.tree().tag(main), Token::DIV);
    assert_eq!(doc.elements_by_class("b").len(), 2);
    assert_eq!(doc.elements_by_class("a").len(), 1);
    assert_eq!(doc.elements_with_attribute("data-x").len(), 1);
    assert_eq!(doc.descendants_by_tag(main, "p").len(), 2);
}

#[test]
fn test_index_results_follow_document_order() {
    let doc = parse("<ul><li>1</li><li>2<ul><li>3</li></ul></li><li>4</li></ul>");
    let items = doc.elements_by_tag("li").to_vec(&doc);
    let text: Vec<String> = items
        .iter()
        .map(|&li| {
            let first = doc.tree().children(li).next();
            first.and_then(|t| doc.get(t)?.as_text().map(str::to_owned)).unwrap_or_default()
        })
        .collect();
    assert_eq!(text, vec!["1", "2", "3", "4"]);
}

#[test]
fn test_indexing_can_be_skipped() {
    let options = ParseOptions::default().with_index(false);
    let mut doc = HtmlParser::with_options(options).parse("<p id=x>").unwrap().document;
    assert!(!doc.is_indexing());
    assert!(doc.node_index().is_empty());
    let p = doc.tree().children(doc.root()).next().unwrap();
    assert!(doc.tree().is_attached(p));
    assert_eq!(doc.tree().path(p).unwrap().as_slice(), &[0]);

    doc.enable_indexing();
    assert!(doc.element_by_id("x").is_some());
}

#[test]
fn test_edits_after_parsing_keep_index_current() {
    let mut doc = parse("<div id=a><span>1</span></div><div id=b></div>");
    let span = only(&doc, "span");
    let b = doc.element_by_id("b").unwrap();
    doc.append_child(b, span).unwrap();

    assert_eq!(doc.descendants_by_tag(b, "span").len(), 1);
    let a = doc.element_by_id("a").unwrap();
    assert!(doc.descendants_by_tag(a, "span").is_empty());
}
