use crate::parsers::ParseResult;
use crate::parsers::text::collapse_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

/// Elements that never hold article content
const SKIPPED_TAGS: [&str; 9] = [
    "script", "style", "noscript", "nav", "footer", "aside", "header", "form", "iframe",
];

static CONTAINER_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content|main|post|article").expect("static regex"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Parses an HTML document into its main readable text and title
///
/// The content block is picked in order: `<main>`, `<article>`, the largest
/// `div`/`section` whose class or id looks like a content container, `<body>`.
pub fn parse(html: &str) -> ParseResult {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&selector("title"))
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let content = main_content(&doc).map(visible_text).unwrap_or_default();
    ::log::debug!("HTML parser kept {} chars of content", content.len());

    ParseResult::new(content, title)
}

fn main_content(doc: &Html) -> Option<ElementRef<'_>> {
    for css in ["main", "article"] {
        if let Some(element) = doc
            .select(&selector(css))
            .find(|el| !visible_text(*el).is_empty())
        {
            return Some(element);
        }
    }

    let largest = doc
        .select(&selector("div, section"))
        .filter(|el| {
            let value = el.value();
            value.attr("class").is_some_and(|c| CONTAINER_HINT.is_match(c))
                || value.attr("id").is_some_and(|i| CONTAINER_HINT.is_match(i))
        })
        .map(|el| (visible_text(el).len(), el))
        .filter(|(len, _)| *len > 0)
        .max_by_key(|(len, _)| *len)
        .map(|(_, el)| el);
    if largest.is_some() {
        return largest;
    }

    doc.select(&selector("body")).next()
}

/// Text under `element`, skipping non-content subtrees, whitespace collapsed
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    collapse_whitespace(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}
