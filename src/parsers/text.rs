use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("static regex"));

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((https?://[^\s)]+)\)").expect("static regex"));

/// Collapse every whitespace run into a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes text returned by reader services (markdown or plain text)
///
/// Image embeds are dropped, lines inside a paragraph are joined with a
/// space and paragraphs are separated by a blank line.
pub fn clean_reader_text(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let without_images = MARKDOWN_IMAGE.replace_all(text, "");
    split_into_paragraphs(&without_images)
        .iter()
        .map(|paragraph| collapse_whitespace(&paragraph.join(" ")))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Splits text into paragraphs based on empty lines
pub fn split_into_paragraphs(text: &str) -> Vec<Vec<&str>> {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current_paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current_paragraph.is_empty() {
                paragraphs.push(std::mem::take(&mut current_paragraph));
            }
        } else {
            current_paragraph.push(trimmed);
        }
    }

    if !current_paragraph.is_empty() {
        paragraphs.push(current_paragraph);
    }

    paragraphs
}

/// `(label, url)` pairs for every absolute markdown link, in document order
pub fn markdown_links(text: &str) -> Vec<(String, String)> {
    MARKDOWN_LINK
        .captures_iter(text)
        .map(|caps| (caps[1].trim().to_string(), caps[2].to_string()))
        .collect()
}
