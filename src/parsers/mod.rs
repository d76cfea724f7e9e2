pub mod html;
pub mod text;

#[cfg(test)]
mod tests;

/// Kind of document handed to the parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// HTML document
    Html,
    /// Plain text or markdown (reader services, `.txt` files)
    Text,
    /// Binary or otherwise unreadable payloads
    Other,
}

impl ContentType {
    /// Classify from a `Content-Type` header, falling back to the URL suffix
    pub fn detect(content_type_header: Option<&str>, url: &str) -> Self {
        if let Some(header) = content_type_header {
            let header = header.to_ascii_lowercase();
            if header.contains("html") || header.contains("xml") {
                return ContentType::Html;
            }
            if header.starts_with("text/") || header.contains("markdown") {
                return ContentType::Text;
            }
            if !header.is_empty() {
                ::log::debug!("Classifying as Other ({}): {}", header, url);
                return ContentType::Other;
            }
        }

        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".txt") || path.ends_with(".md") {
            ContentType::Text
        } else {
            ContentType::Html
        }
    }
}

/// Result of parsing a fetched document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseResult {
    /// Readable text content, whitespace collapsed
    pub content: String,
    /// Document title, when the format carries one
    pub title: Option<String>,
}

impl ParseResult {
    pub fn new(content: String, title: Option<String>) -> Self {
        Self { content, title }
    }

    pub fn content_only(content: String) -> Self {
        Self {
            content,
            title: None,
        }
    }
}

/// Main parser that delegates to specific format parsers
pub struct Parser;

impl Parser {
    /// Parse content based on its type
    pub fn parse(content: &str, content_type: ContentType) -> ParseResult {
        match content_type {
            ContentType::Html => html::parse(content),
            ContentType::Text => ParseResult::content_only(text::clean_reader_text(content)),
            ContentType::Other => ParseResult::default(),
        }
    }
}
