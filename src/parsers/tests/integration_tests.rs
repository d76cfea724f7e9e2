use crate::parsers::{ContentType, Parser};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_content_type() {
        let html_content = "<html><body><p>Hello, world!</p><a href=\"https://example.com\">Link</a></body></html>";
        let result = Parser::parse(html_content, ContentType::Html);
        assert_eq!(result.content, "Hello, world! Link");

        let text_content = "Line 1\nLine 2\n\nLine 3";
        let result = Parser::parse(text_content, ContentType::Text);
        assert_eq!(result.content, "Line 1 Line 2\n\nLine 3");

        let result = Parser::parse("\u{0}\u{1}binary", ContentType::Other);
        assert!(result.content.is_empty());
    }

    #[test]
    fn test_detect_from_header() {
        assert_eq!(
            ContentType::detect(Some("text/html; charset=utf-8"), "https://a.com/x.txt"),
            ContentType::Html
        );
        assert_eq!(
            ContentType::detect(Some("text/plain"), "https://a.com/"),
            ContentType::Text
        );
        assert_eq!(
            ContentType::detect(Some("application/pdf"), "https://a.com/doc"),
            ContentType::Other
        );
    }

    #[test]
    fn test_detect_from_url_suffix() {
        assert_eq!(ContentType::detect(None, "https://a.com/notes.TXT?x=1"), ContentType::Text);
        assert_eq!(ContentType::detect(None, "https://a.com/readme.md#top"), ContentType::Text);
        assert_eq!(ContentType::detect(None, "https://a.com/page"), ContentType::Html);
    }

    #[test]
    fn test_html_title_survives_dispatch() {
        let html = "<html><head><title>Report</title></head><body><article>Body text</article></body></html>";
        let result = Parser::parse(html, ContentType::Html);
        assert_eq!(result.title.as_deref(), Some("Report"));
        assert_eq!(result.content, "Body text");
    }
}
