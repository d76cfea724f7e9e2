use sha2::{Digest, Sha256};

/// Maximum length of the readable part of a screenshot slug
const SLUG_MAX_CHARS: usize = 60;

/// Convert a URL to a sanitized filename fragment
pub fn sanitize_filename(url: &str) -> String {
    // Remove protocol and replace invalid filename characters
    let mut name = url.replace("http://", "").replace("https://", "");
    name = name.replace(['/', ':', '?', '&', '=', '#', '%', '\\', '*', '"', '<', '>', '|', ' '], "_");
    let name = name.trim_matches('_');

    // Limit filename length on a char boundary
    name.chars().take(SLUG_MAX_CHARS).collect()
}

/// Deterministic slug for a URL: sanitized prefix plus a short SHA-256 suffix
pub fn url_slug(url: &str) -> String {
    let digest = Sha256::digest(url.trim().as_bytes());
    let suffix = hex::encode(&digest[..4]);
    let readable = sanitize_filename(url.trim());
    if readable.is_empty() {
        suffix
    } else {
        format!("{readable}_{suffix}")
    }
}

/// Screenshot file name for a URL captured within a session
pub fn screenshot_file_name(session_id: &str, url: &str) -> String {
    format!("{}_{}.png", sanitize_filename(session_id), url_slug(url))
}
