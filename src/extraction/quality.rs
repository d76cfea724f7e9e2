use crate::config::QualityPolicy;

/// Heuristic usefulness of extracted content, always within `[0, 100]`.
///
/// Empty content scores 0 whatever its source.
pub fn quality_score(content: &str, url: &str, keywords: &[String], policy: &QualityPolicy) -> f64 {
    let content = content.trim();
    if content.is_empty() {
        return 0.0;
    }

    let length = content.chars().count();
    let mut score = policy
        .length_bands
        .iter()
        .filter(|(minimum, _)| length > *minimum)
        .max_by_key(|(minimum, _)| *minimum)
        .map(|(_, points)| *points)
        .unwrap_or(0.0);

    let lowered = content.to_lowercase();
    let matched = keywords
        .iter()
        .filter(|k| !k.is_empty() && lowered.contains(k.to_lowercase().as_str()))
        .count();
    score += matched as f64 * policy.keyword_points;

    if policy.preferred_domains.matches(url) {
        score += policy.preferred_points;
    }
    if policy.blocked_domains.matches(url) {
        score -= policy.blocked_penalty;
    }

    if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 }
}
