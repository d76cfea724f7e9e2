use crate::results::Sentiment;

/// External scoring collaborator consulted for every accepted extraction.
///
/// Implementations must be cheap enough to call inline; the pipeline does not
/// spawn for them. `score` is expected in `[0, 100]` and is clamped anyway.
pub trait ContentAnalytics: Send + Sync {
    /// Independent quality estimate for extracted text
    fn score(&self, text: &str) -> f64;

    /// Sentiment breakdown for extracted text
    fn sentiment(&self, text: &str) -> Sentiment;
}

/// Scores from the collaborator, clamped into range
pub(crate) fn assess(analytics: &dyn ContentAnalytics, text: &str) -> (f64, Sentiment) {
    let score = analytics.score(text);
    let score = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
    (score, analytics.sentiment(text))
}
