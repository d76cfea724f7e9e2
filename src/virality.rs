use crate::config::ViralityThresholds;
use crate::results::{EngagementMetric, ResultRecord, ViralityFlag};

/// Flags records whose engagement reaches any configured threshold.
///
/// Metrics are checked in the order likes, comments, shares; the first one
/// reaching its threshold is reported. Records without engagement data are
/// never viral.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViralityClassifier {
    thresholds: ViralityThresholds,
}

impl ViralityClassifier {
    pub fn new(thresholds: ViralityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ViralityThresholds {
        self.thresholds
    }

    pub fn classify(&self, record: &ResultRecord) -> ViralityFlag {
        let Some(engagement) = record.engagement else {
            return ViralityFlag::not_viral();
        };

        let checks = [
            (EngagementMetric::Likes, engagement.likes, self.thresholds.likes),
            (EngagementMetric::Comments, engagement.comments, self.thresholds.comments),
            (EngagementMetric::Shares, engagement.shares, self.thresholds.shares),
        ];

        checks
            .into_iter()
            .find(|(_, value, threshold)| value >= threshold)
            .map(|(metric, value, threshold)| ViralityFlag {
                viral: true,
                metric: Some(metric),
                threshold: Some(threshold),
                value: Some(value),
            })
            .unwrap_or_else(ViralityFlag::not_viral)
    }

    /// Attach a flag to every record and return clones of the viral ones
    pub fn flag_all(&self, records: &mut [ResultRecord]) -> Vec<ResultRecord> {
        let mut viral = Vec::new();
        for record in records.iter_mut() {
            let flag = self.classify(record);
            record.virality = Some(flag);
            if flag.viral {
                ::log::info!(
                    "Viral content from {}: {} ({:?} = {:?})",
                    record.source_provider,
                    record.url,
                    flag.metric,
                    flag.value
                );
                viral.push(record.clone());
            }
        }
        viral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::EngagementMetrics;

    fn post(likes: u64, comments: u64, shares: u64) -> ResultRecord {
        ResultRecord::new("post", "https://instagram.com/p/1", "", "SUPADATA").with_engagement(
            EngagementMetrics {
                likes,
                comments,
                shares,
                views: 0,
            },
        )
    }

    #[test]
    fn test_likes_threshold() {
        let flag = ViralityClassifier::default().classify(&post(1500, 10, 0));
        assert!(flag.viral);
        assert_eq!(flag.metric, Some(EngagementMetric::Likes));
        assert_eq!(flag.threshold, Some(1000));
        assert_eq!(flag.value, Some(1500));
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let classifier = ViralityClassifier::default();
        assert!(classifier.classify(&post(0, 100, 0)).viral);
        assert!(classifier.classify(&post(0, 0, 50)).viral);
        assert!(!classifier.classify(&post(999, 99, 49)).viral);
    }

    #[test]
    fn test_no_engagement_is_not_viral() {
        let record = ResultRecord::new("t", "https://a.com", "", "EXA");
        assert_eq!(ViralityClassifier::default().classify(&record), ViralityFlag::not_viral());
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = ViralityClassifier::new(ViralityThresholds {
            likes: 10,
            comments: 1_000_000,
            shares: 1_000_000,
        });
        assert!(classifier.classify(&post(10, 0, 0)).viral);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let classifier = ViralityClassifier::default();
        let samples = [0, 1, 49, 50, 99, 100, 999, 1000, 5000];
        for &likes in &samples {
            for &comments in &samples {
                for &shares in &samples {
                    if !classifier.classify(&post(likes, comments, shares)).viral {
                        continue;
                    }
                    for bump in [1, 10, 10_000] {
                        assert!(classifier.classify(&post(likes + bump, comments, shares)).viral);
                        assert!(classifier.classify(&post(likes, comments + bump, shares)).viral);
                        assert!(classifier.classify(&post(likes, comments, shares + bump)).viral);
                    }
                }
            }
        }
    }

    #[test]
    fn test_flag_all_marks_every_record() {
        let mut records = vec![post(1500, 0, 0), post(1, 1, 1)];
        let viral = ViralityClassifier::default().flag_all(&mut records);
        assert_eq!(viral.len(), 1);
        assert!(records[0].is_viral());
        assert_eq!(records[1].virality, Some(ViralityFlag::not_viral()));
    }
}
