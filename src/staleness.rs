//! Analysis staleness detection.
//!
//! An automated analysis is authoritative only while it is both the latest
//! internal annotation on the ticket and not contradicted by newer public
//! discussion. This module is the pure classifier behind that rule: no I/O,
//! no clock reads, just the two fetched timestamp streams.

use chrono::Duration;

use crate::models::{Annotation, AnnotationAuthor, ExternalComment};

/// Tolerance applied when comparing annotation timestamps against external
/// comment timestamps. The two come from independent clocks with different
/// precision; anything inside this window is treated as concurrent.
/// Tunable via `[staleness] tolerance_ms`, not a contract.
pub const DEFAULT_TOLERANCE_MS: i64 = 1000;

/// Freshness of the most recent automated analysis for a ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisFreshness {
    /// No automated analysis exists yet.
    None,
    /// An analysis exists but newer ticket activity has outdated it.
    Pending { latest: Annotation },
    /// The analysis is current.
    Complete { latest: Annotation },
}

impl AnalysisFreshness {
    /// The most recent automated annotation, when one exists.
    pub fn latest_analysis(&self) -> Option<&Annotation> {
        match self {
            Self::None => None,
            Self::Pending { latest } | Self::Complete { latest } => Some(latest),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Classify with the default tolerance window.
pub fn classify(annotations: &[Annotation], comments: &[ExternalComment]) -> AnalysisFreshness {
    classify_with_tolerance(
        annotations,
        comments,
        Duration::milliseconds(DEFAULT_TOLERANCE_MS),
    )
}

/// Classify analysis freshness from the ticket's annotations and external
/// comments.
///
/// - No automated annotation at all → `None`.
/// - A human annotation newer than the latest automated one → `Pending`.
/// - Any external comment newer than the latest automated annotation by more
///   than `tolerance` → `Pending`.
/// - Otherwise → `Complete`.
pub fn classify_with_tolerance(
    annotations: &[Annotation],
    comments: &[ExternalComment],
    tolerance: Duration,
) -> AnalysisFreshness {
    let Some(latest_automated) = annotations
        .iter()
        .filter(|a| a.author_kind == AnnotationAuthor::Automated)
        .max_by_key(|a| a.created_at)
    else {
        return AnalysisFreshness::None;
    };

    let superseded_internally = annotations
        .iter()
        .any(|a| a.created_at > latest_automated.created_at);
    if superseded_internally {
        return AnalysisFreshness::Pending {
            latest: latest_automated.clone(),
        };
    }

    let threshold = latest_automated.created_at + tolerance;
    if comments.iter().any(|c| c.created_at > threshold) {
        return AnalysisFreshness::Pending {
            latest: latest_automated.clone(),
        };
    }

    AnalysisFreshness::Complete {
        latest: latest_automated.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn annotation(id: &str, author: AnnotationAuthor, millis: i64) -> Annotation {
        Annotation {
            id: id.to_string(),
            ticket_key: "PROJ-1".to_string(),
            content: format!("note {}", id),
            author_kind: author,
            created_at: at(millis),
            updated_at: None,
        }
    }

    fn comment(id: &str, millis: i64) -> ExternalComment {
        ExternalComment {
            id: id.to_string(),
            body: format!("comment {}", id),
            created_at: at(millis),
        }
    }

    #[test]
    fn empty_ticket_is_none() {
        assert_eq!(classify(&[], &[]), AnalysisFreshness::None);
    }

    #[test]
    fn human_only_annotations_are_none() {
        let annotations = vec![
            annotation("a", AnnotationAuthor::Human, 100),
            annotation("b", AnnotationAuthor::Human, 200),
        ];
        assert_eq!(classify(&annotations, &[]), AnalysisFreshness::None);
    }

    #[test]
    fn lone_analysis_with_older_comment_is_complete() {
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let comments = vec![comment("c", 50)];
        let freshness = classify(&annotations, &comments);
        assert!(freshness.is_complete());
        assert_eq!(freshness.latest_analysis().unwrap().id, "a");
    }

    #[test]
    fn comment_well_past_tolerance_makes_pending() {
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let comments = vec![comment("c", 2000)];
        assert!(matches!(
            classify(&annotations, &comments),
            AnalysisFreshness::Pending { .. }
        ));
    }

    #[test]
    fn comment_exactly_at_tolerance_is_still_complete() {
        // threshold is created_at + tolerance; only strictly newer trips it
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let comments = vec![comment("c", 1100)];
        assert!(classify(&annotations, &comments).is_complete());
    }

    #[test]
    fn comment_one_ms_past_tolerance_is_pending() {
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let comments = vec![comment("c", 1101)];
        assert!(matches!(
            classify(&annotations, &comments),
            AnalysisFreshness::Pending { .. }
        ));
    }

    #[test]
    fn later_human_annotation_makes_pending_regardless_of_comments() {
        let annotations = vec![
            annotation("a", AnnotationAuthor::Automated, 100),
            annotation("b", AnnotationAuthor::Human, 150),
        ];
        let freshness = classify(&annotations, &[]);
        match freshness {
            AnalysisFreshness::Pending { latest } => assert_eq!(latest.id, "a"),
            other => panic!("expected Pending, got {:?}", other),
        }
    }

    #[test]
    fn newest_automated_annotation_wins() {
        let annotations = vec![
            annotation("old", AnnotationAuthor::Automated, 100),
            annotation("human", AnnotationAuthor::Human, 200),
            annotation("new", AnnotationAuthor::Automated, 300),
        ];
        let freshness = classify(&annotations, &[]);
        assert!(freshness.is_complete());
        assert_eq!(freshness.latest_analysis().unwrap().id, "new");
    }

    #[test]
    fn custom_tolerance_is_respected() {
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let comments = vec![comment("c", 400)];
        let wide = classify_with_tolerance(&annotations, &comments, Duration::milliseconds(500));
        assert!(wide.is_complete());
        let narrow = classify_with_tolerance(&annotations, &comments, Duration::milliseconds(100));
        assert!(matches!(narrow, AnalysisFreshness::Pending { .. }));
    }

    #[test]
    fn classification_is_idempotent() {
        let annotations = vec![
            annotation("a", AnnotationAuthor::Automated, 100),
            annotation("b", AnnotationAuthor::Human, 150),
        ];
        let comments = vec![comment("c", 2000)];
        assert_eq!(
            classify(&annotations, &comments),
            classify(&annotations, &comments)
        );
    }
}
