use crate::types::{FixCandidate, SecurityRating, Severity, Verdict};

/// Admission thresholds for the safety filter
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    /// Minimum fix generator confidence in [0, 1]
    pub min_confidence: f64,
    /// Minimum validator score in [0, 100]
    pub min_score: f64,
    /// Strict mode: every gate must pass, not just verdict and confidence
    pub require_all_gates: bool,
}

/// Result of filtering one iteration's candidates
#[derive(Debug, Clone)]
pub struct Selection {
    /// Candidates that passed every configured predicate
    pub admitted: Vec<FixCandidate>,
    /// Candidates held back for manual review (reported, never applied)
    pub needs_review: Vec<FixCandidate>,
}

/// Partition candidates into admitted and needs-review sets.
///
/// Pure function: admission depends only on candidate annotations and the
/// configured thresholds, never on anything else.
pub fn select(candidates: Vec<FixCandidate>, thresholds: &Thresholds) -> Selection {
    let (admitted, needs_review): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| admits(c, thresholds));
    Selection {
        admitted,
        needs_review,
    }
}

fn admits(candidate: &FixCandidate, thresholds: &Thresholds) -> bool {
    let baseline = candidate.verdict == Verdict::Approve
        && candidate.confidence >= thresholds.min_confidence;

    if !thresholds.require_all_gates {
        return baseline;
    }

    baseline
        && candidate.validation_score >= thresholds.min_score
        && matches!(
            candidate.security_rating,
            SecurityRating::Secure | SecurityRating::ModerateRisk
        )
        && !candidate
            .vulnerabilities
            .iter()
            .any(|v| v.severity == Severity::Critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Violation, Vulnerability};

    fn violation() -> Violation {
        Violation {
            file: "src/lib.rs".into(),
            line: 10,
            rule: "no-unwrap".into(),
            snippet: "let x = y.unwrap();".into(),
            priority: Priority::High,
        }
    }

    fn candidate(
        confidence: f64,
        verdict: Verdict,
        score: f64,
        rating: SecurityRating,
        severities: &[Severity],
    ) -> FixCandidate {
        FixCandidate {
            violation: violation(),
            replacement: "let x = y?;".into(),
            extra_files: vec![],
            confidence,
            verdict,
            validation_score: score,
            security_rating: rating,
            vulnerabilities: severities
                .iter()
                .map(|&severity| Vulnerability {
                    description: "finding".into(),
                    severity,
                })
                .collect(),
        }
    }

    fn strict() -> Thresholds {
        Thresholds {
            min_confidence: 0.8,
            min_score: 80.0,
            require_all_gates: true,
        }
    }

    fn relaxed() -> Thresholds {
        Thresholds {
            require_all_gates: false,
            ..strict()
        }
    }

    #[test]
    fn test_strict_admits_only_when_every_gate_passes() {
        // Sweep every predicate dimension and check admission matches the
        // conjunction of the individual gates.
        let confidences = [0.5, 0.8, 0.95];
        let verdicts = [Verdict::Approve, Verdict::NeedsRevision];
        let scores = [50.0, 80.0, 99.0];
        let ratings = [
            SecurityRating::Secure,
            SecurityRating::ModerateRisk,
            SecurityRating::HighRisk,
            SecurityRating::Critical,
        ];
        let vuln_sets: [&[Severity]; 3] =
            [&[], &[Severity::Medium], &[Severity::Medium, Severity::Critical]];

        let thresholds = strict();
        for &confidence in &confidences {
            for &verdict in &verdicts {
                for &score in &scores {
                    for &rating in &ratings {
                        for severities in vuln_sets {
                            let c = candidate(confidence, verdict, score, rating, severities);
                            let expected = verdict == Verdict::Approve
                                && confidence >= 0.8
                                && score >= 80.0
                                && matches!(
                                    rating,
                                    SecurityRating::Secure | SecurityRating::ModerateRisk
                                )
                                && !severities.contains(&Severity::Critical);
                            let selection = select(vec![c], &thresholds);
                            assert_eq!(
                                selection.admitted.len() == 1,
                                expected,
                                "confidence={confidence} verdict={verdict:?} score={score} \
                                 rating={rating:?} severities={severities:?}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_relaxed_ignores_score_rating_and_vulnerabilities() {
        let c = candidate(
            0.9,
            Verdict::Approve,
            10.0,
            SecurityRating::HighRisk,
            &[Severity::Critical],
        );
        let selection = select(vec![c], &relaxed());
        assert_eq!(selection.admitted.len(), 1);
    }

    #[test]
    fn test_relaxed_still_requires_verdict_and_confidence() {
        let low_confidence = candidate(0.5, Verdict::Approve, 99.0, SecurityRating::Secure, &[]);
        let revision = candidate(0.9, Verdict::NeedsRevision, 99.0, SecurityRating::Secure, &[]);
        let selection = select(vec![low_confidence, revision], &relaxed());
        assert!(selection.admitted.is_empty());
        assert_eq!(selection.needs_review.len(), 2);
    }

    #[test]
    fn test_rejected_candidates_go_to_needs_review() {
        let good = candidate(0.9, Verdict::Approve, 90.0, SecurityRating::Secure, &[]);
        let bad = candidate(0.9, Verdict::Approve, 90.0, SecurityRating::HighRisk, &[]);
        let selection = select(vec![good.clone(), bad.clone()], &strict());
        assert_eq!(selection.admitted, vec![good]);
        assert_eq!(selection.needs_review, vec![bad]);
    }

    #[test]
    fn test_boundary_values_admit() {
        // Thresholds are inclusive on both confidence and score
        let c = candidate(0.8, Verdict::Approve, 80.0, SecurityRating::ModerateRisk, &[]);
        let selection = select(vec![c], &strict());
        assert_eq!(selection.admitted.len(), 1);
    }
}
