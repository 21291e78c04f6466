//! Built-in proof rules.
//!
//! Each rule is a variant of [`ProofRule`]; evaluation dispatches on the
//! variant tag so the full rule set is closed, enumerable, and cheap to
//! copy into the registry. A rule's scope names the (dimension, category)
//! of the claims it evaluates; the rule itself may read the whole
//! evidence set, which is how cross-artifact rules (regression tests plus
//! a passing run) cite records from more than one category.
//!
//! Rules never consult clocks, config files, or anything outside their
//! arguments. Records flagged as contradicted are invisible to every
//! rule; contradictions surface through report risk flags instead of
//! through verdicts built on disputed facts.

use crate::aggregate::EvidenceSet;
use crate::claim::Claim;
use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};
use crate::rubric::{Dimension, Thresholds};

use super::{RuleError, RuleVerdict};

/// Changes touching more than this multiple of the focus cap are
/// contradicted rather than merely oversized.
pub const FOCUS_BLOWOUT_MULTIPLIER: usize = 2;

/// The built-in proof rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProofRule {
    /// The change stays within the reviewable-size cap.
    FocusedChange,
    /// Test files changed and a passing run confirms them.
    RegressionTestAdded,
    /// Test files changed, whether or not a run confirms them.
    TestTouch,
    /// The submitted test run is green.
    SuitePasses,
    /// Line coverage meets the profile's bar.
    CoverageBar,
    /// The work sample landed within the expected window.
    TimelyCompletion,
    /// The writeup covers every required topic.
    WriteupCovers,
    /// A self-reported skill is independently corroborated.
    SkillCorroborated,
    /// A stated tenure is independently corroborated.
    TenureCorroborated,
}

impl ProofRule {
    /// Stable rule identifier, versioned so reports stay interpretable
    /// when rule semantics change.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::FocusedChange => "code/focused-change@v1",
            Self::RegressionTestAdded => "tests/regression-added@v1",
            Self::TestTouch => "tests/test-touch@v1",
            Self::SuitePasses => "tests/suite-passes@v1",
            Self::CoverageBar => "tests/coverage-bar@v1",
            Self::TimelyCompletion => "speed/timely-completion@v1",
            Self::WriteupCovers => "comms/writeup-covers@v1",
            Self::SkillCorroborated => "experience/skill-corroborated@v1",
            Self::TenureCorroborated => "experience/tenure-corroborated@v1",
        }
    }

    /// The (dimension, category) of claims this rule evaluates.
    #[must_use]
    pub const fn scope(self) -> (Dimension, EvidenceCategory) {
        match self {
            Self::FocusedChange => (Dimension::CodeQuality, EvidenceCategory::CommitPattern),
            Self::RegressionTestAdded | Self::TestTouch => {
                (Dimension::TestDiscipline, EvidenceCategory::CommitPattern)
            },
            Self::SuitePasses => (Dimension::TestDiscipline, EvidenceCategory::TestExecution),
            Self::CoverageBar => (Dimension::TestDiscipline, EvidenceCategory::TestCoverage),
            Self::TimelyCompletion => (Dimension::CompletionSpeed, EvidenceCategory::Timing),
            Self::WriteupCovers => {
                (Dimension::Communication, EvidenceCategory::DocumentationQuality)
            },
            Self::SkillCorroborated => (Dimension::Experience, EvidenceCategory::SelfReported),
            Self::TenureCorroborated => (Dimension::Experience, EvidenceCategory::JobTenure),
        }
    }

    /// Every built-in rule.
    #[must_use]
    pub const fn all() -> [Self; 9] {
        [
            Self::FocusedChange,
            Self::RegressionTestAdded,
            Self::TestTouch,
            Self::SuitePasses,
            Self::CoverageBar,
            Self::TimelyCompletion,
            Self::WriteupCovers,
            Self::SkillCorroborated,
            Self::TenureCorroborated,
        ]
    }

    /// Evaluates one claim against the evidence set.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the claim is mis-wired for this rule
    /// (for example an assertion rule given a claim without a fact key).
    /// The engine treats any error as a rejected evaluation.
    pub fn evaluate(
        self,
        claim: &Claim,
        evidence: &EvidenceSet,
        thresholds: &Thresholds,
    ) -> Result<RuleVerdict, RuleError> {
        match self {
            Self::FocusedChange => Ok(focused_change(evidence, thresholds)),
            Self::RegressionTestAdded => Ok(regression_test_added(evidence)),
            Self::TestTouch => Ok(test_touch(evidence)),
            Self::SuitePasses => Ok(suite_passes(evidence)),
            Self::CoverageBar => Ok(coverage_bar(evidence, thresholds)),
            Self::TimelyCompletion => Ok(timely_completion(evidence, thresholds)),
            Self::WriteupCovers => Ok(writeup_covers(evidence, thresholds)),
            Self::SkillCorroborated => corroborated_assertion(
                claim,
                evidence,
                thresholds,
                EvidenceCategory::SelfReported,
                "skill",
            ),
            Self::TenureCorroborated => corroborated_assertion(
                claim,
                evidence,
                thresholds,
                EvidenceCategory::JobTenure,
                "stated tenure",
            ),
        }
    }
}

/// Active, undisputed records in one category.
fn clean_records<'a>(
    evidence: &'a EvidenceSet,
    category: EvidenceCategory,
) -> impl Iterator<Item = &'a Evidence> + 'a {
    evidence
        .active_in(category)
        .filter(|record| !record.contradiction_detected)
}

/// Whether the category holds active records that are all disputed.
fn only_disputed(evidence: &EvidenceSet, category: EvidenceCategory) -> bool {
    evidence.active_in(category).next().is_some()
        && clean_records(evidence, category).next().is_none()
}

fn focused_change(evidence: &EvidenceSet, thresholds: &Thresholds) -> RuleVerdict {
    let shape = clean_records(evidence, EvidenceCategory::CommitPattern)
        .find(|record| matches!(record.payload, EvidencePayload::DiffShape { .. }));
    let Some(record) = shape else {
        if only_disputed(evidence, EvidenceCategory::CommitPattern) {
            return RuleVerdict::unverified("diff measurements are disputed between sources");
        }
        return RuleVerdict::unverified("no diff submitted");
    };
    let EvidencePayload::DiffShape { files_changed, .. } = record.payload else {
        return RuleVerdict::unverified("no diff shape recorded");
    };

    let cap = thresholds.max_files_changed;
    if files_changed <= cap {
        RuleVerdict::verified(
            format!("change touches {files_changed} files, within the cap of {cap}"),
            vec![record.id.clone()],
            record.confidence,
        )
    } else if files_changed > cap.saturating_mul(FOCUS_BLOWOUT_MULTIPLIER) {
        RuleVerdict::contradicted(
            format!("change touches {files_changed} files, far over the cap of {cap}"),
            vec![record.id.clone()],
            record.confidence,
        )
    } else {
        RuleVerdict::partial(
            format!("change touches {files_changed} files, over the cap of {cap}"),
            vec![record.id.clone()],
            record.confidence,
        )
    }
}

/// The footprint record with the most test files, if any tests changed.
fn test_footprint(evidence: &EvidenceSet) -> Option<&Evidence> {
    clean_records(evidence, EvidenceCategory::CommitPattern)
        .filter(|record| {
            matches!(
                record.payload,
                EvidencePayload::TestFootprint { test_files, .. } if test_files > 0
            )
        })
        .max_by(|a, b| {
            footprint_size(a)
                .cmp(&footprint_size(b))
                .then_with(|| b.id.cmp(&a.id))
        })
}

fn footprint_size(record: &Evidence) -> usize {
    match record.payload {
        EvidencePayload::TestFootprint { test_files, .. } => test_files,
        _ => 0,
    }
}

/// The first clean green run, if one exists.
fn green_run(evidence: &EvidenceSet) -> Option<&Evidence> {
    clean_records(evidence, EvidenceCategory::TestExecution).find(|record| {
        matches!(
            record.payload,
            EvidencePayload::TestRun { total, failed, .. } if total > 0 && failed == 0
        )
    })
}

/// Whether any clean run reports failures.
fn failing_run(evidence: &EvidenceSet) -> bool {
    clean_records(evidence, EvidenceCategory::TestExecution).any(|record| {
        matches!(record.payload, EvidencePayload::TestRun { failed, .. } if failed > 0)
    })
}

fn regression_test_added(evidence: &EvidenceSet) -> RuleVerdict {
    let Some(footprint) = test_footprint(evidence) else {
        return RuleVerdict::unverified("no test files changed");
    };
    let Some(run) = green_run(evidence) else {
        return RuleVerdict::unverified(
            "test files changed but no passing suite run confirms them",
        );
    };
    let confidence =
        Confidence::new(footprint.confidence.value().min(run.confidence.value()));
    RuleVerdict::verified(
        format!(
            "{} test file(s) changed and the suite passes",
            footprint_size(footprint)
        ),
        vec![footprint.id.clone(), run.id.clone()],
        confidence,
    )
}

fn test_touch(evidence: &EvidenceSet) -> RuleVerdict {
    let Some(footprint) = test_footprint(evidence) else {
        return RuleVerdict::unverified("no test files changed");
    };
    if failing_run(evidence) {
        return RuleVerdict::unverified("test files changed but the suite is failing");
    }
    RuleVerdict::partial(
        format!(
            "{} test file(s) changed; no passing run confirms them",
            footprint_size(footprint)
        ),
        vec![footprint.id.clone()],
        footprint.confidence,
    )
}

fn suite_passes(evidence: &EvidenceSet) -> RuleVerdict {
    let Some(record) = clean_records(evidence, EvidenceCategory::TestExecution)
        .find(|record| matches!(record.payload, EvidencePayload::TestRun { .. }))
    else {
        if only_disputed(evidence, EvidenceCategory::TestExecution) {
            return RuleVerdict::unverified("test results are disputed between sources");
        }
        return RuleVerdict::unverified("no test run submitted");
    };
    let EvidencePayload::TestRun { total, passed, failed, .. } = record.payload else {
        return RuleVerdict::unverified("no test run recorded");
    };

    if total == 0 {
        return RuleVerdict::unverified("no tests executed");
    }
    if failed > 0 {
        return RuleVerdict::contradicted(
            format!("{failed} of {total} tests failed"),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    if record.needs_verification {
        return RuleVerdict::partial(
            format!("{passed}/{total} tests passed but the counts are inconsistent"),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    RuleVerdict::verified(
        format!("{passed}/{total} tests passed"),
        vec![record.id.clone()],
        record.confidence,
    )
}

fn coverage_bar(evidence: &EvidenceSet, thresholds: &Thresholds) -> RuleVerdict {
    let Some(record) = clean_records(evidence, EvidenceCategory::TestCoverage)
        .find(|record| matches!(record.payload, EvidencePayload::Coverage { .. }))
    else {
        if only_disputed(evidence, EvidenceCategory::TestCoverage) {
            return RuleVerdict::unverified("coverage reports are disputed between sources");
        }
        return RuleVerdict::unverified("no coverage report submitted");
    };
    let EvidencePayload::Coverage { line_pct, delta_pct, .. } = record.payload else {
        return RuleVerdict::unverified("no coverage recorded");
    };

    let bar = thresholds.min_line_coverage_pct;
    if line_pct < bar {
        return RuleVerdict::contradicted(
            format!("line coverage {line_pct:.1}% is below the {bar:.0}% bar"),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    if let Some(delta) = delta_pct {
        if delta < thresholds.min_coverage_delta_pct {
            return RuleVerdict::contradicted(
                format!(
                    "coverage moved {delta:+.1} points versus baseline, below the allowed {:+.1}",
                    thresholds.min_coverage_delta_pct
                ),
                vec![record.id.clone()],
                record.confidence,
            );
        }
    }
    if record.needs_verification {
        return RuleVerdict::partial(
            format!("line coverage {line_pct:.1}% meets the bar but the report needs review"),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    RuleVerdict::verified(
        format!("line coverage {line_pct:.1}% meets the {bar:.0}% bar"),
        vec![record.id.clone()],
        record.confidence,
    )
}

fn timely_completion(evidence: &EvidenceSet, thresholds: &Thresholds) -> RuleVerdict {
    let Some(record) = clean_records(evidence, EvidenceCategory::Timing)
        .find(|record| matches!(record.payload, EvidencePayload::Timing { .. }))
    else {
        if only_disputed(evidence, EvidenceCategory::Timing) {
            return RuleVerdict::unverified("timing measurements are disputed between sources");
        }
        return RuleVerdict::unverified("no timing data recorded");
    };
    let EvidencePayload::Timing { span_hours } = record.payload else {
        return RuleVerdict::unverified("no completion span recorded");
    };

    let ceiling = thresholds.max_completion_hours;
    if span_hours <= ceiling {
        RuleVerdict::verified(
            format!("completed in {span_hours:.1}h, within the {ceiling:.0}h window"),
            vec![record.id.clone()],
            record.confidence,
        )
    } else {
        RuleVerdict::contradicted(
            format!("completed in {span_hours:.1}h, over the {ceiling:.0}h window"),
            vec![record.id.clone()],
            record.confidence,
        )
    }
}

fn writeup_covers(evidence: &EvidenceSet, thresholds: &Thresholds) -> RuleVerdict {
    let Some(record) = clean_records(evidence, EvidenceCategory::DocumentationQuality)
        .find(|record| matches!(record.payload, EvidencePayload::WriteupShape { .. }))
    else {
        if only_disputed(evidence, EvidenceCategory::DocumentationQuality) {
            return RuleVerdict::unverified("writeup measurements are disputed between sources");
        }
        return RuleVerdict::unverified("no writeup submitted");
    };
    let EvidencePayload::WriteupShape {
        word_count,
        ref sections_present,
        ref sections_missing,
    } = record.payload
    else {
        return RuleVerdict::unverified("no writeup shape recorded");
    };

    if sections_missing.is_empty() {
        if word_count < thresholds.min_writeup_words {
            return RuleVerdict::partial(
                format!(
                    "covers every required topic but is thin at {word_count} words \
                     (expected {})",
                    thresholds.min_writeup_words
                ),
                vec![record.id.clone()],
                record.confidence,
            );
        }
        return RuleVerdict::verified(
            format!("covers every required topic in {word_count} words"),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    if sections_present.is_empty() {
        return RuleVerdict::contradicted(
            format!("covers none of the required topics: {}", sections_missing.join(", ")),
            vec![record.id.clone()],
            record.confidence,
        );
    }
    RuleVerdict::partial(
        format!("missing required topics: {}", sections_missing.join(", ")),
        vec![record.id.clone()],
        record.confidence,
    )
}

/// Shared corroboration check for self-reported skills and tenure.
fn corroborated_assertion(
    claim: &Claim,
    evidence: &EvidenceSet,
    thresholds: &Thresholds,
    category: EvidenceCategory,
    noun: &str,
) -> Result<RuleVerdict, RuleError> {
    let Some(fact_key) = claim.fact_key.as_deref() else {
        return Err(RuleError::MissingFactKey {
            claim_id: claim.id.clone(),
        });
    };

    let matching: Vec<&Evidence> = evidence
        .active_in(category)
        .filter(|record| record.payload.fact_key() == fact_key)
        .collect();
    if matching.is_empty() {
        return Ok(RuleVerdict::unverified(format!("no evidence on record for this {noun}")));
    }

    let disputed: Vec<&Evidence> = matching
        .iter()
        .copied()
        .filter(|record| record.contradiction_detected)
        .collect();
    if !disputed.is_empty() {
        let mut refs: Vec<String> =
            disputed.iter().map(|record| record.id.clone()).collect();
        refs.sort_unstable();
        let confidence = best_confidence(&disputed);
        return Ok(RuleVerdict::contradicted(
            format!("independent sources disagree about this {noun}"),
            refs,
            confidence,
        ));
    }

    let best = matching
        .iter()
        .copied()
        .max_by(|a, b| {
            a.source_count()
                .cmp(&b.source_count())
                .then_with(|| a.confidence.value().total_cmp(&b.confidence.value()))
                .then_with(|| b.id.cmp(&a.id))
        })
        .unwrap_or(matching[0]);

    let needed = thresholds.min_corroborating_sources;
    if best.source_count() >= needed
        && best.confidence.value() > Confidence::SELF_REPORTED_CAP.value()
    {
        return Ok(RuleVerdict::verified(
            format!(
                "{noun} corroborated by {} independent source(s)",
                best.source_count()
            ),
            vec![best.id.clone()],
            best.confidence,
        ));
    }
    Ok(RuleVerdict::unverified(format!(
        "{noun} has {} independent source(s); {needed} required",
        best.source_count()
    )))
}

fn best_confidence(records: &[&Evidence]) -> Confidence {
    records
        .iter()
        .map(|record| record.confidence)
        .max_by(|a, b| a.value().total_cmp(&b.value()))
        .unwrap_or(Confidence::ZERO)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::claim::ClaimStatus as Status;

    fn thresholds() -> Thresholds {
        Thresholds {
            max_completion_hours: 48.0,
            min_line_coverage_pct: 70.0,
            min_coverage_delta_pct: -1.0,
            min_writeup_words: 150,
            min_corroborating_sources: 2,
            max_files_changed: 40,
        }
    }

    fn record(
        artifact_id: &str,
        category: EvidenceCategory,
        confidence: f64,
        payload: EvidencePayload,
    ) -> Evidence {
        Evidence::new(
            "cand-1",
            artifact_id,
            category,
            "fact",
            Confidence::new(confidence),
            payload,
            10,
        )
    }

    fn diff_shape(files: usize) -> Evidence {
        record(
            "art-diff",
            EvidenceCategory::CommitPattern,
            0.95,
            EvidencePayload::DiffShape {
                files_changed: files,
                lines_added: 100,
                lines_removed: 20,
            },
        )
    }

    fn footprint(test_files: usize) -> Evidence {
        record(
            "art-diff",
            EvidenceCategory::CommitPattern,
            0.95,
            EvidencePayload::TestFootprint {
                test_files,
                paths: vec!["tests/api.rs".to_string()],
            },
        )
    }

    fn run(total: u64, failed: u64) -> Evidence {
        record(
            "art-log",
            EvidenceCategory::TestExecution,
            0.95,
            EvidencePayload::TestRun {
                total,
                passed: total - failed,
                failed,
                duration_ms: None,
            },
        )
    }

    #[test]
    fn test_rule_ids_unique_and_versioned() {
        let mut ids: Vec<&str> = ProofRule::all().iter().map(|r| r.id()).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(ids.iter().all(|id| id.ends_with("@v1")));
    }

    #[test]
    fn test_focused_change_grades_by_size() {
        let evidence = EvidenceSet::from_records(vec![diff_shape(5)]);
        let verdict = focused_change(&evidence, &thresholds());
        assert_eq!(verdict.status, Status::Verified);
        assert_eq!(verdict.evidence_refs.len(), 1);

        let evidence = EvidenceSet::from_records(vec![diff_shape(60)]);
        let verdict = focused_change(&evidence, &thresholds());
        assert_eq!(verdict.status, Status::Partial);

        let evidence = EvidenceSet::from_records(vec![diff_shape(100)]);
        let verdict = focused_change(&evidence, &thresholds());
        assert_eq!(verdict.status, Status::Contradicted);

        let verdict = focused_change(&EvidenceSet::default(), &thresholds());
        assert_eq!(verdict.status, Status::Unverified);
        assert!(verdict.evidence_refs.is_empty());
    }

    #[test]
    fn test_regression_added_cites_footprint_and_run() {
        let evidence = EvidenceSet::from_records(vec![footprint(2), run(10, 0)]);
        let verdict = regression_test_added(&evidence);
        assert_eq!(verdict.status, Status::Verified);
        assert_eq!(verdict.evidence_refs.len(), 2);

        let evidence = EvidenceSet::from_records(vec![footprint(2)]);
        let verdict = regression_test_added(&evidence);
        assert_eq!(verdict.status, Status::Unverified);

        let evidence = EvidenceSet::from_records(vec![run(10, 0)]);
        let verdict = regression_test_added(&evidence);
        assert_eq!(verdict.status, Status::Unverified);
    }

    #[test]
    fn test_test_touch_partial_without_run() {
        let evidence = EvidenceSet::from_records(vec![footprint(2)]);
        let verdict = test_touch(&evidence);
        assert_eq!(verdict.status, Status::Partial);
        assert_eq!(verdict.evidence_refs.len(), 1);

        let evidence = EvidenceSet::from_records(vec![footprint(2), run(10, 3)]);
        let verdict = test_touch(&evidence);
        assert_eq!(verdict.status, Status::Unverified);
    }

    #[test]
    fn test_suite_passes_distinguishes_green_red_empty() {
        let verdict = suite_passes(&EvidenceSet::from_records(vec![run(10, 0)]));
        assert_eq!(verdict.status, Status::Verified);

        let verdict = suite_passes(&EvidenceSet::from_records(vec![run(10, 2)]));
        assert_eq!(verdict.status, Status::Contradicted);
        assert!(verdict.reason.contains("2 of 10"));

        let verdict = suite_passes(&EvidenceSet::from_records(vec![run(0, 0)]));
        assert_eq!(verdict.status, Status::Unverified);
        assert_eq!(verdict.reason, "no tests executed");
        assert!(verdict.evidence_refs.is_empty());
    }

    #[test]
    fn test_suite_passes_flags_suspicious_counts() {
        let suspicious = run(10, 0).with_needs_verification();
        let verdict = suite_passes(&EvidenceSet::from_records(vec![suspicious]));
        assert_eq!(verdict.status, Status::Partial);
    }

    #[test]
    fn test_coverage_bar_thresholds() {
        let good = record(
            "art-cov",
            EvidenceCategory::TestCoverage,
            0.95,
            EvidencePayload::Coverage {
                line_pct: 84.0,
                branch_pct: None,
                delta_pct: Some(2.0),
            },
        );
        let verdict = coverage_bar(&EvidenceSet::from_records(vec![good]), &thresholds());
        assert_eq!(verdict.status, Status::Verified);

        let low = record(
            "art-cov",
            EvidenceCategory::TestCoverage,
            0.95,
            EvidencePayload::Coverage {
                line_pct: 55.0,
                branch_pct: None,
                delta_pct: None,
            },
        );
        let verdict = coverage_bar(&EvidenceSet::from_records(vec![low]), &thresholds());
        assert_eq!(verdict.status, Status::Contradicted);

        let regressed = record(
            "art-cov",
            EvidenceCategory::TestCoverage,
            0.95,
            EvidencePayload::Coverage {
                line_pct: 84.0,
                branch_pct: None,
                delta_pct: Some(-4.0),
            },
        );
        let verdict =
            coverage_bar(&EvidenceSet::from_records(vec![regressed]), &thresholds());
        assert_eq!(verdict.status, Status::Contradicted);
        assert!(verdict.reason.contains("versus baseline"));
    }

    #[test]
    fn test_timely_completion_window() {
        let quick = record(
            "art-diff",
            EvidenceCategory::Timing,
            0.9,
            EvidencePayload::Timing { span_hours: 30.0 },
        );
        let verdict =
            timely_completion(&EvidenceSet::from_records(vec![quick]), &thresholds());
        assert_eq!(verdict.status, Status::Verified);

        let slow = record(
            "art-diff",
            EvidenceCategory::Timing,
            0.9,
            EvidencePayload::Timing { span_hours: 72.0 },
        );
        let verdict =
            timely_completion(&EvidenceSet::from_records(vec![slow]), &thresholds());
        assert_eq!(verdict.status, Status::Contradicted);
    }

    #[test]
    fn test_writeup_covers_full_status_range() {
        let complete = record(
            "art-w",
            EvidenceCategory::DocumentationQuality,
            0.9,
            EvidencePayload::WriteupShape {
                word_count: 400,
                sections_present: vec!["approach".into(), "testing".into(), "tradeoffs".into()],
                sections_missing: Vec::new(),
            },
        );
        let verdict =
            writeup_covers(&EvidenceSet::from_records(vec![complete]), &thresholds());
        assert_eq!(verdict.status, Status::Verified);

        let thin = record(
            "art-w",
            EvidenceCategory::DocumentationQuality,
            0.9,
            EvidencePayload::WriteupShape {
                word_count: 80,
                sections_present: vec!["approach".into(), "testing".into(), "tradeoffs".into()],
                sections_missing: Vec::new(),
            },
        );
        let verdict = writeup_covers(&EvidenceSet::from_records(vec![thin]), &thresholds());
        assert_eq!(verdict.status, Status::Partial);

        let partial = record(
            "art-w",
            EvidenceCategory::DocumentationQuality,
            0.9,
            EvidencePayload::WriteupShape {
                word_count: 400,
                sections_present: vec!["approach".into()],
                sections_missing: vec!["testing".into(), "tradeoffs".into()],
            },
        );
        let verdict =
            writeup_covers(&EvidenceSet::from_records(vec![partial]), &thresholds());
        assert_eq!(verdict.status, Status::Partial);
        assert!(verdict.reason.contains("testing"));

        let none = record(
            "art-w",
            EvidenceCategory::DocumentationQuality,
            0.9,
            EvidencePayload::WriteupShape {
                word_count: 400,
                sections_present: Vec::new(),
                sections_missing: vec!["approach".into()],
            },
        );
        let verdict = writeup_covers(&EvidenceSet::from_records(vec![none]), &thresholds());
        assert_eq!(verdict.status, Status::Contradicted);
    }

    #[test]
    fn test_disputed_records_are_invisible() {
        let mut shape = diff_shape(5);
        shape.contradiction_detected = true;
        let verdict =
            focused_change(&EvidenceSet::from_records(vec![shape]), &thresholds());
        assert_eq!(verdict.status, Status::Unverified);
        assert!(verdict.reason.contains("disputed"));
    }
}
