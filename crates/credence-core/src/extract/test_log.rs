//! Test-log extractor: pass/fail counts and duration.
//!
//! The parser recognizes the count formats common across test runners
//! (`10 passed; 0 failed`, `running 10 tests`, `total: 10`) rather than
//! any single runner's exact output. Missing counts are derived where the
//! arithmetic allows; logs where the counts cannot be reconciled are
//! flagged `needs_verification` instead of being guessed at.

use std::sync::OnceLock;

use regex::Regex;

use super::ExtractError;
use crate::artifact::Artifact;
use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};

fn passed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d+)\s+passed\b").expect("literal regex compiles"))
}

fn failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d+)\s+failed\b").expect("literal regex compiles"))
}

fn total_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:running\s+(\d+)\s+tests?|total(?:\s+tests)?\s*[:=]?\s+(\d+))\b")
            .expect("literal regex compiles")
    })
}

fn duration_secs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bfinished\s+in\s+(\d+(?:\.\d+)?)\s*s\b").expect("literal regex compiles")
    })
}

fn duration_ms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bduration\s*[:=]?\s*(\d+)\s*ms\b").expect("literal regex compiles")
    })
}

fn capture_u64(regex: &Regex, text: &str) -> Option<u64> {
    regex.captures(text).and_then(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Extracts a single test-run evidence record from a runner log.
///
/// A log with `total = 0` still yields evidence: "no tests executed" is a
/// fact the proof rules need to see, not an extraction failure.
pub(crate) fn extract_test_log(
    artifact: &Artifact,
    text: &str,
    extracted_at_ms: u64,
) -> Result<Vec<Evidence>, ExtractError> {
    let passed = capture_u64(passed_re(), text);
    let failed = capture_u64(failed_re(), text);
    let total = capture_u64(total_re(), text);

    // Reconcile whichever counts the log actually carried. `suspicious`
    // marks logs whose arithmetic does not close.
    let (total, passed, failed, suspicious) = match (total, passed, failed) {
        (Some(t), Some(p), Some(f)) => (t, p, f, p.saturating_add(f) != t),
        (Some(t), Some(p), None) => (t, p, t.saturating_sub(p), p > t),
        (Some(t), None, Some(f)) => (t, t.saturating_sub(f), f, f > t),
        (Some(t), None, None) => (t, 0, 0, t > 0),
        (None, Some(p), Some(f)) => (p.saturating_add(f), p, f, false),
        (None, Some(p), None) => (p, p, 0, true),
        (None, None, Some(f)) => (f, 0, f, true),
        (None, None, None) => {
            return Err(ExtractError::Unparseable {
                artifact_id: artifact.id.clone(),
                kind: artifact.kind,
                detail: "no test counts recognized".to_string(),
            });
        },
    };

    let duration_ms = capture_u64(duration_ms_re(), text).or_else(|| {
        duration_secs_re()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|secs| (secs * 1000.0) as u64)
    });

    let fact = if total == 0 {
        "no tests executed".to_string()
    } else if failed == 0 {
        format!("{passed}/{total} tests passed")
    } else {
        format!("{failed} of {total} tests failed")
    };

    let confidence = if suspicious {
        Confidence::new(0.6)
    } else {
        Confidence::DIRECT_MEASUREMENT
    };

    let mut evidence = Evidence::new(
        &artifact.subject_id,
        &artifact.id,
        EvidenceCategory::TestExecution,
        fact,
        confidence,
        EvidencePayload::TestRun {
            total,
            passed,
            failed,
            duration_ms,
        },
        extracted_at_ms,
    );
    if suspicious {
        evidence = evidence.with_needs_verification();
    }

    Ok(vec![evidence])
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::extract::unit_tests::test_artifact;

    fn run(text: &str) -> Result<Vec<Evidence>, ExtractError> {
        let artifact = test_artifact(ArtifactKind::TestLog, text.as_bytes());
        extract_test_log(&artifact, text, 3)
    }

    #[test]
    fn test_cargo_style_log() {
        let text = "running 10 tests\n..........\ntest result: ok. 10 passed; 0 failed; \
                    0 ignored; finished in 0.45s\n";
        let evidence = run(text).unwrap();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].fact, "10/10 tests passed");
        assert!(!evidence[0].needs_verification);
        assert_eq!(
            evidence[0].payload,
            EvidencePayload::TestRun {
                total: 10,
                passed: 10,
                failed: 0,
                duration_ms: Some(450),
            }
        );
    }

    #[test]
    fn test_failures_reported() {
        let evidence = run("12 passed, 3 failed").unwrap();
        assert_eq!(evidence[0].fact, "3 of 15 tests failed");
        assert_eq!(
            evidence[0].payload,
            EvidencePayload::TestRun {
                total: 15,
                passed: 12,
                failed: 3,
                duration_ms: None,
            }
        );
    }

    #[test]
    fn test_zero_tests_is_evidence_not_error() {
        let evidence = run("running 0 tests\n\ntest result: ok. 0 passed; 0 failed\n").unwrap();
        assert_eq!(evidence[0].fact, "no tests executed");
        assert!(matches!(
            evidence[0].payload,
            EvidencePayload::TestRun { total: 0, .. }
        ));
    }

    #[test]
    fn test_keyword_total_format() {
        let evidence = run("total: 8\n8 passed\n").unwrap();
        assert!(matches!(
            evidence[0].payload,
            EvidencePayload::TestRun { total: 8, passed: 8, failed: 0, .. }
        ));
        assert!(!evidence[0].needs_verification);
    }

    #[test]
    fn test_failed_count_derived_from_total() {
        let evidence = run("running 10 tests\n7 passed").unwrap();
        assert_eq!(evidence[0].fact, "3 of 10 tests failed");
        assert!(!evidence[0].needs_verification);
    }

    #[test]
    fn test_inconsistent_counts_flagged() {
        let evidence = run("running 10 tests\n5 passed; 2 failed").unwrap();
        assert!(evidence[0].needs_verification);
        assert!(evidence[0].confidence.value() < 0.9);
    }

    #[test]
    fn test_passed_only_log_flagged() {
        let evidence = run("10 passed").unwrap();
        assert!(evidence[0].needs_verification);
        assert!(matches!(
            evidence[0].payload,
            EvidencePayload::TestRun { total: 10, passed: 10, failed: 0, .. }
        ));
    }

    #[test]
    fn test_duration_in_milliseconds() {
        let evidence = run("5 passed; 0 failed; duration: 1200ms").unwrap();
        assert!(matches!(
            evidence[0].payload,
            EvidencePayload::TestRun { duration_ms: Some(1200), .. }
        ));
    }

    #[test]
    fn test_unrecognizable_log_is_unparseable() {
        let result = run("compilation succeeded, nothing else to say");
        assert!(matches!(result, Err(ExtractError::Unparseable { .. })));
    }
}
