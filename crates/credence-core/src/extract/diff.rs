//! Diff extractor: change shape, test footprint, and completion timing.

use std::collections::BTreeSet;

use tracing::warn;

use super::{CompiledExtract, ExtractError, META_STARTED_AT_MS, META_SUBMITTED_AT_MS};
use crate::artifact::Artifact;
use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Extracts evidence from a unified diff.
///
/// Emits one record per distinguishing fact:
/// - change shape (files changed, lines added/removed)
/// - test footprint (changed paths matching the test-path heuristic),
///   only when at least one test path was touched
/// - completion timing, when the producer stamped start and submission
///   times into the artifact metadata
pub(crate) fn extract_diff(
    artifact: &Artifact,
    text: &str,
    settings: &CompiledExtract,
    extracted_at_ms: u64,
) -> Result<Vec<Evidence>, ExtractError> {
    let parsed = parse_unified_diff(text);
    if parsed.paths.is_empty() {
        return Err(ExtractError::Unparseable {
            artifact_id: artifact.id.clone(),
            kind: artifact.kind,
            detail: "no file headers found".to_string(),
        });
    }

    // Headers without any hunk content parse, but only barely; keep the
    // shape fact at reduced confidence for a human to double-check.
    let degenerate = parsed.lines_added == 0 && parsed.lines_removed == 0;
    let confidence = if degenerate {
        Confidence::new(0.6)
    } else {
        Confidence::DIRECT_MEASUREMENT
    };

    let files_changed = parsed.paths.len();
    let shape_fact = if degenerate {
        format!("{files_changed} files changed (no hunk content)")
    } else {
        format!(
            "{files_changed} files changed (+{}/-{} lines)",
            parsed.lines_added, parsed.lines_removed
        )
    };
    let mut shape = Evidence::new(
        &artifact.subject_id,
        &artifact.id,
        EvidenceCategory::CommitPattern,
        shape_fact,
        confidence,
        EvidencePayload::DiffShape {
            files_changed,
            lines_added: parsed.lines_added,
            lines_removed: parsed.lines_removed,
        },
        extracted_at_ms,
    );
    if degenerate {
        shape = shape.with_needs_verification();
    }

    let mut evidence = vec![shape];

    let test_paths: Vec<String> = parsed
        .paths
        .iter()
        .filter(|path| settings.is_test_path(path))
        .cloned()
        .collect();
    if !test_paths.is_empty() {
        let count = test_paths.len();
        let fact = if count == 1 {
            "1 test file touched".to_string()
        } else {
            format!("{count} test files touched")
        };
        evidence.push(Evidence::new(
            &artifact.subject_id,
            &artifact.id,
            EvidenceCategory::CommitPattern,
            fact,
            Confidence::DIRECT_MEASUREMENT,
            EvidencePayload::TestFootprint {
                test_files: count,
                paths: test_paths,
            },
            extracted_at_ms,
        ));
    }

    if let Some(timing) = timing_evidence(artifact, extracted_at_ms) {
        evidence.push(timing);
    }

    Ok(evidence)
}

struct ParsedDiff {
    paths: BTreeSet<String>,
    lines_added: usize,
    lines_removed: usize,
}

/// Walks a unified diff line by line.
///
/// File paths come from `diff --git` and `+++ b/` headers; hunk churn
/// from leading `+`/`-` lines that are not headers.
fn parse_unified_diff(text: &str) -> ParsedDiff {
    let mut paths = BTreeSet::new();
    let mut lines_added = 0usize;
    let mut lines_removed = 0usize;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            if let Some((_, new_path)) = rest.split_once(" b/") {
                paths.insert(new_path.trim().to_string());
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            let path = rest.trim();
            if path != "/dev/null" {
                paths.insert(path.strip_prefix("b/").unwrap_or(path).to_string());
            }
            continue;
        }
        if line.starts_with("--- ") {
            continue;
        }
        if line.starts_with('+') {
            lines_added += 1;
        } else if line.starts_with('-') {
            lines_removed += 1;
        }
    }

    ParsedDiff {
        paths,
        lines_added,
        lines_removed,
    }
}

/// Builds timing evidence from producer-stamped start/submission metadata.
fn timing_evidence(artifact: &Artifact, extracted_at_ms: u64) -> Option<Evidence> {
    let started: u64 = artifact.metadata.get(META_STARTED_AT_MS)?.parse().ok()?;
    let submitted: u64 = artifact.metadata.get(META_SUBMITTED_AT_MS)?.parse().ok()?;
    if submitted < started {
        warn!(
            artifact_id = %artifact.id,
            started, submitted,
            "submission timestamp precedes start, skipping timing evidence"
        );
        return None;
    }

    let span_hours = (submitted - started) as f64 / MS_PER_HOUR;
    Some(Evidence::new(
        &artifact.subject_id,
        &artifact.id,
        EvidenceCategory::Timing,
        format!("completed in {span_hours:.1} hours"),
        Confidence::REPORTED_MEASUREMENT,
        EvidencePayload::Timing { span_hours },
        extracted_at_ms,
    ))
}
