//! Coverage-report extractor: line/branch percentages and baseline delta.

use std::sync::OnceLock;

use regex::Regex;

use super::{ExtractError, META_BASELINE_LINE_PCT};
use crate::artifact::Artifact;
use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};

// Each matcher takes the first percent-terminated number after its
// keyword, so `lines......: 84.2% (421 of 500)` reads 84.2, not 421.

fn line_pct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[^\n%]*\blines?\b.*?(\d+(?:\.\d+)?)\s*%")
            .expect("literal regex compiles")
    })
}

fn branch_pct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[^\n%]*\bbranch(?:es)?\b.*?(\d+(?:\.\d+)?)\s*%")
            .expect("literal regex compiles")
    })
}

fn total_pct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[^\n%]*\btotal\b.*?(\d+(?:\.\d+)?)\s*%")
            .expect("literal regex compiles")
    })
}

fn capture_pct(regex: &Regex, text: &str) -> Option<f64> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts a single coverage evidence record.
///
/// Line coverage comes from a `lines ... NN%` row, falling back to a
/// `TOTAL ... NN%` row. When the producer stamped a baseline percent into
/// the artifact metadata, the delta against it is computed here so rules
/// can gate on "coverage did not regress" without re-reading metadata.
pub(crate) fn extract_coverage(
    artifact: &Artifact,
    text: &str,
    extracted_at_ms: u64,
) -> Result<Vec<Evidence>, ExtractError> {
    let from_lines_row = capture_pct(line_pct_re(), text);
    let line_pct = from_lines_row.or_else(|| capture_pct(total_pct_re(), text));
    let Some(line_pct) = line_pct else {
        return Err(ExtractError::Unparseable {
            artifact_id: artifact.id.clone(),
            kind: artifact.kind,
            detail: "no coverage percentages recognized".to_string(),
        });
    };

    // A percent above 100 is a malformed report, not a better one.
    let out_of_range = line_pct > 100.0;
    let line_pct = line_pct.min(100.0);
    // A TOTAL row alone could be any metric's total; keep it but ask for
    // a second look.
    let indirect = from_lines_row.is_none();

    let branch_pct = capture_pct(branch_pct_re(), text).map(|pct| pct.min(100.0));

    let delta_pct = artifact
        .metadata
        .get(META_BASELINE_LINE_PCT)
        .and_then(|raw| raw.parse::<f64>().ok())
        .map(|baseline| line_pct - baseline);

    let fact = match delta_pct {
        Some(delta) => format!("line coverage {line_pct:.1}% ({delta:+.1} vs baseline)"),
        None => format!("line coverage {line_pct:.1}%"),
    };

    let suspicious = out_of_range || indirect;
    let confidence = if suspicious {
        Confidence::new(0.6)
    } else {
        Confidence::DIRECT_MEASUREMENT
    };

    let mut evidence = Evidence::new(
        &artifact.subject_id,
        &artifact.id,
        EvidenceCategory::TestCoverage,
        fact,
        confidence,
        EvidencePayload::Coverage {
            line_pct,
            branch_pct,
            delta_pct,
        },
        extracted_at_ms,
    );
    if suspicious {
        evidence = evidence.with_needs_verification();
    }

    Ok(vec![evidence])
}
