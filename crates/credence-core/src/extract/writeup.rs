//! Writeup extractor: word count and required topic sections.
//!
//! This extractor measures the writeup's structure only. The document
//! is self-authored, so the structural record carries self-reported
//! confidence; it clears the verification bar only when a second,
//! independently submitted writeup corroborates it. Anything the text
//! asserts about the subject's skills or history enters the system
//! separately, through the narrative-assistant boundary, under the
//! same cap.

use super::{CompiledExtract, ExtractError};
use crate::artifact::Artifact;
use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};

/// Extracts a single writeup-structure evidence record.
pub(crate) fn extract_writeup(
    artifact: &Artifact,
    text: &str,
    settings: &CompiledExtract,
    extracted_at_ms: u64,
) -> Result<Vec<Evidence>, ExtractError> {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return Err(ExtractError::Unparseable {
            artifact_id: artifact.id.clone(),
            kind: artifact.kind,
            detail: "writeup contains no words".to_string(),
        });
    }

    let mut sections_present = Vec::new();
    let mut sections_missing = Vec::new();
    for (section, matcher) in settings.sections() {
        if matcher.is_match(text) {
            sections_present.push(section.clone());
        } else {
            sections_missing.push(section.clone());
        }
    }
    sections_present.sort_unstable();
    sections_missing.sort_unstable();

    let fact = if sections_missing.is_empty() {
        format!(
            "writeup: {word_count} words, covers all {} required topics",
            sections_present.len()
        )
    } else {
        format!(
            "writeup: {word_count} words, missing topics: {}",
            sections_missing.join(", ")
        )
    };

    Ok(vec![Evidence::new(
        &artifact.subject_id,
        &artifact.id,
        EvidenceCategory::DocumentationQuality,
        fact,
        Confidence::SELF_REPORTED_CAP,
        EvidencePayload::WriteupShape {
            word_count,
            sections_present,
            sections_missing,
        },
        extracted_at_ms,
    )])
}
