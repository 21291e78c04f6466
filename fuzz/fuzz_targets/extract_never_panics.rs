//! Fuzz harness for the evidence extractors and config parser.
//!
//! Extraction sits directly on candidate-supplied bytes, so the parsers
//! must never panic: every input is either evidence or a logged
//! extraction failure. The harness drives each extractable artifact kind
//! with arbitrary content, with and without producer metadata, feeds the
//! extracted records through aggregation, and parses the same bytes as a
//! configuration document.

#![no_main]

use std::collections::BTreeMap;

use credence_core::aggregate::{aggregate, EvidenceSet};
use credence_core::artifact::{derive_artifact_id, Artifact, ArtifactKind};
use credence_core::config::EngineConfig;
use credence_core::extract::{
    extract, CompiledExtract, META_BASELINE_LINE_PCT, META_STARTED_AT_MS, META_SUBMITTED_AT_MS,
};
use libfuzzer_sys::fuzz_target;

const SUBJECT: &str = "fuzz-subject";

const KINDS: [ArtifactKind; 4] = [
    ArtifactKind::Diff,
    ArtifactKind::TestLog,
    ArtifactKind::Coverage,
    ArtifactKind::Writeup,
];

fn artifact_for(
    kind: ArtifactKind,
    content: &[u8],
    metadata: BTreeMap<String, String>,
) -> Artifact {
    Artifact {
        id: derive_artifact_id(SUBJECT, kind, content),
        subject_id: SUBJECT.to_string(),
        kind,
        // Extraction never reads the admission digest.
        content_hash: String::new(),
        size: content.len(),
        collected_at_ms: 0,
        metadata,
    }
}

fuzz_target!(|data: &[u8]| {
    let settings = CompiledExtract::default();

    // Metadata values derived from the input exercise the timing and
    // baseline paths, including submitted-before-started.
    let lead = u64::from(data.first().copied().unwrap_or(0));
    let mut stamped = BTreeMap::new();
    stamped.insert(META_STARTED_AT_MS.to_string(), lead.to_string());
    stamped.insert(
        META_SUBMITTED_AT_MS.to_string(),
        lead.wrapping_mul(7).to_string(),
    );
    stamped.insert(META_BASELINE_LINE_PCT.to_string(), format!("{lead}.5"));

    let mut records = Vec::new();
    for kind in KINDS {
        let plain = artifact_for(kind, data, BTreeMap::new());
        records.extend(extract(&plain, data, &settings, 0));

        let with_metadata = artifact_for(kind, data, stamped.clone());
        records.extend(extract(&with_metadata, data, &settings, 0));
    }

    // Whatever came out of extraction must aggregate cleanly too.
    let merged = aggregate(SUBJECT, records, &[]);
    let _ = EvidenceSet::from_records(merged);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = EngineConfig::from_toml(text);
    }
});
