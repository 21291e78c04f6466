//! Evidence aggregation: dedup, corroboration, contradiction detection.
//!
//! The aggregator merges newly extracted evidence with everything already
//! known for a subject. Records are grouped by (category, fact key);
//! within a group:
//!
//! - one source passes through unchanged;
//! - multiple agreeing sources produce one merged record with boosted
//!   confidence (`1 - Π(1 - c_i)`, capped), superseding the originals;
//! - materially disagreeing sources are all flagged
//!   `contradiction_detected` and left unmerged for human review.
//!
//! Originals are never deleted: a superseded record carries a pointer to
//! the merged record that replaced it, and the merged record lists every
//! contributing artifact.
//!
//! # Determinism
//!
//! Given the same unordered input set, output is byte-identical: records
//! are sorted by (category, source artifact, identifier) before grouping,
//! merged identifiers are derived from sorted contributor identifiers,
//! and aggregation is a pure function, so re-running it over its own
//! output changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::evidence::{
    derive_merged_evidence_id, Confidence, Evidence, EvidenceCategory,
};

/// Merges new evidence into the subject's known set.
///
/// `existing` is the previously published set for this subject (possibly
/// containing earlier merge results); `new_evidence` is freshly extracted.
/// Returns the full replacement set: base records, supersession markers,
/// and freshly derived merged records, in canonical order.
#[must_use]
pub fn aggregate(
    subject_id: &str,
    new_evidence: Vec<Evidence>,
    existing: &[Evidence],
) -> Vec<Evidence> {
    // Normalize to base (unmerged) records. Earlier merge results are
    // discarded and re-derived so aggregation is idempotent.
    let mut base: Vec<Evidence> = existing
        .iter()
        .filter(|record| record.corroborated_by.is_empty())
        .cloned()
        .chain(
            new_evidence
                .into_iter()
                .filter(|record| record.corroborated_by.is_empty()),
        )
        .filter(|record| {
            if record.subject_id == subject_id {
                return true;
            }
            warn!(
                expected = subject_id,
                found = %record.subject_id,
                evidence_id = %record.id,
                "dropping evidence for foreign subject"
            );
            false
        })
        .collect();
    for record in &mut base {
        record.superseded_by = None;
        record.contradiction_detected = false;
    }

    // Canonical order before grouping; identical identifiers are then
    // adjacent (identifier is derived from the same key as the sort).
    base.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    base.dedup_by(|a, b| a.id == b.id);

    let mut groups: BTreeMap<(EvidenceCategory, String), Vec<Evidence>> = BTreeMap::new();
    for record in base {
        groups
            .entry((record.category, record.payload.fact_key()))
            .or_default()
            .push(record);
    }

    let mut output = Vec::new();
    let mut merged_count = 0usize;
    let mut contradicted_groups = 0usize;

    for ((category, fact_key), mut group) in groups {
        if group.len() == 1 {
            output.append(&mut group);
            continue;
        }

        let mut any_disagree = false;
        let mut all_agree = true;
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                match group[i].payload.agrees_with(&group[j].payload) {
                    Some(true) => {},
                    Some(false) => {
                        any_disagree = true;
                        all_agree = false;
                    },
                    None => all_agree = false,
                }
            }
        }

        if any_disagree {
            contradicted_groups += 1;
            for record in &mut group {
                record.contradiction_detected = true;
            }
            output.append(&mut group);
            continue;
        }

        if !all_agree {
            // Same fact key but incomparable payload shapes; nothing to
            // merge, nothing to dispute.
            output.append(&mut group);
            continue;
        }

        merged_count += 1;
        let merged = merge_group(category, &fact_key, &group);
        for record in &mut group {
            record.superseded_by = Some(merged.id.clone());
        }
        output.append(&mut group);
        output.push(merged);
    }

    output.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    debug!(
        subject_id,
        records = output.len(),
        merged = merged_count,
        contradicted_groups,
        "aggregation complete"
    );
    output
}

fn sort_key(record: &Evidence) -> (EvidenceCategory, &str, &str) {
    (record.category, record.artifact_id.as_str(), record.id.as_str())
}

/// Builds the merged record for a fully agreeing group.
///
/// The group is in canonical order; the representative fact and payload
/// come from its first record and the boosted confidence from all of
/// them.
fn merge_group(category: EvidenceCategory, fact_key: &str, group: &[Evidence]) -> Evidence {
    let mut contributor_ids: Vec<String> =
        group.iter().map(|record| record.id.clone()).collect();
    contributor_ids.sort_unstable();

    let mut corroborated_by: Vec<String> = group
        .iter()
        .map(|record| record.artifact_id.clone())
        .collect();
    corroborated_by.sort_unstable();
    corroborated_by.dedup();

    let confidences: Vec<Confidence> =
        group.iter().map(|record| record.confidence).collect();

    let representative = &group[0];
    Evidence {
        id: derive_merged_evidence_id(category, fact_key, &contributor_ids),
        subject_id: representative.subject_id.clone(),
        artifact_id: representative.artifact_id.clone(),
        category,
        fact: format!(
            "{} (corroborated by {} sources)",
            representative.fact,
            corroborated_by.len()
        ),
        confidence: Confidence::corroborate(&confidences),
        payload: representative.payload.clone(),
        extracted_at_ms: group
            .iter()
            .map(|record| record.extracted_at_ms)
            .max()
            .unwrap_or(representative.extracted_at_ms),
        // Independent agreement is the verification the flag asked for.
        needs_verification: false,
        contradiction_detected: false,
        corroborated_by,
        superseded_by: None,
    }
}

/// The aggregated, published evidence view for one subject.
///
/// Built once per aggregation pass and swapped in atomically; downstream
/// consumers (rules, report assembly) never observe a half-aggregated
/// set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSet {
    records: Vec<Evidence>,
}

impl EvidenceSet {
    /// Wraps aggregated records, enforcing canonical order.
    #[must_use]
    pub fn from_records(mut records: Vec<Evidence>) -> Self {
        records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self { records }
    }

    /// All records, including superseded originals.
    #[must_use]
    pub fn all(&self) -> &[Evidence] {
        &self.records
    }

    /// Records that have not been superseded by a merge.
    pub fn active(&self) -> impl Iterator<Item = &Evidence> {
        self.records.iter().filter(|record| !record.is_superseded())
    }

    /// Active records in one category.
    pub fn active_in(&self, category: EvidenceCategory) -> impl Iterator<Item = &Evidence> {
        self.active().filter(move |record| record.category == category)
    }

    /// Looks up any record (active or superseded) by identifier.
    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&Evidence> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Whether `id` names an active (non-superseded) record.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.by_id(id).is_some_and(|record| !record.is_superseded())
    }

    /// Contradicted fact groups: (category, fact key) to the sorted
    /// artifact identifiers that disagree.
    #[must_use]
    pub fn contradiction_clusters(
        &self,
    ) -> BTreeMap<(EvidenceCategory, String), Vec<String>> {
        let mut clusters: BTreeMap<(EvidenceCategory, String), Vec<String>> = BTreeMap::new();
        for record in self.active().filter(|record| record.contradiction_detected) {
            clusters
                .entry((record.category, record.payload.fact_key()))
                .or_default()
                .push(record.artifact_id.clone());
        }
        for artifact_ids in clusters.values_mut() {
            artifact_ids.sort_unstable();
            artifact_ids.dedup();
        }
        clusters
    }

    /// Number of records, including superseded originals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
