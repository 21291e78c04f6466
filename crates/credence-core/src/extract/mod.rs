//! Evidence extractors: pure functions from artifact bytes to evidence.
//!
//! One extractor exists per artifact kind (code samples are stored for
//! human review only). Extraction is deterministic: the same bytes always
//! yield the same evidence records, which is what makes whole-run
//! reproducibility possible.
//!
//! # Failure policy
//!
//! Extractors never fail the pipeline:
//!
//! - Malformed-but-parseable content yields evidence with reduced
//!   confidence and `needs_verification = true`.
//! - Genuinely unparseable content yields an empty list and a logged
//!   error. Absence of evidence is meaningful downstream input: affected
//!   claims stay unverified with an explicit reason rather than crashing
//!   the run.

mod coverage;
mod diff;
mod test_log;
mod writeup;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactKind};
use crate::evidence::Evidence;

/// Metadata key carrying the work-sample start time (ms since epoch).
pub const META_STARTED_AT_MS: &str = "started_at_ms";

/// Metadata key carrying the work-sample submission time (ms since epoch).
pub const META_SUBMITTED_AT_MS: &str = "submitted_at_ms";

/// Metadata key carrying the baseline line-coverage percent.
pub const META_BASELINE_LINE_PCT: &str = "baseline_line_pct";

/// Default path patterns that mark a changed file as a test file.
pub const DEFAULT_TEST_PATH_PATTERNS: &[&str] = &[
    r"(^|/)tests?/",
    r"(^|/)test_[^/]*$",
    r"_test\.[A-Za-z0-9]+$",
    r"\.test\.[A-Za-z0-9]+$",
    r"(^|/)spec/",
];

/// Default topic sections a writeup is expected to cover.
pub const DEFAULT_REQUIRED_SECTIONS: &[&str] = &["approach", "tradeoffs", "testing"];

/// Extraction configuration, deserialized from the engine config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractSettings {
    /// Regex patterns identifying test files in diff paths.
    pub test_path_patterns: Vec<String>,
    /// Topic sections the writeup extractor looks for.
    pub required_sections: Vec<String>,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            test_path_patterns: DEFAULT_TEST_PATH_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            required_sections: DEFAULT_REQUIRED_SECTIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl ExtractSettings {
    /// Compiles the configured patterns once, up front.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidPattern`] if any configured pattern
    /// fails to compile, so a bad config is rejected at startup rather
    /// than at extraction time.
    pub fn compile(&self) -> Result<CompiledExtract, SettingsError> {
        let mut test_paths = Vec::with_capacity(self.test_path_patterns.len());
        for pattern in &self.test_path_patterns {
            let regex = Regex::new(pattern).map_err(|source| SettingsError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            test_paths.push(regex);
        }

        let mut sections = Vec::with_capacity(self.required_sections.len());
        for section in &self.required_sections {
            let canonical = section.trim().to_ascii_lowercase();
            if canonical.is_empty() {
                continue;
            }
            let escaped = regex::escape(&canonical);
            // Matches the topic as a heading (optionally behind markdown
            // `#` marks or list numbering) or as an inline "topic:" label.
            let pattern = format!(
                r"(?im)^(?:#{{1,6}}[ \t]*|[ \t]*[0-9]+[.)][ \t]*)?{escaped}s?\b|\b{escaped}s?[ \t]*:"
            );
            let regex = Regex::new(&pattern).map_err(|source| SettingsError::InvalidPattern {
                pattern,
                source,
            })?;
            sections.push((canonical, regex));
        }

        Ok(CompiledExtract {
            test_paths,
            sections,
        })
    }
}

/// Errors raised while compiling extraction settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// A configured pattern is not a valid regex.
    #[error("invalid extraction pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },
}

/// Compiled extraction settings, built once per pipeline.
#[derive(Debug, Clone)]
pub struct CompiledExtract {
    test_paths: Vec<Regex>,
    sections: Vec<(String, Regex)>,
}

impl CompiledExtract {
    /// Whether a changed path looks like a test file.
    #[must_use]
    pub fn is_test_path(&self, path: &str) -> bool {
        self.test_paths.iter().any(|re| re.is_match(path))
    }

    /// The required writeup sections with their matchers.
    #[must_use]
    pub(crate) fn sections(&self) -> &[(String, Regex)] {
        &self.sections
    }
}

impl Default for CompiledExtract {
    /// Compiles the default settings.
    ///
    /// # Panics
    ///
    /// Panics if the built-in default patterns fail to compile, which
    /// would be a defect in this crate's own literals.
    fn default() -> Self {
        ExtractSettings::default()
            .compile()
            .expect("default extraction patterns compile")
    }
}

/// Errors raised during extraction of a single artifact.
///
/// These are logged and swallowed by [`extract`]; they never propagate
/// out of the extraction stage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The artifact bytes are not valid UTF-8 text.
    #[error("artifact {artifact_id} is not valid UTF-8 text")]
    NotText {
        /// The offending artifact.
        artifact_id: String,
    },

    /// The content had no recognizable structure for its declared kind.
    #[error("artifact {artifact_id} unparseable as {kind}: {detail}")]
    Unparseable {
        /// The offending artifact.
        artifact_id: String,
        /// The declared artifact kind.
        kind: ArtifactKind,
        /// What was missing.
        detail: String,
    },
}

/// Runs the extractor for the artifact's kind.
///
/// Returns the extracted evidence, or an empty list when the artifact is
/// unparseable (the error is logged, never raised). Code samples always
/// yield an empty list.
#[must_use]
pub fn extract(
    artifact: &Artifact,
    content: &[u8],
    settings: &CompiledExtract,
    extracted_at_ms: u64,
) -> Vec<Evidence> {
    match try_extract(artifact, content, settings, extracted_at_ms) {
        Ok(evidence) => {
            debug!(
                artifact_id = %artifact.id,
                kind = %artifact.kind,
                records = evidence.len(),
                "extraction complete"
            );
            evidence
        },
        Err(error) => {
            warn!(
                artifact_id = %artifact.id,
                kind = %artifact.kind,
                %error,
                "extraction failed, artifact contributes no evidence"
            );
            Vec::new()
        },
    }
}

fn try_extract(
    artifact: &Artifact,
    content: &[u8],
    settings: &CompiledExtract,
    extracted_at_ms: u64,
) -> Result<Vec<Evidence>, ExtractError> {
    if !artifact.kind.is_extractable() {
        return Ok(Vec::new());
    }

    let text = std::str::from_utf8(content).map_err(|_| ExtractError::NotText {
        artifact_id: artifact.id.clone(),
    })?;

    match artifact.kind {
        ArtifactKind::Diff => diff::extract_diff(artifact, text, settings, extracted_at_ms),
        ArtifactKind::TestLog => test_log::extract_test_log(artifact, text, extracted_at_ms),
        ArtifactKind::Coverage => coverage::extract_coverage(artifact, text, extracted_at_ms),
        ArtifactKind::Writeup => writeup::extract_writeup(artifact, text, settings, extracted_at_ms),
        ArtifactKind::CodeSample => Ok(Vec::new()),
    }
}
