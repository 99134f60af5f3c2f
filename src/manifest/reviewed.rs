//! Completed human review outputs.

use std::path::Path;

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::ManifestError;

/// Suffix identifying review output files under the review output prefix.
pub const REVIEW_OUTPUT_SUFFIX: &str = "output.json";

/// One completed review, as written by the review service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedOutput {
    pub input_content: ReviewedInput,
    pub human_answers: Vec<HumanAnswer>,
}

/// Input content echoed back by the review service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedInput {
    pub text: String,
    #[serde(default)]
    pub initial_value: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanAnswer {
    pub answer_content: AnswerContent,
}

#[derive(Debug, Deserialize)]
pub struct AnswerContent {
    #[serde(rename = "crowd-entity-annotation")]
    pub entity_annotation: EntityAnnotation,
}

#[derive(Debug, Deserialize)]
pub struct EntityAnnotation {
    pub entities: Box<RawValue>,
}

impl ReviewedOutput {
    /// Parses a review output document.
    pub fn parse(content: &str, origin: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|source| ManifestError::MalformedReview {
            path: origin.to_string(),
            source,
        })
    }

    /// Reads and parses a review output file.
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Entities to keep for this record.
    ///
    /// The first human answer is authoritative. Without one, the reviewer
    /// made no change (or never saw the record) and the initial value stands.
    pub fn effective_entities(&self) -> Option<&RawValue> {
        match self.human_answers.first() {
            Some(answer) => Some(&answer.answer_content.entity_annotation.entities),
            None => self.input_content.initial_value.as_deref(),
        }
    }

    /// Source text for the merged record.
    pub fn source_text(&self) -> &str {
        self.input_content.text.trim()
    }
}
