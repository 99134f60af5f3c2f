//! Input manifest records and the label configuration shared across them.
//!
//! A manifest is newline-delimited JSON. Each line carries a free-form
//! `source`, a `<label>-metadata` block and a `<label>` attribute holding
//! `annotations.labels` and `annotations.entities`. Everything except the
//! top-level keys is kept as raw JSON text so it can be re-emitted verbatim.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::ManifestError;

/// The `annotations` block nested under the label attribute.
#[derive(Debug, Deserialize)]
pub struct Annotations {
    pub labels: Box<RawValue>,
    pub entities: Box<RawValue>,
}

#[derive(Debug, Deserialize)]
struct LabelAttribute {
    annotations: Annotations,
}

/// One parsed line of an input manifest.
#[derive(Debug)]
pub struct ManifestRecord {
    /// 1-based position among the records of the manifest.
    pub index: usize,
    pub source: Box<RawValue>,
    pub metadata: Option<Box<RawValue>>,
    pub annotations: Annotations,
}

impl ManifestRecord {
    /// Parses a single manifest line for the given label attribute.
    pub fn parse(line: &str, index: usize, label_attribute: &str) -> Result<Self, ManifestError> {
        let mut fields: HashMap<String, Box<RawValue>> = serde_json::from_str(line)
            .map_err(|source| ManifestError::MalformedLine {
                line: index,
                source,
            })?;

        let source = fields
            .remove("source")
            .ok_or_else(|| ManifestError::MissingField {
                line: index,
                field: "source".to_string(),
            })?;

        let attribute = fields
            .remove(label_attribute)
            .ok_or_else(|| ManifestError::MissingField {
                line: index,
                field: label_attribute.to_string(),
            })?;
        let attribute: LabelAttribute =
            serde_json::from_str(attribute.get()).map_err(|source| {
                ManifestError::MalformedLine {
                    line: index,
                    source,
                }
            })?;

        let metadata = fields.remove(&metadata_key(label_attribute));

        Ok(Self {
            index,
            source,
            metadata,
            annotations: attribute.annotations,
        })
    }

    /// Builds the input content handed to the reviewer for this record.
    ///
    /// The current entities become the pre-filled initial value.
    pub fn review_input(&self) -> ReviewInput<'_> {
        ReviewInput {
            text: &self.source,
            labels: &self.annotations.labels,
            initial_value: &self.annotations.entities,
        }
    }
}

/// Key of the metadata block for a label attribute.
pub fn metadata_key(label_attribute: &str) -> String {
    format!("{}-metadata", label_attribute)
}

/// Input content of one human review task.
#[derive(Debug, Serialize)]
pub struct ReviewInput<'a> {
    pub text: &'a RawValue,
    pub labels: &'a RawValue,
    #[serde(rename = "initialValue")]
    pub initial_value: &'a RawValue,
}

impl ReviewInput<'_> {
    /// Serializes the input content as the JSON string the review service expects.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Streaming reader over the records of a manifest file.
///
/// Blank lines are skipped and do not consume an index.
pub struct ManifestReader {
    lines: Lines<BufReader<File>>,
    label_attribute: String,
    next_index: usize,
}

impl ManifestReader {
    /// Opens a manifest file for reading.
    pub fn open(path: &Path, label_attribute: impl Into<String>) -> Result<Self, ManifestError> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            label_attribute: label_attribute.into(),
            next_index: 1,
        })
    }
}

impl Iterator for ManifestReader {
    type Item = Result<ManifestRecord, ManifestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() {
                continue;
            }

            let index = self.next_index;
            self.next_index += 1;
            return Some(ManifestRecord::parse(&line, index, &self.label_attribute));
        }
    }
}

/// Label metadata and label definitions taken from the first manifest record.
///
/// Every merged record reuses these verbatim, so all records of one
/// execution must agree on them.
#[derive(Debug)]
pub struct LabelContext {
    pub metadata: Box<RawValue>,
    pub labels: Box<RawValue>,
    metadata_value: Value,
    labels_value: Value,
}

impl LabelContext {
    /// Extracts the label context from a record.
    pub fn from_record(record: &ManifestRecord, label_attribute: &str) -> Result<Self, ManifestError> {
        let metadata = record
            .metadata
            .clone()
            .ok_or_else(|| ManifestError::MissingField {
                line: record.index,
                field: metadata_key(label_attribute),
            })?;
        let labels = record.annotations.labels.clone();

        let metadata_value = serde_json::from_str(metadata.get())?;
        let labels_value = serde_json::from_str(labels.get())?;

        Ok(Self {
            metadata,
            labels,
            metadata_value,
            labels_value,
        })
    }

    /// Reads the label context from the first record of a manifest file and
    /// checks that every following record agrees with it.
    pub fn from_manifest(path: &Path, label_attribute: &str) -> Result<Self, ManifestError> {
        let mut reader = ManifestReader::open(path, label_attribute)?;
        let first = reader
            .next()
            .ok_or_else(|| ManifestError::Empty(path.display().to_string()))??;
        let context = Self::from_record(&first, label_attribute)?;

        for record in reader {
            context.check_consistent(&record?, label_attribute)?;
        }

        Ok(context)
    }

    /// Fails when a record's metadata or labels differ from this context.
    pub fn check_consistent(
        &self,
        record: &ManifestRecord,
        label_attribute: &str,
    ) -> Result<(), ManifestError> {
        let metadata: Value = match &record.metadata {
            Some(raw) => serde_json::from_str(raw.get())?,
            None => Value::Null,
        };
        if metadata != self.metadata_value {
            return Err(ManifestError::InconsistentLabels {
                line: record.index,
                field: metadata_key(label_attribute),
            });
        }

        let labels: Value = serde_json::from_str(record.annotations.labels.get())?;
        if labels != self.labels_value {
            return Err(ManifestError::InconsistentLabels {
                line: record.index,
                field: format!("{}.annotations.labels", label_attribute),
            });
        }

        Ok(())
    }
}
