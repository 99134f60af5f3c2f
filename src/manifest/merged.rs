//! Merged output records and the JSONL manifest writer.

use std::io::Write;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::value::RawValue;

use super::record::{metadata_key, LabelContext};
use crate::error::ManifestError;

/// A reviewed record recombined with the execution's label context.
///
/// Serializes as `{"source", "<label>-metadata", "<label>": {"annotations":
/// {"labels", "entities"}}}` in that key order.
#[derive(Debug)]
pub struct MergedRecord<'a> {
    pub label_attribute: &'a str,
    pub source: &'a str,
    pub context: &'a LabelContext,
    pub entities: &'a RawValue,
}

#[derive(Serialize)]
struct AnnotationsOut<'a> {
    labels: &'a RawValue,
    entities: &'a RawValue,
}

#[derive(Serialize)]
struct LabelAttributeOut<'a> {
    annotations: AnnotationsOut<'a>,
}

impl Serialize for MergedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("source", self.source)?;
        map.serialize_entry(&metadata_key(self.label_attribute), &self.context.metadata)?;
        map.serialize_entry(
            self.label_attribute,
            &LabelAttributeOut {
                annotations: AnnotationsOut {
                    labels: &self.context.labels,
                    entities: self.entities,
                },
            },
        )?;
        map.end()
    }
}

/// Writes records as newline-delimited JSON.
pub struct ManifestWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> ManifestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Appends one record as a single JSON line.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), ManifestError> {
        serde_json::to_writer(&mut self.inner, record)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes the underlying writer and returns the record count.
    pub fn finish(mut self) -> Result<usize, ManifestError> {
        self.inner.flush()?;
        Ok(self.written)
    }
}
