//! Manifest data model.
//!
//! - **record**: input manifest lines, review input content and the label
//!   context shared by every record of an execution
//! - **reviewed**: completed review outputs and the entity reconciliation rule
//! - **merged**: merged output records and the JSONL writer

pub mod merged;
pub mod record;
pub mod reviewed;

pub use merged::{ManifestWriter, MergedRecord};
pub use record::{metadata_key, Annotations, LabelContext, ManifestReader, ManifestRecord, ReviewInput};
pub use reviewed::{ReviewedOutput, REVIEW_OUTPUT_SUFFIX};
