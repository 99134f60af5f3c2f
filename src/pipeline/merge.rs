//! Result merge: folds completed reviews back into a manifest.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use walkdir::WalkDir;

use super::config::MergeConfig;
use super::runner::{resolve_task, Resolution};
use crate::error::{ManifestError, PipelineError, StorageError};
use crate::manifest::{LabelContext, ManifestWriter, MergedRecord, ReviewedOutput, REVIEW_OUTPUT_SUFFIX};
use crate::notify::{Notice, Notifier};
use crate::storage::ObjectStore;
use crate::workflow::{TaskToken, WorkflowClient};

/// Outcome of a merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub records_written: usize,
}

/// The result merge task and its collaborators.
pub struct ResultMerge {
    config: MergeConfig,
    store: Arc<dyn ObjectStore>,
    workflow: Arc<dyn WorkflowClient>,
    notifier: Arc<dyn Notifier>,
}

impl ResultMerge {
    pub fn new(
        config: MergeConfig,
        store: Arc<dyn ObjectStore>,
        workflow: Arc<dyn WorkflowClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            workflow,
            notifier,
        }
    }

    /// Builds and uploads the output manifest, then resolves `token`.
    ///
    /// Nothing is uploaded when any step fails; the failure is reported to
    /// the workflow once and returned.
    pub async fn execute(&self, token: &TaskToken) -> Result<MergeReport, PipelineError> {
        let execution = &self.config.execution;
        tracing::info!(
            execution_id = %execution.execution_id,
            output = %self.config.output_manifest,
            "Starting result merge"
        );

        let written = AtomicUsize::new(0);
        resolve_task(self.workflow.as_ref(), token, self.merge(&written)).await?;

        let notice = Notice::review_complete(&execution.execution_name);
        if let Err(e) = self.notifier.publish(&notice).await {
            tracing::error!(error = %e, "Could not publish review complete notice");
            return Err(e.into());
        }

        Ok(MergeReport {
            records_written: written.load(Ordering::SeqCst),
        })
    }

    async fn merge(&self, written: &AtomicUsize) -> Result<Resolution, PipelineError> {
        let execution = &self.config.execution;
        let label = execution.label_attribute_name.as_str();

        let scratch = TempDir::new()?;
        let manifest_path = scratch.path().join("input.manifest");
        let reviewed_dir = scratch.path().join("reviewed");
        std::fs::create_dir_all(&reviewed_dir)?;

        self.store
            .download(&execution.input_manifest, &manifest_path)
            .await?;
        let files = self
            .store
            .download_tree(&execution.review_output_prefix(), &reviewed_dir)
            .await?;
        tracing::info!(files, "Files downloaded");

        let context = LabelContext::from_manifest(&manifest_path, label)?;

        let output_path = scratch.path().join("output.manifest");
        let mut writer = ManifestWriter::new(BufWriter::new(File::create(&output_path)?));
        for path in review_outputs(&reviewed_dir)? {
            let review = ReviewedOutput::from_file(&path)?;
            let entities = review
                .effective_entities()
                .ok_or_else(|| ManifestError::MissingAnswer(path.display().to_string()))?;

            writer.write_record(&MergedRecord {
                label_attribute: label,
                source: review.source_text(),
                context: &context,
                entities,
            })?;
            tracing::debug!(review = %path.display(), "Merged review");
        }
        let count = writer.finish()?;
        tracing::info!(records = count, "Output manifest written");

        self.store
            .upload(&output_path, &self.config.output_manifest)
            .await?;
        tracing::info!(url = %self.config.output_manifest, "Output manifest uploaded");

        written.store(count, Ordering::SeqCst);
        Ok(Resolution::Succeeded)
    }
}

/// Review output files under `dir`, sorted by path.
pub fn review_outputs(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut outputs = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(REVIEW_OUTPUT_SUFFIX)
        {
            outputs.push(entry.into_path());
        }
    }
    Ok(outputs)
}
