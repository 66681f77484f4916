//! Multi-document YAML report files.
//!
//! Successive runs append to the same file, one YAML document per run, each
//! opened with an explicit `---` marker. Readers get the full history back.

use serde::Deserialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::ReportError;
use crate::model::TimingReport;

/// Append `report` to `path` as one YAML document, creating the file (and
/// its parent directory) when missing.
pub async fn append_document(path: impl AsRef<Path>, report: &TimingReport) -> Result<(), ReportError> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(report)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(b"---\n").await?;
    file.write_all(yaml.as_bytes()).await?;
    file.flush().await?;

    info!(path = %path.display(), pass = report.pass, "report appended");
    Ok(())
}

/// Read every report document from `path`, oldest first.
pub async fn read_documents(path: impl AsRef<Path>) -> Result<Vec<TimingReport>, ReportError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let mut reports = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&raw) {
        reports.push(TimingReport::deserialize(document)?);
    }
    Ok(reports)
}
