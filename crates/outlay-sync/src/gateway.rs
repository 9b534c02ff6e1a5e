//! Drop-directory gateway (secondary/driven adapter)
//!
//! Implements [`ISyncGateway`] by writing one `<record_id>.json` document per
//! entry into a directory that stands in for the remote store.
//!
//! ## Design Decisions
//!
//! - **Staging**: every payload of a batch is first written to a hidden
//!   temporary file next to its target. Only when all of them are staged are
//!   they renamed into place; a staging failure removes what was staged and
//!   fails the batch, leaving the directory as it was.
//! - **Upsert**: renaming over an existing document replaces it, so a batch
//!   resent after a failure is harmless.
//! - **File names**: record ids are percent-encoded outside `[A-Za-z0-9_-]`,
//!   which keeps distinct ids on distinct files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, instrument, warn};

use outlay_core::domain::{PendingEntry, RecordId};
use outlay_core::ports::ISyncGateway;

/// Gateway that delivers batches into a local directory
#[derive(Debug, Clone)]
pub struct DropDirectoryGateway {
    dir: PathBuf,
}

impl DropDirectoryGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding `record_id`
    pub fn document_path(&self, record_id: &RecordId) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(record_id)))
    }

    fn staging_path(&self, record_id: &RecordId) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", file_stem(record_id)))
    }

    async fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
        for (tmp, _) in staged {
            if let Err(err) = tokio::fs::remove_file(tmp).await {
                warn!(path = ?tmp, %err, "Failed to remove staged document");
            }
        }
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9_-]`
///
/// `urlencoding` leaves `.` and `~` as they are; a leading `.` would hide
/// the document, so both are encoded as well.
fn file_stem(record_id: &RecordId) -> String {
    urlencoding::encode(record_id.as_str())
        .replace('.', "%2E")
        .replace('~', "%7E")
}

#[async_trait::async_trait]
impl ISyncGateway for DropDirectoryGateway {
    #[instrument(skip(self, batch), fields(dir = %self.dir.display(), records = batch.len()))]
    async fn submit(&self, batch: &[PendingEntry]) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create drop directory {}", self.dir.display()))?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(batch.len());
        for entry in batch {
            let tmp = self.staging_path(&entry.record_id);
            if let Err(err) = tokio::fs::write(&tmp, &entry.payload).await {
                Self::discard_staged(&staged).await;
                return Err(err).with_context(|| {
                    format!("Failed to stage record {}", entry.record_id)
                });
            }
            staged.push((tmp, self.document_path(&entry.record_id)));
        }

        for (index, (tmp, target)) in staged.iter().enumerate() {
            if let Err(err) = tokio::fs::rename(tmp, target).await {
                Self::discard_staged(&staged[index..]).await;
                return Err(err)
                    .with_context(|| format!("Failed to publish {}", target.display()));
            }
        }

        debug!("Batch delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entry(id: &str, payload: &[u8]) -> PendingEntry {
        PendingEntry::new(RecordId::new(id).unwrap(), payload.to_vec())
    }

    async fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut read = tokio::fs::read_dir(dir).await.unwrap();
        while let Some(e) = read.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[test]
    fn test_file_stem_encoding() {
        let plain = RecordId::new("abc-123_X").unwrap();
        assert_eq!(file_stem(&plain), "abc-123_X");

        let odd = RecordId::new("a/b.c").unwrap();
        assert_eq!(file_stem(&odd), "a%2Fb%2Ec");

        let hidden = RecordId::new("..~x y").unwrap();
        assert_eq!(file_stem(&hidden), "%2E%2E%7Ex%20y");

        let accented = RecordId::new("café").unwrap();
        assert_eq!(file_stem(&accented), "caf%C3%A9");
    }

    #[tokio::test]
    async fn test_submit_writes_one_document_per_entry() {
        let tmp = TempDir::new().unwrap();
        let gateway = DropDirectoryGateway::new(tmp.path().join("remote"));

        gateway
            .submit(&[entry("a", b"{\"n\":1}"), entry("b", b"{\"n\":2}")])
            .await
            .unwrap();

        assert_eq!(
            dir_entries(gateway.dir()).await,
            vec!["a.json".to_string(), "b.json".to_string()]
        );
        let content = tokio::fs::read(gateway.document_path(&RecordId::new("b").unwrap()))
            .await
            .unwrap();
        assert_eq!(content, b"{\"n\":2}");
    }

    #[tokio::test]
    async fn test_resubmit_overwrites() {
        let tmp = TempDir::new().unwrap();
        let gateway = DropDirectoryGateway::new(tmp.path());

        gateway.submit(&[entry("a", b"old")]).await.unwrap();
        gateway.submit(&[entry("a", b"new")]).await.unwrap();

        let content = tokio::fs::read(tmp.path().join("a.json")).await.unwrap();
        assert_eq!(content, b"new");
    }

    #[tokio::test]
    async fn test_staging_failure_leaves_directory_untouched() {
        let tmp = TempDir::new().unwrap();
        let gateway = DropDirectoryGateway::new(tmp.path());
        // A directory where the second entry's staging file should go
        tokio::fs::create_dir(tmp.path().join(".b.json.tmp"))
            .await
            .unwrap();

        let err = gateway
            .submit(&[entry("a", b"1"), entry("b", b"2")])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to stage record b"));
        assert_eq!(dir_entries(tmp.path()).await, vec![".b.json.tmp".to_string()]);
    }

    #[tokio::test]
    async fn test_unusable_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        tokio::fs::write(&file, b"x").await.unwrap();

        let gateway = DropDirectoryGateway::new(&file);
        assert!(gateway.submit(&[entry("a", b"1")]).await.is_err());
    }
}
