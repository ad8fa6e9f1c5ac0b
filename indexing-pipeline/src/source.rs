use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use common::error::AppError;

/// Read-only access to the document corpus. The pipeline lists and reads;
/// it never writes.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<String>, AppError>;
    async fn read_document(&self, path: &str) -> Result<String, AppError>;
}

/// Markdown files under a root directory, listed as sorted relative paths
/// so progress reporting and tests are deterministic.
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn list_documents(&self) -> Result<Vec<String>, AppError> {
        let mut paths = Vec::new();
        let mut directories = vec![self.root.clone()];

        while let Some(directory) = directories.pop() {
            let mut entries = fs::read_dir(&directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    directories.push(path);
                } else if path.extension().is_some_and(|ext| ext == "md") {
                    let relative = path
                        .strip_prefix(&self.root)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    paths.push(relative);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn read_document(&self, path: &str) -> Result<String, AppError> {
        Ok(fs::read_to_string(self.root.join(path)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_markdown_files_sorted_and_relative() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("b.md"), "two").await.expect("write");
        tokio::fs::write(dir.path().join("a.md"), "one").await.expect("write");
        tokio::fs::write(dir.path().join("notes.txt"), "not markdown")
            .await
            .expect("write");
        tokio::fs::create_dir(dir.path().join("sub")).await.expect("mkdir");
        tokio::fs::write(dir.path().join("sub/c.md"), "three")
            .await
            .expect("write");

        let source = FsDocumentSource::new(dir.path());
        let documents = source.list_documents().await.expect("list");
        assert_eq!(documents, vec!["a.md", "b.md", "sub/c.md"]);
    }

    #[tokio::test]
    async fn reads_documents_relative_to_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("note.md"), "note body")
            .await
            .expect("write");

        let source = FsDocumentSource::new(dir.path());
        let text = source.read_document("note.md").await.expect("read");
        assert_eq!(text, "note body");
    }

    #[tokio::test]
    async fn missing_document_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FsDocumentSource::new(dir.path());
        let result = source.read_document("ghost.md").await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
