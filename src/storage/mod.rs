use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::index::INDEX_FILE_NAME;
use crate::library::{DOCUMENT_EXTENSION, LibraryId, REPOSITORY_SUFFIX};

/// Marker appended to content cut short by [`DocumentStore::read`]
pub const TRUNCATION_MARKER: &str = "\n\n... [Content truncated]";

/// Stores fetched documentation as one markdown file per library
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

/// A stored documentation file as found on disk
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub filename: String,
    pub size: u64,
    pub modified: String,
    pub has_repository: bool,
}

impl StoredDocument {
    pub fn file_stem(&self) -> &str {
        self.filename
            .strip_suffix(&format!(".{DOCUMENT_EXTENSION}"))
            .unwrap_or(&self.filename)
    }
}

/// Content read back from a stored documentation file
#[derive(Debug, Clone, Serialize)]
pub struct DocumentContent {
    pub filename: String,
    pub content: String,
    pub full_length: usize,
    pub truncated: bool,
    pub max_chars: usize,
}

impl DocumentStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, id: &LibraryId) -> PathBuf {
        self.root.join(id.document_file_name())
    }

    pub fn repository_path(&self, id: &LibraryId) -> PathBuf {
        self.root.join(id.repository_dir_name())
    }

    /// Write (or overwrite) the documentation for a library
    pub fn save(&self, id: &LibraryId, text: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create knowledge base directory {}", self.root.display())
        })?;

        let path = self.document_path(id);
        fs::write(&path, text)
            .with_context(|| format!("Failed to write documentation to {}", path.display()))?;

        tracing::info!(library_id = %id, path = %path.display(), bytes = text.len(), "Saved documentation");
        Ok(path)
    }

    /// Read a stored documentation file, keeping at most `max_chars` characters
    pub fn read(&self, filename: &str, max_chars: usize) -> Result<DocumentContent> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename.contains("..")
        {
            anyhow::bail!("Invalid document filename: {filename}");
        }

        let path = self.root.join(filename);
        if !path.is_file() {
            anyhow::bail!("File {} not found in {}", filename, self.root.display());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let full_length = content.chars().count();
        let truncated = full_length > max_chars;

        let content = if truncated {
            let mut head: String = content.chars().take(max_chars).collect();
            head.push_str(TRUNCATION_MARKER);
            head
        } else {
            content
        };

        Ok(DocumentContent {
            filename: filename.to_string(),
            content,
            full_length,
            truncated,
            max_chars,
        })
    }

    /// List every stored documentation file, sorted by filename
    pub fn list(&self) -> Result<Vec<StoredDocument>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Failed to scan {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            if filename == INDEX_FILE_NAME
                || entry.path().extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION)
            {
                continue;
            }

            // Unreadable entries are skipped rather than failing the whole listing.
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(error = %e, file = %filename, "Skipping unreadable document");
                    continue;
                }
            };
            let modified = meta
                .modified()
                .map(|time| DateTime::<Local>::from(time).to_rfc3339())
                .unwrap_or_default();

            let stem = filename
                .strip_suffix(&format!(".{DOCUMENT_EXTENSION}"))
                .unwrap_or(&filename);
            let has_repository = self.root.join(format!("{stem}{REPOSITORY_SUFFIX}")).is_dir();

            documents.push(StoredDocument {
                filename,
                size: meta.len(),
                modified,
                has_repository,
            });
        }

        documents.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(documents)
    }
}
