use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::document::extract_repository_url;
use crate::index::{IndexDocument, IndexEntry, KnowledgeBaseIndex, TIMESTAMP_FORMAT, Upsert};
use crate::library::LibraryId;
use crate::repository::{CheckoutState, CommandRunner, GitCli, RepositorySynchronizer, SyncOutcome};
use crate::storage::DocumentStore;

/// Options for one synchronization run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Mirror the repository referenced by the documentation
    pub sync_repo: bool,
    /// Search query that led to this library, recorded in the index
    pub search_query: Option<String>,
}

/// What happened to the library's repository during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepositoryReport {
    /// Repository synchronization was not requested
    NotRequested,
    /// Requested, but the documentation does not reference a repository
    NoReferenceFound,
    /// Requested and the local clone is up to date
    Synchronized {
        url: String,
        path: PathBuf,
        outcome: SyncOutcome,
    },
    /// Requested and both update and clone failed
    Failed { url: String },
}

impl RepositoryReport {
    /// Human readable one-line description
    pub fn describe(&self) -> String {
        match self {
            Self::NotRequested => "Repository sync not requested".to_string(),
            Self::NoReferenceFound => "No GitHub repository URL found in documentation".to_string(),
            Self::Synchronized { path, .. } => format!("Repository: {}", path.display()),
            Self::Failed { url } => format!("Repository clone failed: {url}"),
        }
    }
}

/// Outcome of one synchronization run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub library_id: LibraryId,
    pub document_path: PathBuf,
    pub repository: RepositoryReport,
    #[serde(skip)]
    pub index: Upsert,
}

/// A knowledge base directory: stored documents, repository clones and the index
#[derive(Debug, Clone)]
pub struct KnowledgeBase<R = GitCli> {
    store: DocumentStore,
    index: KnowledgeBaseIndex,
    synchronizer: RepositorySynchronizer<R>,
}

impl KnowledgeBase<GitCli> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.knowledge_base_dir, GitCli::new(config))
    }
}

impl<R: CommandRunner> KnowledgeBase<R> {
    pub fn new(root: impl AsRef<Path>, runner: R) -> Self {
        let root = root.as_ref();
        Self {
            store: DocumentStore::new(root),
            index: KnowledgeBaseIndex::new(root),
            synchronizer: RepositorySynchronizer::new(runner),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &KnowledgeBaseIndex {
        &self.index
    }

    pub fn synchronizer(&self) -> &RepositorySynchronizer<R> {
        &self.synchronizer
    }

    /// Load the index document, if it exists
    pub fn load_index(&self) -> Result<Option<IndexDocument>> {
        self.index.load()
    }

    /// Persist fetched documentation, optionally mirror its repository and
    /// record the library in the index.
    pub async fn synchronize(
        &self,
        id: &LibraryId,
        text: &str,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        self.synchronize_at(id, text, options, Local::now().naive_local())
            .await
    }

    /// Same as [`KnowledgeBase::synchronize`] with an explicit timestamp
    pub async fn synchronize_at(
        &self,
        id: &LibraryId,
        text: &str,
        options: &SyncOptions,
        at: NaiveDateTime,
    ) -> Result<SyncReport> {
        let document_path = self.store.save(id, text).inspect_err(|e| {
            tracing::error!(library_id = %id, error = %e, "Failed to save documentation");
        })?;

        let repository = if options.sync_repo {
            self.sync_repository(id, text).await
        } else {
            RepositoryReport::NotRequested
        };

        // Only reference the clone if it is actually there when the index is written.
        let repository_dir = match &repository {
            RepositoryReport::Synchronized { path, .. }
                if CheckoutState::inspect(path) == CheckoutState::Valid =>
            {
                Some(id.repository_dir_name())
            }
            _ => None,
        };

        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let entry = IndexEntry::new(id.clone(), timestamp.clone(), id.document_file_name())
            .with_repository(repository_dir)
            .with_search_query(options.search_query.clone());
        let index = self.index.upsert(entry, &timestamp).inspect_err(|e| {
            tracing::error!(library_id = %id, error = %e, "Failed to update index");
        })?;

        tracing::info!(library_id = %id, repository = %repository.describe(), "Synchronization finished");
        Ok(SyncReport {
            library_id: id.clone(),
            document_path,
            repository,
            index,
        })
    }

    async fn sync_repository(&self, id: &LibraryId, text: &str) -> RepositoryReport {
        let Some(url) = extract_repository_url(text) else {
            tracing::info!(library_id = %id, "No repository reference found");
            return RepositoryReport::NoReferenceFound;
        };

        let path = self.store.repository_path(id);
        match self.synchronizer.synchronize(&url, &path).await {
            SyncOutcome::Failed => RepositoryReport::Failed { url },
            outcome => RepositoryReport::Synchronized { url, path, outcome },
        }
    }
}
