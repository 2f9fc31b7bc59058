use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::api::{Context7Client, FetchOptions, NO_RESULTS_MESSAGE, SearchResult, format_search_results};
use crate::config::Config;
use crate::document::extract_title;
use crate::library::LibraryId;
use crate::repository::{CommandRunner, GitCli};
use crate::storage::{DocumentContent, StoredDocument};
use crate::sync::{KnowledgeBase, RepositoryReport, SyncOptions};

/// Default number of characters returned when reading a stored document
pub const DEFAULT_MAX_CHARS: usize = 10_000;

/// Parameters of a documentation fetch
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub library_id: String,
    pub topic: Option<String>,
    pub tokens: Option<u32>,
    pub client_ip: Option<String>,
    pub save_to_file: bool,
    pub sync_repo: bool,
    pub search_query: Option<String>,
}

impl FetchRequest {
    pub fn new(library_id: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            topic: None,
            tokens: None,
            client_ip: None,
            save_to_file: true,
            sync_repo: false,
            search_query: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub message: String,
    pub results: Vec<SearchResult>,
    pub formatted_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub library_id: LibraryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub length: usize,
    pub topic: Option<String>,
    pub tokens_requested: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
    /// Absent when the documentation was not saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryReport>,
}

/// A stored library, identified through the index when possible
#[derive(Debug, Clone, Serialize)]
pub struct LibraryListing {
    pub library_id: String,
    #[serde(flatten)]
    pub document: StoredDocument,
}

/// Remote search and fetch wired to a local knowledge base
pub struct DocsService<R = GitCli> {
    client: Context7Client,
    knowledge: Mutex<KnowledgeBase<R>>,
}

impl DocsService<GitCli> {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Context7Client::new(config).context("Failed to build HTTP client")?;
        Ok(Self::new(client, KnowledgeBase::from_config(config)))
    }
}

impl<R: CommandRunner> DocsService<R> {
    pub fn new(client: Context7Client, knowledge: KnowledgeBase<R>) -> Self {
        Self {
            client,
            knowledge: Mutex::new(knowledge),
        }
    }

    pub async fn search(&self, query: &str, client_ip: Option<&str>) -> Result<SearchReport> {
        let results = self.client.search(query, client_ip).await?;
        let message = if results.is_empty() {
            NO_RESULTS_MESSAGE.to_string()
        } else {
            format!("Found {} libraries matching '{}'", results.len(), query)
        };
        let formatted_text = format_search_results(&results);
        Ok(SearchReport {
            message,
            results,
            formatted_text,
        })
    }

    /// Fetch documentation and, when requested, run it through the knowledge base
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchReport> {
        let id = LibraryId::parse(&request.library_id)?;
        let options = FetchOptions {
            topic: request.topic.clone(),
            tokens: request.tokens,
        };
        let content = self
            .client
            .fetch_documentation(&id, &options, request.client_ip.as_deref())
            .await?;

        let mut report = FetchReport {
            library_id: id.clone(),
            title: extract_title(&content),
            length: content.chars().count(),
            content,
            topic: request.topic.clone(),
            tokens_requested: request.tokens,
            saved_to: None,
            repository: None,
        };

        if request.save_to_file {
            let options = SyncOptions {
                sync_repo: request.sync_repo,
                search_query: request.search_query.clone(),
            };
            let knowledge = self.knowledge.lock().await;
            let sync = knowledge.synchronize(&id, &report.content, &options).await?;
            report.saved_to = Some(sync.document_path);
            report.repository = Some(sync.repository);
        }

        Ok(report)
    }

    /// Every stored document, with its library identifier resolved through the index
    pub async fn list_libraries(&self) -> Result<Vec<LibraryListing>> {
        let knowledge = self.knowledge.lock().await;
        let documents = knowledge.store().list()?;

        let known: HashMap<String, String> = knowledge
            .load_index()?
            .map(|index| {
                index
                    .entries()
                    .iter()
                    .map(|entry| (entry.document.clone(), entry.library_id.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(documents
            .into_iter()
            .map(|document| {
                let library_id = known
                    .get(&document.filename)
                    .cloned()
                    .unwrap_or_else(|| format!("/{}", document.file_stem().replace('_', "/")));
                LibraryListing {
                    library_id,
                    document,
                }
            })
            .collect())
    }

    pub async fn read_library(&self, filename: &str, max_chars: usize) -> Result<DocumentContent> {
        let knowledge = self.knowledge.lock().await;
        knowledge.store().read(filename, max_chars)
    }

    /// Text of the knowledge base index, if one has been written
    pub async fn read_index(&self) -> Result<Option<String>> {
        self.knowledge.lock().await.index().read_text()
    }

    pub async fn knowledge_base_dir(&self) -> PathBuf {
        self.knowledge.lock().await.store().root().to_path_buf()
    }
}
