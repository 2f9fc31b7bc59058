//! The knowledge base index: a single markdown document with one section per
//! synchronized library.
//!
//! The document is held in memory as a preamble followed by an ordered list of
//! typed [`IndexEntry`] sections and is re-rendered on every write. Sections are
//! delimited by `## ` headings holding the library identifier.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::library::LibraryId;

pub const INDEX_FILE_NAME: &str = "INDEX.md";
/// Format of every timestamp written to the index
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TITLE: &str = "# Knowledge Base Index";
const LAST_UPDATED_PREFIX: &str = "Last updated: ";
const DESCRIPTION: &str =
    "This file contains an index of all downloaded documentation and repositories.";
const SECTION_PREFIX: &str = "## ";
const SEPARATOR: &str = "---";

const ADDED_PREFIX: &str = "- **Added**: ";
const DOCUMENTATION_PREFIX: &str = "- **Documentation**: ";
const REPOSITORY_PREFIX: &str = "- **Repository**: ";
const SEARCH_QUERY_PREFIX: &str = "- **Search Query**: ";

/// One library section of the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub library_id: LibraryId,
    pub added: String,
    pub document: String,
    pub repository: Option<String>,
    pub search_query: Option<String>,
    /// Lines inside the section this module does not manage, kept verbatim
    pub notes: Vec<String>,
}

impl IndexEntry {
    pub fn new(library_id: LibraryId, added: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            library_id,
            added: added.into(),
            document: document.into(),
            repository: None,
            search_query: None,
            notes: Vec::new(),
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_search_query(mut self, search_query: Option<String>) -> Self {
        self.search_query = search_query
            .map(|q| single_line(&q))
            .filter(|q| !q.is_empty());
        self
    }

    fn heading(&self) -> String {
        format!("{SECTION_PREFIX}{}", self.library_id)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.heading());
        out.push('\n');
        out.push_str(&format!("{ADDED_PREFIX}{}\n", self.added));
        out.push_str(&format!("{DOCUMENTATION_PREFIX}`{}`\n", self.document));
        if let Some(repository) = &self.repository {
            out.push_str(&format!("{REPOSITORY_PREFIX}`{}/`\n", repository));
        }
        if let Some(query) = &self.search_query {
            out.push_str(&format!("{SEARCH_QUERY_PREFIX}\"{}\"\n", single_line(query)));
        }
        for note in &self.notes {
            out.push_str(note);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(SEPARATOR);
        out.push_str("\n\n");
    }

    /// Parse a section from its heading identifier and body lines
    fn parse(library_id: LibraryId, body: &[&str]) -> Self {
        let mut entry = Self::new(library_id, "", "");
        for line in body {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == SEPARATOR {
                continue;
            }
            if let Some(value) = trimmed.strip_prefix(ADDED_PREFIX.trim_end()) {
                entry.added = value.trim().to_string();
            } else if let Some(value) = trimmed.strip_prefix(DOCUMENTATION_PREFIX.trim_end()) {
                entry.document = value.trim().trim_matches('`').to_string();
            } else if let Some(value) = trimmed.strip_prefix(REPOSITORY_PREFIX.trim_end()) {
                let value = value.trim().trim_matches('`');
                entry.repository = Some(value.trim_end_matches('/').to_string());
            } else if let Some(value) = trimmed.strip_prefix(SEARCH_QUERY_PREFIX.trim_end()) {
                let value = value.trim();
                let query = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                entry.search_query = Some(query.to_string());
            } else {
                entry.notes.push(line.to_string());
            }
        }
        entry
    }
}

/// Join the lines of `text` with single spaces so it fits on one index line
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether an upsert created a new section or rewrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// In-memory form of the index document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    preamble: Vec<String>,
    entries: Vec<IndexEntry>,
}

impl IndexDocument {
    /// An empty index with the standard preamble
    pub fn new(timestamp: &str) -> Self {
        let preamble = [
            TITLE.to_string(),
            String::new(),
            format!("{LAST_UPDATED_PREFIX}{timestamp}"),
            String::new(),
            DESCRIPTION.to_string(),
            String::new(),
            SEPARATOR.to_string(),
            String::new(),
        ];
        Self {
            preamble: preamble.to_vec(),
            entries: Vec::new(),
        }
    }

    /// Parse an index document. Anything before the first section is kept as
    /// the preamble; headings that are not valid identifiers are kept as notes
    /// of the preceding section (or the preamble).
    pub fn parse(text: &str) -> Self {
        let mut preamble: Vec<String> = Vec::new();
        let mut sections: Vec<(LibraryId, Vec<&str>)> = Vec::new();

        for line in text.lines() {
            let section_id = line
                .strip_prefix(SECTION_PREFIX)
                .and_then(|rest| LibraryId::parse(rest).ok());
            if let Some(id) = section_id {
                sections.push((id, Vec::new()));
                continue;
            }
            match sections.last_mut() {
                Some((_, body)) => body.push(line),
                None => preamble.push(line.to_string()),
            }
        }

        let entries = sections
            .into_iter()
            .map(|(id, body)| IndexEntry::parse(id, &body))
            .collect();
        Self { preamble, entries }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, id: &LibraryId) -> Option<&IndexEntry> {
        self.entries.iter().find(|entry| &entry.library_id == id)
    }

    /// Insert or replace the section for `entry.library_id`.
    ///
    /// A replaced section keeps its position and, unless `entry` brings its
    /// own, its notes; any further sections for the same identifier are
    /// dropped. A new section goes directly after the preamble.
    pub fn upsert(&mut self, mut entry: IndexEntry) -> Upsert {
        let id = entry.library_id.clone();
        match self.entries.iter().position(|e| e.library_id == id) {
            Some(position) => {
                if entry.notes.is_empty() {
                    entry.notes = std::mem::take(&mut self.entries[position].notes);
                }
                self.entries[position] = entry;
                let mut seen = false;
                self.entries.retain(|e| {
                    if e.library_id != id {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
                Upsert::Replaced
            }
            None => {
                self.entries.insert(0, entry);
                Upsert::Inserted
            }
        }
    }

    /// Refresh the `Last updated:` line, restoring the standard preamble if the
    /// document has none.
    pub fn touch(&mut self, timestamp: &str) {
        if self.preamble.iter().all(|line| line.trim().is_empty()) {
            self.preamble = Self::new(timestamp).preamble;
            return;
        }
        if let Some(line) = self
            .preamble
            .iter_mut()
            .find(|line| line.starts_with(LAST_UPDATED_PREFIX))
        {
            *line = format!("{LAST_UPDATED_PREFIX}{timestamp}");
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for entry in &self.entries {
            entry.render(&mut out);
        }
        out
    }
}

/// The index file inside a knowledge base directory
#[derive(Debug, Clone)]
pub struct KnowledgeBaseIndex {
    path: PathBuf,
}

impl KnowledgeBaseIndex {
    pub fn new(knowledge_base_dir: impl AsRef<Path>) -> Self {
        Self {
            path: knowledge_base_dir.as_ref().join(INDEX_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index, or `None` if it has not been created yet
    pub fn load(&self) -> Result<Option<IndexDocument>> {
        Ok(self.read_text()?.map(|text| IndexDocument::parse(&text)))
    }

    /// Raw text of the index file, or `None` if it has not been created yet
    pub fn read_text(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&self.path)
            .map(Some)
            .with_context(|| format!("Failed to read index {}", self.path.display()))
    }

    /// Record `entry`, leaving exactly one section for its library
    pub fn upsert(&self, entry: IndexEntry, timestamp: &str) -> Result<Upsert> {
        let mut document = match self.load()? {
            Some(mut document) => {
                document.touch(timestamp);
                document
            }
            None => IndexDocument::new(timestamp),
        };

        let library_id = entry.library_id.clone();
        let outcome = document.upsert(entry);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(&self.path, document.render())
            .with_context(|| format!("Failed to write index {}", self.path.display()))?;

        tracing::info!(library_id = %library_id, ?outcome, path = %self.path.display(), "Updated index");
        Ok(outcome)
    }
}
