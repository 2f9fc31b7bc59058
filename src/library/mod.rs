use anyhow::Result;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Suffix appended to the file stem for the document file
pub const DOCUMENT_EXTENSION: &str = "md";
/// Suffix appended to the file stem for the repository clone directory
pub const REPOSITORY_SUFFIX: &str = "_repo";

/// Canonical identifier of a documentation library, e.g. `org/project`.
///
/// The canonical form never starts with a separator. It is displayed with a
/// leading `/` (`/org/project`), which is how the remote API and the index
/// present it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(String);

impl LibraryId {
    /// Parse and normalize a raw identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let canonical = raw.trim().trim_start_matches('/');
        if canonical.is_empty() {
            anyhow::bail!("Library identifier cannot be empty");
        }
        Ok(Self(canonical.to_string()))
    }

    /// Canonical form without the leading separator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe stem shared by the document file and the repository directory
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
            .collect()
    }

    /// Name of the document file, e.g. `org_project.md`
    pub fn document_file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), DOCUMENT_EXTENSION)
    }

    /// Name of the repository clone directory, e.g. `org_project_repo`
    pub fn repository_dir_name(&self) -> String {
        format!("{}{}", self.file_stem(), REPOSITORY_SUFFIX)
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl FromStr for LibraryId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for LibraryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
