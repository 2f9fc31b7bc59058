use regex::Regex;
use std::sync::LazyLock;

/// Number of leading lines scanned for a repository reference
pub const SCAN_LINE_LIMIT: usize = 50;

const OWNER_REPO: &str = r"([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)";

/// Ordered from most to least specific; the first pattern with any match wins.
static REPOSITORY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"SOURCE:\s*https?://github\.com/{OWNER_REPO}"),
        format!(r"https?://github\.com/{OWNER_REPO}"),
        format!(r"github\.com/{OWNER_REPO}"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("repository pattern is valid"))
    .collect()
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,2}\s+(.+)$").expect("heading pattern is valid"));

/// Find the source repository referenced near the top of a documentation text.
///
/// Only the first [`SCAN_LINE_LIMIT`] lines are considered, since generated
/// documentation places hosting links in its header and example code further
/// down tends to mention unrelated repositories. The result is always a
/// normalized `https://github.com/{owner}/{repo}` URL without a `.git` suffix.
pub fn extract_repository_url(text: &str) -> Option<String> {
    let head = text
        .lines()
        .take(SCAN_LINE_LIMIT)
        .collect::<Vec<_>>()
        .join("\n");

    REPOSITORY_PATTERNS.iter().find_map(|pattern| {
        let captures = pattern.captures(&head)?;
        let owner = &captures[1];
        let repo = normalize_repo_segment(&captures[2]);
        if repo.is_empty() {
            return None;
        }
        Some(format!("https://github.com/{owner}/{repo}"))
    })
}

fn normalize_repo_segment(segment: &str) -> &str {
    let segment = segment.trim_end_matches('.');
    segment.strip_suffix(".git").unwrap_or(segment)
}

/// Extract the title of a documentation text (first level one or two heading)
pub fn extract_title(text: &str) -> Option<String> {
    HEADING
        .captures(text)
        .map(|cap| cap[1].trim().to_string())
        .filter(|title| !title.is_empty())
}
