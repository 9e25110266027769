//! Record retrieval: fetching a record page and extracting its entries.

use crate::error::Result;
use crate::index::{Fetch, IndexUrls};
use crate::markup::strip_tags;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Marker wrapping the citation entry inside a record page.
const PRE_OPEN: &str = "<pre";
const PRE_CLOSE: &str = "</pre>";

/// An opaque identifier for one record in the remote index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path used on the record endpoint. A leading `namespace:` prefix is
    /// local notation, not part of the remote path, and is stripped; a
    /// colon after the first `/` belongs to the id itself.
    pub fn fetch_path(&self) -> &str {
        match self.0.split_once(':') {
            Some((prefix, rest)) if !prefix.contains('/') && !rest.is_empty() => rest,
            _ => &self.0,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The locally materialized text form of one fetched record: the lines of
/// one BibTeX-style block, keyed by its first line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    lines: Vec<String>,
}

fn key_re() -> &'static Regex {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    KEY_RE.get_or_init(|| {
        Regex::new(r"^@\s*(?P<kind>[A-Za-z]+)\s*\{\s*(?P<key>[^,\s{}]+)\s*,")
            .expect("valid key pattern")
    })
}

impl Entry {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Convenience constructor splitting `text` on newlines.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Record key from the `@type{key,` header, if the first line carries
    /// one. Deduplication compares entries by this key only.
    pub fn key(&self) -> Option<&str> {
        let first = self.lines.first()?;
        let caps = key_re().captures(first)?;
        caps.name("key").map(|m| m.as_str())
    }
}

/// Fetch the record page for `id` and extract its entries.
///
/// A page without the preformatted block yields zero entries rather than
/// an error; transport failures propagate for the caller to classify.
pub async fn fetch_entries<F: Fetch>(
    index: &F,
    urls: &IndexUrls,
    id: &RecordId,
) -> Result<Vec<Entry>> {
    let url = urls.record(id.fetch_path())?;
    let body = index.get(&url).await?;
    let Some(block) = extract_pre_block(&body) else {
        debug!(id = %id, "no preformatted block in record page");
        return Ok(Vec::new());
    };
    Ok(split_entries(&strip_tags(block)))
}

/// Substring delimited by the preformatted-block marker, or `None` when
/// the page carries no record body.
fn extract_pre_block(body: &str) -> Option<&str> {
    let open = body.find(PRE_OPEN)?;
    let start = open + body[open..].find('>')? + 1;
    let end = start + body[start..].find(PRE_CLOSE)?;
    Some(&body[start..end])
}

/// Split stripped record text on blank lines into discrete entries. The
/// separating blank lines belong to no entry.
fn split_entries(text: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                entries.push(Entry::from_lines(std::mem::take(&mut current)));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        entries.push(Entry::from_lines(current));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_path_strips_namespace_prefix() {
        assert_eq!(RecordId::new("dblp:conf/icfp/Doe99").fetch_path(), "conf/icfp/Doe99");
        assert_eq!(RecordId::new("conf/icfp/Doe99").fetch_path(), "conf/icfp/Doe99");
        // A colon after the first slash is part of the id.
        assert_eq!(RecordId::new("conf/x/a:b").fetch_path(), "conf/x/a:b");
    }

    #[test]
    fn test_entry_key() {
        let entry = Entry::from_text("@article{foo2020,\n  title = {T},\n}");
        assert_eq!(entry.key(), Some("foo2020"));

        let entry = Entry::from_text("@ InProceedings { doe99 ,\n}");
        assert_eq!(entry.key(), Some("doe99"));

        assert_eq!(Entry::from_text("not a header").key(), None);
    }

    #[test]
    fn test_extract_pre_block() {
        let body = "<html><pre class=\"verbatim\">@article{x,\n}</pre></html>";
        assert_eq!(extract_pre_block(body), Some("@article{x,\n}"));
        assert_eq!(extract_pre_block("<html>no record</html>"), None);
    }

    #[test]
    fn test_split_entries_on_blank_lines() {
        let text = "@article{a,\n}\n\n@article{b,\n}\n\n";
        let entries = split_entries(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lines(), &["@article{a,".to_string(), "}".to_string()]);
        assert_eq!(entries[1].key(), Some("b"));
    }

    #[test]
    fn test_split_entries_skips_leading_blanks() {
        let entries = split_entries("\n\n@misc{m,\n}\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key(), Some("m"));
    }
}
