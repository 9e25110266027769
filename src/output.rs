//! Entry deduplication, field filtering and serialization.

use crate::error::Result;
use crate::record::Entry;
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Field names to suppress from written entries. Loaded once before any
/// writing; read-only for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet(HashSet<String>);

impl IgnoreSet {
    /// The empty set: no field filtering is performed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            fields
                .into_iter()
                .map(|f| f.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Load the exclusion list if `path` exists; a missing file means no
    /// filtering, an unreadable one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let text = std::fs::read_to_string(path)?;
        let set = Self::from_fields(text.lines().map(str::trim).filter(|l| !l.is_empty()));
        debug!(path = %path.display(), fields = set.0.len(), "loaded ignore set");
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(&field.to_ascii_lowercase())
    }
}

fn field_re() -> &'static Regex {
    static FIELD_RE: OnceLock<Regex> = OnceLock::new();
    FIELD_RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<field>[A-Za-z][A-Za-z0-9_-]*)\s*=").expect("valid field pattern")
    })
}

/// Field name of a `name = value` line, if it is one.
fn field_name(line: &str) -> Option<&str> {
    field_re()
        .captures(line)
        .and_then(|caps| caps.name("field"))
        .map(|m| m.as_str())
}

/// Drop ignored field lines from one entry and strip the one trailing
/// comma left dangling on the last field line before the closing line.
fn filter_entry(entry: &Entry, ignore: &IgnoreSet) -> Entry {
    let mut lines: Vec<String> = entry
        .lines()
        .iter()
        .filter(|line| field_name(line).map_or(true, |f| !ignore.contains(f)))
        .cloned()
        .collect();
    if lines.len() >= 2 {
        let last = lines.len() - 1;
        if lines[last].trim_start().starts_with('}') && lines[last - 1].ends_with(',') {
            lines[last - 1].pop();
        }
    }
    Entry::from_lines(lines)
}

/// Serialize `entries` to `dest`, one blank line between entries.
///
/// Entries sharing a record key are written once, first seen wins. Field
/// filtering applies only when the ignore set is non-empty. Returns the
/// number of entries written.
pub fn write_entries<W: Write>(dest: &mut W, entries: &[Entry], ignore: &IgnoreSet) -> Result<usize> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut written = 0;
    for entry in entries {
        if let Some(key) = entry.key() {
            if !seen.insert(key.to_string()) {
                debug!(key, "duplicate record key, skipping");
                continue;
            }
        }
        let cleaned;
        let out = if ignore.is_empty() {
            entry
        } else {
            cleaned = filter_entry(entry, ignore);
            &cleaned
        };
        for line in out.lines() {
            writeln!(dest, "{line}")?;
        }
        writeln!(dest)?;
        written += 1;
    }
    Ok(written)
}

/// Write the accumulated entries to `path`, truncating any existing
/// content. The destination is closed on return, also when this is an
/// interruption-triggered flush.
pub fn write_bibliography(path: &Path, entries: &[Entry], ignore: &IgnoreSet) -> Result<usize> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let written = write_entries(&mut writer, entries, ignore)?;
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Entry;

    fn entry(text: &str) -> Entry {
        Entry::from_text(text)
    }

    fn written(entries: &[Entry], ignore: &IgnoreSet) -> String {
        let mut buf = Vec::new();
        write_entries(&mut buf, entries, ignore).expect("write succeeds");
        String::from_utf8(buf).expect("utf8 output")
    }

    #[test]
    fn test_duplicate_keys_first_seen_wins() {
        let first = entry("@article{foo2020,\n  title = {First},\n}");
        let second = entry("@article{foo2020,\n  title = {Second},\n}");
        let out = written(&[first, second], &IgnoreSet::empty());
        assert!(out.contains("First"));
        assert!(!out.contains("Second"));
    }

    #[test]
    fn test_ignored_field_removed() {
        let ignore = IgnoreSet::from_fields(["pages"]);
        let e = entry("@article{a,\n  title = {T},\n  pages = {1--10},\n}");
        let out = written(&[e], &ignore);
        assert!(!out.contains("pages"));
        assert!(out.contains("title = {T}\n}"));
    }

    #[test]
    fn test_dangling_comma_stripped_once() {
        let ignore = IgnoreSet::from_fields(["pages"]);
        let e = entry("@article{a,\n  title = {T},\n  pages = {1--10},\n}");
        let filtered = filter_entry(&e, &ignore);
        assert_eq!(filtered.lines(), &["@article{a,", "  title = {T}", "}"]);
    }

    #[test]
    fn test_empty_ignore_set_writes_verbatim() {
        let e = entry("@article{a,\n  pages = {1--10},\n}");
        let out = written(std::slice::from_ref(&e), &IgnoreSet::empty());
        assert_eq!(out, "@article{a,\n  pages = {1--10},\n}\n\n");
    }

    #[test]
    fn test_field_matching_is_case_insensitive() {
        let ignore = IgnoreSet::from_fields(["URL"]);
        let e = entry("@misc{m,\n  url = {http://x},\n  note = {n},\n}");
        let out = written(&[e], &ignore);
        assert!(!out.contains("url"));
        assert!(out.contains("note"));
    }

    #[test]
    fn test_keyless_entries_always_written() {
        let a = entry("stray line one");
        let b = entry("stray line one");
        let out = written(&[a, b], &IgnoreSet::empty());
        assert_eq!(out.matches("stray line one").count(), 2);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let set = IgnoreSet::load(Path::new("/nonexistent/ignore")).expect("missing file ok");
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "pages\n\nISSN").expect("write fields");
        let set = IgnoreSet::load(file.path()).expect("load succeeds");
        assert!(set.contains("pages"));
        assert!(set.contains("issn"));
        assert!(!set.contains("title"));
    }
}
