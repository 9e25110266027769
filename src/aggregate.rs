//! Driving resolution and fetching across all supplied inputs.
//!
//! Each input moves through resolve-then-fetch; the run as a whole moves
//! through Idle -> Resolving -> Fetching per item and ends in Done, or in
//! Interrupted when the cancellation token fires. Cancellation is
//! cooperative: the token is observed between fetches, never mid-call,
//! and whatever has accumulated is handed back for a best-effort flush.

use crate::error::Result;
use crate::index::{Fetch, IndexUrls};
use crate::record::{self, Entry, RecordId};
use crate::resolve::{self, Query, Status};
use std::collections::HashSet;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Immutable per-run configuration, passed explicitly instead of living
/// in ambient state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Validate inputs without fetching records
    pub check_only: bool,
    /// Report per-record diagnostics
    pub verbose: bool,
}

/// What a run produced and how it ended.
#[derive(Debug)]
pub struct RunOutcome {
    /// Accumulated entries, in fetch order; empty in check mode
    pub entries: Vec<Entry>,
    /// Whether the run was cut short by cancellation
    pub interrupted: bool,
}

/// Process every input in order: resolve it, then fetch each resulting
/// record sequentially, accumulating entries. Zero or ambiguous
/// resolutions and check mode skip the fetch phase for that input. A
/// record already fetched in this run is never fetched again.
pub async fn run<F: Fetch>(
    index: &F,
    urls: &IndexUrls,
    inputs: &[Query],
    options: RunOptions,
    cancel: &CancellationToken,
) -> RunOutcome {
    let mut entries: Vec<Entry> = Vec::new();
    let mut fetched: HashSet<RecordId> = HashSet::new();
    let mut interrupted = false;

    'inputs: for query in inputs {
        if cancel.is_cancelled() {
            interrupted = true;
            break;
        }

        let ids = match query {
            Query::Author(name) => {
                let authors = resolve::resolve_author(index, urls, name).await;
                if authors.status != Status::Ok || options.check_only {
                    continue;
                }
                let mut ids = Vec::new();
                for handle in &authors.handles {
                    if cancel.is_cancelled() {
                        interrupted = true;
                        break 'inputs;
                    }
                    ids.extend(resolve::resolve_author_keys(index, urls, handle).await);
                }
                ids
            }
            Query::Key(id) => resolve::resolve_key(index, urls, id).await.ids,
            Query::Conference(name) => {
                resolve::resolve_conference(index, urls, name, options.check_only)
                    .await
                    .ids
            }
            Query::Keyword(word) => resolve::resolve_keyword(index, urls, word).await.ids,
            Query::Citation(raw) => resolve::resolve_citation(index, urls, raw).await.ids,
        };

        if options.check_only || ids.is_empty() {
            continue;
        }

        let total = ids.len();
        for (i, id) in ids.iter().enumerate() {
            if cancel.is_cancelled() {
                interrupted = true;
                break 'inputs;
            }
            if !fetched.insert(id.clone()) {
                continue;
            }
            println!("  [{}/{total}] {id}", i + 1);
            match record::fetch_entries(index, urls, id).await {
                Ok(batch) => {
                    if batch.is_empty() && options.verbose {
                        println!("  no entry found for {id}");
                    }
                    entries.extend(batch);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "fetch failed, skipping record");
                }
            }
        }
    }

    RunOutcome { entries, interrupted }
}

/// Read and parse an input file. An unreadable file is the fatal case;
/// bad lines inside it are not.
pub fn parse_input_file(path: &Path) -> Result<Vec<Query>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_input_lines(&text))
}

/// Parse `key=value` input lines: `#` comments and blank lines are
/// skipped, unknown entries are reported and skipped.
pub fn parse_input_lines(text: &str) -> Vec<Query> {
    let mut queries = Vec::new();
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let query = match line.split_once('=') {
            Some(("author", v)) => Query::Author(v.trim().to_string()),
            Some(("key", v)) => Query::Key(v.trim().to_string()),
            Some(("conf", v)) => Query::Conference(v.trim().to_string()),
            Some(("keyword", v)) => Query::Keyword(v.trim().to_string()),
            Some(("citation", v)) => Query::Citation(v.trim().to_string()),
            _ => {
                println!("input line {}: {} ({line})", lineno + 1, Status::Invalid);
                continue;
            }
        };
        queries.push(query);
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_lines() {
        let text = "\
# bibliography sources
author=knuth

key=conf/icfp/Doe99
conf=icfp
citation=(doe, 1999)
keyword=parsing
";
        let queries = parse_input_lines(text);
        assert_eq!(
            queries,
            vec![
                Query::Author("knuth".into()),
                Query::Key("conf/icfp/Doe99".into()),
                Query::Conference("icfp".into()),
                Query::Citation("(doe, 1999)".into()),
                Query::Keyword("parsing".into()),
            ]
        );
    }

    #[test]
    fn test_invalid_line_skipped_not_fatal() {
        let queries = parse_input_lines("foo=bar\nauthor=doe\nplain text\n");
        assert_eq!(queries, vec![Query::Author("doe".into())]);
    }
}
