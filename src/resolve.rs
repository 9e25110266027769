//! Turning heterogeneous user inputs into canonical record identifiers.
//!
//! Each resolve operation prints one human-readable status line per item;
//! that output is part of the contract since it is what check mode shows
//! the user. Structured results are returned alongside so callers (and
//! tests) never parse the printed text.
//!
//! The extraction functions at the bottom encode the index's page grammar.
//! That grammar is undocumented and may drift; every extraction degrades
//! to zero results on unexpected input so partial results from other
//! inputs still materialize.

use crate::index::{Fetch, IndexUrls};
use crate::record::{self, RecordId};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// One user input, tagged by kind. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Author name or canonical author handle
    Author(String),
    /// Raw record identifier
    Key(String),
    /// Conference name
    Conference(String),
    /// Full-text search keyword
    Keyword(String),
    /// Raw `(name, year)` citation text, validated at resolve time
    Citation(String),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Author(v) => write!(f, "author={v}"),
            Query::Key(v) => write!(f, "key={v}"),
            Query::Conference(v) => write!(f, "conf={v}"),
            Query::Keyword(v) => write!(f, "keyword={v}"),
            Query::Citation(v) => write!(f, "citation={v}"),
        }
    }
}

/// Per-item resolution status, printed as interactive feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Ambiguous,
    Invalid,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::Ambiguous => "AMBIGUOUS",
            Status::Invalid => "INVALID",
        })
    }
}

/// The index's canonical identifier for a disambiguated author profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorHandle(String);

impl AuthorHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `name` already has the canonical handle shape: a path-like
    /// segment followed by a colon-qualified suffix, e.g. `k/Knuth:Donald_E`.
    pub fn is_canonical(name: &str) -> bool {
        static HANDLE_RE: OnceLock<Regex> = OnceLock::new();
        HANDLE_RE
            .get_or_init(|| Regex::new(r"^[^\s:]+/[^\s:]+:\S+$").expect("valid handle pattern"))
            .is_match(name)
    }
}

impl fmt::Display for AuthorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving one input into record identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: Status,
    pub ids: Vec<RecordId>,
}

impl Resolution {
    fn empty(status: Status) -> Self {
        Self { status, ids: Vec::new() }
    }
}

/// Outcome of resolving an author name into profile handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorResolution {
    pub status: Status,
    pub handles: Vec<AuthorHandle>,
}

/// Fetch a page, degrading every failure to `None` with a diagnostic so
/// the current sub-step yields zero results instead of aborting the run.
async fn fetch_optional<F: Fetch>(index: &F, url: crate::error::Result<Url>) -> Option<String> {
    let url = match url {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "cannot build endpoint URL");
            return None;
        }
    };
    match index.get(&url).await {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(url = %url, error = %e, "fetch failed");
            None
        }
    }
}

/// Resolve an author name into zero or more profile handles.
///
/// A name that already matches the canonical handle pattern is returned
/// as-is with zero remote calls. Ambiguity is reported, never silently
/// resolved: callers must not act on an `Ambiguous` result.
pub async fn resolve_author<F: Fetch>(
    index: &F,
    urls: &IndexUrls,
    name: &str,
) -> AuthorResolution {
    if AuthorHandle::is_canonical(name) {
        println!("author={name}: {}", Status::Ok);
        return AuthorResolution {
            status: Status::Ok,
            handles: vec![AuthorHandle::new(name)],
        };
    }

    let Some(body) = fetch_optional(index, urls.author_search(name)).await else {
        println!("author={name}: {}", Status::NotFound);
        return AuthorResolution { status: Status::NotFound, handles: Vec::new() };
    };

    let candidates = extract_author_handles(&body);
    match candidates.len() {
        0 => {
            println!("author={name}: {}", Status::NotFound);
            AuthorResolution { status: Status::NotFound, handles: Vec::new() }
        }
        1 => {
            let (handle, _) = &candidates[0];
            println!("author={name}: {} ({handle})", Status::Ok);
            AuthorResolution {
                status: Status::Ok,
                handles: vec![handle.clone()],
            }
        }
        n => {
            println!("author={name}: {} ({n} candidates)", Status::Ambiguous);
            for (handle, display) in &candidates {
                println!("  candidate: {display} ({handle})");
            }
            AuthorResolution {
                status: Status::Ambiguous,
                handles: candidates.into_iter().map(|(h, _)| h).collect(),
            }
        }
    }
}

/// Classify a raw record id as OK/NOT_FOUND via a fetch-and-check, then
/// return it as a singleton regardless, so the caller decides what to do
/// with a missing record.
pub async fn resolve_key<F: Fetch>(index: &F, urls: &IndexUrls, id: &str) -> Resolution {
    let record_id = RecordId::new(id);
    let found = match record::fetch_entries(index, urls, &record_id).await {
        Ok(entries) => !entries.is_empty(),
        Err(e) => {
            debug!(id, error = %e, "check fetch failed");
            false
        }
    };
    let status = if found { Status::Ok } else { Status::NotFound };
    println!("key={id}: {status}");
    Resolution { status, ids: vec![record_id] }
}

/// Resolve a conference name by walking its index page's "contents"
/// sub-pages and harvesting every record link on them. In check mode the
/// walk is skipped: the status reports existence of the index page only.
pub async fn resolve_conference<F: Fetch>(
    index: &F,
    urls: &IndexUrls,
    name: &str,
    check_only: bool,
) -> Resolution {
    let conf_url = urls.conference(name);
    let page_url = conf_url.as_ref().ok().cloned();
    let Some(body) = fetch_optional(index, conf_url).await else {
        println!("conf={name}: {}", Status::NotFound);
        return Resolution::empty(Status::NotFound);
    };

    if check_only {
        println!("conf={name}: {}", Status::Ok);
        return Resolution::empty(Status::Ok);
    }

    let mut ids = Vec::new();
    for href in extract_contents_links(&body) {
        // Contents links are relative to the conference page.
        let sub_url = page_url
            .as_ref()
            .and_then(|base| base.join(&href).ok())
            .ok_or_else(|| crate::error::BibgrabError::Parse(format!("bad contents link '{href}'")));
        if let Some(sub_page) = fetch_optional(index, sub_url).await {
            ids.extend(extract_record_ids(&sub_page));
        }
    }

    println!("conf={name}: {} ({} records)", Status::Ok, ids.len());
    Resolution { status: Status::Ok, ids }
}

/// Resolve a free-text keyword via the index's full-text search mirror.
pub async fn resolve_keyword<F: Fetch>(index: &F, urls: &IndexUrls, word: &str) -> Resolution {
    let Some(body) = fetch_optional(index, urls.search(word)).await else {
        println!("keyword={word}: {}", Status::NotFound);
        return Resolution::empty(Status::NotFound);
    };

    let ids = match extract_result_block(&body) {
        Some(block) => extract_record_ids(block),
        None => Vec::new(),
    };

    if ids.is_empty() {
        println!("keyword={word}: {}", Status::NotFound);
        Resolution::empty(Status::NotFound)
    } else {
        println!("keyword={word}: {} ({} records)", Status::Ok, ids.len());
        Resolution { status: Status::Ok, ids }
    }
}

fn citation_re() -> &'static Regex {
    static CITATION_RE: OnceLock<Regex> = OnceLock::new();
    CITATION_RE.get_or_init(|| {
        Regex::new(r"^\(\s*(?P<name>[^,()]+?)\s*,\s*(?P<year>\d{4})\s*\)$")
            .expect("valid citation pattern")
    })
}

/// Resolve a `(name, year)` citation: resolve the author, then harvest
/// record links from the year section of each handle's publication
/// listing. Identifiers are concatenated across handles in handle order.
pub async fn resolve_citation<F: Fetch>(index: &F, urls: &IndexUrls, raw: &str) -> Resolution {
    let Some(caps) = citation_re().captures(raw) else {
        // Report the raw input, never bindings from an earlier match.
        println!("citation={raw}: {} (expected \"(name, year)\")", Status::Invalid);
        return Resolution::empty(Status::Invalid);
    };
    let name = caps["name"].trim().to_string();
    let year = caps["year"].to_string();

    let authors = resolve_author(index, urls, &name).await;
    if authors.status != Status::Ok {
        println!("citation=({name}, {year}): {}", authors.status);
        return Resolution::empty(authors.status);
    }

    let mut ids = Vec::new();
    for handle in &authors.handles {
        let found = match fetch_optional(index, urls.author_years(handle.as_str())).await {
            Some(page) => match extract_year_section(&page, &year) {
                Some(section) => extract_record_ids(section),
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        let status = if found.is_empty() { Status::NotFound } else { Status::Ok };
        println!("citation=({name}, {year}): {status} [{handle}]");
        ids.extend(found);
    }

    let status = if ids.is_empty() { Status::NotFound } else { Status::Ok };
    Resolution { status, ids }
}

/// Every record identifier listed for an author handle.
pub async fn resolve_author_keys<F: Fetch>(
    index: &F,
    urls: &IndexUrls,
    handle: &AuthorHandle,
) -> Vec<RecordId> {
    match fetch_optional(index, urls.author_keys(handle.as_str())).await {
        Some(page) => extract_record_ids(&page),
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Page-grammar extraction
// ---------------------------------------------------------------------------

/// Candidate `(handle, display name)` pairs from an author-search
/// response: `<author urlpt="HANDLE">Name</author>` elements.
fn extract_author_handles(body: &str) -> Vec<(AuthorHandle, String)> {
    static AUTHOR_RE: OnceLock<Regex> = OnceLock::new();
    let re = AUTHOR_RE.get_or_init(|| {
        Regex::new(r#"<author[^>]*\burlpt="(?P<handle>[^"]+)"[^>]*>(?P<name>[^<]*)</author>"#)
            .expect("valid author pattern")
    });
    re.captures_iter(body)
        .map(|caps| {
            (
                AuthorHandle::new(&caps["handle"]),
                caps["name"].trim().to_string(),
            )
        })
        .collect()
}

/// Hrefs of "contents" sub-page links on a conference index page.
fn extract_contents_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|a| {
            a.text()
                .collect::<String>()
                .to_ascii_lowercase()
                .contains("contents")
        })
        .filter_map(|a| a.value().attr("href").map(str::to_string))
        .collect()
}

/// Record identifiers from every record link in `html`, in page order,
/// each id reported once.
fn extract_record_ids(html: &str) -> Vec<RecordId> {
    static REC_RE: OnceLock<Regex> = OnceLock::new();
    let re = REC_RE.get_or_init(|| {
        Regex::new(r##"href="[^"]*?/rec/(?:bibtex/)?(?P<key>[^"#?]+?)(?:\.html)?""##)
            .expect("valid record-link pattern")
    });
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for caps in re.captures_iter(html) {
        let key = &caps["key"];
        if seen.insert(key.to_string()) {
            ids.push(RecordId::new(key));
        }
    }
    ids
}

/// First result block of a full-text search response. The mirror's page
/// grammar is undocumented; this matches the list wrapper it currently
/// emits.
fn extract_result_block(html: &str) -> Option<&str> {
    let open = html.find("<ul class=\"result-list\"")?;
    let start = open + html[open..].find('>')? + 1;
    let end = start + html[start..].find("</ul>")?;
    Some(&html[start..end])
}

/// Slice of a publication listing between the table header for `year`
/// and the next table-header boundary (or end of page).
fn extract_year_section<'a>(html: &'a str, year: &str) -> Option<&'a str> {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    let re = HEADER_RE.get_or_init(|| {
        Regex::new(r"<th[^>]*>\s*(?P<year>\d{4})\s*</th>").expect("valid year-header pattern")
    });
    let mut start = None;
    for caps in re.captures_iter(html) {
        let whole = caps.get(0)?;
        if let Some(s) = start {
            return Some(&html[s..whole.start()]);
        }
        if &caps["year"] == year {
            start = Some(whole.end());
        }
    }
    start.map(|s| &html[s..])
}
