//! Remote index contract: endpoint URLs and the HTTP fetch capability.
//!
//! Everything that depends on the index's URL scheme is concentrated
//! here; the page-grammar side of the contract lives in [`crate::resolve`]
//! and [`crate::record`]. The scheme is an external contract that may
//! break if the remote service changes its layout.

use crate::error::{BibgrabError, Result};
use std::time::Duration;
use url::Url;

/// Default publication index
pub const DEFAULT_BASE_URL: &str = "https://dblp.org";

/// User agent string for requests
const USER_AGENT: &str = "bibgrab/0.1";

/// Abstract remote-fetch capability.
///
/// Resolver and fetcher code is generic over this trait so the whole
/// pipeline can be exercised against fixture pages without a network.
pub trait Fetch {
    /// Retrieve the body of `url`, or fail with a transport error.
    fn get(&self, url: &Url) -> impl std::future::Future<Output = Result<String>>;
}

/// URL builders for every endpoint the pipeline touches.
#[derive(Debug, Clone)]
pub struct IndexUrls {
    base: Url,
}

impl IndexUrls {
    /// Build the endpoint table for `base` (a mirror override or the
    /// default index).
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| BibgrabError::Config(format!("invalid base URL '{base}': {e}")))?;
        // Joins below are relative to the base path.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    fn join(&self, rel: &str) -> Result<Url> {
        self.base
            .join(rel)
            .map_err(|e| BibgrabError::Config(format!("invalid endpoint path '{rel}': {e}")))
    }

    /// Author search by (possibly ambiguous) name.
    pub fn author_search(&self, name: &str) -> Result<Url> {
        let mut url = self.join("search/author")?;
        url.query_pairs_mut().append_pair("xauthor", name);
        Ok(url)
    }

    /// Full record-key listing for a disambiguated author handle.
    pub fn author_keys(&self, handle: &str) -> Result<Url> {
        self.join(&format!("pers/tr/{handle}"))
    }

    /// Publication-by-year listing page for an author handle.
    pub fn author_years(&self, handle: &str) -> Result<Url> {
        self.join(&format!("pers/hd/{handle}"))
    }

    /// Record-by-id page; `path` is the id with any namespace prefix
    /// already stripped.
    pub fn record(&self, path: &str) -> Result<Url> {
        self.join(&format!("rec/bibtex/{path}"))
    }

    /// Conference index page.
    pub fn conference(&self, name: &str) -> Result<Url> {
        self.join(&format!("db/conf/{name}/"))
    }

    /// Full-text search mirror.
    pub fn search(&self, word: &str) -> Result<Url> {
        let mut url = self.join("search/publ")?;
        url.query_pairs_mut().append_pair("q", word);
        Ok(url)
    }
}

/// `reqwest`-backed index access.
pub struct HttpIndex {
    client: reqwest::Client,
}

impl HttpIndex {
    /// Build the HTTP client used for every request of the run.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BibgrabError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpIndex {
    async fn get(&self, url: &Url) -> Result<String> {
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BibgrabError::Remote {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }
        response.text().await.map_err(BibgrabError::Network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_search_url() {
        let urls = IndexUrls::new("https://index.test").expect("valid base");
        let url = urls.author_search("don knuth").expect("valid url");
        assert!(url.as_str().starts_with("https://index.test/search/author?"));
        assert!(url.as_str().contains("xauthor=don+knuth"));
    }

    #[test]
    fn test_record_url_keeps_slashes() {
        let urls = IndexUrls::new("https://index.test/").expect("valid base");
        let url = urls.record("conf/icfp/Doe99").expect("valid url");
        assert_eq!(url.as_str(), "https://index.test/rec/bibtex/conf/icfp/Doe99");
    }

    #[test]
    fn test_mirror_with_subpath() {
        let urls = IndexUrls::new("https://mirror.test/dblp").expect("valid base");
        let url = urls.conference("icfp").expect("valid url");
        assert_eq!(url.as_str(), "https://mirror.test/dblp/db/conf/icfp/");
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(IndexUrls::new("not a url").is_err());
    }
}
