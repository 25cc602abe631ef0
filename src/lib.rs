//! # Firstlink
//!
//! Resolve the "first link" of Wikipedia articles and count how many hops it
//! takes to get from one article to another by always following it, as in the
//! "Getting to Philosophy" phenomenon.
//!
//! The first link of an article is the first link in its body paragraphs
//! (outside of tables such as infoboxes) whose text is quoted verbatim in the
//! surrounding paragraph once parenthesized and bracketed asides are removed.
//!
//! ## Example
//!
//! ```rust
//! use firstlink_rust::first_link_in_document;
//! use scraper::Html;
//! use url::Url;
//!
//! let html = r#"
//!     <p>Dilbert (<a href="/wiki/Englische_Sprache">englisch</a>) ist ein
//!     <a href="/wiki/Comic">Comic</a> von Scott Adams.</p>
//! "#;
//!
//! let document = Html::parse_document(html);
//! let page = Url::parse("https://de.wikipedia.org/wiki/Dilbert").unwrap();
//! assert_eq!(
//!     first_link_in_document(&document, &page).unwrap(),
//!     "https://de.wikipedia.org/wiki/Comic"
//! );
//! ```

use std::time::Duration;
use thiserror::Error;

mod batch;
mod hops;
mod records;
mod regexps;
mod resolver;
mod tree;
mod utils;

pub use batch::BatchRunner;

pub use hops::{CancelToken, HopCounter};

pub use records::{
    read_input_records, write_output_records, Outcome, TestInputRecord, TestOutputRecord,
};

pub use regexps::{article_name_from_url, is_language_code};

pub use resolver::{
    first_link_in_document, first_quoted_link, Fetch, FetchedPage, FirstLinkResolver,
    HttpFetcher, LinkSource,
};

pub use tree::{
    filter, filter_terminate, is_article_link, is_paragraph, is_table, NodeKind, NodeTree,
};

pub use utils::{
    article_url, extract_language, is_word_subsequence, language_of, render_text, sanitize_href,
    site_url, strip_bracketed_asides, ARTICLE_PATH_PREFIX,
};

/// Errors that can occur while resolving the first link of a single article
#[derive(Error, Debug)]
pub enum FirstLinkError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("HTTP client setup: {0}")]
    ClientSetup(String),
    #[error("get '{url}': {reason}")]
    FetchFailed { url: String, reason: String },
    #[error("parse HTML of {url}: {reason}")]
    ParseFailed { url: String, reason: String },
    #[error("error unescaping {href}: {reason}")]
    DecodeFailed { href: String, reason: String },
    #[error("unable to extract first link of {0}")]
    LinkNotFound(String),
}

/// Reasons a hop count ends without reaching the target article
#[derive(Error, Debug)]
pub enum HopCountError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("first link not found: find first link: {0}")]
    LinkResolution(#[source] FirstLinkError),
    #[error("loop detected: {path}")]
    LoopDetected { path: String },
    #[error("limit reached: stopped after {limit} hops without reaching target")]
    LimitReached { limit: u8 },
    #[error("cancelled after {hops} hops")]
    Cancelled { hops: u32 },
}

/// Errors reading or writing batch records
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("invalid outcome '{0}', expected success, failure or error: <cause>")]
    InvalidOutcome(String),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for resolving links and running hop count batches
#[derive(Debug, Clone)]
pub struct FirstLinkOptions {
    /// Maximum number of hops before giving up on reaching the target
    pub hop_limit: u8,
    /// Number of hop counts a batch runs at the same time
    pub concurrency: usize,
    /// Timeout for a single page request
    pub request_timeout: Duration,
    /// User agent sent with every page request
    pub user_agent: String,
    /// Cancel the traversals of a batch still running after this long
    pub batch_deadline: Option<Duration>,
}

impl Default for FirstLinkOptions {
    fn default() -> Self {
        Self {
            hop_limit: 20,
            concurrency: 8,
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("firstlink-rust/", env!("CARGO_PKG_VERSION")).to_string(),
            batch_deadline: None,
        }
    }
}
