//! First-link resolution: fetch an article and find the first link its body text quotes

use scraper::Html;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::tree::{filter, filter_terminate, is_article_link, is_paragraph, is_table, NodeTree};
use crate::utils::{
    is_word_subsequence, language_of, render_text, sanitize_href, site_url, strip_bracketed_asides,
};
use crate::{FirstLinkError, FirstLinkOptions};

/// Raw response to a page request
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used to download article pages
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedPage, FirstLinkError>;
}

/// Blocking HTTP transport.
///
/// Must be used from a thread that may block, i.e. outside of async tasks or
/// inside `tokio::task::spawn_blocking`.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(options: &FirstLinkOptions) -> Result<Self, FirstLinkError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FirstLinkError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, FirstLinkError> {
        let failed = |reason: String| FirstLinkError::FetchFailed {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| failed(format!("body read error: {}", e)))?;
        debug!(url, status, bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            status,
            body: body.to_vec(),
        })
    }
}

/// Anything that can tell the first link of an article URL
pub trait LinkSource: Send + Sync {
    fn first_link(&self, url: &str) -> Result<String, FirstLinkError>;
}

impl<S: LinkSource + ?Sized> LinkSource for &S {
    fn first_link(&self, url: &str) -> Result<String, FirstLinkError> {
        (**self).first_link(url)
    }
}

impl<S: LinkSource + ?Sized> LinkSource for Arc<S> {
    fn first_link(&self, url: &str) -> Result<String, FirstLinkError> {
        (**self).first_link(url)
    }
}

/// Fetches article pages and resolves their first link
pub struct FirstLinkResolver<F = HttpFetcher> {
    fetcher: F,
}

impl FirstLinkResolver<HttpFetcher> {
    /// Create a resolver that downloads pages over HTTP
    pub fn from_options(options: &FirstLinkOptions) -> Result<Self, FirstLinkError> {
        Ok(Self::new(HttpFetcher::new(options)?))
    }
}

impl<F: Fetch> FirstLinkResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Find the first link of the article behind `link`.
    ///
    /// The returned URL points to the same language's wiki as `link`.
    pub fn resolve(&self, link: &str) -> Result<String, FirstLinkError> {
        let page_url = Url::parse(link)
            .map_err(|e| FirstLinkError::MalformedInput(format!("unable to parse URL {}: {}", link, e)))?;
        // fail on malformed hosts before going to the network
        language_of(&page_url)?;

        let page = self.fetcher.fetch(page_url.as_str())?;
        if !page.is_success() {
            return Err(FirstLinkError::FetchFailed {
                url: link.to_string(),
                reason: format!("HTTP status {}", page.status),
            });
        }
        let html = std::str::from_utf8(&page.body).map_err(|e| FirstLinkError::ParseFailed {
            url: link.to_string(),
            reason: e.to_string(),
        })?;
        let document = Html::parse_document(html);
        first_link_in_document(&document, &page_url)
    }
}

impl<F: Fetch> LinkSource for FirstLinkResolver<F> {
    fn first_link(&self, url: &str) -> Result<String, FirstLinkError> {
        self.resolve(url)
    }
}

/// Find the first link of an already parsed article page.
///
/// Paragraphs are scanned in document order, skipping everything inside
/// tables (infoboxes). The first paragraph with a quoted, non-namespaced
/// article link decides the result.
pub fn first_link_in_document<T: NodeTree + ?Sized>(
    tree: &T,
    page_url: &Url,
) -> Result<String, FirstLinkError> {
    let lang = language_of(page_url)?;
    let paragraphs = filter_terminate(tree, tree.root(), is_table::<T>, is_paragraph::<T>);
    debug!(url = %page_url, paragraphs = paragraphs.len(), "scanning paragraphs");

    for paragraph in paragraphs {
        let Some(anchor) = first_quoted_link(tree, paragraph) else {
            continue;
        };
        let Some(href) = tree.attr(anchor, "href") else {
            continue;
        };
        match sanitize_href(page_url, href)? {
            Some(path) => return Ok(site_url(lang, &path)),
            None => debug!(href, "skipping namespaced link"),
        }
    }

    Err(FirstLinkError::LinkNotFound(page_url.to_string()))
}

/// The first article link of a paragraph whose visible text appears verbatim
/// in the paragraph text once bracketed asides are removed.
pub fn first_quoted_link<T: NodeTree + ?Sized>(tree: &T, paragraph: T::Id) -> Option<T::Id> {
    let anchors = filter(tree, paragraph, is_article_link::<T>);
    if anchors.is_empty() {
        return None;
    }

    let text = strip_bracketed_asides(&render_text(tree, paragraph));
    let paragraph_words: Vec<&str> = text.split_whitespace().collect();

    anchors.into_iter().find(|&anchor| {
        let name = render_text(tree, anchor);
        let link_words: Vec<&str> = name.split_whitespace().collect();
        !link_words.is_empty() && is_word_subsequence(&link_words, &paragraph_words)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn first_link(page: &str, html: &str) -> Result<String, FirstLinkError> {
        let document = Html::parse_document(html);
        first_link_in_document(&document, &Url::parse(page).unwrap())
    }

    #[test]
    fn test_first_link_of_simple_article() {
        let html = r#"<html><body>
            <p><b>Dilbert</b> ist ein <a href="/wiki/Comic">Comic</a> von
            <a href="/wiki/Scott_Adams">Scott Adams</a>.</p>
        </body></html>"#;
        assert_eq!(
            first_link("https://de.wikipedia.org/wiki/Dilbert", html).unwrap(),
            "https://de.wikipedia.org/wiki/Comic"
        );
    }

    #[test]
    fn test_links_in_parentheses_are_skipped() {
        let html = r#"<p>Dilbert (<a href="/wiki/English_language">English</a> for
            nothing) is a <a href="/wiki/Comic_strip">comic strip</a>.</p>"#;
        assert_eq!(
            first_link("https://en.wikipedia.org/wiki/Dilbert", html).unwrap(),
            "https://en.wikipedia.org/wiki/Comic_strip"
        );
    }

    #[test]
    fn test_reference_links_are_skipped() {
        let html = r#"<p>Cheese<sup><a href="/wiki/Cite">[1]</a></sup> is a
            <a href="/wiki/Dairy_product">dairy product</a>.</p>"#;
        assert_eq!(
            first_link("https://en.wikipedia.org/wiki/Cheese", html).unwrap(),
            "https://en.wikipedia.org/wiki/Dairy_product"
        );
    }

    #[test]
    fn test_infobox_paragraphs_are_skipped() {
        let html = r#"
            <table class="infobox"><tr><td><p>Capital: <a href="/wiki/Kigali">Kigali</a></p></td></tr></table>
            <p>Ruanda ist ein <a href="/wiki/Binnenstaat">Binnenstaat</a> in Ostafrika.</p>"#;
        assert_eq!(
            first_link("https://de.wikipedia.org/wiki/Ruanda", html).unwrap(),
            "https://de.wikipedia.org/wiki/Binnenstaat"
        );
    }

    #[test]
    fn test_paragraphs_without_article_links_are_skipped() {
        let html = r##"
            <p>Coordinates: <a href="https://geohack.example/x">46°N</a></p>
            <p>See <a href="#History">below</a>.</p>
            <p><a href="/wiki/Datei:Flag.svg"><img src="flag.svg"></a></p>
            <p>Zürich ist eine <a href="/wiki/Stadt">Stadt</a>.</p>"##;
        assert_eq!(
            first_link("https://de.wikipedia.org/wiki/Z%C3%BCrich", html).unwrap(),
            "https://de.wikipedia.org/wiki/Stadt"
        );
    }

    #[test]
    fn test_namespaced_winner_moves_on_to_next_paragraph() {
        let html = r#"
            <p><a href="/wiki/Fichier:Carte.png">Carte</a> de la <a href="/wiki/Ville">ville</a>.</p>
            <p>Le <a href="/wiki/Latin">latin</a> est une langue.</p>"#;
        assert_eq!(
            first_link("https://fr.wikipedia.org/wiki/Rome", html).unwrap(),
            "https://fr.wikipedia.org/wiki/Latin"
        );
    }

    #[test]
    fn test_first_link_is_percent_decoded() {
        let html = r#"<p>Clermont-Ferrand est une
            <a href="/wiki/Liste_des_communes_de_France_les_plus_peupl%C3%A9es" title="Liste des communes de France les plus peuplées">ville</a>
            du centre de la France.</p>"#;
        assert_eq!(
            first_link("https://fr.wikipedia.org/wiki/Clermont-Ferrand", html).unwrap(),
            "https://fr.wikipedia.org/wiki/Liste_des_communes_de_France_les_plus_peuplées"
        );
    }

    #[test]
    fn test_link_text_must_survive_bracket_removal() {
        let html = r#"<p>Ein <a href="/wiki/Spieltheorie">Spiel (Theorie)</a> ist ein
            <a href="/wiki/Modell">Modell</a>.</p>"#;
        assert_eq!(
            first_link("https://de.wikipedia.org/wiki/Nullsummenspiel", html).unwrap(),
            "https://de.wikipedia.org/wiki/Modell"
        );
    }

    #[test]
    fn test_styles_are_not_part_of_the_paragraph_text() {
        let html = r#"<p><style>.mw-parser-output .x{color:red}</style>Der
            <a href="/wiki/Staat">Staat</a> ist ein Begriff.</p>"#;
        assert_eq!(
            first_link("https://de.wikipedia.org/wiki/Binnenstaat", html).unwrap(),
            "https://de.wikipedia.org/wiki/Staat"
        );
    }

    #[test]
    fn test_no_link_found() {
        let html = "<p>An entity is something that exists.</p>";
        assert!(matches!(
            first_link("https://en.wikipedia.org/wiki/Entity", html),
            Err(FirstLinkError::LinkNotFound(_))
        ));
    }

    /// In-memory transport serving fixed pages
    struct FakeFetcher {
        pages: HashMap<String, FetchedPage>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_page(mut self, url: &str, status: u16, body: &[u8]) -> Self {
            self.pages.insert(url.to_string(), FetchedPage { status, body: body.to_vec() });
            self
        }
    }

    impl Fetch for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<FetchedPage, FirstLinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| FirstLinkError::FetchFailed {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_resolver_fetches_and_resolves() {
        let fetcher = FakeFetcher::new().with_page(
            "https://en.wikipedia.org/wiki/System",
            200,
            br#"<p>A system is a group of <a href="/wiki/Interaction">interacting</a> or
                <a href="/wiki/Interaction">interaction</a> elements.</p>"#,
        );
        let resolver = FirstLinkResolver::new(fetcher);
        assert_eq!(
            resolver.first_link("https://en.wikipedia.org/wiki/System").unwrap(),
            "https://en.wikipedia.org/wiki/Interaction"
        );
    }

    #[test]
    fn test_resolver_rejects_error_status() {
        let fetcher = FakeFetcher::new().with_page("https://en.wikipedia.org/wiki/Missing", 404, b"<p>gone</p>");
        let resolver = FirstLinkResolver::new(fetcher);
        let err = resolver.resolve("https://en.wikipedia.org/wiki/Missing").unwrap_err();
        assert!(matches!(err, FirstLinkError::FetchFailed { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_resolver_rejects_non_utf8_pages() {
        let fetcher = FakeFetcher::new().with_page("https://en.wikipedia.org/wiki/Latin1", 200, b"<p>caf\xe9</p>");
        let resolver = FirstLinkResolver::new(fetcher);
        assert!(matches!(
            resolver.resolve("https://en.wikipedia.org/wiki/Latin1"),
            Err(FirstLinkError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_resolver_reports_transport_errors() {
        let resolver = FirstLinkResolver::new(FakeFetcher::new());
        assert!(matches!(
            resolver.resolve("https://en.wikipedia.org/wiki/Offline"),
            Err(FirstLinkError::FetchFailed { .. })
        ));
    }

    #[test]
    fn test_resolver_checks_host_before_fetching() {
        let resolver = FirstLinkResolver::new(FakeFetcher::new());
        assert!(matches!(
            resolver.resolve("https://localhost/wiki/Comic"),
            Err(FirstLinkError::MalformedInput(_))
        ));
        assert_eq!(resolver.fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
