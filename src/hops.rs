//! Hop counting: follow first links from a source article until the target shows up

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::regexps::{article_name_from_url, is_language_code};
use crate::resolver::LinkSource;
use crate::utils::article_url;
use crate::HopCountError;

/// Shared flag for stopping running traversals.
///
/// Traversals check it before every hop, so a cancelled hop count stops as
/// soon as its current page request returns. A child token is cancelled
/// together with its parent, but cancelling the child leaves the parent alone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token that also reports cancellation of `self`
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::default(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().map_or(false, |parent| parent.is_cancelled())
    }
}

/// Counts the first-link hops between two articles of the same wiki
pub struct HopCounter<S> {
    links: S,
    limit: u8,
    cancel: CancelToken,
}

impl<S: LinkSource> HopCounter<S> {
    pub fn new(links: S, limit: u8) -> Self {
        Self {
            links,
            limit,
            cancel: CancelToken::new(),
        }
    }

    /// Stop counting once the given token is cancelled
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Count the hops from `source` to `target`.
    ///
    /// The target itself is never requested: reaching it is the hop that
    /// returns it as a first link. Revisiting an article ends the count with
    /// the path of the loop, and so does running out of hops.
    pub fn count(&self, lang: &str, source: &str, target: &str) -> Result<u32, HopCountError> {
        if !is_language_code(lang) {
            return Err(HopCountError::MalformedInput(format!(
                "'{}' is not a language code",
                lang
            )));
        }
        if source.is_empty() || target.is_empty() {
            return Err(HopCountError::MalformedInput(
                "source and target article must not be empty".to_string(),
            ));
        }

        let target_url = article_url(lang, target);
        let mut current = article_url(lang, source);
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for hops in 0..u32::from(self.limit) {
            if self.cancel.is_cancelled() {
                return Err(HopCountError::Cancelled { hops });
            }
            visited.insert(current.clone());
            path.push(current.clone());

            let next = self
                .links
                .first_link(&current)
                .map_err(HopCountError::LinkResolution)?;
            debug!(hop = hops + 1, from = %current, to = %next, "followed first link");

            if visited.contains(&next) {
                path.push(next);
                return Err(HopCountError::LoopDetected {
                    path: display_path(&path),
                });
            }
            if next == target_url {
                return Ok(hops + 1);
            }
            current = next;
        }

        Err(HopCountError::LimitReached { limit: self.limit })
    }
}

/// Join article names (or the raw URLs of non-article pages) with arrows
fn display_path(path: &[String]) -> String {
    path.iter()
        .map(|url| article_name_from_url(url).unwrap_or(url))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FirstLinkError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Resolves first links from a fixed article graph and records every request
    struct ArticleGraph {
        links: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl ArticleGraph {
        fn new(lang: &str, edges: &[(&str, &str)]) -> Self {
            Self {
                links: edges
                    .iter()
                    .map(|(from, to)| (article_url(lang, from), article_url(lang, to)))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl LinkSource for ArticleGraph {
        fn first_link(&self, url: &str) -> Result<String, FirstLinkError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.links
                .get(url)
                .cloned()
                .ok_or_else(|| FirstLinkError::LinkNotFound(url.to_string()))
        }
    }

    #[test]
    fn test_chain_reaches_target() {
        let graph = ArticleGraph::new("en", &[("A", "B"), ("B", "C")]);
        let counter = HopCounter::new(&graph, 5);
        assert_eq!(counter.count("en", "A", "C").unwrap(), 2);
    }

    #[test]
    fn test_target_is_never_requested() {
        let graph = ArticleGraph::new("de", &[("Dilbert", "Comic")]);
        assert_eq!(HopCounter::new(&graph, 20).count("de", "Dilbert", "Comic").unwrap(), 1);
        assert_eq!(graph.requested(), vec![article_url("de", "Dilbert")]);
    }

    #[test]
    fn test_loop_is_reported_with_path() {
        let graph = ArticleGraph::new("en", &[("A", "B"), ("B", "A")]);
        let err = HopCounter::new(&graph, 5).count("en", "A", "C").unwrap_err();
        match err {
            HopCountError::LoopDetected { path } => assert_eq!(path, "A -> B -> A"),
            other => panic!("expected a loop, got {:?}", other),
        }
    }

    #[test]
    fn test_three_cycle_after_lead_in() {
        let graph = ArticleGraph::new(
            "de",
            &[("Edelmetall", "Metall"), ("Metall", "Element"), ("Element", "Stoff"), ("Stoff", "Metall")],
        );
        let err = HopCounter::new(&graph, 20).count("de", "Edelmetall", "Philosophie").unwrap_err();
        assert_eq!(
            err.to_string(),
            "loop detected: Edelmetall -> Metall -> Element -> Stoff -> Metall"
        );
    }

    #[test]
    fn test_loop_path_falls_back_to_raw_urls() {
        let mut graph = ArticleGraph::new("en", &[("A", "B")]);
        graph.links.insert(article_url("en", "B"), "https://example.org/portal".to_string());
        graph.links.insert("https://example.org/portal".to_string(), article_url("en", "B"));
        let err = HopCounter::new(&graph, 10).count("en", "A", "Z").unwrap_err();
        assert_eq!(
            err.to_string(),
            "loop detected: A -> B -> https://example.org/portal -> B"
        );
    }

    #[test]
    fn test_limit_reached() {
        let graph = ArticleGraph::new("en", &[("A", "B"), ("B", "C"), ("C", "D")]);
        let err = HopCounter::new(&graph, 2).count("en", "A", "D").unwrap_err();
        assert!(matches!(err, HopCountError::LimitReached { limit: 2 }));
        assert_eq!(graph.requested().len(), 2);
    }

    #[test]
    fn test_zero_limit_never_requests() {
        let graph = ArticleGraph::new("en", &[("A", "B")]);
        let err = HopCounter::new(&graph, 0).count("en", "A", "B").unwrap_err();
        assert!(matches!(err, HopCountError::LimitReached { limit: 0 }));
        assert!(graph.requested().is_empty());
    }

    #[test]
    fn test_resolution_failure_ends_the_count() {
        let graph = ArticleGraph::new("en", &[("Cheese", "Milk")]);
        let err = HopCounter::new(&graph, 20).count("en", "Cheese", "Philosophy").unwrap_err();
        assert!(matches!(
            err,
            HopCountError::LinkResolution(FirstLinkError::LinkNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_input() {
        let graph = ArticleGraph::new("en", &[("A", "B")]);
        let counter = HopCounter::new(&graph, 5);
        assert!(matches!(counter.count("EN", "A", "B"), Err(HopCountError::MalformedInput(_))));
        assert!(matches!(counter.count("en.wiki", "A", "B"), Err(HopCountError::MalformedInput(_))));
        assert!(matches!(counter.count("en", "", "B"), Err(HopCountError::MalformedInput(_))));
        assert!(graph.requested().is_empty());
    }

    #[test]
    fn test_cancelled_count_stops_before_next_hop() {
        let graph = ArticleGraph::new("en", &[("A", "B"), ("B", "C")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = HopCounter::new(&graph, 5)
            .with_cancel(cancel.clone())
            .count("en", "A", "C")
            .unwrap_err();
        assert!(matches!(err, HopCountError::Cancelled { hops: 0 }));
        assert!(graph.requested().is_empty());
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_child_token_follows_its_parent_only() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        assert!(!other.is_cancelled());
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
