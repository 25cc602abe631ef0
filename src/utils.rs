//! Text normalization, word matching and URL helpers for the first-link resolver

use percent_encoding::percent_decode_str;
use url::Url;

use crate::tree::{NodeKind, NodeTree};
use crate::FirstLinkError;

/// Path prefix of links pointing to other articles of the same wiki
pub const ARTICLE_PATH_PREFIX: &str = "/wiki/";

/// Bracket pairs removed from paragraph text, processed in this order
pub const BRACKET_PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']')];

/// Build the URL of an article, e.g. `https://de.wikipedia.org/wiki/Comic`
pub fn article_url(lang: &str, article: &str) -> String {
    site_url(lang, &format!("{}{}", ARTICLE_PATH_PREFIX, article))
}

/// Build an absolute URL for a site-relative path on the wiki of a language
pub fn site_url(lang: &str, path: &str) -> String {
    format!("https://{}.wikipedia.org{}", lang, path)
}

/// Extract the language code of an article URL.
///
/// For `https://de.wikipedia.org/wiki/Whatever`, the language code is `de`.
pub fn extract_language(link: &str) -> Result<String, FirstLinkError> {
    let url = Url::parse(link)
        .map_err(|e| FirstLinkError::MalformedInput(format!("unable to parse URL {}: {}", link, e)))?;
    language_of(&url).map(str::to_string)
}

/// Language code of an already parsed article URL (the host up to its first dot)
pub fn language_of(url: &Url) -> Result<&str, FirstLinkError> {
    let host = url.host_str().unwrap_or_default();
    match host.find('.') {
        Some(dot) if dot > 0 => Ok(&host[..dot]),
        _ => Err(FirstLinkError::MalformedInput(format!(
            "{}: URL format must be https://[lang].wikipedia.org/",
            url
        ))),
    }
}

/// Resolve an article href against the page it was found on and percent-decode its path.
///
/// Returns `Ok(None)` for links into a namespace (`/wiki/File:Flag.svg`,
/// `/wiki/Category:Comics`) and for hrefs that aren't URLs at all.
pub fn sanitize_href(page_url: &Url, href: &str) -> Result<Option<String>, FirstLinkError> {
    let resolved = match page_url.join(href) {
        Ok(resolved) => resolved,
        Err(_) => return Ok(None),
    };
    let path = percent_decode_str(resolved.path())
        .decode_utf8()
        .map_err(|e| FirstLinkError::DecodeFailed {
            href: href.to_string(),
            reason: e.to_string(),
        })?;
    if path.contains(':') {
        return Ok(None);
    }
    Ok(Some(path.into_owned()))
}

/// Render the text below a node as a single line.
///
/// Text nodes are trimmed and joined by single spaces; `<style>` elements,
/// comments and doctypes are skipped.
pub fn render_text<T: NodeTree + ?Sized>(tree: &T, id: T::Id) -> String {
    let mut chunks = Vec::new();
    collect_text(tree, id, &mut chunks);
    chunks.join(" ")
}

fn collect_text<'t, T: NodeTree + ?Sized>(tree: &'t T, id: T::Id, chunks: &mut Vec<&'t str>) {
    for child in tree.children(id) {
        match tree.kind(child) {
            NodeKind::Text => {
                if let Some(text) = tree.text(child).map(str::trim).filter(|t| !t.is_empty()) {
                    chunks.push(text);
                }
            }
            NodeKind::Element if tree.tag(child) == Some("style") => {}
            NodeKind::Element | NodeKind::Document => collect_text(tree, child, chunks),
            NodeKind::Other => {}
        }
    }
}

/// Remove parenthesized and square-bracketed asides, including nested ones.
///
/// `"a (b (c) d) e"` becomes `"a  e"`. Brackets without a partner are left alone.
pub fn strip_bracketed_asides(text: &str) -> String {
    let mut text = text.to_string();
    for &(opening, closing) in BRACKET_PAIRS {
        while let Some((from, to)) = find_balanced_span(&text, opening, closing) {
            text.replace_range(from..=to, "");
        }
    }
    text
}

/// Byte range of the span from the first `opening` through its matching `closing`.
///
/// A `closing` ahead of the first `opening` marks the text as unbalanced.
fn find_balanced_span(text: &str, opening: char, closing: char) -> Option<(usize, usize)> {
    let from = text.find(opening)?;
    if text.find(closing).map_or(true, |to| to < from) {
        return None;
    }
    let mut depth = 0usize;
    for (offset, ch) in text[from..].char_indices() {
        if ch == opening {
            depth += 1;
        } else if ch == closing {
            depth -= 1;
            if depth == 0 {
                return Some((from, from + offset));
            }
        }
    }
    None
}

/// Check whether `needle` occurs as a contiguous run inside `haystack`.
///
/// An empty needle is contained in every haystack.
pub fn is_word_subsequence<W: PartialEq>(needle: &[W], haystack: &[W]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
