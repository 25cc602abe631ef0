//! Regular expressions used by the first-link resolver and the hop counter

use regex::Regex;
use std::sync::OnceLock;

/// Patterns for recognizing article URLs and their parts
pub struct FirstLinkRegexps {
    pub article_url: Regex,
    pub language_code: Regex,
}

impl FirstLinkRegexps {
    pub fn new() -> Self {
        Self {
            article_url: Regex::new(
                r"^https://[a-z]+(?:-[a-z]+)*\.wikipedia\.org/wiki/(.+)$"
            ).unwrap(),

            language_code: Regex::new(
                r"^[a-z]+(?:-[a-z]+)*$"
            ).unwrap(),
        }
    }
}

impl Default for FirstLinkRegexps {
    fn default() -> Self {
        Self::new()
    }
}

/// Global instance of the resolver regexps
static REGEXPS: OnceLock<FirstLinkRegexps> = OnceLock::new();

/// Get the global regexps instance
pub fn get_regexps() -> &'static FirstLinkRegexps {
    REGEXPS.get_or_init(FirstLinkRegexps::new)
}

/// Extract the article name from an article URL.
///
/// `https://en.wikipedia.org/wiki/Computer` yields `Computer`.
pub fn article_name_from_url(url: &str) -> Option<&str> {
    get_regexps()
        .article_url
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// Check if a string looks like a wiki language code such as `de`, `als` or `zh-yue`
pub fn is_language_code(text: &str) -> bool {
    get_regexps().language_code.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_name_from_url() {
        let cases = [
            ("https://de.wikipedia.org/wiki/Weck,_Worscht_un_Woi", "Weck,_Worscht_un_Woi"),
            ("https://en.wikipedia.org/wiki/Farallón_Negro", "Farallón_Negro"),
            ("https://fr.wikipedia.org/wiki/Augusta_de_Saxe-Weimar-Eisenach", "Augusta_de_Saxe-Weimar-Eisenach"),
            ("https://ru.wikipedia.org/wiki/Яффе,_Лев_Борисович", "Яффе,_Лев_Борисович"),
        ];
        for (input, expected) in cases {
            assert_eq!(article_name_from_url(input), Some(expected));
        }
    }

    #[test]
    fn test_article_name_from_foreign_url() {
        assert_eq!(article_name_from_url("https://example.org/wiki/Comic"), None);
        assert_eq!(article_name_from_url("https://en.wikipedia.org/w/index.php"), None);
    }

    #[test]
    fn test_language_code() {
        assert!(is_language_code("de"));
        assert!(is_language_code("als"));
        assert!(is_language_code("zh-yue"));
        assert!(!is_language_code("DE"));
        assert!(!is_language_code("-de"));
        assert!(!is_language_code("de.wikipedia"));
        assert!(!is_language_code(""));
    }
}
