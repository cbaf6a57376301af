//! Status extraction from marketplace responses.
//!
//! The marketplace answers a profile request in one of two ways: it
//! redirects to its search page (nobody owns the handle) or it renders a
//! profile page with a status badge. The badge text is matched against a
//! closed set of three values; anything else is reported verbatim.

use crate::types::{CheckConfig, Handle, Outcome, DEFAULT_MARKETPLACE_URL};
use lazy_static::lazy_static;
use scraper::{Html, Selector};

/// CSS selector of the status badge on a profile page.
pub const STATUS_SELECTOR: &str = "span.tm-section-header-status";

lazy_static! {
    static ref STATUS_ELEMENT: Selector =
        Selector::parse(STATUS_SELECTOR).expect("status selector is valid CSS");
}

/// Classifies responses for one marketplace host.
#[derive(Debug, Clone)]
pub struct StatusExtractor {
    config: CheckConfig,
}

impl Default for StatusExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKETPLACE_URL)
    }
}

impl StatusExtractor {
    /// Extractor for the marketplace at `marketplace_url` (trailing slashes
    /// are ignored).
    pub fn new<U: Into<String>>(marketplace_url: U) -> Self {
        Self {
            config: CheckConfig::default().with_marketplace_url(marketplace_url),
        }
    }

    pub fn for_config(config: &CheckConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Decide the outcome for one response.
    ///
    /// 1. `final_url` equal to `<marketplace>/?query=<handle>` means Free.
    /// 2. A body that is not UTF-8 is a `ParseError`.
    /// 3. No status badge means `NotFound`.
    /// 4. Badge text (trimmed, lower-cased) of `sold`, `available` or `taken`
    ///    maps to that outcome; any other text is `UnknownStatus`.
    pub fn classify(&self, final_url: &str, body: &[u8], handle: &Handle) -> Outcome {
        if final_url == self.config.free_redirect_url(handle) {
            return Outcome::Free;
        }

        let html = match std::str::from_utf8(body) {
            Ok(html) => html,
            Err(e) => return Outcome::ParseError(format!("response is not valid UTF-8: {}", e)),
        };

        let document = Html::parse_document(html);
        let Some(element) = document.select(&STATUS_ELEMENT).next() else {
            return Outcome::NotFound;
        };

        let status = element.text().collect::<String>().trim().to_lowercase();
        match status.as_str() {
            "sold" => Outcome::Sold,
            "available" => Outcome::Available,
            "taken" => Outcome::Taken,
            _ => Outcome::UnknownStatus(status),
        }
    }
}

/// Classify against the default marketplace (`https://fragment.com`).
pub fn classify(final_url: &str, body: &[u8], handle: &Handle) -> Outcome {
    StatusExtractor::default().classify(final_url, body, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: &str) -> Vec<u8> {
        format!(
            r#"<html><body>
                <div class="tm-section-header">
                  <h2>@alice</h2>
                  <span class="tm-section-header-status tm-status-unavail">{}</span>
                </div>
              </body></html>"#,
            status
        )
        .into_bytes()
    }

    fn alice() -> Handle {
        Handle::parse("alice").unwrap()
    }

    const PROFILE_URL: &str = "https://fragment.com/username/alice";

    #[test]
    fn test_search_redirect_is_free() {
        let outcome = classify("https://fragment.com/?query=alice", b"", &alice());
        assert_eq!(outcome, Outcome::Free);
    }

    #[test]
    fn test_redirect_for_other_handle_is_not_free() {
        let outcome = classify("https://fragment.com/?query=bob", b"<html></html>", &alice());
        assert_eq!(outcome, Outcome::NotFound);
    }

    #[test]
    fn test_known_statuses_case_insensitive() {
        assert_eq!(classify(PROFILE_URL, &page("Taken"), &alice()), Outcome::Taken);
        assert_eq!(classify(PROFILE_URL, &page(" SOLD "), &alice()), Outcome::Sold);
        assert_eq!(
            classify(PROFILE_URL, &page("\n  Available\n"), &alice()),
            Outcome::Available
        );
    }

    #[test]
    fn test_unknown_status_keeps_text() {
        assert_eq!(
            classify(PROFILE_URL, &page("weird"), &alice()),
            Outcome::UnknownStatus("weird".to_string())
        );
        assert_eq!(
            classify(PROFILE_URL, &page("On Auction"), &alice()),
            Outcome::UnknownStatus("on auction".to_string())
        );
    }

    #[test]
    fn test_missing_status_element_is_not_found() {
        let body = b"<html><body><span class=\"other\">Taken</span></body></html>";
        assert_eq!(classify(PROFILE_URL, body, &alice()), Outcome::NotFound);
    }

    #[test]
    fn test_non_utf8_body_is_parse_error() {
        let body = [0x3c, 0x68, 0xff, 0xfe, 0x3e];
        assert!(matches!(
            classify(PROFILE_URL, &body, &alice()),
            Outcome::ParseError(_)
        ));
    }

    #[test]
    fn test_custom_marketplace_url() {
        let extractor = StatusExtractor::new("http://127.0.0.1:9000/");
        assert_eq!(
            extractor.classify("http://127.0.0.1:9000/?query=alice", b"", &alice()),
            Outcome::Free
        );
        // The default host no longer counts as a free redirect
        assert_eq!(
            extractor.classify("https://fragment.com/?query=alice", b"", &alice()),
            Outcome::NotFound
        );
    }
}
