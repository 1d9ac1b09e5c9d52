//! Plain HTTP Fetching
//!
//! Fetches input text over HTTP without a browser, for the case where the
//! text to submit lives at a URL rather than on the command line. Sends
//! browser-like headers so ordinary content hosts serve the same page a
//! person would see.

use scraper::{Html, Selector};

use crate::error::{Error, Result};
use crate::headers::{browser_headers, random_user_agent};

/// Content selectors tried in priority order when reducing a fetched page
/// to its main text. Falls through to `body` when nothing else matches.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "#content",
    ".content",
    ".post-content",
];

/// HTTP client for fetching input documents
pub struct ContentFetcher {
    client: reqwest::Client,
}

impl ContentFetcher {
    /// Create a fetcher with sane timeouts and redirect limits
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .build()
            .map_err(|e| Error::fetch("client", e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch a URL and return the response body as text
    ///
    /// Only http and https URLs are accepted. Non-success statuses are
    /// errors; an empty 200 is returned as-is.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).map_err(|e| Error::fetch(url, e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::fetch(
                    url,
                    format!("unsupported URL scheme '{}'", other),
                ));
            }
        }

        tracing::debug!("Fetching {}", url);

        let mut request = self
            .client
            .get(parsed)
            .header("User-Agent", random_user_agent());
        for (name, value) in browser_headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP status {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))
    }

    /// Fetch a URL and reduce it to its main text content
    ///
    /// HTML responses go through `extract_main_content`; anything else is
    /// returned verbatim (plain text inputs are common).
    pub async fn fetch_main_content(&self, url: &str) -> Result<String> {
        let body = self.fetch_text(url).await?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            Ok(extract_main_content(&body))
        } else {
            Ok(body)
        }
    }
}

/// Extract the main readable text from an HTML document
///
/// Tries semantic content containers in priority order and falls back to
/// the whole body text.
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element.text().collect::<Vec<_>>().join(" ");
                let text = normalize_whitespace(&text);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }

    // Fall back to the whole body
    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            let text = body.text().collect::<Vec<_>>().join(" ");
            return normalize_whitespace(&text);
        }
    }

    String::new()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_article() {
        let html = r#"
            <html><body>
                <nav>Navigation junk</nav>
                <article>The real content here.</article>
                <footer>Footer junk</footer>
            </body></html>
        "#;

        let content = extract_main_content(html);
        assert_eq!(content, "The real content here.");
    }

    #[test]
    fn test_extract_tries_main_before_body() {
        let html = r#"
            <html><body>
                <div>Sidebar</div>
                <main>Primary text</main>
            </body></html>
        "#;

        let content = extract_main_content(html);
        assert_eq!(content, "Primary text");
    }

    #[test]
    fn test_extract_falls_back_to_body() {
        let html = "<html><body><p>Just a paragraph.</p></body></html>";

        let content = extract_main_content(html);
        assert_eq!(content, "Just a paragraph.");
    }

    #[test]
    fn test_extract_normalizes_whitespace() {
        let html = "<html><body><article>  spaced \n\n   out  </article></body></html>";

        let content = extract_main_content(html);
        assert_eq!(content, "spaced out");
    }

    #[test]
    fn test_extract_skips_empty_containers() {
        let html = r#"
            <html><body>
                <article>   </article>
                <main>Fallback wins</main>
            </body></html>
        "#;

        let content = extract_main_content(html);
        assert_eq!(content, "Fallback wins");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let fetcher = ContentFetcher::new().expect("client builds");
        let err = fetcher.fetch_text("file:///etc/passwd").await.unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
