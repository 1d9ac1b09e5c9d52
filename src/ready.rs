//! Readiness Conditions
//!
//! The configurable signals that decide when a submitted job has finished
//! rendering. Every strategy is bounded by the caller's timeout; none of
//! them waits forever.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::extract::looks_like_json_object;
use crate::page::Page;

/// How long to let the page settle after a readiness signal fires,
/// before reading content out of it.
const DEFAULT_SETTLE_MS: u64 = 500;

/// Poll interval for attribute payload checks
const ATTRIBUTE_POLL_MS: u64 = 250;

/// A condition that marks the page as done
#[derive(Debug, Clone, PartialEq)]
pub enum ReadyCondition {
    /// Wait a fixed duration and assume done
    Delay(Duration),
    /// Wait until a CSS selector matches, then settle briefly
    Selector { selector: String, settle_ms: u64 },
    /// Wait until an element with exactly this text appears, then settle
    Heading { text: String, settle_ms: u64 },
    /// Wait until N completed network requests match a URL pattern
    FetchCount { url_pattern: String, count: usize },
    /// Poll an element attribute until it holds a complete JSON object
    AttributePayload { selector: String, attribute: String },
}

impl FromStr for ReadyCondition {
    type Err = Error;

    /// Parse a strategy string:
    ///
    /// - `delay:<secs>`
    /// - `selector:<css>`
    /// - `heading:<text>`
    /// - `fetch-count:<url-pattern>=<n>`
    /// - `attribute:<css>@<attr>`
    fn from_str(s: &str) -> Result<Self> {
        let (kind, rest) = s.split_once(':').ok_or_else(|| {
            Error::Config(format!(
                "Invalid ready condition '{}': expected '<kind>:<value>'",
                s
            ))
        })?;

        match kind {
            "delay" => {
                let secs: f64 = rest.parse().map_err(|_| {
                    Error::Config(format!("Invalid delay '{}': expected seconds", rest))
                })?;
                if secs <= 0.0 {
                    return Err(Error::Config(format!(
                        "Invalid delay '{}': must be positive",
                        rest
                    )));
                }
                Ok(ReadyCondition::Delay(Duration::from_secs_f64(secs)))
            }
            "selector" => {
                if rest.is_empty() {
                    return Err(Error::Config("Empty selector in ready condition".into()));
                }
                Ok(ReadyCondition::Selector {
                    selector: rest.to_string(),
                    settle_ms: DEFAULT_SETTLE_MS,
                })
            }
            "heading" => {
                if rest.is_empty() {
                    return Err(Error::Config("Empty heading text in ready condition".into()));
                }
                Ok(ReadyCondition::Heading {
                    text: rest.to_string(),
                    settle_ms: DEFAULT_SETTLE_MS,
                })
            }
            "fetch-count" => {
                let (pattern, count) = rest.split_once('=').ok_or_else(|| {
                    Error::Config(format!(
                        "Invalid fetch-count '{}': expected '<pattern>=<n>'",
                        rest
                    ))
                })?;
                if pattern.is_empty() {
                    return Err(Error::Config("Empty URL pattern in fetch-count".into()));
                }
                let count: usize = count.parse().map_err(|_| {
                    Error::Config(format!("Invalid fetch-count '{}': bad count", rest))
                })?;
                if count == 0 {
                    return Err(Error::Config("fetch-count must be at least 1".into()));
                }
                Ok(ReadyCondition::FetchCount {
                    url_pattern: pattern.to_string(),
                    count,
                })
            }
            "attribute" => {
                let (selector, attribute) = rest.split_once('@').ok_or_else(|| {
                    Error::Config(format!(
                        "Invalid attribute condition '{}': expected '<css>@<attr>'",
                        rest
                    ))
                })?;
                if selector.is_empty() || attribute.is_empty() {
                    return Err(Error::Config(
                        "Attribute condition needs both a selector and an attribute".into(),
                    ));
                }
                Ok(ReadyCondition::AttributePayload {
                    selector: selector.to_string(),
                    attribute: attribute.to_string(),
                })
            }
            other => Err(Error::Config(format!(
                "Unknown ready condition kind '{}'",
                other
            ))),
        }
    }
}

impl ReadyCondition {
    /// Whether this condition needs network request capture enabled
    pub fn needs_request_capture(&self) -> bool {
        matches!(self, ReadyCondition::FetchCount { .. })
    }
}

/// Wait until the page satisfies the condition, bounded by `timeout`
pub async fn wait_ready(page: &Page, condition: &ReadyCondition, timeout: Duration) -> Result<()> {
    let timeout_ms = timeout.as_millis() as u64;

    match condition {
        ReadyCondition::Delay(duration) => {
            let wait = (*duration).min(timeout);
            tracing::debug!("Waiting fixed delay of {:?}", wait);
            tokio::time::sleep(wait).await;
            Ok(())
        }

        ReadyCondition::Selector {
            selector,
            settle_ms,
        } => {
            tracing::debug!("Waiting for selector '{}'", selector);
            page.wait_for(selector, timeout_ms).await?;
            settle(page, *settle_ms).await
        }

        ReadyCondition::Heading { text, settle_ms } => {
            tracing::debug!("Waiting for heading '{}'", text);
            page.wait_for_text(text, timeout_ms).await?;
            settle(page, *settle_ms).await
        }

        ReadyCondition::FetchCount { url_pattern, count } => {
            let log = page.request_log().ok_or_else(|| {
                Error::Network(
                    "fetch-count condition requires request capture to be enabled before submit"
                        .into(),
                )
            })?;
            tracing::debug!(
                "Waiting for {} completed requests matching '{}'",
                count,
                url_pattern
            );
            log.wait_for_count(url_pattern, *count, timeout_ms).await
        }

        ReadyCondition::AttributePayload {
            selector,
            attribute,
        } => {
            tracing::debug!("Polling '{}' attribute '{}'", selector, attribute);
            let start = std::time::Instant::now();

            loop {
                if let Ok(element) = page.find(selector).await {
                    if let Ok(Some(value)) = element.get_attribute(attribute).await {
                        // Entities don't affect the brace shape check
                        if looks_like_json_object(&value) {
                            return Ok(());
                        }
                    }
                }

                if start.elapsed() > timeout {
                    return Err(Error::Timeout(format!(
                        "Attribute '{}' on '{}' never held a complete payload within {}ms",
                        attribute, selector, timeout_ms
                    )));
                }

                tokio::time::sleep(Duration::from_millis(ATTRIBUTE_POLL_MS)).await;
            }
        }
    }
}

/// Post-signal settle: sleep then force a DOM round-trip
async fn settle(page: &Page, settle_ms: u64) -> Result<()> {
    if settle_ms > 0 {
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
    }
    page.sync_dom().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delay() {
        let cond: ReadyCondition = "delay:5".parse().unwrap();
        assert_eq!(cond, ReadyCondition::Delay(Duration::from_secs(5)));

        let cond: ReadyCondition = "delay:2.5".parse().unwrap();
        assert_eq!(cond, ReadyCondition::Delay(Duration::from_secs_f64(2.5)));
    }

    #[test]
    fn test_parse_selector() {
        let cond: ReadyCondition = "selector:div.result code".parse().unwrap();
        assert_eq!(
            cond,
            ReadyCondition::Selector {
                selector: "div.result code".to_string(),
                settle_ms: DEFAULT_SETTLE_MS,
            }
        );
    }

    #[test]
    fn test_parse_heading() {
        let cond: ReadyCondition = "heading:Raw JSON Output".parse().unwrap();
        assert_eq!(
            cond,
            ReadyCondition::Heading {
                text: "Raw JSON Output".to_string(),
                settle_ms: DEFAULT_SETTLE_MS,
            }
        );
    }

    #[test]
    fn test_parse_fetch_count() {
        let cond: ReadyCondition = "fetch-count:_stcore/stream=4".parse().unwrap();
        assert_eq!(
            cond,
            ReadyCondition::FetchCount {
                url_pattern: "_stcore/stream".to_string(),
                count: 4,
            }
        );
    }

    #[test]
    fn test_parse_attribute() {
        let cond: ReadyCondition = "attribute:button.copy@data-clipboard-text".parse().unwrap();
        assert_eq!(
            cond,
            ReadyCondition::AttributePayload {
                selector: "button.copy".to_string(),
                attribute: "data-clipboard-text".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<ReadyCondition>().is_err());
        assert!("delay".parse::<ReadyCondition>().is_err());
        assert!("delay:-1".parse::<ReadyCondition>().is_err());
        assert!("delay:abc".parse::<ReadyCondition>().is_err());
        assert!("selector:".parse::<ReadyCondition>().is_err());
        assert!("fetch-count:pattern".parse::<ReadyCondition>().is_err());
        assert!("fetch-count:pattern=0".parse::<ReadyCondition>().is_err());
        assert!("attribute:button".parse::<ReadyCondition>().is_err());
        assert!("mystery:thing".parse::<ReadyCondition>().is_err());
    }

    #[test]
    fn test_needs_request_capture() {
        let fetch: ReadyCondition = "fetch-count:api=2".parse().unwrap();
        assert!(fetch.needs_request_capture());

        let delay: ReadyCondition = "delay:1".parse().unwrap();
        assert!(!delay.needs_request_capture());
    }
}
