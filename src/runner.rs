//! Submit-and-Extract Runner
//!
//! Drives the full flow: launch browser, open the app, paste the input,
//! submit, wait for the configured readiness signal, extract the payload,
//! and validate it. The browser is closed best-effort on every path.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::extract::{self, is_valid_json, ExtractionSource};
use crate::fetch::ContentFetcher;
use crate::page::Page;
use crate::ready::{wait_ready, ReadyCondition};
use crate::BrowserConfig;

/// Default selectors tried, in order, for the text input widget
const DEFAULT_INPUT_SELECTORS: &[&str] = &["textarea", "input[type='text']", "[contenteditable]"];

/// Default selectors tried, in order, for the submit control
const DEFAULT_SUBMIT_SELECTORS: &[&str] = &["button[kind='primary']", "button[type='submit']", "button"];

/// Where the input text comes from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Literal text supplied by the caller
    Text(String),
    /// Text fetched over HTTP before the run starts
    FetchUrl(String),
}

/// Configuration for one submit-and-extract run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// URL of the web app to drive
    pub app_url: String,
    /// The text to submit
    pub input: InputSource,
    /// Selectors tried for the input widget
    pub input_selectors: Vec<String>,
    /// Selectors tried for the submit control
    pub submit_selectors: Vec<String>,
    /// When to consider the job done
    pub ready: ReadyCondition,
    /// Where to read the payload from
    pub extraction: ExtractionSource,
    /// Overall bound on the post-submit wait
    pub timeout: Duration,
    /// Browser launch options
    pub browser: BrowserConfig,
    /// Save a screenshot here when the run fails
    pub screenshot_on_failure: Option<PathBuf>,
}

impl RunConfig {
    /// A config with the default selector fallback chains
    pub fn new(app_url: impl Into<String>, input: InputSource, ready: ReadyCondition) -> Self {
        Self {
            app_url: app_url.into(),
            input,
            input_selectors: DEFAULT_INPUT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            submit_selectors: DEFAULT_SUBMIT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ready,
            extraction: ExtractionSource::AfterHeading {
                text: "Raw JSON Output".to_string(),
            },
            timeout: Duration::from_secs(60),
            browser: BrowserConfig::default(),
            screenshot_on_failure: None,
        }
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The extracted payload, entity-decoded
    pub payload: String,
    /// Length of the payload in characters
    pub char_count: usize,
    /// Whether the payload parses as JSON
    pub valid_json: bool,
    /// Wall-clock time from submit to extraction
    pub wait_elapsed: Duration,
    /// Wall-clock time for the whole run, launch included
    pub total_elapsed: Duration,
    /// Per-step timeline: offset from run start, step description
    pub steps: Vec<(Duration, String)>,
}

/// Execute one run. Launches a browser, drives the app, and always makes a
/// best-effort attempt to close the browser before returning.
pub async fn run(config: &RunConfig) -> Result<RunReport> {
    let total_start = Instant::now();
    let mut steps: Vec<(Duration, String)> = Vec::new();

    // Resolve the input before paying for a browser launch
    let text = resolve_input(&config.input).await?;
    if text.trim().is_empty() {
        return Err(Error::Config("Input text is empty".into()));
    }
    tracing::info!("Input resolved: {} chars", text.len());
    mark(&mut steps, total_start, format!("input resolved ({} chars)", text.len()));

    let browser = Browser::launch_with_config(config.browser.clone()).await?;
    mark(&mut steps, total_start, "browser launched".into());

    let outcome = drive(&browser, config, &text, total_start, steps).await;

    if let Err(err) = &outcome {
        tracing::error!("Run failed: {}", err);
    }

    if let Err(close_err) = browser.close().await {
        tracing::warn!("Browser close failed: {}", close_err);
    }

    outcome
}

/// The browser-side portion of the run, separated so the caller can close
/// the browser on every exit path.
async fn drive(
    browser: &Browser,
    config: &RunConfig,
    text: &str,
    total_start: Instant,
    steps: Vec<(Duration, String)>,
) -> Result<RunReport> {
    let page = browser.new_page(&config.app_url).await?;

    let result = drive_page(&page, config, text, total_start, steps).await;

    if result.is_err() {
        if let Some(path) = &config.screenshot_on_failure {
            match page.screenshot().await {
                Ok(png) => {
                    if let Err(e) = std::fs::write(path, png) {
                        tracing::warn!("Could not write failure screenshot: {}", e);
                    } else {
                        tracing::info!("Failure screenshot saved to {}", path.display());
                    }
                }
                Err(e) => tracing::warn!("Could not capture failure screenshot: {}", e),
            }
        } else if config.browser.debug_dir.is_some() {
            match page.debug_screenshot("run-failure").await {
                Ok(filename) => tracing::info!("Failure screenshot saved to {}", filename),
                Err(e) => tracing::warn!("Could not capture failure screenshot: {}", e),
            }
        }
    }

    result
}

async fn drive_page(
    page: &Page,
    config: &RunConfig,
    text: &str,
    total_start: Instant,
    mut steps: Vec<(Duration, String)>,
) -> Result<RunReport> {
    tracing::info!("Opening {}", config.app_url);
    page.wait_for_navigation().await?;
    mark(&mut steps, total_start, "page loaded".into());

    // Capture must be on before the submit click, or early requests are lost
    if config.ready.needs_request_capture() {
        page.enable_request_capture().await?;
        tracing::debug!("Request capture enabled");
        mark(&mut steps, total_start, "request capture enabled".into());
    }

    // The form may be rendered client-side well after readyState goes
    // complete, so both lookups are bounded waits, not one-shot queries.
    let form_timeout_ms = config.timeout.as_millis() as u64;

    let input_selectors: Vec<&str> = config.input_selectors.iter().map(|s| s.as_str()).collect();
    let input = page.wait_for_any(&input_selectors, form_timeout_ms).await?;
    input.type_text(text).await?;
    tracing::info!("Input text entered");
    mark(&mut steps, total_start, "input text entered".into());

    let submit_selectors: Vec<&str> = config.submit_selectors.iter().map(|s| s.as_str()).collect();
    let submit = page.wait_for_any(&submit_selectors, form_timeout_ms).await?;
    submit.click().await?;
    tracing::info!("Submitted");
    mark(&mut steps, total_start, "submitted".into());

    let wait_start = Instant::now();
    wait_ready(page, &config.ready, config.timeout).await?;
    let wait_elapsed = wait_start.elapsed();
    tracing::info!("Page ready after {:?}", wait_elapsed);
    mark(&mut steps, total_start, "ready signal observed".into());

    let payload = extract::extract(page, &config.extraction).await?;
    let valid_json = is_valid_json(&payload);
    let char_count = payload.chars().count();

    tracing::info!(
        "Extracted {} chars, valid JSON: {}",
        char_count,
        valid_json
    );
    mark(
        &mut steps,
        total_start,
        format!("extracted {} chars", char_count),
    );

    Ok(RunReport {
        payload,
        char_count,
        valid_json,
        wait_elapsed,
        total_elapsed: total_start.elapsed(),
        steps,
    })
}

/// Append a timestamped entry to the step timeline
fn mark(steps: &mut Vec<(Duration, String)>, start: Instant, message: String) {
    steps.push((start.elapsed(), message));
}

async fn resolve_input(input: &InputSource) -> Result<String> {
    match input {
        InputSource::Text(text) => Ok(text.clone()),
        InputSource::FetchUrl(url) => {
            let fetcher = ContentFetcher::new()?;
            fetcher.fetch_main_content(url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::new(
            "https://app.example",
            InputSource::Text("hello".into()),
            ReadyCondition::Delay(Duration::from_secs(1)),
        );

        assert!(config.input_selectors.contains(&"textarea".to_string()));
        assert!(!config.submit_selectors.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.browser.headless);
    }

    #[test]
    fn test_step_timeline_is_ordered() {
        let start = Instant::now();
        let mut steps = Vec::new();

        mark(&mut steps, start, "first".into());
        mark(&mut steps, start, "second".into());
        mark(&mut steps, start, "third".into());

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].1, "first");
        assert!(steps.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_resolve_literal_input() {
        let text = resolve_input(&InputSource::Text("the input".into()))
            .await
            .expect("literal input resolves");
        assert_eq!(text, "the input");
    }
}
