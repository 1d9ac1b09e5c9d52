//! # Jackdaw
//!
//! Headless-browser automation for submit-and-extract workflows: paste text
//! into a web app, wait for the app to finish rendering its result, and pull
//! the JSON payload back out.
//!
//! The browser side is a minimal hand-rolled CDP (Chrome DevTools Protocol)
//! client over a raw WebSocket. On top of that sit configurable readiness
//! conditions (fixed delay, selector, result heading, network request count,
//! attribute payload polling) and extraction helpers that decode HTML
//! entities and validate the result as JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use jackdaw::{run, InputSource, ReadyCondition, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> jackdaw::Result<()> {
//!     let config = RunConfig::new(
//!         "https://chunker.example.app",
//!         InputSource::Text("The text to split into chunks.".into()),
//!         ReadyCondition::Heading {
//!             text: "Raw JSON Output".into(),
//!             settle_ms: 500,
//!         },
//!     );
//!
//!     let report = run(&config).await?;
//!     println!("{} chars, valid JSON: {}", report.char_count, report.valid_json);
//!     Ok(())
//! }
//! ```
//!
//! ## Driving the browser directly
//!
//! ```rust,no_run
//! use jackdaw::Browser;
//!
//! # #[tokio::main]
//! # async fn main() -> jackdaw::Result<()> {
//! let browser = Browser::launch().await?;
//! let page = browser.new_page("https://example.com").await?;
//!
//! page.wait_for_navigation().await?;
//! page.type_into("textarea", "hello").await?;
//! page.click("button[type='submit']").await?;
//!
//! browser.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod cdp;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod headers;
pub mod network;
pub mod page;
pub mod ready;
pub mod runner;

pub use browser::Browser;
pub use error::{Error, Result};
pub use extract::ExtractionSource;
pub use fetch::ContentFetcher;
pub use network::{CapturedRequest, RequestLog};
pub use page::{Element, Page, ResponseBody, TextMatch};
pub use ready::{wait_ready, ReadyCondition};
pub use runner::{run, InputSource, RunConfig, RunReport};

/// Browser launch options
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Explicit path to the Chrome binary, bypassing discovery
    pub chrome_path: Option<String>,
    /// Override the user agent (a realistic one is picked otherwise)
    pub user_agent: Option<String>,
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Directory for diagnostic screenshots
    pub debug_dir: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: None,
            viewport_width: 1280,
            viewport_height: 720,
            debug_dir: None,
        }
    }
}

impl BrowserConfig {
    /// Config with a visible window, for watching a run locally
    pub fn headed() -> Self {
        Self {
            headless: false,
            ..Default::default()
        }
    }
}
