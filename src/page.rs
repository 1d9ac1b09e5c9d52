//! Page Abstraction
//!
//! High-level API for interacting with a browser page: navigation, element
//! finding with fallback chains, form interaction, bounded waits, and
//! network request capture.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::cdp::transport::CdpMessage;
use crate::cdp::{MouseButton, MouseEventType, Session};
use crate::error::{Error, Result};
use crate::network::RequestLog;
use crate::BrowserConfig;

/// Global counter for unique marker IDs to prevent race conditions
static MARKER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Escape a string for safe use in JavaScript string literals
pub(crate) fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
        .replace('`', "\\`")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace("${", "\\${")
}

/// Text matching strategy for find_by_text operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMatch {
    /// Exact match (trimmed, case-sensitive)
    Exact,
    /// Contains the text (case-insensitive) - default
    #[default]
    Contains,
}

/// A browser page
pub struct Page {
    session: Session,
    config: Arc<BrowserConfig>,
    /// Request log, populated once capture is enabled
    request_log: OnceLock<Arc<RequestLog>>,
}

impl Page {
    /// Create a new Page wrapping a CDP session
    pub(crate) fn new(session: Session, config: Arc<BrowserConfig>) -> Self {
        Self {
            session,
            config,
            request_log: OnceLock::new(),
        }
    }

    /// Get the underlying CDP session
    pub fn session(&self) -> &Session {
        &self.session
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to a URL
    pub async fn goto(&self, url: &str) -> Result<()> {
        let result = self.session.navigate(url).await?;
        if let Some(error) = result.error_text {
            return Err(Error::Navigation(error));
        }
        // Wait for navigation to settle
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(())
    }

    /// Wait for navigation to complete by polling document.readyState
    ///
    /// Waits until the document is fully loaded (readyState === "complete").
    pub async fn wait_for_navigation(&self) -> Result<()> {
        self.wait_for_navigation_timeout(30_000).await
    }

    /// Wait for navigation with a custom timeout in milliseconds
    pub async fn wait_for_navigation_timeout(&self, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);
        let poll_interval = std::time::Duration::from_millis(50);

        loop {
            match self.session.evaluate("document.readyState").await {
                Ok(result) => {
                    if let Some(value) = result.result.value {
                        if value.as_str() == Some("complete") {
                            return Ok(());
                        }
                    }
                }
                Err(_) => {
                    // Page might be mid-navigation, readyState unavailable - keep waiting
                }
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Navigation did not complete within {}ms",
                    timeout_ms
                )));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Reload the current page
    pub async fn reload(&self) -> Result<()> {
        self.execute("location.reload()").await?;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(())
    }

    /// Wait until the page satisfies a readiness condition
    pub async fn wait_ready(
        &self,
        condition: &crate::ready::ReadyCondition,
        timeout: std::time::Duration,
    ) -> Result<()> {
        crate::ready::wait_ready(self, condition, timeout).await
    }

    /// Force a round-trip through the page's JS engine.
    ///
    /// Used as a settle step after a readiness signal fires, before reading
    /// content out of a freshly rendered subtree.
    pub async fn sync_dom(&self) -> Result<()> {
        self.execute("true").await
    }

    // =========================================================================
    // Page Info
    // =========================================================================

    /// Get current URL
    pub async fn url(&self) -> Result<String> {
        let frame_tree = self.session.get_frame_tree().await?;
        Ok(frame_tree.frame.url)
    }

    /// Get page title
    pub async fn title(&self) -> Result<String> {
        let result = self.session.evaluate("document.title").await?;
        if let Some(value) = result.result.value {
            if let Some(s) = value.as_str() {
                return Ok(s.to_string());
            }
        }
        Ok(String::new())
    }

    /// Get page HTML content
    pub async fn content(&self) -> Result<String> {
        let result = self
            .session
            .evaluate("document.documentElement.outerHTML")
            .await?;
        if let Some(value) = result.result.value {
            if let Some(s) = value.as_str() {
                return Ok(s.to_string());
            }
        }
        Ok(String::new())
    }

    /// Get page text content (body innerText)
    pub async fn text(&self) -> Result<String> {
        let result = self.session.evaluate("document.body.innerText").await?;
        if let Some(value) = result.result.value {
            if let Some(s) = value.as_str() {
                return Ok(s.to_string());
            }
        }
        Ok(String::new())
    }

    // =========================================================================
    // Screenshots
    // =========================================================================

    /// Capture a screenshot as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.session.capture_screenshot(Some("png"), None).await
    }

    /// Take a diagnostic screenshot and save it with a timestamp
    ///
    /// Saves to `BrowserConfig::debug_dir` if set, otherwise current directory.
    pub async fn debug_screenshot(&self, prefix: &str) -> Result<String> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let filename = match &self.config.debug_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                format!("{}/{}_{}.png", dir, prefix, timestamp)
            }
            None => format!("{}_{}.png", prefix, timestamp),
        };

        let screenshot = self.screenshot().await?;
        std::fs::write(&filename, screenshot)?;
        Ok(filename)
    }

    // =========================================================================
    // Element Finding
    // =========================================================================

    /// Find an element by CSS selector
    pub async fn find(&self, selector: &str) -> Result<Element<'_>> {
        let doc = self.session.get_document(Some(0)).await?;
        let node_id = self.session.query_selector(doc.node_id, selector).await?;

        if node_id == 0 {
            return Err(Error::ElementNotFound(selector.to_string()));
        }

        Ok(Element {
            page: self,
            node_id,
        })
    }

    /// Find all elements matching a CSS selector
    pub async fn find_all(&self, selector: &str) -> Result<Vec<Element<'_>>> {
        let doc = self.session.get_document(Some(0)).await?;
        let node_ids = self
            .session
            .query_selector_all(doc.node_id, selector)
            .await?;

        Ok(node_ids
            .into_iter()
            .filter(|&id| id != 0)
            .map(|node_id| Element {
                page: self,
                node_id,
            })
            .collect())
    }

    /// Find the first element matching any of the given selectors
    ///
    /// Tries each selector in order and returns the first match. Useful when
    /// the same widget has inconsistent selectors across app versions.
    pub async fn find_any(&self, selectors: &[&str]) -> Result<Element<'_>> {
        for selector in selectors {
            if let Ok(element) = self.find(selector).await {
                return Ok(element);
            }
        }
        Err(Error::ElementNotFound(format!(
            "None of selectors found: {:?}",
            selectors
        )))
    }

    /// Check if an element exists
    #[must_use = "returns true if element exists"]
    pub async fn exists(&self, selector: &str) -> bool {
        self.find(selector).await.is_ok()
    }

    /// Find an element by its text content (case-insensitive contains)
    pub async fn find_by_text(&self, text: &str) -> Result<Element<'_>> {
        self.find_by_text_match(text, TextMatch::Contains).await
    }

    /// Find an element by text with a specific matching strategy
    ///
    /// Searches headings first (the results-heading signal is the common
    /// case), then other text-bearing elements.
    pub async fn find_by_text_match(
        &self,
        text: &str,
        match_type: TextMatch,
    ) -> Result<Element<'_>> {
        // Unique marker ID so concurrent searches don't trip over each other
        let marker_id = MARKER_COUNTER.fetch_add(1, Ordering::SeqCst);
        let marker_attr = format!("data-jackdaw-text-{}", marker_id);

        let escaped_text = escape_js_string(text);
        let match_js = match match_type {
            TextMatch::Exact => format!("t.trim() === '{}'", escaped_text),
            TextMatch::Contains => format!(
                "t.toLowerCase().includes('{}')",
                escaped_text.to_lowercase()
            ),
        };

        let js = format!(
            r#"
            (() => {{
                const groups = [
                    'h1, h2, h3, h4, h5, h6',
                    'a, button, label, span, div, p, li, td, th, code, pre',
                ];
                for (const group of groups) {{
                    for (const el of document.querySelectorAll(group)) {{
                        const t = el.innerText || el.textContent || '';
                        if ({match_js}) {{
                            el.setAttribute('{marker_attr}', 'true');
                            return true;
                        }}
                    }}
                }}
                return false;
            }})()
            "#,
            match_js = match_js,
            marker_attr = marker_attr
        );

        let found: bool = self.evaluate(&js).await?;
        if !found {
            return Err(Error::ElementNotFound(format!("text: {}", text)));
        }

        let selector = format!("[{}='true']", marker_attr);
        let element = self.find(&selector).await?;

        // Clean up the marker
        let cleanup_js = format!(
            "document.querySelector('[{}]')?.removeAttribute('{}')",
            marker_attr, marker_attr
        );
        self.execute(&cleanup_js).await?;

        Ok(element)
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Click at coordinates
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.session
            .dispatch_mouse_event(
                MouseEventType::MousePressed,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await?;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        self.session
            .dispatch_mouse_event(
                MouseEventType::MouseReleased,
                x,
                y,
                Some(MouseButton::Left),
                Some(1),
            )
            .await?;

        Ok(())
    }

    /// Click on an element by selector
    pub async fn click(&self, selector: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await
    }

    /// Type text into focused element
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.session.insert_text(text).await
    }

    /// Type text into an element by selector
    pub async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.session.insert_text(text).await
    }

    /// Fill a form field: clicks, clears existing content, and types new value
    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // Select existing content so the inserted text replaces it
        self.execute("document.activeElement.select()").await?;
        self.session.insert_text(value).await
    }

    // =========================================================================
    // JavaScript Evaluation
    // =========================================================================

    /// Evaluate JavaScript and return the result
    pub async fn evaluate<T: serde::de::DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = self.session.evaluate(expression).await?;

        if let Some(exception) = result.exception_details {
            return Err(Error::CdpSimple(format!(
                "JavaScript error: {} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        if let Some(value) = result.result.value {
            let typed: T = serde_json::from_value(value)?;
            return Ok(typed);
        }

        Err(Error::CdpSimple("No value returned from evaluate".into()))
    }

    /// Execute JavaScript without expecting a return value
    pub async fn execute(&self, expression: &str) -> Result<()> {
        let result = self.session.evaluate(expression).await?;

        if let Some(exception) = result.exception_details {
            return Err(Error::CdpSimple(format!(
                "JavaScript error: {} at {}:{}",
                exception.text, exception.line_number, exception.column_number
            )));
        }

        Ok(())
    }

    // =========================================================================
    // Wait Helpers
    // =========================================================================

    /// Wait for an element to appear in the DOM
    pub async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<Element<'_>> {
        self.wait_for_with_interval(selector, timeout_ms, 100).await
    }

    /// Wait for an element with a custom poll interval
    pub async fn wait_for_with_interval(
        &self,
        selector: &str,
        timeout_ms: u64,
        poll_ms: u64,
    ) -> Result<Element<'_>> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if let Ok(element) = self.find(selector).await {
                return Ok(element);
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Element '{}' not found within {}ms",
                    selector, timeout_ms
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(poll_ms)).await;
        }
    }

    /// Wait for any of the given selectors to appear
    pub async fn wait_for_any(&self, selectors: &[&str], timeout_ms: u64) -> Result<Element<'_>> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if let Ok(element) = self.find_any(selectors).await {
                return Ok(element);
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "None of selectors found within {}ms: {:?}",
                    timeout_ms, selectors
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    /// Wait for an element with specific text to appear
    pub async fn wait_for_text(&self, text: &str, timeout_ms: u64) -> Result<Element<'_>> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            if let Ok(element) = self.find_by_text(text).await {
                return Ok(element);
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Element with text '{}' not found within {}ms",
                    text, timeout_ms
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    /// Wait for a fixed duration
    pub async fn wait(&self, ms: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }

    // =========================================================================
    // Network Request Capture
    // =========================================================================

    /// Enable network request capture and start logging this page's traffic
    ///
    /// Spawns a background task that drains CDP events into a `RequestLog`.
    /// Calling this more than once returns the same log.
    pub async fn enable_request_capture(&self) -> Result<Arc<RequestLog>> {
        if let Some(log) = self.request_log.get() {
            return Ok(Arc::clone(log));
        }

        self.session.network_enable().await?;

        let log = Arc::new(RequestLog::new());
        let _ = self.request_log.set(Arc::clone(&log));

        let transport = Arc::clone(self.session.transport());
        let session_id = self.session.session_id().to_string();
        let sink = Arc::clone(&log);

        tokio::spawn(async move {
            while let Some(msg) = transport.recv_event().await {
                if let CdpMessage::Event {
                    session_id: sid, ..
                } = &msg
                {
                    // Events without a session ID are browser-wide
                    if sid.as_deref().map_or(true, |s| s == session_id) {
                        sink.process_event(&msg).await;
                    }
                }
            }
            tracing::debug!("Request capture pump ended");
        });

        Ok(log)
    }

    /// Get the request log, if capture has been enabled
    pub fn request_log(&self) -> Option<&Arc<RequestLog>> {
        self.request_log.get()
    }

    /// Disable network request capture
    pub async fn disable_request_capture(&self) -> Result<()> {
        self.session.network_disable().await
    }

    /// Get response body for a captured request
    pub async fn response_body(&self, request_id: &str) -> Result<ResponseBody> {
        let (body, base64_encoded) = self.session.get_response_body(request_id).await?;

        if base64_encoded {
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&body)
                .map_err(|e| Error::Decode(e.to_string()))?;
            Ok(ResponseBody::Binary(bytes))
        } else {
            Ok(ResponseBody::Text(body))
        }
    }
}

/// Response body - either text or binary
#[derive(Debug)]
pub enum ResponseBody {
    Text(String),
    Binary(Vec<u8>),
}

impl ResponseBody {
    /// Get as text, if textual
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            ResponseBody::Binary(_) => None,
        }
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Text(s) => s.as_bytes(),
            ResponseBody::Binary(b) => b,
        }
    }

    /// Try to parse as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match self {
            ResponseBody::Text(s) => Ok(serde_json::from_str(s)?),
            ResponseBody::Binary(b) => Ok(serde_json::from_slice(b)?),
        }
    }
}

/// An element on the page
pub struct Element<'a> {
    page: &'a Page,
    node_id: i32,
}

impl<'a> Element<'a> {
    /// Get the element's center coordinates
    pub async fn center(&self) -> Result<(f64, f64)> {
        let model = self.page.session.get_box_model(self.node_id).await?;
        Ok(model.center())
    }

    /// Click this element
    pub async fn click(&self) -> Result<()> {
        let (x, y) = self.center().await?;
        self.page.click_at(x, y).await
    }

    /// Get outer HTML
    pub async fn outer_html(&self) -> Result<String> {
        self.page.session.get_outer_html(self.node_id).await
    }

    /// Evaluate a JavaScript expression with `this` bound to the element
    async fn eval_on_element(&self, js_expr: &str) -> Result<serde_json::Value> {
        let object_id = self.page.session.resolve_node(self.node_id).await?;
        let func = format!("function() {{ return {}; }}", js_expr);

        let result = self.page.session.call_function_on(&object_id, &func).await?;
        Ok(result.result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Get the rendered text content of the element
    pub async fn text(&self) -> Result<String> {
        let value = self
            .eval_on_element("this.innerText || this.textContent || ''")
            .await?;

        if let Some(s) = value.as_str() {
            return Ok(s.to_string());
        }
        Ok(String::new())
    }

    /// Get an attribute value from the element
    ///
    /// Returns `None` when the attribute is absent. This is the direct read
    /// path for copy-to-clipboard payload attributes.
    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        let escaped_name = escape_js_string(name);
        let value = self
            .eval_on_element(&format!("this.getAttribute('{}')", escaped_name))
            .await?;

        if value.is_null() {
            return Ok(None);
        }
        if let Some(s) = value.as_str() {
            return Ok(Some(s.to_string()));
        }
        Ok(None)
    }

    /// Get the value of an input element
    pub async fn value(&self) -> Result<String> {
        let value = self.eval_on_element("this.value || ''").await?;

        if let Some(s) = value.as_str() {
            return Ok(s.to_string());
        }
        Ok(String::new())
    }

    /// Type text into this element
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.click().await?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        self.page.session.insert_text(text).await
    }

    /// Focus this element
    pub async fn focus(&self) -> Result<()> {
        self.page.session.focus(self.node_id).await
    }

    /// Concatenated text of the sibling elements that follow this one
    ///
    /// Used to read a result block rendered after a heading when the payload
    /// spans several adjacent nodes.
    pub async fn following_text(&self) -> Result<String> {
        let value = self
            .eval_on_element(
                r#"(() => {
                    const parts = [];
                    let node = this.nextElementSibling;
                    while (node) {
                        const t = node.innerText || node.textContent || '';
                        if (t.trim().length > 0) parts.push(t);
                        node = node.nextElementSibling;
                    }
                    return parts.join('');
                }).call(this)"#,
            )
            .await?;

        if let Some(s) = value.as_str() {
            return Ok(s.to_string());
        }
        Ok(String::new())
    }
}
