//! Network Request Capture
//!
//! Keeps an in-memory log of the requests a page makes, so completion can be
//! inferred from observed traffic (the "N fetches to endpoint X" signal).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cdp::transport::CdpMessage;
use crate::cdp::types::{
    NetworkLoadingFailedEvent, NetworkLoadingFinishedEvent, NetworkRequest,
    NetworkRequestWillBeSentEvent, NetworkResponse, NetworkResponseReceivedEvent,
};
use crate::error::{Error, Result};

/// A captured HTTP request with its response metadata
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Request ID (use with Page::response_body)
    pub request_id: String,
    /// Request URL
    pub url: String,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// POST data (if any)
    pub post_data: Option<String>,
    /// Resource type (Document, XHR, Fetch, etc.)
    pub resource_type: Option<String>,
    /// Response status code (if response received)
    pub status: Option<i32>,
    /// Response MIME type
    pub mime_type: Option<String>,
    /// Request timestamp
    pub timestamp: f64,
    /// Whether the response finished loading
    pub complete: bool,
}

impl CapturedRequest {
    fn from_request(
        request_id: String,
        request: &NetworkRequest,
        resource_type: Option<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            request_id,
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            post_data: request.post_data.clone(),
            resource_type,
            status: None,
            mime_type: None,
            timestamp,
            complete: false,
        }
    }

    fn set_response(&mut self, response: &NetworkResponse) {
        self.status = Some(response.status);
        self.mime_type = response.mime_type.clone();
    }
}

/// Log of requests observed on a page since capture was enabled
pub struct RequestLog {
    /// Captured requests (request_id -> CapturedRequest)
    requests: Arc<Mutex<HashMap<String, CapturedRequest>>>,
}

impl RequestLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Process a CDP event
    /// Returns true if the event was a network event that was recorded
    pub async fn process_event(&self, event: &CdpMessage) -> bool {
        if let CdpMessage::Event { method, params, .. } = event {
            match method.as_str() {
                "Network.requestWillBeSent" => {
                    if let Ok(e) =
                        serde_json::from_value::<NetworkRequestWillBeSentEvent>(params.clone())
                    {
                        self.on_request_will_be_sent(e).await;
                        return true;
                    }
                }
                "Network.responseReceived" => {
                    if let Ok(e) =
                        serde_json::from_value::<NetworkResponseReceivedEvent>(params.clone())
                    {
                        self.on_response_received(e).await;
                        return true;
                    }
                }
                "Network.loadingFinished" => {
                    if let Ok(e) =
                        serde_json::from_value::<NetworkLoadingFinishedEvent>(params.clone())
                    {
                        self.on_loading_finished(e).await;
                        return true;
                    }
                }
                "Network.loadingFailed" => {
                    if let Ok(e) =
                        serde_json::from_value::<NetworkLoadingFailedEvent>(params.clone())
                    {
                        self.on_loading_failed(e).await;
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    async fn on_request_will_be_sent(&self, event: NetworkRequestWillBeSentEvent) {
        let request = CapturedRequest::from_request(
            event.request_id.clone(),
            &event.request,
            event.r#type.clone(),
            event.timestamp,
        );

        tracing::trace!("Request started: {} {}", request.method, request.url);

        let mut requests = self.requests.lock().await;
        requests.insert(event.request_id, request);
    }

    async fn on_response_received(&self, event: NetworkResponseReceivedEvent) {
        let mut requests = self.requests.lock().await;
        if let Some(request) = requests.get_mut(&event.request_id) {
            request.set_response(&event.response);
        }
    }

    async fn on_loading_finished(&self, event: NetworkLoadingFinishedEvent) {
        let mut requests = self.requests.lock().await;
        if let Some(request) = requests.get_mut(&event.request_id) {
            request.complete = true;
        }
    }

    async fn on_loading_failed(&self, event: NetworkLoadingFailedEvent) {
        tracing::trace!(
            "Request failed: {} ({})",
            event.request_id,
            event.error_text
        );
        let mut requests = self.requests.lock().await;
        requests.remove(&event.request_id);
    }

    /// Get a captured request by ID
    pub async fn get(&self, request_id: &str) -> Option<CapturedRequest> {
        let requests = self.requests.lock().await;
        requests.get(request_id).cloned()
    }

    /// Get all captured requests
    pub async fn all(&self) -> Vec<CapturedRequest> {
        let requests = self.requests.lock().await;
        requests.values().cloned().collect()
    }

    /// Get requests whose URL contains the pattern
    pub async fn matching(&self, pattern: &str) -> Vec<CapturedRequest> {
        let requests = self.requests.lock().await;
        requests
            .values()
            .filter(|r| r.url.contains(pattern))
            .cloned()
            .collect()
    }

    /// Count completed requests whose URL contains the pattern
    pub async fn count_completed(&self, pattern: &str) -> usize {
        let requests = self.requests.lock().await;
        requests
            .values()
            .filter(|r| r.complete && r.url.contains(pattern))
            .count()
    }

    /// Clear all captured requests
    pub async fn clear(&self) {
        let mut requests = self.requests.lock().await;
        requests.clear();
    }

    /// Wait until at least `count` completed requests match the URL pattern.
    ///
    /// This is the network-side completion signal: the page is assumed done
    /// once the expected number of backend calls has finished. Times out with
    /// an error rather than waiting forever.
    pub async fn wait_for_count(&self, pattern: &str, count: usize, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            let seen = self.count_completed(pattern).await;
            if seen >= count {
                return Ok(());
            }

            if start.elapsed() > timeout {
                return Err(Error::Timeout(format!(
                    "Saw {}/{} completed requests matching '{}' within {}ms",
                    seen, count, pattern, timeout_ms
                )));
            }

            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request(id: &str, url: &str, complete: bool) -> CapturedRequest {
        CapturedRequest {
            request_id: id.to_string(),
            url: url.to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            post_data: None,
            resource_type: Some("XHR".to_string()),
            status: None,
            mime_type: None,
            timestamp: 0.0,
            complete,
        }
    }

    #[tokio::test]
    async fn test_request_log_starts_empty() {
        let log = RequestLog::new();
        assert!(log.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_matching_filters_by_url() {
        let log = RequestLog::new();

        {
            let mut requests = log.requests.lock().await;
            requests.insert(
                "1".to_string(),
                test_request("1", "https://api.example.com/chunk", false),
            );
        }

        let matches = log.matching("api.example.com").await;
        assert_eq!(matches.len(), 1);
        assert!(log.matching("other.com").await.is_empty());
    }

    #[tokio::test]
    async fn test_count_completed_ignores_in_flight() {
        let log = RequestLog::new();

        {
            let mut requests = log.requests.lock().await;
            requests.insert(
                "1".to_string(),
                test_request("1", "https://app.test/_stcore/stream", true),
            );
            requests.insert(
                "2".to_string(),
                test_request("2", "https://app.test/_stcore/stream", false),
            );
            requests.insert(
                "3".to_string(),
                test_request("3", "https://app.test/static/logo.png", true),
            );
        }

        assert_eq!(log.count_completed("_stcore").await, 1);
    }

    #[tokio::test]
    async fn test_wait_for_count_times_out() {
        let log = RequestLog::new();

        let result = log.wait_for_count("never", 1, 100).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_wait_for_count_returns_when_satisfied() {
        let log = RequestLog::new();

        {
            let mut requests = log.requests.lock().await;
            requests.insert(
                "1".to_string(),
                test_request("1", "https://app.test/api/run", true),
            );
            requests.insert(
                "2".to_string(),
                test_request("2", "https://app.test/api/run", true),
            );
        }

        log.wait_for_count("api/run", 2, 100)
            .await
            .expect("count already satisfied");
    }
}
