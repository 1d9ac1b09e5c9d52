//! Integration tests for jackdaw
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use std::time::Duration;

use jackdaw::{
    run, wait_ready, Browser, BrowserConfig, Error, InputSource, ReadyCondition, RunConfig,
    TextMatch,
};

/// Check if Chrome is available
fn chrome_available() -> bool {
    jackdaw::browser::find_chrome().is_ok()
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_browser_launch() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_browser_launch_headed() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let config = BrowserConfig::headed();
    let browser = Browser::launch_with_config(config)
        .await
        .expect("Failed to launch browser");
    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_page_navigation() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("about:blank")
        .await
        .expect("Failed to create page");

    page.goto("data:text/html,<h1>Hello</h1>")
        .await
        .expect("Failed to navigate");
    page.wait_for_navigation()
        .await
        .expect("Navigation did not complete");

    let content = page.content().await.expect("Failed to get content");
    assert!(content.contains("Hello"));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_find_and_read_text() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("data:text/html,<h2>Results</h2><p id='msg'>done</p>")
        .await
        .expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let element = page.find("#msg").await.expect("Element should exist");
    let text = element.text().await.expect("Failed to read text");
    assert_eq!(text.trim(), "done");

    let heading = page
        .find_by_text_match("Results", TextMatch::Exact)
        .await
        .expect("Heading should be found by text");
    assert_eq!(heading.text().await.expect("text").trim(), "Results");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_type_into_textarea() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("data:text/html,<textarea></textarea>")
        .await
        .expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    page.type_into("textarea", "some input text")
        .await
        .expect("Failed to type");

    let element = page.find("textarea").await.expect("find");
    let value = element.value().await.expect("value");
    assert_eq!(value, "some input text");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_wait_for_delayed_element() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let html = r#"data:text/html,<body><script>
        setTimeout(() => {
            const el = document.createElement('div');
            el.id = 'late';
            el.textContent = 'arrived';
            document.body.appendChild(el);
        }, 300);
    </script></body>"#;

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser.new_page(html).await.expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let element = page
        .wait_for("#late", 5000)
        .await
        .expect("Element should appear within timeout");
    assert_eq!(element.text().await.expect("text").trim(), "arrived");

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_wait_for_times_out() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("data:text/html,<p>nothing else</p>")
        .await
        .expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let result = page.wait_for("#never", 300).await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_extract_after_heading() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let html = concat!(
        "data:text/html,",
        "<h3>Raw JSON Output</h3>",
        r#"<pre><code>{"chunks": ["one", </code></pre>"#,
        r#"<pre><code>"two"]}</code></pre>"#,
    );

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser.new_page(html).await.expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let payload = jackdaw::extract::extract_after_heading(&page, "Raw JSON Output")
        .await
        .expect("Payload should be extracted");

    assert!(jackdaw::extract::is_valid_json(&payload));
    assert!(payload.contains("chunks"));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_extract_attribute_decodes_entities() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    // Attribute holds entity-escaped JSON, the way templating layers emit it
    let html = concat!(
        "data:text/html,",
        r#"<button id='copy' data-clipboard-text='{&quot;ok&quot;: true}'>Copy</button>"#,
    );

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser.new_page(html).await.expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let payload = jackdaw::extract::extract_attribute(&page, "#copy", "data-clipboard-text")
        .await
        .expect("Payload should be extracted");

    assert_eq!(payload, r#"{"ok": true}"#);
    assert!(jackdaw::extract::is_valid_json(&payload));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_attribute_payload_ready_condition() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    // The attribute starts incomplete and only becomes a full JSON object
    // after a delay, like a result that streams into the copy button.
    let html = concat!(
        "data:text/html,",
        r#"<button id='copy' data-payload='{"partial'>Copy</button>"#,
        "<script>setTimeout(() => {",
        r#"document.getElementById('copy').setAttribute('data-payload', '{"done": true}');"#,
        "}, 400);</script>",
    );

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser.new_page(html).await.expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let condition = ReadyCondition::AttributePayload {
        selector: "#copy".to_string(),
        attribute: "data-payload".to_string(),
    };

    wait_ready(&page, &condition, Duration::from_secs(5))
        .await
        .expect("Attribute should complete within timeout");

    let payload = jackdaw::extract::extract_attribute(&page, "#copy", "data-payload")
        .await
        .expect("extract");
    assert_eq!(payload, r#"{"done": true}"#);

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_heading_ready_condition_waits_for_render() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let html = concat!(
        "data:text/html,<body><script>setTimeout(() => {",
        "const h = document.createElement('h2');",
        "h.textContent = 'Raw JSON Output';",
        "document.body.appendChild(h);",
        "const p = document.createElement('pre');",
        r#"p.textContent = '{"late": true}';"#,
        "document.body.appendChild(p);",
        "}, 300);</script></body>",
    );

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser.new_page(html).await.expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let condition = ReadyCondition::Heading {
        text: "Raw JSON Output".to_string(),
        settle_ms: 100,
    };

    wait_ready(&page, &condition, Duration::from_secs(5))
        .await
        .expect("Heading should render within timeout");

    let payload = jackdaw::extract::extract_after_heading(&page, "Raw JSON Output")
        .await
        .expect("extract");
    assert!(jackdaw::extract::is_valid_json(&payload));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_request_capture_sees_page_fetches() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = Browser::launch().await.expect("Failed to launch browser");
    let page = browser
        .new_page("data:text/html,<p>quiet page</p>")
        .await
        .expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let log = page
        .enable_request_capture()
        .await
        .expect("capture enables");

    // No traffic matches, so the bounded wait must time out rather than hang
    let result = log.wait_for_count("api/never", 1, 300).await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_run_finds_form_rendered_after_load() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    // The form only exists 400ms after the document reports complete, the
    // way client-side rendered apps build it. Submitting renders the
    // results heading and payload.
    let app = concat!(
        "data:text/html,<body><script>setTimeout(() => {",
        "const t = document.createElement('textarea');",
        "document.body.appendChild(t);",
        "const b = document.createElement('button');",
        "b.textContent = 'Run';",
        "b.addEventListener('click', () => {",
        "const h = document.createElement('h2');",
        "h.textContent = 'Raw JSON Output';",
        "document.body.appendChild(h);",
        "const p = document.createElement('pre');",
        r#"p.textContent = '{"ok": true}';"#,
        "document.body.appendChild(p);",
        "});",
        "document.body.appendChild(b);",
        "}, 400);</script></body>",
    );

    let mut config = RunConfig::new(
        app,
        InputSource::Text("some input".into()),
        ReadyCondition::Heading {
            text: "Raw JSON Output".into(),
            settle_ms: 100,
        },
    );
    config.timeout = std::time::Duration::from_secs(10);

    let report = run(&config)
        .await
        .expect("Run should wait for the form instead of failing on first lookup");

    assert!(report.valid_json);
    assert!(report.payload.contains("ok"));
    assert!(report.steps.iter().any(|(_, m)| m == "submitted"));
    assert!(report.steps.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_debug_screenshot_writes_to_debug_dir() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let debug_dir = std::env::temp_dir().join(format!("jackdaw-debug-{}", std::process::id()));
    let config = BrowserConfig {
        debug_dir: Some(debug_dir.display().to_string()),
        ..Default::default()
    };

    let browser = Browser::launch_with_config(config)
        .await
        .expect("Failed to launch browser");
    let page = browser
        .new_page("data:text/html,<h1>diag</h1>")
        .await
        .expect("Failed to create page");
    page.wait_for_navigation().await.expect("load");

    let filename = page
        .debug_screenshot("diag")
        .await
        .expect("Screenshot should be written");

    assert!(filename.starts_with(&debug_dir.display().to_string()));
    assert!(std::path::Path::new(&filename).exists());

    let _ = std::fs::remove_dir_all(&debug_dir);
    browser.close().await.expect("Failed to close browser");
}
