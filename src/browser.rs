//! Browser Launcher
//!
//! Handles Chrome discovery and launching with a fixed, stable option set.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global counter for unique user data directories
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

use crate::cdp::transport::launch_chrome;
use crate::cdp::{Connection, Transport};
use crate::error::{Error, Result};
use crate::headers::random_user_agent;
use crate::page::Page;
use crate::BrowserConfig;

/// Find a Chrome/Chromium binary in the usual install locations
pub fn find_chrome() -> Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        vec![]
    };

    for candidate in candidates {
        let path = Path::new(candidate);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }

    Err(Error::ChromeNotFound)
}

/// The stable launch flags. These mirror what survives flaky CI/container
/// environments: no sandbox, no /dev/shm dependency, no GPU.
fn stable_args(config: &BrowserConfig) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-gpu".into(),
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--disable-extensions".into(),
        "--disable-default-apps".into(),
        "--disable-sync".into(),
        "--disable-translate".into(),
        "--metrics-recording-only".into(),
        "--password-store=basic".into(),
        "--use-mock-keychain".into(),
        format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ),
    ];

    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| random_user_agent().to_string());
    args.push(format!("--user-agent={}", user_agent));

    if config.headless {
        args.push("--headless=new".into());
    }

    args
}

/// A running headless browser
pub struct Browser {
    connection: Connection,
    config: Arc<BrowserConfig>,
    /// User data directory (cleaned up on close)
    user_data_dir: PathBuf,
}

impl Browser {
    /// Launch a new browser with default config
    pub async fn launch() -> Result<Self> {
        Self::launch_with_config(BrowserConfig::default()).await
    }

    /// Launch with custom config
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        let config = Arc::new(config);

        // Create unique user data directory
        let instance_id = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "jackdaw-browser-{}-{}",
            std::process::id(),
            instance_id
        ));

        // Clean up any stale data
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome_path = match &config.chrome_path {
            Some(p) => PathBuf::from(p),
            None => find_chrome()?,
        };

        let mut args = stable_args(&config);
        args.push(format!("--user-data-dir={}", user_data_dir.display()));

        tracing::info!("Launching Chrome from {:?}", chrome_path);
        let (child, ws_url) = launch_chrome(&chrome_path, &args)?;

        let transport = Transport::new(child, &ws_url)?;
        let connection = Connection::new(transport);

        let version = connection.version().await?;
        tracing::info!("Connected to Chrome: {}", version.product);

        Ok(Self {
            connection,
            config,
            user_data_dir,
        })
    }

    /// Create a new page and navigate to URL
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        // Window size is set via --window-size Chrome arg
        let target_id = self
            .connection
            .create_target("about:blank", None, None)
            .await?;

        let session = self.connection.attach_to_target(&target_id).await?;
        session.page_enable().await?;

        let nav_result = session.navigate(url).await?;
        if let Some(error) = nav_result.error_text {
            return Err(Error::Navigation(error));
        }

        // Brief settle time for the initial page load to start.
        // Callers should use page.wait_for_navigation() or
        // page.wait_for(selector, timeout) for reliable waiting.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        Ok(Page::new(session, Arc::clone(&self.config)))
    }

    /// Get the browser version
    pub async fn version(&self) -> Result<String> {
        let v = self.connection.version().await?;
        Ok(v.product)
    }

    /// Close the browser
    pub async fn close(self) -> Result<()> {
        self.connection.close().await?;

        // Clean up user data directory
        let _ = std::fs::remove_dir_all(&self.user_data_dir);

        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        // Best-effort cleanup of user data directory if close() wasn't called.
        // The Transport's Drop impl handles killing the Chrome process.
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}
