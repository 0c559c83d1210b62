//! Headless Chrome sessions over CDP.
//!
//! Uses chromiumoxide with light stealth patches. Every session owns its own
//! browser (or its own tab on a remote browser) and records the network
//! responses of its page into a bounded [`ResponseLog`].

use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, SetUserAgentOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

use super::session::{PageSession, SessionLauncher};
#[cfg(feature = "browser")]
use super::session::ResponseLog;
use crate::config::BrowserSettings;
use crate::error::SessionError;
use crate::models::{ListingItem, NetworkResponse, PageSnapshot};

/// Attribute used to hand an element found by script over to a CDP click.
#[cfg(feature = "browser")]
const CLICK_MARKER: &str = "data-reelfetch-click";

/// Stealth evasion JavaScript to inject into pages.
/// Based on puppeteer-extra-plugin-stealth techniques.
#[cfg(feature = "browser")]
const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
];

/// Serializes the heading, short text nodes and body text of an item page.
#[cfg(feature = "browser")]
const SNAPSHOT_SCRIPT: &str = r#"
(() => {
    const clip = (s, n) => (s && s.length > n) ? s.slice(0, n) : s;
    const h1 = document.querySelector('h1');
    const nodes = [];
    for (const el of document.querySelectorAll('body *')) {
        if (el.tagName === 'SCRIPT' || el.tagName === 'STYLE') continue;
        const text = (el.innerText || '').trim();
        if (!text || text.length > 64) continue;
        const sibling = el.nextElementSibling;
        nodes.push({
            text: text,
            nextSiblingText: sibling ? sibling.innerText : null,
            parentText: el.parentElement ? clip(el.parentElement.innerText, 2000) : null
        });
        if (nodes.length >= 5000) break;
    }
    return {
        heading: h1 ? h1.innerText : null,
        nodes: nodes,
        bodyText: document.body ? document.body.innerText : ''
    };
})()
"#;

/// Build the listing extraction script for the given container selectors.
#[cfg(feature = "browser")]
fn listing_script(selectors_json: &str) -> String {
    format!(
        r#"
(() => {{
    const results = [];
    for (const selector of {selectors_json}) {{
        document.querySelectorAll(selector).forEach(node => {{
            const link = node.querySelector('a');
            if (link) {{
                results.push({{
                    containerText: node.innerText || '',
                    linkText: link.innerText || '',
                    href: link.href
                }});
            }}
        }});
    }}
    return results;
}})()
"#
    )
}

/// Mark the first visible element found by `finder` so CDP can click it.
#[cfg(feature = "browser")]
fn mark_script(finder: &str) -> String {
    format!(
        r#"
(() => {{
    document.querySelectorAll('[{CLICK_MARKER}]').forEach(el => el.removeAttribute('{CLICK_MARKER}'));
    const visible = el => {{
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0
            && style.visibility !== 'hidden' && style.display !== 'none';
    }};
    const target = ({finder})().find(visible);
    if (!target) return false;
    target.setAttribute('{CLICK_MARKER}', '1');
    return true;
}})()
"#
    )
}

/// Convert a CDP response into the browser-neutral form.
///
/// Header names are matched case-insensitively; the content type falls back
/// to the MIME type Chrome sniffed.
pub(crate) fn network_response(
    url: &str,
    mime_type: &str,
    headers: &serde_json::Value,
) -> NetworkResponse {
    let header = |name: &str| -> Option<String> {
        headers.as_object()?.iter().find_map(|(key, value)| {
            if !key.eq_ignore_ascii_case(name) {
                return None;
            }
            match value {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        })
    };

    let content_type = header("content-type").or_else(|| {
        if mime_type.is_empty() {
            None
        } else {
            Some(mime_type.to_string())
        }
    });
    let content_length = header("content-length").and_then(|v| v.parse().ok());

    NetworkResponse {
        url: url.to_string(),
        content_type,
        content_length,
    }
}

/// Launches Chrome sessions.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    user_agent: String,
    max_responses: usize,
}

impl ChromiumLauncher {
    /// Common Chrome executable paths to check.
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(settings: BrowserSettings, user_agent: String, max_responses: usize) -> Self {
        Self {
            settings,
            user_agent,
            max_responses,
        }
    }

    /// Find Chrome executable.
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    fn find_chrome() -> Result<PathBuf, SessionError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(SessionError::Unavailable(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or download from: https://www.google.com/chrome/"
                .to_string(),
        ))
    }
}

#[cfg(feature = "browser")]
impl ChromiumLauncher {
    async fn launch_browser(&self) -> Result<(Browser, JoinHandle<()>, bool), SessionError> {
        if let Some(remote_url) = self.settings.remote_url.as_deref() {
            let (browser, handler) = Self::connect_remote(remote_url).await?;
            return Ok((browser, handler, false));
        }

        let chrome_path = Self::find_chrome()?;
        info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            self.settings.headless
        );

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // Set headless mode (with_head means NOT headless, confusingly)
        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.settings.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--autoplay-policy=no-user-gesture-required")
            .arg("--mute-audio")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| SessionError::Unavailable(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to launch browser: {}", e)))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handle, true))
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(url: &str) -> Result<(Browser, JoinHandle<()>), SessionError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let unavailable = |e: reqwest::Error| {
            SessionError::Unavailable(format!("Failed to reach remote browser: {}", e))
        };
        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                SessionError::Unavailable("No webSocketDebuggerUrl in response".to_string())
            })?;

        let (browser, mut handler) = Browser::connect(ws_url).await.map_err(|e| {
            SessionError::Unavailable(format!("Failed to connect to remote browser: {}", e))
        })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok((browser, handle))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>, SessionError> {
        let (browser, handler, owned) = self.launch_browser().await?;
        let mut session = ChromiumSession {
            browser,
            handler,
            owned,
            page: None,
            listener: None,
            log: Arc::new(Mutex::new(ResponseLog::new(self.max_responses))),
        };

        // A failed setup still has to release the browser.
        if let Err(e) = session.open_page(&self.user_agent).await {
            Box::new(session).close().await;
            return Err(e);
        }

        Ok(Box::new(session))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn PageSession>, SessionError> {
        let _ = (&self.settings, &self.user_agent, self.max_responses);
        Err(SessionError::Unavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}

/// One Chrome tab plus the browser that hosts it.
#[cfg(feature = "browser")]
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// True when this session launched the browser process itself.
    owned: bool,
    page: Option<Page>,
    listener: Option<JoinHandle<()>>,
    log: Arc<Mutex<ResponseLog>>,
}

#[cfg(feature = "browser")]
impl ChromiumSession {
    async fn open_page(&mut self, user_agent: &str) -> Result<(), SessionError> {
        let script_err = |e: chromiumoxide::error::CdpError| SessionError::Script(e.to_string());

        let page = self.browser.new_page("about:blank").await.map_err(script_err)?;

        // Set realistic user agent first (before any navigation)
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(script_err)?;
        page.execute(EnableParams::default())
            .await
            .map_err(script_err)?;

        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(script_err)?;
        let log = self.log.clone();
        self.listener = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let response = network_response(
                    &event.response.url,
                    &event.response.mime_type,
                    event.response.headers.inner(),
                );
                match log.lock() {
                    Ok(mut log) => {
                        log.push(response);
                    }
                    Err(_) => break,
                }
            }
        }));

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page, SessionError> {
        self.page
            .as_ref()
            .ok_or_else(|| SessionError::Script("Session has no open page".to_string()))
    }

    async fn apply_stealth(&self) {
        let Ok(page) = self.page() else { return };
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page.evaluate(script.to_string()).await {
                // Best-effort evasion; can fail during page transitions
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        script: String,
    ) -> Result<T, SessionError> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    /// Click the element previously tagged by [`mark_script`].
    async fn click_marked(&self) -> Result<(), SessionError> {
        let page = self.page()?;
        let element = page
            .find_element(format!("[{}]", CLICK_MARKER))
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(())
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        info!("Navigating to {}", url);
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(SessionError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SessionError::NavigationTimeout {
                    url: url.to_string(),
                    seconds: timeout.as_secs(),
                })
            }
        }
        self.apply_stealth().await;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
        self.evaluate(SNAPSHOT_SCRIPT.to_string()).await
    }

    async fn listing_items(
        &mut self,
        selectors: &[String],
    ) -> Result<Vec<ListingItem>, SessionError> {
        let selectors_json =
            serde_json::to_string(selectors).map_err(|e| SessionError::Script(e.to_string()))?;
        self.evaluate(listing_script(&selectors_json)).await
    }

    async fn click_selector(&mut self, selectors: &[String]) -> Result<bool, SessionError> {
        let selectors_json =
            serde_json::to_string(selectors).map_err(|e| SessionError::Script(e.to_string()))?;
        let finder = format!(
            "() => {}.flatMap(s => Array.from(document.querySelectorAll(s)))",
            selectors_json
        );
        if !self.evaluate::<bool>(mark_script(&finder)).await? {
            return Ok(false);
        }
        self.click_marked().await?;
        Ok(true)
    }

    async fn click_text(&mut self, label: &str) -> Result<bool, SessionError> {
        let label_json = serde_json::to_string(&label.trim().to_lowercase())
            .map_err(|e| SessionError::Script(e.to_string()))?;
        // Innermost elements whose normalized text contains the label.
        let finder = format!(
            "() => Array.from(document.querySelectorAll('body *')).filter(el => {{ \
                const t = (el.innerText || '').replace(/\\s+/g, ' ').trim().toLowerCase(); \
                return t.includes({label}) && !Array.from(el.children).some(c => \
                    (c.innerText || '').replace(/\\s+/g, ' ').trim().toLowerCase().includes({label})); \
            }})",
            label = label_json
        );
        if !self.evaluate::<bool>(mark_script(&finder)).await? {
            return Ok(false);
        }
        self.click_marked().await?;
        Ok(true)
    }

    fn take_responses(&mut self) -> Vec<NetworkResponse> {
        match self.log.lock() {
            Ok(mut log) => log.drain(),
            Err(_) => Vec::new(),
        }
    }

    async fn close(mut self: Box<Self>) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        if let Ok(log) = self.log.lock() {
            if log.dropped() > 0 {
                debug!("{} responses ignored after the log filled", log.dropped());
            }
        }
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }
        self.handler.abort();
        debug!("Browser session closed");
    }
}

#[cfg(feature = "browser")]
impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_network_response_reads_headers_case_insensitively() {
        let headers = json!({"Content-Type": "video/mp4", "Content-Length": "15728640"});
        let response = network_response("https://cdn/x.mp4", "video/mp4", &headers);
        assert_eq!(response.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(response.content_length, Some(15_728_640));
    }

    #[test]
    fn test_network_response_falls_back_to_mime_type() {
        let headers = json!({"content-length": 42});
        let response = network_response("https://cdn/x", "video/webm", &headers);
        assert_eq!(response.content_type.as_deref(), Some("video/webm"));
        assert_eq!(response.content_length, Some(42));
    }

    #[test]
    fn test_network_response_ignores_bad_length() {
        let headers = json!({"content-length": "lots"});
        let response = network_response("https://cdn/x", "", &headers);
        assert_eq!(response.content_type, None);
        assert_eq!(response.content_length, None);
    }
}
