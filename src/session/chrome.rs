//! Chrome/Chromium implementation of the browser driver
//!
//! `headless_chrome` is synchronous, so every call runs on the blocking
//! pool with a cloned handle to the tab. Selector waits use the trait's
//! async polling and never hold a blocking thread between queries.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::driver::{BrowserLauncher, BrowserPage};
use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Binaries tried on PATH when none is configured
const CANDIDATE_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// The browser outlives many idle minutes between sends
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Launches Chrome with a persistent per-account profile
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
    headless: bool,
    sandbox: bool,
}

impl ChromeLauncher {
    pub fn from_config(config: &SessionConfig) -> Self {
        ChromeLauncher {
            chrome_path: config.chrome_path.clone(),
            headless: config.headless,
            sandbox: config.sandbox,
        }
    }

    /// Configured binary, else the first candidate found on PATH
    pub fn resolve_binary(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.chrome_path {
            return Some(path.clone());
        }
        CANDIDATE_BINARIES
            .iter()
            .find_map(|name| which::which(name).ok())
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, profile_dir: &Path) -> Result<Arc<dyn BrowserPage>> {
        let binary = self.resolve_binary().ok_or_else(|| {
            Error::BrowserLaunch("no Chrome or Chromium binary found on PATH".to_string())
        })?;

        std::fs::create_dir_all(profile_dir).map_err(|e| {
            Error::BrowserLaunch(format!(
                "cannot create profile directory {}: {}",
                profile_dir.display(),
                e
            ))
        })?;

        let profile_dir = profile_dir.to_path_buf();
        let headless = self.headless;
        let sandbox = self.sandbox;

        tracing::info!(
            binary = %binary.display(),
            profile = %profile_dir.display(),
            headless,
            "Launching browser"
        );

        let page = tokio::task::spawn_blocking(move || -> Result<ChromePage> {
            let options = LaunchOptions::default_builder()
                .path(Some(binary))
                .user_data_dir(Some(profile_dir))
                .headless(headless)
                .sandbox(sandbox)
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .build()
                .map_err(|e| Error::BrowserLaunch(format!("invalid launch options: {}", e)))?;

            let browser = Browser::new(options).map_err(|e| Error::BrowserLaunch(e.to_string()))?;
            let tab = browser
                .new_tab()
                .map_err(|e| Error::BrowserLaunch(format!("cannot open tab: {}", e)))?;

            Ok(ChromePage {
                browser: Mutex::new(Some(browser)),
                tab,
            })
        })
        .await
        .map_err(|e| Error::BrowserLaunch(format!("launch task join error: {}", e)))??;

        Ok(Arc::new(page))
    }
}

/// A live tab; dropping the browser handle kills the process
pub struct ChromePage {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
}

impl ChromePage {
    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| Error::Internal(format!("Browser task join error: {}", e)))?
    }
}

fn page_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Page(format!("{}: {}", context, err))
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| page_err("navigation failed", e))?
                .wait_until_navigated()
                .map_err(|e| page_err("navigation did not finish", e))?;
            Ok(())
        })
        .await
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        let selector = selector.to_string();
        self.with_tab(move |tab| Ok(tab.find_element(&selector).is_ok()))
            .await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let selector = selector.to_string();
        // find_elements reports "no match" as an error
        self.with_tab(move |tab| Ok(tab.find_elements(&selector).map(|v| v.len()).unwrap_or(0)))
            .await
    }

    async fn canvas_data_url(&self, selector: &str) -> Result<String> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            let canvas = tab
                .find_element(&selector)
                .map_err(|e| page_err("QR canvas not found", e))?;
            let result = canvas
                .call_js_fn(
                    "function() { return this.toDataURL('image/png'); }",
                    vec![],
                    false,
                )
                .map_err(|e| page_err("cannot read QR canvas", e))?;
            result
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .ok_or_else(|| Error::Page("QR canvas returned no data".to_string()))
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.find_element(&selector)
                .map_err(|e| page_err(&format!("element '{}' not found", selector), e))?
                .click()
                .map_err(|e| page_err("click failed", e))?;
            Ok(())
        })
        .await
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            tab.find_element(&selector)
                .map_err(|e| page_err(&format!("input '{}' not found", selector), e))?
                .call_js_fn(
                    "function() { this.focus(); document.execCommand('selectAll', false, null); document.execCommand('delete', false, null); }",
                    vec![],
                    false,
                )
                .map_err(|e| page_err("cannot clear input", e))?;
            Ok(())
        })
        .await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.with_tab(move |tab| {
            tab.type_str(&text)
                .map_err(|e| page_err("typing failed", e))?;
            Ok(())
        })
        .await
    }

    async fn press_enter(&self) -> Result<()> {
        self.with_tab(|tab| {
            tab.press_key("Enter")
                .map_err(|e| page_err("key press failed", e))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let browser = self.browser.lock().take();
        let Some(browser) = browser else {
            return Ok(());
        };
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = tab.close(false) {
                tracing::debug!(error = %e, "Tab close failed; killing browser anyway");
            }
            drop(browser);
        })
        .await
        .map_err(|e| Error::Internal(format!("Browser shutdown join error: {}", e)))
    }
}
