//! Browser driver traits
//!
//! The session state machine only talks to a page through [`BrowserPage`],
//! so it can run against Chrome in production and a scripted page in tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// How often a selector wait re-queries the DOM
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Poll `is_present` until `selector` matches or `timeout` elapses.
///
/// Every step is an await point, so dropping the future stops the polling.
pub async fn poll_until<P>(page: &P, selector: &str, timeout: Duration) -> Result<()>
where
    P: BrowserPage + ?Sized,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if page.is_present(selector).await? {
            return Ok(());
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(Error::SelectorTimeout {
                selector: selector.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// One browser tab, plus ownership of the browser behind it
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until `selector` matches, or fail with `Error::SelectorTimeout`
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        poll_until(self, selector, timeout).await
    }

    /// Whether `selector` currently matches, without waiting
    async fn is_present(&self, selector: &str) -> Result<bool>;

    /// Number of elements currently matching `selector`
    async fn count(&self, selector: &str) -> Result<usize>;

    /// `toDataURL()` of the canvas matching `selector`
    async fn canvas_data_url(&self, selector: &str) -> Result<String>;

    /// Click the first element matching `selector`
    async fn click(&self, selector: &str) -> Result<()>;

    /// Focus the input matching `selector` and remove its content
    async fn clear_input(&self, selector: &str) -> Result<()>;

    /// Type into the focused element
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press the Enter key on the focused element
    async fn press_enter(&self) -> Result<()>;

    /// Close the tab and shut the browser process down
    async fn close(&self) -> Result<()>;
}

/// Starts a browser against a persistent profile directory
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch (or attach to) a browser using `profile_dir` as its user data dir.
    ///
    /// Must fail with `Error::BrowserLaunch` when no usable browser exists.
    async fn launch(&self, profile_dir: &Path) -> Result<Arc<dyn BrowserPage>>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted page used by session tests

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct FakePage {
        /// Selectors that match, with an optional delay before they appear
        present: Mutex<HashMap<String, Duration>>,
        counts: Mutex<HashMap<String, usize>>,
        canvas: Mutex<Option<String>>,
        fail_navigation: AtomicBool,
        /// Wait by polling `is_present` the way the Chrome driver does
        polled: AtomicBool,
        actions: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl FakePage {
        pub fn new() -> Arc<Self> {
            Arc::new(FakePage::default())
        }

        pub fn show(&self, selector: &str) {
            self.present.lock().insert(selector.to_string(), Duration::ZERO);
        }

        pub fn show_after(&self, selector: &str, delay: Duration) {
            self.present.lock().insert(selector.to_string(), delay);
        }

        /// A page whose waits poll the DOM instead of sleeping out a delay
        pub fn polled() -> Arc<Self> {
            let page = FakePage::default();
            page.polled.store(true, Ordering::SeqCst);
            Arc::new(page)
        }

        pub fn set_count(&self, selector: &str, count: usize) {
            self.counts.lock().insert(selector.to_string(), count);
            if count > 0 {
                self.show(selector);
            }
        }

        pub fn set_canvas(&self, data_url: &str) {
            *self.canvas.lock() = Some(data_url.to_string());
        }

        pub fn fail_navigation(&self) {
            self.fail_navigation.store(true, Ordering::SeqCst);
        }

        pub fn actions(&self) -> Vec<String> {
            self.actions.lock().clone()
        }

        /// Actions that change page state (everything except probes)
        pub fn mutations(&self) -> Vec<String> {
            self.actions()
                .into_iter()
                .filter(|a| !a.starts_with("probe:") && !a.starts_with("count:"))
                .collect()
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn record(&self, action: String) {
            self.actions.lock().push(action);
        }
    }

    #[async_trait]
    impl BrowserPage for FakePage {
        async fn navigate(&self, url: &str) -> Result<()> {
            self.record(format!("navigate:{}", url));
            if self.fail_navigation.load(Ordering::SeqCst) {
                return Err(Error::Page("net::ERR_NAME_NOT_RESOLVED".to_string()));
            }
            Ok(())
        }

        async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
            if self.polled.load(Ordering::SeqCst) {
                return poll_until(self, selector, timeout).await;
            }
            let delay = self.present.lock().get(selector).copied();
            match delay {
                Some(delay) if delay <= timeout => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
                _ => {
                    tokio::time::sleep(timeout).await;
                    Err(Error::SelectorTimeout {
                        selector: selector.to_string(),
                        waited: timeout,
                    })
                }
            }
        }

        async fn is_present(&self, selector: &str) -> Result<bool> {
            self.record(format!("probe:{}", selector));
            Ok(self.present.lock().get(selector) == Some(&Duration::ZERO))
        }

        async fn count(&self, selector: &str) -> Result<usize> {
            self.record(format!("count:{}", selector));
            Ok(self.counts.lock().get(selector).copied().unwrap_or(0))
        }

        async fn canvas_data_url(&self, selector: &str) -> Result<String> {
            self.canvas
                .lock()
                .clone()
                .ok_or_else(|| Error::Page(format!("no canvas at {}", selector)))
        }

        async fn click(&self, selector: &str) -> Result<()> {
            self.record(format!("click:{}", selector));
            Ok(())
        }

        async fn clear_input(&self, selector: &str) -> Result<()> {
            self.record(format!("clear:{}", selector));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<()> {
            self.record(format!("type:{}", text));
            Ok(())
        }

        async fn press_enter(&self) -> Result<()> {
            self.record("enter".to_string());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Launcher that hands out one shared fake page, or fails
    pub struct FakeLauncher {
        page: Arc<FakePage>,
        unavailable: Option<String>,
        launches: AtomicUsize,
    }

    impl FakeLauncher {
        pub fn new(page: Arc<FakePage>) -> Arc<Self> {
            Arc::new(FakeLauncher {
                page,
                unavailable: None,
                launches: AtomicUsize::new(0),
            })
        }

        pub fn unavailable(reason: &str) -> Arc<Self> {
            Arc::new(FakeLauncher {
                page: FakePage::new(),
                unavailable: Some(reason.to_string()),
                launches: AtomicUsize::new(0),
            })
        }

        pub fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self, _profile_dir: &Path) -> Result<Arc<dyn BrowserPage>> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if let Some(ref reason) = self.unavailable {
                return Err(Error::BrowserLaunch(reason.clone()));
            }
            Ok(self.page.clone())
        }
    }
}
