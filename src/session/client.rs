//! Browser-driven WhatsApp Web session
//!
//! All page access goes through one async mutex, so a probe, a login
//! resolution and a send never interleave on the same tab.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::driver::{BrowserLauncher, BrowserPage};
use super::qr;
use super::selectors;
use super::state::{
    BrowserAvailability, ContactTarget, LoginFailure, LoginState, SessionPhase, SessionState,
};
use crate::config::SessionConfig;
use crate::engine::Jid;
use crate::error::{Error, Result};

/// Delay between authenticated-marker probes while waiting for a scan
const SCAN_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Inner {
    state: SessionState,
    page: Option<Arc<dyn BrowserPage>>,
}

/// One account's browser session
pub struct SessionClient {
    account: String,
    profile_dir: PathBuf,
    web_url: String,
    auth_timeout: Duration,
    qr_timeout: Duration,
    scan_timeout: Duration,
    settle_interval: Duration,
    launcher: Arc<dyn BrowserLauncher>,
    inner: Mutex<Inner>,
    /// Lock-free mirror of the current phase for status reporting
    phase: RwLock<SessionPhase>,
}

enum Marker {
    Authenticated,
    Qr,
}

impl SessionClient {
    pub fn new(config: &SessionConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        SessionClient {
            account: config.account.clone(),
            profile_dir: config.profile_dir(),
            web_url: config.web_url.clone(),
            auth_timeout: config.auth_timeout,
            qr_timeout: config.qr_timeout,
            scan_timeout: config.scan_timeout,
            settle_interval: config.settle_interval,
            launcher,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                page: None,
            }),
            phase: RwLock::new(SessionPhase::Uninitialized),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Current phase without waiting on in-flight page work
    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    /// The QR image currently awaiting a scan, if any
    pub async fn last_qr(&self) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .await
            .state
            .qr_payload()
            .map(|bytes| bytes.to_vec())
    }

    fn set_state(&self, inner: &mut Inner, next: SessionState) {
        let from = inner.state.phase();
        let to = next.phase();
        if !from.can_transition_to(to) {
            tracing::warn!(account = %self.account, %from, %to, "Ignoring invalid session transition");
            return;
        }
        if from != to {
            tracing::debug!(account = %self.account, %from, %to, "Session transition");
        }
        inner.state = next;
        *self.phase.write() = to;
    }

    /// Launch the browser on this account's profile.
    ///
    /// A second call while a browser is attached is a no-op. A browser that
    /// cannot start is reported as `Unavailable`, not as an error.
    pub async fn initialize(&self) -> Result<BrowserAvailability> {
        let mut inner = self.inner.lock().await;

        if inner.state.phase() == SessionPhase::Closed {
            return Err(Error::SessionClosed);
        }
        if inner.page.is_some() {
            tracing::debug!(account = %self.account, "Session already initialized");
            return Ok(BrowserAvailability::Ready);
        }

        self.set_state(&mut inner, SessionState::Launching);

        match self.launcher.launch(&self.profile_dir).await {
            Ok(page) => {
                inner.page = Some(page);
                tracing::info!(
                    account = %self.account,
                    profile = %self.profile_dir.display(),
                    "Browser session started"
                );
                Ok(BrowserAvailability::Ready)
            }
            Err(Error::BrowserLaunch(reason)) => {
                tracing::warn!(account = %self.account, %reason, "Browser automation unavailable");
                self.set_state(
                    &mut inner,
                    SessionState::Error {
                        detail: reason.clone(),
                    },
                );
                Ok(BrowserAvailability::Unavailable(reason))
            }
            Err(e) => {
                self.set_state(
                    &mut inner,
                    SessionState::Error {
                        detail: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Load the web client and decide whether it is logged in or showing a QR code
    pub async fn resolve_login_state(&self) -> LoginState {
        let mut inner = self.inner.lock().await;

        let Some(page) = inner.page.clone() else {
            let failure = match inner.state.phase() {
                SessionPhase::Closed => LoginFailure::Page("session closed".to_string()),
                _ => match &inner.state {
                    SessionState::Error { detail } => LoginFailure::BrowserUnavailable(detail.clone()),
                    _ => LoginFailure::BrowserUnavailable("session not initialized".to_string()),
                },
            };
            return LoginState::Error(failure);
        };

        // Only `close` leaves logged_in; a live session is not re-navigated
        if inner.state.phase() == SessionPhase::LoggedIn {
            tracing::debug!(account = %self.account, "Session already logged in");
            return LoginState::LoggedIn;
        }

        if let Err(e) = page.navigate(&self.web_url).await {
            let failure = LoginFailure::Page(e.to_string());
            self.fail(&mut inner, &failure);
            return LoginState::Error(failure);
        }

        let marker = match self.race_markers(page.as_ref()).await {
            Ok(marker) => marker,
            Err(failure) => {
                self.fail(&mut inner, &failure);
                return LoginState::Error(failure);
            }
        };

        match marker {
            Marker::Authenticated => {
                self.set_state(&mut inner, SessionState::LoggedIn);
                tracing::info!(account = %self.account, "Session is logged in");
                LoginState::LoggedIn
            }
            Marker::Qr => {
                let png = match page.canvas_data_url(selectors::QR_CANVAS).await {
                    Ok(data_url) => qr::decode_data_url(&data_url),
                    Err(e) => Err(e),
                };
                match png {
                    Ok(png) => {
                        tracing::info!(account = %self.account, bytes = png.len(), "Awaiting QR scan");
                        self.set_state(&mut inner, SessionState::AwaitingQr { qr_png: png.clone() });
                        LoginState::AwaitingQr(png)
                    }
                    Err(e) => {
                        let failure = LoginFailure::Page(e.to_string());
                        self.fail(&mut inner, &failure);
                        LoginState::Error(failure)
                    }
                }
            }
        }
    }

    /// Race the authenticated marker against the QR canvas, each with its own bound
    async fn race_markers(&self, page: &dyn BrowserPage) -> std::result::Result<Marker, LoginFailure> {
        let auth = page.wait_for(selectors::AUTHENTICATED_MARKER, self.auth_timeout);
        let qr = page.wait_for(selectors::QR_CANVAS, self.qr_timeout);
        tokio::pin!(auth, qr);

        let mut auth_done = false;
        let mut qr_done = false;
        let mut page_error: Option<String> = None;

        loop {
            tokio::select! {
                result = &mut auth, if !auth_done => match result {
                    Ok(()) => return Ok(Marker::Authenticated),
                    Err(e) => {
                        auth_done = true;
                        if !matches!(e, Error::SelectorTimeout { .. }) {
                            page_error = Some(e.to_string());
                        }
                    }
                },
                result = &mut qr, if !qr_done => match result {
                    Ok(()) => return Ok(Marker::Qr),
                    Err(e) => {
                        qr_done = true;
                        if !matches!(e, Error::SelectorTimeout { .. }) {
                            page_error = Some(e.to_string());
                        }
                    }
                },
                else => break,
            }
        }

        Err(page_error.map_or(LoginFailure::Timeout, LoginFailure::Page))
    }

    fn fail(&self, inner: &mut Inner, failure: &LoginFailure) {
        tracing::warn!(account = %self.account, error = %failure, "Login resolution failed");
        self.set_state(
            inner,
            SessionState::Error {
                detail: failure.to_string(),
            },
        );
    }

    /// Wait for the pending QR code to be scanned.
    ///
    /// Returns `true` once logged in, `false` if the scan window elapsed.
    pub async fn wait_for_scan(&self) -> Result<bool> {
        let deadline = Instant::now() + self.scan_timeout;

        loop {
            {
                let mut inner = self.inner.lock().await;
                match inner.state.phase() {
                    SessionPhase::LoggedIn => return Ok(true),
                    SessionPhase::AwaitingQr => {}
                    SessionPhase::Closed => return Err(Error::SessionClosed),
                    other => {
                        return Err(Error::InvalidInput(format!(
                            "no QR login pending (session is {})",
                            other
                        )))
                    }
                }

                if self.probe(&inner).await {
                    self.set_state(&mut inner, SessionState::LoggedIn);
                    tracing::info!(account = %self.account, "QR code scanned; session is logged in");
                    return Ok(true);
                }

                if Instant::now() >= deadline {
                    tracing::warn!(account = %self.account, "QR code was not scanned in time");
                    self.set_state(
                        &mut inner,
                        SessionState::Error {
                            detail: "QR scan timed out".to_string(),
                        },
                    );
                    return Ok(false);
                }

                self.refresh_qr(&mut inner).await;
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }

    /// Re-read the QR canvas; the web client rotates the code while it waits
    async fn refresh_qr(&self, inner: &mut Inner) {
        let Some(page) = inner.page.clone() else {
            return;
        };
        let png = match page.canvas_data_url(selectors::QR_CANVAS).await {
            Ok(data_url) => qr::decode_data_url(&data_url),
            Err(e) => Err(e),
        };
        match png {
            Ok(png) if inner.state.qr_payload() != Some(png.as_slice()) => {
                tracing::debug!(account = %self.account, bytes = png.len(), "QR code rotated");
                self.set_state(inner, SessionState::AwaitingQr { qr_png: png });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(account = %self.account, error = %e, "Could not re-read QR code");
            }
        }
    }

    async fn probe(&self, inner: &Inner) -> bool {
        if inner.state.phase() == SessionPhase::Closed {
            return false;
        }
        let Some(ref page) = inner.page else {
            return false;
        };
        match page.is_present(selectors::AUTHENTICATED_MARKER).await {
            Ok(present) => present,
            Err(e) => {
                tracing::debug!(account = %self.account, error = %e, "Login probe failed");
                false
            }
        }
    }

    /// Non-navigating check of the authenticated marker; never errors
    pub async fn is_logged_in(&self) -> bool {
        let inner = self.inner.lock().await;
        self.probe(&inner).await
    }

    /// Re-probe the page, promoting a pending QR login once it has been scanned.
    ///
    /// While the scan is still pending the stored QR code is refreshed.
    pub async fn refresh_status(&self) -> SessionPhase {
        let mut inner = self.inner.lock().await;
        if inner.state.phase() == SessionPhase::AwaitingQr {
            if self.probe(&inner).await {
                tracing::info!(account = %self.account, "QR scan observed");
                self.set_state(&mut inner, SessionState::LoggedIn);
            } else {
                self.refresh_qr(&mut inner).await;
            }
        }
        inner.state.phase()
    }

    /// Send `text` to `target` through the web client. Never retried.
    pub async fn send_message(&self, target: &ContactTarget, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("message text is empty".to_string()));
        }

        let mut inner = self.inner.lock().await;

        if !self.probe(&inner).await {
            return Err(Error::NotAuthenticated(format!(
                "session '{}' is {}",
                self.account,
                inner.state.phase()
            )));
        }
        let page = inner
            .page
            .clone()
            .ok_or_else(|| Error::NotAuthenticated(format!("session '{}' has no page", self.account)))?;

        if inner.state.phase() != SessionPhase::LoggedIn {
            self.set_state(&mut inner, SessionState::LoggedIn);
        }

        match target {
            ContactTarget::Jid(jid) => self.open_chat_by_jid(page.as_ref(), jid).await?,
            ContactTarget::DisplayName(name) => self.open_chat_by_name(page.as_ref(), name).await?,
        }

        page.wait_for(selectors::MESSAGE_COMPOSE_INPUT, self.auth_timeout)
            .await?;
        page.click(selectors::MESSAGE_COMPOSE_INPUT).await?;
        page.type_text(text).await?;
        page.press_enter().await?;

        tracing::info!(account = %self.account, target = %target, "Message sent through web client");
        Ok(())
    }

    async fn open_chat_by_jid(&self, page: &dyn BrowserPage, jid: &Jid) -> Result<()> {
        page.navigate(&selectors::send_url(&self.web_url, jid.local_part()))
            .await?;
        page.wait_for(selectors::MESSAGE_COMPOSE_INPUT, self.qr_timeout)
            .await
    }

    /// Search the side panel and open the single chat titled exactly `name`
    async fn open_chat_by_name(&self, page: &dyn BrowserPage, name: &str) -> Result<()> {
        page.click(selectors::CONTACT_SEARCH_INPUT).await?;
        page.clear_input(selectors::CONTACT_SEARCH_INPUT).await?;
        page.type_text(name).await?;
        tokio::time::sleep(self.settle_interval).await;

        let title = selectors::contact_title_exact(name);
        page.wait_for(&title, self.auth_timeout).await?;

        match page.count(&title).await? {
            1 => {}
            0 => {
                return Err(Error::SelectorTimeout {
                    selector: title,
                    waited: self.auth_timeout,
                })
            }
            matches => {
                return Err(Error::AmbiguousTarget {
                    name: name.to_string(),
                    matches,
                })
            }
        }

        page.click(&title).await?;
        tokio::time::sleep(self.settle_interval).await;
        Ok(())
    }

    /// Initialize, then resolve the login state
    pub async fn start(&self) -> Result<LoginState> {
        match self.initialize().await? {
            BrowserAvailability::Ready => Ok(self.resolve_login_state().await),
            BrowserAvailability::Unavailable(reason) => {
                Ok(LoginState::Error(LoginFailure::BrowserUnavailable(reason)))
            }
        }
    }

    /// Release the browser. Idempotent; failures are only logged.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state.phase() == SessionPhase::Closed {
            return;
        }
        if let Some(page) = inner.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!(account = %self.account, error = %e, "Browser did not close cleanly");
            }
        }
        self.set_state(&mut inner, SessionState::Closed);
        tracing::info!(account = %self.account, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::driver::fake::{FakeLauncher, FakePage};
    use crate::session::qr::tests::tiny_png_data_url;
    use crate::session::selectors::*;

    fn config() -> SessionConfig {
        SessionConfig {
            account: "home".into(),
            profile_root: PathBuf::from("/tmp/wabridge-test-profiles"),
            ..SessionConfig::default()
        }
    }

    fn client_with(page: &Arc<FakePage>) -> (SessionClient, Arc<FakeLauncher>) {
        let launcher = FakeLauncher::new(page.clone());
        (SessionClient::new(&config(), launcher.clone()), launcher)
    }

    async fn logged_in(page: &Arc<FakePage>) -> SessionClient {
        page.show(AUTHENTICATED_MARKER);
        let (client, _) = client_with(page);
        assert_eq!(client.start().await.unwrap(), LoginState::LoggedIn);
        client
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let page = FakePage::new();
        let (client, launcher) = client_with(&page);

        assert!(client.initialize().await.unwrap().is_ready());
        assert!(client.initialize().await.unwrap().is_ready());
        assert_eq!(launcher.launches(), 1);
        assert_eq!(client.phase(), SessionPhase::Launching);
    }

    #[tokio::test]
    async fn test_missing_browser_is_capability_absent() {
        let launcher = FakeLauncher::unavailable("No usable sandbox!");
        let client = SessionClient::new(&config(), launcher);

        let availability = client.initialize().await.unwrap();
        assert_eq!(
            availability,
            BrowserAvailability::Unavailable("No usable sandbox!".into())
        );
        assert_eq!(client.phase(), SessionPhase::Error);
        assert!(!client.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_never_initialized_is_not_logged_in() {
        let page = FakePage::new();
        page.show(AUTHENTICATED_MARKER);
        let (client, _) = client_with(&page);
        assert!(!client.is_logged_in().await);
        assert!(page.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_logged_in() {
        let page = FakePage::new();
        let client = logged_in(&page).await;
        assert_eq!(client.phase(), SessionPhase::LoggedIn);
        assert_eq!(page.actions()[0], format!("navigate:{}", WEB_CLIENT_URL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logged_in_survives_later_resolve() {
        let page = FakePage::new();
        let client = logged_in(&page).await;
        let navigations = page.actions().len();
        page.fail_navigation();

        assert_eq!(client.resolve_login_state().await, LoginState::LoggedIn);
        assert_eq!(client.phase(), SessionPhase::LoggedIn);
        assert_eq!(page.actions().len(), navigations);
        assert_eq!(client.refresh_status().await, SessionPhase::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_losing_marker_wait_stops_polling() {
        let page = FakePage::polled();
        page.show(AUTHENTICATED_MARKER);
        let (client, _) = client_with(&page);
        assert_eq!(client.start().await.unwrap(), LoginState::LoggedIn);

        let qr_queries = || {
            page.actions()
                .iter()
                .filter(|a| **a == format!("probe:{}", QR_CANVAS))
                .count()
        };
        let after_race = qr_queries();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(qr_queries(), after_race);
        assert!(after_race <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polled_wait_times_out() {
        let page = FakePage::polled();
        let (client, _) = client_with(&page);
        assert_eq!(
            client.start().await.unwrap(),
            LoginState::Error(LoginFailure::Timeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_awaiting_qr_after_auth_bound() {
        let page = FakePage::new();
        // Appears after the 10s auth bound but within the 30s QR bound
        page.show_after(QR_CANVAS, Duration::from_secs(15));
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);

        match client.start().await.unwrap() {
            LoginState::AwaitingQr(png) => assert!(qr::is_png(&png)),
            other => panic!("expected QR, got {:?}", other),
        }
        assert_eq!(client.phase(), SessionPhase::AwaitingQr);
        assert!(client.last_qr().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_times_out() {
        let page = FakePage::new();
        let (client, _) = client_with(&page);

        assert_eq!(
            client.start().await.unwrap(),
            LoginState::Error(LoginFailure::Timeout)
        );
        assert_eq!(client.phase(), SessionPhase::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_is_reported() {
        let page = FakePage::new();
        page.fail_navigation();
        let (client, _) = client_with(&page);

        assert!(matches!(
            client.start().await.unwrap(),
            LoginState::Error(LoginFailure::Page(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_promotes_to_logged_in() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);
        assert!(matches!(client.start().await.unwrap(), LoginState::AwaitingQr(_)));

        page.show(AUTHENTICATED_MARKER);
        assert!(client.wait_for_scan().await.unwrap());
        assert_eq!(client.phase(), SessionPhase::LoggedIn);
        assert!(client.last_qr().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_timeout_moves_to_error() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);
        client.start().await.unwrap();

        assert!(!client.wait_for_scan().await.unwrap());
        assert_eq!(client.phase(), SessionPhase::Error);
    }

    fn rotated_qr() -> (Vec<u8>, String) {
        let png = [&qr::PNG_SIGNATURE[..], &[7u8, 7, 7][..]].concat();
        let data_url = format!("data:image/png;base64,{}", qr::encode_base64(&png));
        (png, data_url)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_status_picks_up_rotated_qr() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);
        client.start().await.unwrap();
        let first = client.last_qr().await.unwrap();

        let (rotated, data_url) = rotated_qr();
        page.set_canvas(&data_url);

        assert_eq!(client.refresh_status().await, SessionPhase::AwaitingQr);
        let current = client.last_qr().await.unwrap();
        assert_ne!(current, first);
        assert_eq!(current, rotated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_wait_keeps_qr_fresh() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);
        client.start().await.unwrap();

        let client = Arc::new(client);
        let waiter = tokio::spawn({
            let client = client.clone();
            async move { client.wait_for_scan().await }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        let (rotated, data_url) = rotated_qr();
        page.set_canvas(&data_url);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(client.last_qr().await, Some(rotated));

        page.show(AUTHENTICATED_MARKER);
        assert!(waiter.await.unwrap().unwrap());
        assert_eq!(client.phase(), SessionPhase::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_status_observes_scan() {
        let page = FakePage::new();
        page.show(QR_CANVAS);
        page.set_canvas(&tiny_png_data_url());
        let (client, _) = client_with(&page);
        client.start().await.unwrap();

        assert_eq!(client.refresh_status().await, SessionPhase::AwaitingQr);
        page.show(AUTHENTICATED_MARKER);
        assert_eq!(client.refresh_status().await, SessionPhase::LoggedIn);
    }

    #[tokio::test]
    async fn test_send_requires_login_without_touching_page() {
        let page = FakePage::new();
        let (client, _) = client_with(&page);
        client.initialize().await.unwrap();

        let err = client
            .send_message(&ContactTarget::DisplayName("Mom".into()), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated(_)));
        assert!(page.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_by_display_name() {
        let page = FakePage::new();
        let client = logged_in(&page).await;
        let title = contact_title_exact("Mom");
        page.set_count(&title, 1);
        page.show(MESSAGE_COMPOSE_INPUT);
        let before = page.mutations().len();

        client
            .send_message(&ContactTarget::DisplayName("Mom".into()), "dinner at 7")
            .await
            .unwrap();

        let expected = vec![
            format!("click:{}", CONTACT_SEARCH_INPUT),
            format!("clear:{}", CONTACT_SEARCH_INPUT),
            "type:Mom".to_string(),
            format!("click:{}", title),
            format!("click:{}", MESSAGE_COMPOSE_INPUT),
            "type:dinner at 7".to_string(),
            "enter".to_string(),
        ];
        assert_eq!(&page.mutations()[before..], &expected[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_display_name_is_ambiguous() {
        let page = FakePage::new();
        let client = logged_in(&page).await;
        page.set_count(&contact_title_exact("Alex"), 2);
        page.show(MESSAGE_COMPOSE_INPUT);

        let err = client
            .send_message(&ContactTarget::DisplayName("Alex".into()), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousTarget { matches: 2, .. }));
        assert!(!page.actions().contains(&"enter".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_display_name_times_out() {
        let page = FakePage::new();
        let client = logged_in(&page).await;

        let err = client
            .send_message(&ContactTarget::DisplayName("Nobody".into()), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelectorTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_by_jid_uses_deep_link() {
        let page = FakePage::new();
        let client = logged_in(&page).await;
        page.show(MESSAGE_COMPOSE_INPUT);

        let jid = Jid::parse("4917012345@s.whatsapp.net").unwrap();
        client
            .send_message(&ContactTarget::Jid(jid), "hello")
            .await
            .unwrap();

        assert!(page
            .actions()
            .contains(&format!("navigate:{}/send?phone=4917012345", WEB_CLIENT_URL)));
        assert_eq!(page.actions().last().map(String::as_str), Some("enter"));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let page = FakePage::new();
        let (client, _) = client_with(&page);
        let err = client
            .send_message(&ContactTarget::DisplayName("Mom".into()), "  ")
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent_and_terminal() {
        let page = FakePage::new();
        let client = logged_in(&page).await;

        client.close().await;
        client.close().await;

        assert!(page.is_closed());
        assert_eq!(client.phase(), SessionPhase::Closed);
        assert!(!client.is_logged_in().await);
        assert!(matches!(client.initialize().await, Err(Error::SessionClosed)));
    }

    #[tokio::test]
    async fn test_close_before_initialize() {
        let page = FakePage::new();
        let (client, launcher) = client_with(&page);
        client.close().await;
        assert_eq!(client.phase(), SessionPhase::Closed);
        assert_eq!(launcher.launches(), 0);
    }
}
