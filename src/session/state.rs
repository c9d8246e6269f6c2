//! Session state machine types
//!
//! ```text
//! uninitialized -> launching -> logged_in
//!                            -> awaiting_qr -> logged_in   (scan observed)
//!                                           -> error       (scan timeout)
//!                            -> error
//! logged_in is left only through closed
//! any -> closed (terminal)
//! ```

use serde::Serialize;

/// Full session state; the QR payload only exists while awaiting a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Launching,
    LoggedIn,
    AwaitingQr { qr_png: Vec<u8> },
    Error { detail: String },
    Closed,
}

/// Fieldless view of [`SessionState`] for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Launching,
    LoggedIn,
    AwaitingQr,
    Error,
    Closed,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Uninitialized => SessionPhase::Uninitialized,
            SessionState::Launching => SessionPhase::Launching,
            SessionState::LoggedIn => SessionPhase::LoggedIn,
            SessionState::AwaitingQr { .. } => SessionPhase::AwaitingQr,
            SessionState::Error { .. } => SessionPhase::Error,
            SessionState::Closed => SessionPhase::Closed,
        }
    }

    /// Last QR payload, present only in `awaiting_qr`
    pub fn qr_payload(&self) -> Option<&[u8]> {
        match self {
            SessionState::AwaitingQr { qr_png } => Some(qr_png),
            _ => None,
        }
    }
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Launching => "launching",
            SessionPhase::LoggedIn => "logged_in",
            SessionPhase::AwaitingQr => "awaiting_qr",
            SessionPhase::Error => "error",
            SessionPhase::Closed => "closed",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        match (*self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Uninitialized, Launching) => true,
            // A failed launch may be retried
            (Error, Launching) => true,
            (Launching, LoggedIn | AwaitingQr | Error) => true,
            (LoggedIn, LoggedIn) => true,
            // Re-resolving refreshes the QR or discovers a login or a failure
            (AwaitingQr | Error, LoggedIn | AwaitingQr | Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why login resolution did not reach a usable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// Neither the authenticated marker nor the QR canvas appeared
    Timeout,
    /// No browser could be started in this environment
    BrowserUnavailable(String),
    /// Navigation or page interaction failed
    Page(String),
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginFailure::Timeout => write!(f, "timed out waiting for the web client"),
            LoginFailure::BrowserUnavailable(reason) => write!(f, "browser unavailable: {}", reason),
            LoginFailure::Page(detail) => write!(f, "page error: {}", detail),
        }
    }
}

/// Outcome of `resolve_login_state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    LoggedIn,
    AwaitingQr(Vec<u8>),
    Error(LoginFailure),
}

/// Outcome of `initialize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAvailability {
    Ready,
    /// The runtime lacks a browser or its sandbox; not a crash
    Unavailable(String),
}

impl BrowserAvailability {
    pub fn is_ready(&self) -> bool {
        matches!(self, BrowserAvailability::Ready)
    }
}

/// Who to send a message to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactTarget {
    /// Stable address; opened through a deep link
    Jid(crate::engine::Jid),
    /// Visible chat title; only used when exactly one contact matches
    DisplayName(String),
}

impl std::fmt::Display for ContactTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContactTarget::Jid(jid) => write!(f, "{}", jid),
            ContactTarget::DisplayName(name) => write!(f, "'{}'", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_terminal() {
        for next in [
            SessionPhase::Uninitialized,
            SessionPhase::Launching,
            SessionPhase::LoggedIn,
            SessionPhase::AwaitingQr,
            SessionPhase::Error,
            SessionPhase::Closed,
        ] {
            assert!(!SessionPhase::Closed.can_transition_to(next));
        }
    }

    #[test]
    fn test_any_state_may_close() {
        assert!(SessionPhase::Uninitialized.can_transition_to(SessionPhase::Closed));
        assert!(SessionPhase::Launching.can_transition_to(SessionPhase::Closed));
        assert!(SessionPhase::AwaitingQr.can_transition_to(SessionPhase::Closed));
    }

    #[test]
    fn test_launch_paths() {
        assert!(SessionPhase::Uninitialized.can_transition_to(SessionPhase::Launching));
        assert!(!SessionPhase::Uninitialized.can_transition_to(SessionPhase::LoggedIn));
        assert!(SessionPhase::Launching.can_transition_to(SessionPhase::AwaitingQr));
        assert!(SessionPhase::AwaitingQr.can_transition_to(SessionPhase::LoggedIn));
        assert!(!SessionPhase::LoggedIn.can_transition_to(SessionPhase::Launching));
    }

    #[test]
    fn test_logged_in_only_leaves_through_close() {
        assert!(!SessionPhase::LoggedIn.can_transition_to(SessionPhase::AwaitingQr));
        assert!(!SessionPhase::LoggedIn.can_transition_to(SessionPhase::Error));
        assert!(SessionPhase::LoggedIn.can_transition_to(SessionPhase::LoggedIn));
        assert!(SessionPhase::LoggedIn.can_transition_to(SessionPhase::Closed));
    }

    #[test]
    fn test_qr_only_in_awaiting_state() {
        let state = SessionState::AwaitingQr { qr_png: vec![1, 2, 3] };
        assert_eq!(state.qr_payload(), Some(&[1u8, 2, 3][..]));
        assert_eq!(SessionState::LoggedIn.qr_payload(), None);
        assert_eq!(state.phase().as_str(), "awaiting_qr");
    }
}
