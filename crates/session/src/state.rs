use std::fmt;

/// Session lifecycle
///
/// ```text
/// Disconnected ─► Connecting ─► [Authenticating] ─► LoggingIn ─► [Subscribing] ─► Active
///                                      │                 │              │
///                                      └──── Failed ◄────┴──────────────┘
/// any state ── front disconnected ──► Disconnected
/// ```
///
/// Market-data sessions skip `Authenticating`; trade sessions skip
/// `Subscribing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not connected; initial state and the state after a disconnect
    Disconnected,
    /// `init()` called, waiting for the front to connect
    Connecting,
    Authenticating,
    LoggingIn,
    /// Market data only: waiting for subscription confirmations
    Subscribing,
    Active,
    /// Handshake rejected or timed out
    Failed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    /// Part of the handshake, between connect and active
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Authenticating | SessionState::LoggingIn | SessionState::Subscribing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::LoggingIn => "logging in",
            SessionState::Subscribing => "subscribing",
            SessionState::Active => "active",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}
