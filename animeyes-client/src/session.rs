use std::time::{Duration, Instant};

use animeyes_core::WEBSOCKET_PATH;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Open => "Connected",
            ConnectionStatus::Closed => "Disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    ConnectFailed(String),
    Transport(String),
    PeerClosed,
    HeartbeatTimeout,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: RECONNECT_DELAY,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid device url: {0}")]
    Parse(String),
    #[error("unsupported url scheme {0}")]
    Scheme(String),
}

/// Maps a page origin (`http://host`) to the device socket (`ws://host/ws`).
/// Explicit `ws://` and `wss://` URLs with a path are kept as given.
pub fn endpoint_from_origin(origin: &str) -> Result<Url, EndpointError> {
    let mut url = Url::parse(origin.trim()).map_err(|err| EndpointError::Parse(err.to_string()))?;
    let secure = match url.scheme() {
        "http" | "ws" => false,
        "https" | "wss" => true,
        other => return Err(EndpointError::Scheme(other.to_owned())),
    };
    let from_page = matches!(url.scheme(), "http" | "https");

    url.set_scheme(if secure { "wss" } else { "ws" })
        .map_err(|()| EndpointError::Scheme(url.scheme().to_owned()))?;
    if from_page || url.path().is_empty() || url.path() == "/" {
        url.set_path(WEBSOCKET_PATH);
        url.set_query(None);
    }
    url.set_fragment(None);
    Ok(url)
}

/// Connection lifecycle for the single device endpoint.
///
/// `Connecting -> Open -> Closed -> Connecting` after a fixed delay, forever.
/// Holds no socket; the runtime drives it and asks it what to do next.
#[derive(Debug)]
pub struct Session {
    endpoint: Url,
    config: SessionConfig,
    status: ConnectionStatus,
    last_message_at: Option<Instant>,
    reconnect_at: Option<Instant>,
    attempt: u32,
}

impl Session {
    pub fn new(endpoint: Url, config: SessionConfig) -> Self {
        Self {
            endpoint,
            config,
            status: ConnectionStatus::Closed,
            last_message_at: None,
            reconnect_at: None,
            attempt: 0,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn begin_connect(&mut self) {
        self.reconnect_at = None;
        self.status = ConnectionStatus::Connecting;
        self.attempt = self.attempt.saturating_add(1);
        info!(attempt = self.attempt, endpoint = %self.endpoint, "connecting");
    }

    pub fn on_open(&mut self, now: Instant) {
        self.reconnect_at = None;
        self.status = ConnectionStatus::Open;
        self.last_message_at = Some(now);
        self.attempt = 0;
        info!(endpoint = %self.endpoint, "connected");
    }

    pub fn on_message(&mut self, now: Instant) {
        self.last_message_at = Some(now);
    }

    /// Enters `Closed` and schedules exactly one retry, replacing any
    /// previously scheduled one.
    pub fn on_closed(&mut self, reason: &CloseReason, now: Instant) {
        match reason {
            CloseReason::ConnectFailed(err) => {
                warn!(attempt = self.attempt, endpoint = %self.endpoint, "connect failed: {err}")
            }
            CloseReason::Transport(err) => warn!(endpoint = %self.endpoint, "connection lost: {err}"),
            CloseReason::PeerClosed => info!(endpoint = %self.endpoint, "device closed connection"),
            CloseReason::HeartbeatTimeout => {
                warn!(endpoint = %self.endpoint, "no message within heartbeat timeout, closing")
            }
        }
        self.status = ConnectionStatus::Closed;
        self.reconnect_at = Some(now + self.config.reconnect_delay);
    }

    /// True when the link looks half-open and must be force-closed.
    pub fn heartbeat_expired(&self, now: Instant) -> bool {
        if self.status != ConnectionStatus::Open {
            return false;
        }
        self.last_message_at
            .is_some_and(|last| now.saturating_duration_since(last) > self.config.heartbeat_timeout)
    }

    pub fn reconnect_due(&self, now: Instant) -> bool {
        self.status == ConnectionStatus::Closed && self.reconnect_at.is_some_and(|at| now >= at)
    }

    /// The page became visible again. Returns true when a connect attempt
    /// should start right away; any scheduled retry is dropped.
    pub fn on_visible(&mut self) -> bool {
        if self.status == ConnectionStatus::Open {
            return false;
        }
        self.reconnect_at = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            endpoint_from_origin("http://192.168.4.1").unwrap(),
            SessionConfig::default(),
        )
    }

    #[test]
    fn origin_maps_to_socket_endpoint() {
        assert_eq!(
            endpoint_from_origin("http://192.168.4.1").unwrap().as_str(),
            "ws://192.168.4.1/ws"
        );
        assert_eq!(
            endpoint_from_origin("https://eyes.local/index.html?x=1")
                .unwrap()
                .as_str(),
            "wss://eyes.local/ws"
        );
        assert_eq!(
            endpoint_from_origin("ws://127.0.0.1:8080/custom")
                .unwrap()
                .as_str(),
            "ws://127.0.0.1:8080/custom"
        );
        assert!(matches!(
            endpoint_from_origin("ftp://host"),
            Err(EndpointError::Scheme(_))
        ));
        assert!(endpoint_from_origin("not a url").is_err());
    }

    #[test]
    fn close_schedules_single_retry() {
        let t0 = Instant::now();
        let mut session = session();
        session.begin_connect();
        session.on_closed(&CloseReason::ConnectFailed("refused".into()), t0);
        assert_eq!(session.status(), ConnectionStatus::Closed);
        assert!(!session.reconnect_due(t0 + Duration::from_millis(2999)));
        assert!(session.reconnect_due(t0 + RECONNECT_DELAY));

        // A second close replaces the timer instead of adding one.
        session.on_closed(&CloseReason::PeerClosed, t0 + Duration::from_millis(1000));
        assert_eq!(
            session.reconnect_at(),
            Some(t0 + Duration::from_millis(1000) + RECONNECT_DELAY)
        );
    }

    #[test]
    fn open_cancels_pending_retry() {
        let t0 = Instant::now();
        let mut session = session();
        session.on_closed(&CloseReason::PeerClosed, t0);
        session.begin_connect();
        session.on_open(t0 + Duration::from_millis(10));
        assert!(session.is_open());
        assert_eq!(session.reconnect_at(), None);
        assert!(!session.reconnect_due(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn heartbeat_detects_silent_peer() {
        let t0 = Instant::now();
        let mut session = session();
        session.begin_connect();
        session.on_open(t0);
        session.on_message(t0 + Duration::from_millis(500));
        assert!(!session.heartbeat_expired(t0 + Duration::from_millis(3500)));
        assert!(session.heartbeat_expired(t0 + Duration::from_millis(3501)));
    }

    #[test]
    fn heartbeat_ignored_when_not_open() {
        let t0 = Instant::now();
        let mut session = session();
        session.begin_connect();
        session.on_open(t0);
        session.on_closed(&CloseReason::HeartbeatTimeout, t0 + Duration::from_secs(4));
        assert!(!session.heartbeat_expired(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn visibility_forces_immediate_attempt_only_when_down() {
        let t0 = Instant::now();
        let mut session = session();
        session.on_closed(&CloseReason::PeerClosed, t0);
        assert!(session.on_visible());
        assert_eq!(session.reconnect_at(), None);

        session.begin_connect();
        session.on_open(t0);
        assert!(!session.on_visible());
    }
}
