//! Reconnecting stream client.
//!
//! The client drives `connect -> subscribe -> listen` against the upstream
//! stream, feeds every decoded update through the matcher and hands the
//! resulting events to the [Dispatcher], one frame at a time.
mod ris_live;

use crate::matcher::match_update;
use crate::notifier::{Dispatcher, NotificationSink};
use crate::stats::Counters;
use crate::update::{RawUpdate, StreamFrame};
use crate::watchlist::Watchlist;
use crate::ListenerError;
use async_trait::async_trait;
use futures::{FutureExt, Stream, StreamExt};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use ris_live::{RisLiveConnection, RisLiveConnector, DEFAULT_RIS_LIVE_URL};

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Opens transport connections to the upstream stream.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Connection: StreamConnection;

    /// Establish the transport; fails with a transport error on network or
    /// handshake failure.
    async fn connect(&self, endpoint: &str) -> Result<Self::Connection, ListenerError>;
}

/// One live connection to the upstream stream.
#[async_trait]
pub trait StreamConnection: Send {
    /// Send the subscription directive for one collector. Does not wait for
    /// an acknowledgment.
    async fn subscribe(&mut self, host: &str) -> Result<(), ListenerError>;

    /// Wait for the next raw frame. `Ok(None)` means the connection was closed
    /// cleanly.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ListenerError>;
}

/// Turn a connection into a lazy stream of frames.
///
/// The stream ends on clean closure and yields a single error (then ends) on
/// abnormal closure.
pub fn listen<C: StreamConnection>(
    connection: C,
) -> impl Stream<Item = Result<Vec<u8>, ListenerError>> {
    futures::stream::unfold(Some(connection), |state| async move {
        let mut connection = state?;
        match connection.next_frame().await {
            Ok(Some(frame)) => Some((Ok(frame), Some(connection))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    /// The reconnect ceiling was exceeded; the client will not run again.
    Exited,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// Number of ended connection attempts over the whole process lifetime.
    /// Not reset by a successful connection.
    pub attempt_count: u32,
    /// Collectors subscribed on the current connection.
    pub subscribed_hosts: HashSet<String>,
}

/// Fixed-delay reconnect settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Ceiling on connection attempts; 0 means reconnect forever.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: 0,
        }
    }
}

impl ReconnectPolicy {
    fn is_exceeded(&self, attempt_count: u32) -> bool {
        self.max_attempts > 0 && attempt_count >= self.max_attempts
    }
}

/// How a single connection ended without an error.
enum SessionEnd {
    Closed,
    Shutdown,
}

/// Resolves once shutdown has been requested; never resolves without a
/// signal.
async fn shutdown_requested(signal: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = signal {
        if rx.wait_for(|stop| *stop).await.is_ok() || *rx.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Stream client owning the connection lifecycle.
///
/// # Examples
///
/// ```no_run
/// use bgp_listener::{Counters, Dispatcher, RetryPolicy, RisLiveConnector, StreamClient, Watchlist, WebhookSink};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), bgp_listener::ListenerError> {
/// let counters = Arc::new(Counters::new(&["rrc21"]));
/// let dispatcher = Dispatcher::new(WebhookSink::from_env()?, RetryPolicy::default(), counters.clone());
/// let watchlist = Arc::new(Watchlist::from_strings([64500], &["192.0.2.0/24"]));
///
/// let mut client = StreamClient::new(RisLiveConnector, dispatcher, watchlist, counters)
///     .collectors(["rrc21"]);
/// client.run().await
/// # }
/// ```
pub struct StreamClient<C: StreamConnector, S> {
    connector: C,
    endpoint: String,
    collectors: Vec<String>,
    reconnect: ReconnectPolicy,
    watchlist: Arc<Watchlist>,
    dispatcher: Dispatcher<S>,
    counters: Arc<Counters>,
    state: StreamState,
    connection: ConnectionState,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: StreamConnector, S: NotificationSink> StreamClient<C, S> {
    pub fn new(
        connector: C,
        dispatcher: Dispatcher<S>,
        watchlist: Arc<Watchlist>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            connector,
            endpoint: DEFAULT_RIS_LIVE_URL.to_string(),
            collectors: vec![],
            reconnect: ReconnectPolicy::default(),
            watchlist,
            dispatcher,
            counters,
            state: StreamState::Disconnected,
            connection: ConnectionState::default(),
            shutdown: None,
        }
    }

    /// Configure the upstream endpoint URL.
    pub fn endpoint(self, endpoint: impl ToString) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..self
        }
    }

    /// Configure the collectors to subscribe to on every connection.
    pub fn collectors<I, T>(self, collectors: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self {
            collectors: collectors.into_iter().map(|c| c.to_string()).collect(),
            ..self
        }
    }

    pub fn reconnect_policy(self, reconnect: ReconnectPolicy) -> Self {
        Self { reconnect, ..self }
    }

    /// Stop gracefully once the receiver observes `true`.
    ///
    /// The signal is only honored between frames and while waiting to
    /// reconnect, so a notification already being delivered always finishes.
    pub fn shutdown_signal(self, signal: watch::Receiver<bool>) -> Self {
        Self {
            shutdown: Some(signal),
            ..self
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    /// Run the client until the reconnect ceiling is exceeded or shutdown is
    /// requested.
    ///
    /// Any failure of a connection, including a clean close by the server,
    /// leads to a fixed delay and a new attempt. Without a ceiling this only
    /// returns `Ok(())` on shutdown; otherwise it may return
    /// [ListenerError::ReconnectLimitExceeded].
    pub async fn run(&mut self) -> Result<(), ListenerError> {
        if self.state == StreamState::Exited {
            return Err(ListenerError::ReconnectLimitExceeded(
                self.connection.attempt_count,
            ));
        }

        loop {
            if self.is_shutdown_requested() {
                self.stop();
                return Ok(());
            }

            info!(
                "connecting to {} (attempt {})",
                self.endpoint,
                self.connection.attempt_count + 1
            );

            match self.connect_and_listen().await {
                Ok(SessionEnd::Shutdown) => {
                    self.stop();
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => warn!("stream connection closed by server"),
                Err(e) if e.is_transport() => warn!("stream connection lost: {}", e),
                Err(e) => error!("unexpected stream error: {}", e),
            }

            self.state = StreamState::Disconnected;
            self.connection.subscribed_hosts.clear();
            self.connection.attempt_count += 1;

            if self.reconnect.is_exceeded(self.connection.attempt_count) {
                error!(
                    "maximum reconnection attempts ({}) reached, giving up",
                    self.reconnect.max_attempts
                );
                self.state = StreamState::Exited;
                return Err(ListenerError::ReconnectLimitExceeded(
                    self.connection.attempt_count,
                ));
            }

            info!(
                "reconnecting in {}",
                humantime::format_duration(self.reconnect.delay)
            );
            tokio::select! {
                biased;
                _ = shutdown_requested(self.shutdown.clone()) => {
                    self.stop();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.reconnect.delay) => {}
            }
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn stop(&mut self) {
        info!("shutdown requested, stream client stopped");
        self.state = StreamState::Disconnected;
        self.connection.subscribed_hosts.clear();
    }

    async fn connect_and_listen(&mut self) -> Result<SessionEnd, ListenerError> {
        self.state = StreamState::Connecting;
        let mut connection = tokio::select! {
            biased;
            _ = shutdown_requested(self.shutdown.clone()) => return Ok(SessionEnd::Shutdown),
            connection = self.connector.connect(self.endpoint.as_str()) => connection?,
        };

        for host in &self.collectors {
            connection.subscribe(host).await?;
            self.connection.subscribed_hosts.insert(host.clone());
            info!("subscribed to collector: {}", host);
        }
        self.state = StreamState::Subscribed;

        let mut frames = Box::pin(listen(connection));
        self.state = StreamState::Streaming;

        loop {
            // checked between frames only, never while a frame is in flight
            let frame = tokio::select! {
                biased;
                _ = shutdown_requested(self.shutdown.clone()) => return Ok(SessionEnd::Shutdown),
                frame = frames.next() => frame,
            };
            let Some(frame) = frame else {
                return Ok(SessionEnd::Closed);
            };
            if let Err(e) = self.handle_frame(frame?.as_slice()).await {
                if e.is_frame_local() {
                    warn!("skipping frame: {}", e);
                } else {
                    error!("error processing frame: {}", e);
                }
            }
        }
    }

    /// Process one frame, converting a panic into [ListenerError::UnexpectedError].
    async fn handle_frame(&self, frame: &[u8]) -> Result<usize, ListenerError> {
        match AssertUnwindSafe(self.process_frame(frame))
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ListenerError::UnexpectedError(msg))
            }
        }
    }

    /// Decode, match and dispatch one frame. Returns the number of events
    /// dispatched.
    async fn process_frame(&self, frame: &[u8]) -> Result<usize, ListenerError> {
        let frame: StreamFrame = serde_json::from_slice(frame)?;

        if frame.is_error() {
            warn!(
                "stream reported an error: {}",
                frame.data.map(|d| d.to_string()).unwrap_or_default()
            );
            return Ok(0);
        }
        if !frame.is_message() {
            debug!("ignoring frame of type {}", frame.frame_type);
            return Ok(0);
        }

        self.counters.record_raw_message();

        let data = frame.data.ok_or_else(|| {
            ListenerError::UnexpectedError("stream message without data".to_string())
        })?;
        let update: RawUpdate = serde_json::from_value(data)?;

        let events = match_update(&update, &self.watchlist);
        if events.is_empty() {
            return Ok(0);
        }

        self.counters.record_filtered(update.host());
        for event in &events {
            info!(
                "BGP {}: {} via AS{} from {}",
                event.kind,
                event.prefix,
                event
                    .origin_asn
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                event.host
            );
            self.dispatcher.deliver(event).await;
        }
        Ok(events.len())
    }
}
