//! Streaming ingestion engine
//!
//! Keeps one subscription alive against the inbound feed and hands every
//! received message to a single worker through a bounded queue.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  signals  ┌──────────────┐  bounded queue  ┌──────────────┐
//! │ FeedSession  │ ────────► │ receive loop │ ──────────────► │    worker    │
//! │ (relay REQ)  │           │ idle checks  │   (blocks when  │ process()    │
//! └──────────────┘           │ heartbeat    │    full)        │ watermark    │
//!                            └──────────────┘                 └──────────────┘
//! ```
//!
//! ## States
//!
//! ```text
//! Disconnected ─► Connecting ─► Subscribed ─► Draining ─► Disconnected ─► ...
//!                      │                                       ▲
//!                      └──────────── connect failed ───────────┘
//! any state ─► ShuttingDown (cancellation token fired)
//! ```
//!
//! A session ends on a transport error (immediately), when the feed closes
//! the subscription, or after more than `max_idle_checks` consecutive idle
//! windows without a message. Ending a session closes the queue; the worker
//! drains what is already buffered and hands the watermark back before the
//! next connection subscribes from it.

mod feed;
mod watermark;

pub use feed::{FeedConnector, FeedSession, FeedSignal};
pub use watermark::Watermark;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::heartbeat::Heartbeat;
use crate::pipeline::ProcessOutcome;
use crate::types::{Filter, Kind, Message, Timestamp};

/// Work done for each received message.
#[async_trait]
pub trait MessageProcessor: Send + Sync + 'static {
    /// Handle one message. `Err` leaves the watermark where it was.
    async fn process(&self, message: &Message) -> Result<ProcessOutcome>;

    /// Called after the watermark moved forward.
    async fn checkpoint(&self, _watermark: Timestamp) {}
}

/// Engine state, observable through [`IngestEngine::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Subscribed,
    Draining,
    ShuttingDown,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    ConnectFailed(String),
    SubscribeFailed(String),
    TransportError(String),
    /// The feed closed the subscription or the connection
    FeedClosed(String),
    /// Too many idle checks in a row
    Stale,
    /// The worker went away while messages were still arriving
    WorkerStopped,
    Shutdown,
}

impl SessionEnd {
    fn reached_subscription(&self) -> bool {
        !matches!(
            self,
            SessionEnd::ConnectFailed(_) | SessionEnd::SubscribeFailed(_)
        )
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ConnectFailed(e) => write!(f, "connect failed: {}", e),
            SessionEnd::SubscribeFailed(e) => write!(f, "subscribe failed: {}", e),
            SessionEnd::TransportError(e) => write!(f, "transport error: {}", e),
            SessionEnd::FeedClosed(reason) => write!(f, "feed closed: {}", reason),
            SessionEnd::Stale => f.write_str("stale subscription"),
            SessionEnd::WorkerStopped => f.write_str("worker stopped"),
            SessionEnd::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Tunables, usually built from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub kinds: Vec<Kind>,
    pub queue_capacity: usize,
    /// Length of one idle check window
    pub idle_timeout: Duration,
    /// Consecutive idle windows tolerated before the session is torn down
    pub max_idle_checks: u32,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Added to the watermark when resubscribing
    pub resume_slack_secs: i64,
    pub heartbeat_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            kinds: vec![Kind::TEXT_NOTE, Kind::CHANNEL_MESSAGE],
            queue_capacity: 100,
            idle_timeout: Duration::from_secs(10),
            max_idle_checks: 60,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_delay: Duration::from_secs(5),
            resume_slack_secs: 0,
            heartbeat_interval: Duration::from_secs(300),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let engine = &config.engine;
        Self {
            kinds: config.feed.kinds.iter().copied().map(Kind).collect(),
            queue_capacity: engine.queue_capacity.max(1),
            idle_timeout: Duration::from_secs(engine.idle_timeout_secs),
            max_idle_checks: engine.max_idle_checks,
            reconnect_delay: Duration::from_secs(engine.reconnect_delay_secs),
            max_reconnect_delay: Duration::from_secs(
                engine.max_reconnect_delay_secs.max(engine.reconnect_delay_secs),
            ),
            resume_slack_secs: engine.resume_slack_secs,
            heartbeat_interval: Duration::from_secs(config.heartbeat.interval_secs.max(1)),
        }
    }
}

/// Counters for one run, returned when the engine stops.
#[derive(Debug, Default, Clone)]
pub struct EngineReport {
    /// How each session ended, in order
    pub sessions: Vec<SessionEnd>,
    pub processed: usize,
    pub replied: usize,
    pub skipped: usize,
    pub no_match: usize,
    pub failed: usize,
    pub watermark: Timestamp,
}

#[derive(Debug, Default)]
struct WorkerStats {
    processed: usize,
    replied: usize,
    skipped: usize,
    no_match: usize,
    failed: usize,
}

/// The ingestion engine. Consumed by [`IngestEngine::run`].
pub struct IngestEngine<C: FeedConnector, P: MessageProcessor> {
    connector: C,
    processor: Arc<P>,
    heartbeat: Option<Arc<dyn Heartbeat>>,
    settings: EngineSettings,
    watermark: Watermark,
    state: watch::Sender<EngineState>,
}

impl<C: FeedConnector, P: MessageProcessor> IngestEngine<C, P> {
    pub fn new(connector: C, processor: Arc<P>, settings: EngineSettings, start: Timestamp) -> Self {
        let (state, _) = watch::channel(EngineState::Disconnected);
        Self {
            connector,
            processor,
            heartbeat: None,
            settings,
            watermark: Watermark::new(start),
            state,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Arc<dyn Heartbeat>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Watch state transitions.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    fn transition(&self, next: EngineState) {
        let prev = *self.state.borrow();
        if prev != next {
            debug!(from = ?prev, to = ?next, "Engine state");
            self.state.send_replace(next);
        }
    }

    /// Run until `shutdown` fires. Never fails: every error ends a session
    /// and leads to a reconnect.
    pub async fn run(mut self, shutdown: CancellationToken) -> EngineReport {
        let mut report = EngineReport::default();
        let mut backoff = self.settings.reconnect_delay;
        let period = self.settings.heartbeat_interval;
        let mut heartbeat_ticker = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            feed = self.connector.endpoint(),
            since = %self.watermark.value(),
            "Ingestion engine starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let (end, stats) = self.run_session(&shutdown, &mut heartbeat_ticker).await;
            report.processed += stats.processed;
            report.replied += stats.replied;
            report.skipped += stats.skipped;
            report.no_match += stats.no_match;
            report.failed += stats.failed;

            let stop = end == SessionEnd::Shutdown;
            if end.reached_subscription() {
                backoff = self.settings.reconnect_delay;
            }
            match &end {
                SessionEnd::Shutdown => {}
                SessionEnd::ConnectFailed(_) | SessionEnd::SubscribeFailed(_) => {
                    warn!(feed = self.connector.endpoint(), reason = %end, "Session failed");
                }
                _ => info!(feed = self.connector.endpoint(), reason = %end, "Session ended"),
            }
            report.sessions.push(end);
            if stop {
                break;
            }

            self.transition(EngineState::Disconnected);
            info!(delay_secs = backoff.as_secs(), "Reconnecting after delay");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.cancelled() => break,
            }
            backoff = (backoff * 2).min(self.settings.max_reconnect_delay);
        }

        self.transition(EngineState::ShuttingDown);
        report.watermark = self.watermark.value();
        info!(
            processed = report.processed,
            replied = report.replied,
            watermark = %report.watermark,
            "Ingestion engine stopped"
        );
        report
    }

    async fn run_session(
        &mut self,
        shutdown: &CancellationToken,
        heartbeat_ticker: &mut tokio::time::Interval,
    ) -> (SessionEnd, WorkerStats) {
        self.transition(EngineState::Connecting);
        let connected = tokio::select! {
            result = self.connector.connect() => result,
            _ = shutdown.cancelled() => return (SessionEnd::Shutdown, WorkerStats::default()),
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => return (SessionEnd::ConnectFailed(e.to_string()), WorkerStats::default()),
        };

        let since = self.watermark.since(self.settings.resume_slack_secs);
        let filter = Filter::new(self.settings.kinds.clone()).since(since);
        if let Err(e) = session.subscribe(&filter).await {
            session.close().await;
            return (SessionEnd::SubscribeFailed(e.to_string()), WorkerStats::default());
        }
        self.transition(EngineState::Subscribed);
        info!(feed = self.connector.endpoint(), since = %since, "Subscribed");

        let (tx, rx) = mpsc::channel::<Message>(self.settings.queue_capacity);
        let worker = tokio::spawn(worker_loop(self.processor.clone(), rx, self.watermark));

        let end = self
            .receive_loop(&mut session, &tx, shutdown, heartbeat_ticker)
            .await;

        self.transition(EngineState::Draining);
        session.close().await;
        // the receive loop is the only producer; dropping it closes the queue
        drop(tx);
        let stats = match worker.await {
            Ok((watermark, stats)) => {
                self.watermark = watermark;
                stats
            }
            Err(e) => {
                error!(error = %e, "Worker task failed; keeping previous watermark");
                WorkerStats::default()
            }
        };
        (end, stats)
    }

    async fn receive_loop(
        &self,
        session: &mut C::Session,
        tx: &mpsc::Sender<Message>,
        shutdown: &CancellationToken,
        heartbeat_ticker: &mut tokio::time::Interval,
    ) -> SessionEnd {
        let mut idle_checks: u32 = 0;

        loop {
            let signal = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                _ = heartbeat_ticker.tick() => {
                    self.fire_heartbeat();
                    continue;
                }
                signal = tokio::time::timeout(self.settings.idle_timeout, session.next_signal()) => signal,
            };

            let signal = match signal {
                Ok(Some(signal)) => signal,
                Ok(None) => return SessionEnd::FeedClosed("transport ended".to_string()),
                Err(_elapsed) => {
                    idle_checks += 1;
                    if idle_checks > self.settings.max_idle_checks {
                        warn!(checks = idle_checks, "No messages received, tearing down subscription");
                        return SessionEnd::Stale;
                    }
                    debug!(checks = idle_checks, "Idle check");
                    continue;
                }
            };

            match signal {
                FeedSignal::Message(message) => {
                    idle_checks = 0;
                    debug!(event_id = %message.id, kind = %message.kind, "Received message");
                    tokio::select! {
                        sent = tx.send(*message) => {
                            if sent.is_err() {
                                return SessionEnd::WorkerStopped;
                            }
                        }
                        _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                    }
                }
                FeedSignal::EndOfStoredEvents => info!("Backfill complete"),
                FeedSignal::Notice(notice) => info!(notice = %notice, "Feed notice"),
                FeedSignal::Closed(reason) => return SessionEnd::FeedClosed(reason),
                FeedSignal::TransportError(e) => return SessionEnd::TransportError(e),
            }
        }
    }

    fn fire_heartbeat(&self) {
        let Some(heartbeat) = self.heartbeat.clone() else {
            return;
        };
        tokio::spawn(async move {
            match heartbeat.beat().await {
                Ok(()) => debug!("Heartbeat sent"),
                Err(e) => warn!(error = %e, "Heartbeat failed"),
            }
        });
    }
}

/// Sequential consumer: process, then advance the watermark.
async fn worker_loop<P: MessageProcessor>(
    processor: Arc<P>,
    mut rx: mpsc::Receiver<Message>,
    mut watermark: Watermark,
) -> (Watermark, WorkerStats) {
    let mut stats = WorkerStats::default();

    while let Some(message) = rx.recv().await {
        match processor.process(&message).await {
            Ok(outcome) => {
                stats.processed += 1;
                match &outcome {
                    ProcessOutcome::Replied { .. } => stats.replied += 1,
                    ProcessOutcome::Skipped(_) => stats.skipped += 1,
                    ProcessOutcome::NoMatch => stats.no_match += 1,
                }
                if watermark.advance(message.created_at) {
                    processor.checkpoint(watermark.value()).await;
                }
            }
            Err(e) => {
                stats.failed += 1;
                warn!(event_id = %message.id, stage = "process", error = %e, "Message failed");
            }
        }
    }

    (watermark, stats)
}
