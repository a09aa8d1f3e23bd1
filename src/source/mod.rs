// src/source/mod.rs
//
// Periodic feed polling with a loading / success / error lifecycle.
//
// One poller task owns all state transitions. Each fetch runs in its own task
// tagged with a request id; only the most recently issued id may change state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{self, MissedTickBehavior},
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetch::CsvFeed;
use crate::process::{parse_with, CsvDialect, RawRow};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// What consumers see. `rows` is an immutable snapshot shared by `Arc`;
/// it survives `Loading` and `Error` so the last good data stays displayable.
#[derive(Debug, Clone)]
pub struct FetchState {
    pub status: FetchStatus,
    pub rows: Arc<[RawRow]>,
    pub error_message: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    /// Most recently issued request.
    pub request_id: u64,
}

impl Default for FetchState {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            rows: Arc::from(Vec::new()),
            error_message: None,
            last_success: None,
            request_id: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub interval: Duration,
    pub dialect: CsvDialect,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            dialect: CsvDialect::default(),
        }
    }
}

/// Handle to an active polling source.
///
/// Polling stops when the handle is dropped or [`DataSource::deactivate`] is
/// awaited; in-flight fetches are aborted with it and never touch state again.
pub struct DataSource {
    state: watch::Receiver<FetchState>,
    refresh_tx: mpsc::UnboundedSender<()>,
    task: Option<JoinHandle<()>>,
}

impl DataSource {
    /// Start polling `feed`: one fetch right away, then one per interval.
    /// Must be called from within a tokio runtime.
    pub fn activate<F: CsvFeed + 'static>(feed: F, options: SourceOptions) -> Self {
        // loading from the start; the poller's first fetch is request 1
        let (state_tx, state_rx) = watch::channel(FetchState {
            status: FetchStatus::Loading,
            request_id: 1,
            ..FetchState::default()
        });
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let interval = options.interval.max(MIN_REFRESH_INTERVAL);

        let poller = Poller {
            feed: Arc::new(feed),
            dialect: options.dialect,
            state: state_tx,
            issued: 0,
        };
        let task = tokio::spawn(poller.run(interval, refresh_rx));
        info!(?interval, dialect = ?options.dialect, "data source activated");

        Self {
            state: state_rx,
            refresh_tx,
            task: Some(task),
        }
    }

    /// Issue a new fetch now. Supersedes any fetch still in flight.
    pub fn refresh(&self) {
        if self.refresh_tx.send(()).is_err() {
            debug!("refresh ignored; poller has stopped");
        }
    }

    pub fn snapshot(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.state.borrow().status
    }

    pub fn rows(&self) -> Arc<[RawRow]> {
        Arc::clone(&self.state.borrow().rows)
    }

    pub fn error_message(&self) -> Option<String> {
        self.state.borrow().error_message.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.clone()
    }

    /// Current state first, then every change.
    pub fn updates(&self) -> WatchStream<FetchState> {
        WatchStream::new(self.state.clone())
    }

    /// Stop polling and wait until the poller is gone. No state change can
    /// happen once this returns.
    pub async fn deactivate(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "poller ended abnormally");
                }
            }
        }
        info!("data source deactivated");
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

type FetchOutcome = (u64, Result<Vec<RawRow>, FetchError>);

struct Poller<F> {
    feed: Arc<F>,
    dialect: CsvDialect,
    state: watch::Sender<FetchState>,
    issued: u64,
}

impl<F: CsvFeed + 'static> Poller<F> {
    async fn run(mut self, interval: Duration, mut refresh_rx: mpsc::UnboundedReceiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // dropped with the poller, which aborts whatever is still running
        let mut in_flight: JoinSet<FetchOutcome> = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.issue(&mut in_flight),
                msg = refresh_rx.recv() => match msg {
                    Some(()) => self.issue(&mut in_flight),
                    None => break,
                },
                Some(joined) = in_flight.join_next() => match joined {
                    Ok((id, result)) => self.apply(id, result),
                    Err(e) if e.is_cancelled() => debug!("superseded fetch cancelled"),
                    Err(e) => warn!(error = %e, "fetch task failed"),
                },
            }
        }
    }

    fn issue(&mut self, in_flight: &mut JoinSet<FetchOutcome>) {
        self.issued += 1;
        let id = self.issued;
        self.state.send_modify(|s| {
            s.status = FetchStatus::Loading;
            s.error_message = None;
            s.request_id = id;
        });

        // older requests can no longer win
        in_flight.abort_all();

        let feed = Arc::clone(&self.feed);
        let dialect = self.dialect;
        in_flight.spawn(async move {
            let result = feed
                .fetch_csv()
                .await
                .map(|body| parse_with(&body, dialect));
            (id, result)
        });
        debug!(request = id, in_flight = in_flight.len(), "fetch issued");
    }

    fn apply(&mut self, id: u64, result: Result<Vec<RawRow>, FetchError>) {
        if id != self.issued {
            debug!(request = id, latest = self.issued, "discarding superseded response");
            return;
        }

        match result {
            Ok(rows) => {
                info!(request = id, rows = rows.len(), "feed refreshed");
                let rows: Arc<[RawRow]> = rows.into();
                self.state.send_modify(|s| {
                    s.status = FetchStatus::Success;
                    s.rows = rows;
                    s.error_message = None;
                    s.last_success = Some(Utc::now());
                });
            }
            Err(e) => {
                warn!(request = id, error = %e, "feed fetch failed; keeping last good rows");
                self.state.send_modify(|s| {
                    s.status = FetchStatus::Error;
                    s.error_message = Some(e.to_string());
                });
            }
        }
    }
}
