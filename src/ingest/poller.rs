// src/ingest/poller.rs
//! Poll loop: fetch, count consecutive failures, sleep between cycles, stop
//! on request or when the retry budget is spent.
//!
//! The loop is consumed as a pull-based sequence through
//! [`PollLoop::next_listing`]. Each call yields the next successfully fetched
//! listing or `None` once the loop has stopped.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::watch;

use crate::ingest::types::{Listing, QueryParams, TenderSource};

#[derive(Clone, Copy, Debug)]
pub struct PollCfg {
    pub period: Duration,
    pub max_retries: u32,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(3600),
            max_retries: 5,
        }
    }
}

/// Why the loop reached its terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    RetriesExhausted { attempts: u32 },
}

/// Raises the stop signal. Cheap to clone; any clone may be moved into
/// another task (e.g. a Ctrl-C listener).
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

enum State {
    Running,
    Stopped(StopReason),
}

pub struct PollLoop<S> {
    source: S,
    params: QueryParams,
    cfg: PollCfg,
    state: State,
    retries: u32,
    last_error: Option<String>,
    // Set after an emitted listing; the next pull sleeps before fetching.
    sleep_pending: bool,
    stop_rx: watch::Receiver<bool>,
    // Keeps the channel open even if every external handle is dropped.
    stop_tx: Arc<watch::Sender<bool>>,
}

impl<S: TenderSource> PollLoop<S> {
    pub fn new(source: S, params: QueryParams, cfg: PollCfg) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            source,
            params,
            cfg,
            state: State::Running,
            retries: 0,
            last_error: None,
            sleep_pending: false,
            stop_rx: rx,
            stop_tx: Arc::new(tx),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Consecutive failures since the last successful fetch.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Rendered error of the most recent failed fetch, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.state {
            State::Running => None,
            State::Stopped(r) => Some(r),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn halt(&mut self, reason: StopReason) {
        match reason {
            StopReason::Cancelled => {
                tracing::info!(source = self.source.name(), "stop requested, poll loop stopped");
            }
            StopReason::RetriesExhausted { attempts } => {
                tracing::warn!(
                    source = self.source.name(),
                    attempts,
                    "max retries reached, poll loop stopped"
                );
            }
        }
        self.state = State::Stopped(reason);
    }

    /// Sleep for one period unless a stop arrives first. Returns `false` if
    /// the sleep was cut short by a stop request.
    async fn sleep_or_stop(&mut self) -> bool {
        if self.stop_requested() {
            return false;
        }
        let period = self.cfg.period;
        tokio::select! {
            _ = tokio::time::sleep(period) => true,
            _ = self.stop_rx.wait_for(|stop| *stop) => false,
        }
    }

    /// Next successfully fetched listing, or `None` once stopped.
    pub async fn next_listing(&mut self) -> Option<Listing> {
        loop {
            if let State::Stopped(_) = self.state {
                return None;
            }

            if self.sleep_pending {
                self.sleep_pending = false;
                if !self.sleep_or_stop().await {
                    self.halt(StopReason::Cancelled);
                    return None;
                }
            }

            if self.stop_requested() {
                self.halt(StopReason::Cancelled);
                return None;
            }

            match self.source.fetch(&self.params).await {
                Ok(listing) => {
                    self.retries = 0;
                    self.sleep_pending = true;
                    tracing::debug!(
                        source = self.source.name(),
                        tenders = listing.len(),
                        "fetched listing"
                    );
                    return Some(listing);
                }
                Err(e) => {
                    self.retries += 1;
                    self.last_error = Some(e.to_string());
                    counter!("tender_fetch_errors_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        source = self.source.name(),
                        attempt = self.retries,
                        max_retries = self.cfg.max_retries,
                        "error fetching tenders"
                    );
                    if self.retries >= self.cfg.max_retries {
                        self.halt(StopReason::RetriesExhausted {
                            attempts: self.retries,
                        });
                        return None;
                    }
                    // TODO: retries are immediate; add exponential backoff
                    // between attempts so a sustained outage is not hammered.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::ingest::types::Tender;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<Listing, SourceError>>>,
    }

    #[async_trait::async_trait]
    impl TenderSource for Scripted {
        async fn fetch(&self, _params: &QueryParams) -> Result<Listing, SourceError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Decode("script exhausted".into())))
        }
        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn fast_cfg(max_retries: u32) -> PollCfg {
        PollCfg {
            period: Duration::from_millis(1),
            max_retries,
        }
    }

    #[tokio::test]
    async fn retry_counter_resets_after_success() {
        let src = Scripted {
            replies: Mutex::new(VecDeque::from(vec![
                Err(SourceError::Decode("x".into())),
                Err(SourceError::Decode("x".into())),
                Ok(vec![Tender::new("1", "Curso")]),
            ])),
        };
        let mut pl = PollLoop::new(src, QueryParams::new(), fast_cfg(5));
        assert!(pl.next_listing().await.is_some());
        assert_eq!(pl.retries(), 0);
        assert_eq!(pl.stop_reason(), None);
    }

    #[tokio::test]
    async fn stop_before_first_fetch_emits_nothing() {
        let src = Scripted {
            replies: Mutex::new(VecDeque::from(vec![Ok(vec![])])),
        };
        let mut pl = PollLoop::new(src, QueryParams::new(), fast_cfg(5));
        pl.stop_handle().stop();
        assert!(pl.next_listing().await.is_none());
        assert_eq!(pl.stop_reason(), Some(StopReason::Cancelled));
        // Stopped is terminal.
        assert!(pl.next_listing().await.is_none());
    }
}
