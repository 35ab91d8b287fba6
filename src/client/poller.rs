//! Timer-driven conversation poller.
//!
//! Polls while the conversation is active and, after it reaches a terminal
//! status, keeps draining for up to `drain_cap` more requests while
//! optimistic entries remain unconfirmed.
//!
//! A single busy flag guards dispatch: a tick that fires while the previous
//! request is still outstanding is dropped (never queued), so the effective
//! request interval is `max(period, round-trip time)`. A failed fetch is
//! logged and clears the flag like any other completion.
//!
//! Cancelling the poller drops the in-flight request with the timer, so a
//! late response is never applied after shutdown.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::client::conversation::{with_conversation, SharedConversation};
use crate::client::reconciler::{PollSnapshot, Reconciler};
use crate::client::source::ConversationSource;
use crate::config::PollerConfig;
use crate::models::message::{ConversationState, PendingMessage};
use crate::models::session::SessionStatus;
use crate::Result;

type FetchFuture = Pin<Box<dyn Future<Output = Result<ConversationState>> + Send>>;

/// Fired when `(status, confirmed count)` changes between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal {
    /// Newly observed status.
    pub status: SessionStatus,
    /// Newly observed confirmed-message count.
    pub confirmed_count: usize,
}

/// Why the poll loop ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    #[default]
    Cancelled,
    /// Terminal status reached with nothing left pending.
    Settled,
    /// Terminal status reached and the drain cap ran out with entries
    /// still pending.
    DrainExhausted,
}

/// Counters describing one poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Requests dispatched.
    pub requests: u32,
    /// Requests that failed.
    pub failures: u32,
    /// Ticks dropped because a request was in flight.
    pub skipped_ticks: u32,
    /// Requests completed while the conversation was terminal.
    pub drain_polls: u32,
    /// Why the loop ended.
    pub stop: StopReason,
    /// Pending entries abandoned when the drain cap ran out.
    pub abandoned: Vec<PendingMessage>,
}

/// Polls one conversation and reconciles each response.
pub struct Poller {
    source: Arc<dyn ConversationSource>,
    conversation: SharedConversation,
    period: Duration,
    drain_cap: u32,
    reconciler: Reconciler,
    refresh_tx: Option<mpsc::Sender<RefreshSignal>>,
    busy: bool,
    drain_polls: u32,
}

impl Poller {
    /// Create a poller; the refresh snapshot is seeded from what
    /// `conversation` currently shows.
    #[must_use]
    pub fn new(
        source: Arc<dyn ConversationSource>,
        conversation: SharedConversation,
        config: &PollerConfig,
    ) -> Self {
        let snapshot = with_conversation(&conversation, |c| PollSnapshot {
            status: c.status(),
            confirmed_count: c.messages().len(),
        });
        Self {
            source,
            conversation,
            period: config.period(),
            drain_cap: config.drain_cap,
            reconciler: Reconciler::seeded(snapshot),
            refresh_tx: None,
            busy: false,
            drain_polls: 0,
        }
    }

    /// Deliver refresh signals on `tx`. Signals are dropped if the
    /// receiver lags.
    #[must_use]
    pub fn with_refresh_signal(mut self, tx: mpsc::Sender<RefreshSignal>) -> Self {
        self.refresh_tx = Some(tx);
        self
    }

    /// Shared conversation this poller updates.
    #[must_use]
    pub fn conversation(&self) -> SharedConversation {
        Arc::clone(&self.conversation)
    }

    /// Spawn the poll loop as a background task.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<PollSummary> {
        tokio::spawn(self.run(cancel).instrument(info_span!("poller")))
    }

    /// Run the poll loop until it settles, drains, or is cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> PollSummary {
        let mut summary = PollSummary::default();
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<FetchFuture> = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("poller: cancellation received, stopping");
                    summary.stop = StopReason::Cancelled;
                    break;
                }

                result = await_fetch(&mut in_flight), if self.busy => {
                    in_flight = None;
                    self.busy = false;
                    self.apply(result, &mut summary);

                    if let Some(reason) = self.stop_reason() {
                        summary.stop = reason;
                        break;
                    }
                }

                _ = interval.tick() => {
                    if self.busy {
                        summary.skipped_ticks += 1;
                        debug!("poller: request in flight, tick dropped");
                        continue;
                    }
                    if let Some(reason) = self.stop_reason() {
                        summary.stop = reason;
                        break;
                    }

                    self.busy = true;
                    summary.requests += 1;
                    let source = Arc::clone(&self.source);
                    in_flight = Some(Box::pin(async move { source.fetch().await }));
                }
            }
        }

        summary.drain_polls = self.drain_polls;
        if summary.stop == StopReason::DrainExhausted {
            summary.abandoned =
                with_conversation(&self.conversation, |c| std::mem::take(c.pending_mut()));
            warn!(
                abandoned = summary.abandoned.len(),
                drain_polls = self.drain_polls,
                "poller: drain cap reached with unconfirmed messages, dropping them"
            );
        }

        info!(
            requests = summary.requests,
            failures = summary.failures,
            skipped_ticks = summary.skipped_ticks,
            stop = ?summary.stop,
            "poller: stopped"
        );
        summary
    }

    /// `None` while polling should continue.
    fn stop_reason(&self) -> Option<StopReason> {
        let (status, pending) =
            with_conversation(&self.conversation, |c| (c.status(), c.pending().len()));

        if !status.is_terminal() {
            None
        } else if pending == 0 {
            Some(StopReason::Settled)
        } else if self.drain_polls >= self.drain_cap {
            Some(StopReason::DrainExhausted)
        } else {
            None
        }
    }

    fn apply(&mut self, result: Result<ConversationState>, summary: &mut PollSummary) {
        match result {
            Ok(state) => {
                let reconciler = &mut self.reconciler;
                let outcome = with_conversation(&self.conversation, |c| reconciler.reconcile(c, state));

                if !outcome.retired.is_empty() {
                    debug!(
                        retired = outcome.retired.len(),
                        "poller: pending messages confirmed"
                    );
                }
                if outcome.refresh {
                    if let Some(snapshot) = self.reconciler.previous() {
                        self.signal_refresh(snapshot);
                    }
                }
            }
            Err(err) => {
                summary.failures += 1;
                warn!(%err, "poller: fetch failed");
            }
        }

        // Every completed request after the terminal status counts toward
        // the drain cap, failed ones included.
        let terminal = with_conversation(&self.conversation, |c| c.status().is_terminal());
        if terminal {
            self.drain_polls += 1;
        }
    }

    fn signal_refresh(&mut self, snapshot: PollSnapshot) {
        let Some(tx) = &self.refresh_tx else {
            return;
        };

        let signal = RefreshSignal {
            status: snapshot.status,
            confirmed_count: snapshot.confirmed_count,
        };
        match tx.try_send(signal) {
            Ok(()) => debug!(?signal, "poller: refresh signalled"),
            Err(TrySendError::Full(_)) => debug!("poller: refresh receiver lagging, signal dropped"),
            Err(TrySendError::Closed(_)) => {
                debug!("poller: refresh receiver closed");
                self.refresh_tx = None;
            }
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("period", &self.period)
            .field("drain_cap", &self.drain_cap)
            .field("busy", &self.busy)
            .field("drain_polls", &self.drain_polls)
            .finish_non_exhaustive()
    }
}

async fn await_fetch(in_flight: &mut Option<FetchFuture>) -> Result<ConversationState> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
