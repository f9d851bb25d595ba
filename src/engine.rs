//! Poll loop: fixed jittered cadence driving fetch → process → persist ticks.
//!
//! One tick is fully sequential: fetch every new message, handle them in
//! ascending id order, persist the cursor once. A tick error puts the loop
//! into recovery (log, fixed pause) and never terminates it; cancellation is
//! observed only at the sleeping boundary, so an in-flight tick always runs
//! to completion.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::PollConfig;
use crate::cooldown::CooldownGate;
use crate::dispatch::{Destination, Dispatcher};
use crate::extract;
use crate::ingest;
use crate::ingest::types::MessageSource;
use crate::state::{Cursor, CursorStore};

const RECOVERY_PAUSE: Duration = Duration::from_secs(10);

/// Where the loop currently is; transitions are traced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Processing,
    Persisting,
    Sleeping,
    Recover,
}

/// What one tick did. Returned by [`Engine::run_tick`] so a single tick is
/// testable without the loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub signals: usize,
    pub deliveries: usize,
    pub suppressed: usize,
}

pub struct Engine<S: MessageSource> {
    source: S,
    destinations: Vec<Box<dyn Destination>>,
    dispatcher: Dispatcher,
    store: CursorStore,
    cursor: Cursor,
    gate: CooldownGate,
    fetch_limit: usize,
    state: LoopState,
}

impl<S: MessageSource> Engine<S> {
    pub fn new(
        source: S,
        destinations: Vec<Box<dyn Destination>>,
        dispatcher: Dispatcher,
        store: CursorStore,
        cooldown_secs: i64,
        fetch_limit: usize,
    ) -> Self {
        let cursor = store.load();
        let gate = CooldownGate::new(cooldown_secs).with_last_dispatch(cursor.last_dispatch_time);
        Self {
            source,
            destinations,
            dispatcher,
            store,
            cursor,
            gate,
            fetch_limit,
            state: LoopState::Idle,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// First-run baseline: point the cursor at the newest existing message so
    /// history predating this run is never reacted to. Failure here is
    /// survivable; the next tick simply starts from scratch.
    pub async fn seed_baseline(&mut self) {
        if self.cursor.last_id.is_some() {
            return;
        }
        match self.source.fetch_after(None, 1).await {
            Ok(page) => {
                if let Some(max_id) = page.iter().map(|m| m.id).max() {
                    self.cursor.last_id = Some(max_id);
                    if let Err(e) = self.store.save(&self.cursor) {
                        warn!(error = %e, "could not persist seeded cursor");
                    }
                    info!(last_id = max_id, "seeded cursor at newest existing message");
                }
            }
            Err(e) => warn!(error = %e, "could not seed baseline cursor"),
        }
    }

    /// One full tick: fetch, process in ascending id order, persist once.
    pub async fn run_tick(&mut self) -> anyhow::Result<TickReport> {
        self.transition(LoopState::Fetching);
        let messages = self
            .source
            .fetch_after(self.cursor.last_id, self.fetch_limit)
            .await?;

        self.transition(LoopState::Processing);
        let mut report = TickReport {
            fetched: messages.len(),
            ..TickReport::default()
        };
        let mut max_seen = self.cursor.last_id.unwrap_or(0);

        for msg in &messages {
            max_seen = max_seen.max(msg.id);
            let now = Utc::now();

            let text = ingest::message_text(msg);
            if text.is_empty() {
                continue;
            }
            let Some(signal) = extract::extract_signal(&text) else {
                trace!(id = msg.id, "no signal in message");
                continue;
            };

            report.signals += 1;
            info!(
                id = msg.id,
                base = %signal.base,
                side = %signal.side,
                entry = signal.entry,
                "signal extracted"
            );

            // Cooldown drops the signal, never the progress.
            if !self.gate.permits(now) {
                debug!(id = msg.id, "inside cooldown window, dropping signal");
                report.suppressed += 1;
                continue;
            }

            let outcomes = self
                .dispatcher
                .dispatch_all(&self.destinations, &signal, now)
                .await;
            report.deliveries += outcomes.len();

            let dispatched_at = Utc::now();
            self.gate.record(dispatched_at);
            self.cursor.last_dispatch_time = dispatched_at.timestamp_millis() as f64 / 1000.0;
        }

        if !messages.is_empty() {
            self.transition(LoopState::Persisting);
            self.cursor.last_id = Some(max_seen);
            self.store.save(&self.cursor)?;
        }

        Ok(report)
    }

    /// Drive ticks on the cadence until `shutdown` flips to true. The signal
    /// is only observed while sleeping.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>, poll: PollConfig) {
        info!("watching channel for trade alerts");
        loop {
            match self.run_tick().await {
                Ok(report) if report.fetched == 0 => debug!("no new messages"),
                Ok(report) => info!(
                    fetched = report.fetched,
                    signals = report.signals,
                    deliveries = report.deliveries,
                    suppressed = report.suppressed,
                    "tick complete"
                ),
                Err(e) => {
                    self.transition(LoopState::Recover);
                    error!(error = ?e, "tick failed, pausing before next poll");
                    tokio::time::sleep(RECOVERY_PAUSE).await;
                }
            }

            self.transition(LoopState::Sleeping);
            if *shutdown.borrow_and_update() {
                break;
            }
            let jitter = if poll.jitter_max_secs > 0 {
                rand::rng().random_range(0.0..=poll.jitter_max_secs as f64)
            } else {
                0.0
            };
            let delay = next_tick_delay(unix_now(), poll, jitter);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow_and_update() {
                        break;
                    }
                }
            }
            self.transition(LoopState::Idle);
        }
        info!("shutdown requested, leaving poll loop");
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            trace!(from = ?self.state, to = ?next, "loop state");
            self.state = next;
        }
    }
}

/// Delay until the next wall-clock-aligned tick: the next multiple of the
/// base period, shifted by the offset, plus caller-supplied jitter. Aligning
/// to the grid (rather than sleeping a fixed interval) keeps the cadence
/// steady regardless of how long a tick took.
pub fn next_tick_delay(now_unix: f64, poll: PollConfig, jitter_secs: f64) -> Duration {
    let base = poll.base_secs.max(1) as f64;
    let offset = poll.offset_secs as f64;
    let period_start = (now_unix / base).floor() * base;
    let mut next_tick = period_start + base + offset;
    if now_unix < period_start + offset {
        next_tick = period_start + offset;
    }
    Duration::from_secs_f64((next_tick - now_unix + jitter_secs).max(0.0))
}

fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
