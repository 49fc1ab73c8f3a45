//! Notification bus for waiting-room streams.
//!
//! Maps a channel key (the room slug) to the set of waiters currently
//! holding a stream open for it, and fans a one-shot event out to them.
//!
//! # Waiters
//!
//! Each waiter is an `mpsc` sender feeding one response stream plus two
//! tasks:
//! - a keep-alive ticker pushing `: ping` comments every interval
//! - a disconnect watcher removing the waiter when its stream is dropped
//!
//! Both tasks share a per-waiter `retire` token, a child of the bus
//! shutdown token, so removing a waiter cancels them together.
//!
//! # Closing
//!
//! A waiter's connection is closed by dropping every sender that feeds it.
//! The registry holds one, the ticker holds the other. Once both are gone
//! the stream sees end-of-channel after draining anything already queued.
//!
//! The registry mutex is never held across an `.await`, and delivery uses
//! `try_send`, so a broadcast pass never suspends.

use crate::config::MAX_WAITER_KEEPALIVE_SECONDS;
use crate::models::{ActivePayload, ErrorPayload};
use crate::observability::metrics;
use axum::response::sse::Event;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Per-waiter stream buffer. Only pings queue up before the terminal event.
pub const WAITER_BUFFER: usize = 8;

/// Event pushed to a waiting-room stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitEvent {
    /// A meeting became active. Terminal.
    Active(ActivePayload),

    /// The room cannot be waited on. Terminal.
    Error(ErrorPayload),

    /// Comment line keeping intermediaries from closing an idle stream.
    KeepAlive { at_ms: i64 },
}

impl WaitEvent {
    pub fn active(meet_url: impl Into<String>) -> Self {
        WaitEvent::Active(ActivePayload {
            meet_url: meet_url.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        WaitEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn keep_alive() -> Self {
        WaitEvent::KeepAlive {
            at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Whether the stream ends after this event.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitEvent::KeepAlive { .. })
    }

    /// Event name on the wire (`ping` for the unnamed comment).
    pub fn name(&self) -> &'static str {
        match self {
            WaitEvent::Active(_) => "active",
            WaitEvent::Error(_) => "error",
            WaitEvent::KeepAlive { .. } => "ping",
        }
    }

    /// Render as a server-sent event.
    pub fn to_sse(&self) -> Result<Event, axum::Error> {
        match self {
            WaitEvent::Active(payload) => Event::default().event("active").json_data(payload),
            WaitEvent::Error(payload) => Event::default().event("error").json_data(payload),
            WaitEvent::KeepAlive { at_ms } => Ok(Event::default().comment(format!("ping {at_ms}"))),
        }
    }
}

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct WaiterEntry {
    tx: mpsc::Sender<WaitEvent>,
    retire: CancellationToken,
}

impl WaiterEntry {
    /// Stop the waiter's tasks and drop the registry's sender.
    fn close(self) {
        self.retire.cancel();
    }
}

type Channels = HashMap<String, HashMap<u64, WaiterEntry>>;

/// Registry of waiting-room channels.
pub struct NotificationBus {
    channels: Mutex<Channels>,
    next_waiter_id: AtomicU64,
    keepalive: Duration,
    shutdown: CancellationToken,
}

impl NotificationBus {
    /// `keepalive` is clamped to between one second and one hour.
    pub fn new(keepalive: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(1),
            keepalive: keepalive.clamp(
                Duration::from_secs(1),
                Duration::from_secs(MAX_WAITER_KEEPALIVE_SECONDS),
            ),
            shutdown: CancellationToken::new(),
        }
    }

    /// Keep-alive interval for new waiters.
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    fn channels(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter under `key`, creating the channel if absent.
    ///
    /// `disconnect` must fire when the waiter's connection goes away; the
    /// waiter and its keep-alive timer are then removed. Returns the waiter id.
    #[instrument(skip_all, fields(key = %key))]
    pub fn subscribe(
        self: &Arc<Self>,
        key: &str,
        tx: mpsc::Sender<WaitEvent>,
        disconnect: CancellationToken,
    ) -> u64 {
        let waiter_id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);

        if self.shutdown.is_cancelled() {
            debug!(target: "room.bus", "Bus closed, not registering waiter");
            return waiter_id;
        }

        let retire = self.shutdown.child_token();
        let total = {
            let mut channels = self.channels();
            channels.entry(key.to_string()).or_default().insert(
                waiter_id,
                WaiterEntry {
                    tx: tx.clone(),
                    retire: retire.clone(),
                },
            );
            total_waiters(&channels)
        };
        metrics::set_active_waiters(total);

        debug!(target: "room.bus", waiter_id, waiters = total, "Waiter subscribed");

        tokio::spawn(keep_alive(tx, retire.clone(), self.keepalive()));

        let bus = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::select! {
                () = retire.cancelled() => {}
                () = disconnect.cancelled() => {
                    bus.remove_waiter(&key, waiter_id, "disconnected");
                }
            }
        });

        waiter_id
    }

    /// Deliver `event` to every waiter under `key`.
    ///
    /// Best-effort: a waiter whose buffer is full or whose stream is gone is
    /// removed without affecting the rest. A terminal event closes every
    /// waiter and retires the channel. Unknown key: no-op.
    #[instrument(skip_all, fields(key = %key, event = event.name()))]
    pub fn broadcast(&self, key: &str, event: WaitEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let total = {
            let mut channels = self.channels();

            if event.is_terminal() {
                // The removed set is the snapshot; late subscribers start a new channel.
                let Some(waiters) = channels.remove(key) else {
                    return report;
                };
                for (_, waiter) in waiters {
                    match waiter.tx.try_send(event.clone()) {
                        Ok(()) => report.delivered += 1,
                        Err(_) => report.failed += 1,
                    }
                    waiter.close();
                }
            } else {
                let Some(waiters) = channels.get_mut(key) else {
                    return report;
                };
                let snapshot: Vec<u64> = waiters.keys().copied().collect();
                for waiter_id in snapshot {
                    let delivered = waiters
                        .get(&waiter_id)
                        .is_some_and(|w| w.tx.try_send(event.clone()).is_ok());
                    if delivered {
                        report.delivered += 1;
                    } else if let Some(waiter) = waiters.remove(&waiter_id) {
                        report.failed += 1;
                        waiter.close();
                    }
                }
                if waiters.is_empty() {
                    channels.remove(key);
                }
            }

            total_waiters(&channels)
        };

        metrics::record_broadcast(event.name(), report.delivered, report.failed);
        metrics::set_active_waiters(total);

        info!(
            target: "room.bus",
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );

        report
    }

    /// Remove one waiter, dropping its channel if it was the last.
    fn remove_waiter(&self, key: &str, waiter_id: u64, reason: &'static str) {
        let (removed, total) = {
            let mut channels = self.channels();
            let mut removed = None;
            if let Some(waiters) = channels.get_mut(key) {
                removed = waiters.remove(&waiter_id);
                if waiters.is_empty() {
                    channels.remove(key);
                }
            }
            (removed, total_waiters(&channels))
        };

        if let Some(waiter) = removed {
            waiter.close();
            metrics::record_waiter_removed(reason);
            metrics::set_active_waiters(total);
            debug!(target: "room.bus", key = %key, waiter_id, reason, "Waiter removed");
        }
    }

    /// Waiters currently registered under `key`.
    pub fn waiter_count(&self, key: &str) -> usize {
        self.channels().get(key).map_or(0, HashMap::len)
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }

    /// Waiters across all channels.
    pub fn total_waiters(&self) -> usize {
        total_waiters(&self.channels())
    }

    /// Close every waiter and refuse new ones. Used at shutdown.
    pub fn close_all(&self) {
        self.shutdown.cancel();
        let drained: Vec<_> = self.channels().drain().collect();
        let closed: usize = drained.iter().map(|(_, waiters)| waiters.len()).sum();
        for (_, waiters) in drained {
            for (_, waiter) in waiters {
                waiter.close();
            }
        }
        metrics::set_active_waiters(0);
        info!(target: "room.bus", closed, "Notification bus closed");
    }
}

fn total_waiters(channels: &Channels) -> usize {
    channels.values().map(HashMap::len).sum()
}

/// Push a ping every `period` until `retire` fires or the stream is gone.
async fn keep_alive(tx: mpsc::Sender<WaitEvent>, retire: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = retire.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(WaitEvent::keep_alive()) {
                    break;
                }
            }
        }
    }
}
