//! Time source for relative timestamps.
//!
//! Rendering code never reads the wall clock directly. It reads a [`SampledNow`], which
//! only moves when its [`TickSource`] ticks: every few seconds in the running client, or
//! on demand in tests. All visible timestamps therefore advance together.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::polling::PollHandle;

/// Anything that can tell the current time
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Start at `now`
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Read side of the sampled "now"
#[derive(Debug, Clone)]
pub struct SampledNow {
    rx: watch::Receiver<DateTime<Utc>>,
}

impl SampledNow {
    /// The most recent sample
    #[must_use]
    pub fn get(&self) -> DateTime<Utc> {
        *self.rx.borrow()
    }

    /// Wait for the next sample. Returns `false` once the source is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Write side of the sampled "now"
#[derive(Debug)]
pub struct TickSource {
    tx: watch::Sender<DateTime<Utc>>,
}

impl TickSource {
    /// Create a source seeded with `initial`
    #[must_use]
    pub fn new(initial: DateTime<Utc>) -> (Self, SampledNow) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, SampledNow { rx })
    }

    /// Publish a new sample
    pub fn tick(&self, now: DateTime<Utc>) {
        self.tx.send_replace(now);
    }

    /// Sample `clock` now and then every `period` until the handle is cancelled
    pub fn spawn(clock: Arc<dyn Clock>, period: Duration) -> (SampledNow, PollHandle) {
        let (source, sampled) = Self::new(clock.now());
        let handle = PollHandle::spawn("clock", move |token| async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and we already sampled.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => source.tick(clock.now()),
                }
            }
        });
        (sampled, handle)
    }
}
