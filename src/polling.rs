//! Polling driver for the open conversation and the global unread badge.
//!
//! Opening a conversation loads it once, sends a read receipt, then starts a timer that
//! re-fetches every couple of seconds. Each cycle runs fetch, then merge, then read
//! receipt and notification, and a cycle finishes before the next tick is considered.
//!
//! Every fetch is tagged with the counterpart and open-generation it was issued for.
//! When the result arrives it is applied only if that tag still matches what is open, so
//! a slow response for a previous counterpart can never leak into the current one.
//! Fetches also take a sequence number when issued. A timer cycle and a reload after a
//! send can overlap, and a response older than the last applied one is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{MessengerError, Result};
use crate::metrics::MetricsCollector;
use crate::models::{Counterpart, Message, MessageId, UserId};
use crate::record_error;
use crate::repository::MessageStore;
use crate::session::Session;
use crate::store::{ConversationStore, MergeResult};
use crate::validation::InputValidator;

/// Default period of the open-conversation poll
pub const CONVERSATION_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default period of the unread badge poll
pub const UNREAD_BADGE_INTERVAL: Duration = Duration::from_secs(30);
/// Distance from the bottom, in pixels, within which new content scrolls into view
pub const AUTOSCROLL_THRESHOLD_PX: f64 = 100.0;

/// Owned handle to a background loop. Cancelled on drop.
#[derive(Debug)]
pub struct PollHandle {
    name: &'static str,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Spawn `f` with a token that fires when this handle is cancelled or dropped
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(f(token.clone()));
        debug!(task = name, "Started background loop");
        Self {
            name,
            token,
            task: Some(task),
        }
    }

    /// Stop the loop; an in-flight cycle is dropped unapplied
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(task = self.name, "Cancelling background loop");
            self.token.cancel();
        }
    }

    /// Whether the loop has been told to stop
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait for the loop to exit
    pub async fn join(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(task = self.name, "Background loop panicked");
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// Initial load finished
    Loaded {
        /// Conversation that loaded
        counterpart: Counterpart,
        /// Always true for an initial load
        scroll_to_latest: bool,
    },
    /// A later fetch replaced the held messages
    NewContent {
        /// Conversation that changed
        counterpart: Counterpart,
    },
    /// Unread count next to the counterpart changed
    UnreadChanged {
        /// Conversation concerned
        counterpart: Counterpart,
        /// New unread count
        unread: usize,
    },
    /// A send completed; put focus back on the input
    FocusInput,
    /// The conversation was closed
    Closed {
        /// Conversation that closed
        counterpart: Counterpart,
    },
}

/// Scroll geometry of the message history, for the autoscroll heuristic.
///
/// For graphical front ends that keep a scrollable history; a terminal reprints instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    /// Total height of the scrollable content
    pub scroll_height: f64,
    /// Offset of the top of the viewport
    pub scroll_top: f64,
    /// Height of the viewport
    pub client_height: f64,
}

impl ScrollPosition {
    /// Whether the viewer is within `threshold` of the bottom, so new content should
    /// scroll into view
    #[must_use]
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top - self.client_height < threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleKind {
    /// First load after opening: always marks read and asks for a scroll
    Initial,
    /// Timer tick
    Periodic,
    /// Reload right after a send or delete
    AfterAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Applied(MergeResult),
    Stale,
}

/// Counterpart and open-generation a fetch was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchTag {
    counterpart: Counterpart,
    generation: u64,
}

#[derive(Debug, Default)]
struct DriverState {
    conversation: ConversationStore,
    generation: u64,
    /// Sequence of the last fetch issued
    issued_seq: u64,
    /// Sequence of the fetch whose snapshot is held
    applied_seq: u64,
    metrics: MetricsCollector,
}

impl DriverState {
    fn is_current(&self, tag: &FetchTag) -> bool {
        self.generation == tag.generation && self.conversation.is_open_for(&tag.counterpart)
    }

    fn next_fetch_seq(&mut self) -> u64 {
        self.issued_seq += 1;
        self.issued_seq
    }

    /// A newer fetch has already been applied
    const fn is_superseded(&self, seq: u64) -> bool {
        seq < self.applied_seq
    }
}

const fn error_kind(err: &MessengerError) -> &'static str {
    match err {
        MessengerError::Network(_) => "network",
        MessengerError::Server { .. } => "server",
        MessengerError::Validation(_) => "validation",
        _ => "other",
    }
}

struct Inner<S: ?Sized> {
    store: Arc<S>,
    current_user: UserId,
    state: Mutex<DriverState>,
    events: mpsc::UnboundedSender<ConversationEvent>,
}

impl<S: MessageStore + ?Sized> Inner<S> {
    fn emit(&self, event: ConversationEvent) {
        if self.events.send(event).is_err() {
            trace!("No listener for conversation events");
        }
    }

    async fn current_tag(&self) -> Option<FetchTag> {
        let state = self.state.lock().await;
        state.conversation.counterpart().map(|counterpart| FetchTag {
            counterpart: counterpart.clone(),
            generation: state.generation,
        })
    }

    /// One fetch, merge, read-receipt pass for `tag`
    async fn cycle(&self, tag: &FetchTag, kind: CycleKind) -> Result<CycleOutcome> {
        let seq = self.state.lock().await.next_fetch_seq();
        let snapshot = self.store.fetch_conversation(&tag.counterpart.email).await?;

        let (merge, unread) = {
            let mut state = self.state.lock().await;
            if !state.is_current(tag) {
                state.metrics.record_stale_result();
                debug!(counterpart = %tag.counterpart.email, "Discarding fetch for a conversation that is no longer open");
                return Ok(CycleOutcome::Stale);
            }
            if state.is_superseded(seq) {
                state.metrics.record_stale_result();
                debug!(
                    counterpart = %tag.counterpart.email,
                    seq,
                    applied = state.applied_seq,
                    "Discarding fetch superseded by a newer one"
                );
                return Ok(CycleOutcome::Stale);
            }
            state.applied_seq = seq;

            let merge = state.conversation.replace_snapshot(snapshot);
            state.metrics.record_merge(merge);
            if kind != CycleKind::Initial && !merge.is_changed() {
                return Ok(CycleOutcome::Applied(merge));
            }

            // Counted before the read receipt below flips the flags.
            let unread = state.conversation.compute_unread_count(self.current_user);
            state.conversation.set_unread(unread);
            debug!(
                counterpart = %tag.counterpart.email,
                messages = state.conversation.len(),
                unread,
                "Conversation updated"
            );
            (merge, unread)
        };
        self.emit(ConversationEvent::UnreadChanged {
            counterpart: tag.counterpart.clone(),
            unread,
        });

        let marked = self.store.mark_read(&tag.counterpart.email).await;

        {
            let mut state = self.state.lock().await;
            if !state.is_current(tag) {
                state.metrics.record_stale_result();
                return Ok(CycleOutcome::Stale);
            }
            if marked.is_ok() {
                state.conversation.set_unread(0);
            }
        }

        let counterpart = tag.counterpart.clone();
        self.emit(match kind {
            CycleKind::Initial => ConversationEvent::Loaded {
                counterpart: counterpart.clone(),
                scroll_to_latest: true,
            },
            CycleKind::Periodic | CycleKind::AfterAction => ConversationEvent::NewContent {
                counterpart: counterpart.clone(),
            },
        });
        if marked.is_ok() && unread > 0 {
            self.emit(ConversationEvent::UnreadChanged { counterpart, unread: 0 });
        }

        marked?;
        Ok(CycleOutcome::Applied(merge))
    }

    /// Timer-driven cycle. Failures are logged and the next tick retries.
    async fn poll_once(&self, tag: &FetchTag) {
        let started = Instant::now();
        let failure = match self.cycle(tag, CycleKind::Periodic).await {
            Ok(_) => None,
            Err(e) => {
                warn!(counterpart = %tag.counterpart.email, error = %e, "Conversation poll failed; retrying next tick");
                Some(error_kind(&e))
            },
        };
        self.state.lock().await.metrics.record_poll_cycle(started.elapsed(), failure);
    }
}

/// Keeps one conversation in sync with the message store
pub struct ConversationDriver<S: MessageStore + ?Sized + 'static> {
    inner: Arc<Inner<S>>,
    interval: Duration,
    timer: Option<PollHandle>,
}

impl<S: MessageStore + ?Sized + 'static> ConversationDriver<S> {
    /// Create a driver for the signed-in user. Events for the presentation layer arrive
    /// on the returned receiver.
    pub fn new(
        store: Arc<S>, session: &Session, interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            store,
            current_user: session.user_id(),
            state: Mutex::new(DriverState::default()),
            events,
        });
        (
            Self {
                inner,
                interval,
                timer: None,
            },
            rx,
        )
    }

    /// Open a conversation with `counterpart`.
    ///
    /// Replaces whatever was open, loads the conversation, sends a read receipt, then
    /// starts polling. Load failures are returned; polling starts regardless and retries.
    pub async fn open(&mut self, counterpart: Counterpart) -> Result<()> {
        self.stop_timer();
        let tag = {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.conversation.open(counterpart.clone());
            FetchTag {
                counterpart,
                generation: state.generation,
            }
        };
        info!(counterpart = %tag.counterpart.email, "Opening conversation");

        let initial = self.inner.cycle(&tag, CycleKind::Initial).await;
        self.start_timer(tag);

        if let Err(e) = &initial {
            error!(error = %e, "Failed to load conversation");
            record_error!(self.inner.state.lock().await.metrics, error_kind(e), "open");
        }
        initial.map(|_| ())
    }

    /// Close the open conversation and stop polling it
    pub async fn close(&mut self) {
        self.stop_timer();
        let closed = {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            let counterpart = state.conversation.counterpart().cloned();
            state.conversation.close();
            counterpart
        };
        if let Some(counterpart) = closed {
            info!(counterpart = %counterpart.email, "Closed conversation");
            self.inner.emit(ConversationEvent::Closed { counterpart });
        }
    }

    /// Send `text` to the open counterpart, then reload without waiting for the timer
    pub async fn send(&self, text: &str) -> Result<Message> {
        let text = InputValidator::validate_message_text(text)?;
        let tag = self.inner.current_tag().await.ok_or(MessengerError::NoOpenConversation)?;

        let sent = match self.inner.store.send(&tag.counterpart.email, &text).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(counterpart = %tag.counterpart.email, error = %e, "Failed to send message");
                record_error!(self.inner.state.lock().await.metrics, error_kind(&e), "send");
                return Err(e);
            },
        };

        {
            let mut state = self.inner.state.lock().await;
            state.metrics.record_message_sent();
            if state.is_current(&tag) {
                state.conversation.append(sent.clone());
            }
        }

        if let Err(e) = self.inner.cycle(&tag, CycleKind::AfterAction).await {
            warn!(error = %e, "Reload after send failed; the next poll will catch up");
        }
        self.inner.emit(ConversationEvent::FocusInput);
        Ok(sent)
    }

    /// Delete a message, then reload the open conversation
    pub async fn delete_message(&self, id: MessageId) -> Result<()> {
        let tag = self.inner.current_tag().await.ok_or(MessengerError::NoOpenConversation)?;

        if let Err(e) = self.inner.store.delete_message(id).await {
            error!(message_id = id, error = %e, "Failed to delete message");
            record_error!(self.inner.state.lock().await.metrics, error_kind(&e), "delete");
            return Err(e);
        }

        if let Err(e) = self.inner.cycle(&tag, CycleKind::AfterAction).await {
            warn!(error = %e, "Reload after delete failed; the next poll will catch up");
        }
        Ok(())
    }

    /// Run one non-initial fetch-and-merge cycle now, returning any failure
    pub async fn refresh(&self) -> Result<MergeResult> {
        let tag = self.inner.current_tag().await.ok_or(MessengerError::NoOpenConversation)?;
        match self.inner.cycle(&tag, CycleKind::AfterAction).await? {
            CycleOutcome::Applied(merge) => Ok(merge),
            CycleOutcome::Stale => Ok(MergeResult::Unchanged),
        }
    }

    /// Messages to display, oldest first
    pub async fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().await.conversation.messages().cloned().collect()
    }

    /// Unread count for the open conversation
    pub async fn unread(&self) -> usize {
        self.inner.state.lock().await.conversation.unread()
    }

    /// The open counterpart
    pub async fn counterpart(&self) -> Option<Counterpart> {
        self.inner.state.lock().await.conversation.counterpart().cloned()
    }

    /// Snapshot of the sync counters
    pub async fn metrics(&self) -> MetricsCollector {
        self.inner.state.lock().await.metrics.clone()
    }

    /// Whether the poll timer is running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    fn start_timer(&mut self, tag: FetchTag) {
        let inner = Arc::clone(&self.inner);
        let period = self.interval;
        self.timer = Some(PollHandle::spawn("conversation_poll", move |token| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    () = inner.poll_once(&tag) => {},
                }
            }
        }));
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Global unread count across all conversations, refreshed in the background
#[derive(Debug)]
pub struct UnreadBadge {
    count: watch::Receiver<u64>,
    handle: PollHandle,
}

impl UnreadBadge {
    /// Fetch the unread total now and then every `period` until stopped
    pub fn spawn<S: MessageStore + ?Sized + 'static>(store: Arc<S>, session: &Session, period: Duration) -> Self {
        let (tx, count) = watch::channel(0_u64);
        debug!(user = session.user_id(), "Starting unread badge poll");
        let handle = PollHandle::spawn("unread_badge", move |token| async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                let fetched = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    fetched = store.fetch_unread_total() => fetched,
                };
                match fetched {
                    Ok(total) => {
                        tx.send_if_modified(|current| {
                            let modified = *current != total;
                            *current = total;
                            modified
                        });
                    },
                    Err(e) => warn!(error = %e, "Failed to refresh unread count"),
                }
            }
        });
        Self { count, handle }
    }

    /// Latest known unread total
    #[must_use]
    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Wait until the total changes. Returns `false` once the poll has stopped.
    pub async fn changed(&mut self) -> bool {
        self.count.changed().await.is_ok()
    }

    /// Stop polling
    pub fn stop(self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockMessageStore;

    const ME: UserId = 1;
    const ADA: UserId = 2;

    fn msg(id: MessageId, sender: UserId, read: bool) -> Message {
        Message {
            id,
            sender_id: sender,
            sender_name: None,
            sender_email: None,
            recipient_id: None,
            text: format!("m{id}"),
            read,
            timestamp: "2024-01-15T10:30:00".to_string(),
        }
    }

    fn inner(store: MockMessageStore) -> (Inner<MockMessageStore>, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Inner {
                store: Arc::new(store),
                current_user: ME,
                state: Mutex::new(DriverState::default()),
                events,
            },
            rx,
        )
    }

    async fn open(inner: &Inner<MockMessageStore>, email: &str) -> FetchTag {
        let mut state = inner.state.lock().await;
        state.generation += 1;
        state.conversation.open(Counterpart::new(email));
        FetchTag {
            counterpart: Counterpart::new(email),
            generation: state.generation,
        }
    }

    #[tokio::test]
    async fn test_result_for_replaced_counterpart_is_discarded() {
        let mut store = MockMessageStore::new();
        store
            .expect_fetch_conversation()
            .times(1)
            .returning(|_| Ok(vec![msg(1, ADA, false)]));
        store.expect_mark_read().times(0);
        let (inner, _rx) = inner(store);

        let stale = open(&inner, "ada@example.com").await;
        open(&inner, "bob@example.com").await;

        let outcome = inner.cycle(&stale, CycleKind::Periodic).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Stale);

        let state = inner.state.lock().await;
        assert!(state.conversation.is_empty());
        assert_eq!(state.metrics.stale_results_total, 1);
    }

    #[tokio::test]
    async fn test_reopening_same_counterpart_invalidates_old_generation() {
        let mut store = MockMessageStore::new();
        store.expect_fetch_conversation().returning(|_| Ok(vec![msg(1, ADA, false)]));
        store.expect_mark_read().times(0);
        let (inner, _rx) = inner(store);

        let old = open(&inner, "ada@example.com").await;
        open(&inner, "ada@example.com").await;

        assert_eq!(inner.cycle(&old, CycleKind::Periodic).await.unwrap(), CycleOutcome::Stale);
    }

    #[tokio::test]
    async fn test_unchanged_periodic_cycle_sends_no_receipt() {
        let mut store = MockMessageStore::new();
        store
            .expect_fetch_conversation()
            .times(2)
            .returning(|_| Ok(vec![msg(1, ADA, false), msg(2, ME, false)]));
        store.expect_mark_read().times(1).returning(|_| Ok(()));
        let (inner, mut rx) = inner(store);

        let tag = open(&inner, "ada@example.com").await;
        inner.cycle(&tag, CycleKind::Initial).await.unwrap();
        while rx.try_recv().is_ok() {}

        let outcome = inner.cycle(&tag, CycleKind::Periodic).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Applied(MergeResult::Unchanged));
        assert!(rx.try_recv().is_err(), "no notification for an unchanged merge");
    }

    #[tokio::test]
    async fn test_unread_counted_before_receipt() {
        let mut store = MockMessageStore::new();
        store
            .expect_fetch_conversation()
            .returning(|_| Ok(vec![msg(1, ADA, false), msg(2, ME, false), msg(3, ADA, true)]));
        store.expect_mark_read().returning(|_| Ok(()));
        let (inner, mut rx) = inner(store);

        let tag = open(&inner, "ada@example.com").await;
        inner.cycle(&tag, CycleKind::Initial).await.unwrap();

        let counterpart = Counterpart::new("ada@example.com");
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::UnreadChanged {
                counterpart: counterpart.clone(),
                unread: 1
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::Loaded {
                counterpart: counterpart.clone(),
                scroll_to_latest: true
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ConversationEvent::UnreadChanged { counterpart, unread: 0 });
    }

    #[tokio::test]
    async fn test_failed_receipt_keeps_unread_count() {
        let mut store = MockMessageStore::new();
        store.expect_fetch_conversation().returning(|_| Ok(vec![msg(1, ADA, false)]));
        store
            .expect_mark_read()
            .returning(|_| Err(MessengerError::Network("timed out".into())));
        let (inner, _rx) = inner(store);

        let tag = open(&inner, "ada@example.com").await;
        assert!(inner.cycle(&tag, CycleKind::Initial).await.is_err());
        assert_eq!(inner.state.lock().await.conversation.unread(), 1);
    }

    #[test]
    fn test_older_fetch_is_superseded_once_newer_applies() {
        let mut state = DriverState::default();
        let periodic = state.next_fetch_seq();
        let reload = state.next_fetch_seq();
        assert!(!state.is_superseded(periodic));

        state.applied_seq = reload;
        assert!(state.is_superseded(periodic));
        assert!(!state.is_superseded(reload));
        let next = state.next_fetch_seq();
        assert!(!state.is_superseded(next));
    }

    #[test]
    fn test_near_bottom_threshold() {
        let pos = ScrollPosition {
            scroll_height: 1000.0,
            scroll_top: 420.0,
            client_height: 500.0,
        };
        assert!(pos.is_near_bottom(AUTOSCROLL_THRESHOLD_PX));
        assert!(!pos.is_near_bottom(80.0));
    }
}
