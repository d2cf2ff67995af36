//! Local view of one open conversation.
//!
//! The store holds the last snapshot fetched for a single counterpart. Merging is
//! snapshot replacement: a fetched snapshot either matches the held one (same length,
//! same last id) and is ignored, or it replaces the held one wholesale. Read flags come
//! from the server, so patching fields in place could keep stale ones.
//!
//! Messages sent locally can be shown before the next fetch confirms them. They live
//! beside the snapshot, not inside it, and are dropped by the next replacing snapshot.

use crate::models::{Counterpart, Message, MessageId, UserId};

/// Outcome of [`ConversationStore::replace_snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// Same length and last id as the held snapshot; nothing changed
    Unchanged,
    /// The held snapshot was replaced
    Changed,
}

impl MergeResult {
    /// True for [`MergeResult::Changed`]
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed)
    }
}

/// Messages for the one conversation currently open
#[derive(Debug, Default, Clone)]
pub struct ConversationStore {
    counterpart: Option<Counterpart>,
    snapshot: Vec<Message>,
    pending: Vec<Message>,
    unread: usize,
}

impl ConversationStore {
    /// An empty store with no counterpart
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `counterpart`, discarding everything held for the previous one
    pub fn open(&mut self, counterpart: Counterpart) {
        self.counterpart = Some(counterpart);
        self.snapshot.clear();
        self.pending.clear();
        self.unread = 0;
    }

    /// Forget the current counterpart and its messages
    pub fn close(&mut self) {
        self.counterpart = None;
        self.snapshot.clear();
        self.pending.clear();
        self.unread = 0;
    }

    /// The counterpart currently open, if any
    #[must_use]
    pub const fn counterpart(&self) -> Option<&Counterpart> {
        self.counterpart.as_ref()
    }

    /// Whether `counterpart` is the one currently open
    #[must_use]
    pub fn is_open_for(&self, counterpart: &Counterpart) -> bool {
        self.counterpart.as_ref().is_some_and(|c| c.email == counterpart.email)
    }

    /// The last fetched snapshot, oldest first
    #[must_use]
    pub fn snapshot(&self) -> &[Message] {
        &self.snapshot
    }

    /// Everything to display: the snapshot followed by unconfirmed local sends
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.snapshot.iter().chain(self.pending.iter())
    }

    /// Number of messages to display
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.len() + self.pending.len()
    }

    /// True when there is nothing to display
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn last_snapshot_id(&self) -> Option<MessageId> {
        self.snapshot.last().map(|m| m.id)
    }

    /// Merge a freshly fetched snapshot.
    ///
    /// Compares length and last identifier against the held snapshot. If both match this
    /// is a no-op; otherwise the held snapshot becomes exactly `messages` and any
    /// optimistic local sends are discarded.
    pub fn replace_snapshot(&mut self, messages: Vec<Message>) -> MergeResult {
        let new_last = messages.last().map(|m| m.id);
        if messages.len() == self.snapshot.len() && new_last == self.last_snapshot_id() {
            return MergeResult::Unchanged;
        }

        self.snapshot = messages;
        self.pending.clear();
        MergeResult::Changed
    }

    /// Show a message the current user just sent, ahead of the next fetch
    pub fn append(&mut self, sent: Message) {
        let known = self.messages().any(|m| m.id == sent.id);
        if !known {
            self.pending.push(sent);
        }
    }

    /// Messages in the held snapshot from someone other than `current_user` with the
    /// read flag still false
    #[must_use]
    pub fn compute_unread_count(&self, current_user: UserId) -> usize {
        self.snapshot.iter().filter(|m| m.is_unread_for(current_user)).count()
    }

    /// Unread count last recorded for the open conversation
    #[must_use]
    pub const fn unread(&self) -> usize {
        self.unread
    }

    /// Record the unread count shown next to the counterpart
    pub fn set_unread(&mut self, unread: usize) {
        self.unread = unread;
    }
}
