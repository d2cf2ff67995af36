//! Collaborator contracts the client consumes.
//!
//! The sync and duplicate-detection code only ever talks to these traits. The REST
//! implementation lives in [`crate::api`]; tests substitute fakes or mocks.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AuthResponse, Contact, ContactFilter, ContactId, ContactUpdate, ConversationSummary, Message, MessageId, NewContact,
    User,
};

/// Remote message store, addressed by counterpart email
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Send `text` to `counterpart`, returning the stored message
    async fn send(&self, counterpart: &str, text: &str) -> Result<Message>;

    /// Full conversation with `counterpart`, oldest first
    async fn fetch_conversation(&self, counterpart: &str) -> Result<Vec<Message>>;

    /// Mark every message from `counterpart` to the current user as read
    async fn mark_read(&self, counterpart: &str) -> Result<()>;

    /// Unread messages across all conversations
    async fn fetch_unread_total(&self) -> Result<u64>;

    /// Delete one message sent or received by the current user
    async fn delete_message(&self, id: MessageId) -> Result<()>;

    /// One summary per counterpart, most recent first
    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>>;
}

/// Remote contact store for the current user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Contacts matching `filter`
    async fn list(&self, filter: &ContactFilter) -> Result<Vec<Contact>>;

    /// Create a contact
    async fn create(&self, contact: &NewContact) -> Result<Contact>;

    /// Apply a partial update
    async fn update(&self, id: ContactId, update: &ContactUpdate) -> Result<Contact>;

    /// Delete a contact
    async fn delete(&self, id: ContactId) -> Result<()>;

    /// Flip the favorite flag
    async fn toggle_favorite(&self, id: ContactId) -> Result<Contact>;

    /// Count one more view of the contact
    async fn increment_access(&self, id: ContactId) -> Result<Contact>;
}

/// Account endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Create an account and sign in
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse>;

    /// Sign in
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse>;

    /// The user the current token belongs to
    async fn current_user(&self) -> Result<User>;
}
