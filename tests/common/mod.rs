//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use contact_messenger::error::{MessengerError, Result};
use contact_messenger::models::{
    Contact, ContactFilter, ContactId, ContactUpdate, ConversationSummary, Message, MessageId, NewContact, User, UserId,
};
use contact_messenger::repository::{ContactStore, MessageStore};
use contact_messenger::session::Session;

pub const ME: UserId = 1;
pub const ADA: UserId = 2;
pub const BOB: UserId = 3;

pub const ADA_EMAIL: &str = "ada@example.com";
pub const BOB_EMAIL: &str = "bob@example.com";

pub fn session() -> Session {
    Session::new(
        "test-token".to_string(),
        User {
            id: ME,
            name: "Me".to_string(),
            email: "me@example.com".to_string(),
            photo: None,
        },
    )
}

pub fn message(id: MessageId, sender: UserId, text: &str, read: bool) -> Message {
    Message {
        id,
        sender_id: sender,
        sender_name: None,
        sender_email: None,
        recipient_id: None,
        text: text.to_string(),
        read,
        timestamp: "2024-06-15T12:00:00".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct MessageState {
    pub conversations: HashMap<String, Vec<Message>>,
    pub fetches: Vec<String>,
    pub mark_reads: Vec<String>,
    pub sent: Vec<(String, String)>,
    pub deleted: Vec<MessageId>,
    pub fetch_delay: HashMap<String, Duration>,
    pub fail_fetch: bool,
    pub fail_fetch_server: bool,
    pub fail_send: bool,
    pub unread_total: u64,
    pub fail_unread: bool,
    pub next_id: MessageId,
}

/// Message store that behaves like the REST server: sends append, mark-read flips the
/// counterpart's flags, fetches return the whole conversation
#[derive(Debug, Default)]
pub struct FakeMessageStore {
    pub state: Mutex<MessageState>,
}

impl FakeMessageStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MessageState {
                next_id: 1000,
                ..MessageState::default()
            }),
        }
    }

    pub fn with_conversation(self, email: &str, messages: Vec<Message>) -> Self {
        self.state.lock().unwrap().conversations.insert(email.to_string(), messages);
        self
    }

    pub fn push(&self, email: &str, message: Message) {
        self.state
            .lock()
            .unwrap()
            .conversations
            .entry(email.to_string())
            .or_default()
            .push(message);
    }

    pub fn fetch_count(&self, email: &str) -> usize {
        self.state.lock().unwrap().fetches.iter().filter(|e| *e == email).count()
    }

    pub fn mark_read_count(&self, email: &str) -> usize {
        self.state.lock().unwrap().mark_reads.iter().filter(|e| *e == email).count()
    }

    pub fn set(&self, f: impl FnOnce(&mut MessageState)) {
        f(&mut self.state.lock().unwrap());
    }
}

fn unreachable_server() -> MessengerError {
    MessengerError::Network("Cannot connect to server".to_string())
}

#[async_trait]
impl MessageStore for FakeMessageStore {
    async fn send(&self, counterpart: &str, text: &str) -> Result<Message> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(MessengerError::Server {
                status: 404,
                message: "Recipient not found".to_string(),
            });
        }
        state.next_id += 1;
        let sent = message(state.next_id, ME, text, false);
        state.sent.push((counterpart.to_string(), text.to_string()));
        state
            .conversations
            .entry(counterpart.to_string())
            .or_default()
            .push(sent.clone());
        Ok(sent)
    }

    /// The snapshot is read when the request arrives; `fetch_delay` only holds back the response
    async fn fetch_conversation(&self, counterpart: &str) -> Result<Vec<Message>> {
        let (snapshot, delay) = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push(counterpart.to_string());
            if state.fail_fetch {
                return Err(unreachable_server());
            }
            if state.fail_fetch_server {
                return Err(MessengerError::Server {
                    status: 500,
                    message: "Server error".to_string(),
                });
            }
            (
                state.conversations.get(counterpart).cloned().unwrap_or_default(),
                state.fetch_delay.get(counterpart).copied(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn mark_read(&self, counterpart: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mark_reads.push(counterpart.to_string());
        if let Some(messages) = state.conversations.get_mut(counterpart) {
            for m in messages.iter_mut().filter(|m| m.sender_id != ME) {
                m.read = true;
            }
        }
        Ok(())
    }

    async fn fetch_unread_total(&self) -> Result<u64> {
        let state = self.state.lock().unwrap();
        if state.fail_unread {
            return Err(unreachable_server());
        }
        Ok(state.unread_total)
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut found = false;
        for messages in state.conversations.values_mut() {
            let before = messages.len();
            messages.retain(|m| m.id != id);
            found |= messages.len() != before;
        }
        if !found {
            return Err(MessengerError::Server {
                status: 404,
                message: "Message not found".to_string(),
            });
        }
        state.deleted.push(id);
        Ok(())
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>> {
        Ok(Vec::new())
    }
}

/// Contact store backed by a vector, recording deletes
#[derive(Debug, Default)]
pub struct FakeContactStore {
    pub contacts: Mutex<Vec<Contact>>,
    pub deleted: Mutex<Vec<ContactId>>,
}

impl FakeContactStore {
    pub fn with(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: Mutex::new(contacts),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<Contact> {
        self.contacts.lock().unwrap().clone()
    }
}

fn not_found() -> MessengerError {
    MessengerError::Server {
        status: 404,
        message: "Contact not found".to_string(),
    }
}

#[async_trait]
impl ContactStore for FakeContactStore {
    async fn list(&self, _filter: &ContactFilter) -> Result<Vec<Contact>> {
        Ok(self.snapshot())
    }

    async fn create(&self, contact: &NewContact) -> Result<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let id = contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let created = Contact {
            id,
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            company: contact.company.clone(),
            notes: contact.notes.clone(),
            photo: contact.photo.clone(),
            group: contact.group.clone(),
            ..Contact::default()
        };
        contacts.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: ContactId, update: &ContactUpdate) -> Result<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let contact = contacts.iter_mut().find(|c| c.id == id).ok_or_else(not_found)?;
        if let Some(name) = &update.name {
            contact.name = name.clone();
        }
        if let Some(email) = &update.email {
            contact.email = email.clone();
        }
        if update.phone.is_some() {
            contact.phone = update.phone.clone();
        }
        Ok(contact.clone())
    }

    async fn delete(&self, id: ContactId) -> Result<()> {
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| c.id != id);
        if contacts.len() == before {
            return Err(not_found());
        }
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    async fn toggle_favorite(&self, id: ContactId) -> Result<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let contact = contacts.iter_mut().find(|c| c.id == id).ok_or_else(not_found)?;
        contact.is_favorite = !contact.is_favorite;
        Ok(contact.clone())
    }

    async fn increment_access(&self, id: ContactId) -> Result<Contact> {
        let mut contacts = self.contacts.lock().unwrap();
        let contact = contacts.iter_mut().find(|c| c.id == id).ok_or_else(not_found)?;
        contact.access_count += 1;
        Ok(contact.clone())
    }
}

pub fn contact(id: ContactId, name: &str, email: &str, phone: Option<&str>) -> Contact {
    Contact {
        id,
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.map(str::to_string),
        ..Contact::default()
    }
}
