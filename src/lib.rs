//! Contact Messenger - contact manager client with direct messaging
//!
//! A Rust client for a contact manager REST API whose users can also message each other.
//!
//! # Features
//!
//! - Conversation sync by polling, with snapshot-replacement merges and read receipts
//! - Relative message timestamps driven by a sampled clock
//! - Duplicate contact detection and merging
//! - Contact list views, export to JSON/CSV and JSON import
//! - Layered configuration, structured logging and sync metrics

/// REST client implementing the collaborator traits
pub mod api;
/// Wall clock abstraction and sampled "now"
pub mod clock;
/// Configuration management
pub mod config;
/// Contact list and its derived views
pub mod contacts;
/// Duplicate contact detection
pub mod duplicates;
/// Error types
pub mod error;
/// Contact export and import
pub mod export;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Conversation polling driver and unread badge
pub mod polling;
/// Collaborator contracts
pub mod repository;
/// Auth token storage and session
pub mod session;
/// Client-side conversation view model
pub mod store;
/// Relative timestamp formatting
pub mod timestamp;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use api::ApiClient;
pub use error::{MessengerError, Result};
pub use models::{Contact, Counterpart, DuplicateGroup, MatchKind, Message};
pub use polling::{ConversationDriver, ConversationEvent, UnreadBadge};
pub use session::{Session, TokenStore};
pub use store::{ConversationStore, MergeResult};
