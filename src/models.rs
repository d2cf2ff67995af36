//! Data models for contacts and direct messages
//!
//! These mirror the JSON shapes the REST API speaks (camelCase field names). Timestamps
//! are kept as the raw strings the server sends; they are parsed lazily by
//! [`crate::timestamp`] so that one malformed value never fails a whole fetch.

use serde::{Deserialize, Serialize};

/// Server-assigned message identifier
pub type MessageId = i64;
/// Server-assigned user identifier
pub type UserId = i64;
/// Server-assigned contact identifier
pub type ContactId = i64;

/// A direct message between the current user and one counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier
    pub id: MessageId,
    /// Identifier of the sending user
    pub sender_id: UserId,
    /// Display name of the sending user
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Email of the sending user
    #[serde(default)]
    pub sender_email: Option<String>,
    /// Identifier of the receiving user
    #[serde(default)]
    pub recipient_id: Option<UserId>,
    /// Message body
    pub text: String,
    /// Set by the server once the recipient has fetched the conversation
    #[serde(default)]
    pub read: bool,
    /// ISO-8601 send time; UTC when no zone marker is present
    pub timestamp: String,
}

impl Message {
    /// True when the message was sent by `user_id`
    #[must_use]
    pub fn is_from(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }

    /// Unread from the point of view of `current_user`
    #[must_use]
    pub fn is_unread_for(&self, current_user: UserId) -> bool {
        !self.is_from(current_user) && !self.read
    }
}

/// The other user in a two-party conversation, addressed by email
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Counterpart {
    /// Email used to address the counterpart on the wire
    pub email: String,
    /// Display name, if known
    pub name: Option<String>,
}

impl Counterpart {
    /// Create a counterpart from an email address
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Attach a display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<&Contact> for Counterpart {
    fn from(contact: &Contact) -> Self {
        Self {
            email: contact.email.clone(),
            name: Some(contact.name.clone()),
        }
    }
}

/// Contact record owned by the current user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Server-assigned identifier
    pub id: ContactId,
    /// Display name
    pub name: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Free-form phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Company name
    #[serde(default)]
    pub company: Option<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Photo URL
    #[serde(default)]
    pub photo: Option<String>,
    /// Group label
    #[serde(default)]
    pub group: Option<String>,
    /// Favorite flag
    #[serde(default)]
    pub is_favorite: bool,
    /// Times the contact was opened for viewing or editing
    #[serde(default)]
    pub access_count: u32,
    /// Last time the contact was opened
    #[serde(default)]
    pub last_accessed: Option<String>,
    /// Creation time, ISO-8601
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Fields for creating a contact
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewContact {
    /// Display name (required)
    pub name: String,
    /// Email address (required)
    pub email: String,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Company name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Photo URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Group label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl From<&Contact> for NewContact {
    fn from(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            company: contact.company.clone(),
            notes: contact.notes.clone(),
            photo: contact.photo.clone(),
            group: contact.group.clone(),
        }
    }
}

/// Partial update of a contact; absent fields are left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ContactUpdate {
    /// New name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New email
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// New company
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// New notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// New group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Sort orders supported by the contact list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Alphabetical by name
    #[default]
    Name,
    /// Favorites first, then by name
    Favorites,
    /// Most accessed first, then by name
    Frequent,
}

impl SortOrder {
    /// Wire value of the `sort` query parameter
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Favorites => "favorites",
            Self::Frequent => "frequent",
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = crate::error::MessengerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "favorites" => Ok(Self::Favorites),
            "frequent" => Ok(Self::Frequent),
            other => Err(crate::error::MessengerError::validation(format!("Unknown sort order: {other}"))),
        }
    }
}

/// Filters for listing contacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    /// Substring search over name, email and phone
    pub search: Option<String>,
    /// Sort order
    pub sort: SortOrder,
    /// Group name; `None` or `"all"` means every group
    pub group: Option<String>,
}

impl ContactFilter {
    /// The group to filter on, if any
    #[must_use]
    pub fn group_filter(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty() && *g != "all")
    }

    /// Trimmed, non-empty search term
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Key a duplicate pair collided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Same normalized email
    Email,
    /// Same phone digits
    Phone,
    /// Same normalized name, corroborated by email or phone
    Name,
}

impl MatchKind {
    /// Lowercase label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Name => "name",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair of contacts that look like the same person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Which key collided
    pub kind: MatchKind,
    /// The colliding value as written on the later contact
    pub value: String,
    /// First-seen contact followed by the one that collided with it
    pub contacts: [Contact; 2],
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Photo URL
    #[serde(default)]
    pub photo: Option<String>,
}

/// Response of login and register
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// The authenticated user
    pub user: User,
    /// Bearer token for later requests
    pub token: String,
}

/// One row of the conversations overview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Counterpart user id
    pub contact_id: UserId,
    /// Counterpart display name
    pub contact_name: String,
    /// Counterpart email
    pub contact_email: String,
    /// Counterpart photo URL
    #[serde(default)]
    pub contact_photo: Option<String>,
    /// Most recent message either way
    #[serde(default)]
    pub last_message: Option<Message>,
    /// Messages from the counterpart not yet read
    #[serde(default)]
    pub unread_count: u64,
}

impl ConversationSummary {
    /// Counterpart handle for opening this conversation
    #[must_use]
    pub fn counterpart(&self) -> Counterpart {
        Counterpart::new(self.contact_email.clone()).with_name(self.contact_name.clone())
    }
}
