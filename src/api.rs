//! REST client for the contact manager API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{MessengerError, Result};
use crate::logging::OperationTimer;
use crate::models::{
    AuthResponse, Contact, ContactFilter, ContactId, ContactUpdate, ConversationSummary, Message, MessageId, NewContact,
    User,
};
use crate::repository::{AuthApi, ContactStore, MessageStore};

const FALLBACK_ERROR: &str = "An error occurred";

#[derive(Deserialize)]
struct MessagesBody {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct ContactsBody {
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Deserialize)]
struct ConversationsBody {
    #[serde(default)]
    conversations: Vec<ConversationSummary>,
}

#[derive(Deserialize)]
struct CountBody {
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct UserBody {
    user: User,
}

#[derive(Deserialize)]
struct UsersBody {
    #[serde(default)]
    users: Vec<User>,
}

/// HTTP client for the contact manager REST API.
///
/// Every request carries the bearer token when one is set.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url` (e.g. `http://localhost:5000/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach a bearer token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Replace or clear the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Whether a bearer token is attached
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let req = self.http.request(method, self.url(endpoint));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send `req` and decode the JSON body; an empty body decodes as `{}`
    async fn execute<T: DeserializeOwned>(&self, operation: &str, req: RequestBuilder) -> Result<T> {
        let _timer = OperationTimer::new(operation);
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(MessengerError::Server {
                status: status.as_u16(),
                message: server_message(status, &body),
            });
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| {
            tracing::warn!(operation, error = %e, "Undecodable response body");
            MessengerError::Server {
                status: status.as_u16(),
                message: "Invalid response from server".to_string(),
            }
        })
    }

    /// Mark a single received message as read
    pub async fn mark_message_read(&self, id: MessageId) -> Result<()> {
        let req = self.request(Method::POST, &format!("/messages/{id}/read"));
        self.execute::<Value>("mark_message_read", req).await?;
        Ok(())
    }

    /// Find registered users by email
    pub async fn search_users(&self, email: &str) -> Result<Vec<User>> {
        let req = self.request(Method::GET, "/users/search").query(&[("email", email)]);
        let body: UsersBody = self.execute("search_users", req).await?;
        Ok(body.users)
    }
}

/// Pull the human-readable message out of an error body
fn server_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| FALLBACK_ERROR.to_string())
}

fn contact_query(filter: &ContactFilter) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(search) = filter.search_term() {
        params.push(("search", search.to_string()));
    }
    params.push(("sort", filter.sort.as_str().to_string()));
    if let Some(group) = filter.group_filter() {
        params.push(("group", group.to_string()));
    }
    params
}

#[async_trait]
impl MessageStore for ApiClient {
    async fn send(&self, counterpart: &str, text: &str) -> Result<Message> {
        let req = self
            .request(Method::POST, "/messages")
            .json(&json!({ "recipientEmail": counterpart, "text": text }));
        self.execute("send_message", req).await
    }

    async fn fetch_conversation(&self, counterpart: &str) -> Result<Vec<Message>> {
        let req = self
            .request(Method::GET, "/messages/conversation")
            .query(&[("recipientEmail", counterpart)]);
        let body: MessagesBody = self.execute("fetch_conversation", req).await?;
        Ok(body.messages)
    }

    async fn mark_read(&self, counterpart: &str) -> Result<()> {
        // The server flips read flags for the counterpart's messages whenever the
        // conversation is fetched; the body is not needed here.
        let req = self
            .request(Method::GET, "/messages/conversation")
            .query(&[("recipientEmail", counterpart)]);
        self.execute::<Value>("mark_read", req).await?;
        Ok(())
    }

    async fn fetch_unread_total(&self) -> Result<u64> {
        let req = self.request(Method::GET, "/messages/unread-count");
        let body: CountBody = self.execute("fetch_unread_total", req).await?;
        Ok(body.count)
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/messages/{id}"));
        self.execute::<Value>("delete_message", req).await?;
        Ok(())
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let req = self.request(Method::GET, "/messages/conversations");
        let body: ConversationsBody = self.execute("fetch_conversations", req).await?;
        Ok(body.conversations)
    }
}

#[async_trait]
impl ContactStore for ApiClient {
    async fn list(&self, filter: &ContactFilter) -> Result<Vec<Contact>> {
        let req = self.request(Method::GET, "/contacts").query(&contact_query(filter));
        let body: ContactsBody = self.execute("list_contacts", req).await?;
        Ok(body.contacts)
    }

    async fn create(&self, contact: &NewContact) -> Result<Contact> {
        let req = self.request(Method::POST, "/contacts").json(contact);
        self.execute("create_contact", req).await
    }

    async fn update(&self, id: ContactId, update: &ContactUpdate) -> Result<Contact> {
        let req = self.request(Method::PUT, &format!("/contacts/{id}")).json(update);
        self.execute("update_contact", req).await
    }

    async fn delete(&self, id: ContactId) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/contacts/{id}"));
        self.execute::<Value>("delete_contact", req).await?;
        Ok(())
    }

    async fn toggle_favorite(&self, id: ContactId) -> Result<Contact> {
        let req = self.request(Method::POST, &format!("/contacts/{id}/toggle-favorite"));
        self.execute("toggle_favorite", req).await
    }

    async fn increment_access(&self, id: ContactId) -> Result<Contact> {
        let req = self.request(Method::POST, &format!("/contacts/{id}/increment-access"));
        self.execute("increment_access", req).await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<AuthResponse> {
        let req = self
            .request(Method::POST, "/auth/register")
            .json(&json!({ "name": name, "email": email, "password": password }));
        self.execute("register", req).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let req = self
            .request(Method::POST, "/auth/login")
            .json(&json!({ "email": email, "password": password }));
        self.execute("login", req).await
    }

    async fn current_user(&self) -> Result<User> {
        let req = self.request(Method::GET, "/auth/me");
        let body: UserBody = self.execute("current_user", req).await?;
        Ok(body.user)
    }
}
