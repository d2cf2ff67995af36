//! Likely-duplicate contact detection.
//!
//! One pass over the contact list with three first-seen tables, keyed by normalized email,
//! phone digits and name. A later contact colliding with a first-seen one is reported as a
//! pair; the first contact keeps its slot, so a third match yields another pair against the
//! first rather than a chain or a cluster.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{MessengerError, Result};
use crate::models::{Contact, DuplicateGroup, MatchKind};
use crate::repository::ContactStore;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Whether two same-name contacts also agree on email or phone
fn corroborated(a: &Contact, b: &Contact) -> bool {
    let same_email = match (present(Some(a.email.as_str())), present(Some(b.email.as_str()))) {
        (Some(x), Some(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        _ => false,
    };
    let same_phone = match (present(a.phone.as_deref()), present(b.phone.as_deref())) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    };
    same_email || same_phone
}

fn pair(kind: MatchKind, value: &str, first: &Contact, later: &Contact) -> DuplicateGroup {
    DuplicateGroup {
        kind,
        value: value.to_string(),
        contacts: [first.clone(), later.clone()],
    }
}

/// Report every pair of contacts that look like the same person.
///
/// A pair colliding on several keys appears once per key.
#[must_use]
pub fn find_duplicates(contacts: &[Contact]) -> Vec<DuplicateGroup> {
    let mut by_email: HashMap<String, &Contact> = HashMap::new();
    let mut by_phone: HashMap<String, &Contact> = HashMap::new();
    let mut by_name: HashMap<String, &Contact> = HashMap::new();
    let mut groups = Vec::new();

    for contact in contacts {
        let email = normalize_email(&contact.email);
        if !email.is_empty() {
            match by_email.get(&email) {
                Some(first) => groups.push(pair(MatchKind::Email, &contact.email, first, contact)),
                None => {
                    by_email.insert(email, contact);
                },
            }
        }

        if let Some(phone) = contact.phone.as_deref() {
            let digits = normalize_phone(phone);
            if !digits.is_empty() {
                match by_phone.get(&digits) {
                    Some(first) => groups.push(pair(MatchKind::Phone, phone, first, contact)),
                    None => {
                        by_phone.insert(digits, contact);
                    },
                }
            }
        }

        let name = normalize_name(&contact.name);
        if !name.is_empty() {
            match by_name.get(&name) {
                Some(first) => {
                    if corroborated(first, contact) {
                        groups.push(pair(MatchKind::Name, &contact.name, first, contact));
                    }
                },
                None => {
                    by_name.insert(name, contact);
                },
            }
        }
    }

    debug!(contacts = contacts.len(), groups = groups.len(), "Duplicate scan finished");
    groups
}

/// Result set of a duplicate scan, shrinking as groups are merged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    /// Scan `contacts`
    #[must_use]
    pub fn scan(contacts: &[Contact]) -> Self {
        Self {
            groups: find_duplicates(contacts),
        }
    }

    /// Remaining groups
    #[must_use]
    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Number of remaining groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// No duplicates left
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Merge group `index`: delete every contact but the first through `store`, then drop
    /// the group. Other groups are left as they are; detection is not re-run.
    pub async fn merge(&mut self, index: usize, store: &dyn ContactStore) -> Result<Contact> {
        let group = self
            .groups
            .get(index)
            .ok_or_else(|| MessengerError::validation(format!("No duplicate group at index {index}")))?;

        let [keep, rest @ ..] = &group.contacts;
        for contact in rest {
            store.delete(contact.id).await?;
        }
        let kept = keep.clone();
        info!(kind = %group.kind, value = %group.value, kept = kept.id, "Merged duplicate contacts");

        self.groups.remove(index);
        Ok(kept)
    }

    /// Drop group `index` without touching any contact
    pub fn dismiss(&mut self, index: usize) -> Option<DuplicateGroup> {
        (index < self.groups.len()).then(|| self.groups.remove(index))
    }
}
