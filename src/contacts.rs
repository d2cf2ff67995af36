//! The signed-in user's contact list, with the derived views the client shows.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::duplicates::DuplicateReport;
use crate::error::Result;
use crate::export::{plan_import, ImportPlan};
use crate::models::{Contact, ContactFilter, ContactId, ContactUpdate, NewContact, SortOrder};
use crate::repository::ContactStore;
use crate::timestamp::parse_timestamp;
use crate::validation::InputValidator;

/// Access count at which a contact counts as frequently used
pub const FREQUENT_MIN_ACCESS: u32 = 4;
/// Longest frequent and recent lists
pub const SHORTLIST_LEN: usize = 5;
/// How far back "recently added" reaches
pub const RECENT_DAYS: i64 = 7;

fn by_name(a: &Contact, b: &Contact) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn matches_search(contact: &Contact, term: &str) -> bool {
    let needle = term.to_lowercase();
    contact.name.to_lowercase().contains(&needle)
        || contact.email.to_lowercase().contains(&needle)
        || contact.phone.as_deref().is_some_and(|p| p.contains(term))
}

/// Outcome of [`ContactBook::import`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Contacts created
    pub imported: usize,
    /// Entries skipped as duplicates or invalid, or rejected by the server
    pub skipped: usize,
}

/// Full contact list fetched from a [`ContactStore`], reloaded after every mutation
pub struct ContactBook<S: ContactStore + ?Sized> {
    store: Arc<S>,
    contacts: Vec<Contact>,
    filter: ContactFilter,
}

impl<S: ContactStore + ?Sized> ContactBook<S> {
    /// An empty book backed by `store`; call [`ContactBook::load`] to fill it
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            contacts: Vec::new(),
            filter: ContactFilter::default(),
        }
    }

    /// Fetch every contact
    pub async fn load(&mut self) -> Result<()> {
        self.contacts = self.store.list(&ContactFilter::default()).await?;
        info!(count = self.contacts.len(), "Loaded contacts");
        Ok(())
    }

    /// Every contact, unfiltered
    #[must_use]
    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    /// Current filter
    #[must_use]
    pub const fn filter(&self) -> &ContactFilter {
        &self.filter
    }

    /// Replace the filter used by [`ContactBook::visible`]
    pub fn set_filter(&mut self, filter: ContactFilter) {
        self.filter = filter;
    }

    /// Contacts passing the filter, in its sort order
    #[must_use]
    pub fn visible(&self) -> Vec<&Contact> {
        let search = self.filter.search_term();
        let group = self.filter.group_filter();

        let mut visible: Vec<&Contact> = self
            .contacts
            .iter()
            .filter(|c| search.map_or(true, |term| matches_search(c, term)))
            .filter(|c| group.map_or(true, |g| c.group.as_deref() == Some(g)))
            .collect();

        match self.filter.sort {
            SortOrder::Name => visible.sort_by(|a, b| by_name(a, b)),
            SortOrder::Favorites => {
                visible.sort_by(|a, b| b.is_favorite.cmp(&a.is_favorite).then_with(|| by_name(a, b)));
            },
            SortOrder::Frequent => {
                visible.sort_by(|a, b| b.access_count.cmp(&a.access_count).then_with(|| by_name(a, b)));
            },
        }
        visible
    }

    /// Most-opened contacts, at least [`FREQUENT_MIN_ACCESS`] opens
    #[must_use]
    pub fn frequent(&self) -> Vec<&Contact> {
        let mut frequent: Vec<&Contact> = self
            .contacts
            .iter()
            .filter(|c| c.access_count >= FREQUENT_MIN_ACCESS)
            .collect();
        frequent.sort_by(|a, b| b.access_count.cmp(&a.access_count));
        frequent.truncate(SHORTLIST_LEN);
        frequent
    }

    /// Contacts created in the last [`RECENT_DAYS`] days, newest first
    #[must_use]
    pub fn recent(&self, now: DateTime<Utc>) -> Vec<&Contact> {
        let cutoff = now - Duration::days(RECENT_DAYS);
        let mut recent: Vec<(DateTime<Utc>, &Contact)> = self
            .contacts
            .iter()
            .filter_map(|c| {
                let created = parse_timestamp(c.created_at.as_deref()?).ok()?;
                (created >= cutoff).then_some((created, c))
            })
            .collect();
        recent.sort_by(|a, b| b.0.cmp(&a.0));
        recent.into_iter().take(SHORTLIST_LEN).map(|(_, c)| c).collect()
    }

    /// Distinct non-empty group names, sorted
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self
            .contacts
            .iter()
            .filter_map(|c| c.group.as_deref())
            .filter(|g| !g.trim().is_empty())
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// Look up a contact by id
    #[must_use]
    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Scan the loaded contacts for duplicates
    #[must_use]
    pub fn duplicates(&self) -> DuplicateReport {
        DuplicateReport::scan(&self.contacts)
    }

    /// Validate and create a contact, then reload
    pub async fn create(&mut self, contact: &NewContact) -> Result<Contact> {
        InputValidator::validate_new_contact(contact)?;
        let created = self.store.create(contact).await?;
        self.load().await?;
        Ok(created)
    }

    /// Validate and apply a partial update, then reload
    pub async fn update(&mut self, id: ContactId, update: &ContactUpdate) -> Result<Contact> {
        if let Some(name) = &update.name {
            InputValidator::validate_contact_name(name)?;
        }
        if let Some(email) = &update.email {
            InputValidator::validate_email(email)?;
        }
        if let Some(phone) = update.phone.as_deref().filter(|p| !p.is_empty()) {
            InputValidator::validate_phone(phone)?;
        }
        let updated = self.store.update(id, update).await?;
        self.load().await?;
        Ok(updated)
    }

    /// Delete a contact, then reload
    pub async fn delete(&mut self, id: ContactId) -> Result<()> {
        self.store.delete(id).await?;
        self.load().await
    }

    /// Flip the favorite flag, then reload
    pub async fn toggle_favorite(&mut self, id: ContactId) -> Result<Contact> {
        let contact = self.store.toggle_favorite(id).await?;
        self.load().await?;
        Ok(contact)
    }

    /// Count a view of the contact. Failures are logged, never returned.
    pub async fn record_access(&mut self, id: ContactId) {
        if let Err(e) = self.store.increment_access(id).await {
            warn!(contact_id = id, error = %e, "Failed to increment access count");
            return;
        }
        if let Err(e) = self.load().await {
            warn!(error = %e, "Failed to reload contacts after access");
        }
    }

    /// Create the new entries of a JSON import, then reload
    pub async fn import(&mut self, json: &str) -> Result<ImportSummary> {
        let ImportPlan { to_create, skipped } = plan_import(json, &self.contacts)?;
        let mut summary = ImportSummary { imported: 0, skipped };

        for contact in &to_create {
            match self.store.create(contact).await {
                Ok(_) => summary.imported += 1,
                Err(e) => {
                    warn!(email = %contact.email, error = %e, "Import entry rejected");
                    summary.skipped += 1;
                },
            }
        }

        self.load().await?;
        info!(imported = summary.imported, skipped = summary.skipped, "Imported contacts");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockContactStore;

    fn contact(id: i64, name: &str, access_count: u32, favorite: bool, group: Option<&str>) -> Contact {
        Contact {
            id,
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            access_count,
            is_favorite: favorite,
            group: group.map(str::to_string),
            ..Contact::default()
        }
    }

    fn book(contacts: Vec<Contact>) -> ContactBook<MockContactStore> {
        let mut book = ContactBook::new(Arc::new(MockContactStore::new()));
        book.contacts = contacts;
        book
    }

    fn names<'a>(contacts: &[&'a Contact]) -> Vec<&'a str> {
        contacts.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_sort_orders() {
        let mut book = book(vec![
            contact(1, "cy", 1, false, None),
            contact(2, "Ann", 9, false, None),
            contact(3, "Bo", 1, true, None),
        ]);
        assert_eq!(names(&book.visible()), vec!["Ann", "Bo", "cy"]);

        book.set_filter(ContactFilter {
            sort: SortOrder::Favorites,
            ..ContactFilter::default()
        });
        assert_eq!(names(&book.visible()), vec!["Bo", "Ann", "cy"]);

        book.set_filter(ContactFilter {
            sort: SortOrder::Frequent,
            ..ContactFilter::default()
        });
        assert_eq!(names(&book.visible()), vec!["Ann", "Bo", "cy"]);
    }

    #[test]
    fn test_search_and_group_filter() {
        let mut book = book(vec![
            contact(1, "Ann", 0, false, Some("Work")),
            contact(2, "Annie", 0, false, Some("Family")),
            contact(3, "Bo", 0, false, Some("Work")),
        ]);
        book.set_filter(ContactFilter {
            search: Some("ANN".into()),
            group: Some("Work".into()),
            ..ContactFilter::default()
        });
        assert_eq!(names(&book.visible()), vec!["Ann"]);
        assert_eq!(book.groups(), vec!["Family", "Work"]);
    }

    #[test]
    fn test_frequent_needs_four_opens_and_caps_at_five() {
        let mut contacts: Vec<Contact> = (0..7).map(|i| contact(i, &format!("c{i}"), 4 + i as u32, false, None)).collect();
        contacts.push(contact(99, "rare", 3, false, None));
        let book = book(contacts);
        let frequent = book.frequent();
        assert_eq!(frequent.len(), SHORTLIST_LEN);
        assert_eq!(frequent[0].access_count, 10);
        assert!(frequent.iter().all(|c| c.access_count >= FREQUENT_MIN_ACCESS));
    }

    #[test]
    fn test_recent_window() {
        let now = "2024-06-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut old = contact(1, "Old", 0, false, None);
        old.created_at = Some("2024-06-01T12:00:00".into());
        let mut new = contact(2, "New", 0, false, None);
        new.created_at = Some("2024-06-09T08:00:00".into());
        let mut edge = contact(3, "Edge", 0, false, None);
        edge.created_at = Some("2024-06-03T12:00:00".into());
        let mut broken = contact(4, "Broken", 0, false, None);
        broken.created_at = Some("yesterday".into());

        let book = book(vec![old, new, edge, broken]);
        assert_eq!(names(&book.recent(now)), vec!["New", "Edge"]);
    }

    #[tokio::test]
    async fn test_create_validates_before_request() {
        let mut store = MockContactStore::new();
        store.expect_create().times(0);
        let mut book = ContactBook::new(Arc::new(store));

        let bad = NewContact {
            name: "Ann".into(),
            email: "not-an-email".into(),
            ..NewContact::default()
        };
        assert!(book.create(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_record_access_failure_is_swallowed() {
        let mut store = MockContactStore::new();
        store
            .expect_increment_access()
            .returning(|_| Err(crate::error::MessengerError::Network("down".into())));
        store.expect_list().times(0);
        let mut book = ContactBook::new(Arc::new(store));
        book.record_access(7).await;
    }
}
