//! Contact export to JSON and CSV, and planning of JSON imports.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{MessengerError, Result};
use crate::models::{Contact, NewContact};

/// CSV header row
pub const CSV_HEADER: [&str; 7] = ["Name", "Email", "Phone", "Company", "Notes", "Favorite", "Created At"];

/// Export file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// Quoted CSV with a header row
    Csv,
}

impl ExportFormat {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = MessengerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(MessengerError::validation(format!("Unsupported export format: {other}"))),
        }
    }
}

/// `contacts_YYYY-MM-DD.<ext>`
#[must_use]
pub fn default_export_name(format: ExportFormat, today: NaiveDate) -> String {
    format!("contacts_{}.{}", today.format("%Y-%m-%d"), format.extension())
}

/// Write `contacts` to `path` in `format`
pub fn export_contacts(contacts: &[Contact], format: ExportFormat, path: &Path) -> Result<()> {
    match format {
        ExportFormat::Json => export_json(contacts, path),
        ExportFormat::Csv => export_csv(contacts, path),
    }
}

/// Write contacts as a pretty JSON array in wire shape
pub fn export_json(contacts: &[Contact], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, contacts)?;
    writer.flush()?;
    debug!(path = %path.display(), count = contacts.len(), "Exported contacts as JSON");
    Ok(())
}

/// Write contacts as CSV
pub fn export_csv(contacts: &[Contact], path: &Path) -> Result<()> {
    write_csv(contacts, File::create(path)?)?;
    debug!(path = %path.display(), count = contacts.len(), "Exported contacts as CSV");
    Ok(())
}

/// Write contacts as CSV to any writer. Every cell is quoted.
pub fn write_csv<W: Write>(contacts: &[Contact], writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().quote_style(QuoteStyle::Always).from_writer(writer);
    writer.write_record(CSV_HEADER)?;

    for contact in contacts {
        writer.write_record([
            contact.name.as_str(),
            contact.email.as_str(),
            contact.phone.as_deref().unwrap_or_default(),
            contact.company.as_deref().unwrap_or_default(),
            contact.notes.as_deref().unwrap_or_default(),
            if contact.is_favorite { "Yes" } else { "No" },
            contact.created_at.as_deref().unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Lenient shape of one imported entry; unknown fields such as `id` are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImportEntry {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    notes: Option<String>,
    photo: Option<String>,
    group: Option<String>,
}

/// Contacts to create from an import file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    /// Entries to create, in file order
    pub to_create: Vec<NewContact>,
    /// Entries skipped as duplicates or invalid
    pub skipped: usize,
}

impl ImportPlan {
    /// Number of entries to create
    #[must_use]
    pub fn imported(&self) -> usize {
        self.to_create.len()
    }
}

/// Decide which entries of a JSON import to create.
///
/// The document must be an array. Entries without a name or email, or whose email equals
/// an existing contact's email exactly, are skipped.
pub fn plan_import(json: &str, existing: &[Contact]) -> Result<ImportPlan> {
    let document: Value = serde_json::from_str(json)
        .map_err(|_| MessengerError::validation("Failed to import. Please check the file format."))?;
    let Value::Array(entries) = document else {
        return Err(MessengerError::validation("Invalid file format. Expected an array of contacts."));
    };

    let mut plan = ImportPlan::default();
    for entry in entries {
        let Ok(entry) = serde_json::from_value::<ImportEntry>(entry) else {
            plan.skipped += 1;
            continue;
        };
        let (Some(name), Some(email)) = (entry.name, entry.email) else {
            plan.skipped += 1;
            continue;
        };
        let exists = existing.iter().any(|c| c.email == email)
            || plan.to_create.iter().any(|c| c.email == email);
        if name.is_empty() || email.is_empty() || exists {
            plan.skipped += 1;
            continue;
        }
        plan.to_create.push(NewContact {
            name,
            email,
            phone: entry.phone,
            company: entry.company,
            notes: entry.notes,
            photo: entry.photo,
            group: entry.group,
        });
    }

    debug!(imported = plan.imported(), skipped = plan.skipped, "Planned contact import");
    Ok(plan)
}
