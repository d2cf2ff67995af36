use crate::error::{MessengerError, Result};
use crate::models::NewContact;

/// Longest message body accepted before sending
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// Validation utilities for input sanitization, run before any network call
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a message body and return it trimmed
    pub fn validate_message_text(text: &str) -> Result<String> {
        let cleaned = Self::sanitize_text(text);
        if cleaned.is_empty() {
            return Err(MessengerError::validation("Message text is required"));
        }

        if cleaned.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(MessengerError::validation(format!(
                "Message too long (max {MAX_MESSAGE_LENGTH} characters)"
            )));
        }

        Ok(cleaned)
    }

    /// Validate contact name
    pub fn validate_contact_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(MessengerError::validation("Name is required"));
        }

        if name.chars().count() > 255 {
            return Err(MessengerError::validation("Contact name too long (max 255 characters)"));
        }

        // Check for potentially dangerous characters
        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(MessengerError::validation("Contact name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate phone number format
    ///
    /// Phone numbers are free-form, but only digits, spaces and `-+()` are allowed.
    pub fn validate_phone(phone: &str) -> Result<()> {
        let valid = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'));
        if !valid {
            return Err(MessengerError::validation("Please enter a valid phone number"));
        }

        Ok(())
    }

    /// Validate email format
    pub fn validate_email(email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(MessengerError::validation("Email is required"));
        }

        if email.len() > 254 || email.chars().any(char::is_whitespace) {
            return Err(MessengerError::validation("Please enter a valid email address"));
        }

        let Some((local_part, domain_part)) = email.split_once('@') else {
            return Err(MessengerError::validation("Please enter a valid email address"));
        };

        if local_part.is_empty() || domain_part.contains('@') {
            return Err(MessengerError::validation("Please enter a valid email address"));
        }

        // Domain needs a dot with something on both sides
        let dotted = domain_part
            .rsplit_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty());
        if !dotted {
            return Err(MessengerError::validation("Please enter a valid email address"));
        }

        Ok(())
    }

    /// Validate every field of a new contact
    pub fn validate_new_contact(contact: &NewContact) -> Result<()> {
        Self::validate_contact_name(&contact.name)?;
        Self::validate_email(&contact.email)?;
        if let Some(phone) = contact.phone.as_deref().filter(|p| !p.is_empty()) {
            Self::validate_phone(phone)?;
        }
        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
            .collect::<String>()
            .trim()
            .to_string()
    }
}
