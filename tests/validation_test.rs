//! Unit tests for validation.rs module

use contact_messenger::error::MessengerError;
use contact_messenger::models::NewContact;
use contact_messenger::validation::{InputValidator, MAX_MESSAGE_LENGTH};

#[test]
fn test_validate_contact_name_valid() {
    assert!(InputValidator::validate_contact_name("John Doe").is_ok());
}

#[test]
fn test_validate_contact_name_whitespace_only() {
    assert!(InputValidator::validate_contact_name("   ").is_err());
}

#[test]
fn test_validate_contact_name_too_long() {
    let long_name = "a".repeat(256);
    assert!(InputValidator::validate_contact_name(&long_name).is_err());
    assert!(InputValidator::validate_contact_name(&"a".repeat(255)).is_ok());
}

#[test]
fn test_validate_contact_name_with_line_breaks() {
    assert!(InputValidator::validate_contact_name("John\nDoe").is_err());
    assert!(InputValidator::validate_contact_name("John\0Doe").is_err());
}

#[test]
fn test_validate_contact_name_unicode() {
    assert!(InputValidator::validate_contact_name("José García").is_ok());
}

#[test]
fn test_validate_phone_allowed_characters() {
    assert!(InputValidator::validate_phone("+1 (555) 010-2000").is_ok());
    assert!(InputValidator::validate_phone("555.010.2000").is_err());
    assert!(InputValidator::validate_phone("call me").is_err());
}

#[test]
fn test_validate_email_shapes() {
    assert!(InputValidator::validate_email("ada@example.com").is_ok());
    assert!(InputValidator::validate_email(" ada@example.com ").is_ok());
    assert!(InputValidator::validate_email("").is_err());
    assert!(InputValidator::validate_email("ada@example").is_err());
    assert!(InputValidator::validate_email("ada example@x.com").is_err());
    assert!(InputValidator::validate_email("@example.com").is_err());
    assert!(InputValidator::validate_email("a@b@c.com").is_err());
    assert!(InputValidator::validate_email("ada@.com").is_err());
}

#[test]
fn test_validate_new_contact() {
    let mut contact = NewContact {
        name: "Ada".into(),
        email: "ada@example.com".into(),
        phone: Some(String::new()),
        ..NewContact::default()
    };
    assert!(InputValidator::validate_new_contact(&contact).is_ok());

    contact.phone = Some("abc".into());
    assert!(matches!(
        InputValidator::validate_new_contact(&contact),
        Err(MessengerError::Validation(_))
    ));

    contact.phone = None;
    contact.name = String::new();
    assert!(InputValidator::validate_new_contact(&contact).is_err());
}

#[test]
fn test_message_text_is_trimmed() {
    assert_eq!(InputValidator::validate_message_text("  hi there \n").unwrap(), "hi there");
}

#[test]
fn test_message_text_empty_is_rejected() {
    assert!(InputValidator::validate_message_text("").is_err());
    assert!(InputValidator::validate_message_text(" \t\n ").is_err());
    assert!(InputValidator::validate_message_text("\u{7}").is_err());
}

#[test]
fn test_message_text_length_limit() {
    assert!(InputValidator::validate_message_text(&"x".repeat(MAX_MESSAGE_LENGTH)).is_ok());
    assert!(InputValidator::validate_message_text(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
}

#[test]
fn test_sanitize_text_keeps_line_breaks() {
    assert_eq!(InputValidator::sanitize_text("a\u{0}b\nc"), "ab\nc");
}
