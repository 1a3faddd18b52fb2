use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::dto::RegisterRequest;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 8;

/// First rule a registration request breaks. The message is what the
/// client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password is too short")]
    PasswordTooShort,
    #[error("Name is too short")]
    NameTooShort,
    #[error("Password must include a number")]
    PasswordMissingDigit,
    #[error("Password must include a letter")]
    PasswordMissingLetter,
    #[error("Password must include a special character")]
    PasswordMissingSpecial,
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref DIGIT_RE: Regex = Regex::new(r"[0-9]").unwrap();
    static ref LETTER_RE: Regex = Regex::new(r"[a-zA-Z]").unwrap();
    static ref SPECIAL_RE: Regex = Regex::new(r"[!@#$%^&*]").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

type Check = fn(&RegisterRequest) -> bool;

// Evaluated top to bottom; the order decides which message wins.
const RULES: &[(Check, ValidationError)] = &[
    (|r: &RegisterRequest| is_valid_email(&r.email), ValidationError::InvalidEmail),
    (
        |r: &RegisterRequest| r.password.chars().count() >= MIN_PASSWORD_LEN,
        ValidationError::PasswordTooShort,
    ),
    (
        |r: &RegisterRequest| r.name.chars().count() >= MIN_NAME_LEN,
        ValidationError::NameTooShort,
    ),
    (|r: &RegisterRequest| DIGIT_RE.is_match(&r.password), ValidationError::PasswordMissingDigit),
    (|r: &RegisterRequest| LETTER_RE.is_match(&r.password), ValidationError::PasswordMissingLetter),
    (|r: &RegisterRequest| SPECIAL_RE.is_match(&r.password), ValidationError::PasswordMissingSpecial),
];

/// Runs every registration rule and returns the first one violated.
pub fn validate_registration(req: &RegisterRequest) -> Result<(), ValidationError> {
    match RULES.iter().find(|(check, _)| !check(req)) {
        Some((_, err)) => Err(*err),
        None => Ok(()),
    }
}
