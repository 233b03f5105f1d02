//! Input validators for free-text dialog steps.
//!
//! Every validator has the same shape, `fn(&str) -> Result<String, Rejection>`:
//! it either returns the normalized value to store or a reason that the
//! dialog shows before repeating the prompt.

mod profanity;

pub use profanity::{ProfanityFilter, PROFANITY};

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 128;
pub const EDUCATION_MIN_CHARS: usize = 3;
pub const EDUCATION_MAX_CHARS: usize = 256;
pub const MOTIVATION_MAX_CHARS: usize = 2000;
pub const FEEDBACK_MAX_CHARS: usize = 3000;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
        .expect("email pattern should be valid");
    static ref PHONE_RE: Regex = Regex::new(r"^\+\d{10,15}$").expect("phone pattern should be valid");
}

pub type Validator = fn(&str) -> Result<String, Rejection>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooShort { min: usize },
    TooLong { max: usize },
    Profanity,
    InvalidEmail,
    InvalidPhone,
}

impl Rejection {
    /// Translation key of the message shown to the user.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            Rejection::Empty => "validation.empty",
            Rejection::TooShort { .. } => "validation.too_short",
            Rejection::TooLong { .. } => "validation.too_long",
            Rejection::Profanity => "validation.profanity",
            Rejection::InvalidEmail => "validation.email",
            Rejection::InvalidPhone => "validation.phone",
        }
    }

    /// Positional arguments for the message behind [`Rejection::i18n_key`].
    pub fn i18n_args(&self) -> Vec<String> {
        match self {
            Rejection::TooShort { min } => vec![min.to_string()],
            Rejection::TooLong { max } => vec![max.to_string()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "value is empty"),
            Rejection::TooShort { min } => write!(f, "value is shorter than {} characters", min),
            Rejection::TooLong { max } => write!(f, "value is longer than {} characters", max),
            Rejection::Profanity => write!(f, "value contains profanity"),
            Rejection::InvalidEmail => write!(f, "invalid email address"),
            Rejection::InvalidPhone => write!(f, "invalid phone number"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Trims, drops control characters and collapses inner runs of spaces.
pub fn sanitize_input(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect::<String>()
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn check_length(value: &str, min: usize, max: usize) -> Result<(), Rejection> {
    let count = value.chars().count();
    if count == 0 {
        return Err(Rejection::Empty);
    }
    if count < min {
        return Err(Rejection::TooShort { min });
    }
    if count > max {
        return Err(Rejection::TooLong { max });
    }
    Ok(())
}

pub fn validate_name(input: &str) -> Result<String, Rejection> {
    let name = sanitize_input(input);
    check_length(&name, NAME_MIN_CHARS, NAME_MAX_CHARS)?;
    if PROFANITY.contains_profanity(&name) {
        return Err(Rejection::Profanity);
    }
    Ok(name)
}

pub fn validate_email(input: &str) -> Result<String, Rejection> {
    let email = input.trim().to_lowercase();
    if email.is_empty() {
        return Err(Rejection::Empty);
    }
    if !EMAIL_RE.is_match(&email) {
        return Err(Rejection::InvalidEmail);
    }
    Ok(email)
}

pub fn validate_phone(input: &str) -> Result<String, Rejection> {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if cleaned.is_empty() {
        return Err(Rejection::Empty);
    }

    let normalized = if cleaned.starts_with('+') {
        cleaned
    } else if let Some(rest) = cleaned.strip_prefix('8') {
        format!("+7{}", rest)
    } else if cleaned.starts_with('7') {
        format!("+{}", cleaned)
    } else if cleaned.len() == 10 {
        format!("+7{}", cleaned)
    } else {
        format!("+{}", cleaned)
    };

    if !PHONE_RE.is_match(&normalized) {
        return Err(Rejection::InvalidPhone);
    }
    Ok(normalized)
}

pub fn validate_education(input: &str) -> Result<String, Rejection> {
    let education = sanitize_input(input);
    check_length(&education, EDUCATION_MIN_CHARS, EDUCATION_MAX_CHARS)?;
    Ok(education)
}

pub fn validate_motivation(input: &str) -> Result<String, Rejection> {
    let motivation = input.trim().to_string();
    check_length(&motivation, 1, MOTIVATION_MAX_CHARS)?;
    Ok(motivation)
}

pub fn validate_feedback(input: &str) -> Result<String, Rejection> {
    let feedback = input.trim().to_string();
    check_length(&feedback, 1, FEEDBACK_MAX_CHARS)?;
    Ok(feedback)
}

/// Task answers and resume links share the motivation limits.
pub fn validate_free_text(input: &str) -> Result<String, Rejection> {
    let text = input.trim().to_string();
    check_length(&text, 1, MOTIVATION_MAX_CHARS * 2)?;
    Ok(text)
}
