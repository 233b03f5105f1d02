//! Static recruitment catalog: departments, quiz, support contacts,
//! broadcast channels, lectures and menu media.
//!
//! Loaded once at startup and shared read-only.

use crate::models::OnlineEventSpec;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use thiserror::Error;

const EMBEDDED_CATALOG: &str = include_str!("default.json");

/// Keys travel inside callback data, which Telegram caps at 64 bytes.
const MAX_KEY_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    pub departments: Vec<Department>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
    #[serde(default)]
    pub support: Support,
    #[serde(default)]
    pub broadcasts: Vec<BroadcastSpec>,
    #[serde(default)]
    pub lectures: Vec<OnlineEventSpec>,
    #[serde(default)]
    pub media: HashMap<String, MediaRef>,
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Department {
    pub key: String,
    pub title: String,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub task: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Support {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub contacts: Vec<SupportContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupportContact {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastSpec {
    pub key: String,
    pub title: String,
}

/// A pre-uploaded Telegram file id, a local file, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaRef {
    pub file_id: Option<String>,
    pub path: Option<String>,
}

impl Catalog {
    pub fn embedded() -> Result<Catalog, CatalogError> {
        Catalog::from_json(EMBEDDED_CATALOG)
    }

    /// Reads the catalog from `path`, or the built-in one when no path is given.
    pub fn load(path: Option<&str>) -> Result<Catalog, CatalogError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_string(),
                    source,
                })?;
                tracing::info!("Loading catalog from {}", path);
                Catalog::from_json(&raw)
            }
            None => Catalog::embedded(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Catalog, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.check()?;
        Ok(catalog)
    }

    fn check(&self) -> Result<(), CatalogError> {
        let invalid = |msg: String| Err(CatalogError::Invalid(msg));

        if self.timezone.parse::<Tz>().is_err() {
            return invalid(format!("unknown timezone {}", self.timezone));
        }
        if self.departments.is_empty() {
            return invalid("no departments".to_string());
        }

        let mut department_keys = HashSet::new();
        for department in &self.departments {
            check_key(&department.key)?;
            if !department_keys.insert(department.key.as_str()) {
                return invalid(format!("duplicate department {}", department.key));
            }
            if department.positions.is_empty() {
                return invalid(format!("department {} has no positions", department.key));
            }
            let mut position_keys = HashSet::new();
            for position in &department.positions {
                check_key(&position.key)?;
                if !position_keys.insert(position.key.as_str()) {
                    return invalid(format!(
                        "duplicate position {}:{}",
                        department.key, position.key
                    ));
                }
            }
        }

        for (idx, question) in self.quiz.iter().enumerate() {
            if question.options.is_empty() {
                return invalid(format!("quiz question {} has no options", idx + 1));
            }
            if question.correct >= question.options.len() {
                return invalid(format!(
                    "quiz question {} marks option {} correct but has {} options",
                    idx + 1,
                    question.correct,
                    question.options.len()
                ));
            }
        }

        let mut broadcast_keys = HashSet::new();
        for broadcast in &self.broadcasts {
            check_key(&broadcast.key)?;
            if !broadcast_keys.insert(broadcast.key.as_str()) {
                return invalid(format!("duplicate broadcast {}", broadcast.key));
            }
        }

        let mut slugs = HashSet::new();
        for lecture in &self.lectures {
            if !slugs.insert(lecture.slug.as_str()) {
                return invalid(format!("duplicate lecture {}", lecture.slug));
            }
            if lecture.ends_at < lecture.starts_at {
                return invalid(format!("lecture {} ends before it starts", lecture.slug));
            }
        }

        Ok(())
    }

    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Europe::Moscow)
    }

    /// Formats an instant in the catalog's display timezone.
    pub fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz()).format("%d.%m.%Y %H:%M").to_string()
    }

    pub fn department(&self, key: &str) -> Option<&Department> {
        self.departments.iter().find(|d| d.key == key)
    }

    pub fn position(&self, department: &str, position: &str) -> Option<&Position> {
        self.department(department)?
            .positions
            .iter()
            .find(|p| p.key == position)
    }

    /// Human readable "Department / Position", falling back to raw keys.
    pub fn position_label(&self, department: &str, position: &str) -> String {
        match (self.department(department), self.position(department, position)) {
            (Some(d), Some(p)) => format!("{} / {}", d.title, p.title),
            _ => format!("{} / {}", department, position),
        }
    }

    pub fn media(&self, key: &str) -> Option<&MediaRef> {
        self.media.get(key)
    }
}

fn check_key(key: &str) -> Result<(), CatalogError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(CatalogError::Invalid(format!("bad key {:?}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_embedded_catalog_is_valid() {
        let catalog = Catalog::embedded().unwrap();
        assert!(!catalog.departments.is_empty());
        assert!(!catalog.quiz.is_empty());
        assert!(catalog.broadcasts.iter().any(|b| b.key == "news"));
        assert!(catalog.lectures.iter().all(|l| l.is_active));
    }

    #[test]
    fn test_position_lookup() {
        let catalog = Catalog::embedded().unwrap();
        assert!(catalog.position("media", "smm").is_some());
        assert!(catalog.position("media", "host").is_none());
        assert_eq!(catalog.position_label("nope", "x"), "nope / x");
    }

    #[test]
    fn test_rejects_bad_correct_index() {
        let raw = r#"{
            "departments": [{"key": "a", "title": "A", "positions": [{"key": "p", "title": "P"}]}],
            "quiz": [{"question": "?", "options": ["x"], "correct": 1}]
        }"#;
        assert!(matches!(
            Catalog::from_json(raw),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_keys_with_separators() {
        let raw = r#"{
            "departments": [{"key": "a:b", "title": "A", "positions": [{"key": "p", "title": "P"}]}]
        }"#;
        assert!(Catalog::from_json(raw).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Catalog::load(Some("/nonexistent/catalog.json")),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_format_time_uses_display_timezone() {
        let catalog = Catalog::embedded().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 11, 5, 16, 0, 0).unwrap();
        assert_eq!(catalog.format_time(at), "05.11.2026 19:00");
    }
}
