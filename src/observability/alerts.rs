use html_escape::encode_text;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Error => "❌",
            Severity::Warning => "⚠️",
            Severity::Info => "ℹ️",
        }
    }

    /// Python-logging style numeric level, compared against `ADMIN_LOG_LEVEL`.
    pub fn level(&self) -> u8 {
        match self {
            Severity::Critical => 50,
            Severity::Error => 40,
            Severity::Warning => 30,
            Severity::Info => 20,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub severity: Severity,
    pub category: String,
}

/// Where alerts go. Unset until `configure` is called with admin logs enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTarget {
    pub chat_id: i64,
    pub min_level: u8,
}

pub struct AlertManager {
    rate_limit: Duration,
    last_alerts: Mutex<HashMap<AlertKey, Instant>>,
    target: OnceLock<AlertTarget>,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertManager {
    pub fn new() -> Self {
        Self {
            rate_limit: Duration::from_secs(60),
            last_alerts: Mutex::new(HashMap::new()),
            target: OnceLock::new(),
        }
    }

    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        Self {
            rate_limit,
            last_alerts: Mutex::new(HashMap::new()),
            target: OnceLock::new(),
        }
    }

    pub fn configure(&self, target: AlertTarget) {
        if self.target.set(target).is_err() {
            tracing::warn!("Alert target already configured, ignoring");
        }
    }

    pub fn is_enabled_for(&self, severity: Severity) -> bool {
        self.target
            .get()
            .map(|t| severity.level() >= t.min_level)
            .unwrap_or(false)
    }

    pub fn should_alert(&self, severity: Severity, category: &str) -> bool {
        let key = AlertKey {
            severity,
            category: category.to_string(),
        };

        let mut last_alerts = match self.last_alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("AlertManager mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        if let Some(last_time) = last_alerts.get(&key) {
            if now.duration_since(*last_time) < self.rate_limit {
                return false;
            }
        }

        last_alerts.insert(key, now);
        true
    }

    pub fn format_alert(&self, severity: Severity, category: &str, message: &str) -> String {
        format!(
            "{} <b>[{}]</b> {}\n{}",
            severity.emoji(),
            severity.label(),
            category,
            encode_text(message)
        )
    }

    pub async fn send_alert(&self, bot: &Bot, severity: Severity, category: &str, message: &str) {
        let Some(target) = self.target.get().copied() else {
            return;
        };
        if !self.is_enabled_for(severity) {
            return;
        }

        if !self.should_alert(severity, category) {
            tracing::debug!("Alert rate-limited: {} - {}", category, message);
            return;
        }

        let formatted = self.format_alert(severity, category, message);

        if let Err(e) = bot
            .send_message(ChatId(target.chat_id), &formatted)
            .parse_mode(ParseMode::Html)
            .await
        {
            tracing::error!("Failed to send alert: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_severity_emoji() {
        assert_eq!(Severity::Critical.emoji(), "🚨");
        assert_eq!(Severity::Error.emoji(), "❌");
        assert_eq!(Severity::Warning.emoji(), "⚠️");
        assert_eq!(Severity::Info.emoji(), "ℹ️");
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(Severity::Critical.label(), "CRITICAL");
        assert_eq!(Severity::Error.label(), "ERROR");
        assert_eq!(Severity::Warning.label(), "WARNING");
        assert_eq!(Severity::Info.label(), "INFO");
    }

    #[test]
    fn test_format_alert() {
        let manager = AlertManager::new();
        let formatted = manager.format_alert(Severity::Error, "Database", "Connection failed");

        assert!(formatted.contains("❌"));
        assert!(formatted.contains("[ERROR]"));
        assert!(formatted.contains("Database"));
        assert!(formatted.contains("Connection failed"));
    }

    #[test]
    fn test_rate_limiting_allows_first_alert() {
        let manager = AlertManager::new();
        assert!(manager.should_alert(Severity::Error, "test"));
    }

    #[test]
    fn test_rate_limiting_blocks_duplicate() {
        let manager = AlertManager::with_rate_limit(Duration::from_millis(100));

        assert!(manager.should_alert(Severity::Error, "test"));
        assert!(!manager.should_alert(Severity::Error, "test"));
    }

    #[test]
    fn test_rate_limiting_allows_after_expiry() {
        let manager = AlertManager::with_rate_limit(Duration::from_millis(50));

        assert!(manager.should_alert(Severity::Error, "test"));
        sleep(Duration::from_millis(60));
        assert!(manager.should_alert(Severity::Error, "test"));
    }

    #[test]
    fn test_different_categories_not_rate_limited() {
        let manager = AlertManager::new();

        assert!(manager.should_alert(Severity::Error, "database"));
        assert!(manager.should_alert(Severity::Error, "telegram"));
    }

    #[test]
    fn test_different_severities_not_rate_limited() {
        let manager = AlertManager::new();

        assert!(manager.should_alert(Severity::Error, "test"));
        assert!(manager.should_alert(Severity::Warning, "test"));
    }

    #[test]
    fn test_level_threshold() {
        let manager = AlertManager::new();
        assert!(!manager.is_enabled_for(Severity::Critical));

        manager.configure(AlertTarget {
            chat_id: -100,
            min_level: 30,
        });
        assert!(manager.is_enabled_for(Severity::Error));
        assert!(manager.is_enabled_for(Severity::Warning));
        assert!(!manager.is_enabled_for(Severity::Info));
    }
}
