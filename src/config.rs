use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub admin_ids: HashSet<i64>,
    pub admin_logs: String,
    pub admin_chat_id: Option<i64>,
    pub admin_log_level: u8,
    pub catalog_path: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {}", var)?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {}: {}", var, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

fn get_required(name: &str, missing: &mut Vec<String>) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => {
            missing.push(name.to_string());
            None
        }
    }
}

fn get_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses a comma-separated list of Telegram user ids, e.g. `"1, 2,3"`.
pub fn parse_admin_ids(raw: &str) -> Result<HashSet<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|e| format!("{:?} is not a user id: {}", part, e))
        })
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let bot_token = get_required("TELEGRAM_BOT_TOKEN", &mut missing);
        let database_url = get_required("DATABASE_URL", &mut missing);

        let admin_ids = match get_optional("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw).unwrap_or_else(|e| {
                invalid.push(("ADMIN_IDS".into(), e));
                HashSet::new()
            }),
            None => HashSet::new(),
        };

        let admin_logs = get_optional("ADMIN_LOGS").unwrap_or_default();

        let admin_chat_id = get_optional("TELEGRAM_ADMIN_CHAT_ID").and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| {
                    invalid.push(("TELEGRAM_ADMIN_CHAT_ID".into(), e.to_string()));
                })
                .ok()
        });
        if admin_logs == "ACTIVE" && get_optional("TELEGRAM_ADMIN_CHAT_ID").is_none() {
            missing.push("TELEGRAM_ADMIN_CHAT_ID".into());
        }

        let admin_log_level = env::var("ADMIN_LOG_LEVEL")
            .unwrap_or_else(|_| "30".into())
            .parse::<u8>()
            .unwrap_or(30);

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ConfigError {
                missing_vars: missing,
                invalid_vars: invalid,
            });
        }

        let (Some(bot_token), Some(database_url)) = (bot_token, database_url) else {
            return Err(ConfigError {
                missing_vars: missing,
                invalid_vars: invalid,
            });
        };

        Ok(Self {
            bot_token,
            database_url,
            redis_url: get_optional("REDIS_URL"),
            admin_ids,
            admin_logs,
            admin_chat_id,
            admin_log_level,
            catalog_path: get_optional("CATALOG_PATH"),
        })
    }

    pub fn is_admin_logs_active(&self) -> bool {
        self.admin_logs == "ACTIVE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        let ids = parse_admin_ids("1, 22 ,333,").unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&22));
    }

    #[test]
    fn test_parse_admin_ids_rejects_garbage() {
        assert!(parse_admin_ids("1,abc").is_err());
        assert!(parse_admin_ids("").unwrap().is_empty());
    }

    #[test]
    fn test_config_error_lists_everything() {
        let err = ConfigError {
            missing_vars: vec!["DATABASE_URL".into()],
            invalid_vars: vec![("ADMIN_IDS".into(), "bad".into())],
        };
        let text = err.to_string();
        assert!(text.contains("DATABASE_URL"));
        assert!(text.contains("ADMIN_IDS: bad"));
    }
}
