use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "ru";
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["ru", "en"];

static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

fn load_translations() -> HashMap<String, Value> {
    let mut translations = HashMap::new();

    for (language, raw) in [("ru", include_str!("ru.json")), ("en", include_str!("en.json"))] {
        match serde_json::from_str(raw) {
            Ok(value) => {
                translations.insert(language.to_string(), value);
            }
            Err(e) => tracing::error!("Failed to parse {}.json: {}", language, e),
        }
    }

    translations
}

fn get_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in key.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Maps a Telegram `language_code` onto a supported language.
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    match language_code {
        Some(code) if code == "en" || code.starts_with("en-") => "en",
        _ => DEFAULT_LANGUAGE,
    }
}

pub fn t(language: &str, path: &str) -> String {
    let translations = TRANSLATIONS.get_or_init(load_translations);

    let lookup = |lang: &str| {
        translations
            .get(lang)
            .and_then(|value| get_nested_value(value, path))
            .and_then(|value| value.as_str())
    };

    match lookup(language).or_else(|| lookup(DEFAULT_LANGUAGE)) {
        Some(translation) => translation.to_string(),
        None => {
            tracing::warn!("Missing translation for {}", path);
            format!("Message not found: {}", path)
        }
    }
}

pub fn t_with_args(language: &str, path: &str, args: &[&str]) -> String {
    let mut message = t(language, path);

    for arg in args {
        if message.contains("{}") {
            message = message.replacen("{}", arg, 1);
        }
    }

    message
}
