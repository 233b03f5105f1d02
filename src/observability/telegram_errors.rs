use super::alerts::Severity;
use super::{ALERTS, METRICS};
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelegramErrorKind {
    RateLimited,
    BotBlocked,
    ChatNotFound,
    /// Edit of a message whose content did not change; harmless.
    NotModified,
    NetworkError,
    Other,
}

pub fn classify_telegram_error(error: &RequestError) -> TelegramErrorKind {
    match error {
        RequestError::RetryAfter(_) => TelegramErrorKind::RateLimited,
        RequestError::Api(ApiError::BotBlocked) | RequestError::Api(ApiError::UserDeactivated) => {
            TelegramErrorKind::BotBlocked
        }
        RequestError::Api(ApiError::ChatNotFound) | RequestError::Api(ApiError::UserNotFound) => {
            TelegramErrorKind::ChatNotFound
        }
        RequestError::Api(ApiError::MessageNotModified) => TelegramErrorKind::NotModified,
        RequestError::Api(api_error) => {
            let error_str = api_error.to_string().to_lowercase();
            if error_str.contains("bot was blocked") {
                TelegramErrorKind::BotBlocked
            } else if error_str.contains("chat not found") {
                TelegramErrorKind::ChatNotFound
            } else {
                TelegramErrorKind::Other
            }
        }
        RequestError::Network(_) => TelegramErrorKind::NetworkError,
        _ => TelegramErrorKind::Other,
    }
}

/// Logs, counts and, where it matters, alerts about a failed Bot API call.
pub async fn handle_telegram_error(
    bot: &Bot,
    error: &RequestError,
    chat_id: i64,
    context: &str,
) -> TelegramErrorKind {
    let kind = classify_telegram_error(error);

    let alert = match kind {
        TelegramErrorKind::NotModified => {
            tracing::debug!("Message in chat {} not modified while {}", chat_id, context);
            return kind;
        }
        TelegramErrorKind::BotBlocked => {
            tracing::info!("Bot blocked by user in chat {}", chat_id);
            None
        }
        TelegramErrorKind::RateLimited => {
            let retry_after = match error {
                RequestError::RetryAfter(duration) => duration.as_secs(),
                _ => 0,
            };
            tracing::warn!(
                "Telegram rate limit hit for chat {}: retry after {}s",
                chat_id,
                retry_after
            );
            Some((
                Severity::Warning,
                "Telegram-RateLimit",
                format!("Rate limited while {}: retry after {}s", context, retry_after),
            ))
        }
        TelegramErrorKind::ChatNotFound => {
            tracing::warn!("Chat {} not found on Telegram", chat_id);
            None
        }
        TelegramErrorKind::NetworkError => {
            tracing::error!("Network error for chat {}: {}", chat_id, error);
            Some((
                Severity::Error,
                "Telegram-Network",
                format!("Network error while {}: {}", context, error),
            ))
        }
        TelegramErrorKind::Other => {
            tracing::error!("Telegram error for chat {}: {}", chat_id, error);
            Some((
                Severity::Warning,
                "Telegram",
                format!("Error while {} in chat {}: {}", context, chat_id, error),
            ))
        }
    };

    METRICS.increment_errors();
    if let Some((severity, category, message)) = alert {
        ALERTS.send_alert(bot, severity, category, &message).await;
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_rate_limited() {
        let error = RequestError::RetryAfter(Duration::from_secs(30));
        assert_eq!(
            classify_telegram_error(&error),
            TelegramErrorKind::RateLimited
        );
    }

    #[test]
    fn test_classify_api_errors() {
        assert_eq!(
            classify_telegram_error(&RequestError::Api(ApiError::BotBlocked)),
            TelegramErrorKind::BotBlocked
        );
        assert_eq!(
            classify_telegram_error(&RequestError::Api(ApiError::MessageNotModified)),
            TelegramErrorKind::NotModified
        );
        assert_eq!(
            classify_telegram_error(&RequestError::Api(ApiError::ChatNotFound)),
            TelegramErrorKind::ChatNotFound
        );
    }
}
