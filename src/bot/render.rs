//! Turns flow [`Screen`]s into Bot API calls.

use kbk_bot::catalog::MediaRef;
use kbk_bot::dialog::{ButtonAction, Screen};
use kbk_bot::observability::telegram_errors::{classify_telegram_error, TelegramErrorKind};
use kbk_bot::observability::METRICS;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};

const CAPTION_LIMIT: usize = 1024;

pub fn build_keyboard(screen: &Screen) -> InlineKeyboardMarkup {
    let rows = screen.keyboard.iter().map(|row| {
        row.iter()
            .filter_map(|button| match &button.action {
                ButtonAction::Callback(data) => {
                    Some(InlineKeyboardButton::callback(button.label.clone(), data.clone()))
                }
                ButtonAction::Url(link) => match url::Url::parse(link) {
                    Ok(url) => Some(InlineKeyboardButton::url(button.label.clone(), url)),
                    Err(e) => {
                        tracing::warn!("Skipping button with invalid url {:?}: {}", link, e);
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

fn photo_input(media: &MediaRef) -> Option<InputFile> {
    if let Some(file_id) = &media.file_id {
        return Some(InputFile::file_id(file_id.clone()));
    }
    match &media.path {
        Some(path) if Path::new(path).exists() => Some(InputFile::file(path)),
        Some(path) => {
            tracing::warn!("Media file {} not found, sending text only", path);
            None
        }
        None => None,
    }
}

pub async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    METRICS.increment_messages_sent();
    Ok(())
}

/// Sends `screen` as a new message, as a photo when it carries media.
pub async fn send_screen(bot: &Bot, chat_id: ChatId, screen: &Screen) -> ResponseResult<()> {
    let keyboard = build_keyboard(screen);

    if let Some(photo) = screen.media.as_ref().and_then(photo_input) {
        if screen.text.chars().count() <= CAPTION_LIMIT {
            bot.send_photo(chat_id, photo)
                .caption(&screen.text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            METRICS.increment_messages_sent();
            return Ok(());
        }
        bot.send_photo(chat_id, photo).await?;
        METRICS.increment_messages_sent();
    }

    bot.send_message(chat_id, &screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    METRICS.increment_messages_sent();
    Ok(())
}

/// Replaces a text message in place; falls back to a new message for media
/// screens or when the original cannot be edited.
pub async fn edit_screen(bot: &Bot, message: &Message, screen: &Screen) -> ResponseResult<()> {
    if screen.media.is_some() || message.text().is_none() {
        return send_screen(bot, message.chat.id, screen).await;
    }

    let result = bot
        .edit_message_text(message.chat.id, message.id, &screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(build_keyboard(screen))
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => match classify_telegram_error(&e) {
            TelegramErrorKind::NotModified => Ok(()),
            TelegramErrorKind::Other => {
                tracing::debug!("Edit failed in chat {}, sending anew: {}", message.chat.id, e);
                send_screen(bot, message.chat.id, screen).await
            }
            _ => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbk_bot::dialog::Button;

    #[test]
    fn test_keyboard_rows_follow_screen() {
        let screen = Screen::new("hi")
            .row(vec![
                Button::callback("A", "menu:a"),
                Button::callback("B", "menu:b"),
            ])
            .button(Button::url("Join", "https://example.com/live"));

        let keyboard = build_keyboard(&screen);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
        assert_eq!(keyboard.inline_keyboard[1][0].text, "Join");
    }

    #[test]
    fn test_invalid_url_is_skipped() {
        let screen = Screen::new("hi").row(vec![
            Button::url("Broken", "not a url"),
            Button::callback("Ok", "menu:main"),
        ]);

        let keyboard = build_keyboard(&screen);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Ok");
    }

    #[test]
    fn test_missing_media_file_means_no_photo() {
        let media = MediaRef {
            file_id: None,
            path: Some("/nonexistent/welcome.jpg".into()),
        };
        assert!(photo_input(&media).is_none());

        let media = MediaRef {
            file_id: Some("AgACAgIAAxkBAAIB".into()),
            path: None,
        };
        assert!(photo_input(&media).is_some());
    }
}
