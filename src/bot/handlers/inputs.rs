use kbk_bot::dialog::{DialogState, Input};
use kbk_bot::flows;
use kbk_bot::i18n::{detect_language, t};
use kbk_bot::update::Actor;
use std::sync::Arc;
use teloxide::prelude::*;

use super::super::render;
use super::super::types::{App, HandlerResult, KbkDialogue};
use super::{run_flow, Target};

/// Text and documents are the only inputs flows accept.
pub fn input_from_message(msg: &Message) -> Option<Input> {
    if let Some(text) = msg.text() {
        return Some(Input::Text(text.to_string()));
    }
    msg.document().map(|doc| Input::Document {
        file_id: doc.file.id.clone(),
        file_name: doc.file_name.clone(),
    })
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: KbkDialogue,
    state: DialogState,
    app: Arc<App>,
) -> HandlerResult {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(actor) = msg.from().map(Actor::from) else {
        return Ok(());
    };

    let Some(input) = input_from_message(&msg) else {
        let language = detect_language(actor.language_code.as_deref());
        render::send_text(&bot, msg.chat.id, &t(language, "common.text_expected")).await?;
        return Ok(());
    };

    run_flow(&bot, &app, &dialogue, &actor, Target::Chat(msg.chat.id), |ctx| {
        flows::handle_input(ctx, &state, &input)
    })
    .await;

    Ok(())
}
