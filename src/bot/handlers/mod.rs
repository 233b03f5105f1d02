mod admin;
mod callbacks;
mod commands;
mod inputs;
mod members;

pub use callbacks::{callback_handler, inline_handler};
pub use commands::{command_handler, Command};
pub use inputs::message_handler;
pub use members::chat_member_handler;

use kbk_bot::dialog::{FlowContext, FlowError, Transition};
use kbk_bot::i18n::{detect_language, t};
use kbk_bot::observability::alerts::Severity;
use kbk_bot::observability::telegram_errors::handle_telegram_error;
use kbk_bot::observability::ALERTS;
use kbk_bot::session::run_in_session;
use kbk_bot::update::Actor;
use teloxide::prelude::*;

use super::render;
use super::types::{App, HandlerError, HandlerResult, KbkDialogue};

/// Where a flow's next screen goes.
#[derive(Clone, Copy)]
pub(crate) enum Target<'a> {
    Chat(ChatId),
    /// Edit the message whose button was pressed.
    Edit(&'a Message),
}

impl Target<'_> {
    fn chat_id(&self) -> ChatId {
        match self {
            Target::Chat(chat_id) => *chat_id,
            Target::Edit(message) => message.chat.id,
        }
    }
}

async fn apply_transition(
    bot: &Bot,
    dialogue: &KbkDialogue,
    target: Target<'_>,
    transition: Transition,
) -> HandlerResult {
    let sent = match target {
        Target::Chat(chat_id) => render::send_screen(bot, chat_id, &transition.screen).await,
        Target::Edit(message) => render::edit_screen(bot, message, &transition.screen).await,
    };
    if let Err(e) = sent {
        handle_telegram_error(bot, &e, target.chat_id().0, "showing a screen").await;
        return Err(e.into());
    }

    tracing::debug!(
        "Chat {} moves to {}",
        target.chat_id().0,
        transition.next.flow_name()
    );
    dialogue.update(transition.next).await?;
    Ok(())
}

async fn report_flow_error(bot: &Bot, chat_id: ChatId, language: &str, error: &FlowError) {
    let key = match error {
        FlowError::Storage(e) => {
            ALERTS
                .send_alert(bot, Severity::Error, "Database", &e.to_string())
                .await;
            "bot.failure"
        }
        FlowError::Unavailable => "common.unavailable",
    };
    if let Err(e) = render::send_text(bot, chat_id, &t(language, key)).await {
        handle_telegram_error(bot, &e, chat_id.0, "reporting a failure").await;
    }
}

/// Runs one flow step inside the update's unit of work and shows the result.
///
/// A failing step keeps the dialog state, rolls the transaction back and
/// tells the user something went wrong.
pub(crate) async fn run_flow<F>(
    bot: &Bot,
    app: &App,
    dialogue: &KbkDialogue,
    actor: &Actor,
    target: Target<'_>,
    step: F,
) where
    F: FnOnce(&FlowContext) -> Result<Transition, FlowError> + Send,
{
    let language = detect_language(actor.language_code.as_deref());
    let user_id = actor.id;

    let outcome = run_in_session(app.sessions.as_ref(), Some(actor), |session| async move {
        let result = {
            let ctx = app.flow_context(&session, user_id, language);
            step(&ctx)
        };
        match result {
            Ok(transition) => apply_transition(bot, dialogue, target, transition).await,
            Err(e) => {
                report_flow_error(bot, target.chat_id(), language, &e).await;
                Err(HandlerError::from(e))
            }
        }
    })
    .await;

    tracing::debug!("Update from {} finished: {:?}", user_id, outcome);
}
