use kbk_bot::dialog::DialogState;
use kbk_bot::flows;
use kbk_bot::observability::telegram_errors::handle_telegram_error;
use kbk_bot::observability::METRICS;
use kbk_bot::update::Actor;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineQuery, InlineQueryResult};

use super::super::types::{App, HandlerResult, KbkDialogue};
use super::{run_flow, Target};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: KbkDialogue,
    state: DialogState,
    app: Arc<App>,
) -> HandlerResult {
    let actor = Actor::from(&q.from);

    match bot.answer_callback_query(&q.id).await {
        Ok(_) => METRICS.increment_callbacks(),
        Err(e) => {
            handle_telegram_error(&bot, &e, actor.id, "answering a callback").await;
        }
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    tracing::debug!(
        "Callback {:?} from {} in state {}",
        data,
        actor.id,
        state.flow_name()
    );

    let target = match &q.message {
        Some(message) => Target::Edit(message),
        None => Target::Chat(ChatId(actor.id)),
    };

    run_flow(&bot, &app, &dialogue, &actor, target, |ctx| {
        flows::handle_callback(ctx, &state, data)
    })
    .await;

    Ok(())
}

/// The bot has no inline mode; queries get an empty answer so clients stop waiting.
pub async fn inline_handler(bot: Bot, q: InlineQuery) -> HandlerResult {
    bot.answer_inline_query(&q.id, Vec::<InlineQueryResult>::new())
        .await?;
    Ok(())
}
