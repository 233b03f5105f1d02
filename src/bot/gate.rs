use kbk_bot::admin_lock::{check_gate, GateDecision, RejectStyle};
use kbk_bot::i18n::{detect_language, t};
use kbk_bot::observability::telegram_errors::handle_telegram_error;
use kbk_bot::observability::METRICS;
use kbk_bot::update::InboundUpdate;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InlineQueryResult;

use super::types::App;

/// Filter in front of every branch. Returns `false` to drop the update.
pub async fn admin_gate(bot: Bot, update: Update, app: Arc<App>) -> bool {
    METRICS.increment_updates();

    let inbound = InboundUpdate::from_update(&update);
    let style = match check_gate(app.lock.as_ref(), &inbound, &app.admins).await {
        GateDecision::Pass => return true,
        GateDecision::Reject(style) => style,
    };
    METRICS.increment_gate_rejections();

    let Some(actor) = inbound.acting_user() else {
        return false;
    };
    let language = detect_language(actor.language_code.as_deref());
    let text = t(language, "bot.maintenance");

    let answered = match (&inbound, style) {
        (InboundUpdate::Callback { query_id, .. }, RejectStyle::Alert) => bot
            .answer_callback_query(query_id)
            .text(text)
            .show_alert(true)
            .await
            .map(|_| ()),
        (InboundUpdate::Message { chat_id, .. }, RejectStyle::Reply) => {
            bot.send_message(ChatId(*chat_id), text).await.map(|_| ())
        }
        (InboundUpdate::Inline { query_id, .. }, RejectStyle::EmptyInlineAnswer) => bot
            .answer_inline_query(query_id, Vec::<InlineQueryResult>::new())
            .await
            .map(|_| ()),
        _ => Ok(()),
    };
    if let Err(e) = answered {
        handle_telegram_error(&bot, &e, actor.id, "rejecting an update while locked").await;
    }

    false
}
