use kbk_bot::dialog::FlowError;
use kbk_bot::observability::METRICS;
use kbk_bot::session::run_in_session;
use kbk_bot::update::{is_blocking, Actor};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatMemberUpdated;

use super::super::types::{App, HandlerError, HandlerResult};

/// Tracks users blocking and unblocking the bot in private chats.
pub async fn chat_member_handler(update: ChatMemberUpdated, app: Arc<App>) -> HandlerResult {
    if !update.chat.is_private() {
        return Ok(());
    }

    let actor = Actor::from(&update.from);
    let user_id = actor.id;
    let blocked = is_blocking(&update);
    METRICS.record_member_status(blocked);

    run_in_session(app.sessions.as_ref(), Some(&actor), |session| async move {
        let repo = session.repository().ok_or(FlowError::Unavailable)?;
        repo.set_user_blocked(user_id, blocked)
            .map_err(FlowError::from)?;
        if blocked {
            tracing::info!("User {} blocked the bot", user_id);
        } else {
            tracing::info!("User {} unblocked the bot", user_id);
        }
        Ok::<(), HandlerError>(())
    })
    .await;

    Ok(())
}
