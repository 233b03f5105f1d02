use crate::db::DbError;
use crate::dialog::{Button, FlowContext, FlowError, Screen, Transition};
use crate::models::{Broadcast, UserSubscription};
use crate::repository::Repository;

fn load(
    repo: &dyn Repository,
    user_id: i64,
) -> Result<(Vec<Broadcast>, Vec<UserSubscription>), DbError> {
    Ok((repo.list_broadcasts()?, repo.find_subscriptions(user_id)?))
}

pub fn subscriptions_screen(ctx: &FlowContext) -> Screen {
    let Some(repo) = ctx.repo else {
        return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
    };
    let (broadcasts, subscriptions) = match load(repo, ctx.user_id) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::warn!("Failed to load subscriptions for {}: {}", ctx.user_id, e);
            return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
        }
    };
    if broadcasts.is_empty() {
        return Screen::new(ctx.t("subscriptions.empty")).button(ctx.menu_button());
    }

    broadcasts
        .iter()
        .fold(Screen::new(ctx.t("subscriptions.title")), |screen, broadcast| {
            let active = subscriptions
                .iter()
                .any(|s| s.broadcast_id == broadcast.id && s.is_active());
            let mark = if active { "✅" } else { "▫️" };
            screen.button(Button::callback(
                format!("{} {}", mark, broadcast.title),
                format!("sub:toggle:{}", broadcast.key),
            ))
        })
        .button(ctx.menu_button())
}

pub fn start(ctx: &FlowContext) -> Transition {
    Transition::idle(subscriptions_screen(ctx))
}

pub fn handle_callback(ctx: &FlowContext, data: &str) -> Result<Transition, FlowError> {
    let Some(key) = data.strip_prefix("toggle:") else {
        return Ok(start(ctx));
    };
    let repo = ctx.repo()?;

    let Some(broadcast) = repo.list_broadcasts()?.into_iter().find(|b| b.key == key) else {
        return Ok(Transition::idle(
            subscriptions_screen(ctx).prepend(&ctx.t("common.expired")),
        ));
    };

    let active = repo
        .find_subscriptions(ctx.user_id)?
        .iter()
        .any(|s| s.broadcast_id == broadcast.id && s.is_active());

    let notice = if active {
        repo.unsubscribe(ctx.user_id, broadcast.id)?;
        ctx.t_args("subscriptions.unsubscribed", &[&broadcast.title])
    } else {
        repo.subscribe(ctx.user_id, broadcast.id)?;
        ctx.t_args("subscriptions.subscribed", &[&broadcast.title])
    };
    tracing::info!(
        "User {} {} {}",
        ctx.user_id,
        if active { "unsubscribed from" } else { "subscribed to" },
        broadcast.key
    );

    Ok(Transition::idle(subscriptions_screen(ctx).prepend(&notice)))
}
