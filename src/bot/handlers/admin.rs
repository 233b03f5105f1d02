use kbk_bot::dialog::FlowError;
use kbk_bot::i18n::{t, t_with_args};
use kbk_bot::models::roles;
use kbk_bot::observability::metrics::MetricsSnapshot;
use kbk_bot::observability::METRICS;
use kbk_bot::repository::{grant_role, revoke_role};
use kbk_bot::session::run_in_session;
use kbk_bot::update::Actor;
use teloxide::prelude::*;

use super::super::render;
use super::super::types::{App, HandlerError, HandlerResult};
use super::commands::Command;

/// Splits `/grant` and `/revoke` arguments into a user id and an assignable role.
pub fn parse_role_args(args: &str) -> Option<(i64, String)> {
    let mut parts = args.split_whitespace();
    let user_id = parts.next()?.parse::<i64>().ok()?;
    let role = parts.next()?.to_lowercase();
    if parts.next().is_some() || !roles::ASSIGNABLE.contains(&role.as_str()) {
        return None;
    }
    Some((user_id, role))
}

pub fn format_stats(language: &str, stats: &MetricsSnapshot) -> String {
    t_with_args(
        language,
        "admin.stats",
        &[
            &stats.updates_received.to_string(),
            &stats.messages_sent.to_string(),
            &stats.callbacks_answered.to_string(),
            &stats.gate_rejections.to_string(),
            &stats.churned_users.to_string(),
            &stats.returned_users.to_string(),
            &stats.errors.to_string(),
            &stats.uptime_secs.to_string(),
        ],
    )
}

pub async fn handle_admin_command(
    bot: &Bot,
    msg: &Message,
    command: Command,
    app: &App,
    actor: &Actor,
    language: &str,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    tracing::info!("Admin {} issued a command", actor.id);

    match command {
        Command::Lock | Command::Unlock => {
            let locked = matches!(command, Command::Lock);
            let reply = match app.lock.set_locked(locked).await {
                Ok(()) if locked => {
                    tracing::warn!("Bot locked by {}", actor.id);
                    t(language, "admin.locked")
                }
                Ok(()) => {
                    tracing::warn!("Bot unlocked by {}", actor.id);
                    t(language, "admin.unlocked")
                }
                Err(e) => {
                    tracing::error!("Failed to change admin lock: {}", e);
                    t_with_args(language, "admin.lock_failed", &[&e.to_string()])
                }
            };
            render::send_text(bot, chat_id, &reply).await?;
        }
        Command::Lockstatus => {
            let reply = match app.lock.is_locked().await {
                Ok(true) => t(language, "admin.status_locked"),
                Ok(false) => t(language, "admin.status_unlocked"),
                Err(e) => t_with_args(language, "admin.lock_failed", &[&e.to_string()]),
            };
            render::send_text(bot, chat_id, &reply).await?;
        }
        Command::Grant(args) => change_role(bot, chat_id, app, actor, language, &args, true).await?,
        Command::Revoke(args) => {
            change_role(bot, chat_id, app, actor, language, &args, false).await?
        }
        Command::Stats => {
            let reply = format_stats(language, &METRICS.snapshot());
            render::send_text(bot, chat_id, &reply).await?;
        }
        Command::Start | Command::Help | Command::Menu | Command::Cancel => {}
    }

    Ok(())
}

async fn change_role(
    bot: &Bot,
    chat_id: ChatId,
    app: &App,
    actor: &Actor,
    language: &str,
    args: &str,
    grant: bool,
) -> HandlerResult {
    let Some((user_id, role)) = parse_role_args(args) else {
        let usage = t_with_args(language, "admin.usage", &[&roles::ASSIGNABLE.join(", ")]);
        render::send_text(bot, chat_id, &usage).await?;
        return Ok(());
    };

    run_in_session(app.sessions.as_ref(), Some(actor), |session| async move {
        let repo = session.repository().ok_or(FlowError::Unavailable)?;
        let changed = if grant {
            grant_role(repo, user_id, &role)
        } else {
            revoke_role(repo, user_id, &role)
        }
        .map_err(FlowError::from)?;

        let id = user_id.to_string();
        let reply = match changed {
            None => t_with_args(language, "admin.user_not_found", &[&id]),
            Some(_) if grant => {
                tracing::info!("Role {} granted to {} by {}", role, user_id, actor.id);
                t_with_args(language, "admin.granted", &[&role, &id])
            }
            Some(_) => {
                tracing::info!("Role {} revoked from {} by {}", role, user_id, actor.id);
                t_with_args(language, "admin.revoked", &[&role, &id])
            }
        };
        render::send_text(bot, chat_id, &reply).await?;
        Ok::<(), HandlerError>(())
    })
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_args() {
        assert_eq!(
            parse_role_args("42 staff"),
            Some((42, roles::STAFF.to_string()))
        );
        assert_eq!(
            parse_role_args("  7   Volunteer "),
            Some((7, roles::VOLUNTEER.to_string()))
        );
    }

    #[test]
    fn test_parse_role_args_rejects_bad_input() {
        assert_eq!(parse_role_args(""), None);
        assert_eq!(parse_role_args("abc staff"), None);
        assert_eq!(parse_role_args("42"), None);
        assert_eq!(parse_role_args("42 admin"), None);
        assert_eq!(parse_role_args("42 staff extra"), None);
    }

    #[test]
    fn test_stats_report_every_counter() {
        let stats = MetricsSnapshot {
            updates_received: 11,
            messages_sent: 12,
            callbacks_answered: 13,
            gate_rejections: 14,
            churned_users: 15,
            returned_users: 16,
            errors: 17,
            uptime_secs: 18,
        };
        let text = format_stats("en", &stats);
        for value in 11..=18 {
            assert!(text.contains(&value.to_string()), "missing {} in {}", value, text);
        }
        assert!(!text.contains("{}"));
        assert!(format_stats("ru", &stats).contains("Вернулись: 16"));
    }
}
