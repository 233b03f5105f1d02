use kbk_bot::dialog::Transition;
use kbk_bot::flows::menu;
use kbk_bot::i18n::{detect_language, t};
use kbk_bot::update::Actor;
use std::sync::Arc;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;

use super::super::render;
use super::super::types::{App, HandlerResult, KbkDialogue};
use super::{admin, run_flow, Target};

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Open the main menu")]
    Start,
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Open the main menu")]
    Menu,
    #[command(description = "Cancel current operation")]
    Cancel,
    #[command(description = "Close the bot to everyone but admins (admin only)")]
    Lock,
    #[command(description = "Open the bot again (admin only)")]
    Unlock,
    #[command(description = "Show whether the bot is closed (admin only)")]
    Lockstatus,
    #[command(description = "Grant a role (admin only). Usage: /grant <id> <role>")]
    Grant(String),
    #[command(description = "Revoke a role (admin only). Usage: /revoke <id> <role>")]
    Revoke(String),
    #[command(description = "Show bot statistics (admin only)")]
    Stats,
}

impl Command {
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::Lock
                | Command::Unlock
                | Command::Lockstatus
                | Command::Grant(_)
                | Command::Revoke(_)
                | Command::Stats
        )
    }
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    command: Command,
    dialogue: KbkDialogue,
    app: Arc<App>,
) -> HandlerResult {
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(actor) = msg.from().map(Actor::from) else {
        return Ok(());
    };
    let language = detect_language(actor.language_code.as_deref());

    if command.is_admin_only() {
        if app.is_admin(actor.id) {
            return admin::handle_admin_command(&bot, &msg, command, &app, &actor, language).await;
        }
        tracing::warn!("User {} tried an admin command", actor.id);
        render::send_text(&bot, msg.chat.id, &t(language, "bot.help")).await?;
        return Ok(());
    }

    match command {
        Command::Help => {
            render::send_text(&bot, msg.chat.id, &t(language, "bot.help")).await?;
        }
        Command::Start | Command::Menu => {
            run_flow(&bot, &app, &dialogue, &actor, Target::Chat(msg.chat.id), |ctx| {
                Ok(Transition::idle(menu::main_menu_screen(ctx)))
            })
            .await;
        }
        Command::Cancel => {
            run_flow(&bot, &app, &dialogue, &actor, Target::Chat(msg.chat.id), |ctx| {
                Ok(Transition::idle(
                    menu::main_menu_screen(ctx).prepend(&ctx.t("common.cancelled")),
                ))
            })
            .await;
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::utils::command::BotCommands;

    #[test]
    fn test_parse_commands() {
        let parsed = Command::parse("/grant 42 staff", "kbk_bot").ok();
        assert!(matches!(parsed, Some(Command::Grant(ref args)) if args == "42 staff"));

        let parsed = Command::parse("/lockstatus", "kbk_bot").ok();
        assert!(matches!(parsed, Some(Command::Lockstatus)));
    }

    #[test]
    fn test_admin_only_commands() {
        assert!(Command::Lock.is_admin_only());
        assert!(Command::Grant(String::new()).is_admin_only());
        assert!(!Command::Start.is_admin_only());
        assert!(!Command::Cancel.is_admin_only());
    }
}
