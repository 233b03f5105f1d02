use crate::dialog::{escape, Button, FlowContext, FlowError, Screen, Transition};

use super::{application, feedback, lectures, quiz, settings, staff, subscriptions, tasks};

pub fn main_menu_screen(ctx: &FlowContext) -> Screen {
    let submitted = match ctx.repo.map(|repo| repo.find_application(ctx.user_id)) {
        Some(Ok(application)) => application.map(|a| a.is_submitted()).unwrap_or(false),
        Some(Err(e)) => {
            tracing::warn!("Failed to load application for {}: {}", ctx.user_id, e);
            false
        }
        None => false,
    };

    let application_button = if submitted {
        Button::callback(ctx.t("menu.application_button"), "menu:application")
    } else {
        Button::callback(ctx.t("menu.apply_button"), "menu:apply")
    };

    let mut screen = Screen::new(ctx.t("menu.title"))
        .with_media(ctx.catalog.media("welcome").cloned())
        .row(vec![application_button])
        .row(vec![
            Button::callback(ctx.t("menu.tasks_button"), "menu:tasks"),
            Button::callback(ctx.t("menu.feedback_button"), "menu:feedback"),
        ])
        .row(vec![
            Button::callback(ctx.t("menu.lectures_button"), "menu:lectures"),
            Button::callback(ctx.t("menu.quiz_button"), "menu:quiz"),
        ])
        .row(vec![
            Button::callback(ctx.t("menu.subscriptions_button"), "menu:subs"),
            Button::callback(ctx.t("menu.settings_button"), "menu:settings"),
        ])
        .button(Button::callback(ctx.t("menu.support_button"), "menu:support"));

    if ctx.is_staff() || ctx.is_volunteer() {
        screen = screen.button(Button::callback(ctx.t("menu.staff_button"), "menu:staff"));
    }

    screen
}

pub fn support_screen(ctx: &FlowContext) -> Screen {
    let support = &ctx.catalog.support;
    let text = if support.text.is_empty() {
        ctx.t("support.title")
    } else {
        format!("{}\n\n{}", ctx.t("support.title"), escape(&support.text))
    };

    support
        .contacts
        .iter()
        .fold(Screen::new(text), |screen, contact| {
            screen.button(Button::url(contact.title.clone(), contact.link.clone()))
        })
        .button(ctx.menu_button())
}

pub fn handle_menu(ctx: &FlowContext, item: &str) -> Result<Transition, FlowError> {
    match item {
        "apply" => Ok(application::start(ctx)),
        "application" => Ok(Transition::idle(application::status_screen(ctx))),
        "tasks" => Ok(tasks::start(ctx)),
        "quiz" => Ok(quiz::start(ctx)),
        "lectures" => Ok(lectures::start(ctx)),
        "subs" => Ok(subscriptions::start(ctx)),
        "feedback" => Ok(feedback::start(ctx)),
        "settings" => Ok(settings::start(ctx)),
        "support" => Ok(Transition::idle(support_screen(ctx))),
        "staff" => Ok(staff::start(ctx)),
        _ => Ok(Transition::idle(main_menu_screen(ctx))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::models::roles;

    #[test]
    fn test_staff_button_only_for_team() {
        let fx = Fixture::new(1);
        assert!(!main_menu_screen(&fx.ctx()).callback_data().contains(&"menu:staff"));

        let fx = Fixture::new(2).with_roles(&[roles::GUEST, roles::VOLUNTEER]);
        assert!(main_menu_screen(&fx.ctx()).callback_data().contains(&"menu:staff"));
    }

    #[test]
    fn test_menu_without_database() {
        let fx = Fixture::new(1);
        let screen = main_menu_screen(&fx.detached_ctx());
        assert!(screen.callback_data().contains(&"menu:apply"));
    }

    #[test]
    fn test_support_lists_contacts() {
        let fx = Fixture::new(1);
        let screen = support_screen(&fx.ctx());
        assert_eq!(
            screen.keyboard.len(),
            fx.catalog.support.contacts.len() + 1
        );
    }
}
