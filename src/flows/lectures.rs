use crate::dialog::{escape, Button, DialogState, FlowContext, FlowError, Screen, Transition};
use crate::models::OnlineEvent;

fn unavailable(ctx: &FlowContext) -> Screen {
    Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button())
}

pub fn list_screen(ctx: &FlowContext) -> Screen {
    let Some(repo) = ctx.repo else {
        return unavailable(ctx);
    };
    let events = match repo.list_active_events() {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Failed to load lectures: {}", e);
            return unavailable(ctx);
        }
    };
    if events.is_empty() {
        return Screen::new(ctx.t("lectures.empty")).button(ctx.menu_button());
    }

    events
        .iter()
        .fold(Screen::new(ctx.t("lectures.title")), |screen, event| {
            screen.button(Button::callback(
                format!("{} · {}", ctx.catalog.format_time(event.starts_at), event.title),
                format!("lec:open:{}", event.id),
            ))
        })
        .button(ctx.menu_button())
}

fn detail_text(ctx: &FlowContext, event: &OnlineEvent, registered: bool) -> String {
    let mut text = format!(
        "<b>{}</b>\n{} – {}",
        escape(&event.title),
        ctx.catalog.format_time(event.starts_at),
        ctx.catalog.format_time(event.ends_at)
    );
    if !event.description.is_empty() {
        text = format!("{}\n\n{}", text, escape(&event.description));
    }
    if registered {
        text = format!("{}\n\n{}", text, ctx.t("lectures.registered"));
    }
    text
}

pub fn detail_screen(ctx: &FlowContext, event_id: i32) -> Screen {
    let Some(repo) = ctx.repo else {
        return unavailable(ctx);
    };
    let loaded = repo.find_event(event_id).and_then(|event| {
        let registration = repo.find_registration(ctx.user_id, event_id)?;
        Ok((event, registration))
    });
    let (event, registration) = match loaded {
        Ok((Some(event), registration)) if event.is_active => (event, registration),
        Ok(_) => return list_screen(ctx).prepend(&ctx.t("lectures.not_found")),
        Err(e) => {
            tracing::warn!("Failed to load lecture {}: {}", event_id, e);
            return unavailable(ctx);
        }
    };

    let registered = registration.map(|r| r.is_registered()).unwrap_or(false);
    let mut screen = Screen::new(detail_text(ctx, &event, registered));
    if registered {
        if let Some(link) = &event.link {
            screen = screen.button(Button::url(ctx.t("lectures.join_button"), link.clone()));
        }
        screen = screen.button(Button::callback(ctx.t("lectures.cancel_button"), "lec:cancel"));
    } else {
        screen = screen.button(Button::callback(
            ctx.t("lectures.register_button"),
            "lec:register",
        ));
    }
    screen
        .button(Button::callback(ctx.t("common.back_button"), "lec:list"))
        .button(ctx.menu_button())
}

pub fn current_screen(ctx: &FlowContext, state: &DialogState) -> Screen {
    match state {
        DialogState::Lectures {
            selected: Some(event_id),
        } => detail_screen(ctx, *event_id),
        _ => list_screen(ctx),
    }
}

pub fn start(ctx: &FlowContext) -> Transition {
    Transition::to(DialogState::Lectures { selected: None }, list_screen(ctx))
}

fn open(ctx: &FlowContext, event_id: i32) -> Transition {
    Transition::to(
        DialogState::Lectures {
            selected: Some(event_id),
        },
        detail_screen(ctx, event_id),
    )
}

pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if let Some(id) = data.strip_prefix("open:") {
        return Ok(match id.parse() {
            Ok(event_id) => open(ctx, event_id),
            Err(_) => start(ctx),
        });
    }

    let selected = match state {
        DialogState::Lectures { selected } => *selected,
        _ => None,
    };
    let Some(event_id) = selected else {
        return Ok(start(ctx));
    };

    match data {
        "register" => {
            let repo = ctx.repo()?;
            match repo.find_event(event_id)? {
                Some(event) if event.is_active => {
                    repo.register_for_event(ctx.user_id, event_id)?;
                    tracing::info!("User {} registered for {}", ctx.user_id, event.slug);
                    Ok(open(ctx, event_id))
                }
                _ => Ok(Transition::to(
                    DialogState::Lectures { selected: None },
                    list_screen(ctx).prepend(&ctx.t("lectures.not_found")),
                )),
            }
        }
        "cancel" => {
            let repo = ctx.repo()?;
            if repo.cancel_registration(ctx.user_id, event_id)?.is_some() {
                tracing::info!("User {} cancelled registration for {}", ctx.user_id, event_id);
            }
            Ok(open(ctx, event_id))
        }
        _ => Ok(start(ctx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ButtonAction;
    use crate::flows::handle_callback as route_callback;
    use crate::flows::testing::Fixture;

    fn first_event_id(fx: &Fixture) -> i32 {
        fx.repo().list_active_events().unwrap()[0].id
    }

    fn has_link(screen: &Screen) -> bool {
        screen
            .keyboard
            .iter()
            .flatten()
            .any(|b| matches!(b.action, ButtonAction::Url(_)))
    }

    #[test]
    fn test_register_shows_link_and_is_unique() {
        let fx = Fixture::new(600);
        let event_id = first_event_id(&fx);

        let opened = route_callback(&fx.ctx(), &DialogState::Idle, &format!("lec:open:{}", event_id))
            .unwrap();
        assert!(!has_link(&opened.screen));

        let registered = route_callback(&fx.ctx(), &opened.next, "lec:register").unwrap();
        assert!(has_link(&registered.screen));
        route_callback(&fx.ctx(), &registered.next, "lec:register").unwrap();

        assert_eq!(fx.repo().count_active_registrations(event_id).unwrap(), 1);
    }

    #[test]
    fn test_cancel_hides_link() {
        let fx = Fixture::new(601);
        let event_id = first_event_id(&fx);
        let state = DialogState::Lectures {
            selected: Some(event_id),
        };

        route_callback(&fx.ctx(), &state, "lec:register").unwrap();
        let cancelled = route_callback(&fx.ctx(), &state, "lec:cancel").unwrap();
        assert!(!has_link(&cancelled.screen));
        assert!(!fx
            .repo()
            .find_registration(601, event_id)
            .unwrap()
            .unwrap()
            .is_registered());
    }

    #[test]
    fn test_register_without_selection_lists_events() {
        let fx = Fixture::new(602);
        let transition = route_callback(&fx.ctx(), &DialogState::Idle, "lec:register").unwrap();
        assert_eq!(transition.next, DialogState::Lectures { selected: None });
    }
}
