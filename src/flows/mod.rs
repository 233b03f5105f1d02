//! Conversational flows.
//!
//! Every flow is a set of getters (`*_screen`, never fail) and handlers that
//! validate input, persist and return the next [`Transition`]. Handlers do
//! not touch state on error: the caller keeps the current state.

pub mod application;
pub mod feedback;
pub mod lectures;
pub mod menu;
pub mod quiz;
pub mod settings;
pub mod staff;
pub mod subscriptions;
pub mod tasks;

use crate::dialog::{
    DialogState, FlowContext, FlowError, Input, Transition, CANCEL_CALLBACK, MAIN_MENU_CALLBACK,
};

/// Routes a button press by its callback prefix.
pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if data == CANCEL_CALLBACK {
        return Ok(Transition::idle(
            menu::main_menu_screen(ctx).prepend(&ctx.t("common.cancelled")),
        ));
    }
    if data == MAIN_MENU_CALLBACK {
        return Ok(Transition::idle(menu::main_menu_screen(ctx)));
    }

    if let Some(item) = data.strip_prefix("menu:") {
        menu::handle_menu(ctx, item)
    } else if let Some(rest) = data.strip_prefix("app:") {
        application::handle_callback(ctx, state, rest)
    } else if let Some(rest) = data.strip_prefix("quiz:") {
        quiz::handle_callback(ctx, state, rest)
    } else if let Some(rest) = data.strip_prefix("set:") {
        settings::handle_callback(ctx, state, rest)
    } else if let Some(rest) = data.strip_prefix("sub:") {
        subscriptions::handle_callback(ctx, rest)
    } else if let Some(rest) = data.strip_prefix("lec:") {
        lectures::handle_callback(ctx, state, rest)
    } else if let Some(rest) = data.strip_prefix("task:") {
        tasks::handle_callback(ctx, state, rest)
    } else if let Some(rest) = data.strip_prefix("staff:") {
        staff::handle_callback(ctx, state, rest)
    } else {
        tracing::debug!("Unknown callback data {:?} from {}", data, ctx.user_id);
        Ok(Transition::idle(menu::main_menu_screen(ctx)))
    }
}

/// Feeds free input to the flow that is waiting for it.
pub fn handle_input(
    ctx: &FlowContext,
    state: &DialogState,
    input: &Input,
) -> Result<Transition, FlowError> {
    match state {
        DialogState::Idle => Ok(Transition::idle(menu::main_menu_screen(ctx))),
        DialogState::Application { step, draft } => {
            application::handle_input(ctx, *step, draft, input)
        }
        DialogState::Quiz { step, data } => quiz::handle_input(ctx, *step, data, input),
        DialogState::Settings { editing } => settings::handle_input(ctx, *editing, input),
        DialogState::Tasks { answering } => tasks::handle_input(ctx, *answering, input),
        DialogState::Lectures { .. } => Ok(Transition::to(
            state.clone(),
            lectures::current_screen(ctx, state).prepend(&ctx.t("common.use_buttons")),
        )),
        DialogState::Staff { step, data } => staff::handle_input(ctx, *step, data, input),
    }
}

/// Text of a text input, or `None` for documents.
pub(crate) fn input_text(input: &Input) -> Option<&str> {
    match input {
        Input::Text(text) => Some(text.as_str()),
        Input::Document { .. } => None,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;

    #[test]
    fn test_cancel_returns_to_idle() {
        let fx = Fixture::new(1);
        let state = DialogState::Settings { editing: None };
        let transition = handle_callback(&fx.ctx(), &state, CANCEL_CALLBACK).unwrap();
        assert_eq!(transition.next, DialogState::Idle);
    }

    #[test]
    fn test_text_in_idle_shows_menu() {
        let fx = Fixture::new(1);
        let transition =
            handle_input(&fx.ctx(), &DialogState::Idle, &Input::Text("привет".into())).unwrap();
        assert_eq!(transition.next, DialogState::Idle);
        assert!(transition.screen.callback_data().contains(&"menu:apply"));
    }

    #[test]
    fn test_unknown_callback_is_absorbed() {
        let fx = Fixture::new(1);
        let transition = handle_callback(&fx.ctx(), &DialogState::Idle, "bogus:1").unwrap();
        assert_eq!(transition.next, DialogState::Idle);
    }
}
