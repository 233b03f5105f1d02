use crate::dialog::{
    escape, Button, DialogState, FlowContext, FlowError, InfoField, Input, Screen, Transition,
};
use crate::models::{UserInfo, UserInfoPatch};

use super::input_text;

fn label_key(field: InfoField) -> String {
    format!("settings.fields.{}", field.key())
}

fn field_value(info: Option<&UserInfo>, field: InfoField) -> Option<&str> {
    let info = info?;
    match field {
        InfoField::FullName => info.full_name.as_deref(),
        InfoField::Phone => info.phone.as_deref(),
        InfoField::Email => info.email.as_deref(),
        InfoField::Education => info.education.as_deref(),
    }
}

pub fn info_screen(ctx: &FlowContext) -> Screen {
    let info = match ctx.repo.map(|repo| repo.find_user_info(ctx.user_id)) {
        Some(Ok(info)) => info,
        Some(Err(e)) => {
            tracing::warn!("Failed to load user info for {}: {}", ctx.user_id, e);
            return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
        }
        None => return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button()),
    };

    let not_set = ctx.t("settings.not_set");
    let lines = InfoField::ALL
        .iter()
        .map(|field| {
            let value = field_value(info.as_ref(), *field)
                .map(escape)
                .unwrap_or_else(|| not_set.clone());
            format!("<b>{}:</b> {}", ctx.t(&label_key(*field)), value)
        })
        .collect::<Vec<_>>()
        .join("\n");

    InfoField::ALL
        .iter()
        .fold(
            Screen::new(format!("{}\n\n{}", ctx.t("settings.title"), lines)),
            |screen, field| {
                screen.button(Button::callback(
                    ctx.t_args("settings.edit_button", &[&ctx.t(&label_key(*field))]),
                    format!("set:edit:{}", field.key()),
                ))
            },
        )
        .button(ctx.menu_button())
}

fn prompt_screen(ctx: &FlowContext, field: InfoField) -> Screen {
    Screen::new(ctx.t_args(
        "settings.enter_value",
        &[&ctx.t(&label_key(field))],
    ))
    .button(Button::callback(ctx.t("common.back_button"), "set:back"))
}

pub fn start(ctx: &FlowContext) -> Transition {
    Transition::to(DialogState::Settings { editing: None }, info_screen(ctx))
}

pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if let Some(field) = data.strip_prefix("edit:").and_then(InfoField::parse) {
        return Ok(Transition::to(
            DialogState::Settings {
                editing: Some(field),
            },
            prompt_screen(ctx, field),
        ));
    }
    if data != "back" {
        tracing::debug!("Unknown settings action {:?} in {}", data, state.flow_name());
    }
    Ok(start(ctx))
}

pub fn handle_input(
    ctx: &FlowContext,
    editing: Option<InfoField>,
    input: &Input,
) -> Result<Transition, FlowError> {
    let state = DialogState::Settings { editing };
    let Some(field) = editing else {
        return Ok(Transition::to(
            state,
            info_screen(ctx).prepend(&ctx.t("common.use_buttons")),
        ));
    };
    let Some(text) = input_text(input) else {
        return Ok(Transition::to(
            state,
            prompt_screen(ctx, field).prepend(&ctx.t("common.text_expected")),
        ));
    };

    let value = match field.validator()(text) {
        Ok(value) => value,
        Err(rejection) => {
            return Ok(Transition::to(
                state,
                prompt_screen(ctx, field).prepend(&ctx.rejection(&rejection)),
            ));
        }
    };

    let mut patch = UserInfoPatch::default();
    match field {
        InfoField::FullName => patch.full_name = Some(value),
        InfoField::Phone => patch.phone = Some(value),
        InfoField::Email => patch.email = Some(value),
        InfoField::Education => patch.education = Some(value),
    }
    ctx.repo()?.update_user_info(ctx.user_id, &patch)?;

    Ok(Transition::to(
        DialogState::Settings { editing: None },
        info_screen(ctx).prepend(&ctx.t("settings.saved")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::flows::{handle_callback as route_callback, handle_input as route_input};

    #[test]
    fn test_edit_email_updates_only_that_column() {
        let fx = Fixture::new(300);
        fx.repo()
            .update_user_info(
                300,
                &UserInfoPatch {
                    phone: Some("+79991234567".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let state = route_callback(&fx.ctx(), &DialogState::Idle, "set:edit:email")
            .unwrap()
            .next;
        assert_eq!(
            state,
            DialogState::Settings {
                editing: Some(InfoField::Email)
            }
        );

        let transition =
            route_input(&fx.ctx(), &state, &Input::Text(" New@Mail.RU ".into())).unwrap();
        assert_eq!(transition.next, DialogState::Settings { editing: None });

        let info = fx.repo().find_user_info(300).unwrap().unwrap();
        assert_eq!(info.email.as_deref(), Some("new@mail.ru"));
        assert_eq!(info.phone.as_deref(), Some("+79991234567"));
    }

    #[test]
    fn test_invalid_value_keeps_editing() {
        let fx = Fixture::new(301);
        let state = DialogState::Settings {
            editing: Some(InfoField::Phone),
        };
        let transition = route_input(&fx.ctx(), &state, &Input::Text("abc".into())).unwrap();
        assert_eq!(transition.next, state);
        assert!(fx.repo().find_user_info(301).unwrap().is_none());
    }

    #[test]
    fn test_info_screen_without_database() {
        let fx = Fixture::new(302);
        let screen = info_screen(&fx.detached_ctx());
        assert_eq!(screen.callback_data(), vec!["menu:main"]);
    }
}
