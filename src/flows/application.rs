//! Application intake: contacts, up to three position priorities,
//! motivation and an optional resume, then confirmation.

use crate::dialog::{
    escape, ApplicationDraft, ApplicationStep, Button, DialogState, FlowContext, FlowError, Input,
    Screen, Transition,
};
use crate::models::{Application, ApplicationForm, PositionChoice, UserInfoPatch};
use crate::repository::reset_changed_tasks;
use crate::validation::{
    validate_education, validate_email, validate_free_text, validate_motivation, validate_name,
    validate_phone, Rejection,
};

use super::{input_text, menu};

pub const MAX_PRIORITIES: u8 = 3;
const DOCUMENT_PREFIX: &str = "document:";

pub fn start(ctx: &FlowContext) -> Transition {
    let Some(repo) = ctx.repo else {
        return Transition::idle(unavailable_screen(ctx));
    };

    match repo.find_application(ctx.user_id) {
        Ok(Some(application)) if application.is_submitted() => {
            return Transition::idle(status_screen(ctx));
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to load application for {}: {}", ctx.user_id, e),
    }

    let mut draft = ApplicationDraft::default();
    match repo.find_user_info(ctx.user_id) {
        Ok(Some(info)) => {
            draft.full_name = info.full_name;
            draft.education = info.education;
            draft.phone = info.phone;
            draft.email = info.email;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to load user info for {}: {}", ctx.user_id, e),
    }

    enter(ctx, ApplicationStep::Name, draft)
}

/// Starts editing a submitted application with its answers pre-filled.
fn start_edit(ctx: &FlowContext) -> Transition {
    let application = match ctx.repo.map(|repo| repo.find_application(ctx.user_id)) {
        Some(Ok(Some(application))) => application,
        Some(Err(e)) => {
            tracing::warn!("Failed to load application for {}: {}", ctx.user_id, e);
            return start(ctx);
        }
        _ => return start(ctx),
    };

    let mut draft = draft_from_application(&application);
    draft.choices.clear();
    enter(ctx, ApplicationStep::Name, draft)
}

fn enter(ctx: &FlowContext, step: ApplicationStep, draft: ApplicationDraft) -> Transition {
    let screen = step_screen(ctx, step, &draft);
    Transition::to(DialogState::Application { step, draft }, screen)
}

fn stay(ctx: &FlowContext, step: ApplicationStep, draft: &ApplicationDraft, notice: &str) -> Transition {
    let screen = step_screen(ctx, step, draft).prepend(notice);
    Transition::to(
        DialogState::Application {
            step,
            draft: draft.clone(),
        },
        screen,
    )
}

fn unavailable_screen(ctx: &FlowContext) -> Screen {
    Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button())
}

pub fn draft_from_application(application: &Application) -> ApplicationDraft {
    ApplicationDraft {
        full_name: Some(application.full_name.clone()),
        education: Some(application.education.clone()),
        phone: Some(application.phone.clone()),
        email: Some(application.email.clone()),
        choices: application.choices(),
        department: None,
        motivation: Some(application.motivation.clone()),
        resume: application.resume.clone(),
    }
}

fn current_text_value(step: ApplicationStep, draft: &ApplicationDraft) -> Option<&str> {
    match step {
        ApplicationStep::Name => draft.full_name.as_deref(),
        ApplicationStep::Education => draft.education.as_deref(),
        ApplicationStep::Phone => draft.phone.as_deref(),
        ApplicationStep::Email => draft.email.as_deref(),
        ApplicationStep::Motivation => draft.motivation.as_deref(),
        ApplicationStep::Resume => draft.resume.as_deref(),
        _ => None,
    }
}

fn resume_label(ctx: &FlowContext, resume: &str) -> String {
    if resume.starts_with(DOCUMENT_PREFIX) {
        ctx.t("application.resume_document")
    } else {
        escape(resume)
    }
}

/// Positions not yet picked in earlier priorities.
fn available_positions<'c>(
    ctx: &FlowContext<'c>,
    department: &str,
    draft: &ApplicationDraft,
) -> Vec<&'c crate::catalog::Position> {
    let catalog = ctx.catalog;
    catalog
        .department(department)
        .map(|d| {
            d.positions
                .iter()
                .filter(|p| {
                    !draft
                        .choices
                        .iter()
                        .any(|c| c.department == department && c.position == p.key)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn has_free_positions(ctx: &FlowContext, draft: &ApplicationDraft) -> bool {
    ctx.catalog
        .departments
        .iter()
        .any(|d| !available_positions(ctx, &d.key, draft).is_empty())
}

pub fn step_screen(ctx: &FlowContext, step: ApplicationStep, draft: &ApplicationDraft) -> Screen {
    let prompt = |key: &str| {
        let mut text = ctx.t(key);
        if let Some(current) = current_text_value(step, draft) {
            let shown = if step == ApplicationStep::Resume {
                resume_label(ctx, current)
            } else {
                escape(current)
            };
            text = format!("{}\n\n{}", text, ctx.t_args("application.current_value", &[&shown]));
        }
        text
    };
    let keep = || {
        current_text_value(step, draft)
            .map(|_| vec![Button::callback(ctx.t("application.keep_button"), "app:keep")])
            .unwrap_or_default()
    };

    match step {
        ApplicationStep::Name => Screen::new(prompt("application.name_prompt"))
            .row(keep())
            .button(ctx.cancel_button()),
        ApplicationStep::Education => Screen::new(prompt("application.education_prompt"))
            .row(keep())
            .button(ctx.cancel_button()),
        ApplicationStep::Phone => Screen::new(prompt("application.phone_prompt"))
            .row(keep())
            .button(ctx.cancel_button()),
        ApplicationStep::Email => Screen::new(prompt("application.email_prompt"))
            .row(keep())
            .button(ctx.cancel_button()),
        ApplicationStep::Department { priority } => {
            let text = ctx.t_args("application.department_prompt", &[&priority.to_string()]);
            let mut screen = ctx
                .catalog
                .departments
                .iter()
                .filter(|d| !available_positions(ctx, &d.key, draft).is_empty())
                .fold(Screen::new(text), |screen, d| {
                    screen.button(Button::callback(d.title.clone(), format!("app:dep:{}", d.key)))
                });
            if priority > 1 {
                screen = screen.button(Button::callback(
                    ctx.t("application.no_more_button"),
                    "app:skip",
                ));
            }
            screen.button(ctx.cancel_button())
        }
        ApplicationStep::Position { priority } => {
            let Some(department) = draft.department.as_deref() else {
                return step_screen(ctx, ApplicationStep::Department { priority }, draft);
            };
            let title = ctx
                .catalog
                .department(department)
                .map(|d| escape(&d.title))
                .unwrap_or_default();
            let text = ctx.t_args(
                "application.position_prompt",
                &[&priority.to_string(), &title],
            );
            available_positions(ctx, department, draft)
                .into_iter()
                .fold(Screen::new(text), |screen, p| {
                    screen.button(Button::callback(p.title.clone(), format!("app:pos:{}", p.key)))
                })
                .button(Button::callback(ctx.t("common.back_button"), "app:back"))
                .button(ctx.cancel_button())
        }
        ApplicationStep::Motivation => Screen::new(prompt("application.motivation_prompt"))
            .row(keep())
            .button(ctx.cancel_button()),
        ApplicationStep::Resume => Screen::new(prompt("application.resume_prompt"))
            .row(keep())
            .button(Button::callback(ctx.t("application.skip_resume_button"), "app:skip"))
            .button(ctx.cancel_button()),
        ApplicationStep::Confirm => Screen::new(format!(
            "{}\n\n{}",
            ctx.t("application.confirm_title"),
            summary(ctx, draft)
        ))
        .button(Button::callback(ctx.t("application.submit_button"), "app:submit"))
        .button(Button::callback(ctx.t("application.restart_button"), "app:restart"))
        .button(ctx.cancel_button()),
    }
}

fn summary(ctx: &FlowContext, draft: &ApplicationDraft) -> String {
    let dash = "—".to_string();
    let value = |v: &Option<String>| v.as_deref().map(escape).unwrap_or_else(|| dash.clone());

    let positions = draft
        .choices
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            format!(
                "{}. {}",
                idx + 1,
                escape(&ctx.catalog.position_label(&c.department, &c.position))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let resume = draft
        .resume
        .as_deref()
        .map(|r| resume_label(ctx, r))
        .unwrap_or_else(|| ctx.t("application.no_resume"));

    ctx.t_args(
        "application.summary",
        &[
            &value(&draft.full_name),
            &value(&draft.education),
            &value(&draft.phone),
            &value(&draft.email),
            &positions,
            &value(&draft.motivation),
            &resume,
        ],
    )
}

/// The user's application as stored, or an invitation to apply.
pub fn status_screen(ctx: &FlowContext) -> Screen {
    let application = match ctx.repo.map(|repo| repo.find_application(ctx.user_id)) {
        Some(Ok(application)) => application,
        Some(Err(e)) => {
            tracing::warn!("Failed to load application for {}: {}", ctx.user_id, e);
            return unavailable_screen(ctx);
        }
        None => return unavailable_screen(ctx),
    };

    match application.filter(|a| a.is_submitted()) {
        Some(application) => {
            let submitted_at = application
                .submitted_at
                .map(|at| ctx.catalog.format_time(at))
                .unwrap_or_default();
            Screen::new(format!(
                "{}\n\n{}",
                ctx.t_args("application.status_submitted", &[&submitted_at]),
                summary(ctx, &draft_from_application(&application))
            ))
            .button(Button::callback(ctx.t("application.edit_button"), "app:edit"))
            .button(ctx.menu_button())
        }
        None => Screen::new(ctx.t("application.status_not_submitted"))
            .button(Button::callback(ctx.t("menu.apply_button"), "menu:apply"))
            .button(ctx.menu_button()),
    }
}

fn after_text_step(ctx: &FlowContext, step: ApplicationStep, draft: ApplicationDraft) -> Transition {
    let next = match step {
        ApplicationStep::Name => ApplicationStep::Education,
        ApplicationStep::Education => ApplicationStep::Phone,
        ApplicationStep::Phone => ApplicationStep::Email,
        ApplicationStep::Email => ApplicationStep::Department { priority: 1 },
        ApplicationStep::Motivation => ApplicationStep::Resume,
        ApplicationStep::Resume => ApplicationStep::Confirm,
        other => other,
    };
    enter(ctx, next, draft)
}

pub fn handle_input(
    ctx: &FlowContext,
    step: ApplicationStep,
    draft: &ApplicationDraft,
    input: &Input,
) -> Result<Transition, FlowError> {
    if step == ApplicationStep::Resume {
        let mut draft = draft.clone();
        match input {
            Input::Document { file_id, .. } => {
                draft.resume = Some(format!("{}{}", DOCUMENT_PREFIX, file_id));
            }
            Input::Text(text) => match validate_free_text(text) {
                Ok(link) => draft.resume = Some(link),
                Err(rejection) => return Ok(stay(ctx, step, &draft, &ctx.rejection(&rejection))),
            },
        }
        return Ok(after_text_step(ctx, step, draft));
    }

    let validator: fn(&str) -> Result<String, Rejection> = match step {
        ApplicationStep::Name => validate_name,
        ApplicationStep::Education => validate_education,
        ApplicationStep::Phone => validate_phone,
        ApplicationStep::Email => validate_email,
        ApplicationStep::Motivation => validate_motivation,
        _ => return Ok(stay(ctx, step, draft, &ctx.t("common.use_buttons"))),
    };

    let Some(text) = input_text(input) else {
        return Ok(stay(ctx, step, draft, &ctx.t("common.text_expected")));
    };

    let value = match validator(text) {
        Ok(value) => value,
        Err(rejection) => return Ok(stay(ctx, step, draft, &ctx.rejection(&rejection))),
    };

    let mut draft = draft.clone();
    match step {
        ApplicationStep::Name => draft.full_name = Some(value),
        ApplicationStep::Education => draft.education = Some(value),
        ApplicationStep::Phone => draft.phone = Some(value),
        ApplicationStep::Email => draft.email = Some(value),
        ApplicationStep::Motivation => draft.motivation = Some(value),
        _ => {}
    }
    Ok(after_text_step(ctx, step, draft))
}

pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if data == "edit" {
        return Ok(start_edit(ctx));
    }

    let DialogState::Application { step, draft } = state else {
        return Ok(Transition::idle(
            menu::main_menu_screen(ctx).prepend(&ctx.t("common.expired")),
        ));
    };
    let step = *step;

    match (step, data) {
        (_, "keep") if current_text_value(step, draft).is_some() => {
            Ok(after_text_step(ctx, step, draft.clone()))
        }
        (ApplicationStep::Department { priority }, "skip") if priority > 1 => {
            Ok(enter(ctx, ApplicationStep::Motivation, draft.clone()))
        }
        (ApplicationStep::Department { priority }, data) if data.starts_with("dep:") => {
            let key = &data["dep:".len()..];
            if ctx.catalog.department(key).is_none() {
                return Ok(stay(ctx, step, draft, &ctx.t("common.expired")));
            }
            let mut draft = draft.clone();
            draft.department = Some(key.to_string());
            Ok(enter(ctx, ApplicationStep::Position { priority }, draft))
        }
        (ApplicationStep::Position { priority }, "back") => {
            Ok(enter(ctx, ApplicationStep::Department { priority }, draft.clone()))
        }
        (ApplicationStep::Position { priority }, data) if data.starts_with("pos:") => {
            select_position(ctx, priority, draft, &data["pos:".len()..])
        }
        (ApplicationStep::Resume, "skip") => {
            let mut draft = draft.clone();
            draft.resume = None;
            Ok(enter(ctx, ApplicationStep::Confirm, draft))
        }
        (ApplicationStep::Confirm, "submit") => submit(ctx, draft),
        (ApplicationStep::Confirm, "restart") => Ok(enter(ctx, ApplicationStep::Name, {
            let mut draft = draft.clone();
            draft.choices.clear();
            draft.department = None;
            draft
        })),
        _ => Ok(stay(ctx, step, draft, &ctx.t("common.expired"))),
    }
}

fn select_position(
    ctx: &FlowContext,
    priority: u8,
    draft: &ApplicationDraft,
    key: &str,
) -> Result<Transition, FlowError> {
    let step = ApplicationStep::Position { priority };
    let Some(department) = draft.department.clone() else {
        return Ok(enter(ctx, ApplicationStep::Department { priority }, draft.clone()));
    };
    if !available_positions(ctx, &department, draft)
        .iter()
        .any(|p| p.key == key)
    {
        return Ok(stay(ctx, step, draft, &ctx.t("application.position_taken")));
    }

    let mut draft = draft.clone();
    draft.choices.truncate(priority.saturating_sub(1) as usize);
    draft.choices.push(PositionChoice {
        department,
        position: key.to_string(),
    });
    draft.department = None;

    if priority < MAX_PRIORITIES && has_free_positions(ctx, &draft) {
        Ok(enter(
            ctx,
            ApplicationStep::Department {
                priority: priority + 1,
            },
            draft,
        ))
    } else {
        Ok(enter(ctx, ApplicationStep::Motivation, draft))
    }
}

/// The first step whose answer is still missing.
fn first_missing(draft: &ApplicationDraft) -> Option<ApplicationStep> {
    if draft.full_name.is_none() {
        Some(ApplicationStep::Name)
    } else if draft.education.is_none() {
        Some(ApplicationStep::Education)
    } else if draft.phone.is_none() {
        Some(ApplicationStep::Phone)
    } else if draft.email.is_none() {
        Some(ApplicationStep::Email)
    } else if draft.choices.is_empty() {
        Some(ApplicationStep::Department { priority: 1 })
    } else if draft.motivation.is_none() {
        Some(ApplicationStep::Motivation)
    } else {
        None
    }
}

fn submit(ctx: &FlowContext, draft: &ApplicationDraft) -> Result<Transition, FlowError> {
    if let Some(step) = first_missing(draft) {
        return Ok(stay(ctx, step, draft, &ctx.t("application.incomplete")));
    }
    let repo = ctx.repo()?;

    let form = ApplicationForm {
        full_name: draft.full_name.clone().unwrap_or_default(),
        education: draft.education.clone().unwrap_or_default(),
        phone: draft.phone.clone().unwrap_or_default(),
        email: draft.email.clone().unwrap_or_default(),
        choices: draft.choices.clone(),
        motivation: draft.motivation.clone().unwrap_or_default(),
        resume: draft.resume.clone(),
    };

    let reset = reset_changed_tasks(repo, ctx.user_id, &form.choices)?;
    if !reset.is_empty() {
        tracing::info!("User {} changed positions, reset tasks {:?}", ctx.user_id, reset);
    }
    let application = repo.submit_application(ctx.user_id, &form)?;
    repo.update_user_info(
        ctx.user_id,
        &UserInfoPatch {
            full_name: Some(form.full_name.clone()),
            phone: Some(form.phone.clone()),
            email: Some(form.email.clone()),
            education: Some(form.education.clone()),
        },
    )?;
    tracing::info!(
        "Application {} submitted by {} ({} priorities)",
        application.id,
        ctx.user_id,
        form.choices.len()
    );

    Ok(Transition::idle(
        Screen::new(ctx.t("application.submitted"))
            .button(Button::callback(ctx.t("menu.tasks_button"), "menu:tasks"))
            .button(ctx.menu_button()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::flows::{handle_callback as route_callback, handle_input as route_input};
    use crate::models::EvaluationPatch;

    fn text(s: &str) -> Input {
        Input::Text(s.to_string())
    }

    fn run_text(fx: &Fixture, state: DialogState, s: &str) -> DialogState {
        route_input(&fx.ctx(), &state, &text(s)).unwrap().next
    }

    fn run_button(fx: &Fixture, state: DialogState, data: &str) -> DialogState {
        route_callback(&fx.ctx(), &state, data).unwrap().next
    }

    fn step_of(state: &DialogState) -> ApplicationStep {
        match state {
            DialogState::Application { step, .. } => *step,
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_full_application_is_persisted() {
        let fx = Fixture::new(100);
        let mut state = start(&fx.ctx()).next;
        assert_eq!(step_of(&state), ApplicationStep::Name);

        state = run_text(&fx, state, "Анна Петрова");
        state = run_text(&fx, state, "НИУ ВШЭ, 2 курс");
        state = run_text(&fx, state, "8 999 123-45-67");
        state = run_text(&fx, state, "Anna@Example.com");
        assert_eq!(step_of(&state), ApplicationStep::Department { priority: 1 });

        state = run_button(&fx, state, "app:dep:media");
        state = run_button(&fx, state, "app:pos:smm");
        assert_eq!(step_of(&state), ApplicationStep::Department { priority: 2 });
        state = run_button(&fx, state, "app:dep:events");
        state = run_button(&fx, state, "app:pos:host");
        state = run_button(&fx, state, "app:skip");
        assert_eq!(step_of(&state), ApplicationStep::Motivation);

        state = run_text(&fx, state, "Хочу делать мероприятия");
        state = run_button(&fx, state, "app:skip");
        assert_eq!(step_of(&state), ApplicationStep::Confirm);

        let done = route_callback(&fx.ctx(), &state, "app:submit").unwrap();
        assert_eq!(done.next, DialogState::Idle);

        let application = fx.repo().find_application(100).unwrap().unwrap();
        assert!(application.is_submitted());
        assert_eq!(application.phone, "+79991234567");
        assert_eq!(application.email, "anna@example.com");
        assert_eq!(application.position_2.as_deref(), Some("host"));
        assert!(application.department_3.is_none());

        let info = fx.repo().find_user_info(100).unwrap().unwrap();
        assert_eq!(info.full_name.as_deref(), Some("Анна Петрова"));
    }

    #[test]
    fn test_invalid_phone_reprompts_same_step() {
        let fx = Fixture::new(101);
        let state = DialogState::Application {
            step: ApplicationStep::Phone,
            draft: ApplicationDraft::default(),
        };
        let transition = route_input(&fx.ctx(), &state, &text("123")).unwrap();
        assert_eq!(transition.next, state);
        assert!(transition.screen.text.starts_with("⚠️"));
    }

    #[test]
    fn test_same_position_cannot_be_picked_twice() {
        let fx = Fixture::new(102);
        let draft = ApplicationDraft {
            choices: vec![PositionChoice {
                department: "media".into(),
                position: "smm".into(),
            }],
            department: Some("media".into()),
            ..Default::default()
        };
        let state = DialogState::Application {
            step: ApplicationStep::Position { priority: 2 },
            draft,
        };

        let transition = route_callback(&fx.ctx(), &state, "app:pos:smm").unwrap();
        assert_eq!(transition.next, state);
        assert!(!transition.screen.callback_data().contains(&"app:pos:smm"));
    }

    #[test]
    fn test_prefilled_values_can_be_kept() {
        let fx = Fixture::new(103);
        fx.repo()
            .update_user_info(
                103,
                &UserInfoPatch {
                    full_name: Some("Олег Иванов".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let transition = start(&fx.ctx());
        assert!(transition.screen.callback_data().contains(&"app:keep"));

        let state = run_button(&fx, transition.next, "app:keep");
        assert_eq!(step_of(&state), ApplicationStep::Education);
    }

    #[test]
    fn test_document_resume() {
        let fx = Fixture::new(104);
        let state = DialogState::Application {
            step: ApplicationStep::Resume,
            draft: ApplicationDraft::default(),
        };
        let input = Input::Document {
            file_id: "BQACAgIAAx".into(),
            file_name: Some("cv.pdf".into()),
        };
        let transition = route_input(&fx.ctx(), &state, &input).unwrap();
        match transition.next {
            DialogState::Application { step, draft } => {
                assert_eq!(step, ApplicationStep::Confirm);
                assert_eq!(draft.resume.as_deref(), Some("document:BQACAgIAAx"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_submit_storage_error_keeps_state() {
        let fx = Fixture::new(105);
        let state = DialogState::Application {
            step: ApplicationStep::Confirm,
            draft: ApplicationDraft {
                full_name: Some("Анна".into()),
                education: Some("МГУ".into()),
                phone: Some("+79991234567".into()),
                email: Some("a@example.com".into()),
                choices: vec![PositionChoice {
                    department: "media".into(),
                    position: "smm".into(),
                }],
                department: None,
                motivation: Some("Хочу".into()),
                resume: None,
            },
        };

        fx.db.set_fail_writes(true);
        let result = route_callback(&fx.ctx(), &state, "app:submit");
        assert!(matches!(result, Err(FlowError::Storage(_))));

        let result = route_callback(&fx.detached_ctx(), &state, "app:submit");
        assert!(matches!(result, Err(FlowError::Unavailable)));
    }

    #[test]
    fn test_submitted_application_shows_status() {
        let fx = Fixture::new(106);
        let form = ApplicationForm {
            full_name: "Анна".into(),
            education: "МГУ".into(),
            phone: "+79991234567".into(),
            email: "a@example.com".into(),
            choices: vec![PositionChoice {
                department: "media".into(),
                position: "smm".into(),
            }],
            motivation: "Хочу".into(),
            resume: None,
        };
        fx.repo().submit_application(106, &form).unwrap();

        let transition = start(&fx.ctx());
        assert_eq!(transition.next, DialogState::Idle);
        assert!(transition.screen.callback_data().contains(&"app:edit"));

        let edit = route_callback(&fx.ctx(), &DialogState::Idle, "app:edit").unwrap();
        assert_eq!(step_of(&edit.next), ApplicationStep::Name);
    }

    #[test]
    fn test_resubmission_with_new_position_drops_old_task_results() {
        let fx = Fixture::new(105);
        let mut draft = ApplicationDraft {
            full_name: Some("Анна".into()),
            education: Some("МГУ".into()),
            phone: Some("+79991234567".into()),
            email: Some("a@example.com".into()),
            choices: vec![PositionChoice {
                department: "media".into(),
                position: "smm".into(),
            }],
            department: None,
            motivation: Some("Хочу".into()),
            resume: None,
        };
        let confirm = |draft: &ApplicationDraft| DialogState::Application {
            step: ApplicationStep::Confirm,
            draft: draft.clone(),
        };
        run_button(&fx, confirm(&draft), "app:submit");
        fx.repo().save_task_submission(105, 1, "smm plan").unwrap();
        fx.repo()
            .update_evaluation(105, &EvaluationPatch::task_feedback(1, "Слабо".into()))
            .unwrap();

        draft.choices[0].position = "design".into();
        run_button(&fx, confirm(&draft), "app:submit");

        assert!(fx.repo().find_task_submissions(105).unwrap().is_empty());
        let evaluation = fx.repo().find_evaluation(105).unwrap().unwrap();
        assert!(evaluation.task_1_feedback.is_none());
    }
}
