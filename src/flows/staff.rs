//! Team tooling. Staff evaluate applications; staff and volunteers see
//! lecture registration counts.

use crate::dialog::{
    escape, Button, DialogState, FeedbackTarget, FlowContext, FlowError, Input, Screen, StaffData,
    StaffStep, Transition,
};
use crate::models::EvaluationPatch;
use crate::validation::validate_feedback;

use super::{input_text, menu};

fn denied(ctx: &FlowContext) -> Transition {
    Transition::idle(menu::main_menu_screen(ctx).prepend(&ctx.t("staff.denied")))
}

fn staff_state(step: StaffStep, candidate: Option<i64>) -> DialogState {
    DialogState::Staff {
        step,
        data: StaffData { candidate },
    }
}

pub fn menu_screen(ctx: &FlowContext) -> Screen {
    let mut screen = Screen::new(ctx.t("staff.title"));
    if ctx.is_staff() {
        screen = screen.button(Button::callback(ctx.t("staff.find_button"), "staff:find"));
    }
    screen
        .button(Button::callback(ctx.t("staff.registrations_button"), "staff:regs"))
        .button(ctx.menu_button())
}

pub fn start(ctx: &FlowContext) -> Transition {
    if !ctx.is_staff() && !ctx.is_volunteer() {
        return denied(ctx);
    }
    Transition::to(staff_state(StaffStep::Menu, None), menu_screen(ctx))
}

pub fn registrations_screen(ctx: &FlowContext) -> Screen {
    let back = Button::callback(ctx.t("common.back_button"), "staff:menu");
    let Some(repo) = ctx.repo else {
        return Screen::new(ctx.t("common.unavailable")).button(back);
    };

    let counts = repo.list_active_events().and_then(|events| {
        events
            .into_iter()
            .map(|event| {
                let count = repo.count_active_registrations(event.id)?;
                Ok((event, count))
            })
            .collect::<Result<Vec<_>, _>>()
    });

    match counts {
        Ok(counts) if counts.is_empty() => Screen::new(ctx.t("lectures.empty")).button(back),
        Ok(counts) => {
            let lines = counts
                .iter()
                .map(|(event, count)| {
                    format!(
                        "• {} ({}): <b>{}</b>",
                        escape(&event.title),
                        ctx.catalog.format_time(event.starts_at),
                        count
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Screen::new(format!("{}\n\n{}", ctx.t("staff.registrations_title"), lines))
                .button(back)
        }
        Err(e) => {
            tracing::warn!("Failed to count registrations: {}", e);
            Screen::new(ctx.t("common.unavailable")).button(back)
        }
    }
}

fn yes_no(ctx: &FlowContext, value: bool) -> String {
    if value {
        ctx.t("common.yes")
    } else {
        ctx.t("common.no")
    }
}

pub fn candidate_screen(ctx: &FlowContext, candidate: i64) -> Screen {
    let back = Button::callback(ctx.t("common.back_button"), "staff:menu");
    let Some(repo) = ctx.repo else {
        return Screen::new(ctx.t("common.unavailable")).button(back);
    };

    let loaded = repo.find_application(candidate).and_then(|application| {
        Ok((
            application,
            repo.find_evaluation(candidate)?,
            repo.find_task_submissions(candidate)?,
        ))
    });
    let (application, evaluation, submissions) = match loaded {
        Ok((Some(application), evaluation, submissions)) => (application, evaluation, submissions),
        Ok((None, ..)) => return Screen::new(ctx.t("staff.not_found")).button(back),
        Err(e) => {
            tracing::warn!("Failed to load candidate {}: {}", candidate, e);
            return Screen::new(ctx.t("common.unavailable")).button(back);
        }
    };

    let mut lines = vec![ctx.t_args(
        "staff.candidate_header",
        &[
            &escape(&application.full_name),
            &candidate.to_string(),
            &escape(&application.phone),
            &escape(&application.email),
        ],
    )];

    let mut screen = Screen::default();
    for (idx, choice) in application.choices().iter().enumerate() {
        let task = (idx + 1) as u8;
        let accepted = evaluation.as_ref().map(|e| e.accepted(task)).unwrap_or(false);
        let answered = submissions
            .iter()
            .any(|s| s.task_number == i16::from(task));
        let feedback = evaluation
            .as_ref()
            .and_then(|e| e.task_feedback(task))
            .map(escape)
            .unwrap_or_else(|| "—".to_string());
        lines.push(ctx.t_args(
            "staff.task_line",
            &[
                &task.to_string(),
                &escape(&ctx.catalog.position_label(&choice.department, &choice.position)),
                &yes_no(ctx, answered),
                &yes_no(ctx, accepted),
                &feedback,
            ],
        ));

        let toggle_label = if accepted {
            ctx.t_args("staff.unaccept_button", &[&task.to_string()])
        } else {
            ctx.t_args("staff.accept_button", &[&task.to_string()])
        };
        screen = screen.row(vec![
            Button::callback(toggle_label, format!("staff:acc:{}", task)),
            Button::callback(
                ctx.t_args("staff.task_feedback_button", &[&task.to_string()]),
                format!("staff:fb:{}", task),
            ),
        ]);
    }

    let approved = evaluation
        .as_ref()
        .map(|e| e.interview_approved)
        .unwrap_or(false);
    let interview_feedback = evaluation
        .as_ref()
        .and_then(|e| e.interview_feedback.as_deref())
        .map(escape)
        .unwrap_or_else(|| "—".to_string());
    lines.push(ctx.t_args(
        "staff.interview_line",
        &[&yes_no(ctx, approved), &interview_feedback],
    ));

    Screen {
        text: lines.join("\n\n"),
        ..screen
    }
    .row(vec![
        Button::callback(ctx.t("staff.interview_toggle_button"), "staff:int"),
        Button::callback(ctx.t("staff.interview_feedback_button"), "staff:intfb"),
    ])
    .button(Button::callback(ctx.t("staff.find_button"), "staff:find"))
    .button(back)
}

fn feedback_prompt(ctx: &FlowContext, target: FeedbackTarget) -> Screen {
    let text = match target {
        FeedbackTarget::Task(task) => {
            ctx.t_args("staff.task_feedback_prompt", &[&task.to_string()])
        }
        FeedbackTarget::Interview => ctx.t("staff.interview_feedback_prompt"),
    };
    Screen::new(text).button(Button::callback(ctx.t("common.back_button"), "staff:cand"))
}

fn parse_task(raw: &str) -> Option<u8> {
    raw.parse().ok().filter(|n| (1..=3).contains(n))
}

pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if !ctx.is_staff() && !ctx.is_volunteer() {
        return Ok(denied(ctx));
    }
    match data {
        "menu" => return Ok(start(ctx)),
        "regs" => {
            return Ok(Transition::to(
                staff_state(StaffStep::Menu, None),
                registrations_screen(ctx),
            ))
        }
        _ => {}
    }

    if !ctx.is_staff() {
        return Ok(denied(ctx));
    }
    if data == "find" {
        return Ok(Transition::to(
            staff_state(StaffStep::EnterUserId, None),
            Screen::new(ctx.t("staff.enter_user_id"))
                .button(Button::callback(ctx.t("common.back_button"), "staff:menu")),
        ));
    }

    let candidate = match state {
        DialogState::Staff { data, .. } => data.candidate,
        _ => None,
    };
    let Some(candidate) = candidate else {
        return Ok(start(ctx));
    };

    let to_candidate = |notice: Option<String>| {
        let screen = candidate_screen(ctx, candidate);
        let screen = match notice {
            Some(notice) => screen.prepend(&notice),
            None => screen,
        };
        Transition::to(staff_state(StaffStep::Candidate, Some(candidate)), screen)
    };

    if data == "cand" {
        return Ok(to_candidate(None));
    }
    if data == "intfb" {
        let target = FeedbackTarget::Interview;
        return Ok(Transition::to(
            staff_state(StaffStep::WriteFeedback { target }, Some(candidate)),
            feedback_prompt(ctx, target),
        ));
    }
    if let Some(task) = data.strip_prefix("fb:").and_then(parse_task) {
        let target = FeedbackTarget::Task(task);
        return Ok(Transition::to(
            staff_state(StaffStep::WriteFeedback { target }, Some(candidate)),
            feedback_prompt(ctx, target),
        ));
    }

    let repo = ctx.repo()?;
    let evaluation = repo.find_evaluation(candidate)?;
    let patch = if data == "int" {
        let approved = evaluation.map(|e| e.interview_approved).unwrap_or(false);
        EvaluationPatch {
            interview_approved: Some(!approved),
            ..Default::default()
        }
    } else if let Some(task) = data.strip_prefix("acc:").and_then(parse_task) {
        let accepted = evaluation.map(|e| e.accepted(task)).unwrap_or(false);
        EvaluationPatch::accepted(task, !accepted)
    } else {
        return Ok(to_candidate(None));
    };

    repo.update_evaluation(candidate, &patch)?;
    tracing::info!(
        "Staff {} updated evaluation of {}: {:?}",
        ctx.user_id,
        candidate,
        patch
    );
    Ok(to_candidate(Some(ctx.t("staff.saved"))))
}

pub fn handle_input(
    ctx: &FlowContext,
    step: StaffStep,
    data: &StaffData,
    input: &Input,
) -> Result<Transition, FlowError> {
    if !ctx.is_staff() {
        return Ok(denied(ctx));
    }
    let state = DialogState::Staff {
        step,
        data: data.clone(),
    };

    match step {
        StaffStep::EnterUserId => {
            let prompt = || {
                Screen::new(ctx.t("staff.enter_user_id"))
                    .button(Button::callback(ctx.t("common.back_button"), "staff:menu"))
            };
            let Some(candidate) = input_text(input).and_then(|t| t.trim().parse::<i64>().ok())
            else {
                return Ok(Transition::to(state, prompt().prepend(&ctx.t("staff.bad_id"))));
            };
            if ctx.repo()?.find_application(candidate)?.is_none() {
                return Ok(Transition::to(state, prompt().prepend(&ctx.t("staff.not_found"))));
            }
            Ok(Transition::to(
                staff_state(StaffStep::Candidate, Some(candidate)),
                candidate_screen(ctx, candidate),
            ))
        }
        StaffStep::WriteFeedback { target } => {
            let Some(candidate) = data.candidate else {
                return Ok(start(ctx));
            };
            let Some(text) = input_text(input) else {
                return Ok(Transition::to(
                    state,
                    feedback_prompt(ctx, target).prepend(&ctx.t("common.text_expected")),
                ));
            };
            let feedback = match validate_feedback(text) {
                Ok(feedback) => feedback,
                Err(rejection) => {
                    return Ok(Transition::to(
                        state,
                        feedback_prompt(ctx, target).prepend(&ctx.rejection(&rejection)),
                    ));
                }
            };

            let patch = match target {
                FeedbackTarget::Task(task) => EvaluationPatch::task_feedback(task, feedback),
                FeedbackTarget::Interview => EvaluationPatch {
                    interview_feedback: Some(feedback),
                    ..Default::default()
                },
            };
            ctx.repo()?.update_evaluation(candidate, &patch)?;
            tracing::info!("Staff {} left feedback for {}", ctx.user_id, candidate);

            Ok(Transition::to(
                staff_state(StaffStep::Candidate, Some(candidate)),
                candidate_screen(ctx, candidate).prepend(&ctx.t("staff.saved")),
            ))
        }
        StaffStep::Menu | StaffStep::Candidate => {
            let screen = match data.candidate {
                Some(candidate) if step == StaffStep::Candidate => candidate_screen(ctx, candidate),
                _ => menu_screen(ctx),
            };
            Ok(Transition::to(
                state,
                screen.prepend(&ctx.t("common.use_buttons")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::flows::{handle_callback as route_callback, handle_input as route_input};
    use crate::models::{roles, ApplicationForm, FeedbackView, PositionChoice};

    fn submit(fx: &Fixture, user_id: i64) {
        fx.repo().upsert_user(user_id, None).unwrap();
        let form = ApplicationForm {
            full_name: "Анна".into(),
            education: "МГУ".into(),
            phone: "+79991234567".into(),
            email: "a@example.com".into(),
            choices: vec![PositionChoice {
                department: "media".into(),
                position: "design".into(),
            }],
            motivation: "Хочу".into(),
            resume: None,
        };
        fx.repo().submit_application(user_id, &form).unwrap();
    }

    #[test]
    fn test_guest_is_denied() {
        let fx = Fixture::new(800);
        assert_eq!(start(&fx.ctx()).next, DialogState::Idle);
        let transition = route_callback(&fx.ctx(), &DialogState::Idle, "staff:find").unwrap();
        assert_eq!(transition.next, DialogState::Idle);
    }

    #[test]
    fn test_volunteer_sees_counts_but_cannot_evaluate() {
        let fx = Fixture::new(801).with_roles(&[roles::VOLUNTEER]);
        let menu = start(&fx.ctx());
        assert!(!menu.screen.callback_data().contains(&"staff:find"));

        let regs = route_callback(&fx.ctx(), &menu.next, "staff:regs").unwrap();
        assert!(regs.screen.text.contains("<b>0</b>"));

        let find = route_callback(&fx.ctx(), &menu.next, "staff:find").unwrap();
        assert_eq!(find.next, DialogState::Idle);
    }

    #[test]
    fn test_staff_evaluates_candidate() {
        let fx = Fixture::new(802).with_roles(&[roles::STAFF]);
        submit(&fx, 900);

        let state = route_callback(&fx.ctx(), &DialogState::Idle, "staff:find")
            .unwrap()
            .next;
        let state = route_input(&fx.ctx(), &state, &Input::Text(" 900 ".into()))
            .unwrap()
            .next;
        assert_eq!(state, staff_state(StaffStep::Candidate, Some(900)));

        let state = route_callback(&fx.ctx(), &state, "staff:fb:1").unwrap().next;
        let state = route_input(&fx.ctx(), &state, &Input::Text("Слабая композиция".into()))
            .unwrap()
            .next;
        assert_eq!(state, staff_state(StaffStep::Candidate, Some(900)));

        let application = fx.repo().find_application(900).unwrap();
        let evaluation = fx.repo().find_evaluation(900).unwrap();
        let view = FeedbackView::from_records(application.as_ref(), evaluation.as_ref());
        assert!(view.has_task_feedback());

        route_callback(&fx.ctx(), &state, "staff:acc:1").unwrap();
        let evaluation = fx.repo().find_evaluation(900).unwrap().unwrap();
        assert!(evaluation.accepted_1);
        assert_eq!(
            evaluation.task_1_feedback.as_deref(),
            Some("Слабая композиция")
        );
    }

    #[test]
    fn test_unknown_candidate_reprompts() {
        let fx = Fixture::new(803).with_roles(&[roles::STAFF]);
        let state = staff_state(StaffStep::EnterUserId, None);

        let transition = route_input(&fx.ctx(), &state, &Input::Text("12345".into())).unwrap();
        assert_eq!(transition.next, state);
        let transition = route_input(&fx.ctx(), &state, &Input::Text("abc".into())).unwrap();
        assert_eq!(transition.next, state);
    }
}
