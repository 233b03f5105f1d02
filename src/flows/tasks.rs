//! Test tasks for the positions chosen in a submitted application.
//! Task `n` belongs to priority `n`.

use crate::db::DbError;
use crate::dialog::{
    escape, Button, DialogState, FlowContext, FlowError, Input, Screen, Transition,
};
use crate::models::{Application, Evaluation, TaskSubmission};
use crate::repository::Repository;
use crate::validation::validate_free_text;

const PREVIEW_CHARS: usize = 300;

struct TaskRecords {
    application: Application,
    evaluation: Option<Evaluation>,
    submissions: Vec<TaskSubmission>,
}

impl TaskRecords {
    fn task_count(&self) -> u8 {
        self.application.choices().len() as u8
    }

    fn submission(&self, task: u8) -> Option<&TaskSubmission> {
        self.submissions
            .iter()
            .find(|s| s.task_number == i16::from(task))
    }

    fn accepted(&self, task: u8) -> bool {
        self.evaluation
            .as_ref()
            .map(|e| e.accepted(task))
            .unwrap_or(false)
    }
}

/// `Ok(None)` when there is no submitted application yet.
fn load(repo: &dyn Repository, user_id: i64) -> Result<Option<TaskRecords>, DbError> {
    let Some(application) = repo
        .find_application(user_id)?
        .filter(|a| a.is_submitted())
    else {
        return Ok(None);
    };
    Ok(Some(TaskRecords {
        application,
        evaluation: repo.find_evaluation(user_id)?,
        submissions: repo.find_task_submissions(user_id)?,
    }))
}

/// The task exists for the chosen positions and staff have not accepted it.
fn is_answerable(repo: &dyn Repository, user_id: i64, task: u8) -> Result<bool, DbError> {
    Ok(load(repo, user_id)?
        .map(|r| task <= r.task_count() && !r.accepted(task))
        .unwrap_or(false))
}

fn with_records(ctx: &FlowContext, render: impl FnOnce(TaskRecords) -> Screen) -> Screen {
    let Some(repo) = ctx.repo else {
        return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
    };
    match load(repo, ctx.user_id) {
        Ok(Some(records)) => render(records),
        Ok(None) => Screen::new(ctx.t("tasks.no_application"))
            .button(Button::callback(ctx.t("menu.apply_button"), "menu:apply"))
            .button(ctx.menu_button()),
        Err(e) => {
            tracing::warn!("Failed to load tasks for {}: {}", ctx.user_id, e);
            Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button())
        }
    }
}

fn position_title(ctx: &FlowContext, records: &TaskRecords, task: u8) -> String {
    records
        .application
        .choices()
        .get(usize::from(task) - 1)
        .map(|c| ctx.catalog.position_label(&c.department, &c.position))
        .unwrap_or_default()
}

pub fn list_screen(ctx: &FlowContext) -> Screen {
    with_records(ctx, |records| {
        (1..=records.task_count())
            .fold(Screen::new(ctx.t("tasks.title")), |screen, task| {
                let mark = if records.accepted(task) {
                    "🏆"
                } else if records.submission(task).is_some() {
                    "✅"
                } else {
                    "📝"
                };
                screen.button(Button::callback(
                    format!("{} {}. {}", mark, task, position_title(ctx, &records, task)),
                    format!("task:open:{}", task),
                ))
            })
            .button(ctx.menu_button())
    })
}

fn preview(ctx: &FlowContext, content: &str) -> String {
    if content.starts_with("document:") {
        return ctx.t("tasks.answer_document");
    }
    let mut text: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        text.push('…');
    }
    escape(&text)
}

pub fn task_screen(ctx: &FlowContext, task: u8) -> Screen {
    with_records(ctx, |records| {
        if task == 0 || task > records.task_count() {
            return Screen::new(ctx.t("common.expired"))
                .button(Button::callback(ctx.t("common.back_button"), "task:list"));
        }

        let choices = records.application.choices();
        let choice = &choices[usize::from(task) - 1];
        let description = ctx
            .catalog
            .position(&choice.department, &choice.position)
            .map(|p| escape(&p.task))
            .unwrap_or_default();

        let mut text = format!(
            "{}\n\n{}",
            ctx.t_args(
                "tasks.task_header",
                &[&task.to_string(), &escape(&position_title(ctx, &records, task))]
            ),
            description
        );
        if let Some(submission) = records.submission(task) {
            text = format!(
                "{}\n\n{}\n{}",
                text,
                ctx.t("tasks.your_answer"),
                preview(ctx, &submission.content)
            );
        }

        let screen = if records.accepted(task) {
            Screen::new(format!("{}\n\n{}", text, ctx.t("tasks.accepted")))
        } else {
            let label = if records.submission(task).is_some() {
                ctx.t("tasks.resubmit_button")
            } else {
                ctx.t("tasks.answer_button")
            };
            Screen::new(text).button(Button::callback(label, format!("task:answer:{}", task)))
        };
        screen.button(Button::callback(ctx.t("common.back_button"), "task:list"))
    })
}

pub fn start(ctx: &FlowContext) -> Transition {
    Transition::to(DialogState::Tasks { answering: None }, list_screen(ctx))
}

fn parse_task(raw: &str) -> Option<u8> {
    raw.parse().ok().filter(|n| (1..=3).contains(n))
}

pub fn handle_callback(
    ctx: &FlowContext,
    _state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    if let Some(task) = data.strip_prefix("open:").and_then(parse_task) {
        return Ok(Transition::to(
            DialogState::Tasks { answering: None },
            task_screen(ctx, task),
        ));
    }

    if let Some(task) = data.strip_prefix("answer:").and_then(parse_task) {
        if !is_answerable(ctx.repo()?, ctx.user_id, task)? {
            return Ok(Transition::to(
                DialogState::Tasks { answering: None },
                task_screen(ctx, task),
            ));
        }
        return Ok(Transition::to(
            DialogState::Tasks {
                answering: Some(task),
            },
            Screen::new(ctx.t_args("tasks.answer_prompt", &[&task.to_string()])).button(
                Button::callback(ctx.t("common.back_button"), format!("task:open:{}", task)),
            ),
        ));
    }

    Ok(start(ctx))
}

pub fn handle_input(
    ctx: &FlowContext,
    answering: Option<u8>,
    input: &Input,
) -> Result<Transition, FlowError> {
    let Some(task) = answering else {
        return Ok(Transition::to(
            DialogState::Tasks { answering: None },
            list_screen(ctx).prepend(&ctx.t("common.use_buttons")),
        ));
    };

    let content = match input {
        Input::Document { file_id, .. } => format!("document:{}", file_id),
        Input::Text(text) => match validate_free_text(text) {
            Ok(text) => text,
            Err(rejection) => {
                return Ok(Transition::to(
                    DialogState::Tasks {
                        answering: Some(task),
                    },
                    Screen::new(ctx.t_args("tasks.answer_prompt", &[&task.to_string()]))
                        .prepend(&ctx.rejection(&rejection)),
                ));
            }
        },
    };

    let repo = ctx.repo()?;
    if !is_answerable(repo, ctx.user_id, task)? {
        tracing::info!("User {} answered task {} after it closed", ctx.user_id, task);
        return Ok(Transition::to(
            DialogState::Tasks { answering: None },
            task_screen(ctx, task),
        ));
    }
    repo.save_task_submission(ctx.user_id, i16::from(task), &content)?;
    tracing::info!("User {} submitted task {}", ctx.user_id, task);

    Ok(Transition::to(
        DialogState::Tasks { answering: None },
        list_screen(ctx).prepend(&ctx.t("tasks.saved")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::flows::{handle_callback as route_callback, handle_input as route_input};
    use crate::models::{ApplicationForm, EvaluationPatch, PositionChoice};

    fn submit(fx: &Fixture, user_id: i64) {
        let form = ApplicationForm {
            full_name: "Анна".into(),
            education: "МГУ".into(),
            phone: "+79991234567".into(),
            email: "a@example.com".into(),
            choices: vec![
                PositionChoice {
                    department: "media".into(),
                    position: "smm".into(),
                },
                PositionChoice {
                    department: "events".into(),
                    position: "org".into(),
                },
            ],
            motivation: "Хочу".into(),
            resume: None,
        };
        fx.repo().submit_application(user_id, &form).unwrap();
    }

    #[test]
    fn test_tasks_require_submitted_application() {
        let fx = Fixture::new(700);
        let screen = list_screen(&fx.ctx());
        assert!(screen.callback_data().contains(&"menu:apply"));
    }

    #[test]
    fn test_answer_is_saved_and_resubmission_updates() {
        let fx = Fixture::new(701);
        submit(&fx, 701);
        assert_eq!(
            list_screen(&fx.ctx()).callback_data(),
            vec!["task:open:1", "task:open:2", "menu:main"]
        );

        let state = route_callback(&fx.ctx(), &DialogState::Idle, "task:answer:2")
            .unwrap()
            .next;
        assert_eq!(state, DialogState::Tasks { answering: Some(2) });

        let done = route_input(&fx.ctx(), &state, &Input::Text("План встречи".into())).unwrap();
        assert_eq!(done.next, DialogState::Tasks { answering: None });

        route_input(&fx.ctx(), &state, &Input::Text("План v2".into())).unwrap();
        let submissions = fx.repo().find_task_submissions(701).unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].task_number, 2);
        assert_eq!(submissions[0].content, "План v2");
    }

    #[test]
    fn test_accepted_task_is_read_only() {
        let fx = Fixture::new(702);
        submit(&fx, 702);
        fx.repo()
            .update_evaluation(702, &EvaluationPatch::accepted(1, true))
            .unwrap();

        let transition = route_callback(&fx.ctx(), &DialogState::Idle, "task:answer:1").unwrap();
        assert_eq!(transition.next, DialogState::Tasks { answering: None });
        assert!(!transition.screen.callback_data().contains(&"task:answer:1"));
    }

    #[test]
    fn test_task_beyond_chosen_positions_is_rejected() {
        let fx = Fixture::new(703);
        submit(&fx, 703);
        let transition = route_callback(&fx.ctx(), &DialogState::Idle, "task:answer:3").unwrap();
        assert_eq!(transition.next, DialogState::Tasks { answering: None });
    }

    #[test]
    fn test_answer_after_acceptance_is_not_saved() {
        let fx = Fixture::new(704);
        submit(&fx, 704);
        let state = route_callback(&fx.ctx(), &DialogState::Idle, "task:answer:1")
            .unwrap()
            .next;
        assert_eq!(state, DialogState::Tasks { answering: Some(1) });

        fx.repo()
            .update_evaluation(704, &EvaluationPatch::accepted(1, true))
            .unwrap();

        let transition =
            route_input(&fx.ctx(), &state, &Input::Text("Поздний ответ".into())).unwrap();
        assert_eq!(transition.next, DialogState::Tasks { answering: None });
        assert!(!transition.screen.callback_data().contains(&"task:answer:1"));
        assert!(fx.repo().find_task_submissions(704).unwrap().is_empty());
    }
}
