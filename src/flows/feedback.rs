use crate::dialog::{escape, FlowContext, Screen, Transition};
use crate::models::FeedbackView;

pub fn start(ctx: &FlowContext) -> Transition {
    Transition::idle(feedback_screen(ctx))
}

pub fn feedback_screen(ctx: &FlowContext) -> Screen {
    let Some(repo) = ctx.repo else {
        return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
    };

    let records = repo
        .find_application(ctx.user_id)
        .and_then(|application| Ok((application, repo.find_evaluation(ctx.user_id)?)));
    let (application, evaluation) = match records {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Failed to load feedback for {}: {}", ctx.user_id, e);
            return Screen::new(ctx.t("common.unavailable")).button(ctx.menu_button());
        }
    };

    let view = FeedbackView::from_records(application.as_ref(), evaluation.as_ref());
    if view.is_empty() {
        return Screen::new(ctx.t("feedback.empty")).button(ctx.menu_button());
    }

    let choices = application.map(|a| a.choices()).unwrap_or_default();
    let mut sections = vec![ctx.t("feedback.title")];

    for (task, text) in &view.task_feedback {
        let position = choices
            .get(usize::from(*task) - 1)
            .map(|c| ctx.catalog.position_label(&c.department, &c.position))
            .unwrap_or_default();
        sections.push(format!(
            "{}\n{}",
            ctx.t_args("feedback.task_header", &[&task.to_string(), &escape(&position)]),
            escape(text)
        ));
    }
    if let Some(text) = &view.interview_feedback {
        sections.push(format!("{}\n{}", ctx.t("feedback.interview_header"), escape(text)));
    }

    Screen::new(sections.join("\n\n")).button(ctx.menu_button())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::testing::Fixture;
    use crate::models::{ApplicationForm, EvaluationPatch, PositionChoice};

    fn submit(fx: &Fixture, user_id: i64) {
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
        fx.repo().submit_application(user_id, &form).unwrap();
    }

    #[test]
    fn test_task_feedback_shown_when_all_declined() {
        let fx = Fixture::new(400);
        submit(&fx, 400);
        fx.repo()
            .update_evaluation(400, &EvaluationPatch::task_feedback(1, "Мало примеров".into()))
            .unwrap();

        let screen = feedback_screen(&fx.ctx());
        assert!(screen.text.contains("Мало примеров"));
        assert!(screen.text.contains("SMM"));
    }

    #[test]
    fn test_task_feedback_hidden_after_acceptance() {
        let fx = Fixture::new(401);
        submit(&fx, 401);
        fx.repo()
            .update_evaluation(401, &EvaluationPatch::task_feedback(1, "Мало примеров".into()))
            .unwrap();
        fx.repo()
            .update_evaluation(401, &EvaluationPatch::accepted(1, true))
            .unwrap();

        let screen = feedback_screen(&fx.ctx());
        assert!(!screen.text.contains("Мало примеров"));
    }

    #[test]
    fn test_no_records_means_empty_screen() {
        let fx = Fixture::new(402);
        let screen = feedback_screen(&fx.ctx());
        assert_eq!(screen.text, ctx_text(&fx, "feedback.empty"));
    }

    fn ctx_text(fx: &Fixture, key: &str) -> String {
        fx.ctx().t(key)
    }
}
