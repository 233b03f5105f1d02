use crate::catalog::QuizQuestion;
use crate::dialog::{
    escape, Button, DialogState, FlowContext, FlowError, Input, QuizData, QuizStep, Screen,
    Transition,
};
use crate::models::QuizAttempt;
use crate::validation::{validate_email, validate_name, validate_phone};

use super::input_text;

/// Number of answers matching each question's correct option.
pub fn score_answers(questions: &[QuizQuestion], answers: &[usize]) -> usize {
    questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.correct == **answer)
        .count()
}

/// One mistake is allowed.
pub fn passed(score: usize, total: usize) -> bool {
    score + 1 >= total
}

pub fn start(ctx: &FlowContext) -> Transition {
    if ctx.catalog.quiz.is_empty() {
        return Transition::idle(Screen::new(ctx.t("quiz.empty")).button(ctx.menu_button()));
    }

    let mut data = QuizData::default();
    if let Some(repo) = ctx.repo {
        match repo.find_quiz_result(ctx.user_id) {
            Ok(Some(result)) => {
                data.name = result.name;
                data.phone = result.phone;
                data.email = result.email;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to load quiz result for {}: {}", ctx.user_id, e),
        }
        if data.name.is_none() || data.phone.is_none() || data.email.is_none() {
            match repo.find_user_info(ctx.user_id) {
                Ok(Some(info)) => {
                    data.name = data.name.or(info.full_name);
                    data.phone = data.phone.or(info.phone);
                    data.email = data.email.or(info.email);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to load user info for {}: {}", ctx.user_id, e),
            }
        }
    }

    let step = next_step(&data);
    let screen = step_screen(ctx, step, &data).prepend(&ctx.t_args(
        "quiz.intro",
        &[&ctx.catalog.quiz.len().to_string()],
    ));
    Transition::to(DialogState::Quiz { step, data }, screen)
}

/// First missing contact, then the first question.
fn next_step(data: &QuizData) -> QuizStep {
    if data.name.is_none() {
        QuizStep::Name
    } else if data.phone.is_none() {
        QuizStep::Phone
    } else if data.email.is_none() {
        QuizStep::Email
    } else {
        QuizStep::Question { index: 0 }
    }
}

fn enter(ctx: &FlowContext, step: QuizStep, data: QuizData) -> Transition {
    let screen = step_screen(ctx, step, &data);
    Transition::to(DialogState::Quiz { step, data }, screen)
}

fn stay(ctx: &FlowContext, step: QuizStep, data: &QuizData, notice: &str) -> Transition {
    let screen = step_screen(ctx, step, data).prepend(notice);
    Transition::to(
        DialogState::Quiz {
            step,
            data: data.clone(),
        },
        screen,
    )
}

pub fn step_screen(ctx: &FlowContext, step: QuizStep, data: &QuizData) -> Screen {
    match step {
        QuizStep::Name => Screen::new(ctx.t("quiz.name_prompt")).button(ctx.cancel_button()),
        QuizStep::Phone => Screen::new(ctx.t("quiz.phone_prompt")).button(ctx.cancel_button()),
        QuizStep::Email => Screen::new(ctx.t("quiz.email_prompt")).button(ctx.cancel_button()),
        QuizStep::Question { index } => question_screen(ctx, index),
        QuizStep::Results => {
            let total = ctx.catalog.quiz.len();
            let score = score_answers(&ctx.catalog.quiz, &data.answers);
            Screen::new(ctx.t_args(
                "quiz.score",
                &[&score.to_string(), &total.to_string()],
            ))
            .button(Button::callback(ctx.t("quiz.restart_button"), "quiz:restart"))
            .button(ctx.menu_button())
        }
    }
}

fn question_screen(ctx: &FlowContext, index: usize) -> Screen {
    let questions = &ctx.catalog.quiz;
    let Some(question) = questions.get(index) else {
        return Screen::new(ctx.t("quiz.empty")).button(ctx.menu_button());
    };

    let text = ctx.t_args(
        "quiz.question",
        &[
            &(index + 1).to_string(),
            &questions.len().to_string(),
            &escape(&question.question),
        ],
    );
    question
        .options
        .iter()
        .enumerate()
        .fold(Screen::new(text), |screen, (opt, label)| {
            screen.button(Button::callback(
                label.clone(),
                format!("quiz:ans:{}:{}", index, opt),
            ))
        })
        .button(ctx.cancel_button())
}

pub fn handle_input(
    ctx: &FlowContext,
    step: QuizStep,
    data: &QuizData,
    input: &Input,
) -> Result<Transition, FlowError> {
    let validator: fn(&str) -> Result<String, crate::validation::Rejection> = match step {
        QuizStep::Name => validate_name,
        QuizStep::Phone => validate_phone,
        QuizStep::Email => validate_email,
        QuizStep::Question { .. } | QuizStep::Results => {
            return Ok(stay(ctx, step, data, &ctx.t("common.use_buttons")));
        }
    };

    let Some(text) = input_text(input) else {
        return Ok(stay(ctx, step, data, &ctx.t("common.text_expected")));
    };

    match validator(text) {
        Ok(value) => {
            let mut data = data.clone();
            match step {
                QuizStep::Name => data.name = Some(value),
                QuizStep::Phone => data.phone = Some(value),
                QuizStep::Email => data.email = Some(value),
                _ => {}
            }
            let next = next_step(&data);
            Ok(enter(ctx, next, data))
        }
        Err(rejection) => Ok(stay(ctx, step, data, &ctx.rejection(&rejection))),
    }
}

pub fn handle_callback(
    ctx: &FlowContext,
    state: &DialogState,
    data: &str,
) -> Result<Transition, FlowError> {
    let current = match state {
        DialogState::Quiz { step, data } => Some((*step, data)),
        _ => None,
    };

    if data == "restart" {
        return Ok(match current {
            Some((_, quiz)) => {
                let data = QuizData {
                    answers: Vec::new(),
                    ..quiz.clone()
                };
                let step = next_step(&data);
                enter(ctx, step, data)
            }
            None => start(ctx),
        });
    }

    let Some(answer) = data.strip_prefix("ans:") else {
        return Ok(start(ctx));
    };
    let parsed = answer
        .split_once(':')
        .and_then(|(q, o)| Some((q.parse::<usize>().ok()?, o.parse::<usize>().ok()?)));

    let Some((QuizStep::Question { index }, quiz)) = current else {
        return Ok(start(ctx));
    };
    let step = QuizStep::Question { index };

    // Buttons of an earlier question stay clickable in the chat history.
    let Some((question, option)) = parsed.filter(|(q, _)| *q == index) else {
        return Ok(stay(ctx, step, quiz, &ctx.t("common.expired")));
    };
    let valid_option = ctx
        .catalog
        .quiz
        .get(question)
        .map(|q| option < q.options.len())
        .unwrap_or(false);
    if !valid_option || quiz.answers.len() != index {
        return Ok(stay(ctx, step, quiz, &ctx.t("common.expired")));
    }

    let mut quiz = quiz.clone();
    quiz.answers.push(option);

    if index + 1 < ctx.catalog.quiz.len() {
        Ok(enter(ctx, QuizStep::Question { index: index + 1 }, quiz))
    } else {
        finish(ctx, quiz)
    }
}

fn finish(ctx: &FlowContext, data: QuizData) -> Result<Transition, FlowError> {
    let repo = ctx.repo()?;
    let total = ctx.catalog.quiz.len();
    let score = score_answers(&ctx.catalog.quiz, &data.answers);

    let outcome = repo.record_quiz_attempt(
        ctx.user_id,
        &QuizAttempt {
            score: score as i32,
            total_questions: total as i32,
            name: data.name.clone(),
            phone: data.phone.clone(),
            email: data.email.clone(),
        },
    )?;
    tracing::info!(
        "Quiz finished by {}: {}/{} (best {})",
        ctx.user_id,
        score,
        total,
        outcome.best_score
    );

    let verdict = if passed(score, total) {
        ctx.t("quiz.passed")
    } else {
        ctx.t("quiz.failed")
    };
    let record = if outcome.new_record {
        ctx.t("quiz.new_record")
    } else {
        ctx.t_args("quiz.best_score", &[&outcome.best_score.to_string()])
    };

    let screen = step_screen(ctx, QuizStep::Results, &data);
    let screen = Screen {
        text: format!("{}\n\n{}\n{}", screen.text, verdict, record),
        ..screen
    };
    Ok(Transition::to(
        DialogState::Quiz {
            step: QuizStep::Results,
            data,
        },
        screen,
    ))
}
