//! Dialog state and the view/transition types every flow speaks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Catalog, MediaRef};
use crate::db::DbError;
use crate::i18n::{t, t_with_args};
use crate::models::{PositionChoice, User};
use crate::repository::Repository;
use crate::validation::{Rejection, Validator};

pub const CANCEL_CALLBACK: &str = "flow:cancel";
pub const MAIN_MENU_CALLBACK: &str = "menu:main";

/// Per-chat conversation state. Each flow carries its own typed scratch data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum DialogState {
    #[default]
    Idle,
    Application {
        step: ApplicationStep,
        draft: ApplicationDraft,
    },
    Quiz {
        step: QuizStep,
        data: QuizData,
    },
    Settings {
        editing: Option<InfoField>,
    },
    Tasks {
        answering: Option<u8>,
    },
    Lectures {
        selected: Option<i32>,
    },
    Staff {
        step: StaffStep,
        data: StaffData,
    },
}

impl DialogState {
    pub fn flow_name(&self) -> &'static str {
        match self {
            DialogState::Idle => "idle",
            DialogState::Application { .. } => "application",
            DialogState::Quiz { .. } => "quiz",
            DialogState::Settings { .. } => "settings",
            DialogState::Tasks { .. } => "tasks",
            DialogState::Lectures { .. } => "lectures",
            DialogState::Staff { .. } => "staff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStep {
    Name,
    Education,
    Phone,
    Email,
    Department { priority: u8 },
    Position { priority: u8 },
    Motivation,
    Resume,
    Confirm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub full_name: Option<String>,
    pub education: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub choices: Vec<PositionChoice>,
    /// Department picked for the priority currently being filled.
    pub department: Option<String>,
    pub motivation: Option<String>,
    pub resume: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizStep {
    Name,
    Phone,
    Email,
    Question { index: usize },
    Results,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizData {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Selected option per answered question, in question order.
    pub answers: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoField {
    FullName,
    Phone,
    Email,
    Education,
}

impl InfoField {
    pub const ALL: [InfoField; 4] = [
        InfoField::FullName,
        InfoField::Phone,
        InfoField::Email,
        InfoField::Education,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            InfoField::FullName => "name",
            InfoField::Phone => "phone",
            InfoField::Email => "email",
            InfoField::Education => "education",
        }
    }

    pub fn parse(key: &str) -> Option<InfoField> {
        InfoField::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn validator(&self) -> Validator {
        match self {
            InfoField::FullName => crate::validation::validate_name,
            InfoField::Phone => crate::validation::validate_phone,
            InfoField::Email => crate::validation::validate_email,
            InfoField::Education => crate::validation::validate_education,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffStep {
    Menu,
    EnterUserId,
    Candidate,
    WriteFeedback { target: FeedbackTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackTarget {
    Task(u8),
    Interview,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffData {
    pub candidate: Option<i64>,
}

/// What the user sent while a flow was waiting for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Document {
        file_id: String,
        file_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Button {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// A rendered view: HTML text, inline keyboard rows and optional media.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
    pub media: Option<MediaRef>,
}

impl Screen {
    pub fn new(text: impl Into<String>) -> Self {
        Screen {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.keyboard.push(row);
        }
        self
    }

    pub fn button(self, button: Button) -> Self {
        self.row(vec![button])
    }

    pub fn with_media(mut self, media: Option<MediaRef>) -> Self {
        self.media = media;
        self
    }

    /// Puts `line` above the current text, e.g. a validation error.
    pub fn prepend(mut self, line: &str) -> Self {
        self.text = format!("{}\n\n{}", line, self.text);
        self
    }

    pub fn callback_data(&self) -> Vec<&str> {
        self.keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.action {
                ButtonAction::Callback(data) => Some(data.as_str()),
                ButtonAction::Url(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: DialogState,
    pub screen: Screen,
}

impl Transition {
    pub fn to(next: DialogState, screen: Screen) -> Self {
        Transition { next, screen }
    }

    pub fn idle(screen: Screen) -> Self {
        Transition::to(DialogState::Idle, screen)
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
    #[error("storage is unavailable")]
    Unavailable,
}

/// Everything a flow may look at while handling one update.
#[derive(Clone, Copy)]
pub struct FlowContext<'a> {
    pub user_id: i64,
    pub language: &'a str,
    pub user: Option<&'a User>,
    pub repo: Option<&'a dyn Repository>,
    pub catalog: &'a Catalog,
}

impl<'a> FlowContext<'a> {
    pub fn repo(&self) -> Result<&'a dyn Repository, FlowError> {
        self.repo.ok_or(FlowError::Unavailable)
    }

    pub fn t(&self, key: &str) -> String {
        t(self.language, key)
    }

    pub fn t_args(&self, key: &str, args: &[&str]) -> String {
        t_with_args(self.language, key, args)
    }

    pub fn rejection(&self, rejection: &Rejection) -> String {
        let args = rejection.i18n_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        format!("⚠️ {}", self.t_args(rejection.i18n_key(), &args))
    }

    pub fn is_staff(&self) -> bool {
        self.user.map(User::is_staff).unwrap_or(false)
    }

    pub fn is_volunteer(&self) -> bool {
        self.user.map(User::is_volunteer).unwrap_or(false)
    }

    pub fn cancel_button(&self) -> Button {
        Button::callback(self.t("common.cancel_button"), CANCEL_CALLBACK)
    }

    pub fn menu_button(&self) -> Button {
        Button::callback(self.t("common.menu_button"), MAIN_MENU_CALLBACK)
    }
}

/// Escapes user or catalog text for HTML parse mode.
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}
