use crate::schema::{
    applications, broadcasts, evaluated_applications, online_events, online_registrations,
    quiz_results, task_submissions, user_info, user_subscriptions, users,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

pub mod roles {
    pub const GUEST: &str = "guest";
    pub const STAFF: &str = "staff";
    pub const VOLUNTEER: &str = "volunteer";

    pub const ASSIGNABLE: [&str; 3] = [GUEST, STAFF, VOLUNTEER];
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub is_alive: bool,
    pub is_blocked: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_staff(&self) -> bool {
        self.has_role(roles::STAFF)
    }

    pub fn is_volunteer(&self) -> bool {
        self.has_role(roles::VOLUNTEER)
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser<'a> {
    pub id: i64,
    pub username: Option<&'a str>,
    pub is_alive: bool,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = user_info)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserInfo {
    pub user_id: i64,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub education: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update of a user's personal data. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = user_info)]
pub struct UserInfoPatch {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub education: Option<String>,
}

impl UserInfoPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.education.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    NotSubmitted,
    Submitted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::NotSubmitted => "not_submitted",
            ApplicationStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        match s {
            "not_submitted" => Some(ApplicationStatus::NotSubmitted),
            "submitted" => Some(ApplicationStatus::Submitted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = applications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Application {
    pub id: i32,
    pub user_id: i64,
    pub full_name: String,
    pub education: String,
    pub phone: String,
    pub email: String,
    pub department_1: String,
    pub position_1: String,
    pub department_2: Option<String>,
    pub position_2: Option<String>,
    pub department_3: Option<String>,
    pub position_3: Option<String>,
    pub motivation: String,
    pub resume: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn status(&self) -> ApplicationStatus {
        ApplicationStatus::parse(&self.status).unwrap_or(ApplicationStatus::NotSubmitted)
    }

    pub fn is_submitted(&self) -> bool {
        self.status() == ApplicationStatus::Submitted
    }

    /// Chosen (department, position) pairs in priority order; index 0 is task 1.
    pub fn choices(&self) -> Vec<PositionChoice> {
        let mut choices = vec![PositionChoice {
            department: self.department_1.clone(),
            position: self.position_1.clone(),
        }];
        for (department, position) in [
            (&self.department_2, &self.position_2),
            (&self.department_3, &self.position_3),
        ] {
            if let (Some(department), Some(position)) = (department, position) {
                choices.push(PositionChoice {
                    department: department.clone(),
                    position: position.clone(),
                });
            }
        }
        choices
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PositionChoice {
    pub department: String,
    pub position: String,
}

/// A completed application form, as collected by the intake dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationForm {
    pub full_name: String,
    pub education: String,
    pub phone: String,
    pub email: String,
    pub choices: Vec<PositionChoice>,
    pub motivation: String,
    pub resume: Option<String>,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = applications)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ApplicationRow<'a> {
    pub user_id: i64,
    pub full_name: &'a str,
    pub education: &'a str,
    pub phone: &'a str,
    pub email: &'a str,
    pub department_1: &'a str,
    pub position_1: &'a str,
    pub department_2: Option<&'a str>,
    pub position_2: Option<&'a str>,
    pub department_3: Option<&'a str>,
    pub position_3: Option<&'a str>,
    pub motivation: &'a str,
    pub resume: Option<&'a str>,
    pub status: &'a str,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl<'a> ApplicationRow<'a> {
    pub fn submitted(user_id: i64, form: &'a ApplicationForm, now: DateTime<Utc>) -> Self {
        let choice = |idx: usize| form.choices.get(idx);
        ApplicationRow {
            user_id,
            full_name: &form.full_name,
            education: &form.education,
            phone: &form.phone,
            email: &form.email,
            department_1: choice(0).map(|c| c.department.as_str()).unwrap_or_default(),
            position_1: choice(0).map(|c| c.position.as_str()).unwrap_or_default(),
            department_2: choice(1).map(|c| c.department.as_str()),
            position_2: choice(1).map(|c| c.position.as_str()),
            department_3: choice(2).map(|c| c.department.as_str()),
            position_3: choice(2).map(|c| c.position.as_str()),
            motivation: &form.motivation,
            resume: form.resume.as_deref(),
            status: ApplicationStatus::Submitted.as_str(),
            updated_at: now,
            submitted_at: Some(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = task_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskSubmission {
    pub id: i32,
    pub user_id: i64,
    pub task_number: i16,
    pub content: String,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = task_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewTaskSubmission<'a> {
    pub user_id: i64,
    pub task_number: i16,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = evaluated_applications)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Evaluation {
    pub user_id: i64,
    pub accepted_1: bool,
    pub accepted_2: bool,
    pub accepted_3: bool,
    pub task_1_feedback: Option<String>,
    pub task_2_feedback: Option<String>,
    pub task_3_feedback: Option<String>,
    pub interview_approved: bool,
    pub interview_feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn accepted(&self, task: u8) -> bool {
        match task {
            1 => self.accepted_1,
            2 => self.accepted_2,
            3 => self.accepted_3,
            _ => false,
        }
    }

    /// Forgets the verdict and feedback for one task.
    pub fn clear_task(&mut self, task: u8) {
        match task {
            1 => {
                self.accepted_1 = false;
                self.task_1_feedback = None;
            }
            2 => {
                self.accepted_2 = false;
                self.task_2_feedback = None;
            }
            3 => {
                self.accepted_3 = false;
                self.task_3_feedback = None;
            }
            _ => {}
        }
    }

    pub fn task_feedback(&self, task: u8) -> Option<&str> {
        match task {
            1 => self.task_1_feedback.as_deref(),
            2 => self.task_2_feedback.as_deref(),
            3 => self.task_3_feedback.as_deref(),
            _ => None,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = evaluated_applications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewEvaluation {
    pub user_id: i64,
}

/// Partial staff evaluation. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = evaluated_applications)]
pub struct EvaluationPatch {
    pub accepted_1: Option<bool>,
    pub accepted_2: Option<bool>,
    pub accepted_3: Option<bool>,
    pub task_1_feedback: Option<String>,
    pub task_2_feedback: Option<String>,
    pub task_3_feedback: Option<String>,
    pub interview_approved: Option<bool>,
    pub interview_feedback: Option<String>,
}

impl EvaluationPatch {
    pub fn accepted(task: u8, value: bool) -> Self {
        let mut patch = Self::default();
        match task {
            1 => patch.accepted_1 = Some(value),
            2 => patch.accepted_2 = Some(value),
            3 => patch.accepted_3 = Some(value),
            _ => {}
        }
        patch
    }

    pub fn task_feedback(task: u8, text: String) -> Self {
        let mut patch = Self::default();
        match task {
            1 => patch.task_1_feedback = Some(text),
            2 => patch.task_2_feedback = Some(text),
            3 => patch.task_3_feedback = Some(text),
            _ => {}
        }
        patch
    }

    pub fn apply_to(&self, evaluation: &mut Evaluation) {
        if let Some(v) = self.accepted_1 {
            evaluation.accepted_1 = v;
        }
        if let Some(v) = self.accepted_2 {
            evaluation.accepted_2 = v;
        }
        if let Some(v) = self.accepted_3 {
            evaluation.accepted_3 = v;
        }
        if let Some(v) = &self.task_1_feedback {
            evaluation.task_1_feedback = Some(v.clone());
        }
        if let Some(v) = &self.task_2_feedback {
            evaluation.task_2_feedback = Some(v.clone());
        }
        if let Some(v) = &self.task_3_feedback {
            evaluation.task_3_feedback = Some(v.clone());
        }
        if let Some(v) = self.interview_approved {
            evaluation.interview_approved = v;
        }
        if let Some(v) = &self.interview_feedback {
            evaluation.interview_feedback = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = quiz_results)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QuizResult {
    pub user_id: i64,
    pub best_score: i32,
    pub total_questions: i32,
    pub attempts: i32,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = quiz_results)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewQuizResult<'a> {
    pub user_id: i64,
    pub best_score: i32,
    pub total_questions: i32,
    pub attempts: i32,
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
}

/// One finished quiz pass.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub score: i32,
    pub total_questions: i32,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub best_score: i32,
    pub new_record: bool,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = broadcasts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Broadcast {
    pub id: i32,
    pub key: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = broadcasts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBroadcast<'a> {
    pub key: &'a str,
    pub title: &'a str,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = user_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserSubscription {
    pub id: i32,
    pub user_id: i64,
    pub broadcast_id: i32,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

impl UserSubscription {
    pub fn is_active(&self) -> bool {
        self.unsubscribed_at.is_none()
    }
}

#[derive(Insertable)]
#[diesel(table_name = user_subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUserSubscription {
    pub user_id: i64,
    pub broadcast_id: i32,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = online_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OnlineEvent {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Event definition as it comes from the catalog; synced into `online_events` by slug.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset, serde::Deserialize)]
#[diesel(table_name = online_events)]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OnlineEventSpec {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub link: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Active,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Active => "active",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<RegistrationStatus> {
        match s {
            "active" => Some(RegistrationStatus::Active),
            "cancelled" => Some(RegistrationStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = online_registrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OnlineRegistration {
    pub id: i32,
    pub user_id: i64,
    pub event_id: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OnlineRegistration {
    pub fn is_registered(&self) -> bool {
        RegistrationStatus::parse(&self.status) == Some(RegistrationStatus::Active)
    }
}

#[derive(Insertable)]
#[diesel(table_name = online_registrations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewOnlineRegistration<'a> {
    pub user_id: i64,
    pub event_id: i32,
    pub status: &'a str,
}

/// What a user may see on the feedback screen. Always derived from stored rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackView {
    pub task_feedback: Vec<(u8, String)>,
    pub interview_feedback: Option<String>,
}

impl FeedbackView {
    pub fn from_records(application: Option<&Application>, evaluation: Option<&Evaluation>) -> Self {
        let Some(evaluation) = evaluation else {
            return Self::default();
        };

        let submitted = application.map(|a| a.is_submitted()).unwrap_or(false);
        let all_declined = (1..=3).all(|task| !evaluation.accepted(task));

        let task_feedback = if submitted && all_declined {
            (1..=3)
                .filter_map(|task| {
                    evaluation
                        .task_feedback(task)
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                        .map(|text| (task, text.to_string()))
                })
                .collect()
        } else {
            Vec::new()
        };

        let interview_feedback = if evaluation.interview_approved {
            None
        } else {
            evaluation
                .interview_feedback
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        Self {
            task_feedback,
            interview_feedback,
        }
    }

    pub fn has_task_feedback(&self) -> bool {
        !self.task_feedback.is_empty()
    }

    pub fn has_interview_feedback(&self) -> bool {
        self.interview_feedback.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_task_feedback() && !self.has_interview_feedback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(status: ApplicationStatus) -> Application {
        let now = Utc::now();
        Application {
            id: 1,
            user_id: 7,
            full_name: "Иван Петров".into(),
            education: "МГУ".into(),
            phone: "+79991234567".into(),
            email: "ivan@example.com".into(),
            department_1: "media".into(),
            position_1: "smm".into(),
            department_2: None,
            position_2: None,
            department_3: None,
            position_3: None,
            motivation: "Хочу в команду".into(),
            resume: None,
            status: status.as_str().into(),
            created_at: now,
            updated_at: now,
            submitted_at: Some(now),
        }
    }

    fn evaluation() -> Evaluation {
        let now = Utc::now();
        Evaluation {
            user_id: 7,
            accepted_1: false,
            accepted_2: false,
            accepted_3: false,
            task_1_feedback: Some("Хорошая работа, но не хватило глубины".into()),
            task_2_feedback: None,
            task_3_feedback: None,
            interview_approved: false,
            interview_feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_feedback_visible_when_all_declined() {
        let app = application(ApplicationStatus::Submitted);
        let eval = evaluation();

        let view = FeedbackView::from_records(Some(&app), Some(&eval));
        assert!(view.has_task_feedback());
        assert_eq!(view.task_feedback[0].0, 1);
    }

    #[test]
    fn test_task_feedback_hidden_when_any_accepted() {
        let app = application(ApplicationStatus::Submitted);
        let mut eval = evaluation();
        eval.accepted_1 = true;

        let view = FeedbackView::from_records(Some(&app), Some(&eval));
        assert!(!view.has_task_feedback());
    }

    #[test]
    fn test_task_feedback_hidden_without_submission() {
        let app = application(ApplicationStatus::NotSubmitted);
        let view = FeedbackView::from_records(Some(&app), Some(&evaluation()));
        assert!(!view.has_task_feedback());

        let view = FeedbackView::from_records(None, Some(&evaluation()));
        assert!(!view.has_task_feedback());
    }

    #[test]
    fn test_blank_task_feedback_is_not_shown() {
        let app = application(ApplicationStatus::Submitted);
        let mut eval = evaluation();
        eval.task_1_feedback = Some("   ".into());

        let view = FeedbackView::from_records(Some(&app), Some(&eval));
        assert!(view.is_empty());
    }

    #[test]
    fn test_interview_feedback_gating() {
        let mut eval = evaluation();
        eval.interview_feedback = Some("Не хватило опыта".into());

        let view = FeedbackView::from_records(None, Some(&eval));
        assert_eq!(view.interview_feedback.as_deref(), Some("Не хватило опыта"));

        eval.interview_approved = true;
        let view = FeedbackView::from_records(None, Some(&eval));
        assert!(!view.has_interview_feedback());
    }

    #[test]
    fn test_application_choices_in_priority_order() {
        let mut app = application(ApplicationStatus::Submitted);
        app.department_2 = Some("events".into());
        app.position_2 = Some("host".into());

        let choices = app.choices();
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[1].position, "host");
    }

    #[test]
    fn test_evaluation_patch_touches_only_given_fields() {
        let mut eval = evaluation();
        EvaluationPatch::accepted(2, true).apply_to(&mut eval);

        assert!(!eval.accepted_1);
        assert!(eval.accepted_2);
        assert!(eval.task_1_feedback.is_some());
    }
}
