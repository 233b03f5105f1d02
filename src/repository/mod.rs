//! Persistence façade.
//!
//! Every flow talks to storage through [`Repository`]. Writes are upserts or
//! targeted updates keyed by natural keys (user id, user + broadcast,
//! user + event), reads return `Ok(None)` for absent rows.
//!
//! A [`UnitOfWork`] is a repository bound to one transaction; a
//! [`SessionFactory`] opens one per incoming update.

pub mod memory;
pub mod pg;

use crate::db::DbError;
use crate::models::{
    Application, ApplicationForm, Broadcast, Evaluation, EvaluationPatch, OnlineEvent,
    OnlineEventSpec, OnlineRegistration, PositionChoice, QuizAttempt, QuizOutcome, QuizResult,
    TaskSubmission, User, UserInfo, UserInfoPatch, UserSubscription,
};
use std::sync::Arc;

pub use memory::MemoryDatabase;
pub use pg::{PgSession, PgSessionFactory};

pub trait Repository: Send + Sync {
    /// Inserts a `guest` user or marks an existing one alive.
    fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<User, DbError>;
    fn find_user(&self, telegram_id: i64) -> Result<Option<User>, DbError>;
    fn set_user_roles(&self, telegram_id: i64, roles: &[String]) -> Result<Option<User>, DbError>;
    fn set_user_blocked(&self, telegram_id: i64, blocked: bool) -> Result<Option<User>, DbError>;

    fn find_user_info(&self, user_id: i64) -> Result<Option<UserInfo>, DbError>;
    fn update_user_info(&self, user_id: i64, patch: &UserInfoPatch) -> Result<UserInfo, DbError>;

    fn find_application(&self, user_id: i64) -> Result<Option<Application>, DbError>;
    /// Stores the form and marks the application submitted.
    fn submit_application(
        &self,
        user_id: i64,
        form: &ApplicationForm,
    ) -> Result<Application, DbError>;

    fn find_task_submissions(&self, user_id: i64) -> Result<Vec<TaskSubmission>, DbError>;
    fn save_task_submission(
        &self,
        user_id: i64,
        task_number: i16,
        content: &str,
    ) -> Result<TaskSubmission, DbError>;

    /// Drops the submission and the staff verdict for one task.
    fn reset_task(&self, user_id: i64, task_number: i16) -> Result<(), DbError>;

    fn find_evaluation(&self, user_id: i64) -> Result<Option<Evaluation>, DbError>;
    fn update_evaluation(
        &self,
        user_id: i64,
        patch: &EvaluationPatch,
    ) -> Result<Evaluation, DbError>;

    fn find_quiz_result(&self, user_id: i64) -> Result<Option<QuizResult>, DbError>;
    /// Records a finished pass. The stored best score only ever grows.
    fn record_quiz_attempt(
        &self,
        user_id: i64,
        attempt: &QuizAttempt,
    ) -> Result<QuizOutcome, DbError>;

    fn ensure_broadcast(&self, key: &str, title: &str) -> Result<Broadcast, DbError>;
    fn list_broadcasts(&self) -> Result<Vec<Broadcast>, DbError>;
    fn find_subscriptions(&self, user_id: i64) -> Result<Vec<UserSubscription>, DbError>;
    fn subscribe(&self, user_id: i64, broadcast_id: i32) -> Result<UserSubscription, DbError>;
    fn unsubscribe(
        &self,
        user_id: i64,
        broadcast_id: i32,
    ) -> Result<Option<UserSubscription>, DbError>;

    fn upsert_online_event(&self, event: &OnlineEventSpec) -> Result<OnlineEvent, DbError>;
    fn list_active_events(&self) -> Result<Vec<OnlineEvent>, DbError>;
    fn find_event(&self, event_id: i32) -> Result<Option<OnlineEvent>, DbError>;
    fn find_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError>;
    fn register_for_event(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<OnlineRegistration, DbError>;
    fn cancel_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError>;
    fn count_active_registrations(&self, event_id: i32) -> Result<i64, DbError>;
}

pub trait UnitOfWork: Send + Sync {
    fn repository(&self) -> &dyn Repository;
    fn commit(&self) -> Result<(), DbError>;
    fn rollback(&self) -> Result<(), DbError>;
}

pub trait SessionFactory: Send + Sync {
    fn begin(&self) -> Result<Arc<dyn UnitOfWork>, DbError>;
}

/// Adds `role` to the user's role set. Returns `None` for unknown users.
pub fn grant_role(repo: &dyn Repository, user_id: i64, role: &str) -> Result<Option<User>, DbError> {
    let Some(user) = repo.find_user(user_id)? else {
        return Ok(None);
    };
    if user.has_role(role) {
        return Ok(Some(user));
    }

    let mut roles = user.roles.clone();
    roles.push(role.to_string());
    repo.set_user_roles(user_id, &roles)
}

/// Removes `role`; a user left with no roles falls back to `guest`.
pub fn revoke_role(
    repo: &dyn Repository,
    user_id: i64,
    role: &str,
) -> Result<Option<User>, DbError> {
    let Some(user) = repo.find_user(user_id)? else {
        return Ok(None);
    };
    if !user.has_role(role) {
        return Ok(Some(user));
    }

    let mut roles: Vec<String> = user.roles.into_iter().filter(|r| r != role).collect();
    if roles.is_empty() {
        roles.push(crate::models::roles::GUEST.to_string());
    }
    repo.set_user_roles(user_id, &roles)
}

/// Resets every task whose position changed against the stored application.
/// Returns the reset task numbers.
pub fn reset_changed_tasks(
    repo: &dyn Repository,
    user_id: i64,
    choices: &[PositionChoice],
) -> Result<Vec<u8>, DbError> {
    let Some(previous) = repo.find_application(user_id)? else {
        return Ok(Vec::new());
    };
    let previous = previous.choices();

    let mut reset = Vec::new();
    for task in 1..=3u8 {
        let index = usize::from(task) - 1;
        if previous.get(index).is_none() || previous.get(index) == choices.get(index) {
            continue;
        }
        repo.reset_task(user_id, i16::from(task))?;
        reset.push(task);
    }
    Ok(reset)
}

/// Mirrors the static catalog's broadcasts and lectures into their tables.
pub fn sync_catalog(repo: &dyn Repository, catalog: &crate::catalog::Catalog) -> Result<(), DbError> {
    for broadcast in &catalog.broadcasts {
        repo.ensure_broadcast(&broadcast.key, &broadcast.title)?;
    }
    for lecture in &catalog.lectures {
        repo.upsert_online_event(lecture)?;
    }
    tracing::info!(
        "Catalog synced: {} broadcasts, {} lectures",
        catalog.broadcasts.len(),
        catalog.lectures.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::roles;

    #[test]
    fn test_grant_and_revoke_role() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        repo.upsert_user(10, Some("anna")).unwrap();

        let user = grant_role(repo, 10, roles::STAFF).unwrap().unwrap();
        assert!(user.is_staff());
        assert!(user.has_role(roles::GUEST));

        let again = grant_role(repo, 10, roles::STAFF).unwrap().unwrap();
        assert_eq!(again.roles.iter().filter(|r| *r == roles::STAFF).count(), 1);

        let user = revoke_role(repo, 10, roles::STAFF).unwrap().unwrap();
        assert!(!user.is_staff());
    }

    #[test]
    fn test_revoking_last_role_falls_back_to_guest() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        repo.upsert_user(11, None).unwrap();

        let user = revoke_role(repo, 11, roles::GUEST).unwrap().unwrap();
        assert_eq!(user.roles, vec![roles::GUEST.to_string()]);
    }

    fn choice(department: &str, position: &str) -> PositionChoice {
        PositionChoice {
            department: department.into(),
            position: position.into(),
        }
    }

    fn form(choices: Vec<PositionChoice>) -> ApplicationForm {
        ApplicationForm {
            full_name: "Анна".into(),
            education: "МГУ".into(),
            phone: "+79991234567".into(),
            email: "a@example.com".into(),
            choices,
            motivation: "Хочу".into(),
            resume: None,
        }
    }

    #[test]
    fn test_reset_changed_tasks_only_touches_moved_priorities() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        let original = vec![choice("media", "smm"), choice("events", "org")];
        repo.submit_application(12, &form(original)).unwrap();
        repo.save_task_submission(12, 1, "smm plan").unwrap();
        repo.save_task_submission(12, 2, "org plan").unwrap();
        repo.update_evaluation(12, &EvaluationPatch::accepted(1, true))
            .unwrap();
        repo.update_evaluation(12, &EvaluationPatch::accepted(2, true))
            .unwrap();
        repo.update_evaluation(12, &EvaluationPatch::task_feedback(2, "ok".into()))
            .unwrap();

        let updated = vec![choice("media", "smm"), choice("events", "host")];
        assert_eq!(reset_changed_tasks(repo, 12, &updated).unwrap(), vec![2]);

        let submissions = repo.find_task_submissions(12).unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].task_number, 1);
        let evaluation = repo.find_evaluation(12).unwrap().unwrap();
        assert!(evaluation.accepted_1);
        assert!(!evaluation.accepted_2);
        assert!(evaluation.task_2_feedback.is_none());
    }

    #[test]
    fn test_reset_changed_tasks_without_application() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let reset = reset_changed_tasks(session.repository(), 13, &[choice("media", "smm")]);
        assert!(reset.unwrap().is_empty());
    }

    #[test]
    fn test_grant_role_unknown_user() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        assert!(grant_role(session.repository(), 404, roles::STAFF)
            .unwrap()
            .is_none());
    }
}
