//! In-process storage with the same contract as the Postgres repository.
//!
//! Each session works on a private copy of the tables taken at `begin`.
//! `commit` publishes the rows the session changed, `rollback` drops them.
//! Rows are keyed by their natural keys so uniqueness holds by construction.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Repository, SessionFactory, UnitOfWork};
use crate::db::DbError;
use crate::models::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub users: BTreeMap<i64, User>,
    pub user_info: BTreeMap<i64, UserInfo>,
    pub applications: BTreeMap<i64, Application>,
    pub task_submissions: BTreeMap<(i64, i16), TaskSubmission>,
    pub evaluations: BTreeMap<i64, Evaluation>,
    pub quiz_results: BTreeMap<i64, QuizResult>,
    pub broadcasts: BTreeMap<String, Broadcast>,
    pub subscriptions: BTreeMap<(i64, i32), UserSubscription>,
    pub events: BTreeMap<String, OnlineEvent>,
    pub registrations: BTreeMap<(i64, i32), OnlineRegistration>,
}

fn merge_changed<K: Ord + Clone, V: Clone + PartialEq>(
    shared: &mut BTreeMap<K, V>,
    base: &BTreeMap<K, V>,
    working: &BTreeMap<K, V>,
) {
    for (key, row) in working {
        if base.get(key) != Some(row) {
            shared.insert(key.clone(), row.clone());
        }
    }
}

impl Tables {
    fn publish(&mut self, base: &Tables, working: &Tables) {
        merge_changed(&mut self.users, &base.users, &working.users);
        merge_changed(&mut self.user_info, &base.user_info, &working.user_info);
        merge_changed(&mut self.applications, &base.applications, &working.applications);
        merge_changed(
            &mut self.task_submissions,
            &base.task_submissions,
            &working.task_submissions,
        );
        merge_changed(&mut self.evaluations, &base.evaluations, &working.evaluations);
        merge_changed(&mut self.quiz_results, &base.quiz_results, &working.quiz_results);
        merge_changed(&mut self.broadcasts, &base.broadcasts, &working.broadcasts);
        merge_changed(&mut self.subscriptions, &base.subscriptions, &working.subscriptions);
        merge_changed(&mut self.events, &base.events, &working.events);
        merge_changed(&mut self.registrations, &base.registrations, &working.registrations);
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    next_id: Arc<AtomicI32>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            next_id: Arc::new(AtomicI32::new(1)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Committed state.
    pub fn tables(&self) -> Tables {
        match self.tables.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Makes every subsequent write fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn session(&self) -> MemorySession {
        let base = self.tables();
        MemorySession {
            db: self.clone(),
            working: Mutex::new(base.clone()),
            base,
            finished: AtomicBool::new(false),
        }
    }
}

impl SessionFactory for MemoryDatabase {
    fn begin(&self) -> Result<Arc<dyn UnitOfWork>, DbError> {
        Ok(Arc::new(self.session()))
    }
}

pub struct MemorySession {
    db: MemoryDatabase,
    base: Tables,
    working: Mutex<Tables>,
    finished: AtomicBool,
}

impl MemorySession {
    fn read(&self) -> Result<MutexGuard<'_, Tables>, DbError> {
        self.working
            .lock()
            .map_err(|_| DbError::Poisoned("memory session tables"))
    }

    fn write(&self) -> Result<MutexGuard<'_, Tables>, DbError> {
        if self.db.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::DieselError(
                diesel::result::Error::BrokenTransactionManager,
            ));
        }
        self.read()
    }

    fn next_id(&self) -> i32 {
        self.db.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl UnitOfWork for MemorySession {
    fn repository(&self) -> &dyn Repository {
        self
    }

    fn commit(&self) -> Result<(), DbError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let working = self.read()?.clone();
        let mut shared = self
            .db
            .tables
            .lock()
            .map_err(|_| DbError::Poisoned("memory database tables"))?;
        shared.publish(&self.base, &working);
        Ok(())
    }

    fn rollback(&self) -> Result<(), DbError> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Repository for MemorySession {
    fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<User, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let user = tables
            .users
            .entry(telegram_id)
            .and_modify(|user| {
                user.is_alive = true;
                user.username = username.map(str::to_string);
                user.updated_at = now;
            })
            .or_insert_with(|| User {
                id: telegram_id,
                username: username.map(str::to_string),
                is_alive: true,
                is_blocked: false,
                roles: vec![roles::GUEST.to_string()],
                created_at: now,
                updated_at: now,
            });
        Ok(user.clone())
    }

    fn find_user(&self, telegram_id: i64) -> Result<Option<User>, DbError> {
        Ok(self.read()?.users.get(&telegram_id).cloned())
    }

    fn set_user_roles(&self, telegram_id: i64, roles: &[String]) -> Result<Option<User>, DbError> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(&telegram_id).map(|user| {
            user.roles = roles.to_vec();
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    fn set_user_blocked(&self, telegram_id: i64, blocked: bool) -> Result<Option<User>, DbError> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(&telegram_id).map(|user| {
            user.is_blocked = blocked;
            user.is_alive = !blocked;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    fn find_user_info(&self, user_id: i64) -> Result<Option<UserInfo>, DbError> {
        Ok(self.read()?.user_info.get(&user_id).cloned())
    }

    fn update_user_info(&self, user_id: i64, patch: &UserInfoPatch) -> Result<UserInfo, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let info = tables.user_info.entry(user_id).or_insert_with(|| UserInfo {
            user_id,
            full_name: None,
            phone: None,
            email: None,
            education: None,
            updated_at: now,
        });
        if let Some(v) = &patch.full_name {
            info.full_name = Some(v.clone());
        }
        if let Some(v) = &patch.phone {
            info.phone = Some(v.clone());
        }
        if let Some(v) = &patch.email {
            info.email = Some(v.clone());
        }
        if let Some(v) = &patch.education {
            info.education = Some(v.clone());
        }
        info.updated_at = now;
        Ok(info.clone())
    }

    fn find_application(&self, user_id: i64) -> Result<Option<Application>, DbError> {
        Ok(self.read()?.applications.get(&user_id).cloned())
    }

    fn submit_application(
        &self,
        user_id: i64,
        form: &ApplicationForm,
    ) -> Result<Application, DbError> {
        let now = Utc::now();
        let row = ApplicationRow::submitted(user_id, form, now);
        let mut tables = self.write()?;
        let existing = tables.applications.get(&user_id).cloned();
        let application = Application {
            id: existing.as_ref().map(|a| a.id).unwrap_or_else(|| self.next_id()),
            user_id,
            full_name: row.full_name.to_string(),
            education: row.education.to_string(),
            phone: row.phone.to_string(),
            email: row.email.to_string(),
            department_1: row.department_1.to_string(),
            position_1: row.position_1.to_string(),
            department_2: row.department_2.map(str::to_string),
            position_2: row.position_2.map(str::to_string),
            department_3: row.department_3.map(str::to_string),
            position_3: row.position_3.map(str::to_string),
            motivation: row.motivation.to_string(),
            resume: row.resume.map(str::to_string),
            status: row.status.to_string(),
            created_at: existing.as_ref().map(|a| a.created_at).unwrap_or(now),
            updated_at: now,
            submitted_at: row.submitted_at,
        };
        tables.applications.insert(user_id, application.clone());
        Ok(application)
    }

    fn find_task_submissions(&self, user_id: i64) -> Result<Vec<TaskSubmission>, DbError> {
        Ok(self
            .read()?
            .task_submissions
            .range((user_id, i16::MIN)..=(user_id, i16::MAX))
            .map(|(_, submission)| submission.clone())
            .collect())
    }

    fn save_task_submission(
        &self,
        user_id: i64,
        task_number: i16,
        content: &str,
    ) -> Result<TaskSubmission, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let id = match tables.task_submissions.get(&(user_id, task_number)) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let submission = tables
            .task_submissions
            .entry((user_id, task_number))
            .and_modify(|s| {
                s.content = content.to_string();
                s.updated_at = now;
            })
            .or_insert_with(|| TaskSubmission {
                id,
                user_id,
                task_number,
                content: content.to_string(),
                submitted_at: now,
                updated_at: now,
            });
        Ok(submission.clone())
    }

    fn reset_task(&self, user_id: i64, task_number: i16) -> Result<(), DbError> {
        let mut tables = self.write()?;
        tables.task_submissions.remove(&(user_id, task_number));
        if let Some(evaluation) = tables.evaluations.get_mut(&user_id) {
            evaluation.clear_task(task_number as u8);
            evaluation.updated_at = Utc::now();
        }
        Ok(())
    }

    fn find_evaluation(&self, user_id: i64) -> Result<Option<Evaluation>, DbError> {
        Ok(self.read()?.evaluations.get(&user_id).cloned())
    }

    fn update_evaluation(
        &self,
        user_id: i64,
        patch: &EvaluationPatch,
    ) -> Result<Evaluation, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let evaluation = tables.evaluations.entry(user_id).or_insert_with(|| Evaluation {
            user_id,
            accepted_1: false,
            accepted_2: false,
            accepted_3: false,
            task_1_feedback: None,
            task_2_feedback: None,
            task_3_feedback: None,
            interview_approved: false,
            interview_feedback: None,
            created_at: now,
            updated_at: now,
        });
        patch.apply_to(evaluation);
        evaluation.updated_at = now;
        Ok(evaluation.clone())
    }

    fn find_quiz_result(&self, user_id: i64) -> Result<Option<QuizResult>, DbError> {
        Ok(self.read()?.quiz_results.get(&user_id).cloned())
    }

    fn record_quiz_attempt(
        &self,
        user_id: i64,
        attempt: &QuizAttempt,
    ) -> Result<QuizOutcome, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();

        match tables.quiz_results.get_mut(&user_id) {
            None => {
                tables.quiz_results.insert(
                    user_id,
                    QuizResult {
                        user_id,
                        best_score: attempt.score,
                        total_questions: attempt.total_questions,
                        attempts: 1,
                        name: attempt.name.clone(),
                        phone: attempt.phone.clone(),
                        email: attempt.email.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(QuizOutcome {
                    best_score: attempt.score,
                    new_record: attempt.score > 0,
                })
            }
            Some(result) => {
                let new_record = attempt.score > result.best_score;
                result.best_score = result.best_score.max(attempt.score);
                result.total_questions = attempt.total_questions;
                result.attempts += 1;
                if attempt.name.is_some() {
                    result.name = attempt.name.clone();
                }
                if attempt.phone.is_some() {
                    result.phone = attempt.phone.clone();
                }
                if attempt.email.is_some() {
                    result.email = attempt.email.clone();
                }
                result.updated_at = now;
                Ok(QuizOutcome {
                    best_score: result.best_score,
                    new_record,
                })
            }
        }
    }

    fn ensure_broadcast(&self, key: &str, title: &str) -> Result<Broadcast, DbError> {
        let mut tables = self.write()?;
        let id = match tables.broadcasts.get(key) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let broadcast = tables
            .broadcasts
            .entry(key.to_string())
            .and_modify(|b| b.title = title.to_string())
            .or_insert_with(|| Broadcast {
                id,
                key: key.to_string(),
                title: title.to_string(),
                created_at: Utc::now(),
            });
        Ok(broadcast.clone())
    }

    fn list_broadcasts(&self) -> Result<Vec<Broadcast>, DbError> {
        let mut broadcasts: Vec<Broadcast> = self.read()?.broadcasts.values().cloned().collect();
        broadcasts.sort_by_key(|b| b.id);
        Ok(broadcasts)
    }

    fn find_subscriptions(&self, user_id: i64) -> Result<Vec<UserSubscription>, DbError> {
        Ok(self
            .read()?
            .subscriptions
            .range((user_id, i32::MIN)..=(user_id, i32::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn subscribe(&self, user_id: i64, broadcast_id: i32) -> Result<UserSubscription, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let id = match tables.subscriptions.get(&(user_id, broadcast_id)) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let subscription = tables
            .subscriptions
            .entry((user_id, broadcast_id))
            .and_modify(|s| {
                if !s.is_active() {
                    s.subscribed_at = now;
                    s.unsubscribed_at = None;
                }
            })
            .or_insert_with(|| UserSubscription {
                id,
                user_id,
                broadcast_id,
                subscribed_at: now,
                unsubscribed_at: None,
            });
        Ok(subscription.clone())
    }

    fn unsubscribe(
        &self,
        user_id: i64,
        broadcast_id: i32,
    ) -> Result<Option<UserSubscription>, DbError> {
        let mut tables = self.write()?;
        Ok(tables
            .subscriptions
            .get_mut(&(user_id, broadcast_id))
            .filter(|s| s.is_active())
            .map(|s| {
                s.unsubscribed_at = Some(Utc::now());
                s.clone()
            }))
    }

    fn upsert_online_event(&self, event: &OnlineEventSpec) -> Result<OnlineEvent, DbError> {
        let mut tables = self.write()?;
        let (id, created_at) = match tables.events.get(&event.slug) {
            Some(existing) => (existing.id, existing.created_at),
            None => (self.next_id(), Utc::now()),
        };
        let row = OnlineEvent {
            id,
            slug: event.slug.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            link: event.link.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            is_active: event.is_active,
            created_at,
        };
        tables.events.insert(event.slug.clone(), row.clone());
        Ok(row)
    }

    fn list_active_events(&self) -> Result<Vec<OnlineEvent>, DbError> {
        let mut events: Vec<OnlineEvent> = self
            .read()?
            .events
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    fn find_event(&self, event_id: i32) -> Result<Option<OnlineEvent>, DbError> {
        Ok(self
            .read()?
            .events
            .values()
            .find(|e| e.id == event_id)
            .cloned())
    }

    fn find_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError> {
        Ok(self.read()?.registrations.get(&(user_id, event_id)).cloned())
    }

    fn register_for_event(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<OnlineRegistration, DbError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        let id = match tables.registrations.get(&(user_id, event_id)) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let registration = tables
            .registrations
            .entry((user_id, event_id))
            .and_modify(|r| {
                r.status = RegistrationStatus::Active.as_str().to_string();
                r.updated_at = now;
            })
            .or_insert_with(|| OnlineRegistration {
                id,
                user_id,
                event_id,
                status: RegistrationStatus::Active.as_str().to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(registration.clone())
    }

    fn cancel_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError> {
        let mut tables = self.write()?;
        Ok(tables.registrations.get_mut(&(user_id, event_id)).map(|r| {
            r.status = RegistrationStatus::Cancelled.as_str().to_string();
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    fn count_active_registrations(&self, event_id: i32) -> Result<i64, DbError> {
        Ok(self
            .read()?
            .registrations
            .values()
            .filter(|r| r.event_id == event_id && r.is_registered())
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::thread;

    fn lecture(slug: &str) -> OnlineEventSpec {
        let starts_at = Utc::now() + Duration::days(3);
        OnlineEventSpec {
            slug: slug.to_string(),
            title: "Как устроен КБК".to_string(),
            description: String::new(),
            link: Some("https://example.com/live".to_string()),
            starts_at,
            ends_at: starts_at + Duration::hours(1),
            is_active: true,
        }
    }

    #[test]
    fn test_concurrent_first_contact_creates_one_user() {
        let db = MemoryDatabase::new();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || {
                    let session = db.begin().unwrap();
                    session.repository().upsert_user(42, Some("new_user")).unwrap();
                    session.commit().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tables = db.tables();
        assert_eq!(tables.users.len(), 1);
        assert_eq!(tables.users[&42].roles, vec![roles::GUEST.to_string()]);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        session.repository().upsert_user(1, None).unwrap();
        session.rollback().unwrap();

        assert!(db.tables().users.is_empty());
    }

    #[test]
    fn test_resubscribe_reuses_row() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        let news = repo.ensure_broadcast("news", "Новости").unwrap();

        let first = repo.subscribe(5, news.id).unwrap();
        let stopped = repo.unsubscribe(5, news.id).unwrap().unwrap();
        assert_eq!(stopped.subscribed_at, first.subscribed_at);
        assert!(stopped.unsubscribed_at.is_some());

        let again = repo.subscribe(5, news.id).unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.is_active());
        assert_eq!(repo.find_subscriptions(5).unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_inactive_is_noop() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        let news = repo.ensure_broadcast("news", "Новости").unwrap();

        assert!(repo.unsubscribe(5, news.id).unwrap().is_none());
    }

    #[test]
    fn test_register_twice_keeps_single_row() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        let event = repo.upsert_online_event(&lecture("intro")).unwrap();

        let first = repo.register_for_event(9, event.id).unwrap();
        let second = repo.register_for_event(9, event.id).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(repo.count_active_registrations(event.id).unwrap(), 1);

        let cancelled = repo.cancel_registration(9, event.id).unwrap().unwrap();
        assert!(!cancelled.is_registered());
        assert_eq!(repo.count_active_registrations(event.id).unwrap(), 0);

        let back = repo.register_for_event(9, event.id).unwrap();
        assert_eq!(back.id, first.id);
        assert!(back.is_registered());
    }

    #[test]
    fn test_best_score_is_monotonic() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();
        let attempt = |score| QuizAttempt {
            score,
            total_questions: 5,
            name: None,
            phone: None,
            email: None,
        };

        let first = repo.record_quiz_attempt(3, &attempt(3)).unwrap();
        assert_eq!(first.best_score, 3);

        let lower = repo.record_quiz_attempt(3, &attempt(2)).unwrap();
        assert_eq!(lower.best_score, 3);
        assert!(!lower.new_record);

        let equal = repo.record_quiz_attempt(3, &attempt(3)).unwrap();
        assert!(!equal.new_record);

        let higher = repo.record_quiz_attempt(3, &attempt(5)).unwrap();
        assert_eq!(higher.best_score, 5);
        assert!(higher.new_record);

        let stored = repo.find_quiz_result(3).unwrap().unwrap();
        assert_eq!(stored.best_score, 5);
        assert_eq!(stored.attempts, 4);
    }

    #[test]
    fn test_evaluation_partial_update() {
        let db = MemoryDatabase::new();
        let session = db.begin().unwrap();
        let repo = session.repository();

        repo.update_evaluation(4, &EvaluationPatch::task_feedback(1, "Слабо".into()))
            .unwrap();
        let evaluation = repo
            .update_evaluation(4, &EvaluationPatch::accepted(3, true))
            .unwrap();

        assert_eq!(evaluation.task_1_feedback.as_deref(), Some("Слабо"));
        assert!(evaluation.accepted_3);
        assert!(!evaluation.accepted_1);
    }

    #[test]
    fn test_failing_writes_surface_errors() {
        let db = MemoryDatabase::new();
        db.set_fail_writes(true);
        let session = db.begin().unwrap();

        assert!(session.repository().upsert_user(1, None).is_err());
        assert!(session.repository().find_user(1).unwrap().is_none());
    }
}
