use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::PgConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{Repository, SessionFactory, UnitOfWork};
use crate::db::{DbError, DbPool, PgPooledConnection};
use crate::models::*;
use crate::schema;

/// Opens one Postgres transaction per update.
#[derive(Clone)]
pub struct PgSessionFactory {
    pool: DbPool,
}

impl PgSessionFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SessionFactory for PgSessionFactory {
    fn begin(&self) -> Result<Arc<dyn UnitOfWork>, DbError> {
        Ok(Arc::new(PgSession::begin(&self.pool)?))
    }
}

/// A pooled connection with an open transaction. Rolled back on drop unless
/// committed.
pub struct PgSession {
    conn: Mutex<PgPooledConnection>,
    finished: AtomicBool,
}

impl PgSession {
    pub fn begin(pool: &DbPool) -> Result<Self, DbError> {
        let mut conn = pool.get()?;
        AnsiTransactionManager::begin_transaction(&mut *conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            finished: AtomicBool::new(false),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> QueryResult<T>,
    ) -> Result<T, DbError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| DbError::Poisoned("pg session connection"))?;
        Ok(f(&mut **guard)?)
    }

    fn finish(&self, commit: bool) -> Result<(), DbError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.with_conn(|conn| {
            if commit {
                AnsiTransactionManager::commit_transaction(conn)
            } else {
                AnsiTransactionManager::rollback_transaction(conn)
            }
        })
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            if let Err(e) = self.finish(false) {
                tracing::error!("Failed to roll back abandoned session: {}", e);
            }
        }
    }
}

impl UnitOfWork for PgSession {
    fn repository(&self) -> &dyn Repository {
        self
    }

    fn commit(&self) -> Result<(), DbError> {
        self.finish(true)
    }

    fn rollback(&self) -> Result<(), DbError> {
        self.finish(false)
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl Repository for PgSession {
    fn upsert_user(&self, telegram_id: i64, username: Option<&str>) -> Result<User, DbError> {
        use schema::users::dsl;

        let new_user = NewUser {
            id: telegram_id,
            username,
            is_alive: true,
            roles: vec![roles::GUEST.to_string()],
        };

        self.with_conn(|conn| {
            diesel::insert_into(dsl::users)
                .values(&new_user)
                .on_conflict(dsl::id)
                .do_update()
                .set((
                    dsl::is_alive.eq(true),
                    dsl::username.eq(username),
                    dsl::updated_at.eq(now()),
                ))
                .get_result(conn)
        })
    }

    fn find_user(&self, telegram_id: i64) -> Result<Option<User>, DbError> {
        use schema::users::dsl;

        self.with_conn(|conn| {
            dsl::users
                .filter(dsl::id.eq(telegram_id))
                .first::<User>(conn)
                .optional()
        })
    }

    fn set_user_roles(&self, telegram_id: i64, roles: &[String]) -> Result<Option<User>, DbError> {
        use schema::users::dsl;

        self.with_conn(|conn| {
            diesel::update(dsl::users.filter(dsl::id.eq(telegram_id)))
                .set((dsl::roles.eq(roles), dsl::updated_at.eq(now())))
                .get_result(conn)
                .optional()
        })
    }

    fn set_user_blocked(&self, telegram_id: i64, blocked: bool) -> Result<Option<User>, DbError> {
        use schema::users::dsl;

        self.with_conn(|conn| {
            diesel::update(dsl::users.filter(dsl::id.eq(telegram_id)))
                .set((
                    dsl::is_blocked.eq(blocked),
                    dsl::is_alive.eq(!blocked),
                    dsl::updated_at.eq(now()),
                ))
                .get_result(conn)
                .optional()
        })
    }

    fn find_user_info(&self, user_id: i64) -> Result<Option<UserInfo>, DbError> {
        use schema::user_info::dsl;

        self.with_conn(|conn| {
            dsl::user_info
                .filter(dsl::user_id.eq(user_id))
                .first::<UserInfo>(conn)
                .optional()
        })
    }

    fn update_user_info(&self, user_id: i64, patch: &UserInfoPatch) -> Result<UserInfo, DbError> {
        use schema::user_info::dsl;

        self.with_conn(|conn| {
            diesel::insert_into(dsl::user_info)
                .values(dsl::user_id.eq(user_id))
                .on_conflict_do_nothing()
                .execute(conn)?;

            diesel::update(dsl::user_info.filter(dsl::user_id.eq(user_id)))
                .set((patch, dsl::updated_at.eq(now())))
                .get_result(conn)
        })
    }

    fn find_application(&self, user_id: i64) -> Result<Option<Application>, DbError> {
        use schema::applications::dsl;

        self.with_conn(|conn| {
            dsl::applications
                .filter(dsl::user_id.eq(user_id))
                .first::<Application>(conn)
                .optional()
        })
    }

    fn submit_application(
        &self,
        user_id: i64,
        form: &ApplicationForm,
    ) -> Result<Application, DbError> {
        use schema::applications::dsl;

        let row = ApplicationRow::submitted(user_id, form, now());

        self.with_conn(|conn| {
            diesel::insert_into(dsl::applications)
                .values(&row)
                .on_conflict(dsl::user_id)
                .do_update()
                .set(&row)
                .get_result(conn)
        })
    }

    fn find_task_submissions(&self, user_id: i64) -> Result<Vec<TaskSubmission>, DbError> {
        use schema::task_submissions::dsl;

        self.with_conn(|conn| {
            dsl::task_submissions
                .filter(dsl::user_id.eq(user_id))
                .order(dsl::task_number.asc())
                .load::<TaskSubmission>(conn)
        })
    }

    fn save_task_submission(
        &self,
        user_id: i64,
        task_number: i16,
        content: &str,
    ) -> Result<TaskSubmission, DbError> {
        use schema::task_submissions::dsl;

        let new_submission = NewTaskSubmission {
            user_id,
            task_number,
            content,
        };

        self.with_conn(|conn| {
            diesel::insert_into(dsl::task_submissions)
                .values(&new_submission)
                .on_conflict((dsl::user_id, dsl::task_number))
                .do_update()
                .set((dsl::content.eq(content), dsl::updated_at.eq(now())))
                .get_result(conn)
        })
    }

    fn reset_task(&self, user_id: i64, task_number: i16) -> Result<(), DbError> {
        use schema::evaluated_applications::dsl as eval;
        use schema::task_submissions::dsl;

        self.with_conn(|conn| {
            diesel::delete(
                dsl::task_submissions
                    .filter(dsl::user_id.eq(user_id))
                    .filter(dsl::task_number.eq(task_number)),
            )
            .execute(conn)?;

            let target = eval::evaluated_applications.filter(eval::user_id.eq(user_id));
            let none = None::<String>;
            match task_number {
                1 => diesel::update(target)
                    .set((
                        eval::accepted_1.eq(false),
                        eval::task_1_feedback.eq(none),
                        eval::updated_at.eq(now()),
                    ))
                    .execute(conn)?,
                2 => diesel::update(target)
                    .set((
                        eval::accepted_2.eq(false),
                        eval::task_2_feedback.eq(none),
                        eval::updated_at.eq(now()),
                    ))
                    .execute(conn)?,
                3 => diesel::update(target)
                    .set((
                        eval::accepted_3.eq(false),
                        eval::task_3_feedback.eq(none),
                        eval::updated_at.eq(now()),
                    ))
                    .execute(conn)?,
                _ => 0,
            };
            Ok(())
        })
    }

    fn find_evaluation(&self, user_id: i64) -> Result<Option<Evaluation>, DbError> {
        use schema::evaluated_applications::dsl;

        self.with_conn(|conn| {
            dsl::evaluated_applications
                .filter(dsl::user_id.eq(user_id))
                .first::<Evaluation>(conn)
                .optional()
        })
    }

    fn update_evaluation(
        &self,
        user_id: i64,
        patch: &EvaluationPatch,
    ) -> Result<Evaluation, DbError> {
        use schema::evaluated_applications::dsl;

        self.with_conn(|conn| {
            diesel::insert_into(dsl::evaluated_applications)
                .values(&NewEvaluation { user_id })
                .on_conflict_do_nothing()
                .execute(conn)?;

            diesel::update(dsl::evaluated_applications.filter(dsl::user_id.eq(user_id)))
                .set((patch, dsl::updated_at.eq(now())))
                .get_result(conn)
        })
    }

    fn find_quiz_result(&self, user_id: i64) -> Result<Option<QuizResult>, DbError> {
        use schema::quiz_results::dsl;

        self.with_conn(|conn| {
            dsl::quiz_results
                .filter(dsl::user_id.eq(user_id))
                .first::<QuizResult>(conn)
                .optional()
        })
    }

    fn record_quiz_attempt(
        &self,
        user_id: i64,
        attempt: &QuizAttempt,
    ) -> Result<QuizOutcome, DbError> {
        use schema::quiz_results::dsl;

        self.with_conn(|conn| {
            let existing = dsl::quiz_results
                .filter(dsl::user_id.eq(user_id))
                .for_update()
                .first::<QuizResult>(conn)
                .optional()?;

            match existing {
                None => {
                    let new_result = NewQuizResult {
                        user_id,
                        best_score: attempt.score,
                        total_questions: attempt.total_questions,
                        attempts: 1,
                        name: attempt.name.as_deref(),
                        phone: attempt.phone.as_deref(),
                        email: attempt.email.as_deref(),
                    };
                    diesel::insert_into(dsl::quiz_results)
                        .values(&new_result)
                        .execute(conn)?;
                    Ok(QuizOutcome {
                        best_score: attempt.score,
                        new_record: attempt.score > 0,
                    })
                }
                Some(result) => {
                    let new_record = attempt.score > result.best_score;
                    let best_score = result.best_score.max(attempt.score);
                    diesel::update(dsl::quiz_results.filter(dsl::user_id.eq(user_id)))
                        .set((
                            dsl::best_score.eq(best_score),
                            dsl::total_questions.eq(attempt.total_questions),
                            dsl::attempts.eq(result.attempts + 1),
                            dsl::name.eq(attempt.name.as_deref().or(result.name.as_deref())),
                            dsl::phone.eq(attempt.phone.as_deref().or(result.phone.as_deref())),
                            dsl::email.eq(attempt.email.as_deref().or(result.email.as_deref())),
                            dsl::updated_at.eq(now()),
                        ))
                        .execute(conn)?;
                    Ok(QuizOutcome {
                        best_score,
                        new_record,
                    })
                }
            }
        })
    }

    fn ensure_broadcast(&self, key: &str, title: &str) -> Result<Broadcast, DbError> {
        use schema::broadcasts::dsl;

        self.with_conn(|conn| {
            diesel::insert_into(dsl::broadcasts)
                .values(&NewBroadcast { key, title })
                .on_conflict(dsl::key)
                .do_update()
                .set(dsl::title.eq(title))
                .get_result(conn)
        })
    }

    fn list_broadcasts(&self) -> Result<Vec<Broadcast>, DbError> {
        use schema::broadcasts::dsl;

        self.with_conn(|conn| dsl::broadcasts.order(dsl::id.asc()).load::<Broadcast>(conn))
    }

    fn find_subscriptions(&self, user_id: i64) -> Result<Vec<UserSubscription>, DbError> {
        use schema::user_subscriptions::dsl;

        self.with_conn(|conn| {
            dsl::user_subscriptions
                .filter(dsl::user_id.eq(user_id))
                .load::<UserSubscription>(conn)
        })
    }

    fn subscribe(&self, user_id: i64, broadcast_id: i32) -> Result<UserSubscription, DbError> {
        use schema::user_subscriptions::dsl;

        self.with_conn(|conn| {
            let existing = dsl::user_subscriptions
                .filter(dsl::user_id.eq(user_id))
                .filter(dsl::broadcast_id.eq(broadcast_id))
                .first::<UserSubscription>(conn)
                .optional()?;

            match existing {
                Some(subscription) if subscription.is_active() => Ok(subscription),
                Some(subscription) => diesel::update(
                    dsl::user_subscriptions.filter(dsl::id.eq(subscription.id)),
                )
                .set((
                    dsl::subscribed_at.eq(now()),
                    dsl::unsubscribed_at.eq(None::<DateTime<Utc>>),
                ))
                .get_result(conn),
                None => diesel::insert_into(dsl::user_subscriptions)
                    .values(&NewUserSubscription {
                        user_id,
                        broadcast_id,
                    })
                    .on_conflict((dsl::user_id, dsl::broadcast_id))
                    .do_update()
                    .set(dsl::unsubscribed_at.eq(None::<DateTime<Utc>>))
                    .get_result(conn),
            }
        })
    }

    fn unsubscribe(
        &self,
        user_id: i64,
        broadcast_id: i32,
    ) -> Result<Option<UserSubscription>, DbError> {
        use schema::user_subscriptions::dsl;

        self.with_conn(|conn| {
            diesel::update(
                dsl::user_subscriptions
                    .filter(dsl::user_id.eq(user_id))
                    .filter(dsl::broadcast_id.eq(broadcast_id))
                    .filter(dsl::unsubscribed_at.is_null()),
            )
            .set(dsl::unsubscribed_at.eq(Some(now())))
            .get_result(conn)
            .optional()
        })
    }

    fn upsert_online_event(&self, event: &OnlineEventSpec) -> Result<OnlineEvent, DbError> {
        use schema::online_events::dsl;

        self.with_conn(|conn| {
            diesel::insert_into(dsl::online_events)
                .values(event)
                .on_conflict(dsl::slug)
                .do_update()
                .set(event)
                .get_result(conn)
        })
    }

    fn list_active_events(&self) -> Result<Vec<OnlineEvent>, DbError> {
        use schema::online_events::dsl;

        self.with_conn(|conn| {
            dsl::online_events
                .filter(dsl::is_active.eq(true))
                .order(dsl::starts_at.asc())
                .load::<OnlineEvent>(conn)
        })
    }

    fn find_event(&self, event_id: i32) -> Result<Option<OnlineEvent>, DbError> {
        use schema::online_events::dsl;

        self.with_conn(|conn| {
            dsl::online_events
                .filter(dsl::id.eq(event_id))
                .first::<OnlineEvent>(conn)
                .optional()
        })
    }

    fn find_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError> {
        use schema::online_registrations::dsl;

        self.with_conn(|conn| {
            dsl::online_registrations
                .filter(dsl::user_id.eq(user_id))
                .filter(dsl::event_id.eq(event_id))
                .first::<OnlineRegistration>(conn)
                .optional()
        })
    }

    fn register_for_event(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<OnlineRegistration, DbError> {
        use schema::online_registrations::dsl;

        let active = RegistrationStatus::Active.as_str();

        self.with_conn(|conn| {
            diesel::insert_into(dsl::online_registrations)
                .values(&NewOnlineRegistration {
                    user_id,
                    event_id,
                    status: active,
                })
                .on_conflict((dsl::user_id, dsl::event_id))
                .do_update()
                .set((dsl::status.eq(active), dsl::updated_at.eq(now())))
                .get_result(conn)
        })
    }

    fn cancel_registration(
        &self,
        user_id: i64,
        event_id: i32,
    ) -> Result<Option<OnlineRegistration>, DbError> {
        use schema::online_registrations::dsl;

        self.with_conn(|conn| {
            diesel::update(
                dsl::online_registrations
                    .filter(dsl::user_id.eq(user_id))
                    .filter(dsl::event_id.eq(event_id)),
            )
            .set((
                dsl::status.eq(RegistrationStatus::Cancelled.as_str()),
                dsl::updated_at.eq(now()),
            ))
            .get_result(conn)
            .optional()
        })
    }

    fn count_active_registrations(&self, event_id: i32) -> Result<i64, DbError> {
        use schema::online_registrations::dsl;

        self.with_conn(|conn| {
            dsl::online_registrations
                .filter(dsl::event_id.eq(event_id))
                .filter(dsl::status.eq(RegistrationStatus::Active.as_str()))
                .count()
                .get_result(conn)
        })
    }
}
