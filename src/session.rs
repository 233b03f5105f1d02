//! One transactional unit of work per incoming update.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use crate::models::User;
use crate::repository::{Repository, SessionFactory, UnitOfWork};
use crate::update::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Committed,
    RolledBack,
    /// The work ran without a database handle.
    Detached,
}

/// Handed to the update handler. Without a unit of work the handler runs
/// in degraded mode and flows answer with "unavailable" screens.
pub struct Session {
    uow: Option<Arc<dyn UnitOfWork>>,
    user: Option<User>,
}

impl Session {
    pub fn detached() -> Self {
        Session {
            uow: None,
            user: None,
        }
    }

    pub fn repository(&self) -> Option<&dyn Repository> {
        self.uow.as_ref().map(|uow| uow.repository())
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.uow.is_some()
    }
}

/// Opens a unit of work, registers the acting user and runs `work` inside it.
///
/// Commits when `work` succeeds and rolls back when it fails. Errors are
/// logged and absorbed so one bad update never reaches the dispatcher.
pub async fn run_in_session<F, Fut, E>(
    factory: &dyn SessionFactory,
    actor: Option<&Actor>,
    work: F,
) -> SessionOutcome
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let Some(actor) = actor else {
        tracing::warn!("Update without a sender, handling it without database");
        run_detached(work, None).await;
        return SessionOutcome::Detached;
    };

    let uow = match factory.begin() {
        Ok(uow) => uow,
        Err(e) => {
            tracing::error!("Failed to open database session for {}: {}", actor.id, e);
            run_detached(work, Some(actor.id)).await;
            return SessionOutcome::Detached;
        }
    };

    let user = match uow
        .repository()
        .upsert_user(actor.id, actor.username.as_deref())
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to register user {}: {}", actor.id, e);
            if let Err(e) = uow.rollback() {
                tracing::error!("Rollback failed for {}: {}", actor.id, e);
            }
            run_detached(work, Some(actor.id)).await;
            return SessionOutcome::Detached;
        }
    };

    let session = Session {
        uow: Some(uow.clone()),
        user: Some(user),
    };

    match work(session).await {
        Ok(()) => match uow.commit() {
            Ok(()) => SessionOutcome::Committed,
            Err(e) => {
                tracing::error!("Commit failed for {}: {}", actor.id, e);
                SessionOutcome::RolledBack
            }
        },
        Err(e) => {
            tracing::error!("Update handling failed for {}: {}", actor.id, e);
            if let Err(e) = uow.rollback() {
                tracing::error!("Rollback failed for {}: {}", actor.id, e);
            }
            SessionOutcome::RolledBack
        }
    }
}

async fn run_detached<F, Fut, E>(work: F, user_id: Option<i64>)
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    if let Err(e) = work(Session::detached()).await {
        tracing::error!("Update handling failed for {:?} (no database): {}", user_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::roles;
    use crate::repository::MemoryDatabase;

    fn actor(id: i64) -> Actor {
        Actor {
            id,
            username: Some("tester".into()),
            language_code: Some("ru".into()),
        }
    }

    #[tokio::test]
    async fn test_first_update_creates_guest() {
        let db = MemoryDatabase::new();
        let outcome = run_in_session(&db, Some(&actor(7)), |session| async move {
            assert!(session.is_attached());
            assert_eq!(session.user().map(|u| u.id), Some(7));
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(outcome, SessionOutcome::Committed);
        let tables = db.tables();
        assert_eq!(tables.users[&7].roles, vec![roles::GUEST.to_string()]);
        assert!(tables.users[&7].is_alive);
    }

    #[tokio::test]
    async fn test_failed_work_rolls_back() {
        let db = MemoryDatabase::new();
        let outcome = run_in_session(&db, Some(&actor(8)), |session| async move {
            let repo = session.repository().ok_or("no repo")?;
            repo.update_user_info(8, &Default::default())
                .map_err(|e| e.to_string())?;
            Err::<(), String>("boom".to_string())
        })
        .await;

        assert_eq!(outcome, SessionOutcome::RolledBack);
        let tables = db.tables();
        assert!(tables.users.is_empty());
        assert!(tables.user_info.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sender_runs_detached() {
        let db = MemoryDatabase::new();
        let outcome = run_in_session(&db, None, |session| async move {
            assert!(session.repository().is_none());
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(outcome, SessionOutcome::Detached);
        assert!(db.tables().users.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_to_detached() {
        let db = MemoryDatabase::new();
        db.set_fail_writes(true);
        let outcome = run_in_session(&db, Some(&actor(9)), |session| async move {
            assert!(!session.is_attached());
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(outcome, SessionOutcome::Detached);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_first_updates_create_one_user() {
        let db = MemoryDatabase::new();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    let a = actor(42);
                    run_in_session(&db, Some(&a), |_session| async {
                        Ok::<(), String>(())
                    })
                    .await
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), SessionOutcome::Committed);
        }

        let tables = db.tables();
        assert_eq!(tables.users.len(), 1);
        assert_eq!(tables.users[&42].roles, vec![roles::GUEST.to_string()]);
    }
}
