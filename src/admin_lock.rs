//! Global maintenance switch. While it is on, only admins reach the handlers.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::update::InboundUpdate;

pub const LOCK_KEY: &str = "kbk:admin_lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait LockStore: Send + Sync {
    async fn is_locked(&self) -> Result<bool, LockError>;
    async fn set_locked(&self, locked: bool) -> Result<(), LockError>;
}

/// Lock flag shared by every bot instance through one Redis key.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisLockStore {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn is_locked(&self) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(LOCK_KEY).await?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn set_locked(&self, locked: bool) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let value = if locked { "1" } else { "0" };
        conn.set::<_, _, ()>(LOCK_KEY, value).await?;
        Ok(())
    }
}

/// Process-local flag, used when no Redis is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    locked: AtomicBool,
}

impl MemoryLockStore {
    pub fn new(locked: bool) -> Self {
        Self {
            locked: AtomicBool::new(locked),
        }
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn is_locked(&self) -> Result<bool, LockError> {
        Ok(self.locked.load(Ordering::SeqCst))
    }

    async fn set_locked(&self, locked: bool) -> Result<(), LockError> {
        self.locked.store(locked, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectStyle {
    /// Popup answer to a callback query.
    Alert,
    Reply,
    EmptyInlineAnswer,
    /// Nobody to answer, e.g. updates without a sender.
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Reject(RejectStyle),
}

pub async fn check_gate(
    store: &dyn LockStore,
    update: &InboundUpdate,
    admins: &HashSet<i64>,
) -> GateDecision {
    let locked = match store.is_locked().await {
        Ok(locked) => locked,
        Err(e) => {
            tracing::warn!("Failed to read admin lock, treating as unlocked: {}", e);
            false
        }
    };
    if !locked {
        return GateDecision::Pass;
    }

    match update.acting_user() {
        Some(actor) if admins.contains(&actor.id) => GateDecision::Pass,
        // Block tracking has no visible reply and must keep working while locked.
        Some(_) if matches!(update, InboundUpdate::MemberStatus { .. }) => GateDecision::Pass,
        Some(actor) => {
            tracing::debug!(
                "Rejecting {} from {} while locked",
                update.kind_name(),
                actor.id
            );
            GateDecision::Reject(match update {
                InboundUpdate::Callback { .. } => RejectStyle::Alert,
                InboundUpdate::Inline { .. } => RejectStyle::EmptyInlineAnswer,
                InboundUpdate::Message { .. } => RejectStyle::Reply,
                InboundUpdate::MemberStatus { .. } | InboundUpdate::Other => RejectStyle::Silent,
            })
        }
        None => GateDecision::Reject(RejectStyle::Silent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::Actor;

    struct BrokenStore;

    #[async_trait]
    impl LockStore for BrokenStore {
        async fn is_locked(&self) -> Result<bool, LockError> {
            Err(LockError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))))
        }

        async fn set_locked(&self, _locked: bool) -> Result<(), LockError> {
            Ok(())
        }
    }

    fn callback_from(id: i64) -> InboundUpdate {
        InboundUpdate::Callback {
            actor: Actor {
                id,
                username: None,
                language_code: None,
            },
            query_id: "1".into(),
        }
    }

    fn admins() -> HashSet<i64> {
        HashSet::from([1])
    }

    #[tokio::test]
    async fn test_unlocked_passes_everyone() {
        let store = MemoryLockStore::new(false);
        assert_eq!(
            check_gate(&store, &callback_from(2), &admins()).await,
            GateDecision::Pass
        );
    }

    #[tokio::test]
    async fn test_locked_rejects_non_admin_callback_with_alert() {
        let store = MemoryLockStore::new(true);
        assert_eq!(
            check_gate(&store, &callback_from(2), &admins()).await,
            GateDecision::Reject(RejectStyle::Alert)
        );
        assert_eq!(
            check_gate(&store, &callback_from(1), &admins()).await,
            GateDecision::Pass
        );
    }

    #[tokio::test]
    async fn test_locked_message_gets_reply_style() {
        let store = MemoryLockStore::new(true);
        let update = InboundUpdate::Message {
            actor: Some(Actor {
                id: 5,
                username: None,
                language_code: None,
            }),
            chat_id: 5,
        };
        assert_eq!(
            check_gate(&store, &update, &admins()).await,
            GateDecision::Reject(RejectStyle::Reply)
        );

        let anonymous = InboundUpdate::Message {
            actor: None,
            chat_id: -100,
        };
        assert_eq!(
            check_gate(&store, &anonymous, &admins()).await,
            GateDecision::Reject(RejectStyle::Silent)
        );
    }

    #[tokio::test]
    async fn test_member_status_passes_while_locked() {
        let store = MemoryLockStore::new(true);
        let update = InboundUpdate::MemberStatus {
            actor: Actor {
                id: 6,
                username: None,
                language_code: None,
            },
            blocked: true,
        };
        assert_eq!(
            check_gate(&store, &update, &admins()).await,
            GateDecision::Pass
        );
    }

    #[tokio::test]
    async fn test_toggle_is_idempotent() {
        let store = MemoryLockStore::default();
        store.set_locked(true).await.unwrap();
        store.set_locked(true).await.unwrap();
        assert!(store.is_locked().await.unwrap());
        store.set_locked(false).await.unwrap();
        assert!(!store.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        assert_eq!(
            check_gate(&BrokenStore, &callback_from(2), &admins()).await,
            GateDecision::Pass
        );
    }
}
