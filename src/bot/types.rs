use kbk_bot::admin_lock::LockStore;
use kbk_bot::catalog::Catalog;
use kbk_bot::dialog::{DialogState, FlowContext, FlowError};
use kbk_bot::repository::SessionFactory;
use kbk_bot::session::Session;
use std::collections::HashSet;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{InMemStorage, InMemStorageError};
use teloxide::prelude::*;
use thiserror::Error;

pub type KbkDialogue = Dialogue<DialogState, InMemStorage<DialogState>>;
pub type HandlerResult = Result<(), HandlerError>;

/// Shared dependencies injected into every handler.
pub struct App {
    pub sessions: Arc<dyn SessionFactory>,
    pub lock: Arc<dyn LockStore>,
    pub admins: HashSet<i64>,
    pub catalog: Catalog,
}

impl App {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn flow_context<'a>(
        &'a self,
        session: &'a Session,
        user_id: i64,
        language: &'a str,
    ) -> FlowContext<'a> {
        FlowContext {
            user_id,
            language,
            user: session.user(),
            repo: session.repository(),
            catalog: &self.catalog,
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("dialogue storage error: {0}")]
    Dialogue(#[from] InMemStorageError),
}
