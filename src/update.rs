//! Uniform view over the update kinds the bot reacts to.

use teloxide::types::{ChatMemberKind, ChatMemberUpdated, Update, UpdateKind, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            id: user.id.0 as i64,
            username: user.username.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    Message { actor: Option<Actor>, chat_id: i64 },
    Callback { actor: Actor, query_id: String },
    Inline { actor: Actor, query_id: String },
    /// The user blocked (`blocked == true`) or restarted the bot.
    MemberStatus { actor: Actor, blocked: bool },
    Other,
}

/// `true` when a my_chat_member update means the user stopped or blocked the bot.
pub fn is_blocking(member: &ChatMemberUpdated) -> bool {
    matches!(
        member.new_chat_member.kind,
        ChatMemberKind::Banned(_) | ChatMemberKind::Left
    )
}

impl InboundUpdate {
    pub fn from_update(update: &Update) -> Self {
        match &update.kind {
            UpdateKind::Message(msg) => InboundUpdate::Message {
                actor: msg.from().map(Actor::from),
                chat_id: msg.chat.id.0,
            },
            UpdateKind::CallbackQuery(q) => InboundUpdate::Callback {
                actor: Actor::from(&q.from),
                query_id: q.id.clone(),
            },
            UpdateKind::InlineQuery(q) => InboundUpdate::Inline {
                actor: Actor::from(&q.from),
                query_id: q.id.clone(),
            },
            UpdateKind::MyChatMember(member) => InboundUpdate::MemberStatus {
                actor: Actor::from(&member.from),
                blocked: is_blocking(member),
            },
            _ => InboundUpdate::Other,
        }
    }

    pub fn acting_user(&self) -> Option<&Actor> {
        match self {
            InboundUpdate::Message { actor, .. } => actor.as_ref(),
            InboundUpdate::Callback { actor, .. }
            | InboundUpdate::Inline { actor, .. }
            | InboundUpdate::MemberStatus { actor, .. } => Some(actor),
            InboundUpdate::Other => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            InboundUpdate::Message { .. } => "message",
            InboundUpdate::Callback { .. } => "callback",
            InboundUpdate::Inline { .. } => "inline",
            InboundUpdate::MemberStatus { .. } => "my_chat_member",
            InboundUpdate::Other => "other",
        }
    }
}
