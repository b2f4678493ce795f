//! Game-session core: one actor-like task per running game.
//!
//! Inbound chat events and the periodic timer tick are funnelled into a
//! single strictly-ordered inbox per session, so all state mutation happens
//! on one logical thread. Sessions are fully independent of each other.

pub mod actor;
pub mod engine;
pub mod phase;

use std::{collections::HashMap, sync::Arc, time::Duration};

use indexmap::IndexMap;

pub use actor::SessionHandle;
pub use engine::GameSession;
pub use phase::Phase;

use crate::{
    config::GameTimers,
    data::TopicSet,
    gateway::{ChatId, MessageId, UserId},
};

/// Inbound event processed on the session's sequential context.
#[derive(Debug)]
pub enum SessionEvent {
    /// A text message posted to the game chat.
    Text {
        /// Sender id.
        from: UserId,
        /// Sender display name at the time of the message.
        name: String,
        /// Message text.
        text: String,
    },
    /// A user became a member of the game chat.
    Joined {
        /// The joining user.
        user: UserId,
    },
    /// Gateway confirmation that an outbound message was sent. Re-enters the
    /// session context to arm the deadline that the send carried.
    Delivered {
        /// Id assigned to the sent message.
        message_id: MessageId,
        /// Deadline delay to arm, relative to the moment of delivery.
        arm: Option<Duration>,
        /// What the sent message was, for bookkeeping.
        record: SentRecord,
    },
}

/// Bookkeeping tag attached to a delivery confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentRecord {
    /// Ordinary message; nothing to remember.
    Plain,
    /// Verdict/reveal message whose id is kept for later corrections.
    Verdict,
}

/// A registered player: id plus display name.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    /// Chat user id.
    pub id: UserId,
    /// Display name used in messages and rating records.
    pub name: String,
}

/// Everything needed to start one game session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Game room chat the session plays in.
    pub chat_id: ChatId,
    /// Chat where the game was scheduled; receives the final summary.
    pub origin_chat: ChatId,
    /// Trivia package the session walks through.
    pub set: Arc<TopicSet>,
    /// 0-based indices into `set.topics`, in play order.
    pub topics: Vec<usize>,
    /// Registered players, in registration order.
    pub players: Vec<PlayerInfo>,
    /// Judge-arbitrated tournament variant.
    pub tournament: bool,
    /// Timer durations driving the state machine.
    pub timers: GameTimers,
}

/// Final report a session emits when it reaches its terminal state.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Game room chat the session played in.
    pub chat_id: ChatId,
    /// Chat where the game was scheduled.
    pub origin_chat: ChatId,
    /// Whether the game was aborted (`/abort`); aborted games skip the
    /// rating update.
    pub aborted: bool,
    /// Final score per player, in registration order.
    pub scores: IndexMap<UserId, i32>,
    /// Display names for every player in `scores`.
    pub names: HashMap<UserId, String>,
    /// Pre-rendered score board for the summary message.
    pub score_board: String,
}
