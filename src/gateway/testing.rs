//! Recording gateway double shared by session and registry tests.

use std::sync::{
    Mutex,
    atomic::{AtomicI64, Ordering},
};

use crate::gateway::{ChatGateway, ChatId, Keyboard, MessageId, SentCallback, UserId};

/// One captured `send_message` call.
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Target chat.
    pub chat: ChatId,
    /// Message text.
    pub text: String,
    /// Attached keyboard, if any.
    pub keyboard: Option<Keyboard>,
    /// Id assigned to the message.
    pub message_id: MessageId,
}

/// Gateway that records traffic and acknowledges sends inline.
#[derive(Default)]
pub struct RecordingGateway {
    next_id: AtomicI64,
    /// Captured sends, in call order.
    pub sent: Mutex<Vec<SentMessage>>,
    /// Captured edits as `(chat, message_id, text)`.
    pub edits: Mutex<Vec<(ChatId, MessageId, String)>>,
    /// Captured kicks as `(chat, user)`.
    pub kicks: Mutex<Vec<(ChatId, UserId)>>,
}

impl RecordingGateway {
    /// Fresh recorder with message ids starting at 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Text of the last sent message, if any.
    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|m| m.text.clone())
    }

    /// All sent texts, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}

impl ChatGateway for RecordingGateway {
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
        on_sent: Option<SentCallback>,
    ) {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().unwrap().push(SentMessage {
            chat,
            text,
            keyboard,
            message_id,
        });
        if let Some(callback) = on_sent {
            callback(message_id);
        }
    }

    fn edit_message(&self, chat: ChatId, message_id: MessageId, text: String) {
        self.edits.lock().unwrap().push((chat, message_id, text));
    }

    fn kick_player(&self, chat: ChatId, user: UserId) {
        self.kicks.lock().unwrap().push((chat, user));
    }
}
