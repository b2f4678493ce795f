//! Local gateway adapter printing chat traffic to stdout.
//!
//! Stands in for a real chat transport during development and manual play.
//! Message ids are synthesized from a process-local counter and sends
//! complete immediately, so `on_sent` callbacks fire inline.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::gateway::{ChatGateway, ChatId, Keyboard, MessageId, SentCallback, UserId};

/// Gateway that renders every outbound call as a console line.
#[derive(Debug, Default)]
pub struct ConsoleGateway {
    next_id: AtomicI64,
}

impl ConsoleGateway {
    /// Create a console gateway starting message ids at 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

impl ChatGateway for ConsoleGateway {
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
        on_sent: Option<SentCallback>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match keyboard {
            Some(keys) => println!("[chat {chat}] {text}\n    keyboard: {}", keys.join(" | ")),
            None => println!("[chat {chat}] {text}"),
        }
        if let Some(callback) = on_sent {
            callback(id);
        }
    }

    fn edit_message(&self, chat: ChatId, message_id: MessageId, text: String) {
        println!("[chat {chat}] (edit #{message_id}) {text}");
    }

    fn kick_player(&self, chat: ChatId, user: UserId) {
        println!("[chat {chat}] (kick user {user})");
    }
}
