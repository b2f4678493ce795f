//! Outbound messaging gateway consumed by the session core.
//!
//! The gateway owns transport concerns (rate limiting, retries, message
//! splitting); the core only issues fire-and-forget calls. Completion of a
//! send is reported through an optional callback that collaborators use to
//! re-enter their own execution context.

pub mod console;
#[cfg(test)]
pub mod testing;

/// Identifier of a group chat (room).
pub type ChatId = i64;
/// Identifier of a chat user.
pub type UserId = i64;
/// Identifier of a sent chat message, usable with [`ChatGateway::edit_message`].
pub type MessageId = i64;

/// Suggested-reply keyboard attached to an outbound message.
pub type Keyboard = Vec<String>;

/// Callback invoked by the gateway once a message has actually been sent.
///
/// The gateway may drop the callback without calling it when the send fails
/// permanently; callers must stay live in that case.
pub type SentCallback = Box<dyn FnOnce(MessageId) + Send + 'static>;

/// Narrow interface to the chat transport.
pub trait ChatGateway: Send + Sync {
    /// Send a message to a chat, asynchronously. `on_sent` (if any) fires
    /// with the new message id after the transport confirms delivery.
    fn send_message(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
        on_sent: Option<SentCallback>,
    );

    /// Edit a previously sent message. Best-effort, fire-and-forget.
    fn edit_message(&self, chat: ChatId, message_id: MessageId, text: String);

    /// Remove a user from a chat at game-end cleanup.
    fn kick_player(&self, chat: ChatId, user: UserId);
}
