//! Per-session task: one inbox, one ticker, one owner of the state.

use std::{sync::Arc, time::Instant};

use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tracing::debug;

use crate::{
    gateway::{ChatGateway, ChatId},
    session::{GameSession, SessionConfig, SessionEvent, SessionOutcome},
};

/// Cheap handle for feeding events into a running session.
#[derive(Clone)]
pub struct SessionHandle {
    chat_id: ChatId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Chat room this session plays in.
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Enqueue an event for the session. Events from one caller are
    /// processed in submission order; a finished session drops them.
    pub fn process(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

/// Spawn a session on its own task. The task owns the [`GameSession`]
/// exclusively and multiplexes the inbox with the periodic deadline tick,
/// so no locking is needed anywhere in the engine. The final report is
/// pushed into `outcome_tx` and the task exits.
pub fn spawn(
    config: SessionConfig,
    gateway: Arc<dyn ChatGateway>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
) -> SessionHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let chat_id = config.chat_id;
    let tick = config.timers.tick;
    let session_tx = tx.clone();

    tokio::spawn(async move {
        let mut session = GameSession::new(config, gateway, session_tx);
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => session.handle_tick(Instant::now()),
                event = rx.recv() => match event {
                    Some(event) => session.handle_event(event, Instant::now()),
                    None => break,
                },
            }
            if let Some(outcome) = session.take_outcome() {
                debug!(chat = chat_id, "session task finished");
                let _ = outcome_tx.send(outcome);
                break;
            }
        }
    });

    SessionHandle { chat_id, tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GameTimers,
        data::{Question, Topic, TopicSet},
        gateway::testing::RecordingGateway,
        session::PlayerInfo,
    };
    use std::time::Duration;

    fn fast_timers() -> GameTimers {
        GameTimers {
            tick: Duration::from_millis(2),
            intermission: Duration::from_millis(5),
            successive_question: Duration::from_millis(5),
            first_question: Duration::from_millis(10),
            answer: Duration::from_millis(10),
            wait_cycle: Duration::from_millis(5),
            max_wait_cycles: 1,
            after_game: Duration::from_millis(5),
            stray_extension: Duration::from_millis(5),
        }
    }

    fn tiny_set() -> Arc<TopicSet> {
        Arc::new(TopicSet {
            short_name: "pkg".into(),
            description: "actor test package".into(),
            topics: vec![Topic {
                name: "solo".into(),
                questions: crate::data::topic::COSTS
                    .iter()
                    .map(|&cost| Question {
                        cost,
                        text: format!("q{cost}"),
                        answers: vec!["x".into()],
                        comment: String::new(),
                    })
                    .collect(),
            }],
        })
    }

    fn config() -> SessionConfig {
        SessionConfig {
            chat_id: -5,
            origin_chat: -6,
            set: tiny_set(),
            topics: vec![0],
            players: vec![PlayerInfo {
                id: 1,
                name: "Ann".into(),
            }],
            tournament: false,
            timers: fast_timers(),
        }
    }

    #[tokio::test]
    async fn unattended_game_runs_to_completion() {
        let gateway = Arc::new(RecordingGateway::new());
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let _handle = spawn(config(), gateway.clone(), outcome_tx);

        let outcome = tokio::time::timeout(Duration::from_secs(10), outcome_rx.recv())
            .await
            .expect("session should finish on its own")
            .expect("outcome should be reported");
        assert!(!outcome.aborted);
        assert_eq!(outcome.scores.get(&1), Some(&0));
        assert!(gateway.texts().iter().any(|t| t == "Game over!"));
    }

    #[tokio::test]
    async fn abort_command_reports_an_aborted_outcome() {
        let gateway = Arc::new(RecordingGateway::new());
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let handle = spawn(config(), gateway, outcome_tx);

        handle.process(SessionEvent::Text {
            from: 1,
            name: "Ann".into(),
            text: "/abort".into(),
        });

        let outcome = tokio::time::timeout(Duration::from_secs(10), outcome_rx.recv())
            .await
            .expect("session should finish after abort")
            .expect("outcome should be reported");
        assert!(outcome.aborted);
    }
}
