//! The game-session state machine.
//!
//! The engine is synchronous and deterministic: it is driven by explicit
//! `now` timestamps from the actor task, mutates its own state only, and
//! talks to the outside world exclusively through the [`ChatGateway`].
//! Deadlines follow the send-then-arm pattern: issuing a timed message
//! clears the deadline, and the gateway's delivery confirmation re-enters
//! the session inbox to arm it, so a deadline never races the send it
//! belongs to and coalesced ticks perform at most one transition.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::GameTimers,
    data::{Question, Topic, TopicSet},
    gateway::{ChatGateway, ChatId, Keyboard, MessageId, UserId},
    session::{Phase, SentRecord, SessionConfig, SessionEvent, SessionOutcome},
};

const PLUS: &[&str] = &["+"];
const YES_NO: &[&str] = &["/yes", "/no"];
const BREAK: &[&str] = &["/yes", "/no", "/pause"];
const PAUSED_KEYS: &[&str] = &["/yes", "/no", "/continue"];

fn keys(keys: &[&str]) -> Keyboard {
    keys.iter().map(|k| k.to_string()).collect()
}

/// One running trivia game bound to one chat room.
pub struct GameSession {
    game_id: Uuid,
    chat_id: ChatId,
    origin_chat: ChatId,
    timers: GameTimers,
    gateway: Arc<dyn ChatGateway>,
    inbox: mpsc::UnboundedSender<SessionEvent>,

    set: Arc<TopicSet>,
    topics: Vec<usize>,
    cursor: usize,
    stop_at: usize,
    current_cost: Option<u32>,

    players: Vec<UserId>,
    names: HashMap<UserId, String>,
    scores: IndexMap<UserId, i32>,
    attempts: Vec<UserId>,
    correct: Option<UserId>,
    buzzed: Option<UserId>,

    phase: Phase,
    action_expires: Option<Instant>,
    paused: bool,
    aborted: bool,
    tournament: bool,
    judge: Option<UserId>,

    joined: HashSet<UserId>,
    wait_cycles: u32,

    verdict_id: Option<MessageId>,
    verdict_text: Option<String>,

    outcome: Option<SessionOutcome>,
}

impl GameSession {
    /// Create a session and greet the room. Non-tournament games enter
    /// `BeforeGame` and wait for the players to join; tournament games open
    /// registration with no deadline.
    pub fn new(
        config: SessionConfig,
        gateway: Arc<dyn ChatGateway>,
        inbox: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let SessionConfig {
            chat_id,
            origin_chat,
            set,
            topics,
            players,
            tournament,
            timers,
        } = config;

        let stop_at = topics.len();
        let mut session = Self {
            game_id: Uuid::new_v4(),
            chat_id,
            origin_chat,
            timers,
            gateway,
            inbox,
            set,
            topics,
            cursor: 0,
            stop_at,
            current_cost: None,
            players: players.iter().map(|p| p.id).collect(),
            names: players.iter().map(|p| (p.id, p.name.clone())).collect(),
            scores: players.iter().map(|p| (p.id, 0)).collect(),
            attempts: Vec::new(),
            correct: None,
            buzzed: None,
            phase: Phase::BeforeGame,
            action_expires: None,
            paused: false,
            aborted: false,
            tournament,
            judge: None,
            joined: HashSet::new(),
            wait_cycles: 0,
            verdict_id: None,
            verdict_text: None,
            outcome: None,
        };

        info!(
            chat = session.chat_id,
            game = %session.game_id,
            players = session.players.len(),
            topics = session.stop_at,
            tournament,
            "session created"
        );

        if tournament {
            session.phase = Phase::Registration;
            session.send("Registration is open.".into(), None);
        } else {
            let wait = session.timers.wait_cycle;
            session.send_with_delay("Welcome! The game starts soon.".into(), None, wait);
        }
        session
    }

    /// Current phase, for the actor and tests.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Running score map, in registration order.
    pub fn scores(&self) -> &IndexMap<UserId, i32> {
        &self.scores
    }

    /// Whether the session is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Take the final report once the terminal cooldown has elapsed.
    pub fn take_outcome(&mut self) -> Option<SessionOutcome> {
        self.outcome.take()
    }

    /// Periodic deadline check: performs the current phase's
    /// elapsed-deadline transition when `now` has reached the deadline.
    pub fn handle_tick(&mut self, now: Instant) {
        if self.outcome.is_some() {
            return;
        }
        let Some(deadline) = self.action_expires else {
            return;
        };
        if now < deadline {
            return;
        }
        match self.phase {
            Phase::AfterGame => self.finish(),
            Phase::BeforeGame => self.on_wait_expired(now),
            Phase::BeforeTopic => self.announce_topic_or_end(),
            Phase::BeforeFirstQuestion => {
                self.current_cost = self.current_topic().map(|t| t.first().cost);
                self.ask_question();
            }
            Phase::AfterQuestion => self.advance_after_question(),
            Phase::SpecialScore => self.ask_question(),
            Phase::Question => self.reveal_answer(),
            Phase::Answer => self.answer_timeout(),
            // These phases only leave via messages; their deadline is
            // infinite, so reaching here means a stale deadline. Ignore.
            Phase::Registration | Phase::JudgeDecision => {}
        }
    }

    /// Process one inbound event on the session context.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) {
        if self.outcome.is_some() {
            return;
        }
        match event {
            SessionEvent::Delivered {
                message_id,
                arm,
                record,
            } => {
                if record == SentRecord::Verdict {
                    self.verdict_id = Some(message_id);
                }
                if let Some(delay) = arm
                    && !self.paused
                {
                    self.action_expires = Some(now + delay);
                }
            }
            SessionEvent::Joined { user } => {
                if self.phase == Phase::BeforeGame {
                    self.joined.insert(user);
                    if self.all_players_joined() {
                        self.start_game();
                    }
                }
            }
            SessionEvent::Text { from, name, text } => self.handle_text(from, name, text, now),
        }
    }

    fn handle_text(&mut self, from: UserId, name: String, text: String, now: Instant) {
        if self.phase == Phase::AfterGame {
            // Stray chatter only postpones the room cleanup.
            if let Some(deadline) = self.action_expires {
                self.action_expires = Some(deadline.max(now + self.timers.stray_extension));
            }
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            return;
        }

        if self.phase == Phase::Registration {
            self.handle_registration(from, name, text);
            return;
        }

        if self.phase == Phase::JudgeDecision && self.judge == Some(from) {
            self.handle_judge_decision(text);
            return;
        }

        if self.phase == Phase::Answer && self.buzzed == Some(from) {
            self.handle_answer(from, name, text);
            return;
        }

        let mut tokens = text.split_whitespace();
        let command = tokens.next().unwrap_or("").to_lowercase();
        let argument = tokens.next();
        match command.as_str() {
            "/abort" => self.abort_game(),
            "+" if self.phase == Phase::Question => {
                if self.attempts.contains(&from) || !self.scores.contains_key(&from) {
                    return;
                }
                self.names.insert(from, name);
                self.buzzed = Some(from);
                let answer_window = self.timers.answer;
                self.send_with_delay(
                    format!("Your answer, {}?", self.display(from)),
                    None,
                    answer_window,
                );
                self.phase = Phase::Answer;
            }
            "/pause" if self.phase.allows_pause() && !self.paused => {
                self.action_expires = None;
                self.paused = true;
                let keyboard =
                    (self.phase == Phase::AfterQuestion).then(|| keys(PAUSED_KEYS));
                self.send("Game paused.".into(), keyboard);
            }
            "/continue" if self.paused => {
                self.paused = false;
                let keyboard = (self.phase == Phase::AfterQuestion).then(|| keys(BREAK));
                let intermission = self.timers.intermission;
                self.send_with_delay("Game resumed.".into(), keyboard, intermission);
            }
            "/yes" if self.phase == Phase::AfterQuestion && !self.tournament => {
                self.fix_answer(from)
            }
            "/no" if self.phase == Phase::AfterQuestion && !self.tournament => {
                self.discard_answer(from)
            }
            "/adjust" if self.paused => self.adjust_score(from, name, argument),
            _ => {
                // Unknown commands and out-of-turn input are ignored.
                debug!(chat = self.chat_id, from, command = %command, "ignored message");
            }
        }
    }

    fn handle_registration(&mut self, from: UserId, name: String, text: &str) {
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        match command.as_str() {
            "/judge" => {
                self.judge = Some(from);
                self.names.insert(from, name);
                self.send("Judge registered.".into(), None);
            }
            "/register" => {
                self.names.insert(from, name);
                if !self.scores.contains_key(&from) {
                    self.players.push(from);
                    self.scores.insert(from, 0);
                }
                self.send("Player registered.".into(), None);
            }
            "/start" if self.judge == Some(from) => self.start_game(),
            "/abort" => self.abort_game(),
            _ => {}
        }
    }

    fn handle_judge_decision(&mut self, text: &str) {
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        match command.as_str() {
            "/yes" => {
                let Some(user) = self.buzzed.take() else {
                    return;
                };
                self.correct = Some(user);
                let reveal = self.reveal_text();
                let intermission = self.timers.intermission;
                self.send_verdict(
                    format!("Correct, {}!\n{}", self.display(user), reveal),
                    None,
                    intermission,
                );
                self.phase = Phase::AfterQuestion;
            }
            "/no" => {
                let Some(user) = self.buzzed.take() else {
                    return;
                };
                let delay = self.remaining_buzz_delay();
                self.send_with_delay(
                    format!("Wrong, {}.", self.display(user)),
                    Some(keys(PLUS)),
                    delay,
                );
                self.phase = Phase::Question;
            }
            _ => {}
        }
    }

    fn handle_answer(&mut self, from: UserId, name: String, text: &str) {
        if text == "+" {
            return;
        }
        self.names.insert(from, name);
        if self.tournament {
            self.attempts.push(from);
            self.phase = Phase::JudgeDecision;
            self.action_expires = None;
            self.send(
                format!("Answer received: {text}.\nJudge's decision?"),
                Some(keys(YES_NO)),
            );
            return;
        }

        let is_correct = self
            .current_question()
            .is_some_and(|q| q.check_answer(text));
        self.attempts.push(from);
        self.buzzed = None;
        if is_correct {
            self.correct = Some(from);
            let reveal = self.reveal_text();
            let intermission = self.timers.intermission;
            self.send_verdict(
                format!("Correct, {}!\n{}", self.display(from), reveal),
                Some(keys(BREAK)),
                intermission,
            );
            self.phase = Phase::AfterQuestion;
        } else {
            let delay = self.remaining_buzz_delay();
            self.send_with_delay(
                format!("Wrong, {}.", self.display(from)),
                Some(keys(PLUS)),
                delay,
            );
            self.phase = Phase::Question;
        }
    }

    // --- elapsed-deadline transitions -----------------------------------

    fn on_wait_expired(&mut self, now: Instant) {
        self.wait_cycles += 1;
        if self.all_players_joined() || self.wait_cycles >= self.timers.max_wait_cycles {
            self.start_game();
        } else {
            self.action_expires = Some(now + self.timers.wait_cycle);
        }
    }

    fn start_game(&mut self) {
        let mut list = String::from("Topic list:\n");
        for position in self.cursor..self.stop_at {
            let index = self.topics[position];
            list.push_str(&format!("{}. {}\n", index + 1, self.set.by_index(index).name));
        }
        let roster = self
            .players
            .iter()
            .map(|&id| self.display(id))
            .collect::<Vec<_>>()
            .join(", ");
        let intermission = self.timers.intermission;
        self.send_with_delay(
            format!(
                "The game begins. {}\n{}\n{list}\nPlayers: {roster}",
                self.set.short_name, self.set.description
            ),
            None,
            intermission,
        );
        self.phase = Phase::BeforeTopic;
    }

    fn announce_topic_or_end(&mut self) {
        if self.cursor == self.stop_at {
            self.phase = Phase::AfterGame;
            let cooldown = self.timers.after_game;
            self.send_with_delay("Game over!".into(), None, cooldown);
            return;
        }
        let index = self.topics[self.cursor];
        let Some(topic) = self.current_topic() else {
            return;
        };
        let remaining = self.stop_at - self.cursor;
        let header = if remaining == 1 {
            "Last topic".to_string()
        } else {
            format!("{remaining} topics left")
        };
        let announcement = format!("{header}\nTopic {}: {}", index + 1, topic.name);
        let intermission = self.timers.intermission;
        self.send_with_delay(announcement, None, intermission);
        self.phase = Phase::BeforeFirstQuestion;
    }

    fn ask_question(&mut self) {
        let Some(text) = self.question_text() else {
            return;
        };
        self.attempts.clear();
        self.correct = None;
        self.buzzed = None;
        self.verdict_id = None;
        self.verdict_text = None;
        let window = self.timers.first_question;
        self.send_with_delay(text, Some(keys(PLUS)), window);
        self.phase = Phase::Question;
    }

    fn reveal_answer(&mut self) {
        let reveal = self.reveal_text();
        let intermission = self.timers.intermission;
        self.send_verdict(reveal, Some(keys(BREAK)), intermission);
        self.phase = Phase::AfterQuestion;
    }

    fn answer_timeout(&mut self) {
        let Some(user) = self.buzzed.take() else {
            return;
        };
        self.attempts.push(user);
        let delay = self.remaining_buzz_delay();
        self.send_with_delay(
            format!("Time is up, {}.", self.display(user)),
            Some(keys(PLUS)),
            delay,
        );
        self.phase = Phase::Question;
    }

    fn advance_after_question(&mut self) {
        self.add_results();
        let Some(cost) = self.current_cost else {
            return;
        };
        match self.current_topic().and_then(|t| t.next_cost(cost)) {
            None => {
                self.cursor += 1;
                self.show_score();
                self.phase = Phase::BeforeTopic;
            }
            Some(next) => {
                self.current_cost = Some(next);
                if self.last_topic() && next == 50 {
                    self.show_score();
                    self.phase = Phase::SpecialScore;
                } else {
                    self.ask_question();
                }
            }
        }
    }

    fn abort_game(&mut self) {
        info!(chat = self.chat_id, game = %self.game_id, "game aborted");
        self.aborted = true;
        self.paused = false;
        self.show_score();
        self.phase = Phase::AfterGame;
        let cooldown = self.timers.after_game;
        self.send_with_delay("Game over!".into(), None, cooldown);
    }

    fn finish(&mut self) {
        info!(
            chat = self.chat_id,
            game = %self.game_id,
            aborted = self.aborted,
            "game finished"
        );
        self.action_expires = None;
        self.outcome = Some(SessionOutcome {
            chat_id: self.chat_id,
            origin_chat: self.origin_chat,
            aborted: self.aborted,
            scores: self.scores.clone(),
            names: self.names.clone(),
            score_board: self.score_board(),
        });
    }

    // --- scoring --------------------------------------------------------

    /// Apply the question's scoring policy, in attempt order: the first
    /// attempter recorded as correct gains the cost and scoring stops;
    /// every attempter before that point loses the cost.
    fn add_results(&mut self) {
        let Some(cost) = self.current_cost else {
            return;
        };
        let cost = cost as i32;
        for user in self.attempts.clone() {
            let entry = self.scores.entry(user).or_insert(0);
            if self.correct == Some(user) {
                *entry += cost;
                break;
            }
            *entry -= cost;
        }
    }

    /// Accept a post-hoc correction: the sender's attempt is counted as
    /// correct (they must have attempted, and not already be the winner).
    fn fix_answer(&mut self, from: UserId) {
        if !self.attempts.contains(&from) || self.correct == Some(from) {
            return;
        }
        self.correct = Some(from);
        self.acknowledge_correction(from, &format!("counted for {}", self.display(from)));
    }

    /// Withdraw the sender's previously accepted answer.
    fn discard_answer(&mut self, from: UserId) {
        if self.correct != Some(from) {
            return;
        }
        self.correct = None;
        self.acknowledge_correction(from, &format!("not counted for {}", self.display(from)));
    }

    fn acknowledge_correction(&mut self, who: UserId, change: &str) {
        if let (Some(id), Some(text)) = (self.verdict_id, self.verdict_text.clone()) {
            self.gateway
                .edit_message(self.chat_id, id, format!("{text}\nCorrection: {change}"));
        }
        let message = format!("Accepted, {}.", self.display(who));
        if self.paused {
            self.send(message, Some(keys(PAUSED_KEYS)));
        } else {
            let intermission = self.timers.intermission;
            self.send_with_delay(message, Some(keys(BREAK)), intermission);
        }
    }

    fn adjust_score(&mut self, from: UserId, name: String, argument: Option<&str>) {
        let Some(raw) = argument else {
            self.send("Missing argument: /adjust <delta>".into(), None);
            return;
        };
        match raw.parse::<i32>() {
            Ok(delta) => {
                if !self.scores.contains_key(&from) {
                    self.send(format!("{name} is not playing."), None);
                    return;
                }
                self.names.insert(from, name);
                let entry = self.scores.entry(from).or_insert(0);
                *entry += delta;
                let value = *entry;
                self.send(format!("New score for {}: {value}.", self.display(from)), None);
            }
            Err(_) => self.send(format!("Not a number: {raw}."), None),
        }
    }

    fn show_score(&mut self) {
        if self.scores.is_empty() {
            let intermission = self.timers.intermission;
            self.send_with_delay("No score yet.".into(), None, intermission);
            return;
        }
        let heading = if self.cursor == self.stop_at {
            "Final score:"
        } else {
            "Current score:"
        };
        let board = self.score_board();
        let intermission = self.timers.intermission;
        self.send_with_delay(format!("{heading}\n{board}"), None, intermission);
    }

    /// Score board lines, highest score first.
    fn score_board(&self) -> String {
        let mut entries: Vec<(String, i32)> = self
            .scores
            .iter()
            .map(|(&user, &score)| (self.display(user), score))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .map(|(name, score)| format!("{name} {score}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // --- helpers --------------------------------------------------------

    fn current_topic(&self) -> Option<&Topic> {
        let index = *self.topics.get(self.cursor)?;
        self.set.topics.get(index)
    }

    fn current_question(&self) -> Option<&Question> {
        let cost = self.current_cost?;
        self.current_topic()?.by_cost(cost)
    }

    fn question_text(&self) -> Option<String> {
        let topic = self.current_topic()?;
        let question = self.current_question()?;
        Some(format!(
            "Topic: {}\n{}. {}",
            topic.name, question.cost, question.text
        ))
    }

    fn reveal_text(&self) -> String {
        match self.current_question() {
            Some(question) => format!("Answer: {}", question.author_answers()),
            None => "Answer: (missing)".into(),
        }
    }

    fn last_topic(&self) -> bool {
        self.cursor + 1 == self.stop_at
    }

    fn all_players_joined(&self) -> bool {
        self.players.iter().all(|p| self.joined.contains(p))
    }

    /// Buzz window for the remaining players: zero once everyone has
    /// already attempted this question.
    fn remaining_buzz_delay(&self) -> Duration {
        if self.attempts.len() >= self.scores.len() {
            Duration::ZERO
        } else {
            self.timers.successive_question
        }
    }

    fn display(&self, user: UserId) -> String {
        self.names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("player {user}"))
    }

    // --- outbound -------------------------------------------------------

    fn send(&self, text: String, keyboard: Option<Keyboard>) {
        self.gateway.send_message(self.chat_id, text, keyboard, None);
    }

    /// Send a message that arms the next deadline once delivered. The
    /// deadline is infinite until the gateway confirms the send.
    fn send_with_delay(&mut self, text: String, keyboard: Option<Keyboard>, delay: Duration) {
        self.action_expires = None;
        let tx = self.inbox.clone();
        self.gateway.send_message(
            self.chat_id,
            text,
            keyboard,
            Some(Box::new(move |message_id| {
                let _ = tx.send(SessionEvent::Delivered {
                    message_id,
                    arm: Some(delay),
                    record: SentRecord::Plain,
                });
            })),
        );
    }

    /// Like [`send_with_delay`](Self::send_with_delay), but remembers the
    /// message as the question verdict so corrections can edit it later.
    fn send_verdict(&mut self, text: String, keyboard: Option<Keyboard>, delay: Duration) {
        self.action_expires = None;
        self.verdict_id = None;
        self.verdict_text = Some(text.clone());
        let tx = self.inbox.clone();
        self.gateway.send_message(
            self.chat_id,
            text,
            keyboard,
            Some(Box::new(move |message_id| {
                let _ = tx.send(SessionEvent::Delivered {
                    message_id,
                    arm: Some(delay),
                    record: SentRecord::Verdict,
                });
            })),
        );
    }
}
