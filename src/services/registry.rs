//! Game scheduling: room assignment, fresh-topic selection, and the
//! end-of-game cleanup that frees rooms and applies rating updates.

use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    ServiceError,
    config::{AppConfig, GameTimers, RoomConfig},
    dao::{PlayedStore, RatingStore},
    data::{TopicId, TopicSet},
    gateway::{ChatGateway, ChatId, UserId},
    services::rating,
    session::{self, PlayerInfo, SessionConfig, SessionEvent, SessionHandle, SessionOutcome},
};

/// Parameters of one game about to be scheduled.
#[derive(Debug, Clone)]
pub struct GameSetup {
    /// Key of the topic package to play.
    pub set_id: String,
    /// How many fresh topics the game runs through.
    pub topic_count: usize,
    /// Players, in registration order.
    pub players: Vec<PlayerInfo>,
    /// Non-playing watchers; they burn the topics too.
    pub spectators: Vec<UserId>,
    /// Judge-arbitrated tournament variant.
    pub tournament: bool,
}

struct ActiveGame {
    handle: SessionHandle,
    room: RoomConfig,
    players: Vec<UserId>,
    spectators: Vec<UserId>,
}

/// Owner of the room pool and of every running session.
pub struct Registry {
    rooms: Vec<RoomConfig>,
    timers: GameTimers,
    busy: DashMap<ChatId, ActiveGame>,
    sets: HashMap<String, Arc<TopicSet>>,
    ratings: Arc<dyn RatingStore>,
    played: Arc<dyn PlayedStore>,
    gateway: Arc<dyn ChatGateway>,
    outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
}

impl Registry {
    /// Build a registry over the configured rooms and loaded packages.
    pub fn new(
        config: &AppConfig,
        sets: HashMap<String, Arc<TopicSet>>,
        ratings: Arc<dyn RatingStore>,
        played: Arc<dyn PlayedStore>,
        gateway: Arc<dyn ChatGateway>,
        outcome_tx: mpsc::UnboundedSender<SessionOutcome>,
    ) -> Self {
        Self {
            rooms: config.rooms.clone(),
            timers: config.timers.clone(),
            busy: DashMap::new(),
            sets,
            ratings,
            played,
            gateway,
            outcome_tx,
        }
    }

    /// Schedule a game: pick fresh topics, claim a free room, mark the
    /// topics as played for everyone at the table and spawn the session.
    /// Returns the chat id of the assigned room.
    pub fn start_game(&self, origin_chat: ChatId, setup: GameSetup) -> Result<ChatId, ServiceError> {
        if setup.players.is_empty() && !setup.tournament {
            return Err(ServiceError::InvalidInput(
                "at least one player is required".into(),
            ));
        }
        let set = self
            .sets
            .get(&setup.set_id)
            .ok_or_else(|| ServiceError::NotFound(format!("package `{}`", setup.set_id)))?;
        let topics = self.select_topics(&setup, set)?;
        let room = self
            .rooms
            .iter()
            .find(|room| !self.busy.contains_key(&room.chat_id))
            .cloned()
            .ok_or(ServiceError::NoFreeRoom)?;

        for &index in &topics {
            let id = TopicId {
                set_id: setup.set_id.clone(),
                topic: index as u32 + 1,
            };
            for player in &setup.players {
                self.played.add_played(player.id, id.clone());
            }
            for &spectator in &setup.spectators {
                self.played.add_played(spectator, id.clone());
            }
        }
        if let Err(err) = self.played.commit_played() {
            // The game still starts; the exclusion set becomes durable on
            // the next successful commit.
            error!(error = %err, "failed to persist played topics");
        }

        let session_config = SessionConfig {
            chat_id: room.chat_id,
            origin_chat,
            set: set.clone(),
            topics,
            players: setup.players.clone(),
            tournament: setup.tournament,
            timers: self.timers.clone(),
        };
        let handle =
            session::actor::spawn(session_config, self.gateway.clone(), self.outcome_tx.clone());

        info!(
            room = room.chat_id,
            set = %setup.set_id,
            players = setup.players.len(),
            tournament = setup.tournament,
            "game scheduled"
        );
        let chat_id = room.chat_id;
        self.busy.insert(
            chat_id,
            ActiveGame {
                handle,
                room,
                players: setup.players.iter().map(|p| p.id).collect(),
                spectators: setup.spectators,
            },
        );
        Ok(chat_id)
    }

    /// First `topic_count` topics of the set that none of the players has
    /// seen, in package order.
    fn select_topics(&self, setup: &GameSetup, set: &TopicSet) -> Result<Vec<usize>, ServiceError> {
        if setup.topic_count == 0 {
            return Err(ServiceError::InvalidInput(
                "topic count must be positive".into(),
            ));
        }
        let mut picked = Vec::new();
        for index in 0..set.topics.len() {
            let id = TopicId {
                set_id: setup.set_id.clone(),
                topic: index as u32 + 1,
            };
            let fresh = setup
                .players
                .iter()
                .all(|player| !self.played.is_played(player.id, &id));
            if fresh {
                picked.push(index);
                if picked.len() == setup.topic_count {
                    return Ok(picked);
                }
            }
        }
        Err(ServiceError::NotEnoughTopics {
            needed: setup.topic_count,
            available: picked.len(),
        })
    }

    /// Forward an inbound chat event to the session playing in `chat`.
    /// Events for idle rooms are dropped.
    pub fn route(&self, chat: ChatId, event: SessionEvent) {
        if let Some(game) = self.busy.get(&chat) {
            game.handle.process(event);
        }
    }

    /// Whether a game is currently running in `chat`.
    pub fn is_busy(&self, chat: ChatId) -> bool {
        self.busy.contains_key(&chat)
    }

    /// Invite link of the room a game is running in.
    pub fn invite_link(&self, chat: ChatId) -> Option<String> {
        self.busy.get(&chat).map(|game| game.room.invite_link.clone())
    }

    /// Rating table rendered for the scheduling chat, best first.
    pub fn rating_board(&self) -> String {
        let mut records = self.ratings.all_ratings();
        if records.is_empty() {
            return "No rated players yet.".into();
        }
        records.sort_by(|a, b| b.2.cmp(&a.2));
        records
            .into_iter()
            .map(|(_, name, rating)| format!("{name} {rating}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Finalize one finished session: free its room, clear the table and
    /// apply the rating update unless the game was aborted.
    pub fn finish_game(&self, outcome: &SessionOutcome) {
        let Some((_, game)) = self.busy.remove(&outcome.chat_id) else {
            warn!(chat = outcome.chat_id, "outcome for an idle room");
            return;
        };

        for &user in game.players.iter().chain(game.spectators.iter()) {
            self.gateway.kick_player(outcome.chat_id, user);
        }

        let summary = if outcome.aborted {
            format!("Game aborted.\n{}", outcome.score_board)
        } else {
            format!("Game finished.\n{}", outcome.score_board)
        };
        self.gateway
            .send_message(outcome.origin_chat, summary, None, None);

        if outcome.aborted {
            info!(room = outcome.chat_id, "aborted game, ratings untouched");
        } else if let Err(err) =
            rating::update_ratings(self.ratings.as_ref(), &outcome.scores, &outcome.names)
        {
            // The room is freed regardless.
            error!(error = %err, "failed to persist ratings");
        }
        info!(room = outcome.chat_id, "room freed");
    }

    /// Drain session outcomes until every session handle is gone.
    pub async fn run_cleanup(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<SessionOutcome>) {
        while let Some(outcome) = rx.recv().await {
            self.finish_game(&outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::FileStore,
        data::{Question, Topic},
        gateway::testing::RecordingGateway,
    };
    use indexmap::IndexMap;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "svoyak-registry-{tag}-{}-{}",
            std::process::id(),
            uuid::Uuid::new_v4()
        ))
    }

    fn package(topic_count: usize) -> Arc<TopicSet> {
        Arc::new(TopicSet {
            short_name: "pkg".into(),
            description: String::new(),
            topics: (0..topic_count)
                .map(|i| Topic {
                    name: format!("topic-{i}"),
                    questions: crate::data::topic::COSTS
                        .iter()
                        .map(|&cost| Question {
                            cost,
                            text: format!("q{cost}"),
                            answers: vec!["x".into()],
                            comment: String::new(),
                        })
                        .collect(),
                })
                .collect(),
        })
    }

    struct Fixture {
        registry: Registry,
        gateway: Arc<RecordingGateway>,
        store: Arc<FileStore>,
    }

    fn fixture(tag: &str, rooms: usize, topics: usize) -> Fixture {
        let store = Arc::new(FileStore::open(&temp_dir(tag)).unwrap());
        let gateway = Arc::new(RecordingGateway::new());
        let (outcome_tx, _outcome_rx) = mpsc::unbounded_channel();
        let config = AppConfig {
            rooms: (0..rooms)
                .map(|i| RoomConfig {
                    chat_id: -(100 + i as i64),
                    invite_link: format!("https://example/room{i}"),
                })
                .collect(),
            ..AppConfig::default()
        };
        let registry = Registry::new(
            &config,
            HashMap::from([("pkg".to_string(), package(topics))]),
            store.clone(),
            store.clone(),
            gateway.clone(),
            outcome_tx,
        );
        Fixture {
            registry,
            gateway,
            store,
        }
    }

    fn setup(players: &[(UserId, &str)]) -> GameSetup {
        GameSetup {
            set_id: "pkg".into(),
            topic_count: 2,
            players: players
                .iter()
                .map(|&(id, name)| PlayerInfo {
                    id,
                    name: name.into(),
                })
                .collect(),
            spectators: Vec::new(),
            tournament: false,
        }
    }

    #[tokio::test]
    async fn scheduling_claims_a_room_and_burns_the_topics() {
        let fx = fixture("claims", 1, 4);
        let mut game = setup(&[(1, "Ann"), (2, "Bob")]);
        game.spectators = vec![5];

        let room = fx.registry.start_game(-1, game).unwrap();
        assert_eq!(room, -100);
        assert!(fx.registry.is_busy(room));
        assert_eq!(
            fx.registry.invite_link(room).as_deref(),
            Some("https://example/room0")
        );

        // The first two topics are now burned for players and spectators.
        for user in [1, 2, 5] {
            for topic in [1, 2] {
                assert!(fx.store.is_played(
                    user,
                    &TopicId {
                        set_id: "pkg".into(),
                        topic,
                    }
                ));
            }
        }
    }

    #[tokio::test]
    async fn second_game_gets_no_room() {
        let fx = fixture("noroom", 1, 8);
        fx.registry.start_game(-1, setup(&[(1, "Ann")])).unwrap();
        let err = fx
            .registry
            .start_game(-1, setup(&[(2, "Bob")]))
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoFreeRoom));
    }

    #[tokio::test]
    async fn topic_selection_skips_what_any_player_has_seen() {
        let fx = fixture("seen", 2, 3);
        // Bob has already seen topic 1; selection must pick 2 and 3.
        fx.store.add_played(
            2,
            TopicId {
                set_id: "pkg".into(),
                topic: 1,
            },
        );
        fx.registry
            .start_game(-1, setup(&[(1, "Ann"), (2, "Bob")]))
            .unwrap();
        assert!(!fx.store.is_played(
            1,
            &TopicId {
                set_id: "pkg".into(),
                topic: 1,
            }
        ));
        assert!(fx.store.is_played(
            1,
            &TopicId {
                set_id: "pkg".into(),
                topic: 3,
            }
        ));
    }

    #[tokio::test]
    async fn too_few_fresh_topics_is_rejected_before_claiming_a_room() {
        let fx = fixture("few", 1, 2);
        for topic in [1, 2] {
            fx.store.add_played(
                1,
                TopicId {
                    set_id: "pkg".into(),
                    topic,
                },
            );
        }
        let err = fx
            .registry
            .start_game(-1, setup(&[(1, "Ann")]))
            .unwrap_err();
        match err {
            ServiceError::NotEnoughTopics { needed, available } => {
                assert_eq!(needed, 2);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!fx.registry.is_busy(-100));
    }

    #[tokio::test]
    async fn unknown_package_is_rejected() {
        let fx = fixture("nopkg", 1, 2);
        let mut game = setup(&[(1, "Ann")]);
        game.set_id = "missing".into();
        assert!(matches!(
            fx.registry.start_game(-1, game).unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn cleanup_frees_the_room_clears_the_table_and_rates() {
        let fx = fixture("cleanup", 1, 4);
        let mut game = setup(&[(1, "Ann"), (2, "Bob")]);
        game.spectators = vec![5];
        let room = fx.registry.start_game(-7, game).unwrap();

        let outcome = SessionOutcome {
            chat_id: room,
            origin_chat: -7,
            aborted: false,
            scores: IndexMap::from([(1, 40), (2, -10)]),
            names: HashMap::from([(1, "Ann".to_string()), (2, "Bob".to_string())]),
            score_board: "Ann 40\nBob -10".into(),
        };
        fx.registry.finish_game(&outcome);

        assert!(!fx.registry.is_busy(room));
        let kicks = fx.gateway.kicks.lock().unwrap().clone();
        assert_eq!(kicks, vec![(room, 1), (room, 2), (room, 5)]);

        let summary = fx.gateway.last_text().unwrap();
        assert!(summary.starts_with("Game finished."));
        assert!(summary.contains("Ann 40"));
        assert!(fx.store.rating(1) > rating::DEFAULT_RATING);
        assert!(fx.store.rating(2) < rating::DEFAULT_RATING);

        // The room is immediately reusable.
        fx.registry.start_game(-7, setup(&[(3, "Eve")])).unwrap();
    }

    #[tokio::test]
    async fn aborted_games_free_the_room_but_skip_the_ratings() {
        let fx = fixture("aborted", 1, 4);
        let room = fx
            .registry
            .start_game(-7, setup(&[(1, "Ann"), (2, "Bob")]))
            .unwrap();

        let outcome = SessionOutcome {
            chat_id: room,
            origin_chat: -7,
            aborted: true,
            scores: IndexMap::from([(1, 40), (2, -10)]),
            names: HashMap::new(),
            score_board: "Ann 40\nBob -10".into(),
        };
        fx.registry.finish_game(&outcome);

        assert!(!fx.registry.is_busy(room));
        assert!(fx.gateway.last_text().unwrap().starts_with("Game aborted."));
        assert_eq!(fx.store.rating(1), rating::DEFAULT_RATING);
        assert_eq!(fx.store.rating(2), rating::DEFAULT_RATING);
    }
}
