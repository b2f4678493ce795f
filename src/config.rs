//! Application-level configuration loading: timers, game rooms, packages.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::gateway::ChatId;

/// Default location on disk where the bot looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SVOYAK_CONFIG_PATH";

/// Timer durations driving a session's state machine.
#[derive(Debug, Clone)]
pub struct GameTimers {
    /// Resolution of the periodic deadline check.
    pub tick: Duration,
    /// Pause between announcements (topic intro, reveal, score display).
    pub intermission: Duration,
    /// Buzz window after a wrong answer, for the remaining players.
    pub successive_question: Duration,
    /// Buzz window when a question is first shown.
    pub first_question: Duration,
    /// Time the buzzed-in player has to submit an answer.
    pub answer: Duration,
    /// Length of one pre-game wait cycle for players to join the room.
    pub wait_cycle: Duration,
    /// Wait cycles after which the game starts regardless of absentees.
    pub max_wait_cycles: u32,
    /// Cooldown after the final message before the room is freed.
    pub after_game: Duration,
    /// Extension applied to the cooldown by stray after-game messages.
    pub stray_extension: Duration,
}

impl Default for GameTimers {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            intermission: Duration::from_secs(8),
            successive_question: Duration::from_secs(10),
            first_question: Duration::from_secs(15),
            answer: Duration::from_secs(30),
            wait_cycle: Duration::from_secs(60),
            max_wait_cycles: 5,
            after_game: Duration::from_secs(30),
            stray_extension: Duration::from_secs(15),
        }
    }
}

/// One configured game room.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// Chat id of the room.
    pub chat_id: ChatId,
    /// Invite link sent to players when the room is assigned.
    pub invite_link: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Session timer durations.
    pub timers: GameTimers,
    /// Game rooms available for assignment.
    pub rooms: Vec<RoomConfig>,
    /// Directory holding the ratings and played-topics files.
    pub data_dir: PathBuf,
    /// Topic package files to load at startup.
    pub packages: Vec<PathBuf>,
    /// Interval of the periodic rating decay.
    pub decay_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// built-in defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        rooms = config.rooms.len(),
                        packages = config.packages.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timers: GameTimers::default(),
            rooms: vec![RoomConfig {
                chat_id: -1,
                invite_link: "local room".into(),
            }],
            data_dir: PathBuf::from("data"),
            packages: Vec::new(),
            decay_interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    #[serde(default)]
    timers: RawTimers,
    #[serde(default)]
    rooms: Vec<RoomConfig>,
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    packages: Vec<PathBuf>,
    #[serde(default)]
    decay_interval_hours: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the timer block; all fields optional.
struct RawTimers {
    tick_ms: Option<u64>,
    intermission_secs: Option<u64>,
    successive_question_secs: Option<u64>,
    first_question_secs: Option<u64>,
    answer_secs: Option<u64>,
    wait_cycle_secs: Option<u64>,
    max_wait_cycles: Option<u32>,
    after_game_secs: Option<u64>,
    stray_extension_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let t = raw.timers;
        let dt = GameTimers::default();
        Self {
            timers: GameTimers {
                tick: t.tick_ms.map(Duration::from_millis).unwrap_or(dt.tick),
                intermission: t
                    .intermission_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.intermission),
                successive_question: t
                    .successive_question_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.successive_question),
                first_question: t
                    .first_question_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.first_question),
                answer: t.answer_secs.map(Duration::from_secs).unwrap_or(dt.answer),
                wait_cycle: t
                    .wait_cycle_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.wait_cycle),
                max_wait_cycles: t.max_wait_cycles.unwrap_or(dt.max_wait_cycles),
                after_game: t
                    .after_game_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.after_game),
                stray_extension: t
                    .stray_extension_secs
                    .map(Duration::from_secs)
                    .unwrap_or(dt.stray_extension),
            },
            rooms: if raw.rooms.is_empty() {
                defaults.rooms
            } else {
                raw.rooms
            },
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            packages: raw.packages,
            decay_interval: raw
                .decay_interval_hours
                .map(|hours| Duration::from_secs(hours * 3600))
                .unwrap_or(defaults.decay_interval),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_merge_with_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "timers": { "tick_ms": 50, "answer_secs": 20 },
                "rooms": [{ "chat_id": -100, "invite_link": "https://example/room" }],
                "decay_interval_hours": 24
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.timers.tick, Duration::from_millis(50));
        assert_eq!(config.timers.answer, Duration::from_secs(20));
        assert_eq!(config.timers.intermission, Duration::from_secs(8));
        assert_eq!(config.rooms.len(), 1);
        assert_eq!(config.rooms[0].chat_id, -100);
        assert_eq!(config.decay_interval, Duration::from_secs(24 * 3600));
    }
}
