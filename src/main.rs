//! Console entry point: loads configuration and packages, wires the
//! registry to a console gateway and drives it from stdin.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use svoyak_bot::{
    config::AppConfig,
    dao::FileStore,
    data::TopicSet,
    gateway::{ChatId, console::ConsoleGateway},
    services::{GameSetup, Registry, rating},
    session::{PlayerInfo, SessionEvent},
};

/// Chat id used for scheduling commands typed on the console.
const SCHEDULE_CHAT: ChatId = 0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load();

    let mut sets: HashMap<String, Arc<TopicSet>> = HashMap::new();
    for path in &config.packages {
        let set = TopicSet::load(path)
            .with_context(|| format!("loading package `{}`", path.display()))?;
        info!(
            package = %set.short_name,
            topics = set.topics.len(),
            "package loaded"
        );
        sets.insert(set.short_name.clone(), Arc::new(set));
    }
    if sets.is_empty() {
        warn!("no packages configured; games cannot be scheduled");
    }

    let store = Arc::new(
        FileStore::open(&config.data_dir)
            .with_context(|| format!("opening data dir `{}`", config.data_dir.display()))?,
    );
    let gateway = Arc::new(ConsoleGateway::new());

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(Registry::new(
        &config,
        sets,
        store.clone(),
        store.clone(),
        gateway,
        outcome_tx,
    ));

    tokio::spawn(registry.clone().run_cleanup(outcome_rx));

    let decay_store = store.clone();
    let decay_interval = config.decay_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(decay_interval);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            if let Err(err) = rating::decay_all(decay_store.as_ref()) {
                error!(error = %err, "rating decay failed");
            }
        }
    });

    run_console(registry).await
}

/// Read commands from stdin until EOF or `quit`.
///
/// Commands:
/// `start <package> <topics> [tournament] <id:name>...` schedules a game,
/// `join <chat> <user>` reports a user joining a room,
/// `say <chat> <user> <name> <text>` posts a chat message,
/// `rating` prints the rating table.
async fn run_console(registry: Arc<Registry>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("console ready");

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        match command {
            "quit" => break,
            "rating" => println!("{}", registry.rating_board()),
            "start" => {
                let args: Vec<&str> = parts.collect();
                match parse_start(&args) {
                    Ok(setup) => match registry.start_game(SCHEDULE_CHAT, setup) {
                        Ok(room) => {
                            let link = registry.invite_link(room).unwrap_or_default();
                            println!("game started in room {room} ({link})");
                        }
                        Err(err) => println!("cannot start: {err}"),
                    },
                    Err(message) => println!("{message}"),
                }
            }
            "join" => {
                let chat = parts.next().and_then(|s| s.parse::<ChatId>().ok());
                let user = parts.next().and_then(|s| s.parse().ok());
                match (chat, user) {
                    (Some(chat), Some(user)) => {
                        registry.route(chat, SessionEvent::Joined { user });
                    }
                    _ => println!("usage: join <chat> <user>"),
                }
            }
            "say" => {
                let chat = parts.next().and_then(|s| s.parse::<ChatId>().ok());
                let user = parts.next().and_then(|s| s.parse().ok());
                let name = parts.next();
                let text = parts.collect::<Vec<_>>().join(" ");
                match (chat, user, name) {
                    (Some(chat), Some(user), Some(name)) if !text.is_empty() => {
                        registry.route(
                            chat,
                            SessionEvent::Text {
                                from: user,
                                name: name.to_string(),
                                text,
                            },
                        );
                    }
                    _ => println!("usage: say <chat> <user> <name> <text>"),
                }
            }
            other => println!("unknown command `{other}`"),
        }
    }

    info!("console closed");
    Ok(())
}

fn parse_start(args: &[&str]) -> Result<GameSetup, String> {
    let usage = "usage: start <package> <topics> [tournament] <id:name>...";
    let [set_id, count, rest @ ..] = args else {
        return Err(usage.into());
    };
    let topic_count: usize = count.parse().map_err(|_| usage.to_string())?;
    let (tournament, player_args) = match rest {
        ["tournament", players @ ..] => (true, players),
        players => (false, players),
    };
    let mut players = Vec::new();
    for arg in player_args {
        let (id, name) = arg
            .split_once(':')
            .ok_or_else(|| format!("bad player `{arg}`, expected <id:name>"))?;
        let id = id.parse().map_err(|_| format!("bad player id in `{arg}`"))?;
        players.push(PlayerInfo {
            id,
            name: name.to_string(),
        });
    }
    Ok(GameSetup {
        set_id: set_id.to_string(),
        topic_count,
        players,
        spectators: Vec::new(),
        tournament,
    })
}
