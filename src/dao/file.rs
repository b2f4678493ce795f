//! JSON-file backed implementation of the storage traits.
//!
//! State lives in memory and is rewritten wholesale on commit, mirroring the
//! small-list persistence model of the bot: a `ratings.json` and a
//! `played.json` document inside a configurable data directory.

use std::{
    collections::{HashMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    dao::storage::{PlayedStore, RatingStore, StorageError, StorageResult},
    data::TopicId,
    gateway::UserId,
    services::rating::DEFAULT_RATING,
};

const RATINGS_FILE: &str = "ratings.json";
const PLAYED_FILE: &str = "played.json";

/// One persisted rating record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RatingRecord {
    name: String,
    rating: i32,
}

#[derive(Debug, Default)]
struct Inner {
    ratings: HashMap<UserId, RatingRecord>,
    played: HashMap<UserId, HashSet<TopicId>>,
}

/// File-backed store implementing both [`RatingStore`] and [`PlayedStore`].
pub struct FileStore {
    dir: PathBuf,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Open (or initialise) a store rooted at `dir`. Missing files start the
    /// store empty; unreadable files are a hard error.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| StorageError::io(format!("creating data dir `{}`", dir.display()), e))?;

        let ratings: HashMap<UserId, RatingRecord> = read_or_default(&dir.join(RATINGS_FILE))?;
        let played: HashMap<UserId, HashSet<TopicId>> = read_or_default(&dir.join(PLAYED_FILE))?;

        info!(
            dir = %dir.display(),
            ratings = ratings.len(),
            played = played.len(),
            "opened file store"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            inner: Mutex::new(Inner { ratings, played }),
        })
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> StorageResult<()> {
        let path = self.dir.join(file);
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::unavailable(format!("encoding `{file}`"), e))?;
        fs::write(&path, contents)
            .map_err(|e| StorageError::io(format!("writing `{}`", path.display()), e))
    }
}

fn read_or_default<T>(path: &Path) -> StorageResult<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| StorageError::unavailable(format!("parsing `{}`", path.display()), e)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(StorageError::io(
            format!("reading `{}`", path.display()),
            err,
        )),
    }
}

impl RatingStore for FileStore {
    fn rating(&self, user: UserId) -> i32 {
        self.inner
            .lock()
            .unwrap()
            .ratings
            .get(&user)
            .map(|record| record.rating)
            .unwrap_or(DEFAULT_RATING)
    }

    fn all_ratings(&self) -> Vec<(UserId, String, i32)> {
        self.inner
            .lock()
            .unwrap()
            .ratings
            .iter()
            .map(|(&user, record)| (user, record.name.clone(), record.rating))
            .collect()
    }

    fn set_rating(&self, user: UserId, rating: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .ratings
            .entry(user)
            .or_insert_with(|| RatingRecord {
                name: String::new(),
                rating: DEFAULT_RATING,
            })
            .rating = rating;
    }

    fn set_name(&self, user: UserId, name: String) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .ratings
            .entry(user)
            .or_insert_with(|| RatingRecord {
                name: String::new(),
                rating: DEFAULT_RATING,
            })
            .name = name;
    }

    fn commit_ratings(&self) -> StorageResult<()> {
        let snapshot = self.inner.lock().unwrap().ratings.clone();
        self.write_json(RATINGS_FILE, &snapshot)
    }
}

impl PlayedStore for FileStore {
    fn is_played(&self, user: UserId, topic: &TopicId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .played
            .get(&user)
            .is_some_and(|set| set.contains(topic))
    }

    fn add_played(&self, user: UserId, topic: TopicId) {
        self.inner
            .lock()
            .unwrap()
            .played
            .entry(user)
            .or_default()
            .insert(topic);
    }

    fn commit_played(&self) -> StorageResult<()> {
        let snapshot = self.inner.lock().unwrap().played.clone();
        self.write_json(PLAYED_FILE, &snapshot)
    }
}
