//! Topic sets and the played-topic identifier.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::question::Question;

/// Number of questions every topic must hold.
pub const QUESTIONS_PER_TOPIC: usize = 5;
/// Question costs, in the order they are played.
pub const COSTS: [u32; QUESTIONS_PER_TOPIC] = [10, 20, 30, 40, 50];

/// Error raised while loading or validating a topic package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Package file could not be read.
    #[error("failed to read package `{path}`")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Package file is not valid JSON.
    #[error("failed to parse package `{path}`")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Package content violates the topic/question shape.
    #[error("invalid package `{package}`: {message}")]
    Invalid {
        /// Short name of the offending package.
        package: String,
        /// Description of the violated rule.
        message: String,
    },
}

/// Reference to one topic of one package, used for played-topic exclusion.
///
/// `topic` is the 1-based topic number inside the set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicId {
    /// Identifier of the package the topic belongs to.
    pub set_id: String,
    /// 1-based topic number inside the package.
    pub topic: u32,
}

/// A themed group of exactly five questions of increasing value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Topic name announced before its first question.
    pub name: String,
    /// The five questions, ordered by cost.
    pub questions: Vec<Question>,
}

impl Topic {
    /// First question of the topic (cost 10).
    pub fn first(&self) -> &Question {
        &self.questions[0]
    }

    /// Question with the given cost, if present.
    pub fn by_cost(&self, cost: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.cost == cost)
    }

    /// Cost of the question following the one with `cost`, or `None` when
    /// the topic is exhausted.
    pub fn next_cost(&self, cost: u32) -> Option<u32> {
        let position = self.questions.iter().position(|q| q.cost == cost)?;
        self.questions.get(position + 1).map(|q| q.cost)
    }
}

/// An ordered, read-only set of topics loaded from a package file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSet {
    /// Short display name of the package.
    pub short_name: String,
    /// Free-form package description.
    #[serde(default)]
    pub description: String,
    /// Topics in play order.
    pub topics: Vec<Topic>,
}

impl TopicSet {
    /// Load and validate a package from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PackageError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| PackageError::Io {
            path: display.clone(),
            source,
        })?;
        let set: TopicSet =
            serde_json::from_str(&contents).map_err(|source| PackageError::Parse {
                path: display,
                source,
            })?;
        set.validate()?;
        Ok(set)
    }

    /// Topic by 0-based index.
    pub fn by_index(&self, index: usize) -> &Topic {
        &self.topics[index]
    }

    /// Verify that every topic holds exactly five questions with the
    /// canonical cost sequence.
    pub fn validate(&self) -> Result<(), PackageError> {
        for (index, topic) in self.topics.iter().enumerate() {
            let costs: Vec<u32> = topic.questions.iter().map(|q| q.cost).collect();
            if costs != COSTS {
                return Err(PackageError::Invalid {
                    package: self.short_name.clone(),
                    message: format!(
                        "topic {} (`{}`) must have question costs {COSTS:?}, got {costs:?}",
                        index + 1,
                        topic.name
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.into(),
            questions: COSTS
                .iter()
                .map(|&cost| Question {
                    cost,
                    text: format!("{name} for {cost}"),
                    answers: vec!["answer".into()],
                    comment: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn cost_cursor_walks_in_increasing_order() {
        let topic = topic("history");
        assert_eq!(topic.first().cost, 10);
        assert_eq!(topic.next_cost(10), Some(20));
        assert_eq!(topic.next_cost(40), Some(50));
        assert_eq!(topic.next_cost(50), None);
        assert_eq!(topic.by_cost(30).map(|q| q.cost), Some(30));
    }

    #[test]
    fn validation_rejects_wrong_cost_sequence() {
        let mut bad = topic("broken");
        bad.questions.remove(2);
        let set = TopicSet {
            short_name: "pkg".into(),
            description: String::new(),
            topics: vec![topic("fine"), bad],
        };
        let err = set.validate().unwrap_err();
        match err {
            PackageError::Invalid { package, message } => {
                assert_eq!(package, "pkg");
                assert!(message.contains("topic 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn topic_ids_compare_by_set_and_number() {
        let a = TopicId {
            set_id: "pkg".into(),
            topic: 3,
        };
        let b = TopicId {
            set_id: "pkg".into(),
            topic: 3,
        };
        assert_eq!(a, b);
        assert_ne!(
            a,
            TopicId {
                set_id: "pkg".into(),
                topic: 4
            }
        );
    }
}
