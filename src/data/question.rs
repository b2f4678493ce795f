//! Single question of a topic, including the acceptable-answer matcher.

use serde::{Deserialize, Serialize};

/// One question with its point value and canonical answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Point value awarded (or deducted) for this question.
    pub cost: u32,
    /// Question text shown to the players.
    pub text: String,
    /// Canonical answers accepted by the automatic check.
    pub answers: Vec<String>,
    /// Optional author comment revealed together with the answer.
    #[serde(default)]
    pub comment: String,
}

impl Question {
    /// Check a submitted answer against the canonical answer set.
    ///
    /// Both sides are normalized (lowercase, letters and digits only, `ё`
    /// folded to `е`) and compared in four combinations: parenthesised
    /// fragments stripped or kept on either side. Any match counts.
    pub fn check_answer(&self, submitted: &str) -> bool {
        let submitted = submitted.trim();
        for expected in &self.answers {
            for strip_expected in [false, true] {
                for strip_submitted in [false, true] {
                    if normalize(expected, strip_expected) == normalize(submitted, strip_submitted)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Render the canonical answers and comment for the reveal message.
    pub fn author_answers(&self) -> String {
        let mut result = String::new();
        for answer in &self.answers {
            if !result.is_empty() {
                result.push_str("\nAlso accepted: ");
            }
            result.push_str(answer);
        }
        if !self.comment.is_empty() {
            result.push_str("\nComment: ");
            result.push_str(&self.comment);
        }
        result
    }
}

/// Reduce an answer to its comparable form.
///
/// Keeps alphanumeric characters only, lowercased, with the `ё` variant
/// folded into `е`. When `skip_parentheses` is set, anything nested inside
/// `()`, `[]`, or `{}` is dropped as well.
fn normalize(answer: &str, skip_parentheses: bool) -> String {
    let mut result = String::new();
    let mut depth = 0i32;
    for c in answer.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if c.is_alphanumeric() && (depth == 0 || !skip_parentheses) => {
                let c = match c {
                    'ё' | 'Ё' => 'е',
                    other => other,
                };
                result.extend(c.to_lowercase());
            }
            _ => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(answers: &[&str]) -> Question {
        Question {
            cost: 10,
            text: "?".into(),
            answers: answers.iter().map(|a| a.to_string()).collect(),
            comment: String::new(),
        }
    }

    #[test]
    fn exact_answer_matches() {
        assert!(question(&["Pushkin"]).check_answer("Pushkin"));
    }

    #[test]
    fn casing_and_whitespace_are_ignored() {
        let q = question(&["Alexander Pushkin"]);
        assert!(q.check_answer("  alexander  PUSHKIN "));
        assert!(q.check_answer("alexanderpushkin"));
    }

    #[test]
    fn punctuation_is_ignored() {
        assert!(question(&["Rimsky-Korsakov"]).check_answer("rimsky korsakov"));
    }

    #[test]
    fn yo_variant_folds_to_base_letter() {
        let q = question(&["Пётр Первый"]);
        assert!(q.check_answer("петр первый"));
        assert!(question(&["петр"]).check_answer("пётр"));
    }

    #[test]
    fn parenthesised_fragment_is_optional_on_either_side() {
        let q = question(&["(Alexander) Pushkin"]);
        assert!(q.check_answer("Pushkin"));
        assert!(q.check_answer("Alexander Pushkin"));

        let q = question(&["Pushkin"]);
        assert!(q.check_answer("Pushkin (the poet)"));
    }

    #[test]
    fn any_canonical_answer_counts() {
        let q = question(&["Leo Tolstoy", "Tolstoy"]);
        assert!(q.check_answer("tolstoy"));
    }

    #[test]
    fn wrong_answer_is_rejected() {
        assert!(!question(&["Pushkin"]).check_answer("Lermontov"));
    }

    #[test]
    fn author_answers_lists_alternatives_and_comment() {
        let mut q = question(&["A", "B"]);
        q.comment = "tricky".into();
        assert_eq!(q.author_answers(), "A\nAlso accepted: B\nComment: tricky");
    }
}
