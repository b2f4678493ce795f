//! Phases of the session state machine.

/// High-level phase a game session can be in.
///
/// Transitions are driven by two event sources: inbound chat messages
/// matched against the current phase, and the periodic tick performing the
/// phase's elapsed-deadline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Tournament-only: waiting for players and a judge to register.
    Registration,
    /// Waiting for registered players to join the room (or the wait cap).
    BeforeGame,
    /// Between topics: announce the next topic or end the game.
    BeforeTopic,
    /// Topic announced; the first question is about to be asked.
    BeforeFirstQuestion,
    /// Question shown; race to buzz in with `+`.
    Question,
    /// One player holds the exclusive right to answer.
    Answer,
    /// Question resolved; scoring pending, corrections accepted.
    AfterQuestion,
    /// Score checkpoint before the last question of the last topic.
    SpecialScore,
    /// Tournament-only: waiting for the judge's yes/no decision.
    JudgeDecision,
    /// Terminal: cooldown before the room is freed.
    AfterGame,
}

impl Phase {
    /// Whether `/pause` is accepted in this phase. Pausing mid-buzz is
    /// blocked uniformly: never during `Question`, `Answer`, or the judge
    /// decision, and never once the game is over.
    pub fn allows_pause(self) -> bool {
        !matches!(
            self,
            Phase::Question | Phase::Answer | Phase::JudgeDecision | Phase::AfterGame
        )
    }

    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::AfterGame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_is_blocked_mid_buzz_and_after_game() {
        assert!(!Phase::Question.allows_pause());
        assert!(!Phase::Answer.allows_pause());
        assert!(!Phase::JudgeDecision.allows_pause());
        assert!(!Phase::AfterGame.allows_pause());
        assert!(Phase::BeforeTopic.allows_pause());
        assert!(Phase::AfterQuestion.allows_pause());
    }
}
