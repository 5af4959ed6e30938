//! Pure scoring engine (spec §4.4). No I/O; every function takes a
//! `ScoreState` and an event and returns the next state plus the outcome to
//! broadcast. All arithmetic is integer except the one-decimal multiplier.

use serde::{Deserialize, Serialize};

/// Per-player scoring state, embedded in `Player`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreState {
    pub total_score: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub streak_multiplier: f64,
    pub comeback_credits: u8,
    pub last_death_score: u64,
    pub comeback_start_score: u64,
    pub pending_question_id: Option<String>,
    pub questions_answered: u32,
    pub questions_correct: u32,
    pub total_answer_time_ms: u64,
    pub games_played: u32,
    /// Cumulative count of comeback credits actually consumed on a death,
    /// independent of `comeback_credits`'s current balance. Drives the
    /// Comeback King award's "highest ratio of credits used".
    pub comebacks_used: u32,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            total_score: 0,
            current_streak: 0,
            best_streak: 0,
            streak_multiplier: 1.0,
            comeback_credits: 0,
            last_death_score: 0,
            comeback_start_score: 0,
            pending_question_id: None,
            questions_answered: 0,
            questions_correct: 0,
            total_answer_time_ms: 0,
            games_played: 0,
            comebacks_used: 0,
        }
    }
}

impl ScoreState {
    pub fn avg_time_ms(&self) -> f64 {
        if self.questions_answered == 0 {
            0.0
        } else {
            self.total_answer_time_ms as f64 / self.questions_answered as f64
        }
    }
}

/// `streak_multiplier = clamp(1.0 + 0.25 * floor(streak / 3), 1.0, 2.0)`.
pub fn multiplier_for_streak(streak: u32) -> f64 {
    let raw = 1.0 + 0.25 * (streak / 3) as f64;
    raw.clamp(1.0, 2.0)
}

/// Outcome of `death`: a question is about to be issued.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathOutcome {
    pub effective_score: u64,
    pub comeback_start_score: u64,
}

/// Apply a `death{run_score}` event. Sets `pending_question_id` via the
/// caller once a question has actually been drawn; this function only
/// updates the scoring fields.
pub fn death(state: &mut ScoreState, run_score: u64) -> DeathOutcome {
    let effective_score = (run_score as f64 * state.streak_multiplier).floor() as u64;
    state.last_death_score = effective_score;

    let comeback_start_score = if state.comeback_credits > 0 {
        state.comeback_credits -= 1;
        state.comebacks_used += 1;
        (state.last_death_score as f64 * 0.5).floor() as u64
    } else {
        0
    };
    state.comeback_start_score = comeback_start_score;

    DeathOutcome {
        effective_score,
        comeback_start_score,
    }
}

/// Outcome of `answer_correct`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCorrectOutcome {
    pub bonus_earned: u64,
    pub total_score: u64,
    pub current_streak: u32,
    pub streak_multiplier: f64,
    pub comeback_credits: u8,
    pub comeback_start_score: u64,
    pub respawn: bool,
}

/// Apply an `answer_correct` event.
pub fn answer_correct(state: &mut ScoreState, time_ms: u64) -> AnswerCorrectOutcome {
    state.current_streak += 1;
    state.best_streak = state.best_streak.max(state.current_streak);
    state.streak_multiplier = multiplier_for_streak(state.current_streak);
    state.comeback_credits = (state.comeback_credits + 1).min(5);

    let bonus_earned = state.last_death_score;
    state.total_score = state.total_score.saturating_add(bonus_earned);

    state.questions_answered += 1;
    state.questions_correct += 1;
    state.total_answer_time_ms += time_ms;
    state.pending_question_id = None;

    AnswerCorrectOutcome {
        bonus_earned,
        total_score: state.total_score,
        current_streak: state.current_streak,
        streak_multiplier: state.streak_multiplier,
        comeback_credits: state.comeback_credits,
        comeback_start_score: state.comeback_start_score,
        respawn: true,
    }
}

/// Outcome of `answer_wrong`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerWrongOutcome {
    pub current_streak: u32,
    pub streak_multiplier: f64,
    pub respawn: bool,
}

/// Apply an `answer_wrong` event. The run's effective score is forfeited.
pub fn answer_wrong(state: &mut ScoreState, time_ms: u64) -> AnswerWrongOutcome {
    state.current_streak = 0;
    state.streak_multiplier = 1.0;
    state.questions_answered += 1;
    state.total_answer_time_ms += time_ms;
    state.pending_question_id = None;

    AnswerWrongOutcome {
        current_streak: state.current_streak,
        streak_multiplier: state.streak_multiplier,
        respawn: false,
    }
}
