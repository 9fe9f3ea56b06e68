//! Deterministic score, star and grade computation.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::game::{Difficulty, ScoringError, TierTable};

/// Constants of the scoring formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct ScoringRules {
    /// Points before bonus and penalty.
    base_score: f64,
    /// Largest possible time bonus.
    time_bonus_cap: f64,
    /// Bonus lost per elapsed second.
    time_decay_rate: f64,
    /// Points lost per move beyond optimal.
    penalty_per_extra_move: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::new(1000.0, 500.0, 2.0, 50.0)
    }
}

/// Star rating, one to three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stars(u8);

impl Stars {
    /// Number of stars.
    pub fn count(self) -> u8 {
        self.0
    }
}

/// Letter grade for a final score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
pub enum Grade {
    /// 12 000 and above.
    S,
    /// 11 000 and above.
    A,
    /// 10 000 and above.
    B,
    /// 9 000 and above.
    C,
    /// 8 000 and above.
    D,
    /// Below 8 000.
    F,
}

/// Score, stars and grade for one finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct Rating {
    /// Final score.
    score: u64,
    /// Star rating.
    stars: Stars,
    /// Letter grade.
    grade: Grade,
}

/// Pure scoring functions over a tier table.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    tiers: TierTable,
    rules: ScoringRules,
}

impl ScoringEngine {
    /// Creates an engine with the default rules.
    pub fn new(tiers: TierTable) -> Self {
        Self::with_rules(tiers, ScoringRules::default())
    }

    /// Creates an engine with custom rules.
    pub fn with_rules(tiers: TierTable, rules: ScoringRules) -> Self {
        Self { tiers, rules }
    }

    /// Formula constants.
    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Minimum number of moves to clear `tier`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if the tier is not configured.
    pub fn optimal_moves(&self, tier: Difficulty) -> Result<u32, ScoringError> {
        let pairs = self
            .tiers
            .pair_count(tier)
            .map_err(|e| ScoringError::invalid_input(e.kind.to_string()))?;
        Ok(pairs as u32)
    }

    /// Computes the score of a session.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if `elapsed_seconds` is negative or not
    /// finite, or the tier is not configured.
    #[instrument(skip(self))]
    pub fn score(
        &self,
        tier: Difficulty,
        moves: u32,
        elapsed_seconds: f64,
    ) -> Result<u64, ScoringError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(ScoringError::invalid_input(format!(
                "elapsed seconds must be finite and non-negative, got {elapsed_seconds}"
            )));
        }
        let spec = self
            .tiers
            .spec(tier)
            .map_err(|e| ScoringError::invalid_input(e.kind.to_string()))?;
        let optimal = *spec.pair_count() as u32;

        let rules = &self.rules;
        let time_bonus =
            (rules.time_bonus_cap - elapsed_seconds * rules.time_decay_rate).max(0.0);
        let extra_moves = moves.saturating_sub(optimal);
        let move_penalty = f64::from(extra_moves) * rules.penalty_per_extra_move;
        let raw = ((rules.base_score + time_bonus - move_penalty) * spec.multiplier()).floor();
        let score = raw.max(0.0) as u64;

        debug!(time_bonus, move_penalty, score, "Score computed");
        Ok(score)
    }

    /// Star rating from the move ratio against optimal.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if `optimal_moves` is zero.
    pub fn stars(moves: u32, optimal_moves: u32) -> Result<Stars, ScoringError> {
        if optimal_moves == 0 {
            return Err(ScoringError::invalid_input("optimal moves must be positive"));
        }
        let ratio = f64::from(moves) * 100.0 / f64::from(optimal_moves);
        let stars = if ratio <= 110.0 {
            3
        } else if ratio <= 150.0 {
            2
        } else {
            1
        };
        Ok(Stars(stars))
    }

    /// Letter grade from fixed score bands.
    pub fn grade(score: u64) -> Grade {
        match score {
            s if s >= 12_000 => Grade::S,
            s if s >= 11_000 => Grade::A,
            s if s >= 10_000 => Grade::B,
            s if s >= 9_000 => Grade::C,
            s if s >= 8_000 => Grade::D,
            _ => Grade::F,
        }
    }

    /// Score, stars and grade in one call.
    ///
    /// # Errors
    ///
    /// Propagates [`ScoringError`] from [`Self::score`] and [`Self::stars`].
    #[instrument(skip(self))]
    pub fn rate(
        &self,
        tier: Difficulty,
        moves: u32,
        elapsed_seconds: f64,
    ) -> Result<Rating, ScoringError> {
        let score = self.score(tier, moves, elapsed_seconds)?;
        let stars = Self::stars(moves, self.optimal_moves(tier)?)?;
        Ok(Rating::new(score, stars, Self::grade(score)))
    }
}
