//! Session lifecycle state machine.

use std::sync::Arc;
use std::time::Duration;

use derive_getters::Getters;
use derive_new::new;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::game::{
    Difficulty, GameSession, Grade, PlayerId, RevealBlock, ScoringEngine, SessionId, SessionStatus,
    Stars,
};
use crate::leaderboard::{LeaderboardSync, ScoreRecord};
use crate::ledger::{
    DomainEvent, ExecutionMode, LedgerBridge, Operation, ReceiptEventExtractor, entrypoints,
};
use crate::session::{SessionError, SessionErrorKind};

/// Controller lifecycle states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
pub enum ControllerState {
    /// No session.
    #[default]
    Idle,
    /// Board shown face-up before play.
    AwaitingPreview,
    /// Accepting flips.
    Active,
    /// A face-up pair is being checked.
    Evaluating,
    /// Every pair matched.
    Completed,
    /// Given up.
    Abandoned,
}

/// Fixed delays of the play loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct SessionTiming {
    /// How long the board is shown before play.
    preview: Duration,
    /// How long a mismatched pair stays face-up.
    mismatch_settle: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_millis(1000))
    }
}

/// Who plays the sessions of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
pub struct PlayerIdentity {
    /// Stable player id.
    player_id: PlayerId,
    /// Name shown on the leaderboard.
    display_name: String,
}

/// Why a flip had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum IgnoreReason {
    /// The controller is not accepting flips.
    #[display("controller is {_0}")]
    NotPlayable(ControllerState),
    /// Another flip is still being confirmed.
    #[display("a flip is already in flight")]
    FlipInFlight,
    /// The tile cannot be revealed.
    #[display("{_0}")]
    Blocked(RevealBlock),
    /// No face-up pair is waiting for a match check.
    #[display("no pair is awaiting evaluation")]
    NoPairPending,
}

/// Final figures of a completed session.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct CompletionSummary {
    /// Completed session.
    session_id: SessionId,
    /// Final score.
    score: u64,
    /// Star rating.
    stars: Stars,
    /// Letter grade.
    grade: Grade,
    /// Evaluated pair attempts.
    moves: u32,
    /// Seconds from start to completion.
    elapsed_seconds: f64,
    /// Record handed to the leaderboard.
    record: ScoreRecord,
    /// Local leaderboard rank, when the commit succeeded and made the board.
    rank: Option<usize>,
}

/// Result of [`SessionController::flip`].
#[derive(Debug, Clone, PartialEq)]
pub enum FlipOutcome {
    /// Nothing changed.
    Ignored(IgnoreReason),
    /// First tile of a pair is face-up.
    Revealed {
        /// Revealed position.
        tile_index: usize,
    },
    /// The pair matched; play continues.
    Matched {
        /// Matched positions.
        pair: [usize; 2],
        /// Running score.
        score: u64,
    },
    /// The pair did not match and was turned back over.
    Mismatched {
        /// Positions turned back.
        pair: Vec<usize>,
    },
    /// The last pair matched.
    Completed(CompletionSummary),
    /// The session was abandoned or reset while the ledger answered.
    Discarded,
}

#[derive(Debug, Default)]
struct Inner {
    state: ControllerState,
    session: Option<GameSession>,
    generation: u64,
    in_flight: bool,
    preview_until: Option<Instant>,
}

impl Inner {
    fn advance_preview(&mut self) {
        if self.state == ControllerState::AwaitingPreview
            && self.preview_until.is_none_or(|until| Instant::now() >= until)
        {
            self.state = ControllerState::Active;
            self.preview_until = None;
            info!("Preview finished; session active");
        }
    }

    fn is_current(&self, generation: u64, session_id: SessionId) -> bool {
        self.generation == generation
            && self.session.as_ref().is_some_and(|s| *s.id() == session_id)
    }
}

/// Drives one game session at a time over a [`LedgerBridge`].
///
/// Cloning yields another handle to the same session, so an abandon issued
/// from one handle is observed by a flip awaiting on another.
#[derive(Debug, Clone)]
pub struct SessionController {
    bridge: Arc<dyn LedgerBridge>,
    extractor: ReceiptEventExtractor,
    scoring: ScoringEngine,
    leaderboard: Option<Arc<LeaderboardSync>>,
    identity: PlayerIdentity,
    timing: SessionTiming,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionController {
    /// Creates an idle controller.
    #[instrument(skip(bridge, scoring, clock), fields(mode = %bridge.mode()))]
    pub fn new(
        bridge: Arc<dyn LedgerBridge>,
        scoring: ScoringEngine,
        identity: PlayerIdentity,
        timing: SessionTiming,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!("Creating session controller");
        Self {
            bridge,
            extractor: ReceiptEventExtractor::new(),
            scoring,
            leaderboard: None,
            identity,
            timing,
            clock,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Hands completed sessions to `leaderboard`.
    pub fn with_leaderboard(mut self, leaderboard: Arc<LeaderboardSync>) -> Self {
        self.leaderboard = Some(leaderboard);
        self
    }

    /// Execution backend in use.
    pub fn mode(&self) -> ExecutionMode {
        self.bridge.mode()
    }

    /// Player driving this controller.
    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Current state, advancing the preview timer.
    pub fn state(&self) -> ControllerState {
        let mut inner = self.inner.lock();
        inner.advance_preview();
        inner.state
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> Option<GameSession> {
        let mut inner = self.inner.lock();
        inner.advance_preview();
        inner.session.clone()
    }

    /// Waits out the preview window and returns the resulting state.
    pub async fn wait_for_preview(&self) -> ControllerState {
        let until = self.inner.lock().preview_until;
        if let Some(until) = until {
            tokio::time::sleep_until(until).await;
        }
        self.state()
    }

    /// Creates a session and shows its board for the preview window.
    ///
    /// # Errors
    ///
    /// `SessionInProgress` while another session is starting or being
    /// played, `Superseded` if an abandon or reset overtook the start, and
    /// execution or decoding errors from the ledger.
    #[instrument(skip(self))]
    pub async fn start_session(&self, difficulty: Difficulty) -> Result<GameSession, SessionError> {
        let generation = {
            let mut inner = self.inner.lock();
            inner.advance_preview();
            let busy = matches!(
                inner.state,
                ControllerState::AwaitingPreview
                    | ControllerState::Active
                    | ControllerState::Evaluating
            );
            if busy || inner.in_flight {
                let current = inner.session.as_ref().map(|s| *s.id());
                return Err(SessionError::new(SessionErrorKind::SessionInProgress(current)));
            }
            inner.generation += 1;
            inner.in_flight = true;
            inner.session = None;
            inner.state = ControllerState::Idle;
            inner.preview_until = None;
            inner.generation
        };

        match self.create_session(difficulty).await {
            Ok(mut session) => {
                let mut inner = self.inner.lock();
                if inner.generation != generation {
                    warn!(session_id = session.id(), "Start overtaken; discarding session");
                    return Err(SessionError::new(SessionErrorKind::Superseded));
                }
                session.stamp_started(self.clock.now());
                inner.session = Some(session.clone());
                inner.state = ControllerState::AwaitingPreview;
                inner.preview_until = Some(Instant::now() + self.timing.preview);
                inner.in_flight = false;
                info!(session_id = session.id(), tiles = session.tiles().len(), "Session started");
                Ok(session)
            }
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation != generation {
                    return Err(SessionError::new(SessionErrorKind::Superseded));
                }
                inner.in_flight = false;
                Err(e)
            }
        }
    }

    async fn create_session(&self, difficulty: Difficulty) -> Result<GameSession, SessionError> {
        let outcome = self.bridge.submit(Operation::StartGame { difficulty }).await?;
        let session_ref = match self.extractor.decode(&outcome)? {
            DomainEvent::Started { session_ref } => session_ref,
            event => {
                return Err(SessionError::new(SessionErrorKind::UnexpectedEvent {
                    operation: entrypoints::START_GAME,
                    event,
                }));
            }
        };
        debug!(session_ref, "Ledger created session");

        let state = self
            .bridge
            .submit(Operation::GetGameState {
                session_id: session_ref,
            })
            .await?;
        Ok(self.extractor.decode_state(&state)?)
    }

    /// Reveals `tile_index`, evaluating the pair when it is the second tile.
    ///
    /// Invalid flips are no-ops reported as [`FlipOutcome::Ignored`]. A failed
    /// flip restores the session as it was on entry. A failed match check
    /// keeps both tiles face-up so the check can be repeated with
    /// [`SessionController::retry_check`]. Results arriving after an abandon
    /// or reset are discarded.
    ///
    /// # Errors
    ///
    /// `TileOutOfRange` for an index off the board, and execution, decoding
    /// or scoring errors from the evaluation.
    #[instrument(skip(self))]
    pub async fn flip(&self, tile_index: usize) -> Result<FlipOutcome, SessionError> {
        let (generation, checkpoint) = {
            let mut inner = self.inner.lock();
            inner.advance_preview();
            let state = inner.state;
            let in_flight = inner.in_flight;
            let Some(session) = inner.session.as_ref() else {
                return Ok(FlipOutcome::Ignored(IgnoreReason::NotPlayable(state)));
            };
            let len = session.tiles().len();
            if tile_index >= len {
                return Err(SessionError::new(SessionErrorKind::TileOutOfRange {
                    index: tile_index,
                    len,
                }));
            }
            if state != ControllerState::Active {
                debug!(%state, "Flip ignored");
                return Ok(FlipOutcome::Ignored(IgnoreReason::NotPlayable(state)));
            }
            if in_flight {
                debug!("Flip ignored; another flip in flight");
                return Ok(FlipOutcome::Ignored(IgnoreReason::FlipInFlight));
            }
            if let Some(block) = session.reveal_block(tile_index) {
                debug!(%block, "Flip ignored");
                return Ok(FlipOutcome::Ignored(IgnoreReason::Blocked(block)));
            }
            let checkpoint = session.clone();
            inner.in_flight = true;
            (inner.generation, checkpoint)
        };
        let session_id = *checkpoint.id();

        let flipped = self
            .bridge
            .submit(Operation::FlipCard {
                session_id,
                tile_index,
            })
            .await
            .map_err(|e| SessionError::from(e))
            .and_then(|outcome| Ok(self.extractor.decode(&outcome)?));
        let event = match flipped {
            Ok(event) => event,
            Err(e) => return self.roll_back(generation, checkpoint, e),
        };
        if !matches!(event, DomainEvent::Flipped { tile_index: i } if i == tile_index) {
            let e = SessionError::new(SessionErrorKind::UnexpectedEvent {
                operation: entrypoints::FLIP_CARD,
                event,
            });
            return self.roll_back(generation, checkpoint, e);
        }

        let pending = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation, session_id) {
                info!(session_id, tile_index, "Late flip confirmation discarded");
                return Ok(FlipOutcome::Discarded);
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(FlipOutcome::Discarded);
            };
            session.reveal(tile_index);
            if !session.pair_pending() {
                inner.in_flight = false;
                debug!(session_id, tile_index, "Tile revealed");
                return Ok(FlipOutcome::Revealed { tile_index });
            }
            let pending = session.clone();
            inner.state = ControllerState::Evaluating;
            debug!(session_id, "Pair face-up; evaluating");
            pending
        };

        // The ledger has both tiles face-up now, so a failed check must not
        // hide the second one again.
        self.evaluate(generation, session_id, pending).await
    }

    /// Repeats the match check for a face-up pair left by a failed check.
    ///
    /// # Errors
    ///
    /// Execution, decoding or scoring errors from the evaluation; the pair
    /// stays face-up and can be retried again.
    #[instrument(skip(self))]
    pub async fn retry_check(&self) -> Result<FlipOutcome, SessionError> {
        let (generation, pending) = {
            let mut inner = self.inner.lock();
            inner.advance_preview();
            let state = inner.state;
            if state != ControllerState::Active {
                debug!(%state, "Retry ignored");
                return Ok(FlipOutcome::Ignored(IgnoreReason::NotPlayable(state)));
            }
            if inner.in_flight {
                debug!("Retry ignored; another flip in flight");
                return Ok(FlipOutcome::Ignored(IgnoreReason::FlipInFlight));
            }
            let Some(session) = inner.session.as_ref().filter(|s| s.pair_pending()) else {
                debug!("Retry ignored; no pair pending");
                return Ok(FlipOutcome::Ignored(IgnoreReason::NoPairPending));
            };
            let pending = session.clone();
            inner.in_flight = true;
            inner.state = ControllerState::Evaluating;
            (inner.generation, pending)
        };
        let session_id = *pending.id();
        info!(session_id, "Retrying match check");

        self.evaluate(generation, session_id, pending).await
    }

    async fn evaluate(
        &self,
        generation: u64,
        session_id: SessionId,
        checkpoint: GameSession,
    ) -> Result<FlipOutcome, SessionError> {
        let checked = self
            .bridge
            .submit(Operation::CheckMatch { session_id })
            .await
            .map_err(|e| SessionError::from(e))
            .and_then(|outcome| Ok(self.extractor.decode(&outcome)?));
        let event = match checked {
            Ok(event) => event,
            Err(e) => return self.roll_back(generation, checkpoint, e),
        };

        match event {
            DomainEvent::Matched | DomainEvent::Completed => {
                self.apply_match(generation, session_id, checkpoint).await
            }
            DomainEvent::Mismatched => {
                tokio::time::sleep(self.timing.mismatch_settle).await;
                let mut inner = self.inner.lock();
                if !inner.is_current(generation, session_id) {
                    info!(session_id, "Late mismatch discarded");
                    return Ok(FlipOutcome::Discarded);
                }
                let Some(session) = inner.session.as_mut() else {
                    return Ok(FlipOutcome::Discarded);
                };
                let pair = session.resolve_mismatch();
                inner.state = ControllerState::Active;
                inner.in_flight = false;
                info!(session_id, ?pair, "Pair mismatched");
                Ok(FlipOutcome::Mismatched { pair })
            }
            event => {
                let e = SessionError::new(SessionErrorKind::UnexpectedEvent {
                    operation: entrypoints::CHECK_MATCH,
                    event,
                });
                self.roll_back(generation, checkpoint, e)
            }
        }
    }

    async fn apply_match(
        &self,
        generation: u64,
        session_id: SessionId,
        checkpoint: GameSession,
    ) -> Result<FlipOutcome, SessionError> {
        let now = self.clock.now();
        let completed = {
            let mut inner = self.inner.lock();
            if !inner.is_current(generation, session_id) {
                info!(session_id, "Late match discarded");
                return Ok(FlipOutcome::Discarded);
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(FlipOutcome::Discarded);
            };

            let mut updated = session.clone();
            let pair = updated.resolve_match();
            let score = match self.scoring.score(
                *updated.difficulty(),
                *updated.moves(),
                updated.elapsed_seconds(now),
            ) {
                Ok(score) => score,
                Err(e) => {
                    drop(inner);
                    return self.roll_back(generation, checkpoint, e.into());
                }
            };
            updated.set_score(score);

            if !updated.all_matched() {
                *session = updated;
                inner.state = ControllerState::Active;
                inner.in_flight = false;
                info!(session_id, ?pair, score, "Pair matched");
                return Ok(FlipOutcome::Matched { pair, score });
            }

            updated.complete(now);
            *session = updated.clone();
            inner.state = ControllerState::Completed;
            inner.in_flight = false;
            info!(session_id, score, moves = updated.moves(), "Session completed");
            updated
        };

        let summary = self.summarize(&completed).await?;
        Ok(FlipOutcome::Completed(summary))
    }

    async fn summarize(&self, session: &GameSession) -> Result<CompletionSummary, SessionError> {
        let finished_at = session.completed_at().unwrap_or_else(|| self.clock.now());
        let elapsed = session.elapsed_seconds(finished_at);
        let rating = self
            .scoring
            .rate(*session.difficulty(), *session.moves(), elapsed)?;
        let record = ScoreRecord::new(
            self.identity.player_id().clone(),
            self.identity.display_name().clone(),
            *session.score(),
            *session.moves(),
            elapsed,
            *session.difficulty(),
            finished_at,
        );

        let rank = match &self.leaderboard {
            None => None,
            Some(leaderboard) => match leaderboard.commit(record.clone()).await {
                Ok(receipt) => receipt.entry().as_ref().map(|e| *e.rank()),
                Err(e) => {
                    warn!(error = %e, "Leaderboard commit failed");
                    None
                }
            },
        };

        Ok(CompletionSummary {
            session_id: *session.id(),
            score: *session.score(),
            stars: *rating.stars(),
            grade: *rating.grade(),
            moves: *session.moves(),
            elapsed_seconds: elapsed,
            record,
            rank,
        })
    }

    fn roll_back(
        &self,
        generation: u64,
        checkpoint: GameSession,
        error: SessionError,
    ) -> Result<FlipOutcome, SessionError> {
        let mut inner = self.inner.lock();
        let session_id = *checkpoint.id();
        if !inner.is_current(generation, session_id) {
            info!(session_id, error = %error, "Late failure discarded");
            return Ok(FlipOutcome::Discarded);
        }
        inner.session = Some(checkpoint);
        inner.state = ControllerState::Active;
        inner.in_flight = false;
        warn!(session_id, error = %error, "Flip rolled back");
        Err(error)
    }

    /// Abandons the current session, if any.
    ///
    /// Local state moves to `Abandoned` before the ledger is told, so any
    /// result still in flight for the old session is discarded.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if the abandon could not be recorded there;
    /// the controller is `Abandoned` either way.
    #[instrument(skip(self))]
    pub async fn abandon(&self) -> Result<(), SessionError> {
        let target = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.in_flight = false;
            inner.preview_until = None;
            inner.state = ControllerState::Abandoned;
            inner
                .session
                .take()
                .filter(|s| *s.status() == SessionStatus::Active)
                .map(|s| *s.id())
        };

        let Some(session_id) = target else {
            info!("Abandoned with no active session");
            return Ok(());
        };
        info!(session_id, "Session abandoned");

        let outcome = self
            .bridge
            .submit(Operation::AbandonGame { session_id })
            .await?;
        match self.extractor.decode(&outcome)? {
            DomainEvent::Abandoned => debug!(session_id, "Ledger recorded abandon"),
            event => warn!(session_id, ?event, "Unexpected event for abandon"),
        }
        Ok(())
    }

    /// Drops any session, including a completed one, and returns to `Idle`.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.in_flight = false;
        inner.preview_until = None;
        inner.session = None;
        inner.state = ControllerState::Idle;
        info!("Controller reset");
    }
}
