//! In-process stand-in for the game contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::game::{DeckGenerator, GameSession, PlayerId, ScoringEngine, SessionId, SessionStatus};
use crate::ledger::{
    DomainEvent, ExecutionError, ExecutionMode, LedgerBridge, Operation, RawOutcome,
};

#[derive(Debug)]
struct SimulatorState {
    deck: DeckGenerator,
    games: HashMap<SessionId, GameSession>,
    next_id: SessionId,
}

/// Executes operations synchronously against in-memory sessions.
///
/// Mirrors the contract's rules so the controller drives both modes through
/// the same verbs. The only failures are contract violations a correct
/// caller never triggers.
#[derive(Debug)]
pub struct LocalSimulator {
    player_id: PlayerId,
    scoring: ScoringEngine,
    clock: Arc<dyn Clock>,
    state: Mutex<SimulatorState>,
}

impl LocalSimulator {
    /// Creates a simulator for `player_id`.
    #[instrument(skip(deck, scoring, clock))]
    pub fn new(
        player_id: PlayerId,
        deck: DeckGenerator,
        scoring: ScoringEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!("Creating local simulator");
        Self {
            player_id,
            scoring,
            clock,
            state: Mutex::new(SimulatorState {
                deck,
                games: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Copy of a simulated session.
    pub fn game(&self, session_id: SessionId) -> Option<GameSession> {
        self.state.lock().games.get(&session_id).cloned()
    }

    fn execute(&self, operation: Operation) -> Result<RawOutcome, ExecutionError> {
        let mut state = self.state.lock();
        match operation {
            Operation::StartGame { difficulty } => {
                let tiles = state
                    .deck
                    .generate(difficulty)
                    .map_err(|e| ExecutionError::state_violation(e.kind.to_string()))?;
                let id = state.next_id;
                state.next_id += 1;
                let session = GameSession::new(
                    id,
                    self.player_id.clone(),
                    difficulty,
                    tiles,
                    self.clock.now(),
                );
                state.games.insert(id, session);
                info!(session_id = id, %difficulty, "Simulated game started");
                Ok(RawOutcome::Event(DomainEvent::Started { session_ref: id }))
            }
            Operation::FlipCard {
                session_id,
                tile_index,
            } => {
                let game = Self::game_mut(&mut state.games, session_id)?;
                if let Some(block) = game.reveal_block(tile_index) {
                    warn!(session_id, tile_index, %block, "Rejected simulated flip");
                    return Err(ExecutionError::state_violation(format!(
                        "flip {tile_index} in game {session_id}: {block}"
                    )));
                }
                game.reveal(tile_index);
                debug!(session_id, tile_index, "Simulated flip");
                Ok(RawOutcome::Event(DomainEvent::Flipped { tile_index }))
            }
            Operation::CheckMatch { session_id } => {
                let now = self.clock.now();
                let game = Self::game_mut(&mut state.games, session_id)?;
                let Some(is_match) = game.pending_pair_matches() else {
                    return Err(ExecutionError::state_violation(format!(
                        "check_match in game {session_id} with {} face-up",
                        game.face_up().len()
                    )));
                };
                if !is_match {
                    game.resolve_mismatch();
                    debug!(session_id, "Simulated mismatch");
                    return Ok(RawOutcome::Event(DomainEvent::Mismatched));
                }

                game.resolve_match();
                let score = self
                    .scoring
                    .score(*game.difficulty(), *game.moves(), game.elapsed_seconds(now))
                    .map_err(|e| ExecutionError::state_violation(e.kind.to_string()))?;
                game.set_score(score);
                if game.all_matched() {
                    game.complete(now);
                    info!(session_id, score, "Simulated game completed");
                }
                Ok(RawOutcome::Event(DomainEvent::Matched))
            }
            Operation::AbandonGame { session_id } => {
                let game = Self::game_mut(&mut state.games, session_id)?;
                if *game.status() != SessionStatus::Active {
                    return Err(ExecutionError::state_violation(format!(
                        "abandon game {session_id} in status {}",
                        game.status()
                    )));
                }
                game.abandon();
                info!(session_id, "Simulated game abandoned");
                Ok(RawOutcome::Event(DomainEvent::Abandoned))
            }
            Operation::GetGameState { session_id } => {
                let game = Self::game_mut(&mut state.games, session_id)?;
                Ok(RawOutcome::State(Box::new(game.clone())))
            }
        }
    }

    fn game_mut(
        games: &mut HashMap<SessionId, GameSession>,
        session_id: SessionId,
    ) -> Result<&mut GameSession, ExecutionError> {
        games
            .get_mut(&session_id)
            .ok_or_else(|| ExecutionError::state_violation(format!("unknown game {session_id}")))
    }
}

#[async_trait]
impl LedgerBridge for LocalSimulator {
    #[instrument(
        skip(self),
        fields(entrypoint = operation.entrypoint(), session_id = ?operation.session_id())
    )]
    async fn submit(&self, operation: Operation) -> Result<RawOutcome, ExecutionError> {
        self.execute(operation)
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Local
    }
}
