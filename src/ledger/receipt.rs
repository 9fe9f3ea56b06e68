//! Decoding of raw ledger outcomes into typed events and session state.
//!
//! Every supported provider version has one explicit receipt schema. Shapes
//! that do not fit the declared schema fail with [`ExtractError`] rather than
//! being probed for alternative field names, and a receipt without a known
//! game event is an error, never a guess.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::game::{Difficulty, GameSession, SessionStatus, Tile, TileValue};
use crate::ledger::{
    DomainEvent, ExtractError, RawOutcome, RawReceipt, ReceiptSchema, parse_scalar,
};

/// One log entry emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Getters)]
pub struct EmittedEvent {
    /// Emitting contract.
    #[serde(default)]
    from_address: Option<String>,
    /// Event keys; the first is the event tag.
    keys: Vec<String>,
    /// Event payload.
    data: Vec<String>,
}

/// Schema-independent view of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ParsedReceipt {
    /// Transaction hash.
    tx_hash: String,
    /// Set when the transaction reverted.
    revert_reason: Option<String>,
    /// Emitted events in order.
    events: Vec<EmittedEvent>,
}

#[derive(Debug, Deserialize)]
struct LegacyReceipt {
    transaction_hash: String,
    status: String,
    #[serde(default)]
    revert_reason: Option<String>,
    #[serde(default)]
    events: Vec<EmittedEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ExecutionStatus {
    Succeeded,
    Reverted,
}

#[derive(Debug, Deserialize)]
struct Rpc07Receipt {
    transaction_hash: String,
    execution_status: ExecutionStatus,
    #[allow(dead_code)]
    finality_status: String,
    #[serde(default)]
    revert_reason: Option<String>,
    #[serde(default)]
    events: Vec<EmittedEvent>,
}

/// Game events the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownEvent {
    GameStarted,
    CardFlipped,
    CardsMatched,
    CardsMismatched,
    GameCompleted,
    GameAbandoned,
}

impl KnownEvent {
    const ALL: [KnownEvent; 6] = [
        KnownEvent::GameStarted,
        KnownEvent::CardFlipped,
        KnownEvent::CardsMatched,
        KnownEvent::CardsMismatched,
        KnownEvent::GameCompleted,
        KnownEvent::GameAbandoned,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::GameStarted => "GameStarted",
            Self::CardFlipped => "CardFlipped",
            Self::CardsMatched => "CardsMatched",
            Self::CardsMismatched => "CardsMismatched",
            Self::GameCompleted => "GameCompleted",
            Self::GameAbandoned => "GameAbandoned",
        }
    }

    /// Matches a bare name or a path ending in `::Name`.
    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| {
            let name = event.name();
            tag == name
                || tag
                    .strip_suffix(name)
                    .is_some_and(|prefix| prefix.ends_with("::"))
        })
    }
}

/// Turns raw bridge outcomes into [`DomainEvent`]s and session snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptEventExtractor;

impl ReceiptEventExtractor {
    /// Creates an extractor.
    pub fn new() -> Self {
        Self
    }

    /// Parses a receipt according to its declared schema.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the body does not fit the schema.
    #[instrument(skip(self, receipt), fields(schema = %receipt.schema(), tx_hash = %receipt.tx_hash()))]
    pub fn parse(&self, receipt: &RawReceipt) -> Result<ParsedReceipt, ExtractError> {
        let body = receipt.body().clone();
        match receipt.schema() {
            ReceiptSchema::Legacy => {
                let r: LegacyReceipt = serde_json::from_value(body)
                    .map_err(|e| ExtractError::new(format!("legacy receipt: {e}")))?;
                let reverted = matches!(r.status.as_str(), "REJECTED" | "REVERTED");
                Ok(ParsedReceipt {
                    tx_hash: r.transaction_hash,
                    revert_reason: reverted
                        .then(|| r.revert_reason.unwrap_or_else(|| r.status.clone())),
                    events: r.events,
                })
            }
            ReceiptSchema::Rpc07 => {
                let r: Rpc07Receipt = serde_json::from_value(body)
                    .map_err(|e| ExtractError::new(format!("rpc 0.7 receipt: {e}")))?;
                let revert_reason = match r.execution_status {
                    ExecutionStatus::Succeeded => None,
                    ExecutionStatus::Reverted => Some(
                        r.revert_reason
                            .unwrap_or_else(|| "reverted without reason".to_string()),
                    ),
                };
                Ok(ParsedReceipt {
                    tx_hash: r.transaction_hash,
                    revert_reason,
                    events: r.events,
                })
            }
        }
    }

    /// Decodes the first known game event of an outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the receipt is malformed, reverted,
    /// carries no known event, or the outcome is a read result.
    #[instrument(skip(self, outcome))]
    pub fn decode(&self, outcome: &RawOutcome) -> Result<DomainEvent, ExtractError> {
        let receipt = match outcome {
            RawOutcome::Event(event) => return Ok(*event),
            RawOutcome::Receipt(receipt) => receipt,
            RawOutcome::State(_) | RawOutcome::CallResult(_) => {
                return Err(ExtractError::new("read outcome carries no event"));
            }
        };

        let parsed = self.parse(receipt)?;
        if let Some(reason) = parsed.revert_reason() {
            return Err(ExtractError::new(format!(
                "transaction {} reverted: {reason}",
                parsed.tx_hash()
            )));
        }

        for entry in parsed.events() {
            let Some(tag) = entry.keys().first() else {
                continue;
            };
            let Some(known) = KnownEvent::from_tag(tag) else {
                debug!(tag = %tag, "Skipping unrelated event");
                continue;
            };
            let event = Self::decode_payload(known, entry.data())?;
            debug!(?event, "Decoded receipt event");
            return Ok(event);
        }

        warn!(tx_hash = %parsed.tx_hash(), events = parsed.events().len(), "No game event in receipt");
        Err(ExtractError::new(format!(
            "no game event in receipt {}",
            parsed.tx_hash()
        )))
    }

    fn decode_payload(known: KnownEvent, data: &[String]) -> Result<DomainEvent, ExtractError> {
        let scalar = |pos: usize, field: &str| -> Result<u64, ExtractError> {
            let raw = data.get(pos).ok_or_else(|| {
                ExtractError::new(format!("{} missing {field}", known.name()))
            })?;
            parse_scalar(raw).ok_or_else(|| {
                ExtractError::new(format!("{} has invalid {field}: {raw}", known.name()))
            })
        };

        Ok(match known {
            KnownEvent::GameStarted => DomainEvent::Started {
                session_ref: scalar(0, "game_id")?,
            },
            KnownEvent::CardFlipped => DomainEvent::Flipped {
                tile_index: scalar(1, "card_index")? as usize,
            },
            KnownEvent::CardsMatched => DomainEvent::Matched,
            KnownEvent::CardsMismatched => DomainEvent::Mismatched,
            KnownEvent::GameCompleted => DomainEvent::Completed,
            KnownEvent::GameAbandoned => DomainEvent::Abandoned,
        })
    }

    /// Decodes a session snapshot from a read outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the outcome is not a read result or the
    /// felts do not follow the `get_game` layout.
    #[instrument(skip(self, outcome))]
    pub fn decode_state(&self, outcome: &RawOutcome) -> Result<GameSession, ExtractError> {
        match outcome {
            RawOutcome::State(session) => Ok(session.as_ref().clone()),
            RawOutcome::CallResult(felts) => decode_game_felts(felts),
            RawOutcome::Event(_) | RawOutcome::Receipt(_) => {
                Err(ExtractError::new("outcome is not a state read"))
            }
        }
    }
}

struct FeltCursor<'a> {
    felts: &'a [String],
    pos: usize,
}

impl<'a> FeltCursor<'a> {
    fn raw(&mut self, field: &str) -> Result<&'a str, ExtractError> {
        let felt = self
            .felts
            .get(self.pos)
            .ok_or_else(|| ExtractError::new(format!("get_game truncated at {field}")))?;
        self.pos += 1;
        Ok(felt.as_str())
    }

    fn u64(&mut self, field: &str) -> Result<u64, ExtractError> {
        let raw = self.raw(field)?;
        parse_scalar(raw)
            .ok_or_else(|| ExtractError::new(format!("get_game {field} is not a scalar: {raw}")))
    }

    fn timestamp(&mut self, field: &str) -> Result<Option<DateTime<Utc>>, ExtractError> {
        match self.u64(field)? {
            0 => Ok(None),
            secs => DateTime::from_timestamp(secs as i64, 0)
                .map(Some)
                .ok_or_else(|| ExtractError::new(format!("get_game {field} out of range"))),
        }
    }
}

/// Decodes the `get_game` felt layout:
/// `[game_id, player, difficulty, card_count, (value, matched)*card_count,
/// flipped_count, flipped*, matched_count, total_pairs, moves, score,
/// started_at, completed_at, status]`.
fn decode_game_felts(felts: &[String]) -> Result<GameSession, ExtractError> {
    let mut cur = FeltCursor { felts, pos: 0 };

    let id = cur.u64("game_id")?;
    let player = cur.raw("player")?.to_string();
    let difficulty = Difficulty::from_code(cur.u64("difficulty")?)
        .map_err(|e| ExtractError::new(e.kind.to_string()))?;

    let card_count = cur.u64("card_count")? as usize;
    let mut tiles = Vec::with_capacity(card_count.min(felts.len()));
    for index in 0..card_count {
        let value = cur.u64("card value")?;
        let value = u8::try_from(value)
            .map_err(|_| ExtractError::new(format!("card {index} value {value} too large")))?;
        let matched = match cur.u64("card matched")? {
            0 => false,
            1 => true,
            other => {
                return Err(ExtractError::new(format!(
                    "card {index} matched flag {other}"
                )));
            }
        };
        tiles.push(Tile::new(index, TileValue::new(value)).with_matched(matched));
    }

    let flipped_count = cur.u64("flipped_count")? as usize;
    if flipped_count > 2 {
        return Err(ExtractError::new(format!("{flipped_count} cards face-up")));
    }
    let mut face_up = Vec::with_capacity(flipped_count);
    for _ in 0..flipped_count {
        let index = cur.u64("flipped index")? as usize;
        if index >= card_count {
            return Err(ExtractError::new(format!("flipped index {index} out of range")));
        }
        face_up.push(index);
    }

    let matched_pairs = cur.u64("matched_count")? as usize;
    let total_pairs = cur.u64("total_pairs")? as usize;
    if total_pairs * 2 != card_count || matched_pairs > total_pairs {
        return Err(ExtractError::new(format!(
            "inconsistent board: {card_count} cards, {total_pairs} pairs, {matched_pairs} matched"
        )));
    }
    let moves = u32::try_from(cur.u64("moves")?)
        .map_err(|_| ExtractError::new("moves out of range"))?;
    let score = cur.u64("score")?;
    let started_at = cur.timestamp("started_at")?.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let completed_at = cur.timestamp("completed_at")?;
    let status_code = cur.u64("status")?;
    let status = SessionStatus::from_code(status_code)
        .ok_or_else(|| ExtractError::new(format!("unknown status {status_code}")))?;

    if cur.pos != felts.len() {
        return Err(ExtractError::new(format!(
            "get_game has {} trailing felts",
            felts.len() - cur.pos
        )));
    }

    Ok(GameSession::restore(
        id,
        player,
        difficulty,
        tiles,
        face_up,
        matched_pairs,
        total_pairs,
        moves,
        score,
        started_at,
        completed_at,
        status,
    ))
}
