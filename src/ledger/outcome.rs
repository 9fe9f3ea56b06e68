//! Results returned by a ledger bridge.

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::game::{GameSession, SessionId};

/// Typed outcome the session controller acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session was created.
    Started {
        /// Ledger-assigned session id.
        session_ref: SessionId,
    },
    /// A tile was revealed.
    Flipped {
        /// Revealed position.
        tile_index: usize,
    },
    /// The face-up pair matched.
    Matched,
    /// The face-up pair did not match.
    Mismatched,
    /// The last pair was matched.
    Completed,
    /// The session was abandoned.
    Abandoned,
}

/// Receipt layout of a supported provider version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReceiptSchema {
    /// Pre-0.7 receipts carrying a single `status` field.
    Legacy,
    /// 0.7 receipts with `execution_status` and `finality_status`.
    #[default]
    Rpc07,
}

/// Confirmed receipt as returned by the provider, not yet decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, new)]
pub struct RawReceipt {
    /// Layout the body follows.
    schema: ReceiptSchema,
    /// Hash of the confirmed transaction.
    tx_hash: String,
    /// Provider JSON.
    body: serde_json::Value,
}

/// Opaque result of [`LedgerBridge::submit`](crate::LedgerBridge::submit).
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// Event produced in-process by the local simulator.
    Event(DomainEvent),
    /// Session state read from the local simulator.
    State(Box<GameSession>),
    /// Confirmed remote receipt.
    Receipt(RawReceipt),
    /// Felts returned by a remote read call.
    CallResult(Vec<String>),
}
