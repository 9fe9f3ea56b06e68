//! Session lifecycle over a ledger bridge.

mod controller;
mod error;

pub use controller::{
    CompletionSummary, ControllerState, FlipOutcome, IgnoreReason, PlayerIdentity,
    SessionController, SessionTiming,
};
pub use error::{SessionError, SessionErrorKind};
