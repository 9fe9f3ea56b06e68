//! Execution backends and receipt decoding.
//!
//! Session verbs travel as [`Operation`]s through a [`LedgerBridge`]:
//! either the in-process [`LocalSimulator`] or the [`RemoteExecutor`]
//! that signs through an injected [`WalletProvider`]. Raw results are turned
//! into typed [`DomainEvent`]s by the [`ReceiptEventExtractor`].

mod bridge;
mod error;
mod operation;
mod outcome;
mod receipt;
mod remote;
mod simulator;

pub use bridge::{ExecutionMode, LedgerBridge};
pub use error::{ExecutionError, ExecutionErrorKind, ExtractError};
pub use operation::{ContractCall, Operation, encode_scalar, entrypoints, parse_scalar};
pub use outcome::{DomainEvent, RawOutcome, RawReceipt, ReceiptSchema};
pub use receipt::{EmittedEvent, ParsedReceipt, ReceiptEventExtractor};
pub use remote::{ConfirmationPolicy, RemoteExecutor, WalletError, WalletProvider};
pub use simulator::LocalSimulator;
