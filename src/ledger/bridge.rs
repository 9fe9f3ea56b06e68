//! Execution port shared by local and remote backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::ledger::{ExecutionError, Operation, RawOutcome};

/// Where session operations run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExecutionMode {
    /// In-process simulation.
    #[default]
    Local,
    /// Remote contract system.
    Remote,
}

/// Executes session operations.
#[async_trait]
pub trait LedgerBridge: Send + Sync + Debug {
    /// Executes one operation and returns its raw outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the backend rejects or loses the call.
    async fn submit(&self, operation: Operation) -> Result<RawOutcome, ExecutionError>;

    /// Which backend this is.
    fn mode(&self) -> ExecutionMode;
}
