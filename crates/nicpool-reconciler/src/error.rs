//! Reconciler error types.

use nicpool_provider::{InterfaceStatus, ProviderError};
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors a reconciliation operation can report.
///
/// None of these are fatal to a sweep: callers log the failure for the
/// affected resource and move on, relying on the next pass to converge.
/// `WaitTimeout` and `InterfaceGone` are deliberately distinct so
/// "gave up" can be told apart from "resource gone".
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no interface available in pool \"{pool}\" for subnet \"{subnet}\"")]
    NoCapacity { pool: String, subnet: String },

    #[error("instance {0} has no subnet id")]
    NoSubnet(String),

    #[error("interface {0} no longer exists")]
    InterfaceGone(String),

    #[error("timed out waiting for interface {interface} to become {target}")]
    WaitTimeout {
        interface: String,
        target: InterfaceStatus,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}
