//! nicpool-reconciler — the reconciliation core.
//!
//! One reconciliation pass reads ground truth from the provider
//! gateway, partitions a pool's running instances into attached and
//! unattached, and issues the minimal attach/detach calls to move
//! toward the invariant "every running pool instance holds a pool
//! interface". Each mutation is confirmed by polling the interface
//! until it reaches its terminal status.
//!
//! # Architecture
//!
//! ```text
//! PoolReconciler
//!   ├── PoolSnapshot::load  (immutable instances/interfaces view)
//!   ├── attach_one          (pick candidate, attach, wait for in-use)
//!   ├── attach_sweep        (attach every unattached instance)
//!   ├── detach_all          (free an instance's pool interfaces)
//!   └── wait_for_status     (bounded poll loop)
//! ```
//!
//! Nothing here is cached across passes: every operation starts from a
//! fresh snapshot, which is what makes replayed notifications and
//! overlapping invocations self-correcting.

pub mod error;
pub mod reconciler;
pub mod snapshot;

pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::{PoolReconciler, WaitConfig};
pub use snapshot::PoolSnapshot;
