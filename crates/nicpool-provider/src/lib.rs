//! nicpool-provider — the provider gateway contract and resource types.
//!
//! Everything the reconciliation core knows about the cloud lives here:
//! typed views over instance and interface records, the `ProviderGateway`
//! trait the core calls through, and an in-memory gateway used by tests
//! and by the daemon's state-file mode.
//!
//! # Architecture
//!
//! ```text
//! ProviderGateway (trait)
//!   ├── describe / list instances and interfaces (tag-scoped)
//!   ├── attach / detach interface
//!   └── distinct tag-value enumeration (pool discovery)
//!
//! MemoryProvider (implementation)
//!   └── RwLock<state> + PoolFixture import/export (JSON)
//! ```
//!
//! Real cloud clients implement `ProviderGateway` outside this workspace;
//! the core is generic over the trait and never constructs credentials
//! or API clients itself.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod types;

pub use error::{ProviderError, ProviderResult};
pub use gateway::ProviderGateway;
pub use memory::{InstanceRecord, MemoryProvider, PoolFixture};
pub use types::*;
