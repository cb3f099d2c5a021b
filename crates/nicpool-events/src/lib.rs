//! nicpool-events — notification classification and dispatch.
//!
//! The dispatcher is the system's sole entry point. It maps an inbound
//! notification to zero or one reconciliation action:
//!
//! ```text
//! Notification ──> classify ──┬── lifecycle running  → attach that instance
//!                             ├── lifecycle removed  → detach, then pool sweep
//!                             ├── lifecycle other    → ignored (debug)
//!                             ├── timer tick         → sweep every known pool
//!                             └── unrecognized       → ignored (error)
//! ```
//!
//! `Dispatcher::handle` never returns an error: every failure ends in a
//! log statement and a clean return, and the next timer sweep is the
//! recovery mechanism. Replaying a notification is safe because the
//! dispatcher re-derives all state from the provider on every call.

pub mod dispatcher;
pub mod event;

pub use dispatcher::Dispatcher;
pub use event::{EventClass, Notification, classify};
