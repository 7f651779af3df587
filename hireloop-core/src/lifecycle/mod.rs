//! The service request state machine.
//!
//! ```text
//! pending → active_for_acceptance → in_progress → completed → awaiting_rating → closed
//!    |              |                    |              |
//!    └──────────────┴────────────────────┴──────────────┴──→ cancelled
//! ```
//!
//! `pending` and `active_for_acceptance` may also close directly when the
//! client gives up without selecting anyone.

mod aggregate;
mod engine;
mod error;
mod locks;
mod operation;

#[cfg(test)]
mod tests;

pub use aggregate::{Applied, RequestAggregate};
pub use engine::{AcceptOutcome, LifecycleEngine, MAX_IDEMPOTENCY_KEY_LEN};
pub use error::LifecycleError;
pub use locks::{AggregateGuard, LockArena, LockTimeout};
pub use operation::{Operation, OperationKind, create_fingerprint};
