/*!
 * Core Module
 * Shared types, IDs, errors, and limits
 */

pub mod errors;
pub mod id;
pub mod limits;
pub mod types;

pub use errors::{AtomicError, DiagnosticsError, PoolError, SyncError};
pub use id::IdGenerator;
pub use types::{PrimitiveId, PrimitiveKind, Priority, SyncResult, TaskId};
