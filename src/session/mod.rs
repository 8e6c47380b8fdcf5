/// Session storage
///
/// The store is the only shared mutable state of the service and the single
/// place where rotation is serialized.

mod memory;
mod model;
mod postgres;
mod store;

pub use memory::MemorySessionStore;
pub use model::{DeviceKey, RotateOutcome, RotateTokens, Session};
pub use postgres::PgSessionStore;
pub use store::{with_deadline, SessionStore};
