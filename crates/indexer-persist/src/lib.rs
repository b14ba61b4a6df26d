//! The Persistence interface (§6.5) and a test-only in-memory implementation.

mod error;
mod interface;
pub mod memory;

pub use error::PersistError;
pub use interface::{Indexed, Persistence};
pub use memory::InMemoryPersistence;
