//! The Controller (§4.6): manifest indexing state machine wiring the Fetch
//! Arena, Layer Scanner, Coalescer, and Persistence interface behind a
//! per-manifest lock.

mod controller;
mod error;
mod lock;

pub use controller::{Controller, ControllerState};
pub use error::ControllerError;
pub use lock::{FileLockSource, LockGuard, LockSource};
