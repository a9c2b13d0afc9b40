//! Lock types shared by the rivulet crates.
//!
//! Re-exports [`parking_lot`] locks. Loader state is touched from transport
//! callbacks that may run on any thread, so every crate locks through here
//! instead of picking its own mutex.

#![forbid(unsafe_code)]

pub use parking_lot::{Mutex, MutexGuard};
