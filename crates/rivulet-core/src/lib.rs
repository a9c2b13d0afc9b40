#![forbid(unsafe_code)]

//! Core vocabulary shared by every rivulet crate.
//!
//! Loaders, transports and the event bus all speak in terms of
//! [`LoaderStatus`] and [`LoaderErrorKind`]; keeping them here lets the
//! event crate describe loader activity without depending on the loader.

mod errors;
mod rollback;
mod status;

pub use errors::LoaderErrorKind;
pub use rollback::RollbackTrigger;
pub use status::LoaderStatus;
