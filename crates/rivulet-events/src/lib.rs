#![forbid(unsafe_code)]

//! Unified event bus for rivulet loaders.

mod bus;
mod event;
mod loader;
mod session;

pub use bus::EventBus;
pub use event::Event;
pub use loader::LoaderEvent;
pub use session::SessionEvent;
