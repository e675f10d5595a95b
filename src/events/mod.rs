//! Event/listener bus
//!
//! Distributes run lifecycle events to reporters and policy listeners.

mod bus;
mod listener;

pub use bus::EventBus;
#[cfg(test)]
pub(crate) use bus::testing;
pub use listener::{TestEventListener, WorkerInfo};
