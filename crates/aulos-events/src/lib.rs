#![forbid(unsafe_code)]

//! `aulos-events`
//!
//! Event types flowing between the playback controller and the data
//! provider, plus the broadcast-backed [`EventBus`] they travel on.
//!
//! Subjects are ordered: every subscriber of a bus sees events in publish
//! order. Observer execution is wherever the subscriber's receive loop runs;
//! the connector in `aulos` confines both forwarding loops to dedicated
//! tasks, which gives observers implicit mutual exclusion.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::{PlayerEvent, ProviderEvent};
