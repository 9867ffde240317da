//! Application core: the component contract, free of sysfs.
//!
//! This module holds the rules every apparatus component shares: the
//! request kinds and their single-completion replies, the events a
//! component publishes, its static meta descriptor, and the dispatch loop
//! that serializes requests, timers and hardware input. All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer testable with the dummy adapters.

pub mod commands;
pub mod events;
pub mod meta;
pub mod ports;
pub mod service;
