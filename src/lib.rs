//! Starboard apparatus runtime library.
//!
//! Drives the peripherals of a behavioral-research apparatus (feeders,
//! house lights, peck-key panels, audio cues) behind one uniform
//! request/state/publish contract. Exposes every module for integration
//! testing and for embedding in a controller relay.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod apparatus;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod scheduler;
