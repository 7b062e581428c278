//! Multi-source home audio hub coordination core.
//!
//! This library provides:
//! - An actor runtime with per-component mailboxes and fault isolation
//! - A router for name-based requests and event fan-out between components
//! - Source arbitration (at most one active audio source)
//! - A playback state machine over a pluggable media engine
//! - A tracklist sequencer with repeat/single/random and an auto-advance
//!   circuit breaker
//! - A local file library backend

pub mod backends;
pub mod bus;
pub mod config;
pub mod models;
pub mod playback;
pub mod router;
pub mod runtime;
pub mod source;
pub mod tracklist;
