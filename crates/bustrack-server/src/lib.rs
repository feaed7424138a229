//! # bustrack-server
//!
//! HTTP server library for the bustrack live bus tracker.
//!
//! Provides the API handlers, shared state, notification sink and logging
//! setup used by the `bustrack-server` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod notify;
pub mod state;
