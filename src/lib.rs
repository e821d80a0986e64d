//! Mediaforge - profile-driven media transformation orchestrator
//!
//! This library crate exposes the application wiring for the binary and the
//! integration tests. The building blocks live in the `mf-*` crates.

pub mod app;

pub use app::{App, LayoutRequest};
