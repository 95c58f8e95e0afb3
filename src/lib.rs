#![doc = include_str!("../docs/rustdoc.md")]

/// Reachability change multicast and subscription handles.
pub mod broadcaster;
/// Command-line argument definitions.
pub mod cli;
/// Runtime configuration model.
pub mod config;
/// Error types used across the crate.
pub mod error;
/// Change events and broadcast channel plumbing.
pub mod events;
/// Metrics and health status structures.
pub mod monitoring;
/// Reachability detector seam and bundled sources.
pub mod source;
/// Shared broadcaster counters.
pub mod state;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Connection state model.
pub mod types;
/// Derived connectivity views.
pub mod views;

/// Primary crate error type.
pub use error::ReachcastError;
