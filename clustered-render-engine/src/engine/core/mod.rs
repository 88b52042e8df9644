//! Core application setup and state management.
//!
//! Handles application lifecycle, launch options, configuration, window setup
//! and the error types shared across the engine.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Wires the clustered lighting render plugins, extraction, and runtime systems.
pub mod app_setup;

/// Application state machine from configuration loading to runtime execution.
pub mod app_state;

/// Command line launch options.
pub mod cli;

/// Renderer configuration asset and the runtime settings derived from it.
pub mod config;

/// Error types for light set, cluster grid, configuration and benchmark failures.
pub mod error;

/// Platform-specific window configuration for native and WASM builds.
pub mod window_config;
