//! Renderer configuration loading.
//!
//! Loads `renderer.json` through the asset server while the app is in
//! `AppState::Loading`, applies launch overrides and inserts the runtime
//! resources every other system reads.

/// Config asset handle tracking and the systems that turn it into resources.
pub mod config_loader;
