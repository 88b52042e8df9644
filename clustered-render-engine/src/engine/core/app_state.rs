use crate::engine::loading::config_loader::ConfigLoader;
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States, Resource)]
pub enum AppState {
    #[default]
    Loading,
    Running,
}

#[derive(Component)]
pub struct FpsText;

/// Leave the loading state once the renderer config has been applied.
pub fn transition_to_running(
    config_loader: Res<ConfigLoader>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if config_loader.is_applied() {
        info!("→ Renderer configured, transitioning to Running state");
        next_state.set(AppState::Running);
    }
}
