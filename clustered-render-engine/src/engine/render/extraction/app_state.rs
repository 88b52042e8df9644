use bevy::prelude::*;
use bevy::render::Extract;

/// Mirror a main world state into the render world so render systems can be
/// gated with `in_state`.
pub fn extract_state<S: States + Copy>(main_world: Extract<Res<State<S>>>, mut commands: Commands) {
    commands.insert_resource(State::new(*main_world.get()));
}
