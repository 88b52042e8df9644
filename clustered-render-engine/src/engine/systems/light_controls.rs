use crate::engine::lights::light_set::LightSet;
use crate::engine::systems::benchmark::BenchmarkState;
use bevy::prelude::*;

#[derive(Resource, Clone, Copy, Debug)]
pub struct LightControls {
    pub count_step: u32,
}

pub fn advance_lights(time: Res<Time>, mut lights: ResMut<LightSet>) {
    lights.advance(time.delta_secs());
}

/// Arrow up/down step the active light count. Ignored while benchmarking.
pub fn light_count_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    controls: Res<LightControls>,
    benchmark: Res<BenchmarkState>,
    mut lights: ResMut<LightSet>,
) {
    if benchmark.is_running() {
        return;
    }

    let step = controls.count_step as i64;
    let delta = if keyboard.just_pressed(KeyCode::ArrowUp) {
        step
    } else if keyboard.just_pressed(KeyCode::ArrowDown) {
        -step
    } else {
        return;
    };

    let before = lights.active_count();
    let after = lights.adjust_active_count(delta);
    if after != before {
        info!("Active lights: {} / {}", after, lights.capacity());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::core::config::LightConfig;

    fn app_with_lights(initial: u32, step: u32) -> App {
        let mut app = App::new();
        app.insert_resource(ButtonInput::<KeyCode>::default())
            .insert_resource(LightControls { count_step: step })
            .init_resource::<BenchmarkState>()
            .insert_resource(
                LightSet::new(&LightConfig {
                    max_lights: 1000,
                    initial_lights: initial,
                    ..Default::default()
                })
                .unwrap(),
            )
            .add_systems(Update, light_count_controls);
        app
    }

    fn press(app: &mut App, key: KeyCode) {
        let mut input = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        input.release_all();
        input.clear();
        input.press(key);
        app.update();
    }

    #[test]
    fn arrows_step_and_clamp_the_count() {
        let mut app = app_with_lights(900, 100);

        press(&mut app, KeyCode::ArrowUp);
        assert_eq!(app.world().resource::<LightSet>().active_count(), 1000);

        press(&mut app, KeyCode::ArrowUp);
        assert_eq!(app.world().resource::<LightSet>().active_count(), 1000);

        press(&mut app, KeyCode::ArrowDown);
        assert_eq!(app.world().resource::<LightSet>().active_count(), 900);
    }
}
