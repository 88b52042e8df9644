use crate::engine::core::error::ConfigError;
#[cfg(not(target_arch = "wasm32"))]
use crate::engine::systems::benchmark::BenchmarkState;
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use constants::benchmark::{
    MODE_LABEL_CLUSTERED_DEFERRED, MODE_LABEL_FORWARD_PLUS, MODE_LABEL_NAIVE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Resource, Clone, ExtractResource)]
pub struct RenderModeState {
    pub current_mode: RenderMode,
}

impl Default for RenderModeState {
    fn default() -> Self {
        Self {
            current_mode: RenderMode::ClusteredDeferred,
        }
    }
}

/// Lighting strategy used to shade the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Every fragment loops over every active light.
    #[serde(rename = "naive")]
    Naive,
    /// Single geometry pass reading the culled per-cluster light lists.
    #[serde(rename = "forward+")]
    ForwardPlus,
    /// G-buffer pass followed by a full-screen compose pass over the same lists.
    #[serde(rename = "clustered deferred")]
    ClusteredDeferred,
}

impl RenderMode {
    pub const ALL: [RenderMode; 3] = [
        RenderMode::Naive,
        RenderMode::ForwardPlus,
        RenderMode::ClusteredDeferred,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Naive => MODE_LABEL_NAIVE,
            RenderMode::ForwardPlus => MODE_LABEL_FORWARD_PLUS,
            RenderMode::ClusteredDeferred => MODE_LABEL_CLUSTERED_DEFERRED,
        }
    }

    /// Whether shading reads the per-cluster light lists, so culling must run first.
    pub fn uses_clusters(self) -> bool {
        !matches!(self, RenderMode::Naive)
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RenderMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "naive" => Ok(RenderMode::Naive),
            "forward+" | "forward-plus" | "forward_plus" | "forwardplus" => {
                Ok(RenderMode::ForwardPlus)
            }
            "clustered deferred" | "clustered-deferred" | "clustered_deferred" | "deferred" => {
                Ok(RenderMode::ClusteredDeferred)
            }
            _ => Err(ConfigError::UnknownRenderMode(s.to_string())),
        }
    }
}

/// Switch renderers with the number keys.
/// The render world observes the change through extraction and stops the old
/// renderer before starting the new one.
pub fn render_mode_system(
    mut render_state: ResMut<RenderModeState>,
    #[cfg(not(target_arch = "wasm32"))] benchmark: Res<BenchmarkState>,
    #[cfg(not(target_arch = "wasm32"))] keyboard: Res<ButtonInput<KeyCode>>,
) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if benchmark.is_running() {
            return;
        }

        let requested = if keyboard.just_pressed(KeyCode::Digit1) {
            Some(RenderMode::Naive)
        } else if keyboard.just_pressed(KeyCode::Digit2) {
            Some(RenderMode::ForwardPlus)
        } else if keyboard.just_pressed(KeyCode::Digit3) {
            Some(RenderMode::ClusteredDeferred)
        } else {
            None
        };

        if let Some(mode) = requested {
            if mode != render_state.current_mode {
                info!("Render mode: {}", mode);
                render_state.current_mode = mode;
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if render_state.is_changed() && !render_state.is_added() {
            info!("Render mode changed to: {}", render_state.current_mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back_to_their_mode() {
        for mode in RenderMode::ALL {
            assert_eq!(mode.label().parse::<RenderMode>().unwrap(), mode);
        }
    }

    #[test]
    fn parsing_accepts_cli_spellings() {
        assert_eq!(
            "forward-plus".parse::<RenderMode>().unwrap(),
            RenderMode::ForwardPlus
        );
        assert_eq!(
            " Clustered_Deferred ".parse::<RenderMode>().unwrap(),
            RenderMode::ClusteredDeferred
        );
        assert!(matches!(
            "raytraced".parse::<RenderMode>(),
            Err(ConfigError::UnknownRenderMode(_))
        ));
    }

    #[test]
    fn serde_uses_display_labels() {
        let json = serde_json::to_string(&RenderMode::ForwardPlus).unwrap();
        assert_eq!(json, "\"forward+\"");
        let mode: RenderMode = serde_json::from_str("\"clustered deferred\"").unwrap();
        assert_eq!(mode, RenderMode::ClusteredDeferred);
    }

    #[test]
    fn only_naive_skips_clusters() {
        assert!(!RenderMode::Naive.uses_clusters());
        assert!(RenderMode::ForwardPlus.uses_clusters());
        assert!(RenderMode::ClusteredDeferred.uses_clusters());
    }
}
