use crate::engine::systems::render_mode::RenderMode;
use bevy::prelude::Resource;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Resource, Debug, Clone, Default)]
#[command(name = "clustered-render-engine")]
#[command(about = "Naive, Forward+ and clustered-deferred lighting with thousands of point lights", long_about = None)]
#[command(version)]
pub struct LaunchOptions {
    /// Renderer to start with: naive, forward+ or "clustered deferred"
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<RenderMode>,

    /// Active light count, overriding the config file
    #[arg(long)]
    pub lights: Option<u32>,

    /// Run the benchmark sweep on startup and exit once results are written
    #[arg(long)]
    pub benchmark: bool,

    /// Directory the benchmark CSV is written to, overriding the config file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Renderer config path, relative to the assets directory
    #[arg(long)]
    pub config: Option<String>,
}

fn parse_mode(value: &str) -> Result<RenderMode, String> {
    value.parse::<RenderMode>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_benchmark_invocation() {
        let options = LaunchOptions::try_parse_from([
            "clustered-render-engine",
            "--mode",
            "forward+",
            "--lights",
            "2500",
            "--benchmark",
            "--output",
            "results",
        ])
        .unwrap();

        assert_eq!(options.mode, Some(RenderMode::ForwardPlus));
        assert_eq!(options.lights, Some(2500));
        assert!(options.benchmark);
        assert_eq!(options.output, Some(PathBuf::from("results")));
        assert!(options.config.is_none());
    }

    #[test]
    fn rejects_unknown_mode() {
        let result =
            LaunchOptions::try_parse_from(["clustered-render-engine", "--mode", "raytraced"]);
        assert!(result.is_err());
    }
}
