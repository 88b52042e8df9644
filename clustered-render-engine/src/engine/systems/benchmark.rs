use crate::engine::core::config::BenchmarkConfig;
use crate::engine::core::error::{BenchmarkError, ConfigError};
use crate::engine::lights::light_set::LightSet;
use crate::engine::systems::fps_tracking::FrameTimed;
use crate::engine::systems::render_mode::{RenderMode, RenderModeState};
use bevy::prelude::*;
use constants::benchmark::{CSV_HEADER, RESULTS_FILE_NAME};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Frame timing summary for one `(mode, light count)` configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchmarkResult {
    pub render_mode: RenderMode,
    pub num_lights: u32,
    pub avg_frame_time_ms: f32,
    pub min_frame_time_ms: f32,
    pub max_frame_time_ms: f32,
}

impl BenchmarkResult {
    pub fn from_samples(render_mode: RenderMode, num_lights: u32, samples: &[f32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().map(|&ms| ms as f64).sum();
        let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
        let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let avg = ((sum / samples.len() as f64) as f32).clamp(min, max);

        Some(Self {
            render_mode,
            num_lights,
            avg_frame_time_ms: avg,
            min_frame_time_ms: min,
            max_frame_time_ms: max,
        })
    }
}

pub fn to_csv(results: &[BenchmarkResult]) -> String {
    let mut csv = String::with_capacity(64 * (results.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for result in results {
        let _ = writeln!(
            csv,
            "{},{},{:.3},{:.3},{:.3}",
            result.render_mode,
            result.num_lights,
            result.avg_frame_time_ms,
            result.min_frame_time_ms,
            result.max_frame_time_ms
        );
    }
    csv
}

pub fn write_csv(path: &Path, results: &[BenchmarkResult]) -> Result<(), BenchmarkError> {
    let export_error = |source| BenchmarkError::Export {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(export_error)?;
    }
    std::fs::write(path, to_csv(results)).map_err(export_error)
}

/// The ordered list of configurations to measure. Modes are the outer loop so
/// each renderer is started once per sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkPlan {
    steps: Vec<(RenderMode, u32)>,
    settle_frames: u32,
    warmup_frames: u32,
    sample_frames: u32,
}

impl BenchmarkPlan {
    pub fn from_config(config: &BenchmarkConfig) -> Result<Self, ConfigError> {
        if config.modes.is_empty() || config.light_counts.is_empty() {
            return Err(ConfigError::EmptyBenchmarkSweep);
        }
        if config.sample_frames == 0 {
            return Err(ConfigError::ZeroSampleFrames);
        }

        let steps = config
            .modes
            .iter()
            .flat_map(|&mode| config.light_counts.iter().map(move |&count| (mode, count)))
            .collect();

        Ok(Self {
            steps,
            settle_frames: config.settle_frames,
            warmup_frames: config.warmup_frames,
            sample_frames: config.sample_frames,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// What the harness must change before the next frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BenchmarkAction {
    SwitchMode(RenderMode),
    SetLightCount(u32),
    Finish,
}

#[derive(Clone, Debug, PartialEq)]
enum Phase {
    Settling { remaining: u32 },
    WarmingUp { remaining: u32 },
    Sampling { samples: Vec<f32> },
    Done,
}

/// Frame-driven sweep state machine. Fed one frame time per frame; returns
/// the mode switches and light counts to apply.
#[derive(Clone, Debug)]
pub struct BenchmarkRunner {
    plan: BenchmarkPlan,
    step: usize,
    phase: Phase,
    results: Vec<BenchmarkResult>,
    restore_mode: RenderMode,
    restore_lights: u32,
}

impl BenchmarkRunner {
    /// Start a sweep, remembering the mode and light count to restore.
    pub fn start(
        plan: BenchmarkPlan,
        current_mode: RenderMode,
        current_lights: u32,
    ) -> (Self, BenchmarkAction) {
        let mut runner = Self {
            results: Vec::with_capacity(plan.len()),
            plan,
            step: 0,
            phase: Phase::Done,
            restore_mode: current_mode,
            restore_lights: current_lights,
        };
        let action = runner.begin_step(None);
        (runner, action)
    }

    pub fn restore_mode(&self) -> RenderMode {
        self.restore_mode
    }

    pub fn restore_lights(&self) -> u32 {
        self.restore_lights
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    fn begin_step(&mut self, previous_mode: Option<RenderMode>) -> BenchmarkAction {
        let (mode, count) = self.plan.steps[self.step];
        if previous_mode == Some(mode) {
            self.phase = Phase::WarmingUp {
                remaining: self.plan.warmup_frames,
            };
            BenchmarkAction::SetLightCount(count)
        } else {
            self.phase = Phase::Settling {
                remaining: self.plan.settle_frames,
            };
            BenchmarkAction::SwitchMode(mode)
        }
    }

    pub fn on_frame(&mut self, frame_ms: f32) -> Option<BenchmarkAction> {
        match &mut self.phase {
            Phase::Settling { remaining } if *remaining > 0 => {
                *remaining -= 1;
                None
            }
            Phase::Settling { .. } => {
                self.phase = Phase::WarmingUp {
                    remaining: self.plan.warmup_frames,
                };
                Some(BenchmarkAction::SetLightCount(self.plan.steps[self.step].1))
            }
            Phase::WarmingUp { remaining } if *remaining > 0 => {
                *remaining -= 1;
                None
            }
            Phase::WarmingUp { .. } => {
                self.phase = Phase::Sampling {
                    samples: Vec::with_capacity(self.plan.sample_frames as usize),
                };
                self.record_sample(frame_ms)
            }
            Phase::Sampling { .. } => self.record_sample(frame_ms),
            Phase::Done => None,
        }
    }

    fn record_sample(&mut self, frame_ms: f32) -> Option<BenchmarkAction> {
        let Phase::Sampling { samples } = &mut self.phase else {
            return None;
        };
        samples.push(frame_ms);
        if samples.len() < self.plan.sample_frames as usize {
            return None;
        }

        let (mode, count) = self.plan.steps[self.step];
        if let Some(result) = BenchmarkResult::from_samples(mode, count, samples) {
            info!(
                "  {} @ {} lights: avg {:.2} ms, min {:.2} ms, max {:.2} ms",
                mode,
                count,
                result.avg_frame_time_ms,
                result.min_frame_time_ms,
                result.max_frame_time_ms
            );
            self.results.push(result);
        }

        self.step += 1;
        if self.step < self.plan.len() {
            Some(self.begin_step(Some(mode)))
        } else {
            self.phase = Phase::Done;
            Some(BenchmarkAction::Finish)
        }
    }
}

/// Sweep parameters and whether the app exits once results are written.
#[derive(Resource, Clone, Debug)]
pub struct BenchmarkSettings {
    pub config: BenchmarkConfig,
    pub exit_when_done: bool,
}

impl BenchmarkSettings {
    pub fn new(config: BenchmarkConfig, exit_when_done: bool) -> Self {
        Self {
            config,
            exit_when_done,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        Path::new(&self.config.output_dir).join(RESULTS_FILE_NAME)
    }
}

#[derive(Resource, Default)]
pub struct BenchmarkState {
    runner: Option<BenchmarkRunner>,
}

impl BenchmarkState {
    pub fn is_running(&self) -> bool {
        self.runner.is_some()
    }

    pub fn start(
        &mut self,
        config: &BenchmarkConfig,
        current_mode: RenderMode,
        current_lights: u32,
    ) -> Result<BenchmarkAction, BenchmarkError> {
        if self.is_running() {
            return Err(BenchmarkError::AlreadyRunning);
        }
        let plan = BenchmarkPlan::from_config(config)?;
        let (runner, action) = BenchmarkRunner::start(plan, current_mode, current_lights);
        self.runner = Some(runner);
        Ok(action)
    }
}

fn apply_action(action: BenchmarkAction, mode: &mut RenderModeState, lights: &mut LightSet) {
    match action {
        BenchmarkAction::SwitchMode(next) => {
            info!("Benchmarking {} renderer...", next);
            mode.current_mode = next;
        }
        BenchmarkAction::SetLightCount(count) => {
            if let Err(err) = lights.set_active_count(count) {
                warn!("Benchmark light count skipped: {}", err);
            }
        }
        BenchmarkAction::Finish => {}
    }
}

fn begin_benchmark(
    state: &mut BenchmarkState,
    settings: &BenchmarkSettings,
    mode: &mut RenderModeState,
    lights: &mut LightSet,
) {
    match state.start(&settings.config, mode.current_mode, lights.active_count()) {
        Ok(action) => {
            info!(
                "Starting benchmark: {} modes x {} light counts",
                settings.config.modes.len(),
                settings.config.light_counts.len()
            );
            apply_action(action, mode, lights);
        }
        Err(err) => warn!("Benchmark not started: {}", err),
    }
}

/// `T` starts a sweep.
pub fn start_benchmark_on_key(
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<BenchmarkSettings>,
    mut state: ResMut<BenchmarkState>,
    mut mode: ResMut<RenderModeState>,
    mut lights: ResMut<LightSet>,
) {
    if keyboard.just_pressed(KeyCode::KeyT) {
        begin_benchmark(&mut state, &settings, &mut mode, &mut lights);
    }
}

/// Runs once on entering `Running` when launched with `--benchmark`.
pub fn start_benchmark_on_launch(
    settings: Res<BenchmarkSettings>,
    mut state: ResMut<BenchmarkState>,
    mut mode: ResMut<RenderModeState>,
    mut lights: ResMut<LightSet>,
) {
    if settings.exit_when_done {
        begin_benchmark(&mut state, &settings, &mut mode, &mut lights);
    }
}

pub fn run_benchmark_system(
    mut frames: EventReader<FrameTimed>,
    settings: Res<BenchmarkSettings>,
    mut state: ResMut<BenchmarkState>,
    mut mode: ResMut<RenderModeState>,
    mut lights: ResMut<LightSet>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(runner) = state.runner.as_mut() else {
        frames.clear();
        return;
    };

    for frame in frames.read() {
        match runner.on_frame(frame.frame_ms) {
            Some(BenchmarkAction::Finish) => break,
            Some(action) => apply_action(action, &mut mode, &mut lights),
            None => {}
        }
    }

    if !runner.is_done() {
        return;
    }
    let Some(runner) = state.runner.take() else {
        return;
    };

    mode.current_mode = runner.restore_mode();
    if let Err(err) = lights.set_active_count(runner.restore_lights()) {
        warn!("Could not restore light count: {}", err);
    }

    let path = settings.output_path();
    match write_csv(&path, runner.results()) {
        Ok(()) => info!(
            "✓ Benchmark complete: {} results written to {}",
            runner.results().len(),
            path.display()
        ),
        Err(err) => error!("{}", err),
    }

    if settings.exit_when_done {
        exit.write(AppExit::Success);
    }
}
