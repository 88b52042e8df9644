pub const WARMUP_FRAMES: u32 = 30;
pub const SAMPLE_FRAMES: u32 = 120;
/// Frames rendered after a renderer switch before the light count is applied.
pub const SETTLE_FRAMES: u32 = 12;

pub const LIGHT_COUNT_START: u32 = 500;
pub const LIGHT_COUNT_END: u32 = 5000;
pub const LIGHT_COUNT_STEP: u32 = 500;

pub const CSV_HEADER: &str =
    "RenderMode,NumberOfLights,AvgFrameTimeMs,MinFrameTimeMs,MaxFrameTimeMs";

pub const MODE_LABEL_NAIVE: &str = "naive";
pub const MODE_LABEL_FORWARD_PLUS: &str = "forward+";
pub const MODE_LABEL_CLUSTERED_DEFERRED: &str = "clustered deferred";

pub const DEFAULT_OUTPUT_DIR: &str = "benchmarks";

pub const RESULTS_FILE_NAME: &str = "benchmark_results.csv";
