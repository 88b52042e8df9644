/// Speedup of each renderer relative to the naive baseline.
use crate::csv::BenchmarkRow;
use constants::benchmark::{
    MODE_LABEL_CLUSTERED_DEFERRED, MODE_LABEL_FORWARD_PLUS, MODE_LABEL_NAIVE,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no naive rows to compare against")]
    MissingBaseline,

    #[error("non-positive average frame time for {render_mode} at {num_lights} lights")]
    InvalidFrameTime { render_mode: String, num_lights: u32 },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Speedup {
    pub render_mode: String,
    pub avg_frame_time_ms: f64,
    /// Naive average over this mode's average; above 1 is faster than naive.
    pub speedup_vs_naive: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LightCountReport {
    pub num_lights: u32,
    pub naive_avg_frame_time_ms: f64,
    pub modes: Vec<Speedup>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpeedupReport {
    pub light_counts: Vec<LightCountReport>,
    /// Clustered deferred over Forward+ at the largest measured light count.
    pub deferred_vs_forward_plus: Option<f64>,
}

impl SpeedupReport {
    pub fn from_rows(rows: &[BenchmarkRow]) -> Result<Self, ReportError> {
        let mut by_count: BTreeMap<u32, Vec<&BenchmarkRow>> = BTreeMap::new();
        for row in rows {
            if !(row.avg_frame_time_ms > 0.0) {
                return Err(ReportError::InvalidFrameTime {
                    render_mode: row.render_mode.clone(),
                    num_lights: row.num_lights,
                });
            }
            by_count.entry(row.num_lights).or_default().push(row);
        }

        let light_counts: Vec<LightCountReport> = by_count
            .into_iter()
            .filter_map(|(num_lights, rows)| {
                let naive = rows
                    .iter()
                    .find(|row| row.render_mode == MODE_LABEL_NAIVE)?
                    .avg_frame_time_ms;
                let modes = rows
                    .iter()
                    .filter(|row| row.render_mode != MODE_LABEL_NAIVE)
                    .map(|row| Speedup {
                        render_mode: row.render_mode.clone(),
                        avg_frame_time_ms: row.avg_frame_time_ms,
                        speedup_vs_naive: naive / row.avg_frame_time_ms,
                    })
                    .collect();
                Some(LightCountReport {
                    num_lights,
                    naive_avg_frame_time_ms: naive,
                    modes,
                })
            })
            .collect();

        if light_counts.is_empty() {
            return Err(ReportError::MissingBaseline);
        }

        let deferred_vs_forward_plus = light_counts.last().and_then(|last| {
            let avg = |label: &str| {
                last.modes
                    .iter()
                    .find(|speedup| speedup.render_mode == label)
                    .map(|speedup| speedup.avg_frame_time_ms)
            };
            Some(avg(MODE_LABEL_FORWARD_PLUS)? / avg(MODE_LABEL_CLUSTERED_DEFERRED)?)
        });

        Ok(Self {
            light_counts,
            deferred_vs_forward_plus,
        })
    }

    pub fn to_table(&self) -> String {
        let mut table = String::new();
        let _ = writeln!(
            table,
            "{:>8}  {:>10}  {:<20} {:>10}  {:>8}",
            "Lights", "Naive ms", "Mode", "Avg ms", "Speedup"
        );
        for count in &self.light_counts {
            for (i, speedup) in count.modes.iter().enumerate() {
                let (lights, naive) = if i == 0 {
                    (
                        count.num_lights.to_string(),
                        format!("{:.3}", count.naive_avg_frame_time_ms),
                    )
                } else {
                    (String::new(), String::new())
                };
                let _ = writeln!(
                    table,
                    "{:>8}  {:>10}  {:<20} {:>10.3}  {:>7.1}x",
                    lights,
                    naive,
                    speedup.render_mode,
                    speedup.avg_frame_time_ms,
                    speedup.speedup_vs_naive
                );
            }
        }
        if let (Some(ratio), Some(last)) = (self.deferred_vs_forward_plus, self.light_counts.last()) {
            let _ = writeln!(
                table,
                "Clustered deferred vs Forward+ at {} lights: {:.1}x",
                last.num_lights, ratio
            );
        }
        table
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `summary.json` + `run_a.csv` -> `summary_run_a.json`, for multi-input runs.
pub fn numbered_path(json_path: &Path, input: &Path) -> PathBuf {
    let stem = json_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let input_stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    json_path.with_file_name(format!("{stem}_{input_stem}.json"))
}
