/// Parsing of the engine's benchmark CSV export.
use constants::benchmark::CSV_HEADER;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Long-form column names, also accepted.
const LONG_CSV_HEADER: &str =
    "Render Mode,Number of Lights,Average Frame Time (ms),Min Frame Time (ms),Max Frame Time (ms)";

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected header '{0}'")]
    Header(String),

    #[error("line {line}: expected 5 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("line {line}: invalid {column} value '{value}'")]
    Value {
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("no benchmark rows found")]
    Empty,
}

/// One `(mode, light count)` measurement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BenchmarkRow {
    pub render_mode: String,
    pub num_lights: u32,
    pub avg_frame_time_ms: f64,
    pub min_frame_time_ms: f64,
    pub max_frame_time_ms: f64,
}

pub fn read_results(path: &Path) -> Result<Vec<BenchmarkRow>, CsvError> {
    let text = fs::read_to_string(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_results(&text)
}

pub fn parse_results(text: &str) -> Result<Vec<BenchmarkRow>, CsvError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(CsvError::Empty);
    };
    if header != CSV_HEADER && header != LONG_CSV_HEADER {
        return Err(CsvError::Header(header.to_string()));
    }

    let rows = lines
        .map(|(line, text)| parse_row(line, text))
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(CsvError::Empty);
    }
    Ok(rows)
}

fn parse_row(line: usize, text: &str) -> Result<BenchmarkRow, CsvError> {
    let columns: Vec<&str> = text.split(',').map(str::trim).collect();
    let &[mode, lights, avg, min, max] = columns.as_slice() else {
        return Err(CsvError::ColumnCount {
            line,
            found: columns.len(),
        });
    };

    let float = |column: &'static str, value: &str| {
        value.parse::<f64>().map_err(|_| CsvError::Value {
            line,
            column,
            value: value.to_string(),
        })
    };

    Ok(BenchmarkRow {
        render_mode: mode.to_string(),
        num_lights: lights.parse().map_err(|_| CsvError::Value {
            line,
            column: "NumberOfLights",
            value: lights.to_string(),
        })?,
        avg_frame_time_ms: float("AvgFrameTimeMs", avg)?,
        min_frame_time_ms: float("MinFrameTimeMs", min)?,
        max_frame_time_ms: float("MaxFrameTimeMs", max)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_engine_export() {
        let text = format!(
            "{CSV_HEADER}\nnaive,500,12.500,11.000,15.250\nforward+,500,3.000,2.500,4.000\n"
        );
        let rows = parse_results(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            BenchmarkRow {
                render_mode: "naive".to_string(),
                num_lights: 500,
                avg_frame_time_ms: 12.5,
                min_frame_time_ms: 11.0,
                max_frame_time_ms: 15.25,
            }
        );
    }

    #[test]
    fn accepts_long_header_and_mode_with_space() {
        let text = format!("{LONG_CSV_HEADER}\nclustered deferred,5000,2.100,1.900,3.000\n");
        let rows = parse_results(&text).unwrap();
        assert_eq!(rows[0].render_mode, "clustered deferred");
        assert_eq!(rows[0].num_lights, 5000);
    }

    #[test]
    fn reports_the_offending_line() {
        let text = format!("{CSV_HEADER}\nnaive,500,1,1,1\nnaive,lots,1,1,1\n");
        match parse_results(&text) {
            Err(CsvError::Value { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "NumberOfLights");
            }
            other => panic!("expected value error, got {other:?}"),
        }

        let text = format!("{CSV_HEADER}\nnaive,500,1,1\n");
        assert!(matches!(
            parse_results(&text),
            Err(CsvError::ColumnCount { line: 2, found: 4 })
        ));
    }

    #[test]
    fn rejects_foreign_files() {
        assert!(matches!(parse_results(""), Err(CsvError::Empty)));
        assert!(matches!(parse_results("a,b,c\n1,2,3"), Err(CsvError::Header(_))));
        assert!(matches!(parse_results(CSV_HEADER), Err(CsvError::Empty)));
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{CSV_HEADER}").unwrap();
        writeln!(file, "naive,1000,20.000,18.000,25.000").unwrap();

        let rows = read_results(file.path()).unwrap();
        assert_eq!(rows[0].num_lights, 1000);

        let missing = file.path().with_extension("missing");
        assert!(matches!(read_results(&missing), Err(CsvError::Io { .. })));
    }
}
