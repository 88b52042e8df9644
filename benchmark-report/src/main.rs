/// Offline analysis of exported benchmark CSV files
mod csv;
mod report;

use clap::Parser;
use report::SpeedupReport;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "benchmark-report")]
#[command(about = "Summarise renderer benchmark CSV files as speedups over the naive renderer", long_about = None)]
#[command(version)]
struct Args {
    /// Benchmark CSV files written by the render engine
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    for input in &args.inputs {
        let rows = csv::read_results(input)?;
        let report = SpeedupReport::from_rows(&rows)?;

        println!("{}", input.display());
        print!("{}", report.to_table());

        if let Some(json_path) = &args.json {
            let json_path = if args.inputs.len() > 1 {
                report::numbered_path(json_path, input)
            } else {
                json_path.clone()
            };
            report.write_json(&json_path)?;
            println!("Saved {}", json_path.display());
        }
    }

    Ok(())
}
