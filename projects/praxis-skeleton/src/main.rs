mod cli;
mod error;
mod pipeline;
mod pose;
mod run_context;

use anyhow::Result;
use cli::Args;
use pipeline::orchestrator::run_pipeline;
use pose::blazepose::BlazePoseEstimator;
use pose::opencv_source::OpencvImageSource;
use run_context::report_path;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();
    let config = args.pipeline_config();

    let report = run_pipeline(&config, &OpencvImageSource, || {
        BlazePoseEstimator::new(&args.model_path, args.min_detection_confidence)
    })?;

    println!(
        "{} rows for action {} written to {}",
        report.total_rows,
        report.action_id,
        config.output_path.display()
    );
    if !report.warnings.is_empty() {
        println!(
            "{} warnings recorded in {}",
            report.warnings.len(),
            report_path(&config.output_path).display()
        );
    }

    Ok(())
}
