use std::path::Path;
use std::process::ExitCode;

use padi_report::{default_catalog, Pipeline, ReportConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Optional override file read from the working directory.
const CONFIG_FILE: &str = "padi-report.json";

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config() -> padi_report::Result<ReportConfig> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        info!(path = CONFIG_FILE, "loading configuration");
        ReportConfig::from_json_file(path)
    } else {
        Ok(ReportConfig::default())
    }
}

fn main() -> ExitCode {
    setup_logging();

    let result = load_config()
        .and_then(Pipeline::new)
        .and_then(|pipeline| pipeline.run(default_catalog()));

    match result {
        Ok(report) => {
            if !report.is_success() {
                info!(failed = ?report.failed_ids(), "some charts were not produced");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(category = ?e.category(), "{e}");
            ExitCode::FAILURE
        }
    }
}
