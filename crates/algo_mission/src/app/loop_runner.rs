use std::process::ExitCode;

use engine::run_app;
use tracing::{info, warn};

use super::autopilot::Outcome;
use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut autopilot,
    } = app;

    let exit = run_app(config, &mut autopilot);
    let report = autopilot.report(&exit);
    match serde_json::to_string(&report) {
        Ok(json) => info!(reason = ?exit.reason, report = %json, "run_report"),
        Err(err) => warn!(error = %err, "run_report_failed"),
    }

    if autopilot.outcome() == Outcome::Win {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
