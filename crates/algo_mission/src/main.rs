use std::process::ExitCode;

use tracing::error;

mod app;

fn main() -> ExitCode {
    match app::build_app() {
        Ok(wiring) => app::run(wiring),
        Err(err) => report_startup_failure(&err),
    }
}

fn report_startup_failure(err: &app::BootstrapError) -> ExitCode {
    error!(error = %err, "startup_failed");
    ExitCode::FAILURE
}
