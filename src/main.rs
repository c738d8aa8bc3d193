//! folio binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match folio::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            folio::ui::output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
