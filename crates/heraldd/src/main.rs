use std::process::ExitCode;

const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");

fn main() -> ExitCode {
    match heraldd::run_service() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: MAIN_TARGET, error = %error, "service failed");
            ExitCode::FAILURE
        }
    }
}
