use concurrent_runner::cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    concurrent_runner::init();

    let status = match cli::run() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {e:#}");
            cli::exit_status_for(&e)
        }
    };
    ExitCode::from(status.code())
}
