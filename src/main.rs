use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cvatkit::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(cvatkit::CvatError::CompletedWithErrors { errors, .. }) => {
            eprint!("{errors}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
