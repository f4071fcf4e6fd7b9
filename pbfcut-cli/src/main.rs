//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use env_logger::Env;
use pbfcut_cli::CliError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match pbfcut_cli::run() {
        Ok(code) => code,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            let report = eyre::Report::new(err);
            eprintln!("pbfcut: {report:?}");
            ExitCode::FAILURE
        }
    }
}
