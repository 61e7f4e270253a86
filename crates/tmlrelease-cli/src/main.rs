use std::process::ExitCode;

fn main() -> ExitCode {
    tmlrelease_cli::run()
}
