use std::process::ExitCode;

fn main() -> ExitCode {
    procureflow_cli::run()
}
