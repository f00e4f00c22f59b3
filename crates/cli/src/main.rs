use std::process::ExitCode;

fn main() -> ExitCode {
    u360_cli::run()
}
