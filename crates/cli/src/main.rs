use std::process::ExitCode;

fn main() -> ExitCode {
    requote_cli::run()
}
