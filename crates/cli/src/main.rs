use std::process::ExitCode;

fn main() -> ExitCode {
    reqdraft_cli::run()
}
