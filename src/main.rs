use std::env;
use std::process::ExitCode;

use gaffer::cli;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let code = cli::run_with_args(&args);
    ExitCode::from(code.clamp(0, u8::MAX as i32) as u8)
}
