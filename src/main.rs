use std::process::ExitCode;

fn main() -> ExitCode {
    match clihunter::main_inner() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("clihunter: {e:#}");
            ExitCode::FAILURE
        }
    }
}
