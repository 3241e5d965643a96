use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = farm_cli::farmuser::command().get_matches();
    let mut stdout = std::io::stdout().lock();
    match farm_cli::farmuser::run(&matches, &mut stdout) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("farmuser: {err:#}");
            ExitCode::FAILURE
        }
    }
}
