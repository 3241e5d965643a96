use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = farm_cli::submit::command().get_matches();
    let mut stdout = std::io::stdout();
    match farm_cli::submit::run(&matches, &mut stdout).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("farm-submit: {err:#}");
            ExitCode::FAILURE
        }
    }
}
