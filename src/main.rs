use clap::Parser;
use manifest_lint::cli::Cli;
use std::process::ExitCode;

/// Exit status when findings reach the failure threshold.
const EXIT_FINDINGS: u8 = 1;
/// Exit status for usage, I/O and configuration errors.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.init_logging();

    match manifest_lint::run_command(cli) {
        Ok(output) => {
            print!("{}", output.text);
            if !output.text.is_empty() && !output.text.ends_with('\n') {
                println!();
            }
            if output.failed {
                ExitCode::from(EXIT_FINDINGS)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
