use std::process::ExitCode;

use clap::Parser;
use kitmig::cli::{Cli, RunOutput};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.json;

    match kitmig::cli::run(cli) {
        Ok(RunOutput::Text(output)) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Ok(RunOutput::Json(response)) => match serde_json::to_string_pretty(&response) {
            Ok(serialized) => {
                println!("{serialized}");
                ExitCode::SUCCESS
            }
            Err(_) => {
                println!(
                    "{{\"error\":{{\"type\":\"serialization_error\",\"message\":\"Failed to serialize run response\"}}}}"
                );
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            if json_mode {
                let serialized = serde_json::to_string_pretty(&error.to_error_response())
                    .unwrap_or_else(|_| {
                        "{\"error\":{\"type\":\"serialization_error\",\"message\":\"Failed to serialize error response\"}}"
                            .to_string()
                    });
                println!("{serialized}");
            } else {
                eprintln!("kitmig: {error}");
            }
            ExitCode::FAILURE
        }
    }
}
