use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use brio_driver::{run_file, DriverError};

const BRIO_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run() -> Result<(), DriverError> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "-h" | "--help" | "help" => {
            print_help();
            Ok(())
        }
        "-V" | "--version" | "version" => {
            println!("brio {BRIO_VERSION}");
            Ok(())
        }
        "run" => {
            let want_snapshot = rest.iter().any(|arg| arg == "--snapshot");
            let Some(target) = rest.iter().find(|arg| !arg.starts_with("--")) else {
                print_help();
                return Err(DriverError::InvalidCommand(
                    "run needs a program file".to_string(),
                ));
            };
            let outcome = run_file(&PathBuf::from(target))?;
            if want_snapshot {
                let rendered = serde_json::to_string_pretty(&outcome.snapshot)
                    .map_err(DriverError::Load)?;
                println!("{rendered}");
            } else {
                println!("{}", outcome.value);
            }
            if outcome.moments > 0 {
                eprintln!("{} moments", outcome.moments);
            }
            Ok(())
        }
        other => {
            print_help();
            Err(DriverError::InvalidCommand(other.to_string()))
        }
    }
}

fn print_help() {
    println!("brio — reactive business expression runtime");
    println!();
    println!("Usage:");
    println!("  brio run <program.json> [--snapshot]   execute a serialized program");
    println!("  brio version                           print the version");
}
