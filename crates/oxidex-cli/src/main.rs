//! `OxideX` CLI: runs a parsed program image to completion.
//!
//! `ox` is a thin driver over [`oxidex_interpreter::Runtime`]: parse the
//! image, build a [`oxidex_interpreter::Config`] from the command line, run
//! it, and exit with the program's own status code. This binary is the only
//! place in the workspace that turns an [`oxidex_interpreter::Error`] into a
//! message on stderr and a process exit.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use oxidex_bytecode::image::ProgramImage;
use oxidex_interpreter::{Config, Runtime};
use oxidex_log::{error, Level};

/// Run an `OxideX` program image.
#[derive(Parser, Debug)]
#[command(name = "ox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs an OxideX bytecode program image")]
struct Cli {
    /// Path to a program image file.
    image: PathBuf,

    /// Raise the log level; repeat for more detail (-v = debug, -vv = trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Maximum number of pending continuation tasks the scheduler holds.
    #[arg(long, default_value_t = oxidex_interpreter::handler::DEFAULT_MAX_HANDLERS)]
    max_handlers: usize,

    /// How long, in milliseconds, to wait for stdin between idle polls.
    #[arg(long, default_value_t = oxidex_interpreter::stdio::DEFAULT_POLL_MS)]
    stdin_poll_ms: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    oxidex_log::set_level(match cli.verbose {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    });

    match run(cli) {
        Ok(status) => ExitCode::from(status),
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<u8, String> {
    let bytes = fs::read(&cli.image)
        .map_err(|e| format!("failed to read {}: {e}", cli.image.display()))?;
    let image = ProgramImage::parse(bytes).map_err(|e| e.to_string())?;

    let config = Config {
        max_handlers: cli.max_handlers,
        stdin_poll_ms: cli.stdin_poll_ms,
    };

    let mut runtime = Runtime::new(image, config);
    runtime.run().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_path_only() {
        let cli = Cli::parse_from(["ox", "program.oxb"]);
        assert_eq!(cli.image, PathBuf::from("program.oxb"));
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.max_handlers, oxidex_interpreter::handler::DEFAULT_MAX_HANDLERS);
        assert_eq!(cli.stdin_poll_ms, oxidex_interpreter::stdio::DEFAULT_POLL_MS);
    }

    #[test]
    fn repeated_verbose_flag_counts() {
        let cli = Cli::parse_from(["ox", "-vv", "program.oxb"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn overrides_scheduler_and_poll_settings() {
        let cli = Cli::parse_from([
            "ox",
            "--max-handlers",
            "16",
            "--stdin-poll-ms",
            "5",
            "program.oxb",
        ]);
        assert_eq!(cli.max_handlers, 16);
        assert_eq!(cli.stdin_poll_ms, 5);
    }
}
