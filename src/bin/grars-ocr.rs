//! Extracts text from an image with the installed OCR helper.
//!
//! Prints the text and exits with 0. When the image holds no text, exits
//! with 1 without printing anything. Other failures are described on
//! stderr and exit with 1.
use std::{io::Write, path::PathBuf, process::ExitCode};

use clap::Parser;
use grars_setup::{
    error::InstallerError,
    manifest::{AppId, DEFAULT_APP_ID},
    ocr::OcrCommand,
    os::AccessScope,
    path::PathResolver,
    prereq::SystemRunner,
};

/// Extract text from an image
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Image file
    image: PathBuf,

    /// Use the installation for all users
    #[arg(long)]
    system: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The log file is for diagnosis only; stdout and stderr belong to the caller.
    grars_setup::logging::init_logging("grars-ocr", None).ok();

    match run(&cli) {
        Ok(Some(text)) => {
            let mut stdout = std::io::stdout().lock();

            if writeln!(stdout, "{text}").and_then(|()| stdout.flush()).is_err() {
                return ExitCode::FAILURE;
            }

            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(?error, "text extraction failed");
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Option<String>> {
    let app_id = AppId::new(DEFAULT_APP_ID)?;
    let access_scope = if cli.system {
        AccessScope::System
    } else {
        AccessScope::User
    };
    let resolver = PathResolver::new(app_id.plain_id(), access_scope)?;

    let runner = SystemRunner;
    let command = OcrCommand::for_installation(&resolver, &runner)?;

    let text: Result<_, InstallerError> =
        grars_setup::ocr::extract_text(&runner, &command, &cli.image);

    Ok(text?)
}
