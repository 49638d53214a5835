//! Text extraction from images through the installed helper.
//!
//! The helper is a script run by a platform backend:
//!
//! * macOS: `swift <bin>/extract_text_from_image.swift <image>`
//! * Linux: `<venv>/bin/python <bin>/extract_text_from_image.py <image>`
//! * Windows: not available, the application calls the native API itself.
//!
//! A backend prints the text on stdout and exits with 0. Exiting with 1
//! without any output means no text was found.
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    error::{InstallerError, InstallerErrorKind},
    path::{PathResolver, Platform},
    prereq::{CommandOutput, CommandRunner},
};

/// Program and leading arguments of an OCR backend. The image path is
/// appended when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl OcrCommand {
    /// Creates a command from a program and its leading arguments.
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the backend of the installation described by `resolver`.
    pub fn for_installation(
        resolver: &PathResolver,
        runner: &dyn CommandRunner,
    ) -> Result<Self, InstallerError> {
        let script = resolver.ocr_helper_path().ok_or_else(|| {
            InstallerError::new(InstallerErrorKind::UnsupportedOsFamily)
                .with_context("text extraction is provided by the application on this platform")
        })?;

        if !script.is_file() {
            return Err(InstallerError::new(InstallerErrorKind::NotInstalled)
                .with_context(script.to_string_lossy()));
        }

        match resolver.platform() {
            Platform::MacOs => {
                let swift = runner.find("swift").ok_or_else(|| {
                    InstallerError::new(InstallerErrorKind::MissingDependency).with_context("swift")
                })?;
                Ok(Self::new(swift, [script]))
            }
            Platform::Linux => {
                let python = resolver.runtime_python();

                if !crate::os::is_executable_file(&python) {
                    return Err(InstallerError::new(InstallerErrorKind::NotInstalled)
                        .with_context(python.to_string_lossy()));
                }

                Ok(Self::new(python, [script]))
            }
            Platform::Windows => Err(InstallerErrorKind::UnsupportedOsFamily.into()),
        }
    }

    /// Returns the program run.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Runs the backend on an image.
///
/// Returns `Ok(None)` when the image contains no text.
pub fn extract_text(
    runner: &dyn CommandRunner,
    command: &OcrCommand,
    image: &Path,
) -> Result<Option<String>, InstallerError> {
    if !image.is_file() {
        tracing::error!(?image, "image file does not exist");
        return Err(InstallerError::new(InstallerErrorKind::InvalidInput)
            .with_context(format!("image file does not exist: {}", image.display())));
    }

    let mut args = Vec::from_iter(command.args.iter().map(OsString::as_os_str));
    args.push(image.as_os_str());

    tracing::info!(?image, program = ?command.program, "extracting text");

    let output = runner.run(&command.program, &args).map_err(|error| {
        InstallerError::new(InstallerErrorKind::CommandFailed)
            .with_context(command.program.to_string_lossy())
            .with_source(error)
    })?;

    interpret_output(&command.program, output)
}

fn interpret_output(program: &Path, output: CommandOutput) -> Result<Option<String>, InstallerError> {
    let stderr = output.stderr.trim();

    if !output.success() {
        if output.status_code == Some(1) && stderr.is_empty() && output.stdout.trim().is_empty() {
            tracing::info!("no text found in image");
            return Ok(None);
        }

        tracing::error!(status_code = ?output.status_code, stderr, "text extraction failed");

        let mut error = InstallerError::new(InstallerErrorKind::CommandFailed)
            .with_context(program.to_string_lossy());
        if !stderr.is_empty() {
            error = error.with_context(stderr);
        }
        return Err(error);
    }

    let text = output.stdout.trim();

    if text.is_empty() {
        tracing::info!("no text found in image");
        return Ok(None);
    }

    tracing::info!(bytes = text.len(), "extracted text");

    Ok(Some(text.to_string()))
}
