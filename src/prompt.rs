//! Asking the user for confirmation.
use std::io::{BufRead, Write};

use crate::error::{InstallerError, InstallerErrorKind};

/// A question the installer needs answered before continuing.
#[derive(Debug, Clone, Copy)]
pub enum Question<'a> {
    /// Apply the listed installation steps.
    Install {
        /// One line per step.
        items: &'a [String],
    },
    /// Remove the listed paths.
    Uninstall {
        /// One line per path or entry.
        items: &'a [String],
    },
    /// Install a missing program through a package manager.
    InstallPrerequisite {
        /// Name of the missing program.
        program: &'a str,
        /// The command line that will be run.
        command: &'a str,
    },
}

impl Question<'_> {
    /// Returns a plain text rendition of the question.
    pub fn to_plain_text(&self) -> String {
        match self {
            Question::Install { items } => {
                let mut text = String::from("The following steps will be performed:\n");
                append_items(&mut text, items);
                text.push_str("Continue?");
                text
            }
            Question::Uninstall { items } => {
                let mut text = String::from("The following will be removed:\n");
                append_items(&mut text, items);
                text.push_str("Continue?");
                text
            }
            Question::InstallPrerequisite { program, command } => {
                format!("{program} is required but was not found.\nInstall it by running `{command}`?")
            }
        }
    }
}

fn append_items(text: &mut String, items: &[String]) {
    for item in items {
        text.push_str("  ");
        text.push_str(item);
        text.push('\n');
    }
}

/// Answers [`Question`]s.
pub trait Prompter {
    /// Returns whether the user accepted.
    ///
    /// Returns an error only when the question could not be presented.
    fn confirm(&mut self, question: &Question) -> Result<bool, InstallerError>;
}

/// Accepts every question, as with `--yes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Prompter for AutoConfirm {
    fn confirm(&mut self, question: &Question) -> Result<bool, InstallerError> {
        tracing::debug!(?question, "auto confirm");
        Ok(true)
    }
}

/// Asks on a line based terminal: the question goes to `output` and a
/// `y`/`yes` line from `input` accepts.
#[derive(Debug)]
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl LinePrompter<std::io::StdinLock<'static>, std::io::Stderr> {
    /// Prompter using the process standard input and error streams.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    /// Creates a prompter over the given streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn confirm(&mut self, question: &Question) -> Result<bool, InstallerError> {
        write!(self.output, "{} [y/N] ", question.to_plain_text())?;
        self.output.flush()?;

        let mut line = String::new();
        let len = self.input.read_line(&mut line)?;

        if len == 0 {
            tracing::debug!("no answer on input");
            return Err(InstallerErrorKind::InterruptedByUser.into());
        }

        let answer = line.trim().to_ascii_lowercase();
        tracing::debug!(answer, "line prompt answer");

        Ok(answer == "y" || answer == "yes")
    }
}
