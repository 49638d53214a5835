//! External programs and prerequisites.
//!
//! Programs are started only through [`CommandRunner`] so the executor can
//! be driven by a fake in tests.
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    error::{InstallerError, InstallerErrorKind},
    path::Platform,
    prompt::{Prompter, Question},
};

/// Captured result of a finished program.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, if the program exited normally.
    pub status_code: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns whether the program exited with code 0.
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Starts external programs.
pub trait CommandRunner {
    /// Runs a program to completion and captures its output.
    fn run(&self, program: &Path, args: &[&OsStr]) -> std::io::Result<CommandOutput>;

    /// Looks up a program on the search path.
    fn find(&self, name: &str) -> Option<PathBuf>;
}

/// Runs programs on the real system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> std::io::Result<CommandOutput> {
        tracing::info!(?program, ?args, "running command");

        let output = Command::new(program).args(args).output()?;
        let output = CommandOutput {
            status_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(?program, status_code = ?output.status_code, stderr = output.stderr, "command finished");

        Ok(output)
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        let path = which::which(name).ok();
        tracing::debug!(name, ?path, "find program");
        path
    }
}

/// Runs a program and converts a non-zero exit into [`InstallerErrorKind::CommandFailed`].
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &Path,
    args: &[&OsStr],
) -> Result<CommandOutput, InstallerError> {
    let output = runner.run(program, args).map_err(|error| {
        InstallerError::new(InstallerErrorKind::CommandFailed)
            .with_context(program.to_string_lossy())
            .with_source(error)
    })?;

    if output.success() {
        Ok(output)
    } else {
        let message = output.stderr.trim();
        tracing::warn!(?program, status_code = ?output.status_code, message, "command failed");

        let mut error = InstallerError::new(InstallerErrorKind::CommandFailed)
            .with_context(program.to_string_lossy());
        if !message.is_empty() {
            error = error.with_context(message);
        }
        Err(error)
    }
}

/// System package managers that can provide Python.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Debian and derivatives.
    AptGet,
    /// Fedora and derivatives.
    Dnf,
    /// Arch Linux and derivatives.
    Pacman,
    /// openSUSE.
    Zypper,
    /// Homebrew.
    Brew,
    /// Windows Package Manager.
    Winget,
}

impl PackageManager {
    const LINUX: [Self; 4] = [Self::AptGet, Self::Dnf, Self::Pacman, Self::Zypper];

    /// Returns the first package manager found for the platform.
    pub fn detect(runner: &dyn CommandRunner, platform: Platform) -> Option<(Self, PathBuf)> {
        let candidates: &[Self] = match platform {
            Platform::Linux => &Self::LINUX,
            Platform::MacOs => &[Self::Brew],
            Platform::Windows => &[Self::Winget],
        };

        candidates
            .iter()
            .find_map(|manager| runner.find(manager.program()).map(|path| (*manager, path)))
    }

    /// Name of the program.
    pub fn program(&self) -> &'static str {
        match self {
            Self::AptGet => "apt-get",
            Self::Dnf => "dnf",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Brew => "brew",
            Self::Winget => "winget",
        }
    }

    /// Arguments installing Python and its venv module.
    pub fn install_python_args(&self) -> &'static [&'static str] {
        match self {
            Self::AptGet => &["install", "-y", "python3", "python3-venv"],
            Self::Dnf => &["install", "-y", "python3"],
            Self::Pacman => &["-S", "--noconfirm", "python"],
            Self::Zypper => &["--non-interactive", "install", "python3"],
            Self::Brew => &["install", "python"],
            Self::Winget => &[
                "install",
                "-e",
                "--id",
                "Python.Python.3.12",
                "--accept-package-agreements",
                "--accept-source-agreements",
            ],
        }
    }

    /// Whether the manager must run as root.
    pub fn needs_root(&self) -> bool {
        !matches!(self, Self::Brew | Self::Winget)
    }
}

/// Returns the names a Python interpreter goes by on the platform, in lookup order.
pub fn python_names(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Windows => &["python", "python3"],
        _ => &["python3", "python"],
    }
}

/// Looks up a Python interpreter.
pub fn find_python(runner: &dyn CommandRunner, platform: Platform) -> Option<PathBuf> {
    python_names(platform)
        .iter()
        .find_map(|name| runner.find(name))
}

/// Returns a Python interpreter, offering to install one when it is missing.
///
/// Declining the offer or a failing package manager yields
/// [`InstallerErrorKind::MissingDependency`].
pub fn ensure_python(
    runner: &dyn CommandRunner,
    platform: Platform,
    prompter: &mut dyn Prompter,
) -> Result<PathBuf, InstallerError> {
    if let Some(path) = find_python(runner, platform) {
        return Ok(path);
    }

    let program = python_names(platform)[0];
    tracing::warn!(program, "python not found");

    let missing = || InstallerError::new(InstallerErrorKind::MissingDependency).with_context(program);

    let Some((manager, manager_path)) = PackageManager::detect(runner, platform) else {
        tracing::warn!("no supported package manager found");
        return Err(missing().with_context("no supported package manager found"));
    };

    let (command_path, args) = install_command(runner, manager, manager_path);
    let command_line = std::iter::once(command_path.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ");

    let question = Question::InstallPrerequisite {
        program,
        command: &command_line,
    };

    if !prompter.confirm(&question)? {
        tracing::info!(program, "user declined prerequisite installation");
        return Err(missing().with_context("installation declined"));
    }

    let args = Vec::from_iter(args.iter().map(OsString::as_os_str));
    run_checked(runner, &command_path, &args)
        .map_err(|error| missing().with_context(manager.program()).with_source(error))?;

    find_python(runner, platform).ok_or_else(missing)
}

fn install_command(
    runner: &dyn CommandRunner,
    manager: PackageManager,
    manager_path: PathBuf,
) -> (PathBuf, Vec<OsString>) {
    let mut args = Vec::from_iter(manager.install_python_args().iter().map(OsString::from));

    if manager.needs_root() && !crate::os::is_elevated() {
        if let Some(sudo) = runner.find("sudo") {
            args.insert(0, manager_path.into_os_string());
            return (sudo, args);
        }
    }

    (manager_path, args)
}
