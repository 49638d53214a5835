//! Installer and uninstaller for the Insight Reader text-to-speech application.
//!
//! An installation consists of the application binary, a Python runtime
//! environment holding the speech engine, a speech model, an OCR helper
//! script, a search path entry, a desktop shortcut and a configuration file.
//! The installer reconciles what is on disk with that desired state, so it
//! can be re-run after an interrupted or partially failed installation.
//!
//! ## Example
//!
//! ```no_run
//! # use grars_setup::inst::InstallConfig;
//! # use grars_setup::manifest::{AppId, DEFAULT_APP_ID};
//! # use grars_setup::os::AccessScope;
//! # use grars_setup::prompt::AutoConfirm;
//! let app_id = AppId::new(DEFAULT_APP_ID).unwrap();
//! let config = InstallConfig::for_current_os(&app_id, AccessScope::User).unwrap();
//!
//! let report = grars_setup::install(&config, &mut AutoConfirm).unwrap();
//! assert!(report.is_clean());
//! ```
//!
//! ## Installer principles
//!
//! ### Files
//!
//! Every file is written to a temporary file in its destination directory
//! and moved into place, so an interrupted download never leaves a partial
//! file behind. Before removing a file, its checksum is compared to the one
//! stored in the disk manifest. Modified files are kept.
//!
//! ### Search paths
//!
//! When the search path (PATH) is being modified, it's possible that a
//! TOCTOU race condition may cause unwanted behavior if there's another
//! installer operating. On Windows, some paths might not be preserved.
//! On Unix, the user's profile file might be corrupted.
//!
//! ### Configuration
//!
//! The configuration file is user data. It is written once and never
//! overwritten, even when forcing a reinstallation.
use error::InstallerError;
use inst::{ExecutionReport, InstallConfig, Installer};
use manifest::DiskManifest;
use prompt::Prompter;
use uninst::{UninstallReport, Uninstaller};

pub mod error;
pub mod inst;
#[cfg(feature = "i18n")]
mod locale;
pub mod logging;
pub mod manifest;
pub mod net;
pub mod ocr;
pub mod os;
pub mod path;
pub mod prereq;
pub mod prompt;
#[cfg(feature = "ui")]
mod tui;
pub mod uninst;

/// Starts the installer with an interactive interface.
///
/// A terminal user interface (TUI) shows the planned steps, asks for
/// confirmation and reports the result.
///
/// If the user cancels, the error kind [`InterruptedByUser`](crate::error::InstallerErrorKind::InterruptedByUser)
/// is returned.
#[cfg(feature = "ui")]
pub fn install_interactive(config: &InstallConfig) -> Result<ExecutionReport, InstallerError> {
    let mut installer = Installer::new(config)?;
    installer.run_interactive()
}

/// Installs with the given configuration.
///
/// `prompter` answers the confirmation and prerequisite questions.
pub fn install(
    config: &InstallConfig,
    prompter: &mut dyn Prompter,
) -> Result<ExecutionReport, InstallerError> {
    let mut installer = Installer::new(config)?;
    installer.run(prompter)
}

/// Starts the uninstaller with an interactive interface.
#[cfg(feature = "ui")]
pub fn uninstall_interactive(config: &InstallConfig) -> Result<UninstallReport, InstallerError> {
    let mut uninstaller = Uninstaller::new(config);
    uninstaller.run_interactive()
}

/// Uninstalls everything the installer created for the paths of `config`.
///
/// Returns [`NotInstalled`](crate::error::InstallerErrorKind::NotInstalled)
/// when nothing was found.
pub fn uninstall(
    config: &InstallConfig,
    prompter: &mut dyn Prompter,
) -> Result<UninstallReport, InstallerError> {
    let mut uninstaller = Uninstaller::new(config);
    uninstaller.run(prompter)
}

/// Returns the disk manifest when the application is installed.
pub fn manifest(config: &InstallConfig) -> Result<DiskManifest, InstallerError> {
    crate::manifest::discover_manifest(&config.resolver, &config.app_id)
}
