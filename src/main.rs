//! Command line installer for Insight Reader.
use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use grars_setup::{
    error::{InstallerError, InstallerErrorKind},
    inst::{ExecutionReport, InstallConfig, Installer},
    manifest::{AppId, DEFAULT_APP_ID},
    os::{AccessScope, Interrupt},
    prompt::LinePrompter,
    uninst::{UninstallReport, Uninstaller},
};

/// Install or remove Insight Reader and its speech engine
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Install or repair the application (default)
    Install,
    /// Remove everything the installer created
    Uninstall,
}

#[derive(Args, Debug)]
struct Options {
    /// Answer yes to every question and do not show the interface
    #[arg(short, long, global = true)]
    yes: bool,

    /// Source checkout whose build and helper scripts are used instead of downloads
    #[arg(long, global = true, env = "GRARS_PROJECT_ROOT", value_name = "DIR")]
    project_root: Option<PathBuf>,

    /// Install for the current user even when running as administrator
    #[arg(long, global = true)]
    user: bool,

    /// Rebuild every component except the configuration file
    #[arg(long, global = true)]
    force: bool,

    /// Do not create the Python runtime environment
    #[arg(long, global = true)]
    skip_python: bool,

    /// Do not install the speech engine and model
    #[arg(long, global = true)]
    skip_piper: bool,

    /// Do not create desktop shortcuts
    #[arg(long, global = true)]
    skip_shortcuts: bool,

    /// Do not modify the shell profile or the Path registry value
    #[arg(long, global = true)]
    no_modify_path: bool,

    /// GitHub repository (owner/name) publishing the releases
    #[arg(long, global = true, env = "GRARS_RELEASE_REPO", value_name = "REPO")]
    release_repo: Option<String>,

    /// Use line prompts instead of the terminal interface
    #[arg(long, global = true)]
    no_tui: bool,

    /// Print debug messages
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Entry point
fn main() -> ExitCode {
    let cli = Cli::parse();
    let interactive = use_tui(&cli.options);

    let console_level = if interactive {
        None
    } else {
        Some(grars_setup::logging::console_level(cli.options.verbose))
    };

    let log_path = match grars_setup::logging::init_logging("grars-setup", console_level) {
        Ok(path) => Some(path),
        Err(error) => {
            eprintln!("warning: could not set up logging: {error}");
            None
        }
    };

    // Wrapped so errors are written to the log file as well.
    let result = main2(&cli, interactive);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(?error, "main error");

            if is_cancellation(&error) {
                eprintln!("Cancelled.");
            } else {
                eprintln!("error: {error:#}");

                if let Some(path) = log_path {
                    eprintln!("See {} for details.", path.display());
                }
            }

            ExitCode::FAILURE
        }
    }
}

fn main2(cli: &Cli, interactive: bool) -> anyhow::Result<()> {
    let config = build_config(&cli.options)?;
    tracing::debug!(?config, "install config");

    let interrupt = Interrupt::with_ctrlc_handler().unwrap_or_else(|error| {
        tracing::warn!(%error, "could not install interrupt handler");
        Interrupt::new()
    });

    match cli.command.unwrap_or(Command::Install) {
        Command::Install => {
            let mut installer = Installer::new(&config)?.with_interrupt(interrupt);
            let report = if interactive {
                run_install_interactive(&mut installer)?
            } else {
                installer.run(&mut LinePrompter::stdio())?
            };
            print_install_report(&report);
        }
        Command::Uninstall => {
            let mut uninstaller = Uninstaller::new(&config).with_interrupt(interrupt);
            let result = if interactive {
                run_uninstall_interactive(&mut uninstaller)
            } else {
                uninstaller.run(&mut LinePrompter::stdio())
            };

            match result {
                Ok(report) => print_uninstall_report(&report),
                Err(error) if matches!(error.kind(), InstallerErrorKind::NotInstalled) => {
                    tracing::info!("nothing to uninstall");
                    println!("Not installed, nothing to do.");
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    Ok(())
}

fn build_config(options: &Options) -> anyhow::Result<InstallConfig> {
    let app_id = AppId::new(DEFAULT_APP_ID)?;
    let access_scope = AccessScope::detect(options.user);
    let mut config = InstallConfig::for_current_os(&app_id, access_scope)?;

    config.flags.force = options.force;
    config.flags.skip_runtime = options.skip_python;
    config.flags.skip_engine = options.skip_piper;
    config.flags.skip_shortcuts = options.skip_shortcuts;
    config.flags.assume_yes = options.yes;
    config.project_root = options.project_root.clone();
    config.modify_os_search_path = !options.no_modify_path;

    if let Some(repo) = &options.release_repo {
        config.release_repo = repo.clone();
    }

    Ok(config)
}

fn use_tui(options: &Options) -> bool {
    cfg!(feature = "ui")
        && !options.yes
        && !options.no_tui
        && std::io::stdin().is_terminal()
        && std::io::stdout().is_terminal()
}

#[cfg(feature = "ui")]
fn run_install_interactive(installer: &mut Installer) -> Result<ExecutionReport, InstallerError> {
    installer.run_interactive()
}

#[cfg(not(feature = "ui"))]
fn run_install_interactive(installer: &mut Installer) -> Result<ExecutionReport, InstallerError> {
    installer.run(&mut LinePrompter::stdio())
}

#[cfg(feature = "ui")]
fn run_uninstall_interactive(
    uninstaller: &mut Uninstaller,
) -> Result<UninstallReport, InstallerError> {
    uninstaller.run_interactive()
}

#[cfg(not(feature = "ui"))]
fn run_uninstall_interactive(
    uninstaller: &mut Uninstaller,
) -> Result<UninstallReport, InstallerError> {
    uninstaller.run(&mut LinePrompter::stdio())
}

fn is_cancellation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<InstallerError>()
        .map(|error| error.kind().is_cancellation())
        .unwrap_or(false)
}

fn print_install_report(report: &ExecutionReport) {
    if report.completed.is_empty() && report.warnings.is_empty() {
        println!("Already installed, nothing to do.");
    } else if report.is_clean() {
        println!("Installation complete.");
    } else {
        println!("Installation complete with {} failed step(s):", report.warnings.len());

        for warning in &report.warnings {
            println!("  {}", warning.action.describe());
        }
    }
}

fn print_uninstall_report(report: &UninstallReport) {
    println!("Removed {} item(s).", report.removed.len());

    for kept in &report.kept {
        println!("  kept {} ({})", kept.path.display(), kept.reason);
    }
    for warning in &report.warnings {
        println!("  {warning}");
    }
}
