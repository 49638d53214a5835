//! Installer functionality.
//!
//! Installing is a reconciliation loop:
//!
//! 1. [`DesiredState::new`] lists every directory and artifact of a complete
//!    installation from the [`InstallConfig`].
//! 2. [`FilesystemSnapshot::observe`] checks which of them exist and are valid.
//! 3. [`Reconciler::reconcile`] turns the difference into an ordered
//!    [`ActionPlan`] without touching the disk.
//! 4. The executor applies the plan and records what it created in the
//!    [`DiskManifest`](crate::manifest::DiskManifest).
//!
//! Running the installer again on a complete installation plans nothing.
//!
//! ```
//! # use grars_setup::inst::*;
//! # use grars_setup::manifest::{AppId, DEFAULT_APP_ID};
//! # use grars_setup::os::AccessScope;
//! # fn main() -> Result<(), grars_setup::error::InstallerError> {
//! let app_id = AppId::new(DEFAULT_APP_ID).unwrap();
//! let config = InstallConfig::for_current_os(&app_id, AccessScope::User)?;
//! let desired = DesiredState::new(&config);
//! let plan = Reconciler::reconcile(&desired, &FilesystemSnapshot::new());
//!
//! for line in plan.describe() {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "ui")]
use std::{cell::RefCell, rc::Rc};

use crate::{
    error::{InstallerError, InstallerErrorKind},
    net::{Fetcher, HttpFetcher},
    os::Interrupt,
    prereq::{CommandRunner, SystemRunner},
    prompt::{AutoConfirm, Prompter, Question},
};
#[cfg(feature = "ui")]
use crate::tui::{Tui, TuiPrompter};

pub use self::config::*;
pub use self::exec::*;
pub use self::plan::*;
pub use self::shortcut::*;
pub use self::snapshot::*;
pub use self::target::*;

mod config;
mod exec;
mod plan;
mod shortcut;
mod snapshot;
mod target;

/// The installer interface.
pub struct Installer {
    config: InstallConfig,
    fetcher: Box<dyn Fetcher>,
    runner: Box<dyn CommandRunner>,
    interrupt: Interrupt,
    #[cfg(feature = "ui")]
    tui: Rc<RefCell<Tui>>,
}

impl Installer {
    /// Creates an installer using the network and the system's programs.
    pub fn new(config: &InstallConfig) -> Result<Self, InstallerError> {
        Ok(Self {
            config: config.clone(),
            fetcher: Box::new(HttpFetcher::new()?),
            runner: Box::new(SystemRunner),
            interrupt: Interrupt::new(),
            #[cfg(feature = "ui")]
            tui: Rc::new(RefCell::new(Tui::new())),
        })
    }

    /// Replaces the source of remote files.
    pub fn with_fetcher<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Replaces how external programs are found and run.
    pub fn with_runner<R: CommandRunner + 'static>(mut self, runner: R) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Sets the flag checked between and during steps.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Sets the BCP 47 language tag used for the UI.
    #[cfg(feature = "ui")]
    pub fn with_language_tag(self, value: &str) -> Self {
        self.tui.borrow_mut().set_lang_tag(value);
        self
    }

    /// Returns the config.
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Observes the filesystem and computes the plan.
    pub fn plan(&self) -> ActionPlan {
        let desired = DesiredState::new(&self.config);
        let observed = FilesystemSnapshot::observe(&desired);
        let plan = Reconciler::reconcile(&desired, &observed);

        tracing::debug!(?plan, "created plan");

        plan
    }

    /// Installs without a TUI.
    ///
    /// `prompter` is asked to confirm the plan and any prerequisite
    /// installation, unless [`InstallFlags::assume_yes`] is set.
    pub fn run(&mut self, prompter: &mut dyn Prompter) -> Result<ExecutionReport, InstallerError> {
        let plan = self.plan();
        log_skipped(&plan);

        if plan.is_empty() {
            tracing::info!("already installed, nothing to do");
            return Ok(ExecutionReport {
                skipped: plan.skipped,
                ..Default::default()
            });
        }

        let mut auto_confirm = AutoConfirm;
        let prompter: &mut dyn Prompter = if self.config.flags.assume_yes {
            &mut auto_confirm
        } else {
            prompter
        };

        let items = plan.describe();
        if !prompter.confirm(&Question::Install { items: &items })? {
            tracing::info!("installation declined");
            return Err(InstallerErrorKind::InterruptedByUser.into());
        }

        let report = Executor::new(
            &self.config,
            &plan,
            self.fetcher.as_ref(),
            self.runner.as_ref(),
            prompter,
        )
        .with_interrupt(self.interrupt.clone())
        .with_progress_callback(|current, total| {
            tracing::debug!(current, total, "install progress");
        })
        .run()?;

        log_report(&report);

        Ok(report)
    }

    /// Installs with a TUI.
    #[cfg(feature = "ui")]
    pub fn run_interactive(&mut self) -> Result<ExecutionReport, InstallerError> {
        {
            let mut tui = self.tui.borrow_mut();
            tui.set_name(
                self.config
                    .metadata
                    .get_display_name(&crate::locale::current_lang_tag()),
                &self.config.metadata.display_version,
            );
            tui.run_background()?;
        }

        let result = self.run_interactive_impl();

        if let Err(error) = &result {
            if !error.kind().is_cancellation() {
                self.tui.borrow().show_error(error)?;
            }
        }

        self.tui.borrow_mut().stop()?;

        result
    }

    #[cfg(feature = "ui")]
    fn run_interactive_impl(&mut self) -> Result<ExecutionReport, InstallerError> {
        let tui = self.tui.borrow();

        tui.set_up_background_text(false)?;
        tui.installation_intro()?.unwrap_button()?;

        let plan = self.plan();
        log_skipped(&plan);

        if plan.is_empty() {
            tui.show_unneeded_install(false)?;
            return Ok(ExecutionReport {
                skipped: plan.skipped,
                ..Default::default()
            });
        }

        tui.prompt_install_confirm(&plan.describe())?.unwrap_button()?;
        tui.show_progress_dialog(false)?;
        drop(tui);

        let mut prompter = TuiPrompter::new(self.tui.clone());
        let progress_tui = self.tui.clone();
        let steps = plan.describe();

        let report = Executor::new(
            &self.config,
            &plan,
            self.fetcher.as_ref(),
            self.runner.as_ref(),
            &mut prompter,
        )
        .with_interrupt(self.interrupt.clone())
        .with_progress_callback(move |current, total| {
            if progress_tui.borrow().is_running() {
                let next_step = steps.get(current as usize).cloned();
                let _ = progress_tui
                    .borrow_mut()
                    .update_progress(current, total, next_step);
            }
        })
        .run()?;

        log_report(&report);

        let tui = self.tui.borrow();
        tui.hide_progress_dialog()?;

        let warnings = Vec::from_iter(
            report
                .warnings
                .iter()
                .map(|warning| warning.action.describe()),
        );
        tui.installation_conclusion(&warnings)?;

        Ok(report)
    }
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn log_skipped(plan: &ActionPlan) {
    for skipped in &plan.skipped {
        match &skipped.reason {
            SkipReason::AlreadyInstalled => {
                tracing::debug!(kind = ?skipped.kind, path = ?skipped.path, "already installed");
            }
            SkipReason::UserData(reason) => {
                tracing::warn!(kind = ?skipped.kind, path = ?skipped.path, reason, "leaving user data untouched");
            }
        }
    }
}

fn log_report(report: &ExecutionReport) {
    tracing::info!(
        completed = report.completed.len(),
        warnings = report.warnings.len(),
        "installation finished"
    );

    for warning in &report.warnings {
        tracing::warn!(action = warning.action.describe(), error = warning.message, "step failed");
    }
}
