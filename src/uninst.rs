//! Uninstaller functionality.
//!
//! The uninstaller computes the same paths as the installer with every
//! optional target enabled, keeps those that exist and belong to the
//! application, and removes them in reverse installation order.
//!
//! Ownership is decided with the [`DiskManifest`]:
//!
//! * A recorded file is removed only while its checksum matches the record.
//! * A directory is removed only if the installer created it and it is empty.
//! * Without a manifest, unrecorded files at the computed paths are removed
//!   except the configuration file, and only the application named data and
//!   configuration directories are candidates for removal.
#[cfg(feature = "ui")]
use std::{cell::RefCell, rc::Rc};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::{
    error::{InstallerError, InstallerErrorKind},
    inst::{DesiredState, InstallConfig, InstallFlags, InstallTarget, Presence},
    manifest::{DiskManifest, TargetKind},
    os::Interrupt,
    prompt::{AutoConfirm, Prompter, Question},
};
#[cfg(feature = "ui")]
use crate::tui::Tui;

/// One thing the uninstaller removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// A file written by the installer.
    File {
        /// Full path.
        path: PathBuf,
        /// Target the file belongs to.
        kind: TargetKind,
    },
    /// The runtime environment directory, removed recursively.
    RuntimeEnvironment {
        /// Full path.
        path: PathBuf,
    },
    /// Symbolic link to the binary.
    Link {
        /// Full path of the link.
        path: PathBuf,
    },
    /// Snippet adding a directory to PATH in a shell profile.
    ShellProfileEntry {
        /// Directory added to PATH.
        dir: PathBuf,
        /// Modified profile.
        profile: PathBuf,
    },
    /// Entry of the `Path` registry value.
    SearchPathEntry {
        /// Directory listed in `Path`.
        dir: PathBuf,
    },
    /// The disk manifest.
    Manifest {
        /// Full path.
        path: PathBuf,
    },
    /// An application directory, removed only when empty.
    Dir {
        /// Full path.
        path: PathBuf,
    },
}

impl Removal {
    /// Returns a single line summary.
    pub fn describe(&self) -> String {
        match self {
            Removal::File { path, kind } => format!("{} {}", kind.label(), path.display()),
            Removal::RuntimeEnvironment { path } => {
                format!("runtime environment {}", path.display())
            }
            Removal::Link { path } => format!("link {}", path.display()),
            Removal::ShellProfileEntry { dir, profile } => {
                format!("PATH entry {} in {}", dir.display(), profile.display())
            }
            Removal::SearchPathEntry { dir } => format!("Path entry {}", dir.display()),
            Removal::Manifest { path } => format!("install manifest {}", path.display()),
            Removal::Dir { path } => format!("directory {}", path.display()),
        }
    }
}

/// A file left in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptFile {
    /// Full path.
    pub path: PathBuf,
    /// Why the file is kept.
    pub reason: String,
}

/// What the uninstaller found.
#[derive(Debug, Clone)]
pub struct UninstallPlan {
    /// Removals, in order.
    pub removals: Vec<Removal>,
    /// Files that belong to the application but are left in place.
    pub kept: Vec<KeptFile>,
    /// The disk manifest, if one was found.
    pub manifest: Option<DiskManifest>,
}

impl UninstallPlan {
    /// Returns whether nothing belonging to the application was found.
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.kept.is_empty()
    }

    /// Returns one line per removal.
    pub fn describe(&self) -> Vec<String> {
        self.removals.iter().map(Removal::describe).collect()
    }
}

/// Outcome of an uninstallation.
#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    /// Removals that succeeded.
    pub removed: Vec<Removal>,
    /// Files left in place.
    pub kept: Vec<KeptFile>,
    /// Removals that failed or were skipped at removal time.
    pub warnings: Vec<String>,
}

/// The uninstaller interface.
pub struct Uninstaller {
    config: InstallConfig,
    interrupt: Interrupt,
    #[cfg(feature = "ui")]
    tui: Rc<RefCell<Tui>>,
}

impl Uninstaller {
    /// Creates an uninstaller for the paths of the given config.
    ///
    /// The config's flags are ignored: every optional target is considered.
    pub fn new(config: &InstallConfig) -> Self {
        let mut config = config.clone();
        config.flags = InstallFlags {
            assume_yes: config.flags.assume_yes,
            ..Default::default()
        };
        config.modify_os_search_path = true;

        Self {
            config,
            interrupt: Interrupt::new(),
            #[cfg(feature = "ui")]
            tui: Rc::new(RefCell::new(Tui::new())),
        }
    }

    /// Sets the flag checked between removals.
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

    /// Finds everything to remove.
    pub fn plan(&self) -> Result<UninstallPlan, InstallerError> {
        let resolver = &self.config.resolver;

        let manifest =
            match crate::manifest::discover_manifest(resolver, &self.config.app_id) {
                Ok(manifest) => Some(manifest),
                Err(error) => match error.kind() {
                    InstallerErrorKind::DiskManifestNotFound => {
                        tracing::info!("no disk manifest, using computed paths only");
                        None
                    }
                    InstallerErrorKind::MismatchedDiskManifest => return Err(error),
                    _ => {
                        tracing::warn!(%error, "ignoring unusable disk manifest");
                        None
                    }
                },
            };

        let desired = DesiredState::new(&self.config);
        let mut plan = UninstallPlan {
            removals: Vec::new(),
            kept: Vec::new(),
            manifest,
        };

        for target in desired.targets.iter().rev() {
            self.plan_target(target, &mut plan);
        }

        if let Some(manifest) = &plan.manifest {
            plan.removals.push(Removal::Manifest {
                path: manifest.manifest_path.clone(),
            });
        }

        for dir in desired.dirs.iter().rev() {
            if dir.path.is_dir() && self.owns_dir(&dir.path, plan.manifest.as_ref()) {
                plan.removals.push(Removal::Dir {
                    path: dir.path.clone(),
                });
            }
        }

        tracing::debug!(?plan, "created uninstall plan");

        Ok(plan)
    }

    fn plan_target(&self, target: &InstallTarget, plan: &mut UninstallPlan) {
        match (&target.presence, target.kind) {
            (Presence::Executables(_), _) => {
                if !exists(&target.path)
                    || !target.path.starts_with(self.config.resolver.data_dir())
                {
                    return;
                }

                // Without a manifest the computed path is all there is to go on.
                let created = plan.manifest.as_ref().map_or(true, |manifest| {
                    manifest.runtime_dir.as_deref() == Some(target.path.as_path())
                });

                if created {
                    plan.removals.push(Removal::RuntimeEnvironment {
                        path: target.path.clone(),
                    });
                } else {
                    tracing::warn!(path = ?target.path, "keeping runtime environment");
                    plan.kept.push(KeptFile {
                        path: target.path.clone(),
                        reason: "not installed by this installer".to_string(),
                    });
                }
            }
            (Presence::SymlinkTo(binary), _) => {
                self.plan_unix_search_path(&target.path, plan);

                if exists(&target.path) {
                    if is_link_to(&target.path, binary) {
                        plan.removals.push(Removal::Link {
                            path: target.path.clone(),
                        });
                    } else {
                        plan.kept.push(KeptFile {
                            path: target.path.clone(),
                            reason: "does not link to the installed binary".to_string(),
                        });
                    }
                }
            }
            (Presence::SearchPathEntry(_), _) => self.plan_windows_search_path(&target.path, plan),
            (_, kind) => {
                for path in target.files() {
                    if exists(&path) {
                        self.plan_file(path, kind, plan);
                    }
                }
            }
        }
    }

    fn plan_file(&self, path: PathBuf, kind: TargetKind, plan: &mut UninstallPlan) {
        let entry = plan
            .manifest
            .as_ref()
            .and_then(|manifest| manifest.file_entry(&path));

        let keep_reason = match entry {
            Some(entry) => match crate::os::file_checksum(&path) {
                Ok(checksum) if entry.matches(&checksum) => None,
                Ok(_) => Some("modified since installation".to_string()),
                Err(error) => Some(format!("could not read checksum: {error}")),
            },
            None if plan.manifest.is_some() => Some("not installed by this installer".to_string()),
            None if kind == TargetKind::Config => Some("user configuration".to_string()),
            None => None,
        };

        match keep_reason {
            Some(reason) => {
                tracing::warn!(?path, reason, "keeping file");
                plan.kept.push(KeptFile { path, reason });
            }
            None => plan.removals.push(Removal::File { path, kind }),
        }
    }

    fn plan_unix_search_path(&self, link_path: &Path, plan: &mut UninstallPlan) {
        #[cfg(unix)]
        {
            let recorded = plan.manifest.as_ref().and_then(|manifest| {
                manifest
                    .search_path
                    .clone()
                    .zip(manifest.shell_profile_path.clone())
            });

            let entry = recorded.or_else(|| {
                let dir = link_path.parent()?.to_path_buf();
                let profile = crate::os::unix::get_current_shell_profile().ok()?;
                Some((dir, profile))
            });

            if let Some((dir, profile)) = entry {
                if crate::os::unix::profile_contains_path(&dir, &profile).unwrap_or(false) {
                    plan.removals
                        .push(Removal::ShellProfileEntry { dir, profile });
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (link_path, plan);
        }
    }

    fn plan_windows_search_path(&self, dir: &Path, plan: &mut UninstallPlan) {
        #[cfg(windows)]
        {
            let recorded = plan
                .manifest
                .as_ref()
                .and_then(|manifest| manifest.search_path.clone());
            let dir = recorded.unwrap_or_else(|| dir.to_path_buf());

            if crate::os::windows::path_env_var_contains(self.config.access_scope(), dir.as_os_str())
                .unwrap_or(false)
            {
                plan.removals.push(Removal::SearchPathEntry { dir });
            }
        }
        #[cfg(not(windows))]
        {
            let _ = (dir, plan);
        }
    }

    fn owns_dir(&self, path: &Path, manifest: Option<&DiskManifest>) -> bool {
        match manifest {
            Some(manifest) => manifest
                .dir_entry(path)
                .map(|entry| !entry.preserve)
                .unwrap_or(false),
            None => {
                let resolver = &self.config.resolver;
                path.starts_with(resolver.data_dir()) || path.starts_with(resolver.config_dir())
            }
        }
    }

    /// Uninstalls without a TUI.
    ///
    /// `prompter` is asked to confirm the removals unless
    /// [`InstallFlags::assume_yes`] is set.
    pub fn run(&mut self, prompter: &mut dyn Prompter) -> Result<UninstallReport, InstallerError> {
        let plan = self.plan()?;

        if plan.is_empty() {
            return Err(InstallerErrorKind::NotInstalled.into());
        }

        let mut auto_confirm = AutoConfirm;
        let prompter: &mut dyn Prompter = if self.config.flags.assume_yes {
            &mut auto_confirm
        } else {
            prompter
        };

        let items = plan.describe();
        if !items.is_empty() && !prompter.confirm(&Question::Uninstall { items: &items })? {
            tracing::info!("uninstallation declined");
            return Err(InstallerErrorKind::InterruptedByUser.into());
        }

        self.run_impl(plan, &mut |_, _| {})
    }

    /// Uninstalls with a TUI.
    #[cfg(feature = "ui")]
    pub fn run_interactive(&mut self) -> Result<UninstallReport, InstallerError> {
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
            match error.kind() {
                InstallerErrorKind::NotInstalled => {
                    self.tui.borrow().show_unneeded_install(true)?;
                }
                kind if kind.is_cancellation() => {}
                _ => {
                    self.tui.borrow().show_error(error)?;
                }
            }
        }

        self.tui.borrow_mut().stop()?;

        result
    }

    #[cfg(feature = "ui")]
    fn run_interactive_impl(&mut self) -> Result<UninstallReport, InstallerError> {
        let tui = self.tui.borrow();

        tui.set_up_background_text(true)?;

        let plan = self.plan()?;
        if plan.is_empty() {
            return Err(InstallerErrorKind::NotInstalled.into());
        }

        tui.uninstallation_intro()?.unwrap_button()?;
        tui.prompt_uninstall_confirm(&plan.describe())?
            .unwrap_button()?;
        tui.show_progress_dialog(true)?;
        drop(tui);

        let progress_tui = self.tui.clone();
        let report = self.run_impl(plan, &mut |current, total| {
            if progress_tui.borrow().is_running() {
                let _ = progress_tui
                    .borrow_mut()
                    .update_progress(current, total, None);
            }
        })?;

        let tui = self.tui.borrow();
        tui.hide_progress_dialog()?;

        let mut warnings = Vec::from_iter(
            report
                .kept
                .iter()
                .map(|kept| format!("{} ({})", kept.path.display(), kept.reason)),
        );
        warnings.extend(report.warnings.iter().cloned());
        tui.uninstallation_conclusion(&warnings)?;

        Ok(report)
    }

    fn run_impl(
        &self,
        plan: UninstallPlan,
        progress_callback: &mut dyn FnMut(u64, u64),
    ) -> Result<UninstallReport, InstallerError> {
        let mut report = UninstallReport {
            kept: plan.kept.clone(),
            ..Default::default()
        };
        let total = plan.removals.len() as u64;
        let kept_paths = HashSet::<&Path>::from_iter(plan.kept.iter().map(|kept| kept.path.as_path()));

        for (index, removal) in plan.removals.iter().enumerate() {
            self.interrupt.check()?;

            let result = match removal {
                Removal::Manifest { path } => {
                    self.remove_manifest(path, plan.manifest.as_ref(), &kept_paths)
                }
                _ => self.remove(removal),
            };

            match result {
                Ok(true) => report.removed.push(removal.clone()),
                Ok(false) => {}
                Err(error) => {
                    let message = format!(
                        "{}: {}",
                        removal.describe(),
                        crate::error::format_error(&error)
                    );
                    tracing::warn!(message, "removal failed");
                    report.warnings.push(message);
                }
            }

            progress_callback(index as u64 + 1, total);
        }

        tracing::info!(
            removed = report.removed.len(),
            kept = report.kept.len(),
            warnings = report.warnings.len(),
            "uninstallation finished"
        );

        Ok(report)
    }

    /// Returns whether something was removed.
    fn remove(&self, removal: &Removal) -> Result<bool, InstallerError> {
        match removal {
            Removal::File { path, .. } | Removal::Link { path } => {
                tracing::info!(?path, "removing file");
                std::fs::remove_file(path)?;
                Ok(true)
            }
            Removal::RuntimeEnvironment { path } => {
                let data_dir = self.config.resolver.data_dir();

                if !path.starts_with(&data_dir) || path == &data_dir {
                    return Err(InstallerError::new(InstallerErrorKind::InvalidInput)
                        .with_context(format!("refusing to remove {path:?}")));
                }

                tracing::info!(?path, "removing runtime environment");
                std::fs::remove_dir_all(path)?;
                Ok(true)
            }
            Removal::ShellProfileEntry { dir, profile } => {
                #[cfg(unix)]
                {
                    tracing::info!(?dir, ?profile, "removing PATH environment variable");
                    Ok(crate::os::unix::remove_path_env_var(dir, profile)?)
                }
                #[cfg(not(unix))]
                {
                    let _ = (dir, profile);
                    Err(InstallerErrorKind::UnsupportedOsFamily.into())
                }
            }
            Removal::SearchPathEntry { dir } => {
                #[cfg(windows)]
                {
                    tracing::info!(?dir, "removing Path environment variable");
                    crate::os::windows::remove_path_env_var(
                        self.config.access_scope(),
                        dir.as_os_str(),
                    )?;
                    Ok(true)
                }
                #[cfg(not(windows))]
                {
                    let _ = dir;
                    Err(InstallerErrorKind::UnsupportedOsFamily.into())
                }
            }
            Removal::Dir { path } => {
                if std::fs::read_dir(path)?.next().is_some() {
                    tracing::warn!(?path, "cannot remove directory: not empty");
                    return Ok(false);
                }

                tracing::info!(?path, "removing directory");
                std::fs::remove_dir(path)?;
                Ok(true)
            }
            Removal::Manifest { path } => {
                std::fs::remove_file(path)?;
                Ok(true)
            }
        }
    }

    /// Deletes the manifest, or rewrites it with only the kept files so a
    /// later run still knows they are not its own to delete.
    fn remove_manifest(
        &self,
        path: &Path,
        manifest: Option<&DiskManifest>,
        kept_paths: &HashSet<&Path>,
    ) -> Result<bool, InstallerError> {
        let recorded_kept = manifest
            .map(|manifest| {
                manifest
                    .files
                    .iter()
                    .any(|entry| kept_paths.contains(entry.path.as_path()))
            })
            .unwrap_or(false);

        match manifest {
            Some(manifest) if recorded_kept => {
                tracing::info!(?path, "rewriting manifest with kept files");
                let mut manifest = manifest.clone();
                manifest
                    .files
                    .retain(|entry| kept_paths.contains(entry.path.as_path()));
                manifest.runtime_dir = None;
                manifest.link_path = None;
                manifest.search_path = None;
                manifest.shell_profile_path = None;
                manifest.save()?;
                Ok(false)
            }
            _ => {
                tracing::info!(?path, "removing manifest file");
                std::fs::remove_file(path)?;
                Ok(true)
            }
        }
    }
}

impl std::fmt::Debug for Uninstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uninstaller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn is_link_to(link: &Path, target: &Path) -> bool {
    #[cfg(unix)]
    {
        crate::os::unix::symlink_points_to(link, target)
    }
    #[cfg(not(unix))]
    {
        let _ = (link, target);
        false
    }
}
