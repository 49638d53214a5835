use std::{ffi::OsStr, fs::File, io::Write, path::Path};

use tempfile::NamedTempFile;

use crate::{
    error::{AddInstallerContext, InstallerError, InstallerErrorKind},
    manifest::{DiskFileEntry, DiskManifest, TargetKind},
    net::{FetchError, Fetcher},
    os::{FileChecksum, Interrupt},
    path::Platform,
    prereq::CommandRunner,
    prompt::Prompter,
};

use super::{
    plan::{Action, ActionPlan, SkippedTarget},
    shortcut::shortcut_contents,
    InstallConfig,
};

const MAX_DOWNLOAD_ATTEMPTS: u32 = 2;

/// A non-fatal action failure.
#[derive(Debug, Clone)]
pub struct ActionWarning {
    /// The failed action.
    pub action: Action,
    /// Formatted error chain.
    pub message: String,
}

/// Outcome of an installation run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Actions that succeeded.
    pub completed: Vec<Action>,
    /// Actions that failed without stopping the installation.
    pub warnings: Vec<ActionWarning>,
    /// Targets left untouched.
    pub skipped: Vec<SkippedTarget>,
}

impl ExecutionReport {
    /// Returns whether every action succeeded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Applies an [`ActionPlan`] in order.
pub struct Executor<'a> {
    config: &'a InstallConfig,
    plan: &'a ActionPlan,
    fetcher: &'a dyn Fetcher,
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
    interrupt: Interrupt,
    progress_callback: Box<dyn FnMut(u64, u64) + 'a>,
    release_tag: Option<String>,
}

impl<'a> Executor<'a> {
    /// Creates an executor for a plan computed from `config`.
    ///
    /// `prompter` is asked before installing a missing Python interpreter.
    pub fn new(
        config: &'a InstallConfig,
        plan: &'a ActionPlan,
        fetcher: &'a dyn Fetcher,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            config,
            plan,
            fetcher,
            runner,
            prompter,
            interrupt: Interrupt::new(),
            progress_callback: Box::new(|_, _| {}),
            release_tag: None,
        }
    }

    /// Sets the flag checked between actions and during downloads.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Sets the callback receiving the number of finished actions and the total.
    pub fn with_progress_callback<F>(mut self, progress_callback: F) -> Self
    where
        F: FnMut(u64, u64) + 'a,
    {
        self.progress_callback = Box::new(progress_callback);
        self
    }

    /// Applies the plan and saves the disk manifest.
    ///
    /// The manifest is saved even when a fatal action fails, so a later
    /// uninstallation knows what was created.
    pub fn run(&mut self) -> Result<ExecutionReport, InstallerError> {
        let mut manifest = self.load_manifest();
        let mut report = ExecutionReport {
            skipped: self.plan.skipped.clone(),
            ..Default::default()
        };

        for entry in &self.plan.dirs {
            if entry.preserve {
                manifest.record_dir(&entry.path, true);
            }
        }

        let result = self.run_actions(&mut manifest, &mut report);
        let save_result = self.save_manifest(&mut manifest);

        if let (Err(_), Err(error)) = (&result, &save_result) {
            tracing::error!(%error, "failed to save disk manifest after failure");
        }

        result?;
        save_result.inst_context("failed to save disk manifest")?;

        Ok(report)
    }

    fn load_manifest(&self) -> DiskManifest {
        let resolver = &self.config.resolver;

        match crate::manifest::discover_manifest(resolver, &self.config.app_id) {
            Ok(manifest) => {
                tracing::debug!(path = ?manifest.manifest_path, "merging into existing disk manifest");
                manifest
            }
            Err(error) => {
                if !matches!(error.kind(), InstallerErrorKind::DiskManifestNotFound) {
                    tracing::warn!(%error, "ignoring unusable disk manifest");
                }

                DiskManifest::new(
                    &self.config.app_id,
                    resolver.platform(),
                    resolver.access_scope(),
                    resolver.manifest_path(),
                )
            }
        }
    }

    fn save_manifest(&self, manifest: &mut DiskManifest) -> Result<(), InstallerError> {
        if !self.config.resolver.data_dir().is_dir() {
            tracing::debug!("data directory missing, disk manifest not saved");
            return Ok(());
        }

        manifest.app_name = self.config.metadata.display_name.clone();
        manifest.app_version = self.config.metadata.display_version.clone();

        tracing::debug!(path = ?manifest.manifest_path, "saving disk manifest");
        manifest.save()
    }

    fn run_actions(
        &mut self,
        manifest: &mut DiskManifest,
        report: &mut ExecutionReport,
    ) -> Result<(), InstallerError> {
        let plan = self.plan;
        let total = plan.actions.len() as u64;

        for (index, action) in plan.actions.iter().enumerate() {
            self.interrupt.check()?;

            let description = action.describe();
            let span = tracing::info_span!("action", action = description);
            let _guard = span.enter();

            tracing::info!("applying");

            match self.apply(action, manifest) {
                Ok(()) => {
                    tracing::info!("done");
                    report.completed.push(action.clone());
                }
                Err(error) if error.kind().is_cancellation() => return Err(error),
                Err(error) if action.is_fatal() => {
                    tracing::error!(error = crate::error::format_error(&error), "fatal failure");
                    return Err(error.with_context(description));
                }
                Err(error) => {
                    let message = crate::error::format_error(&error);
                    tracing::warn!(error = message, "failed, continuing");
                    report.warnings.push(ActionWarning {
                        action: action.clone(),
                        message,
                    });
                }
            }

            (self.progress_callback)(index as u64 + 1, total);
        }

        Ok(())
    }

    fn apply(&mut self, action: &Action, manifest: &mut DiskManifest) -> Result<(), InstallerError> {
        match action {
            Action::CreateDir { path, .. } => self.create_dir(path, manifest),
            Action::InstallBinary { path } => self.install_binary(path, manifest),
            Action::RemoveRuntime { path } => self.remove_runtime(path, manifest),
            Action::CreateRuntime { path } => self.create_runtime(path, manifest),
            Action::DownloadModel { weights, metadata } => {
                self.download_model(weights, metadata, manifest)
            }
            Action::InstallHelper { path } => self.install_helper(path, manifest),
            Action::LinkPathEntry { path } => self.link_path_entry(path, manifest),
            Action::WriteShortcut { path } => self.write_shortcut(path, manifest),
            Action::WriteConfig { path } => self.write_config(path, manifest),
        }
    }

    fn create_dir(&self, path: &Path, manifest: &mut DiskManifest) -> Result<(), InstallerError> {
        tracing::debug!(?path, "creating directories");
        std::fs::create_dir_all(path).map_err(|error| fs_error(error, "create directory", path))?;
        manifest.record_dir(path, false);

        Ok(())
    }

    fn install_binary(
        &mut self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        if let Some(local) = self.config.local_binary_path() {
            if local.is_file() {
                tracing::info!(?local, "using local build");

                match self.copy_atomic(&local, path, true) {
                    Ok(checksum) => {
                        record_file(manifest, path, &checksum, TargetKind::Binary);
                        return Ok(());
                    }
                    Err(error) => tracing::warn!(%error, "could not copy local build"),
                }
            } else {
                tracing::debug!(?local, "no local build");
            }
        }

        let tag = self.release_tag()?;
        let url = self.config.release_asset_url(&tag);
        let checksum = self.download_with_fallback(&[url], path, true)?;
        record_file(manifest, path, &checksum, TargetKind::Binary);

        Ok(())
    }

    fn release_tag(&mut self) -> Result<String, InstallerError> {
        if let Some(tag) = &self.release_tag {
            return Ok(tag.clone());
        }

        let repo = &self.config.release_repo;
        let mut attempt = 1;

        let tag = loop {
            self.interrupt.check()?;

            match self.fetcher.latest_release_tag(repo) {
                Ok(tag) => break tag,
                Err(error) if error.is_transient() && attempt < MAX_DOWNLOAD_ATTEMPTS => {
                    tracing::warn!(repo, attempt, %error, "release lookup failed, retrying");
                    attempt += 1;
                }
                Err(error) => {
                    return Err(InstallerError::new(InstallerErrorKind::DownloadFailure)
                        .with_context(format!("latest release of {repo}"))
                        .with_source(error));
                }
            }
        };

        self.release_tag = Some(tag.clone());
        Ok(tag)
    }

    fn remove_runtime(
        &self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        let data_dir = self.config.resolver.data_dir();

        if !path.starts_with(&data_dir) || path == data_dir {
            tracing::error!(?path, ?data_dir, "runtime environment outside data directory");
            return Err(InstallerError::new(InstallerErrorKind::InvalidInput)
                .with_context(format!("refusing to remove {path:?}")));
        }

        if path.symlink_metadata().is_ok() {
            tracing::info!(?path, "removing runtime environment");
            std::fs::remove_dir_all(path)
                .map_err(|error| fs_error(error, "remove directory", path))?;
        }

        manifest.forget_files_under(path);
        manifest.runtime_dir = None;

        Ok(())
    }

    fn create_runtime(
        &mut self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        let python =
            crate::prereq::ensure_python(self.runner, self.config.platform(), &mut *self.prompter)?;

        self.interrupt.check()?;
        tracing::info!(?python, ?path, "creating runtime environment");

        manifest.runtime_dir = Some(path.to_path_buf());
        crate::prereq::run_checked(
            self.runner,
            &python,
            &[OsStr::new("-m"), OsStr::new("venv"), path.as_os_str()],
        )
        .inst_context("failed to create runtime environment")?;

        let packages = self.config.runtime_packages();
        if packages.is_empty() {
            return Ok(());
        }

        self.interrupt.check()?;
        tracing::info!(?packages, "installing runtime packages");

        let mut args = vec![
            OsStr::new("-m"),
            OsStr::new("pip"),
            OsStr::new("install"),
            OsStr::new("--upgrade"),
        ];
        args.extend(packages.iter().map(OsStr::new));

        crate::prereq::run_checked(self.runner, &self.config.resolver.runtime_python(), &args)
            .inst_context("failed to install runtime packages")?;

        Ok(())
    }

    fn download_model(
        &mut self,
        weights: &Path,
        metadata: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        for path in [weights, metadata] {
            let file_name = path
                .file_name()
                .ok_or_else(|| InstallerError::new(InstallerErrorKind::InvalidInput))?
                .to_string_lossy();
            let urls = self.config.model_urls(&file_name);

            let checksum = self.download_with_fallback(&urls, path, false)?;
            record_file(manifest, path, &checksum, TargetKind::Model);
        }

        Ok(())
    }

    fn install_helper(
        &mut self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        let local = self
            .config
            .local_helper_path()
            .filter(|local| local.is_file());

        let checksum = if let Some(local) = local {
            tracing::info!(?local, "using helper from project root");
            self.copy_atomic(&local, path, false)?
        } else {
            let url = self.config.helper_url().ok_or_else(|| {
                InstallerError::new(InstallerErrorKind::UnsupportedOsFamily)
                    .with_context("no OCR helper for this platform")
            })?;
            self.download_with_fallback(&[url], path, false)?
        };

        record_file(manifest, path, &checksum, TargetKind::Helper);

        Ok(())
    }

    fn link_path_entry(
        &mut self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        #[cfg(unix)]
        if self.config.platform().is_unix() {
            return self.link_unix(path, manifest);
        }

        #[cfg(windows)]
        if self.config.platform() == Platform::Windows {
            tracing::info!(?path, "modifying Path environment variable");
            crate::os::windows::add_path_env_var(self.config.access_scope(), path.as_os_str())?;
            manifest.search_path = Some(path.to_path_buf());
            return Ok(());
        }

        let _ = (path, manifest);
        Err(InstallerErrorKind::UnsupportedOsFamily.into())
    }

    #[cfg(unix)]
    fn link_unix(&self, path: &Path, manifest: &mut DiskManifest) -> Result<(), InstallerError> {
        let binary = self.config.resolver.binary_path();

        if path.symlink_metadata().is_ok()
            && !crate::os::unix::symlink_points_to(path, &binary)
            && manifest.link_path.as_deref() != Some(path)
        {
            tracing::warn!(?path, ?binary, "existing link points elsewhere, leaving it");
            return Err(
                InstallerError::new(InstallerErrorKind::UnknownFileInDestination)
                    .with_context(format!("{path:?} was not created by this installer")),
            );
        }

        crate::os::unix::replace_symlink(&binary, path)?;
        manifest.link_path = Some(path.to_path_buf());

        let Some(link_dir) = path.parent() else {
            return Ok(());
        };

        if !self.config.modify_os_search_path || search_path_contains(link_dir) {
            return Ok(());
        }

        let profile = crate::os::unix::get_current_shell_profile()?;
        tracing::info!(?link_dir, ?profile, "modifying PATH environment variable");
        crate::os::unix::add_path_env_var(link_dir, &profile)?;

        manifest.search_path = Some(link_dir.to_path_buf());
        manifest.shell_profile_path = Some(profile);

        Ok(())
    }

    fn write_shortcut(
        &self,
        path: &Path,
        manifest: &mut DiskManifest,
    ) -> Result<(), InstallerError> {
        let platform = self.config.platform();
        let contents = shortcut_contents(
            platform,
            &self.config.metadata.display_name,
            &self.config.resolver.binary_path(),
        );

        let checksum = write_atomic(path, contents.as_bytes(), platform == Platform::MacOs)?;
        record_file(manifest, path, &checksum, TargetKind::Shortcut);

        Ok(())
    }

    fn write_config(&self, path: &Path, manifest: &mut DiskManifest) -> Result<(), InstallerError> {
        let mut text = serde_json::to_string_pretty(&self.config.default_app_config())
            .map_err(|error| InstallerError::new(InstallerErrorKind::InvalidData).with_source(error))?;
        text.push('\n');

        let mut file = match File::options().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::info!(?path, "configuration already exists, leaving it");
                return Ok(());
            }
            Err(error) => return Err(fs_error(error, "create file", path)),
        };

        file.write_all(text.as_bytes())?;
        file.flush()?;
        drop(file);

        let checksum = crate::os::file_checksum(path)?;
        record_file(manifest, path, &checksum, TargetKind::Config);

        Ok(())
    }

    fn copy_atomic(
        &self,
        source: &Path,
        destination: &Path,
        executable: bool,
    ) -> Result<FileChecksum, InstallerError> {
        tracing::info!(?source, ?destination, "copying file");

        let mut temp_file = NamedTempFile::new_in(parent_dir(destination)?)?;
        let mut source_file =
            File::open(source).map_err(|error| fs_error(error, "open file", source))?;
        std::io::copy(&mut source_file, &mut temp_file)?;

        persist(temp_file, destination, executable)
    }

    fn download_with_fallback(
        &self,
        urls: &[String],
        destination: &Path,
        executable: bool,
    ) -> Result<FileChecksum, InstallerError> {
        let mut last_error = None;

        for url in urls {
            for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
                self.interrupt.check()?;

                match self.download_once(url, destination, executable) {
                    Ok(checksum) => return Ok(checksum),
                    Err(error) => {
                        self.interrupt.check()?;

                        let transient = error.is_transient();
                        tracing::warn!(url, attempt, transient, %error, "download failed");
                        last_error = Some(error);

                        if !transient {
                            break;
                        }
                    }
                }
            }
        }

        let mut error = InstallerError::new(InstallerErrorKind::DownloadFailure)
            .with_context(destination.to_string_lossy());
        if let Some(source) = last_error {
            error = error.with_source(source);
        }

        Err(error)
    }

    fn download_once(
        &self,
        url: &str,
        destination: &Path,
        executable: bool,
    ) -> Result<FileChecksum, FetchError> {
        let dir = destination
            .parent()
            .ok_or_else(|| FetchError::Other("destination has no parent directory".to_string()))?;
        let mut temp_file = NamedTempFile::new_in(dir)?;

        let len = {
            let mut writer = InterruptibleWriter {
                inner: temp_file.as_file_mut(),
                interrupt: &self.interrupt,
            };
            self.fetcher.download(url, &mut writer)?
        };

        if len == 0 {
            return Err(FetchError::Other(format!("empty response from {url}")));
        }

        persist(temp_file, destination, executable).map_err(|error| match error.as_io() {
            Some(io_error) => FetchError::Io(std::io::Error::new(io_error.kind(), error.to_string())),
            None => FetchError::Other(error.to_string()),
        })
    }
}

/// Aborts a download when the interrupt flag is raised.
struct InterruptibleWriter<'a, W> {
    inner: W,
    interrupt: &'a Interrupt,
}

impl<W: Write> Write for InterruptibleWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        // ErrorKind::Interrupted would make std::io::copy retry.
        if self.interrupt.is_raised() {
            return Err(std::io::Error::other("interrupted by signal"));
        }

        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn persist(
    mut temp_file: NamedTempFile,
    destination: &Path,
    executable: bool,
) -> Result<FileChecksum, InstallerError> {
    temp_file.flush()?;

    if executable {
        crate::os::set_executable(temp_file.path())?;
    }

    tracing::debug!(temp_path = ?temp_file.path(), ?destination, "persisting file");
    temp_file
        .persist(destination)
        .map_err(|error| fs_error(error.error, "replace file", destination))?;

    Ok(crate::os::file_checksum(destination)?)
}

fn write_atomic(
    destination: &Path,
    contents: &[u8],
    executable: bool,
) -> Result<FileChecksum, InstallerError> {
    tracing::info!(?destination, "writing file");

    let mut temp_file = NamedTempFile::new_in(parent_dir(destination)?)?;
    temp_file.write_all(contents)?;

    persist(temp_file, destination, executable)
}

fn parent_dir(path: &Path) -> Result<&Path, InstallerError> {
    path.parent().ok_or_else(|| {
        InstallerError::new(InstallerErrorKind::InvalidInput)
            .with_context(format!("{path:?} has no parent directory"))
    })
}

fn record_file(manifest: &mut DiskManifest, path: &Path, checksum: &FileChecksum, kind: TargetKind) {
    manifest.record_file(DiskFileEntry::new(path.to_path_buf(), checksum, kind));
}

fn fs_error(error: std::io::Error, operation: &str, path: &Path) -> InstallerError {
    InstallerError::from(error).with_context(format!("could not {operation} {path:?}"))
}

#[cfg(unix)]
fn search_path_contains(dir: &Path) -> bool {
    std::env::var_os("PATH")
        .map(|value| std::env::split_paths(&value).any(|entry| entry == dir))
        .unwrap_or(false)
}
