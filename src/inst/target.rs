use std::path::{Path, PathBuf};

use crate::{manifest::TargetKind, os::AccessScope};

use super::InstallConfig;

/// How the existence and validity of a target is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// A non-empty file with the execute permission.
    ExecutableFile,
    /// A directory containing every listed executable.
    Executables(Vec<PathBuf>),
    /// Every listed file exists and is non-empty.
    Files(Vec<PathBuf>),
    /// A non-empty file.
    NonEmptyFile,
    /// A symbolic link pointing to the given path.
    SymlinkTo(PathBuf),
    /// The directory is listed in the `Path` registry value of the scope.
    SearchPathEntry(AccessScope),
    /// A file holding a JSON object.
    JsonObject,
}

/// Logical identity of an installable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Category of the artifact.
    pub kind: TargetKind,
    /// Canonical path.
    pub path: PathBuf,
    /// Validity check.
    pub presence: Presence,
}

impl InstallTarget {
    /// Creates a target.
    pub fn new<P: Into<PathBuf>>(kind: TargetKind, path: P, presence: Presence) -> Self {
        Self {
            kind,
            path: path.into(),
            presence,
        }
    }

    /// Paths of the files making up the target.
    pub fn files(&self) -> Vec<PathBuf> {
        match &self.presence {
            Presence::Files(paths) => paths.clone(),
            Presence::Executables(_) | Presence::SearchPathEntry(_) => Vec::new(),
            _ => vec![self.path.clone()],
        }
    }
}

/// A directory the application needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredDir {
    /// Full path.
    pub path: PathBuf,
    /// Whether failing to create it stops the installation.
    pub primary: bool,
}

/// Every directory and target making up a complete installation.
#[derive(Debug, Clone)]
pub struct DesiredState {
    /// Directories, parents before children.
    pub dirs: Vec<DesiredDir>,
    /// Targets, in installation order.
    pub targets: Vec<InstallTarget>,
    /// Whether valid targets are rebuilt.
    pub force: bool,
}

impl DesiredState {
    /// Computes the desired state from the config.
    ///
    /// Performs no I/O.
    pub fn new(config: &InstallConfig) -> Self {
        let resolver = &config.resolver;
        let mut state = Self {
            dirs: Vec::new(),
            targets: Vec::new(),
            force: config.flags.force,
        };

        state.push_dir(&resolver.data_dir(), true);
        state.push_dir(&resolver.bin_dir(), false);
        if config.wants_model() {
            state.push_dir(&resolver.models_dir(), false);
        }
        state.push_dir(&resolver.logs_dir(), false);
        state.push_dir(&resolver.config_dir(), false);

        let link_dir = resolver.link_dir().filter(|_| config.wants_path_entry());
        if let Some(link_dir) = &link_dir {
            state.push_dir(link_dir, false);
        }
        if config.wants_shortcut() {
            state.push_dir(&resolver.shortcut_dir(), false);
        }

        state.targets.push(InstallTarget::new(
            TargetKind::Binary,
            resolver.binary_path(),
            Presence::ExecutableFile,
        ));

        if config.wants_runtime() {
            state.targets.push(InstallTarget::new(
                TargetKind::RuntimeEnvironment,
                resolver.runtime_dir(),
                Presence::Executables(config.runtime_executables()),
            ));
        }

        if config.wants_model() {
            let (weights, metadata) = resolver.model_files(&config.model_name);
            state.targets.push(InstallTarget::new(
                TargetKind::Model,
                weights.clone(),
                Presence::Files(vec![weights, metadata]),
            ));
        }

        if config.wants_helper() {
            if let Some(path) = resolver.ocr_helper_path() {
                state.targets.push(InstallTarget::new(
                    TargetKind::Helper,
                    path,
                    Presence::NonEmptyFile,
                ));
            }
        }

        if config.wants_path_entry() {
            let target = match resolver.link_path() {
                Some(link_path) => InstallTarget::new(
                    TargetKind::PathEntry,
                    link_path,
                    Presence::SymlinkTo(resolver.binary_path()),
                ),
                None => InstallTarget::new(
                    TargetKind::PathEntry,
                    resolver.bin_dir(),
                    Presence::SearchPathEntry(resolver.access_scope()),
                ),
            };
            state.targets.push(target);
        }

        if config.wants_shortcut() {
            state.targets.push(InstallTarget::new(
                TargetKind::Shortcut,
                resolver.shortcut_path(),
                Presence::NonEmptyFile,
            ));
        }

        state.targets.push(InstallTarget::new(
            TargetKind::Config,
            resolver.config_file(),
            Presence::JsonObject,
        ));

        state
    }

    fn push_dir(&mut self, path: &Path, primary: bool) {
        if !self.dirs.iter().any(|dir| dir.path == path) {
            self.dirs.push(DesiredDir {
                path: path.to_path_buf(),
                primary,
            });
        }
    }

    /// Returns the target of the given kind.
    pub fn target(&self, kind: TargetKind) -> Option<&InstallTarget> {
        self.targets.iter().find(|target| target.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, ffi::OsString};

    use super::*;
    use crate::{
        manifest::AppId,
        path::{PathResolver, Platform},
    };

    fn config(platform: Platform) -> InstallConfig {
        let env_map: HashMap<OsString, OsString> = HashMap::from_iter(
            [
                ("HOME", "/home/rust"),
                ("LOCALAPPDATA", "c:/local"),
                ("APPDATA", "c:/roaming"),
            ]
            .into_iter()
            .map(|(k, v)| (k.into(), v.into())),
        );
        let resolver =
            PathResolver::with_env_map("grars", platform, AccessScope::User, env_map).unwrap();
        InstallConfig::new(&AppId::new(crate::manifest::DEFAULT_APP_ID).unwrap(), resolver)
    }

    fn kinds(state: &DesiredState) -> Vec<TargetKind> {
        state.targets.iter().map(|target| target.kind).collect()
    }

    #[test]
    fn test_linux_complete() {
        let state = DesiredState::new(&config(Platform::Linux));

        assert_eq!(
            kinds(&state),
            [
                TargetKind::Binary,
                TargetKind::RuntimeEnvironment,
                TargetKind::Model,
                TargetKind::Helper,
                TargetKind::PathEntry,
                TargetKind::Shortcut,
                TargetKind::Config,
            ]
        );
        assert!(state.dirs[0].primary);
        assert_eq!(state.dirs[0].path, Path::new("/home/rust/.local/share/grars"));
        assert!(state.dirs[1..].iter().all(|dir| !dir.primary));
        assert_eq!(
            state.target(TargetKind::PathEntry).unwrap().presence,
            Presence::SymlinkTo(PathBuf::from("/home/rust/.local/share/grars/bin/grars"))
        );
        assert_eq!(state.target(TargetKind::Model).unwrap().files().len(), 2);
    }

    #[test]
    fn test_skip_flags() {
        let mut config = config(Platform::Linux);
        config.flags.skip_runtime = true;
        config.flags.skip_engine = true;
        config.flags.skip_shortcuts = true;

        let state = DesiredState::new(&config);

        assert_eq!(
            kinds(&state),
            [TargetKind::Binary, TargetKind::PathEntry, TargetKind::Config]
        );
        assert!(!state
            .dirs
            .iter()
            .any(|dir| dir.path.ends_with("applications") || dir.path.ends_with("models")));
    }

    #[test]
    fn test_windows_search_path() {
        let mut config = config(Platform::Windows);
        let state = DesiredState::new(&config);

        let target = state.target(TargetKind::PathEntry).unwrap();
        assert_eq!(target.path, Path::new("c:/local/grars/bin"));
        assert!(target.files().is_empty());
        assert!(state.target(TargetKind::Helper).is_none());
        // Config and data directories are the same and listed once.
        assert_eq!(
            state
                .dirs
                .iter()
                .filter(|dir| dir.path == Path::new("c:/local/grars"))
                .count(),
            1
        );

        config.modify_os_search_path = false;
        let state = DesiredState::new(&config);
        assert!(state.target(TargetKind::PathEntry).is_none());
    }

    #[test]
    fn test_deterministic() {
        let a = DesiredState::new(&config(Platform::MacOs));
        let b = DesiredState::new(&config(Platform::MacOs));

        assert_eq!(a.targets, b.targets);
        assert_eq!(a.dirs, b.dirs);
    }
}
