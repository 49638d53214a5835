use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use crate::manifest::TargetKind;

use super::target::{DesiredState, InstallTarget, Presence};

/// Observed state of a target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetStatus {
    /// Nothing exists at the path.
    #[default]
    Missing,
    /// The target exists and passes its validity check.
    Valid,
    /// Something exists at the path but fails the validity check.
    Invalid(String),
}

/// What was found on disk for a [`DesiredState`].
///
/// Targets without a recorded status are [`TargetStatus::Missing`].
#[derive(Debug, Clone, Default)]
pub struct FilesystemSnapshot {
    dirs: HashSet<PathBuf>,
    targets: HashMap<TargetKind, TargetStatus>,
}

impl FilesystemSnapshot {
    /// Creates an empty snapshot where nothing exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an existing directory.
    pub fn with_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dirs.insert(path.into());
        self
    }

    /// Records the status of a target.
    pub fn with_status(mut self, kind: TargetKind, status: TargetStatus) -> Self {
        self.targets.insert(kind, status);
        self
    }

    /// Observes the filesystem for every directory and target of `desired`.
    pub fn observe(desired: &DesiredState) -> Self {
        let mut snapshot = Self::new();

        for dir in &desired.dirs {
            if dir.path.is_dir() {
                snapshot.dirs.insert(dir.path.clone());
            }
        }

        for target in &desired.targets {
            let status = observe_target(target);
            tracing::debug!(kind = ?target.kind, path = ?target.path, ?status, "observed target");
            snapshot.targets.insert(target.kind, status);
        }

        snapshot
    }

    /// Returns whether the directory was observed.
    pub fn dir_exists(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    /// Returns the status of a target.
    pub fn status(&self, kind: TargetKind) -> &TargetStatus {
        static MISSING: TargetStatus = TargetStatus::Missing;
        self.targets.get(&kind).unwrap_or(&MISSING)
    }
}

fn observe_target(target: &InstallTarget) -> TargetStatus {
    let path = &target.path;

    match &target.presence {
        Presence::ExecutableFile => {
            if !exists(path) {
                TargetStatus::Missing
            } else if crate::os::is_executable_file(path) {
                TargetStatus::Valid
            } else {
                TargetStatus::Invalid("not an executable file".to_string())
            }
        }
        Presence::Executables(executables) => {
            if !exists(path) {
                return TargetStatus::Missing;
            }

            match executables
                .iter()
                .find(|executable| !crate::os::is_executable_file(executable))
            {
                Some(executable) => TargetStatus::Invalid(format!("missing {executable:?}")),
                None => TargetStatus::Valid,
            }
        }
        Presence::Files(files) => {
            if !files.iter().any(|file| exists(file)) {
                return TargetStatus::Missing;
            }

            match files.iter().find(|file| !is_non_empty_file(file)) {
                Some(file) => TargetStatus::Invalid(format!("missing or empty {file:?}")),
                None => TargetStatus::Valid,
            }
        }
        Presence::NonEmptyFile => {
            if !exists(path) {
                TargetStatus::Missing
            } else if is_non_empty_file(path) {
                TargetStatus::Valid
            } else {
                TargetStatus::Invalid("empty or not a file".to_string())
            }
        }
        Presence::SymlinkTo(expected) => {
            if !exists(path) {
                TargetStatus::Missing
            } else if symlink_points_to(path, expected) {
                TargetStatus::Valid
            } else {
                TargetStatus::Invalid(format!("does not link to {expected:?}"))
            }
        }
        Presence::SearchPathEntry(access_scope) => observe_search_path(path, *access_scope),
        Presence::JsonObject => {
            if !exists(path) {
                return TargetStatus::Missing;
            }

            match std::fs::read(path) {
                Ok(buf) => match serde_json::from_slice::<serde_json::Value>(&buf) {
                    Ok(value) if value.is_object() => TargetStatus::Valid,
                    Ok(_) => TargetStatus::Invalid("not a JSON object".to_string()),
                    Err(error) => TargetStatus::Invalid(format!("invalid JSON: {error}")),
                },
                Err(error) => TargetStatus::Invalid(error.to_string()),
            }
        }
    }
}

/// Existence without following symbolic links.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn is_non_empty_file(path: &Path) -> bool {
    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.len() > 0)
        .unwrap_or(false)
}

fn symlink_points_to(link: &Path, target: &Path) -> bool {
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

fn observe_search_path(dir: &Path, access_scope: crate::os::AccessScope) -> TargetStatus {
    #[cfg(windows)]
    {
        match crate::os::windows::path_env_var_contains(access_scope, dir.as_os_str()) {
            Ok(true) => TargetStatus::Valid,
            Ok(false) => TargetStatus::Missing,
            Err(error) => TargetStatus::Invalid(error.to_string()),
        }
    }
    #[cfg(not(windows))]
    {
        let _ = (dir, access_scope);
        TargetStatus::Missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(kind: TargetKind, path: PathBuf, presence: Presence) -> DesiredState {
        DesiredState {
            dirs: Vec::new(),
            targets: vec![InstallTarget::new(kind, path, presence)],
            force: false,
        }
    }

    #[test]
    fn test_config_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let state = target(TargetKind::Config, path.clone(), Presence::JsonObject);

        assert_eq!(
            FilesystemSnapshot::observe(&state).status(TargetKind::Config),
            &TargetStatus::Missing
        );

        std::fs::write(&path, b"[1, 2]").unwrap();
        assert!(matches!(
            FilesystemSnapshot::observe(&state).status(TargetKind::Config),
            TargetStatus::Invalid(_)
        ));

        std::fs::write(&path, br#"{"log_level": "debug"}"#).unwrap();
        assert_eq!(
            FilesystemSnapshot::observe(&state).status(TargetKind::Config),
            &TargetStatus::Valid
        );
    }

    #[test]
    fn test_model_status() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("voice.onnx");
        let metadata = dir.path().join("voice.onnx.json");
        let state = target(
            TargetKind::Model,
            weights.clone(),
            Presence::Files(vec![weights.clone(), metadata.clone()]),
        );

        std::fs::write(&weights, b"weights").unwrap();
        assert!(matches!(
            FilesystemSnapshot::observe(&state).status(TargetKind::Model),
            TargetStatus::Invalid(_)
        ));

        std::fs::write(&metadata, b"{}").unwrap();
        assert_eq!(
            FilesystemSnapshot::observe(&state).status(TargetKind::Model),
            &TargetStatus::Valid
        );
    }

    #[test]
    fn test_runtime_status() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("venv");
        let python = runtime.join("bin").join("python");
        let state = target(
            TargetKind::RuntimeEnvironment,
            runtime.clone(),
            Presence::Executables(vec![python.clone()]),
        );

        assert_eq!(
            FilesystemSnapshot::observe(&state).status(TargetKind::RuntimeEnvironment),
            &TargetStatus::Missing
        );

        std::fs::create_dir_all(runtime.join("bin")).unwrap();
        assert!(matches!(
            FilesystemSnapshot::observe(&state).status(TargetKind::RuntimeEnvironment),
            TargetStatus::Invalid(_)
        ));

        std::fs::write(&python, b"#!/bin/sh\n").unwrap();
        crate::os::set_executable(&python).unwrap();
        assert_eq!(
            FilesystemSnapshot::observe(&state).status(TargetKind::RuntimeEnvironment),
            &TargetStatus::Valid
        );
    }

    #[test]
    fn test_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = target(TargetKind::Binary, dir.path().join("x"), Presence::ExecutableFile);
        state.dirs.push(super::super::target::DesiredDir {
            path: dir.path().to_path_buf(),
            primary: true,
        });
        state.dirs.push(super::super::target::DesiredDir {
            path: dir.path().join("missing"),
            primary: false,
        });

        let snapshot = FilesystemSnapshot::observe(&state);

        assert!(snapshot.dir_exists(dir.path()));
        assert!(!snapshot.dir_exists(&dir.path().join("missing")));
        assert_eq!(snapshot.status(TargetKind::Binary), &TargetStatus::Missing);
    }
}
