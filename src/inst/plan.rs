use std::path::PathBuf;

use crate::manifest::TargetKind;

use super::{
    snapshot::{FilesystemSnapshot, TargetStatus},
    target::{DesiredState, InstallTarget},
};

/// An idempotent step of an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a directory and its parents.
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Whether it is the primary data directory.
        primary: bool,
    },
    /// Place the application binary.
    InstallBinary {
        /// Destination path.
        path: PathBuf,
    },
    /// Delete the runtime environment directory.
    RemoveRuntime {
        /// Runtime environment directory.
        path: PathBuf,
    },
    /// Create the runtime environment and install its packages.
    CreateRuntime {
        /// Runtime environment directory.
        path: PathBuf,
    },
    /// Download the model weights and metadata.
    DownloadModel {
        /// Weights file.
        weights: PathBuf,
        /// Metadata file.
        metadata: PathBuf,
    },
    /// Place the OCR helper script.
    InstallHelper {
        /// Destination path.
        path: PathBuf,
    },
    /// Make the binary reachable from the search path.
    LinkPathEntry {
        /// Link path, or the directory added to the search path.
        path: PathBuf,
    },
    /// Write the desktop shortcut.
    WriteShortcut {
        /// Shortcut path.
        path: PathBuf,
    },
    /// Write the default application configuration.
    WriteConfig {
        /// Configuration file path.
        path: PathBuf,
    },
}

impl Action {
    /// Returns whether a failure of this action stops the installation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InstallBinary { .. } | Self::CreateDir { primary: true, .. }
        )
    }

    /// Returns the kind of target the action builds.
    pub fn target_kind(&self) -> Option<TargetKind> {
        match self {
            Self::CreateDir { .. } => None,
            Self::InstallBinary { .. } => Some(TargetKind::Binary),
            Self::RemoveRuntime { .. } | Self::CreateRuntime { .. } => {
                Some(TargetKind::RuntimeEnvironment)
            }
            Self::DownloadModel { .. } => Some(TargetKind::Model),
            Self::InstallHelper { .. } => Some(TargetKind::Helper),
            Self::LinkPathEntry { .. } => Some(TargetKind::PathEntry),
            Self::WriteShortcut { .. } => Some(TargetKind::Shortcut),
            Self::WriteConfig { .. } => Some(TargetKind::Config),
        }
    }

    /// Returns a one line description.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateDir { path, .. } => format!("create directory {}", path.display()),
            Self::InstallBinary { path } => format!("install binary {}", path.display()),
            Self::RemoveRuntime { path } => {
                format!("remove runtime environment {}", path.display())
            }
            Self::CreateRuntime { path } => {
                format!("create runtime environment {}", path.display())
            }
            Self::DownloadModel { weights, .. } => format!("download model {}", weights.display()),
            Self::InstallHelper { path } => format!("install helper {}", path.display()),
            Self::LinkPathEntry { path } => format!("add search path entry {}", path.display()),
            Self::WriteShortcut { path } => format!("write shortcut {}", path.display()),
            Self::WriteConfig { path } => format!("write configuration {}", path.display()),
        }
    }
}

/// Directory of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDirEntry {
    /// Full path.
    pub path: PathBuf,
    /// Whether it existed before and must be kept when uninstalling.
    pub preserve: bool,
}

/// Why a target is not acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The target is present and valid.
    AlreadyInstalled,
    /// The target holds user data that is never replaced.
    UserData(String),
}

/// A target left untouched by the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTarget {
    /// Category of the target.
    pub kind: TargetKind,
    /// Canonical path.
    pub path: PathBuf,
    /// Why it is skipped.
    pub reason: SkipReason,
}

/// Ordered actions converging the filesystem to the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    /// Every desired directory with whether it already existed.
    pub dirs: Vec<PlanDirEntry>,
    /// Actions in execution order.
    pub actions: Vec<Action>,
    /// Targets left untouched.
    pub skipped: Vec<SkippedTarget>,
}

impl ActionPlan {
    /// Returns whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// One line per action.
    pub fn describe(&self) -> Vec<String> {
        self.actions.iter().map(Action::describe).collect()
    }
}

/// Diffs the desired state against a snapshot.
#[derive(Debug)]
pub struct Reconciler;

impl Reconciler {
    /// Computes the actions needed to converge.
    ///
    /// Pure function of its inputs: no I/O is performed.
    pub fn reconcile(desired: &DesiredState, observed: &FilesystemSnapshot) -> ActionPlan {
        let mut plan = ActionPlan::default();

        for dir in &desired.dirs {
            let exists = observed.dir_exists(&dir.path);

            plan.dirs.push(PlanDirEntry {
                path: dir.path.clone(),
                preserve: exists,
            });

            if !exists {
                plan.actions.push(Action::CreateDir {
                    path: dir.path.clone(),
                    primary: dir.primary,
                });
            }
        }

        for target in &desired.targets {
            Self::reconcile_target(&mut plan, target, observed.status(target.kind), desired.force);
        }

        plan
    }

    fn reconcile_target(
        plan: &mut ActionPlan,
        target: &InstallTarget,
        status: &TargetStatus,
        force: bool,
    ) {
        let skip = |plan: &mut ActionPlan, reason: SkipReason| {
            plan.skipped.push(SkippedTarget {
                kind: target.kind,
                path: target.path.clone(),
                reason,
            });
        };

        if target.kind == TargetKind::Config {
            match status {
                TargetStatus::Missing => plan.actions.push(Action::WriteConfig {
                    path: target.path.clone(),
                }),
                TargetStatus::Valid => skip(plan, SkipReason::AlreadyInstalled),
                TargetStatus::Invalid(reason) => skip(plan, SkipReason::UserData(reason.clone())),
            }
            return;
        }

        if *status == TargetStatus::Valid && !force {
            skip(plan, SkipReason::AlreadyInstalled);
            return;
        }

        let path = target.path.clone();

        match target.kind {
            TargetKind::Binary => plan.actions.push(Action::InstallBinary { path }),
            TargetKind::RuntimeEnvironment => {
                if *status != TargetStatus::Missing {
                    plan.actions.push(Action::RemoveRuntime { path: path.clone() });
                }
                plan.actions.push(Action::CreateRuntime { path });
            }
            TargetKind::Model => {
                let files = target.files();
                let metadata = files.get(1).cloned().unwrap_or_else(|| {
                    let mut name = path.clone().into_os_string();
                    name.push(".json");
                    PathBuf::from(name)
                });
                plan.actions.push(Action::DownloadModel {
                    weights: path,
                    metadata,
                });
            }
            TargetKind::Helper => plan.actions.push(Action::InstallHelper { path }),
            TargetKind::PathEntry => plan.actions.push(Action::LinkPathEntry { path }),
            TargetKind::Shortcut => plan.actions.push(Action::WriteShortcut { path }),
            TargetKind::Config => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::inst::target::{DesiredDir, Presence};

    fn desired(force: bool) -> DesiredState {
        DesiredState {
            dirs: vec![
                DesiredDir {
                    path: "/d".into(),
                    primary: true,
                },
                DesiredDir {
                    path: "/d/bin".into(),
                    primary: false,
                },
            ],
            targets: vec![
                InstallTarget::new(TargetKind::Binary, "/d/bin/grars", Presence::ExecutableFile),
                InstallTarget::new(
                    TargetKind::RuntimeEnvironment,
                    "/d/venv",
                    Presence::Executables(vec!["/d/venv/bin/python".into()]),
                ),
                InstallTarget::new(
                    TargetKind::Model,
                    "/d/models/v.onnx",
                    Presence::Files(vec!["/d/models/v.onnx".into(), "/d/models/v.onnx.json".into()]),
                ),
                InstallTarget::new(TargetKind::Shortcut, "/s/grars.desktop", Presence::NonEmptyFile),
                InstallTarget::new(TargetKind::Config, "/c/config.json", Presence::JsonObject),
            ],
            force,
        }
    }

    fn all_valid() -> FilesystemSnapshot {
        FilesystemSnapshot::new()
            .with_dir("/d")
            .with_dir("/d/bin")
            .with_status(TargetKind::Binary, TargetStatus::Valid)
            .with_status(TargetKind::RuntimeEnvironment, TargetStatus::Valid)
            .with_status(TargetKind::Model, TargetStatus::Valid)
            .with_status(TargetKind::Shortcut, TargetStatus::Valid)
            .with_status(TargetKind::Config, TargetStatus::Valid)
    }

    #[test]
    fn test_fresh_install() {
        let plan = Reconciler::reconcile(&desired(false), &FilesystemSnapshot::new());

        assert_eq!(
            plan.actions,
            [
                Action::CreateDir {
                    path: "/d".into(),
                    primary: true
                },
                Action::CreateDir {
                    path: "/d/bin".into(),
                    primary: false
                },
                Action::InstallBinary {
                    path: "/d/bin/grars".into()
                },
                Action::CreateRuntime {
                    path: "/d/venv".into()
                },
                Action::DownloadModel {
                    weights: "/d/models/v.onnx".into(),
                    metadata: "/d/models/v.onnx.json".into()
                },
                Action::WriteShortcut {
                    path: "/s/grars.desktop".into()
                },
                Action::WriteConfig {
                    path: "/c/config.json".into()
                },
            ]
        );
        assert!(plan.dirs.iter().all(|dir| !dir.preserve));
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_converged_is_empty() {
        let plan = Reconciler::reconcile(&desired(false), &all_valid());

        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 5);
        assert!(plan
            .skipped
            .iter()
            .all(|skipped| skipped.reason == SkipReason::AlreadyInstalled));
        assert!(plan.dirs.iter().all(|dir| dir.preserve));
    }

    #[test]
    fn test_force_rebuilds_except_config() {
        let plan = Reconciler::reconcile(&desired(true), &all_valid());

        assert_eq!(
            plan.actions,
            [
                Action::InstallBinary {
                    path: "/d/bin/grars".into()
                },
                Action::RemoveRuntime {
                    path: "/d/venv".into()
                },
                Action::CreateRuntime {
                    path: "/d/venv".into()
                },
                Action::DownloadModel {
                    weights: "/d/models/v.onnx".into(),
                    metadata: "/d/models/v.onnx.json".into()
                },
                Action::WriteShortcut {
                    path: "/s/grars.desktop".into()
                },
            ]
        );
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].kind, TargetKind::Config);
    }

    #[test]
    fn test_invalid_runtime_removed_first() {
        let snapshot = all_valid().with_status(
            TargetKind::RuntimeEnvironment,
            TargetStatus::Invalid("missing python".into()),
        );

        let plan = Reconciler::reconcile(&desired(false), &snapshot);

        assert_eq!(
            plan.actions,
            [
                Action::RemoveRuntime {
                    path: "/d/venv".into()
                },
                Action::CreateRuntime {
                    path: "/d/venv".into()
                },
            ]
        );
    }

    #[test]
    fn test_invalid_config_untouched() {
        let snapshot = all_valid().with_status(
            TargetKind::Config,
            TargetStatus::Invalid("not a JSON object".into()),
        );

        let plan = Reconciler::reconcile(&desired(true), &snapshot);

        assert!(!plan
            .actions
            .iter()
            .any(|action| matches!(action, Action::WriteConfig { .. })));
        assert_eq!(
            plan.skipped[0].reason,
            SkipReason::UserData("not a JSON object".into())
        );
        assert_eq!(plan.skipped[0].path, Path::new("/c/config.json"));
    }

    #[test]
    fn test_fatal_actions() {
        assert!(Action::InstallBinary { path: "/a".into() }.is_fatal());
        assert!(Action::CreateDir {
            path: "/a".into(),
            primary: true
        }
        .is_fatal());
        assert!(!Action::CreateDir {
            path: "/a".into(),
            primary: false
        }
        .is_fatal());
        assert!(!Action::CreateRuntime { path: "/a".into() }.is_fatal());
        assert!(!Action::DownloadModel {
            weights: "/a".into(),
            metadata: "/b".into()
        }
        .is_fatal());
    }
}
