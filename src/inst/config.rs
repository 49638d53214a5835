use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    error::InstallerError,
    manifest::{AppId, AppMetadata},
    os::AccessScope,
    path::{PathResolver, Platform},
};

/// GitHub repository publishing the application releases.
pub const DEFAULT_RELEASE_REPO: &str = "insight-reader/grars";
/// Name of the speech model installed by default.
pub const DEFAULT_MODEL_NAME: &str = "en_US-lessac-medium";

const MODEL_BASE_URL: &str =
    "https://huggingface.co/rhasspy/piper-voices/resolve/v1.0.0/en/en_US/lessac/medium";
const MODEL_MIRROR_BASE_URL: &str =
    "https://huggingface.co/rhasspy/piper-voices/resolve/main/en/en_US/lessac/medium";

/// Options chosen by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct InstallFlags {
    /// Rebuild every target except the configuration file.
    pub force: bool,
    /// Do not create the runtime environment.
    pub skip_runtime: bool,
    /// Do not install the speech engine packages or model.
    pub skip_engine: bool,
    /// Do not write desktop shortcuts.
    pub skip_shortcuts: bool,
    /// Answer every question with yes.
    pub assume_yes: bool,
}

/// Contents of the application configuration file written on first install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log verbosity of the application.
    pub log_level: String,
    /// Speech provider.
    pub provider: String,
    /// Name of the speech model below the models directory.
    pub voice_model: String,
}

impl AppConfig {
    /// Default configuration referencing the given model.
    pub fn with_model(model_name: &str) -> Self {
        Self {
            log_level: "info".to_string(),
            provider: "piper".to_string(),
            voice_model: model_name.to_string(),
        }
    }
}

/// Parameters that control how the application is installed.
///
/// Computed once from the platform, the environment and the command line,
/// then shared by the reconciler, executor and uninstaller.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct InstallConfig {
    /// Application ID.
    pub app_id: AppId,
    /// Information shown to the user.
    pub metadata: AppMetadata,
    /// Installation paths.
    pub resolver: PathResolver,
    /// Options chosen by the user.
    pub flags: InstallFlags,
    /// Source checkout whose build artifacts and helper scripts are
    /// preferred over downloads.
    pub project_root: Option<PathBuf>,
    /// GitHub repository (`owner/name`) publishing the releases.
    pub release_repo: String,
    /// Name of the speech model.
    pub model_name: String,
    /// Base URLs of the model files, tried in order.
    pub model_base_urls: Vec<String>,
    /// Whether to modify the search path (PATH).
    ///
    /// On Windows, this adds the binary directory to the user or system
    /// `Path` registry value.
    ///
    /// On Unix, the binary is always linked into the link directory. When
    /// that directory is not on the current PATH, a snippet is appended to
    /// the user's shell profile. The SHELL variable and the existence of
    /// `.bash_profile`, `.zprofile` or `.profile` select the file.
    pub modify_os_search_path: bool,
}

impl InstallConfig {
    /// Creates a config with default sources for the given paths.
    pub fn new(app_id: &AppId, resolver: PathResolver) -> Self {
        Self {
            app_id: app_id.clone(),
            metadata: AppMetadata {
                display_name: "Insight Reader".to_string(),
                display_version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            resolver,
            flags: InstallFlags::default(),
            project_root: None,
            release_repo: DEFAULT_RELEASE_REPO.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_base_urls: vec![
                MODEL_BASE_URL.to_string(),
                MODEL_MIRROR_BASE_URL.to_string(),
            ],
            modify_os_search_path: true,
        }
    }

    /// Creates a config for the running OS and process environment.
    pub fn for_current_os(
        app_id: &AppId,
        access_scope: AccessScope,
    ) -> Result<Self, InstallerError> {
        let resolver = PathResolver::new(app_id.plain_id(), access_scope)?;
        Ok(Self::new(app_id, resolver))
    }

    /// Returns the platform profile.
    pub fn platform(&self) -> Platform {
        self.resolver.platform()
    }

    /// Returns the access scope.
    pub fn access_scope(&self) -> AccessScope {
        self.resolver.access_scope()
    }

    /// Returns whether the runtime environment is wanted.
    ///
    /// An environment without packages to install is not wanted.
    pub fn wants_runtime(&self) -> bool {
        !self.flags.skip_runtime && !self.runtime_packages().is_empty()
    }

    /// Returns whether the speech model is wanted.
    pub fn wants_model(&self) -> bool {
        !self.flags.skip_engine
    }

    /// Returns whether the OCR helper script is wanted.
    ///
    /// On Linux the helper runs inside the runtime environment.
    pub fn wants_helper(&self) -> bool {
        match self.platform() {
            Platform::Linux => self.wants_runtime(),
            Platform::MacOs => true,
            Platform::Windows => false,
        }
    }

    /// Returns whether a search path entry is wanted.
    pub fn wants_path_entry(&self) -> bool {
        self.platform().is_unix() || self.modify_os_search_path
    }

    /// Returns whether a desktop shortcut is wanted.
    pub fn wants_shortcut(&self) -> bool {
        !self.flags.skip_shortcuts
    }

    /// Packages installed into the runtime environment.
    pub fn runtime_packages(&self) -> Vec<&'static str> {
        let mut packages = Vec::new();

        if !self.flags.skip_engine {
            packages.push("piper-tts");
        }
        if self.platform() == Platform::Linux {
            packages.push("easyocr");
        }

        packages
    }

    /// Executables that must exist in a valid runtime environment.
    pub fn runtime_executables(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.resolver.runtime_python()];

        if !self.flags.skip_engine {
            paths.push(self.resolver.runtime_executable("piper"));
        }

        paths
    }

    /// Returns the locally built binary, if a project root is set.
    pub fn local_binary_path(&self) -> Option<PathBuf> {
        self.project_root.as_ref().map(|root| {
            root.join("target")
                .join("release")
                .join(self.resolver.binary_name())
        })
    }

    /// Name of the release asset for this platform and CPU architecture.
    pub fn release_asset_name(&self) -> String {
        let platform = self.platform();
        format!(
            "{}-{}-{}{}",
            self.resolver.app_id(),
            platform.asset_os_name(),
            std::env::consts::ARCH,
            platform.exe_suffix()
        )
    }

    /// URL of the release asset for a release tag.
    pub fn release_asset_url(&self, tag: &str) -> String {
        format!(
            "https://github.com/{}/releases/download/{}/{}",
            self.release_repo,
            tag,
            self.release_asset_name()
        )
    }

    /// Returns the helper script in the project checkout, if a project root is set.
    pub fn local_helper_path(&self) -> Option<PathBuf> {
        let name = self.platform().ocr_helper_name()?;
        self.project_root
            .as_ref()
            .map(|root| root.join("install").join(name))
    }

    /// URL of the helper script in the release repository.
    pub fn helper_url(&self) -> Option<String> {
        let name = self.platform().ocr_helper_name()?;
        Some(format!(
            "https://raw.githubusercontent.com/{}/HEAD/install/{}",
            self.release_repo, name
        ))
    }

    /// URLs of a model file, in the order they are tried.
    pub fn model_urls(&self, file_name: &str) -> Vec<String> {
        self.model_base_urls
            .iter()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), file_name))
            .collect()
    }

    /// The configuration file written on first install.
    pub fn default_app_config(&self) -> AppConfig {
        AppConfig::with_model(&self.model_name)
    }
}
