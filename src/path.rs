//! Describing where files are located.
//!
//! This module contains the platform profile and the methods for
//! translating it into real filesystem paths. Every path is computed from
//! the platform, the access scope, a handful of environment variables and the
//! application's plain ID. Nothing here touches the filesystem.
//!
//! ## Default file locations
//!
//! Application data (binary, runtime environment, models, logs):
//!
//! * `$XDG_DATA_HOME/[app-id]/` or `$HOME/.local/share/[app-id]/`
//! * `$HOME/Library/Application Support/[app-id]/`
//! * `%LocalAppData%/[app-id]/`
//!
//! Configuration:
//!
//! * `$XDG_CONFIG_HOME/[app-id]/` or `$HOME/.config/[app-id]/`
//! * `$HOME/Library/Application Support/[app-id]/`
//! * `%LocalAppData%/[app-id]/`
//!
//! For system-wide installations, `/usr/local/share`, `/etc`,
//! `/Library/Application Support`, `%ProgramFiles%` and `%ProgramData%` are
//! used instead.
//!
use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{InstallerError, InstallerErrorKind},
    os::AccessScope,
};

/// Name of the runtime environment directory.
pub const RUNTIME_DIR_NAME: &str = "venv";
/// Name of the model directory.
pub const MODELS_DIR_NAME: &str = "models";
/// Name of the log directory.
pub const LOGS_DIR_NAME: &str = "logs";
/// Name of the application configuration file.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Name of the disk manifest file.
pub const MANIFEST_FILE_NAME: &str = "install-manifest.ron";

/// Operating system profile.
///
/// Each variant knows the directory conventions and shortcut format of
/// its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Linux and other freedesktop systems.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
}

impl Platform {
    /// Returns the profile for the running OS.
    pub fn current() -> Result<Self, InstallerError> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Returns the profile for a [`std::env::consts::OS`] value.
    pub fn from_os_name(name: &str) -> Result<Self, InstallerError> {
        match name {
            "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Ok(Self::Linux),
            "macos" => Ok(Self::MacOs),
            "windows" => Ok(Self::Windows),
            _ => Err(InstallerError::new(InstallerErrorKind::UnsupportedOsFamily).with_context(name)),
        }
    }

    /// Returns whether the platform is unix-like.
    pub fn is_unix(&self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// Suffix of executable files.
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }

    /// Short name used in release asset names.
    pub fn asset_os_name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    /// Directory name inside a runtime environment that holds its executables.
    pub fn runtime_bin_dir_name(&self) -> &'static str {
        match self {
            Self::Windows => "Scripts",
            _ => "bin",
        }
    }

    /// File extension of desktop shortcuts.
    pub fn shortcut_extension(&self) -> &'static str {
        match self {
            Self::Linux => "desktop",
            Self::MacOs => "command",
            Self::Windows => "url",
        }
    }

    /// File name of the OCR helper script, if the platform uses one.
    pub fn ocr_helper_name(&self) -> Option<&'static str> {
        match self {
            Self::Linux => Some("extract_text_from_image.py"),
            Self::MacOs => Some("extract_text_from_image.swift"),
            Self::Windows => None,
        }
    }
}

/// Resolves the platform profile into real file paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    app_id: String,
    platform: Platform,
    access_scope: AccessScope,
    data_dir: PathBuf,
    config_dir: PathBuf,
    link_dir: Option<PathBuf>,
    shortcut_dir: PathBuf,
    env_map: Option<HashMap<OsString, OsString>>,
}

impl PathResolver {
    /// Create a new path resolver for the running OS.
    ///
    /// In order to match an existing installation, the exact arguments
    /// need to match when provided during installation.
    pub fn new<I: AsRef<str>>(app_id: I, access_scope: AccessScope) -> Result<Self, InstallerError> {
        Self::new_impl(app_id.as_ref(), Platform::current()?, access_scope, None)
    }

    /// Create a path resolver that reads variables from the given map
    /// instead of the process environment.
    pub fn with_env_map<I: AsRef<str>>(
        app_id: I,
        platform: Platform,
        access_scope: AccessScope,
        env_map: HashMap<OsString, OsString>,
    ) -> Result<Self, InstallerError> {
        Self::new_impl(app_id.as_ref(), platform, access_scope, Some(env_map))
    }

    fn new_impl(
        app_id: &str,
        platform: Platform,
        access_scope: AccessScope,
        env_map: Option<HashMap<OsString, OsString>>,
    ) -> Result<Self, InstallerError> {
        let mut self_ = Self {
            app_id: app_id.to_string(),
            platform,
            access_scope,
            data_dir: PathBuf::new(),
            config_dir: PathBuf::new(),
            link_dir: None,
            shortcut_dir: PathBuf::new(),
            env_map,
        };

        match (platform, access_scope) {
            (Platform::Linux, AccessScope::User) => self_.resolve_linux_user()?,
            (Platform::Linux, AccessScope::System) => self_.resolve_linux_system(),
            (Platform::MacOs, AccessScope::User) => self_.resolve_macos_user()?,
            (Platform::MacOs, AccessScope::System) => self_.resolve_macos_system(),
            (Platform::Windows, AccessScope::User) => self_.resolve_windows_user()?,
            (Platform::Windows, AccessScope::System) => self_.resolve_windows_system()?,
        }

        Ok(self_)
    }

    fn resolve_linux_user(&mut self) -> Result<(), InstallerError> {
        let home = PathBuf::from(self.get_env_var("HOME")?);
        let data_home = self
            .get_env_path("XDG_DATA_HOME")
            .unwrap_or_else(|| home.join(".local").join("share"));
        let config_home = self
            .get_env_path("XDG_CONFIG_HOME")
            .unwrap_or_else(|| home.join(".config"));

        self.data_dir = data_home.join(&self.app_id);
        self.config_dir = config_home.join(&self.app_id);
        self.link_dir = Some(home.join(".local").join("bin"));
        self.shortcut_dir = data_home.join("applications");

        Ok(())
    }

    fn resolve_linux_system(&mut self) {
        let prefix = PathBuf::from("/usr/local");

        self.data_dir = prefix.join("share").join(&self.app_id);
        self.config_dir = PathBuf::from("/etc").join(&self.app_id);
        self.link_dir = Some(prefix.join("bin"));
        self.shortcut_dir = prefix.join("share").join("applications");
    }

    fn resolve_macos_user(&mut self) -> Result<(), InstallerError> {
        let home = PathBuf::from(self.get_env_var("HOME")?);
        let support = home.join("Library").join("Application Support");

        self.data_dir = support.join(&self.app_id);
        self.config_dir = support.join(&self.app_id);
        self.link_dir = Some(home.join(".local").join("bin"));
        self.shortcut_dir = home.join("Applications");

        Ok(())
    }

    fn resolve_macos_system(&mut self) {
        let support = PathBuf::from("/Library/Application Support");

        self.data_dir = support.join(&self.app_id);
        self.config_dir = support.join(&self.app_id);
        self.link_dir = Some(PathBuf::from("/usr/local/bin"));
        self.shortcut_dir = PathBuf::from("/Applications");
    }

    fn resolve_windows_user(&mut self) -> Result<(), InstallerError> {
        let local = PathBuf::from(self.get_env_var("LOCALAPPDATA")?);
        let roaming = PathBuf::from(self.get_env_var("APPDATA")?);

        self.data_dir = local.join(&self.app_id);
        self.config_dir = local.join(&self.app_id);
        self.link_dir = None;
        self.shortcut_dir = roaming.join(r"Microsoft\Windows\Start Menu\Programs");

        Ok(())
    }

    fn resolve_windows_system(&mut self) -> Result<(), InstallerError> {
        let program_files = PathBuf::from(self.get_env_var("PROGRAMFILES")?);
        let program_data = PathBuf::from(self.get_env_var("PROGRAMDATA")?);

        self.data_dir = program_files.join(&self.app_id);
        self.config_dir = program_data.join(&self.app_id);
        self.link_dir = None;
        self.shortcut_dir = program_data.join(r"Microsoft\Windows\Start Menu\Programs");

        Ok(())
    }

    /// Returns the application ID used for directory names.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Returns the platform profile.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns the access scope.
    pub fn access_scope(&self) -> AccessScope {
        self.access_scope
    }

    /// Returns the primary installation directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Returns the directory holding the configuration file.
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Returns the directory containing the application binary.
    pub fn bin_dir(&self) -> PathBuf {
        self.data_dir.join("bin")
    }

    /// Returns the runtime environment directory.
    pub fn runtime_dir(&self) -> PathBuf {
        self.data_dir.join(RUNTIME_DIR_NAME)
    }

    /// Returns the directory of the downloaded models.
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join(MODELS_DIR_NAME)
    }

    /// Returns the directory the application writes logs into.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join(LOGS_DIR_NAME)
    }

    /// Returns the path of the application configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Returns the path of the disk manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join(MANIFEST_FILE_NAME)
    }

    /// Returns the file name of the application binary.
    pub fn binary_name(&self) -> String {
        format!("{}{}", self.app_id, self.platform.exe_suffix())
    }

    /// Returns the path of the installed application binary.
    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(self.binary_name())
    }

    /// Returns the path of an executable inside the runtime environment.
    pub fn runtime_executable(&self, name: &str) -> PathBuf {
        self.runtime_dir()
            .join(self.platform.runtime_bin_dir_name())
            .join(format!("{}{}", name, self.platform.exe_suffix()))
    }

    /// Returns the interpreter of the runtime environment.
    pub fn runtime_python(&self) -> PathBuf {
        self.runtime_executable("python")
    }

    /// Returns the weights and metadata file paths of a model.
    pub fn model_files(&self, model_name: &str) -> (PathBuf, PathBuf) {
        let dir = self.models_dir();
        (
            dir.join(format!("{model_name}.onnx")),
            dir.join(format!("{model_name}.onnx.json")),
        )
    }

    /// Returns the path of the OCR helper script, if the platform uses one.
    pub fn ocr_helper_path(&self) -> Option<PathBuf> {
        self.platform
            .ocr_helper_name()
            .map(|name| self.bin_dir().join(name))
    }

    /// Returns the directory holding links to the binary, if the platform uses one.
    ///
    /// On Windows the binary directory is added to the search path instead.
    pub fn link_dir(&self) -> Option<PathBuf> {
        self.link_dir.clone()
    }

    /// Returns the path of the link to the binary, if the platform uses one.
    pub fn link_path(&self) -> Option<PathBuf> {
        self.link_dir
            .as_ref()
            .map(|dir| dir.join(self.binary_name()))
    }

    /// Returns the directory desktop shortcuts are written into.
    pub fn shortcut_dir(&self) -> PathBuf {
        self.shortcut_dir.clone()
    }

    /// Returns the path of the desktop shortcut.
    pub fn shortcut_path(&self) -> PathBuf {
        self.shortcut_dir.join(format!(
            "{}.{}",
            self.app_id,
            self.platform.shortcut_extension()
        ))
    }

    fn get_env_path<K: AsRef<OsStr>>(&self, key: K) -> Option<PathBuf> {
        self.get_env_var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    fn get_env_var<K: AsRef<OsStr>>(&self, key: K) -> Result<OsString, InstallerError> {
        if let Some(map) = &self.env_map {
            map.get(key.as_ref()).cloned().ok_or_else(|| {
                InstallerError::new(InstallerErrorKind::InvalidEnvironmentVariable)
                    .with_context(key.as_ref().to_string_lossy())
            })
        } else {
            crate::os::env_var(key)
        }
    }
}
