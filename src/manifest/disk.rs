use std::{
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
};

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AddContext, InstallerError, InstallerErrorKind},
    os::{AccessScope, FileChecksum},
    path::Platform,
};

use super::AppId;

/// Category of an installable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// The application binary.
    Binary,
    /// Isolated interpreter environment with the speech engine packages.
    RuntimeEnvironment,
    /// Speech model weights and their metadata.
    Model,
    /// Helper script used for text recognition.
    Helper,
    /// Desktop shortcut or menu entry.
    Shortcut,
    /// Search path (PATH) entry or link to the binary.
    PathEntry,
    /// Application configuration file.
    Config,
}

impl TargetKind {
    /// Returns a short lowercase label for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::RuntimeEnvironment => "runtime environment",
            Self::Model => "model",
            Self::Helper => "helper",
            Self::Shortcut => "shortcut",
            Self::PathEntry => "path entry",
            Self::Config => "config",
        }
    }
}

/// Information about an installed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiskFileEntry {
    /// Full location of the file.
    pub path: PathBuf,
    /// Size of file in bytes.
    pub len: u64,
    /// A CRC32C checksum of the file.
    pub crc32c: u32,
    /// Kind of target the file belongs to.
    pub kind: TargetKind,
}

impl DiskFileEntry {
    /// Creates an entry from a computed checksum.
    pub fn new(path: PathBuf, checksum: &FileChecksum, kind: TargetKind) -> Self {
        Self {
            path,
            len: checksum.len,
            crc32c: checksum.crc32c,
            kind,
        }
    }

    /// Returns whether the checksum matches this entry.
    pub fn matches(&self, checksum: &FileChecksum) -> bool {
        self.len == checksum.len && self.crc32c == checksum.crc32c
    }
}

/// Information about a directory the installer needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiskDirEntry {
    /// Full path of the directory.
    pub path: PathBuf,
    /// Whether the directory existed before and must be kept when uninstalling.
    pub preserve: bool,
}

/// Details about an installed application and what the installer changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiskManifest {
    #[serde(skip)]
    /// Path of manifest installed on disk.
    pub manifest_path: PathBuf,
    /// Reserved.
    pub manifest_version: u64,
    /// Application ID.
    pub app_id: AppId,
    /// Application name displayed to the user.
    pub app_name: String,
    /// Application version displayed to the user.
    pub app_version: String,
    /// Platform profile used for the paths.
    pub platform: Platform,
    /// Access scope.
    pub access_scope: AccessScope,
    /// Directory entries, parents before children.
    pub dirs: Vec<DiskDirEntry>,
    /// File entries.
    pub files: Vec<DiskFileEntry>,
    /// Runtime environment directory, if one was created.
    pub runtime_dir: Option<PathBuf>,
    /// Link to the binary, if one was created.
    pub link_path: Option<PathBuf>,
    /// If specified, the search path (PATH) entry installed.
    pub search_path: Option<PathBuf>,
    /// The path of the modified shell profile.
    pub shell_profile_path: Option<PathBuf>,
}

impl DiskManifest {
    /// Creates an empty manifest.
    pub fn new(
        app_id: &AppId,
        platform: Platform,
        access_scope: AccessScope,
        manifest_path: PathBuf,
    ) -> Self {
        Self {
            manifest_path,
            manifest_version: 0,
            app_id: app_id.clone(),
            app_name: String::new(),
            app_version: String::new(),
            platform,
            access_scope,
            dirs: Vec::new(),
            files: Vec::new(),
            runtime_dir: None,
            link_path: None,
            search_path: None,
            shell_profile_path: None,
        }
    }

    /// Deserialize from the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InstallerError> {
        let path = path.as_ref();
        let buf =
            std::fs::read(path).with_contextc(|_error| format!("could not open file {path:?}"))?;
        let mut manifest = Self::from_reader(Cursor::new(buf))?;

        manifest.manifest_path = path.to_path_buf();

        Ok(manifest)
    }

    /// Deserialize from the given reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, InstallerError> {
        let manifest = ron::de::from_reader::<R, Self>(reader).map_err(|error| {
            InstallerError::new(InstallerErrorKind::MalformedDiskManifest).with_source(error)
        })?;

        Ok(manifest)
    }

    /// Serialize to [`Self::manifest_path`], replacing any previous file.
    ///
    /// The file is written to a temporary file first so a reader never
    /// observes a half written manifest.
    pub fn save(&self) -> Result<(), InstallerError> {
        let dir = self
            .manifest_path
            .parent()
            .ok_or_else(|| InstallerError::new(InstallerErrorKind::InvalidInput))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
        self.to_writer(&mut temp_file)?;
        temp_file.flush()?;
        temp_file
            .persist(&self.manifest_path)
            .map_err(|error| InstallerError::from(error.error))?;

        Ok(())
    }

    /// Serialize to the given writer.
    pub fn to_writer<W: Write>(&self, output: W) -> Result<(), InstallerError> {
        let options = ron::Options::default();
        options
            .to_io_writer_pretty(output, &self, PrettyConfig::default())
            .map_err(|error| InstallerError::new(InstallerErrorKind::Other).with_source(error))?;

        Ok(())
    }

    /// Records a directory.
    ///
    /// The first record of a directory wins: a directory created by an
    /// earlier, interrupted run stays owned by the installer.
    pub fn record_dir(&mut self, path: &Path, preserve: bool) {
        if self.dir_entry(path).is_none() {
            self.dirs.push(DiskDirEntry {
                path: path.to_path_buf(),
                preserve,
            });
        }
    }

    /// Returns the record of a directory.
    pub fn dir_entry(&self, path: &Path) -> Option<&DiskDirEntry> {
        self.dirs.iter().find(|entry| entry.path == path)
    }

    /// Records a file, replacing any previous record of the same path.
    pub fn record_file(&mut self, entry: DiskFileEntry) {
        self.forget_file(&entry.path);
        self.files.push(entry);
    }

    /// Removes the record of a file.
    pub fn forget_file(&mut self, path: &Path) {
        self.files.retain(|entry| entry.path != path);
    }

    /// Removes the records of all files below a directory.
    pub fn forget_files_under(&mut self, dir: &Path) {
        self.files.retain(|entry| !entry.path.starts_with(dir));
    }

    /// Returns the record of a file.
    pub fn file_entry(&self, path: &Path) -> Option<&DiskFileEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// Returns the sum of `len` of the file entries.
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|entry| entry.len).sum()
    }
}
