use std::path::PathBuf;

use crate::{
    error::{InstallerError, InstallerErrorKind},
    path::PathResolver,
};

use super::{AppId, DiskManifest};

/// Returns the expected file path of the [`DiskManifest`] on the user's machine.
pub fn manifest_path(resolver: &PathResolver) -> PathBuf {
    resolver.manifest_path()
}

/// Finds the [`DiskManifest`] on the machine and returns it.
///
/// If it is not found, an error kind [`InstallerErrorKind::DiskManifestNotFound`] is returned.
/// A manifest written for another application is rejected with
/// [`InstallerErrorKind::MismatchedDiskManifest`].
pub fn discover_manifest(
    resolver: &PathResolver,
    app_id: &AppId,
) -> Result<DiskManifest, InstallerError> {
    let path = manifest_path(resolver);

    if !path.exists() {
        return Err(InstallerError::new(InstallerErrorKind::DiskManifestNotFound)
            .with_context(path.to_string_lossy()));
    }

    let manifest = DiskManifest::load(&path)?;

    if manifest.app_id.uuid() != app_id.uuid() {
        tracing::error!(?path, found = manifest.app_id.namespaced_id(), "mismatched disk manifest");
        return Err(InstallerErrorKind::MismatchedDiskManifest.into());
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, ffi::OsString};

    use super::*;
    use crate::{os::AccessScope, path::Platform};

    fn resolver(home: &std::path::Path) -> PathResolver {
        let env_map: HashMap<OsString, OsString> =
            HashMap::from_iter([("HOME".into(), home.as_os_str().to_os_string())]);
        PathResolver::with_env_map("grars", Platform::Linux, AccessScope::User, env_map).unwrap()
    }

    #[test]
    fn test_not_found() {
        let home = tempfile::tempdir().unwrap();
        let app_id = AppId::new(crate::manifest::DEFAULT_APP_ID).unwrap();

        let result = discover_manifest(&resolver(home.path()), &app_id);

        assert!(matches!(
            result.unwrap_err().kind(),
            InstallerErrorKind::DiskManifestNotFound
        ));
    }

    #[test]
    fn test_mismatched() {
        let home = tempfile::tempdir().unwrap();
        let resolver = resolver(home.path());
        std::fs::create_dir_all(resolver.data_dir()).unwrap();

        let other = AppId::new("com.example.grars").unwrap();
        DiskManifest::new(
            &other,
            Platform::Linux,
            AccessScope::User,
            resolver.manifest_path(),
        )
        .save()
        .unwrap();

        let app_id = AppId::new(crate::manifest::DEFAULT_APP_ID).unwrap();
        let result = discover_manifest(&resolver, &app_id);

        assert!(matches!(
            result.unwrap_err().kind(),
            InstallerErrorKind::MismatchedDiskManifest
        ));

        let found = discover_manifest(&resolver, &other).unwrap();
        assert_eq!(found.manifest_path, resolver.manifest_path());
    }
}
