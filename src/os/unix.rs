// Notes for app menus:
// https://specifications.freedesktop.org/desktop-entry-spec/latest/index.html
//
// Notes on filesystem directories:
// https://specifications.freedesktop.org/basedir-spec/latest/index.html
// https://en.wikipedia.org/wiki/Filesystem_Hierarchy_Standard

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::{fs::File, path::Path, sync::LazyLock};

use super::OsError;

pub fn get_umask() -> u32 {
    static UMASK: LazyLock<u32> = LazyLock::new(|| {
        let value = unsafe {
            // SAFETY: we're only getting and setting integers.
            let current = libc::umask(0o022);
            libc::umask(current);
            current
        };
        // Cast used because it might be u16 on macOS.
        value as u32
    });

    *UMASK
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

pub fn get_effective_posix_permission(executable: bool) -> u32 {
    let full = if executable { 0o777 } else { 0o666 };
    full & !get_umask()
}

pub fn set_posix_permission(target: &Path, mode: u32) -> std::io::Result<()> {
    let mut perm = target.metadata()?.permissions();
    perm.set_mode(mode);
    std::fs::set_permissions(target, perm)?;
    Ok(())
}

const PROFILE_SHELL_TEMPLATE_SNIPPET: &str = r#"
## <grars-setup> Automatically inserted snippet
if [ -d "{path}" ] ; then
    PATH="{path}:$PATH"
fi
## </grars-setup>
"#;

fn profile_snippet(exe_dir: &Path) -> Result<String, OsError> {
    let home = get_home()?;

    let exe_dir_shell_path = path_to_shell_script_path(exe_dir, &home);
    verify_safe_for_shell_script(&exe_dir_shell_path)?;

    Ok(PROFILE_SHELL_TEMPLATE_SNIPPET.replace("{path}", &exe_dir_shell_path))
}

/// Returns whether the profile already puts the directory on the search path.
pub fn profile_contains_path(exe_dir: &Path, profile_path: &Path) -> Result<bool, OsError> {
    if !profile_path.exists() {
        return Ok(false);
    }

    let home = get_home()?;
    let exe_dir_shell_path = path_to_shell_script_path(exe_dir, &home);

    tracing::debug!(?profile_path, "reading profile");
    let contents = std::fs::read_to_string(profile_path)?;

    Ok(contents.contains(&exe_dir_shell_path))
}

pub fn add_path_env_var(exe_dir: &Path, profile_path: &Path) -> Result<(), OsError> {
    if profile_contains_path(exe_dir, profile_path)? {
        return Ok(());
    }

    let snippet = profile_snippet(exe_dir)?;

    tracing::debug!(snippet, "saving profile");
    let mut file = File::options()
        .create(true)
        .append(true)
        .open(profile_path)?;
    file.write_all(snippet.as_bytes())?;
    file.flush()?;

    Ok(())
}

/// Removes the snippet written by [`add_path_env_var`].
///
/// Returns whether the profile was modified. Lines the user wrote
/// themselves are never touched.
pub fn remove_path_env_var(exe_dir: &Path, profile_path: &Path) -> Result<bool, OsError> {
    if !profile_path.exists() {
        return Ok(false);
    }

    let snippet = profile_snippet(exe_dir)?;

    tracing::debug!(?profile_path, "reading profile");
    let contents = std::fs::read_to_string(profile_path)?;

    if !contents.contains(&snippet) {
        return Ok(false);
    }

    let new_contents = contents.replace(&snippet, "");

    tracing::debug!(?profile_path, "saving profile");
    std::fs::write(profile_path, new_contents)?;

    Ok(true)
}

/// Creates or replaces a symbolic link at `link` pointing to `target`.
///
/// An existing regular file at `link` is never replaced.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<(), OsError> {
    match link.symlink_metadata() {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            tracing::debug!(?link, "removing old link");
            std::fs::remove_file(link)?;
        }
        Ok(_) => return Err(OsError::Other("link path is occupied by a regular file")),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => return Err(error.into()),
    }

    tracing::debug!(?target, ?link, "creating link");
    std::os::unix::fs::symlink(target, link)?;

    Ok(())
}

/// Returns whether `link` is a symbolic link pointing to `target`.
pub fn symlink_points_to(link: &Path, target: &Path) -> bool {
    match std::fs::read_link(link) {
        Ok(value) => value == target,
        Err(_) => false,
    }
}

pub fn get_home() -> Result<PathBuf, OsError> {
    let home = std::env::var_os("HOME").ok_or(OsError::Other("missing HOME"))?;
    Ok(PathBuf::from(home))
}

pub fn get_current_shell_profile() -> Result<PathBuf, OsError> {
    let home = get_home()?;
    let zsh_profile = home.join(".zprofile");
    let bash_profile = home.join(".bash_profile");
    let default_profile = home.join(".profile");

    let shell_path = std::env::var("SHELL").unwrap_or_default();
    let shell_path = PathBuf::from(shell_path);

    if let Some(shell_name) = shell_path.file_name() {
        let shell_name = shell_name.to_str().unwrap_or_default();

        match shell_name {
            "zsh" if zsh_profile.exists() => return Ok(zsh_profile),
            "bash" if bash_profile.exists() => return Ok(bash_profile),
            _ => {}
        }

        if default_profile.exists() {
            return Ok(default_profile);
        }

        match shell_name {
            "zsh" => return Ok(zsh_profile),
            "bash" => return Ok(bash_profile),
            _ => {}
        }
    }

    Ok(default_profile)
}

fn verify_safe_for_shell_script(path_str: &str) -> Result<(), OsError> {
    if path_str.chars().any(|c| c.is_control() || c == '"') {
        return Err(OsError::Other("invalid path character"));
    }

    Ok(())
}

fn path_to_shell_script_path(path: &Path, home: &Path) -> String {
    if let Ok(path) = path.strip_prefix(home) {
        let path = path.to_string_lossy();
        format!("$HOME/{path}")
    } else {
        path.to_string_lossy().to_string()
    }
}
