use std::ffi::{OsStr, OsString};

use windows_registry::Key;

use super::{AccessScope, OsError};

// Notes on environment variables:
// https://winreg-kb.readthedocs.io/en/latest/sources/system-keys/Environment-variables.html
// https://learn.microsoft.com/en-us/windows/win32/procthread/environment-variables
//
// Note on registry API:
// * open() is open read-only
// * create() is open read/write

pub const REGISTRY_ENV_USER_KEY: &str = "Environment";
pub const REGISTRY_ENV_SYSTEM_KEY: &str =
    r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

fn get_registry_predefined_key(access_scope: AccessScope) -> &'static Key {
    match access_scope {
        AccessScope::User => windows_registry::CURRENT_USER,
        AccessScope::System => windows_registry::LOCAL_MACHINE,
    }
}

fn env_key_path(access_scope: AccessScope) -> &'static str {
    match access_scope {
        AccessScope::User => REGISTRY_ENV_USER_KEY,
        AccessScope::System => REGISTRY_ENV_SYSTEM_KEY,
    }
}

pub fn path_env_var_contains(access_scope: AccessScope, exe_dir: &OsStr) -> Result<bool, OsError> {
    let predef_key = get_registry_predefined_key(access_scope);
    let key_path = env_key_path(access_scope);

    tracing::debug!(key_path, "opening path key read-only");
    let hkey = predef_key.open(key_path)?;
    let value = hkey.get_hstring("Path")?.to_os_string();

    Ok(path_env_var_str_contains(&value, exe_dir))
}

pub fn add_path_env_var(access_scope: AccessScope, exe_dir: &OsStr) -> Result<(), OsError> {
    // Remove any existing duplicates of exe_dir
    remove_path_env_var(access_scope, exe_dir)?;

    let predef_key = get_registry_predefined_key(access_scope);
    let key_path = env_key_path(access_scope);

    tracing::debug!(key_path, "opening path key read/write");
    let hkey = predef_key.create(key_path)?;

    let mut value = hkey.get_hstring("Path")?.to_os_string();
    if !value.is_empty() {
        value.push(";");
    }
    value.push(exe_dir);

    tracing::debug!(key_path, ?value, "saving path key");
    hkey.set_expand_hstring("Path", &value.into())?;

    Ok(())
}

pub fn remove_path_env_var(access_scope: AccessScope, exe_dir: &OsStr) -> Result<(), OsError> {
    let predef_key = get_registry_predefined_key(access_scope);
    let key_path = env_key_path(access_scope);

    tracing::debug!(key_path, "opening path key read/write");
    let hkey = predef_key.create(key_path)?;

    let value = hkey.get_hstring("Path")?.to_os_string();
    let value = remove_part_in_path_env_var_str(&value, exe_dir);

    tracing::debug!(key_path, ?value, "saving path key");
    hkey.set_expand_hstring("Path", &value.into())?;

    Ok(())
}

fn path_env_var_str_contains(path_env_var: &OsStr, path_dir: &OsStr) -> bool {
    path_env_var
        .as_encoded_bytes()
        .split(|&value| value == b';')
        .any(|part| part.eq_ignore_ascii_case(path_dir.as_encoded_bytes()))
}

fn remove_part_in_path_env_var_str(path_env_var: &OsStr, path_dir: &OsStr) -> OsString {
    let values = Vec::from_iter(
        path_env_var
            .as_encoded_bytes()
            .split(|&value| value == b';')
            .filter(|&part| {
                !part.is_empty() && !part.eq_ignore_ascii_case(path_dir.as_encoded_bytes())
            }),
    );

    unsafe {
        // SAFETY: OsString is pseudo UTF-8 and ';' is both a 1-byte code unit
        // and code point, so we are splitting and joining at a safe byte.
        OsString::from_encoded_bytes_unchecked(values.join(&b';'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_in_path_env_var() {
        assert_eq!(
            remove_part_in_path_env_var_str(
                OsStr::new(r"C:\things\bin;C:\Rust\bin;C:\Windows Apps"),
                OsStr::new(r"c:\rust\bin")
            ),
            r"C:\things\bin;C:\Windows Apps",
        )
    }

    #[test]
    fn test_path_env_var_contains() {
        let value = OsStr::new(r"C:\things\bin;C:\Users\rust\AppData\Local\grars\bin");

        assert!(path_env_var_str_contains(
            value,
            OsStr::new(r"c:\users\rust\appdata\local\grars\bin")
        ));
        assert!(!path_env_var_str_contains(value, OsStr::new(r"C:\other")));
    }
}
