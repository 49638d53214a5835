//! Desktop shortcut file contents.
//!
//! * Linux: a freedesktop `.desktop` entry
//! * macOS: a `.command` shell launcher
//! * Windows: a `.url` internet shortcut pointing to the binary
use std::path::Path;

use crate::path::Platform;

/// Returns the shortcut file contents launching `binary`.
pub fn shortcut_contents(platform: Platform, display_name: &str, binary: &Path) -> String {
    match platform {
        Platform::Linux => desktop_entry(display_name, binary),
        Platform::MacOs => command_launcher(binary),
        Platform::Windows => internet_shortcut(binary),
    }
}

fn desktop_entry(display_name: &str, binary: &Path) -> String {
    let name = display_name.replace(['\n', '\r'], " ");

    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Comment=Read text aloud\n\
         Exec=\"{}\"\n\
         Terminal=false\n\
         Categories=Utility;Accessibility;\n",
        escape_double_quoted(&binary.to_string_lossy())
    )
}

fn command_launcher(binary: &Path) -> String {
    format!(
        "#!/bin/sh\nexec \"{}\" \"$@\"\n",
        escape_double_quoted(&binary.to_string_lossy())
    )
}

fn internet_shortcut(binary: &Path) -> String {
    let path = binary.to_string_lossy().replace('\\', "/");
    let path = path.trim_start_matches('/');

    format!("[InternetShortcut]\r\nURL=file:///{path}\r\n")
}

/// Escapes the characters that are special inside a double quoted string of
/// both desktop entry `Exec` keys and POSIX shells.
fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_entry() {
        let text = shortcut_contents(
            Platform::Linux,
            "Insight Reader",
            Path::new("/home/rust/.local/share/grars/bin/grars"),
        );

        assert!(text.starts_with("[Desktop Entry]\n"));
        assert!(text.contains("Name=Insight Reader\n"));
        assert!(text.contains("Exec=\"/home/rust/.local/share/grars/bin/grars\"\n"));
    }

    #[test]
    fn test_command_launcher_escapes() {
        let text = shortcut_contents(Platform::MacOs, "", Path::new("/Users/a$b/grars"));

        assert_eq!(text, "#!/bin/sh\nexec \"/Users/a\\$b/grars\" \"$@\"\n");
    }

    #[test]
    fn test_internet_shortcut() {
        let text = shortcut_contents(
            Platform::Windows,
            "",
            Path::new(r"C:\Users\rust\AppData\Local\grars\bin\grars.exe"),
        );

        assert_eq!(
            text,
            "[InternetShortcut]\r\nURL=file:///C:/Users/rust/AppData/Local/grars/bin/grars.exe\r\n"
        );
    }
}
