//! Common utilities

use std::path::Path;

/// Check if a command is available, either as an explicit path or in PATH
pub fn command_exists(cmd: &str) -> bool {
    if cmd.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(cmd).is_file();
    }

    std::process::Command::new("which")
        .arg(cmd)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Read a child pipe to the end as lossy UTF-8
pub fn read_lossy(mut reader: impl std::io::Read) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
