use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::handle::ProcessHandle;

/// Reads the last `lines` lines of the file at `path`.
///
/// # Returns
/// * `Ok(None)` if the file does not exist, otherwise the trailing lines.
pub fn tail(path: &Path, lines: usize) -> io::Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    Ok(Some(all_lines[start..].to_vec()))
}

/// Reads and displays the last `lines` lines of the server's error log, falling
/// back to the console log when the server logs to standard error.
///
/// # Returns
/// * `Ok(())` if successful, or an error if the log could not be read.
pub fn show_logs(handle: &ProcessHandle, lines: usize) -> io::Result<()> {
    let Some(path) = handle.error_log().or(handle.console_log.as_deref()) else {
        warn!("No error log or console log is configured");
        return Ok(());
    };

    match tail(path, lines)? {
        Some(tail) => {
            for line in tail {
                println!("{}", line);
            }
        }
        None => eprintln!("Error: Log file '{}' not found.", path.display()),
    }

    Ok(())
}
