// Plain text list loading for wordlist mode

use crate::error::{CoreError, Result};
use std::fs;
use std::path::Path;

/// Loads a wordlist: one entry per line, whitespace-trimmed, blank lines
/// skipped. Entries are kept verbatim otherwise, since payloads such as `#`
/// are legitimate values.
pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        CoreError::Wordlist(format!("Failed to read wordlist {}: {}", path.display(), e))
    })?;

    let words: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if words.is_empty() {
        return Err(CoreError::Wordlist(format!(
            "Wordlist {} is empty",
            path.display()
        )));
    }

    Ok(words)
}
