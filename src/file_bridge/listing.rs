//! Parsing of long-form directory listings produced inside a container.
//!
//! The listing command quotes file names, so names containing spaces stay a
//! single token. The parser is deliberately tolerant: lines it cannot make
//! sense of are skipped with a warning rather than failing the listing.

use serde::{Deserialize, Serialize};

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub permissions: String,
    pub size: u64,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// Command whose output `parse_listing` understands
pub fn listing_command(path: &str) -> Vec<String> {
    vec![
        "ls".to_string(),
        "-la".to_string(),
        "--quoting-style=c".to_string(),
        path.to_string(),
    ]
}

/// Parse the raw output of the listing command into structured entries.
///
/// The first line (`total ...` block summary) is discarded. Each remaining
/// non-blank line is split into quote-aware tokens; permissions, size and
/// name are taken positionally (tokens 0, 4 and 8). Entries named `.` or
/// `..` are filtered out. Order is whatever the listing command produced.
///
/// This function never fails: wholly unparsable output yields an empty
/// vector, and whether that means "empty directory" or "listing failed" is
/// decided by the caller from the exec session's stderr.
pub fn parse_listing(raw: &str) -> Vec<FileEntry> {
    let mut entries = Vec::new();

    for line in raw.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let Some(tokens) = shlex::split(line) else {
            log::warn!("Skipping unparsable listing line: {}", line);
            continue;
        };

        if tokens.len() < 9 {
            log::warn!(
                "Skipping listing line with {} tokens (expected at least 9): {}",
                tokens.len(),
                line
            );
            continue;
        }

        let permissions = tokens[0].clone();
        let name = tokens[8].clone();

        if name.is_empty() || name == "." || name == ".." {
            continue;
        }

        let size = match tokens[4].parse::<u64>() {
            Ok(size) => size,
            Err(_) => {
                log::warn!("Skipping listing line with non-numeric size: {}", line);
                continue;
            }
        };

        let kind = if permissions.starts_with('d') {
            FileKind::Directory
        } else {
            FileKind::File
        };

        entries.push(FileEntry {
            name,
            permissions,
            size,
            kind,
        });
    }

    entries
}
