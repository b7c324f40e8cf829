//! Note inspection: ids, file metadata, inline tags

use chrono::{DateTime, Utc};
use concierge_vector::{Metadata, MetadataValue};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path};
use std::sync::OnceLock;
use std::time::SystemTime;

/// Bytes inspected when deciding whether a file is text.
pub const TEXT_PROBE_BYTES: usize = 8000;

/// Stable document id: hex SHA-256 of the vault-relative path.
///
/// Components are joined with `/` so ids match across platforms.
pub fn document_id(relative: &Path) -> String {
    let normalized = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// True unless the probed prefix holds control bytes other than common
/// whitespace and form controls. Bytes above ASCII count as text so UTF-8
/// notes qualify.
pub fn looks_like_text(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .take(TEXT_PROBE_BYTES)
        .all(|&b| !(b < 0x20 || b == 0x7f) || matches!(b, b'\n' | b'\r' | b'\t' | 0x0c | 0x08))
}

/// Reads the probe prefix of a file and checks it with [`looks_like_text`].
pub fn probe_text_file(path: &Path) -> io::Result<bool> {
    let mut buf = Vec::with_capacity(TEXT_PROBE_BYTES);
    fs::File::open(path)?
        .take(TEXT_PROBE_BYTES as u64)
        .read_to_end(&mut buf)?;
    Ok(looks_like_text(&buf))
}

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:^|[\s(\[,])#([\w/-]+)").ok())
        .as_ref()
}

/// Inline `#tags` in order of first appearance, without duplicates.
///
/// Headings (`# Title`) and purely numeric tokens such as `#123` are not
/// tags.
pub fn extract_tags(content: &str) -> Vec<String> {
    let Some(pattern) = tag_pattern() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    let mut in_fence = false;

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for captures in pattern.captures_iter(line) {
            let tag = captures[1].trim_end_matches(['/', '-']);
            if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if seen.insert(tag.to_string()) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// File-level metadata recorded for every indexed note.
pub(crate) fn file_metadata(relative: &Path, stat: &fs::Metadata) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "path".to_string(),
        MetadataValue::String(relative.to_string_lossy().replace('\\', "/")),
    );
    if let Some(name) = relative.file_name() {
        metadata.insert(
            "filename".to_string(),
            MetadataValue::String(name.to_string_lossy().into_owned()),
        );
    }
    let extension = relative
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    metadata.insert("extension".to_string(), MetadataValue::String(extension));

    let modified = stat.modified().ok();
    // Not every filesystem records creation time.
    let created = stat.created().ok().or(modified);
    if let Some(created) = created {
        metadata.insert("created_at".to_string(), MetadataValue::String(rfc3339(created)));
    }
    if let Some(modified) = modified {
        metadata.insert("modified_at".to_string(), MetadataValue::String(rfc3339(modified)));
    }
    metadata.insert(
        "size_bytes".to_string(),
        MetadataValue::Int(i64::try_from(stat.len()).unwrap_or(i64::MAX)),
    );
    metadata
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

/// Markdown by extension, case-insensitively.
pub(crate) fn is_markdown(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("md"))
}
