/// Storage key and display name resolution
///
/// Keys are content-addressed: `folder/<digest>.<ext>`, where the folder comes
/// from a template with date and note-name substitution.
use crate::{front_matter::DocumentOverrides, hasher::ContentDigest};
use chrono::{Datelike, NaiveDate};
use std::path::Path;

/// Separator that replaces spaces in `${basename}`
const BASENAME_SEPARATOR: &str = "-";

/// Resolved key for one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Full storage key (remote object key or vault-relative path)
    pub key: String,
    /// `<digest>.<ext>`, or the bare digest when there is no extension
    pub display_name: String,
}

/// Lowercased extension of a file name, if it has one
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Expand `${year}`, `${month}`, `${day}` and `${basename}` in a folder template
///
/// Unknown `${...}` tokens are kept verbatim.
pub fn expand_template(template: &str, date: NaiveDate, note_basename: &str) -> String {
    template
        .replace("${year}", &format!("{:04}", date.year()))
        .replace("${month}", &format!("{:02}", date.month()))
        .replace("${day}", &format!("{:02}", date.day()))
        .replace("${basename}", &note_basename.replace(' ', BASENAME_SEPARATOR))
}

/// Resolve the storage key and display name for a digest
///
/// A folder override from the document front matter replaces the template.
pub fn resolve(
    digest: &ContentDigest,
    extension: Option<&str>,
    folder_template: &str,
    overrides: &DocumentOverrides,
    date: NaiveDate,
    note_basename: &str,
) -> ResolvedName {
    let display_name = match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", digest, ext),
        _ => digest.to_string(),
    };

    let template = overrides
        .upload_folder
        .as_deref()
        .unwrap_or(folder_template);
    let folder = expand_template(template, date, note_basename);
    let folder = folder.trim().trim_matches('/');

    let key = if folder.is_empty() {
        display_name.clone()
    } else {
        format!("{}/{}", folder, display_name)
    };

    ResolvedName { key, display_name }
}
