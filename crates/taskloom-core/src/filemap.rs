use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::FileError;
use crate::types::{File, Part};

/// URI prefix of files registered in a `FileMap`.
pub const FILEMAP_URI_PREFIX: &str = "filemap://";

const PLACEHOLDER_OPEN: &str = "<file>";
const PLACEHOLDER_CLOSE: &str = "</file>";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<file>\s*(.*?)\s*</file>").unwrap())
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, File>,
    /// Names in registration order.
    order: Vec<String>,
    /// Next collision suffix per base name.
    name_counts: HashMap<String, usize>,
}

/// Indirection store that keeps file payloads out of model context.
///
/// A file is registered once and referenced afterwards by a short uri
/// (`filemap://<name>`), embedded in text as `<file>uri</file>`. Names are
/// unique within a map: on collision the incoming file is renamed to
/// `stem(k).ext` with a per-name counter that only ever increases.
#[derive(Debug, Default)]
pub struct FileMap {
    inner: RwLock<Inner>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a file and return its uri. Renames the file on collision.
    pub fn add(&self, mut file: File) -> String {
        let mut inner = self.write();
        let base_name = file.name.clone();

        if inner.files.contains_key(&base_name) {
            let mut count = inner.name_counts.get(&base_name).copied().unwrap_or(1);
            let new_name = loop {
                let candidate = suffixed_name(&base_name, count);
                count += 1;
                if !inner.files.contains_key(&candidate) {
                    break candidate;
                }
            };
            inner.name_counts.insert(base_name.clone(), count);
            warn!(
                name = %base_name,
                renamed = %new_name,
                "File name already exists, renaming"
            );
            file.name = new_name;
        } else {
            inner.name_counts.entry(base_name).or_insert(1);
        }

        let name = file.name.clone();
        debug!(name = %name, "Registered file");
        inner.order.push(name.clone());
        inner.files.insert(name.clone(), file);
        Self::to_uri(&name)
    }

    /// Look up a file by its (possibly rewritten) name.
    pub fn get_by_name(&self, name: &str) -> Result<File, FileError> {
        self.read()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| FileError::NotFound(name.to_string()))
    }

    /// Look up a file by its `filemap://` uri.
    pub fn get_by_uri(&self, uri: &str) -> Result<File, FileError> {
        let name = uri
            .strip_prefix(FILEMAP_URI_PREFIX)
            .ok_or_else(|| FileError::InvalidUri(uri.to_string()))?;
        self.read()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| FileError::NotFound(uri.to_string()))
    }

    /// Remove a file by name. Collision counters are kept so later renames
    /// never reuse a suffix.
    pub fn remove(&self, name: &str) -> Option<File> {
        let mut inner = self.write();
        let removed = inner.files.remove(name);
        if removed.is_some() {
            inner.order.retain(|n| n != name);
        }
        removed
    }

    /// Drop every file and reset collision counters.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.files.clear();
        inner.order.clear();
        inner.name_counts.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All files in registration order.
    pub fn files(&self) -> Vec<File> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.files.get(name).cloned())
            .collect()
    }

    pub fn is_filemap_uri(uri: &str) -> bool {
        uri.starts_with(FILEMAP_URI_PREFIX)
    }

    pub fn to_uri(name: &str) -> String {
        format!("{}{}", FILEMAP_URI_PREFIX, name)
    }

    /// Wrap a uri in a placeholder tag.
    pub fn to_placeholder(uri: &str) -> String {
        format!("{}{}{}", PLACEHOLDER_OPEN, uri, PLACEHOLDER_CLOSE)
    }

    /// Extract the uri from a placeholder tag. The whole input (ignoring
    /// surrounding whitespace) must be exactly one tag.
    pub fn from_placeholder(placeholder: &str) -> Result<String, FileError> {
        let malformed = || FileError::MalformedPlaceholder(placeholder.to_string());
        let uri = placeholder
            .trim()
            .strip_prefix(PLACEHOLDER_OPEN)
            .and_then(|rest| rest.strip_suffix(PLACEHOLDER_CLOSE))
            .ok_or_else(malformed)?;
        if uri.is_empty() || uri.contains(PLACEHOLDER_OPEN) || uri.contains(PLACEHOLDER_CLOSE) {
            return Err(malformed());
        }
        Ok(uri.to_string())
    }

    /// Register a file and return its placeholder tag.
    pub fn wrap(&self, file: File) -> String {
        Self::to_placeholder(&self.add(file))
    }

    /// Resolve a placeholder tag back to its file.
    pub fn unwrap(&self, placeholder: &str) -> Result<File, FileError> {
        let uri = Self::from_placeholder(placeholder)?;
        self.get_by_uri(&uri)
    }

    /// Split text with embedded placeholder tags into text and file parts.
    ///
    /// `"see <file>filemap://a.png</file> here"` becomes
    /// `[Text("see "), FileData(a.png), Text(" here")]`. Whitespace and line
    /// breaks around the uri inside a tag are ignored. An opening tag with no
    /// closing tag is left in the text.
    pub fn split_placeholders(&self, text: &str) -> Result<Vec<Part>, FileError> {
        let mut parts = Vec::new();
        let mut last_end = 0;

        for caps in placeholder_regex().captures_iter(text) {
            let (Some(tag), Some(uri)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if uri.as_str().is_empty() || uri.as_str().contains(PLACEHOLDER_OPEN) {
                return Err(FileError::MalformedPlaceholder(tag.as_str().to_string()));
            }
            if tag.start() > last_end {
                parts.push(Part::Text(text[last_end..tag.start()].to_string()));
            }
            parts.push(Part::FileData(self.get_by_uri(uri.as_str())?));
            last_end = tag.end();
        }

        if last_end < text.len() {
            let rest = &text[last_end..];
            if rest.contains(PLACEHOLDER_OPEN) {
                warn!(text = rest, "Unclosed file placeholder left as text");
            }
            parts.push(Part::Text(rest.to_string()));
        }
        if parts.is_empty() {
            parts.push(Part::Text(String::new()));
        }
        Ok(parts)
    }
}

/// `photo.jpg` + 2 → `photo(2).jpg`; `README` + 1 → `README(1)`.
fn suffixed_name(name: &str, count: usize) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{}({}){}", &name[..idx], count, &name[idx..]),
        _ => format!("{}({})", name, count),
    }
}
