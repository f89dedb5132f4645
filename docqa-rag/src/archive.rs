//! Expansion of uploaded files into the documents that get indexed.

use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{RagError, Result};

/// Directory macOS adds to archives; never indexed.
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// A file received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), data: data.into() }
    }

    fn is_zip(&self) -> bool {
        self.name.contains(".zip")
    }
}

/// Base name of a client-supplied path, or `None` if it has none.
fn base_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
}

/// Turn one uploaded file into the documents it contributes.
///
/// Zip archives are expanded: directory entries and anything below a
/// `__MACOSX` directory are discarded, the remaining entries keep only
/// their base file name. Any other file is returned as-is under its base
/// name.
pub fn expand_upload(file: UploadedFile) -> Result<Vec<UploadedFile>> {
    if !file.is_zip() {
        let name = base_name(&file.name)
            .ok_or_else(|| RagError::Archive(format!("invalid file name '{}'", file.name)))?;
        return Ok(vec![UploadedFile { name, data: file.data }]);
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(file.data))
        .map_err(|e| RagError::Archive(format!("failed to open '{}': {e}", file.name)))?;

    let mut documents = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| RagError::Archive(format!("failed to read '{}': {e}", file.name)))?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            debug!(archive = %file.name, entry = entry.name(), "skipping unsafe archive entry");
            continue;
        };
        if path.components().any(|c| c.as_os_str() == MACOS_METADATA_DIR) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| RagError::Archive(format!("failed to extract '{name}': {e}")))?;
        documents.push(UploadedFile { name, data });
    }

    debug!(archive = %file.name, document_count = documents.len(), "expanded archive");
    Ok(documents)
}
