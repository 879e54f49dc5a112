use crate::{Document, IngestError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if is_pdf(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Read a PDF from disk into a named [`Document`].
pub fn load_document(path: &Path) -> Result<Document, IngestError> {
    if !is_pdf(path) {
        return Err(IngestError::InvalidArgument(format!(
            "not a pdf file: {}",
            path.display()
        )));
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    Ok(Document::new(name, fs::read(path)?))
}

/// Collect documents from explicit files plus every PDF found under `folders`.
/// Paths are de-duplicated; explicit files keep their given order.
pub fn load_documents(files: &[PathBuf], folders: &[PathBuf]) -> Result<Vec<Document>, IngestError> {
    let mut paths: Vec<PathBuf> = files.to_vec();
    for folder in folders {
        if !folder.is_dir() {
            return Err(IngestError::InvalidArgument(format!(
                "not a directory: {}",
                folder.display()
            )));
        }
        paths.extend(discover_pdf_files(folder));
    }

    let mut seen = std::collections::HashSet::new();
    paths.retain(|path| seen.insert(path.clone()));

    paths.iter().map(|path| load_document(path)).collect()
}
