//! File system helpers (BOM-aware readers for 1C service files)
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the 1C support settings file
pub const SUPPORT_FILE_NAME: &str = "ParentConfigurations.bin";

/// Read a 1C text file, honouring its byte order mark.
///
/// UTF-8 BOM is stripped; UTF-16 LE/BE files are decoded via `encoding_rs`.
/// Files without a BOM are read as UTF-8 with lossy replacement.
pub fn read_text_file(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode_text(&bytes))
}

/// Decode raw bytes of a 1C text file, see [`read_text_file`].
pub fn decode_text(bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => {
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Find every `ParentConfigurations.bin` under `root`, sorted by path.
pub fn discover_support_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str() == Some(SUPPORT_FILE_NAME))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}
