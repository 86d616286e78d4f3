use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;

use thiserror::Error;

/// Entry name prefix that marks the hex payload inside a firmware archive.
pub const FIRMWARE_ENTRY_PREFIX: &str = "firmware";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwarePackage {
    /// Archive entry or file the hex text came from.
    pub name: String,
    pub hex_text: String,
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive has no entry starting with '{FIRMWARE_ENTRY_PREFIX}'")]
    MissingFirmware,

    #[error("'{name}' is not UTF-8 text; did you pass a binary image?")]
    NotText { name: String },
}

/// Loads hex text from a `.zip` firmware package or a bare `.hex` file.
pub fn load_firmware(path: &Path) -> Result<FirmwarePackage, PackageError> {
    let bytes = fs::read(path)?;
    let is_zip = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

    if is_zip {
        return extract_firmware_hex(&bytes);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let hex_text = String::from_utf8(bytes).map_err(|_| PackageError::NotText {
        name: name.clone(),
    })?;
    Ok(FirmwarePackage { name, hex_text })
}

/// Picks the first entry, in archive order, named `firmware*` and decodes it as text.
pub fn extract_firmware_hex(archive: &[u8]) -> Result<FirmwarePackage, PackageError> {
    let mut reader = zip::ZipArchive::new(Cursor::new(archive))?;

    let mut found = None;
    for i in 0..reader.len() {
        let entry = reader.by_index(i)?;
        if entry.name().starts_with(FIRMWARE_ENTRY_PREFIX) {
            found = Some((i, entry.name().to_string()));
            break;
        }
    }
    let (index, name) = found.ok_or(PackageError::MissingFirmware)?;

    let mut entry = reader.by_index(index)?;
    let mut raw = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut raw)?;

    tracing::debug!(entry = %name, bytes = raw.len(), "firmware entry extracted");

    let hex_text = String::from_utf8(raw).map_err(|_| PackageError::NotText {
        name: name.clone(),
    })?;
    Ok(FirmwarePackage { name, hex_text })
}
