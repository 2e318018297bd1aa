use std::fs::{self, File};
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::MementoError;

/// ZIP local-file-header signature, `PK\x03\x04`.
const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const ZIP_CONTENT_TYPES: [&str; 2] = ["application/zip", "application/x-zip-compressed"];

/// A file is a zip archive when the declared content-type says so OR the
/// first four bytes carry the zip signature. Servers lie about content-types,
/// so the signature is checked whenever the bytes are readable, even when a
/// content-type was declared.
pub fn is_zip(path: &Utf8Path, content_type: Option<&str>) -> bool {
    if let Some(value) = content_type {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if ZIP_CONTENT_TYPES.contains(&essence.as_str()) {
            return true;
        }
    }
    has_zip_signature(path)
}

fn has_zip_signature(path: &Utf8Path) -> bool {
    let Ok(mut file) = File::open(path.as_std_path()) else {
        return false;
    };
    let mut signature = [0u8; 4];
    match file.read_exact(&mut signature) {
        Ok(()) => signature == ZIP_SIGNATURE,
        Err(_) => false,
    }
}

/// Renames the artifact to carry a `.zip` extension; the payload itself is
/// never inspected or unpacked. No-op when the name already ends in `.zip`.
pub fn store_as_zip(path: &Utf8Path) -> Result<Utf8PathBuf, MementoError> {
    if path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
    {
        return Ok(path.to_path_buf());
    }
    let zip_path = path.with_extension("zip");
    fs::rename(path.as_std_path(), zip_path.as_std_path())
        .map_err(|err| MementoError::Filesystem(err.to_string()))?;
    Ok(zip_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        fs::write(path.as_std_path(), bytes).unwrap();
        path
    }

    #[test]
    fn content_type_alone_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "payload", b"not a zip at all");
        assert!(is_zip(&path, Some("application/zip")));
        assert!(is_zip(&path, Some("application/x-zip-compressed; charset=binary")));
    }

    #[test]
    fn signature_overrides_declared_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "payload", b"PK\x03\x04rest-of-archive");
        assert!(is_zip(&path, Some("image/jpeg")));
        assert!(is_zip(&path, None));
    }

    #[test]
    fn plain_file_is_not_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "payload.jpg", b"\xFF\xD8\xFF\xE0jfif");
        assert!(!is_zip(&path, Some("image/jpeg")));
        assert!(!is_zip(&path, None));
    }

    #[test]
    fn rename_to_zip_and_idempotence() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "3_stamp.bin", b"PK\x03\x04");
        let renamed = store_as_zip(&path).unwrap();
        assert_eq!(renamed.extension(), Some("zip"));
        assert!(!path.as_std_path().exists());

        // Re-classifying an already-suffixed file performs no rename.
        let again = store_as_zip(&renamed).unwrap();
        assert_eq!(again, renamed);
        assert!(renamed.as_std_path().exists());
    }
}
