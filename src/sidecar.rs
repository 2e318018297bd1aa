use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::CatalogRecord;
use crate::error::MementoError;
use crate::fetch::DownloadedAsset;

/// Fallback metadata record written beside an artifact whenever in-place
/// tagging is impossible or failed. `tag_error` is present only in the
/// failure case; a plain capability gap omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub kind: String,
    pub date: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_error: Option<String>,
}

impl Sidecar {
    pub fn for_item(record: &CatalogRecord, asset: &DownloadedAsset) -> Self {
        Self {
            kind: record.kind_label.clone(),
            date: record.moment.iso8601(),
            location: record.location.clone(),
            lat: record.coordinates.map(|c| c.lat),
            lon: record.coordinates.map(|c| c.lon),
            content_type: asset.content_type.clone(),
            tag_error: None,
        }
    }

    pub fn with_error(mut self, message: String) -> Self {
        self.tag_error = Some(message);
        self
    }
}

pub fn sidecar_path(artifact: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{artifact}.json"))
}

/// Writes the sidecar beside the artifact. Never touches the artifact itself.
pub fn write_sidecar(artifact: &Utf8Path, sidecar: &Sidecar) -> Result<Utf8PathBuf, MementoError> {
    let path = sidecar_path(artifact);
    let content = serde_json::to_vec_pretty(sidecar)
        .map_err(|err| MementoError::Filesystem(err.to_string()))?;
    fs::write(path.as_std_path(), content)
        .map_err(|err| MementoError::Filesystem(err.to_string()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_path_appends_json() {
        assert_eq!(
            sidecar_path(Utf8Path::new("/out/3_stamp.heic")),
            Utf8PathBuf::from("/out/3_stamp.heic.json")
        );
    }

    #[test]
    fn tag_error_omitted_unless_set() {
        let sidecar = Sidecar {
            kind: "Image".to_string(),
            date: "2025-11-12T21:05:03Z".to_string(),
            location: "Paris".to_string(),
            lat: None,
            lon: None,
            content_type: None,
            tag_error: None,
        };
        let json = serde_json::to_string(&sidecar).unwrap();
        assert!(!json.contains("tag_error"));
        assert!(json.contains("\"lat\":null"));

        let json = serde_json::to_string(&sidecar.with_error("boom".to_string())).unwrap();
        assert!(json.contains("\"tag_error\":\"boom\""));
    }
}
