use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::MementoError;

/// On-disk shape of `params.json`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Params {
    pub memories_history_path: PathBuf,
    pub output_directory: PathBuf,
    #[serde(default)]
    pub starting_index: usize,
}

#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub catalog_path: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub starting_index: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `params.json` (or an explicit path). The default file missing is
    /// a dedicated error so the CLI can point at it.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedParams, MementoError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("params.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(MementoError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MementoError::ConfigRead(config_path.clone()))?;
        let params: Params = serde_json::from_str(&content)
            .map_err(|err| MementoError::ConfigParse(err.to_string()))?;

        Self::resolve_params(params)
    }

    pub fn resolve_params(params: Params) -> Result<ResolvedParams, MementoError> {
        let catalog_path = Utf8PathBuf::from_path_buf(params.memories_history_path)
            .map_err(|path| {
                MementoError::Filesystem(format!("non-utf8 catalog path: {}", path.display()))
            })?;
        let output_dir = Utf8PathBuf::from_path_buf(params.output_directory).map_err(|path| {
            MementoError::Filesystem(format!("non-utf8 output path: {}", path.display()))
        })?;

        Ok(ResolvedParams {
            catalog_path,
            output_dir,
            starting_index: params.starting_index,
        })
    }
}
