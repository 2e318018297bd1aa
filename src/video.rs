use std::path::PathBuf;
use std::process::Command;

use camino::Utf8Path;

use crate::domain::Coordinates;
use crate::error::MementoError;

/// Container metadata injected into the remuxed output.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub date_iso: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
}

pub trait VideoTagger: Send + Sync {
    /// Whether the host can tag videos at all. `false` is a capability gap,
    /// not an error; the pipeline falls back to a sidecar.
    fn available(&self) -> bool;

    /// Stream-copies every stream of `input` into `output`, injecting
    /// `metadata` at the container level. `output` must not be `input`; the
    /// caller renames it over the original after success.
    fn mux_with_metadata(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        metadata: &VideoMetadata,
    ) -> Result<(), MementoError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    ffmpeg: Option<PathBuf>,
}

impl FfmpegTagger {
    pub fn new() -> Self {
        Self {
            ffmpeg: find_in_path("ffmpeg"),
        }
    }
}

impl Default for FfmpegTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoTagger for FfmpegTagger {
    fn available(&self) -> bool {
        self.ffmpeg.is_some()
    }

    fn mux_with_metadata(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        metadata: &VideoMetadata,
    ) -> Result<(), MementoError> {
        let ffmpeg = self
            .ffmpeg
            .as_ref()
            .ok_or_else(|| MementoError::MissingTool("ffmpeg".to_string()))?;

        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-metadata".to_string(),
            format!("creation_time={}", metadata.date_iso),
            "-metadata".to_string(),
            format!(
                "comment=Location: {} | Date: {}",
                metadata.location, metadata.date_iso
            ),
        ];
        if let Some(coordinates) = metadata.coordinates {
            let iso6709 = coordinates.iso6709();
            // Duplicated under both keys; QuickTime players and generic
            // consumers look in different places.
            args.push("-metadata".to_string());
            args.push(format!("com.apple.quicktime.location.ISO6709={iso6709}"));
            args.push("-metadata".to_string());
            args.push(format!("location={iso6709}"));
        }
        args.push(output.to_string());

        let result = Command::new(ffmpeg)
            .args(&args)
            .output()
            .map_err(|err| MementoError::Tagging(err.to_string()))?;
        if result.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("ffmpeg exited with {}", result.status)
        } else {
            stderr
        };
        Err(MementoError::Tagging(message))
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
