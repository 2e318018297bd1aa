use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::catalog::{self, CatalogRow};
use crate::classify;
use crate::domain::{CatalogRecord, MediaKind};
use crate::error::MementoError;
use crate::exif;
use crate::fetch::{AssetFetcher, DownloadedAsset};
use crate::ledger::{FailureLedger, LEDGER_FILE_NAME};
use crate::png_text;
use crate::sidecar::{self, Sidecar};
use crate::video::{VideoMetadata, VideoTagger};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Items with a smaller catalog index are skipped entirely; lets a
    /// partially completed batch restart without re-downloading.
    pub starting_index: usize,
}

/// Terminal state of one catalog item. There are no retries across stages;
/// whatever state an item reaches, the loop moves on to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Below the starting index, or the row itself was malformed.
    Skipped,
    /// Fetch failed with an HTTP/transport error; recorded in the ledger.
    FetchFailed,
    Zipped,
    VideoTagged,
    ExifTagged,
    PngTagged,
    /// No tagger for this artifact; sidecar written, no error involved.
    SidecarUnsupported,
    /// A tagger blew up; sidecar written with the error message.
    SidecarError,
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    pub index: usize,
    pub outcome: ItemOutcome,
    pub artifact: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn count(&self, outcome: ItemOutcome) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome == outcome)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sequential download/classify/tag pipeline. One item is fully resolved
/// before the next begins; per-item failures are contained, and only
/// environment-level faults (TLS-retry exhaustion, broken output directory)
/// abort the run.
pub struct Pipeline<F: AssetFetcher, V: VideoTagger, L: FailureLedger> {
    out_dir: Utf8PathBuf,
    fetcher: F,
    video: V,
    ledger: L,
}

impl<F: AssetFetcher, V: VideoTagger, L: FailureLedger> Pipeline<F, V, L> {
    pub fn new(out_dir: Utf8PathBuf, fetcher: F, video: V, ledger: L) -> Self {
        Self {
            out_dir,
            fetcher,
            video,
            ledger,
        }
    }

    pub fn run(
        &self,
        rows: &[CatalogRow],
        options: RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, MementoError> {
        let total = rows.len();
        let mut summary = RunSummary::default();

        for row in rows {
            if row.index < options.starting_index {
                summary.items.push(ItemReport {
                    index: row.index,
                    outcome: ItemOutcome::Skipped,
                    artifact: None,
                });
                continue;
            }

            let record = match catalog::normalize_row(row) {
                Ok(record) => record,
                Err(err) => {
                    tracing::debug!(index = row.index, "skipping row: {err}");
                    summary.items.push(ItemReport {
                        index: row.index,
                        outcome: ItemOutcome::Skipped,
                        artifact: None,
                    });
                    continue;
                }
            };

            emit(
                sink,
                format!(
                    "[{}/{}] downloading {} {}",
                    record.index,
                    total,
                    record.kind_label,
                    record.moment.raw()
                ),
            );

            let stem = self.out_dir.join(record.output_stem());
            let asset = match self.fetcher.fetch(&record.url, &stem, record.kind) {
                Ok(asset) => asset,
                Err(err) if err.is_per_item() => {
                    self.ledger.record(&record.ledger_line())?;
                    emit(
                        sink,
                        format!("   fetch failed ({err}); recorded in {LEDGER_FILE_NAME}"),
                    );
                    summary.items.push(ItemReport {
                        index: record.index,
                        outcome: ItemOutcome::FetchFailed,
                        artifact: None,
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let report = self.resolve_artifact(&record, &asset, sink)?;
            summary.items.push(report);
        }

        Ok(summary)
    }

    /// Tags the downloaded artifact, downgrading every tagging failure to a
    /// sidecar with the error embedded. The artifact itself survives all of
    /// these paths untouched; only a successful tagger output replaces it.
    fn resolve_artifact(
        &self,
        record: &CatalogRecord,
        asset: &DownloadedAsset,
        sink: &dyn ProgressSink,
    ) -> Result<ItemReport, MementoError> {
        match self.tag_artifact(record, asset, sink) {
            Ok((outcome, artifact)) => Ok(ItemReport {
                index: record.index,
                outcome,
                artifact: Some(artifact),
            }),
            Err(err) => {
                let fallback = Sidecar::for_item(record, asset).with_error(err.to_string());
                let path = sidecar::write_sidecar(&asset.path, &fallback)?;
                tracing::warn!(index = record.index, "tagging failed: {err}");
                emit(
                    sink,
                    format!(
                        "   tagging failed; wrote sidecar -> {}",
                        path.file_name().unwrap_or_default()
                    ),
                );
                Ok(ItemReport {
                    index: record.index,
                    outcome: ItemOutcome::SidecarError,
                    artifact: Some(asset.path.clone()),
                })
            }
        }
    }

    fn tag_artifact(
        &self,
        record: &CatalogRecord,
        asset: &DownloadedAsset,
        sink: &dyn ProgressSink,
    ) -> Result<(ItemOutcome, Utf8PathBuf), MementoError> {
        // Zip wins over everything: a mislabeled kind must not push an
        // archive payload through a media tagger.
        if classify::is_zip(&asset.path, asset.content_type.as_deref()) {
            let path = classify::store_as_zip(&asset.path)?;
            emit(
                sink,
                format!("   saved zip -> {}", path.file_name().unwrap_or_default()),
            );
            return Ok((ItemOutcome::Zipped, path));
        }

        match record.kind {
            MediaKind::Video if self.video.available() => self.tag_video(record, asset, sink),
            MediaKind::Image => self.tag_image(record, asset, sink),
            _ => {
                // Video without a muxing tool, or a kind nothing can tag.
                self.write_unsupported_sidecar(record, asset, sink)
            }
        }
    }

    fn tag_video(
        &self,
        record: &CatalogRecord,
        asset: &DownloadedAsset,
        sink: &dyn ProgressSink,
    ) -> Result<(ItemOutcome, Utf8PathBuf), MementoError> {
        let tagged = tagged_sibling(&asset.path);
        let metadata = VideoMetadata {
            date_iso: record.moment.iso8601(),
            location: record.location.clone(),
            coordinates: record.coordinates,
        };
        if let Err(err) = self.video.mux_with_metadata(&asset.path, &tagged, &metadata) {
            let _ = fs::remove_file(tagged.as_std_path());
            return Err(err);
        }
        fs::remove_file(asset.path.as_std_path())
            .map_err(|err| MementoError::Filesystem(err.to_string()))?;
        fs::rename(tagged.as_std_path(), asset.path.as_std_path())
            .map_err(|err| MementoError::Filesystem(err.to_string()))?;
        emit(
            sink,
            format!(
                "   saved video -> {}",
                asset.path.file_name().unwrap_or_default()
            ),
        );
        Ok((ItemOutcome::VideoTagged, asset.path.clone()))
    }

    fn tag_image(
        &self,
        record: &CatalogRecord,
        asset: &DownloadedAsset,
        sink: &dyn ProgressSink,
    ) -> Result<(ItemOutcome, Utf8PathBuf), MementoError> {
        let extension = asset.path.extension().unwrap_or_default();
        if exif::supports_extension(extension) {
            exif::tag_jpeg_tiff(
                &asset.path,
                &record.moment.exif(),
                &record.location,
                record.coordinates,
            )?;
            emit(
                sink,
                format!(
                    "   saved EXIF -> {}",
                    asset.path.file_name().unwrap_or_default()
                ),
            );
            return Ok((ItemOutcome::ExifTagged, asset.path.clone()));
        }
        if extension.eq_ignore_ascii_case("png") {
            png_text::tag_png(&asset.path, &record.moment.iso8601(), &record.location)?;
            emit(
                sink,
                format!(
                    "   saved PNG text -> {}",
                    asset.path.file_name().unwrap_or_default()
                ),
            );
            return Ok((ItemOutcome::PngTagged, asset.path.clone()));
        }
        // HEIC, WebP and friends have no in-place writer here.
        self.write_unsupported_sidecar(record, asset, sink)
    }

    fn write_unsupported_sidecar(
        &self,
        record: &CatalogRecord,
        asset: &DownloadedAsset,
        sink: &dyn ProgressSink,
    ) -> Result<(ItemOutcome, Utf8PathBuf), MementoError> {
        let path = sidecar::write_sidecar(&asset.path, &Sidecar::for_item(record, asset))?;
        tracing::info!(
            index = record.index,
            "no tagger for this artifact; wrote sidecar"
        );
        emit(
            sink,
            format!(
                "   no tagger available; wrote sidecar -> {}",
                path.file_name().unwrap_or_default()
            ),
        );
        Ok((ItemOutcome::SidecarUnsupported, asset.path.clone()))
    }
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent { message });
}

/// Sibling name for a tagger's staging output, `x.mp4` -> `x.tagged.mp4`.
fn tagged_sibling(path: &Utf8Path) -> Utf8PathBuf {
    match path.extension() {
        Some(ext) => path.with_extension(format!("tagged.{ext}")),
        None => Utf8PathBuf::from(format!("{path}.tagged")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_sibling_names() {
        assert_eq!(
            tagged_sibling(Utf8Path::new("/out/5_x.mp4")),
            Utf8PathBuf::from("/out/5_x.tagged.mp4")
        );
        assert_eq!(
            tagged_sibling(Utf8Path::new("/out/5_x")),
            Utf8PathBuf::from("/out/5_x.tagged")
        );
    }
}
