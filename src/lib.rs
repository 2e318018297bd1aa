//! Download/classify/tag pipeline for a "memories history" HTML export.
//!
//! Given the export's catalog table, every referenced asset is downloaded,
//! its real file type is inferred, and capture time plus location are
//! embedded into the file: EXIF for JPEG/TIFF, tEXt chunks for PNG, container
//! metadata (via ffmpeg) for video. When tagging is impossible or fails, a
//! JSON sidecar is written beside the artifact instead. One item's failure
//! never aborts the batch, and downloaded bytes are never lost to a failed
//! tagging attempt.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod exif;
pub mod fetch;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod png_text;
pub mod sidecar;
pub mod video;
