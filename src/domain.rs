use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MementoError;

static LAT_LON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Latitude,\s*Longitude:\s*([+-]?\d+(?:\.\d+)?),\s*([+-]?\d+(?:\.\d+)?)").unwrap()
});

static UNSAFE_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w.\-]+").unwrap());

/// Media kind as declared by the catalog. The declaration is advisory only:
/// zip classification and extension sniffing override it downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// Capture timestamp of one catalog entry, parsed from the export's fixed
/// `YYYY-MM-DD HH:MM:SS UTC` form. Keeps the raw string around because the
/// failure ledger records it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMoment {
    raw: String,
    timestamp: NaiveDateTime,
}

impl CaptureMoment {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// ISO-8601 with `Z` suffix, e.g. `2025-11-12T21:05:03Z`.
    pub fn iso8601(&self) -> String {
        self.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// EXIF datetime form, e.g. `2025:11:12 21:05:03`.
    pub fn exif(&self) -> String {
        self.timestamp.format("%Y:%m:%d %H:%M:%S").to_string()
    }
}

impl FromStr for CaptureMoment {
    type Err = MementoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let timestamp = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S UTC")
            .map_err(|_| MementoError::Timestamp(value.to_string()))?;
        Ok(Self {
            raw: trimmed.to_string(),
            timestamp,
        })
    }
}

/// Signed decimal degrees pulled out of the free-form location text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Extracts `Latitude, Longitude: <num>, <num>` from the location text.
    /// Absence is normal (the export leaves the field blank for many items)
    /// and simply disables GPS tagging downstream.
    pub fn from_location_text(text: &str) -> Option<Self> {
        let captures = LAT_LON_RE.captures(text)?;
        let lat = captures.get(1)?.as_str().parse().ok()?;
        let lon = captures.get(2)?.as_str().parse().ok()?;
        Some(Self { lat, lon })
    }

    /// Compact ISO 6709 form used in video container metadata,
    /// e.g. `+48.8566+2.3522/`.
    pub fn iso6709(&self) -> String {
        format!("{:+.4}{:+.4}/", self.lat, self.lon)
    }

    pub fn latitude_ref(&self) -> &'static str {
        if self.lat >= 0.0 { "N" } else { "S" }
    }

    pub fn longitude_ref(&self) -> &'static str {
        if self.lon >= 0.0 { "E" } else { "W" }
    }
}

/// Degrees/minutes/seconds rational triple for EXIF GPS fields. Seconds are
/// rounded to two decimal places and carried as a /100 rational.
pub fn degrees_to_dms(degrees: f64) -> [(u32, u32); 3] {
    let abs = degrees.abs();
    let d = abs.trunc() as u32;
    let minutes_float = (abs - f64::from(d)) * 60.0;
    let m = minutes_float.trunc() as u32;
    let seconds = (minutes_float - f64::from(m)) * 60.0;
    [(d, 1), (m, 1), ((seconds * 100.0).round() as u32, 100)]
}

/// Collapses anything outside `[\w.\-]` into single underscores, trims
/// leading/trailing underscores and caps the result at 180 characters.
pub fn safe_stem(value: &str) -> String {
    let replaced = UNSAFE_CHARS_RE.replace_all(value.trim(), "_");
    let trimmed = replaced.trim_matches('_');
    let base = if trimmed.is_empty() { "file" } else { trimmed };
    base.chars().take(180).collect()
}

/// One normalized catalog row, ready for the download/classify/tag pipeline.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    /// Position in the catalog; stable across runs, drives the output
    /// filename and the resume point.
    pub index: usize,
    pub moment: CaptureMoment,
    pub kind: MediaKind,
    /// Kind column verbatim ("Video", "Image", ...); sidecars and the ledger
    /// carry it unchanged.
    pub kind_label: String,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub url: String,
}

impl CatalogRecord {
    /// Filesystem-safe artifact stem: `{index}_{iso timestamp, colons removed}`.
    pub fn output_stem(&self) -> String {
        let raw = format!("{}_{}", self.index, self.moment.iso8601().replace(':', ""));
        safe_stem(&raw)
    }

    /// Line appended to the failure ledger when the fetch stage fails.
    pub fn ledger_line(&self) -> String {
        format!("{}_{} {}", self.index, self.kind_label, self.moment.raw())
    }
}
