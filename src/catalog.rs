use std::fs;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::Regex;
use scraper::{Html, Selector};

use crate::domain::{CaptureMoment, CatalogRecord, Coordinates, MediaKind};
use crate::error::MementoError;

/// The export wraps the real download URL in an inline click handler:
/// `onclick="downloadMemories('https://...');"`. The markup coupling lives
/// here and in [`extract_download_url`] only.
static ONCLICK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)downloadMemories\(\s*'([^']+)'").unwrap());

static TBODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body > div.rightpanel > table > tbody").unwrap());
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static DOWNLOAD_ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[onclick*="downloadMemories"]"#).unwrap());

/// Rows with fewer cells than this are discarded; the table's header row
/// falls out this way because it carries `th` cells instead of `td`.
const MIN_ROW_CELLS: usize = 4;

/// One raw table row: cell texts plus the download URL, if an anchor with the
/// expected click handler was present. Index 0 is the header row.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub index: usize,
    pub cells: Vec<String>,
    pub download_url: Option<String>,
}

pub fn load(path: &Utf8Path) -> Result<Vec<CatalogRow>, MementoError> {
    let bytes = fs::read(path.as_std_path())
        .map_err(|_| MementoError::CatalogRead(path.as_std_path().to_path_buf()))?;
    // The export occasionally contains stray non-UTF-8 bytes; drop them
    // rather than refusing the whole catalog.
    Ok(parse(&String::from_utf8_lossy(&bytes)))
}

pub fn parse(html: &str) -> Vec<CatalogRow> {
    let document = Html::parse_document(html);
    let Some(tbody) = document.select(&TBODY_SELECTOR).next() else {
        return Vec::new();
    };

    tbody
        .select(&ROW_SELECTOR)
        .enumerate()
        .map(|(index, row)| {
            let cells = row
                .select(&CELL_SELECTOR)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            let download_url = row
                .select(&DOWNLOAD_ANCHOR_SELECTOR)
                .next()
                .and_then(|anchor| anchor.value().attr("onclick"))
                .and_then(extract_download_url);
            CatalogRow {
                index,
                cells,
                download_url,
            }
        })
        .collect()
}

/// Pulls the single-quoted URL argument out of the handler text. Entity
/// escapes (`&amp;` and friends) are already decoded by the HTML parser by
/// the time the attribute value reaches us.
pub fn extract_download_url(onclick: &str) -> Option<String> {
    ONCLICK_RE
        .captures(onclick)
        .map(|captures| captures[1].to_string())
}

/// Turns one raw row into a [`CatalogRecord`]. A malformed row is an error
/// for this row only; the caller logs it and moves to the next item.
pub fn normalize_row(row: &CatalogRow) -> Result<CatalogRecord, MementoError> {
    if row.cells.len() < MIN_ROW_CELLS {
        return Err(MementoError::Row {
            index: row.index,
            reason: format!(
                "expected at least {MIN_ROW_CELLS} cells, found {}",
                row.cells.len()
            ),
        });
    }
    let url = row.download_url.clone().ok_or_else(|| MementoError::Row {
        index: row.index,
        reason: "no download link".to_string(),
    })?;

    let moment: CaptureMoment = row.cells[0].parse()?;
    let kind_label = row.cells[1].clone();
    let location = row.cells[2].clone();

    Ok(CatalogRecord {
        index: row.index,
        kind: MediaKind::from_label(&kind_label),
        kind_label,
        coordinates: Coordinates::from_location_text(&location),
        location,
        moment,
        url,
    })
}
