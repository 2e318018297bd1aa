use std::fs::{self, File};
use std::io::{BufReader, BufWriter};

use camino::Utf8Path;

use crate::error::MementoError;

/// Embeds `Creation Time`, `Location` and `Comment` tEXt entries. PNG has no
/// in-place metadata slot, so the image is decoded and re-encoded into a
/// sibling temp file which replaces the original only after a complete write.
pub fn tag_png(path: &Utf8Path, date_iso: &str, location: &str) -> Result<(), MementoError> {
    let tmp_path = path.with_extension("tagged.png");
    let result = reencode_with_text(path, &tmp_path, date_iso, location);
    if result.is_err() {
        let _ = fs::remove_file(tmp_path.as_std_path());
        return result;
    }
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| MementoError::Tagging(err.to_string()))
}

fn reencode_with_text(
    path: &Utf8Path,
    tmp_path: &Utf8Path,
    date_iso: &str,
    location: &str,
) -> Result<(), MementoError> {
    let file = File::open(path.as_std_path()).map_err(tagging)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder.read_info().map_err(tagging)?;
    let mut pixels = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut pixels).map_err(tagging)?;

    let out = File::create(tmp_path.as_std_path()).map_err(tagging)?;
    let mut encoder = png::Encoder::new(BufWriter::new(out), frame.width, frame.height);
    encoder.set_color(frame.color_type);
    encoder.set_depth(frame.bit_depth);
    // Indexed images need their palette and transparency carried over.
    if let Some(palette) = reader.info().palette.clone() {
        encoder.set_palette(palette);
    }
    if let Some(trns) = reader.info().trns.clone() {
        encoder.set_trns(trns);
    }

    encoder
        .add_text_chunk("Creation Time".to_string(), date_iso.to_string())
        .map_err(tagging)?;
    encoder
        .add_text_chunk("Location".to_string(), location.to_string())
        .map_err(tagging)?;
    encoder
        .add_text_chunk(
            "Comment".to_string(),
            format!("Location: {location} | Date: {date_iso}"),
        )
        .map_err(tagging)?;

    let mut writer = encoder.write_header().map_err(tagging)?;
    writer
        .write_image_data(&pixels[..frame.buffer_size()])
        .map_err(tagging)?;
    writer.finish().map_err(tagging)?;
    Ok(())
}

fn tagging(err: impl std::fmt::Display) -> MementoError {
    MementoError::Tagging(err.to_string())
}

/// Reads back the tEXt entries of a PNG as (keyword, text) pairs.
pub fn read_text_chunks(path: &Utf8Path) -> Result<Vec<(String, String)>, MementoError> {
    let file = File::open(path.as_std_path()).map_err(tagging)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let reader = decoder.read_info().map_err(tagging)?;
    Ok(reader
        .info()
        .uncompressed_latin1_text
        .iter()
        .map(|chunk| (chunk.keyword.clone(), chunk.text.clone()))
        .collect())
}
