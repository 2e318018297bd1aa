use camino::Utf8Path;
use little_exif::exif_tag::ExifTag;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;

use crate::domain::{Coordinates, degrees_to_dms};
use crate::error::MementoError;

/// Extensions routed to the EXIF writer.
pub fn supports_extension(ext: &str) -> bool {
    matches!(
        ext.to_lowercase().as_str(),
        "jpg" | "jpeg" | "tif" | "tiff"
    )
}

/// Writes capture time, a location description and optional GPS coordinates
/// into the file's EXIF block. The metadata segment is inserted into the
/// existing bytes in place; the image data is not re-encoded.
pub fn tag_jpeg_tiff(
    path: &Utf8Path,
    exif_datetime: &str,
    location: &str,
    coordinates: Option<Coordinates>,
) -> Result<(), MementoError> {
    let mut metadata = Metadata::new();
    metadata.set_tag(ExifTag::ModifyDate(exif_datetime.to_string()));
    metadata.set_tag(ExifTag::DateTimeOriginal(exif_datetime.to_string()));
    metadata.set_tag(ExifTag::CreateDate(exif_datetime.to_string()));
    metadata.set_tag(ExifTag::ImageDescription(format!("Location: {location}")));

    if let Some(coordinates) = coordinates {
        metadata.set_tag(ExifTag::GPSLatitudeRef(
            coordinates.latitude_ref().to_string(),
        ));
        metadata.set_tag(ExifTag::GPSLongitudeRef(
            coordinates.longitude_ref().to_string(),
        ));
        metadata.set_tag(ExifTag::GPSLatitude(dms_rationals(coordinates.lat)));
        metadata.set_tag(ExifTag::GPSLongitude(dms_rationals(coordinates.lon)));
    }

    metadata
        .write_to_file(path.as_std_path())
        .map_err(|err| MementoError::Tagging(err.to_string()))
}

fn dms_rationals(degrees: f64) -> Vec<uR64> {
    degrees_to_dms(degrees)
        .into_iter()
        .map(|(nominator, denominator)| uR64 {
            nominator,
            denominator,
        })
        .collect()
}
