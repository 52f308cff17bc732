//! EXIF metadata shown next to the detail view

use crate::error::AppError;
use exif::{Exif, Field, In, Reader, Tag};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Shooting information for one photo, formatted for display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifInfo {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,
    pub exposure_compensation: Option<String>,
    pub date_taken: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// EXIF orientation, 1..=8
    pub orientation: Option<u16>,
}

impl ExifInfo {
    /// `"Make Model"`, or whichever half is present
    pub fn camera(&self) -> Option<String> {
        match (&self.camera_make, &self.camera_model) {
            (Some(make), Some(model)) if model.starts_with(make.as_str()) => Some(model.clone()),
            (Some(make), Some(model)) => Some(format!("{} {}", make, model)),
            (Some(one), None) | (None, Some(one)) => Some(one.clone()),
            (None, None) => None,
        }
    }

    /// One-line summary such as `"50 mm f/1.8 1/200s ISO 100"`
    pub fn exposure_line(&self) -> String {
        [&self.focal_length, &self.aperture, &self.shutter_speed, &self.iso]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Read EXIF from a JPEG, TIFF-based RAW, HEIF or PNG container.
///
/// Blocking; async callers go through `spawn_blocking`.
pub fn read_exif(path: &Path) -> Result<ExifInfo, AppError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| AppError::Metadata(format!("{}: {}", path.display(), e)))?;
    Ok(from_exif(&exif))
}

fn from_exif(exif: &Exif) -> ExifInfo {
    let field = |tag| exif.get_field(tag, In::PRIMARY);

    ExifInfo {
        camera_make: field(Tag::Make).map(text),
        camera_model: field(Tag::Model).map(text),
        lens_model: field(Tag::LensModel).map(text),
        focal_length: field(Tag::FocalLength).map(|f| f.display_value().with_unit(exif).to_string()),
        aperture: field(Tag::FNumber).map(|f| format!("f/{}", f.display_value())),
        shutter_speed: field(Tag::ExposureTime).map(|f| format!("{}s", f.display_value())),
        iso: field(Tag::PhotographicSensitivity).map(|f| format!("ISO {}", f.display_value())),
        exposure_compensation: field(Tag::ExposureBiasValue).map(|f| format!("{} EV", f.display_value())),
        date_taken: field(Tag::DateTimeOriginal).map(text),
        width: field(Tag::PixelXDimension).and_then(|f| f.value.get_uint(0)),
        height: field(Tag::PixelYDimension).and_then(|f| f.value.get_uint(0)),
        orientation: field(Tag::Orientation)
            .and_then(|f| f.value.get_uint(0))
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| (1..=8).contains(v)),
    }
}

fn text(field: &Field) -> String {
    field.display_value().to_string().trim_matches('"').trim().to_string()
}
