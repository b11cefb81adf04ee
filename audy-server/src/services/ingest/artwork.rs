//! Album artwork extraction
//!
//! The first picture embedded in the track's tags is decoded, downscaled to
//! fit `max_dimension` and re-encoded as a JPEG next to the track. Artwork is
//! best effort: any failure leaves the track without an image.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageResult;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use std::path::Path;
use tracing::{debug, warn};

pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkOptions {
    /// Largest stored edge, pixels
    pub max_dimension: u32,
    /// Edge difference still treated as square, pixels
    pub square_tolerance: u32,
}

impl Default for ArtworkOptions {
    fn default() -> Self {
        Self {
            max_dimension: 350,
            square_tolerance: 2,
        }
    }
}

/// Write artwork for `track` to `dest`, returning whether an image was stored
pub fn extract_artwork(track: &Path, dest: &Path, options: &ArtworkOptions) -> bool {
    let Some(picture) = embedded_picture(track) else {
        debug!(track = %track.display(), "No embedded artwork");
        return false;
    };

    let jpeg = match render_artwork(&picture, options) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            warn!(track = %track.display(), error = %e, "Embedded artwork could not be decoded");
            return false;
        }
    };

    match std::fs::write(dest, jpeg) {
        Ok(()) => true,
        Err(e) => {
            warn!(dest = %dest.display(), error = %e, "Failed to write artwork");
            let _ = std::fs::remove_file(dest);
            false
        }
    }
}

/// Raw bytes of the first picture in any tag of the file
fn embedded_picture(track: &Path) -> Option<Vec<u8>> {
    let tagged = Probe::open(track)
        .and_then(|probe| probe.guess_file_type().map_err(Into::into))
        .and_then(|probe| probe.read())
        .map_err(|e| debug!(track = %track.display(), error = %e, "Tag read failed"))
        .ok()?;

    tagged
        .tags()
        .iter()
        .flat_map(|tag| tag.pictures())
        .next()
        .map(|picture| picture.data().to_vec())
}

/// Decode, resize and JPEG-encode an image
pub fn render_artwork(bytes: &[u8], options: &ArtworkOptions) -> ImageResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = target_dimensions(
        img.width(),
        img.height(),
        options.max_dimension,
        options.square_tolerance,
    );

    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&img.to_rgb8())?;
    Ok(out)
}

/// Output size for a `width` x `height` image
///
/// Near-square images become an exact square. Others keep their aspect
/// ratio. Nothing is ever upscaled.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32, tolerance: u32) -> (u32, u32) {
    let max_dimension = max_dimension.max(1);

    if width.abs_diff(height) <= tolerance {
        let side = width.min(height).min(max_dimension).max(1);
        return (side, side);
    }

    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |edge: u32, long: u32| -> u32 {
        ((edge as u64 * max_dimension as u64 + long as u64 / 2) / long as u64).max(1) as u32
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}
