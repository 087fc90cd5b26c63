//! Feature extraction: package archive → `.dex` section → grayscale image.
//!
//! Each package becomes a fixed-size single-channel PNG:
//! - Pick the `.dex` entries of the zip archive (only the first by default)
//! - Fit the section to `grid_width * grid_height` bytes: short sections are
//!   tiled cyclically, long ones are truncated
//! - One byte per pixel, row-major
//! - Rescale the grid to the output image size (a no-op at 256x256)
//! - Encode losslessly as PNG

use std::io::{Cursor, Read};

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, GrayImage, ImageEncoder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::Result;

pub const GRID_DIM: u32 = 256;
const SECTION_SUFFIX: &str = ".dex";

/// Which `.dex` sections of a package are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionPolicy {
    /// Only the first section in archive order.
    #[default]
    First,
    /// Every section, in archive order.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Grid the raw bytes are tiled into.
    pub grid_width: u32,
    pub grid_height: u32,
    /// Size of the encoded image.
    pub image_width: u32,
    pub image_height: u32,
    pub sections: SectionPolicy,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            grid_width: GRID_DIM,
            grid_height: GRID_DIM,
            image_width: GRID_DIM,
            image_height: GRID_DIM,
            sections: SectionPolicy::First,
        }
    }
}

impl ExtractConfig {
    pub fn grid_cells(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }
}

/// Read up to `limit` `.dex` entries from a zip archive, in archive order.
///
/// At most `max_len` bytes of each entry are read; bytes past the grid size
/// never reach the image. An archive that cannot be opened is an error, and
/// so is a corrupt entry met before any section was read. A corrupt entry
/// after that stops the walk and keeps the sections read so far.
pub fn find_sections(archive: &[u8], limit: usize, max_len: usize) -> Result<Vec<Vec<u8>>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut sections = Vec::new();

    for index in 0..zip.len() {
        if sections.len() >= limit {
            break;
        }
        let entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) if sections.is_empty() => return Err(e.into()),
            Err(e) => {
                warn!(index, error = %e, "stopping archive walk");
                break;
            }
        };
        if entry.is_dir() || !entry.name().ends_with(SECTION_SUFFIX) {
            continue;
        }

        let name = entry.name().to_owned();
        let mut data = Vec::new();
        match entry.take(max_len as u64).read_to_end(&mut data) {
            Ok(_) => {}
            Err(e) if sections.is_empty() => return Err(e.into()),
            Err(e) => {
                warn!(%name, error = %e, "stopping archive walk");
                break;
            }
        }
        debug!(%name, len = data.len(), "read executable section");
        sections.push(data);
    }

    Ok(sections)
}

/// Fit raw bytes to exactly `cells` bytes.
///
/// `None` for an empty section. Shorter input repeats as
/// `out[i] = raw[i % raw.len()]`; longer input is cut to its first `cells`
/// bytes.
pub fn tile_section(raw: &[u8], cells: usize) -> Option<Vec<u8>> {
    if raw.is_empty() {
        return None;
    }
    if raw.len() >= cells {
        return Some(raw[..cells].to_vec());
    }
    Some(raw.iter().copied().cycle().take(cells).collect())
}

/// Lay a section out as a `width` x `height` grayscale grid, row-major.
pub fn section_grid(raw: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    let cells = width as usize * height as usize;
    let scaled = tile_section(raw, cells)?;
    GrayImage::from_raw(width, height, scaled)
}

/// Resize a grid to the output size. Returned untouched when it already fits.
pub fn rescale(grid: GrayImage, width: u32, height: u32) -> GrayImage {
    if grid.dimensions() == (width, height) {
        return grid;
    }
    imageops::resize(&grid, width, height, FilterType::Triangle)
}

pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::L8,
    )?;
    Ok(out)
}

/// Turns package archives into encoded section images.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Image of the first `.dex` section, or an empty buffer when the package
    /// has none, cannot be read, or its section is empty.
    pub fn extract(&self, archive: &[u8]) -> Vec<u8> {
        match self.try_extract(archive, 1) {
            Ok(images) => images.into_iter().next().unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "unreadable package archive");
                Vec::new()
            }
        }
    }

    /// Images for the sections selected by the configured [`SectionPolicy`].
    pub fn extract_images(&self, archive: &[u8]) -> Result<Vec<Vec<u8>>> {
        let limit = match self.config.sections {
            SectionPolicy::First => 1,
            SectionPolicy::All => usize::MAX,
        };
        self.try_extract(archive, limit)
    }

    fn try_extract(&self, archive: &[u8], limit: usize) -> Result<Vec<Vec<u8>>> {
        let sections = find_sections(archive, limit, self.config.grid_cells())?;
        let mut images = Vec::with_capacity(sections.len());
        for raw in &sections {
            let png = self.render_section(raw)?;
            if png.is_empty() {
                debug!("skipping empty executable section");
                continue;
            }
            images.push(png);
        }
        Ok(images)
    }

    /// Render one raw section. Empty output for an empty section.
    pub fn render_section(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self.section_image(raw) {
            Some(image) => encode_png(&image),
            None => Ok(Vec::new()),
        }
    }

    /// The grid for a raw section, rescaled to the output size.
    pub fn section_image(&self, raw: &[u8]) -> Option<GrayImage> {
        let c = &self.config;
        let grid = section_grid(raw, c.grid_width, c.grid_height)?;
        Some(rescale(grid, c.image_width, c.image_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_extractor(dim: u32) -> Extractor {
        Extractor::new(ExtractConfig {
            grid_width: dim,
            grid_height: dim,
            image_width: dim,
            image_height: dim,
            sections: SectionPolicy::First,
        })
    }

    #[test]
    fn test_four_bytes_tile_a_four_by_four_grid() {
        let grid = section_grid(&[10, 20, 30, 40], 4, 4).unwrap();
        assert_eq!(
            grid.as_raw(),
            &vec![10, 20, 30, 40, 10, 20, 30, 40, 10, 20, 30, 40, 10, 20, 30, 40]
        );
    }

    #[test]
    fn test_tiling_wraps_on_uneven_length() {
        let tiled = tile_section(&[1, 2, 3], 8).unwrap();
        assert_eq!(tiled, vec![1, 2, 3, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_long_section_is_truncated() {
        let raw: Vec<u8> = (0..=255).collect();
        assert_eq!(tile_section(&raw, 16).unwrap(), raw[..16].to_vec());
        assert_eq!(tile_section(&raw, 256).unwrap(), raw);
    }

    #[test]
    fn test_empty_section_produces_nothing() {
        assert!(tile_section(&[], 65536).is_none());
        assert!(section_grid(&[], 256, 256).is_none());
        assert!(small_extractor(4).render_section(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_default_grid_has_65536_cells() {
        let extractor = Extractor::default();
        assert_eq!(extractor.config().grid_cells(), 65536);
        let image = extractor.section_image(&[7]).unwrap();
        assert_eq!(image.dimensions(), (256, 256));
        assert!(image.as_raw().iter().all(|&p| p == 7));
    }

    #[test]
    fn test_rescale_is_noop_at_target_size() {
        let grid = section_grid(&[1, 2, 3, 4, 5], 8, 8).unwrap();
        let same = rescale(grid.clone(), 8, 8);
        assert_eq!(same, grid);
    }

    #[test]
    fn test_rescale_changes_dimensions() {
        let grid = section_grid(&[0, 255], 8, 8).unwrap();
        let resized = rescale(grid, 4, 2);
        assert_eq!(resized.dimensions(), (4, 2));
    }

    #[test]
    fn test_render_is_lossless_png() {
        let extractor = small_extractor(4);
        let png = extractor.render_section(&[10, 20, 30, 40]).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(
            decoded.as_raw(),
            &vec![10, 20, 30, 40, 10, 20, 30, 40, 10, 20, 30, 40, 10, 20, 30, 40]
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let extractor = Extractor::default();
        let raw: Vec<u8> = (0..5000u32).map(|i| (i * 31 % 251) as u8).collect();
        let first = extractor.render_section(&raw).unwrap();
        let second = extractor.render_section(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_garbage_archive_extracts_nothing() {
        let extractor = Extractor::default();
        assert!(extractor.extract(b"definitely not a zip file").is_empty());
        assert!(extractor.extract(&[]).is_empty());
        assert!(extractor.extract_images(b"PK\x03\x04junk").is_err());
    }
}
