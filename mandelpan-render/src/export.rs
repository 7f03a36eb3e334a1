//! PNG export with embedded view metadata (tEXt chunks).

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use mandelpan_core::Viewport;

use crate::buffer::RasterBuffer;
use crate::error::RenderError;
use crate::history::HistoryEntry;

/// Characters that are not allowed in an exported file name on at least one
/// common filesystem.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Metadata to embed in an exported PNG as tEXt chunks.
pub struct ExportMetadata {
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
}

impl ExportMetadata {
    pub fn for_entry(entry: &HistoryEntry) -> Self {
        Self {
            viewport: entry.viewport,
            width: entry.raster.width,
            height: entry.raster.height,
        }
    }
}

/// Check a user-supplied file name and normalise it to end in `.png`.
///
/// Only bare names are accepted: anything that could escape the export
/// directory or that some filesystem would refuse is rejected.
pub fn validate_file_name(name: &str) -> crate::Result<String> {
    let reject = |reason: &str| RenderError::ExportRejected {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(reject("name is empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(reject("name is a directory reference"));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(reject(&format!("contains forbidden character {c:?}")));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(reject("contains control characters"));
    }
    if trimmed.ends_with('.') {
        return Err(reject("ends with a dot"));
    }

    if trimmed.to_ascii_lowercase().ends_with(".png") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}.png"))
    }
}

/// Write an RGBA raster as a PNG file with embedded view metadata.
///
/// Uses the `png` crate directly to inject tEXt chunks readable by
/// exiftool and most image viewers.
pub fn export_png(raster: &RasterBuffer, path: &Path, metadata: &ExportMetadata) -> crate::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, raster.width, raster.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder.add_text_chunk("Software".to_string(), "MandelPan".to_string())?;
    encoder.add_text_chunk("Description".to_string(), build_description(metadata))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder.add_text_chunk(key, value)?;
    }

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&raster.pixels)?;
    png_writer.finish()?;

    debug!("Exported PNG {}x{} to {}", raster.width, raster.height, path.display());
    Ok(())
}

/// Validate `name`, then write `entry` to `dir/name`.
///
/// Nothing touches the filesystem when the name is rejected.
pub fn export_entry(dir: &Path, name: &str, entry: &HistoryEntry) -> crate::Result<PathBuf> {
    let file_name = match validate_file_name(name) {
        Ok(n) => n,
        Err(e) => {
            warn!("{e}");
            return Err(e);
        }
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    export_png(&entry.raster, &path, &ExportMetadata::for_entry(entry))?;
    info!("Saved {}", path.display());
    Ok(path)
}

fn build_description(meta: &ExportMetadata) -> String {
    let vp = &meta.viewport;
    format!(
        "Mandelbrot - Center: {} {}i, Zoom: {}, Iterations: {}",
        vp.center_x, vp.center_y, vp.zoom, vp.max_iterations,
    )
}

fn build_metadata_pairs(meta: &ExportMetadata) -> Vec<(String, String)> {
    let vp = &meta.viewport;
    vec![
        ("MandelPan.CenterX".into(), vp.center_x.to_string()),
        ("MandelPan.CenterY".into(), vp.center_y.to_string()),
        ("MandelPan.Zoom".into(), vp.zoom.to_string()),
        ("MandelPan.MaxIterations".into(), vp.max_iterations.to_string()),
        ("MandelPan.Resolution".into(), format!("{}x{}", meta.width, meta.height)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;

    fn entry() -> HistoryEntry {
        let mut raster = RasterBuffer::new(4, 3);
        raster.pixels[0..4].copy_from_slice(&[1, 21, 11, 255]);
        HistoryEntry {
            viewport: Viewport::new(-0.5, 0.25, 2.0, 300).unwrap(),
            raster: Arc::new(raster),
        }
    }

    #[test]
    fn accepts_plain_names() {
        assert_eq!(validate_file_name("thing").unwrap(), "thing.png");
        assert_eq!(validate_file_name("seahorse.PNG").unwrap(), "seahorse.PNG");
        assert_eq!(validate_file_name("  deep zoom 3 ").unwrap(), "deep zoom 3.png");
    }

    #[test]
    fn rejects_invalid_names() {
        for bad in ["", "   ", ".", "..", "a/b", "a\\b", "what?", "x*y", "c:", "pipe|", "q\"", "<x>", "tab\tname", "trailing."] {
            assert!(
                matches!(validate_file_name(bad), Err(RenderError::ExportRejected { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejected_name_writes_nothing() {
        let dir = std::env::temp_dir().join("mandelpan_test_export_rejected");
        let _ = std::fs::remove_dir_all(&dir);
        let result = export_entry(&dir, "bad/name", &entry());
        assert!(matches!(result, Err(RenderError::ExportRejected { .. })));
        assert!(!dir.exists());
    }

    #[test]
    fn export_creates_valid_png() {
        let dir = std::env::temp_dir().join("mandelpan_test_export");
        let _ = std::fs::remove_dir_all(&dir);
        let path = export_entry(&dir, "test_export", &entry()).expect("export should succeed");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("test_export.png"));

        let mut file = File::open(&path).expect("file should exist");
        let mut header = [0u8; 8];
        file.read_exact(&mut header).expect("should read header");
        assert_eq!(&header, b"\x89PNG\r\n\x1a\n", "valid PNG signature");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_round_trips_pixels_and_text() {
        let dir = std::env::temp_dir().join("mandelpan_test_export_meta");
        let _ = std::fs::remove_dir_all(&dir);
        let e = entry();
        let path = export_entry(&dir, "meta", &e).expect("export should succeed");

        let decoder = png::Decoder::new(File::open(&path).expect("file should exist"));
        let mut reader = decoder.read_info().expect("should read info");
        let texts: Vec<(String, String)> = reader
            .info()
            .uncompressed_latin1_text
            .iter()
            .map(|t| (t.keyword.clone(), t.text.clone()))
            .collect();
        assert!(texts.contains(&("Software".into(), "MandelPan".into())));
        assert!(texts.contains(&("MandelPan.MaxIterations".into(), "300".into())));
        assert!(texts.contains(&("MandelPan.Resolution".into(), "4x3".into())));

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).expect("should decode");
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(&buf[..frame.buffer_size()], e.raster.pixels.as_slice());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
