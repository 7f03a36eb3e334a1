use mandelpan_core::BYTES_PER_PIXEL;

/// An RGBA pixel buffer representing a rendered image.
///
/// While a render runs the buffer is owned by the coordinator and split into
/// disjoint row slices; once complete it is handed off by value and never
/// mutated again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, 4 bytes per pixel, row-major order.
    pub pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Create a new buffer filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        for chunk in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk[3] = 255;
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// RGBA bytes of pixel `(x, y)`, or `None` outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let px = &self.pixels[idx..idx + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Borrow one row of pixel data.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride();
        Some(&self.pixels[start..start + self.stride()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_black_opaque() {
        let buf = RasterBuffer::new(4, 3);
        assert_eq!(buf.pixels.len(), 4 * 3 * 4);
        for chunk in buf.pixels.chunks_exact(4) {
            assert_eq!(chunk, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn pixel_and_row_addressing() {
        let mut buf = RasterBuffer::new(3, 2);
        let idx = buf.stride() + 2 * 4;
        buf.pixels[idx..idx + 4].copy_from_slice(&[9, 8, 7, 255]);

        assert_eq!(buf.pixel(2, 1), Some([9, 8, 7, 255]));
        assert_eq!(buf.pixel(3, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
        assert_eq!(buf.row(1).map(<[u8]>::len), Some(12));
        assert!(buf.row(2).is_none());
    }

    #[test]
    fn empty_buffer() {
        let buf = RasterBuffer::new(0, 5);
        assert!(buf.pixels.is_empty());
        assert_eq!(buf.pixel(0, 0), None);
    }
}
