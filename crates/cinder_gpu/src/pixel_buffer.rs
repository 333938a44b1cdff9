//! CPU-side pixel storage
//!
//! Used for texture uploads, staging (transfer) buffers and pixel read back.
//! Float formats are stored in native byte order.

use cinder_core::{Color, GraphicsError, IntPoint, IntRect, IntSize, Result};

use crate::resources::TextureFormat;

#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    size: IntSize,
    format: TextureFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a zero-filled buffer
    pub fn new(size: IntSize, format: TextureFormat) -> Result<Self> {
        if !size.is_positive() {
            return Err(GraphicsError::invalid_argument(format!(
                "pixel buffer size {}x{} must be positive",
                size.width, size.height
            )));
        }
        Ok(Self {
            size,
            format,
            data: vec![0; size.area() * format.bytes_per_pixel()],
        })
    }

    /// Wrap existing tightly packed pixel data
    pub fn from_data(size: IntSize, format: TextureFormat, data: Vec<u8>) -> Result<Self> {
        let expected = size.area() * format.bytes_per_pixel();
        if !size.is_positive() || data.len() != expected {
            return Err(GraphicsError::invalid_argument(format!(
                "pixel data holds {} bytes, {}x{} {:?} needs {}",
                data.len(),
                size.width,
                size.height,
                format,
                expected
            )));
        }
        Ok(Self { size, format, data })
    }

    /// Zero-sized stand-in while a backend renders into a texture's storage
    pub(crate) fn detached() -> Self {
        Self {
            size: IntSize::new(0, 0),
            format: TextureFormat::R8,
            data: Vec::new(),
        }
    }

    pub fn size(&self) -> IntSize {
        self.size
    }

    pub fn width(&self) -> i32 {
        self.size.width
    }

    pub fn height(&self) -> i32 {
        self.size.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Bytes per row
    pub fn pitch(&self) -> usize {
        self.size.width as usize * self.format.bytes_per_pixel()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn bounds(&self) -> IntRect {
        IntRect::from_size(self.size)
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        debug_assert!(self.bounds().contains(x, y));
        y as usize * self.pitch() + x as usize * self.format.bytes_per_pixel()
    }

    /// Read one pixel as float RGBA; single channel formats read as `(r, 0, 0, 1)`
    pub fn pixel(&self, x: i32, y: i32) -> [f32; 4] {
        let o = self.offset(x, y);
        match self.format {
            TextureFormat::Rgba8 => [
                self.data[o] as f32 / 255.0,
                self.data[o + 1] as f32 / 255.0,
                self.data[o + 2] as f32 / 255.0,
                self.data[o + 3] as f32 / 255.0,
            ],
            TextureFormat::Rgba32f => {
                let mut out = [0.0f32; 4];
                for (i, value) in out.iter_mut().enumerate() {
                    let start = o + i * 4;
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&self.data[start..start + 4]);
                    *value = f32::from_ne_bytes(bytes);
                }
                out
            }
            TextureFormat::R8 => [self.data[o] as f32 / 255.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, value: [f32; 4]) {
        let o = self.offset(x, y);
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self.format {
            TextureFormat::Rgba8 => {
                for i in 0..4 {
                    self.data[o + i] = q(value[i]);
                }
            }
            TextureFormat::Rgba32f => {
                for (i, component) in value.iter().enumerate() {
                    let start = o + i * 4;
                    self.data[start..start + 4].copy_from_slice(&component.to_ne_bytes());
                }
            }
            TextureFormat::R8 => self.data[o] = q(value[0]),
        }
    }

    /// Read one pixel of an 8-bit RGBA buffer as raw bytes
    pub fn pixel_rgba8(&self, x: i32, y: i32) -> [u8; 4] {
        match self.format {
            TextureFormat::Rgba8 => {
                let o = self.offset(x, y);
                [
                    self.data[o],
                    self.data[o + 1],
                    self.data[o + 2],
                    self.data[o + 3],
                ]
            }
            _ => Color::from_array(self.pixel(x, y)).to_rgba8(),
        }
    }

    pub fn fill(&mut self, value: [f32; 4]) {
        for y in 0..self.size.height {
            for x in 0..self.size.width {
                self.set_pixel(x, y, value);
            }
        }
    }

    /// Reverse the row order in place
    pub fn flip_vertical(&mut self) {
        let pitch = self.pitch();
        let height = self.size.height as usize;
        for row in 0..height / 2 {
            let (upper, lower) = self.data.split_at_mut((height - 1 - row) * pitch);
            upper[row * pitch..(row + 1) * pitch].swap_with_slice(&mut lower[..pitch]);
        }
    }

    /// Copy `src_rect` of `src` to `dest` in this buffer, converting formats
    pub fn copy_from(&mut self, src: &PixelBuffer, src_rect: IntRect, dest: IntPoint) -> Result<()> {
        let dest_rect = IntRect::new(dest.x, dest.y, src_rect.width, src_rect.height);
        if src_rect.is_empty()
            || src.bounds().intersection(&src_rect) != src_rect
            || self.bounds().intersection(&dest_rect) != dest_rect
        {
            return Err(GraphicsError::invalid_argument(format!(
                "pixel copy {:?} -> {:?} is out of bounds",
                src_rect, dest_rect
            )));
        }
        if src.format == self.format {
            let bpp = self.format.bytes_per_pixel();
            let row_bytes = src_rect.width as usize * bpp;
            for row in 0..src_rect.height {
                let s = src.offset(src_rect.x, src_rect.y + row);
                let d = self.offset(dest.x, dest.y + row);
                self.data[d..d + row_bytes].copy_from_slice(&src.data[s..s + row_bytes]);
            }
        } else {
            for row in 0..src_rect.height {
                for col in 0..src_rect.width {
                    let value = src.pixel(src_rect.x + col, src_rect.y + row);
                    self.set_pixel(dest.x + col, dest.y + row, value);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_size() {
        let err = PixelBuffer::new(IntSize::new(0, 4), TextureFormat::Rgba8).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
    }

    #[test]
    fn test_float_pixels_keep_precision() {
        let mut buffer = PixelBuffer::new(IntSize::new(2, 2), TextureFormat::Rgba32f).unwrap();
        buffer.set_pixel(1, 1, [0.125, -3.5, 1e6, 7.0]);
        assert_eq!(buffer.pixel(1, 1), [0.125, -3.5, 1e6, 7.0]);
    }

    #[test]
    fn test_flip_vertical() {
        let mut buffer = PixelBuffer::new(IntSize::new(1, 3), TextureFormat::R8).unwrap();
        buffer.data_mut().copy_from_slice(&[1, 2, 3]);
        buffer.flip_vertical();
        assert_eq!(buffer.data(), &[3, 2, 1]);
    }

    #[test]
    fn test_copy_converts_format() {
        let mut src = PixelBuffer::new(IntSize::new(2, 1), TextureFormat::Rgba8).unwrap();
        src.set_pixel(1, 0, [1.0, 0.0, 0.0, 1.0]);
        let mut dest = PixelBuffer::new(IntSize::new(4, 4), TextureFormat::Rgba32f).unwrap();
        dest.copy_from(&src, IntRect::new(1, 0, 1, 1), IntPoint::new(3, 3))
            .unwrap();
        assert_eq!(dest.pixel(3, 3), [1.0, 0.0, 0.0, 1.0]);

        let err = dest.copy_from(&src, IntRect::new(0, 0, 2, 1), IntPoint::new(3, 3));
        assert!(err.is_err());
    }
}
