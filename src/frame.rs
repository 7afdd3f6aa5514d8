//! Transient frame buffers.
//!
//! A `Frame` lives for exactly one scheduler tick:
//!
//! - The video source produces it (decoded, any supported pixel format).
//! - `into_format` normalizes the pixel format for the detector.
//! - `scaled` resizes it to the detector input dimensions.
//! - The detector consumes it.
//!
//! Every step takes the frame by value and returns a new owned buffer, so the
//! superseded buffer is released as soon as the step returns. `Frame` does not
//! implement `Clone`; a frame that was handed to a transformation cannot be used
//! again:
//!
//! ```compile_fail
//! use sightline::{Frame, PixelFormat};
//!
//! let frame = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24, 0).unwrap();
//! let rgba = frame.into_format(PixelFormat::Rgba8888).unwrap();
//! let _stale = frame.pixels();
//! ```
//!
//! ```compile_fail
//! use sightline::{Frame, PixelFormat};
//!
//! let frame = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24, 0).unwrap();
//! let _copy = frame.clone();
//! ```

use anyhow::{anyhow, bail, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel, Rgb, Rgba};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel, interleaved R, G, B, A.
    Rgba8888,
    /// 8 bits per channel, interleaved R, G, B.
    Rgb24,
    /// Full-resolution Y plane followed by interleaved half-resolution UV.
    Nv12,
}

impl PixelFormat {
    /// Expected buffer length for a frame of the given dimensions.
    pub fn buffer_len(self, width: u32, height: u32) -> Result<usize> {
        let pixels = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", self))?;
        let len = match self {
            PixelFormat::Rgba8888 => pixels.checked_mul(4),
            PixelFormat::Rgb24 => pixels.checked_mul(3),
            PixelFormat::Nv12 => pixels.checked_add(pixels / 2),
        };
        len.ok_or_else(|| anyhow!("{:?} frame dimensions overflow", self))
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Owned pixel buffer for one tick.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Source position the frame was decoded at.
    timestamp_ms: u64,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ms: u64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("frame dimensions must be non-zero, got {}x{}", width, height);
        }
        if format == PixelFormat::Nv12 && (width % 2 != 0 || height % 2 != 0) {
            bail!("NV12 frames need even dimensions, got {}x{}", width, height);
        }
        let expected = format.buffer_len(width, height)?;
        if data.len() != expected {
            bail!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            timestamp_ms,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Convert to `target`. A frame already in `target` is returned as is,
    /// without copying.
    pub fn into_format(self, target: PixelFormat) -> Result<Frame> {
        if self.format == target {
            return Ok(self);
        }
        let Frame {
            data,
            width,
            height,
            format,
            timestamp_ms,
        } = self;
        let converted = match (format, target) {
            (PixelFormat::Rgb24, PixelFormat::Rgba8888) => rgb_to_rgba(&data),
            (PixelFormat::Rgba8888, PixelFormat::Rgb24) => rgba_to_rgb(&data),
            (PixelFormat::Nv12, PixelFormat::Rgb24) => nv12_to_rgb(&data, width, height)?,
            (PixelFormat::Nv12, PixelFormat::Rgba8888) => {
                rgb_to_rgba(&nv12_to_rgb(&data, width, height)?)
            }
            (from, to) => bail!("unsupported pixel conversion {:?} -> {:?}", from, to),
        };
        drop(data);
        Frame::new(converted, width, height, target, timestamp_ms)
    }

    /// Resize with bilinear filtering. A frame already at the requested size
    /// is returned as is.
    pub fn scaled(self, width: u32, height: u32) -> Result<Frame> {
        if width == 0 || height == 0 {
            bail!("cannot scale frame to {}x{}", width, height);
        }
        if self.width == width && self.height == height {
            return Ok(self);
        }
        let Frame {
            data,
            width: src_width,
            height: src_height,
            format,
            timestamp_ms,
        } = self;
        let resized = match format {
            PixelFormat::Rgba8888 => {
                resize::<Rgba<u8>>(data, (src_width, src_height), (width, height))?
            }
            PixelFormat::Rgb24 => resize::<Rgb<u8>>(data, (src_width, src_height), (width, height))?,
            PixelFormat::Nv12 => bail!("NV12 frames must be converted before scaling"),
        };
        Frame::new(resized, width, height, format, timestamp_ms)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Pixel conversions
// ----------------------------------------------------------------------------

fn resize<P>(data: Vec<u8>, from: (u32, u32), to: (u32, u32)) -> Result<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = from;
    let source: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| anyhow!("frame buffer too small for {}x{}", width, height))?;
    Ok(imageops::resize(&source, to.0, to.1, FilterType::Triangle).into_raw())
}

fn rgb_to_rgba(pixels: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
    for px in pixels.chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(u8::MAX);
    }
    rgba
}

fn rgba_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    for px in pixels.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;

            let offset = (j * w + i) * 3;
            rgb[offset] = clamp_to_u8(r);
            rgb[offset + 1] = clamp_to_u8(g);
            rgb[offset + 2] = clamp_to_u8(b);
        }
    }

    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(width: u32, height: u32, value: u8) -> Frame {
        let len = (width * height * 3) as usize;
        Frame::new(vec![value; len], width, height, PixelFormat::Rgb24, 40).unwrap()
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Rgb24, 0).is_err());
        assert!(Frame::new(vec![0u8; 16], 2, 2, PixelFormat::Rgba8888, 0).is_ok());
        assert!(Frame::new(Vec::new(), 0, 2, PixelFormat::Rgb24, 0).is_err());
    }

    #[test]
    fn rgb_to_rgba_adds_opaque_alpha() -> Result<()> {
        let frame = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1, PixelFormat::Rgb24, 7)?;
        let rgba = frame.into_format(PixelFormat::Rgba8888)?;
        assert_eq!(rgba.format(), PixelFormat::Rgba8888);
        assert_eq!(rgba.pixels(), &[1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(rgba.timestamp_ms(), 7);
        Ok(())
    }

    #[test]
    fn conversion_to_same_format_does_not_copy() -> Result<()> {
        let frame = Frame::new(vec![9u8; 16], 2, 2, PixelFormat::Rgba8888, 0)?;
        let before = frame.pixels().as_ptr();
        let same = frame.into_format(PixelFormat::Rgba8888)?;
        assert_eq!(same.pixels().as_ptr(), before);
        Ok(())
    }

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let frame = Frame::new(nv12, 2, 2, PixelFormat::Nv12, 0)?;
        let rgb = frame.into_format(PixelFormat::Rgb24)?;
        assert_eq!(rgb.pixels(), &[128u8; 12]);
        Ok(())
    }

    #[test]
    fn converting_to_nv12_is_unsupported() {
        let frame = rgb_frame(2, 2, 0);
        assert!(frame.into_format(PixelFormat::Nv12).is_err());
    }

    #[test]
    fn scaling_resizes_to_requested_dimensions() -> Result<()> {
        let frame = rgb_frame(8, 6, 200).into_format(PixelFormat::Rgba8888)?;
        let scaled = frame.scaled(4, 3)?;
        assert_eq!((scaled.width(), scaled.height()), (4, 3));
        assert_eq!(scaled.byte_len(), 4 * 3 * 4);
        assert!(scaled
            .pixels()
            .chunks_exact(4)
            .all(|px| px[0].abs_diff(200) <= 1 && px[3] == 255));
        Ok(())
    }

    #[test]
    fn scaling_nv12_requires_conversion_first() {
        let frame = Frame::new(vec![0u8; 6], 2, 2, PixelFormat::Nv12, 0).unwrap();
        assert!(frame.scaled(4, 4).is_err());
    }
}
