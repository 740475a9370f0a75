//! Decoded video frames as delivered by the host.

use serde::{Deserialize, Serialize};

/// Pixel layout of an incoming frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Single 8-bit luma plane (Y800).
    Gray8,
    /// Planar 4:2:0 YUV, three planes.
    I420,
    /// Planar 4:2:2 YUV, three planes.
    I422,
    /// Planar 4:4:4 YUV, three planes.
    I444,
    /// Luma plane followed by an interleaved UV plane.
    Nv12,
    /// Packed Y0 U Y1 V.
    Yuy2,
    /// Packed U Y0 V Y1.
    Uyvy,
    /// Packed A Y U V, 4:4:4 with alpha.
    Ayuv,
    /// Semi-planar 4:2:0 with 16-bit little-endian samples (10 significant bits).
    P010,
    Rgba,
    Bgra,
    Bgrx,
}

impl PixelFormat {
    pub fn is_yuv(self) -> bool {
        !matches!(self, Self::Gray8 | Self::Rgba | Self::Bgra | Self::Bgrx)
    }
}

/// Value range of the encoded samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRange {
    /// Studio swing, luma in `16..=235`.
    #[default]
    Partial,
    Full,
}

/// One image plane with its row stride in bytes.
#[derive(Clone, Debug, Default)]
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
}

#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub range: ColorRange,
    pub planes: Vec<Plane>,
    /// Presentation timestamp in nanoseconds.
    pub timestamp: u64,
}

impl VideoFrame {
    /// Tightly packed single-plane gray frame.
    pub fn gray(width: u32, height: u32, data: Vec<u8>, timestamp: u64) -> Self {
        Self {
            format: PixelFormat::Gray8,
            width,
            height,
            range: ColorRange::Full,
            planes: vec![Plane {
                data,
                stride: width as usize,
            }],
            timestamp,
        }
    }

    #[inline]
    pub fn plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }
}
