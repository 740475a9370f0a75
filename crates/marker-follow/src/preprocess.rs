//! Frame -> single-channel intensity conversion with a per-geometry converter cache.

use marker_follow_core::{ColorRange, GrayImage, GrayImageView, PixelFormat, VideoFrame};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Identity of a converter: a converter only handles one format and size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConverterKey {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl ConverterKey {
    pub fn of(frame: &VideoFrame) -> Self {
        Self {
            format: frame.format,
            width: frame.width,
            height: frame.height,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("unsupported pixel format {0:?}")]
    Unsupported(PixelFormat),
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("plane {plane} holds {actual} bytes, expected at least {expected}")]
    PlaneTooShort {
        plane: usize,
        expected: usize,
        actual: usize,
    },
    #[error("plane {0} is missing")]
    MissingPlane(usize),
}

/// Converts frames of one [`ConverterKey`] into full-range intensity.
pub trait FrameConverter: Send {
    /// Write the intensity of `frame` into `out`, resizing it as needed.
    ///
    /// On error `out` is left untouched.
    fn convert(&mut self, frame: &VideoFrame, out: &mut GrayImage) -> Result<(), ConvertError>;
}

/// Creates converters on demand.
pub trait ConverterFactory: Send {
    fn create(&self, key: ConverterKey) -> Result<Box<dyn FrameConverter>, ConvertError>;
}

/// Reference converter for 8-bit YUV, gray and RGB layouts.
#[derive(Clone, Debug)]
pub struct LumaConverter {
    key: ConverterKey,
    expand: [u8; 256],
}

impl LumaConverter {
    pub fn new(key: ConverterKey) -> Result<Self, ConvertError> {
        if key.width == 0 || key.height == 0 {
            return Err(ConvertError::InvalidDimensions {
                width: key.width,
                height: key.height,
            });
        }
        match key.format {
            PixelFormat::Ayuv | PixelFormat::P010 => Err(ConvertError::Unsupported(key.format)),
            _ => Ok(Self {
                key,
                expand: partial_to_full_table(),
            }),
        }
    }

    /// Bytes per row the first plane must hold at least.
    fn row_bytes(&self) -> usize {
        let w = self.key.width as usize;
        match self.key.format {
            PixelFormat::Yuy2 | PixelFormat::Uyvy => w.div_ceil(2) * 4,
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Bgrx => w * 4,
            _ => w,
        }
    }
}

/// Studio-swing luma (16..=235) stretched to 0..=255.
fn partial_to_full_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    for (v, slot) in table.iter_mut().enumerate() {
        let stretched = ((v as i32 - 16) * 255 + 109) / 219;
        *slot = stretched.clamp(0, 255) as u8;
    }
    table
}

/// BT.601 luma from 8-bit RGB, fixed point.
#[inline]
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

impl FrameConverter for LumaConverter {
    fn convert(&mut self, frame: &VideoFrame, out: &mut GrayImage) -> Result<(), ConvertError> {
        if ConverterKey::of(frame) != self.key {
            return Err(ConvertError::InvalidDimensions {
                width: frame.width,
                height: frame.height,
            });
        }
        let plane = frame.plane(0).ok_or(ConvertError::MissingPlane(0))?;
        let w = self.key.width as usize;
        let h = self.key.height as usize;
        let row_bytes = self.row_bytes();
        let stride = plane.stride.max(row_bytes);
        let expected = stride
            .checked_mul(h - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .unwrap_or(usize::MAX);
        if plane.data.len() < expected {
            return Err(ConvertError::PlaneTooShort {
                plane: 0,
                expected,
                actual: plane.data.len(),
            });
        }

        out.reshape(w, h);
        let expand = self.key.format.is_yuv() && frame.range == ColorRange::Partial;
        for y in 0..h {
            let src = &plane.data[y * stride..y * stride + row_bytes];
            let dst = out.row_mut(y);
            match self.key.format {
                PixelFormat::Yuy2 => {
                    for (x, d) in dst.iter_mut().enumerate() {
                        *d = src[2 * x];
                    }
                }
                PixelFormat::Uyvy => {
                    for (x, d) in dst.iter_mut().enumerate() {
                        *d = src[2 * x + 1];
                    }
                }
                PixelFormat::Rgba => {
                    for (d, px) in dst.iter_mut().zip(src.chunks_exact(4)) {
                        *d = bt601_luma(px[0], px[1], px[2]);
                    }
                }
                PixelFormat::Bgra | PixelFormat::Bgrx => {
                    for (d, px) in dst.iter_mut().zip(src.chunks_exact(4)) {
                        *d = bt601_luma(px[2], px[1], px[0]);
                    }
                }
                _ => dst.copy_from_slice(src),
            }
            if expand {
                for d in dst.iter_mut() {
                    *d = self.expand[*d as usize];
                }
            }
        }
        Ok(())
    }
}

/// Factory for [`LumaConverter`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LumaConverterFactory;

impl ConverterFactory for LumaConverterFactory {
    fn create(&self, key: ConverterKey) -> Result<Box<dyn FrameConverter>, ConvertError> {
        Ok(Box::new(LumaConverter::new(key)?))
    }
}

/// Owns the converter cache and the intensity buffer.
///
/// A converter is created once per run of consecutive frames sharing a
/// [`ConverterKey`], including when creation fails.
pub struct Preprocessor {
    factory: Box<dyn ConverterFactory>,
    key: Option<ConverterKey>,
    converter: Option<Box<dyn FrameConverter>>,
    image: GrayImage,
}

impl Preprocessor {
    pub fn new(factory: Box<dyn ConverterFactory>) -> Self {
        Self {
            factory,
            key: None,
            converter: None,
            image: GrayImage::default(),
        }
    }

    /// Convert `frame`; `None` disables detection for this frame.
    ///
    /// A failed conversion keeps the previous buffer of the same key.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(format = ?frame.format, width = frame.width, height = frame.height))
    )]
    pub fn process(&mut self, frame: &VideoFrame) -> Option<GrayImageView<'_>> {
        let key = ConverterKey::of(frame);
        if self.key != Some(key) {
            self.converter = None;
            self.image = GrayImage::default();
            self.key = Some(key);
            match self.factory.create(key) {
                Ok(converter) => {
                    log::debug!(
                        "created converter for {:?} {}x{}",
                        key.format,
                        key.width,
                        key.height
                    );
                    self.converter = Some(converter);
                }
                Err(err) => log::warn!("cannot convert {:?} frames: {err}", key.format),
            }
        }

        let converter = self.converter.as_mut()?;
        if let Err(err) = converter.convert(frame, &mut self.image) {
            log::warn!("frame conversion failed: {err}");
        }

        let view = self.image.view();
        (!view.is_degenerate()).then_some(view)
    }

    /// Key of the cached converter, if one is live.
    pub fn converter_key(&self) -> Option<ConverterKey> {
        self.converter.as_ref().and(self.key)
    }

    /// Drop the converter and the buffer.
    pub fn release(&mut self) {
        self.converter = None;
        self.key = None;
        self.image = GrayImage::default();
    }
}
