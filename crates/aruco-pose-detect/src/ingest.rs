//! Pixel-buffer ingest and lens correction.

use aruco_pose_core::{
    sample_bilinear_u8, CameraIntrinsics, DistortionModel, GrayImage, GrayImageView,
};
use nalgebra::Point2;

/// Errors produced while converting a camera pixel buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid buffer format: {reason}")]
    InvalidBufferFormat { reason: String },
}

impl FrameError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidBufferFormat {
            reason: reason.into(),
        }
    }
}

/// Supported camera pixel formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Single-plane 8-bit grayscale.
    Gray8,
    /// Interleaved 8-bit blue/green/red/alpha (common iOS camera output).
    Bgra8,
    /// Interleaved 8-bit red/green/blue/alpha.
    Rgba8,
    /// Bi-planar YUV 4:2:0; only the leading luma plane is read.
    Nv12,
}

impl PixelFormat {
    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 | Self::Nv12 => 1,
            Self::Bgra8 | Self::Rgba8 => 4,
        }
    }
}

/// Borrowed view of a caller-owned camera frame.
///
/// The buffer is only borrowed for the duration of a call and never
/// retained.
#[derive(Clone, Copy, Debug)]
pub struct PixelBuffer<'a> {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    /// Row stride in bytes (>= width * bytes-per-pixel).
    pub bytes_per_row: usize,
    pub data: &'a [u8],
}

impl<'a> PixelBuffer<'a> {
    pub fn new(
        format: PixelFormat,
        width: usize,
        height: usize,
        bytes_per_row: usize,
        data: &'a [u8],
    ) -> Self {
        Self {
            format,
            width,
            height,
            bytes_per_row,
            data,
        }
    }

    /// Tightly packed grayscale buffer.
    pub fn gray(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self::new(PixelFormat::Gray8, width, height, width, data)
    }

    /// Convert to an owned grayscale image.
    ///
    /// BGRA/RGBA use integer BT.601 luma weights; NV12 copies the luma
    /// plane.
    pub fn to_grayscale(&self) -> Result<GrayImage, FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::invalid(format!(
                "zero dimensions ({}x{})",
                self.width, self.height
            )));
        }
        let bpp = self.format.bytes_per_pixel();
        let min_stride = self.width * bpp;
        if self.bytes_per_row < min_stride {
            return Err(FrameError::invalid(format!(
                "row stride {} < {} required for width {}",
                self.bytes_per_row, min_stride, self.width
            )));
        }
        // The last row does not need trailing stride padding.
        let required = self.bytes_per_row * (self.height - 1) + min_stride;
        if self.data.len() < required {
            return Err(FrameError::invalid(format!(
                "buffer holds {} bytes, {} required",
                self.data.len(),
                required
            )));
        }

        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            let row = &self.data[y * self.bytes_per_row..];
            match self.format {
                PixelFormat::Gray8 | PixelFormat::Nv12 => {
                    out.extend_from_slice(&row[..self.width]);
                }
                PixelFormat::Bgra8 => {
                    for x in 0..self.width {
                        let px = &row[4 * x..4 * x + 4];
                        out.push(luma_601(px[2], px[1], px[0]));
                    }
                }
                PixelFormat::Rgba8 => {
                    for x in 0..self.width {
                        let px = &row[4 * x..4 * x + 4];
                        out.push(luma_601(px[0], px[1], px[2]));
                    }
                }
            }
        }

        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data: out,
        })
    }
}

#[inline]
fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Remap a grayscale frame through the inverse lens model.
///
/// For each output pixel: normalize through K^-1, apply the forward
/// distortion, project back through K and bilinear-sample the source. The
/// result is the lens-corrected image the detector runs on.
pub fn undistort_image(
    src: &GrayImageView<'_>,
    intrinsics: &CameraIntrinsics,
    model: &DistortionModel,
) -> GrayImage {
    if model.is_identity() {
        return GrayImage {
            width: src.width,
            height: src.height,
            data: src.data.to_vec(),
        };
    }

    let mut out = vec![0u8; src.width * src.height];
    for y in 0..src.height {
        for x in 0..src.width {
            let n = intrinsics.normalize(Point2::new(x as f64, y as f64));
            let d = model.distort(n);
            let p = intrinsics.denormalize(d);
            out[y * src.width + x] = sample_bilinear_u8(src, p.x as f32, p.y as f32);
        }
    }

    GrayImage {
        width: src.width,
        height: src.height,
        data: out,
    }
}
