use std::fmt;

use crate::parser::backend::ObjectId;

/// A 2x3 affine matrix `[a, b, c, d, e, f]` in PDF row-vector convention.
pub type Matrix = [f32; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `lhs x rhs`: apply `lhs` first, then `rhs`.
pub fn multiply(lhs: &Matrix, rhs: &Matrix) -> Matrix {
    [
        lhs[0] * rhs[0] + lhs[1] * rhs[2],
        lhs[0] * rhs[1] + lhs[1] * rhs[3],
        lhs[2] * rhs[0] + lhs[3] * rhs[2],
        lhs[2] * rhs[1] + lhs[3] * rhs[3],
        lhs[4] * rhs[0] + lhs[5] * rhs[2] + rhs[4],
        lhs[4] * rhs[1] + lhs[5] * rhs[3] + rhs[5],
    ]
}

/// Transform a point by `m`.
pub fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Jpeg2000,
    Gif,
    Tiff,
    Bmp,
    WebP,
    Unknown,
}

impl ImageFormat {
    /// File extension used for exported images.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("jpg"),
            ImageFormat::Png => Some("png"),
            ImageFormat::Jpeg2000 => Some("jp2"),
            ImageFormat::Gif => Some("gif"),
            ImageFormat::Tiff => Some("tif"),
            ImageFormat::Bmp => Some("bmp"),
            ImageFormat::WebP => Some("webp"),
            ImageFormat::Unknown => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg2000 => write!(f, "jpeg2000"),
            ImageFormat::Gif => write!(f, "gif"),
            ImageFormat::Tiff => write!(f, "tiff"),
            ImageFormat::Bmp => write!(f, "bmp"),
            ImageFormat::WebP => write!(f, "webp"),
            ImageFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// Decoded bytes of an image XObject.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub id: ObjectId,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}
