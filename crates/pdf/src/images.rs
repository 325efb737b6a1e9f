//! Image XObject export.
//!
//! Encoded streams (`DCTDecode`, `JPXDecode`, or anything carrying a known
//! file signature) are written through unchanged. Raw pixel streams in the
//! device colour spaces and CCITT Group 4 fax streams are re-encoded as PNG.
//! Anything else is reported as an error and skipped by the caller.

use std::io::Cursor;

use lopdf::{Dictionary, Object, Stream};

use crate::parser::backend::{LopdfBackend, ObjectId};
use crate::types::{ImageData, ImageFormat};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

/// Identify an encoded image by its leading bytes.
pub fn sniff_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => ImageFormat::Png,
        [0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', ..] => ImageFormat::Jpeg2000,
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => ImageFormat::Gif,
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => ImageFormat::Tiff,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormat::WebP,
        [b'B', b'M', ..] if bytes.len() >= 14 => ImageFormat::Bmp,
        _ => ImageFormat::Unknown,
    }
}

/// The format implied by a stream filter, if it is a pass-through encoding.
pub fn format_for_filter(filter: &str) -> ImageFormat {
    match filter {
        "DCTDecode" | "DCT" => ImageFormat::Jpeg,
        "JPXDecode" => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Raw pixel layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    fn components(self) -> usize {
        match self {
            ColorModel::Gray => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    fn from_component_count(n: i64) -> Option<Self> {
        match n {
            1 => Some(ColorModel::Gray),
            3 => Some(ColorModel::Rgb),
            4 => Some(ColorModel::Cmyk),
            _ => None,
        }
    }
}

/// Shape of an uncompressed sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelLayout {
    width: u32,
    height: u32,
    bits: u8,
    model: ColorModel,
}

impl PixelLayout {
    fn row_bytes(&self) -> usize {
        (self.width as usize * self.model.components() * self.bits as usize).div_ceil(8)
    }

    fn byte_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

/// Unpack 1, 2 or 4-bit samples to one byte each, scaled to 0..=255.
/// Padding bits at the end of each row are dropped.
fn unpack_samples(data: &[u8], layout: &PixelLayout) -> Vec<u8> {
    let bits = layout.bits as usize;
    let samples_per_row = layout.width as usize * layout.model.components();
    let max = (1u16 << bits) - 1;
    let mask = max as u8;

    let mut out = Vec::with_capacity(samples_per_row * layout.height as usize);
    for row in data.chunks_exact(layout.row_bytes()) {
        let samples = row
            .iter()
            .flat_map(|&byte| (0..8 / bits).map(move |i| (byte >> (8 - bits * (i + 1))) & mask))
            .take(samples_per_row)
            .map(|v| (v as u16 * 255 / max) as u8);
        out.extend(samples);
    }
    out
}

/// Naive CMYK to RGB conversion without a colour profile.
fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|px| {
            let k = px[3] as u16;
            [0, 1, 2].map(|i| 255u16.saturating_sub(px[i] as u16 + k) as u8)
        })
        .collect()
}

/// Encode a raw sample buffer as PNG. `None` when the buffer does not match
/// the layout.
fn encode_png(layout: &PixelLayout, data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < layout.byte_len() || !matches!(layout.bits, 1 | 2 | 4 | 8) {
        return None;
    }
    let data = &data[..layout.byte_len()];

    let samples = if layout.bits < 8 {
        unpack_samples(data, layout)
    } else {
        data.to_vec()
    };

    let image = match layout.model {
        ColorModel::Gray => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(
            layout.width,
            layout.height,
            samples,
        )?),
        ColorModel::Rgb => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            samples,
        )?),
        ColorModel::Cmyk => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            layout.width,
            layout.height,
            cmyk_to_rgb(&samples),
        )?),
    };

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .ok()?;
    Some(png)
}

// ---------------------------------------------------------------------------
// CCITT fax
// ---------------------------------------------------------------------------

/// Render one decoded fax row into packed 1-bit gray (1 = white).
fn fax_row(transitions: &[u16], width: u16) -> Vec<u8> {
    let mut row = vec![0xFFu8; (width as usize).div_ceil(8)];

    // Transitions alternate white->black, black->white, starting on white.
    let mut edges = transitions.iter().copied().chain(std::iter::once(width));
    while let (Some(start), Some(end)) = (edges.next(), edges.next()) {
        for col in start..end.min(width) {
            row[col as usize / 8] &= !(0x80 >> (col % 8));
        }
    }
    row
}

fn decode_fax(params: &Dictionary, data: &[u8]) -> Option<Vec<u8>> {
    let int = |key: &[u8]| params.get(key).ok().and_then(|o| o.as_i64().ok());

    // Only pure two-dimensional Group 4 coding.
    if int(b"K").unwrap_or(0) >= 0 {
        return None;
    }
    let width = u16::try_from(int(b"Columns").unwrap_or(1728)).ok()?;
    let height = int(b"Rows").and_then(|r| u16::try_from(r).ok());
    let black_is_one = params
        .get(b"BlackIs1")
        .ok()
        .and_then(|o| o.as_bool().ok())
        .unwrap_or(false);

    let mut rows: Vec<Vec<u8>> = Vec::new();
    fax::decoder::decode_g4(data.iter().copied(), width, height, |transitions| {
        rows.push(fax_row(transitions, width));
    })?;
    if rows.is_empty() {
        return None;
    }

    let layout = PixelLayout {
        width: width as u32,
        height: rows.len() as u32,
        bits: 1,
        model: ColorModel::Gray,
    };
    let mut packed: Vec<u8> = rows.into_iter().flatten().collect();
    if black_is_one {
        packed.iter_mut().for_each(|b| *b = !*b);
    }
    encode_png(&layout, &packed)
}

// ---------------------------------------------------------------------------
// Stream inspection
// ---------------------------------------------------------------------------

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// The stream's filter chain, outermost first.
fn filters(doc: &lopdf::Document, dict: &Dictionary) -> Vec<String> {
    let name = |o: &Object| o.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned());
    match dict.get(b"Filter").map(|o| resolve(doc, o)) {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| name(resolve(doc, o))).collect(),
        _ => Vec::new(),
    }
}

/// The `DecodeParms` entry matching the last filter in the chain.
fn decode_params<'a>(doc: &'a lopdf::Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    match resolve(doc, dict.get(b"DecodeParms").ok()?) {
        Object::Dictionary(d) => Some(d),
        Object::Array(arr) => arr.last().and_then(|o| resolve(doc, o).as_dict().ok()),
        _ => None,
    }
}

/// Colour model of a device or ICC-based colour space.
fn color_model(doc: &lopdf::Document, dict: &Dictionary) -> Option<ColorModel> {
    match resolve(doc, dict.get(b"ColorSpace").ok()?) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(ColorModel::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColorModel::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorModel::Cmyk),
            _ => None,
        },
        Object::Array(arr) => {
            let family = arr.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let profile = resolve(doc, arr.get(1)?).as_stream().ok()?;
                    ColorModel::from_component_count(profile.dict.get(b"N").ok()?.as_i64().ok()?)
                }
                b"CalGray" => Some(ColorModel::Gray),
                b"CalRGB" => Some(ColorModel::Rgb),
                _ => None,
            }
        }
        _ => None,
    }
}

fn pixel_layout(doc: &lopdf::Document, dict: &Dictionary) -> Option<PixelLayout> {
    let dimension = |key: &[u8]| {
        resolve(doc, dict.get(key).ok()?)
            .as_i64()
            .ok()
            .and_then(|v| u32::try_from(v).ok())
    };
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(8);

    Some(PixelLayout {
        width: dimension(b"Width")?,
        height: dimension(b"Height")?,
        bits: u8::try_from(bits).ok()?,
        model: color_model(doc, dict)?,
    })
}

fn image_stream(doc: &lopdf::Document, id: ObjectId) -> Result<&Stream, PdfError> {
    let stream = doc
        .get_object(id)
        .and_then(|o| o.as_stream())
        .map_err(|_| PdfError::ImageNotFound(id))?;

    let is_image = stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|n| n == b"Image");
    if !is_image {
        return Err(PdfError::ImageNotFound(id));
    }
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Export the image XObject `id` as an encoded file.
pub fn export_image(backend: &LopdfBackend, id: ObjectId) -> Result<ImageData, PdfError> {
    let doc = backend.raw_doc();
    let stream = image_stream(doc, id)?;
    let chain = filters(doc, &stream.dict);

    let png = |bytes: Vec<u8>| ImageData {
        id,
        format: ImageFormat::Png,
        bytes,
    };

    // Pass-through encodings: the payload is already a file.
    if let Some(format) = chain
        .last()
        .map(|f| format_for_filter(f))
        .filter(|f| *f != ImageFormat::Unknown)
    {
        let bytes = if chain.len() > 1 {
            // Strip the outer generic filters only.
            let mut outer = stream.clone();
            outer.dict.set("Filter", Object::Name(chain[0].clone().into_bytes()));
            outer
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        } else {
            stream.content.clone()
        };
        return Ok(ImageData { id, format, bytes });
    }

    if chain.last().map(String::as_str) == Some("CCITTFaxDecode") {
        let params = decode_params(doc, &stream.dict).ok_or_else(|| {
            PdfError::Image(format!("CCITT image {:?} has no DecodeParms", id))
        })?;
        return decode_fax(params, &stream.content)
            .map(png)
            .ok_or_else(|| PdfError::Image(format!("cannot decode CCITT image {:?}", id)));
    }

    let data = if chain.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| PdfError::Image(format!("cannot decompress image {:?}: {}", id, e)))?
    };

    let sniffed = sniff_format(&data);
    if sniffed != ImageFormat::Unknown {
        return Ok(ImageData {
            id,
            format: sniffed,
            bytes: data,
        });
    }

    pixel_layout(doc, &stream.dict)
        .and_then(|layout| encode_png(&layout, &data))
        .map(png)
        .ok_or_else(|| PdfError::Image(format!("unsupported image encoding for {:?}", id)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
