//! Embedded pictures and their drawing anchors

use std::sync::Arc;

use crate::error::{Error, Result};

/// EMU per inch
pub const EMU_PER_INCH: i64 = 914_400;
/// EMU per pixel at 96 DPI
pub const EMU_PER_PIXEL: i64 = 9_525;
/// EMU per point
pub const EMU_PER_POINT: i64 = 12_700;

/// Pixels to EMU at 96 DPI
pub fn px_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PIXEL as f64).round() as i64
}

/// EMU to pixels at 96 DPI
pub fn emu_to_px(emu: i64) -> f64 {
    emu as f64 / EMU_PER_PIXEL as f64
}

/// Width in pixels of a column `width` characters wide, using the default
/// Calibri 11 metrics (7px max digit width, 5px padding)
pub fn column_width_px(width: f64) -> f64 {
    if width <= 0.0 {
        0.0
    } else if width < 1.0 {
        (width * 12.0 + 0.5).trunc()
    } else {
        (width * 7.0 + 0.5).trunc() + 5.0
    }
}

/// Height in pixels of a row `points` tall
pub fn row_height_px(points: f64) -> f64 {
    (points * 96.0 / 72.0).round()
}

/// Default column width in characters
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;
/// Default row height in points
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// Supported picture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    /// Detect the format from magic bytes
    pub fn sniff(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Ok(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Ok(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Ok(ImageFormat::Gif)
        } else if data.starts_with(b"BM") && data.len() >= 26 {
            Ok(ImageFormat::Bmp)
        } else {
            Err(Error::UnsupportedImage(data.iter().take(8).copied().collect()))
        }
    }

    /// File extension used for the media part
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// MIME type declared in the content types part
    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// Format for a media file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Bmp => "BMP",
        }
    }

    /// Read the pixel size from the header
    pub fn dimensions(self, data: &[u8]) -> Result<(u32, u32)> {
        let malformed = |reason: &str| Error::MalformedImage {
            format: self.name(),
            reason: reason.to_string(),
        };
        match self {
            ImageFormat::Png => {
                if data.len() < 24 || &data[12..16] != b"IHDR" {
                    return Err(malformed("missing IHDR chunk"));
                }
                Ok((be_u32(&data[16..20]), be_u32(&data[20..24])))
            }
            ImageFormat::Gif => {
                if data.len() < 10 {
                    return Err(malformed("truncated logical screen descriptor"));
                }
                Ok((
                    u32::from(u16::from_le_bytes([data[6], data[7]])),
                    u32::from(u16::from_le_bytes([data[8], data[9]])),
                ))
            }
            ImageFormat::Bmp => {
                if data.len() < 26 {
                    return Err(malformed("truncated DIB header"));
                }
                let header_size = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);
                if header_size == 12 {
                    // BITMAPCOREHEADER
                    return Ok((
                        u32::from(u16::from_le_bytes([data[18], data[19]])),
                        u32::from(u16::from_le_bytes([data[20], data[21]])),
                    ));
                }
                let w = i32::from_le_bytes([data[18], data[19], data[20], data[21]]);
                let h = i32::from_le_bytes([data[22], data[23], data[24], data[25]]);
                // Negative height marks a top-down bitmap
                Ok((w.unsigned_abs(), h.unsigned_abs()))
            }
            ImageFormat::Jpeg => jpeg_dimensions(data).ok_or_else(|| malformed("no SOF marker")),
        }
    }
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Walk JPEG segments up to the first start-of-frame marker
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut i = 2;
    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        match marker {
            // Fill bytes
            0xFF => {
                i += 1;
                continue;
            }
            // Standalone markers without a length
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = usize::from(u16::from_be_bytes([data[i + 2], data[i + 3]]));
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            if i + 9 > data.len() {
                return None;
            }
            let h = u16::from_be_bytes([data[i + 5], data[i + 6]]);
            let w = u16::from_be_bytes([data[i + 7], data[i + 8]]);
            return Some((u32::from(w), u32::from(h)));
        }
        i += 2 + len;
    }
    None
}

/// A cell corner plus an EMU offset into that cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnchorPoint {
    pub row: u32,
    pub col: u16,
    pub row_offset: i64,
    pub col_offset: i64,
}

impl AnchorPoint {
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            ..Default::default()
        }
    }

    /// Offset into the cell, in pixels
    pub fn with_offset_px(mut self, x: f64, y: f64) -> Self {
        self.col_offset = px_to_emu(x);
        self.row_offset = px_to_emu(y);
        self
    }
}

/// Size in EMU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub cx: i64,
    pub cy: i64,
}

impl Extent {
    pub fn from_px(width: f64, height: f64) -> Self {
        Self {
            cx: px_to_emu(width),
            cy: px_to_emu(height),
        }
    }
}

/// Where a picture sits on the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Fixed size, top-left tied to a cell
    OneCell { from: AnchorPoint, ext: Extent },
    /// Corners tied to two cells; resizes with them
    TwoCell { from: AnchorPoint, to: AnchorPoint },
    /// Fixed position and size in EMU
    Absolute { x: i64, y: i64, ext: Extent },
}

impl Anchor {
    /// Top-left cell, when anchored to cells
    pub fn from_cell(&self) -> Option<(u32, u16)> {
        match self {
            Anchor::OneCell { from, .. } | Anchor::TwoCell { from, .. } => Some((from.row, from.col)),
            Anchor::Absolute { .. } => None,
        }
    }
}

/// Which anchor form to build when inserting a picture at a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorKind {
    #[default]
    OneCell,
    TwoCell,
}

/// A picture embedded in a worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: Arc<[u8]>,
    format: ImageFormat,
    width_px: u32,
    height_px: u32,
    pub anchor: Anchor,
    /// Shape name shown in the selection pane
    pub name: Option<String>,
    /// Alternative text
    pub description: Option<String>,
}

impl Image {
    /// Decode format and pixel size from raw bytes. The picture starts
    /// one-cell anchored at A1 at its natural size.
    pub fn from_bytes<B: Into<Vec<u8>>>(bytes: B) -> Result<Self> {
        let data: Vec<u8> = bytes.into();
        let format = ImageFormat::sniff(&data)?;
        let (width_px, height_px) = format.dimensions(&data)?;
        Ok(Self {
            data: Arc::from(data),
            format,
            width_px,
            height_px,
            anchor: Anchor::OneCell {
                from: AnchorPoint::default(),
                ext: Extent::from_px(f64::from(width_px), f64::from(height_px)),
            },
            name: None,
            description: None,
        })
    }

    /// Rebuild a picture read from a package. Unrecognized bytes are kept
    /// with a format guessed from the part name.
    pub fn from_parts(data: Arc<[u8]>, format: ImageFormat, anchor: Anchor) -> Self {
        let (width_px, height_px) = format.dimensions(&data).unwrap_or((0, 0));
        Self {
            data,
            format,
            width_px,
            height_px,
            anchor,
            name: None,
            description: None,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes
    pub fn data_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Pixel size read from the header
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width_px, self.height_px)
    }

    /// Rendered size in EMU for one-cell and absolute anchors
    pub fn extent(&self) -> Option<Extent> {
        match self.anchor {
            Anchor::OneCell { ext, .. } | Anchor::Absolute { ext, .. } => Some(ext),
            Anchor::TwoCell { .. } => None,
        }
    }

    /// Scale the rendered size of a one-cell or absolute anchor relative to
    /// the natural pixel size
    pub fn scale(mut self, x: f64, y: f64) -> Self {
        let ext = Extent::from_px(f64::from(self.width_px) * x, f64::from(self.height_px) * y);
        match &mut self.anchor {
            Anchor::OneCell { ext: e, .. } | Anchor::Absolute { ext: e, .. } => *e = ext,
            Anchor::TwoCell { .. } => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let mut v = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(&13u32.to_be_bytes());
        v.extend_from_slice(b"IHDR");
        v.extend_from_slice(&w.to_be_bytes());
        v.extend_from_slice(&h.to_be_bytes());
        v.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
        v
    }

    #[test]
    fn test_emu_conversion() {
        assert_eq!(EMU_PER_INCH / 96, EMU_PER_PIXEL);
        assert_eq!(px_to_emu(1.0), 9525);
        assert_eq!(px_to_emu(96.0), EMU_PER_INCH);
        assert_eq!(emu_to_px(952_500), 100.0);
        assert_eq!(column_width_px(DEFAULT_COLUMN_WIDTH), 64.0);
        assert_eq!(row_height_px(DEFAULT_ROW_HEIGHT), 20.0);
    }

    #[test]
    fn test_png() {
        let img = Image::from_bytes(png_bytes(100, 50)).unwrap();
        assert_eq!(img.format(), ImageFormat::Png);
        assert_eq!(img.dimensions(), (100, 50));
        assert_eq!(img.extent(), Some(Extent { cx: 952_500, cy: 476_250 }));
    }

    #[test]
    fn test_gif_and_bmp() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x20, 0x00, 0x10, 0x00, 0, 0, 0]);
        assert_eq!(ImageFormat::Gif.dimensions(&gif).unwrap(), (32, 16));

        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 12]);
        bmp.extend_from_slice(&40u32.to_le_bytes());
        bmp.extend_from_slice(&64i32.to_le_bytes());
        bmp.extend_from_slice(&(-48i32).to_le_bytes());
        assert_eq!(ImageFormat::sniff(&bmp).unwrap(), ImageFormat::Bmp);
        assert_eq!(ImageFormat::Bmp.dimensions(&bmp).unwrap(), (64, 48));
    }

    #[test]
    fn test_jpeg() {
        let jpeg = [
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, // APP0
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x20, 0x00, 0x40, // SOF0 32x64
        ];
        assert_eq!(ImageFormat::sniff(&jpeg).unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::Jpeg.dimensions(&jpeg).unwrap(), (64, 32));
    }

    #[test]
    fn test_rejects_unknown_magic() {
        let err = Image::from_bytes(b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(_)));
        let err = Image::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]).unwrap_err();
        assert!(matches!(err, Error::MalformedImage { .. }));
    }
}
