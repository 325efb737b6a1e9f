use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A font size rounded to one decimal place.
///
/// Stored as an integer number of tenths of a point so that equality,
/// ordering and hashing are exact. Every comparison downstream of word
/// extraction goes through this type, never through raw floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FontSize(i64);

impl FontSize {
    /// Round to the nearest tenth of the exact binary value, ties to even.
    pub fn from_points(points: f64) -> Self {
        let tenths = format!("{:.1}", points)
            .parse::<f64>()
            .map(|rounded| (rounded * 10.0).round())
            .unwrap_or(0.0);
        FontSize(tenths as i64)
    }

    pub fn as_points(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_points())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeadingLevel(u8);

impl HeadingLevel {
    /// Heading level 1 -- the level given to the largest heading size.
    pub const H1: Self = HeadingLevel(1);

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Markdown heading markers for this level (`#` repeated `level` times).
    pub fn markers(&self) -> String {
        "#".repeat(self.0 as usize)
    }
}

impl TryFrom<u8> for HeadingLevel {
    type Error = InvalidHeadingLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=6).contains(&value) {
            Ok(HeadingLevel(value))
        } else {
            Err(InvalidHeadingLevel)
        }
    }
}

#[derive(Debug, Error)]
#[error("Heading level must be between 1 and 6")]
pub struct InvalidHeadingLevel;

/// An axis-aligned box in page space with a top-left origin: `top` grows
/// downwards, so `top <= bottom` for a well-formed box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// True when `other` lies entirely inside `self` (edges may touch).
    pub fn contains(&self, other: &BBox) -> bool {
        other.x0 >= self.x0
            && other.top >= self.top
            && other.x1 <= self.x1
            && other.bottom <= self.bottom
    }

    /// True when the point lies inside the box (edges included).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }
}

/// A single word as produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub x0: f64,
    pub x1: f64,
    pub top: f64,
    pub bottom: f64,
    /// Raw font size in points. Round through [`FontSize`] before comparing.
    pub size: f64,
    pub font_name: String,
}

impl Word {
    pub fn rounded_size(&self) -> FontSize {
        FontSize::from_points(self.size)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    pub is_bold: bool,
    pub font_name: String,
}

/// One assembled line of text, ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub top: f64,
    pub is_heading: bool,
    pub level: Option<HeadingLevel>,
    pub style: TextStyle,
}

/// A single table cell value as returned by table extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Rows of optional cells. `None` marks a cell the extractor could not fill.
pub type TableGrid = Vec<Vec<Option<CellValue>>>;

/// A validated table placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableUnit {
    pub bbox: BBox,
    pub page: usize,
    /// Number of cell geometries the collaborator reported.
    pub cell_count: usize,
    /// Extracted cell text, or `None` when extraction failed.
    pub grid: Option<TableGrid>,
}

/// An exported raster image referenced from the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUnit {
    /// Path relative to the Markdown file, e.g. `report_media/page1_Im0.png`.
    pub path: String,
    pub alt_text: String,
    pub top: f64,
    pub page: usize,
}

/// Everything that can appear in a page's content sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentUnit {
    Text(TextLine),
    Table(TableUnit),
    Image(ImageUnit),
}

impl ContentUnit {
    /// The vertical position used to order units on a page.
    pub fn top(&self) -> f64 {
        match self {
            ContentUnit::Text(line) => line.top,
            ContentUnit::Table(table) => table.bbox.top,
            ContentUnit::Image(image) => image.top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_level_valid() {
        assert!(HeadingLevel::try_from(1).is_ok());
        assert!(HeadingLevel::try_from(6).is_ok());
    }

    #[test]
    fn test_heading_level_invalid() {
        assert!(HeadingLevel::try_from(0).is_err());
        assert!(HeadingLevel::try_from(7).is_err());
    }

    #[test]
    fn test_heading_level_markers() {
        assert_eq!(HeadingLevel::H1.markers(), "#");
        assert_eq!(HeadingLevel::try_from(3).unwrap().markers(), "###");
    }

    #[test]
    fn test_font_size_rounds_to_one_decimal() {
        assert_eq!(FontSize::from_points(11.96), FontSize::from_points(12.0));
        assert_eq!(FontSize::from_points(10.04), FontSize::from_points(10.0));
        assert_ne!(FontSize::from_points(10.06), FontSize::from_points(10.0));
        assert_eq!(format!("{}", FontSize::from_points(9.5)), "9.5");
    }

    #[test]
    fn test_font_size_rounds_like_decimal_repr() {
        // 8.45 and 9.35 sit just below the midpoint in binary.
        assert_eq!(FontSize::from_points(8.45).as_points(), 8.4);
        assert_eq!(FontSize::from_points(9.35).as_points(), 9.3);
        // 10.25 is exact, so the tie goes to the even tenth.
        assert_eq!(FontSize::from_points(10.25).as_points(), 10.2);
        assert_eq!(FontSize::from_points(10.35).as_points(), 10.3);
        assert_eq!(FontSize::from_points(-1.26).as_points(), -1.3);
    }

    #[test]
    fn test_font_size_ordering() {
        assert!(FontSize::from_points(18.0) > FontSize::from_points(12.0));
    }

    #[test]
    fn test_bbox_contains() {
        let page = BBox::new(0.0, 0.0, 612.0, 792.0);
        assert!(page.contains(&BBox::new(10.0, 10.0, 600.0, 700.0)));
        assert!(page.contains(&page));
        assert!(!page.contains(&BBox::new(10.0, 10.0, 620.0, 700.0)));
        assert!(!page.contains(&BBox::new(-1.0, 10.0, 600.0, 700.0)));
    }

    #[test]
    fn test_content_unit_top() {
        let image = ContentUnit::Image(ImageUnit {
            path: "doc_media/page1_Im0.png".to_string(),
            alt_text: "Im0".to_string(),
            top: 42.0,
            page: 1,
        });
        assert_eq!(image.top(), 42.0);
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Text("abc".to_string()).to_string(), "abc");
    }
}
