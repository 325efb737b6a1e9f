use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::PdfError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// An indirect object identifier mirroring `lopdf::ObjectId`: (object number,
/// generation number).
pub type ObjectId = (u32, u16);

/// Pages are addressed by their object identifier.
pub type PageId = ObjectId;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a resource dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name from the font dictionary, if present.
    pub base_font: Option<String>,
    /// Font subtype (e.g. `Type1`, `TrueType`, `Type0`).
    pub subtype: Option<String>,
    /// Encoding entry from the font dictionary, if present.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image,
    Form,
    Other,
}

/// An entry of a `/XObject` resource dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct XObjectEntry {
    pub name: Vec<u8>,
    pub id: ObjectId,
    pub kind: XObjectKind,
}

/// The parts of a resource dictionary the content walker needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub fonts: Vec<BackendFontInfo>,
    pub xobjects: Vec<XObjectEntry>,
}

impl Resources {
    pub fn font(&self, key: &[u8]) -> Option<&BackendFontInfo> {
        self.fonts.iter().find(|info| info.name == key)
    }

    pub fn xobject(&self, name: &[u8]) -> Option<&XObjectEntry> {
        self.xobjects.iter().find(|entry| entry.name == name)
    }
}

/// A form XObject ready to be walked like a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FormXObject {
    pub content: Vec<u8>,
    /// `/Matrix`, identity when absent.
    pub matrix: [f32; 6],
    /// `None` when the form has no `/Resources` of its own.
    pub resources: Option<Resources>,
}

/// A simplified, lopdf-independent representation of a PDF value.
///
/// This enum decouples higher-level logic from the concrete `lopdf::Object`
/// type so that the content walker can work with pure data.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(ObjectId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f32` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// References are preserved as `PdfValue::Reference`. Stream dictionaries
/// are converted but the raw stream bytes are discarded.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(
            dict.iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Stream(stream) => PdfValue::Dict(
            stream
                .dict
                .iter()
                .map(|(k, v)| (k.clone(), convert_object(v)))
                .collect(),
        ),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// Handles three cases in order:
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix) -- strips BOM and decodes.
/// 2. Valid UTF-8 -- returned as-is.
/// 3. Fallback to Latin-1 (ISO 8859-1) -- each byte mapped to its Unicode
///    code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        return decode_utf16be(&bytes[2..]);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

fn decode_utf16be(payload: &[u8]) -> String {
    let code_units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&code_units)
}

/// The WinAnsi code points that differ from Latin-1 (0x80..=0x9F).
fn win_ansi_char(byte: u8) -> Option<char> {
    let c = match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => return None,
    };
    Some(c)
}

/// Decode the bytes of a text-showing operator using the font's declared
/// encoding, falling back to [`decode_text_simple`].
pub fn decode_text(font: Option<&BackendFontInfo>, bytes: &[u8]) -> String {
    let encoding = font.and_then(|f| f.encoding.as_deref()).unwrap_or("");

    // Identity-H / Identity-V fonts typically use 2-byte CID codes
    // that map to Unicode.
    if encoding.contains("Identity") && bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let decoded = decode_utf16be(bytes);
        if !decoded.is_empty() && !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
            return decoded;
        }
    }

    if encoding == "WinAnsiEncoding" && std::str::from_utf8(bytes).is_err() {
        return bytes
            .iter()
            .map(|&b| win_ansi_char(b).unwrap_or(b as char))
            .collect();
    }

    decode_text_simple(bytes)
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over a PDF parsing backend (currently backed by `lopdf`).
///
/// The content walker only talks to this trait, so it can be tested against
/// mock implementations without real PDF files.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// The page's `/MediaBox` as `[llx, lly, urx, ury]`, inherited if needed.
    fn media_box(&self, page: PageId) -> Result<[f32; 4], PdfError>;

    /// Fonts and XObjects available to the page's content stream.
    fn page_resources(&self, page: PageId) -> Resources;

    /// Return the decompressed content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError>;

    /// Load a form XObject's content, matrix and resources.
    fn form_xobject(&self, id: ObjectId) -> Result<FormXObject, PdfError>;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Read and parse a PDF file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PdfError> {
        let data = std::fs::read(path)?;
        Self::load_bytes(&data)
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &lopdf::Document {
        &self.doc
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    // -- private helpers ----------------------------------------------------

    /// Look up `key` on a page dictionary, walking up the page tree for
    /// inheritable attributes.
    fn inherited<'a>(&'a self, dict: &'a lopdf::Dictionary, key: &[u8]) -> Option<&'a lopdf::Object> {
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }

        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        self.inherited(parent, key)
    }

    fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page object: {}", e)))?
            .as_dict()
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Resolve an object, following a single level of indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Dictionary> {
        match self.resolve(obj) {
            lopdf::Object::Dictionary(d) => Some(d),
            lopdf::Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    fn to_f32(&self, obj: &lopdf::Object) -> Option<f32> {
        match self.resolve(obj) {
            lopdf::Object::Integer(i) => Some(*i as f32),
            lopdf::Object::Real(f) => Some(*f),
            _ => None,
        }
    }

    fn name_of(&self, dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
        match self.resolve(dict.get(key).ok()?) {
            lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
            _ => None,
        }
    }

    /// Extract fonts and XObjects from a resource dictionary.
    fn read_resources(&self, resources: &lopdf::Dictionary) -> Resources {
        let mut result = Resources::default();

        if let Some(fonts) = resources.get(b"Font").ok().and_then(|o| self.resolve_dict(o)) {
            for (name, obj) in fonts.iter() {
                let Some(font) = self.resolve_dict(obj) else {
                    continue;
                };
                result.fonts.push(BackendFontInfo {
                    name: name.clone(),
                    base_font: self.name_of(font, b"BaseFont"),
                    subtype: self.name_of(font, b"Subtype"),
                    encoding: self.name_of(font, b"Encoding"),
                });
            }
        }

        if let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| self.resolve_dict(o)) {
            for (name, obj) in xobjects.iter() {
                let lopdf::Object::Reference(id) = obj else {
                    continue;
                };
                let kind = match self
                    .resolve_dict(obj)
                    .and_then(|d| self.name_of(d, b"Subtype"))
                    .as_deref()
                {
                    Some("Image") => XObjectKind::Image,
                    Some("Form") => XObjectKind::Form,
                    _ => XObjectKind::Other,
                };
                result.xobjects.push(XObjectEntry {
                    name: name.clone(),
                    id: *id,
                    kind,
                });
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn media_box(&self, page: PageId) -> Result<[f32; 4], PdfError> {
        let dict = self.page_dict(page)?;
        let obj = self
            .inherited(dict, b"MediaBox")
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;
        let arr = self
            .resolve(obj)
            .as_array()
            .map_err(|e| PdfError::Parse(format!("MediaBox is not an array: {}", e)))?;

        let nums: Vec<f32> = arr.iter().filter_map(|o| self.to_f32(o)).collect();
        if nums.len() < 4 {
            return Err(PdfError::Parse(format!(
                "MediaBox has {} numeric elements, expected 4",
                nums.len()
            )));
        }

        Ok([
            nums[0].min(nums[2]),
            nums[1].min(nums[3]),
            nums[0].max(nums[2]),
            nums[1].max(nums[3]),
        ])
    }

    fn page_resources(&self, page: PageId) -> Resources {
        let Ok(dict) = self.page_dict(page) else {
            return Resources::default();
        };
        self.inherited(dict, b"Resources")
            .and_then(|o| self.resolve_dict(o))
            .map(|r| self.read_resources(r))
            .unwrap_or_default()
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, PdfError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, PdfError> {
        let content = Content::decode(data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn form_xobject(&self, id: ObjectId) -> Result<FormXObject, PdfError> {
        let stream = self
            .doc
            .get_object(id)
            .and_then(|o| o.as_stream())
            .map_err(|e| PdfError::Parse(format!("form XObject {:?}: {}", id, e)))?;

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let mut matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        if let Ok(arr) = stream.dict.get(b"Matrix").and_then(|o| o.as_array()) {
            let nums: Vec<f32> = arr.iter().filter_map(|o| self.to_f32(o)).collect();
            if nums.len() == 6 {
                matrix.copy_from_slice(&nums);
            }
        }

        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| self.resolve_dict(o))
            .map(|r| self.read_resources(r));

        Ok(FormXObject {
            content,
            matrix,
            resources,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- decode_text_simple -------------------------------------------------

    #[test]
    fn decode_text_simple_utf8() {
        assert_eq!(decode_text_simple("Hello, world!".as_bytes()), "Hello, world!");
    }

    #[test]
    fn decode_text_simple_latin1() {
        // 0xE9 is U+00E9 in Latin-1 but not valid standalone UTF-8.
        let input: &[u8] = &[0x63, 0x61, 0x66, 0xE9];
        assert_eq!(decode_text_simple(input), "caf\u{00E9}");
    }

    #[test]
    fn decode_text_simple_utf16be_basic() {
        let input: &[u8] = &[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42];
        assert_eq!(decode_text_simple(input), "AB");
    }

    #[test]
    fn decode_text_simple_utf16be_odd_trailing_byte() {
        let input: &[u8] = &[0xFE, 0xFF, 0x00, 0x41, 0x00];
        assert_eq!(decode_text_simple(input), "A");
    }

    #[test]
    fn decode_text_simple_empty() {
        assert_eq!(decode_text_simple(&[]), "");
    }

    // -- decode_text --------------------------------------------------------

    fn font_with_encoding(encoding: &str) -> BackendFontInfo {
        BackendFontInfo {
            name: b"F1".to_vec(),
            base_font: Some("Helvetica".to_string()),
            subtype: None,
            encoding: Some(encoding.to_string()),
        }
    }

    #[test]
    fn decode_text_identity_h() {
        let font = font_with_encoding("Identity-H");
        assert_eq!(decode_text(Some(&font), &[0x00, 0x48, 0x00, 0x69]), "Hi");
    }

    #[test]
    fn decode_text_win_ansi_quotes() {
        let font = font_with_encoding("WinAnsiEncoding");
        assert_eq!(
            decode_text(Some(&font), &[0x93, b'o', b'k', 0x94]),
            "\u{201C}ok\u{201D}"
        );
    }

    #[test]
    fn decode_text_without_font() {
        assert_eq!(decode_text(None, b"plain"), "plain");
    }

    // -- get_number_from_value ----------------------------------------------

    #[test]
    fn get_number_integer_and_real() {
        assert_eq!(get_number_from_value(&PdfValue::Integer(42)), Some(42.0));
        assert_eq!(get_number_from_value(&PdfValue::Real(2.5)), Some(2.5));
    }

    #[test]
    fn get_number_from_non_numeric() {
        assert_eq!(get_number_from_value(&PdfValue::Null), None);
        assert_eq!(get_number_from_value(&PdfValue::Name(b"Foo".to_vec())), None);
        assert_eq!(get_number_from_value(&PdfValue::Reference((1, 0))), None);
    }

    // -- convert_object -----------------------------------------------------

    #[test]
    fn convert_scalars() {
        assert_eq!(convert_object(&lopdf::Object::Null), PdfValue::Null);
        assert_eq!(convert_object(&lopdf::Object::Integer(99)), PdfValue::Integer(99));
        assert_eq!(
            convert_object(&lopdf::Object::Name(b"Font".to_vec())),
            PdfValue::Name(b"Font".to_vec()),
        );
    }

    #[test]
    fn convert_string_literal() {
        assert_eq!(
            convert_object(&lopdf::Object::String(
                b"hello".to_vec(),
                lopdf::StringFormat::Literal,
            )),
            PdfValue::Str(b"hello".to_vec()),
        );
    }

    #[test]
    fn convert_array() {
        let arr = lopdf::Object::Array(vec![lopdf::Object::Integer(1), lopdf::Object::Real(2.0)]);
        assert_eq!(
            convert_object(&arr),
            PdfValue::Array(vec![PdfValue::Integer(1), PdfValue::Real(2.0)]),
        );
    }

    #[test]
    fn convert_reference() {
        assert_eq!(
            convert_object(&lopdf::Object::Reference((7, 0))),
            PdfValue::Reference((7, 0))
        );
    }

    // -- Resources ----------------------------------------------------------

    #[test]
    fn resources_lookup_by_key() {
        let resources = Resources {
            fonts: vec![font_with_encoding("WinAnsiEncoding")],
            xobjects: vec![XObjectEntry {
                name: b"Im0".to_vec(),
                id: (5, 0),
                kind: XObjectKind::Image,
            }],
        };
        assert!(resources.font(b"F1").is_some());
        assert!(resources.font(b"F2").is_none());
        assert_eq!(resources.xobject(b"Im0").map(|x| x.id), Some((5, 0)));
    }

    // -- LopdfBackend -------------------------------------------------------

    #[test]
    fn load_bytes_rejects_garbage() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }
}
