//! PDF rendering for synthetic page documents.
//!
//! Produces one A4 page per logical page number from 1 to the highest number
//! present. Pages without text are emitted as blank pages so the physical
//! page index always equals the logical page number.
//!
//! Two font setups are supported:
//!
//! - the base-14 Helvetica face with `WinAnsiEncoding`. Characters without a
//!   WinAnsi code are written as `?`.
//! - an embedded TrueType program as a `Type0` / `CIDFontType2` font with
//!   `Identity-H` encoding. Every distinct character gets its own CID, a
//!   `CIDToGIDMap` points it at the font's glyph, and a `ToUnicode` CMap maps
//!   it back to the character, so any Unicode text reads back unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::warn;
use ttf_parser::Face;

use crate::error::{Error, Result};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const FONT_SIZE: i64 = 12;
const LEADING: i64 = 14;
/// Soft wrap column for long source lines.
const WRAP_COLUMN: usize = 90;

/// Highest page number a synthetic document may have.
pub const MAX_PAGES: u32 = 10_000;

/// Advance width (1/1000 em) for glyphs without horizontal metrics.
const FALLBACK_GLYPH_WIDTH: i64 = 500;

/// Font used for page text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PdfFont {
    #[default]
    Helvetica,
    TrueType { base_name: String, program: Vec<u8> },
}

impl PdfFont {
    /// Load and validate a TrueType font program for embedding.
    pub fn load(path: &Path) -> Result<Self> {
        let program = std::fs::read(path).map_err(|e| {
            Error::Render(format!("failed to read font {}: {}", path.display(), e))
        })?;
        Face::parse(&program, 0).map_err(|e| {
            Error::Render(format!("invalid font {}: {}", path.display(), e))
        })?;
        let base_name: String = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let base_name = if base_name.is_empty() {
            "EmbeddedFont".to_string()
        } else {
            base_name
        };
        Ok(PdfFont::TrueType { base_name, program })
    }
}

/// Render `pages` (page number → text) to PDF bytes.
///
/// Page numbers start at 1 and may not exceed [`MAX_PAGES`]. An empty map
/// renders nothing and is an error; callers decide earlier whether a
/// document is needed at all.
pub fn render_pages(pages: &BTreeMap<u32, String>, font: &PdfFont) -> Result<Vec<u8>> {
    let page_count = match pages.keys().next_back() {
        Some(&max) if max > 0 => max,
        _ => return Err(Error::Render("no pages to render".to_string())),
    };
    if page_count > MAX_PAGES {
        return Err(Error::Render(format!(
            "page number {} exceeds the limit of {} pages",
            page_count, MAX_PAGES
        )));
    }

    let mut encoder = TextEncoder::new(font)?;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(page_count as usize);
    for number in 1..=page_count {
        let operations = match pages.get(&number) {
            Some(text) if !text.trim().is_empty() => page_operations(text, &mut encoder)?,
            _ => Vec::new(),
        };
        let content = Content { operations }.encode().map_err(pdf_error)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box(),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let font_dict = encoder.into_font(&mut doc);
    doc.objects.insert(font_id, Object::Dictionary(font_dict));
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn media_box() -> Vec<Object> {
    vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(PAGE_WIDTH),
        Object::Integer(PAGE_HEIGHT),
    ]
}

fn pdf_error(e: lopdf::Error) -> Error {
    Error::Render(format!("failed to encode page content: {}", e))
}

/// Operations drawing `text` top-down, one source line per PDF line.
fn page_operations(text: &str, encoder: &mut TextEncoder<'_>) -> Result<Vec<Operation>> {
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    let mut first = true;
    for line in text.lines().flat_map(wrap_line) {
        if !first {
            ops.push(Operation::new("T*", vec![]));
        }
        first = false;
        if line.is_empty() {
            continue;
        }
        ops.push(Operation::new("Tj", vec![encoder.encode(&line)?]));
    }
    ops.push(Operation::new("ET", vec![]));
    Ok(ops)
}

fn wrap_line(line: &str) -> Vec<String> {
    let line = line.trim_end();
    if line.chars().count() <= WRAP_COLUMN {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > WRAP_COLUMN {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Turns text into string operands for the selected font and builds the
/// matching font resource once every page has been encoded.
enum TextEncoder<'f> {
    WinAnsi { replaced: usize },
    Cid(CidEncoder<'f>),
}

impl<'f> TextEncoder<'f> {
    fn new(font: &'f PdfFont) -> Result<Self> {
        match font {
            PdfFont::Helvetica => Ok(TextEncoder::WinAnsi { replaced: 0 }),
            PdfFont::TrueType { base_name, program } => {
                let face = Face::parse(program, 0)
                    .map_err(|e| Error::Render(format!("invalid font {}: {}", base_name, e)))?;
                Ok(TextEncoder::Cid(CidEncoder {
                    base_name,
                    program,
                    face,
                    cids: BTreeMap::new(),
                    chars: Vec::new(),
                }))
            }
        }
    }

    fn encode(&mut self, line: &str) -> Result<Object> {
        match self {
            TextEncoder::WinAnsi { replaced } => {
                let bytes = line
                    .chars()
                    .map(|c| {
                        winansi_byte(c).unwrap_or_else(|| {
                            *replaced += 1;
                            b'?'
                        })
                    })
                    .collect::<Vec<u8>>();
                Ok(Object::String(bytes, StringFormat::Literal))
            }
            TextEncoder::Cid(cid) => cid.encode(line),
        }
    }

    fn into_font(self, doc: &mut Document) -> Dictionary {
        match self {
            TextEncoder::WinAnsi { replaced } => {
                if replaced > 0 {
                    warn!(replaced, "characters outside WinAnsi written as '?'");
                }
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                }
            }
            TextEncoder::Cid(cid) => cid.into_font(doc),
        }
    }
}

/// Assigns CIDs 1, 2, 3, … to characters in first-use order. CID 0 is the
/// `.notdef` glyph and never appears in content.
struct CidEncoder<'f> {
    base_name: &'f str,
    program: &'f [u8],
    face: Face<'f>,
    cids: BTreeMap<char, u16>,
    /// `chars[cid - 1]` is the character behind `cid`.
    chars: Vec<char>,
}

impl<'f> CidEncoder<'f> {
    fn cid(&mut self, c: char) -> Result<u16> {
        if let Some(&cid) = self.cids.get(&c) {
            return Ok(cid);
        }
        let cid = u16::try_from(self.chars.len() + 1).map_err(|_| {
            Error::Render("too many distinct characters for one font".to_string())
        })?;
        self.cids.insert(c, cid);
        self.chars.push(c);
        Ok(cid)
    }

    fn encode(&mut self, line: &str) -> Result<Object> {
        let mut bytes = Vec::with_capacity(line.len() * 2);
        for c in line.chars() {
            let c = if c == '\t' { ' ' } else { c };
            if c.is_control() {
                continue;
            }
            bytes.extend_from_slice(&self.cid(c)?.to_be_bytes());
        }
        Ok(Object::String(bytes, StringFormat::Hexadecimal))
    }

    /// Font units → 1/1000 em.
    fn scale(&self, value: i16) -> i64 {
        let upem = f64::from(self.face.units_per_em());
        (f64::from(value) * 1000.0 / upem).round() as i64
    }

    fn width(&self, c: char) -> i64 {
        let upem = f64::from(self.face.units_per_em());
        self.face
            .glyph_index(c)
            .and_then(|g| self.face.glyph_hor_advance(g))
            .map(|adv| (f64::from(adv) * 1000.0 / upem).round() as i64)
            .unwrap_or(FALLBACK_GLYPH_WIDTH)
    }

    fn into_font(self, doc: &mut Document) -> Dictionary {
        let mut cid_to_gid = vec![0u8; (self.chars.len() + 1) * 2];
        for (i, &c) in self.chars.iter().enumerate() {
            let gid = self.face.glyph_index(c).map(|g| g.0).unwrap_or(0);
            let at = (i + 1) * 2;
            cid_to_gid[at..at + 2].copy_from_slice(&gid.to_be_bytes());
        }
        let cid_to_gid_id = doc.add_object(Stream::new(dictionary! {}, cid_to_gid));

        let font_file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.program.len() as i64 },
            self.program.to_vec(),
        ));

        let bbox = self.face.global_bounding_box();
        let ascent = self.scale(self.face.ascender());
        let descent = self.scale(self.face.descender());
        let cap_height = self
            .face
            .capital_height()
            .map(|h| self.scale(h))
            .unwrap_or(ascent);
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => self.base_name,
            "Flags" => 32,
            "FontBBox" => [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max]
                .into_iter()
                .map(|v| Object::Integer(self.scale(v)))
                .collect::<Vec<Object>>(),
            "ItalicAngle" => 0,
            "Ascent" => ascent,
            "Descent" => descent,
            "CapHeight" => cap_height,
            "StemV" => 80,
            "FontFile2" => font_file_id,
        });

        let mut cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => self.base_name,
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => FALLBACK_GLYPH_WIDTH,
            "CIDToGIDMap" => cid_to_gid_id,
        };

        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => self.base_name,
            "Encoding" => "Identity-H",
        };

        if !self.chars.is_empty() {
            let widths: Vec<Object> = self.chars.iter().map(|&c| self.width(c).into()).collect();
            cid_font.set("W", vec![1.into(), Object::Array(widths)]);
            let to_unicode = doc.add_object(Stream::new(
                dictionary! {},
                to_unicode_cmap(&self.chars).into_bytes(),
            ));
            font.set("ToUnicode", to_unicode);
        }

        let cid_font_id = doc.add_object(cid_font);
        font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);
        font
    }
}

/// ToUnicode CMap for CIDs `1..=chars.len()`.
fn to_unicode_cmap(chars: &[char]) -> String {
    let mut out = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    // bfchar blocks hold at most 100 entries.
    for (block, group) in chars.chunks(100).enumerate() {
        out.push_str(&format!("{} beginbfchar\n", group.len()));
        for (i, &c) in group.iter().enumerate() {
            let cid = block * 100 + i + 1;
            let mut units = [0u16; 2];
            let utf16: String = c
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", cid, utf16));
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    out
}

/// WinAnsiEncoding code for `c`, if it has one. Tabs become spaces.
fn winansi_byte(c: char) -> Option<u8> {
    let code = match c {
        '\t' => 0x20,
        '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}

/// Smallest TrueType program `ttf-parser` accepts (`head`, `hhea`, `maxp`)
/// plus a format 12 `cmap` covering printable ASCII and a few CJK ideographs.
#[cfg(test)]
pub(crate) fn test_font_program() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }
    fn be32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    let mut head = Vec::new();
    be32(&mut head, 0x0001_0000); // version
    be32(&mut head, 0x0001_0000); // revision
    be32(&mut head, 0); // checksum adjustment
    be32(&mut head, 0x5F0F_3CF5); // magic
    be16(&mut head, 0); // flags
    be16(&mut head, 1000); // units per em
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 1000, 900] {
        head.extend_from_slice(&v.to_be_bytes());
    }
    be16(&mut head, 0); // mac style
    be16(&mut head, 8); // lowest ppem
    be16(&mut head, 2); // direction hint
    be16(&mut head, 0); // loca format
    be16(&mut head, 0); // glyf format

    let mut hhea = Vec::new();
    be32(&mut hhea, 0x0001_0000);
    hhea.extend_from_slice(&800i16.to_be_bytes());
    hhea.extend_from_slice(&(-200i16).to_be_bytes());
    hhea.extend_from_slice(&0i16.to_be_bytes());
    hhea.extend_from_slice(&[0; 24]);
    be16(&mut hhea, 0); // number of h metrics

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0000_5000);
    be16(&mut maxp, 120);

    let groups: [(u32, u32, u32); 2] = [(0x20, 0x7E, 1), (0x4EF7, 0x4EF7, 100)];
    let mut cmap = Vec::new();
    be16(&mut cmap, 0); // version
    be16(&mut cmap, 1); // subtables
    be16(&mut cmap, 3); // windows
    be16(&mut cmap, 10); // ucs-4
    be32(&mut cmap, 12); // offset
    be16(&mut cmap, 12); // format
    be16(&mut cmap, 0);
    be32(&mut cmap, 16 + 12 * groups.len() as u32);
    be32(&mut cmap, 0); // language
    be32(&mut cmap, groups.len() as u32);
    for (start, end, glyph) in groups {
        be32(&mut cmap, start);
        be32(&mut cmap, end);
        be32(&mut cmap, glyph);
    }

    let tables: [(&[u8; 4], Vec<u8>); 4] =
        [(b"cmap", cmap), (b"head", head), (b"hhea", hhea), (b"maxp", maxp)];
    let mut out = Vec::new();
    be32(&mut out, 0x0001_0000);
    be16(&mut out, tables.len() as u16);
    out.extend_from_slice(&[0; 6]); // search range, entry selector, range shift
    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        be32(&mut out, 0);
        be32(&mut out, offset);
        be32(&mut out, data.len() as u32);
        offset += (data.len() as u32 + 3) & !3;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize((out.len() + 3) & !3, 0);
    }
    out
}
