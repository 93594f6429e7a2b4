use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rusttype::{Font, Scale};
use tracing::debug;

use crate::config::TextLayout;
use crate::error::Result;

/// Resource name for the overlay font. Deliberately unusual so it cannot
/// collide with font keys already present on the base page.
pub(crate) const FONT_KEY: &str = "Fovl";

const CUSTOM_FONT_NAME: &str = "CustomFont";
const FALLBACK_WIDTH: f64 = 556.0;

/// First-page dimensions of the base certificate, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HorizontalPlacement {
    Centered,
    At(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerticalPlacement {
    At(f64),
    Ratio(f64),
}

/// Font selected for the overlay text. The custom variant keeps the raw
/// TTF bytes so the font can be embedded into the overlay document.
pub enum LoadedFont {
    Custom { font: Font<'static>, data: Vec<u8> },
    Builtin,
}

/// Loads the configured TTF. Any failure (no path, unreadable file, bad
/// format) degrades to the builtin Helvetica-Bold; this never errors.
pub fn load_font(path: Option<&Path>) -> LoadedFont {
    let Some(path) = path else {
        return LoadedFont::Builtin;
    };
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("Font {} not readable ({}), using Helvetica-Bold", path.display(), e);
            return LoadedFont::Builtin;
        }
    };
    match Font::try_from_vec(data.clone()) {
        Some(font) => LoadedFont::Custom { font, data },
        None => {
            debug!("Font {} failed to parse, using Helvetica-Bold", path.display());
            LoadedFont::Builtin
        }
    }
}

/// Advance width of `text` at `size` points for the given font.
pub fn text_width(font: &LoadedFont, text: &str, size: f64) -> f64 {
    match font {
        LoadedFont::Custom { font, .. } => {
            let scale = Scale::uniform(size as f32);
            text.chars()
                .map(|c| font.glyph(c).scaled(scale).h_metrics().advance_width as f64)
                .sum()
        }
        LoadedFont::Builtin => {
            text.chars().map(helvetica_bold_width).sum::<f64>() * size / 1000.0
        }
    }
}

pub fn resolve_x(placement: &HorizontalPlacement, page_width: f64, text_width: f64) -> f64 {
    match placement {
        HorizontalPlacement::Centered => (page_width - text_width) / 2.0,
        HorizontalPlacement::At(x) => *x,
    }
}

pub fn resolve_y(placement: &VerticalPlacement, page_height: f64) -> f64 {
    match placement {
        VerticalPlacement::At(y) => *y,
        VerticalPlacement::Ratio(ratio) => page_height * ratio,
    }
}

/// Writes a single-page PDF sized exactly to `geometry`, containing only
/// the name. The caller owns cleanup of the file at `path`.
pub fn render_overlay(
    name: &str,
    geometry: PageGeometry,
    layout: &TextLayout,
    path: &Path,
) -> Result<()> {
    let font = load_font(layout.font_path.as_deref());
    let width = text_width(&font, name, layout.font_size);
    let x = resolve_x(&layout.x, geometry.width, width);
    let y = resolve_y(&layout.y, geometry.height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = match &font {
        LoadedFont::Custom { font, data } => embed_truetype(&mut doc, font, data),
        LoadedFont::Builtin => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        }),
    };

    let (r, g, b) = layout.color;
    let content = Content {
        operations: vec![
            Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_KEY.into(), layout.font_size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(winansi_bytes(name), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, content.encode()?)));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            geometry.width.into(),
            geometry.height.into(),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { FONT_KEY => font_id },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path)?;
    Ok(())
}

/// Embeds the TTF as a simple TrueType font with WinAnsi encoding. Widths
/// cover the printable ASCII range, which is all the name overlay draws.
fn embed_truetype(doc: &mut Document, font: &Font<'static>, data: &[u8]) -> ObjectId {
    let scale = Scale::uniform(1000.0);
    let v_metrics = font.v_metrics(scale);
    let widths: Vec<Object> = (32u8..=126)
        .map(|c| {
            let advance = font.glyph(c as char).scaled(scale).h_metrics().advance_width;
            Object::Real(advance)
        })
        .collect();

    let font_file = doc.add_object(Object::Stream(Stream::new(
        dictionary! { "Length1" => data.len() as i64 },
        data.to_vec(),
    )));
    let descriptor = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => CUSTOM_FONT_NAME,
        "Flags" => 32,
        "FontBBox" => vec![
            Object::Integer(-500),
            Object::Real(v_metrics.descent),
            Object::Integer(1500),
            Object::Real(v_metrics.ascent),
        ],
        "ItalicAngle" => 0,
        "Ascent" => Object::Real(v_metrics.ascent),
        "Descent" => Object::Real(v_metrics.descent),
        "CapHeight" => Object::Real(v_metrics.ascent),
        "StemV" => 80,
        "FontFile2" => font_file,
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => CUSTOM_FONT_NAME,
        "FirstChar" => 32,
        "LastChar" => 126,
        "Widths" => widths,
        "FontDescriptor" => descriptor,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Both overlay font variants use WinAnsi encoding, so the text must be
/// emitted as Latin-1 bytes, not UTF-8. Characters beyond Latin-1 are
/// replaced.
fn winansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

/// Helvetica-Bold AFM advance widths (glyph space, 1000 units per em) for
/// the printable ASCII range.
fn helvetica_bold_width(c: char) -> f64 {
    const WIDTHS: [u16; 95] = [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
        333, 333, 584, 584, 584, 611, 975, // ':'..'@'
        722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667,
        778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'A'..'Z'
        333, 278, 333, 584, 556, 333, // '['..'`'
        556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611,
        611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // 'a'..'z'
        389, 280, 389, 584, // '{'..'~'
    ];
    let code = c as u32;
    match code.checked_sub(32) {
        Some(i) if i < 95 => WIDTHS[i as usize] as f64,
        _ => FALLBACK_WIDTH,
    }
}
