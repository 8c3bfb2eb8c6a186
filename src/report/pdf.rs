//! PDF renderer.
//!
//! Uses the standard Helvetica fonts (no embedding) and JPEG image XObjects.
//! No timestamps or document IDs are written, so output is reproducible.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use super::layout::{Color, Rect, PAGE_HEIGHT_PT, PAGE_WIDTH_PT};
use super::plan::{Align, Element, PlannedPage, ReportPlan, TextStyle, VAlign, CELL_PADDING_PT};
use super::text::{text_width, to_win_ansi, wrap};

const JPEG_QUALITY: u8 = 85;
/// Line advance as a multiple of the font size.
const LINE_SPACING: f32 = 1.3;
/// Baseline offset below the top of a line, as a multiple of the font size.
const ASCENT: f32 = 0.8;

/// Renders a plan to PDF bytes.
pub fn render(plan: &ReportPlan) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut xobjects = Dictionary::new();
    for (i, image) in plan.images.iter().enumerate() {
        let id = doc.add_object(jpeg_xobject(image)?);
        xobjects.set(image_name(i), id);
    }

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
        "XObject" => xobjects,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(plan.pages.len());
    for page in &plan.pages {
        let content = Content {
            operations: page_operations(page),
        };
        let bytes = content.encode().context("Failed to encode page content")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let media_box: Vec<Object> = vec![
        0i64.into(),
        0i64.into(),
        PAGE_WIDTH_PT.into(),
        PAGE_HEIGHT_PT.into(),
    ];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).context("Failed to write PDF")?;
    Ok(out)
}

fn image_name(index: usize) -> String {
    format!("Im{}", index)
}

/// Flattens onto white (JPEG has no alpha) and wraps as a DCTDecode image.
fn jpeg_xobject(image: &RgbaImage) -> Result<Stream> {
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let a = p[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    });

    let mut data = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY))
        .context("Failed to encode JPEG")?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width() as i64,
            "Height" => image.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        data,
    ))
}

/// Page rectangle in points: (left, bottom, width, height).
fn to_points(rect: &Rect) -> (f32, f32, f32, f32) {
    let w = rect.w * PAGE_WIDTH_PT;
    let h = rect.h * PAGE_HEIGHT_PT;
    let x = rect.x * PAGE_WIDTH_PT;
    let y = PAGE_HEIGHT_PT - rect.y * PAGE_HEIGHT_PT - h;
    (x, y, w, h)
}

fn fill_color(color: Color) -> Operation {
    let [r, g, b] = color.unit();
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

fn page_operations(page: &PlannedPage) -> Vec<Operation> {
    let mut ops = Vec::new();
    for element in &page.elements {
        match element {
            Element::Fill { rect, color } => fill_rect(&mut ops, rect, *color),
            Element::Text { rect, text, style } => draw_text(&mut ops, rect, text, style),
            Element::Image { rect, image } => {
                let (x, y, w, h) = to_points(rect);
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![w.into(), 0f32.into(), 0f32.into(), h.into(), x.into(), y.into()],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![Object::Name(image_name(*image).into_bytes())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
            Element::Table {
                rect,
                columns,
                rows,
                row_height,
                font_size,
                header,
            } => draw_table(&mut ops, rect, columns, rows, *row_height, *font_size, *header),
        }
    }
    ops
}

fn fill_rect(ops: &mut Vec<Operation>, rect: &Rect, color: Color) {
    let (x, y, w, h) = to_points(rect);
    ops.push(fill_color(color));
    ops.push(Operation::new(
        "re",
        vec![x.into(), y.into(), w.into(), h.into()],
    ));
    ops.push(Operation::new("f", vec![]));
}

fn show_line(ops: &mut Vec<Operation>, line: &str, x: f32, baseline: f32, style: &TextStyle) {
    let font = if style.bold { "F2" } else { "F1" };
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), style.size.into()]));
    ops.push(fill_color(style.color));
    ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(to_win_ansi(line), StringFormat::Hexadecimal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn draw_text(ops: &mut Vec<Operation>, rect: &Rect, text: &str, style: &TextStyle) {
    let (x, bottom, w, h) = to_points(rect);
    let top = bottom + h;
    let lines = wrap(text, w, style.size, style.bold);
    let line_height = style.size * LINE_SPACING;
    let block = line_height * (lines.len() as f32 - 1.0) + style.size;

    let first_baseline = match style.valign {
        VAlign::Top => top - style.size * ASCENT,
        VAlign::Middle => top - (h - block).max(0.0) / 2.0 - style.size * ASCENT,
    };

    for (i, line) in lines.iter().enumerate() {
        let baseline = first_baseline - i as f32 * line_height;
        if baseline < bottom {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let width = text_width(line, style.size, style.bold);
        let lx = match style.align {
            Align::Left => x,
            Align::Center => x + (w - width) / 2.0,
            Align::Right => x + w - width,
        };
        show_line(ops, line, lx, baseline, style);
    }
}

fn draw_table(
    ops: &mut Vec<Operation>,
    rect: &Rect,
    columns: &[String],
    rows: &[Vec<String>],
    row_height: f32,
    font_size: f32,
    header: Color,
) {
    let col_count = columns.len().max(1);
    let col_w = rect.w / col_count as f32;

    let all_rows = std::iter::once(columns).chain(rows.iter().map(|r| r.as_slice()));
    for (r, cells) in all_rows.enumerate() {
        let row_rect = Rect::new(rect.x, rect.y + r as f32 * row_height, rect.w, row_height);
        let (fill, style) = if r == 0 {
            (Some(header), cell_style(font_size, true, Color::WHITE))
        } else if r % 2 == 0 {
            (Some(Color::STRIPE), cell_style(font_size, false, Color::TEXT))
        } else {
            (None, cell_style(font_size, false, Color::TEXT))
        };
        if let Some(color) = fill {
            fill_rect(ops, &row_rect, color);
        }
        for (c, cell) in cells.iter().enumerate().take(col_count) {
            let pad = CELL_PADDING_PT / PAGE_WIDTH_PT;
            let cell_rect = Rect::new(
                rect.x + c as f32 * col_w + pad,
                row_rect.y,
                col_w - 2.0 * pad,
                row_height,
            );
            draw_text(ops, &cell_rect, cell, &style);
        }
    }

    // Grid lines
    let (x, y, w, h) = to_points(rect);
    ops.push(Operation::new("RG", vec![0.75f32.into(), 0.75f32.into(), 0.75f32.into()]));
    ops.push(Operation::new("w", vec![0.5f32.into()]));
    ops.push(Operation::new(
        "re",
        vec![x.into(), y.into(), w.into(), h.into()],
    ));
    let row_pt = row_height * PAGE_HEIGHT_PT;
    let row_lines = (h / row_pt).round() as usize;
    for i in 1..row_lines {
        let ly = y + h - i as f32 * row_pt;
        ops.push(Operation::new("m", vec![x.into(), ly.into()]));
        ops.push(Operation::new("l", vec![(x + w).into(), ly.into()]));
    }
    for c in 1..col_count {
        let lx = x + c as f32 * w / col_count as f32;
        ops.push(Operation::new("m", vec![lx.into(), y.into()]));
        ops.push(Operation::new("l", vec![lx.into(), (y + h).into()]));
    }
    ops.push(Operation::new("S", vec![]));
}

fn cell_style(size: f32, bold: bool, color: Color) -> TextStyle {
    TextStyle {
        size,
        bold,
        color,
        align: Align::Left,
        valign: VAlign::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportConfig;
    use crate::extract::Table;
    use crate::report::tests::{job_with, sample_group};
    use crate::report::{build_pdf, SectionKind};

    fn all_text(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&numbers).unwrap()
    }

    #[test]
    fn test_missing_spreadsheet_keeps_section_order() {
        let job = job_with(
            vec![
                sample_group(SectionKind::Drawings, "CAD Drawings", 5),
                sample_group(SectionKind::Models, "Model 1", 4),
            ],
            None,
        );
        let bytes = build_pdf(&job, &ReportConfig::default()).unwrap();
        let text = all_text(&bytes);

        assert!(!text.contains("Design Input Sheet"));
        let cad = text.find("1. CAD Drawings (Page 1/2)").unwrap();
        let cad2 = text.find("1. CAD Drawings (Page 2/2)").unwrap();
        let model = text.find("2. Model 1 (Page 1/1)").unwrap();
        assert!(cad < cad2 && cad2 < model);
    }

    #[test]
    fn test_table_page_text() {
        let job = job_with(
            vec![],
            Some(Table {
                columns: vec!["Part".to_string(), "Material".to_string()],
                rows: vec![vec!["Shaft".to_string(), "42CrMo4".to_string()]],
            }),
        );
        let bytes = build_pdf(&job, &ReportConfig::default()).unwrap();
        let text = all_text(&bytes);
        assert!(text.contains("1. Design Input Sheet (Page 1/1)"));
        assert!(text.contains("42CrMo4"));
        assert!(text.contains("Gearbox Housing"));
    }

    #[test]
    fn test_page_size_is_widescreen() {
        let job = job_with(vec![], None);
        let bytes = build_pdf(&job, &ReportConfig::default()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
        let media_box = doc
            .get_dictionary(parent)
            .unwrap()
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), PAGE_WIDTH_PT);
        assert_eq!(media_box[3].as_float().unwrap(), PAGE_HEIGHT_PT);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 0]));
        let stream = jpeg_xobject(&image).unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        let decoded = image::load_from_memory(&stream.content).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p[0] > 240));
    }
}
