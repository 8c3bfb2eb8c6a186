//! PPTX renderer.
//!
//! Writes a minimal PresentationML package: one master, one blank layout, one
//! theme, a slide per planned page and a PNG per arena image. Every zip entry
//! carries the same fixed timestamp so output is reproducible.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::layout::{Color, Rect};
use super::plan::{Align, Element, PlannedPage, ReportPlan, TextStyle, VAlign, CELL_PADDING_PT};
use super::text::xml_escape;

/// 13.333 in × 7.5 in in EMU.
pub const SLIDE_WIDTH_EMU: i64 = 12_192_000;
pub const SLIDE_HEIGHT_EMU: i64 = 6_858_000;
/// EMU per point.
const EMU_PER_PT: f32 = 12_700.0;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Renders a plan to PPTX bytes.
pub fn render(plan: &ReportPlan) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    let mut put = |name: &str, body: &[u8]| -> Result<()> {
        zip.start_file(name, options)
            .with_context(|| format!("Failed to add {}", name))?;
        zip.write_all(body)?;
        Ok(())
    };

    let slide_count = plan.pages.len();
    put("[Content_Types].xml", content_types(slide_count).as_bytes())?;
    put("_rels/.rels", root_rels().as_bytes())?;
    put("ppt/presentation.xml", presentation(slide_count).as_bytes())?;
    put("ppt/_rels/presentation.xml.rels", presentation_rels(slide_count).as_bytes())?;
    put("ppt/slideMasters/slideMaster1.xml", slide_master().as_bytes())?;
    put(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        relationships(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml".to_string()),
            ("rId2", "theme", "../theme/theme1.xml".to_string()),
        ])
        .as_bytes(),
    )?;
    put("ppt/slideLayouts/slideLayout1.xml", slide_layout().as_bytes())?;
    put(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        relationships(&[(
            "rId1",
            "slideMaster",
            "../slideMasters/slideMaster1.xml".to_string(),
        )])
        .as_bytes(),
    )?;
    put("ppt/theme/theme1.xml", theme().as_bytes())?;

    for (i, page) in plan.pages.iter().enumerate() {
        let (xml, images) = slide(page);
        put(&format!("ppt/slides/slide{}.xml", i + 1), xml.as_bytes())?;

        let mut rels = vec![(
            "rId1".to_string(),
            "slideLayout",
            "../slideLayouts/slideLayout1.xml".to_string(),
        )];
        for (image, rid) in &images {
            rels.push((rid.clone(), "image", format!("../media/image{}.png", image + 1)));
        }
        let rels: Vec<(&str, &str, String)> = rels
            .iter()
            .map(|(id, kind, target)| (id.as_str(), *kind, target.clone()))
            .collect();
        put(
            &format!("ppt/slides/_rels/slide{}.xml.rels", i + 1),
            relationships(&rels).as_bytes(),
        )?;
    }

    for (i, image) in plan.images.iter().enumerate() {
        put(&format!("ppt/media/image{}.png", i + 1), &encode_png(image)?)?;
    }

    let cursor = zip.finish().context("Failed to finish PPTX archive")?;
    Ok(cursor.into_inner())
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buf.into_inner())
}

fn emu_x(fraction: f32) -> i64 {
    (fraction * SLIDE_WIDTH_EMU as f32).round() as i64
}

fn emu_y(fraction: f32) -> i64 {
    (fraction * SLIDE_HEIGHT_EMU as f32).round() as i64
}

fn xfrm(rect: &Rect) -> String {
    format!(
        r#"<a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/>"#,
        emu_x(rect.x),
        emu_y(rect.y),
        emu_x(rect.w),
        emu_y(rect.h)
    )
}

fn solid_fill(color: Color) -> String {
    format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color.hex())
}

fn relationships(rels: &[(&str, &str, String)]) -> String {
    let mut xml = format!(r#"{}<Relationships xmlns="{}">"#, XML_DECL, REL_NS);
    for (id, kind, target) in rels {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_TYPE, kind, target
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn content_types(slides: usize) -> String {
    let mut xml = format!(
        concat!(
            r#"{}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Default Extension="png" ContentType="image/png"/>"#,
            r#"<Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
            r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/>"#,
            r#"<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/>"#,
            r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
        ),
        XML_DECL
    );
    for i in 1..=slides {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
            i
        );
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels() -> String {
    relationships(&[("rId1", "officeDocument", "ppt/presentation.xml".to_string())])
}

fn presentation(slides: usize) -> String {
    let mut ids = String::new();
    for i in 0..slides {
        let _ = write!(ids, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 3);
    }
    format!(
        concat!(
            r#"{}<p:presentation {} saveSubsetFonts="1">"#,
            r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
            r#"<p:sldIdLst>{}</p:sldIdLst>"#,
            r#"<p:sldSz cx="{}" cy="{}"/>"#,
            r#"<p:notesSz cx="6858000" cy="9144000"/>"#,
            r#"</p:presentation>"#,
        ),
        XML_DECL, NS, ids, SLIDE_WIDTH_EMU, SLIDE_HEIGHT_EMU
    )
}

fn presentation_rels(slides: usize) -> String {
    let mut rels = vec![
        ("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string()),
        ("rId2".to_string(), "theme", "theme/theme1.xml".to_string()),
    ];
    for i in 0..slides {
        rels.push((format!("rId{}", i + 3), "slide", format!("slides/slide{}.xml", i + 1)));
    }
    let rels: Vec<(&str, &str, String)> = rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.clone()))
        .collect();
    relationships(&rels)
}

const EMPTY_TREE: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
);

fn slide_master() -> String {
    format!(
        concat!(
            r#"{}<p:sldMaster {}>"#,
            r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{}</p:spTree></p:cSld>"#,
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
            r#"<p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles>"#,
            r#"</p:sldMaster>"#,
        ),
        XML_DECL, NS, EMPTY_TREE
    )
}

fn slide_layout() -> String {
    format!(
        concat!(
            r#"{}<p:sldLayout {} type="blank" preserve="1">"#,
            r#"<p:cSld name="Blank"><p:spTree>{}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#,
            r#"</p:sldLayout>"#,
        ),
        XML_DECL, NS, EMPTY_TREE
    )
}

fn theme() -> String {
    let scheme = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "1F2937"),
        ("lt2", "F2F2F2"),
        ("accent1", "1F4E79"),
        ("accent2", "2E75B6"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ];
    let mut colors = String::new();
    for (name, hex) in scheme {
        let _ = write!(colors, r#"<a:{0}><a:srgbClr val="{1}"/></a:{0}>"#, name, hex);
    }
    let font = r#"<a:latin typeface="Arial"/><a:ea typeface=""/><a:cs typeface=""/>"#;
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = format!(r#"<a:ln w="9525">{}</a:ln>"#, fill);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";

    format!(
        concat!(
            r#"{}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Report">"#,
            r#"<a:themeElements>"#,
            r#"<a:clrScheme name="Report">{}</a:clrScheme>"#,
            r#"<a:fontScheme name="Report"><a:majorFont>{}</a:majorFont><a:minorFont>{}</a:minorFont></a:fontScheme>"#,
            r#"<a:fmtScheme name="Report">"#,
            r#"<a:fillStyleLst>{}</a:fillStyleLst>"#,
            r#"<a:lnStyleLst>{}</a:lnStyleLst>"#,
            r#"<a:effectStyleLst>{}</a:effectStyleLst>"#,
            r#"<a:bgFillStyleLst>{}</a:bgFillStyleLst>"#,
            r#"</a:fmtScheme>"#,
            r#"</a:themeElements>"#,
            r#"</a:theme>"#,
        ),
        XML_DECL,
        colors,
        font,
        font,
        fill.repeat(3),
        line.repeat(3),
        effect.repeat(3),
        fill.repeat(3),
    )
}

/// Builds one slide. Returns the XML and the arena images it references,
/// mapped to their relationship ids.
fn slide(page: &PlannedPage) -> (String, BTreeMap<usize, String>) {
    let mut images: BTreeMap<usize, String> = BTreeMap::new();
    let mut shapes = String::new();
    let mut next_id = 2u32;

    for element in &page.elements {
        let id = next_id;
        next_id += 1;
        match element {
            Element::Fill { rect, color } => {
                let _ = write!(
                    shapes,
                    concat!(
                        r#"<p:sp><p:nvSpPr><p:cNvPr id="{0}" name="Rectangle {0}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
                        r#"<p:spPr><a:xfrm>{1}</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{2}<a:ln><a:noFill/></a:ln></p:spPr>"#,
                        r#"</p:sp>"#,
                    ),
                    id,
                    xfrm(rect),
                    solid_fill(*color)
                );
            }
            Element::Text { rect, text, style } => {
                shapes.push_str(&text_box(id, rect, text, style));
            }
            Element::Image { rect, image } => {
                let next_rid = format!("rId{}", images.len() + 2);
                let rid = images.entry(*image).or_insert(next_rid).clone();
                let _ = write!(
                    shapes,
                    concat!(
                        r#"<p:pic><p:nvPicPr><p:cNvPr id="{0}" name="Picture {0}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
                        r#"<p:blipFill><a:blip r:embed="{1}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                        r#"<p:spPr><a:xfrm>{2}</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#,
                        r#"</p:pic>"#,
                    ),
                    id,
                    rid,
                    xfrm(rect)
                );
            }
            Element::Table {
                rect,
                columns,
                rows,
                row_height,
                font_size,
                header,
            } => {
                shapes.push_str(&table(id, rect, columns, rows, *row_height, *font_size, *header));
            }
        }
    }

    let xml = format!(
        concat!(
            r#"{}<p:sld {}><p:cSld><p:spTree>{}{}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        ),
        XML_DECL, NS, EMPTY_TREE, shapes
    );
    (xml, images)
}

fn run_properties(style: &TextStyle) -> String {
    format!(
        r#"<a:rPr lang="en-US" sz="{}" b="{}" dirty="0">{}<a:latin typeface="Arial"/></a:rPr>"#,
        font_size(style.size),
        if style.bold { 1 } else { 0 },
        solid_fill(style.color)
    )
}

fn font_size(points: f32) -> u32 {
    ((points * 100.0).round() as u32).clamp(100, 400_000)
}

fn paragraphs(text: &str, style: &TextStyle) -> String {
    let algn = match style.align {
        Align::Left => "l",
        Align::Center => "ctr",
        Align::Right => "r",
    };
    let mut xml = String::new();
    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            let _ = write!(
                xml,
                r#"<a:p><a:pPr algn="{}"/><a:endParaRPr lang="en-US" sz="{}" dirty="0"/></a:p>"#,
                algn,
                font_size(style.size)
            );
        } else {
            let _ = write!(
                xml,
                r#"<a:p><a:pPr algn="{}"/><a:r>{}<a:t>{}</a:t></a:r></a:p>"#,
                algn,
                run_properties(style),
                xml_escape(paragraph)
            );
        }
    }
    xml
}

fn text_box(id: u32, rect: &Rect, text: &str, style: &TextStyle) -> String {
    let anchor = match style.valign {
        VAlign::Top => "t",
        VAlign::Middle => "ctr",
    };
    format!(
        concat!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{0}" name="TextBox {0}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm>{1}</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#,
            r#"<p:txBody><a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" anchor="{2}"><a:normAutofit/></a:bodyPr><a:lstStyle/>{3}</p:txBody>"#,
            r#"</p:sp>"#,
        ),
        id,
        xfrm(rect),
        anchor,
        paragraphs(text, style)
    )
}

fn table(
    id: u32,
    rect: &Rect,
    columns: &[String],
    rows: &[Vec<String>],
    row_height: f32,
    font_size_pt: f32,
    header: Color,
) -> String {
    let col_count = columns.len().max(1);
    let total_w = emu_x(rect.w);
    let col_w = total_w / col_count as i64;
    let row_h = emu_y(row_height);
    let margin = (CELL_PADDING_PT * EMU_PER_PT).round() as i64;

    let mut grid = String::new();
    for c in 0..col_count {
        // Last column absorbs rounding so the grid matches the frame width
        let w = if c + 1 == col_count {
            total_w - col_w * (col_count as i64 - 1)
        } else {
            col_w
        };
        let _ = write!(grid, r#"<a:gridCol w="{}"/>"#, w);
    }

    let mut body = String::new();
    let all_rows = std::iter::once(columns).chain(rows.iter().map(|r| r.as_slice()));
    for (r, cells) in all_rows.enumerate() {
        let (fill, style) = if r == 0 {
            (Some(header), cell_style(font_size_pt, true, Color::WHITE))
        } else if r % 2 == 0 {
            (Some(Color::STRIPE), cell_style(font_size_pt, false, Color::TEXT))
        } else {
            (None, cell_style(font_size_pt, false, Color::TEXT))
        };
        let fill = fill.map(solid_fill).unwrap_or_else(|| "<a:noFill/>".to_string());

        let _ = write!(body, r#"<a:tr h="{}">"#, row_h);
        for c in 0..col_count {
            let value = cells.get(c).map(String::as_str).unwrap_or("");
            let _ = write!(
                body,
                concat!(
                    r#"<a:tc><a:txBody><a:bodyPr/><a:lstStyle/>{}</a:txBody>"#,
                    r#"<a:tcPr marL="{}" marR="{}" marT="0" marB="0" anchor="ctr">{}</a:tcPr></a:tc>"#,
                ),
                paragraphs(value, &style),
                margin,
                margin,
                fill
            );
        }
        body.push_str("</a:tr>");
    }

    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{0}" name="Table {0}"/><p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr><p:nvPr/></p:nvGraphicFramePr>"#,
            r#"<p:xfrm>{1}</p:xfrm>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
            r#"<a:tbl><a:tblPr firstRow="1" bandRow="1"/><a:tblGrid>{2}</a:tblGrid>{3}</a:tbl>"#,
            r#"</a:graphicData></a:graphic></p:graphicFrame>"#,
        ),
        id,
        xfrm(rect),
        grid,
        body
    )
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
