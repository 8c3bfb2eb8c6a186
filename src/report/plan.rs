//! Report planning: which pages exist, in which order, and what is on them.
//!
//! The plan is renderer independent. Each page is a list of positioned
//! elements in page fractions; images live in a shared arena so each picture
//! is encoded once per output file.

use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, RgbaImage};

use super::layout::{self, Color, Rect, CONTENT, LOGO, PAGE_NUMBER, PAGE_WIDTH_PT};
use super::text::{chunk_words, truncate};
use super::{ImageGroup, ReportJob, SectionKind};
use crate::capture::{center_zoom, vertical_strip, CapturedImage};
use crate::config::ReportConfig;

pub const BRIEF_SECTION: &str = "Project Brief Details";
pub const TABLE_SECTION: &str = "Design Input Sheet";
pub const DRAWINGS_SECTION: &str = "CAD Drawings";
pub const MODELS_SECTION: &str = "3D Model Views";

/// Images per grid page (2 × 2).
pub const IMAGES_PER_GRID: usize = 4;
/// Longest side of an embedded picture in pixels.
const MAX_IMAGE_SIDE: u32 = 1600;
/// Internal horizontal padding of table cells in points.
pub const CELL_PADDING_PT: f32 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStyle {
    /// Font size in points
    pub size: f32,
    pub bold: bool,
    pub color: Color,
    pub align: Align,
    pub valign: VAlign,
}

impl TextStyle {
    fn body(size: f32) -> Self {
        Self {
            size,
            bold: false,
            color: Color::TEXT,
            align: Align::Left,
            valign: VAlign::Top,
        }
    }

    fn centered(size: f32, bold: bool, color: Color) -> Self {
        Self {
            size,
            bold,
            color,
            align: Align::Center,
            valign: VAlign::Middle,
        }
    }
}

/// A positioned drawing instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Fill {
        rect: Rect,
        color: Color,
    },
    /// Text box; `\n` separates paragraphs. Renderers wrap inside `rect`.
    Text {
        rect: Rect,
        text: String,
        style: TextStyle,
    },
    /// Picture from the plan's image arena, already fitted to its aspect ratio.
    Image {
        rect: Rect,
        image: usize,
    },
    Table {
        rect: Rect,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        /// Height of every row, header included, in page fractions
        row_height: f32,
        font_size: f32,
        header: Color,
    },
}

/// What a page is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    Outline,
    Backdrop,
    Text,
    Table,
    Grid { section: SectionKind, images: usize },
    CloseUp,
    Closing,
}

#[derive(Clone, Debug)]
pub struct PlannedPage {
    pub kind: PageKind,
    /// Banner title; `None` for backdrops
    pub title: Option<String>,
    pub elements: Vec<Element>,
}

/// The complete, ordered page list plus the pictures it references.
#[derive(Debug)]
pub struct ReportPlan {
    pub pages: Vec<PlannedPage>,
    pub images: Vec<RgbaImage>,
}

impl ReportPlan {
    pub fn titles(&self) -> Vec<&str> {
        self.pages
            .iter()
            .filter_map(|p| p.title.as_deref())
            .collect()
    }
}

struct Builder {
    pages: Vec<PlannedPage>,
    images: Vec<RgbaImage>,
}

impl Builder {
    fn add_image(&mut self, image: RgbaImage) -> usize {
        self.images.push(downscale(image));
        self.images.len() - 1
    }

    /// Fitted picture element for an arena image.
    fn picture(&self, image: usize, slot: Rect) -> Element {
        let (w, h) = self.images[image].dimensions();
        Element::Image {
            rect: slot.fit(w, h),
            image,
        }
    }

    fn page(&mut self, kind: PageKind, title: Option<String>, elements: Vec<Element>) {
        self.pages.push(PlannedPage {
            kind,
            title,
            elements,
        });
    }
}

fn downscale(image: RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= MAX_IMAGE_SIDE {
        return image;
    }
    let scale = MAX_IMAGE_SIDE as f32 / longest as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    imageops::resize(&image, nw, nh, FilterType::Triangle)
}

/// Sections present in a job, in their fixed order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Brief,
    Table,
    Drawings,
    Models,
}

impl Section {
    fn name(&self) -> &'static str {
        match self {
            Section::Brief => BRIEF_SECTION,
            Section::Table => TABLE_SECTION,
            Section::Drawings => DRAWINGS_SECTION,
            Section::Models => MODELS_SECTION,
        }
    }
}

fn groups_of(job: &ReportJob, kind: SectionKind) -> impl Iterator<Item = &ImageGroup> {
    job.groups
        .iter()
        .filter(move |g| g.kind == kind && !g.images.is_empty())
}

fn present_sections(job: &ReportJob) -> Vec<Section> {
    let mut sections = Vec::new();
    if job
        .brief_pages
        .iter()
        .flat_map(|doc| doc.pages.iter())
        .any(|page| !page.trim().is_empty())
    {
        sections.push(Section::Brief);
    }
    if job.table.as_ref().is_some_and(|t| !t.is_empty()) {
        sections.push(Section::Table);
    }
    if groups_of(job, SectionKind::Drawings).next().is_some() {
        sections.push(Section::Drawings);
    }
    if groups_of(job, SectionKind::Models).next().is_some() {
        sections.push(Section::Models);
    }
    sections
}

/// Lays out the whole report.
pub fn plan_report(job: &ReportJob, settings: &ReportConfig) -> Result<ReportPlan> {
    let mut b = Builder {
        pages: Vec::new(),
        images: Vec::new(),
    };
    let accent = job.branding.accent;
    let logo = b.add_image(job.branding.logo.clone());
    let sections = present_sections(job);

    cover_page(&mut b, job);

    let outline: Vec<String> = sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.name()))
        .collect();
    b.page(
        PageKind::Outline,
        Some("Outline".to_string()),
        vec![Element::Text {
            rect: CONTENT,
            text: outline.join("\n\n"),
            style: TextStyle::body(22.0),
        }],
    );

    for backdrop in &job.branding.preamble {
        let image = b.add_image(backdrop.clone());
        let element = b.picture(image, Rect::new(0.0, 0.0, 1.0, 1.0));
        b.page(PageKind::Backdrop, None, vec![element]);
    }

    for (index, section) in sections.iter().enumerate() {
        let number = index + 1;
        match section {
            Section::Brief => brief_pages(&mut b, job, number, settings),
            Section::Table => {
                if let Some(table) = &job.table {
                    table_pages(&mut b, table, number, settings, accent);
                }
            }
            Section::Drawings => {
                for group in groups_of(job, SectionKind::Drawings) {
                    grid_pages(&mut b, group, number)?;
                }
            }
            Section::Models => {
                for group in groups_of(job, SectionKind::Models) {
                    grid_pages(&mut b, group, number)?;
                }
                if let Some(group) = groups_of(job, SectionKind::Models).find(|g| g.images.len() >= 3) {
                    close_up_page(&mut b, group, number, settings)?;
                }
            }
        }
    }

    closing_page(&mut b, job);

    // Banner, logo and page counter go on every page
    let total = b.pages.len();
    let mut pages = std::mem::take(&mut b.pages);
    for (i, page) in pages.iter_mut().enumerate() {
        let mut elements = Vec::with_capacity(page.elements.len() + 4);
        if let Some(title) = &page.title {
            elements.push(Element::Fill {
                rect: layout::BANNER,
                color: accent,
            });
            elements.push(Element::Text {
                rect: layout::BANNER_TEXT,
                text: title.clone(),
                style: TextStyle {
                    size: 22.0,
                    bold: true,
                    color: Color::WHITE,
                    align: Align::Left,
                    valign: VAlign::Middle,
                },
            });
        }
        elements.append(&mut page.elements);
        elements.push(b.picture(logo, LOGO));
        elements.push(Element::Text {
            rect: PAGE_NUMBER,
            text: format!("{} / {}", i + 1, total),
            style: TextStyle {
                size: 11.0,
                bold: false,
                color: Color::MUTED,
                align: Align::Right,
                valign: VAlign::Middle,
            },
        });
        page.elements = elements;
    }

    Ok(ReportPlan {
        pages,
        images: b.images,
    })
}

fn cover_page(b: &mut Builder, job: &ReportJob) {
    let mut elements = Vec::new();
    let (title_rect, date_rect) = match &job.branding.cover {
        Some(cover) => {
            let image = b.add_image(cover.clone());
            elements.push(b.picture(image, Rect::new(0.05, 0.15, 0.90, 0.46)));
            (Rect::new(0.05, 0.63, 0.90, 0.10), Rect::new(0.05, 0.74, 0.90, 0.06))
        }
        None => (Rect::new(0.05, 0.36, 0.90, 0.12), Rect::new(0.05, 0.50, 0.90, 0.06)),
    };
    elements.push(Element::Text {
        rect: title_rect,
        text: job.title.clone(),
        style: TextStyle::centered(34.0, true, Color::TEXT),
    });
    if !job.date.is_empty() {
        elements.push(Element::Text {
            rect: date_rect,
            text: job.date.clone(),
            style: TextStyle::centered(16.0, false, Color::MUTED),
        });
    }
    b.page(
        PageKind::Cover,
        Some(job.branding.company_name.clone()),
        elements,
    );
}

fn brief_pages(b: &mut Builder, job: &ReportJob, number: usize, settings: &ReportConfig) {
    // Pages are numbered per document; the file name tells documents apart
    let several = job.brief_pages.len() > 1;
    for doc in &job.brief_pages {
        let source = match doc.source.file_stem() {
            Some(stem) if several => format!("{} ", stem.to_string_lossy()),
            _ => String::new(),
        };
        for (page_index, page_text) in doc.pages.iter().enumerate() {
            let chunks = chunk_words(page_text, settings.words_per_page);
            let parts = chunks.len();
            for (part, chunk) in chunks.into_iter().enumerate() {
                let title = format!(
                    "{}. {} - {}Page {} (Part {}/{})",
                    number,
                    BRIEF_SECTION,
                    source,
                    page_index + 1,
                    part + 1,
                    parts
                );
                b.page(
                    PageKind::Text,
                    Some(title),
                    vec![Element::Text {
                        rect: CONTENT,
                        text: chunk,
                        style: TextStyle::body(16.0),
                    }],
                );
            }
        }
    }
}

fn table_pages(
    b: &mut Builder,
    table: &crate::extract::Table,
    number: usize,
    settings: &ReportConfig,
    accent: Color,
) {
    let per_page = settings.rows_per_page.max(1);
    let page_count = table.rows.len().div_ceil(per_page);
    let columns = table.columns.len().max(1);
    let font_size = if columns > 8 { 8.0 } else { 10.0 };
    let row_height = (CONTENT.h / (per_page + 1) as f32).min(0.06);
    let cell_width_pt = CONTENT.w * PAGE_WIDTH_PT / columns as f32 - 2.0 * CELL_PADDING_PT;
    let fit = |s: &String, bold: bool| truncate(s, cell_width_pt, font_size, bold);

    for (i, rows) in table.rows.chunks(per_page).enumerate() {
        let title = format!(
            "{}. {} (Page {}/{})",
            number,
            TABLE_SECTION,
            i + 1,
            page_count
        );
        let rect = Rect::new(
            CONTENT.x,
            CONTENT.y,
            CONTENT.w,
            row_height * (rows.len() + 1) as f32,
        );
        b.page(
            PageKind::Table,
            Some(title),
            vec![Element::Table {
                rect,
                columns: table.columns.iter().map(|c| fit(c, true)).collect(),
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|v| fit(v, false)).collect())
                    .collect(),
                row_height,
                font_size,
                header: accent,
            }],
        );
    }
}

fn grid_pages(b: &mut Builder, group: &ImageGroup, number: usize) -> Result<()> {
    let cells = layout::grid(CONTENT, 2, 2);
    let page_count = group.images.len().div_ceil(IMAGES_PER_GRID);
    for (i, chunk) in group.images.chunks(IMAGES_PER_GRID).enumerate() {
        let mut elements = Vec::new();
        for (captured, cell) in chunk.iter().zip(cells.iter()) {
            let view = captured
                .view()
                .with_context(|| format!("Invalid crop on image \"{}\"", captured.label))?;
            let image = b.add_image(view);
            elements.push(b.picture(image, cell.image));
            elements.push(Element::Text {
                rect: cell.label,
                text: captured.label.clone(),
                style: TextStyle::centered(12.0, false, Color::TEXT),
            });
        }
        let title = format!(
            "{}. {} (Page {}/{})",
            number,
            group.title,
            i + 1,
            page_count
        );
        b.page(
            PageKind::Grid {
                section: group.kind,
                images: chunk.len(),
            },
            Some(title),
            elements,
        );
    }
    Ok(())
}

/// Picks the image whose label matches `label`, else the one at `fallback`.
fn view_by_label<'a>(group: &'a ImageGroup, label: &str, fallback: usize) -> &'a CapturedImage {
    group
        .images
        .iter()
        .find(|i| i.label.eq_ignore_ascii_case(label))
        .unwrap_or(&group.images[fallback.min(group.images.len() - 1)])
}

fn close_up_page(
    b: &mut Builder,
    group: &ImageGroup,
    number: usize,
    settings: &ReportConfig,
) -> Result<()> {
    let front = view_by_label(group, "Front", 1);
    let iso = view_by_label(group, "Isometric", 2);
    let front_detail = vertical_strip(&front.view()?, settings.front_strip);
    let iso_detail = center_zoom(&iso.view()?, settings.isometric_zoom);

    let cells = layout::grid(CONTENT, 2, 1);
    let mut elements = Vec::new();
    for ((image, label), cell) in [
        (front_detail, format!("{} view (detail)", front.label)),
        (
            iso_detail,
            format!("{} view (zoom x{})", iso.label, settings.isometric_zoom),
        ),
    ]
    .into_iter()
    .zip(cells.iter())
    {
        let image = b.add_image(image);
        elements.push(b.picture(image, cell.image));
        elements.push(Element::Text {
            rect: cell.label,
            text: label,
            style: TextStyle::centered(12.0, false, Color::TEXT),
        });
    }
    b.page(
        PageKind::CloseUp,
        Some(format!("{}. {} - Close-up", number, MODELS_SECTION)),
        elements,
    );
    Ok(())
}

fn closing_page(b: &mut Builder, job: &ReportJob) {
    let mut elements = vec![
        Element::Text {
            rect: Rect::new(0.05, 0.28, 0.90, 0.12),
            text: "Thank you".to_string(),
            style: TextStyle::centered(36.0, true, Color::TEXT),
        },
        Element::Text {
            rect: Rect::new(0.05, 0.41, 0.90, 0.07),
            text: job.branding.company_name.clone(),
            style: TextStyle::centered(18.0, false, Color::MUTED),
        },
    ];
    if let Some(closing) = &job.branding.closing {
        let image = b.add_image(closing.clone());
        elements.push(b.picture(image, Rect::new(0.30, 0.50, 0.40, 0.34)));
    }
    b.page(PageKind::Closing, Some(job.title.clone()), elements);
}
