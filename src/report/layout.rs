//! Page geometry shared by both renderers.
//!
//! Everything is expressed as fractions of a 16:9 page with the origin at the
//! top-left corner. The PDF renderer scales to points, the PPTX renderer to EMU.

/// Page width in points (13.333 in).
pub const PAGE_WIDTH_PT: f32 = 960.0;
/// Page height in points (7.5 in).
pub const PAGE_HEIGHT_PT: f32 = 540.0;
/// Width over height.
pub const PAGE_ASPECT: f32 = PAGE_WIDTH_PT / PAGE_HEIGHT_PT;

/// Title banner across the top of the page.
pub const BANNER: Rect = Rect::new(0.0, 0.0, 1.0, 0.11);
/// Banner title text, inset from the banner edges.
pub const BANNER_TEXT: Rect = Rect::new(0.03, 0.0, 0.94, 0.11);
/// Main content area between banner and footer.
pub const CONTENT: Rect = Rect::new(0.05, 0.15, 0.90, 0.71);
/// Logo slot, bottom-left.
pub const LOGO: Rect = Rect::new(0.015, 0.88, 0.12, 0.10);
/// Page counter, bottom-right.
pub const PAGE_NUMBER: Rect = Rect::new(0.80, 0.91, 0.18, 0.05);

/// Gap between grid cells.
const GRID_GAP: f32 = 0.02;
/// Share of a grid cell reserved for its label.
const LABEL_HEIGHT: f32 = 0.045;

/// A rectangle in page fractions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Splits off the top `h` of the rectangle.
    pub fn split_top(&self, h: f32) -> (Rect, Rect) {
        let h = h.min(self.h);
        (
            Rect::new(self.x, self.y, self.w, h),
            Rect::new(self.x, self.y + h, self.w, self.h - h),
        )
    }

    /// Largest rectangle with the image's aspect ratio that fits inside,
    /// centered.
    pub fn fit(&self, image_width: u32, image_height: u32) -> Rect {
        if image_width == 0 || image_height == 0 {
            return *self;
        }
        let image_aspect = image_width as f32 / image_height as f32;
        // Aspect of this rect measured in page units
        let slot_aspect = self.w / self.h * PAGE_ASPECT;
        if image_aspect > slot_aspect {
            let h = self.w * PAGE_ASPECT / image_aspect;
            Rect::new(self.x, self.y + (self.h - h) / 2.0, self.w, h)
        } else {
            let w = self.h * image_aspect / PAGE_ASPECT;
            Rect::new(self.x + (self.w - w) / 2.0, self.y, w, self.h)
        }
    }
}

/// An image cell of a grid: where the picture goes and where its label goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    pub image: Rect,
    pub label: Rect,
}

/// Cells of a `cols` × `rows` grid filling `area`, in reading order.
pub fn grid(area: Rect, cols: usize, rows: usize) -> Vec<GridCell> {
    let cols = cols.max(1);
    let rows = rows.max(1);
    let cell_w = (area.w - GRID_GAP * (cols - 1) as f32) / cols as f32;
    let cell_h = (area.h - GRID_GAP * (rows - 1) as f32) / rows as f32;

    let mut cells = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            let cell = Rect::new(
                area.x + c as f32 * (cell_w + GRID_GAP),
                area.y + r as f32 * (cell_h + GRID_GAP),
                cell_w,
                cell_h,
            );
            let (image, label) = cell.split_top(cell_h - LABEL_HEIGHT);
            cells.push(GridCell { image, label });
        }
    }
    cells
}

/// RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(0xFF, 0xFF, 0xFF);
    pub const TEXT: Color = Color(0x26, 0x26, 0x26);
    pub const MUTED: Color = Color(0x6E, 0x6E, 0x6E);
    pub const STRIPE: Color = Color(0xF2, 0xF2, 0xF2);

    /// `RRGGBB` as used by DrawingML.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    /// Components in 0.0..=1.0 as used by PDF colour operators.
    pub fn unit(&self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_fit_preserves_aspect_ratio() {
        let slot = Rect::new(0.1, 0.1, 0.4, 0.4);
        for (w, h) in [(1920u32, 1080u32), (500, 1000), (300, 300)] {
            let r = slot.fit(w, h);
            let placed_aspect = (r.w * PAGE_WIDTH_PT) / (r.h * PAGE_HEIGHT_PT);
            assert!(close(placed_aspect, w as f32 / h as f32), "{}x{}", w, h);
            assert!(r.x >= slot.x - 1e-6 && r.bottom() <= slot.bottom() + 1e-6);
        }
    }

    #[test]
    fn test_fit_centers() {
        let slot = Rect::new(0.0, 0.0, 1.0, 1.0);
        // Square image on a 16:9 page is pillarboxed
        let r = slot.fit(100, 100);
        assert!(close(r.h, 1.0));
        assert!(close(r.x, (1.0 - r.w) / 2.0));
    }

    #[test]
    fn test_grid_two_by_two() {
        let cells = grid(CONTENT, 2, 2);
        assert_eq!(cells.len(), 4);
        assert!(cells[0].image.x < cells[1].image.x);
        assert!(close(cells[0].image.y, cells[1].image.y));
        assert!(cells[2].image.y > cells[0].label.bottom() - 1e-6);
        assert!(cells[3].label.bottom() <= CONTENT.bottom() + 1e-6);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color(0x1F, 0x4E, 0x79).hex(), "1F4E79");
    }
}
