//! Screen-space value types shared by the positioning code.
//!
//! Rectangles are in physical pixels with exclusive right/bottom edges, the
//! same convention as a Win32 `RECT`. Points handed back to the windowing
//! layer are logical (DPI-independent) units.

/// An axis-aligned rectangle in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenRect {
    /// Builds a rectangle from its edges. Inverted edges are swapped so that
    /// `right >= left` and `bottom >= top` always hold.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn from_size(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(left, top, left + width.max(0), top + height.max(0))
    }

    /// A 1x1 rectangle covering a single pixel.
    pub fn point(x: i32, y: i32) -> Self {
        Self::from_size(x, y, 1, 1)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Icon rectangles reported by the shell can collapse to zero size; those
    /// are widened to a single pixel at the same origin.
    pub fn non_degenerate(self) -> Self {
        Self {
            right: self.right.max(self.left + 1),
            bottom: self.bottom.max(self.top + 1),
            ..self
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.left as f64 + self.width() as f64 / 2.0,
            self.top as f64 + self.height() as f64 / 2.0,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Area shared with `other`, zero when they do not intersect.
    pub fn overlap_area(&self, other: &ScreenRect) -> i64 {
        let w = self.right.min(other.right) - self.left.max(other.left);
        let h = self.bottom.min(other.bottom) - self.top.max(other.top);
        if w <= 0 || h <= 0 {
            return 0;
        }
        w as i64 * h as i64
    }

    /// Squared length of the shortest gap between the two rectangles.
    pub fn distance_sq(&self, other: &ScreenRect) -> i64 {
        let dx = (other.left - self.right).max(self.left - other.right).max(0) as i64;
        let dy = (other.top - self.bottom).max(self.top - other.bottom).max(0) as i64;
        dx * dx + dy * dy
    }
}

/// Ratio of physical to logical pixels on each axis. 1.0 is 96 DPI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpiScale {
    pub x: f64,
    pub y: f64,
}

impl DpiScale {
    pub const IDENTITY: DpiScale = DpiScale { x: 1.0, y: 1.0 };

    /// Non-positive or non-finite factors fall back to 1.0.
    pub fn new(x: f64, y: f64) -> Self {
        let sane = |v: f64| if v.is_finite() && v > 0.0 { v } else { 1.0 };
        Self { x: sane(x), y: sane(y) }
    }

    pub fn uniform(scale: f64) -> Self {
        Self::new(scale, scale)
    }

    /// Converts a raw DPI value (96, 120, 144, ...) into a scale.
    pub fn from_dpi(dpi: u32) -> Self {
        Self::uniform(dpi as f64 / 96.0)
    }
}

impl Default for DpiScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A point in logical units, ready to hand to the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogicalPoint {
    pub x: f64,
    pub y: f64,
}
