// ABOUTME: Screen-space points and rectangles plus the per-display metrics the panel is anchored to
// ABOUTME: Coordinates follow AppKit's bottom-left origin; platforms with a top-left origin convert on read

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Inclusive hit-test, matching how the window server reports a pointer
    /// resting on the panel's edge.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }

    /// Negative or NaN extents collapse to zero.
    pub fn sanitized(self) -> Self {
        Self {
            width: self.width.max(0.0),
            height: self.height.max(0.0),
            ..self
        }
    }

    /// Largest per-component difference between two rectangles.
    pub fn distance(&self, other: &Rect) -> f64 {
        [
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.width - other.width).abs(),
            (self.height - other.height).abs(),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

/// What the panel needs to know about the display it lives on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenMetrics {
    pub frame: Rect,
    /// The camera housing between the two auxiliary top areas, if the display has one.
    pub notch: Option<Rect>,
}

impl ScreenMetrics {
    /// The notch rectangle, or a synthetic one centered on the top edge for
    /// displays without a notch.
    pub fn notch_or(&self, fallback_width: f64, fallback_height: f64) -> Rect {
        match self.notch {
            Some(notch) => notch,
            None => {
                let width = fallback_width.min(self.frame.width).max(0.0);
                let height = fallback_height.max(0.0);
                Rect::new(
                    self.frame.x + (self.frame.width - width) / 2.0,
                    self.frame.max_y() - height,
                    width,
                    height,
                )
            }
        }
    }
}
