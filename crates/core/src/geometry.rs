//! Rectangles and page geometry in PDF user space.
//!
//! All coordinates are points (1/72 inch) with the origin at the lower-left
//! corner and the y axis pointing up, the same space content streams draw in.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Builds a rectangle from two opposite corners in any order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest rectangle enclosing every point, `None` for an empty slice.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut rect = Rect::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            rect.x0 = rect.x0.min(x);
            rect.y0 = rect.y0.min(y);
            rect.x1 = rect.x1.max(x);
            rect.y1 = rect.y1.max(y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Upper edge; reading order runs from larger to smaller values.
    pub fn top(&self) -> f32 {
        self.y1
    }

    pub fn bottom(&self) -> f32 {
        self.y0
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Share of this rectangle's area covered by `other`, in `[0, 1]`.
    ///
    /// Degenerate rectangles (zero width or height) fall back to the covered
    /// share of their length so hairlines and zero-height glyph boxes still
    /// resolve sensibly.
    pub fn overlap_fraction(&self, other: &Rect) -> f32 {
        let area = self.area();
        if area > 0.0 {
            return self
                .intersection(other)
                .map(|i| (i.area() / area).min(1.0))
                .unwrap_or(0.0);
        }

        if self.width() > 0.0 && self.y0 >= other.y0 && self.y0 <= other.y1 {
            let covered = self.x1.min(other.x1) - self.x0.max(other.x0);
            return (covered.max(0.0) / self.width()).min(1.0);
        }
        if self.height() > 0.0 && self.x0 >= other.x0 && self.x0 <= other.x1 {
            let covered = self.y1.min(other.y1) - self.y0.max(other.y0);
            return (covered.max(0.0) / self.height()).min(1.0);
        }
        0.0
    }

    /// Intersection over union; 0 when either rectangle has no area.
    pub fn iou(&self, other: &Rect) -> f32 {
        let shared = self.intersection(other).map(|i| i.area()).unwrap_or(0.0);
        let union = self.area() + other.area() - shared;
        if union > 0.0 {
            shared / union
        } else {
            0.0
        }
    }

    /// Grows the rectangle by `amount` on every side.
    pub fn inflate(&self, amount: f32) -> Rect {
        Rect::new(
            self.x0 - amount,
            self.y0 - amount,
            self.x1 + amount,
            self.y1 + amount,
        )
    }
}

/// Declared geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Visible box (CropBox, else MediaBox) in unrotated user space.
    pub bounds: Rect,
    /// Clockwise display rotation in degrees, one of 0, 90, 180, 270.
    pub rotation: i32,
}

impl PageGeometry {
    pub fn new(bounds: Rect, rotation: i32) -> Self {
        Self {
            bounds,
            rotation: rotation.rem_euclid(360),
        }
    }

    pub fn width(&self) -> f32 {
        self.bounds.width()
    }

    pub fn height(&self) -> f32 {
        self.bounds.height()
    }

    /// Width and height of the page as a viewer (and the detector) sees it.
    pub fn displayed_size(&self) -> (f32, f32) {
        match self.rotation {
            90 | 270 => (self.height(), self.width()),
            _ => (self.width(), self.height()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_corners() {
        let r = Rect::new(10.0, 50.0, 0.0, 20.0);
        assert_eq!(r, Rect { x0: 0.0, y0: 20.0, x1: 10.0, y1: 50.0 });
    }

    #[test]
    fn test_intersection_and_overlap() {
        let run = Rect::new(0.0, 0.0, 10.0, 10.0);
        let region = Rect::new(4.0, 0.0, 20.0, 10.0);
        assert_eq!(run.intersection(&region), Some(Rect::new(4.0, 0.0, 10.0, 10.0)));
        assert!((run.overlap_fraction(&region) - 0.6).abs() < 1e-6);
        assert_eq!(run.overlap_fraction(&Rect::new(50.0, 50.0, 60.0, 60.0)), 0.0);
    }

    #[test]
    fn test_default_is_empty_at_origin() {
        let r = Rect::default();
        assert_eq!(r, Rect::new(0.0, 0.0, 0.0, 0.0));
        assert!(r.is_empty());
        assert_eq!(r.area(), 0.0);
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&a), 1.0);
        assert!((a.iou(&Rect::new(5.0, 0.0, 15.0, 10.0)) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert_eq!(Rect::default().iou(&Rect::default()), 0.0);
    }

    #[test]
    fn test_touching_edges_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&b));
        assert_eq!(a.overlap_fraction(&b), 0.0);
    }

    #[test]
    fn test_hairline_overlap_uses_length() {
        let rule = Rect::new(0.0, 5.0, 100.0, 5.0);
        let region = Rect::new(0.0, 0.0, 25.0, 10.0);
        assert!((rule.overlap_fraction(&region) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_displayed_size_swaps_for_quarter_turns() {
        let page = PageGeometry::new(Rect::new(0.0, 0.0, 612.0, 792.0), -90);
        assert_eq!(page.rotation, 270);
        assert_eq!(page.displayed_size(), (792.0, 612.0));
    }
}
