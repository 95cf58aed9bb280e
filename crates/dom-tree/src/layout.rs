//! Host-supplied layout boxes.
//!
//! The tree performs no layout of its own. The embedder (or a test) assigns a
//! [`LayoutBox`] to each element it cares about; geometry queries read those
//! boxes back, zeroed for elements that are not rendered.

/// A rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Moves the rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grows the rectangle outward by `edges`.
    pub fn outset(&self, edges: &Edges) -> Rect {
        Rect::new(
            self.x - edges.left,
            self.y - edges.top,
            self.width + edges.left + edges.right,
            self.height + edges.top + edges.bottom,
        )
    }

    /// Shrinks the rectangle inward by `edges`.
    pub fn inset(&self, edges: &Edges) -> Rect {
        Rect::new(
            self.x + edges.left,
            self.y + edges.top,
            (self.width - edges.left - edges.right).max(0.0),
            (self.height - edges.top - edges.bottom).max(0.0),
        )
    }
}

/// Per-side sizes of margin, border or padding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    /// Top.
    pub top: f64,
    /// Right.
    pub right: f64,
    /// Bottom.
    pub bottom: f64,
    /// Left.
    pub left: f64,
}

impl Edges {
    /// The same size on every side.
    pub fn uniform(size: f64) -> Self {
        Self {
            top: size,
            right: size,
            bottom: size,
            left: size,
        }
    }
}

/// The layout of one element: its border box in viewport coordinates plus
/// its box-model edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    /// Border box, relative to the viewport.
    pub border_box: Rect,
    /// Margin widths.
    pub margin: Edges,
    /// Border widths.
    pub border: Edges,
    /// Padding widths.
    pub padding: Edges,
}

impl LayoutBox {
    /// A box with only a border-box rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            border_box: rect,
            ..Self::default()
        }
    }

    /// The padding box.
    pub fn padding_box(&self) -> Rect {
        self.border_box.inset(&self.border)
    }

    /// The content box.
    pub fn content_box(&self) -> Rect {
        self.padding_box().inset(&self.padding)
    }

    /// The margin box.
    pub fn margin_box(&self) -> Rect {
        self.border_box.outset(&self.margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_model() {
        let layout = LayoutBox {
            border_box: Rect::new(10.0, 10.0, 100.0, 50.0),
            margin: Edges::uniform(5.0),
            border: Edges::uniform(1.0),
            padding: Edges::uniform(4.0),
        };
        assert_eq!(layout.padding_box(), Rect::new(11.0, 11.0, 98.0, 48.0));
        assert_eq!(layout.content_box(), Rect::new(15.0, 15.0, 90.0, 40.0));
        assert_eq!(layout.margin_box(), Rect::new(5.0, 5.0, 110.0, 60.0));
    }

    #[test]
    fn test_rect_contains() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains(&Rect::new(90.0, 10.0, 20.0, 20.0)));
    }
}
