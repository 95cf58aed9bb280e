//! Positions, box sizes and positioning contexts.

use crate::query::Query;
use dom_tree::{Document, NodeId, Rect};

/// A point in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl From<Rect> for Size {
    fn from(rect: Rect) -> Self {
        Self {
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Options for [`Query::position`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionOptions {
    /// Also report coordinates relative to this element.
    pub relative_to: Option<NodeId>,
}

/// Coordinates of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Relative to the viewport.
    pub global: Point,
    /// Relative to the padding box of the offset parent.
    pub local: Point,
    /// Relative to [`PositionOptions::relative_to`], when given.
    pub relative: Option<Point>,
}

/// Box sizes, positions and scroll offsets of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dimensions {
    /// Content box size.
    pub content: Size,
    /// Padding box size.
    pub padding: Size,
    /// Border box size.
    pub border: Size,
    /// Margin box size.
    pub margin: Size,
    /// Border box origin relative to the viewport.
    pub viewport: Point,
    /// Border box origin relative to the document.
    pub document: Point,
    /// The element's own scroll offsets.
    pub scroll: Point,
}

const CLIPPING_OVERFLOW: &[&str] = &["hidden", "scroll", "auto", "clip"];

fn is_positioned(doc: &Document, node: NodeId) -> bool {
    doc.computed_style(node, "position") != "static"
}

/// Whether `node` establishes a containing block for absolutely positioned
/// descendants even when static.
fn establishes_containing_block(doc: &Document, node: NodeId) -> bool {
    let set = |property: &str, inert: &str| {
        let value = doc.computed_style(node, property);
        !value.is_empty() && value != inert
    };
    if set("transform", "none") || set("perspective", "none") || set("filter", "none") {
        return true;
    }
    if set("backdrop-filter", "none") {
        return true;
    }
    let contain = doc.computed_style(node, "contain");
    if contain
        .split_whitespace()
        .any(|c| matches!(c, "layout" | "paint" | "strict" | "content"))
    {
        return true;
    }
    let will_change = doc.computed_style(node, "will-change");
    if will_change
        .split(',')
        .any(|c| matches!(c.trim(), "transform" | "perspective" | "filter"))
    {
        return true;
    }
    matches!(
        doc.computed_style(node, "container-type").as_str(),
        "size" | "inline-size"
    )
}

/// The nearest positioned ancestor, with table cells and tables counting for
/// static elements, falling back to `<body>`. `None` for unrendered or fixed
/// elements.
pub fn offset_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    if doc.is_display_none(node) || doc.computed_style(node, "position") == "fixed" {
        return None;
    }
    let static_self = !is_positioned(doc, node);
    let body = doc.body();
    let mut current = doc.composed_parent_element(node);
    while let Some(ancestor) = current {
        if ancestor == body || is_positioned(doc, ancestor) {
            return Some(ancestor);
        }
        if static_self
            && doc
                .tag_name(ancestor)
                .is_some_and(|t| matches!(t.as_str(), "td" | "th" | "table"))
        {
            return Some(ancestor);
        }
        current = doc.composed_parent_element(ancestor);
    }
    doc.is_connected(node).then_some(body)
}

/// Like [`offset_parent`] but also honors transforms, filters, containment,
/// `will-change` and size containers. Falls back to the root element.
pub fn positioning_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.composed_parent_element(node);
    while let Some(ancestor) = current {
        if is_positioned(doc, ancestor) || establishes_containing_block(doc, ancestor) {
            return Some(ancestor);
        }
        current = doc.composed_parent_element(ancestor);
    }
    doc.is_connected(node).then(|| doc.document_element())
}

/// The nearest ancestor whose overflow clips its content.
pub fn clipping_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.composed_parent_element(node);
    while let Some(ancestor) = current {
        let clips = ["overflow", "overflow-x", "overflow-y"]
            .iter()
            .any(|p| CLIPPING_OVERFLOW.contains(&doc.computed_style(ancestor, p).as_str()));
        if clips {
            return Some(ancestor);
        }
        current = doc.composed_parent_element(ancestor);
    }
    None
}

/// The nearest positioned ancestor, or the root element.
pub fn containing_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.composed_parent_element(node);
    while let Some(ancestor) = current {
        if is_positioned(doc, ancestor) {
            return Some(ancestor);
        }
        current = doc.composed_parent_element(ancestor);
    }
    doc.is_connected(node).then(|| doc.document_element())
}

impl Query {
    fn related(&self, f: impl Fn(&Document, NodeId) -> Option<NodeId>) -> Self {
        let found = self.first_node().and_then(|n| f(&self.doc, n));
        self.derive(found.into_iter().collect(), None)
    }

    /// The viewport-relative border box of the first element.
    pub fn bounds(&self) -> Option<Rect> {
        self.first_node().map(|n| self.doc.bounding_rect(n))
    }

    /// Viewport, offset-parent and optional element-relative coordinates.
    pub fn position(&self, options: PositionOptions) -> Option<Position> {
        let node = self.first_node()?;
        let rect = self.doc.bounding_rect(node);
        let global = Point::new(rect.x, rect.y);
        let local = match offset_parent(&self.doc, node) {
            Some(parent) => {
                let origin = self
                    .doc
                    .layout(parent)
                    .map(|l| l.padding_box())
                    .unwrap_or_default();
                let (sx, sy) = self.doc.scroll(parent);
                Point::new(rect.x - origin.x + sx, rect.y - origin.y + sy)
            }
            None => global,
        };
        let relative = options.relative_to.map(|other| {
            let base = self.doc.bounding_rect(other);
            Point::new(rect.x - base.x, rect.y - base.y)
        });
        Some(Position {
            global,
            local,
            relative,
        })
    }

    /// Viewport coordinates plus the document scroll offsets.
    pub fn page_position(&self) -> Option<Point> {
        let rect = self.bounds()?;
        let (sx, sy) = self.doc.scroll(self.doc.root());
        Some(Point::new(rect.x + sx, rect.y + sy))
    }

    /// Every box size, position and scroll offset of the first element.
    pub fn dimensions(&self) -> Option<Dimensions> {
        let node = self.first_node()?;
        let rect = self.doc.bounding_rect(node);
        let (scroll_x, scroll_y) = self.doc.scroll(node);
        let (page_x, page_y) = self.doc.scroll(self.doc.root());
        let layout = if rect == Rect::default() {
            None
        } else {
            self.doc.layout(node)
        };
        let layout = layout.unwrap_or_default();
        Some(Dimensions {
            content: layout.content_box().into(),
            padding: layout.padding_box().into(),
            border: layout.border_box.into(),
            margin: layout.margin_box().into(),
            viewport: Point::new(rect.x, rect.y),
            document: Point::new(rect.x + page_x, rect.y + page_y),
            scroll: Point::new(scroll_x, scroll_y),
        })
    }

    /// Scroll offsets of the first element.
    pub fn scroll_offsets(&self) -> Option<Point> {
        let (x, y) = self.doc.scroll(self.first_node()?);
        Some(Point::new(x, y))
    }

    /// Sets the scroll offsets of every element.
    pub fn set_scroll(&self, x: f64, y: f64) -> &Self {
        for &node in &self.nodes {
            self.doc.set_scroll(node, x, y);
        }
        self
    }

    /// The offset parent of the first element.
    pub fn offset_parent(&self) -> Self {
        self.related(offset_parent)
    }

    /// The positioning context of the first element.
    pub fn positioning_parent(&self) -> Self {
        self.related(positioning_parent)
    }

    /// The nearest clipping ancestor of the first element.
    pub fn clipping_parent(&self) -> Self {
        self.related(clipping_parent)
    }

    /// The containing positioned ancestor of the first element.
    pub fn containing_parent(&self) -> Self {
        self.related(containing_parent)
    }
}
