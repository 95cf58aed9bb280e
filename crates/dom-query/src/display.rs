//! Visibility checks and `display` management.

use crate::query::Query;
use dom_tree::{default_display, Document, NodeId};

/// Options for [`Query::is_visible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityOptions {
    /// Also require a computed opacity above zero on the element and its
    /// ancestors.
    pub include_opacity: bool,
    /// Also require `visibility` and `content-visibility` to not be `hidden`.
    pub include_visibility: bool,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            include_opacity: false,
            include_visibility: true,
        }
    }
}

/// Options for [`Query::natural_display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaturalDisplayOptions {
    /// Inspect matching stylesheet rules. When `false`, use the tag-name
    /// defaults only.
    pub calculate: bool,
}

impl Default for NaturalDisplayOptions {
    fn default() -> Self {
        Self { calculate: true }
    }
}

/// The result of a visibility check over a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Every element agrees.
    Uniform(bool),
    /// Per-element results, in collection order.
    PerElement(Vec<bool>),
}

impl Visibility {
    /// Whether every element is visible.
    pub fn all(&self) -> bool {
        match self {
            Visibility::Uniform(v) => *v,
            Visibility::PerElement(v) => v.iter().all(|&b| b),
        }
    }

    /// Whether at least one element is visible.
    pub fn any(&self) -> bool {
        match self {
            Visibility::Uniform(v) => *v,
            Visibility::PerElement(v) => v.iter().any(|&b| b),
        }
    }
}

fn opacity_is_zero(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        let opacity = doc.computed_style(id, "opacity");
        if opacity.trim().parse::<f64>().is_ok_and(|o| o <= 0.0) {
            return true;
        }
        current = doc.composed_parent_element(id);
    }
    false
}

/// Whether one element is visible under `options`.
pub fn element_visible(doc: &Document, node: NodeId, options: VisibilityOptions) -> bool {
    let rect = doc.bounding_rect(node);
    if rect.width <= 0.0 && rect.height <= 0.0 {
        return false;
    }
    if options.include_visibility
        && (doc.computed_style(node, "visibility") == "hidden"
            || doc.computed_style(node, "content-visibility") == "hidden")
    {
        return false;
    }
    !(options.include_opacity && opacity_is_zero(doc, node))
}

impl Query {
    /// Checks laid-out dimensions (and optionally opacity and visibility) of
    /// every element.
    pub fn is_visible(&self, options: VisibilityOptions) -> Visibility {
        let results: Vec<bool> = self
            .nodes
            .iter()
            .map(|&n| element_visible(&self.doc, n, options))
            .collect();
        match results.first() {
            None => Visibility::Uniform(false),
            Some(&first) if results.iter().all(|&r| r == first) => Visibility::Uniform(first),
            Some(_) => Visibility::PerElement(results),
        }
    }

    /// The `display` the first element would have without inline overrides
    /// or `display: none`.
    pub fn natural_display(&self, options: NaturalDisplayOptions) -> Option<String> {
        let node = *self.nodes.first()?;
        Some(natural_display_of(&self.doc, node, options))
    }

    /// Sets `display: none` on every element.
    pub fn hide(&self) -> &Self {
        for &node in &self.nodes {
            self.doc.set_style(node, "display", "none");
        }
        self
    }

    /// Removes a `display: none` override from every element and restores its
    /// natural display when the inline style no longer sets one.
    pub fn show(&self) -> &Self {
        for &node in &self.nodes {
            show_element(&self.doc, node);
        }
        self
    }

    /// Shows hidden elements and hides visible ones, or forces either.
    pub fn toggle(&self, force: Option<bool>) -> &Self {
        for &node in &self.nodes {
            let show = force.unwrap_or_else(|| {
                !element_visible(&self.doc, node, VisibilityOptions::default())
                    && !has_visible_inline_display(&self.doc, node)
            });
            if show {
                show_element(&self.doc, node);
            } else {
                self.doc.set_style(node, "display", "none");
            }
        }
        self
    }
}

fn natural_display_of(doc: &Document, node: NodeId, options: NaturalDisplayOptions) -> String {
    if options.calculate {
        doc.cascaded_display(node)
    } else {
        doc.tag_name(node)
            .map(|tag| default_display(&tag).to_string())
            .unwrap_or_default()
    }
}

fn has_visible_inline_display(doc: &Document, node: NodeId) -> bool {
    doc.style(node, "display")
        .is_some_and(|d| !d.eq_ignore_ascii_case("none"))
}

fn show_element(doc: &Document, node: NodeId) {
    if doc
        .style(node, "display")
        .is_some_and(|d| d.eq_ignore_ascii_case("none"))
    {
        doc.remove_style(node, "display");
    }
    if !has_visible_inline_display(doc, node) && doc.computed_style(node, "display") == "none" {
        let natural = natural_display_of(doc, node, NaturalDisplayOptions::default());
        let natural = if natural == "none" {
            "block".to_string()
        } else {
            natural
        };
        doc.set_style(node, "display", &natural);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_tree::{LayoutBox, Rect};
    use pretty_assertions::assert_eq;

    fn laid_out(html: &str) -> Document {
        let doc = Document::from_html(html);
        for node in doc.descendant_elements(doc.body()) {
            doc.set_layout(node, LayoutBox::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        }
        doc
    }

    #[test]
    fn test_display_none_is_invisible() {
        let doc = laid_out("<div>a</div><div style=\"display: none\">b</div>");
        let divs = Query::select(&doc, "div").unwrap();
        assert_eq!(
            divs.is_visible(VisibilityOptions::default()),
            Visibility::PerElement(vec![true, false])
        );
        assert_eq!(
            divs.first().is_visible(VisibilityOptions::default()),
            Visibility::Uniform(true)
        );
    }

    #[test]
    fn test_opacity_only_when_requested() {
        let doc = laid_out("<p style=\"opacity: 0\">x</p>");
        let p = Query::select(&doc, "p").unwrap();
        assert!(p.is_visible(VisibilityOptions::default()).all());
        let with_opacity = VisibilityOptions {
            include_opacity: true,
            ..Default::default()
        };
        assert_eq!(p.is_visible(with_opacity), Visibility::Uniform(false));
    }

    #[test]
    fn test_visibility_hidden() {
        let doc = laid_out("<p style=\"visibility: hidden\">x</p>");
        let p = Query::select(&doc, "p").unwrap();
        assert!(!p.is_visible(VisibilityOptions::default()).any());
        let ignore = VisibilityOptions {
            include_visibility: false,
            ..Default::default()
        };
        assert!(p.is_visible(ignore).all());
    }

    #[test]
    fn test_no_layout_is_invisible() {
        let doc = Document::from_html("<p>x</p>");
        let p = Query::select(&doc, "p").unwrap();
        assert_eq!(p.is_visible(VisibilityOptions::default()), Visibility::Uniform(false));
    }

    #[test]
    fn test_natural_display() {
        let doc = Document::from_html(
            "<style>.row { display: flex }</style><div class=\"row\" style=\"display: none\"></div><span></span>",
        );
        let row = Query::select(&doc, ".row").unwrap();
        assert_eq!(
            row.natural_display(NaturalDisplayOptions::default()).as_deref(),
            Some("flex")
        );
        assert_eq!(
            row.natural_display(NaturalDisplayOptions { calculate: false })
                .as_deref(),
            Some("block")
        );
        let span = Query::select(&doc, "span").unwrap();
        assert_eq!(
            span.natural_display(NaturalDisplayOptions::default()).as_deref(),
            Some("inline")
        );
    }

    #[test]
    fn test_show_restores_natural_display() {
        let doc = Document::from_html(
            "<style>li.off { display: none }</style><li class=\"off\"></li><div style=\"display: none\"></div>",
        );
        let li = Query::select(&doc, "li").unwrap();
        li.show();
        assert_eq!(li.attr("style").as_deref(), Some("display: list-item;"));

        let div = Query::select(&doc, "div").unwrap();
        div.show();
        assert_eq!(div.attr("style"), None);
        assert_eq!(div.css("display").as_deref(), Some("block"));
        div.hide();
        assert_eq!(div.css("display").as_deref(), Some("none"));
        div.toggle(None);
        assert_eq!(div.css("display").as_deref(), Some("block"));
    }
}
