//! Markup, text, attributes, properties, data, styles and classes.

use crate::query::Query;
use serde_json::{Map, Value};

impl Query {
    pub(crate) fn first_node(&self) -> Option<dom_tree::NodeId> {
        self.nodes.first().copied()
    }

    /// Inner markup of the first node.
    pub fn html(&self) -> Option<String> {
        self.first_node().map(|n| self.doc.inner_html(n))
    }

    /// Replaces the children of every node with parsed markup.
    pub fn set_html(&self, html: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.set_inner_html(node, html);
        }
        self
    }

    /// Text content of the first node.
    pub fn text(&self) -> Option<String> {
        self.first_node().map(|n| self.doc.text_content(n))
    }

    /// Replaces the children of every node with text.
    pub fn set_text(&self, text: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.set_text_content(node, text);
        }
        self
    }

    /// Form value of the first node.
    pub fn val(&self) -> Option<String> {
        self.first_node().and_then(|n| self.doc.value(n))
    }

    /// Sets the form value of every node.
    pub fn set_val(&self, value: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.set_value(node, value);
        }
        self
    }

    /// An attribute of the first node.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.first_node().and_then(|n| self.doc.get_attribute(n, name))
    }

    /// Sets an attribute on every node.
    pub fn set_attr(&self, name: &str, value: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.set_attribute(node, name, value);
        }
        self
    }

    /// Adds a valueless (boolean) attribute to every node.
    pub fn add_attr(&self, name: &str) -> &Self {
        self.set_attr(name, "")
    }

    /// Removes an attribute from every node.
    pub fn remove_attr(&self, name: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.remove_attribute(node, name);
        }
        self
    }

    /// A DOM property of the first node.
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.first_node().and_then(|n| self.doc.prop(n, name))
    }

    /// Sets a DOM property on every node.
    pub fn set_prop(&self, name: &str, value: Value) -> &Self {
        for &node in &self.nodes {
            self.doc.set_prop(node, name, value.clone());
        }
        self
    }

    /// The typed `data-*` map of the first node.
    pub fn data(&self) -> Map<String, Value> {
        self.first_node()
            .map(|n| self.doc.dataset(n))
            .unwrap_or_default()
    }

    /// One typed `data-*` value of the first node.
    pub fn data_value(&self, key: &str) -> Option<Value> {
        self.first_node().and_then(|n| self.doc.data(n, key))
    }

    /// Writes a `data-*` attribute on every node.
    pub fn set_data(&self, key: &str, value: &Value) -> &Self {
        for &node in &self.nodes {
            self.doc.set_data(node, key, value);
        }
        self
    }

    /// Removes a `data-*` attribute from every node.
    pub fn remove_data(&self, key: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.remove_data(node, key);
        }
        self
    }

    /// The computed value of a style property on the first node.
    pub fn css(&self, property: &str) -> Option<String> {
        self.first_node()
            .map(|n| self.doc.computed_style(n, property))
    }

    /// Sets an inline style on every node. An empty value removes it.
    pub fn set_css(&self, property: &str, value: &str) -> &Self {
        for &node in &self.nodes {
            self.doc.set_style(node, property, value);
        }
        self
    }

    /// The computed value of a custom property, with or without the leading
    /// `--`.
    pub fn css_var(&self, name: &str) -> Option<String> {
        self.css(&custom_property(name))
    }

    /// Sets a custom property on every node.
    pub fn set_css_var(&self, name: &str, value: &str) -> &Self {
        self.set_css(&custom_property(name), value)
    }

    /// Whether any node has `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.nodes.iter().any(|&n| self.doc.has_class(n, class))
    }

    /// Adds whitespace-separated classes to every node.
    pub fn add_class(&self, classes: &str) -> &Self {
        for &node in &self.nodes {
            for class in classes.split_whitespace() {
                self.doc.add_class(node, class);
            }
        }
        self
    }

    /// Removes whitespace-separated classes from every node.
    pub fn remove_class(&self, classes: &str) -> &Self {
        for &node in &self.nodes {
            for class in classes.split_whitespace() {
                self.doc.remove_class(node, class);
            }
        }
        self
    }

    /// Toggles whitespace-separated classes on every node, or forces them.
    pub fn toggle_class(&self, classes: &str, force: Option<bool>) -> &Self {
        for &node in &self.nodes {
            for class in classes.split_whitespace() {
                self.doc.toggle_class(node, class, force);
            }
        }
        self
    }
}

fn custom_property(name: &str) -> String {
    if name.starts_with("--") {
        name.to_string()
    } else {
        format!("--{name}")
    }
}
