//! Small HTML building helpers used by filters and tags

use std::collections::BTreeMap;

/// Bootstrap contextual color names
pub const COLOR_CLASSES: &[&str] = &[
    "primary", "secondary", "success", "danger", "warning", "info", "light", "dark",
];

/// An HTML element with multi-valued attributes.
///
/// Attribute values are deduplicated and sorted, attribute names are sorted,
/// so two elements built in a different order render identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlElement {
    tag: String,
    attrs: BTreeMap<String, Vec<String>>,
    content: Vec<String>,
}

impl HtmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.add_content(content);
        self
    }

    pub fn add_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.attrs.entry(key.to_string()).or_default().push(value.into());
    }

    pub fn add_content(&mut self, content: impl Into<String>) {
        self.content.push(content.into());
    }

    pub fn render(&self) -> String {
        format!(
            "<{tag}{attrs}>{content}</{tag}>",
            tag = self.tag,
            attrs = self.render_attrs(),
            content = self.content.concat()
        )
    }

    fn render_attrs(&self) -> String {
        let mut rendered = String::new();
        for (key, values) in &self.attrs {
            let mut values = values.clone();
            values.sort();
            values.dedup();
            rendered.push_str(&format!(" {}=\"{}\"", key, values.join(" ")));
        }
        rendered
    }
}

impl std::fmt::Display for HtmlElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Derive a stable color from a value.
///
/// Uses the 31-multiplier string hash; only the hue modulo 360 is needed, so
/// the hash is reduced on every step.
pub fn color_from_value(value: &str, lightness: u8) -> String {
    let hue = value
        .chars()
        .fold(0u64, |hash, c| (c as u64 + hash * 31) % 360);
    format!("hsl({}, 100%, {}%)", hue, lightness)
}

/// HTML escape helper
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
