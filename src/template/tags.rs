//! Inline tags in free text
//!
//! Replaces tags like `[[pill|content|color=by_value,field=tags]]` in already
//! rendered text. Tags without a registered handler are left untouched.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::context::RenderContext;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());

static BUILTIN: Lazy<TagReplacer> = Lazy::new(TagReplacer::with_builtins);

/// Parsed inline tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    /// Content, `None` for a bare `[[name]]`
    pub content: Option<String>,
    pub options: HashMap<String, String>,
    /// Matched text including brackets
    pub original: String,
}

impl Tag {
    /// Parse the text between `[[` and `]]`
    pub fn parse(inner: &str, original: &str) -> Self {
        let mut parts = inner.split('|');
        let name = parts.next().unwrap_or_default().trim().to_string();
        let content = parts.next().map(str::to_string);
        let options = parts
            .next()
            .map(|options| {
                options
                    .split(',')
                    .filter_map(|option| option.split_once('='))
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            content,
            options,
            original: original.to_string(),
        }
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }
}

/// Tag handler function type.
///
/// Receives the tag and the content left after `if`/`then`/`else` were
/// resolved.
pub type TagHandler = Box<dyn Fn(&Tag, &str, &RenderContext<'_>) -> String + Send + Sync>;

/// Tag replacer
pub struct TagReplacer {
    handlers: HashMap<String, TagHandler>,
}

impl Default for TagReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl TagReplacer {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut replacer = Self::new();
        builtins::register_builtins(&mut replacer);
        replacer
    }

    /// Shared replacer with the built-in tags
    pub fn builtin() -> &'static TagReplacer {
        &BUILTIN
    }

    /// Register a tag handler
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Tag, &str, &RenderContext<'_>) -> String + Send + Sync + 'static,
    {
        debug!("Registered tag: [[{}]]", name);
        self.handlers.insert(name.to_string(), Box::new(handler));
    }

    /// Find all tags in `text`
    pub fn parse(&self, text: &str) -> Vec<Tag> {
        TAG_PATTERN
            .captures_iter(text)
            .map(|caps| Tag::parse(&caps[1], &caps[0]))
            .collect()
    }

    /// Replace every known tag in `text`
    pub fn replace(&self, text: &str, ctx: &RenderContext<'_>) -> String {
        TAG_PATTERN
            .replace_all(text, |caps: &Captures| {
                let tag = Tag::parse(&caps[1], &caps[0]);
                match self.handlers.get(&tag.name) {
                    Some(handler) => match resolve_content(&tag) {
                        Some(content) => handler(&tag, &content, ctx),
                        None => String::new(),
                    },
                    None => tag.original,
                }
            })
            .into_owned()
    }
}

/// Tag content after `if=`/`then=`/`else=`; `None` drops the tag
fn resolve_content(tag: &Tag) -> Option<String> {
    let content = tag
        .content
        .clone()
        .unwrap_or_else(|| "No content provided.".to_string());

    let Some(condition) = tag.option("if") else {
        return Some(content);
    };
    match (content == condition, tag.option("then"), tag.option("else")) {
        (true, Some(then), _) => Some(then.to_string()),
        (_, _, Some("None")) => None,
        (_, _, Some(otherwise)) => Some(otherwise.to_string()),
        _ => Some(content),
    }
}

/// Built-in tags
pub mod builtins {
    use super::*;
    use crate::template::html::color_from_value;

    pub fn register_builtins(replacer: &mut TagReplacer) {
        // [[pill|content|color=by_value,field=tags]] - Small secondary badge
        replacer.register("pill", |tag, content, ctx| {
            let color = match tag.option("color") {
                Some("by_value") => format!(" background-color: {};", color_from_value(content, 30)),
                Some(color) if !color.is_empty() => format!(" background-color: {};", color),
                _ => String::new(),
            };
            let label = tag
                .option("field")
                .and_then(|field| ctx.choices_for(field))
                .and_then(|choices| choices.label(content, ctx.language))
                .filter(|label| !label.is_empty())
                .unwrap_or(content);

            format!(
                r#"<span class="badge badge-secondary small" style="font-weight: normal;{}">{}</span>"#,
                color, label
            )
        });
    }
}
