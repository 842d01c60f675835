//! Template strings
//!
//! A template string is text with `{variable|filters}` tokens, rendered
//! against one result record. `{{` and `}}` are escapes and stay as they are;
//! an unterminated `{` is plain text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::context::RenderContext;
use super::error::TemplateError;
use super::html::escape_html;
use super::variable::TemplateVariable;

static EMPTY_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(\w+)>(?:&nbsp;)?</(\w+)>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(usize),
}

/// A parsed template string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateString {
    source: String,
    segments: Vec<Segment>,
    variables: Vec<TemplateVariable>,
}

impl TemplateString {
    /// Parse `source`, failing on the first malformed variable
    pub fn new(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut variables = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find(['{', '}']) {
            text.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                text.push_str(&tail[..2]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                text.push('}');
                rest = &tail[1..];
                continue;
            }

            let Some(end) = tail.find('}') else {
                text.push_str(tail);
                rest = "";
                break;
            };
            let content = &tail[1..end];
            if content.is_empty() {
                text.push_str("{}");
            } else {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                variables.push(TemplateVariable::parse(content)?);
                segments.push(Segment::Variable(variables.len() - 1));
            }
            rest = &tail[end + 1..];
        }

        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            variables,
        })
    }

    /// The unrendered template
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[TemplateVariable] {
        &self.variables
    }

    /// Variable names without filters, in order of appearance
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.variable()).collect()
    }

    /// Replace every token with its filtered value.
    ///
    /// Lists are joined with the context's separator. A token that fails to
    /// resolve renders as an empty string, or as an alert box when the
    /// context shows errors.
    pub fn render(&self, data: &Value, ctx: &RenderContext<'_>) -> String {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Variable(index) => {
                    let variable = &self.variables[*index];
                    match variable.value(data, ctx) {
                        Ok(value) => rendered.push_str(&display_value(&value, ctx.list_separator)),
                        Err(e) => rendered.push_str(&error_html(&e, ctx.show_errors)),
                    }
                }
            }
        }
        rendered
    }
}

/// Render `source` against `data` in one go.
///
/// A template that does not parse renders as its error.
pub fn render_template(source: &str, data: &Value, ctx: &RenderContext<'_>) -> String {
    match TemplateString::new(source) {
        Ok(template) => template.render(data, ctx),
        Err(e) => error_html(&e, ctx.show_errors),
    }
}

/// Display form of a filtered value
pub fn display_value(value: &Value, separator: &str) -> String {
    match value {
        Value::Array(items) => join_list(items, separator),
        other => scalar_to_string(other),
    }
}

/// Join list items; objects and nested lists are shown as JSON
pub fn join_list(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Object(_) | Value::Array(_) => to_display_json(item),
            other => scalar_to_string(other),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// String form of a single value
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => to_display_json(value),
    }
}

/// JSON with `", "` and `": "` separators, keys in document order
pub fn to_display_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{}: {}", Value::String(key.clone()), to_display_json(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(to_display_json).collect();
            format!("[{}]", entries.join(", "))
        }
        other => other.to_string(),
    }
}

/// Error replacement for a token
pub fn error_html(error: &TemplateError, show_errors: bool) -> String {
    if show_errors {
        format!(
            r#"<div class="alert alert-danger" role="alert">{}</div>"#,
            escape_html(&error.to_string())
        )
    } else {
        String::new()
    }
}

/// Remove empty elements such as `<p></p>` or `<b>&nbsp;</b>`, repeatedly,
/// until none are left.
pub fn sanitize_html(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = EMPTY_ELEMENT
            .replace_all(&current, |caps: &Captures| {
                if caps[1] == caps[2] {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Value {
        json!({
            "test_value": "cat",
            "test_list": ["fish", "dog", "guinea pig"],
            "nested_data": {
                "nested_value": "lion",
                "nested_list": ["gazelle", "zebra", "buffalo"]
            },
            "another_test_list": [
                {"key_1": "value_1", "key_2": "value_2"},
                {"key_1": "value_1", "key_2": "value_2"}
            ],
            "count": 3,
            "flag": true
        })
    }

    fn render(source: &str) -> String {
        TemplateString::new(source)
            .unwrap()
            .render(&data(), &RenderContext::default())
    }

    #[test]
    fn test_simple_variable() {
        let template = TemplateString::new("<p>I want to see the {test_value}</p>").unwrap();
        assert_eq!(template.variable_names(), ["test_value"]);
        assert_eq!(render("<p>I want to see the {test_value}</p>"), "<p>I want to see the cat</p>");
    }

    #[test]
    fn test_simple_variable_with_filters() {
        assert_eq!(render("I want to see the {test_value|upper}"), "I want to see the CAT");
    }

    #[test]
    fn test_nested_variables() {
        assert_eq!(render("I want to see the {nested_data.nested_value}"), "I want to see the lion");
        assert_eq!(render("I want to see the {nested_data[nested_value]}"), "I want to see the lion");
    }

    #[test]
    fn test_multiple_variables_and_lists() {
        assert_eq!(
            render("I want to see the {test_value} and the {test_list}"),
            "I want to see the cat and the fish, dog, guinea pig"
        );
        assert_eq!(
            render("I want to see the {test_value|upper} and the {test_list|capitalize}"),
            "I want to see the CAT and the Fish, Dog, Guinea pig"
        );
    }

    #[test]
    fn test_dict_list_variable() {
        assert_eq!(
            render("I want to see the {another_test_list}"),
            r#"I want to see the {"key_1": "value_1", "key_2": "value_2"}, {"key_1": "value_1", "key_2": "value_2"}"#
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render("{count} / {flag}"), "3 / True");
    }

    #[test]
    fn test_missing_key_renders_empty_or_alert() {
        assert_eq!(render("I want to see the {invalid_variable}"), "I want to see the ");

        let ctx = RenderContext::default().with_show_errors(true);
        let rendered = TemplateString::new("{nested_data.invalid_variable}")
            .unwrap()
            .render(&data(), &ctx);
        assert_eq!(
            rendered,
            r#"<div class="alert alert-danger" role="alert">Key not found in data: invalid_variable</div>"#
        );
    }

    #[test]
    fn test_unterminated_brace_is_text() {
        let template = TemplateString::new("I want to see the {nested_data.invalid_variable").unwrap();
        assert!(template.variables().is_empty());
        assert_eq!(
            template.render(&data(), &RenderContext::default()),
            "I want to see the {nested_data.invalid_variable"
        );
    }

    #[test]
    fn test_escaped_braces_stay() {
        assert_eq!(render("{{literal}} {test_value} {}"), "{{literal}} cat {}");
    }

    #[test]
    fn test_malformed_variable_fails_parse() {
        assert!(matches!(
            TemplateString::new("{a b}"),
            Err(TemplateError::InvalidVariable(_))
        ));
        assert_eq!(render_template("{a b}", &data(), &RenderContext::default()), "");
    }

    #[test]
    fn test_join_list_sizes() {
        assert_eq!(join_list(&[], ", "), "");
        assert_eq!(join_list(&[json!("one")], ", "), "one");
        assert_eq!(join_list(&[json!(1), json!([2, 3])], " | "), "1 | [2, 3]");
    }

    #[test]
    fn test_sanitize_html() {
        assert_eq!(sanitize_html("<p>text</p><p></p>"), "<p>text</p>");
        assert_eq!(sanitize_html("<div><b>&nbsp;</b></div>after"), "after");
        assert_eq!(sanitize_html("<b></i>"), "<b></i>");
    }
}
