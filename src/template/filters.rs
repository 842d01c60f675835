//! Template filters
//!
//! Filters transform a value inside a `{value|filter:options}` token. They
//! live in a [`FilterRegistry`] keyed by name; the built-in set is registered
//! once and shared, custom registries can add their own.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use super::context::RenderContext;
use super::error::TemplateError;
use super::variable::FilterOptions;

/// A value transformation usable in template strings
pub trait TemplateFilter: Send + Sync {
    /// Options that must be present and non-empty
    fn required_options(&self) -> &[&'static str] {
        &[]
    }

    /// Options that may be present besides the required ones
    fn allowed_options(&self) -> &[&'static str] {
        &[]
    }

    /// Reject missing required options and unknown ones
    fn check_options(&self, name: &str, options: &FilterOptions) -> Result<(), TemplateError> {
        for required in self.required_options() {
            if options.get_non_empty(required).is_none() {
                return Err(TemplateError::MissingOption {
                    filter: name.to_string(),
                    option: required.to_string(),
                });
            }
        }
        for option in options.names() {
            if !self.required_options().contains(&option) && !self.allowed_options().contains(&option) {
                return Err(TemplateError::UnexpectedOption {
                    filter: name.to_string(),
                    option: option.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Transform `value`. `name` is the name the filter was invoked with.
    fn apply(
        &self,
        name: &str,
        value: Value,
        options: &FilterOptions,
        ctx: &RenderContext<'_>,
    ) -> Result<Value, TemplateError>;
}

/// Filters by name
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn TemplateFilter>>,
}

static BUILTIN: Lazy<FilterRegistry> = Lazy::new(FilterRegistry::with_builtins);

impl FilterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in filters
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_builtins(&mut registry);
        registry
    }

    /// The shared built-in registry
    pub fn builtin() -> &'static FilterRegistry {
        &BUILTIN
    }

    /// Register a filter, replacing any filter of the same name
    pub fn register<F>(&mut self, name: &str, filter: F)
    where
        F: TemplateFilter + 'static,
    {
        debug!("Registered template filter: {}", name);
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&dyn TemplateFilter> {
        self.filters.get(name).map(|f| f.as_ref())
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.names())
            .finish()
    }
}

/// Built-in filters
pub mod builtins {
    use std::fmt::Write as _;

    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

    use super::*;
    use crate::template::html::{color_from_value, escape_html, HtmlElement, COLOR_CLASSES};
    use crate::template::string::{scalar_to_string, to_display_json};

    /// Register the built-in filters
    pub fn register_builtins(registry: &mut FilterRegistry) {
        for name in ["upper", "lower", "title", "capitalize"] {
            registry.register(name, StringCaseFilter);
        }
        registry.register("bool", BoolFilter);
        registry.register("fieldify", FieldFilter);
        registry.register("badge", PillFilter);
        registry.register("pill", PillFilter);
        registry.register("img", ImageFilter);
        registry.register("date", DateFilter);
        registry.register("number", NumberFilter);
    }

    /// `__none__` stands for an empty label
    fn replace_key_value(value: &str) -> &str {
        if value == "__none__" {
            ""
        } else {
            value
        }
    }

    /// `upper`, `lower`, `title` and `capitalize`
    pub struct StringCaseFilter;

    impl TemplateFilter for StringCaseFilter {
        fn apply(
            &self,
            name: &str,
            value: Value,
            _options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let text = match value {
                Value::Null => return Ok(Value::Null),
                Value::String(s) => s,
                other => scalar_to_string(&other),
            };
            let converted = match name {
                "upper" => text.to_uppercase(),
                "lower" => text.to_lowercase(),
                "title" => title_case(&text),
                "capitalize" => capitalize(&text),
                _ => text,
            };
            Ok(Value::String(converted))
        }
    }

    /// Upper-case every letter that follows a non-letter, lower-case the rest
    pub fn title_case(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut previous_is_letter = false;
        for c in text.chars() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = c.is_alphabetic();
        }
        result
    }

    /// Upper-case the first character, lower-case the rest
    pub fn capitalize(text: &str) -> String {
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        }
    }

    /// `bool:[true_label[,false_label]]`
    pub struct BoolFilter;

    impl TemplateFilter for BoolFilter {
        fn allowed_options(&self) -> &[&'static str] {
            &["o0", "o1"]
        }

        fn apply(
            &self,
            _name: &str,
            value: Value,
            options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let true_label = options.get_non_empty("o0").unwrap_or("True");
            let false_label = options.get_non_empty("o1").unwrap_or("False");

            let flag = match &value {
                Value::Bool(b) => *b,
                Value::String(s) => s.eq_ignore_ascii_case("true"),
                _ => return Ok(value),
            };
            let label = if flag { true_label } else { false_label };
            Ok(Value::String(replace_key_value(label).to_string()))
        }
    }

    /// `fieldify:field=<search field>`: translate a choice key into its label
    pub struct FieldFilter;

    impl TemplateFilter for FieldFilter {
        fn required_options(&self) -> &[&'static str] {
            &["field"]
        }

        fn apply(
            &self,
            _name: &str,
            value: Value,
            options: &FilterOptions,
            ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let field = options.get("field").unwrap_or_default();
            let Some(choices) = ctx.choices_for(field) else {
                return Ok(value);
            };
            let key = scalar_to_string(&value);
            match choices.label(&key, ctx.language) {
                Some(label) if !label.is_empty() => Ok(Value::String(label.to_string())),
                _ => Ok(value),
            }
        }
    }

    /// `badge` / `pill:[color=..,bg=..,value=..]`
    pub struct PillFilter;

    impl PillFilter {
        /// Apply a color option to `element`.
        ///
        /// Bootstrap color names become classes, everything else an inline
        /// style on `property`.
        fn apply_color(
            element: &mut HtmlElement,
            option: &str,
            class_prefix: &str,
            property: &str,
            value: &Value,
            display: &str,
        ) -> bool {
            if COLOR_CLASSES.contains(&option) {
                element.add_attribute("class", format!("{}-{}", class_prefix, option));
                return true;
            }

            let color = if let Some(key) = option.strip_prefix("byval__") {
                value.get(key).map(|v| color_from_value(&scalar_to_string(v), 50))
            } else if let Some(key) = option.strip_prefix("val__") {
                value.get(key).map(scalar_to_string)
            } else if option == "byval" {
                Some(color_from_value(display, 50))
            } else {
                Some(option.to_string())
            };

            if let Some(color) = color.filter(|c| !c.is_empty()) {
                element.add_attribute("style", format!("{}: {};", property, color));
            }
            false
        }
    }

    impl TemplateFilter for PillFilter {
        fn allowed_options(&self) -> &[&'static str] {
            &["color", "bg", "value"]
        }

        fn apply(
            &self,
            _name: &str,
            value: Value,
            options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let display = match &value {
                Value::Object(map) => match options.get_non_empty("value") {
                    Some(key) => map
                        .get(key)
                        .map(scalar_to_string)
                        .unwrap_or_else(|| "KEY_ERROR".to_string()),
                    None => to_display_json(&value),
                },
                other => scalar_to_string(other),
            };

            let mut element = HtmlElement::new("span").with_attribute("class", "badge");
            let mut has_color_class = false;
            if let Some(color) = options.get_non_empty("color") {
                has_color_class =
                    Self::apply_color(&mut element, color, "badge", "color", &value, &display);
            }
            if let Some(bg) = options.get_non_empty("bg") {
                Self::apply_color(&mut element, bg, "bg", "background-color", &value, &display);
            }
            if !has_color_class {
                element.add_attribute("class", "badge-primary");
            }
            element.add_content(display);

            Ok(Value::String(element.render()))
        }
    }

    /// `img:[iiif_resize=NN,alt=..]`
    pub struct ImageFilter;

    impl TemplateFilter for ImageFilter {
        fn allowed_options(&self) -> &[&'static str] {
            &["iiif_resize", "alt"]
        }

        fn apply(
            &self,
            _name: &str,
            value: Value,
            options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let mut url = scalar_to_string(&value);
            if url.is_empty() {
                return Ok(Value::Null);
            }
            if let Some(percent) = options.get_non_empty("iiif_resize") {
                url = url.replace("/full/0/default.", &format!("/pct:{}/0/default.", percent));
            }
            let alt = options.get_non_empty("alt").unwrap_or("Responsive image");
            Ok(Value::String(format!(
                r#"<img src="{}" class="img-fluid" alt="{}">"#,
                url,
                escape_html(alt)
            )))
        }
    }

    /// `date:[format=..]`
    pub struct DateFilter;

    impl DateFilter {
        fn format_string(format: Option<&str>) -> &str {
            match format {
                None | Some("de") => "%d.%m.%Y",
                Some("iso") => "%Y-%m-%d",
                Some("us") => "%m/%d/%Y",
                Some("year") => "%Y",
                Some("long") => "%-d %B %Y",
                Some(custom) => custom,
            }
        }

        fn parse(text: &str) -> Option<DateTime<FixedOffset>> {
            if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc().fixed_offset());
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().fixed_offset())
        }
    }

    impl TemplateFilter for DateFilter {
        fn allowed_options(&self) -> &[&'static str] {
            &["format", "o0"]
        }

        fn apply(
            &self,
            name: &str,
            value: Value,
            options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let Some(date) = value.as_str().and_then(|text| Self::parse(text.trim())) else {
                return Ok(value);
            };
            let format = Self::format_string(
                options.get_non_empty("format").or_else(|| options.get_non_empty("o0")),
            );

            let mut rendered = String::new();
            write!(rendered, "{}", date.format(format)).map_err(|_| TemplateError::InvalidValue {
                filter: name.to_string(),
                message: format!("invalid date format '{}'", format),
            })?;
            Ok(Value::String(rendered))
        }
    }

    /// `number:[decimals=N,sep=..,point=..]`
    pub struct NumberFilter;

    impl NumberFilter {
        fn key_value(value: &str) -> &str {
            match value {
                "__none__" => "",
                "__space__" => " ",
                "__comma__" => ",",
                other => other,
            }
        }
    }

    impl TemplateFilter for NumberFilter {
        fn allowed_options(&self) -> &[&'static str] {
            &["decimals", "sep", "point"]
        }

        fn apply(
            &self,
            name: &str,
            value: Value,
            options: &FilterOptions,
            _ctx: &RenderContext<'_>,
        ) -> Result<Value, TemplateError> {
            let number = match &value {
                Value::Number(n) => n.clone(),
                Value::String(s) => match s.trim().parse::<serde_json::Number>() {
                    Ok(n) => n,
                    Err(_) => return Ok(value),
                },
                _ => return Ok(value),
            };

            let plain = match options.get_non_empty("decimals") {
                Some(decimals) => {
                    let decimals: usize = decimals.parse().map_err(|_| TemplateError::InvalidValue {
                        filter: name.to_string(),
                        message: format!("decimals must be a number, got '{}'", decimals),
                    })?;
                    format!("{:.*}", decimals, number.as_f64().unwrap_or_default())
                }
                None => number.to_string(),
            };

            let separator = Self::key_value(options.get("sep").unwrap_or(","));
            let point = Self::key_value(options.get("point").unwrap_or("."));
            Ok(Value::String(group_digits(&plain, separator, point)))
        }
    }

    /// Insert `separator` between thousands of a plain decimal number and
    /// replace its decimal point with `point`
    pub fn group_digits(plain: &str, separator: &str, point: &str) -> String {
        let (sign, unsigned) = match plain.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", plain),
        };
        let (integer, fraction) = match unsigned.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (unsigned, None),
        };

        let digits: Vec<char> = integer.chars().collect();
        let mut grouped = String::from(sign);
        for (i, digit) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push_str(separator);
            }
            grouped.push(*digit);
        }
        if let Some(fraction) = fraction {
            grouped.push_str(point);
            grouped.push_str(fraction);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListChoices;
    use crate::template::context::ChoiceSource;
    use crate::template::string::TemplateString;
    use serde_json::json;

    const LIST_CHOICES: &str = "key,value,value_de\n\
        cat,Cat,Katze\n\
        dog,Dog,Hund\n\
        fish,Fish,Fisch\n\
        guinea pig,Guinea pig,Meerschweinchen\n\
        lion,Lion,Löwe\n\
        gazelle,Gazelle,Gazelle\n\
        zebra,Zebra,Zebra\n\
        buffalo,Buffalo,Büffel";

    struct Choices(HashMap<String, ListChoices>);

    impl ChoiceSource for Choices {
        fn choices(&self, field_name: &str) -> Option<&ListChoices> {
            self.0.get(field_name)
        }
    }

    fn tags() -> Choices {
        let mut map = HashMap::new();
        map.insert("tags".to_string(), ListChoices::from_csv(LIST_CHOICES).unwrap());
        Choices(map)
    }

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
            "flag": false,
            "flag_text": "TRUE",
            "image": "https://iiif.example.org/img/1/full/0/default.jpg",
            "date": "2023-04-05",
            "timestamp": "2023-04-05T10:11:12+02:00",
            "amount": 1234567.891,
            "count": -12000
        })
    }

    fn render(source: &str) -> String {
        TemplateString::new(source)
            .unwrap()
            .render(&data(), &RenderContext::default())
    }

    #[test]
    fn test_builtin_registry() {
        let registry = FilterRegistry::builtin();
        for name in ["upper", "lower", "title", "capitalize", "bool", "fieldify", "badge", "pill", "img", "date", "number"] {
            assert!(registry.has_filter(name), "missing {}", name);
        }
        assert!(registry.get("sparkle").is_none());
    }

    #[test]
    fn test_string_case() {
        assert_eq!(render("{test_list|upper}"), "FISH, DOG, GUINEA PIG");
        assert_eq!(render("{test_list|title}"), "Fish, Dog, Guinea Pig");
        assert_eq!(render("{test_list|capitalize}"), "Fish, Dog, Guinea pig");
        assert_eq!(builtins::title_case("o'neil 1st"), "O'Neil 1St");
        assert_eq!(builtins::capitalize("hELLO"), "Hello");
    }

    #[test]
    fn test_bool() {
        assert_eq!(render("{flag|bool}"), "False");
        assert_eq!(render("{flag|bool:Yes,No}"), "No");
        assert_eq!(render("{flag_text|bool:Yes,No}"), "Yes");
        assert_eq!(render("{flag|bool:Yes,__none__}"), "");
    }

    #[test]
    fn test_fieldify_translates() {
        let choices = tags();
        let en = RenderContext::default().with_choices(&choices);
        let de = en.with_language("de");

        let template = TemplateString::new("I want to see the {test_value|fieldify:field=tags}").unwrap();
        assert_eq!(template.render(&data(), &en), "I want to see the Cat");
        assert_eq!(template.render(&data(), &de), "I want to see the Katze");

        let template = TemplateString::new("I want to see the {test_list|fieldify:field=tags}").unwrap();
        assert_eq!(template.render(&data(), &en), "I want to see the Fish, Dog, Guinea pig");
        assert_eq!(template.render(&data(), &de), "I want to see the Fisch, Hund, Meerschweinchen");

        let template =
            TemplateString::new("I want to see the {nested_data[nested_value]|fieldify:field=tags}").unwrap();
        assert_eq!(template.render(&data(), &de), "I want to see the Löwe");

        let template =
            TemplateString::new("I want to see the {nested_data.nested_list|fieldify:field=tags}").unwrap();
        assert_eq!(template.render(&data(), &en), "I want to see the Gazelle, Zebra, Buffalo");
        assert_eq!(template.render(&data(), &de), "I want to see the Gazelle, Zebra, Büffel");
    }

    #[test]
    fn test_fieldify_unknown_field_keeps_value() {
        let choices = tags();
        let ctx = RenderContext::default().with_choices(&choices);
        let template = TemplateString::new("{test_value|fieldify:field=colors}").unwrap();
        assert_eq!(template.render(&data(), &ctx), "cat");
    }

    #[test]
    fn test_fieldify_requires_field() {
        let ctx = RenderContext::default().with_show_errors(true);
        let template = TemplateString::new("{test_value|fieldify}").unwrap();
        assert!(template
            .render(&data(), &ctx)
            .contains("Filter fieldify requires option field."));
    }

    #[test]
    fn test_unexpected_option() {
        let ctx = RenderContext::default().with_show_errors(true);
        let template = TemplateString::new("{test_value|pill:size=3}").unwrap();
        assert!(template
            .render(&data(), &ctx)
            .contains("Filter pill does not allow attribute size."));
    }

    #[test]
    fn test_pill() {
        assert_eq!(
            render("I want to see the {test_value|pill:color=red}"),
            r#"I want to see the <span class="badge badge-primary" style="color: red;">cat</span>"#
        );
        assert_eq!(
            render("I want to see the {test_value|upper|pill:color=red}"),
            r#"I want to see the <span class="badge badge-primary" style="color: red;">CAT</span>"#
        );
        assert_eq!(
            render("{test_list|pill:color=blue}"),
            concat!(
                r#"<span class="badge badge-primary" style="color: blue;">fish</span>, "#,
                r#"<span class="badge badge-primary" style="color: blue;">dog</span>, "#,
                r#"<span class="badge badge-primary" style="color: blue;">guinea pig</span>"#
            )
        );
    }

    #[test]
    fn test_pill_objects() {
        assert_eq!(
            render("{another_test_list|pill}"),
            concat!(
                r#"<span class="badge badge-primary">{"key_1": "value_1", "key_2": "value_2"}</span>, "#,
                r#"<span class="badge badge-primary">{"key_1": "value_1", "key_2": "value_2"}</span>"#
            )
        );
        assert_eq!(
            render("{another_test_list|pill:value=key_1,color=val__key_2}"),
            concat!(
                r#"<span class="badge badge-primary" style="color: value_2;">value_1</span>, "#,
                r#"<span class="badge badge-primary" style="color: value_2;">value_1</span>"#
            )
        );
        assert_eq!(
            render("{another_test_list|pill:value=key_1,color=byval__key_2}"),
            concat!(
                r#"<span class="badge badge-primary" style="color: hsl(116, 100%, 50%);">value_1</span>, "#,
                r#"<span class="badge badge-primary" style="color: hsl(116, 100%, 50%);">value_1</span>"#
            )
        );
        assert_eq!(
            render("{another_test_list.0|badge:value=missing}"),
            r#"<span class="badge badge-primary">KEY_ERROR</span>"#
        );
    }

    #[test]
    fn test_pill_color_classes() {
        assert_eq!(
            render("{test_value|pill:color=danger,bg=light}"),
            r#"<span class="badge badge-danger bg-light">cat</span>"#
        );
        assert_eq!(
            render("{test_value|pill:bg=#eee}"),
            r##"<span class="badge badge-primary" style="background-color: #eee;">cat</span>"##
        );
    }

    #[test]
    fn test_img() {
        assert_eq!(
            render("{image|img}"),
            r#"<img src="https://iiif.example.org/img/1/full/0/default.jpg" class="img-fluid" alt="Responsive image">"#
        );
        assert_eq!(
            render("{image|img:iiif_resize=50,alt=Scan}"),
            r#"<img src="https://iiif.example.org/img/1/pct:50/0/default.jpg" class="img-fluid" alt="Scan">"#
        );
    }

    #[test]
    fn test_date() {
        assert_eq!(render("{date|date}"), "05.04.2023");
        assert_eq!(render("{date|date:format=iso}"), "2023-04-05");
        assert_eq!(render("{timestamp|date:us}"), "04/05/2023");
        assert_eq!(render("{date|date:format=long}"), "5 April 2023");
        assert_eq!(render("{test_value|date}"), "cat");
        assert_eq!(render("{timestamp|date:format=%H:%M}"), "10:11");
    }

    #[test]
    fn test_number() {
        assert_eq!(render("{amount|number:decimals=2}"), "1,234,567.89");
        assert_eq!(render("{amount|number:decimals=1,sep=__space__,point=__comma__}"), "1 234 567,9");
        assert_eq!(render("{count|number:sep=__none__}"), "-12000");
        assert_eq!(render("{count|number}"), "-12,000");
        assert_eq!(render("{test_value|number}"), "cat");
    }

    #[test]
    fn test_custom_filter_registration() {
        struct Reverse;
        impl TemplateFilter for Reverse {
            fn apply(
                &self,
                _name: &str,
                value: Value,
                _options: &FilterOptions,
                _ctx: &RenderContext<'_>,
            ) -> Result<Value, TemplateError> {
                Ok(Value::String(value.as_str().unwrap_or_default().chars().rev().collect()))
            }
        }

        let mut registry = FilterRegistry::with_builtins();
        registry.register("reverse", Reverse);
        let ctx = RenderContext::default().with_filters(&registry);
        let template = TemplateString::new("{test_value|reverse|upper}").unwrap();
        assert_eq!(template.render(&data(), &ctx), "TAC");
    }
}
