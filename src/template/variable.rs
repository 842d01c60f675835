//! Template string variables
//!
//! A variable is the content of one `{...}` token:
//!
//! ```text
//! {variable|filter1[:option[=value][,option...]]|filter2|filter3}
//! ```
//!
//! The variable names a value in the data. Nested values use dots
//! (`nested.value`) or brackets (`nested[value]`); numeric keys index lists.
//! Filters run left to right. Named options become `name=value` pairs, bare
//! options become positional `o0`, `o1`, ...

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::context::RenderContext;
use super::error::TemplateError;

static SINGLE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());
static DOT_KEYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+(\.\w+)+$").unwrap());
static BRACKET_KEYS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+(\[\w+?\])+$").unwrap());

/// Options of one filter, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    entries: Vec<(String, String)>,
}

impl FilterOptions {
    /// Parse `a=1,b,c=3` into `a=1`, `o1=b`, `c=3`
    pub fn parse(options: &str) -> Self {
        let mut entries = Vec::new();
        for (position, option) in options.split(',').enumerate() {
            if option.is_empty() {
                continue;
            }
            match option.split_once('=') {
                Some((key, value)) => entries.push((key.to_string(), value.to_string())),
                None => entries.push((format!("o{}", position), option.to_string())),
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Option value, treating empty values as absent
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A filter invocation inside a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub options: FilterOptions,
}

impl FilterSpec {
    /// `name` or `name:options`; only the first `:` separates them
    fn parse(part: &str) -> Self {
        match part.split_once(':') {
            Some((name, options)) => Self {
                name: name.to_string(),
                options: FilterOptions::parse(options),
            },
            None => Self {
                name: part.to_string(),
                options: FilterOptions::default(),
            },
        }
    }
}

/// One parsed `{...}` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariable {
    raw: String,
    variable: String,
    keys: Vec<String>,
    filters: Vec<FilterSpec>,
}

impl TemplateVariable {
    /// Parse the content of a token (without the braces)
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut parts = raw.split('|');
        let variable = parts.next().unwrap_or_default().to_string();
        let filters = parts.map(FilterSpec::parse).collect();
        let keys = parse_keys(&variable)?;

        Ok(Self {
            raw: raw.to_string(),
            variable,
            keys,
            filters,
        })
    }

    /// The token content including filters
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The variable name without filters
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn is_nested(&self) -> bool {
        self.keys.len() > 1
    }

    /// The value in `data` before filters
    pub fn raw_value<'d>(&self, data: &'d Value) -> Result<&'d Value, TemplateError> {
        let mut current = data;
        for key in &self.keys {
            current = match current {
                Value::Object(map) => map
                    .get(key)
                    .ok_or_else(|| TemplateError::KeyNotFound(key.clone()))?,
                Value::Array(items) => {
                    let index: usize = key
                        .parse()
                        .map_err(|_| TemplateError::KeyNotFound(key.clone()))?;
                    items
                        .get(index)
                        .ok_or_else(|| TemplateError::IndexOutOfRange(key.clone()))?
                }
                _ => return Err(TemplateError::KeyNotFound(key.clone())),
            };
        }
        Ok(current)
    }

    /// The value in `data` with all filters applied.
    ///
    /// List values are filtered item by item; items a filter turns into
    /// `null` are dropped.
    pub fn value(&self, data: &Value, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
        let raw = self.raw_value(data)?;
        if self.filters.is_empty() {
            return Ok(raw.clone());
        }

        match raw {
            Value::Array(items) => {
                let mut filtered = Vec::with_capacity(items.len());
                for item in items {
                    let applied = self.apply_filters(item.clone(), ctx)?;
                    if !applied.is_null() {
                        filtered.push(applied);
                    }
                }
                Ok(Value::Array(filtered))
            }
            other => self.apply_filters(other.clone(), ctx),
        }
    }

    fn apply_filters(&self, mut value: Value, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
        for spec in &self.filters {
            let filter = ctx
                .filters
                .get(&spec.name)
                .ok_or_else(|| TemplateError::UnknownFilter(spec.name.clone()))?;
            filter.check_options(&spec.name, &spec.options)?;
            value = filter.apply(&spec.name, value, &spec.options, ctx)?;
        }
        Ok(value)
    }
}

/// Split a variable into its keys
fn parse_keys(variable: &str) -> Result<Vec<String>, TemplateError> {
    if SINGLE_KEY.is_match(variable) {
        return Ok(vec![variable.to_string()]);
    }
    if DOT_KEYS.is_match(variable) {
        return Ok(variable.split('.').map(str::to_string).collect());
    }
    if BRACKET_KEYS.is_match(variable) {
        return Ok(variable
            .split(['[', ']'])
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect());
    }
    Err(TemplateError::InvalidVariable(variable.to_string()))
}
