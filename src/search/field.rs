//! Typed search input
//!
//! A [`FieldConfiguration`] pairs a search field with the value a user
//! entered for it, converted according to the field's type.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{DataFieldType, FieldType, ListCondition, SearchField};

use super::error::SearchError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A converted input value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    /// Values of a multi list
    Many(Vec<FieldValue>),
    /// Keys of a boolean list with the flag to search for
    Flags(Vec<(String, bool)>),
    Date(NaiveDate),
    DateRange(Option<NaiveDate>, Option<NaiveDate>),
    /// Inclusive number range
    Range(i64, i64),
}

impl FieldValue {
    /// Form used in URL parameters
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Many(values) => values
                .iter()
                .map(FieldValue::to_query_string)
                .collect::<Vec<_>>()
                .join(","),
            Self::Flags(flags) => flags
                .iter()
                .map(|(key, flag)| format!("{}__{}", key, flag))
                .collect::<Vec<_>>()
                .join(","),
            Self::Date(date) => date.format(DATE_FORMAT).to_string(),
            Self::DateRange(from, to) => format!(
                "{},{}",
                from.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
                to.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default()
            ),
            Self::Range(from, to) => format!("{}-{}", from, to),
        }
    }

    /// Form used in query documents
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => json!(s),
            Self::Integer(n) => json!(n),
            Self::Bool(b) => json!(b),
            Self::Many(values) => Value::Array(values.iter().map(FieldValue::to_json).collect()),
            Self::Flags(flags) => flags
                .iter()
                .map(|(key, flag)| json!({ key.as_str(): flag }))
                .collect(),
            Self::Date(date) => json!(date.format(DATE_FORMAT).to_string()),
            Self::DateRange(..) | Self::Range(..) => json!(self.to_query_string()),
        }
    }
}

/// A search field with its converted user input
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConfiguration {
    field: SearchField,
    value: FieldValue,
    user_condition: Option<ListCondition>,
}

impl FieldConfiguration {
    /// Convert raw form values for `field`.
    ///
    /// List types read every value, all other types the first one.
    pub fn new(field: &SearchField, raw: &[String]) -> Result<Self, SearchError> {
        let first = raw.first().map(String::as_str).unwrap_or_default();

        let value = match field.field_type {
            FieldType::MultiList => {
                let keys: Vec<&str> = raw.iter().map(|v| list_key(v)).collect();
                match transformation(field) {
                    Some(pattern) if field.data_field_type == DataFieldType::String => {
                        FieldValue::Text(pattern.replace("{_value_}", &format!("({})", keys.join("|"))))
                    }
                    _ => FieldValue::Many(
                        keys.into_iter()
                            .map(|key| convert(field, key))
                            .collect::<Result<_, _>>()?,
                    ),
                }
            }
            FieldType::BooleanList => FieldValue::Flags(
                raw.iter()
                    .map(|v| match v.split_once("__") {
                        Some((key, flag)) if !flag.contains("__") => (key.to_string(), flag == "true"),
                        _ => (v.clone(), true),
                    })
                    .collect(),
            ),
            FieldType::List => convert(field, list_key(first))?,
            FieldType::Boolean => FieldValue::Bool(parse_flag(first)),
            FieldType::Date => FieldValue::Date(parse_date(field, first)?),
            FieldType::DateRange => {
                let (from, to) = first.split_once(',').unwrap_or((first, ""));
                FieldValue::DateRange(parse_optional_date(field, from)?, parse_optional_date(field, to)?)
            }
            FieldType::NumberRange => match parse_range(first) {
                Some((from, to)) => FieldValue::Range(from, to),
                None => convert(field, first)?,
            },
            FieldType::String | FieldType::Number => convert(field, first)?,
        };

        Ok(Self {
            field: field.clone(),
            value,
            user_condition: None,
        })
    }

    /// Override the field's and/or condition
    pub fn with_condition(mut self, condition: ListCondition) -> Self {
        self.user_condition = Some(condition);
        self
    }

    pub fn field(&self) -> &SearchField {
        &self.field
    }

    pub fn field_type(&self) -> FieldType {
        self.field.field_type
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// API parameter name, defaulting to the field name
    pub fn parameter(&self) -> &str {
        match self.field.api_parameter.as_deref() {
            Some(param) if !param.is_empty() => param,
            _ => &self.field.field_name,
        }
    }

    /// Active and/or condition
    pub fn condition(&self) -> ListCondition {
        self.user_condition.unwrap_or(self.field.list_condition)
    }
}

/// Key part of a `key__suffix` list value
fn list_key(value: &str) -> &str {
    match value.split_once("__") {
        Some((key, rest)) if !rest.contains("__") => key,
        _ => value,
    }
}

fn transformation(field: &SearchField) -> Option<&str> {
    field
        .input_transformation_regex
        .as_deref()
        .filter(|pattern| pattern.contains("{_value_}"))
}

/// Apply the field's data type and input transformation
fn convert(field: &SearchField, value: &str) -> Result<FieldValue, SearchError> {
    match field.data_field_type {
        DataFieldType::Int => value
            .trim()
            .parse()
            .map(FieldValue::Integer)
            .map_err(|_| SearchError::invalid_value(&field.field_name, format!("'{}' is not a number", value))),
        DataFieldType::Boolean => Ok(FieldValue::Bool(parse_flag(value))),
        DataFieldType::String => Ok(FieldValue::Text(match transformation(field) {
            Some(pattern) => pattern.replace("{_value_}", value),
            None => value.to_string(),
        })),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes")
}

fn parse_date(field: &SearchField, value: &str) -> Result<NaiveDate, SearchError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| SearchError::invalid_value(&field.field_name, format!("'{}' is not a date", value)))
}

fn parse_optional_date(field: &SearchField, value: &str) -> Result<Option<NaiveDate>, SearchError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(field, value).map(Some)
    }
}

fn parse_range(value: &str) -> Option<(i64, i64)> {
    let (from, to) = value.split_once('-')?;
    Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
}
