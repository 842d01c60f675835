//! Search field model
//!
//! A search field serves two purposes: it describes an input of a search form
//! and it tells the query builders which API parameter the input maps to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Form field type of a search field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    List,
    MultiList,
    Boolean,
    BooleanList,
    Date,
    DateRange,
    NumberRange,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::List => "list",
            Self::MultiList => "multi_list",
            Self::Boolean => "boolean",
            Self::BooleanList => "boolean_list",
            Self::Date => "date",
            Self::DateRange => "date_range",
            Self::NumberRange => "number_range",
        };
        write!(f, "{}", name)
    }
}

/// Type the API expects for a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataFieldType {
    #[default]
    String,
    Int,
    Boolean,
}

/// How multiple selected values are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListCondition {
    #[default]
    And,
    Or,
}

impl std::str::FromStr for ListCondition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(anyhow::anyhow!("Invalid list condition: {}", s)),
        }
    }
}

/// A configured search field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchField {
    /// Form name of the field, unique within a catalog
    pub field_name: String,
    #[serde(default)]
    pub field_label: String,
    #[serde(default)]
    pub field_type: FieldType,
    /// API parameter the value is sent as; falls back to the field name
    #[serde(default)]
    pub api_parameter: Option<String>,
    #[serde(default)]
    pub data_field_type: DataFieldType,
    /// Pattern containing `{_value_}` that wraps string input
    #[serde(default)]
    pub input_transformation_regex: Option<String>,
    /// CSV text with a `key` column and `value`, `value_<lang>`, `info`... columns
    #[serde(default)]
    pub list_choices: Option<String>,
    #[serde(default)]
    pub list_condition: ListCondition,
    #[serde(default)]
    pub field_required: bool,
    #[serde(default)]
    pub help_text: String,
}

impl SearchField {
    /// Parse the list choices of this field
    pub fn choices(&self) -> Result<ListChoices, csv::Error> {
        match &self.list_choices {
            Some(text) if !text.trim().is_empty() => ListChoices::from_csv(text),
            _ => Ok(ListChoices::default()),
        }
    }
}

/// One row of a choice list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListChoice {
    pub key: String,
    pub columns: HashMap<String, String>,
}

/// Parsed choice list of a search field, in CSV order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListChoices {
    items: Vec<ListChoice>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ListChoices {
    /// Parse CSV text whose header contains a `key` column
    pub fn from_csv(text: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.trim().as_bytes());

        let headers = reader.headers()?.clone();
        let mut choices = Self::default();

        for record in reader.records() {
            let record = record?;
            let mut columns = HashMap::new();
            for (header, value) in headers.iter().zip(record.iter()) {
                columns.insert(header.to_string(), value.to_string());
            }
            let Some(key) = columns.get("key").cloned() else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            choices.index.insert(key.clone(), choices.items.len());
            choices.items.push(ListChoice { key, columns });
        }

        Ok(choices)
    }

    pub fn get(&self, key: &str) -> Option<&ListChoice> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListChoice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display label of `key` in `language`.
    ///
    /// English reads the `value` column, other languages `value_<lang>` with
    /// `value` as fallback. Unknown keys return `None`.
    pub fn label(&self, key: &str, language: &str) -> Option<&str> {
        self.column(key, "value", language)
    }

    /// Info text of `key` in `language`, same lookup rules as [`label`](Self::label)
    pub fn info(&self, key: &str, language: &str) -> Option<&str> {
        self.column(key, "info", language)
    }

    fn column(&self, key: &str, base: &str, language: &str) -> Option<&str> {
        let choice = self.get(key)?;
        if language != "en" {
            let translated = format!("{}_{}", base, language);
            if let Some(value) = choice.columns.get(&translated).filter(|v| !v.is_empty()) {
                return Some(value.as_str());
            }
        }
        choice.columns.get(base).map(String::as_str)
    }
}
