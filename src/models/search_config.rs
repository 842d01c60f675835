//! Search configuration model
//!
//! A search configuration binds an API connection, a set of search fields and
//! the layout of the search form and result cards into one searchable dataset.

use serde::{Deserialize, Serialize};

/// Placement of a search field in the form grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFormField {
    /// Name of the search field
    pub field: String,
    /// Row in the form, starting with 1
    #[serde(default = "default_one")]
    pub row: u32,
    /// Column in the form, 1 to 12
    #[serde(default = "default_one")]
    pub column: u32,
    /// Width of the field, 1 to 12
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_one() -> u32 {
    1
}

fn default_size() -> u32 {
    12
}

/// A field of a result card, rendered from a template string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultField {
    #[serde(default)]
    pub label: String,
    /// Template string, e.g. `{title|upper} ({year})`
    pub expression: String,
}

/// A column of the CSV bulk export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvField {
    pub header: String,
    /// Dotted path into a result record
    pub field: String,
}

/// A searchable dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfiguration {
    /// Identifier, used in URLs and form parameter names
    pub conf_name: String,
    #[serde(default)]
    pub conf_label: String,
    /// Name of the API configuration to query
    pub api: String,
    /// Overrides the API's page size
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Record key holding the id of a result
    #[serde(default = "default_id_field")]
    pub search_id_field: String,
    #[serde(default = "default_id_field")]
    pub sort_field: String,
    /// Field searched by simple (full text) searches on document backends
    #[serde(default)]
    pub simple_query_main_field: Option<String>,
    /// Template string producing a link to the source repository of a record
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Template string producing the identifier of the manifest a record
    /// comes from; enables the "view source" option
    #[serde(default)]
    pub manifest_relation_expression: Option<String>,
    /// Template string producing the manifest page of a record
    #[serde(default)]
    pub manifest_page_expression: Option<String>,
    /// Whether a simple search box is offered
    #[serde(default = "default_true")]
    pub simple_search: bool,
    #[serde(default)]
    pub form_fields: Vec<SearchFormField>,
    #[serde(default)]
    pub result_fields: Vec<ResultField>,
    #[serde(default)]
    pub compact_fields: Vec<ResultField>,
    #[serde(default)]
    pub csv_fields: Vec<CsvField>,
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

impl SearchConfiguration {
    /// Page size of this search, falling back to the API's
    pub fn effective_page_size(&self, api_page_size: u32) -> u32 {
        self.page_size.filter(|s| *s > 0).unwrap_or(api_page_size).max(1)
    }

    /// Names of the search fields placed in the form
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.form_fields.iter().map(|f| f.field.as_str())
    }

    /// Form rows in order, each row sorted by column
    pub fn form_rows(&self) -> Vec<Vec<&SearchFormField>> {
        let mut fields: Vec<&SearchFormField> = self.form_fields.iter().collect();
        fields.sort_by_key(|f| (f.row, f.column));

        let mut rows: Vec<Vec<&SearchFormField>> = Vec::new();
        for field in fields {
            match rows.last_mut() {
                Some(row) if row[0].row == field.row => row.push(field),
                _ => rows.push(vec![field]),
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf: SearchConfiguration =
            serde_yaml::from_str("conf_name: letters\napi: archive\n").unwrap();
        assert_eq!(conf.search_id_field, "id");
        assert!(conf.simple_search);
        assert_eq!(conf.effective_page_size(25), 25);
    }

    #[test]
    fn test_page_size_override() {
        let conf: SearchConfiguration =
            serde_yaml::from_str("conf_name: letters\napi: archive\npage_size: 50\n").unwrap();
        assert_eq!(conf.effective_page_size(10), 50);
    }

    #[test]
    fn test_form_rows() {
        let conf: SearchConfiguration = serde_yaml::from_str(
            r#"
conf_name: letters
api: archive
form_fields:
  - { field: year, row: 2, column: 7, size: 6 }
  - { field: sender, row: 1, column: 1, size: 12 }
  - { field: place, row: 2, column: 1, size: 6 }
"#,
        )
        .unwrap();

        let rows = conf.form_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].field, "sender");
        assert_eq!(rows[1][0].field, "place");
        assert_eq!(rows[1][1].field, "year");
    }
}
