//! Portal catalog
//!
//! The catalog is the complete portal definition: API connections, search
//! fields and search configurations. It is loaded from the configuration file
//! and validated once at startup.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{ApiConfiguration, ListChoices, SearchConfiguration, SearchField};
use crate::template::ChoiceSource;

/// Catalog validation errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("Search '{search}' references unknown API '{api}'")]
    UnknownApi { search: String, api: String },
    #[error("Search '{search}' references unknown search field '{field}'")]
    UnknownField { search: String, field: String },
    #[error("Search '{search}': form field '{field}' must have column and size between 1 and 12")]
    InvalidGrid { search: String, field: String },
    #[error("Invalid list choices of field '{field}': {message}")]
    InvalidChoices { field: String, message: String },
}

/// The full portal definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub apis: Vec<ApiConfiguration>,
    #[serde(default)]
    pub search_fields: Vec<SearchField>,
    #[serde(default)]
    pub searches: Vec<SearchConfiguration>,
    #[serde(skip)]
    choices: HashMap<String, ListChoices>,
}

impl Catalog {
    pub fn new(
        apis: Vec<ApiConfiguration>,
        search_fields: Vec<SearchField>,
        searches: Vec<SearchConfiguration>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            apis,
            search_fields,
            searches,
            choices: HashMap::new(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check references and parse all choice lists
    pub fn validate(&mut self) -> Result<(), CatalogError> {
        check_unique("API", self.apis.iter().map(|a| a.name.as_str()))?;
        check_unique("search field", self.search_fields.iter().map(|f| f.field_name.as_str()))?;
        check_unique("search", self.searches.iter().map(|s| s.conf_name.as_str()))?;

        for search in &self.searches {
            if self.api(&search.api).is_none() {
                return Err(CatalogError::UnknownApi {
                    search: search.conf_name.clone(),
                    api: search.api.clone(),
                });
            }
            for form_field in &search.form_fields {
                if self.field(&form_field.field).is_none() {
                    return Err(CatalogError::UnknownField {
                        search: search.conf_name.clone(),
                        field: form_field.field.clone(),
                    });
                }
                if !(1..=12).contains(&form_field.column) || !(1..=12).contains(&form_field.size) {
                    return Err(CatalogError::InvalidGrid {
                        search: search.conf_name.clone(),
                        field: form_field.field.clone(),
                    });
                }
            }
        }

        let mut choices = HashMap::new();
        for field in &self.search_fields {
            let parsed = field.choices().map_err(|e| CatalogError::InvalidChoices {
                field: field.field_name.clone(),
                message: e.to_string(),
            })?;
            if !parsed.is_empty() {
                choices.insert(field.field_name.clone(), parsed);
            }
        }
        self.choices = choices;

        Ok(())
    }

    pub fn api(&self, name: &str) -> Option<&ApiConfiguration> {
        self.apis.iter().find(|a| a.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.search_fields.iter().find(|f| f.field_name == name)
    }

    pub fn search(&self, name: &str) -> Option<&SearchConfiguration> {
        self.searches.iter().find(|s| s.conf_name == name)
    }

    pub fn searches(&self) -> &[SearchConfiguration] {
        &self.searches
    }

    /// Search fields placed in the form of `search`
    pub fn fields_of<'a>(&'a self, search: &'a SearchConfiguration) -> Vec<&'a SearchField> {
        search.field_names().filter_map(|name| self.field(name)).collect()
    }
}

impl ChoiceSource for Catalog {
    fn choices(&self, field_name: &str) -> Option<&ListChoices> {
        self.choices.get(field_name)
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CatalogError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
