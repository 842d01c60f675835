//! Query composition
//!
//! Every backend implements [`SearchQuery`]: it turns a search term, list
//! name or set of field values into something its result loader can send,
//! either a URL or a query document.

use serde::Serialize;
use serde_json::Value;

use crate::models::{ApiConfiguration, ListCondition, SearchConfiguration};

use super::error::SearchError;
use super::field::FieldConfiguration;

/// The kinds of list queries a search form can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Simple,
    Advanced,
    List,
}

impl QueryKind {
    /// Path segment of this kind in NDR Core API URLs
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Simple => "basic",
            Self::Advanced => "advanced",
            Self::List => "list",
        }
    }
}

impl std::str::FromStr for QueryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" | "basic" => Ok(Self::Simple),
            "advanced" => Ok(Self::Advanced),
            "list" => Ok(Self::List),
            _ => Err(anyhow::anyhow!("Invalid query type: {}", s)),
        }
    }
}

/// A composed query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackendQuery {
    /// Sent as an HTTP GET
    Url(String),
    /// Sent to a document database
    Document(Value),
}

impl BackendQuery {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&Value> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Url(_) => None,
        }
    }
}

impl std::fmt::Display for BackendQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Document(doc) => write!(f, "{}", doc),
        }
    }
}

/// State shared by all query builders
#[derive(Debug, Clone)]
pub struct QueryState {
    pub search: SearchConfiguration,
    pub api: ApiConfiguration,
    /// 1-based page
    pub page: u32,
    pub values: Vec<FieldConfiguration>,
    pub search_term: String,
}

impl QueryState {
    pub fn new(search: &SearchConfiguration, api: &ApiConfiguration, page: u32) -> Self {
        Self {
            search: search.clone(),
            api: api.clone(),
            page: page.max(1),
            values: Vec::new(),
            search_term: String::new(),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.search.effective_page_size(self.api.page_size)
    }

    /// Connection URL of the API, e.g. `https://api-host.com:80/`
    pub fn base_string(&self) -> String {
        self.api.connection_url()
    }

    /// Store a field value, replacing an earlier value of the same field
    pub fn set_value(&mut self, value: FieldConfiguration) {
        self.values
            .retain(|v| v.field().field_name != value.field().field_name);
        self.values.push(value);
    }
}

/// Query builder of one backend
pub trait SearchQuery: Send + Sync {
    /// Full text query for `term`
    fn simple(
        &mut self,
        term: &str,
        add_page_and_size: bool,
        and_or: ListCondition,
    ) -> Result<BackendQuery, SearchError>;

    /// Query over the field values set with [`set_value`](Self::set_value)
    fn advanced(&mut self, add_page_and_size: bool) -> Result<BackendQuery, SearchError>;

    /// Query for the named list, optionally narrowed by a term and tags
    fn list(
        &mut self,
        list_name: &str,
        add_page_and_size: bool,
        term: Option<&str>,
        tags: &[String],
    ) -> Result<BackendQuery, SearchError>;

    /// Query for a single record
    fn record(&self, record_id: &str) -> Result<BackendQuery, SearchError>;

    /// Query explaining how `kind` would be executed
    fn explain(&mut self, kind: QueryKind) -> Result<BackendQuery, SearchError>;

    fn set_value(&mut self, value: FieldConfiguration);

    /// Term of the last simple or list query
    fn search_term(&self) -> &str;
}
