//! NDR Core API backend
//!
//! Queries look like `{base}query/{type}?s={size}&p={page}&t={term}`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::models::{ApiConfiguration, ListCondition, ResultError, SearchConfiguration};
use crate::search::error::SearchError;
use crate::search::field::FieldConfiguration;
use crate::search::http::HttpFetcher;
use crate::search::query::{BackendQuery, QueryKind, QueryState, SearchQuery};
use crate::search::result::{download_json, ResultBackend, ResultPage};

use super::{as_u32, as_u64};

pub struct NdrCoreQuery {
    state: QueryState,
    list_name: String,
    tags: Vec<String>,
}

impl NdrCoreQuery {
    pub fn new(search: &SearchConfiguration, api: &ApiConfiguration, page: u32) -> Self {
        Self {
            state: QueryState::new(search, api, page),
            list_name: String::new(),
            tags: Vec::new(),
        }
    }

    /// `{base}query/{query_type}`, with `?s=..&p=..` when asked
    fn base_string(&self, query_type: &str, add_page_and_size: bool) -> String {
        let mut base = self.state.base_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        base.push_str("query/");
        base.push_str(query_type);
        if add_page_and_size {
            base.push_str(&format!("?s={}&p={}", self.state.page_size(), self.state.page));
        }
        base
    }
}

fn divider(add_page_and_size: bool) -> char {
    if add_page_and_size {
        '&'
    } else {
        '?'
    }
}

impl SearchQuery for NdrCoreQuery {
    fn simple(
        &mut self,
        term: &str,
        add_page_and_size: bool,
        _and_or: ListCondition,
    ) -> Result<BackendQuery, SearchError> {
        self.state.search_term = term.to_string();
        let query = format!(
            "{}{}t={}",
            self.base_string(QueryKind::Simple.path_segment(), add_page_and_size),
            divider(add_page_and_size),
            urlencoding::encode(term)
        );
        debug!("Composed simple query: {}", query);
        Ok(BackendQuery::Url(query))
    }

    fn advanced(&mut self, add_page_and_size: bool) -> Result<BackendQuery, SearchError> {
        let mut query = self.base_string(QueryKind::Advanced.path_segment(), add_page_and_size);
        let mut param_divider = divider(add_page_and_size);
        for value in &self.state.values {
            query.push(param_divider);
            query.push_str(&format!(
                "{}={}",
                value.parameter(),
                urlencoding::encode(&value.value().to_query_string())
            ));
            param_divider = '&';
        }
        debug!("Composed advanced query: {}", query);
        Ok(BackendQuery::Url(query))
    }

    fn list(
        &mut self,
        list_name: &str,
        add_page_and_size: bool,
        term: Option<&str>,
        tags: &[String],
    ) -> Result<BackendQuery, SearchError> {
        self.list_name = list_name.to_string();
        self.tags = tags.to_vec();
        self.state.search_term = term.unwrap_or_default().to_string();

        let mut query = format!(
            "{}{}l={}",
            self.base_string(QueryKind::List.path_segment(), add_page_and_size),
            divider(add_page_and_size),
            urlencoding::encode(list_name)
        );
        if let Some(term) = term {
            query.push_str(&format!("&t={}", urlencoding::encode(term)));
        }
        if !tags.is_empty() {
            let tags: Vec<_> = tags.iter().map(|t| urlencoding::encode(t)).collect();
            query.push_str(&format!("&tags={}", tags.join(",")));
        }
        Ok(BackendQuery::Url(query))
    }

    fn record(&self, record_id: &str) -> Result<BackendQuery, SearchError> {
        Ok(BackendQuery::Url(format!(
            "{}?id={}",
            self.base_string("fulldata", false),
            urlencoding::encode(record_id)
        )))
    }

    fn explain(&mut self, kind: QueryKind) -> Result<BackendQuery, SearchError> {
        let query = match kind {
            QueryKind::Simple => {
                let term = self.state.search_term.clone();
                self.simple(&term, false, ListCondition::And)?
            }
            QueryKind::Advanced => self.advanced(false)?,
            QueryKind::List => {
                let (name, tags) = (self.list_name.clone(), self.tags.clone());
                let term = Some(self.state.search_term.clone()).filter(|t| !t.is_empty());
                self.list(&name, false, term.as_deref(), &tags)?
            }
        };

        let segment = kind.path_segment();
        let url = query.as_url().unwrap_or_default().replace(
            &format!("query/{}", segment),
            &format!("query/{}_explain", segment),
        );
        Ok(BackendQuery::Url(url))
    }

    fn set_value(&mut self, value: FieldConfiguration) {
        self.state.set_value(value);
    }

    fn search_term(&self) -> &str {
        &self.state.search_term
    }
}

/// Reads `{total, page, size, hits}` responses
pub struct NdrCoreResult {
    fetcher: HttpFetcher,
}

impl NdrCoreResult {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ResultBackend for NdrCoreResult {
    async fn download(&self, query: &BackendQuery, _page_size: u32) -> Result<Value, ResultError> {
        download_json(self, &self.fetcher, query, &[]).await
    }

    fn meta(&self, raw: &Value, page_size: u32) -> ResultPage {
        ResultPage::new(
            as_u64(raw.get("total")).unwrap_or_default(),
            as_u32(raw.get("page")).unwrap_or(1),
            as_u32(raw.get("size")).unwrap_or(page_size),
        )
    }

    fn hits(&self, raw: Value) -> Vec<Value> {
        match raw {
            Value::Object(mut map) => match map.remove("hits") {
                Some(Value::Array(hits)) => hits,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}
