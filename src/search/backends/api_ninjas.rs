//! API-Ninjas backend
//!
//! Simple searches look up `?name=<term>`; advanced searches send every field
//! value as a parameter. Responses are plain JSON lists.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{ApiConfiguration, ApiType, ListCondition, ResultError, SearchConfiguration};
use crate::search::error::SearchError;
use crate::search::field::FieldConfiguration;
use crate::search::http::HttpFetcher;
use crate::search::query::{BackendQuery, QueryKind, QueryState, SearchQuery};
use crate::search::result::{download_json, ResultBackend, ResultPage};

pub struct ApiNinjasQuery {
    state: QueryState,
}

impl ApiNinjasQuery {
    pub fn new(search: &SearchConfiguration, api: &ApiConfiguration, page: u32) -> Self {
        Self {
            state: QueryState::new(search, api, page),
        }
    }
}

/// `base?k=v&k2=v2` over the values of `state`
pub(super) fn parameter_query(base: &str, state: &QueryState) -> String {
    let params: Vec<String> = state
        .values
        .iter()
        .map(|value| {
            format!(
                "{}={}",
                value.parameter(),
                urlencoding::encode(&value.value().to_query_string())
            )
        })
        .collect();
    format!("{}?{}", base, params.join("&"))
}

impl SearchQuery for ApiNinjasQuery {
    fn simple(
        &mut self,
        term: &str,
        _add_page_and_size: bool,
        _and_or: ListCondition,
    ) -> Result<BackendQuery, SearchError> {
        self.state.search_term = term.to_string();
        Ok(BackendQuery::Url(format!(
            "{}?name={}",
            self.state.base_string(),
            urlencoding::encode(term)
        )))
    }

    fn advanced(&mut self, _add_page_and_size: bool) -> Result<BackendQuery, SearchError> {
        Ok(BackendQuery::Url(parameter_query(&self.state.base_string(), &self.state)))
    }

    fn list(
        &mut self,
        _list_name: &str,
        _add_page_and_size: bool,
        _term: Option<&str>,
        _tags: &[String],
    ) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::ApiNinjas, "list"))
    }

    fn record(&self, _record_id: &str) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::ApiNinjas, "record"))
    }

    fn explain(&mut self, _kind: QueryKind) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::ApiNinjas, "explain"))
    }

    fn set_value(&mut self, value: FieldConfiguration) {
        self.state.set_value(value);
    }

    fn search_term(&self) -> &str {
        &self.state.search_term
    }
}

/// Reads JSON list responses, sending the API key as `X-Api-Key`
pub struct ApiNinjasResult {
    fetcher: HttpFetcher,
    auth_key: Option<String>,
}

impl ApiNinjasResult {
    pub fn new(fetcher: HttpFetcher, auth_key: Option<String>) -> Self {
        Self { fetcher, auth_key }
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.auth_key
            .iter()
            .map(|key| ("X-Api-Key".to_string(), key.clone()))
            .collect()
    }
}

#[async_trait]
impl ResultBackend for ApiNinjasResult {
    async fn download(&self, query: &BackendQuery, _page_size: u32) -> Result<Value, ResultError> {
        download_json(self, &self.fetcher, query, &self.headers()).await
    }

    /// The whole list is one page
    fn meta(&self, raw: &Value, _page_size: u32) -> ResultPage {
        let total = raw.as_array().map(Vec::len).unwrap_or_default() as u64;
        ResultPage {
            total,
            page: 1,
            page_size: total.max(1) as u32,
            num_pages: 1,
        }
    }

    fn hits(&self, raw: Value) -> Vec<Value> {
        match raw {
            Value::Array(hits) => hits,
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataFieldType, FieldType, Protocol, SearchField};
    use crate::search::result::{RequestContext, SearchResult};
    use axum::{http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;

    fn api(host: &str, port: u16) -> ApiConfiguration {
        ApiConfiguration {
            name: "ninjas".to_string(),
            label: "Animals".to_string(),
            api_type: ApiType::ApiNinjas,
            protocol: Protocol::Http,
            host: host.to_string(),
            port,
            path: "v1/animals".to_string(),
            user: None,
            password: None,
            auth_key: Some("secret".to_string()),
            page_size: 10,
        }
    }

    fn search() -> SearchConfiguration {
        serde_yaml::from_str("conf_name: animals\napi: ninjas\n").unwrap()
    }

    #[test]
    fn test_queries() {
        let mut q = ApiNinjasQuery::new(&search(), &api("api.example.com", 443), 1);
        assert_eq!(
            q.simple("red fox", true, ListCondition::And).unwrap().to_string(),
            "http://api.example.com:443/v1/animals?name=red%20fox"
        );

        let field = |name: &str| SearchField {
            field_name: name.to_string(),
            field_label: name.to_string(),
            field_type: FieldType::String,
            api_parameter: None,
            data_field_type: DataFieldType::String,
            input_transformation_regex: None,
            list_choices: None,
            list_condition: ListCondition::And,
            field_required: false,
            help_text: String::new(),
        };
        q.set_value(FieldConfiguration::new(&field("name"), &["fox".to_string()]).unwrap());
        q.set_value(FieldConfiguration::new(&field("color"), &["red".to_string()]).unwrap());
        assert_eq!(
            q.advanced(true).unwrap().to_string(),
            "http://api.example.com:443/v1/animals?name=fox&color=red"
        );

        assert!(matches!(q.record("1"), Err(SearchError::Unsupported { .. })));
        assert!(q.list("x", true, None, &[]).is_err());
        assert!(q.explain(QueryKind::Simple).is_err());
    }

    #[tokio::test]
    async fn test_download_sends_api_key() {
        let router = Router::new().route(
            "/v1/animals",
            get(|headers: HeaderMap| async move {
                let key = headers.get("X-Api-Key").and_then(|v| v.to_str().ok()).unwrap_or("");
                Json(json!([{"id": 1, "key": key}, {"id": 2, "key": key}, {"id": 3, "key": key}]))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let api = api("127.0.0.1", port);
        let mut q = ApiNinjasQuery::new(&search(), &api, 1);
        let query = q.simple("fox", true, ListCondition::And).unwrap();
        let backend = ApiNinjasResult::new(HttpFetcher::default(), api.auth_key.clone());

        let mut result = SearchResult::new(&search(), 10, query, RequestContext::default());
        result.load(&backend, "/api/v1/search", None).await;

        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.total, 3);
        assert_eq!(result.page, 1);
        assert_eq!(result.num_pages, 1);
        assert_eq!(result.hits[0]["key"], "secret");
    }
}
