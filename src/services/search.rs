//! Search service
//!
//! Runs searches of the configured catalog: reads the request parameters,
//! composes the backend query, loads and transforms the result and records a
//! statistics entry. Also serves single records and bulk exports.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SearchSettings;
use crate::db::repositories::{ManifestRepository, SearchCount, StatisticsRepository};
use crate::models::{
    ApiConfiguration, Catalog, ListCondition, ResultError, SearchConfiguration,
    SearchStatisticEntry,
};
use crate::search::{
    create_query, create_result_backend, BackendQuery, FieldConfiguration, HttpFetcher, QueryKind,
    RequestContext, ResultFeatures, ResultTransformer, SearchError, SearchQuery, SearchResult,
};
use crate::services::export;
use crate::template::{FilterRegistry, RenderContext};

/// Page size of bulk downloads
pub const EXPORT_PAGE_SIZE: u32 = 250;

pub const ROUTE_PREFIX: &str = "/api/v1/search";

#[derive(Debug, Error)]
pub enum SearchServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Query(#[from] SearchError),

    /// The backend could not deliver a result
    #[error("{0}")]
    Backend(ResultError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A search as requested by a client
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub kind: QueryKind,
    pub term: String,
    pub and_or: ListCondition,
    pub list_name: String,
    pub tags: Vec<String>,
    pub page: u32,
    pub language: Option<String>,
    /// Path and parameters, kept for pagination and form links
    pub context: RequestContext,
}

impl SearchRequest {
    /// Read a request from its query parameters.
    ///
    /// `type` selects the query kind; without it a present `q` means a simple
    /// search, a present `list` a list search and anything else an advanced
    /// search.
    pub fn from_context(context: RequestContext) -> Result<Self, SearchServiceError> {
        let kind = match context.get("type").filter(|t| !t.is_empty()) {
            Some(kind) => kind
                .parse()
                .map_err(|e: anyhow::Error| SearchServiceError::Validation(e.to_string()))?,
            None if context.has("q") => QueryKind::Simple,
            None if context.has("list") => QueryKind::List,
            None => QueryKind::Advanced,
        };

        let page = match context.get("page").filter(|p| !p.is_empty()) {
            Some(page) => page
                .trim()
                .parse::<u32>()
                .map_err(|_| SearchServiceError::Validation(format!("Invalid page: {}", page)))?
                .max(1),
            None => 1,
        };

        let and_or = context
            .get("and_or")
            .and_then(|c| c.parse().ok())
            .unwrap_or_default();

        Ok(Self {
            kind,
            term: context.get("q").unwrap_or_default().trim().to_string(),
            and_or,
            list_name: context.get("list").unwrap_or_default().to_string(),
            tags: context
                .get("tags")
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            page,
            language: context.get("lang").filter(|l| !l.is_empty()).map(String::from),
            context,
        })
    }
}

pub struct SearchService {
    catalog: Arc<Catalog>,
    settings: SearchSettings,
    fetcher: HttpFetcher,
    filters: FilterRegistry,
    features: ResultFeatures,
    statistics: Option<Arc<dyn StatisticsRepository>>,
    manifests: Option<Arc<dyn ManifestRepository>>,
}

impl SearchService {
    pub fn new(catalog: Arc<Catalog>, settings: SearchSettings) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(settings.connect_timeout(), settings.read_timeout())?;
        let features = ResultFeatures {
            allow_download_single: settings.allow_download_single,
            correction_feature: settings.correction_feature,
            route_prefix: ROUTE_PREFIX.to_string(),
            manifest_viewer_url: settings.manifest_viewer_url.clone(),
        };
        Ok(Self {
            catalog,
            settings,
            fetcher,
            filters: FilterRegistry::with_builtins(),
            features,
            statistics: None,
            manifests: None,
        })
    }

    /// Record executed searches in `repo` (when the statistics feature is on)
    pub fn with_statistics(mut self, repo: Arc<dyn StatisticsRepository>) -> Self {
        self.statistics = Some(repo);
        self
    }

    /// Check "view source" links against the manifests in `repo`
    pub fn with_manifests(mut self, repo: Arc<dyn ManifestRepository>) -> Self {
        self.manifests = Some(repo);
        self
    }

    /// Filters available to result templates; custom filters go here
    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    fn resolve(&self, conf_name: &str) -> Result<(&SearchConfiguration, &ApiConfiguration), SearchServiceError> {
        let search = self
            .catalog
            .search(conf_name)
            .ok_or_else(|| SearchServiceError::NotFound(format!("Search not found: {}", conf_name)))?;
        let api = self
            .catalog
            .api(&search.api)
            .ok_or_else(|| SearchError::UnknownApi(search.api.clone()))?;
        Ok((search, api))
    }

    /// Typed values of the form fields present in `context`.
    ///
    /// A field is read from `{conf}_{field}` or, failing that, `{field}`;
    /// `{key}_condition` overrides its list condition.
    pub fn field_values(
        &self,
        search: &SearchConfiguration,
        context: &RequestContext,
    ) -> Result<Vec<FieldConfiguration>, SearchServiceError> {
        let mut values = Vec::new();
        for field in self.catalog.fields_of(search) {
            let prefixed = format!("{}_{}", search.conf_name, field.field_name);
            let key = if context.has(&prefixed) {
                prefixed
            } else {
                field.field_name.clone()
            };
            let raw: Vec<String> = context
                .params
                .iter()
                .filter(|(name, value)| *name == key && !value.trim().is_empty())
                .map(|(_, value)| value.clone())
                .collect();

            if raw.is_empty() {
                if field.field_required {
                    return Err(SearchServiceError::Validation(format!(
                        "{} is required",
                        field.field_label
                    )));
                }
                continue;
            }

            let mut value = FieldConfiguration::new(field, &raw)?;
            if let Some(condition) = context
                .get(&format!("{}_condition", key))
                .and_then(|c| c.parse::<ListCondition>().ok())
            {
                value = value.with_condition(condition);
            }
            values.push(value);
        }
        Ok(values)
    }

    fn compose(
        &self,
        query: &mut dyn SearchQuery,
        search: &SearchConfiguration,
        request: &SearchRequest,
    ) -> Result<BackendQuery, SearchServiceError> {
        let composed = match request.kind {
            QueryKind::Simple => {
                if request.term.is_empty() {
                    return Err(SearchServiceError::Validation("A search term is required".to_string()));
                }
                query.simple(&request.term, true, request.and_or)?
            }
            QueryKind::Advanced => {
                for value in self.field_values(search, &request.context)? {
                    query.set_value(value);
                }
                query.advanced(true)?
            }
            QueryKind::List => {
                if request.list_name.is_empty() {
                    return Err(SearchServiceError::Validation("A list name is required".to_string()));
                }
                let term = Some(request.term.as_str()).filter(|t| !t.is_empty());
                query.list(&request.list_name, true, term, &request.tags)?
            }
        };
        Ok(composed)
    }

    async fn run(
        &self,
        conf_name: &str,
        request: &SearchRequest,
        page_size: Option<u32>,
        transform: bool,
    ) -> Result<SearchResult, SearchServiceError> {
        let (search, api) = self.resolve(conf_name)?;
        let page_size = page_size.unwrap_or_else(|| search.effective_page_size(api.page_size));
        let mut search = search.clone();
        search.page_size = Some(page_size);

        let mut query = create_query(&search, api, request.page);
        let composed = self.compose(query.as_mut(), &search, request)?;

        let backend = create_result_backend(api, &self.fetcher, self.settings.connect_timeout());
        let mut result = SearchResult::new(&search, page_size, composed, request.context.clone());

        if transform {
            let language = request.language.as_deref().unwrap_or(&self.settings.default_language);
            let ctx = RenderContext::default()
                .with_filters(&self.filters)
                .with_choices(self.catalog.as_ref())
                .with_language(language)
                .with_show_errors(self.settings.show_errors)
                .with_list_separator(&self.settings.list_separator);
            let known = self.known_manifests(&search).await;
            let mut transformer = ResultTransformer::new(&self.features, ctx);
            if let Some(known) = &known {
                transformer = transformer.with_manifests(known);
            }
            result.load(backend.as_ref(), ROUTE_PREFIX, Some(&transformer)).await;
        } else {
            result.load(backend.as_ref(), ROUTE_PREFIX, None).await;
        }
        Ok(result)
    }

    /// Identifiers "view source" links may point to, when `search` has them
    async fn known_manifests(&self, search: &SearchConfiguration) -> Option<HashSet<String>> {
        let repo = self.manifests.as_ref()?;
        if search.manifest_relation_expression.as_deref().unwrap_or_default().is_empty() {
            return None;
        }
        match repo.list().await {
            Ok(manifests) => Some(manifests.into_iter().map(|m| m.identifier).collect()),
            Err(e) => {
                warn!("Failed to load manifests: {}", e);
                Some(HashSet::new())
            }
        }
    }

    /// Run a search and record it
    pub async fn search(
        &self,
        conf_name: &str,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchServiceError> {
        let result = self.run(conf_name, request, None, true).await?;

        match &result.error {
            Some(e) => warn!("Search {} failed with {}: {}", conf_name, e.code.code(), e),
            None => {
                info!("Search {} ({:?}) found {} results", conf_name, request.kind, result.total);
                self.record_statistic(conf_name, request, &result).await;
            }
        }
        Ok(result)
    }

    async fn record_statistic(&self, conf_name: &str, request: &SearchRequest, result: &SearchResult) {
        let Some(repo) = self.statistics.as_ref().filter(|_| self.settings.statistics_feature) else {
            return;
        };
        let entry = SearchStatisticEntry::new(
            conf_name,
            request.term.clone(),
            result.query.to_string(),
            result.total as i64,
        );
        if let Err(e) = repo.create(&entry).await {
            warn!("Failed to record search statistic: {}", e);
        }
    }

    /// Query the backend would use to explain how it runs `request`
    pub fn explain(
        &self,
        conf_name: &str,
        request: &SearchRequest,
    ) -> Result<BackendQuery, SearchServiceError> {
        let (search, api) = self.resolve(conf_name)?;
        let mut query = create_query(search, api, request.page);
        self.compose(query.as_mut(), search, request)?;
        Ok(query.explain(request.kind)?)
    }

    /// Full data of one record
    pub async fn record(&self, conf_name: &str, record_id: &str) -> Result<Value, SearchServiceError> {
        if !self.settings.allow_download_single {
            return Err(SearchServiceError::NotFound("Record download is disabled".to_string()));
        }
        let (search, api) = self.resolve(conf_name)?;
        let query = create_query(search, api, 1).record(record_id)?;
        let backend = create_result_backend(api, &self.fetcher, self.settings.connect_timeout());

        let raw = backend
            .download(&query, 1)
            .await
            .map_err(SearchServiceError::Backend)?;
        let not_found = || SearchServiceError::NotFound(format!("Record not found: {}", record_id));

        if raw.is_null() {
            return Err(not_found());
        }
        // Search style answers carry the record as their first hit
        if raw.is_array() || raw.get("hits").is_some() {
            return backend.hits(raw).into_iter().next().ok_or_else(not_found);
        }
        Ok(raw)
    }

    async fn export_hits(
        &self,
        conf_name: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Value>, SearchServiceError> {
        let result = self.run(conf_name, request, Some(EXPORT_PAGE_SIZE), false).await?;
        match result.error {
            Some(e) => Err(SearchServiceError::Backend(e)),
            None => Ok(result.hits),
        }
    }

    /// Raw hits of a search, up to [`EXPORT_PAGE_SIZE`]
    pub async fn export_json(
        &self,
        conf_name: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Value>, SearchServiceError> {
        self.export_hits(conf_name, request).await
    }

    /// Hits of a search as CSV: the record id and the configured columns
    pub async fn export_csv(
        &self,
        conf_name: &str,
        request: &SearchRequest,
    ) -> Result<String, SearchServiceError> {
        let hits = self.export_hits(conf_name, request).await?;
        let (search, _) = self.resolve(conf_name)?;
        Ok(export::csv_export(&hits, &export::csv_columns(search))?)
    }

    /// Most recent searches, newest first
    pub async fn recent_statistics(&self, limit: i64) -> anyhow::Result<Vec<SearchStatisticEntry>> {
        match &self.statistics {
            Some(repo) => repo.list_recent(limit).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn search_counts(&self) -> anyhow::Result<Vec<SearchCount>> {
        match &self.statistics {
            Some(repo) => repo.count_by_config().await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxStatisticsRepository;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn params(pairs: &[(&str, &str)]) -> RequestContext {
        RequestContext::new(
            "/search",
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    async fn serve_archive() -> u16 {
        let router = Router::new()
            .route(
                "/query/basic",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let term = q.get("t").cloned().unwrap_or_default();
                    Json(json!({
                        "total": 12,
                        "page": q.get("p").cloned().unwrap_or_default(),
                        "size": q.get("s").cloned().unwrap_or_default(),
                        "hits": [
                            {"id": "l1", "title": term, "year": 44},
                            {"id": "l2", "title": "Second", "year": 45}
                        ]
                    }))
                }),
            )
            .route(
                "/query/advanced",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "total": 1,
                        "page": 1,
                        "size": 250,
                        "hits": [{"id": "l1", "author": q.get("author"), "place": {"name": "Rome"}}]
                    }))
                }),
            )
            .route(
                "/query/fulldata",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({"total": 1, "page": 1, "size": 1, "hits": [{"id": q.get("id")}]}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        port
    }

    fn catalog(port: u16) -> Arc<Catalog> {
        let yaml = format!(
            r#"
apis:
  - name: archive
    protocol: http
    host: 127.0.0.1
    port: {port}
    page_size: 2
search_fields:
  - field_name: author
    field_label: Author
    field_type: string
  - field_name: year
    field_label: Year
    field_type: number
    data_field_type: int
searches:
  - conf_name: letters
    api: archive
    result_fields:
      - label: Title
        expression: "{{title|upper}} ({{year}})"
    csv_fields:
      - {{ header: Place, field: place.name }}
    form_fields:
      - {{ field: author, row: 1, column: 1, size: 6 }}
      - {{ field: year, row: 1, column: 7, size: 6 }}
"#
        );
        let mut catalog: Catalog = serde_yaml::from_str(&yaml).unwrap();
        catalog.validate().unwrap();
        Arc::new(catalog)
    }

    #[test]
    fn test_request_from_context() {
        let request = SearchRequest::from_context(params(&[("q", "rome"), ("page", "3"), ("and_or", "or")])).unwrap();
        assert_eq!(request.kind, QueryKind::Simple);
        assert_eq!(request.page, 3);
        assert_eq!(request.and_or, ListCondition::Or);

        let request = SearchRequest::from_context(params(&[("list", "persons"), ("tags", "a, b,")])).unwrap();
        assert_eq!(request.kind, QueryKind::List);
        assert_eq!(request.tags, vec!["a", "b"]);

        let request = SearchRequest::from_context(params(&[("author", "Cicero")])).unwrap();
        assert_eq!(request.kind, QueryKind::Advanced);
        assert_eq!(request.page, 1);

        assert!(SearchRequest::from_context(params(&[("page", "x")])).is_err());
        assert!(SearchRequest::from_context(params(&[("type", "fuzzy")])).is_err());
    }

    #[test]
    fn test_field_values_prefer_prefixed_params() {
        let service = SearchService::new(catalog(1), SearchSettings::default()).unwrap();
        let search = service.catalog().search("letters").unwrap().clone();
        let values = service
            .field_values(&search, &params(&[("letters_author", "Cicero"), ("author", "Other"), ("year", "")]))
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value().to_query_string(), "Cicero");

        let err = service.field_values(&search, &params(&[("year", "abc")])).unwrap_err();
        assert!(matches!(err, SearchServiceError::Query(SearchError::InvalidValue { .. })));
    }

    #[test]
    fn test_explain() {
        let service = SearchService::new(catalog(9000), SearchSettings::default()).unwrap();
        let request = SearchRequest::from_context(params(&[("q", "rome")])).unwrap();
        let query = service.explain("letters", &request).unwrap();
        assert_eq!(query.to_string(), "http://127.0.0.1:9000/query/basic_explain?t=rome");
    }

    #[tokio::test]
    async fn test_simple_search_renders_and_records() {
        let port = serve_archive().await;
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let stats = SqlxStatisticsRepository::boxed(pool);

        let service = SearchService::new(catalog(port), SearchSettings::default())
            .unwrap()
            .with_statistics(stats.clone());
        let request = SearchRequest::from_context(params(&[("q", "rome"), ("page", "2")])).unwrap();
        let result = service.search("letters", &request).await.unwrap();

        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.total, 12);
        assert_eq!(result.page, 2);
        assert_eq!(result.num_pages, 6);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].fields[0].html, "ROME (44)");
        assert_eq!(result.results[0].result_meta.result_number, 3);

        let recent = stats.list_recent(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].search_term, "rome");
        assert_eq!(recent[0].search_no_results, 12);
    }

    #[tokio::test]
    async fn test_unknown_search_and_missing_term() {
        let service = SearchService::new(catalog(1), SearchSettings::default()).unwrap();
        let request = SearchRequest::from_context(params(&[("q", "x")])).unwrap();
        assert!(matches!(
            service.search("maps", &request).await,
            Err(SearchServiceError::NotFound(_))
        ));

        let request = SearchRequest::from_context(params(&[("type", "simple")])).unwrap();
        assert!(matches!(
            service.search("letters", &request).await,
            Err(SearchServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_record_and_exports() {
        let port = serve_archive().await;
        let service = SearchService::new(catalog(port), SearchSettings::default()).unwrap();

        let record = service.record("letters", "l 1").await.unwrap();
        assert_eq!(record, json!({"id": "l 1"}));

        let request = SearchRequest::from_context(params(&[("author", "Cicero")])).unwrap();
        let hits = service.export_json("letters", &request).await.unwrap();
        assert_eq!(hits[0]["author"], "Cicero");

        let csv = service.export_csv("letters", &request).await.unwrap();
        assert_eq!(csv, "ID,Place\nl1,Rome\n");
    }

    #[tokio::test]
    async fn test_api_password_stays_out_of_results_and_statistics() {
        use axum::http::{header, HeaderMap, StatusCode};

        let router = Router::new().route(
            "/query/basic",
            get(|headers: HeaderMap| async move {
                // admin:s3cret
                if headers.get(header::AUTHORIZATION).map(|v| v.as_bytes())
                    != Some(b"Basic YWRtaW46czNjcmV0".as_slice())
                {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Ok(Json(json!({"total": 1, "page": 1, "size": 10, "hits": [{"id": "l1", "title": "Rome"}]})))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let yaml = format!(
            r#"
apis:
  - {{ name: archive, protocol: http, host: 127.0.0.1, port: {port}, user: admin, password: s3cret }}
searches:
  - conf_name: letters
    api: archive
    result_fields:
      - {{ label: Title, expression: "{{title}}" }}
"#
        );
        let mut catalog: Catalog = serde_yaml::from_str(&yaml).unwrap();
        catalog.validate().unwrap();

        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let stats = SqlxStatisticsRepository::boxed(pool);
        let service = SearchService::new(Arc::new(catalog), SearchSettings::default())
            .unwrap()
            .with_statistics(stats.clone());

        let request = SearchRequest::from_context(params(&[("q", "rome")])).unwrap();
        let result = service.search("letters", &request).await.unwrap();
        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.total, 1);

        let body = serde_json::to_string(&result).unwrap();
        assert!(!body.contains("s3cret"), "{}", body);
        let explained = service.explain("letters", &request).unwrap().to_string();
        assert!(!explained.contains("s3cret"), "{}", explained);

        let recent = stats.list_recent(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert!(!recent[0].search_query.contains("s3cret"));
        assert!(!recent[0].search_query.contains("admin@"));
    }

    #[tokio::test]
    async fn test_view_source_links_only_imported_manifests() {
        use crate::db::repositories::{ManifestRepository, SqlxManifestRepository};
        use crate::models::Manifest;

        let port = serve_archive().await;
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let manifests = SqlxManifestRepository::boxed(pool);
        manifests
            .upsert(&Manifest::new("vol-44", "Volume 44", "letters_vol_44.json", "https://iiif.example.org/44"))
            .await
            .unwrap();

        let mut catalog = (*catalog(port)).clone();
        catalog.searches[0].manifest_relation_expression = Some("vol-{year}".to_string());
        let settings = SearchSettings {
            manifest_viewer_url: Some("/viewer".to_string()),
            ..SearchSettings::default()
        };
        let service = SearchService::new(Arc::new(catalog), settings)
            .unwrap()
            .with_manifests(manifests);

        let request = SearchRequest::from_context(params(&[("q", "rome")])).unwrap();
        let result = service.search("letters", &request).await.unwrap();
        let source_link = |i: usize| {
            result.results[i]
                .options
                .iter()
                .find(|o| o.title == "View this snippet in context")
                .and_then(|o| o.href.clone())
        };
        assert_eq!(source_link(0).as_deref(), Some("/viewer?manifest=vol-44&page=1"));
        assert_eq!(source_link(1), None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_kept_on_result() {
        // Nothing listens on port 1
        let service = SearchService::new(catalog(1), SearchSettings::default()).unwrap();
        let request = SearchRequest::from_context(params(&[("q", "rome")])).unwrap();
        let result = service.search("letters", &request).await.unwrap();
        assert_eq!(result.error_code(), Some(-101));

        let request = SearchRequest::from_context(params(&[("author", "x")])).unwrap();
        assert!(matches!(
            service.export_json("letters", &request).await,
            Err(SearchServiceError::Backend(_))
        ));
    }
}
