//! Result loading and transformation
//!
//! A [`SearchResult`] is created for one composed query and loaded through
//! a [`ResultBackend`]. Loading downloads the raw result, fills the page
//! metadata, pagination and form links, and optionally transforms every hit
//! into a [`TransformedResult`] ready for display.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    FormLinks, Pagination, RenderedField, ResultError, ResultField, ResultMeta, ResultOption,
    SearchConfiguration, TransformedResult,
};
use crate::template::{sanitize_html, render_template, RenderContext, TagReplacer, TemplateString};

use super::http::HttpFetcher;
use super::pagination::pagination_links;
use super::query::BackendQuery;

/// Path and query parameters of the request a result is shown for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// URL-encoded query string without the parameters in `excluded`
    pub fn query_string_without(&self, excluded: &[&str]) -> String {
        self.params
            .iter()
            .filter(|(key, _)| !excluded.contains(&key.as_str()))
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `path?k=v&...&` without `excluded`, ready for one more parameter
    pub fn url_without(&self, excluded: &str) -> String {
        let query = self.query_string_without(&[excluded]);
        if query.is_empty() {
            format!("{}?", self.path)
        } else {
            format!("{}?{}&", self.path, query)
        }
    }
}

/// Join a path with query string parts, skipping empty parts
fn with_query(path: &str, parts: &[&str]) -> String {
    let query = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}

/// Page metadata read from a raw result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResultPage {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
}

impl ResultPage {
    /// Metadata with the number of pages computed from total and size.
    ///
    /// `page` is kept within `1..=num_pages`.
    pub fn new(total: u64, page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        let num_pages = u32::try_from(total.div_ceil(page_size as u64)).unwrap_or(u32::MAX);
        Self {
            total,
            page: page.clamp(1, num_pages.max(1)),
            page_size,
            num_pages,
        }
    }
}

/// Loads and reads raw results of one backend
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// Fetch the raw result of `query`
    async fn download(&self, query: &BackendQuery, page_size: u32) -> Result<Value, ResultError>;

    /// Decode a downloaded body
    fn parse(&self, text: &str) -> Result<Value, ResultError> {
        serde_json::from_str(text).map_err(|e| {
            warn!("Result could not be decoded: {}", e);
            ResultError::loaded()
        })
    }

    /// Page metadata of a raw result
    fn meta(&self, raw: &Value, page_size: u32) -> ResultPage;

    /// Hits of a raw result
    fn hits(&self, raw: Value) -> Vec<Value>;

    /// Id of a hit; `id_field` may be a dotted path
    fn id_value(&self, hit: &Value, id_field: &str) -> String {
        lookup_path(hit, id_field)
            .map(crate::template::scalar_to_string)
            .unwrap_or_default()
    }
}

/// Download `query` as JSON with `headers`
pub async fn download_json(
    backend: &dyn ResultBackend,
    fetcher: &HttpFetcher,
    query: &BackendQuery,
    headers: &[(String, String)],
) -> Result<Value, ResultError> {
    let url = query.as_url().ok_or_else(ResultError::request)?;
    let text = fetcher.get_text(url, headers).await?;
    backend.parse(&text)
}

/// Value at a dotted path
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Feature switches and routes used when transforming results
#[derive(Debug, Clone)]
pub struct ResultFeatures {
    pub allow_download_single: bool,
    pub correction_feature: bool,
    /// Prefix of the search routes, e.g. `/api/v1/search`
    pub route_prefix: String,
    /// Page with a manifest viewer, target of "view source" links
    pub manifest_viewer_url: Option<String>,
}

impl Default for ResultFeatures {
    fn default() -> Self {
        Self {
            allow_download_single: true,
            correction_feature: false,
            route_prefix: "/api/v1/search".to_string(),
            manifest_viewer_url: None,
        }
    }
}

/// Turns raw hits into result cards
pub struct ResultTransformer<'a> {
    pub features: &'a ResultFeatures,
    pub ctx: RenderContext<'a>,
    pub tags: &'a TagReplacer,
    /// Identifiers of imported manifests; unchecked when `None`
    pub manifests: Option<&'a HashSet<String>>,
}

struct CompiledField {
    label: String,
    template: Option<TemplateString>,
    error: String,
}

impl CompiledField {
    fn compile(field: &ResultField, ctx: &RenderContext<'_>) -> Self {
        match TemplateString::new(&field.expression) {
            Ok(template) => Self {
                label: field.label.clone(),
                template: Some(template),
                error: String::new(),
            },
            Err(e) => Self {
                label: field.label.clone(),
                template: None,
                error: crate::template::error_html(&e, ctx.show_errors),
            },
        }
    }
}

impl<'a> ResultTransformer<'a> {
    pub fn new(features: &'a ResultFeatures, ctx: RenderContext<'a>) -> Self {
        Self {
            features,
            ctx,
            tags: TagReplacer::builtin(),
            manifests: None,
        }
    }

    /// Only link sources whose manifest identifier is in `manifests`
    pub fn with_manifests(mut self, manifests: &'a HashSet<String>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Transform the hits of one page; numbering starts at `page * size - size + 1`
    pub fn transform(
        &self,
        search: &SearchConfiguration,
        backend: &dyn ResultBackend,
        hits: &[Value],
        page: &ResultPage,
    ) -> Vec<TransformedResult> {
        let fields: Vec<CompiledField> = search
            .result_fields
            .iter()
            .map(|f| CompiledField::compile(f, &self.ctx))
            .collect();
        let compact: Vec<CompiledField> = search
            .compact_fields
            .iter()
            .map(|f| CompiledField::compile(f, &self.ctx))
            .collect();

        let first = (page.page as u64 * page.page_size as u64).saturating_sub(page.page_size as u64) + 1;

        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let id = backend.id_value(hit, &search.search_id_field);
                TransformedResult {
                    options: self.options(search, hit, &id),
                    id,
                    data: hit.clone(),
                    result_meta: ResultMeta {
                        result_number: first + i as u64,
                        total_results: page.total,
                    },
                    fields: self.render_fields(&fields, hit),
                    compact_fields: self.render_fields(&compact, hit),
                }
            })
            .collect()
    }

    fn render_fields(&self, fields: &[CompiledField], hit: &Value) -> Vec<RenderedField> {
        fields
            .iter()
            .map(|field| {
                let html = match &field.template {
                    Some(template) => {
                        let rendered = template.render(hit, &self.ctx);
                        sanitize_html(&self.tags.replace(&rendered, &self.ctx))
                    }
                    None => field.error.clone(),
                };
                RenderedField {
                    label: field.label.clone(),
                    html,
                }
            })
            .collect()
    }

    /// Buttons shown next to a result
    pub fn options(&self, search: &SearchConfiguration, hit: &Value, id: &str) -> Vec<ResultOption> {
        let record_id = urlencoding::encode(id);
        let record_url = format!(
            "{}/{}/records/{}",
            self.features.route_prefix, search.conf_name, record_id
        );
        let mut options = Vec::new();

        if self.features.allow_download_single {
            options.push(ResultOption {
                href: Some(record_url.clone()),
                target: Some("_blank".to_string()),
                label: r#"<i class="fa-regular fa-file-arrow-down"></i>"#.to_string(),
                class: "btn btn-sm btn-secondary".to_string(),
                title: "Download the record as a JSON file".to_string(),
                ..Default::default()
            });
        }

        if let Some(repository) = search.repository_url.as_deref().filter(|r| !r.is_empty()) {
            options.push(ResultOption {
                href: Some(render_template(repository, hit, &self.ctx)),
                target: Some("_blank".to_string()),
                label: r#"<i class="fa-regular fa-vault"></i>"#.to_string(),
                class: "btn btn-sm btn-secondary".to_string(),
                title: "View The Data Repository".to_string(),
                ..Default::default()
            });
        }

        if self.features.correction_feature {
            options.push(ResultOption {
                onclick: Some(format!("callUrl('{}/mark', '{}')", record_url, record_id)),
                label: r#"<i class="fa-regular fa-check-double"></i>"#.to_string(),
                class: "btn btn-sm btn-secondary".to_string(),
                title: "Report this entry as incorrect".to_string(),
                ..Default::default()
            });
        }

        if let Some(option) = self.view_source(search, hit) {
            options.push(option);
        }

        options.push(ResultOption {
            onclick: Some(format!("copyToClipboard('{}')", record_id)),
            label: r#"<i class="fa-regular fa-copy"></i>"#.to_string(),
            class: "btn btn-sm btn-secondary".to_string(),
            title: "Copy Citation".to_string(),
            ..Default::default()
        });

        options
    }

    /// Link to the record's page in the manifest viewer
    fn view_source(&self, search: &SearchConfiguration, hit: &Value) -> Option<ResultOption> {
        let viewer = self.features.manifest_viewer_url.as_deref().filter(|v| !v.is_empty())?;
        let expression = search
            .manifest_relation_expression
            .as_deref()
            .filter(|e| !e.is_empty())?;

        let manifest_id = render_template(expression, hit, &self.ctx);
        if manifest_id.is_empty() || self.manifests.is_some_and(|known| !known.contains(&manifest_id)) {
            return None;
        }
        let page = search
            .manifest_page_expression
            .as_deref()
            .map(|e| render_template(e, hit, &self.ctx))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "1".to_string());

        Some(ResultOption {
            href: Some(format!(
                "{}?manifest={}&page={}",
                viewer,
                urlencoding::encode(&manifest_id),
                urlencoding::encode(&page)
            )),
            label: r#"<i class="fa-regular fa-book"></i>"#.to_string(),
            class: "btn btn-sm btn-secondary".to_string(),
            title: "View this snippet in context".to_string(),
            ..Default::default()
        })
    }
}

/// Links to refine, restart, download or toggle the compact view of a search
pub fn form_links(conf_name: &str, request: &RequestContext, route_prefix: &str) -> FormLinks {
    let search_button = format!("search_button_{}", conf_name);
    let simple_button = format!("search_button_{}_simple", conf_name);
    let compact = format!("compact_view_{}", conf_name);
    let compact_simple = format!("compact_view_{}_simple", conf_name);

    let updated = request.query_string_without(&[search_button.as_str(), "tab"]);
    let tab = format!("tab={}", conf_name);
    let download = |suffix: &str| {
        with_query(&format!("{}/{}/{}", route_prefix, conf_name, suffix), &[updated.as_str()])
    };

    let all = request.query_string_without(&[]);
    let (compact_label, compact_link) = if request.has(&compact) && request.has(&search_button) {
        let without = request.query_string_without(&[compact.as_str()]);
        ("Show full results", with_query(&request.path, &[without.as_str()]))
    } else if request.has(&compact_simple) && request.has(&simple_button) {
        let without = request.query_string_without(&[compact_simple.as_str()]);
        ("Show full results", with_query(&request.path, &[without.as_str()]))
    } else {
        let toggle = if request.has(&simple_button) {
            format!("{}=on", compact_simple)
        } else {
            format!("{}=on", compact)
        };
        ("Show compact results", with_query(&request.path, &[all.as_str(), toggle.as_str()]))
    };

    FormLinks {
        refine: with_query(&request.path, &[updated.as_str(), "refine=1", tab.as_str()]),
        new: with_query(&request.path, &[tab.as_str()]),
        bulk_download_json: download("download.json"),
        bulk_download_csv: download("download.csv"),
        compact_label: compact_label.to_string(),
        compact: compact_link,
    }
}

/// A search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub conf_name: String,
    pub query: BackendQuery,
    pub error: Option<ResultError>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
    pub page_links: Pagination,
    pub form_links: Option<FormLinks>,
    #[serde(skip)]
    pub hits: Vec<Value>,
    pub results: Vec<TransformedResult>,
    #[serde(skip)]
    search: SearchConfiguration,
    #[serde(skip)]
    request: RequestContext,
}

impl SearchResult {
    pub fn new(
        search: &SearchConfiguration,
        page_size: u32,
        query: BackendQuery,
        request: RequestContext,
    ) -> Self {
        Self {
            conf_name: search.conf_name.clone(),
            query,
            error: None,
            total: 0,
            page: 1,
            page_size: page_size.max(1),
            num_pages: 0,
            page_links: Pagination::default(),
            form_links: None,
            hits: Vec::new(),
            results: Vec::new(),
            search: search.clone(),
            request,
        }
    }

    /// Download and process the result.
    ///
    /// On failure the error is kept and the result stays empty. Hits are
    /// transformed when a transformer is given.
    pub async fn load(
        &mut self,
        backend: &dyn ResultBackend,
        route_prefix: &str,
        transformer: Option<&ResultTransformer<'_>>,
    ) {
        let raw = match backend.download(&self.query, self.page_size).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Search {} failed: {}", self.conf_name, e);
                self.error = Some(e);
                return;
            }
        };

        let page = backend.meta(&raw, self.page_size);
        self.total = page.total;
        self.page = page.page;
        self.page_size = page.page_size;
        self.num_pages = page.num_pages;

        self.page_links = pagination_links(self.num_pages, self.page, &self.request);
        self.form_links = Some(form_links(&self.conf_name, &self.request, route_prefix));
        self.hits = backend.hits(raw);
        debug!("Search {} loaded {} of {} hits", self.conf_name, self.hits.len(), self.total);

        if let Some(transformer) = transformer {
            self.results = transformer.transform(&self.search, backend, &self.hits, &page);
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Numeric error code, if loading failed
    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCode;
    use serde_json::json;

    struct StaticBackend(Result<Value, ResultError>);

    #[async_trait]
    impl ResultBackend for StaticBackend {
        async fn download(&self, _query: &BackendQuery, _page_size: u32) -> Result<Value, ResultError> {
            self.0.clone()
        }

        fn meta(&self, raw: &Value, page_size: u32) -> ResultPage {
            ResultPage::new(
                raw["total"].as_u64().unwrap_or_default(),
                raw["page"].as_u64().unwrap_or(1) as u32,
                page_size,
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

    fn search() -> SearchConfiguration {
        serde_yaml::from_str(
            r#"
conf_name: letters
api: local
repository_url: "https://repo.example.org/{source.collection}"
result_fields:
  - label: Title
    expression: "<b>{title|upper}</b><i>{missing}</i>"
compact_fields:
  - expression: "[[pill|{id}]]"
"#,
        )
        .unwrap()
    }

    fn request() -> RequestContext {
        RequestContext::new(
            "/search",
            vec![
                ("q".to_string(), "rome".to_string()),
                ("search_button_letters".to_string(), "".to_string()),
                ("tab".to_string(), "letters".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
        )
    }

    fn raw() -> Value {
        json!({
            "total": 12,
            "page": 2,
            "hits": [
                {"id": "a1", "title": "first", "source": {"collection": "c1"}},
                {"id": "a2", "title": "second", "source": {"collection": "c2"}}
            ]
        })
    }

    #[test]
    fn test_request_context_urls() {
        let request = request();
        assert_eq!(request.url_without("page"), "/search?q=rome&search_button_letters=&tab=letters&");
        assert_eq!(RequestContext::new("/s", Vec::new()).url_without("page"), "/s?");
    }

    #[test]
    fn test_form_links() {
        let links = form_links("letters", &request(), "/api/v1/search");
        assert_eq!(links.refine, "/search?q=rome&page=2&refine=1&tab=letters");
        assert_eq!(links.new, "/search?tab=letters");
        assert_eq!(links.bulk_download_json, "/api/v1/search/letters/download.json?q=rome&page=2");
        assert_eq!(links.bulk_download_csv, "/api/v1/search/letters/download.csv?q=rome&page=2");
        assert_eq!(links.compact_label, "Show compact results");
        assert!(links.compact.ends_with("&compact_view_letters=on"));
    }

    #[test]
    fn test_compact_toggle_back() {
        let mut request = request();
        request.params.push(("compact_view_letters".to_string(), "on".to_string()));
        let links = form_links("letters", &request, "/api/v1/search");
        assert_eq!(links.compact_label, "Show full results");
        assert!(!links.compact.contains("compact_view_letters"));
    }

    #[test]
    fn test_lookup_path() {
        let hit = json!({"meta": {"ids": ["x", "y"]}});
        assert_eq!(lookup_path(&hit, "meta.ids.1"), Some(&json!("y")));
        assert_eq!(lookup_path(&hit, "meta.name"), None);
    }

    #[tokio::test]
    async fn test_load_and_transform() {
        let backend = StaticBackend(Ok(raw()));
        let features = ResultFeatures {
            correction_feature: true,
            ..Default::default()
        };
        let transformer = ResultTransformer::new(&features, RenderContext::default());

        let mut result = SearchResult::new(&search(), 10, BackendQuery::Url("u".into()), request());
        result.load(&backend, &features.route_prefix, Some(&transformer)).await;

        assert!(!result.is_error());
        assert_eq!(result.total, 12);
        assert_eq!(result.num_pages, 2);
        assert_eq!(result.page_links.prev.as_deref(), Some("/search?q=rome&search_button_letters=&tab=letters&page=1"));
        assert_eq!(result.page_links.next, None);

        assert_eq!(result.results.len(), 2);
        let first = &result.results[0];
        assert_eq!(first.id, "a1");
        assert_eq!(first.result_meta.result_number, 11);
        assert_eq!(result.results[1].result_meta.result_number, 12);
        assert_eq!(first.fields[0].html, "<b>FIRST</b>");
        assert_eq!(
            first.compact_fields[0].html,
            r#"<span class="badge badge-secondary small" style="font-weight: normal;">a1</span>"#
        );

        let titles: Vec<&str> = first.options.iter().map(|o| o.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Download the record as a JSON file",
                "View The Data Repository",
                "Report this entry as incorrect",
                "Copy Citation"
            ]
        );
        assert_eq!(first.options[0].href.as_deref(), Some("/api/v1/search/letters/records/a1"));
        assert_eq!(first.options[1].href.as_deref(), Some("https://repo.example.org/c1"));
        assert_eq!(
            first.options[2].onclick.as_deref(),
            Some("callUrl('/api/v1/search/letters/records/a1/mark', 'a1')")
        );
    }

    #[tokio::test]
    async fn test_failed_download_keeps_error() {
        let backend = StaticBackend(Err(ResultError::timeout()));
        let mut result = SearchResult::new(&search(), 10, BackendQuery::Url("u".into()), request());
        result.load(&backend, "/api/v1/search", None).await;

        assert_eq!(result.error_code(), Some(-100));
        assert_eq!(result.error.as_ref().map(|e| e.code), Some(ErrorCode::Timeout));
        assert!(result.results.is_empty());
        assert!(result.form_links.is_none());
    }

    #[test]
    fn test_view_source_option() {
        let mut search = search();
        search.manifest_relation_expression = Some("{issue.year}-{issue.number}".to_string());
        search.manifest_page_expression = Some("{issue.page}".to_string());
        let hit = json!({"id": "a1", "issue": {"year": 1901, "number": "07", "page": 12}});

        let features = ResultFeatures {
            allow_download_single: false,
            manifest_viewer_url: Some("/viewer".to_string()),
            ..Default::default()
        };
        let transformer = ResultTransformer::new(&features, RenderContext::default());
        let options = transformer.options(&search, &hit, "a1");
        let source = options.iter().find(|o| o.title == "View this snippet in context").unwrap();
        assert_eq!(source.href.as_deref(), Some("/viewer?manifest=1901-07&page=12"));

        let known: HashSet<String> = ["1901-08".to_string()].into_iter().collect();
        let transformer = ResultTransformer::new(&features, RenderContext::default()).with_manifests(&known);
        assert!(transformer
            .options(&search, &hit, "a1")
            .iter()
            .all(|o| o.title != "View this snippet in context"));

        let without_viewer = ResultFeatures::default();
        let transformer = ResultTransformer::new(&without_viewer, RenderContext::default());
        assert_eq!(transformer.options(&search, &hit, "a1").len(), 3);
    }

    #[test]
    fn test_result_page() {
        let page = ResultPage::new(21, 3, 10);
        assert_eq!(page.num_pages, 3);
        assert_eq!(ResultPage::new(0, 1, 10).num_pages, 0);
        assert_eq!(ResultPage::new(5, 0, 0).page_size, 1);
        assert_eq!(ResultPage::new(21, 9, 10).page, 3);
        assert_eq!(ResultPage::new(0, u32::MAX, 10).page, 1);
        assert_eq!(ResultPage::new(u64::MAX, 2, 1).num_pages, u32::MAX);
    }
}
