//! Search API endpoints

use axum::{
    body::Bytes,
    extract::{OriginalUri, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Correction, FieldType};
use crate::search::RequestContext;
use crate::services::SearchRequest;
use crate::template::ChoiceSource;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{conf}", get(run_search))
        .route("/{conf}/explain", get(explain_search))
        .route("/{conf}/download.json", get(download_json))
        .route("/{conf}/download.csv", get(download_csv))
        .route("/{conf}/records/{id}", get(get_record))
        .route("/{conf}/records/{id}/mark", post(mark_record))
}

#[derive(Serialize)]
struct SearchesResponse {
    searches: Vec<SearchInfo>,
}

#[derive(Serialize)]
struct SearchInfo {
    conf_name: String,
    conf_label: String,
    api: String,
    simple_search: bool,
    page_size: u32,
    form: Vec<FormFieldInfo>,
}

#[derive(Serialize)]
struct FormFieldInfo {
    /// Parameter name of the field, `{conf}_{field}`
    name: String,
    label: String,
    field_type: FieldType,
    row: u32,
    column: u32,
    size: u32,
    required: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    help_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    choices: Vec<ChoiceInfo>,
}

#[derive(Serialize)]
struct ChoiceInfo {
    key: String,
    label: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub lang: Option<String>,
}

/// Configured searches and their form layout
pub async fn list_searches(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
) -> impl IntoResponse {
    let service = &state.search_service;
    let catalog = service.catalog();
    let language = query
        .lang
        .unwrap_or_else(|| service.settings().default_language.clone());

    let searches = catalog
        .searches()
        .iter()
        .map(|search| {
            let page_size = catalog
                .api(&search.api)
                .map(|api| search.effective_page_size(api.page_size))
                .unwrap_or_default();
            let form = search
                .form_fields
                .iter()
                .filter_map(|form_field| {
                    let field = catalog.field(&form_field.field)?;
                    let choices = catalog
                        .choices(&field.field_name)
                        .map(|list| {
                            list.iter()
                                .map(|choice| ChoiceInfo {
                                    label: list
                                        .label(&choice.key, &language)
                                        .unwrap_or(choice.key.as_str())
                                        .to_string(),
                                    key: choice.key.clone(),
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(FormFieldInfo {
                        name: format!("{}_{}", search.conf_name, field.field_name),
                        label: field.field_label.clone(),
                        field_type: field.field_type,
                        row: form_field.row,
                        column: form_field.column,
                        size: form_field.size,
                        required: field.field_required,
                        help_text: field.help_text.clone(),
                        choices,
                    })
                })
                .collect();
            SearchInfo {
                conf_name: search.conf_name.clone(),
                conf_label: search.conf_label.clone(),
                api: search.api.clone(),
                simple_search: search.simple_search,
                page_size,
                form,
            }
        })
        .collect();

    Json(SearchesResponse { searches })
}

fn search_request(uri: &OriginalUri, params: Vec<(String, String)>) -> Result<SearchRequest, ApiError> {
    Ok(SearchRequest::from_context(RequestContext::new(uri.0.path(), params))?)
}

/// Run a search; backend failures are reported in the result's `error`
async fn run_search(
    State(state): State<AppState>,
    Path(conf_name): Path<String>,
    uri: OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = search_request(&uri, params)?;
    let result = state.search_service.search(&conf_name, &request).await?;
    Ok(Json(result))
}

async fn explain_search(
    State(state): State<AppState>,
    Path(conf_name): Path<String>,
    uri: OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = search_request(&uri, params)?;
    let query = state.search_service.explain(&conf_name, &request)?;
    Ok(Json(serde_json::json!({ "query": query })))
}

/// `attachment; filename="..."` with characters unsafe in a header value replaced
fn attachment(name: &str, extension: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("attachment; filename=\"{}.{}\"", safe, extension)
}

async fn get_record(
    State(state): State<AppState>,
    Path((conf_name, record_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.search_service.record(&conf_name, &record_id).await?;
    let body = serde_json::to_string_pretty(&record)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&record_id, "json")),
        ],
        body,
    ))
}

#[derive(Debug, Default, Deserialize)]
struct MarkInput {
    note: Option<String>,
}

#[derive(Serialize)]
struct MarkResponse {
    status: &'static str,
    correction: Correction,
}

/// Mark a record for correction; the body `{"note": ...}` is optional
async fn mark_record(
    State(state): State<AppState>,
    Path((conf_name, record_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let input: MarkInput = if body.iter().all(u8::is_ascii_whitespace) {
        MarkInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))?
    };

    let correction = state
        .correction_service
        .mark(&conf_name, &record_id, input.note)
        .await?;
    Ok((StatusCode::CREATED, Json(MarkResponse { status: "OK", correction })))
}

async fn download_json(
    State(state): State<AppState>,
    Path(conf_name): Path<String>,
    uri: OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = search_request(&uri, params)?;
    let hits = state.search_service.export_json(&conf_name, &request).await?;
    let body = serde_json::to_string_pretty(&hits)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&conf_name, "json")),
        ],
        body,
    ))
}

async fn download_csv(
    State(state): State<AppState>,
    Path(conf_name): Path<String>,
    uri: OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = search_request(&uri, params)?;
    let body = state.search_service.export_csv(&conf_name, &request).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&conf_name, "csv")),
        ],
        body,
    ))
}
