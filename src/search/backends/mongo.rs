//! MongoDB backend
//!
//! Queries are documents of the form
//! `{"filter": {...}, "sort": [[field, 1]], "page": n}`; record queries are
//! `{"filter": {id_field: id}, "type": "single"}`. The connection URL ends in
//! `/<database>/<collection>`.
//!
//! Composing queries needs no driver. Downloading requires the `mongodb`
//! feature.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::models::{
    ApiConfiguration, ApiType, FieldType, ListCondition, ResultError, SearchConfiguration,
};
use crate::search::error::SearchError;
use crate::search::field::{FieldConfiguration, FieldValue};
use crate::search::query::{BackendQuery, QueryKind, QueryState, SearchQuery};
use crate::search::result::{ResultBackend, ResultPage};

use super::{as_u32, as_u64};

pub struct MongoDbQuery {
    state: QueryState,
}

impl MongoDbQuery {
    pub fn new(search: &SearchConfiguration, api: &ApiConfiguration, page: u32) -> Self {
        Self {
            state: QueryState::new(search, api, page),
        }
    }

    fn document(&self, filter: Map<String, Value>) -> BackendQuery {
        BackendQuery::Document(json!({
            "filter": filter,
            "sort": [[self.state.search.sort_field, 1]],
            "page": self.state.page,
        }))
    }

    /// Filter value of one field; boolean lists go to `and_list`/`or_list`
    fn filter_value(
        field: &FieldConfiguration,
        and_list: &mut Vec<Value>,
        or_list: &mut Vec<Value>,
    ) -> Option<Value> {
        let value = field.value();
        match (field.field_type(), value) {
            (FieldType::String, v) => Some(json!({"$regex": v.to_json(), "$options": "i"})),
            (FieldType::NumberRange, FieldValue::Range(from, to)) => {
                Some(json!({"$gte": from, "$lte": to}))
            }
            (FieldType::NumberRange, v) => Some(json!({"$regex": v.to_query_string()})),
            (FieldType::MultiList, FieldValue::Many(_)) => match field.condition() {
                ListCondition::Or => Some(json!({"$in": value.to_json()})),
                ListCondition::And => Some(json!({"$all": value.to_json()})),
            },
            (FieldType::MultiList, v) => Some(json!({"$regex": v.to_query_string()})),
            (FieldType::Boolean, v) => Some(json!({"$eq": v.to_json()})),
            (FieldType::BooleanList, FieldValue::Flags(flags)) => {
                let target = match field.condition() {
                    ListCondition::Or => or_list,
                    ListCondition::And => and_list,
                };
                target.extend(flags.iter().map(|(key, flag)| json!({ key.as_str(): flag })));
                None
            }
            (FieldType::DateRange, FieldValue::DateRange(from, to)) => {
                let mut range = Map::new();
                if let Some(from) = from {
                    range.insert("$gte".to_string(), json!(from.format("%Y-%m-%d").to_string()));
                }
                if let Some(to) = to {
                    range.insert("$lte".to_string(), json!(to.format("%Y-%m-%d").to_string()));
                }
                (!range.is_empty()).then_some(Value::Object(range))
            }
            (_, v) => Some(v.to_json()),
        }
    }
}

impl SearchQuery for MongoDbQuery {
    fn simple(
        &mut self,
        term: &str,
        _add_page_and_size: bool,
        and_or: ListCondition,
    ) -> Result<BackendQuery, SearchError> {
        let main_field = self
            .state
            .search
            .simple_query_main_field
            .clone()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                SearchError::invalid_value("simple_query_main_field", "no main field configured")
            })?;
        self.state.search_term = term.to_string();

        let words: Vec<&str> = term.split_whitespace().collect();
        let pattern = match and_or {
            ListCondition::And => format!("^(?=.*{})", words.join(")(?=.*")),
            ListCondition::Or => format!("({})", words.join("|")),
        };

        let mut filter = Map::new();
        filter.insert(main_field, json!({"$regex": pattern, "$options": "msi"}));
        let query = self.document(filter);
        debug!("Composed simple query: {}", query);
        Ok(query)
    }

    fn advanced(&mut self, _add_page_and_size: bool) -> Result<BackendQuery, SearchError> {
        let mut filter = Map::new();
        let mut and_list = Vec::new();
        let mut or_list = Vec::new();

        for field in &self.state.values {
            if let Some(value) = Self::filter_value(field, &mut and_list, &mut or_list) {
                filter.insert(field.parameter().to_string(), value);
            }
        }
        if !and_list.is_empty() {
            filter.insert("$and".to_string(), Value::Array(and_list));
        }
        if !or_list.is_empty() {
            filter.insert("$or".to_string(), Value::Array(or_list));
        }

        let query = self.document(filter);
        debug!("Composed advanced query: {}", query);
        Ok(query)
    }

    fn list(
        &mut self,
        _list_name: &str,
        _add_page_and_size: bool,
        _term: Option<&str>,
        _tags: &[String],
    ) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::MongoDb, "list"))
    }

    fn record(&self, record_id: &str) -> Result<BackendQuery, SearchError> {
        Ok(BackendQuery::Document(json!({
            "filter": { self.state.search.search_id_field.as_str(): record_id },
            "type": "single",
        })))
    }

    fn explain(&mut self, _kind: QueryKind) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::MongoDb, "explain"))
    }

    fn set_value(&mut self, value: FieldConfiguration) {
        self.state.set_value(value);
    }

    fn search_term(&self) -> &str {
        &self.state.search_term
    }
}

/// Runs query documents against a collection
#[cfg_attr(not(feature = "mongodb"), allow(dead_code))]
pub struct MongoDbResult {
    connection_url: String,
    timeout: Duration,
}

impl MongoDbResult {
    pub fn new(connection_url: String, timeout: Duration) -> Self {
        Self {
            connection_url,
            timeout,
        }
    }

    /// Split `mongodb://host:port/db/collection` into client URL, database
    /// and collection
    pub fn split_connection_url(url: &str) -> Option<(&str, &str, &str)> {
        let (rest, collection) = url.trim_end_matches('/').rsplit_once('/')?;
        let (_, database) = rest.rsplit_once('/')?;
        if database.is_empty() || collection.is_empty() || rest.ends_with(':') {
            return None;
        }
        Some((rest, database, collection))
    }

    #[cfg(feature = "mongodb")]
    async fn run(
        &self,
        (uri, database, collection): (&str, &str, &str),
        query: &Value,
        page_size: u32,
    ) -> Result<Value, ::mongodb::error::Error> {
        use ::mongodb::bson::{self, Bson, Document};
        use ::mongodb::options::{ClientOptions, FindOptions};
        use ::mongodb::Client;
        use futures::stream::TryStreamExt;

        let mut options = ClientOptions::parse(uri).await?;
        options.server_selection_timeout = Some(self.timeout);
        options.connect_timeout = Some(self.timeout);
        let client = Client::with_options(options)?;
        let collection = client.database(database).collection::<Document>(collection);

        let filter = bson::to_document(&query["filter"])?;
        let to_json = |doc: Document| Bson::Document(doc).into_relaxed_extjson();

        if query["type"] == "single" {
            let found = collection.find_one(filter).await?;
            return Ok(found.map(to_json).unwrap_or(Value::Null));
        }

        let page = as_u64(query.get("page")).unwrap_or(1).max(1);
        let mut sort = Document::new();
        for pair in query["sort"].as_array().into_iter().flatten() {
            if let (Some(field), Some(direction)) = (pair[0].as_str(), pair[1].as_i64()) {
                sort.insert(field, direction as i32);
            }
        }

        let mut find_options = FindOptions::default();
        find_options.sort = Some(sort);
        find_options.skip = Some((page - 1).saturating_mul(page_size as u64));
        find_options.limit = Some(page_size as i64);

        let cursor = collection.find(filter.clone()).with_options(find_options).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        let total = collection.count_documents(filter).await?;

        Ok(json!({
            "total": total,
            "page": page,
            "hits": documents.into_iter().map(to_json).collect::<Vec<_>>(),
        }))
    }
}

#[async_trait]
impl ResultBackend for MongoDbResult {
    #[cfg(feature = "mongodb")]
    async fn download(&self, query: &BackendQuery, page_size: u32) -> Result<Value, ResultError> {
        use ::mongodb::error::ErrorKind;

        let document = query.as_document().ok_or_else(ResultError::request)?;
        let target = Self::split_connection_url(&self.connection_url).ok_or_else(|| {
            tracing::warn!("Invalid MongoDB connection url");
            ResultError::request()
        })?;
        self.run(target, document, page_size).await.map_err(|e| {
            tracing::warn!("MongoDB query failed: {}", e);
            match *e.kind {
                ErrorKind::ServerSelection { .. } => ResultError::timeout(),
                _ => ResultError::request(),
            }
        })
    }

    #[cfg(not(feature = "mongodb"))]
    async fn download(&self, _query: &BackendQuery, _page_size: u32) -> Result<Value, ResultError> {
        tracing::warn!("MongoDB query skipped: built without the mongodb feature");
        Err(ResultError::new(
            crate::models::ErrorCode::Request,
            "MongoDB support is not enabled",
        ))
    }

    fn meta(&self, raw: &Value, page_size: u32) -> ResultPage {
        ResultPage::new(
            as_u64(raw.get("total")).unwrap_or_default(),
            as_u32(raw.get("page")).unwrap_or(1),
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
