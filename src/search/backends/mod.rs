//! Backend implementations
//!
//! Each API type pairs a [`SearchQuery`] builder with a [`ResultBackend`]:
//! - `ndr_core`: NDR Core's own HTTP API
//! - `api_ninjas`: API-Ninjas style `?name=` lookups
//! - `ddb`: Deutsche Digitale Bibliothek style parameter queries
//! - `mongodb`: direct queries against a MongoDB collection

mod api_ninjas;
mod ddb;
mod mongo;
mod ndr_core;

use std::time::Duration;

use serde_json::Value;

use crate::models::{ApiConfiguration, ApiType, SearchConfiguration};

use super::http::HttpFetcher;
use super::query::SearchQuery;
use super::result::ResultBackend;

pub use self::api_ninjas::{ApiNinjasQuery, ApiNinjasResult};
pub use self::ddb::DdbQuery;
pub use self::mongo::{MongoDbQuery, MongoDbResult};
pub use self::ndr_core::{NdrCoreQuery, NdrCoreResult};

/// Query builder for `api`
pub fn create_query(
    search: &SearchConfiguration,
    api: &ApiConfiguration,
    page: u32,
) -> Box<dyn SearchQuery> {
    match api.api_type {
        ApiType::NdrCore => Box::new(NdrCoreQuery::new(search, api, page)),
        ApiType::ApiNinjas => Box::new(ApiNinjasQuery::new(search, api, page)),
        ApiType::Ddb => Box::new(DdbQuery::new(search, api, page)),
        ApiType::MongoDb => Box::new(MongoDbQuery::new(search, api, page)),
    }
}

/// Result loader for `api`
pub fn create_result_backend(
    api: &ApiConfiguration,
    fetcher: &HttpFetcher,
    connect_timeout: Duration,
) -> Box<dyn ResultBackend> {
    let fetcher = match api.basic_auth() {
        Some((user, password)) => fetcher.with_basic_auth(user, password),
        None => fetcher.clone(),
    };
    match api.api_type {
        ApiType::NdrCore => Box::new(NdrCoreResult::new(fetcher)),
        ApiType::ApiNinjas | ApiType::Ddb => {
            Box::new(ApiNinjasResult::new(fetcher, api.auth_key.clone()))
        }
        ApiType::MongoDb => Box::new(MongoDbResult::new(api.mongodb_url(), connect_timeout)),
    }
}

/// Unsigned number stored as a JSON number or numeric string
pub(crate) fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Like [`as_u64`], but `None` when the value does not fit a `u32`
pub(crate) fn as_u32(value: Option<&Value>) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}
