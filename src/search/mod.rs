//! Search execution
//!
//! A search runs in two steps:
//! - A [`SearchQuery`] composes a backend query (a URL or a query document)
//!   from the user's input
//! - A [`ResultBackend`] downloads it and splits the raw response into
//!   paging metadata and hits, which [`SearchResult`] turns into pagination
//!   links and rendered result cards
//!
//! Backends for each API type live in [`backends`].

pub mod backends;
mod error;
mod field;
mod http;
mod pagination;
mod query;
mod result;

pub use backends::{create_query, create_result_backend};
pub use error::SearchError;
pub use field::{FieldConfiguration, FieldValue};
pub use http::{HttpFetcher, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use pagination::{page_window, pagination_links};
pub use query::{BackendQuery, QueryKind, QueryState, SearchQuery};
pub use result::{
    download_json, form_links, lookup_path, RequestContext, ResultBackend, ResultFeatures,
    ResultPage, ResultTransformer, SearchResult,
};
