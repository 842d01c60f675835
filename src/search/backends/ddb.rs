//! Deutsche Digitale Bibliothek backend
//!
//! Only advanced searches are supported. URLs use the host without a port;
//! results are read like API-Ninjas lists.

use crate::models::{ApiConfiguration, ApiType, ListCondition, SearchConfiguration};
use crate::search::error::SearchError;
use crate::search::field::FieldConfiguration;
use crate::search::query::{BackendQuery, QueryKind, QueryState, SearchQuery};

use super::api_ninjas::parameter_query;

pub struct DdbQuery {
    state: QueryState,
}

impl DdbQuery {
    pub fn new(search: &SearchConfiguration, api: &ApiConfiguration, page: u32) -> Self {
        Self {
            state: QueryState::new(search, api, page),
        }
    }

    fn base_string(&self) -> String {
        format!(
            "{}{}",
            self.state.api.base_url_without_port(),
            self.state.api.path.trim_start_matches('/')
        )
    }
}

impl SearchQuery for DdbQuery {
    fn simple(
        &mut self,
        _term: &str,
        _add_page_and_size: bool,
        _and_or: ListCondition,
    ) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::Ddb, "simple"))
    }

    fn advanced(&mut self, _add_page_and_size: bool) -> Result<BackendQuery, SearchError> {
        Ok(BackendQuery::Url(parameter_query(&self.base_string(), &self.state)))
    }

    fn list(
        &mut self,
        _list_name: &str,
        _add_page_and_size: bool,
        _term: Option<&str>,
        _tags: &[String],
    ) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::Ddb, "list"))
    }

    fn record(&self, _record_id: &str) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::Ddb, "record"))
    }

    fn explain(&mut self, _kind: QueryKind) -> Result<BackendQuery, SearchError> {
        Err(SearchError::unsupported(ApiType::Ddb, "explain"))
    }

    fn set_value(&mut self, value: FieldConfiguration) {
        self.state.set_value(value);
    }

    fn search_term(&self) -> &str {
        &self.state.search_term
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataFieldType, FieldType, Protocol, SearchField};

    #[test]
    fn test_advanced_query_without_port() {
        let api = ApiConfiguration {
            name: "ddb".to_string(),
            label: "DDB".to_string(),
            api_type: ApiType::Ddb,
            protocol: Protocol::Https,
            host: "api.deutsche-digitale-bibliothek.de".to_string(),
            port: 443,
            path: "/search".to_string(),
            user: None,
            password: None,
            auth_key: Some("key".to_string()),
            page_size: 10,
        };
        let search: SearchConfiguration = serde_yaml::from_str("conf_name: ddb\napi: ddb\n").unwrap();
        let field = SearchField {
            field_name: "query".to_string(),
            field_label: "Query".to_string(),
            field_type: FieldType::String,
            api_parameter: None,
            data_field_type: DataFieldType::String,
            input_transformation_regex: None,
            list_choices: None,
            list_condition: ListCondition::And,
            field_required: false,
            help_text: String::new(),
        };

        let mut q = DdbQuery::new(&search, &api, 1);
        q.set_value(FieldConfiguration::new(&field, &["goethe faust".to_string()]).unwrap());
        assert_eq!(
            q.advanced(true).unwrap().to_string(),
            "https://api.deutsche-digitale-bibliothek.de/search?query=goethe%20faust"
        );
        assert!(matches!(
            q.simple("x", true, ListCondition::And),
            Err(SearchError::Unsupported { api_type: ApiType::Ddb, .. })
        ));
    }
}
