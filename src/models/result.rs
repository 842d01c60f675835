//! Search result view types
//!
//! These are the serialisable shapes a loaded search result is exposed as:
//! error codes, pagination links, form links and transformed result cards.

use serde::{Deserialize, Serialize};

/// Classification of a failed result download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The connection or the read timed out
    Timeout,
    /// The request could not be sent
    Request,
    /// The response could not be loaded
    Loaded,
    /// The server answered with a non-success status
    Server,
}

impl ErrorCode {
    /// Numeric code as exposed to templates and clients
    pub fn code(&self) -> i32 {
        match self {
            Self::Timeout => -100,
            Self::Request => -101,
            Self::Loaded => -102,
            Self::Server => -103,
        }
    }
}

/// Error stored on a result instead of hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ResultError {
    pub code: ErrorCode,
    pub message: String,
}

impl ResultError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "The connection timed out")
    }

    pub fn request() -> Self {
        Self::new(ErrorCode::Request, "Query could not be requested")
    }

    pub fn loaded() -> Self {
        Self::new(ErrorCode::Loaded, "Result could not be loaded")
    }

    pub fn server(status: u16) -> Self {
        Self::new(
            ErrorCode::Server,
            format!("The server returned status code: {}", status),
        )
    }
}

/// One entry of the pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageItem {
    Page(u32),
    Gap,
}

impl std::fmt::Display for PageItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{}", n),
            Self::Gap => write!(f, "..."),
        }
    }
}

/// A rendered pagination entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Page number or `...`
    pub page: String,
    pub url: String,
    pub current: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub pages: Vec<PageLink>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Links to refine, restart, download or re-display a search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLinks {
    pub refine: String,
    pub new: String,
    pub bulk_download_json: String,
    pub bulk_download_csv: String,
    pub compact_label: String,
    pub compact: String,
}

/// A button shown next to a result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onclick: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub label: String,
    pub class: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub result_number: u64,
    pub total_results: u64,
}

/// A result card field after template rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedField {
    pub label: String,
    pub html: String,
}

/// A result ready for display
#[derive(Debug, Clone, Serialize)]
pub struct TransformedResult {
    pub id: String,
    pub data: serde_json::Value,
    pub result_meta: ResultMeta,
    pub options: Vec<ResultOption>,
    pub fields: Vec<RenderedField>,
    pub compact_fields: Vec<RenderedField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::Timeout.code(), -100);
        assert_eq!(ErrorCode::Request.code(), -101);
        assert_eq!(ErrorCode::Loaded.code(), -102);
        assert_eq!(ErrorCode::Server.code(), -103);
    }

    #[test]
    fn test_server_error_message() {
        let err = ResultError::server(502);
        assert_eq!(err.code, ErrorCode::Server);
        assert_eq!(err.to_string(), "The server returned status code: 502");
    }

    #[test]
    fn test_page_item_display() {
        assert_eq!(PageItem::Page(7).to_string(), "7");
        assert_eq!(PageItem::Gap.to_string(), "...");
    }
}
