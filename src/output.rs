//! Response types returned by a parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Successful parse result; this is the HTTP response body.
///
/// `layout`, `info` and `content_list` are only present when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub message: String,
    /// Markdown with extracted images inlined as data URIs.
    pub markdown: String,
    /// Number of entries in the per-page model output.
    pub pages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_list: Option<Value>,
}

impl ParseResponse {
    pub fn new(markdown: String, pages: usize) -> Self {
        Self {
            success: true,
            message: String::new(),
            markdown,
            pages,
            layout: None,
            info: None,
            content_list: None,
        }
    }
}

/// Body of every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error: String,
}

impl ErrorResponse {
    /// `"Internal server error: <err>"`
    pub fn internal(err: &dyn std::fmt::Display) -> Self {
        Self {
            success: false,
            message: String::new(),
            error: format!("Internal server error: {err}"),
        }
    }
}
