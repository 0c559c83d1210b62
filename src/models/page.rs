//! Browser-neutral views of a rendered page.
//!
//! The browser collaborator serializes the page into these types so that the
//! extraction logic can run without a live browser.

use serde::{Deserialize, Serialize};

/// One network response observed while a page rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkResponse {
    pub url: String,
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if the header was present and numeric.
    pub content_length: Option<u64>,
}

/// Leaf text node plus the text around it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub next_sibling_text: Option<String>,
    #[serde(default)]
    pub parent_text: Option<String>,
}

/// Serialized text structure of an item page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// Text of the first `h1`.
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub nodes: Vec<TextNode>,
    #[serde(default)]
    pub body_text: String,
}
