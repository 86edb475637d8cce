//! Listing responses and pagination parameters

use super::Model;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Result of an `@listing` request with wrapped items
#[derive(Debug)]
pub struct Listing {
    pub items: Vec<Box<dyn Model>>,
    pub items_total: Option<u64>,
    /// `batching` links (`@id`, `first`, `next`, ...) when the listing is batched
    pub batching: Option<Value>,
    /// The remaining fields of the response
    pub raw: Map<String, Value>,
}

/// Translates Vuetify data-table query parameters into backend batching parameters
#[derive(Debug, Clone, Default)]
pub struct VuetifyPaginator {
    params: HashMap<String, String>,
}

impl VuetifyPaginator {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Percent-encoded search text
    pub fn search(&self) -> String {
        urlencoding::encode(self.param("search").unwrap_or_default()).into_owned()
    }

    pub fn sort_on(&self) -> &str {
        self.param("sortBy").unwrap_or("title")
    }

    pub fn sort_order(&self) -> &'static str {
        if self.param("descending") == Some("true") {
            "descending"
        } else {
            "ascending"
        }
    }

    /// Index of the first item of the requested page
    pub fn b_start(&self) -> u64 {
        let page = self.param("page").and_then(|p| p.parse::<u64>().ok());
        let per_page = self.param("rowsPerPage").and_then(|p| p.parse::<u64>().ok());
        match (page, per_page) {
            (Some(page), Some(per_page)) => {
                page.saturating_sub(1).checked_mul(per_page).unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn b_size(&self) -> String {
        self.param("rowsPerPage").unwrap_or("10").to_string()
    }

    /// Query string fragments; values other than `search` are encoded here
    pub fn query_params(&self) -> Vec<String> {
        vec![
            format!("search={}", self.search()),
            format!("sort_on={}", urlencoding::encode(self.sort_on())),
            format!("sort_order={}", self.sort_order()),
            format!("b_start={}", self.b_start()),
            format!("b_size={}", urlencoding::encode(&self.b_size())),
        ]
    }
}
