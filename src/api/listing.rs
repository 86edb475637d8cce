use crate::client::{Client, RequestOptions};
use crate::error::{ApiError, ApiResult};
use crate::models::{Listing, VuetifyPaginator, TYPE_KEY};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Listing API methods on the client's resource
#[async_trait]
pub trait ListingApi {
    /// Fetch the named listing with the given columns.
    ///
    /// `@type` is always requested so the items can be wrapped.
    async fn listing(&self, name: &str, columns: &[&str]) -> ApiResult<Listing>;

    /// Fetch one page of the named listing from Vuetify data-table parameters
    async fn paginated_listing(
        &self,
        name: &str,
        columns: &[&str],
        params: &HashMap<String, String>,
    ) -> ApiResult<Listing>;
}

#[async_trait]
impl ListingApi for Client {
    async fn listing(&self, name: &str, columns: &[&str]) -> ApiResult<Listing> {
        let path = listing_path(name, columns, &[]);
        self.fetch_listing(&path).await
    }

    async fn paginated_listing(
        &self,
        name: &str,
        columns: &[&str],
        params: &HashMap<String, String>,
    ) -> ApiResult<Listing> {
        let paginator = VuetifyPaginator::new(params.clone());
        let path = listing_path(name, columns, &paginator.query_params());
        self.fetch_listing(&path).await
    }
}

impl Client {
    async fn fetch_listing(&self, path: &str) -> ApiResult<Listing> {
        let mut raw: Map<String, Value> = self.get(path, RequestOptions::new()).await?;

        let items = match raw.remove("items") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ApiError::FieldType {
                    field: "items".to_string(),
                    expected: "a list",
                })
            }
            None => {
                return Err(ApiError::FieldMissing {
                    field: "items".to_string(),
                    portal_type: "@listing".to_string(),
                })
            }
        };

        let items = items
            .into_iter()
            .map(|item| self.wrap(item))
            .collect::<ApiResult<Vec<_>>>()?;
        let items_total = raw.get("items_total").and_then(Value::as_u64);
        let batching = raw.remove("batching");

        tracing::debug!(target: "api", url = %self.url(), count = items.len(), "Fetched listing");

        Ok(Listing {
            items,
            items_total,
            batching,
            raw,
        })
    }
}

/// `/@listing` path with the query string; `extra` fragments are already encoded
fn listing_path(name: &str, columns: &[&str], extra: &[String]) -> String {
    let mut query = vec![format!("name={}", urlencoding::encode(name))];
    query.push(format!("columns:list={}", urlencoding::encode(TYPE_KEY)));
    for column in columns.iter().filter(|c| **c != TYPE_KEY) {
        query.push(format!("columns:list={}", urlencoding::encode(column)));
    }
    query.extend(extra.iter().cloned());
    format!("/@listing?{}", query.join("&"))
}
