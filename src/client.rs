//! GEVER client bound to one resource URL and one acting user

use crate::auth::Session;
use crate::context::ApiContext;
use crate::error::{ApiError, ApiResult, RequestFailure};
use crate::models::Model;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    error_message: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message attached to the error when the request fails
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Communicates with GEVER in the name of one user, for one resource.
///
/// All actions are performed as `username`. Sessions come from the shared
/// [`SessionCache`](crate::auth::SessionCache), so creating clients is cheap.
#[derive(Clone)]
pub struct Client {
    url: String,
    username: String,
    base_url: String,
    context: ApiContext,
}

impl Client {
    /// Create a client for the resource at `url`.
    ///
    /// Fails with `ServiceKeyMissing` when no service key covers the URL.
    pub fn new(context: &ApiContext, url: &str, username: &str) -> ApiResult<Self> {
        let base_url = context
            .credentials()
            .lookup_base_url(url)
            .ok_or_else(|| context.credentials().missing_key(url))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            base_url,
            context: context.clone(),
        })
    }

    /// Resource URL without trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Base URL of the backend serving this resource
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn context(&self) -> &ApiContext {
        &self.context
    }

    /// Client for another resource, acting as the same user
    pub fn adopt(&self, url: &str) -> ApiResult<Client> {
        Client::new(&self.context, url, &self.username)
    }

    /// Wrap a backend item into its model
    pub fn wrap(&self, item: Value) -> ApiResult<Box<dyn Model>> {
        self.context.models().wrap(item, self)
    }

    /// Session prepared for the next request, with a token valid for a while
    pub async fn session(&self) -> ApiResult<Arc<Session>> {
        self.context
            .sessions()
            .get_session(&self.base_url, &self.username)
            .await
    }

    /// URL of a view on this resource, e.g. `/@listing`
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let response = self.send(Method::GET, path, None, options.clone()).await?;
        decode(response, &self.endpoint(path), options).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let body = serde_json::to_value(body)?;
        let response = self
            .send(Method::POST, path, Some(body), options.clone())
            .await?;
        decode(response, &self.endpoint(path), options).await
    }

    pub(crate) async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<()> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, path, Some(body), options).await?;
        Ok(())
    }

    /// Send an authenticated request; any non-2xx response becomes an error
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> ApiResult<reqwest::Response> {
        let url = self.endpoint(path);
        let session = self.session().await?;

        let mut request = session.request(method.clone(), &url).await;
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(target: "api", method = %method, url = %url, username = %self.username, "Sending request");

        let response = request.send().await.map_err(|err| {
            ApiError::request_failed(RequestFailure::transport(&url, err), options.error_message.clone())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ApiError::request_failed(
                RequestFailure::status(status, &url, body),
                options.error_message,
            ));
        }

        tracing::debug!(target: "api", method = %method, url = %url, status = status.as_u16(), "Request succeeded");
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
    options: RequestOptions,
) -> ApiResult<T> {
    let bytes = response.bytes().await.map_err(|err| {
        ApiError::request_failed(RequestFailure::transport(url, err), options.error_message)
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("base_url", &self.base_url)
            .finish()
    }
}
