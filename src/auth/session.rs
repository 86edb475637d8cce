//! Cached, auto-renewing service sessions
//!
//! A [`Session`] is bound to one backend base URL and one acting user. The
//! [`SessionCache`] creates it on first use, hands out the same instance to
//! every caller afterwards and renews its bearer token in place shortly before
//! the token expires.

use super::assertion::{sign_assertion, unfrozen_now, GRANT_TYPE};
use super::keys::{Credential, CredentialStore};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, RequestFailure};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Bearer token and the moment it stops being accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// An authenticated transport for one (base URL, user) pair
#[derive(Debug)]
pub struct Session {
    base_url: String,
    username: String,
    http: reqwest::Client,
    token: RwLock<BearerToken>,
}

impl Session {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Underlying HTTP client, preconfigured with user agent and accept headers
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Current bearer token
    pub async fn token(&self) -> BearerToken {
        self.token.read().await.clone()
    }

    pub async fn expires_at(&self) -> DateTime<Utc> {
        self.token.read().await.expires_at
    }

    /// Value of the `Authorization` header
    pub async fn authorization(&self) -> String {
        format!("Bearer {}", self.token.read().await.access_token)
    }

    /// Start a request carrying the current bearer token
    pub async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self.token.read().await.access_token.clone();
        self.http.request(method, url).bearer_auth(token)
    }

    async fn expires_within(&self, window: Duration) -> bool {
        let expires_at = self.token.read().await.expires_at;
        chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| expires_at.checked_sub_signed(window))
            .map_or(true, |renew_at| renew_at <= unfrozen_now())
    }

    async fn replace_token(&self, token: BearerToken) {
        *self.token.write().await = token;
    }

    #[cfg(test)]
    pub(crate) async fn set_expiry(&self, expires_at: DateTime<Utc>) {
        self.token.write().await.expires_at = expires_at;
    }
}

/// Process-wide cache of sessions keyed by (base URL, username)
pub struct SessionCache {
    credentials: Arc<CredentialStore>,
    sessions: DashMap<(String, String), Arc<Session>>,
    auth_http: reqwest::Client,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    renew_before: Duration,
    session_lifetime: Duration,
}

impl SessionCache {
    /// Create an empty cache authenticating with keys from `credentials`
    pub fn new(credentials: Arc<CredentialStore>, config: &ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let user_agent = config.user_agent();
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|_| ApiError::Config(format!("Invalid user agent: {}", user_agent)))?,
        );
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let timeout = config.timeout.map(Duration::from_secs);
        let auth_http = build_http(default_headers.clone(), timeout)?;

        Ok(Self {
            credentials,
            sessions: DashMap::new(),
            auth_http,
            default_headers,
            timeout,
            renew_before: config.renew_before,
            session_lifetime: config.session_lifetime,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Return a session for `username` on the backend serving `base_url`.
    ///
    /// The first call for a pair authenticates; later calls return the cached
    /// session, renewing its token first when it expires within the renewal
    /// threshold.
    pub async fn get_session(&self, base_url: &str, username: &str) -> ApiResult<Arc<Session>> {
        let credential = self
            .credentials
            .lookup_credential(base_url)
            .ok_or_else(|| self.credentials.missing_key(base_url))?;
        let key = (credential.base_url(), username.to_string());

        let cached = self.sessions.get(&key).map(|entry| entry.value().clone());
        if let Some(session) = cached {
            if session.expires_within(self.renew_before).await {
                tracing::debug!(
                    target: "auth::session",
                    base_url = %session.base_url,
                    username = %session.username,
                    "Token expires soon, renewing"
                );
                let token = self.acquire_token(&credential, username).await?;
                session.replace_token(token).await;
            }
            return Ok(session);
        }

        let token = self.acquire_token(&credential, username).await?;
        let session = Arc::new(Session {
            base_url: key.0.clone(),
            username: key.1.clone(),
            http: build_http(self.default_headers.clone(), self.timeout)?,
            token: RwLock::new(token),
        });

        tracing::info!(
            target: "auth::session",
            base_url = %session.base_url,
            username = %session.username,
            "Created GEVER session"
        );

        Ok(self.sessions.entry(key).or_insert(session).value().clone())
    }

    /// Drop every cached session; service keys stay loaded
    pub fn clear_all(&self) {
        self.sessions.clear();
        tracing::debug!(target: "auth::session", "Cleared all sessions");
    }

    pub fn contains(&self, base_url: &str, username: &str) -> bool {
        self.sessions
            .contains_key(&(base_url.to_string(), username.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Exchange a freshly signed assertion for a bearer token
    async fn acquire_token(&self, credential: &Credential, username: &str) -> ApiResult<BearerToken> {
        let token_uri = credential.token_endpoint_url.as_str();

        let assertion = sign_assertion(credential, username, self.session_lifetime).map_err(|err| {
            ApiError::authorization_failed(RequestFailure::other(
                token_uri,
                format!("Failed to sign service assertion: {}", err),
                Some(Box::new(err)),
            ))
        })?;

        let response = self
            .auth_http
            .post(token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.token.as_str())])
            .send()
            .await
            .map_err(|err| ApiError::authorization_failed(RequestFailure::transport(token_uri, err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ApiError::authorization_failed(RequestFailure::status(
                status, token_uri, body,
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| ApiError::authorization_failed(RequestFailure::transport(token_uri, err)))?;
        let access_token = body.access_token.ok_or_else(|| {
            ApiError::authorization_failed(RequestFailure::other(
                token_uri,
                "Token response does not contain an access_token",
                None,
            ))
        })?;

        tracing::debug!(
            target: "auth::session",
            token_uri = %token_uri,
            username = %username,
            exp = assertion.claims.exp,
            "Acquired bearer token"
        );

        Ok(BearerToken {
            access_token,
            expires_at: assertion.claims.expires_at(),
        })
    }
}

fn build_http(headers: HeaderMap, timeout: Option<Duration>) -> ApiResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::assertion::AssertionClaims;
    use crate::test_support::{TestBackend, TEST_PUBLIC_KEY, TOKEN_PATH};
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_get_session_authenticates_once() {
        let backend = TestBackend::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "secret"})))
            .expect(1)
            .mount(&backend.server)
            .await;

        let cache = backend.context.sessions();
        let first = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        let second = cache.get_session(&backend.base_url, "john.doe").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.token().await.access_token, "secret");
        assert_eq!(first.authorization().await, "Bearer secret");
        assert_eq!(first.username(), "john.doe");
        assert_eq!(first.base_url(), backend.base_url);
    }

    #[tokio::test]
    async fn test_returned_token_is_outside_renewal_window() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;

        let session = backend
            .context
            .sessions()
            .get_session(&backend.base_url, "john.doe")
            .await
            .unwrap();

        let threshold = chrono::Duration::from_std(backend.context.config().renew_before).unwrap();
        assert!(session.expires_at().await >= unfrozen_now() + threshold);
    }

    #[tokio::test]
    async fn test_fresh_tokens_outlive_tight_threshold() {
        let renew_before = Duration::from_millis(58_100);
        let backend = TestBackend::start_with(
            ClientConfig::new()
                .with_renew_before(renew_before)
                .with_session_lifetime(Duration::from_secs(61)),
        )
        .await;
        backend.mount_token("secret").await;

        let cache = backend.context.sessions();
        let threshold = chrono::Duration::from_std(renew_before).unwrap();
        for _ in 0..20 {
            let session = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
            assert!(session.expires_at().await > unfrozen_now() + threshold);
            cache.clear_all();
        }
    }

    #[test]
    fn test_sub_second_threshold_at_lifetime_is_rejected() {
        let config = ClientConfig::new()
            .with_renew_before(Duration::from_millis(59_900))
            .with_session_lifetime(Duration::from_secs(60));
        let credentials = Arc::new(CredentialStore::new(Vec::new()));

        let err = SessionCache::new(credentials, &config).err().unwrap();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[tokio::test]
    async fn test_token_request_carries_signed_assertion() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;

        backend
            .context
            .sessions()
            .get_session(&backend.url("ordnungssystem"), "john.doe")
            .await
            .unwrap();

        let requests = backend.server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let form: std::collections::HashMap<String, String> =
            url::form_urlencoded::parse(&requests[0].body).into_owned().collect();
        assert_eq!(form.get("grant_type").map(String::as_str), Some(GRANT_TYPE));

        let token_uri = format!("{}@@oauth2-token", backend.base_url);
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let claims = decode::<AssertionClaims>(
            &form["assertion"],
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.iss, "4321");
        assert_eq!(claims.sub, "john.doe");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn test_renews_expiring_token_in_place() {
        let backend = TestBackend::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "first"})))
            .up_to_n_times(1)
            .mount(&backend.server)
            .await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "second"})))
            .mount(&backend.server)
            .await;

        let cache = backend.context.sessions();
        let session = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        assert_eq!(session.token().await.access_token, "first");

        session
            .set_expiry(unfrozen_now() + chrono::Duration::seconds(30))
            .await;

        let renewed = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        assert!(Arc::ptr_eq(&session, &renewed));
        assert_eq!(renewed.token().await.access_token, "second");
        assert!(renewed.expires_at().await >= unfrozen_now() + chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_token_endpoint_error_raises_authorization_failed() {
        let backend = TestBackend::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("key revoked"))
            .mount(&backend.server)
            .await;

        let cache = backend.context.sessions();
        let err = cache
            .get_session(&backend.base_url, "john.doe")
            .await
            .unwrap_err();

        match &err {
            ApiError::AuthorizationFailed { failure, .. } => {
                assert_eq!(failure.body.as_deref(), Some("key revoked"));
            }
            other => panic!("expected AuthorizationFailed, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            format!(
                "500 Server Error: Internal Server Error for url: {}@@oauth2-token",
                backend.base_url
            )
        );
        assert!(!cache.contains(&backend.base_url, "john.doe"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_response_without_access_token_fails() {
        let backend = TestBackend::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})))
            .mount(&backend.server)
            .await;

        let err = backend
            .context
            .sessions()
            .get_session(&backend.base_url, "john.doe")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AuthorizationFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_backend_raises_service_key_missing() {
        let backend = TestBackend::start().await;

        let err = backend
            .context
            .sessions()
            .get_session("http://gever.example.com/fd/", "john.doe")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ServiceKeyMissing { .. }));
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;

        let cache = backend.context.sessions();
        let john = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        let jane = cache.get_session(&backend.base_url, "jane.doe").await.unwrap();

        assert!(!Arc::ptr_eq(&john, &jane));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_keeps_service_keys() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;

        let cache = backend.context.sessions();
        let before = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        cache.clear_all();

        assert!(cache.is_empty());
        assert_eq!(cache.credentials().len(), 1);

        let after = cache.get_session(&backend.base_url, "john.doe").await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_session() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let context = backend.context.clone();
            let base_url = backend.base_url.clone();
            handles.push(tokio::spawn(async move {
                context.sessions().get_session(&base_url, "john.doe").await
            }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(backend.context.sessions().len(), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[tokio::test]
    async fn test_session_sends_default_headers() {
        let backend = TestBackend::start().await;
        backend.mount_token("secret").await;
        Mock::given(method("GET"))
            .and(path("/mandant/dossier-1"))
            .and(header("authorization", "Bearer secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&backend.server)
            .await;

        let session = backend
            .context
            .sessions()
            .get_session(&backend.base_url, "john.doe")
            .await
            .unwrap();
        let response = session
            .request(Method::GET, &backend.url("dossier-1"))
            .await
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let requests = backend.server.received_requests().await.unwrap();
        let user_agent = requests
            .last()
            .and_then(|r| r.headers.get("user-agent"))
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(user_agent.starts_with("gever-client/"));
    }
}
