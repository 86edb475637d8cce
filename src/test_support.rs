//! Fixtures shared by the unit tests

use crate::auth::Credential;
use crate::client::Client;
use crate::config::ClientConfig;
use crate::context::ApiContext;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_PRIVATE_KEY: &str = include_str!("testdata/service_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("testdata/service_key.pub.pem");

/// Token endpoint path of the mocked backend
pub const TOKEN_PATH: &str = "/mandant/@@oauth2-token";

/// Write a service key file for the backend at `base_url`
pub fn write_key_file(dir: &Path, name: &str, base_url: &str) {
    let key = json!({
        "key_id": "1234",
        "client_id": "4321",
        "user_id": "ris.app",
        "issued": "2018-05-23T00:00:00",
        "token_uri": format!("{}@@oauth2-token", base_url),
        "private_key": TEST_PRIVATE_KEY,
    });
    std::fs::write(dir.join(name), serde_json::to_string_pretty(&key).unwrap()).unwrap();
}

pub fn credential_for(base_url: &str) -> Credential {
    Credential {
        issuer_id: "4321".to_string(),
        signing_key: TEST_PRIVATE_KEY.to_string(),
        token_endpoint_url: format!("{}@@oauth2-token", base_url),
        subject_hint: Some("ris.app".to_string()),
        key_id: Some("1234".to_string()),
        issued: Some("2018-05-23T00:00:00".to_string()),
    }
}

/// Mock backend at `<server>/mandant/` with a service key pointing at it
pub struct TestBackend {
    pub server: MockServer,
    pub base_url: String,
    pub context: ApiContext,
    _keys: TempDir,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self::start_with(ClientConfig::new()).await
    }

    /// Start with `config`; the key directory is added to it
    pub async fn start_with(config: ClientConfig) -> Self {
        let server = MockServer::start().await;
        let base_url = format!("{}/mandant/", server.uri());

        let keys = tempfile::tempdir().unwrap();
        write_key_file(keys.path(), "mandant.json", &base_url);

        let context = ApiContext::new(config.with_key_dir(keys.path())).unwrap();

        Self {
            server,
            base_url,
            context,
            _keys: keys,
        }
    }

    /// Answer every token request with `token`
    pub async fn mount_token(&self, token: &str) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .mount(&self.server)
            .await;
    }

    /// Absolute URL of `path` below the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self, path: &str, username: &str) -> Client {
        Client::new(&self.context, &self.url(path), username).unwrap()
    }
}
