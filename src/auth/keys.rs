//! Service key loading and lookup by backend base URL

use crate::error::{ApiError, ApiResult};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix of the token endpoint; the rest of the URL is the backend base URL
pub const TOKEN_ENDPOINT_SUFFIX: &str = "@@oauth2-token";

/// A service key as issued by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// JWT issuer (`client_id`)
    pub issuer_id: String,
    /// PEM encoded RSA private key
    pub signing_key: String,
    pub token_endpoint_url: String,
    /// Service user the key was issued for (`user_id`)
    pub subject_hint: Option<String>,
    pub key_id: Option<String>,
    pub issued: Option<String>,
}

impl Credential {
    /// Base URL of the backend this credential belongs to
    pub fn base_url(&self) -> String {
        base_url_for(&self.token_endpoint_url)
    }
}

/// Strip the token endpoint suffix from a token URI
pub fn base_url_for(token_uri: &str) -> String {
    token_uri
        .strip_suffix(TOKEN_ENDPOINT_SUFFIX)
        .unwrap_or(token_uri)
        .to_string()
}

/// Key file as found on disk
#[derive(Debug, Deserialize)]
struct KeyFile {
    #[serde(alias = "issuer_id")]
    client_id: Option<String>,
    private_key: Option<String>,
    token_uri: Option<String>,
    user_id: Option<String>,
    key_id: Option<String>,
    issued: Option<String>,
}

/// Outcome of loading one or more key directories
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Files without a token endpoint
    pub skipped: usize,
    /// Base URLs whose previous key was replaced by a later file
    pub replaced: Vec<String>,
}

impl LoadSummary {
    fn merge(&mut self, other: LoadSummary) {
        self.loaded += other.loaded;
        self.skipped += other.skipped;
        self.replaced.extend(other.replaced);
    }
}

/// Service keys indexed by backend base URL.
///
/// Populated at startup (or on [`reset`](Self::reset)) and read-only afterwards.
/// Lookups iterate the base URLs in sorted order and return the first one the
/// candidate URL starts with.
pub struct CredentialStore {
    key_dirs: Vec<PathBuf>,
    keys: RwLock<BTreeMap<String, Arc<Credential>>>,
}

impl CredentialStore {
    /// Create an empty store that loads from `key_dirs` on [`reset`](Self::reset)
    pub fn new(key_dirs: Vec<PathBuf>) -> Self {
        Self {
            key_dirs,
            keys: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store and load all configured directories
    pub fn load_configured(key_dirs: Vec<PathBuf>) -> ApiResult<Self> {
        let store = Self::new(key_dirs);
        store.reset()?;
        Ok(store)
    }

    /// Directories this store loads from
    pub fn key_dirs(&self) -> &[PathBuf] {
        &self.key_dirs
    }

    /// Clear the store and reload every configured directory
    pub fn reset(&self) -> ApiResult<LoadSummary> {
        self.clear();
        let summary = self.load(&self.key_dirs)?;

        tracing::info!(
            target: "auth::keys",
            loaded = summary.loaded,
            skipped = summary.skipped,
            replaced = summary.replaced.len(),
            dirs = self.key_dirs.len(),
            "Loaded service keys"
        );

        Ok(summary)
    }

    /// Remove all keys
    pub fn clear(&self) {
        self.keys.write().clear();
    }

    /// Load the given directories in order; later keys replace earlier ones
    pub fn load<P: AsRef<Path>>(&self, dirs: &[P]) -> ApiResult<LoadSummary> {
        let mut summary = LoadSummary::default();
        for dir in dirs {
            summary.merge(self.load_directory(dir.as_ref())?);
        }
        Ok(summary)
    }

    /// Load every `*.json` key file of one directory
    pub fn load_directory(&self, dir: &Path) -> ApiResult<LoadSummary> {
        let mut summary = LoadSummary::default();

        if !dir.is_dir() {
            tracing::debug!(target: "auth::keys", path = %dir.display(), "Key directory does not exist, skipping");
            return Ok(summary);
        }

        for path in key_files(dir)? {
            let content = fs::read_to_string(&path).map_err(|source| ApiError::Io {
                path: path.clone(),
                source,
            })?;
            let file: KeyFile =
                serde_json::from_str(&content).map_err(|source| ApiError::CredentialFile {
                    path: path.clone(),
                    source,
                })?;

            let Some(credential) = credential_from(file) else {
                tracing::debug!(target: "auth::keys", path = %path.display(), "Key file has no token_uri, skipping");
                summary.skipped += 1;
                continue;
            };

            let base_url = credential.base_url();
            if self
                .keys
                .write()
                .insert(base_url.clone(), Arc::new(credential))
                .is_some()
            {
                tracing::warn!(
                    target: "auth::keys",
                    base_url = %base_url,
                    path = %path.display(),
                    "Service key replaces a previously loaded key for the same base URL"
                );
                summary.replaced.push(base_url.clone());
            }

            tracing::debug!(target: "auth::keys", base_url = %base_url, path = %path.display(), "Loaded service key");
            summary.loaded += 1;
        }

        Ok(summary)
    }

    /// Base URL of the backend serving `url`
    pub fn lookup_base_url(&self, url: &str) -> Option<String> {
        self.keys
            .read()
            .keys()
            .find(|base_url| url.starts_with(base_url.as_str()))
            .cloned()
    }

    /// Service key for the backend serving `url`
    pub fn lookup_credential(&self, url: &str) -> Option<Arc<Credential>> {
        self.keys
            .read()
            .iter()
            .find(|(base_url, _)| url.starts_with(base_url.as_str()))
            .map(|(_, credential)| credential.clone())
    }

    /// Known base URLs in lookup order
    pub fn base_urls(&self) -> Vec<String> {
        self.keys.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Error for a URL no key matches, listing what was searched
    pub fn missing_key(&self, url: &str) -> ApiError {
        let err = ApiError::ServiceKeyMissing {
            url: url.to_string(),
            known_base_urls: self.base_urls(),
            key_dirs: self.key_dirs.clone(),
        };
        tracing::warn!(target: "auth::keys", url = %url, "{}", err);
        err
    }
}

fn credential_from(file: KeyFile) -> Option<Credential> {
    let token_endpoint_url = file.token_uri?;
    Some(Credential {
        issuer_id: file.client_id.unwrap_or_default(),
        signing_key: file.private_key.unwrap_or_default(),
        token_endpoint_url,
        subject_hint: file.user_id,
        key_id: file.key_id,
        issued: file.issued,
    })
}

fn key_files(dir: &Path) -> ApiResult<Vec<PathBuf>> {
    let io_err = |source| ApiError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_key_file;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_with(base_urls: &[&str]) -> (CredentialStore, TempDir) {
        let dir = TempDir::new().unwrap();
        for (i, base_url) in base_urls.iter().enumerate() {
            write_key_file(dir.path(), &format!("key{}.json", i), base_url);
        }
        let store = CredentialStore::load_configured(vec![dir.path().to_path_buf()]).unwrap();
        (store, dir)
    }

    #[test]
    fn test_loads_keys_of_one_directory() {
        let dir = TempDir::new().unwrap();
        write_key_file(dir.path(), "mandant.json", "https://gever.test/mandant/");

        let store = CredentialStore::new(Vec::new());
        assert!(store.is_empty());

        let summary = store.load_directory(dir.path()).unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(store.base_urls(), vec!["https://gever.test/mandant/".to_string()]);
    }

    #[test]
    fn test_lookup_base_url() {
        let (store, _dir) = store_with(&["https://gever.test/mandant/"]);

        assert_eq!(
            store.lookup_base_url("https://gever.test/mandant/foo"),
            Some("https://gever.test/mandant/".to_string())
        );
        assert_eq!(store.lookup_base_url("https://other/"), None);
    }

    #[test]
    fn test_lookup_credential() {
        let (store, _dir) = store_with(&["https://gever.test/mandant/"]);

        assert!(store.lookup_credential("http://unknown/url").is_none());

        let credential = store
            .lookup_credential("https://gever.test/mandant/foo/bar/baz")
            .unwrap();
        assert_eq!(credential.issuer_id, "4321");
        assert_eq!(credential.key_id.as_deref(), Some("1234"));
        assert_eq!(credential.subject_hint.as_deref(), Some("ris.app"));
        assert_eq!(
            credential.token_endpoint_url,
            "https://gever.test/mandant/@@oauth2-token"
        );
    }

    #[test]
    fn test_sorted_order_first_match_wins() {
        let (store, _dir) = store_with(&["https://a/b/", "https://a/"]);

        // "https://a/" sorts first and matches, even though "https://a/b/" is longer
        assert_eq!(
            store.lookup_base_url("https://a/b/c"),
            Some("https://a/".to_string())
        );
    }

    #[test]
    fn test_skips_files_without_token_uri() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("incomplete.json"),
            json!({"client_id": "1", "private_key": "x"}).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a key").unwrap();

        let store = CredentialStore::new(Vec::new());
        let summary = store.load_directory(dir.path()).unwrap();
        assert_eq!(summary.loaded, 0);
        assert_eq!(summary.skipped, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_collisions_are_reported() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_key_file(first.path(), "a.json", "https://gever.test/mandant/");
        write_key_file(second.path(), "b.json", "https://gever.test/mandant/");

        let store = CredentialStore::new(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let summary = store.reset().unwrap();

        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.replaced, vec!["https://gever.test/mandant/".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_json_names_the_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let store = CredentialStore::new(vec![dir.path().to_path_buf()]);
        match store.reset() {
            Err(ApiError::CredentialFile { path, .. }) => {
                assert!(path.ends_with("broken.json"))
            }
            other => panic!("expected CredentialFile error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_directory_is_skipped() {
        let store = CredentialStore::new(vec![PathBuf::from("/nonexistent/gever/keys")]);
        let summary = store.reset().unwrap();
        assert_eq!(summary, LoadSummary::default());
    }

    #[test]
    fn test_reset_reloads_configured_directories() {
        let (store, _dir) = store_with(&["https://gever.test/mandant/"]);
        store.clear();
        assert!(store.is_empty());

        store.reset().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_key_lists_known_urls_and_dirs() {
        let (store, dir) = store_with(&["https://gever.test/mandant/"]);

        match store.missing_key("http://gever.example.com/fd/") {
            ApiError::ServiceKeyMissing {
                url,
                known_base_urls,
                key_dirs,
            } => {
                assert_eq!(url, "http://gever.example.com/fd/");
                assert_eq!(known_base_urls, vec!["https://gever.test/mandant/".to_string()]);
                assert_eq!(key_dirs, vec![dir.path().to_path_buf()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
