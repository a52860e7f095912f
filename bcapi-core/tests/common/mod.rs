#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bcapi_core::{MemoryTokenStore, SiteClient, SiteHelper};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "site-token";
pub const STORAGE_PREFIX: &str = "/api/v2/admin/sites/current/storage";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn client_for(server: &MockServer) -> SiteClient {
    init_tracing();
    let store = Arc::new(MemoryTokenStore::with_site_token(TOKEN));
    SiteClient::with_origin(&server.uri(), SiteHelper::new().with_token_store(store)).unwrap()
}

#[derive(Clone)]
enum Stored {
    File {
        content: Vec<u8>,
        modified: OffsetDateTime,
    },
    Folder {
        modified: OffsetDateTime,
    },
}

/// In-memory stand-in for the storage API, keyed by resource path.
#[derive(Clone, Default)]
pub struct FakeStorage {
    items: Arc<Mutex<BTreeMap<String, Stored>>>,
}

impl FakeStorage {
    pub async fn mount(server: &MockServer) -> Self {
        let storage = Self::default();
        Mock::given(path_regex(format!("^{STORAGE_PREFIX}/")))
            .respond_with(storage.clone())
            .mount(server)
            .await;
        storage
    }

    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        match self.items.lock().unwrap().get(path) {
            Some(Stored::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn metadata(items: &BTreeMap<String, Stored>, path: &str, item: &Stored) -> Value {
        let name = path.rsplit('/').next().unwrap_or_default();
        match item {
            Stored::File { content, modified } => json!({
                "type": "file",
                "name": name,
                "size": content.len(),
                "lastModified": modified.format(&Rfc3339).unwrap(),
            }),
            Stored::Folder { modified } => {
                let prefix = if path == "/" {
                    "/".to_string()
                } else {
                    format!("{path}/")
                };
                let contents: Vec<Value> = items
                    .iter()
                    .filter_map(|(key, child)| {
                        let rest = key.strip_prefix(&prefix)?;
                        if rest.is_empty() || rest.contains('/') {
                            return None;
                        }
                        let kind = match child {
                            Stored::File { .. } => "file",
                            Stored::Folder { .. } => "folder",
                        };
                        Some(json!({ "name": rest, "type": kind }))
                    })
                    .collect();
                json!({
                    "type": "folder",
                    "name": name,
                    "lastModified": modified.format(&Rfc3339).unwrap(),
                    "contents": contents,
                })
            }
        }
    }
}

impl Respond for FakeStorage {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some(TOKEN);
        if !authorized {
            return ResponseTemplate::new(401).set_body_string("missing site token");
        }

        let key = request.url.path()[STORAGE_PREFIX.len()..].to_string();
        let is_meta = request.url.query() == Some("meta");
        let mut items = self.items.lock().unwrap();
        items
            .entry("/".to_string())
            .or_insert(Stored::Folder {
                modified: OffsetDateTime::UNIX_EPOCH,
            });

        match (request.method.as_str(), is_meta) {
            ("PUT", false) => {
                items.insert(
                    key,
                    Stored::File {
                        content: request.body.clone(),
                        modified: OffsetDateTime::now_utc(),
                    },
                );
                ResponseTemplate::new(204)
            }
            ("GET", false) => match items.get(&key) {
                Some(Stored::File { content, .. }) => {
                    ResponseTemplate::new(200).set_body_bytes(content.clone())
                }
                _ => ResponseTemplate::new(404),
            },
            ("GET", true) => match items.get(&key) {
                Some(item) => ResponseTemplate::new(200)
                    .set_body_json(Self::metadata(&items, &key, item)),
                None => ResponseTemplate::new(404),
            },
            ("PUT", true) => {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                if body["type"] == "folder" && !items.contains_key(&key) {
                    items.insert(
                        key.clone(),
                        Stored::Folder {
                            modified: OffsetDateTime::now_utc(),
                        },
                    );
                }
                match items.get(&key) {
                    Some(item) => ResponseTemplate::new(200)
                        .set_body_json(Self::metadata(&items, &key, item)),
                    None => ResponseTemplate::new(404),
                }
            }
            ("DELETE", true) => match items.remove(&key) {
                Some(_) => ResponseTemplate::new(204),
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(405),
        }
    }
}
