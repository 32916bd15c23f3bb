//! In-memory stand-in for the Cloudflare R2 REST API, served by wiremock.

#![allow(dead_code)]

use parking_lot::Mutex;
use r2kit_core::{ClientFactory, R2Options, SharedClient};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ACCOUNT: &str = "acct";
pub const TOKEN: &str = "test-token";

/// Bucket name for which every call answers 503
pub const BROKEN_BUCKET: &str = "broken";

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    buckets: BTreeMap<String, String>,
    fail_deletes: bool,
    page_size: Option<usize>,
    requests: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeR2 {
    state: Arc<Mutex<State>>,
}

fn envelope(result: Value) -> Value {
    json!({"success": true, "errors": [], "messages": [], "result": result})
}

fn failure(status: u16, code: i32, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "errors": [{"code": code, "message": message}],
        "messages": [],
        "result": null
    }))
}

impl FakeR2 {
    pub async fn start() -> (MockServer, FakeR2) {
        let server = MockServer::start().await;
        let fake = FakeR2::default();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    pub fn insert(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) {
        self.state.lock().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: Some(content_type.to_string()),
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn add_bucket(&self, name: &str, location: &str) {
        self.state
            .lock()
            .buckets
            .insert(name.to_string(), location.to_string());
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.state.lock().buckets.contains_key(name)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    pub fn paginate(&self, page_size: usize) {
        self.state.lock().page_size = Some(page_size);
    }

    /// `METHOD /path?query` of every request seen, in order
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    fn bucket_json(name: &str, location: &str) -> Value {
        json!({"name": name, "location": location, "creation_date": "2024-01-01T00:00:00.000Z"})
    }

    fn list_objects(&self, state: &State, bucket: &str, request: &Request) -> ResponseTemplate {
        let mut prefix = String::new();
        let mut offset = 0usize;
        for (name, value) in request.url.query_pairs() {
            match name.as_ref() {
                "prefix" => prefix = value.into_owned(),
                "cursor" => offset = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        let matching: Vec<Value> = state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(&prefix))
            .map(|((_, key), object)| {
                json!({
                    "key": key,
                    "size": object.body.len(),
                    "etag": format!("etag-{}", object.body.len()),
                    "last_modified": "2024-01-01T00:00:00.000Z",
                    "http_metadata": {"contentType": object.content_type},
                })
            })
            .collect();

        let page_size = state.page_size.unwrap_or(usize::MAX);
        let end = offset.saturating_add(page_size).min(matching.len());
        let page = matching[offset.min(end)..end].to_vec();
        let is_truncated = end < matching.len();

        let cursor = if is_truncated {
            Value::String(end.to_string())
        } else {
            Value::Null
        };

        let mut body = envelope(Value::Array(page));
        body["result_info"] = json!({"cursor": cursor, "is_truncated": is_truncated});
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn object_call(&self, state: &mut State, method: &str, bucket: &str, key: &str, request: &Request) -> ResponseTemplate {
        let id = (bucket.to_string(), key.to_string());
        match method {
            "PUT" => {
                let content_type = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let size = request.body.len();
                state.objects.insert(
                    id,
                    StoredObject {
                        body: request.body.clone(),
                        content_type,
                    },
                );
                ResponseTemplate::new(200).set_body_json(envelope(json!({"key": key, "size": size})))
            }
            "GET" | "HEAD" => match state.objects.get(&id) {
                Some(object) => ResponseTemplate::new(200)
                    .set_body_raw(
                        object.body.clone(),
                        object.content_type.as_deref().unwrap_or("application/octet-stream"),
                    )
                    .insert_header("etag", format!("\"etag-{}\"", object.body.len()).as_str())
                    .insert_header("last-modified", "Mon, 01 Jan 2024 00:00:00 GMT")
                    .insert_header("x-amz-meta-stored-by", "fake-r2"),
                None => failure(404, 10007, "The specified key does not exist."),
            },
            "DELETE" => {
                if state.fail_deletes {
                    return failure(500, 10001, "internal error");
                }
                match state.objects.remove(&id) {
                    Some(_) => ResponseTemplate::new(200).set_body_json(envelope(json!({}))),
                    None => failure(404, 10007, "The specified key does not exist."),
                }
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

impl Respond for FakeR2 {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock();
        let method = request.method.as_str().to_string();
        let target = match request.url.query() {
            Some(query) => format!("{} {}?{}", method, request.url.path(), query),
            None => format!("{} {}", method, request.url.path()),
        };
        state.requests.push(target);

        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {}", TOKEN));
        if !authorized {
            return failure(401, 10000, "Authentication error");
        }

        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.map(str::to_string).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        match segments.as_slice() {
            [ACCOUNT, "r2", "buckets", BROKEN_BUCKET, ..] => {
                failure(503, 10043, "service temporarily unavailable")
            }
            [ACCOUNT, "r2", "buckets"] => match method.as_str() {
                "GET" => {
                    let buckets: Vec<Value> = state
                        .buckets
                        .iter()
                        .map(|(name, location)| Self::bucket_json(name, location))
                        .collect();
                    ResponseTemplate::new(200).set_body_json(envelope(json!({"buckets": buckets})))
                }
                "POST" => {
                    let params: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                    let name = params["name"].as_str().unwrap_or_default().to_string();
                    if name == BROKEN_BUCKET {
                        return failure(503, 10043, "service temporarily unavailable");
                    }
                    if state.buckets.contains_key(&name) {
                        return failure(409, 10004, "The bucket you tried to create already exists.");
                    }
                    let location = params["locationHint"]
                        .as_str()
                        .unwrap_or("enam")
                        .to_uppercase();
                    state.buckets.insert(name.clone(), location.clone());
                    ResponseTemplate::new(200).set_body_json(envelope(Self::bucket_json(&name, &location)))
                }
                _ => ResponseTemplate::new(405),
            },
            [ACCOUNT, "r2", "buckets", bucket] => match method.as_str() {
                "GET" => match state.buckets.get(*bucket) {
                    Some(location) => ResponseTemplate::new(200)
                        .set_body_json(envelope(Self::bucket_json(bucket, location))),
                    None => failure(404, 10006, "The specified bucket does not exist."),
                },
                "DELETE" => match state.buckets.remove(*bucket) {
                    Some(_) => ResponseTemplate::new(200).set_body_json(envelope(json!({}))),
                    None => failure(404, 10006, "The specified bucket does not exist."),
                },
                _ => ResponseTemplate::new(405),
            },
            [ACCOUNT, "r2", "buckets", bucket, "objects"] if method == "GET" => {
                self.list_objects(&state, bucket, request)
            }
            [ACCOUNT, "r2", "buckets", bucket, "objects", key] => {
                let (bucket, key) = (bucket.to_string(), key.to_string());
                self.object_call(&mut state, &method, &bucket, &key, request)
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

pub fn options_for(server: &MockServer) -> R2Options {
    R2Options {
        api_base_uri: server.uri(),
        account_id: ACCOUNT.to_string(),
        api_token: TOKEN.to_string(),
        access_key_id: "test-access-key".to_string(),
        secret_access_key: "test-secret".to_string(),
        ..R2Options::default()
    }
}

/// Fake server plus a factory-built client named `media`
pub async fn setup() -> (MockServer, FakeR2, SharedClient) {
    let (server, fake) = FakeR2::start().await;
    let factory = ClientFactory::new(options_for(&server)).unwrap();
    let client = factory.get_client("media").unwrap();
    (server, fake, client)
}
