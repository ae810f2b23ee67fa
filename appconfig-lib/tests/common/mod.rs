//! In-process fake App Configuration service for integration tests.
//!
//! Implements the subset of the key-value API the client uses: `PUT`, `GET`
//! and `DELETE` on `/kv/{key}`, and paged `GET /kv` listings. Every request
//! must carry a valid HMAC-SHA256 signature for [`ID`]/[`SECRET`] (or the
//! bearer token [`BEARER_TOKEN`]).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use appconfig_lib::api::StringFilter;
use appconfig_lib::auth::HmacToken;
use appconfig_lib::auth::content_hash;
use appconfig_lib::auth::string_to_sign;
use appconfig_lib::auth::verify_signature;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Method;
use hyper::Request;
use hyper::Response;
use hyper::StatusCode;
use hyper::body::Bytes;
use hyper::body::Incoming;
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

pub const ID: &str = "test-id";
pub const SECRET: &[u8] = b"test-secret";
/// base64 of [`SECRET`].
pub const SECRET_B64: &str = "dGVzdC1zZWNyZXQ=";
pub const BEARER_TOKEN: &str = "test-token";

const SIGNED_HEADERS: [&str; 3] = ["x-ms-date", "host", "x-ms-content-sha256"];

#[derive(Debug, Clone)]
struct Stored {
    value: Option<String>,
    content_type: Option<String>,
    tags: Value,
    etag: String,
    last_modified: String,
}

#[derive(Debug, Default)]
struct State {
    settings: BTreeMap<(String, Option<String>), Stored>,
    requests: Vec<String>,
    page_size: Option<usize>,
    link_header_only: bool,
    throttle: u32,
    throttle_retry_after_ms: Option<String>,
    fail: u32,
    delay: Option<Duration>,
    revision: u64,
}

/// A running fake store.
pub struct FakeStore {
    endpoint: String,
    state: Arc<Mutex<State>>,
}

impl FakeStore {
    /// Binds to an ephemeral port and starts serving.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle(&state, req).await) }
                    });

                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            endpoint: format!("http://{}", addr),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connection_string(&self) -> String {
        format!("Endpoint={};Id={};Secret={}", self.endpoint, ID, SECRET_B64)
    }

    /// Stores a setting directly, bypassing the API.
    pub fn seed(&self, key: &str, label: Option<&str>, value: &str, content_type: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let stored = state.stored(Some(value.to_string()), content_type.map(String::from), json!({}));
        state
            .settings
            .insert((key.to_string(), label.map(String::from)), stored);
    }

    /// Requests seen so far, as `METHOD path?query`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Limits listings to `size` items per page.
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Advertises next pages through the `Link` header only.
    pub fn link_header_only(&self) {
        self.state.lock().unwrap().link_header_only = true;
    }

    /// Answers the next `n` requests with 429.
    pub fn throttle(&self, n: u32) {
        self.state.lock().unwrap().throttle = n;
    }

    /// Answers the next `n` requests with 429 and the given `retry-after-ms`.
    pub fn throttle_with_retry_after(&self, n: u32, retry_after_ms: &str) {
        let mut state = self.state.lock().unwrap();
        state.throttle = n;
        state.throttle_retry_after_ms = Some(retry_after_ms.to_string());
    }

    /// Holds every response back for `delay`.
    pub fn delay_responses(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// Answers the next `n` requests with 503.
    pub fn fail(&self, n: u32) {
        self.state.lock().unwrap().fail = n;
    }
}

impl State {
    fn stored(&mut self, value: Option<String>, content_type: Option<String>, tags: Value) -> Stored {
        self.revision += 1;
        Stored {
            value,
            content_type,
            tags,
            etag: format!("etag-{}", self.revision),
            last_modified: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn to_json(key: &str, label: &Option<String>, stored: &Stored) -> Value {
    json!({
        "etag": stored.etag,
        "key": key,
        "label": label,
        "content_type": stored.content_type,
        "value": stored.value,
        "tags": stored.tags,
        "locked": false,
        "last_modified": stored.last_modified,
    })
}

async fn handle(state: &Mutex<State>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return problem(StatusCode::BAD_REQUEST, "Bad request", "unreadable body"),
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let delay = state.lock().unwrap().delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock().unwrap();
    state
        .requests
        .push(format!("{} {}", parts.method, path_and_query));

    if state.throttle > 0 {
        state.throttle -= 1;
        let retry_after_ms = state.throttle_retry_after_ms.as_deref().unwrap_or("1");
        return Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header("retry-after-ms", retry_after_ms)
            .body(Full::new(Bytes::new()))
            .unwrap();
    }

    if state.fail > 0 {
        state.fail -= 1;
        return problem(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", "try again");
    }

    if let Err(reason) = authorize(&parts, &path_and_query, &body) {
        return problem(StatusCode::UNAUTHORIZED, "Unauthorized", &reason);
    }

    let query: BTreeMap<String, String> = parts
        .uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let label = query.get("label").cloned().filter(|l| l != "\0");

    let path = parts.uri.path();
    if path == "/kv" && parts.method == Method::GET {
        return list(&state, &query);
    }

    let Some(encoded_key) = path.strip_prefix("/kv/") else {
        return problem(StatusCode::NOT_FOUND, "Not found", path);
    };
    let key = decode(encoded_key);
    let id = (key.clone(), label.clone());

    match parts.method {
        Method::PUT => {
            let if_none_match = parts.headers.get("if-none-match").is_some();
            if if_none_match && state.settings.contains_key(&id) {
                return problem(
                    StatusCode::PRECONDITION_FAILED,
                    "Precondition failed",
                    &format!("key '{}' already exists", key),
                );
            }

            let body: Value = match serde_json::from_slice(&body) {
                Ok(value) => value,
                Err(e) => return problem(StatusCode::BAD_REQUEST, "Invalid body", &e.to_string()),
            };
            let stored = state.stored(
                body["value"].as_str().map(String::from),
                body["content_type"].as_str().map(String::from),
                body.get("tags").cloned().unwrap_or_else(|| json!({})),
            );
            let response = to_json(&key, &label, &stored);
            state.settings.insert(id, stored);
            kv_response(StatusCode::OK, response)
        }
        Method::GET => match state.settings.get(&id) {
            Some(stored) => kv_response(StatusCode::OK, to_json(&key, &label, stored)),
            None => problem(StatusCode::NOT_FOUND, "Not found", &key),
        },
        Method::DELETE => match state.settings.remove(&id) {
            Some(stored) => kv_response(StatusCode::OK, to_json(&key, &label, &stored)),
            None => Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Full::new(Bytes::new()))
                .unwrap(),
        },
        _ => problem(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", path),
    }
}

fn list(state: &State, query: &BTreeMap<String, String>) -> Response<Full<Bytes>> {
    let filters = StringFilter::parse(query.get("key").map_or("", String::as_str)).and_then(|k| {
        StringFilter::parse(query.get("label").map_or("", String::as_str)).map(|l| (k, l))
    });
    let (key_filter, label_filter) = match filters {
        Ok(filters) => filters,
        Err(e) => return problem(StatusCode::BAD_REQUEST, "Invalid filter", &e.to_string()),
    };

    let matching: Vec<Value> = state
        .settings
        .iter()
        .filter(|((key, label), _)| {
            key_filter.matches(Some(key)) && label_filter.matches(label.as_deref())
        })
        .map(|((key, label), stored)| to_json(key, label, stored))
        .collect();

    let after: usize = query.get("after").and_then(|a| a.parse().ok()).unwrap_or(0);
    let page_size = state.page_size.unwrap_or(usize::MAX);
    let end = after.saturating_add(page_size).min(matching.len());
    let items = matching.get(after..end).unwrap_or_default().to_vec();

    let next_link = (end < matching.len()).then(|| {
        let mut next = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in query.iter().filter(|(name, _)| *name != "after") {
            next.append_pair(name, value);
        }
        next.append_pair("after", &end.to_string());
        format!("/kv?{}", next.finish())
    });

    let mut body = json!({ "items": items });
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/vnd.microsoft.appconfig.kvset+json; charset=utf-8");

    if let Some(link) = next_link {
        builder = builder.header("link", format!("<{}>; rel=\"next\"", link));
        if !state.link_header_only {
            body["@nextLink"] = Value::String(link);
        }
    }

    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

fn authorize(parts: &Parts, path_and_query: &str, body: &[u8]) -> Result<(), String> {
    let authorization = header(parts, "authorization")?;
    if authorization == format!("Bearer {}", BEARER_TOKEN) {
        return Ok(());
    }

    let token = HmacToken::from_authorization(authorization).ok_or("unsupported scheme")?;
    if token.credential.as_deref() != Some(ID) {
        return Err("unknown credential".to_string());
    }

    let signed_headers = token.signed_headers.ok_or("missing SignedHeaders")?;
    if signed_headers != SIGNED_HEADERS {
        return Err(format!("unexpected signed headers {:?}", signed_headers));
    }

    let hash = header(parts, "x-ms-content-sha256")?;
    if hash != content_hash(body) {
        return Err("content hash mismatch".to_string());
    }

    let values = signed_headers
        .iter()
        .map(|name| header(parts, name))
        .collect::<Result<Vec<_>, _>>()?;
    let to_sign = string_to_sign(parts.method.as_str(), path_and_query, &values);
    let signature = token.signature.ok_or("missing Signature")?;

    if verify_signature(SECRET, &to_sign, &signature) {
        Ok(())
    } else {
        Err("invalid signature".to_string())
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| format!("missing {} header", name))
}

fn decode(segment: &str) -> String {
    let escaped = segment.replace('+', "%2B");
    url::form_urlencoded::parse(format!("k={}", escaped).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn kv_response(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/vnd.microsoft.appconfig.kv+json; charset=utf-8")
        .header("etag", body["etag"].as_str().unwrap_or_default())
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn problem(status: StatusCode, title: &str, detail: &str) -> Response<Full<Bytes>> {
    let body = json!({
        "type": format!("https://azconfig.io/errors/{}", status.as_u16()),
        "title": title,
        "detail": detail,
        "status": status.as_u16(),
    });

    Response::builder()
        .status(status)
        .header("content-type", "application/problem+json; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
