//! In-memory emulation of the table API.
//!
//! Serves `/3.0/...` with the same envelope, filter, ordering, pagination and
//! session conventions as the real service, so the client can be exercised
//! end to end over HTTP.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const VERSION_PREFIX: &str = "/3.0/";
pub const PAGE_SIZE: usize = 5;
pub const TEST_USER: &str = "test.user";
pub const TEST_PASSWORD: &str = "testpassword";
/// Failed logins tolerated before the server starts rate limiting.
pub const MAX_FAILED_LOGINS: u32 = 3;
pub const RETRY_AFTER_SECS: u64 = 15;
pub const ORDER_HEADER: &str = "x-order-by";

type Row = Map<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Default)]
pub struct Store {
    tables: HashMap<String, Vec<Row>>,
    /// token -> username
    sessions: HashMap<String, String>,
    next_id: u64,
    failed_logins: u32,
}

impl Store {
    /// Store with a `widgets` table of 12 rows.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        for n in 1..=12u64 {
            store.insert(
                "widgets",
                json!({ "name": format!("widget-{n:02}"), "size": n % 4 })
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            );
        }
        store
    }

    fn insert(&mut self, table: &str, mut row: Row) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        row.insert("id".to_string(), json!(id));
        self.tables.entry(table.to_string()).or_default().push(row);
        id
    }
}

pub type Db = Arc<RwLock<Store>>;

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

fn error(status: StatusCode, message: &str) -> Reply {
    reply(status, json!({ "error": message }))
}

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/3.0/login", post(login))
        .route("/3.0/logout", get(logout))
        .route("/3.0/randompassword", get(random_password))
        .route("/3.0/upload/{id}", post(upload))
        .route("/3.0/broken", get(broken))
        .fallback(table)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub useragent: Option<String>,
}

async fn login(State(db): State<Db>, Json(input): Json<Login>) -> Reply {
    let mut store = db.write().await;
    if store.failed_logins >= MAX_FAILED_LOGINS {
        return reply(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": "Too many failed logins", "retry_after": RETRY_AFTER_SECS }),
        );
    }
    if input.username != TEST_USER || input.password != TEST_PASSWORD {
        store.failed_logins += 1;
        tracing::info!(username = %input.username, ip = ?input.ip, "rejected login");
        return error(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }

    store.failed_logins = 0;
    let token = Uuid::new_v4().simple().to_string();
    store.sessions.insert(token.clone(), input.username.clone());
    tracing::info!(username = %input.username, useragent = ?input.useragent, "login");
    reply(StatusCode::OK, json!({ "response": { "user_token": token } }))
}

/// The username behind a `Basic session:<token>` header, if the token is live.
fn authenticate(store: &Store, headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let token = decoded.strip_prefix("session:")?;
    let user = store.sessions.get(token)?;
    Some((token.to_string(), user.clone()))
}

fn session_facet(user: &str) -> Value {
    json!({ "session": { "user": user } })
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let mut store = db.write().await;
    let Some((token, _)) = authenticate(&store, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    store.sessions.remove(&token);
    reply(StatusCode::OK, json!({ "response": true }))
}

async fn random_password(State(db): State<Db>, headers: HeaderMap) -> Reply {
    let store = db.read().await;
    let Some((_, user)) = authenticate(&store, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let password: String = Uuid::new_v4().simple().to_string().chars().take(12).collect();
    reply(
        StatusCode::OK,
        json!({ "response": [{ "randompassword": password }], "request": session_facet(&user) }),
    )
}

async fn upload(State(db): State<Db>, Path(id): Path<String>, headers: HeaderMap, body: Bytes) -> Reply {
    let store = db.read().await;
    let Some((_, user)) = authenticate(&store, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    if body.is_empty() {
        return reply(StatusCode::OK, json!({ "response": { "error": "Data Error: Empty upload" } }));
    }
    reply(
        StatusCode::OK,
        json!({ "response": { "upload_id": id, "bytes": body.len() }, "request": session_facet(&user) }),
    )
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "<html><body>502 Bad Gateway</body></html>")
}

/// A decoded `/{field}{op}{value}` path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: char,
    pub value: String,
}

/// Split `/{table}/{filters...}` into the table name and its conditions.
pub fn parse_path(path: &str) -> Option<(String, Vec<Condition>)> {
    let rest = path.strip_prefix(VERSION_PREFIX)?;
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let table = segments.next()?.to_string();
    let conditions = segments.map(parse_segment).collect::<Option<Vec<_>>>()?;
    Some((table, conditions))
}

/// Operators may arrive percent-encoded, so the segment is decoded before it
/// is split at the first operator character.
fn parse_segment(segment: &str) -> Option<Condition> {
    let segment = urlencoding::decode(segment).ok()?;
    let at = segment.find(['=', '~', '<', '>', '!'])?;
    let op = segment[at..].chars().next()?;
    Some(Condition {
        field: segment[..at].to_string(),
        op,
        value: segment[at + op.len_utf8()..].to_string(),
    })
}

/// Column name without its `table.` qualifier.
fn column(field: &str) -> &str {
    field.rsplit_once('.').map_or(field, |(_, c)| c)
}

fn compare(a: &Value, b: &str) -> Ordering {
    let text = match a {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    match (text.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => text.as_str().cmp(b),
    }
}

fn matches(row: &Row, cond: &Condition) -> bool {
    let value = row.get(column(&cond.field)).unwrap_or(&NULL);
    match cond.op {
        '=' => compare(value, &cond.value) == Ordering::Equal,
        '!' => compare(value, &cond.value) != Ordering::Equal,
        '<' => compare(value, &cond.value) == Ordering::Less,
        '>' => compare(value, &cond.value) == Ordering::Greater,
        '~' => value
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&cond.value.to_lowercase())),
        _ => false,
    }
}

fn sort_rows(rows: &mut [Row], order: &str) {
    let keys: Vec<(&str, bool)> = order
        .split(',')
        .filter(|k| !k.is_empty())
        .map(|k| match k.strip_suffix('-') {
            Some(field) => (column(field), true),
            None => (column(k), false),
        })
        .collect();
    rows.sort_by(|a, b| {
        for (key, descending) in &keys {
            let left = a.get(*key).unwrap_or(&NULL);
            let right = match b.get(*key).unwrap_or(&NULL) {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let ord = compare(left, &right);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

async fn table(State(db): State<Db>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Reply {
    let Some((table, conditions)) = parse_path(uri.path()) else {
        return error(StatusCode::NOT_FOUND, "Unknown endpoint");
    };
    let mut store = db.write().await;
    let Some((_, user)) = authenticate(&store, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Authentication required");
    };
    let session = session_facet(&user);

    let page = conditions
        .iter()
        .find(|c| c.field == "page" && c.op == '=')
        .and_then(|c| c.value.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let conditions: Vec<Condition> = conditions.into_iter().filter(|c| c.field != "page").collect();
    let selected = |row: &Row| conditions.iter().all(|c| matches(row, c));

    match method.as_str() {
        "GET" => {
            let mut rows: Vec<Row> = store
                .tables
                .get(&table)
                .map(|rows| rows.iter().filter(|r| selected(r)).cloned().collect())
                .unwrap_or_default();
            if let Some(order) = headers.get(ORDER_HEADER).and_then(|v| v.to_str().ok()) {
                sort_rows(&mut rows, order);
            }
            let total_records = rows.len();
            let total_pages = total_records.div_ceil(PAGE_SIZE).max(1);
            let page_rows: Vec<Row> = rows.into_iter().skip((page - 1) * PAGE_SIZE).take(PAGE_SIZE).collect();
            reply(
                StatusCode::OK,
                json!({
                    "response": page_rows,
                    "request": session,
                    "pagination": { "total_records": total_records, "total_pages": total_pages },
                }),
            )
        }
        "PUT" => {
            let Ok(Value::Object(row)) = serde_json::from_slice::<Value>(&body) else {
                return error(StatusCode::BAD_REQUEST, "Expected a JSON object");
            };
            let duplicate = row.get("name").is_some_and(|name| {
                store
                    .tables
                    .get(&table)
                    .is_some_and(|rows| rows.iter().any(|r| r.get("name") == Some(name)))
            });
            if duplicate {
                return reply(
                    StatusCode::OK,
                    json!({ "response": { "error": "Data Error: Duplicate entry for name" } }),
                );
            }
            let id = store.insert(&table, row);
            reply(StatusCode::OK, json!({ "response": { "id": id }, "request": session }))
        }
        "POST" => {
            let Ok(Value::Object(changes)) = serde_json::from_slice::<Value>(&body) else {
                return error(StatusCode::BAD_REQUEST, "Expected a JSON object");
            };
            let mut updated = 0;
            for row in store.tables.entry(table).or_default().iter_mut().filter(|r| selected(r)) {
                for (k, v) in &changes {
                    if k != "id" {
                        row.insert(k.clone(), v.clone());
                    }
                }
                updated += 1;
            }
            reply(StatusCode::OK, json!({ "response": { "updated": updated }, "request": session }))
        }
        "DELETE" => {
            let rows = store.tables.entry(table).or_default();
            let before = rows.len();
            rows.retain(|r| !selected(r));
            let deleted = before - rows.len();
            reply(StatusCode::OK, json!({ "response": { "deleted": deleted }, "request": session }))
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "Unsupported method"),
    }
}
