//! Request dispatch and session handling for the table API.
//!
//! # Design
//! `TableClient` composes an `HttpRequest` from an endpoint, filters, an
//! optional body and a method, hands it to its [`Transport`], and classifies
//! whatever text comes back. It owns the per-session state:
//!
//! - the session token attached to every request as basic auth,
//! - the session metadata echoed by the server on the last success,
//! - pagination totals from the last listing,
//! - the last dispatched request, kept for pagination replay,
//! - pending sort directives, drained by the next request.
//!
//! State changes only after a response classified as success. One request
//! is in flight at a time (`&mut self`); share a client across threads
//! behind a `Mutex` or give each logical session its own client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::ApiError;
use crate::filter::Filters;
use crate::http::{HttpMethod, HttpRequest, RequestBody};
use crate::ordering::Ordering;
use crate::pagination::PaginationState;
use crate::response::classify;
use crate::router;
use crate::transport::{Transport, UreqTransport};

/// Fixed user name paired with the session token in the auth header.
const SESSION_USER: &str = "session";
/// Its response carries the session token, so the raw body is never traced.
const LOGIN_ENDPOINT: &str = "login";

/// Parameters of the last dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub endpoint: String,
    pub filters: Filters,
    pub body: Option<RequestBody>,
    pub method: HttpMethod,
    /// Ordering header value sent with the request.
    pub order: Option<String>,
}

/// Audit fields submitted with a login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoginAudit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "useragent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(flatten)]
    audit: Option<&'a LoginAudit>,
}

/// Stateful client for the table API.
#[derive(Debug)]
pub struct TableClient<T> {
    pub(crate) transport: T,
    pub(crate) config: ClientConfig,
    pub(crate) credential: Credential,
    pub(crate) base: String,
    pub(crate) session_token: Option<String>,
    pub(crate) session: Option<Value>,
    pub(crate) pagination: PaginationState,
    pub(crate) pending: Option<RequestDescriptor>,
    pub(crate) ordering: Ordering,
}

impl TableClient<UreqTransport> {
    /// Load the configured certificate and build a `ureq`-backed client.
    pub fn connect(config: ClientConfig) -> Result<Self, ApiError> {
        let credential = Credential::from_pem_file(&config.certificate)?;
        let transport = UreqTransport::new(&credential)?.with_body_limit(config.max_response_bytes);
        Ok(Self::with_credential(config, credential, transport))
    }
}

impl<T: Transport> TableClient<T> {
    /// Validate the configured certificate and wrap `transport`.
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let credential = Credential::from_pem_file(&config.certificate)?;
        Ok(Self::with_credential(config, credential, transport))
    }

    pub fn with_credential(config: ClientConfig, credential: Credential, transport: T) -> Self {
        Self {
            base: config.endpoint_base(),
            transport,
            config,
            credential,
            session_token: None,
            session: None,
            pagination: PaginationState::default(),
            pending: None,
            ordering: Ordering::new(),
        }
    }

    pub fn ascending(&mut self, field: &str) -> &mut Self {
        self.ordering.push_ascending(field);
        self
    }

    pub fn descending(&mut self, field: &str) -> &mut Self {
        self.ordering.push_descending(field, &self.config.descending_marker);
        self
    }

    /// Compose a request without sending it.
    pub fn build_request(
        &self,
        endpoint: &str,
        filters: &Filters,
        body: Option<RequestBody>,
        method: HttpMethod,
        order: Option<&str>,
    ) -> HttpRequest {
        let mut headers = vec![("User-Agent".to_string(), self.config.user_agent.clone())];
        if let Some(order) = order {
            headers.push((self.config.order_header.clone(), order.to_string()));
        }
        if let Some(token) = self.session_token.as_deref() {
            let credentials = STANDARD.encode(format!("{SESSION_USER}:{token}"));
            headers.push(("Authorization".to_string(), format!("Basic {credentials}")));
        }
        if let Some(body) = &body {
            headers.push(("Content-Type".to_string(), body.content_type().to_string()));
        }

        HttpRequest {
            method,
            url: format!("{}{}{}", self.base, endpoint, filters.encode()),
            headers,
            body,
        }
    }

    /// Send a request and return the classified `response` payload.
    ///
    /// Pending sort directives are consumed whether or not the call succeeds.
    pub fn dispatch(
        &mut self,
        endpoint: &str,
        filters: &Filters,
        body: Option<&Value>,
        method: HttpMethod,
    ) -> Result<Value, ApiError> {
        let order = self.ordering.take_header();
        let body = match body.filter(|b| has_content(b)) {
            Some(value) => Some(RequestBody::Json(serde_json::to_string(value)?)),
            None => None,
        };
        self.send(RequestDescriptor {
            endpoint: endpoint.to_string(),
            filters: filters.clone(),
            body,
            method,
            order,
        })
    }

    /// Send raw file content to `upload/{upload_id}`.
    pub fn upload_file(&mut self, upload_id: &str, content: Vec<u8>) -> Result<Value, ApiError> {
        let order = self.ordering.take_header();
        let body = (!content.is_empty()).then_some(RequestBody::Raw(content));
        self.send(RequestDescriptor {
            endpoint: format!("upload/{}", urlencoding::encode(upload_id)),
            filters: Filters::new(),
            body,
            method: HttpMethod::Post,
            order,
        })
    }

    /// Resolve a symbolic action such as `getWidgets` or `getWidgetById` and
    /// dispatch it.
    ///
    /// By-id lookups return the first row, or `Null` when none matched.
    pub fn call(&mut self, action: &str, args: &[Value]) -> Result<Value, ApiError> {
        let op = match router::resolve(action, args) {
            Ok(op) => op,
            Err(err) => {
                self.ordering.take_header();
                return Err(err);
            }
        };
        tracing::debug!(action, endpoint = %op.endpoint, method = %op.method, "resolved action");
        let result = self.dispatch(&op.endpoint, &op.filters, op.body.as_ref(), op.method)?;
        if !op.single {
            return Ok(result);
        }
        Ok(match result {
            Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
            other => other,
        })
    }

    pub fn get(&mut self, table: &str, filters: &Filters) -> Result<Value, ApiError> {
        self.dispatch(table, filters, None, HttpMethod::Get)
    }

    pub fn update(&mut self, table: &str, filters: &Filters, body: &Value) -> Result<Value, ApiError> {
        self.dispatch(table, filters, Some(body), HttpMethod::Post)
    }

    pub fn create(&mut self, table: &str, body: &Value) -> Result<Value, ApiError> {
        self.dispatch(table, &Filters::new(), Some(body), HttpMethod::Put)
    }

    pub fn delete(&mut self, table: &str, filters: &Filters) -> Result<Value, ApiError> {
        self.dispatch(table, filters, None, HttpMethod::Delete)
    }

    /// Log in and keep the issued token for subsequent requests.
    ///
    /// Any error reported by the server surfaces as [`ApiError::LoginFailed`];
    /// rate limiting and transport failures pass through unchanged.
    pub fn login(&mut self, username: &str, password: &str, audit: Option<&LoginAudit>) -> Result<(), ApiError> {
        let body = serde_json::to_value(LoginRequest {
            username,
            password,
            audit,
        })?;
        let payload = match self.dispatch(LOGIN_ENDPOINT, &Filters::new(), Some(&body), HttpMethod::Post) {
            Ok(payload) => payload,
            Err(err) if err.is_remote() => return Err(ApiError::LoginFailed),
            Err(err) => return Err(err),
        };
        let token = payload
            .get("user_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::LoginFailed)?;
        self.session_token = Some(token.to_string());
        tracing::debug!(username, "logged in");
        Ok(())
    }

    /// End the current session.
    ///
    /// Returns `Ok(false)` without sending anything when no session is set.
    pub fn logout(&mut self) -> Result<bool, ApiError> {
        if self.session_token.is_none() {
            return Ok(false);
        }
        let payload = self.dispatch("logout", &Filters::new(), None, HttpMethod::Get)?;
        self.session_token = None;
        self.session = None;
        tracing::debug!("logged out");
        Ok(!matches!(payload, Value::Null | Value::Bool(false)))
    }

    /// Ask the server for a generated password.
    pub fn random_password(&mut self) -> Result<String, ApiError> {
        let payload = self.dispatch("randompassword", &Filters::new(), None, HttpMethod::Get)?;
        payload
            .pointer("/0/randompassword")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Remote("randompassword returned no password".to_string()))
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Resume a session obtained elsewhere. Empty tokens clear the session.
    pub fn set_session_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.session_token = (!token.is_empty()).then_some(token);
    }

    /// Session metadata from the last successful response.
    pub fn session(&self) -> Option<&Value> {
        self.session.as_ref()
    }

    pub fn total_records(&self) -> u64 {
        self.pagination.total_records
    }

    pub fn total_pages(&self) -> u64 {
        self.pagination.total_pages
    }

    pub fn pending_request(&self) -> Option<&RequestDescriptor> {
        self.pending.as_ref()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Record `descriptor` as pending, then send it.
    pub(crate) fn send(&mut self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let request = self.build_request(
            &descriptor.endpoint,
            &descriptor.filters,
            descriptor.body.clone(),
            descriptor.method,
            descriptor.order.as_deref(),
        );
        let redact_body = descriptor.endpoint == LOGIN_ENDPOINT;
        tracing::debug!(
            method = %descriptor.method,
            endpoint = %descriptor.endpoint,
            filters = %descriptor.filters.encode(),
            order = ?descriptor.order,
            has_body = descriptor.body.is_some(),
            "sending request"
        );
        self.pending = Some(descriptor);

        let response = self.transport.send(&request).map_err(|e| {
            tracing::warn!(url = %request.url, error = %e, "no response from server");
            ApiError::Transport(e)
        })?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "received response");
        if !redact_body {
            tracing::trace!(body = %response.body, "raw response");
        }

        let envelope = classify(&response.body).inspect_err(|e| {
            tracing::warn!(url = %request.url, kind = e.kind(), "request failed");
        })?;
        self.session = envelope.session;
        if let Some(pagination) = envelope.pagination {
            self.pagination.update(pagination);
        }
        Ok(envelope.response)
    }
}

/// Null and empty containers or strings do not make a request body.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::http::HttpResponse;
    use crate::transport::TransportError;

    pub(crate) const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client.pem");

    pub(crate) type Sent = Rc<RefCell<Vec<HttpRequest>>>;

    /// Client whose transport answers from `replies` in order; `Err` entries
    /// simulate a missing response.
    pub(crate) fn scripted(replies: Vec<Result<&str, &str>>) -> (TableClient<impl Transport>, Sent) {
        let sent: Sent = Rc::default();
        let log = Rc::clone(&sent);
        let mut queue: VecDeque<Result<String, String>> = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        let transport = move |req: &HttpRequest| -> Result<HttpResponse, TransportError> {
            log.borrow_mut().push(req.clone());
            match queue.pop_front().expect("unexpected request") {
                Ok(body) => Ok(HttpResponse::ok(body)),
                Err(detail) => Err(detail.into()),
            }
        };
        let config = ClientConfig::new(FIXTURE).with_base_url("http://api.test");
        (TableClient::new(config, transport).unwrap(), sent)
    }

    #[test]
    fn missing_certificate_fails_before_any_request() {
        let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            panic!("no request expected")
        };
        let config = ClientConfig::new("/no/such/client.pem");
        let Err(err) = TableClient::new(config, transport) else {
            panic!("expected a credential error")
        };
        assert!(matches!(err, ApiError::CredentialNotFound { .. }));
    }

    #[test]
    fn invalid_certificate_fails_before_any_request() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/not-a-cert.pem");
        let transport = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
            panic!("no request expected")
        };
        let Err(err) = TableClient::new(ClientConfig::new(path), transport) else {
            panic!("expected a credential error")
        };
        assert!(matches!(err, ApiError::InvalidCredential { .. }));
    }

    #[test]
    fn dispatch_composes_url_and_headers() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":[]}"#)]);
        let filters = Filters::new().with("widgets.name~", "spr").with("page", 2);
        client.get("widgets", &filters).unwrap();

        let sent = sent.borrow();
        let req = &sent[0];
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://api.test/3.0/widgets/widgets.name~spr/page=2");
        assert!(req.header("User-Agent").unwrap().starts_with("tablerest/"));
        assert_eq!(req.header("Authorization"), None);
        assert_eq!(req.header("X-Order-By"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn session_token_becomes_basic_auth() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":null}"#)]);
        client.set_session_token("abc123");
        client.get("metadata", &Filters::new()).unwrap();
        // base64("session:abc123")
        assert_eq!(
            sent.borrow()[0].header("Authorization"),
            Some("Basic c2Vzc2lvbjphYmMxMjM=")
        );
    }

    #[test]
    fn json_body_is_attached_with_content_type() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":{"id":9}}"#)]);
        let created = client.create("widgets", &json!({"name": "sprocket"})).unwrap();
        assert_eq!(created, json!({"id": 9}));

        let sent = sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Put);
        assert_eq!(sent[0].header("Content-Type"), Some("application/json"));
        assert_eq!(
            sent[0].body,
            Some(RequestBody::Json(r#"{"name":"sprocket"}"#.to_string()))
        );
    }

    #[test]
    fn empty_body_is_not_attached() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":true}"#)]);
        client.update("widgets", &Filters::new(), &json!({})).unwrap();
        assert!(sent.borrow()[0].body.is_none());
        assert_eq!(sent.borrow()[0].header("Content-Type"), None);
    }

    #[test]
    fn ordering_is_sent_once_then_cleared() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":[]}"#), Ok(r#"{"response":[]}"#)]);
        client.ascending("widgets.name").descending("widgets.id");
        client.get("widgets", &Filters::new()).unwrap();
        client.get("widgets", &Filters::new()).unwrap();

        let sent = sent.borrow();
        assert_eq!(sent[0].header("X-Order-By"), Some("widgets.name,widgets.id-"));
        assert_eq!(sent[1].header("X-Order-By"), None);
    }

    #[test]
    fn ordering_is_cleared_on_failure() {
        let (mut client, _) = scripted(vec![Err("connection refused"), Ok("not json")]);
        client.descending("a");
        assert!(matches!(client.get("t", &Filters::new()), Err(ApiError::Transport(_))));
        assert!(client.ordering.is_empty());

        client.ascending("b");
        assert!(matches!(
            client.get("t", &Filters::new()),
            Err(ApiError::MalformedResponse { .. })
        ));
        assert!(client.ordering.is_empty());
    }

    #[test]
    fn ordering_is_cleared_on_unsupported_action() {
        let (mut client, sent) = scripted(vec![]);
        client.ascending("a");
        assert!(client.call("frobWidgets", &[]).is_err());
        assert!(client.ordering.is_empty());
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn success_updates_session_and_pagination() {
        let (mut client, _) = scripted(vec![
            Ok(r#"{"response":[1],"request":{"session":{"id":"s1"}},"pagination":{"total_records":9,"total_pages":3}}"#),
            Ok(r#"{"response":[]}"#),
        ]);
        client.get("t", &Filters::new()).unwrap();
        assert_eq!(client.session(), Some(&json!({"id": "s1"})));
        assert_eq!((client.total_records(), client.total_pages()), (9, 3));

        client.get("t", &Filters::new()).unwrap();
        assert_eq!(client.session(), None, "absent session metadata clears it");
        assert_eq!(client.total_pages(), 3, "totals untouched without a pagination facet");
    }

    #[test]
    fn failures_leave_state_untouched() {
        let (mut client, _) = scripted(vec![
            Ok(r#"{"response":[1],"request":{"session":{"id":"s1"}},"pagination":{"total_records":9,"total_pages":3}}"#),
            Ok("<html>oops</html>"),
            Ok(r#"{"error":"boom","request":{"session":null}}"#),
            Err("tls handshake failed"),
        ]);
        client.get("t", &Filters::new()).unwrap();
        for _ in 0..3 {
            assert!(client.get("t", &Filters::new()).is_err());
            assert_eq!(client.session(), Some(&json!({"id": "s1"})));
            assert_eq!((client.total_records(), client.total_pages()), (9, 3));
        }
    }

    #[test]
    fn pending_request_is_recorded_even_on_failure() {
        let (mut client, _) = scripted(vec![Err("refused")]);
        let filters = Filters::new().with("page", 1);
        let _ = client.get("widgets", &filters);
        let pending = client.pending_request().unwrap();
        assert_eq!(pending.endpoint, "widgets");
        assert_eq!(pending.filters, filters);
        assert_eq!(pending.method, HttpMethod::Get);
    }

    #[test]
    fn classification_ignores_status() {
        let sent: Sent = Rc::default();
        let log = Rc::clone(&sent);
        let transport = move |req: &HttpRequest| -> Result<HttpResponse, TransportError> {
            log.borrow_mut().push(req.clone());
            Ok(HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: r#"{"response":[{"id":1}]}"#.to_string(),
            })
        };
        let mut client = TableClient::new(ClientConfig::new(FIXTURE), transport).unwrap();
        assert_eq!(client.get("t", &Filters::new()).unwrap(), json!([{"id": 1}]));
    }

    #[test]
    fn upload_sends_raw_bytes() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":{"uploaded":3}}"#)]);
        let result = client.upload_file("ab12", vec![0, 159, 146]).unwrap();
        assert_eq!(result, json!({"uploaded": 3}));

        let sent = sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://api.test/3.0/upload/ab12");
        assert_eq!(sent[0].header("Content-Type"), Some("application/octet-stream"));
        assert_eq!(sent[0].body, Some(RequestBody::Raw(vec![0, 159, 146])));
    }

    #[test]
    fn by_id_returns_first_row_or_null() {
        let (mut client, sent) = scripted(vec![
            Ok(r#"{"response":[{"id":17472,"name":"a"},{"id":1}]}"#),
            Ok(r#"{"response":[]}"#),
        ]);
        let row = client.call("getWidgetById", &[json!(17472)]).unwrap();
        assert_eq!(row, json!({"id": 17472, "name": "a"}));
        assert_eq!(sent.borrow()[0].url, "http://api.test/3.0/widgets/widgets.id=17472");

        assert_eq!(client.call("getWidgetById", &[json!(5)]).unwrap(), Value::Null);
    }

    #[test]
    fn by_id_with_bad_arguments_sends_nothing() {
        let (mut client, sent) = scripted(vec![]);
        for args in [vec![json!("abc")], vec![json!(1), json!(2)]] {
            let err = client.call("getWidgetById", &args).unwrap_err();
            assert!(matches!(err, ApiError::UnsupportedOperation(_)));
        }
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn login_stores_token_and_sends_audit_fields() {
        let (mut client, sent) = scripted(vec![Ok(r#"{"response":{"user_token":"tok-1"}}"#)]);
        let audit = LoginAudit {
            ip: Some("127.0.0.1".into()),
            user_agent: Some("API-Test-3.0".into()),
        };
        client.login("test.user", "secret", Some(&audit)).unwrap();
        assert_eq!(client.session_token(), Some("tok-1"));

        let sent = sent.borrow();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://api.test/3.0/login");
        let Some(RequestBody::Json(body)) = &sent[0].body else {
            panic!("expected JSON body")
        };
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            body,
            json!({"username": "test.user", "password": "secret", "ip": "127.0.0.1", "useragent": "API-Test-3.0"})
        );
    }

    #[test]
    fn login_masks_remote_errors() {
        let (mut client, _) = scripted(vec![
            Ok(r#"{"error":"Invalid password for user x"}"#),
            Ok(r#"{"response":{"error":"Data Error: locked"}}"#),
            Ok(r#"{"response":{}}"#),
        ]);
        for _ in 0..3 {
            let err = client.login("x", "y", None).unwrap_err();
            assert!(matches!(err, ApiError::LoginFailed));
        }
        assert_eq!(client.session_token(), None);
    }

    #[test]
    fn login_passes_rate_limit_through() {
        let (mut client, _) = scripted(vec![Ok(r#"{"error":"Too many attempts","retry_after":30}"#)]);
        let err = client.login("x", "y", None).unwrap_err();
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(30)));
    }

    #[test]
    fn logout_without_session_sends_nothing() {
        let (mut client, sent) = scripted(vec![]);
        assert!(!client.logout().unwrap());
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn login_then_logout() {
        let (mut client, sent) = scripted(vec![
            Ok(r#"{"response":{"user_token":"tok-2"}}"#),
            Ok(r#"{"response":true}"#),
        ]);
        client.login("u", "p", None).unwrap();
        assert!(client.logout().unwrap());
        assert_eq!(client.session_token(), None);

        let sent = sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].url, "http://api.test/3.0/logout");
        assert!(sent[1].header("Authorization").is_some());
    }

    #[test]
    fn random_password_reads_first_row() {
        let (mut client, _) = scripted(vec![Ok(r#"{"response":[{"randompassword":"Tr0ub4dor"}]}"#)]);
        assert_eq!(client.random_password().unwrap(), "Tr0ub4dor");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a scoped subscriber and return everything it logged.
    fn captured_logs(level: tracing::Level, f: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(level)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn login_response_is_never_traced() {
        let (mut client, _) = scripted(vec![
            Ok(r#"{"response":{"user_token":"tok-very-secret"}}"#),
            Ok(r#"{"response":[{"name":"traced-row"}]}"#),
        ]);
        let logs = captured_logs(tracing::Level::TRACE, || {
            client.login("u", "p", None).unwrap();
            client.get("widgets", &Filters::new()).unwrap();
        });
        assert!(logs.contains("logged in"));
        assert!(logs.contains("traced-row"));
        assert!(!logs.contains("tok-very-secret"));
    }

    #[test]
    fn failures_are_logged_by_kind() {
        let (mut client, _) = scripted(vec![Ok("<html>upstream stack trace</html>")]);
        let logs = captured_logs(tracing::Level::WARN, || {
            let err = client.get("widgets", &Filters::new()).unwrap_err();
            assert_eq!(err.kind(), "MalformedResponse");
        });
        assert!(logs.contains("request failed"));
        assert!(logs.contains("MalformedResponse"));
        assert!(!logs.contains("upstream stack trace"));
    }
}
