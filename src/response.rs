//! Response builder and the completion sink it finalizes into.

use crate::models::{HeaderValue, ProxyResult, RouterError};
use crate::utils::media_type_essence;
use http::StatusCode;
use http::header::{CONTENT_TYPE, LOCATION};
use lambda_runtime::tracing::{debug, error, info, warn};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

const ERROR_MESSAGE: &str = "Internal Server Error";

type Callback = Box<dyn FnOnce(ProxyResult) + Send>;

/// Receives the final result of one dispatch cycle, at most once.
///
/// Clones share the same slot, so every response built for the cycle
/// competes for the single completion.
#[derive(Clone)]
pub struct Completion {
    callback: Arc<Mutex<Option<Callback>>>,
}

impl Completion {
    /// Wraps a callback that receives the final result.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(ProxyResult) + Send + 'static,
    {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// Creates a completion whose result arrives on the returned receiver.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<ProxyResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |result| {
            if tx.send(result).is_err() {
                debug!("Completion receiver dropped before the result arrived");
            }
        });
        (completion, rx)
    }

    /// Whether the callback has already fired.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slot().is_none()
    }

    fn complete(&self, result: ProxyResult) -> Result<(), RouterError> {
        // Take the callback before running it so the lock is not held during the call
        let callback = self.slot().take().ok_or(RouterError::AlreadyFinalized)?;
        callback(result);
        Ok(())
    }

    fn slot(&self) -> MutexGuard<'_, Option<Callback>> {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[derive(Debug)]
struct ResponseState {
    status_code: StatusCode,
    headers: HashMap<String, HeaderValue>,
    is_base64_encoded: bool,
    body: Option<Value>,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status_code: StatusCode::OK,
            headers: HashMap::new(),
            is_base64_encoded: false,
            body: None,
        }
    }
}

/// How a body is rendered into the final string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Text,
    Json,
}

/// Accumulates one outbound response.
///
/// Setters take `&self` and return `&Self` so calls chain:
///
/// ```
/// # use lambda_proxy_router::response::{Completion, Response};
/// # use http::StatusCode;
/// let res = Response::new(Completion::new(|_| {}));
/// res.status(StatusCode::CREATED).header("x-request-id", "abc");
/// ```
///
/// Clones share state. `send` and `error` finalize the response; whichever
/// runs first wins and later calls return [`RouterError::AlreadyFinalized`]
/// without touching the completion.
#[derive(Debug, Clone)]
pub struct Response {
    state: Arc<Mutex<ResponseState>>,
    completion: Completion,
}

impl Response {
    /// Creates an empty 200 response that finalizes into `completion`.
    #[must_use]
    pub fn new(completion: Completion) -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState::default())),
            completion,
        }
    }

    /// Set the status code.
    #[must_use]
    pub fn status(&self, code: StatusCode) -> &Self {
        self.state().status_code = code;
        self
    }

    /// Current status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.state().status_code
    }

    /// Set header `field` to `value`. Aliased as [`Response::header`].
    ///
    /// Header names are stored lowercased, so `Content-Type` and
    /// `content-type` name the same header.
    pub fn set(&self, field: &str, value: impl Into<HeaderValue>) -> &Self {
        self.state()
            .headers
            .insert(field.to_ascii_lowercase(), value.into());
        self
    }

    /// Alias of [`Response::set`].
    pub fn header(&self, field: &str, value: impl Into<HeaderValue>) -> &Self {
        self.set(field, value)
    }

    /// Value of a previously set header `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<HeaderValue> {
        self.state()
            .headers
            .get(&field.to_ascii_lowercase())
            .cloned()
    }

    /// Set the content-type header, which also picks how `send` renders the body.
    pub fn content_type(&self, content_type: &str) -> &Self {
        self.set(CONTENT_TYPE.as_str(), content_type)
    }

    /// Set the location header to `url`.
    pub fn location(&self, url: &str) -> &Self {
        self.set(LOCATION.as_str(), url)
    }

    /// Point the location header at `url` with `status`, 302 Found by default.
    ///
    /// The response still has to be sent.
    #[must_use]
    pub fn redirect(&self, url: &str, status: Option<StatusCode>) -> &Self {
        self.location(url).status(status.unwrap_or(StatusCode::FOUND))
    }

    /// Mark the body as base64 encoded.
    #[must_use]
    pub fn base64_encoded(&self, value: bool) -> &Self {
        self.state().is_base64_encoded = value;
        self
    }

    /// Stores a body for a later `send` without an explicit body.
    #[must_use]
    pub fn body(&self, value: Value) -> &Self {
        self.state().body = Some(value);
        self
    }

    /// Whether the response was already handed to the completion.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.completion.is_complete()
    }

    /// Finalizes the response.
    ///
    /// The body is `body` if given, else the stored body, else an empty
    /// object; `null` counts as absent. `text/plain` and `text/html` content
    /// types send strings verbatim, everything else is sent as JSON.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AlreadyFinalized` if the response was already
    /// sent, or `RouterError::Serialization` if the body cannot be rendered.
    pub fn send(&self, body: Option<Value>) -> Result<(), RouterError> {
        self.ensure_open()?;

        let result = {
            let state = self.state();
            let body = body
                .filter(|b| !b.is_null())
                .or_else(|| state.body.clone().filter(|b| !b.is_null()))
                .unwrap_or_else(|| Value::Object(Map::new()));

            ProxyResult {
                status_code: state.status_code.as_u16(),
                headers: state.headers.clone(),
                is_base64_encoded: state.is_base64_encoded,
                body: render_body(&body, body_format(&state.headers))?,
            }
        };

        self.finalize(result)
    }

    /// Finalizes the response as a generic 500.
    ///
    /// Neither the error nor any status or base64 flag set earlier reaches
    /// the client. Headers are kept. The error is logged with its full chain.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AlreadyFinalized` if the response was already sent.
    pub fn error(&self, err: impl Into<anyhow::Error>) -> Result<(), RouterError> {
        let err = err.into();
        error!(error = %format!("{err:#}"), "Handler failed");

        self.ensure_open()?;

        let result = {
            let state = self.state();
            let body = match body_format(&state.headers) {
                BodyFormat::Text => format!("{ERROR_MESSAGE}."),
                BodyFormat::Json => json!({ "message": ERROR_MESSAGE }).to_string(),
            };

            ProxyResult {
                status_code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                headers: state.headers.clone(),
                is_base64_encoded: false,
                body,
            }
        };

        self.finalize(result)
    }

    fn ensure_open(&self) -> Result<(), RouterError> {
        if self.completion.is_complete() {
            warn!("Response already finalized, ignoring");
            return Err(RouterError::AlreadyFinalized);
        }
        Ok(())
    }

    fn finalize(&self, result: ProxyResult) -> Result<(), RouterError> {
        let status = result.status_code;
        self.completion.complete(result).inspect_err(|_| {
            warn!("Response already finalized, ignoring");
        })?;
        info!(status = status, "Response finalized");
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn body_format(headers: &HashMap<String, HeaderValue>) -> BodyFormat {
    let content_type = headers
        .get(CONTENT_TYPE.as_str())
        .and_then(HeaderValue::as_str)
        .map(media_type_essence);

    match content_type.as_deref() {
        Some("text/plain" | "text/html") => BodyFormat::Text,
        _ => BodyFormat::Json,
    }
}

fn render_body(body: &Value, format: BodyFormat) -> Result<String, RouterError> {
    match (format, body) {
        (BodyFormat::Text, Value::String(text)) => Ok(text.clone()),
        (BodyFormat::Text, other) => Ok(other.to_string()),
        (BodyFormat::Json, value) => Ok(serde_json::to_string(value)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capture() -> (Response, Arc<Mutex<Vec<ProxyResult>>>) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let completion = Completion::new(move |result| sink.lock().unwrap().push(result));
        (Response::new(completion), results)
    }

    fn only(results: &Arc<Mutex<Vec<ProxyResult>>>) -> ProxyResult {
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 1, "completion should fire exactly once");
        results[0].clone()
    }

    #[test]
    fn test_send_defaults() {
        let (res, results) = capture();
        res.send(None).unwrap();

        let result = only(&results);
        assert_eq!(result.status_code, 200);
        assert!(!result.is_base64_encoded);
        assert!(result.headers.is_empty());
        assert_eq!(result.body, "{}");
    }

    #[test]
    fn test_send_json_body() {
        let (res, results) = capture();
        res.send(Some(json!({"a": 1}))).unwrap();
        assert_eq!(only(&results).body, r#"{"a":1}"#);
    }

    #[test]
    fn test_send_text_body() {
        let (res, results) = capture();
        res.content_type("text/plain");
        res.send(Some(json!("hello"))).unwrap();

        let result = only(&results);
        assert_eq!(result.body, "hello");
        assert_eq!(
            result.headers.get("content-type"),
            Some(&HeaderValue::from("text/plain"))
        );
    }

    #[test]
    fn test_send_html_with_charset() {
        let (res, results) = capture();
        res.content_type("text/html; charset=utf-8");
        res.send(Some(json!("<p>hi</p>"))).unwrap();
        assert_eq!(only(&results).body, "<p>hi</p>");
    }

    #[test]
    fn test_text_body_renders_non_strings() {
        let (res, results) = capture();
        res.content_type("text/plain");
        res.send(Some(json!(42))).unwrap();
        assert_eq!(only(&results).body, "42");
    }

    #[test]
    fn test_json_string_body_is_quoted() {
        let (res, results) = capture();
        res.content_type("application/json");
        res.send(Some(json!("hello"))).unwrap();
        assert_eq!(only(&results).body, r#""hello""#);
    }

    #[test]
    fn test_stored_body_used_when_send_has_none() {
        let (res, results) = capture();
        res.body(json!({"stored": true})).send(None).unwrap();
        assert_eq!(only(&results).body, r#"{"stored":true}"#);
    }

    #[test]
    fn test_explicit_body_wins_over_stored_body() {
        let (res, results) = capture();
        res.body(json!({"stored": true}))
            .send(Some(json!({"explicit": true})))
            .unwrap();
        assert_eq!(only(&results).body, r#"{"explicit":true}"#);
    }

    #[test]
    fn test_null_body_counts_as_absent() {
        let (res, results) = capture();
        res.send(Some(Value::Null)).unwrap();
        assert_eq!(only(&results).body, "{}");
    }

    #[test]
    fn test_fluent_setters() {
        let (res, results) = capture();
        res.status(StatusCode::CREATED)
            .set("x-count", 3)
            .header("x-cached", false)
            .base64_encoded(true)
            .content_type("application/json");

        assert_eq!(res.get("x-count"), Some(HeaderValue::Int(3)));
        assert_eq!(res.get("missing"), None);
        assert_eq!(res.status_code(), StatusCode::CREATED);

        res.send(Some(json!("aGVsbG8="))).unwrap();
        let result = only(&results);
        assert_eq!(result.status_code, 201);
        assert!(result.is_base64_encoded);
        assert_eq!(result.headers["x-cached"], HeaderValue::Bool(false));
    }

    #[test]
    fn test_redirect_defaults_to_found() {
        let (res, results) = capture();
        assert!(!res.redirect("/x", None).is_finalized());
        res.send(None).unwrap();

        let result = only(&results);
        assert_eq!(result.status_code, 302);
        assert_eq!(result.headers["location"], HeaderValue::from("/x"));
    }

    #[test]
    fn test_redirect_with_status() {
        let (res, results) = capture();
        res.redirect("https://example.com", Some(StatusCode::MOVED_PERMANENTLY))
            .send(None)
            .unwrap();
        assert_eq!(only(&results).status_code, 301);
    }

    #[test]
    fn test_error_is_generic_json() {
        let (res, results) = capture();
        res.status(StatusCode::CREATED).base64_encoded(true).set("x-trace", "t1");
        res.error(anyhow::anyhow!("boom")).unwrap();

        let result = only(&results);
        assert_eq!(result.status_code, 500);
        assert!(!result.is_base64_encoded);
        assert_eq!(result.body, r#"{"message":"Internal Server Error"}"#);
        assert!(!result.body.contains("boom"));
        assert_eq!(result.headers["x-trace"], HeaderValue::from("t1"));
    }

    #[test]
    fn test_error_is_generic_text() {
        let (res, results) = capture();
        res.content_type("text/plain");
        res.error(anyhow::anyhow!("boom")).unwrap();
        assert_eq!(only(&results).body, "Internal Server Error.");
    }

    #[test]
    fn test_second_finalize_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let res = Response::new(Completion::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        res.send(None).unwrap();
        assert!(res.is_finalized());
        assert!(matches!(res.send(None), Err(RouterError::AlreadyFinalized)));
        assert!(matches!(
            res.error(anyhow::anyhow!("late")),
            Err(RouterError::AlreadyFinalized)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_completion() {
        let (res, results) = capture();
        let other = res.clone();
        other.status(StatusCode::ACCEPTED).set("x-trace", "t1");
        res.send(None).unwrap();
        assert!(other.send(None).is_err());
        assert_eq!(only(&results).status_code, 202);
    }

    #[test]
    fn test_header_names_are_case_insensitive() {
        for _ in 0..50 {
            let (res, results) = capture();
            res.set("Content-Type", "application/json")
                .content_type("text/plain");
            res.set("X-Trace", "t1").set("x-TRACE", "t2");

            assert_eq!(res.get("Content-Type"), Some(HeaderValue::from("text/plain")));
            assert_eq!(res.get("x-trace"), Some(HeaderValue::from("t2")));

            res.send(Some(json!("hello"))).unwrap();
            let result = only(&results);
            assert_eq!(result.body, "hello");
            assert_eq!(result.headers.len(), 2);
            assert_eq!(result.headers["content-type"], HeaderValue::from("text/plain"));
        }
    }

    #[test]
    fn test_channel_completion() {
        let (completion, rx) = Completion::channel();
        Response::new(completion).send(Some(json!([1, 2]))).unwrap();
        let result = tokio_test::block_on(rx).unwrap();
        assert_eq!(result.body, "[1,2]");
    }
}
