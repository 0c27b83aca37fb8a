//! Read-only view over one inbound event and its invocation context.

use crate::matcher::PathParams;
use crate::models::{ApiGatewayProxyEvent, RequestContext};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static EMPTY_STRINGS: LazyLock<HashMap<String, String>> = LazyLock::new(HashMap::new);
static EMPTY_CLAIMS: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// Request handed to a route handler.
///
/// Accessors never fail: a missing mapping reads as an empty one. Cloning is
/// cheap, the event and context are shared.
#[derive(Debug, Clone)]
pub struct Request {
    event: Arc<ApiGatewayProxyEvent>,
    context: Arc<RequestContext>,
    params: PathParams,
}

impl Request {
    /// Creates a request view.
    ///
    /// `matched` holds the parameters captured by the path matcher. They take
    /// precedence over the platform's `pathParameters` on name clashes.
    #[must_use]
    pub fn new(
        event: Arc<ApiGatewayProxyEvent>,
        context: Arc<RequestContext>,
        matched: PathParams,
    ) -> Self {
        let mut params = event.path_parameters.clone().unwrap_or_default();
        params.extend(matched);

        Self {
            event,
            context,
            params,
        }
    }

    /// Query string parameters.
    #[must_use]
    pub fn query(&self) -> &HashMap<String, String> {
        self.event
            .query_string_parameters
            .as_ref()
            .unwrap_or(&EMPTY_STRINGS)
    }

    /// Deserializes the query string into `T`. All values are strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the query parameters do not fit `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(self.query())?;
        serde_json::from_value(value).context("Failed to parse query string parameters")
    }

    /// Path parameters, from the platform and from the route pattern.
    #[must_use]
    pub const fn params(&self) -> &PathParams {
        &self.params
    }

    /// A single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The request body parsed as JSON.
    ///
    /// A body that is absent, is not valid JSON, or is flagged as base64 but
    /// does not decode yields an empty object instead of an error. Use
    /// [`Request::json`] when the failure matters.
    #[must_use]
    pub fn body(&self) -> Value {
        self.parse_body()
            .unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Deserializes the request body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is missing, cannot be decoded, or does not fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.parse_body()?;
        serde_json::from_value(value).context("Request body does not match the expected shape")
    }

    fn parse_body(&self) -> Result<Value> {
        let raw = self.event.body.as_deref().context("Request has no body")?;

        if self.event.is_base64_encoded {
            let bytes = STANDARD
                .decode(raw)
                .context("Failed to decode base64 request body")?;
            return serde_json::from_slice(&bytes).context("Failed to parse request body");
        }

        serde_json::from_str(raw).context("Failed to parse request body")
    }

    /// The body exactly as received.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        self.event.body.as_deref()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        self.event.headers.as_ref().unwrap_or(&EMPTY_STRINGS)
    }

    /// Case-insensitive lookup of a single header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Authorizer claims, e.g. from a Cognito user pool authorizer.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        self.context
            .authorizer
            .as_ref()
            .and_then(|a| a.claims.as_ref())
            .unwrap_or(&EMPTY_CLAIMS)
    }

    /// Stage variables of the API Gateway deployment.
    #[must_use]
    pub fn stage_variables(&self) -> &HashMap<String, String> {
        self.event.stage_variables.as_ref().unwrap_or(&EMPTY_STRINGS)
    }

    /// The whole invocation context.
    #[must_use]
    pub fn context_object(&self) -> &RequestContext {
        &self.context
    }

    /// The whole event.
    #[must_use]
    pub fn event_object(&self) -> &ApiGatewayProxyEvent {
        &self.event
    }
}
