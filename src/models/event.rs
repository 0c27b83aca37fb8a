//! Inbound API Gateway REST proxy event models.
//!
//! Only the fields the router consumes are typed. Everything else the
//! platform sends in `requestContext` is kept verbatim so handlers can still
//! reach it through the request view.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// API Gateway proxy integration event (payload format 1.0).
///
/// Every mapping is optional because API Gateway sends `null` rather than an
/// empty object when a request carries no query string, headers, etc.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayProxyEvent {
    /// Resource template, e.g. `/users/{id}`
    #[serde(default)]
    pub resource: Option<String>,
    /// Concrete request path, e.g. `/users/42`
    #[serde(default)]
    pub path: String,
    pub http_method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub stage_variables: Option<HashMap<String, String>>,
    #[serde(default)]
    pub request_context: RequestContext,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Invocation context carried by the event.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub authorizer: Option<Authorizer>,
    /// Platform metadata (`stage`, `requestId`, `identity`, ...) passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authorizer output, e.g. a Cognito user pool authorizer.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct Authorizer {
    #[serde(default)]
    pub claims: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiGatewayProxyEvent {
    /// Builds a bare event for `method` and `path`, mostly useful in tests.
    #[must_use]
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            path: path.to_string(),
            http_method: method.to_string(),
            ..Self::default()
        }
    }
}
