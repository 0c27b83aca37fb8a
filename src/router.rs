//! First-match-wins router for one API Gateway proxy event.
//!
//! A router lives for exactly one invocation. Routes are offered in the order
//! the caller registers them; the first one whose method and pattern both
//! match runs, and every later registration is skipped.
//!
//! ```no_run
//! # use lambda_proxy_router::models::ApiGatewayProxyEvent;
//! # use lambda_proxy_router::response::Completion;
//! # use lambda_proxy_router::router::Router;
//! # async fn run(event: ApiGatewayProxyEvent) -> Result<(), Box<dyn std::error::Error>> {
//! let (completion, result) = Completion::channel();
//! let context = event.request_context.clone();
//! let mut router = Router::new(event, context, completion);
//!
//! router
//!     .get("/users/{id}", |req, _res| async move {
//!         Ok::<_, anyhow::Error>(serde_json::json!({ "id": req.param("id") }))
//!     })
//!     .await?;
//! router.no_match()?;
//!
//! let result = result.await?;
//! # Ok(())
//! # }
//! ```

use crate::matcher::{MatchitMatcher, PathMatcher, PathParams};
use crate::models::{ApiGatewayProxyEvent, RequestContext, RouterError};
use crate::request::Request;
use crate::response::{Completion, Response};
use http::{Method, StatusCode};
use lambda_runtime::tracing::{debug, info};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// What a route pattern is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Match the pattern against the concrete `path` through the path matcher.
    #[default]
    Path,
    /// Compare the pattern with the event's `resource` template verbatim.
    /// Path parameters then come from the platform's `pathParameters`.
    Resource,
}

/// Router state for one dispatch cycle.
pub struct Router<M = MatchitMatcher> {
    event: Arc<ApiGatewayProxyEvent>,
    context: Arc<RequestContext>,
    completion: Completion,
    matcher: M,
    mode: MatchMode,
    matched: bool,
}

impl Router<MatchitMatcher> {
    /// Creates a router for one event using the default `matchit` matcher.
    #[must_use]
    pub fn new(event: ApiGatewayProxyEvent, context: RequestContext, completion: Completion) -> Self {
        Self {
            event: Arc::new(event),
            context: Arc::new(context),
            completion,
            matcher: MatchitMatcher,
            mode: MatchMode::default(),
            matched: false,
        }
    }
}

macro_rules! method_routes {
    ($($name:ident => $method:expr),* $(,)?) => {
        $(
            #[doc = concat!("Registers a `", stringify!($method), "` route. See [`Router::route`].")]
            ///
            /// # Errors
            ///
            /// See [`Router::route`].
            pub async fn $name<F, Fut, T, E>(&mut self, pattern: &str, handler: F) -> Result<(), RouterError>
            where
                F: FnOnce(Request, Response) -> Fut,
                Fut: Future<Output = Result<T, E>>,
                T: Serialize,
                E: Into<anyhow::Error>,
            {
                self.route(pattern, $method, handler).await
            }
        )*
    };
}

impl<M: PathMatcher> Router<M> {
    /// Replaces the path matcher.
    #[must_use]
    pub fn with_matcher<N: PathMatcher>(self, matcher: N) -> Router<N> {
        Router {
            event: self.event,
            context: self.context,
            completion: self.completion,
            matcher,
            mode: self.mode,
            matched: self.matched,
        }
    }

    /// Sets what route patterns are matched against.
    #[must_use]
    pub const fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether a registration has already fired in this cycle.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched
    }

    /// Offers one route to the event.
    ///
    /// Does nothing if a route already matched, the method differs, or the
    /// pattern does not match. Otherwise runs `handler` to completion and
    /// finalizes the response: `Ok(value)` is sent as the body, `Err(_)`
    /// becomes a generic 500. A handler that finalized the response itself
    /// is left alone.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::InvalidPattern` if the matcher rejects `pattern`,
    /// or `RouterError::Serialization` if the handler's value cannot be
    /// serialized. In both cases no response is sent.
    pub async fn route<F, Fut, T, E>(
        &mut self,
        pattern: &str,
        method: Method,
        handler: F,
    ) -> Result<(), RouterError>
    where
        F: FnOnce(Request, Response) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Into<anyhow::Error>,
    {
        let Some(params) = self.match_route(pattern, &method)? else {
            return Ok(());
        };

        self.matched = true;
        info!(method = %method, pattern = %pattern, path = %self.event.path, "Route matched");

        let request = Request::new(Arc::clone(&self.event), Arc::clone(&self.context), params);
        let response = Response::new(self.completion.clone());

        let outcome = handler(request, response.clone()).await;

        if response.is_finalized() {
            debug!("Handler finalized the response itself");
            return Ok(());
        }

        let finalized = match outcome {
            Ok(value) => response.send(Some(serde_json::to_value(value)?)),
            Err(e) => response.error(e),
        };

        match finalized {
            Err(RouterError::AlreadyFinalized) => Ok(()),
            other => other,
        }
    }

    method_routes! {
        get => Method::GET,
        post => Method::POST,
        put => Method::PUT,
        patch => Method::PATCH,
        delete => Method::DELETE,
        options => Method::OPTIONS,
        head => Method::HEAD,
    }

    /// Sends a 404 if no route matched. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AlreadyFinalized` if something else already
    /// completed this cycle.
    pub fn no_match(&self) -> Result<bool, RouterError> {
        if self.matched {
            return Ok(false);
        }

        info!(method = %self.event.http_method, path = %self.event.path, "No route matched");
        let response = Response::new(self.completion.clone());
        response.status(StatusCode::NOT_FOUND).send(None)?;
        Ok(true)
    }

    fn match_route(&self, pattern: &str, method: &Method) -> Result<Option<PathParams>, RouterError> {
        if self.matched || self.event.http_method != method.as_str() {
            return Ok(None);
        }

        match self.mode {
            MatchMode::Path => self.matcher.matches(pattern, &self.event.path),
            MatchMode::Resource => Ok((self.event.resource.as_deref() == Some(pattern))
                .then(PathParams::new)),
        }
    }
}
