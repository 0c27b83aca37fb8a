use anyhow::Result;
use http::StatusCode;
use lambda_runtime::tracing::{debug, error, info};
use lambda_runtime::{Diagnostic, LambdaEvent};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::matcher::PathMatcher;
use crate::models::{ApiGatewayProxyEvent, ProxyResult, RouterError};
use crate::request::Request;
use crate::response::{Completion, Response};
use crate::router::Router;

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

async fn health(_req: Request, _res: Response) -> Result<Value> {
    Ok(json!({ "status": "ok" }))
}

async fn get_user(req: Request, _res: Response) -> Result<Value> {
    let id = req.param("id").unwrap_or_default();
    let stage = req.stage_variables().get("env").map_or("default", String::as_str);
    Ok(json!({ "id": id, "stage": stage }))
}

async fn create_user(req: Request, res: Response) -> Result<Value> {
    let Ok(user) = req.json::<NewUser>() else {
        res.status(StatusCode::BAD_REQUEST)
            .content_type("application/json");
        return Ok(json!({ "message": "Expected a JSON body with a name" }));
    };

    res.status(StatusCode::CREATED)
        .location(&format!("/users/{}", urlencoding::encode(&user.name)));
    Ok(json!({ "name": user.name }))
}

async fn me(req: Request, res: Response) -> Result<Value> {
    if req.claims().is_empty() {
        res.status(StatusCode::UNAUTHORIZED)
            .content_type("application/json");
        return Ok(json!({ "message": "Unauthorized" }));
    }
    Ok(Value::Object(req.claims().clone()))
}

async fn old_home(_req: Request, res: Response) -> Result<()> {
    res.redirect("/", Some(StatusCode::MOVED_PERMANENTLY))
        .set("cache-control", "max-age=3600");
    Ok(())
}

async fn get_file(req: Request, res: Response) -> Result<String> {
    res.content_type("text/plain");
    Ok(format!("requested {}", req.param("path").unwrap_or_default()))
}

/// Offers the application's routes to the router in priority order.
///
/// # Errors
///
/// Returns a `RouterError` if a pattern is invalid or a handler's value cannot be serialized.
pub async fn register_routes<M: PathMatcher>(
    router: &mut Router<M>,
) -> Result<(), RouterError> {
    router.get("/health", health).await?;
    router.get("/users/{id}", get_user).await?;
    router.post("/users", create_user).await?;
    router.get("/me", me).await?;
    router.get("/old-home", old_home).await?;
    router.get("/files/{*path}", get_file).await?;
    Ok(())
}

fn diagnostic(error_type: &str, err: &RouterError) -> Diagnostic {
    error!(error = %err, error_type = %error_type, "Dispatch failed");
    Diagnostic {
        error_type: error_type.to_string(),
        error_message: err.to_string(),
    }
}

/// Runs one dispatch cycle for `event` and waits for its result.
///
/// # Errors
///
/// Returns a `Diagnostic` error with one of the following types:
///
/// - `InvalidPattern`: A registered route pattern was rejected by the matcher
/// - `SerializationError`: A handler's value could not be serialized
/// - `NoResponse`: The cycle ended without a response being sent
pub async fn dispatch(event: ApiGatewayProxyEvent) -> Result<ProxyResult, Diagnostic> {
    let (completion, result) = Completion::channel();
    let context = event.request_context.clone();
    let mut router = Router::new(event, context, completion);

    register_routes(&mut router).await.map_err(|e| match e {
        RouterError::InvalidPattern(_) => diagnostic("InvalidPattern", &e),
        RouterError::Serialization(_) => diagnostic("SerializationError", &e),
        _ => diagnostic("RouterError", &e),
    })?;

    // A handler may already have completed the cycle; only a missing response matters here
    if let Err(e) = router.no_match() {
        debug!(error = %e, "No-match finalizer skipped");
    }

    // Release the completion so an unfinished cycle closes the receiver instead of hanging
    drop(router);

    result.await.map_err(|_| Diagnostic {
        error_type: "NoResponse".to_string(),
        error_message: "Dispatch cycle ended without a response".to_string(),
    })
}

/// Lambda event handler for API Gateway REST proxy events.
/// Logs full event when `RUST_LOG=debug/trace`, only method and path otherwise.
///
/// # Errors
///
/// Returns a `Diagnostic` error of type `InvalidEvent` if the payload is not
/// an API Gateway proxy event, or any error described on [`dispatch`].
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<ProxyResult, Diagnostic> {
    let (payload, _context) = event.into_parts();
    debug!(payload = ?payload, "Received event");

    let event: ApiGatewayProxyEvent = serde_json::from_value(payload).map_err(|e| {
        error!(error = %e, "Failed to parse event");
        Diagnostic {
            error_type: "InvalidEvent".to_string(),
            error_message: format!("Failed to parse event: {e}"),
        }
    })?;

    info!(method = %event.http_method, path = %event.path, "Dispatching request");

    let result = dispatch(event).await?;
    info!(status = result.status_code, "Request completed");
    Ok(result)
}
