//! Minimal first-match router for AWS Lambda functions behind an API Gateway
//! REST proxy integration.
//!
//! One [`router::Router`] is built per invocation. Routes are offered in
//! order, the first match runs, and its outcome is normalized by the
//! [`response::Response`] builder into a single [`models::ProxyResult`].

pub mod handler;
pub mod matcher;
pub mod models;
pub mod request;
pub mod response;
pub mod router;
pub mod utils;
