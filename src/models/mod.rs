pub mod error;
pub mod event;
pub mod result;

pub use error::RouterError;
pub use event::{ApiGatewayProxyEvent, Authorizer, RequestContext};
pub use result::{HeaderValue, ProxyResult};
