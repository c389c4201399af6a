use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// When the redirect server first saw the request; feeds
/// `x-linkmeter-timing-total-ms`
#[derive(Copy, Clone, Debug)]
pub struct RequestStart(pub Instant);

pub async fn record_request_start(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestStart(Instant::now()));
    next.run(request).await
}
